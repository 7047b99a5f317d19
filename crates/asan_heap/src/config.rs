//! # config
//! The tunables of an `AllocationDirectory`. A configuration can be built in
//! code or parsed from a sanitizer style option string such as
//! `redzone=64:quarantine_size=0x1000000`.
use alloc::string::{String, ToString};

use thiserror::Error;

use crate::{PAGE_SIZE, allocator::chunk::HEADER_SIZE, is_power_of_two, shadow::SHADOW_GRANULE};

pub const DEFAULT_REDZONE_SIZE: usize = 32;
pub const DEFAULT_QUARANTINE_SIZE: usize = 256 << 20;
pub const DEFAULT_MIN_BATCH_SIZE: usize = 128 * PAGE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
    /// The size of the redzone in front of every allocation and the minimum
    /// alignment of every address handed out.
    pub redzone_size: usize,
    /// The number of bytes of freed chunks held back from reuse.
    pub quarantine_size: usize,
    /// The smallest region requested when refilling a size class.
    pub min_batch_size: usize,
}

impl Default for HeapConfig {
    fn default() -> Self {
        HeapConfig::new()
    }
}

impl HeapConfig {
    pub const fn new() -> Self {
        HeapConfig {
            redzone_size: DEFAULT_REDZONE_SIZE,
            quarantine_size: DEFAULT_QUARANTINE_SIZE,
            min_batch_size: DEFAULT_MIN_BATCH_SIZE,
        }
    }

    pub const fn with_redzone_size(mut self, redzone_size: usize) -> Self {
        self.redzone_size = redzone_size;
        self
    }

    pub const fn with_quarantine_size(mut self, quarantine_size: usize) -> Self {
        self.quarantine_size = quarantine_size;
        self
    }

    pub const fn with_min_batch_size(mut self, min_batch_size: usize) -> Self {
        self.min_batch_size = min_batch_size;
        self
    }

    /// The smallest chunk ever carved, four redzones.
    pub const fn min_alloc_size(&self) -> usize {
        self.redzone_size * 4
    }

    /// Parses an option string on top of the default configuration.
    pub fn parse(options: &str) -> Result<Self, ConfigError> {
        HeapConfig::new().with_options(options)
    }

    /// Applies the `key=value` pairs of a `:` separated option string. Empty
    /// entries are skipped. The result is validated.
    pub fn with_options(mut self, options: &str) -> Result<Self, ConfigError> {
        for option in options.split(':').map(str::trim) {
            if option.is_empty() {
                continue;
            }
            let Some((key, value)) = option.split_once('=') else {
                return Err(ConfigError::MissingValue(option.to_string()));
            };
            let key = key.trim();
            let field = match key {
                "redzone" => &mut self.redzone_size,
                "quarantine_size" => &mut self.quarantine_size,
                "min_batch_size" => &mut self.min_batch_size,
                _ => return Err(ConfigError::UnknownOption(key.to_string())),
            };
            *field = Self::parse_value(key, value.trim())?;
        }
        self.validate()?;
        Ok(self)
    }

    fn parse_value(key: &str, value: &str) -> Result<usize, ConfigError> {
        let parsed = match value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
        {
            Some(hex) => usize::from_str_radix(hex, 16),
            None => value.parse::<usize>(),
        };
        parsed.map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let redzone = self.redzone_size;
        if !is_power_of_two(redzone)
            || redzone < SHADOW_GRANULE
            || redzone < HEADER_SIZE
            || redzone > PAGE_SIZE
        {
            Err(ConfigError::InvalidRedzone(redzone))?;
        }
        if !is_power_of_two(self.min_batch_size) || self.min_batch_size < PAGE_SIZE {
            Err(ConfigError::InvalidMinBatchSize(self.min_batch_size))?;
        }
        Ok(())
    }
}

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Unknown option: {0}")]
    UnknownOption(String),
    #[error("Missing value - option: {0}")]
    MissingValue(String),
    #[error("Invalid value - option: {0}, value: {1}")]
    InvalidValue(String, String),
    #[error("Invalid redzone size: {0:#x}")]
    InvalidRedzone(usize),
    #[error("Invalid minimum batch size: {0:#x}")]
    InvalidMinBatchSize(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HeapConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.min_alloc_size(), 128);
    }

    #[test]
    fn test_parse() {
        let config =
            HeapConfig::parse("redzone=64:quarantine_size=0x1000: min_batch_size=8192").unwrap();
        assert_eq!(
            config,
            HeapConfig {
                redzone_size: 64,
                quarantine_size: 0x1000,
                min_batch_size: 8192,
            }
        );
        assert_eq!(HeapConfig::parse(""), Ok(HeapConfig::new()));
        assert_eq!(
            HeapConfig::parse("quarantine_size=0").map(|c| c.quarantine_size),
            Ok(0)
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            HeapConfig::parse("colour=blue"),
            Err(ConfigError::UnknownOption("colour".into()))
        );
        assert_eq!(
            HeapConfig::parse("redzone"),
            Err(ConfigError::MissingValue("redzone".into()))
        );
        assert_eq!(
            HeapConfig::parse("redzone=0xzz"),
            Err(ConfigError::InvalidValue("redzone".into(), "0xzz".into()))
        );
    }

    #[test]
    fn test_invalid_redzone() {
        for redzone in [0, 4, 24, 2 * PAGE_SIZE] {
            assert_eq!(
                HeapConfig::new().with_redzone_size(redzone).validate(),
                Err(ConfigError::InvalidRedzone(redzone))
            );
        }
        assert_eq!(HeapConfig::new().with_redzone_size(16).validate(), Ok(()));
    }

    #[test]
    fn test_invalid_min_batch_size() {
        assert_eq!(
            HeapConfig::parse("min_batch_size=1024"),
            Err(ConfigError::InvalidMinBatchSize(1024))
        );
    }
}
