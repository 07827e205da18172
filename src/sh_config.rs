use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for a shuffling node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ShuffleConfig {
    /// Maximum number of neighbors kept in the cache (default: 20)
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// Maximum number of entries exchanged per shuffle, `l` (default: 8)
    #[serde(default = "default_shuffle_length")]
    pub shuffle_length: usize,
}

fn default_cache_size() -> usize {
    20
}

fn default_shuffle_length() -> usize {
    8
}

impl Default for ShuffleConfig {
    fn default() -> Self {
        Self {
            cache_size: default_cache_size(),
            shuffle_length: default_shuffle_length(),
        }
    }
}

/// Invalid node configuration, reported once at node construction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("cache size must be greater than zero")]
    ZeroCacheSize,

    #[error("shuffle length must be greater than zero")]
    ZeroShuffleLength,
}

impl ShuffleConfig {
    pub fn new(cache_size: usize, shuffle_length: usize) -> Self {
        Self {
            cache_size,
            shuffle_length,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_size == 0 {
            return Err(ConfigError::ZeroCacheSize);
        }
        if self.shuffle_length == 0 {
            return Err(ConfigError::ZeroShuffleLength);
        }
        if self.shuffle_length > self.cache_size {
            // legal, but a reply can then never be absorbed completely
            log::warn!(
                "shuffle length {} exceeds cache size {}",
                self.shuffle_length,
                self.cache_size
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ShuffleConfig::default();
        assert_eq!(config.cache_size, 20);
        assert_eq!(config.shuffle_length, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_zero_values() {
        assert_eq!(
            ShuffleConfig::new(0, 3).validate(),
            Err(ConfigError::ZeroCacheSize)
        );
        assert_eq!(
            ShuffleConfig::new(5, 0).validate(),
            Err(ConfigError::ZeroShuffleLength)
        );
    }

    #[test]
    fn test_config_allows_long_shuffle() {
        assert!(ShuffleConfig::new(3, 5).validate().is_ok());
    }

    #[test]
    fn test_config_from_yaml_with_defaults() {
        let config: ShuffleConfig = serde_yaml::from_str("cache_size: 50").unwrap();
        assert_eq!(config.cache_size, 50);
        assert_eq!(config.shuffle_length, 8);
    }
}
