use std::path::Path;
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default delay between scheduled expiration sweeps (5 minutes).
const DEFAULT_EXPIRE_PERIOD_SECONDS: u64 = 300;

/// Default grace added to lease deadlines before reaping (1 minute).
///
/// Tolerates small clock skews and late renewals: a lease is only reaped once
/// it has been expired for at least this long.
const DEFAULT_EXPIRE_GRACE_SECONDS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub expire_period_seconds: u64,
    pub expire_grace_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            expire_period_seconds: DEFAULT_EXPIRE_PERIOD_SECONDS,
            expire_grace_seconds: DEFAULT_EXPIRE_GRACE_SECONDS,
        }
    }
}

impl StoreConfig {
    pub async fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: StoreConfig = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = StoreConfig::default();
            config.save(path).await?;
            Ok(config)
        }
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.expire_period_seconds == 0 {
            return Err(Error::InvalidConfig(
                "expire_period_seconds must be greater than 0".to_string(),
            ));
        }

        if self.expire_grace_seconds > i64::MAX as u64 {
            return Err(Error::InvalidConfig(
                "expire_grace_seconds is out of range".to_string(),
            ));
        }

        Ok(())
    }

    pub fn expire_period(&self) -> Duration {
        Duration::from_secs(self.expire_period_seconds)
    }

    pub fn expire_grace(&self) -> TimeDelta {
        TimeDelta::seconds(self.expire_grace_seconds as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestGuard(String);
    impl Drop for TestGuard {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(StoreConfig::default().validate().is_ok());

        let zero_period = StoreConfig {
            expire_period_seconds: 0,
            ..Default::default()
        };
        assert!(zero_period.validate().is_err());

        let oversized_grace = StoreConfig {
            expire_grace_seconds: u64::MAX,
            ..Default::default()
        };
        assert!(oversized_grace.validate().is_err());
    }

    #[test]
    fn test_duration_accessors() {
        let config = StoreConfig {
            expire_period_seconds: 10,
            expire_grace_seconds: 90,
        };

        assert_eq!(config.expire_period(), Duration::from_secs(10));
        assert_eq!(config.expire_grace(), TimeDelta::seconds(90));
    }

    #[tokio::test]
    async fn test_load_or_create_roundtrip() {
        let path = "test_store_config_roundtrip.json".to_string();
        let _guard = TestGuard(path.clone());

        let created = StoreConfig::load_or_create(&path).await.unwrap();
        assert_eq!(
            created.expire_period_seconds,
            StoreConfig::default().expire_period_seconds
        );

        let reloaded = StoreConfig::load_or_create(&path).await.unwrap();
        assert_eq!(reloaded.expire_grace_seconds, created.expire_grace_seconds);
    }
}
