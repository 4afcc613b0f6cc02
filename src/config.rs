//! Feed configuration.

use crate::error::{FeedError, Result};
use crate::pagination::PageLimits;
use crate::subscriptions::SubscriptionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration for a [`Feed`](crate::resolvers::Feed).
///
/// Every field has a default, so a partial JSON document (or `{}`) is a
/// valid configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Page size bounds for every paginated query.
    pub page: PageLimits,

    /// Buffer settings for live subscriptions.
    pub subscription: SubscriptionConfig,

    /// Sync log tables every N writes.
    /// Default: 100
    pub log_sync_interval: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page: PageLimits::default(),
            subscription: SubscriptionConfig::default(),
            log_sync_interval: 100,
        }
    }
}

impl FeedConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: FeedConfig =
            serde_json::from_str(json).map_err(|e| FeedError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Check every setting is usable.
    pub fn validate(&self) -> Result<()> {
        self.page.validate()?;
        if self.subscription.buffer_size == 0 {
            return Err(FeedError::Config(
                "subscription.buffer_size must be at least 1".into(),
            ));
        }
        if self.log_sync_interval == 0 {
            return Err(FeedError::Config("log_sync_interval must be at least 1".into()));
        }
        Ok(())
    }
}
