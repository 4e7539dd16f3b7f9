use serde::{Deserialize, Serialize};

use crate::config::Validate;

/// Opaque credentials read from the external store at session start. The
/// core attaches them to outbound calls and never interprets them.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct AccountIdentity {
    pub api_key: String,
    #[serde(default)]
    pub cookie: String,
    #[serde(default)]
    pub fingerprint: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SessionConfig {
    pub label: String,
    pub identity: AccountIdentity,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Outbound routing descriptor; empty means a direct connection.
    #[serde(default)]
    pub proxy_url: Option<String>,
    pub currency: String,
    pub target_amount: f64,
    /// Defaults to `target_amount` when unset.
    #[serde(default)]
    pub cashout_threshold: Option<f64>,
    pub house_edge: f64,
    #[serde(default)]
    pub auto_cashout: bool,
    #[serde(default)]
    pub continue_after_cashout: bool,
    #[serde(default)]
    pub timing: TimingConfig,
}

impl SessionConfig {
    pub fn effective_cashout_threshold(&self) -> f64 {
        self.cashout_threshold.unwrap_or(self.target_amount)
    }
}

fn default_base_url() -> String {
    "https://duckdice.io".to_string()
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct TimingConfig {
    pub claim_cooldown_secs: u64,
    /// Wait after a successful claim before the balance is trusted.
    pub claim_sync_secs: u64,
    pub retry_delay_secs: u64,
    pub rate_limit_pause_secs: u64,
    /// Applied when a failed transfer carries no cooldown of its own.
    pub cashout_retry_hint_secs: u64,
    pub bet_pace_min_secs: u64,
    pub bet_pace_max_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            claim_cooldown_secs: 60,
            claim_sync_secs: 10,
            retry_delay_secs: 10,
            rate_limit_pause_secs: 30,
            cashout_retry_hint_secs: 60,
            bet_pace_min_secs: 2,
            bet_pace_max_secs: 10,
        }
    }
}

impl Validate for TimingConfig {
    fn validate(&self) -> Result<(), String> {
        if self.bet_pace_max_secs < self.bet_pace_min_secs {
            return Err("bet_pace_max_secs must not be below bet_pace_min_secs".to_string());
        }
        Ok(())
    }
}

impl Validate for SessionConfig {
    fn validate(&self) -> Result<(), String> {
        if self.label.is_empty() {
            return Err("label must not be empty".to_string());
        }
        if self.identity.api_key.is_empty() {
            return Err("api_key must not be empty".to_string());
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(format!(
                "base_url must be http or https, got {}",
                self.base_url
            ));
        }
        if let Some(proxy_url) = &self.proxy_url
            && proxy_url.is_empty()
        {
            return Err("proxy_url must not be an empty string".to_string());
        }
        if self.currency.is_empty() {
            return Err("currency must not be empty".to_string());
        }
        if self.target_amount <= 0.0 {
            return Err("target_amount must be greater than 0".to_string());
        }
        if let Some(threshold) = self.cashout_threshold
            && threshold <= 0.0
        {
            return Err("cashout_threshold must be greater than 0".to_string());
        }
        if self.house_edge <= 0.0 || self.house_edge >= 1.0 {
            return Err("house_edge must be between 0 and 1 exclusive".to_string());
        }
        self.timing.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> SessionConfig {
        SessionConfig {
            label: "main".to_string(),
            identity: AccountIdentity {
                api_key: "key".to_string(),
                cookie: String::new(),
                fingerprint: String::new(),
            },
            base_url: "https://example.test".to_string(),
            proxy_url: None,
            currency: "USDC".to_string(),
            target_amount: 20.0,
            cashout_threshold: None,
            house_edge: 0.03,
            auto_cashout: false,
            continue_after_cashout: false,
            timing: TimingConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_threshold_defaults_to_target() {
        let mut config = valid_config();
        assert_eq!(config.effective_cashout_threshold(), 20.0);
        config.cashout_threshold = Some(12.5);
        assert_eq!(config.effective_cashout_threshold(), 12.5);
    }

    #[test]
    fn test_non_positive_target_is_rejected() {
        let mut config = valid_config();
        config.target_amount = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_house_edge_bounds_are_exclusive() {
        let mut config = valid_config();
        config.house_edge = 0.0;
        assert!(config.validate().is_err());
        config.house_edge = 1.0;
        assert!(config.validate().is_err());
        config.house_edge = 0.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        let mut config = valid_config();
        config.identity.api_key.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_scheme_is_rejected() {
        let mut config = valid_config();
        config.base_url = "ftp://example.test".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_pacing_window_is_rejected() {
        let mut config = valid_config();
        config.timing.bet_pace_min_secs = 10;
        config.timing.bet_pace_max_secs = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_round_trips_through_yaml() {
        let config = valid_config();
        let serialized = serde_yaml_ng::to_string(&config).unwrap();
        let deserialized: SessionConfig = serde_yaml_ng::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }
}
