pub(crate) use faucetplay_core::config::{
    ConfigManager, FileContentConfigProvider, Validate, YamlConfigSerializer,
};
use faucetplay_core::session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub fn get_config_manager(
    file_path: &str,
) -> ConfigManager<FileContentConfigProvider, Config, YamlConfigSerializer> {
    ConfigManager::from_yaml_file(file_path)
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub accounts: Vec<SessionConfig>,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), String> {
        let mut labels = HashSet::new();
        for account in &self.accounts {
            account.validate()?;
            if !labels.insert(account.label.as_str()) {
                return Err(format!("duplicate account label: {}", account.label));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faucetplay_core::session::AccountIdentity;

    fn account(label: &str) -> SessionConfig {
        SessionConfig {
            label: label.to_string(),
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
            timing: Default::default(),
        }
    }

    #[test]
    fn test_empty_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_duplicate_labels_are_rejected() {
        let config = Config {
            accounts: vec![account("main"), account("main")],
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_round_trips_through_yaml() {
        let config = Config {
            accounts: vec![account("main"), account("second")],
        };
        let serializer = YamlConfigSerializer::new();
        use faucetplay_core::config::ConfigSerializer;
        let serialized = serializer.serialize(&config).unwrap();
        let deserialized: Config = serializer.deserialize(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }
}
