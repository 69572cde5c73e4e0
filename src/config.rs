use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub enable_tracing: bool,
    #[serde(default)]
    pub moneropay: MoneroPayConfig,
    #[serde(default)]
    pub callback: CallbackConfig,
    #[serde(default)]
    pub payment: PaymentConfig,
}

/// MoneroPay gateway endpoint configuration.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MoneroPayConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for MoneroPayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Inbound callback listener configuration.
///
/// `public_url` is the address the payment processor can reach this
/// terminal at; it is embedded in every callback URL and usually differs
/// from the bind host on NAT'd networks.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CallbackConfig {
    pub host: String,
    pub port: u16,
    pub public_url: String,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaymentConfig {
    /// Poll cadence of the status backstop, in seconds.
    pub poll_interval_secs: u64,
    /// Confirmation threshold for completion; 0 accepts unconfirmed spends.
    pub required_confirmations: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            required_confirmations: 0,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}
