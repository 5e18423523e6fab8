//! Configuration for gateway records

use serde::{Deserialize, Serialize};

/// Gateway records configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Gateway account settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Validation rule parameters
    #[serde(default)]
    pub validation: ValidationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "gateway-records".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            gateway: GatewayConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

/// Gateway account settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gateway environment (sandbox, production)
    pub environment: String,

    /// Merchant identifier
    pub merchant_id: String,

    /// Merchant account used when a transaction names none
    pub merchant_account_id: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            environment: "sandbox".to_string(),
            merchant_id: String::new(),
            merchant_account_id: None,
        }
    }
}

/// Validation rule parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Earliest accepted card expiration year
    pub min_expiration_year: i64,

    /// Latest accepted card expiration year
    pub max_expiration_year: i64,

    /// Require a postal code on addresses
    pub require_postal_code: bool,

    /// Require a street address on addresses
    pub require_street_address: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_expiration_year: 1976,
            max_expiration_year: 2200,
            require_postal_code: true,
            require_street_address: true,
        }
    }
}

fn parse_flag(name: &str, value: &str) -> crate::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(crate::Error::Config(format!(
            "Invalid value for {}: {}",
            name, other
        ))),
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(environment) = std::env::var("GATEWAY_ENVIRONMENT") {
            config.gateway.environment = environment;
        }

        if let Ok(merchant_id) = std::env::var("GATEWAY_MERCHANT_ID") {
            config.gateway.merchant_id = merchant_id;
        }

        if let Ok(account) = std::env::var("GATEWAY_MERCHANT_ACCOUNT_ID") {
            config.gateway.merchant_account_id = Some(account).filter(|a| !a.is_empty());
        }

        if let Ok(flag) = std::env::var("GATEWAY_REQUIRE_POSTAL_CODE") {
            config.validation.require_postal_code = parse_flag("GATEWAY_REQUIRE_POSTAL_CODE", &flag)?;
        }

        if let Ok(flag) = std::env::var("GATEWAY_REQUIRE_STREET_ADDRESS") {
            config.validation.require_street_address =
                parse_flag("GATEWAY_REQUIRE_STREET_ADDRESS", &flag)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject inconsistent settings
    pub fn validate(&self) -> crate::Result<()> {
        let validation = &self.validation;
        if validation.min_expiration_year > validation.max_expiration_year {
            return Err(crate::Error::Config(format!(
                "Expiration year bounds are inverted: {} > {}",
                validation.min_expiration_year, validation.max_expiration_year
            )));
        }
        Ok(())
    }
}
