//! # Config Loader
//!
//! 读取 `RelayConfig`：按扩展名选择 TOML 或 JSON，解析后立即校验，
//! 任何不合法的配置都在进入运行状态前被拒绝。
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("eve-relay.toml")).unwrap();
//! println!("topic = {}", config.broker.topic);
//! ```

mod parser;
mod validator;

pub use contracts::RelayConfig;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Loads and validates `RelayConfig` documents
pub struct ConfigLoader;

impl ConfigLoader {
    /// Read, parse and validate a config file; the extension picks the format
    pub fn load_from_path(path: &Path) -> Result<RelayConfig, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Parse and validate an in-memory document
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<RelayConfig, ContractError> {
        let config = format.parse(content)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Re-check a config after CLI overrides were applied
    pub fn validate(config: &RelayConfig) -> Result<(), ContractError> {
        validator::validate(config)
    }

    pub fn to_toml(config: &RelayConfig) -> Result<String, ContractError> {
        ConfigFormat::Toml.render(config)
    }

    pub fn to_json(config: &RelayConfig) -> Result<String, ContractError> {
        ConfigFormat::Json.render(config)
    }
}
