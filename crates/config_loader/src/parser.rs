//! 配置文件格式
//!
//! TOML 为主，JSON 便于由其他工具生成。两种格式共用 `RelayConfig` 的 serde 定义。

use std::path::Path;

use contracts::{ContractError, RelayConfig};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// 根据扩展名 (不区分大小写) 选择格式
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| {
                ContractError::config_parse(format!(
                    "{}: missing file extension (.toml or .json)",
                    path.display()
                ))
            })?;

        match ext.as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            other => Err(ContractError::config_parse(format!(
                "{}: unsupported config format .{other}",
                path.display()
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }

    /// 反序列化，未出现的字段取默认值
    pub fn parse(self, content: &str) -> Result<RelayConfig, ContractError> {
        let parsed = match self {
            Self::Toml => toml::from_str(content).map_err(boxed),
            Self::Json => serde_json::from_str(content).map_err(boxed),
        };
        parsed.map_err(|e| ContractError::ConfigParse {
            message: format!("{} parse error: {e}", self.name()),
            source: Some(e),
        })
    }

    /// 序列化为该格式的可读文本
    pub fn render(self, config: &RelayConfig) -> Result<String, ContractError> {
        let rendered = match self {
            Self::Toml => toml::to_string_pretty(config).map_err(boxed),
            Self::Json => serde_json::to_string_pretty(config).map_err(boxed),
        };
        rendered.map_err(|e| {
            ContractError::config_parse(format!("{} serialize error: {e}", self.name()))
        })
    }
}

fn boxed<E>(e: E) -> Box<dyn std::error::Error + Send + Sync>
where
    E: std::error::Error + Send + Sync + 'static,
{
    Box::new(e)
}
