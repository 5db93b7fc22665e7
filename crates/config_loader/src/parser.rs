//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON 格式，格式由文件扩展名决定。

use std::fmt;
use std::path::Path;

use contracts::{ContractError, RelayConfig};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式（大小写不敏感）
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("toml") {
            Some(Self::Toml)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else {
            None
        }
    }

    /// 从路径推断格式
    ///
    /// # Errors
    /// 无扩展名或扩展名不受支持
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse(format!(
                "cannot determine config format of {} (expected .toml or .json)",
                path.display()
            ))
        })?;
        Self::from_extension(ext)
            .ok_or_else(|| ContractError::config_parse(format!("unsupported config format: .{ext}")))
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        })
    }
}

/// 根据格式解析配置
///
/// 编辑器写入的 UTF-8 BOM 会被忽略。
pub fn parse(content: &str, format: ConfigFormat) -> Result<RelayConfig, ContractError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let parsed = match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(boxed),
        ConfigFormat::Json => serde_json::from_str(content).map_err(boxed),
    };
    parsed.map_err(|e| ContractError::ConfigParse {
        message: format!("{format} parse error: {e}"),
        source: Some(e),
    })
}

fn boxed<E>(e: E) -> Box<dyn std::error::Error + Send + Sync>
where
    E: std::error::Error + Send + Sync + 'static,
{
    Box::new(e)
}
