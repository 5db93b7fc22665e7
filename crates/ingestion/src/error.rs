//! Ingestion 错误类型

use contracts::ContractError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 订阅源频道失败
    #[error("source '{source_name}' failed to subscribe: {source}")]
    Subscribe {
        /// 消息源名称
        source_name: String,
        /// 底层错误
        #[source]
        source: ContractError,
    },

    /// 泵已启动（每个 pipeline 只能启动一次）
    #[error("ingestion pump already started")]
    AlreadyStarted,

    /// 回放文件中的某行无法解析
    #[error("replay line {line}: {message}")]
    ReplayParse {
        /// 行号（从 1 开始）
        line: usize,
        /// 错误消息
        message: String,
    },

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestionError {
    /// 创建订阅错误
    pub fn subscribe(source_name: impl Into<String>, source: ContractError) -> Self {
        Self::Subscribe {
            source_name: source_name.into(),
            source,
        }
    }

    /// 创建回放解析错误
    pub fn replay_parse(line: usize, message: impl Into<String>) -> Self {
        Self::ReplayParse {
            line,
            message: message.into(),
        }
    }
}

impl From<IngestionError> for ContractError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::Subscribe { source, .. } => source,
            IngestionError::Io(e) => ContractError::Io(e),
            other => ContractError::source("ingestion", other.to_string()),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
