//! RelayConfig - Config Loader 输出
//!
//! 描述完整的转发配置：源频道、Bot API、目标列表、投递策略、暂存目录、标记选项。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

use crate::ChatId;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的转发配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 源频道
    #[serde(default)]
    pub source: SourceConfig,

    /// Telegram Bot API 设置
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// 目标列表（有序，运行期间不变）
    #[serde(default)]
    pub destinations: Vec<DestinationConfig>,

    /// 投递策略
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// 媒体暂存
    #[serde(default)]
    pub staging: StagingConfig,

    /// 标记渲染选项
    #[serde(default)]
    pub markup: MarkupConfig,
}

impl RelayConfig {
    /// 目标 ID 列表（按配置顺序）
    pub fn destination_ids(&self) -> Vec<ChatId> {
        self.destinations.iter().map(|d| d.id.clone()).collect()
    }
}

/// 源频道配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// 被监听的频道 ID
    #[serde(default)]
    pub channel_id: Option<ChatId>,
}

/// Telegram Bot API 配置
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct TelegramConfig {
    /// API 根地址
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Bot token（也可通过环境变量提供）
    #[serde(default)]
    pub bot_token: Option<String>,

    /// getUpdates 长轮询超时（秒）
    #[serde(default = "default_poll_timeout_secs")]
    #[validate(range(max = 50))]
    pub poll_timeout_secs: u64,

    /// 单次 HTTP 请求超时（秒），须大于长轮询超时
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_base", &self.api_base)
            .field("bot_token", &self.bot_token.as_ref().map(|_| "[REDACTED]"))
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            bot_token: None,
            poll_timeout_secs: default_poll_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// 单个目标
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// 目标聊天 ID
    pub id: ChatId,

    /// 显示名称（仅用于日志）
    #[serde(default)]
    pub label: Option<String>,
}

impl DestinationConfig {
    /// 仅含 ID 的目标
    pub fn new(id: impl Into<ChatId>) -> Self {
        Self {
            id: id.into(),
            label: None,
        }
    }
}

/// 退避策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// 固定间隔
    #[default]
    Fixed,
    /// 指数增长，上限 max_backoff_ms
    Exponential,
}

/// 目标分发方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// 按配置顺序逐个投递
    Sequential,
    /// 并发投递（受 max_concurrency 限制）
    #[default]
    Concurrent,
}

/// 投递策略配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeliveryConfig {
    /// 每个目标的最大尝试次数（含首次）
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 100))]
    pub max_attempts: u32,

    /// 退避策略
    #[serde(default)]
    pub backoff: BackoffStrategy,

    /// 基础退避间隔（毫秒）
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// 指数退避上限（毫秒）
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// 分发方式
    #[serde(default)]
    pub mode: DispatchMode,

    /// 并发上限
    #[serde(default = "default_max_concurrency")]
    #[validate(range(min = 1))]
    pub max_concurrency: usize,
}

impl DeliveryConfig {
    /// 基础退避间隔
    pub fn backoff_delay(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// 指数退避上限
    pub fn max_backoff_delay(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: BackoffStrategy::default(),
            backoff_ms: default_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            mode: DispatchMode::default(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    5_000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_max_concurrency() -> usize {
    8
}

/// 媒体暂存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    /// 下载目录
    #[serde(default = "default_staging_dir")]
    pub dir: PathBuf,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: default_staging_dir(),
        }
    }
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir().join("tg-relay")
}

/// 标记渲染配置
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MarkupConfig {
    /// 是否转义正文中的 `& < >`
    #[serde(default)]
    pub escape_text: bool,
}
