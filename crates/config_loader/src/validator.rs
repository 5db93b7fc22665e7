//! 配置校验模块
//!
//! 校验规则：
//! - source.channel_id 必填且格式合法
//! - destinations 非空、格式合法、不重复
//! - delivery: max_attempts >= 1, max_concurrency >= 1,
//!   指数退避时 backoff_ms <= max_backoff_ms
//! - telegram: 超时范围
//! - staging.dir 非空
//!
//! 凭证 (bot_token) 单独由 [`validate_credentials`] 校验，仅在使用 Bot API 时要求。

use std::collections::HashSet;

use contracts::{BackoffStrategy, ContractError, RelayConfig};
use validator::{Validate, ValidationErrors};

/// 校验 RelayConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &RelayConfig) -> Result<(), ContractError> {
    validate_source(config)?;
    validate_destinations(config)?;
    validate_delivery(config)?;
    validate_telegram(config)?;
    validate_staging(config)?;
    Ok(())
}

/// 校验 Bot API 凭证
pub fn validate_credentials(config: &RelayConfig) -> Result<(), ContractError> {
    let token = config
        .telegram
        .bot_token
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();

    if token.is_empty() {
        return Err(ContractError::config_validation(
            "telegram.bot_token",
            "bot token is required (set TG_RELAY_BOT_TOKEN)",
        ));
    }
    if !token.contains(':') {
        return Err(ContractError::config_validation(
            "telegram.bot_token",
            "bot token must look like '<bot id>:<secret>'",
        ));
    }
    Ok(())
}

/// 校验源频道
fn validate_source(config: &RelayConfig) -> Result<(), ContractError> {
    match &config.source.channel_id {
        None => Err(ContractError::config_validation(
            "source.channel_id",
            "source channel is required",
        )),
        Some(id) if !id.is_well_formed() => Err(ContractError::config_validation(
            "source.channel_id",
            format!("invalid chat id '{id}'"),
        )),
        Some(_) => Ok(()),
    }
}

/// 校验目标列表：非空、合法、唯一
fn validate_destinations(config: &RelayConfig) -> Result<(), ContractError> {
    if config.destinations.is_empty() {
        return Err(ContractError::config_validation(
            "destinations",
            "at least one destination is required",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, destination) in config.destinations.iter().enumerate() {
        if !destination.id.is_well_formed() {
            return Err(ContractError::config_validation(
                format!("destinations[{idx}].id"),
                format!("invalid chat id '{}'", destination.id),
            ));
        }
        if !seen.insert(&destination.id) {
            return Err(ContractError::config_validation(
                format!("destinations[id={}]", destination.id),
                "duplicate destination id",
            ));
        }
    }
    Ok(())
}

/// 校验投递策略
fn validate_delivery(config: &RelayConfig) -> Result<(), ContractError> {
    let delivery = &config.delivery;
    delivery
        .validate()
        .map_err(|e| from_validation_errors("delivery", &e))?;

    if delivery.backoff == BackoffStrategy::Exponential
        && delivery.backoff_ms > delivery.max_backoff_ms
    {
        return Err(ContractError::config_validation(
            "delivery.backoff_ms / delivery.max_backoff_ms",
            format!(
                "backoff_ms ({}) must be <= max_backoff_ms ({})",
                delivery.backoff_ms, delivery.max_backoff_ms
            ),
        ));
    }
    Ok(())
}

/// 校验 Bot API 设置
fn validate_telegram(config: &RelayConfig) -> Result<(), ContractError> {
    let telegram = &config.telegram;
    telegram
        .validate()
        .map_err(|e| from_validation_errors("telegram", &e))?;

    if !telegram.api_base.starts_with("http://") && !telegram.api_base.starts_with("https://") {
        return Err(ContractError::config_validation(
            "telegram.api_base",
            format!("api_base must be an http(s) URL, got '{}'", telegram.api_base),
        ));
    }
    if telegram.request_timeout_secs <= telegram.poll_timeout_secs {
        return Err(ContractError::config_validation(
            "telegram.request_timeout_secs",
            format!(
                "request_timeout_secs ({}) must be > poll_timeout_secs ({})",
                telegram.request_timeout_secs, telegram.poll_timeout_secs
            ),
        ));
    }
    Ok(())
}

/// 校验暂存目录
fn validate_staging(config: &RelayConfig) -> Result<(), ContractError> {
    if config.staging.dir.as_os_str().is_empty() {
        return Err(ContractError::config_validation(
            "staging.dir",
            "staging dir cannot be empty",
        ));
    }
    Ok(())
}

/// 将 validator 的字段错误转换为第一个 ConfigValidation
fn from_validation_errors(section: &str, errors: &ValidationErrors) -> ContractError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    match fields.first() {
        Some((field, errs)) => {
            let detail = errs
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("failed '{}' check", e.code),
                })
                .collect::<Vec<_>>()
                .join(", ");
            ContractError::config_validation(format!("{section}.{field}"), detail)
        }
        None => ContractError::config_validation(section, errors.to_string()),
    }
}
