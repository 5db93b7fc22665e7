//! Command-line / environment overrides applied on top of the config file

use contracts::{ChatId, ContractError, DestinationConfig, RelayConfig};

/// Values that replace their config-file counterparts when present
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub source_channel: Option<ChatId>,
    /// Replaces the whole destination list
    pub destinations: Option<Vec<ChatId>>,
    pub bot_token: Option<String>,
    pub api_base: Option<String>,
}

impl ConfigOverrides {
    /// Whether any override is set
    pub fn is_empty(&self) -> bool {
        self.source_channel.is_none()
            && self.destinations.is_none()
            && self.bot_token.is_none()
            && self.api_base.is_none()
    }

    /// Apply to `config` in place
    pub fn apply(&self, config: &mut RelayConfig) {
        if let Some(channel) = &self.source_channel {
            config.source.channel_id = Some(channel.clone());
        }
        if let Some(destinations) = &self.destinations {
            config.destinations = destinations
                .iter()
                .cloned()
                .map(DestinationConfig::new)
                .collect();
        }
        if let Some(token) = &self.bot_token {
            config.telegram.bot_token = Some(token.clone());
        }
        if let Some(api_base) = &self.api_base {
            config.telegram.api_base = api_base.trim_end_matches('/').to_string();
        }
    }
}

/// Parse a comma-separated destination list (`-100123,@mirror`)
///
/// # Errors
/// An empty list or any malformed entry
pub fn parse_destination_list(value: &str) -> Result<Vec<ChatId>, ContractError> {
    let ids: Vec<ChatId> = value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(ChatId::from)
        .collect();

    if ids.is_empty() {
        return Err(ContractError::config_validation(
            "destinations",
            format!("no destination ids in '{value}'"),
        ));
    }
    if let Some(bad) = ids.iter().find(|id| !id.is_well_formed()) {
        return Err(ContractError::config_validation(
            "destinations",
            format!("invalid chat id '{bad}'"),
        ));
    }
    Ok(ids)
}
