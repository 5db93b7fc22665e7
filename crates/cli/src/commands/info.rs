//! `info` command implementation.

use std::sync::Arc;

use anyhow::Context;
use contracts::{ChatId, DeliveryConfig, RelayConfig};
use serde::Serialize;
use telegram::{BotApi, BotTransport, ChatSummary, HttpBotApi};
use tracing::info;

use super::{load_config, load_config_unvalidated};
use crate::cli::InfoArgs;
use crate::error::{CliError, Result};

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    source_channel: Option<String>,
    destinations: Vec<DestinationInfo>,
    delivery: DeliveryConfig,
    telegram: TelegramInfo,
    staging_dir: String,
    escape_text: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    resolved: Vec<ChatInfo>,
}

#[derive(Serialize)]
struct DestinationInfo {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

#[derive(Serialize)]
struct TelegramInfo {
    api_base: String,
    bot_token_set: bool,
    poll_timeout_secs: u64,
    request_timeout_secs: u64,
}

/// One `getChat` lookup
#[derive(Serialize)]
struct ChatInfo {
    role: &'static str,
    requested: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// A chat seen in pending updates
#[derive(Serialize)]
struct DiscoveredChat {
    id: i64,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
}

impl From<ChatSummary> for DiscoveredChat {
    fn from(chat: ChatSummary) -> Self {
        Self {
            id: chat.id,
            kind: chat.kind,
            title: chat.title,
            username: chat.username,
        }
    }
}

/// Execute the `info` command
pub async fn run_info(args: &InfoArgs) -> Result<()> {
    if args.discover {
        let config = load_config_unvalidated(&args.config)?;
        let transport = bot_transport(&config)?;
        info!("Listing chats from pending updates");
        let chats = discover_chats(&transport).await?;
        return print_discovered(&chats, args.json);
    }

    let config = load_config(&args.config)?;

    let resolved = if args.resolve {
        info!("Resolving chats via getChat");
        let transport = bot_transport(&config)?;
        resolve_chats(&transport, &config).await
    } else {
        Vec::new()
    };

    let info = build_config_info(&config, resolved);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn bot_transport(config: &RelayConfig) -> Result<BotTransport<HttpBotApi>> {
    config_loader::validate_credentials(config)
        .map_err(|e| CliError::credentials(e.to_string()))?;
    let client = HttpBotApi::from_config(&config.telegram)
        .map_err(|e| CliError::credentials(e.to_string()))?;
    Ok(BotTransport::new(Arc::new(client)))
}

async fn discover_chats<C: BotApi>(transport: &BotTransport<C>) -> Result<Vec<DiscoveredChat>> {
    let chats = transport.discover_chats().await?;
    Ok(chats.into_iter().map(DiscoveredChat::from).collect())
}

fn print_discovered(chats: &[DiscoveredChat], json: bool) -> Result<()> {
    if json {
        let json =
            serde_json::to_string_pretty(chats).context("Failed to serialize chat list")?;
        println!("{}", json);
        return Ok(());
    }

    if chats.is_empty() {
        println!("No pending updates. Post in the channel or add the bot to it, then retry.");
        return Ok(());
    }
    println!("{:<16} {:<11} {:<24} Username", "Id", "Type", "Title");
    for chat in chats {
        println!(
            "{:<16} {:<11} {:<24} {}",
            chat.id,
            chat.kind,
            chat.title.as_deref().unwrap_or("-"),
            chat.username
                .as_deref()
                .map(|u| format!("@{u}"))
                .unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}

fn chats_to_resolve(config: &RelayConfig) -> Vec<(&'static str, ChatId)> {
    config
        .source
        .channel_id
        .iter()
        .map(|id| ("source", id.clone()))
        .chain(config.destinations.iter().map(|d| ("destination", d.id.clone())))
        .collect()
}

async fn resolve_chats<C: BotApi>(
    transport: &BotTransport<C>,
    config: &RelayConfig,
) -> Vec<ChatInfo> {
    let mut resolved = Vec::new();
    for (role, id) in chats_to_resolve(config) {
        let entry = match transport.resolve_chat(&id).await {
            Ok(chat) => ChatInfo {
                role,
                requested: id.to_string(),
                id: Some(chat.id),
                title: Some(chat.display_name()),
                kind: Some(chat.kind.to_string()),
                error: None,
            },
            Err(e) => ChatInfo {
                role,
                requested: id.to_string(),
                id: None,
                kind: None,
                title: None,
                error: Some(e.to_string()),
            },
        };
        resolved.push(entry);
    }
    resolved
}

fn build_config_info(config: &RelayConfig, resolved: Vec<ChatInfo>) -> ConfigInfo {
    ConfigInfo {
        version: format!("{:?}", config.version),
        source_channel: config.source.channel_id.as_ref().map(ToString::to_string),
        destinations: config
            .destinations
            .iter()
            .map(|d| DestinationInfo {
                id: d.id.to_string(),
                label: d.label.clone(),
            })
            .collect(),
        delivery: config.delivery.clone(),
        telegram: TelegramInfo {
            api_base: config.telegram.api_base.clone(),
            bot_token_set: config.telegram.bot_token.is_some(),
            poll_timeout_secs: config.telegram.poll_timeout_secs,
            request_timeout_secs: config.telegram.request_timeout_secs,
        },
        staging_dir: config.staging.dir.display().to_string(),
        escape_text: config.markup.escape_text,
        resolved,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                   tg-relay Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📡 Source");
    println!("   ├─ Version: {}", info.version);
    println!(
        "   └─ Channel: {}",
        info.source_channel.as_deref().unwrap_or("(not set)")
    );

    println!("\n📤 Destinations ({})", info.destinations.len());
    for (i, destination) in info.destinations.iter().enumerate() {
        let prefix = if i == info.destinations.len() - 1 { "└─" } else { "├─" };
        match &destination.label {
            Some(label) => println!("   {} {} ({})", prefix, destination.id, label),
            None => println!("   {} {}", prefix, destination.id),
        }
    }

    let delivery = &info.delivery;
    println!("\n⚙️  Delivery");
    println!("   ├─ Max attempts: {}", delivery.max_attempts);
    println!(
        "   ├─ Backoff: {:?} {}ms (max {}ms)",
        delivery.backoff, delivery.backoff_ms, delivery.max_backoff_ms
    );
    println!(
        "   └─ Mode: {:?} (max concurrency {})",
        delivery.mode, delivery.max_concurrency
    );

    println!("\n🤖 Bot API");
    println!("   ├─ Base: {}", info.telegram.api_base);
    println!(
        "   ├─ Token: {}",
        if info.telegram.bot_token_set { "set" } else { "missing" }
    );
    println!(
        "   └─ Timeouts: poll {}s, request {}s",
        info.telegram.poll_timeout_secs, info.telegram.request_timeout_secs
    );

    println!("\n📁 Staging: {}", info.staging_dir);
    println!("✏️  Escape text: {}", info.escape_text);

    if !info.resolved.is_empty() {
        println!("\n🔎 Resolved Chats");
        for (i, chat) in info.resolved.iter().enumerate() {
            let prefix = if i == info.resolved.len() - 1 { "└─" } else { "├─" };
            match (&chat.error, &chat.id) {
                (None, Some(id)) => println!(
                    "   {} [{}] {} -> {} ({}, id {})",
                    prefix,
                    chat.role,
                    chat.requested,
                    chat.title.as_deref().unwrap_or("?"),
                    chat.kind.as_deref().unwrap_or("?"),
                    id
                ),
                (error, _) => println!(
                    "   {} [{}] {} -> unresolved: {}",
                    prefix,
                    chat.role,
                    chat.requested,
                    error.as_deref().unwrap_or("unknown")
                ),
            }
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::DestinationConfig;
    use serde_json::json;
    use telegram::{text_post, MockBotApi};

    #[test]
    fn test_resolve_order_source_first() {
        let mut config = RelayConfig::default();
        config.source.channel_id = Some(ChatId::from("-100"));
        config.destinations = vec![DestinationConfig::new("-1"), DestinationConfig::new("@b")];

        let chats = chats_to_resolve(&config);
        let roles: Vec<_> = chats.iter().map(|(role, _)| *role).collect();
        assert_eq!(roles, vec!["source", "destination", "destination"]);
        assert_eq!(chats[2].1, "@b");
    }

    #[test]
    fn test_info_json_hides_token() {
        let mut config = RelayConfig::default();
        config.telegram.bot_token = Some("123:secret".into());
        let json = serde_json::to_string(&build_config_info(&config, Vec::new())).unwrap();
        assert!(json.contains("\"bot_token_set\":true"));
        assert!(!json.contains("secret"));
    }

    #[tokio::test]
    async fn test_discover_keeps_updates_pending() {
        let client = Arc::new(MockBotApi::new());
        client.push_channel_post(text_post(1, -1001, "hello")).unwrap();
        client.push_channel_post(text_post(2, -1001, "again")).unwrap();
        client
            .push_channel_post(json!({
                "message_id": 3,
                "date": 1_700_000_000,
                "chat": {"id": -1002, "type": "channel", "title": "mirror", "username": "mirror"},
                "text": "first post"
            }))
            .unwrap();
        let transport = BotTransport::new(Arc::clone(&client));

        let chats = discover_chats(&transport).await.unwrap();
        let ids: Vec<_> = chats.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![-1001, -1002]);
        assert_eq!(chats[1].username.as_deref(), Some("mirror"));
        assert_eq!(client.pending_updates(), 3);

        let json = serde_json::to_value(&chats).unwrap();
        assert_eq!(json[0]["kind"], "channel");
    }

    #[tokio::test]
    async fn test_resolve_reports_unknown_chats() {
        let client = Arc::new(MockBotApi::new());
        client
            .add_chat(json!({"id": -100, "type": "channel", "title": "source"}))
            .unwrap();
        let transport = BotTransport::new(client);

        let mut config = RelayConfig::default();
        config.source.channel_id = Some(ChatId::from("-100"));
        config.destinations = vec![DestinationConfig::new("-1")];

        let resolved = resolve_chats(&transport, &config).await;
        assert_eq!(resolved[0].title.as_deref(), Some("source"));
        assert_eq!(resolved[0].kind.as_deref(), Some("channel"));
        assert!(resolved[1].id.is_none());
        assert!(resolved[1].error.is_some());
    }
}
