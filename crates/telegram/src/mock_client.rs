//! Mock Bot API 客户端
//!
//! 用于单元测试和离线运行的 mock 实现，支持注入失败场景并记录所有发送。
//! 更新和 chat 以 Bot API JSON 注入，经 teloxide 反序列化，与真实响应走同一条路径。

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use serde_json::{json, Value};
use teloxide::types::{Chat, ParseMode, Update};
use tracing::instrument;

use contracts::{ChatId, MediaKind};

use crate::client::{send_method, BotApi, Upload};
use crate::convert::chat_matches;
use crate::error::{Result, TelegramError};

/// Mock 客户端配置
#[derive(Debug, Default, Clone)]
pub struct MockConfig {
    /// 目标 -> 前 N 次发送失败（u32::MAX = 总是失败）
    pub fail_sends: HashMap<String, u32>,
    /// 下载中途失败的 file_id（先写入一半内容再报错）
    pub fail_downloads: Vec<String>,
    /// 更新耗尽后是否返回 Closed（否则返回空批次）
    pub close_when_drained: bool,
    /// 前 N 次 getUpdates 返回限流错误
    pub rate_limited_polls: u32,
    /// 限流错误携带的等待时间
    pub retry_after: Duration,
}

/// 一次发送记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    /// 目标
    pub chat: String,
    /// Bot API 方法名
    pub method: &'static str,
    /// 文本或 caption
    pub text: String,
    /// parse_mode（teloxide 名称，如 `Html`）
    pub parse_mode: Option<String>,
    /// 上传的文件名
    pub file_name: Option<String>,
    /// 上传的字节数
    pub bytes: u64,
}

#[derive(Default)]
struct UpdateQueue {
    last_id: u32,
    pending: Vec<Update>,
}

/// Mock Bot API 客户端
pub struct MockBotApi {
    /// 配置（可注入失败场景）
    config: MockConfig,
    /// 未确认的更新
    updates: Mutex<UpdateQueue>,
    /// 已发生的 getUpdates 次数
    polls: AtomicU32,
    /// 可下载的文件 (file_id -> 内容)
    files: Mutex<HashMap<String, Bytes>>,
    /// getChat 结果
    chats: Mutex<Vec<Chat>>,
    /// 每个目标的发送尝试次数
    attempts: Mutex<HashMap<String, u32>>,
    /// 成功的发送记录
    sent: Mutex<Vec<SentRecord>>,
}

impl MockBotApi {
    /// 创建默认 mock 客户端
    pub fn new() -> Self {
        Self::with_config(MockConfig {
            close_when_drained: true,
            ..Default::default()
        })
    }

    /// 使用配置创建 mock 客户端
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            updates: Mutex::new(UpdateQueue::default()),
            polls: AtomicU32::new(0),
            files: Mutex::new(HashMap::new()),
            chats: Mutex::new(Vec::new()),
            attempts: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// 追加一条更新，`update` 为不含 `update_id` 的 Bot API JSON（id 自动递增）
    pub fn push_update(&self, mut update: Value) -> serde_json::Result<()> {
        let mut queue = self.updates.lock().unwrap();
        let update_id = queue.last_id + 1;
        update["update_id"] = json!(update_id);
        // teloxide's UpdateKind deserializer needs borrowed keys, which `from_value` can't supply
        let update: Update = serde_json::from_str(&update.to_string())?;
        queue.last_id = update_id;
        queue.pending.push(update);
        Ok(())
    }

    /// 追加一条频道消息
    pub fn push_channel_post(&self, post: Value) -> serde_json::Result<()> {
        self.push_update(json!({ "channel_post": post }))
    }

    /// 尚未确认的更新数
    pub fn pending_updates(&self) -> usize {
        self.updates.lock().unwrap().pending.len()
    }

    /// getUpdates 调用次数
    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::Relaxed)
    }

    /// 注册可下载文件
    pub fn add_file(&self, file_id: impl Into<String>, content: impl Into<Bytes>) {
        self.files
            .lock()
            .unwrap()
            .insert(file_id.into(), content.into());
    }

    /// 注册 getChat 结果（Bot API chat JSON）
    pub fn add_chat(&self, chat: Value) -> serde_json::Result<()> {
        let chat: Chat = serde_json::from_value(chat)?;
        self.chats.lock().unwrap().push(chat);
        Ok(())
    }

    /// 成功的发送记录
    pub fn sent(&self) -> Vec<SentRecord> {
        self.sent.lock().unwrap().clone()
    }

    /// 某目标的发送尝试次数（含失败）
    pub fn attempts(&self, chat: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(chat)
            .copied()
            .unwrap_or(0)
    }

    /// 记录一次尝试，返回是否应该失败
    fn should_fail_send(&self, chat: &ChatId) -> bool {
        let mut attempts = self.attempts.lock().unwrap();
        let n = attempts.entry(chat.to_string()).or_insert(0);
        *n += 1;
        let failures = self
            .config
            .fail_sends
            .get(chat.as_str())
            .copied()
            .unwrap_or(0);
        *n <= failures
    }

    fn record(&self, record: SentRecord) {
        self.sent.lock().unwrap().push(record);
    }
}

impl Default for MockBotApi {
    fn default() -> Self {
        Self::new()
    }
}

/// 频道消息 JSON：`fields` 合并进带 `message_id`、`date`、`chat` 的基础消息
pub fn channel_post(message_id: i32, chat_id: i64, fields: Value) -> Value {
    let mut post = json!({
        "message_id": message_id,
        "date": 1_700_000_000,
        "chat": { "id": chat_id, "type": "channel", "title": format!("channel {chat_id}") },
    });
    if let (Some(post), Value::Object(fields)) = (post.as_object_mut(), fields) {
        post.extend(fields);
    }
    post
}

/// 纯文本频道消息 JSON
pub fn text_post(message_id: i32, chat_id: i64, text: &str) -> Value {
    channel_post(message_id, chat_id, json!({ "text": text }))
}

impl BotApi for MockBotApi {
    #[instrument(name = "mock_bot_get_updates", skip(self))]
    async fn get_updates(&self, offset: Option<i32>, timeout_secs: u32) -> Result<Vec<Update>> {
        let _ = timeout_secs;
        let poll = self.polls.fetch_add(1, Ordering::Relaxed);
        if poll < self.config.rate_limited_polls {
            return Err(TelegramError::RetryAfter(self.config.retry_after));
        }

        let batch = {
            let mut queue = self.updates.lock().unwrap();
            match offset {
                // -N 只保留最新的 N 条
                Some(offset) if offset < 0 => {
                    let keep = offset.unsigned_abs() as usize;
                    let excess = queue.pending.len().saturating_sub(keep);
                    queue.pending.drain(..excess);
                }
                Some(offset) => queue.pending.retain(|u| u.id.as_offset() > offset),
                None => {}
            }
            queue.pending.clone()
        };

        if batch.is_empty() {
            if self.config.close_when_drained {
                return Err(TelegramError::Closed);
            }
            tokio::task::yield_now().await;
        }
        Ok(batch)
    }

    #[instrument(name = "mock_bot_get_file", skip(self))]
    async fn get_file_path(&self, file_id: &str) -> Result<String> {
        let known = self.files.lock().unwrap().contains_key(file_id);
        if !known {
            return Err(TelegramError::rejected("getFile", "Bad Request: invalid file_id"));
        }
        Ok(format!("documents/{file_id}.bin"))
    }

    #[instrument(name = "mock_bot_download_file", skip(self, destination))]
    async fn download_file(&self, file_path: &str, destination: &Path) -> Result<u64> {
        let file_id = file_path
            .trim_start_matches("documents/")
            .trim_end_matches(".bin");
        let content = self
            .files
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| TelegramError::rejected("download", "Not Found"))?;

        if self.config.fail_downloads.iter().any(|f| f == file_id) {
            tokio::fs::write(destination, &content[..content.len() / 2]).await?;
            return Err(TelegramError::rejected("download", "connection reset"));
        }
        tokio::fs::write(destination, &content).await?;
        Ok(content.len() as u64)
    }

    #[instrument(name = "mock_bot_send_message", skip(self, text), fields(chat = %chat))]
    async fn send_message(
        &self,
        chat: &ChatId,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<()> {
        if self.should_fail_send(chat) {
            return Err(TelegramError::rejected("sendMessage", "Bad Gateway"));
        }
        self.record(SentRecord {
            chat: chat.to_string(),
            method: "sendMessage",
            text: text.to_string(),
            parse_mode: parse_mode.map(|mode| format!("{mode:?}")),
            file_name: None,
            bytes: 0,
        });
        Ok(())
    }

    #[instrument(
        name = "mock_bot_send_media",
        skip(self, upload, caption),
        fields(chat = %chat, kind = kind.as_str())
    )]
    async fn send_media(
        &self,
        chat: &ChatId,
        kind: MediaKind,
        upload: Upload,
        caption: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<()> {
        let method = send_method(kind);
        if self.should_fail_send(chat) {
            return Err(TelegramError::rejected(method, "Bad Gateway"));
        }
        let bytes = tokio::fs::metadata(&upload.path).await?.len();
        self.record(SentRecord {
            chat: chat.to_string(),
            method,
            text: caption.to_string(),
            parse_mode: parse_mode.map(|mode| format!("{mode:?}")),
            file_name: Some(upload.file_name),
            bytes,
        });
        Ok(())
    }

    #[instrument(name = "mock_bot_get_chat", skip(self), fields(chat = %chat))]
    async fn get_chat(&self, chat: &ChatId) -> Result<Chat> {
        self.chats
            .lock()
            .unwrap()
            .iter()
            .find(|c| chat_matches(c, chat))
            .cloned()
            .ok_or_else(|| TelegramError::rejected("getChat", "Bad Request: chat not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offset_confirms_earlier_updates() {
        let mock = MockBotApi::new();
        for id in 1..=3 {
            mock.push_channel_post(text_post(id, -1001, "post")).unwrap();
        }

        let all = mock.get_updates(None, 0).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(mock.pending_updates(), 3);

        let rest = mock.get_updates(Some(all[0].id.as_offset()), 0).await.unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(mock.pending_updates(), 2);

        let newest = mock.get_updates(Some(-1), 0).await.unwrap();
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].id, all[2].id);
    }

    #[tokio::test]
    async fn test_drained_queue_closes() {
        let mock = MockBotApi::new();
        assert!(matches!(
            mock.get_updates(None, 0).await,
            Err(TelegramError::Closed)
        ));

        let open = MockBotApi::with_config(MockConfig::default());
        assert!(open.get_updates(None, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limited_polls() {
        let mock = MockBotApi::with_config(MockConfig {
            rate_limited_polls: 1,
            retry_after: Duration::from_secs(2),
            ..Default::default()
        });
        let err = mock.get_updates(None, 0).await.unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert!(mock.get_updates(None, 0).await.unwrap().is_empty());
        assert_eq!(mock.polls(), 2);
    }

    #[tokio::test]
    async fn test_get_chat_by_username() {
        let mock = MockBotApi::new();
        mock.add_chat(json!({"id": -1001, "type": "channel", "title": "news", "username": "news"}))
            .unwrap();
        let chat = mock.get_chat(&ChatId::from("@news")).await.unwrap();
        assert_eq!(chat.id.0, -1001);
        assert!(mock.get_chat(&ChatId::from("-9")).await.is_err());
    }
}
