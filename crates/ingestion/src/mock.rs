//! Mock 消息源
//!
//! 按脚本依次产出消息或错误，用于无 Telegram 环境的测试。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use contracts::{ChatId, ContractError, Message, MessageSource};
use tracing::debug;

/// 脚本中的一步
#[derive(Debug, Clone)]
enum Step {
    Message(Message),
    Error(String),
}

/// Mock 消息源
pub struct MockMessageSource {
    name: String,
    script: VecDeque<Step>,
    subscriptions: Arc<AtomicU32>,
    channel: Option<ChatId>,
    fail_subscribe: bool,
    hold_open: bool,
}

impl Default for MockMessageSource {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MockMessageSource {
    /// 创建按顺序产出 `messages` 的 Mock 源
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            name: "mock_source".to_string(),
            script: messages.into_iter().map(Step::Message).collect(),
            subscriptions: Arc::new(AtomicU32::new(0)),
            channel: None,
            fail_subscribe: false,
            hold_open: false,
        }
    }

    /// 追加一条消息
    pub fn push_message(&mut self, message: Message) {
        self.script.push_back(Step::Message(message));
    }

    /// 追加一次 `next_message` 错误
    pub fn push_error(&mut self, message: impl Into<String>) {
        self.script.push_back(Step::Error(message.into()));
    }

    /// 订阅时返回错误
    pub fn failing_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    /// 脚本耗尽后保持挂起而不是结束
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// 订阅次数计数器（源被移走后仍可读取）
    pub fn subscription_counter(&self) -> Arc<AtomicU32> {
        self.subscriptions.clone()
    }

    /// 当前订阅次数
    pub fn subscriptions(&self) -> u32 {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

impl MessageSource for MockMessageSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn subscribe(&mut self, channel: &ChatId) -> Result<(), ContractError> {
        if self.fail_subscribe {
            return Err(ContractError::source(&self.name, "subscription refused"));
        }
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        self.channel = Some(channel.clone());
        debug!(channel = %channel, "mock source subscribed");
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<Message>, ContractError> {
        if self.channel.is_none() {
            return Err(ContractError::source(&self.name, "not subscribed"));
        }

        match self.script.pop_front() {
            Some(Step::Message(message)) => Ok(Some(message)),
            Some(Step::Error(message)) => Err(ContractError::source(&self.name, message)),
            None if self.hold_open => std::future::pending().await,
            None => Ok(None),
        }
    }
}
