//! In-crate fakes for the collaborator traits

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use contracts::{
    Attachment, ChatId, ContractError, FormatMode, MessageSender, PayloadReader, PayloadRef,
};

/// Writes a small file per fetch
#[derive(Default)]
pub struct FakeReader {
    fetches: AtomicU32,
    fail: bool,
}

impl FakeReader {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl PayloadReader for FakeReader {
    fn name(&self) -> &str {
        "fake_reader"
    }

    async fn fetch(
        &self,
        payload: &PayloadRef,
        dir: &Path,
        stem: &str,
    ) -> Result<PathBuf, ContractError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ContractError::payload_fetch(&payload.file_id, "boom"));
        }
        let path = dir.join(format!("{stem}.bin"));
        tokio::fs::write(&path, b"payload").await?;
        Ok(path)
    }
}

/// One observed send call
#[derive(Debug, Clone)]
pub struct SendRecord {
    pub destination: String,
    pub text: String,
    pub attachment: Option<PathBuf>,
    pub file_present: bool,
}

/// Sender with scripted per-destination failures
#[derive(Default)]
pub struct FakeSender {
    /// destination -> failures before the first success (`u32::MAX` = never succeeds)
    failures: HashMap<String, u32>,
    panics: Vec<String>,
    attempts: Mutex<HashMap<String, u32>>,
    records: Mutex<Vec<SendRecord>>,
}

impl FakeSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, destination: &str, times: u32) -> Self {
        self.failures.insert(destination.to_string(), times);
        self
    }

    pub fn always_failing(self, destination: &str) -> Self {
        self.failing(destination, u32::MAX)
    }

    pub fn panicking(mut self, destination: &str) -> Self {
        self.panics.push(destination.to_string());
        self
    }

    pub fn attempts(&self, destination: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(destination)
            .copied()
            .unwrap_or(0)
    }

    pub fn records(&self) -> Vec<SendRecord> {
        self.records.lock().unwrap().clone()
    }

    fn attempt(
        &self,
        destination: &ChatId,
        text: &str,
        attachment: Option<&Attachment>,
    ) -> Result<(), ContractError> {
        if self.panics.iter().any(|d| d == destination.as_str()) {
            panic!("sender panicked for {destination}");
        }

        let n = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(destination.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        self.records.lock().unwrap().push(SendRecord {
            destination: destination.to_string(),
            text: text.to_string(),
            attachment: attachment.map(|a| a.path.clone()),
            file_present: attachment.is_some_and(|a| a.path.exists()),
        });

        let failures = self
            .failures
            .get(destination.as_str())
            .copied()
            .unwrap_or(0);
        if n <= failures {
            Err(ContractError::send_failed(destination.as_str(), "flaky"))
        } else {
            Ok(())
        }
    }
}

impl MessageSender for FakeSender {
    fn name(&self) -> &str {
        "fake_sender"
    }

    async fn send_text(
        &self,
        destination: &ChatId,
        text: &str,
        _format: FormatMode,
    ) -> Result<(), ContractError> {
        tokio::task::yield_now().await;
        self.attempt(destination, text, None)
    }

    async fn send_file(
        &self,
        destination: &ChatId,
        attachment: &Attachment,
        caption: &str,
        _format: FormatMode,
    ) -> Result<(), ContractError> {
        tokio::task::yield_now().await;
        self.attempt(destination, caption, Some(attachment))
    }
}
