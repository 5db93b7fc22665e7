//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置 -> 编排器的装配测试
//! - 模拟 e2e 测试（无需 Telegram）：Mock Bot API -> Ingestion -> Relay -> Mock Bot API
//! - 离线回放 e2e 测试

#[cfg(test)]
mod contract_tests {
    use std::sync::Arc;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::DispatchMode;
    use dispatcher::{LogSender, RelayBuilder};
    use ingestion::LocalFileReader;

    #[test]
    fn test_config_builds_orchestrator() {
        let config = ConfigLoader::load_from_str(
            r#"
[source]
channel_id = -1001

[[destinations]]
id = -1002
label = "mirror"

[[destinations]]
id = "@backup"

[delivery]
max_attempts = 4
backoff = "exponential"
backoff_ms = 100
max_backoff_ms = 1000
mode = "sequential"
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let orchestrator = RelayBuilder::from_config(
            Arc::new(LocalFileReader::new()),
            Arc::new(LogSender::new("log")),
            &config,
        )
        .build()
        .unwrap();

        assert_eq!(orchestrator.mode(), DispatchMode::Sequential);
        let names: Vec<_> = orchestrator
            .destinations()
            .iter()
            .map(|d| d.display_name().to_string())
            .collect();
        assert_eq!(names, vec!["mirror", "@backup"]);
    }

    #[test]
    fn test_markup_matches_wire_conversion() {
        let post: teloxide::types::Message = serde_json::from_value(telegram::channel_post(
            1,
            -1001,
            serde_json::json!({
                "text": "😀 See docs here",
                "entities": [{"type": "text_link", "offset": 7, "length": 4, "url": "https://x.org/a?b=1&c=2"}]
            }),
        ))
        .unwrap();

        let message = telegram::to_message(&post);
        let out = markup::reconstruct(&message.text, &message.annotations).unwrap();
        assert_eq!(
            out,
            "😀 See <a href=\"https://x.org/a?b=1&amp;c=2\">docs</a> here"
        );
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{ChatId, DispatchMode, MessageSource, MessageSender, PayloadReader};
    use dispatcher::{DeliveryOutcome, RelayBuilder, RelayOrchestrator, RelaySummary, RetryPolicy};
    use ingestion::{IngestionPipeline, LocalFileReader, PumpEnd, ReplaySource};
    use serde_json::json;
    use telegram::{channel_post, text_post, BotTransport, MockBotApi, MockConfig};
    use tempfile::TempDir;

    const SOURCE: &str = "-1001";

    fn channel() -> ChatId {
        ChatId::from(SOURCE)
    }

    fn staging_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).map_or(true, |mut entries| entries.next().is_none())
    }

    fn orchestrator<R, S>(
        reader: Arc<R>,
        sender: Arc<S>,
        destinations: &[&str],
        staging: &TempDir,
        mode: DispatchMode,
    ) -> RelayOrchestrator<R, S>
    where
        R: PayloadReader + Send + Sync + 'static,
        S: MessageSender + Send + Sync + 'static,
    {
        RelayBuilder::new(reader, sender)
            .destinations(destinations.iter().map(|d| ChatId::from(*d).into()))
            .policy(RetryPolicy::fixed(3, Duration::from_millis(1)))
            .mode(mode)
            .staging_dir(staging.path())
            .build()
            .unwrap()
    }

    /// Source -> IngestionPipeline -> RelayOrchestrator, until the source ends
    async fn relay_all<Src, R, S>(
        source: Src,
        orchestrator: &RelayOrchestrator<R, S>,
    ) -> Vec<RelaySummary>
    where
        Src: MessageSource + 'static,
        R: PayloadReader + Send + Sync + 'static,
        S: MessageSender + Send + Sync + 'static,
    {
        let mut ingestion = IngestionPipeline::new(16);
        let rx = ingestion.take_receiver().unwrap();
        let pump = ingestion.start(source, &channel()).await.unwrap();

        let mut summaries = Vec::new();
        while let Ok(message) = rx.recv().await {
            summaries.push(orchestrator.handle(message).await);
        }

        assert_eq!(pump.join().await.end, PumpEnd::Exhausted);
        summaries
    }

    /// End-to-end test: Mock Bot API -> UpdatePoller -> Ingestion -> Relay -> Mock Bot API
    ///
    /// 验证完整的数据流：
    /// 1. 只转发源频道的消息
    /// 2. 链接按 UTF-16 偏移重建为 HTML
    /// 3. 媒体只下载一次，发往每个目标后删除
    #[tokio::test]
    async fn test_e2e_bot_api_relay() {
        let api = Arc::new(MockBotApi::new());
        api.push_channel_post(channel_post(
            10,
            -1001,
            json!({
                "text": "🎉 Read the docs",
                "entities": [
                    {"type": "bold", "offset": 0, "length": 2},
                    {"type": "text_link", "offset": 12, "length": 4, "url": "https://docs.rs/tokio"}
                ]
            }),
        ))
        .unwrap();
        api.push_channel_post(text_post(11, -999, "not ours")).unwrap();
        api.push_channel_post(channel_post(
            12,
            -1001,
            json!({
                "caption": "photo by me",
                "caption_entities": [
                    {"type": "text_link", "offset": 9, "length": 2, "url": "https://example.org/me"}
                ],
                "photo": [
                    {"file_id": "small", "file_unique_id": "s", "width": 90, "height": 90, "file_size": 10},
                    {"file_id": "large", "file_unique_id": "l", "width": 800, "height": 800, "file_size": 5000}
                ]
            }),
        ))
        .unwrap();
        api.add_file("large", vec![7u8; 5000]);

        let transport = Arc::new(BotTransport::new(api.clone()));
        let staging = TempDir::new().unwrap();
        let relay = orchestrator(
            transport.clone(),
            transport.clone(),
            &["-2001", "-2002"],
            &staging,
            DispatchMode::Concurrent,
        );

        let poller = transport.poller(0).with_skip_backlog(false);
        let summaries = relay_all(poller, &relay).await;

        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.delivered_count() == 2));

        let sent = api.sent();
        assert_eq!(sent.len(), 4);

        let texts: Vec<_> = sent.iter().filter(|r| r.method == "sendMessage").collect();
        assert_eq!(texts.len(), 2);
        for record in &texts {
            assert_eq!(
                record.text,
                "🎉 Read the <a href=\"https://docs.rs/tokio\">docs</a>"
            );
            assert_eq!(record.parse_mode.as_deref(), Some("Html"));
        }

        let photos: Vec<_> = sent.iter().filter(|r| r.method == "sendPhoto").collect();
        assert_eq!(photos.len(), 2);
        for record in &photos {
            assert_eq!(record.bytes, 5000);
            assert_eq!(record.text, "photo by <a href=\"https://example.org/me\">me</a>");
        }

        let counters = relay.stager_counters();
        assert_eq!(counters.staged(), 1);
        assert_eq!(counters.released(), 1);
        assert_eq!(counters.outstanding(), 0);
        assert!(staging_is_empty(staging.path()));
    }

    /// 单个目标失败不影响其他目标，重试次数符合策略
    #[tokio::test]
    async fn test_e2e_isolation_and_retry() {
        let api = Arc::new(MockBotApi::with_config(MockConfig {
            fail_sends: HashMap::from([("-2002".to_string(), u32::MAX), ("-2003".to_string(), 1)]),
            close_when_drained: true,
            ..Default::default()
        }));
        api.push_channel_post(channel_post(
            20,
            -1001,
            json!({
                "caption": "doc",
                "document": {"file_id": "doc1", "file_unique_id": "d1", "file_name": "report.pdf", "file_size": 4}
            }),
        ))
        .unwrap();
        api.add_file("doc1", b"%PDF".to_vec());

        let transport = Arc::new(BotTransport::new(api.clone()));
        let staging = TempDir::new().unwrap();
        let relay = orchestrator(
            transport.clone(),
            transport.clone(),
            &["-2001", "-2002", "-2003"],
            &staging,
            DispatchMode::Concurrent,
        );

        let summaries = relay_all(transport.poller(0).with_skip_backlog(false), &relay).await;
        assert_eq!(summaries.len(), 1);
        let reports = &summaries[0].reports;

        assert_eq!(reports[0].destination, "-2001");
        assert_eq!(reports[0].outcome, DeliveryOutcome::Delivered { attempts: 1 });
        assert!(matches!(
            reports[1].outcome,
            DeliveryOutcome::Exhausted { attempts: 3, .. }
        ));
        assert_eq!(reports[2].outcome, DeliveryOutcome::Delivered { attempts: 2 });

        assert_eq!(api.attempts("-2001"), 1);
        assert_eq!(api.attempts("-2002"), 3);
        assert_eq!(api.attempts("-2003"), 2);

        let documents: Vec<_> = api
            .sent()
            .into_iter()
            .filter(|r| r.method == "sendDocument")
            .collect();
        assert_eq!(documents.len(), 2);
        assert!(documents
            .iter()
            .all(|r| r.file_name.as_deref() == Some("report.pdf")));

        assert_eq!(relay.stager_counters().released(), 1);
        assert!(staging_is_empty(staging.path()));
    }

    /// 媒体下载失败时消息被丢弃，不尝试任何目标
    #[tokio::test]
    async fn test_e2e_download_failure_sends_nothing() {
        let api = Arc::new(MockBotApi::with_config(MockConfig {
            fail_downloads: vec!["broken".to_string()],
            close_when_drained: true,
            ..Default::default()
        }));
        api.push_channel_post(channel_post(
            30,
            -1001,
            json!({
                "video": {
                    "file_id": "broken", "file_unique_id": "b",
                    "width": 320, "height": 240, "duration": 1, "file_size": 16
                }
            }),
        ))
        .unwrap();
        api.push_channel_post(text_post(31, -1001, "still flowing"))
            .unwrap();
        api.add_file("broken", vec![0u8; 16]);

        let transport = Arc::new(BotTransport::new(api.clone()));
        let staging = TempDir::new().unwrap();
        let relay = orchestrator(
            transport.clone(),
            transport.clone(),
            &["-2001", "-2002"],
            &staging,
            DispatchMode::Concurrent,
        );

        let summaries = relay_all(transport.poller(0).with_skip_backlog(false), &relay).await;

        assert!(summaries[0].is_dropped());
        assert!(summaries[0].reports.is_empty());
        assert!(!summaries[1].is_dropped());

        let sent = api.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|r| r.text == "still flowing"));
        assert_eq!(api.attempts("-2001"), 1);
        assert_eq!(relay.stager_counters().staged(), 0);
        assert!(staging_is_empty(staging.path()));
    }

    /// 顺序模式按配置顺序投递
    #[tokio::test]
    async fn test_e2e_sequential_order() {
        let api = Arc::new(MockBotApi::new());
        api.push_channel_post(text_post(40, -1001, "ordered")).unwrap();

        let transport = Arc::new(BotTransport::new(api.clone()));
        let staging = TempDir::new().unwrap();
        let relay = orchestrator(
            transport.clone(),
            transport.clone(),
            &["-2003", "-2001", "-2002"],
            &staging,
            DispatchMode::Sequential,
        );

        relay_all(transport.poller(0).with_skip_backlog(false), &relay).await;

        let chats: Vec<_> = api.sent().into_iter().map(|r| r.chat).collect();
        assert_eq!(chats, vec!["-2003", "-2001", "-2002"]);
    }

    /// 离线回放：JSONL -> ReplaySource + LocalFileReader -> Mock Bot API
    #[tokio::test]
    async fn test_e2e_replay_with_local_media() {
        let media = TempDir::new().unwrap();
        std::fs::write(media.path().join("cat.jpg"), b"jpeg-bytes").unwrap();

        let replay_path = media.path().join("posts.jsonl");
        let lines = [
            json!({
                "id": 1,
                "chat_id": -1001,
                "text": "See docs here",
                "annotations": [{"offset": 4, "length": 4, "kind": {"type": "link", "target": "https://x"}}]
            }),
            json!({
                "id": 2,
                "chat_id": -1001,
                "text": "a cat",
                "payload": {"file_id": "cat.jpg", "kind": "photo"}
            }),
            json!({
                "id": 3,
                "chat_id": -1001,
                "text": "bad",
                "annotations": [{"offset": 2, "length": 9, "kind": {"type": "link", "target": "https://y"}}]
            }),
        ];
        let content: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        std::fs::write(&replay_path, content.join("\n")).unwrap();

        let api = Arc::new(MockBotApi::new());
        let sender = Arc::new(BotTransport::new(api.clone()));
        let reader = Arc::new(LocalFileReader::with_base_dir(media.path()));
        let staging = TempDir::new().unwrap();
        let relay = orchestrator(reader, sender, &["-2001"], &staging, DispatchMode::Concurrent);

        let summaries = relay_all(ReplaySource::new(&replay_path), &relay).await;

        assert_eq!(summaries.len(), 3);
        assert!(summaries[2].is_dropped());

        let sent = api.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].text, "See <a href=\"https://x\">docs</a> here");
        assert_eq!(sent[1].method, "sendPhoto");
        assert_eq!(sent[1].bytes, b"jpeg-bytes".len() as u64);

        assert!(media.path().join("cat.jpg").exists());
        assert!(staging_is_empty(staging.path()));
    }
}
