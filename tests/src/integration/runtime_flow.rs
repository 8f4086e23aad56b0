//! # Runtime Flow
//!
//! The full process wiring driven from a configuration file: directory,
//! broker, processor self-test, replier, requestor and batch translation.

#[cfg(test)]
mod tests {
    use std::io::Write;

    use relay_core::domain::{ReplyOutcome, TIMED_OUT_SENTINEL};
    use relay_core::ports::RequestApi;
    use relay_core::service::translate_lines;
    use relay_runtime::{ProcessorMode, RelayConfig, RelayRuntime, RequestorMode};
    use tempfile::NamedTempFile;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const GLOSSARY_CONFIG: &str = r#"
[directory]
"nlp-translation-requests-send" = "relay/requests"
"nlp-translation-requests-receive" = "relay/requests"
ConnectionFactory = "memory://relay-tests"

[requestor]
reply_timeout_ms = 300

[processor]
mode = "glossary"
direction = "en-zh"

[processor.glossary]
"hello" = "你好"
"good morning" = "早上好"
"#;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    // =============================================================================
    // INTEGRATION TESTS
    // =============================================================================

    #[tokio::test]
    async fn test_config_file_drives_glossary_relay() {
        let file = write_config(GLOSSARY_CONFIG);
        let config = RelayConfig::load(file.path()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.processor.mode, ProcessorMode::Glossary);

        let runtime = RelayRuntime::start(&config).await.unwrap();
        assert!(runtime.broker().has_topic("relay/requests"));
        assert_eq!(runtime.broker().endpoint(), "memory://relay-tests");

        let outcome = runtime.requestor().request("good morning").await.unwrap();
        assert_eq!(outcome, ReplyOutcome::Delivered("早上好".into()));

        runtime.shutdown().await;
    }

    /// An unknown phrase makes the replier drop the request; the line still
    /// gets an answer and the following lines are unaffected.
    #[tokio::test]
    async fn test_batch_through_runtime_reports_timeouts_inline() {
        let file = write_config(GLOSSARY_CONFIG);
        let config = RelayConfig::load(file.path()).unwrap();
        let runtime = RelayRuntime::start(&config).await.unwrap();
        let requestor = runtime.requestor();

        let input: &[u8] = "hello\nunknown phrase\n\ngood morning\n".as_bytes();
        let mut output = Vec::new();
        let summary = translate_lines(requestor.as_ref(), input, &mut output)
            .await
            .unwrap();

        let expected = format!(
            "hello\t->\t你好\nunknown phrase\t->\t{TIMED_OUT_SENTINEL}\n\ngood morning\t->\t早上好\n"
        );
        assert_eq!(String::from_utf8(output).unwrap(), expected);
        assert_eq!(summary.requested, 3);
        assert_eq!(summary.delivered, 2);
        assert_eq!(summary.blank, 1);

        runtime.shutdown().await;
    }

    #[test]
    fn test_env_overrides_apply_over_file() {
        let file = write_config(GLOSSARY_CONFIG);
        let mut config = RelayConfig::load(file.path()).unwrap();
        config
            .apply_overrides(|name| match name {
                "RELAY_REPLY_TIMEOUT_MS" => Some("1500".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.requestor.reply_timeout_ms, 1500);
        assert_eq!(config.requestor.mode, RequestorMode::Sequential);
    }

    #[tokio::test]
    async fn test_concurrent_runtime_serves_parallel_lines() {
        let file = write_config(GLOSSARY_CONFIG);
        let mut config = RelayConfig::load(file.path()).unwrap();
        config.requestor.mode = RequestorMode::Concurrent;
        let runtime = RelayRuntime::start(&config).await.unwrap();

        let first = runtime.requestor();
        let second = runtime.requestor();
        let (a, b) = tokio::join!(first.request("hello"), second.request("good morning"));

        assert_eq!(a.unwrap(), ReplyOutcome::Delivered("你好".into()));
        assert_eq!(b.unwrap(), ReplyOutcome::Delivered("早上好".into()));
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_signal_is_shared() {
        let mut config = RelayConfig::default();
        config.processor.mode = ProcessorMode::Echo;
        let runtime = RelayRuntime::start(&config).await.unwrap();
        let signal = runtime.shutdown_signal();
        assert!(!signal.is_triggered());

        runtime.shutdown().await;
        assert!(signal.is_triggered());
    }
}
