//! Logging service
//!
//! Everything goes to stderr: stdout belongs to the MCP protocol.

use crate::models::LogLevel;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Filter directive for the configured level, covering the library and the binary.
pub fn filter_for(level: LogLevel) -> String {
    let level = level.as_str();
    format!("hitl_core={},hitl={}", level, level)
}

/// Initialize logging with the specified level. `RUST_LOG`, when set, wins.
pub fn init_logging(level: LogLevel) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_for(level)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()?;

    Ok(())
}

/// One step in a request's life (tool called, request resolved). `request_id` is None before
/// the bridge has accepted the prompt.
pub fn log_interaction(
    event: &str,
    request_id: Option<Uuid>,
    channel: Option<&str>,
    detail: Option<&str>,
) {
    tracing::info!(
        event,
        request_id = %request_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
        channel = channel.unwrap_or("none"),
        detail = detail.unwrap_or(""),
        "Interaction"
    );
}

/// Inbound message that was not accepted as a reply. Logged at warn so it survives `info`.
pub fn log_security_event(event: &str, service: &str, sender: &str, sequence: i64) {
    tracing::warn!(event, service, sender, sequence, "Security event");
}

/// Failure with no caller left to report it to
pub fn log_error(context: &str, error: &dyn std::fmt::Display) {
    tracing::error!(context, error = %error, "Internal error");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Once;

    static INIT: Once = Once::new();

    fn init_test_logging() {
        INIT.call_once(|| {
            let _ = init_logging(LogLevel::Info);
        });
    }

    #[test]
    fn test_filter_for_level() {
        assert_eq!(filter_for(LogLevel::Debug), "hitl_core=debug,hitl=debug");
        assert_eq!(filter_for(LogLevel::Error), "hitl_core=error,hitl=error");
    }

    #[test]
    fn test_second_init_is_an_error_not_a_panic() {
        init_test_logging();
        assert!(init_logging(LogLevel::Info).is_err());
    }

    #[test]
    fn test_log_functions() {
        init_test_logging();

        // These should not panic
        log_interaction("tool_called", None, None, Some("get_user_input"));
        log_interaction(
            "request_resolved",
            Some(Uuid::new_v4()),
            Some("telegram"),
            Some("fulfilled"),
        );
        log_security_event("unauthorized_sender", "telegram", "99", 12);
        log_error("tools/call 7", &"task panicked");
    }
}
