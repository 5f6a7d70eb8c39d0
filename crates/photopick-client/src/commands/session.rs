//! Low-level picker session commands.
//!
//! These expose the session proxy one call at a time, for scripting the
//! picker without the interactive flow.

use chrono::{DateTime, Local, Utc};
use photopick_core::render_gallery;
use photopick_google::{CreatedSession, SessionStatus};
use serde::Serialize;

use crate::cli::gallery_format;
use crate::commands::stored_sessions;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Creates a session and prints where to pick.
pub async fn create(config: &ClientConfig, json: bool) -> ClientResult<()> {
    let created = stored_sessions(config)?.create_session().await?;
    if json {
        println!("{}", to_json(&created)?);
    } else {
        println!("{}", describe_created(&created));
    }
    Ok(())
}

/// Prints whether the user finished picking.
pub async fn status(config: &ClientConfig, session_id: &str, json: bool) -> ClientResult<()> {
    let status = stored_sessions(config)?.poll_session(session_id).await?;
    if json {
        println!("{}", to_json(&status)?);
    } else {
        println!("{}", describe_status(&status));
    }
    Ok(())
}

/// Prints the items picked in a session.
pub async fn items(config: &ClientConfig, session_id: &str, json: bool) -> ClientResult<()> {
    let items = stored_sessions(config)?.list_all_items(session_id).await?;
    println!(
        "{}",
        render_gallery(&items, gallery_format(json, config.display.format))
    );
    Ok(())
}

pub async fn delete(config: &ClientConfig, session_id: &str) -> ClientResult<()> {
    stored_sessions(config)?.delete_session(session_id).await?;
    println!("Deleted session {}", session_id);
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> ClientResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ClientError::Config(format!("failed to serialize output: {}", e)))
}

fn local_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn describe_created(created: &CreatedSession) -> String {
    let mut lines = vec![
        format!("Session:       {}", created.session_id),
        format!("Picker URL:    {}", created.picker_uri),
        format!("Poll interval: {}ms", created.poll_interval_ms),
    ];
    if let Some(timeout_ms) = created.timeout_ms {
        lines.push(format!("Timeout:       {}s", timeout_ms / 1000));
    }
    if let Some(expire_time) = created.expire_time {
        lines.push(format!("Expires:       {}", local_time(expire_time)));
    }
    lines.join("\n")
}

fn describe_status(status: &SessionStatus) -> String {
    let state = if status.media_items_set {
        "selection complete"
    } else {
        "waiting for selection"
    };
    match status.expire_time {
        Some(expire_time) => format!(
            "{}: {} (expires {})",
            status.session_id,
            state,
            local_time(expire_time)
        ),
        None => format!("{}: {}", status.session_id, state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(timeout_ms: Option<u64>) -> CreatedSession {
        CreatedSession {
            session_id: "sess-1".to_string(),
            picker_uri: "https://photos.google.com/picker/abc".to_string(),
            poll_interval_ms: 5000,
            timeout_ms,
            expire_time: None,
        }
    }

    #[test]
    fn created_session_text() {
        let text = describe_created(&created(Some(1_800_000)));
        assert!(text.contains("sess-1"));
        assert!(text.contains("https://photos.google.com/picker/abc"));
        assert!(text.contains("5000ms"));
        assert!(text.contains("1800s"));
        assert!(!text.contains("Expires"));
    }

    #[test]
    fn created_session_without_timeout() {
        assert!(!describe_created(&created(None)).contains("Timeout"));
    }

    #[test]
    fn created_session_json() {
        let json = to_json(&created(None)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["session_id"], "sess-1");
        assert_eq!(value["poll_interval_ms"], 5000);
        assert!(value["timeout_ms"].is_null());
    }

    #[test]
    fn status_text() {
        let pending = SessionStatus {
            session_id: "sess-1".to_string(),
            media_items_set: false,
            expire_time: None,
        };
        assert_eq!(describe_status(&pending), "sess-1: waiting for selection");

        let done = SessionStatus {
            media_items_set: true,
            ..pending
        };
        assert_eq!(describe_status(&done), "sess-1: selection complete");
    }
}
