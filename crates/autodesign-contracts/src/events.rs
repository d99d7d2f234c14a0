use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::images::ImageId;
use crate::session::{AppMode, AspectRatio};

/// Everything the session log records. Image bytes never appear here, only
/// their size and MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        provider: String,
        generate_model: String,
        refine_model: String,
    },
    ModeChanged {
        mode: AppMode,
    },
    RequestStarted {
        action: &'static str,
        prompt: String,
        aspect_ratio: AspectRatio,
    },
    ImageCreated {
        action: &'static str,
        image_id: ImageId,
        prompt: String,
        mime_type: String,
        bytes: usize,
    },
    ImageUploaded {
        image_id: ImageId,
        path: String,
        mime_type: String,
        bytes: usize,
    },
    ImageSelected {
        image_id: ImageId,
    },
    RequestFailed {
        action: &'static str,
        kind: &'static str,
        message: String,
        detail: String,
    },
}

#[derive(Serialize)]
struct LogLine<'a> {
    session_id: &'a str,
    ts: String,
    #[serde(flatten)]
    event: &'a SessionEvent,
}

/// Appends one JSON object per event to a JSONL file. The file and its
/// parent directory are created on the first append.
#[derive(Debug)]
pub struct EventWriter {
    path: PathBuf,
    session_id: String,
    file: Mutex<Option<File>>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            session_id: session_id.into(),
            file: Mutex::new(None),
        }
    }

    /// Writer tagged with a fresh random session id.
    pub fn for_new_session(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Uuid::new_v4().to_string())
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn append(&self, event: &SessionEvent) -> Result<()> {
        let mut line = serde_json::to_vec(&LogLine {
            session_id: &self.session_id,
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
        })?;
        line.push(b'\n');

        let mut slot = self
            .file
            .lock()
            .map_err(|_| anyhow!("event log lock poisoned"))?;
        if slot.is_none() {
            *slot = Some(self.open()?);
        }
        if let Some(file) = slot.as_mut() {
            file.write_all(&line)
                .with_context(|| format!("failed appending to {}", self.path.display()))?;
        }
        Ok(())
    }

    fn open(&self) -> Result<File> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed opening {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::{json, Value};

    use super::{EventWriter, SessionEvent};
    use crate::images::ImageId;
    use crate::session::{AppMode, AspectRatio};

    fn read_lines(path: &std::path::Path) -> anyhow::Result<Vec<Value>> {
        let content = fs::read_to_string(path)?;
        content
            .lines()
            .map(|line| Ok(serde_json::from_str::<Value>(line)?))
            .collect()
    }

    #[test]
    fn events_carry_envelope_and_tagged_body() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123");

        writer.append(&SessionEvent::ImageCreated {
            action: "generate",
            image_id: ImageId::new("2026-10-16T09:00:00.000Z"),
            prompt: "silver coupe with gull-wing doors".to_string(),
            mime_type: "image/jpeg".to_string(),
            bytes: 2048,
        })?;

        let rows = read_lines(&path)?;
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row["type"], json!("image_created"));
        assert_eq!(row["session_id"], json!("session-123"));
        assert_eq!(row["image_id"], json!("2026-10-16T09:00:00.000Z"));
        assert_eq!(row["bytes"], json!(2048));
        DateTime::parse_from_rfc3339(row["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn mode_and_ratio_use_their_wire_names() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "s");

        writer.append(&SessionEvent::ModeChanged {
            mode: AppMode::Refine,
        })?;
        writer.append(&SessionEvent::RequestStarted {
            action: "generate",
            prompt: "wide body estate".to_string(),
            aspect_ratio: AspectRatio::Portrait,
        })?;

        let rows = read_lines(&path)?;
        assert_eq!(rows[0]["mode"], json!("REFINE"));
        assert_eq!(rows[1]["aspect_ratio"], json!("9:16"));
        Ok(())
    }

    #[test]
    fn creates_parent_dirs_and_appends() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("events.jsonl");
        let writer = EventWriter::for_new_session(&path);
        assert!(!writer.session_id().is_empty());

        writer.append(&SessionEvent::ImageSelected {
            image_id: ImageId::new("a"),
        })?;
        writer.append(&SessionEvent::ImageSelected {
            image_id: ImageId::new("b"),
        })?;

        let ids: Vec<Value> = read_lines(&path)?
            .into_iter()
            .map(|row| row["image_id"].clone())
            .collect();
        assert_eq!(ids, vec![json!("a"), json!("b")]);
        Ok(())
    }
}
