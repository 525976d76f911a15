//! Optional JSON-lines log of every frame crossing the link.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::types::{FrameType, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

/// One line of the wire log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRecord {
    pub ts_ms: u64,
    pub session_id: String,
    pub direction: Direction,
    pub frame_type: String,
    pub len: usize,
}

/// Handle to the background log writer. Cheap to clone.
#[derive(Debug, Clone)]
pub struct WireLog {
    tx: mpsc::UnboundedSender<WireRecord>,
}

impl WireLog {
    /// Spawn the writer task on the current runtime.
    ///
    /// The file is opened lazily by the task; if it cannot be opened or a write
    /// fails, logging stops and records are dropped.
    pub fn spawn(path: PathBuf) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WireRecord>();
        tokio::spawn(async move {
            use tokio::fs::OpenOptions;
            use tokio::io::AsyncWriteExt;

            let mut file = match OpenOptions::new().create(true).append(true).open(&path).await {
                Ok(f) => f,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "wire log disabled");
                    return;
                }
            };

            let mut buf: Vec<u8> = Vec::with_capacity(256);
            while let Some(rec) = rx.recv().await {
                buf.clear();
                if serde_json::to_writer(&mut buf, &rec).is_err() {
                    continue;
                }
                buf.push(b'\n');
                if file.write_all(&buf).await.is_err() {
                    break;
                }
            }

            let _ = file.flush().await;
        });
        Self { tx }
    }

    pub fn record(
        &self,
        session_id: &SessionId,
        direction: Direction,
        frame_type: FrameType,
        len: usize,
    ) {
        let _ = self.tx.send(WireRecord {
            ts_ms: current_timestamp_ms(),
            session_id: session_id.to_string(),
            direction,
            frame_type: frame_type.as_str().to_string(),
            len,
        });
    }
}

/// Get current timestamp in milliseconds
fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_record_serializes_lowercase_direction() {
        let rec = WireRecord {
            ts_ms: 1,
            session_id: "10.0.0.2:4000".to_string(),
            direction: Direction::Out,
            frame_type: "image".to_string(),
            len: 42,
        };
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["direction"], "out");
        assert_eq!(v["frame_type"], "image");
        assert_eq!(v["len"], 42);
    }

    #[tokio::test]
    async fn test_records_are_appended_as_lines() {
        let path = std::env::temp_dir().join(format!(
            "echoesphere-wire-{}-{}.jsonl",
            std::process::id(),
            current_timestamp_ms()
        ));
        let log = WireLog::spawn(path.clone());
        let id = SessionId::from("10.0.0.2:4000");
        log.record(&id, Direction::In, FrameType::Text, 5);
        log.record(&id, Direction::Out, FrameType::Image, 1024);
        drop(log);

        let mut contents = String::new();
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            contents = tokio::fs::read_to_string(&path).await.unwrap_or_default();
            if contents.lines().count() == 2 && contents.ends_with('\n') {
                break;
            }
        }
        let _ = tokio::fs::remove_file(&path).await;

        let records: Vec<WireRecord> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].direction, Direction::In);
        assert_eq!(records[0].frame_type, "text");
        assert_eq!(records[1].len, 1024);
    }
}
