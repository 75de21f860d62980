use hashbrown::HashSet;
use serde_json::Value;

use crate::feed::{FeedError, RecordId};

/// Splits a `text/event-stream` byte stream into events.
#[derive(Default)]
pub struct EventBuffer {
    buf: Vec<u8>,
    // bytes already searched for a frame end
    scanned: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerEvent {
    pub event: String,
    pub data: String,
}

impl EventBuffer {
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend(chunk.iter().filter(|&&b| b != b'\r'));
    }

    pub fn next_event(&mut self) -> Option<ServerEvent> {
        loop {
            let from = self.scanned.saturating_sub(1);
            let Some(pos) = self.buf[from..].windows(2).position(|w| w == b"\n\n") else {
                self.scanned = self.buf.len();
                return None;
            };
            let frame = self.buf.drain(..from + pos + 2).collect::<Vec<_>>();
            self.scanned = 0;
            let text = String::from_utf8_lossy(&frame);

            let mut event = ServerEvent::default();
            let mut data = Vec::new();
            for line in text.lines() {
                let (field, value) = line.split_once(':').unwrap_or((line, ""));
                let value = value.strip_prefix(' ').unwrap_or(value);
                match field {
                    "event" => event.event = value.to_string(),
                    "data" => data.push(value),
                    _ => {}
                }
            }

            // comment-only frames carry nothing
            if event.event.is_empty() && data.is_empty() {
                continue;
            }

            event.data = data.join("\n");
            return Some(event);
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum FirebaseEvent {
    Put { path: String, data: Value },
    Patch { path: String, data: Value },
    KeepAlive,
    Cancel { reason: String },
    AuthRevoked,
    Unknown { event: String },
}

impl FirebaseEvent {
    pub fn parse(event: ServerEvent) -> Result<Self, FeedError> {
        #[derive(serde::Deserialize)]
        struct Change {
            path: String,
            data: Value,
        }

        let this = match &*event.event {
            "put" => {
                let Change { path, data } = serde_json::from_str(&event.data)?;
                Self::Put { path, data }
            }
            "patch" => {
                let Change { path, data } = serde_json::from_str(&event.data)?;
                Self::Patch { path, data }
            }
            "keep-alive" => Self::KeepAlive,
            "cancel" => Self::Cancel {
                reason: event.data.trim_matches('"').to_string(),
            },
            "auth_revoked" => Self::AuthRevoked,
            _ => Self::Unknown { event: event.event },
        };
        Ok(this)
    }

    /// Children this event adds at the subscribed location, skipping any
    /// already reported. Field-level changes and deletions add nothing. A
    /// patch at an unreported child's path creates that child.
    pub fn children_added(self, seen: &mut HashSet<RecordId>) -> Vec<(RecordId, Value)> {
        let mut added = Vec::new();
        let mut report = |id: String, value: Value| {
            if !value.is_null() && seen.insert(id.clone()) {
                added.push((id, value));
            }
        };

        match self {
            Self::Put { path, data } | Self::Patch { path, data } if path == "/" => {
                if let Value::Object(children) = data {
                    for (id, value) in children {
                        report(id, value);
                    }
                }
            }
            Self::Put { path, data } | Self::Patch { path, data } => {
                if let Some(id) = child_id(&path) {
                    report(id.to_string(), data);
                }
            }
            _ => {}
        }

        added
    }
}

fn child_id(path: &str) -> Option<&str> {
    let id = path.strip_prefix('/')?;
    (!id.is_empty() && !id.contains('/')).then_some(id)
}
