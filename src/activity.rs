use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::limits::{MAX_ACTIVITY_ENTRIES, MAX_ACTIVITY_SNAPSHOT_BYTES};
use crate::model::Ms;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// One audit-trail entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    pub actor_id: Ulid,
    pub action: String,
    pub entity_id: Ulid,
    pub before: Option<String>,
    pub after: Option<String>,
    pub request_id: Option<String>,
    pub severity: Severity,
    pub at: Ms,
}

/// Serialize `value` as JSON, replacing it with a marker object when it
/// exceeds the snapshot cap.
pub fn capped_snapshot<T: Serialize>(value: &T) -> Option<String> {
    let json = serde_json::to_string(value).ok()?;
    if json.len() <= MAX_ACTIVITY_SNAPSHOT_BYTES {
        return Some(json);
    }
    Some(serde_json::json!({ "truncated": true, "bytes": json.len() }).to_string())
}

/// Broadcast hub plus a bounded ring of the most recent entries.
pub struct ActivityHub {
    sender: broadcast::Sender<ActivityEntry>,
    recent: Mutex<VecDeque<ActivityEntry>>,
}

impl Default for ActivityHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityHub {
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(CHANNEL_CAPACITY).0,
            recent: Mutex::new(VecDeque::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEntry> {
        self.sender.subscribe()
    }

    /// Store and broadcast an entry. Broadcasting is a no-op without listeners.
    pub fn record(&self, entry: ActivityEntry) {
        {
            let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
            if recent.len() >= MAX_ACTIVITY_ENTRIES {
                recent.pop_front();
            }
            recent.push_back(entry.clone());
        }
        let _ = self.sender.send(entry);
    }

    /// Most recent entries, oldest first.
    pub fn recent(&self) -> Vec<ActivityEntry> {
        let recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        recent.iter().cloned().collect()
    }
}
