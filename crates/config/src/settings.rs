//! Persisted bot settings: the operational record the commands edit.
//!
//! Stored as a JSON object at `<data_dir>/settings.json`:
//!
//! ```json
//! { "channel_id": 123, "messages": ["hi"], "msg_delay": 5.0,
//!   "loop_delay": 60.0, "role_id": null, "prefix": "!" }
//! ```
//!
//! Every mutation validates first, then changes the in-memory record and
//! writes a copy of it back. The file write happens after the record lock is
//! released, under a separate write lock, so readers never wait on the disk
//! and writes land in mutation order. Persistence failures are logged and
//! never surface to callers; the in-memory copy stays authoritative.

use std::path::{Path, PathBuf};
use std::time::Duration;

use loopcast_core::{ChannelId, RoleId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Longest message the platform accepts, in characters.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// The operational settings record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotSettings {
    /// Broadcast target
    pub channel_id: Option<ChannelId>,

    /// Broadcast payloads, sent in order
    pub messages: Vec<String>,

    /// Seconds between sends within one pass
    pub msg_delay: f64,

    /// Minutes between passes
    pub loop_delay: f64,

    /// Role required to issue commands in a guild
    pub role_id: Option<RoleId>,

    /// Command prefix
    pub prefix: String,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            channel_id: None,
            messages: Vec::new(),
            msg_delay: 5.0,
            loop_delay: 60.0,
            role_id: None,
            prefix: "!".into(),
        }
    }
}

impl BotSettings {
    pub fn msg_delay(&self) -> Duration {
        secs_to_duration(self.msg_delay)
    }

    pub fn loop_delay(&self) -> Duration {
        secs_to_duration(self.loop_delay * 60.0)
    }

    /// Both a target channel and at least one message are configured.
    pub fn is_broadcastable(&self) -> bool {
        self.channel_id.is_some() && !self.messages.is_empty()
    }

    /// Overwrite fields present in `map`; absent and unknown keys are left alone.
    ///
    /// Returns the number of keys applied.
    fn merge(&mut self, map: Map<String, Value>) -> usize {
        let mut applied = 0;
        for (key, value) in map {
            let ok = match key.as_str() {
                "channel_id" => take::<Option<ChannelId>>(&key, value)
                    .map(|v| self.channel_id = v)
                    .is_some(),
                "role_id" => take::<Option<RoleId>>(&key, value)
                    .map(|v| self.role_id = v)
                    .is_some(),
                "messages" => take::<Vec<String>>(&key, value)
                    .map(|v| self.messages = v)
                    .is_some(),
                "msg_delay" => take_delay(&key, value)
                    .map(|v| self.msg_delay = v)
                    .is_some(),
                "loop_delay" => take_delay(&key, value)
                    .map(|v| self.loop_delay = v)
                    .is_some(),
                "prefix" => take::<String>(&key, value)
                    .filter(|p| {
                        let valid = !p.is_empty();
                        if !valid {
                            warn!("Ignoring empty prefix in settings file");
                        }
                        valid
                    })
                    .map(|v| self.prefix = v)
                    .is_some(),
                other => {
                    debug!(key = %other, "Ignoring unknown settings key");
                    false
                }
            };
            if ok {
                applied += 1;
            }
        }
        applied
    }
}

fn take<T: DeserializeOwned>(key: &str, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(key = %key, error = %e, "Ignoring malformed settings value");
            None
        }
    }
}

fn take_delay(key: &str, value: Value) -> Option<f64> {
    take::<f64>(key, value).filter(|v| {
        let valid = is_positive(*v);
        if !valid {
            warn!(key = %key, value = v, "Ignoring non-positive delay in settings file");
        }
        valid
    })
}

fn is_positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Rejections raised before any mutation happens.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("Message exceeds the 2000-character limit")]
    MessageTooLong,

    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("Invalid index. Use 1 to {len}")]
    IndexOutOfRange { len: usize },

    #[error("Delay must be positive")]
    NonPositiveDelay,

    #[error("Prefix cannot be empty")]
    EmptyPrefix,
}

/// Write to a temporary sibling, then rename over the target.
async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

/// Check a broadcast message against the platform limits.
pub fn validate_message(msg: &str) -> Result<(), SettingsError> {
    if msg.chars().count() > MAX_MESSAGE_LEN {
        return Err(SettingsError::MessageTooLong);
    }
    if msg.trim().is_empty() {
        return Err(SettingsError::EmptyMessage);
    }
    Ok(())
}

/// Shared owner of the settings record and its backing file.
pub struct SettingsStore {
    path: PathBuf,
    state: RwLock<BotSettings>,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// A store holding defaults; nothing is read until [`load`](Self::load).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_settings(path, BotSettings::default())
    }

    pub fn with_settings(path: impl Into<PathBuf>, settings: BotSettings) -> Self {
        Self {
            path: path.into(),
            state: RwLock::new(settings),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merge the file into the in-memory record.
    ///
    /// Missing file, unreadable file or malformed JSON keep the current values.
    pub async fn load(&self) {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No settings file found, using defaults");
                return;
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Error loading settings");
                return;
            }
        };

        let map = match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                error!(path = %self.path.display(), "Settings file is not a JSON object");
                return;
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "JSON error in settings");
                return;
            }
        };

        let applied = self.state.write().await.merge(map);
        info!(path = %self.path.display(), keys = applied, "Loaded settings");
    }

    /// Write the full record to disk.
    pub async fn save(&self) {
        let _writing = self.write_lock.lock().await;
        let snapshot = self.state.read().await.clone();
        self.persist(&snapshot).await;
    }

    async fn persist(&self, settings: &BotSettings) {
        let json = match serde_json::to_vec_pretty(settings) {
            Ok(j) => j,
            Err(e) => {
                error!(error = %e, "Failed to serialize settings");
                return;
            }
        };
        match write_atomic(&self.path, &json).await {
            Ok(()) => debug!(path = %self.path.display(), "Saved settings"),
            Err(e) => error!(path = %self.path.display(), error = %e, "Error saving settings"),
        }
    }

    /// Validate and mutate under the record lock, then persist a copy.
    async fn update<T>(
        &self,
        f: impl FnOnce(&mut BotSettings) -> Result<T, SettingsError>,
    ) -> Result<T, SettingsError> {
        let _writing = self.write_lock.lock().await;
        let (out, snapshot) = {
            let mut state = self.state.write().await;
            let out = f(&mut *state)?;
            (out, state.clone())
        };
        self.persist(&snapshot).await;
        Ok(out)
    }

    /// Copy of the current record.
    pub async fn snapshot(&self) -> BotSettings {
        self.state.read().await.clone()
    }

    pub async fn prefix(&self) -> String {
        self.state.read().await.prefix.clone()
    }

    pub async fn role_id(&self) -> Option<RoleId> {
        self.state.read().await.role_id
    }

    pub async fn set_prefix(&self, prefix: &str) -> Result<(), SettingsError> {
        if prefix.is_empty() {
            return Err(SettingsError::EmptyPrefix);
        }
        self.update(|s| {
            s.prefix = prefix.to_string();
            Ok(())
        })
        .await
    }

    pub async fn set_channel(&self, channel: ChannelId) {
        let _ = self
            .update(|s| {
                s.channel_id = Some(channel);
                Ok(())
            })
            .await;
    }

    pub async fn add_message(&self, msg: &str) -> Result<(), SettingsError> {
        validate_message(msg)?;
        self.update(|s| {
            s.messages.push(msg.to_string());
            Ok(())
        })
        .await
    }

    /// Remove by 1-based index, returning the removed message.
    pub async fn remove_message(&self, index: i64) -> Result<String, SettingsError> {
        self.update(|s| {
            let len = s.messages.len();
            match usize::try_from(index) {
                Ok(i) if (1..=len).contains(&i) => Ok(s.messages.remove(i - 1)),
                _ => Err(SettingsError::IndexOutOfRange { len }),
            }
        })
        .await
    }

    /// Remove every message, returning how many were dropped.
    pub async fn clear_messages(&self) -> usize {
        self.update(|s| Ok(std::mem::take(&mut s.messages).len()))
            .await
            .unwrap_or(0)
    }

    pub async fn set_msg_delay(&self, seconds: f64) -> Result<(), SettingsError> {
        if !is_positive(seconds) {
            return Err(SettingsError::NonPositiveDelay);
        }
        self.update(|s| {
            s.msg_delay = seconds;
            Ok(())
        })
        .await
    }

    pub async fn set_loop_delay(&self, minutes: f64) -> Result<(), SettingsError> {
        if !is_positive(minutes) {
            return Err(SettingsError::NonPositiveDelay);
        }
        self.update(|s| {
            s.loop_delay = minutes;
            Ok(())
        })
        .await
    }

    pub async fn set_role(&self, role: RoleId) {
        let _ = self
            .update(|s| {
                s.role_id = Some(role);
                Ok(())
            })
            .await;
    }

    /// Drop the role restriction, returning the role that was set.
    pub async fn clear_role(&self) -> Option<RoleId> {
        self.update(|s| Ok(s.role_id.take())).await.unwrap_or(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> SettingsStore {
        SettingsStore::new(dir.path().join("settings.json"))
    }

    fn on_disk(store: &SettingsStore) -> Value {
        serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap()
    }

    #[test]
    fn defaults() {
        let s = BotSettings::default();
        assert_eq!(s.prefix, "!");
        assert_eq!(s.msg_delay, 5.0);
        assert_eq!(s.loop_delay, 60.0);
        assert_eq!(s.loop_delay(), Duration::from_secs(3600));
        assert!(!s.is_broadcastable());
    }

    #[test]
    fn message_validation() {
        assert!(validate_message("hello").is_ok());
        assert_eq!(validate_message("   "), Err(SettingsError::EmptyMessage));
        assert!(validate_message(&"x".repeat(MAX_MESSAGE_LEN)).is_ok());
        assert_eq!(
            validate_message(&"x".repeat(MAX_MESSAGE_LEN + 1)),
            Err(SettingsError::MessageTooLong)
        );
        // limit counts characters, not bytes
        assert!(validate_message(&"é".repeat(MAX_MESSAGE_LEN)).is_ok());
    }

    #[tokio::test]
    async fn add_message_appends_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.add_message("first").await.unwrap();
        store.add_message("first").await.unwrap();

        assert_eq!(store.snapshot().await.messages, vec!["first", "first"]);
        assert_eq!(on_disk(&store)["messages"], serde_json::json!(["first", "first"]));
    }

    #[tokio::test]
    async fn rejected_message_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.add_message(" ").await, Err(SettingsError::EmptyMessage));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn remove_message_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        for m in ["a", "b", "c"] {
            store.add_message(m).await.unwrap();
        }

        assert_eq!(store.remove_message(2).await.unwrap(), "b");
        assert_eq!(store.snapshot().await.messages, vec!["a", "c"]);

        for bad in [0, 3, -1, i64::MAX] {
            assert_eq!(
                store.remove_message(bad).await,
                Err(SettingsError::IndexOutOfRange { len: 2 })
            );
        }
        assert_eq!(store.snapshot().await.messages, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn delays_must_be_positive_and_finite() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert_eq!(
                store.set_msg_delay(bad).await,
                Err(SettingsError::NonPositiveDelay)
            );
            assert_eq!(
                store.set_loop_delay(bad).await,
                Err(SettingsError::NonPositiveDelay)
            );
        }
        store.set_msg_delay(0.5).await.unwrap();
        store.set_loop_delay(2.5).await.unwrap();
        let s = store.snapshot().await;
        assert_eq!(s.msg_delay(), Duration::from_millis(500));
        assert_eq!(s.loop_delay(), Duration::from_secs(150));
    }

    #[tokio::test]
    async fn role_and_channel() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.clear_role().await, None);

        store.set_role(RoleId(9)).await;
        store.set_channel(ChannelId(4)).await;
        assert_eq!(store.role_id().await, Some(RoleId(9)));
        assert_eq!(on_disk(&store)["channel_id"], serde_json::json!(4));

        assert_eq!(store.clear_role().await, Some(RoleId(9)));
        assert_eq!(on_disk(&store)["role_id"], Value::Null);
    }

    #[tokio::test]
    async fn load_merges_present_keys_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"prefix": "$", "messages": ["x"], "extra": true, "msg_delay": "soon"}"#,
        )
        .unwrap();

        let store = SettingsStore::new(&path);
        store.load().await;
        let s = store.snapshot().await;
        assert_eq!(s.prefix, "$");
        assert_eq!(s.messages, vec!["x"]);
        // malformed value skipped, default kept
        assert_eq!(s.msg_delay, 5.0);
        assert_eq!(s.loop_delay, 60.0);
        assert_eq!(s.channel_id, None);
    }

    #[tokio::test]
    async fn load_ignores_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"prefix": "", "loop_delay": -3}"#).unwrap();

        let store = SettingsStore::new(&path);
        store.load().await;
        assert_eq!(store.snapshot().await, BotSettings::default());
    }

    #[tokio::test]
    async fn malformed_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = SettingsStore::new(&path);
        store.load().await;
        assert_eq!(store.snapshot().await, BotSettings::default());
    }

    #[tokio::test]
    async fn save_then_load_restores_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.set_prefix("?").await.unwrap();
        store.set_channel(ChannelId(77)).await;
        store.add_message("hello").await.unwrap();

        let reopened = SettingsStore::new(store.path());
        reopened.load().await;
        assert_eq!(reopened.snapshot().await, store.snapshot().await);
    }

    #[tokio::test]
    async fn snapshot_is_not_held_up_by_pending_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(store_in(&dir));

        // Hold the write lock as a slow disk would.
        let writing = store.write_lock.lock().await;
        let writer = {
            let store = store.clone();
            tokio::spawn(async move { store.add_message("queued").await })
        };
        tokio::task::yield_now().await;

        let snapshot = tokio::time::timeout(Duration::from_secs(1), store.snapshot())
            .await
            .expect("snapshot blocked behind the write lock");
        assert!(snapshot.messages.is_empty());

        drop(writing);
        writer.await.unwrap().unwrap();
        assert_eq!(on_disk(&store)["messages"], serde_json::json!(["queued"]));
    }

    #[tokio::test]
    async fn unwritable_path_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        // parent "directory" is a regular file, so every write fails
        let store = SettingsStore::new(blocker.join("settings.json"));
        store.add_message("kept in memory").await.unwrap();
        assert_eq!(store.snapshot().await.messages, vec!["kept in memory"]);
    }
}
