//! # SyncInfo
//!
//! The versioned account-wide encryption configuration. One logical
//! instance per account, cached on every device, reconciled with the
//! shared remote copy by the merge engine on every sync cycle.
//!
//! ## Document Shape
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SYNCINFO DOCUMENT                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  {                                                                      │
//! │    "version": 3,                                                        │
//! │    "e2ee":              { "value": true,  "updatedTime": 1700000000000 }│
//! │    "activeMasterKeyId": { "value": "a1..", "updatedTime": ...        } │
//! │    "masterKeys":        [ MasterKeyEntity, ... ],                      │
//! │    "ppk":               { "value": PPK|null, "updatedTime": ...     } │
//! │    "appMinVersion":     "2.8.0"                                        │
//! │  }                                                                      │
//! │                                                                         │
//! │  Every scalar carries its own updatedTime; a value never changes       │
//! │  without its timestamp advancing (the merge engine may copy both       │
//! │  together from one side).                                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Missing or unparseable documents fall back to defaults — a corrupt
//! config is logged and rebuilt, never fatal. A dangling
//! `activeMasterKeyId` is likewise healed (cleared), never trusted.

use serde::{Deserialize, Serialize};

use crate::crypto::{MasterKeyEntity, PublicPrivateKeyPair};
use crate::error::{Error, Result};
use crate::time::now_timestamp_millis;

/// App version every fresh account accepts.
pub const DEFAULT_APP_MIN_VERSION: &str = "0.0.0";

/// A value paired with the ms-epoch time it last changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampedValue<T> {
    /// The current value.
    pub value: T,
    /// When `value` was last assigned, ms epoch.
    pub updated_time: i64,
}

impl<T> TimestampedValue<T> {
    /// Pair a value with an explicit timestamp.
    pub fn new(value: T, updated_time: i64) -> Self {
        Self {
            value,
            updated_time,
        }
    }

    /// Pair a value with the current time.
    pub fn now(value: T) -> Self {
        Self::new(value, now_timestamp_millis())
    }
}

/// The account's encryption configuration.
///
/// Mutated through setters that stamp the current time, persisted after
/// every mutation, and merged with the remote copy each sync cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncInfo {
    /// Monotonically non-decreasing across merges.
    pub(crate) version: u32,

    /// Whether end-to-end encryption is enabled for the account.
    #[serde(rename = "e2ee")]
    pub(crate) e2ee: TimestampedValue<bool>,

    /// Id of the master key new content is encrypted with; empty when
    /// none. If non-empty it must name an entry of `master_keys` — repair
    /// clears it otherwise.
    pub(crate) active_master_key_id: TimestampedValue<String>,

    /// Every master key the account has seen, unique by id.
    pub(crate) master_keys: Vec<MasterKeyEntity>,

    /// The account's public/private key pair, if one was generated.
    pub(crate) ppk: TimestampedValue<Option<PublicPrivateKeyPair>>,

    /// Minimum app version allowed to sync, as a semantic version.
    pub(crate) app_min_version: String,
}

impl Default for SyncInfo {
    fn default() -> Self {
        Self {
            version: 0,
            e2ee: TimestampedValue::new(false, 0),
            active_master_key_id: TimestampedValue::new(String::new(), 0),
            master_keys: Vec::new(),
            ppk: TimestampedValue::new(None, 0),
            app_min_version: DEFAULT_APP_MIN_VERSION.to_string(),
        }
    }
}

impl SyncInfo {
    /// An empty configuration, as created on first run.
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Getters
    // ------------------------------------------------------------------

    /// Configuration version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Whether end-to-end encryption is enabled.
    pub fn e2ee_enabled(&self) -> bool {
        self.e2ee.value
    }

    /// The active master key id; empty when none is selected.
    pub fn active_master_key_id(&self) -> &str {
        &self.active_master_key_id.value
    }

    /// All master keys.
    pub fn master_keys(&self) -> &[MasterKeyEntity] {
        &self.master_keys
    }

    /// The account key pair, if any.
    pub fn ppk(&self) -> Option<&PublicPrivateKeyPair> {
        self.ppk.value.as_ref()
    }

    /// Minimum app version allowed to sync.
    pub fn app_min_version(&self) -> &str {
        &self.app_min_version
    }

    /// Look up a master key by id.
    pub fn master_key(&self, id: &str) -> Option<&MasterKeyEntity> {
        self.master_keys.iter().find(|k| k.id == id)
    }

    /// The entry named by `active_master_key_id`, when it resolves.
    pub fn active_master_key(&self) -> Option<&MasterKeyEntity> {
        if self.active_master_key_id.value.is_empty() {
            return None;
        }
        self.master_key(&self.active_master_key_id.value)
    }

    /// Master keys still eligible for encrypting new content.
    pub fn enabled_master_keys(&self) -> Vec<&MasterKeyEntity> {
        self.master_keys.iter().filter(|k| k.enabled).collect()
    }

    // ------------------------------------------------------------------
    // Setters — every one stamps the current time
    // ------------------------------------------------------------------

    /// Enable or disable end-to-end encryption.
    pub fn set_e2ee_enabled(&mut self, enabled: bool) {
        self.e2ee = TimestampedValue::now(enabled);
    }

    /// Select the master key new content is encrypted with.
    pub fn set_active_master_key_id(&mut self, id: impl Into<String>) {
        self.active_master_key_id = TimestampedValue::now(id.into());
    }

    /// Set or replace the account key pair.
    pub fn set_ppk(&mut self, ppk: Option<PublicPrivateKeyPair>) {
        self.ppk = TimestampedValue::now(ppk);
    }

    /// Raise the minimum app version allowed to sync.
    pub fn set_app_min_version(&mut self, version: impl Into<String>) {
        self.app_min_version = version.into();
    }

    /// Add a master key, or replace the entry with the same id.
    /// The entry's `updated_time` is stamped with the current time.
    pub fn upsert_master_key(&mut self, mut entity: MasterKeyEntity) {
        entity.updated_time = now_timestamp_millis();
        match self.master_keys.iter_mut().find(|k| k.id == entity.id) {
            Some(existing) => *existing = entity,
            None => self.master_keys.push(entity),
        }
    }

    /// Enable or disable a master key. Returns false when the id is
    /// unknown.
    pub fn set_master_key_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self.master_keys.iter_mut().find(|k| k.id == id) {
            Some(key) => {
                key.enabled = enabled;
                key.updated_time = now_timestamp_millis();
                true
            }
            None => false,
        }
    }

    /// Record that content has been encrypted with a master key. Returns
    /// false when the id is unknown.
    pub fn mark_master_key_used(&mut self, id: &str) -> bool {
        match self.master_keys.iter_mut().find(|k| k.id == id) {
            Some(key) => {
                if !key.has_been_used {
                    key.has_been_used = true;
                    key.updated_time = now_timestamp_millis();
                }
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Repair & equality
    // ------------------------------------------------------------------

    /// Heal invariant violations instead of trusting them.
    ///
    /// Runs after every merge and every load from storage. Currently one
    /// rule: an `activeMasterKeyId` naming no known master key is cleared.
    pub fn repair(&mut self) {
        let active = &self.active_master_key_id.value;
        if !active.is_empty() && self.master_key(active).is_none() {
            tracing::warn!(
                "Active master key '{}' is not in the key list; clearing it",
                active
            );
            self.active_master_key_id = TimestampedValue::now(String::new());
        }
    }

    /// Deep-value equality of the serialized form.
    ///
    /// This is the change-detection equality (has anything worth uploading
    /// changed?), not business logic.
    pub fn structurally_equals(&self, other: &SyncInfo) -> bool {
        match (serde_json::to_value(self), serde_json::to_value(other)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Serialize to the persisted JSON document form.
    pub fn serialize(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a persisted document. Unparseable input is
    /// [`Error::CorruptConfig`]; callers on the load path recover with
    /// [`SyncInfo::load_or_default`] instead.
    pub fn deserialize(raw: &str) -> Result<SyncInfo> {
        serde_json::from_str(raw).map_err(|e| Error::CorruptConfig(e.to_string()))
    }

    /// Parse a persisted document, falling back to defaults (and logging)
    /// when it is corrupt. The result is repaired before it is returned.
    pub fn load_or_default(raw: &str) -> SyncInfo {
        let mut info = match Self::deserialize(raw) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!("Sync configuration is corrupt ({}); using defaults", e);
                SyncInfo::default()
            }
        };
        info.repair();
        info
    }
}

// ============================================================================
// TESTS
// ============================================================================
