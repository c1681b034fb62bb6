//! # SyncInfo Merge Engine
//!
//! Deterministic, lock-free reconciliation of the local configuration with
//! the remote copy. There is no distributed lock and no optimistic-
//! concurrency token anywhere in sync: conflicts between devices are
//! resolved entirely by this merge.
//!
//! ## Rules
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          MERGE RULES                                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  version          max(local, remote)                                   │
//! │                                                                         │
//! │  e2ee, ppk        strictly newer updatedTime wins;                     │
//! │                   tie → REMOTE                                         │
//! │                                                                         │
//! │  appMinVersion    semver compare; local >= remote keeps LOCAL          │
//! │                   (a device's own upgrade floor is never silently      │
//! │                   downgraded)                                          │
//! │                                                                         │
//! │  masterKeys       union by id; same id → greater updated_time wins     │
//! │                                                                         │
//! │  activeMasterKeyId  dedicated heuristic, see below                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The remote-on-tie / local-on-tie asymmetry between the scalar rule and
//! `appMinVersion` is load-bearing for existing deployments. Both biases
//! are pinned by regression tests here; do not make them symmetric.
//!
//! ## Active-Key Heuristic
//!
//! Two devices can independently decide encryption needs enabling and each
//! generate a master key. Plain last-write-wins would let the later,
//! redundant key clobber the one already protecting content. So when both
//! sides' active keys resolve:
//!
//! 1. exactly one is enabled → that side wins;
//! 2. else exactly one has been used → that side wins;
//! 3. else fall back to the scalar timestamp rule (tie → remote).

use semver::Version;

use crate::crypto::MasterKeyEntity;
use crate::sync::info::{SyncInfo, TimestampedValue};

/// Merge the local configuration with the remote one.
///
/// Pure and deterministic; the result becomes the new local value and the
/// uploaded value. Each field is taken atomically from one side. The
/// merged record is repaired before it is returned.
pub fn merge_sync_infos(local: &SyncInfo, remote: &SyncInfo) -> SyncInfo {
    let mut merged = SyncInfo::new();

    merged.version = local.version.max(remote.version);
    merged.e2ee = pick_newer(&local.e2ee, &remote.e2ee);
    merged.ppk = pick_newer(&local.ppk, &remote.ppk);
    merged.app_min_version =
        merge_app_min_version(&local.app_min_version, &remote.app_min_version);
    merged.master_keys = merge_master_keys(&local.master_keys, &remote.master_keys);
    merged.active_master_key_id = merge_active_master_keys(local, remote);

    merged.repair();
    tracing::debug!(
        "Merged sync info: version {}, {} master keys, active key '{}'",
        merged.version(),
        merged.master_keys().len(),
        merged.active_master_key_id()
    );
    merged
}

/// Generic scalar rule: strictly greater timestamp wins, remote on ties.
fn pick_newer<T: Clone>(
    local: &TimestampedValue<T>,
    remote: &TimestampedValue<T>,
) -> TimestampedValue<T> {
    if local.updated_time > remote.updated_time {
        local.clone()
    } else {
        remote.clone()
    }
}

/// Semver comparison with the opposite bias: local wins ties, so a
/// device's own upgrade requirement survives the merge.
fn merge_app_min_version(local: &str, remote: &str) -> String {
    if lenient_version(local) >= lenient_version(remote) {
        local.to_string()
    } else {
        remote.to_string()
    }
}

/// The merge must stay total: a version string that fails to parse
/// compares as 0.0.0 instead of failing the whole sync cycle. The sync
/// gate (`check_if_can_sync`) is where unparseable versions get reported.
fn lenient_version(raw: &str) -> Version {
    Version::parse(raw).unwrap_or_else(|_| Version::new(0, 0, 0))
}

/// Union by id; for ids present on both sides the entry with the greater
/// `updated_time` survives (remote on ties, consistent with the scalar
/// rule).
fn merge_master_keys(local: &[MasterKeyEntity], remote: &[MasterKeyEntity]) -> Vec<MasterKeyEntity> {
    let mut merged = local.to_vec();

    for remote_key in remote {
        match merged.iter_mut().find(|k| k.id == remote_key.id) {
            None => merged.push(remote_key.clone()),
            Some(local_key) => {
                if remote_key.updated_time >= local_key.updated_time {
                    *local_key = remote_key.clone();
                }
            }
        }
    }

    merged
}

/// Resolve the active master key id.
///
/// When both sides' active ids resolve to actual keys, prefer the side
/// whose key is enabled, then the side whose key has been used — an
/// unused key was most likely created redundantly by a second device
/// enabling encryption that was already enabled elsewhere. Otherwise the
/// generic scalar rule decides.
fn merge_active_master_keys(local: &SyncInfo, remote: &SyncInfo) -> TimestampedValue<String> {
    if let (Some(local_key), Some(remote_key)) =
        (local.active_master_key(), remote.active_master_key())
    {
        if local_key.enabled != remote_key.enabled {
            return if local_key.enabled {
                local.active_master_key_id.clone()
            } else {
                remote.active_master_key_id.clone()
            };
        }

        if local_key.has_been_used != remote_key.has_been_used {
            return if local_key.has_been_used {
                local.active_master_key_id.clone()
            } else {
                remote.active_master_key_id.clone()
            };
        }
    }

    pick_newer(&local.active_master_key_id, &remote.active_master_key_id)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::EncryptionMethod;

    fn master_key(id: &str, enabled: bool, has_been_used: bool, updated_time: i64) -> MasterKeyEntity {
        MasterKeyEntity {
            id: id.to_string(),
            content: format!("sealed-{}", id),
            checksum: "00".to_string(),
            encryption_method: EncryptionMethod::PasswordV1,
            enabled,
            has_been_used,
            created_time: updated_time,
            updated_time,
        }
    }

    fn info_with_active(keys: Vec<MasterKeyEntity>, active: &str, active_time: i64) -> SyncInfo {
        let mut info = SyncInfo::new();
        info.master_keys = keys;
        info.active_master_key_id = TimestampedValue::new(active.to_string(), active_time);
        info
    }

    #[test]
    fn test_version_is_max_of_both_sides() {
        let mut local = SyncInfo::new();
        let mut remote = SyncInfo::new();
        local.version = 3;
        remote.version = 5;

        assert_eq!(merge_sync_infos(&local, &remote).version(), 5);
        assert_eq!(merge_sync_infos(&remote, &local).version(), 5);
    }

    #[test]
    fn test_newer_scalar_wins() {
        let mut local = SyncInfo::new();
        let mut remote = SyncInfo::new();
        local.e2ee = TimestampedValue::new(true, 200);
        remote.e2ee = TimestampedValue::new(false, 100);

        let merged = merge_sync_infos(&local, &remote);
        assert!(merged.e2ee_enabled());
        assert_eq!(merged.e2ee.updated_time, 200);
    }

    // Regression: remote wins scalar ties. This asymmetry (vs the
    // appMinVersion rule below) is intentional; keep it exactly.
    #[test]
    fn test_remote_wins_scalar_tie() {
        let mut local = SyncInfo::new();
        let mut remote = SyncInfo::new();
        local.e2ee = TimestampedValue::new(true, 100);
        remote.e2ee = TimestampedValue::new(false, 100);

        let merged = merge_sync_infos(&local, &remote);
        assert_eq!(merged.e2ee, remote.e2ee);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut info = SyncInfo::new();
        info.version = 2;
        info.e2ee = TimestampedValue::new(true, 50);
        info.master_keys = vec![master_key("k1", true, true, 40)];
        info.active_master_key_id = TimestampedValue::new("k1".to_string(), 45);
        info.app_min_version = "1.2.3".to_string();

        let merged = merge_sync_infos(&info, &info);
        assert!(merged.structurally_equals(&info));
    }

    #[test]
    fn test_app_min_version_takes_greater() {
        let mut local = SyncInfo::new();
        let mut remote = SyncInfo::new();
        local.app_min_version = "2.10.0".to_string();
        remote.app_min_version = "2.9.5".to_string();

        assert_eq!(merge_sync_infos(&local, &remote).app_min_version(), "2.10.0");
        assert_eq!(merge_sync_infos(&remote, &local).app_min_version(), "2.10.0");
    }

    // Regression: appMinVersion keeps LOCAL on equal versions — the
    // opposite bias from the scalar rule, also intentional.
    #[test]
    fn test_app_min_version_keeps_local_on_tie() {
        let mut local = SyncInfo::new();
        let mut remote = SyncInfo::new();
        // Two strings that compare equal (both lenient-parse to 0.0.0)
        // but are textually distinct, so the bias is observable.
        local.app_min_version = "unparseable-local".to_string();
        remote.app_min_version = "unparseable-remote".to_string();

        assert_eq!(
            merge_sync_infos(&local, &remote).app_min_version(),
            "unparseable-local"
        );
    }

    #[test]
    fn test_unparseable_app_min_version_compares_as_zero() {
        let mut local = SyncInfo::new();
        let mut remote = SyncInfo::new();
        local.app_min_version = "not-a-version".to_string();
        remote.app_min_version = "0.1.0".to_string();

        assert_eq!(merge_sync_infos(&local, &remote).app_min_version(), "0.1.0");
    }

    #[test]
    fn test_master_keys_union_by_id() {
        let local = info_with_active(
            vec![master_key("k1", true, true, 10), master_key("k2", true, true, 30)],
            "",
            0,
        );
        let remote = info_with_active(
            vec![master_key("k2", false, true, 40), master_key("k3", true, false, 20)],
            "",
            0,
        );

        let merged = merge_sync_infos(&local, &remote);
        assert_eq!(merged.master_keys().len(), 3);
        // k2 exists on both; remote's is newer and brings enabled=false.
        assert!(!merged.master_key("k2").unwrap().enabled);
        assert_eq!(merged.master_key("k2").unwrap().updated_time, 40);
        assert!(merged.master_key("k1").is_some());
        assert!(merged.master_key("k3").is_some());
    }

    #[test]
    fn test_master_key_tie_takes_remote() {
        let local = info_with_active(vec![master_key("k1", true, true, 10)], "", 0);
        let mut remote_key = master_key("k1", false, true, 10);
        remote_key.content = "remote-content".to_string();
        let remote = info_with_active(vec![remote_key], "", 0);

        let merged = merge_sync_infos(&local, &remote);
        assert_eq!(merged.master_key("k1").unwrap().content, "remote-content");
    }

    // Local runs K1 (enabled, used, older stamp); a second device
    // redundantly created K2 (enabled, unused, newer stamp). The used key
    // must survive.
    #[test]
    fn test_used_key_beats_fresh_redundant_key() {
        let local = info_with_active(
            vec![master_key("K1", true, true, 100)],
            "K1",
            100,
        );
        let remote = info_with_active(
            vec![master_key("K1", true, true, 100), master_key("K2", true, false, 900)],
            "K2",
            900,
        );

        let merged = merge_sync_infos(&local, &remote);
        assert_eq!(merged.active_master_key_id(), "K1");
        // Both keys are still in the list; only the active choice differs.
        assert_eq!(merged.master_keys().len(), 2);
    }

    #[test]
    fn test_enabled_key_beats_disabled_key() {
        // Local's active key was disabled remotely; remote's active key
        // is enabled but older. Enabled wins over the timestamp rule.
        let local = info_with_active(
            vec![master_key("K1", false, true, 500), master_key("K2", true, true, 100)],
            "K1",
            500,
        );
        let remote = info_with_active(
            vec![master_key("K1", false, true, 500), master_key("K2", true, true, 100)],
            "K2",
            100,
        );

        let merged = merge_sync_infos(&local, &remote);
        assert_eq!(merged.active_master_key_id(), "K2");
    }

    #[test]
    fn test_active_key_falls_back_to_timestamp_rule() {
        // Indistinguishable keys on both sides: the scalar rule decides,
        // remote on ties.
        let keys = vec![master_key("K1", true, true, 10), master_key("K2", true, true, 10)];
        let local = info_with_active(keys.clone(), "K1", 300);
        let remote = info_with_active(keys.clone(), "K2", 300);

        let merged = merge_sync_infos(&local, &remote);
        assert_eq!(merged.active_master_key_id(), "K2");

        // With a strictly newer local stamp, local wins.
        let local = info_with_active(keys.clone(), "K1", 301);
        let merged = merge_sync_infos(&local, &remote);
        assert_eq!(merged.active_master_key_id(), "K1");
    }

    #[test]
    fn test_unresolvable_active_id_uses_timestamp_rule() {
        // Local's active id names a key absent from its own list: the
        // heuristic can't compare keys, so the scalar rule applies.
        let local = info_with_active(Vec::new(), "ghost", 900);
        let remote = info_with_active(vec![master_key("K2", true, true, 10)], "K2", 100);

        let merged = merge_sync_infos(&local, &remote);
        // Local's stamp wins the scalar rule, but "ghost" resolves to no
        // key in the merged list, so repair clears it.
        assert_eq!(merged.active_master_key_id(), "");
    }

    #[test]
    fn test_merged_active_id_survives_repair_when_key_exists() {
        let local = info_with_active(vec![master_key("K1", true, true, 10)], "K1", 100);
        let remote = info_with_active(Vec::new(), "", 0);

        let merged = merge_sync_infos(&local, &remote);
        assert_eq!(merged.active_master_key_id(), "K1");
    }

    #[test]
    fn test_ppk_follows_scalar_rule() {
        use crate::crypto::{PrivateKeyData, PublicPrivateKeyPair};

        let ppk = PublicPrivateKeyPair {
            id: "p1".to_string(),
            key_size: 2048,
            public_key: "rsa-oaep-2048;PEM".to_string(),
            private_key: PrivateKeyData {
                encryption_method: EncryptionMethod::PasswordV1,
                ciphertext: "sealed".to_string(),
            },
            created_time: 1,
        };

        let mut local = SyncInfo::new();
        let mut remote = SyncInfo::new();
        local.ppk = TimestampedValue::new(Some(ppk.clone()), 500);
        remote.ppk = TimestampedValue::new(None, 100);

        let merged = merge_sync_infos(&local, &remote);
        assert_eq!(merged.ppk().map(|p| p.id.as_str()), Some("p1"));

        // Remote deleted the ppk later: the deletion propagates.
        remote.ppk = TimestampedValue::new(None, 600);
        let merged = merge_sync_infos(&local, &remote);
        assert!(merged.ppk().is_none());
    }
}
