//! # Sync Version Gate
//!
//! An account's SyncInfo carries the minimum app version allowed to sync.
//! Devices check it before every sync cycle; an outdated app gets a
//! distinguished, user-visible error instead of corrupting newer state.

use semver::Version;

use crate::error::{Error, Result};
use crate::sync::info::SyncInfo;

/// Check whether this app version may sync against the account.
///
/// Raises [`Error::MustUpgradeApp`] when `app_version` is older than the
/// account's `appMinVersion`. Non-retryable until the app is upgraded.
pub fn check_if_can_sync(sync_info: &SyncInfo, app_version: &str) -> Result<()> {
    let app = parse_version(app_version)?;
    let min = parse_version(sync_info.app_min_version())?;

    if app < min {
        return Err(Error::MustUpgradeApp {
            required: sync_info.app_min_version().to_string(),
        });
    }
    Ok(())
}

fn parse_version(raw: &str) -> Result<Version> {
    Version::parse(raw)
        .map_err(|e| Error::CorruptConfig(format!("invalid version '{}': {}", raw, e)))
}

// ============================================================================
// TESTS
// ============================================================================
