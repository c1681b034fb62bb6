//! # Sync Module
//!
//! The SyncInfo record, its deterministic two-way merge, and the app
//! version gate.
//!
//! ## Reconciliation Cycle
//!
//! ```text
//! device boots ──► load local SyncInfo (repair on load)
//!                         │
//! sync cycle ────► fetch remote SyncInfo
//!                         │
//!                  merge(local, remote) ──► combined SyncInfo
//!                         │
//!            ┌────────────┴────────────┐
//!            ▼                         ▼
//!     new local value            uploaded value
//! ```
//!
//! The combined value is both the new local state and what gets uploaded;
//! every device converges without locks because the merge is deterministic
//! and commutative up to its documented tie biases.

pub(crate) mod info;
pub(crate) mod merge;
pub(crate) mod version;

pub use info::{SyncInfo, TimestampedValue, DEFAULT_APP_MIN_VERSION};
pub use merge::merge_sync_infos;
pub use version::check_if_can_sync;
