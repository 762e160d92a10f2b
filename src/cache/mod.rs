//! On-disk build cache primitives
//!
//! A package directory is shared by every process pointed at it, and a
//! package name is shared by every entity within one process. This module
//! holds the pieces that keep those consumers from stepping on each other
//! and the codec for the metadata the external build leaves behind.
//!
//! # Guards
//!
//! | Resource | Scope | Guard |
//! |----------|-------|-------|
//! | Package directory | Cross-process | [`FileLock`] sentinel file |
//! | Physical build per name | In-process | [`BuildCoordinator`] gate |
//! | Build metadata | Read-only | [`manifest`] freshness check |

pub mod coordinator;
pub mod lock;
pub mod manifest;

pub use coordinator::BuildCoordinator;
pub use lock::{is_lock_file, FileLock, LockOptions, LOCK_FILE_NAME};
pub use manifest::{find_manifest, OutputKind, ProjectDescription, MANIFEST_SUFFIX};
