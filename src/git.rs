//! Content hashing through `git hash-object`.
//!
//! Every failure mode (git missing, path unreadable, timeout, empty output)
//! yields `None`, which the engine reads as "unchanged".

use std::collections::HashSet;
use std::time::Duration;

use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::debug;

use crate::engine::oracle::ChangeSnapshot;
use crate::model::types::Finding;

/// Current git blob hash of `path`, or `None` if it can't be computed in time.
pub async fn hash_object(path: &str, timeout: Duration) -> Option<String> {
    let run = Command::new("git")
        .args(["hash-object", "--", path])
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, run).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            debug!(path, error = %e, "git hash-object failed to spawn");
            return None;
        }
        Err(_) => {
            debug!(path, timeout_ms = timeout.as_millis() as u64, "git hash-object timed out");
            return None;
        }
    };

    if !output.status.success() {
        debug!(path, status = ?output.status.code(), "git hash-object exited non-zero");
        return None;
    }

    let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!hash.is_empty()).then_some(hash)
}

/// Hash every distinct subject referenced by a hashed finding, concurrently.
///
/// Paths that fail to hash are left out of the snapshot, so the oracle treats
/// them as unchanged.
pub async fn snapshot_changes(findings: &[Finding], timeout: Duration) -> ChangeSnapshot {
    let paths: HashSet<String> = findings
        .iter()
        .filter(|f| f.subject_hash.is_some())
        .filter_map(|f| f.subject.clone())
        .collect();

    let mut set = JoinSet::new();
    for path in paths {
        set.spawn(async move {
            let hash = hash_object(&path, timeout).await;
            (path, hash)
        });
    }

    let mut snapshot = ChangeSnapshot::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((path, Some(hash))) => snapshot.insert(path, hash),
            Ok((_, None)) => {}
            Err(e) => debug!(error = %e, "hash task failed"),
        }
    }
    debug!(hashed = snapshot.len(), "file change snapshot ready");
    snapshot
}
