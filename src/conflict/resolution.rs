use log::debug;
use serde::{Deserialize, Serialize};

use crate::data_store::locator::DocumentLocator;
use crate::data_store::versioned_document::Document;
use crate::errors::Result;
use crate::outcome::ReplaceOutcome;
use crate::replacer::VersionedReplacer;

/// Defines what [`update_with_retry`] does when a replace conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictResolution {
    /// Make a single attempt and surface the conflict to the caller.
    Fail,
    /// Re-read the document, re-apply the change and try again, up to the
    /// configured number of attempts.
    RereadAndRetry,
}

/// Final outcome of [`update_with_retry`] and how many replaces it took.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateReport {
    pub outcome: ReplaceOutcome,
    /// Number of read-modify-replace rounds performed, at least 1.
    pub attempts: u32,
}

/// Read-modify-write loop on top of the conflict hook.
///
/// Each round reads the current document, lets `mutate` change the local
/// copy, and submits it with the token just read. What happens on a
/// conflict follows the replacer's [`ConflictResolution`]:
///
/// * `Fail`: the conflict is returned after one attempt.
/// * `RereadAndRetry`: another round starts, until a replace succeeds or
///   `max_conflict_attempts` rounds all conflicted, in which case the last
///   conflict is returned.
///
/// A failure unrelated to versioning, on the read or the replace, ends the
/// loop immediately and is returned as `OtherFailure`. There is no backoff.
///
/// `mutate` must compute the change from the document it is given; it may run
/// once per round.
pub async fn update_with_retry<F>(
    replacer: &VersionedReplacer,
    locator: &DocumentLocator,
    mut mutate: F,
) -> Result<UpdateReport>
where
    F: FnMut(&mut Document),
{
    let config = replacer.config();
    let max_attempts = match config.conflict_resolution {
        ConflictResolution::Fail => 1,
        ConflictResolution::RereadAndRetry => config.max_conflict_attempts.max(1),
    };

    let mut attempts = 0;
    loop {
        attempts += 1;

        let mut document = match replacer.read(locator)?.await {
            Ok(document) => document,
            Err(failure) => {
                return Ok(UpdateReport {
                    outcome: ReplaceOutcome::OtherFailure(failure),
                    attempts,
                });
            }
        };
        mutate(&mut document);

        let outcome = replacer
            .replace_document(locator, &document)?
            .on_conflict(move |conflict| {
                debug!(
                    "Attempt {}/{} conflicted: {}",
                    attempts, max_attempts, conflict
                );
            })
            .await;

        match outcome {
            ReplaceOutcome::VersionConflict(_) if attempts < max_attempts => continue,
            outcome => return Ok(UpdateReport { outcome, attempts }),
        }
    }
}
