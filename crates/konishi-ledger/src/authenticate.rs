//! Resolving dependency trust levels against the ledger.

use konishi_bom::{Dependency, TrustLevel};
use tracing::debug;

use crate::batch::batches;
use crate::error::{LedgerError, LookupError};
use crate::service::{Ledger, Lookup, Status};

/// Look up every dependency hash and set its trust level in place.
///
/// Hashes go to the ledger `batch_size` at a time (0 means all at once)
/// and `progress` sees each batch after its round-trip. The returned
/// vector parallels `deps`: `Some` holds a lookup failure other than
/// not-found, for which the level stays `Unknown`.
///
/// A record without a valid integrity proof aborts with
/// [`LedgerError::Compromised`]. Batches classified before a failure keep
/// their new levels.
pub async fn authenticate_dependencies<L: Ledger>(
    ledger: &L,
    signer_id: &str,
    deps: &mut [Dependency],
    batch_size: usize,
    mut progress: impl FnMut(&[Dependency]),
) -> Result<Vec<Option<LookupError>>, LedgerError> {
    let mut errors = vec![None; deps.len()];

    for range in batches(deps.len(), batch_size) {
        let hashes: Vec<&str> = deps[range.clone()].iter().map(|d| d.hash.as_str()).collect();
        let results = ledger.load_artifacts_by_hash(signer_id, &hashes).await;
        progress(&deps[range.clone()]);
        let results = results?;
        if results.len() != range.len() {
            return Err(LedgerError::ResultCount {
                expected: range.len(),
                got: results.len(),
            });
        }
        debug!(start = range.start, count = range.len(), "authenticated batch");

        for ((dep, slot), result) in deps[range.clone()]
            .iter_mut()
            .zip(&mut errors[range])
            .zip(results)
        {
            *slot = classify(dep, signer_id, result)?;
        }
    }
    Ok(errors)
}

fn classify(
    dep: &mut Dependency,
    signer_id: &str,
    result: Lookup,
) -> Result<Option<LookupError>, LedgerError> {
    let (level, error) = match result {
        Ok(found) => {
            if !found.verified {
                return Err(LedgerError::Compromised);
            }
            let level = match found.artifact.status {
                Status::Untrusted => TrustLevel::Untrusted,
                _ if found.artifact.revoked.is_some() => TrustLevel::Untrusted,
                Status::Unsupported => TrustLevel::Unsupported,
                _ => TrustLevel::Trusted,
            };
            dep.timestamp = Some(found.artifact.timestamp);
            (level, None)
        }
        Err(LookupError::NotFound) => (TrustLevel::Unknown, None),
        Err(e) => (TrustLevel::Unknown, Some(e)),
    };
    dep.trust_level = level;
    if level != TrustLevel::Unknown {
        dep.signer_id = Some(signer_id.to_owned());
    }
    Ok(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeLedger, SIGNER, at};

    fn deps(hashes: &[&str]) -> Vec<Dependency> {
        hashes
            .iter()
            .map(|h| Dependency {
                hash: (*h).to_owned(),
                ..Dependency::new(format!("pkg-{h}"), "1.0")
            })
            .collect()
    }

    #[tokio::test]
    async fn classifies_each_record() {
        let ledger = FakeLedger::new()
            .with_record("t", Status::Trusted, true)
            .with_record("u", Status::Untrusted, true)
            .with_record("s", Status::Unsupported, true)
            .with_record("k", Status::ApikeyRevoked, true)
            .with_revoked("r");
        let mut deps = deps(&["t", "u", "s", "r", "missing", "k"]);

        let errs = authenticate_dependencies(&ledger, SIGNER, &mut deps, 0, |_| {})
            .await
            .expect("authenticate");

        let levels: Vec<_> = deps.iter().map(|d| d.trust_level).collect();
        assert_eq!(
            levels,
            [
                TrustLevel::Trusted,
                TrustLevel::Untrusted,
                TrustLevel::Unsupported,
                TrustLevel::Untrusted,
                TrustLevel::Unknown,
                TrustLevel::Trusted,
            ]
        );
        assert!(errs.iter().all(Option::is_none));
        assert_eq!(deps[0].signer_id.as_deref(), Some(SIGNER));
        assert_eq!(deps[0].timestamp, Some(at(1_700_000_000)));
        assert_eq!(deps[4].signer_id, None);
        assert_eq!(deps[4].timestamp, None);
    }

    #[tokio::test]
    async fn batches_and_reports_progress_per_batch() {
        let ledger = FakeLedger::new();
        let mut deps = deps(&["1", "2", "3", "4", "5", "6", "7"]);
        let mut seen = Vec::new();

        authenticate_dependencies(&ledger, SIGNER, &mut deps, 3, |batch| {
            seen.push(batch.iter().map(|d| d.hash.clone()).collect::<Vec<_>>());
        })
        .await
        .expect("authenticate");

        assert_eq!(ledger.lookup_batch_sizes(), [3, 3, 1]);
        assert_eq!(seen, [vec!["1", "2", "3"], vec!["4", "5", "6"], vec!["7"]]);
    }

    #[tokio::test]
    async fn unverified_record_aborts() {
        let ledger = FakeLedger::new()
            .with_record("good", Status::Trusted, true)
            .with_record("forged", Status::Trusted, false);
        let mut deps = deps(&["good", "forged", "other"]);

        let err = authenticate_dependencies(&ledger, SIGNER, &mut deps, 0, |_| {})
            .await
            .expect_err("compromised");
        assert!(matches!(err, LedgerError::Compromised));
        assert_eq!(err.to_string(), "the ledger is compromised");
    }

    #[tokio::test]
    async fn lookup_errors_are_collected_not_raised() {
        let ledger = FakeLedger::new()
            .with_record("ok", Status::Trusted, true)
            .with_lookup_error("flaky", "deadline exceeded");
        let mut deps = deps(&["ok", "flaky"]);

        let errs = authenticate_dependencies(&ledger, SIGNER, &mut deps, 1, |_| {})
            .await
            .expect("authenticate");
        assert_eq!(errs[0], None);
        assert_eq!(
            errs[1],
            Some(LookupError::Failed("deadline exceeded".to_owned()))
        );
        assert_eq!(deps[1].trust_level, TrustLevel::Unknown);
    }

    #[tokio::test]
    async fn earlier_batches_survive_a_failed_round_trip() {
        let ledger = FakeLedger::new()
            .with_record("a", Status::Trusted, true)
            .with_record("b", Status::Trusted, true)
            .failing_lookup_call(1);
        let mut deps = deps(&["a", "b"]);
        let mut calls = 0;

        let err = authenticate_dependencies(&ledger, SIGNER, &mut deps, 1, |_| calls += 1)
            .await
            .expect_err("second batch fails");
        assert!(matches!(err, LedgerError::Remote(_)));
        assert_eq!(calls, 2);
        assert_eq!(deps[0].trust_level, TrustLevel::Trusted);
        assert_eq!(deps[1].trust_level, TrustLevel::Invalid);
    }

    #[tokio::test]
    async fn same_hash_classifies_the_same_in_any_batch() {
        let ledger = FakeLedger::new().with_record("x", Status::Unsupported, true);
        let mut deps = deps(&["x", "y", "x"]);
        authenticate_dependencies(&ledger, SIGNER, &mut deps, 2, |_| {})
            .await
            .expect("authenticate");
        assert_eq!(deps[0].trust_level, deps[2].trust_level);
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let ledger = FakeLedger::new();
        let errs = authenticate_dependencies(&ledger, SIGNER, &mut [], 3, |_| {})
            .await
            .expect("authenticate");
        assert!(errs.is_empty());
        assert!(ledger.lookup_batch_sizes().is_empty());
    }
}
