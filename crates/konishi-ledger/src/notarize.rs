//! Recording dependencies as trusted on the ledger.

use konishi_bom::{Dependency, TrustLevel};
use tracing::{debug, info};

use crate::batch::batches;
use crate::error::LedgerError;
use crate::service::{Ledger, LedgerArtifact, SignRequest, Status};

/// Sign every dependency as `Trusted`, `batch_size` per transaction.
///
/// `kinds[i]` is the artifact kind recorded for `deps[i]`. On success each
/// dependency is stamped `Trusted` with the ledger's signer identity. A
/// failed batch aborts the call; batches already committed stay on the
/// ledger but no dependency is stamped.
pub async fn notarize_dependencies<L: Ledger>(
    ledger: &L,
    kinds: &[String],
    deps: &mut [&mut Dependency],
    batch_size: usize,
    mut progress: impl FnMut(&[&mut Dependency]),
) -> Result<(), LedgerError> {
    if deps.is_empty() {
        return Ok(());
    }
    if kinds.len() != deps.len() {
        return Err(LedgerError::KindMismatch {
            kinds: kinds.len(),
            deps: deps.len(),
        });
    }

    for range in batches(deps.len(), batch_size) {
        let requests: Vec<SignRequest> = kinds[range.clone()]
            .iter()
            .zip(&deps[range.clone()])
            .map(|(kind, dep)| SignRequest {
                artifact: LedgerArtifact::from_dependency(kind, dep),
                status: Status::Trusted,
                bom: Vec::new(),
            })
            .collect();
        let result = ledger.sign_artifacts(&requests).await;
        progress(&deps[range.clone()]);
        let tx = result.map_err(|e| LedgerError::Notarization {
            count: deps.len(),
            source: Box::new(e),
        })?;
        debug!(start = range.start, count = range.len(), tx = %tx, "notarized batch");
    }

    let signer_id = ledger.signer_id();
    for dep in deps.iter_mut() {
        dep.trust_level = TrustLevel::Trusted;
        dep.signer_id = Some(signer_id.clone());
    }
    info!(count = deps.len(), "notarized dependencies");
    Ok(())
}
