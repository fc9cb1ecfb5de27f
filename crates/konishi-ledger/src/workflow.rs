//! End-to-end BOM verification and notarization.
//!
//! Both workflows authenticate an artifact's dependencies first. Verification
//! then scores the result against a [`BomPolicy`]; notarization records every
//! not-yet-trusted dependency and hands back the links to attach to the
//! asset's own record.

use konishi_bom::{Artifact, Dependency, TrustLevel};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::authenticate::authenticate_dependencies;
use crate::error::{LedgerError, LookupError};
use crate::notarize::notarize_dependencies;
use crate::service::{BomLink, FEATURE_BOM, Ledger, Status};

/// Which workflow step a progress report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Ledger lookups.
    Authenticate,
    /// Ledger signing.
    Notarize,
}

/// Acceptance rules for a dependency set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BomPolicy {
    /// Dependencies below this level count against the artifact.
    pub min_trust: TrustLevel,
    /// Share of Unknown/Unsupported dependencies tolerated, 0..=100.
    pub max_unsupported_percent: u8,
}

impl Default for BomPolicy {
    fn default() -> Self {
        Self {
            min_trust: TrustLevel::Trusted,
            max_unsupported_percent: 100,
        }
    }
}

/// Outcome of [`verify_bom`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BomVerdict {
    /// Worst level among dependencies below the policy minimum.
    pub lowest: TrustLevel,
    /// Unknown or Unsupported dependencies below the minimum.
    pub unsupported: usize,
    /// Whether the policy rejected the set.
    pub failed: bool,
    /// Dependencies whose lookup failed, by `name@version`.
    pub lookup_failures: Vec<(String, LookupError)>,
}

impl BomVerdict {
    /// Ledger status of the lowest level, used as the exit code.
    #[must_use]
    pub const fn status(&self) -> Status {
        Status::from_trust_level(self.lowest)
    }

    /// True when the policy accepted the set.
    #[must_use]
    pub const fn passed(&self) -> bool {
        !self.failed
    }
}

/// Result of [`notarize_bom`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotarizedBom {
    /// Number of dependencies signed by this call.
    pub notarized: usize,
    /// One link per dependency, for the asset's own record.
    pub links: Vec<BomLink>,
    /// Package summaries stored alongside the asset record.
    pub details: Vec<PackageDetails>,
}

/// Package summary attached to an asset record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageDetails {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// Content hash.
    pub hash: String,
    /// Ledger status code.
    pub status: i32,
    /// License, may be empty.
    pub license: String,
}

/// Summaries of `deps` in the form stored alongside an asset.
#[must_use]
pub fn package_details(deps: &[Dependency]) -> Vec<PackageDetails> {
    deps.iter()
        .map(|d| PackageDetails {
            name: d.name.clone(),
            version: d.version.clone(),
            hash: d.hash.clone(),
            status: Status::from_trust_level(d.trust_level).code(),
            license: d.license.clone(),
        })
        .collect()
}

fn effective_signer<L: Ledger>(ledger: &L, signer_id: &str) -> String {
    if signer_id.is_empty() {
        ledger.signer_id()
    } else {
        signer_id.to_owned()
    }
}

/// Authenticate the dependencies of a resolved `artifact` and score them.
///
/// Lookup failures are reported in the verdict and otherwise ignored.
/// Untrusted dependencies below `policy.min_trust` fail the set outright;
/// Unknown and Unsupported ones fail it only past the allowed share.
pub async fn verify_bom<L: Ledger>(
    ledger: &L,
    artifact: &mut impl Artifact,
    signer_id: &str,
    policy: &BomPolicy,
    batch_size: usize,
    mut progress: impl FnMut(Phase, usize),
) -> Result<BomVerdict, LedgerError> {
    ledger.require_feature(FEATURE_BOM).await?;
    let signer_id = effective_signer(ledger, signer_id);

    let deps = artifact.dependencies_mut();
    let errs = authenticate_dependencies(ledger, &signer_id, deps, batch_size, |b| {
        progress(Phase::Authenticate, b.len());
    })
    .await?;

    let mut verdict = BomVerdict {
        lowest: TrustLevel::Trusted,
        unsupported: 0,
        failed: false,
        lookup_failures: Vec::new(),
    };
    for (dep, err) in deps.iter().zip(errs) {
        if let Some(err) = err {
            warn!(dependency = %dep.display_name(), error = %err, "cannot authenticate dependency");
            verdict.lookup_failures.push((dep.display_name(), err));
            continue;
        }
        if dep.trust_level >= policy.min_trust {
            continue;
        }
        verdict.lowest = verdict.lowest.min(dep.trust_level);
        match dep.trust_level {
            TrustLevel::Unknown | TrustLevel::Unsupported => verdict.unsupported += 1,
            _ => verdict.failed = true,
        }
    }
    let allowed = deps.len() * usize::from(policy.max_unsupported_percent) / 100;
    if policy.max_unsupported_percent < 100 && verdict.unsupported > allowed {
        verdict.failed = true;
    }

    info!(
        path = artifact.path(),
        lowest = %verdict.lowest,
        unsupported = verdict.unsupported,
        failed = verdict.failed,
        "verified BOM"
    );
    Ok(verdict)
}

/// Notarize every dependency of a resolved `artifact` that is not yet
/// trusted, recording them under the artifact's kind.
///
/// Refuses to sign anything when a lookup failed or a dependency is
/// already recorded as Untrusted or Unsupported.
pub async fn notarize_bom<L: Ledger>(
    ledger: &L,
    artifact: &mut impl Artifact,
    signer_id: &str,
    batch_size: usize,
    mut progress: impl FnMut(Phase, usize),
) -> Result<NotarizedBom, LedgerError> {
    ledger.require_feature(FEATURE_BOM).await?;
    let signer_id = effective_signer(ledger, signer_id);
    let kind = artifact.kind().to_owned();

    let deps = artifact.dependencies_mut();
    let errs = authenticate_dependencies(ledger, &signer_id, deps, batch_size, |b| {
        progress(Phase::Authenticate, b.len());
    })
    .await?;

    let mut offenders = Vec::new();
    for (dep, err) in deps.iter().zip(errs) {
        if let Some(source) = err {
            return Err(LedgerError::Authentication {
                dependency: dep.display_name(),
                source,
            });
        }
        if dep.trust_level < TrustLevel::Unknown {
            offenders.push(format!(
                "Dependency {} trust level is {}",
                dep.display_name(),
                dep.trust_level
            ));
        }
    }
    if !offenders.is_empty() {
        return Err(LedgerError::InsufficientTrust { offenders });
    }

    let mut pending: Vec<&mut Dependency> = deps
        .iter_mut()
        .filter(|d| d.trust_level < TrustLevel::Trusted)
        .collect();
    let notarized = pending.len();
    if notarized == 0 {
        info!("no dependencies require notarization");
    } else {
        let kinds = vec![kind; notarized];
        notarize_dependencies(ledger, &kinds, &mut pending, batch_size, |b| {
            progress(Phase::Notarize, b.len());
        })
        .await?;
    }

    Ok(NotarizedBom {
        notarized,
        links: deps.iter().map(BomLink::from).collect(),
        details: package_details(deps),
    })
}
