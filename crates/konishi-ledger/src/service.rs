//! The remote ledger as seen by this crate.
//!
//! Connection handling, authentication and signing live behind the
//! [`Ledger`] trait; everything here is plain data crossing that seam.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use konishi_bom::{DepType, Dependency, TrustLevel};

use crate::error::{LedgerError, LookupError};

/// Feature a ledger must advertise before BOM links are accepted.
pub const FEATURE_BOM: &str = "BOM";

/// Notarization status as stored on the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Status {
    /// Attested as trusted.
    Trusted,
    /// Attested as untrusted.
    Untrusted,
    /// No attestation.
    #[default]
    Unknown,
    /// Attested as unsupported.
    Unsupported,
    /// The signing key was revoked.
    ApikeyRevoked,
}

impl Status {
    /// Wire code of the status; also used as the process exit code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Trusted => 0,
            Self::Untrusted => 1,
            Self::Unknown => 2,
            Self::Unsupported => 3,
            Self::ApikeyRevoked => 4,
        }
    }

    /// Parse a wire code.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Trusted),
            1 => Some(Self::Untrusted),
            2 => Some(Self::Unknown),
            3 => Some(Self::Unsupported),
            4 => Some(Self::ApikeyRevoked),
            _ => None,
        }
    }

    /// Upper-case display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Trusted => "TRUSTED",
            Self::Untrusted => "UNTRUSTED",
            Self::Unknown => "UNKNOWN",
            Self::Unsupported => "UNSUPPORTED",
            Self::ApikeyRevoked => "REVOKED",
        }
    }

    /// Ledger status recorded for a dependency at `level`.
    ///
    /// `Invalid` has no ledger counterpart and maps to `Unknown`.
    #[must_use]
    pub const fn from_trust_level(level: TrustLevel) -> Self {
        match level {
            TrustLevel::Trusted => Self::Trusted,
            TrustLevel::Untrusted => Self::Untrusted,
            TrustLevel::Unsupported => Self::Unsupported,
            TrustLevel::Unknown | TrustLevel::Invalid => Self::Unknown,
        }
    }

    /// Trust level of a stored record; revoked keys count as `Unknown`.
    #[must_use]
    pub const fn trust_level(self) -> TrustLevel {
        match self {
            Self::Trusted => TrustLevel::Trusted,
            Self::Untrusted => TrustLevel::Untrusted,
            Self::Unsupported => TrustLevel::Unsupported,
            Self::Unknown | Self::ApikeyRevoked => TrustLevel::Unknown,
        }
    }
}

/// A notarized (or to-be-notarized) artifact record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerArtifact {
    /// Artifact kind, e.g. a package-manager name.
    pub kind: String,
    /// Artifact name or path.
    pub name: String,
    /// Content hash; the lookup key.
    pub hash: String,
    /// Free-form metadata (`version`, `hashtype`).
    pub metadata: BTreeMap<String, String>,
    /// Recorded status.
    pub status: Status,
    /// Set when the notarization was revoked.
    pub revoked: Option<DateTime<Utc>>,
    /// Time of the record.
    pub timestamp: DateTime<Utc>,
    /// Signer that recorded it.
    pub signer: String,
}

impl LedgerArtifact {
    /// Record for notarizing `dep` under `kind`.
    #[must_use]
    pub fn from_dependency(kind: &str, dep: &Dependency) -> Self {
        let metadata = BTreeMap::from([
            ("version".to_owned(), dep.version.clone()),
            ("hashtype".to_owned(), dep.hash_type.name().to_owned()),
        ]);
        Self {
            kind: kind.to_owned(),
            name: dep.name.clone(),
            hash: dep.hash.clone(),
            metadata,
            ..Self::default()
        }
    }
}

/// A successful per-hash lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    /// The stored record.
    pub artifact: LedgerArtifact,
    /// Whether the record's integrity proof checked out.
    pub verified: bool,
}

/// Outcome of looking up one hash.
pub type Lookup = Result<Found, LookupError>;

/// Link from an asset to one of its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Declared by the asset.
    Direct,
    /// Pulled in through another dependency.
    Indirect,
}

/// Dependency reference attached to an asset's own notarization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BomLink {
    /// Dependency hash.
    pub hash: String,
    /// How the asset depends on it.
    pub kind: LinkKind,
}

impl From<&Dependency> for BomLink {
    fn from(dep: &Dependency) -> Self {
        Self {
            hash: dep.hash.clone(),
            kind: match dep.dep_type {
                DepType::Direct => LinkKind::Direct,
                DepType::Transient => LinkKind::Indirect,
            },
        }
    }
}

/// One artifact in a multi-artifact signing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRequest {
    /// Artifact to record.
    pub artifact: LedgerArtifact,
    /// Status to record it with.
    pub status: Status,
    /// Dependencies to link to it.
    pub bom: Vec<BomLink>,
}

/// Raw entry of a ledger sorted set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetEntry {
    /// JSON payload.
    pub value: Vec<u8>,
    /// Time the entry was written.
    pub timestamp: DateTime<Utc>,
}

/// The remote trust ledger.
///
/// Implementations own the connection and credentials. All methods are
/// single round-trips.
#[expect(async_fn_in_trait, reason = "callers stay on one task; no Send bound needed")]
pub trait Ledger: Send + Sync {
    /// Look up `hashes` as recorded by `signer_id`.
    ///
    /// Returns one [`Lookup`] per hash, in order. An `Err` is a failure of
    /// the whole round-trip.
    async fn load_artifacts_by_hash(
        &self,
        signer_id: &str,
        hashes: &[&str],
    ) -> Result<Vec<Lookup>, LedgerError>;

    /// Sign and commit every request in one transaction; returns its id.
    async fn sign_artifacts(&self, requests: &[SignRequest]) -> Result<String, LedgerError>;

    /// Fail unless the ledger advertises `feature`.
    async fn require_feature(&self, feature: &str) -> Result<(), LedgerError>;

    /// Load a single artifact record.
    async fn load_artifact(&self, hash: &str, signer_id: &str)
    -> Result<LedgerArtifact, LedgerError>;

    /// Scan the sorted set named `set`.
    async fn scan_set(&self, set: &str) -> Result<Vec<SetEntry>, LedgerError>;

    /// Signer identity derived from the client's credentials.
    fn signer_id(&self) -> String;
}
