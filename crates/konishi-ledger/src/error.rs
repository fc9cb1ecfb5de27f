//! Error types for ledger-backed trust resolution.

use konishi_bom::BomError;

/// Errors from trust resolution, notarization and ledger-backed workflows.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A record came back without a valid integrity proof.
    #[error("the ledger is compromised")]
    Compromised,

    /// The ledger rejected or failed a request.
    #[error("ledger request failed: {0}")]
    Remote(String),

    /// The ledger returned a different number of results than requested.
    #[error("ledger returned {got} results for {expected} hashes")]
    ResultCount {
        /// Number of hashes sent.
        expected: usize,
        /// Number of results received.
        got: usize,
    },

    /// The connected ledger does not offer a required feature.
    #[error("the connected ledger does not support the {feature} feature")]
    FeatureUnsupported {
        /// Feature name, e.g. `BOM`.
        feature: String,
    },

    /// `kinds` and `deps` passed to notarization differ in length.
    #[error("number of kinds ({kinds}) and dependencies ({deps}) must match")]
    KindMismatch {
        /// Number of kinds.
        kinds: usize,
        /// Number of dependencies.
        deps: usize,
    },

    /// A notarization batch failed; earlier batches may already be signed.
    #[error("notarization of {count} dependencies failed: {source}")]
    Notarization {
        /// Total dependencies in the call.
        count: usize,
        /// The failure of the batch.
        #[source]
        source: Box<LedgerError>,
    },

    /// A dependency could not be looked up, so it cannot be notarized.
    #[error("cannot authenticate {dependency} dependency: {source}")]
    Authentication {
        /// `name@version` of the dependency.
        dependency: String,
        /// The lookup failure.
        #[source]
        source: LookupError,
    },

    /// Dependencies fall below the required trust level.
    #[error("some dependencies have insufficient trust level")]
    InsufficientTrust {
        /// One line per offending dependency.
        offenders: Vec<String>,
    },

    /// BOM extraction failed.
    #[error(transparent)]
    Bom(#[from] BomError),
}

/// Per-hash lookup failure; never fatal to a whole resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// No record exists for the hash.
    #[error("artifact not found")]
    NotFound,

    /// Any other per-item failure reported by the ledger.
    #[error("{0}")]
    Failed(String),
}
