//! Ledger-backed trust resolution for BOM dependencies.
//!
//! `konishi-ledger` looks up each dependency hash on a remote trust
//! ledger, classifies it as Trusted, Untrusted, Unsupported or Unknown,
//! and notarizes dependencies that are not yet trusted. The ledger client
//! itself is abstracted behind the [`Ledger`] trait.
//!
//! Lookups and signing run in batches:
//! 1. **Authenticate**: one round-trip per batch of hashes
//! 2. **Notarize**: one signing transaction per batch of dependencies
//! 3. **Link**: BOM links and package details returned for the asset's own record

pub mod authenticate;
pub mod batch;
pub mod error;
pub mod loaded;
pub mod notarize;
pub mod service;
pub mod workflow;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience.
pub use authenticate::authenticate_dependencies;
pub use error::{LedgerError, LookupError};
pub use loaded::{LoadedArtifact, load_from_ledger};
pub use notarize::notarize_dependencies;
pub use service::{BomLink, FEATURE_BOM, Ledger, LedgerArtifact, SignRequest, Status};
pub use workflow::{
    BomPolicy, BomVerdict, NotarizedBom, PackageDetails, Phase, notarize_bom, package_details,
    verify_bom,
};
