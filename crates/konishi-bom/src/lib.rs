//! Bill-of-materials extraction for container images.
//!
//! `konishi-bom` starts an ephemeral container, identifies its package
//! manager (apk, dpkg or rpm), reads the native package database and
//! assembles a deduplicated dependency set keyed by content hash. The
//! result can be written as SPDX tag:value or CycloneDX (JSON/XML)
//! documents, or compared against another artifact's dependencies.
//!
//! Trust levels on each [`Dependency`] start out unset; `konishi-ledger`
//! fills them in.

pub mod artifact;
pub mod container;
pub mod cyclonedx;
pub mod dependency;
pub mod diff;
pub mod error;
pub mod executor;
pub mod graph;
pub mod output;
pub mod pkgmgr;
pub mod purl;
pub mod rpmdb;
pub mod spdx;

// Re-export primary types for convenience.
pub use artifact::{Artifact, GenericArtifact};
pub use container::ContainerArtifact;
pub use dependency::{DepType, Dependency, HashType, TrustLevel};
pub use error::{BomError, ExecutorError};
pub use executor::{DockerExecutor, DockerExecutorConfig, Executor};
pub use graph::Graph;
pub use output::{OutputTargets, write_all};
pub use pkgmgr::{DEFAULT_PROBE_ORDER, ManagerKind};
