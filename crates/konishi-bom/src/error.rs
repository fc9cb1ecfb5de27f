//! Error types for the BOM subsystem.

use std::path::PathBuf;

/// Errors from the container executor.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The image has no `/bin/sh`, so no interactive container can run.
    #[error(
        "cannot use container without shell: images built `from scratch` are not supported (image `{image}`)"
    )]
    UnsupportedBaseImage {
        /// The image reference that was started.
        image: String,
    },

    /// A `docker` invocation exited unsuccessfully.
    #[error("`docker {command}` failed: {reason}")]
    Docker {
        /// The docker subcommand (e.g. `create`, `cp`).
        command: String,
        /// Trimmed stderr or a description of the failure.
        reason: String,
    },

    /// The `docker` binary could not be spawned.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A path inside the container could not be read.
    #[error("cannot read `{path}` from container: {source}")]
    Read {
        /// Path inside the container.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The caller cancelled the operation before it completed.
    #[error("container command cancelled")]
    Cancelled,

    /// Graceful shutdown did not finish in time.
    #[error("container did not exit within {0:?}")]
    CloseTimeout(std::time::Duration),
}

impl ExecutorError {
    /// True when a read failed because the path does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Errors from the Konishi BOM subsystem.
#[derive(Debug, thiserror::Error)]
pub enum BomError {
    /// Container executor failure.
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// None of the probed package managers ran inside the container.
    #[error("cannot identify package manager for the container image")]
    PackageManagerNotIdentified,

    /// An apk checksum field was not valid base64.
    #[error("malformed package checksum at line {line}")]
    MalformedChecksum {
        /// 1-based line in the installed database.
        line: usize,
    },

    /// A per-file digest could not be folded into a package hash.
    #[error("malformed hash for package `{package}`: {reason}")]
    MalformedDigest {
        /// Package name.
        package: String,
        /// What went wrong.
        reason: String,
    },

    /// The rpm database could not be opened or scanned.
    #[error("cannot read RPM database: {0}")]
    RpmDb(#[from] crate::rpmdb::RpmDbError),

    /// Package metadata streamed from the container could not be read.
    #[error("error reading `{path}` from container: {source}")]
    Metadata {
        /// Container path of the metadata file or directory.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A mandatory SPDX header tag produced no value.
    #[error("no value found for mandatory header tag {tag}")]
    MissingHeaderTag {
        /// The SPDX tag.
        tag: &'static str,
    },

    /// A mandatory SPDX component tag produced no value.
    #[error("no value found for mandatory component tag {tag} for component {component}")]
    MissingComponentTag {
        /// The SPDX tag.
        tag: &'static str,
        /// Name of the offending dependency.
        component: String,
    },

    /// A BOM document could not be serialized.
    #[error("failed to serialize {format}: {reason}")]
    Serialize {
        /// Output format name.
        format: &'static str,
        /// Serializer message.
        reason: String,
    },

    /// Writing one BOM output file failed.
    #[error("cannot output {format} to `{}`: {source}", path.display())]
    Output {
        /// Output format name.
        format: &'static str,
        /// Destination path.
        path: PathBuf,
        /// The underlying failure.
        source: Box<BomError>,
    },

    /// An earlier resolution attempt on the same artifact failed.
    #[error("dependency resolution for `{path}` failed earlier: {reason}")]
    ResolutionFailed {
        /// Artifact path.
        path: String,
        /// Message of the original failure.
        reason: String,
    },

    /// A BOM diff was requested against an empty dependency set.
    #[error("artifact {path} has no dependencies - nothing to compare")]
    NothingToCompare {
        /// Artifact path.
        path: String,
    },

    /// A blocking worker task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),

    /// I/O error during BOM operations.
    #[error("BOM I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
