//! The subject of a BOM and its dependency set.

use crate::dependency::Dependency;
use crate::error::BomError;
use crate::pkgmgr::ManagerKind;

/// An asset whose dependencies can be listed.
///
/// Implementations resolve at most once; later calls to
/// [`Artifact::resolve_dependencies`] return the cached outcome.
#[expect(async_fn_in_trait, reason = "callers stay on one task; no Send bound needed")]
pub trait Artifact {
    /// Asset path or image reference.
    fn path(&self) -> &str;

    /// Artifact type: a package-manager name for container images.
    fn kind(&self) -> &str;

    /// Dependencies resolved so far; empty before resolution.
    fn dependencies(&self) -> &[Dependency];

    /// Mutable access for trust resolution and notarization.
    fn dependencies_mut(&mut self) -> &mut [Dependency];

    /// Resolve the dependency set, or return the cached result.
    async fn resolve_dependencies(&mut self) -> Result<&[Dependency], BomError>;
}

/// True when the artifact's dependencies come from a container image.
pub fn is_container(artifact: &impl Artifact) -> bool {
    ManagerKind::from_name(artifact.kind()).is_some()
}

/// An artifact whose dependencies are already known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericArtifact {
    /// Asset path.
    pub path: String,
    /// Artifact type.
    pub kind: String,
    /// Dependency set.
    pub deps: Vec<Dependency>,
}

impl GenericArtifact {
    /// Wrap an existing dependency list.
    pub fn new(path: impl Into<String>, kind: impl Into<String>, deps: Vec<Dependency>) -> Self {
        Self {
            path: path.into(),
            kind: kind.into(),
            deps,
        }
    }
}

impl Artifact for GenericArtifact {
    fn path(&self) -> &str {
        &self.path
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn dependencies(&self) -> &[Dependency] {
        &self.deps
    }

    fn dependencies_mut(&mut self) -> &mut [Dependency] {
        &mut self.deps
    }

    async fn resolve_dependencies(&mut self) -> Result<&[Dependency], BomError> {
        Ok(&self.deps)
    }
}
