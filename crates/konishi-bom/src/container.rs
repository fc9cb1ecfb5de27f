//! Container images as BOM subjects.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::artifact::Artifact;
use crate::dependency::Dependency;
use crate::error::BomError;
use crate::executor::Executor;
use crate::graph::{Graph, NodeId};
use crate::pkgmgr::{self, ManagerKind, PackageManager};

#[derive(Debug)]
enum Resolution {
    Unresolved,
    Resolved(Vec<Dependency>),
    Failed(String),
}

/// A container image whose packages are listed through an [`Executor`].
///
/// Resolution closes the executor whether or not it succeeds.
#[derive(Debug)]
pub struct ContainerArtifact<E> {
    image: String,
    executor: E,
    manager: PackageManager,
    state: Resolution,
}

impl<E: Executor> ContainerArtifact<E> {
    /// Identify the image's package manager using `probe_order`.
    ///
    /// The executor is closed when no manager is identified.
    pub async fn open(
        image: impl Into<String>,
        executor: E,
        probe_order: &[ManagerKind],
    ) -> Result<Self, BomError> {
        let image = image.into();
        let detected = pkgmgr::detect(&executor, probe_order).await;
        let kind = match detected {
            Ok(Some(kind)) => kind,
            Ok(None) => {
                close_quietly(&executor, &image).await;
                return Err(BomError::PackageManagerNotIdentified);
            }
            Err(e) => {
                close_quietly(&executor, &image).await;
                return Err(e.into());
            }
        };
        Ok(Self {
            image,
            executor,
            manager: PackageManager::new(kind),
            state: Resolution::Unresolved,
        })
    }

    /// The identified package manager.
    #[must_use]
    pub const fn manager(&self) -> ManagerKind {
        self.manager.kind()
    }

    async fn build(&self) -> Result<Vec<Dependency>, BomError> {
        let packages = self.manager.all_packages(&self.executor).await?;
        let graph = Graph::new();
        for dep in packages {
            graph.add_child(NodeId::ROOT, &dep.name, &dep.version, dep.clone());
        }
        Ok(dedupe_by_hash(graph.flat_deps()))
    }
}

/// Keep the first dependency for each hash.
fn dedupe_by_hash(deps: Vec<Dependency>) -> Vec<Dependency> {
    let mut seen = HashSet::with_capacity(deps.len());
    deps.into_iter()
        .filter(|d| seen.insert(d.hash.clone()))
        .collect()
}

async fn close_quietly<E: Executor>(executor: &E, image: &str) {
    if let Err(e) = executor.close().await {
        warn!(image, error = %e, "failed to close container");
    }
}

impl<E: Executor> Artifact for ContainerArtifact<E> {
    fn path(&self) -> &str {
        &self.image
    }

    fn kind(&self) -> &str {
        self.manager.kind().name()
    }

    fn dependencies(&self) -> &[Dependency] {
        match &self.state {
            Resolution::Resolved(deps) => deps,
            _ => &[],
        }
    }

    fn dependencies_mut(&mut self) -> &mut [Dependency] {
        match &mut self.state {
            Resolution::Resolved(deps) => deps,
            _ => &mut [],
        }
    }

    async fn resolve_dependencies(&mut self) -> Result<&[Dependency], BomError> {
        if matches!(self.state, Resolution::Unresolved) {
            let result = self.build().await;
            close_quietly(&self.executor, &self.image).await;
            match result {
                Ok(deps) => {
                    info!(image = %self.image, count = deps.len(), "resolved dependencies");
                    self.state = Resolution::Resolved(deps);
                }
                Err(e) => {
                    self.state = Resolution::Failed(e.to_string());
                    return Err(e);
                }
            }
        }
        match &self.state {
            Resolution::Resolved(deps) => Ok(deps),
            Resolution::Failed(reason) => Err(BomError::ResolutionFailed {
                path: self.image.clone(),
                reason: reason.clone(),
            }),
            Resolution::Unresolved => Ok(&[]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::DepType;
    use crate::executor::testing::FakeExecutor;
    use crate::pkgmgr::DEFAULT_PROBE_ORDER;

    const INSTALLED: &str = "\
C:Q1AAECAwQFBgcICQoLDA0ODxAREhM=
P:musl
V:1.2.4-r2

C:Q1VGhlIGFwayBjaGVja3N1bQ==
P:busybox
V:1.36.1-r5

C:Q1AAECAwQFBgcICQoLDA0ODxAREhM=
P:musl-compat
V:1.2.4-r2

";

    fn alpine() -> FakeExecutor {
        FakeExecutor::default()
            .with_binary("apk")
            .with_file("/lib/apk/db/installed", INSTALLED)
    }

    #[tokio::test]
    async fn resolves_direct_deduplicated_dependencies() {
        let mut artifact = ContainerArtifact::open("alpine:3.19", alpine(), &DEFAULT_PROBE_ORDER)
            .await
            .expect("open");
        assert_eq!(artifact.kind(), "apk");
        assert!(artifact.dependencies().is_empty());

        let deps = artifact.resolve_dependencies().await.expect("resolve");
        let names: Vec<_> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["musl", "busybox"]);
        assert!(deps.iter().all(|d| d.dep_type == DepType::Direct));
        assert_eq!(artifact.executor.close_count(), 1);
    }

    #[tokio::test]
    async fn second_resolve_uses_cached_result() {
        let mut artifact = ContainerArtifact::open("alpine:3.19", alpine(), &DEFAULT_PROBE_ORDER)
            .await
            .expect("open");
        artifact.resolve_dependencies().await.expect("first");
        let again = artifact.resolve_dependencies().await.expect("second").len();
        assert_eq!(again, 2);
        assert_eq!(artifact.executor.close_count(), 1);
    }

    #[tokio::test]
    async fn failure_is_remembered_and_executor_closed() {
        let exec = FakeExecutor::default()
            .with_binary("apk")
            .with_file("/lib/apk/db/installed", "P:bad\nC:Q1!!!\n\n");
        let mut artifact = ContainerArtifact::open("alpine:broken", exec, &DEFAULT_PROBE_ORDER)
            .await
            .expect("open");
        let first = artifact.resolve_dependencies().await.expect_err("malformed");
        assert!(matches!(first, BomError::MalformedChecksum { .. }));
        let second = artifact.resolve_dependencies().await.expect_err("cached failure");
        assert!(matches!(second, BomError::ResolutionFailed { .. }));
        assert_eq!(artifact.executor.close_count(), 1);
    }

    #[tokio::test]
    async fn unidentified_manager_is_an_error() {
        let err = ContainerArtifact::open("scratchy", FakeExecutor::default(), &DEFAULT_PROBE_ORDER)
            .await
            .expect_err("no manager");
        assert!(matches!(err, BomError::PackageManagerNotIdentified));
        assert_eq!(
            err.to_string(),
            "cannot identify package manager for the container image"
        );
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let mut a = Dependency::new("a", "1");
        a.hash = "h".to_owned();
        let mut b = Dependency::new("b", "1");
        b.hash = "h".to_owned();
        let mut c = Dependency::new("c", "1");
        c.hash = "x".to_owned();
        let out = dedupe_by_hash(vec![a, b, c]);
        let names: Vec<_> = out.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);
    }
}
