//! Package-manager detection and installed-package listing.
//!
//! Detection runs `<binary> --version` inside the container for each
//! manager in the caller's probe order; the first one that exits 0 wins.

mod apk;
mod dpkg;
mod rpm;

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::dependency::Dependency;
use crate::error::{BomError, ExecutorError};
use crate::executor::Executor;

/// A supported native package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerKind {
    /// Alpine `apk`.
    Apk,
    /// Debian `dpkg`.
    Dpkg,
    /// Red Hat `rpm`.
    Rpm,
}

/// Probe order used when the caller does not supply one.
pub const DEFAULT_PROBE_ORDER: [ManagerKind; 3] =
    [ManagerKind::Apk, ManagerKind::Dpkg, ManagerKind::Rpm];

impl ManagerKind {
    /// Binary probed inside the container, also the dependency `kind`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Apk => "apk",
            Self::Dpkg => "dpkg",
            Self::Rpm => "rpm",
        }
    }

    /// Kind for a dependency or artifact type string, if it names a manager.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        DEFAULT_PROBE_ORDER.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for ManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// First manager in `order` whose binary runs inside the container.
///
/// `Ok(None)` means none was identified; executor failures are errors.
pub async fn detect<E: Executor>(
    executor: &E,
    order: &[ManagerKind],
) -> Result<Option<ManagerKind>, ExecutorError> {
    for &kind in order {
        let out = executor.exec(&[kind.name(), "--version"]).await?;
        debug!(manager = %kind, exit_code = out.exit_code, "probed package manager");
        if out.success() {
            info!(manager = %kind, "identified package manager");
            return Ok(Some(kind));
        }
    }
    Ok(None)
}

/// Lists installed packages for one manager, building the list at most once.
#[derive(Debug)]
pub struct PackageManager {
    kind: ManagerKind,
    cache: OnceCell<Vec<Dependency>>,
}

impl PackageManager {
    /// A manager with an empty cache.
    #[must_use]
    pub fn new(kind: ManagerKind) -> Self {
        Self {
            kind,
            cache: OnceCell::new(),
        }
    }

    /// Which manager this is.
    #[must_use]
    pub const fn kind(&self) -> ManagerKind {
        self.kind
    }

    /// Every installed package, in database order.
    pub async fn all_packages<E: Executor>(&self, executor: &E) -> Result<&[Dependency], BomError> {
        let deps = self
            .cache
            .get_or_try_init(|| async {
                let deps = match self.kind {
                    ManagerKind::Apk => apk::packages(executor).await?,
                    ManagerKind::Dpkg => dpkg::packages(executor).await?,
                    ManagerKind::Rpm => rpm::packages(executor).await?,
                };
                info!(manager = %self.kind, count = deps.len(), "listed installed packages");
                Ok::<_, BomError>(deps)
            })
            .await?;
        Ok(deps.as_slice())
    }
}

/// Run blocking tar or database work off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, BomError>
where
    F: FnOnce() -> Result<T, BomError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BomError::Task(e.to_string()))?
}
