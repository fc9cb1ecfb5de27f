//! Writing BOM documents to files.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::artifact::{Artifact, is_container};
use crate::cyclonedx::{self, CycloneDxFormat};
use crate::error::BomError;
use crate::spdx;

/// Link type of dependencies baked into the artifact.
pub const STATIC_LINKAGE: &str = "Static";
/// Link type of dependencies loaded at run time.
pub const DYNAMIC_LINKAGE: &str = "Dynamic";

/// Link type shared by every dependency of `artifact`.
///
/// Container images ship their packages, so those are static.
pub fn link_type(artifact: &impl Artifact) -> &'static str {
    if is_container(artifact) {
        STATIC_LINKAGE
    } else {
        DYNAMIC_LINKAGE
    }
}

/// Last path component of an artifact path, used as the document name.
#[must_use]
pub fn base_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

/// Files to write; unset formats are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputTargets {
    /// SPDX tag:value document.
    pub spdx: Option<PathBuf>,
    /// CycloneDX JSON document.
    pub cyclonedx_json: Option<PathBuf>,
    /// CycloneDX XML document.
    pub cyclonedx_xml: Option<PathBuf>,
}

impl OutputTargets {
    /// True when no format is requested.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.spdx.is_none() && self.cyclonedx_json.is_none() && self.cyclonedx_xml.is_none()
    }
}

/// Write every requested document for `artifact`.
///
/// Stops at the first failure, naming the format and path.
pub fn write_all(artifact: &impl Artifact, targets: &OutputTargets) -> Result<(), BomError> {
    if let Some(path) = &targets.spdx {
        write_one("SPDX", path, || spdx::to_spdx_string(artifact))?;
    }
    if let Some(path) = &targets.cyclonedx_json {
        write_one("CycloneDX JSON", path, || {
            cyclonedx::render(artifact, CycloneDxFormat::Json)
        })?;
    }
    if let Some(path) = &targets.cyclonedx_xml {
        write_one("CycloneDX XML", path, || {
            cyclonedx::render(artifact, CycloneDxFormat::Xml)
        })?;
    }
    Ok(())
}

fn write_one(
    format: &'static str,
    path: &Path,
    render: impl FnOnce() -> Result<String, BomError>,
) -> Result<(), BomError> {
    let wrap = |source: BomError| BomError::Output {
        format,
        path: path.to_path_buf(),
        source: Box::new(source),
    };
    let doc = render().map_err(wrap)?;
    std::fs::write(path, doc).map_err(|e| wrap(BomError::IoError(e)))?;
    info!(format, path = %path.display(), "wrote BOM");
    Ok(())
}
