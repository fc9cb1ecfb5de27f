//! Package URLs for dependencies.

use packageurl::PackageUrl;

use crate::dependency::Dependency;

/// Package URL type for a package-manager or artifact kind.
#[must_use]
pub fn purl_type(kind: &str) -> &'static str {
    match kind {
        "dpkg" => "deb",
        "rpm" => "rpm",
        "image" => "docker",
        _ => "generic",
    }
}

/// `pkg:<type>/<name>@<version>` for `dep`.
///
/// The dependency's own kind decides the type; `artifact_kind` is used when
/// it is empty. Returns `None` when no valid URL can be formed.
#[must_use]
pub fn purl(artifact_kind: &str, dep: &Dependency) -> Option<String> {
    let kind = if dep.kind.is_empty() {
        artifact_kind
    } else {
        &dep.kind
    };
    let mut url = PackageUrl::new(purl_type(kind), dep.name.as_str()).ok()?;
    if !dep.version.is_empty() {
        url.with_version(dep.version.as_str());
    }
    Some(url.to_string())
}
