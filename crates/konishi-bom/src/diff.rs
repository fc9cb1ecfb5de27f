//! Comparing the dependency sets of two artifacts.
//!
//! Packages are matched by name only; an artifact listing the same name
//! twice is compared against the last occurrence.

use std::collections::HashMap;

use chrono::SecondsFormat;
use serde::Serialize;

use crate::artifact::Artifact;
use crate::dependency::{Dependency, TrustLevel};
use crate::error::BomError;

/// Per-outcome package counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// Same name and hash on both sides.
    pub unchanged: usize,
    /// Only in the base.
    pub removed: usize,
    /// Only in the other artifact.
    pub added: usize,
    /// Hash and version differ.
    pub version_changed: usize,
    /// Hash differs under the same version.
    pub hash_changed: usize,
}

/// What happened to a package between base and other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// New package.
    Added,
    /// Package no longer present.
    Removed,
    /// Different version.
    Changed,
    /// Same version, different content.
    HashChanged,
}

/// One side of a package comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageDetails {
    /// Only set on the `diff` side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    /// Version, `none` for removed packages.
    pub version: String,
    /// Trust level name, `none` for removed packages.
    pub status: String,
    /// Ledger record time, when known.
    #[serde(rename = "when", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A package that differs between the two artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageDiff {
    /// Package name.
    pub name: String,
    /// State in the base artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<PackageDetails>,
    /// State in the other artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<PackageDetails>,
}

/// Result of [`diff_boms`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BomDiff {
    /// Totals per outcome.
    pub counters: Counters,
    /// Changed, added and removed packages; unchanged ones are omitted.
    #[serde(rename = "packages")]
    pub packages: Vec<PackageDiff>,
}

fn details(dep: &Dependency, action: Option<Action>, with_time: bool) -> PackageDetails {
    PackageDetails {
        action,
        version: dep.version.clone(),
        status: dep.trust_level.name().to_owned(),
        timestamp: dep
            .timestamp
            .filter(|_| with_time)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
    }
}

/// Compare `other` against `base` by package name.
///
/// Both artifacts must have at least one resolved dependency.
pub fn diff_boms(base: &impl Artifact, other: &impl Artifact) -> Result<BomDiff, BomError> {
    for (path, deps) in [
        (base.path(), base.dependencies()),
        (other.path(), other.dependencies()),
    ] {
        if deps.is_empty() {
            return Err(BomError::NothingToCompare {
                path: path.to_owned(),
            });
        }
    }

    let mut remaining: HashMap<&str, &Dependency> = base
        .dependencies()
        .iter()
        .map(|d| (d.name.as_str(), d))
        .collect();
    let mut result = BomDiff::default();

    for new in other.dependencies() {
        let with_time = new.trust_level != TrustLevel::Unknown;
        let Some(old) = remaining.remove(new.name.as_str()) else {
            result.counters.added += 1;
            result.packages.push(PackageDiff {
                name: new.name.clone(),
                base: None,
                diff: Some(details(new, Some(Action::Added), with_time)),
            });
            continue;
        };
        if old.hash == new.hash {
            result.counters.unchanged += 1;
            continue;
        }
        let action = if old.version == new.version {
            result.counters.hash_changed += 1;
            Action::HashChanged
        } else {
            result.counters.version_changed += 1;
            Action::Changed
        };
        result.packages.push(PackageDiff {
            name: new.name.clone(),
            base: Some(details(old, None, true)),
            diff: Some(details(new, Some(action), with_time)),
        });
    }

    // keep base order for removals
    for dep in base.dependencies() {
        if let Some(old) = remaining.remove(dep.name.as_str()) {
            result.counters.removed += 1;
            result.packages.push(PackageDiff {
                name: old.name.clone(),
                base: Some(details(old, None, true)),
                diff: Some(PackageDetails {
                    action: Some(Action::Removed),
                    version: "none".to_owned(),
                    status: "none".to_owned(),
                    timestamp: None,
                }),
            });
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::GenericArtifact;

    fn dep(name: &str, version: &str, hash: &str) -> Dependency {
        Dependency {
            hash: hash.to_owned(),
            trust_level: TrustLevel::Trusted,
            ..Dependency::new(name, version)
        }
    }

    fn artifact(path: &str, deps: Vec<Dependency>) -> GenericArtifact {
        GenericArtifact::new(path, "apk", deps)
    }

    #[test]
    fn counts_every_outcome() {
        let base = artifact(
            "alpine:3.18",
            vec![
                dep("musl", "1.2.4-r1", "aa"),
                dep("busybox", "1.36.1-r2", "bb"),
                dep("zlib", "1.2.13-r1", "cc"),
                dep("ssl_client", "3.1.4-r0", "dd"),
            ],
        );
        let other = artifact(
            "alpine:3.19",
            vec![
                dep("musl", "1.2.4-r2", "a2"),
                dep("busybox", "1.36.1-r2", "b2"),
                dep("zlib", "1.2.13-r1", "cc"),
                dep("scanelf", "1.3.7-r2", "ee"),
            ],
        );
        let diff = diff_boms(&base, &other).expect("diff");
        assert_eq!(
            diff.counters,
            Counters {
                unchanged: 1,
                removed: 1,
                added: 1,
                version_changed: 1,
                hash_changed: 1,
            }
        );
        let actions: Vec<_> = diff
            .packages
            .iter()
            .map(|p| (p.name.as_str(), p.diff.as_ref().and_then(|d| d.action)))
            .collect();
        assert_eq!(
            actions,
            [
                ("musl", Some(Action::Changed)),
                ("busybox", Some(Action::HashChanged)),
                ("scanelf", Some(Action::Added)),
                ("ssl_client", Some(Action::Removed)),
            ]
        );
    }

    #[test]
    fn empty_side_is_an_error() {
        let base = artifact("alpine:3.18", vec![dep("musl", "1", "aa")]);
        let empty = artifact("scratch", Vec::new());
        let err = diff_boms(&base, &empty).expect_err("empty other");
        assert_eq!(
            err.to_string(),
            "artifact scratch has no dependencies - nothing to compare"
        );
        assert!(diff_boms(&empty, &base).is_err());
    }

    #[test]
    fn serializes_with_stable_field_names() {
        let base = artifact("a", vec![dep("musl", "1", "aa")]);
        let other = artifact("b", vec![dep("musl", "1", "ab")]);
        let diff = diff_boms(&base, &other).expect("diff");
        let json = serde_json::to_value(&diff).expect("json");
        assert_eq!(json["counters"]["hash_changed"], 1);
        assert_eq!(json["packages"][0]["diff"]["action"], "hash_changed");
        assert!(json["packages"][0]["base"].get("action").is_none());
    }
}
