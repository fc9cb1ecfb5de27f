//! SPDX 2.2 tag:value output.
//!
//! The document is driven by two tables of `(tag, presence, value)` rows:
//! one for the header, one repeated per dependency. An empty value for a
//! mandatory tag aborts the document; optional tags with no value are
//! left out.

use std::fmt::Write;

use chrono::{SecondsFormat, Utc};

use crate::artifact::Artifact;
use crate::dependency::Dependency;
use crate::error::BomError;
use crate::output::{base_name, link_type};
use crate::purl::purl;

const NO_ASSERTION: &str = "NOASSERTION";
const CREATOR: &str = concat!("Tool: Konishi konishi-bom-", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Optional,
    Mandatory,
}

/// Values shared by every row of one document.
struct Subject<'a> {
    name: &'a str,
    kind: &'a str,
    link_type: &'static str,
}

type HeaderFn = fn(&Subject<'_>) -> String;
type ComponentFn = fn(&Subject<'_>, &Dependency, usize) -> String;

const HEADER: &[(&str, Presence, HeaderFn)] = &[
    ("SPDXVersion", Presence::Mandatory, |_| "SPDX-2.2".to_owned()),
    ("DataLicense", Presence::Mandatory, |_| "CC0-1.0".to_owned()),
    ("SPDXID", Presence::Mandatory, |_| "SPDXRef-DOCUMENT".to_owned()),
    ("DocumentName", Presence::Mandatory, |s| s.name.to_owned()),
    ("DocumentNamespace", Presence::Mandatory, |s| {
        format!("http://spdx.org/spdxdocs/{}-{}", s.name, uuid::Uuid::new_v4())
    }),
    ("Creator", Presence::Mandatory, |_| CREATOR.to_owned()),
    ("Created", Presence::Mandatory, |_| {
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    }),
];

const COMPONENT: &[(&str, Presence, ComponentFn)] = &[
    ("PackageName", Presence::Mandatory, |_, d, _| d.name.clone()),
    ("SPDXID", Presence::Mandatory, |_, _, seq| {
        format!("SPDXRef-Package-{seq}")
    }),
    ("PackageVersion", Presence::Optional, |_, d, _| d.version.clone()),
    ("PackageDownloadLocation", Presence::Mandatory, no_assertion),
    // true would require file-level information
    ("FilesAnalyzed", Presence::Mandatory, |_, _, _| "false".to_owned()),
    ("PackageChecksum", Presence::Mandatory, |_, d, _| {
        format!("{}: {}", d.hash_type.name(), d.hash)
    }),
    ("PackageSourceInfo", Presence::Optional, |s, d, _| {
        purl(s.kind, d)
            .map(|p| format!("<text>{p}</text>"))
            .unwrap_or_default()
    }),
    ("PackageLicenseConcluded", Presence::Mandatory, |_, d, _| {
        if d.license.is_empty() {
            NO_ASSERTION.to_owned()
        } else {
            d.license.clone()
        }
    }),
    ("PackageLicenseDeclared", Presence::Mandatory, no_assertion),
    ("PackageCopyrightText", Presence::Mandatory, no_assertion),
    ("PackageComment", Presence::Optional, |s, d, _| {
        let trust = d.trust_level.name();
        let trust = if trust.is_empty() {
            String::new()
        } else {
            format!("{trust}, ")
        };
        format!("<text>{trust}{}, {}</text>", s.link_type, d.dep_type.name())
    }),
];

fn no_assertion(_: &Subject<'_>, _: &Dependency, _: usize) -> String {
    NO_ASSERTION.to_owned()
}

/// Render `artifact` and its dependencies as an SPDX tag:value document.
pub fn to_spdx_string(artifact: &impl Artifact) -> Result<String, BomError> {
    let mut out = String::new();
    write_spdx(&mut out, artifact)?;
    Ok(out)
}

/// Write the SPDX tag:value document for `artifact` to `out`.
pub fn write_spdx(out: &mut impl Write, artifact: &impl Artifact) -> Result<(), BomError> {
    let subject = Subject {
        name: base_name(artifact.path()),
        kind: artifact.kind(),
        link_type: link_type(artifact),
    };

    for &(tag, presence, value) in HEADER {
        let value = value(&subject);
        if value.is_empty() {
            if presence == Presence::Mandatory {
                return Err(BomError::MissingHeaderTag { tag });
            }
            continue;
        }
        writeln!(out, "{tag}: {value}").map_err(write_error)?;
    }

    out.write_str("\n##### Software components\n\n")
        .map_err(write_error)?;

    for (i, dep) in artifact.dependencies().iter().enumerate() {
        for &(tag, presence, value) in COMPONENT {
            let value = value(&subject, dep, i + 1);
            if value.is_empty() {
                if presence == Presence::Mandatory {
                    return Err(BomError::MissingComponentTag {
                        tag,
                        component: dep.name.clone(),
                    });
                }
                continue;
            }
            writeln!(out, "{tag}: {value}").map_err(write_error)?;
        }
        out.write_char('\n').map_err(write_error)?;
    }
    Ok(())
}

fn write_error(e: std::fmt::Error) -> BomError {
    BomError::Serialize {
        format: "SPDX",
        reason: e.to_string(),
    }
}
