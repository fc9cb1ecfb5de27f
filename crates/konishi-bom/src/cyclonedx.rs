//! `CycloneDX` 1.5 output format.
//!
//! One `application` component describes the asset; every dependency
//! becomes a `library` component carrying its Package URL, hash, license
//! and `LinkType`/`TrustLevel` properties. The same document renders as
//! pretty JSON or as XML.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::artifact::Artifact;
use crate::dependency::{Dependency, HashType};
use crate::error::BomError;
use crate::output::{base_name, link_type};
use crate::purl::purl;

/// Serialization target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycloneDxFormat {
    /// Pretty-printed JSON.
    Json,
    /// Indented XML.
    Xml,
}

/// Top-level `CycloneDX` 1.5 BOM document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycloneDxBom {
    /// Always `"CycloneDX"`.
    pub bom_format: &'static str,
    /// Specification version.
    pub spec_version: &'static str,
    /// Unique serial number for this BOM instance.
    pub serial_number: String,
    /// BOM version (incremented on updates).
    pub version: u32,
    /// BOM metadata.
    pub metadata: Metadata,
    /// One component per dependency.
    pub components: Vec<Component>,
}

/// BOM metadata block.
#[derive(Debug, Serialize)]
pub struct Metadata {
    /// RFC 3339 generation time.
    pub timestamp: String,
    /// Tool that generated the BOM.
    pub tools: Vec<Tool>,
    /// The asset itself.
    pub component: Subject,
}

/// Tool descriptor.
#[derive(Debug, Serialize)]
pub struct Tool {
    /// Tool vendor.
    pub vendor: String,
    /// Tool name.
    pub name: String,
    /// Tool version.
    pub version: String,
}

/// The asset the BOM describes.
#[derive(Debug, Serialize)]
pub struct Subject {
    /// Always `"application"`.
    #[serde(rename = "type")]
    pub type_: &'static str,
    /// Base name of the asset path.
    pub name: String,
}

/// A dependency in the BOM.
#[derive(Debug, Serialize)]
pub struct Component {
    /// Document-unique reference, `<asset>-<n>`.
    #[serde(rename = "bom-ref")]
    pub bom_ref: String,
    /// Always `"library"`.
    #[serde(rename = "type")]
    pub type_: &'static str,
    /// Package name.
    pub name: String,
    /// Package version.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Cryptographic hashes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hashes: Vec<Hash>,
    /// License expression.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub licenses: Vec<License>,
    /// Package URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purl: Option<String>,
    /// `LinkType` and, once known, `TrustLevel`.
    pub properties: Vec<Property>,
}

/// A cryptographic hash.
#[derive(Debug, Serialize)]
pub struct Hash {
    /// Algorithm name (e.g. `"SHA-256"`).
    pub alg: &'static str,
    /// Hex-encoded hash value.
    pub content: String,
}

/// A license choice expressed as an SPDX expression.
#[derive(Debug, Serialize)]
pub struct License {
    /// SPDX license expression.
    pub expression: String,
}

/// A name/value property.
#[derive(Debug, Serialize)]
pub struct Property {
    /// Property name.
    pub name: &'static str,
    /// Property value.
    pub value: String,
}

/// `CycloneDX` algorithm name; `None` for algorithms it does not list.
#[must_use]
pub const fn hash_algorithm(hash_type: HashType) -> Option<&'static str> {
    match hash_type {
        HashType::Md5 => Some("MD5"),
        HashType::Sha1 => Some("SHA-1"),
        HashType::Sha256 => Some("SHA-256"),
        HashType::Sha384 => Some("SHA-384"),
        HashType::Sha512 => Some("SHA-512"),
        _ => None,
    }
}

fn component(name: &str, kind: &str, link: &'static str, seq: usize, dep: &Dependency) -> Component {
    let hashes = hash_algorithm(dep.hash_type)
        .filter(|_| !dep.hash.is_empty())
        .map(|alg| {
            vec![Hash {
                alg,
                content: dep.hash.clone(),
            }]
        })
        .unwrap_or_default();
    let licenses = if dep.license.is_empty() {
        Vec::new()
    } else {
        vec![License {
            expression: dep.license.clone(),
        }]
    };
    let mut properties = vec![Property {
        name: "LinkType",
        value: link.to_owned(),
    }];
    let trust = dep.trust_level.name();
    if !trust.is_empty() {
        properties.push(Property {
            name: "TrustLevel",
            value: trust.to_owned(),
        });
    }

    Component {
        bom_ref: format!("{name}-{seq}"),
        type_: "library",
        name: dep.name.clone(),
        version: dep.version.clone(),
        hashes,
        licenses,
        purl: purl(kind, dep),
        properties,
    }
}

/// Build the `CycloneDX` document for `artifact`.
pub fn to_cyclonedx(artifact: &impl Artifact) -> CycloneDxBom {
    let name = base_name(artifact.path());
    let link = link_type(artifact);
    let components = artifact
        .dependencies()
        .iter()
        .enumerate()
        .map(|(i, dep)| component(name, artifact.kind(), link, i + 1, dep))
        .collect();

    CycloneDxBom {
        bom_format: "CycloneDX",
        spec_version: "1.5",
        serial_number: format!("urn:uuid:{}", uuid::Uuid::new_v4()),
        version: 1,
        metadata: Metadata {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            tools: vec![Tool {
                vendor: "Konishi".to_owned(),
                name: "konishi-bom".to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
            }],
            component: Subject {
                type_: "application",
                name: name.to_owned(),
            },
        },
        components,
    }
}

/// Render `artifact` in the requested format.
pub fn render(artifact: &impl Artifact, format: CycloneDxFormat) -> Result<String, BomError> {
    let bom = to_cyclonedx(artifact);
    match format {
        CycloneDxFormat::Json => {
            serde_json::to_string_pretty(&bom).map_err(|e| BomError::Serialize {
                format: "CycloneDX JSON",
                reason: e.to_string(),
            })
        }
        CycloneDxFormat::Xml => xml::render(&bom),
    }
}

mod xml {
    //! XML mirror of the document: attributes and element nesting differ
    //! from the JSON shape.

    use serde::Serialize;

    use super::CycloneDxBom;
    use crate::error::BomError;

    const NAMESPACE: &str = "http://cyclonedx.org/schema/bom/1.5";

    #[derive(Serialize)]
    struct Bom<'a> {
        #[serde(rename = "@xmlns")]
        xmlns: &'static str,
        #[serde(rename = "@serialNumber")]
        serial_number: &'a str,
        #[serde(rename = "@version")]
        version: u32,
        metadata: Metadata<'a>,
        components: Components<'a>,
    }

    #[derive(Serialize)]
    struct Metadata<'a> {
        timestamp: &'a str,
        tools: Tools<'a>,
        component: Subject<'a>,
    }

    #[derive(Serialize)]
    struct Tools<'a> {
        tool: Vec<Tool<'a>>,
    }

    #[derive(Serialize)]
    struct Tool<'a> {
        vendor: &'a str,
        name: &'a str,
        version: &'a str,
    }

    #[derive(Serialize)]
    struct Subject<'a> {
        #[serde(rename = "@type")]
        type_: &'a str,
        name: &'a str,
    }

    #[derive(Serialize)]
    struct Components<'a> {
        component: Vec<Component<'a>>,
    }

    #[derive(Serialize)]
    struct Component<'a> {
        #[serde(rename = "@type")]
        type_: &'a str,
        #[serde(rename = "@bom-ref")]
        bom_ref: &'a str,
        name: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        version: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        hashes: Option<Hashes<'a>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        licenses: Option<Licenses<'a>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        purl: Option<&'a str>,
        properties: Properties<'a>,
    }

    #[derive(Serialize)]
    struct Hashes<'a> {
        hash: Vec<Hash<'a>>,
    }

    #[derive(Serialize)]
    struct Hash<'a> {
        #[serde(rename = "@alg")]
        alg: &'a str,
        #[serde(rename = "$text")]
        content: &'a str,
    }

    #[derive(Serialize)]
    struct Licenses<'a> {
        expression: &'a str,
    }

    #[derive(Serialize)]
    struct Properties<'a> {
        property: Vec<Property<'a>>,
    }

    #[derive(Serialize)]
    struct Property<'a> {
        #[serde(rename = "@name")]
        name: &'a str,
        #[serde(rename = "$text")]
        value: &'a str,
    }

    fn mirror(bom: &CycloneDxBom) -> Bom<'_> {
        let component = bom
            .components
            .iter()
            .map(|c| Component {
                type_: c.type_,
                bom_ref: &c.bom_ref,
                name: &c.name,
                version: Some(c.version.as_str()).filter(|v| !v.is_empty()),
                hashes: (!c.hashes.is_empty()).then(|| Hashes {
                    hash: c
                        .hashes
                        .iter()
                        .map(|h| Hash {
                            alg: h.alg,
                            content: &h.content,
                        })
                        .collect(),
                }),
                licenses: c.licenses.first().map(|l| Licenses {
                    expression: &l.expression,
                }),
                purl: c.purl.as_deref(),
                properties: Properties {
                    property: c
                        .properties
                        .iter()
                        .map(|p| Property {
                            name: p.name,
                            value: &p.value,
                        })
                        .collect(),
                },
            })
            .collect();

        Bom {
            xmlns: NAMESPACE,
            serial_number: &bom.serial_number,
            version: bom.version,
            metadata: Metadata {
                timestamp: &bom.metadata.timestamp,
                tools: Tools {
                    tool: bom
                        .metadata
                        .tools
                        .iter()
                        .map(|t| Tool {
                            vendor: &t.vendor,
                            name: &t.name,
                            version: &t.version,
                        })
                        .collect(),
                },
                component: Subject {
                    type_: bom.metadata.component.type_,
                    name: &bom.metadata.component.name,
                },
            },
            components: Components { component },
        }
    }

    fn serialize_error(e: impl std::fmt::Display) -> BomError {
        BomError::Serialize {
            format: "CycloneDX XML",
            reason: e.to_string(),
        }
    }

    pub(super) fn render(bom: &CycloneDxBom) -> Result<String, BomError> {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let mut ser = quick_xml::se::Serializer::with_root(&mut out, Some("bom"))
            .map_err(serialize_error)?;
        ser.indent(' ', 2);
        mirror(bom).serialize(ser).map_err(serialize_error)?;
        out.push('\n');
        Ok(out)
    }
}
