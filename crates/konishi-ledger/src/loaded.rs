//! Artifacts rebuilt from earlier notarization records.

use konishi_bom::{Artifact, BomError, DepType, Dependency, HashType};
use serde::Deserialize;
use tracing::warn;

use crate::error::LedgerError;
use crate::service::{Ledger, Status};

/// Set prefix under which the ledger indexes BOM links.
const SET_PREFIX: &str = "included_by_vcn";

/// Set suffixes holding direct dependencies; older records use no suffix.
const DIRECT_SUFFIXES: [&str; 2] = [".0", ""];
const TRANSIENT_SUFFIX: &str = ".1";

/// An artifact whose dependency set was read back from the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedArtifact {
    path: String,
    kind: String,
    deps: Vec<Dependency>,
}

impl Artifact for LoadedArtifact {
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

#[derive(Debug, Deserialize)]
struct Record {
    #[serde(rename = "Name", alias = "name", default)]
    name: String,
    #[serde(rename = "Hash", alias = "hash", default)]
    hash: String,
    #[serde(rename = "Kind", alias = "kind", default)]
    kind: String,
    #[serde(default)]
    metadata: RecordMetadata,
    #[serde(rename = "Status", alias = "status", default)]
    status: i32,
}

#[derive(Debug, Default, Deserialize)]
struct RecordMetadata {
    #[serde(default)]
    version: String,
    #[serde(rename = "hashType", default)]
    hash_type: String,
}

/// Load the artifact notarized under `hash` by `signer_id` together with
/// its linked dependencies.
///
/// Direct dependencies come first, then transient ones. Entries that are
/// not valid JSON are skipped with a warning.
pub async fn load_from_ledger<L: Ledger>(
    ledger: &L,
    hash: &str,
    signer_id: &str,
) -> Result<LoadedArtifact, LedgerError> {
    let owned;
    let signer_id = if signer_id.is_empty() {
        owned = ledger.signer_id();
        owned.as_str()
    } else {
        signer_id
    };

    let record = ledger.load_artifact(hash, signer_id).await?;
    let mut deps = Vec::new();
    for suffix in DIRECT_SUFFIXES {
        deps.extend(linked(ledger, signer_id, hash, suffix, DepType::Direct).await?);
    }
    deps.extend(linked(ledger, signer_id, hash, TRANSIENT_SUFFIX, DepType::Transient).await?);

    Ok(LoadedArtifact {
        path: record.name,
        kind: record.kind,
        deps,
    })
}

async fn linked<L: Ledger>(
    ledger: &L,
    signer_id: &str,
    hash: &str,
    suffix: &str,
    dep_type: DepType,
) -> Result<Vec<Dependency>, LedgerError> {
    let set = format!("{SET_PREFIX}.{signer_id}.{hash}{suffix}");
    let entries = ledger.scan_set(&set).await?;

    let mut deps = Vec::with_capacity(entries.len());
    for entry in entries {
        let record: Record = match serde_json::from_slice(&entry.value) {
            Ok(r) => r,
            Err(e) => {
                warn!(set = %set, error = %e, "skipping unparseable dependency record");
                continue;
            }
        };
        let trust_level = Status::from_code(record.status)
            .map_or(konishi_bom::TrustLevel::Unknown, Status::trust_level);
        deps.push(Dependency {
            name: record.name,
            version: record.metadata.version,
            hash: record.hash,
            hash_type: HashType::from_name(&record.metadata.hash_type),
            kind: record.kind,
            trust_level,
            signer_id: Some(signer_id.to_owned()),
            timestamp: Some(entry.timestamp),
            dep_type,
            ..Dependency::default()
        });
    }
    Ok(deps)
}
