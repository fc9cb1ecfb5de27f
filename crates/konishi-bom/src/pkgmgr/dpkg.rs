//! Debian package database.
//!
//! Three passes, each indexed by package name:
//! 1. `Package:`/`Version:` records from the status file,
//! 2. a SHA-256 over each package's `.md5sums` list,
//! 3. the license named in `/usr/share/doc/<package>/copyright`.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::blocking;
use crate::dependency::{Dependency, HashType};
use crate::error::BomError;
use crate::executor::{Executor, TarStream};

const STATUS_FILE: &str = "/var/lib/dpkg/status";
const STATUS_DIR: &str = "/var/lib/dpkg/status.d";
const INFO_DIR: &str = "/var/lib/dpkg/info";
const DOC_DIR: &str = "/usr/share/doc";
const KIND: &str = "dpkg";

const LICENSE_PREFIX: &str = "License: ";
const COMMON_LICENSES: &str = "/usr/share/common-licenses/";

pub(super) async fn packages<E: Executor>(executor: &E) -> Result<Vec<Dependency>, BomError> {
    let status = read_status(executor).await?;
    let deps = parse_status(&status);

    let md5sums = executor.read_dir(INFO_DIR).await?;
    let deps = blocking(move || {
        let mut deps = deps;
        apply_hashes(md5sums, &mut deps)?;
        Ok(deps)
    })
    .await?;

    let docs = executor.read_dir(DOC_DIR).await?;
    blocking(move || {
        let mut deps = deps;
        apply_licenses(docs, &mut deps)?;
        Ok(deps)
    })
    .await
}

/// Status text from the status file, or from the per-package files of a
/// `status.d` directory (distroless images) when the file is absent.
async fn read_status<E: Executor>(executor: &E) -> Result<String, BomError> {
    match executor.read_file(STATUS_FILE).await {
        Ok(buf) => Ok(String::from_utf8_lossy(&buf).into_owned()),
        Err(e) => {
            debug!(error = %e, "no dpkg status file, trying {STATUS_DIR}");
            let stream = executor.read_dir(STATUS_DIR).await?;
            blocking(move || concat_entries(stream, STATUS_DIR)).await
        }
    }
}

fn concat_entries(stream: TarStream, path: &'static str) -> Result<String, BomError> {
    let err = |source| BomError::Metadata {
        path: path.to_owned(),
        source,
    };
    let mut out = String::new();
    let mut ar = tar::Archive::new(stream);
    for entry in ar.entries().map_err(err)? {
        let mut entry = entry.map_err(err)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf).map_err(err)?;
        out.push_str(&String::from_utf8_lossy(&buf));
        out.push('\n');
    }
    Ok(out)
}

fn parse_status(text: &str) -> Vec<Dependency> {
    let mut deps = Vec::new();
    let mut current: Option<Dependency> = None;
    for line in text.lines() {
        let Some((field, value)) = line.split_once(": ") else {
            continue;
        };
        match field {
            "Package" => {
                deps.extend(current.take());
                current = Some(Dependency {
                    name: value.to_owned(),
                    kind: KIND.to_owned(),
                    ..Dependency::default()
                });
            }
            "Version" => {
                if let Some(dep) = current.as_mut() {
                    dep.version = value.to_owned();
                }
            }
            _ => {}
        }
    }
    deps.extend(current);
    deps
}

fn index(deps: &[Dependency]) -> HashMap<String, usize> {
    deps.iter()
        .enumerate()
        .map(|(i, d)| (d.name.clone(), i))
        .collect()
}

/// Hash each `<package>[:arch].md5sums` file into its package.
fn apply_hashes(stream: impl Read, deps: &mut [Dependency]) -> Result<(), BomError> {
    let err = |source| BomError::Metadata {
        path: INFO_DIR.to_owned(),
        source,
    };
    let by_name = index(deps);
    let mut ar = tar::Archive::new(stream);
    for entry in ar.entries().map_err(err)? {
        let mut entry = entry.map_err(err)?;
        let path = entry.path().map_err(err)?.into_owned();
        let Some(file) = path.file_name().and_then(|f| f.to_str()) else {
            continue;
        };
        let Some(stem) = file.strip_suffix(".md5sums") else {
            continue;
        };
        let name = stem.split(':').next().unwrap_or(stem);
        let Some(&i) = by_name.get(name) else {
            debug!(package = name, "md5sums for unknown package");
            continue;
        };
        let mut hasher = Sha256::new();
        std::io::copy(&mut entry, &mut hasher).map_err(err)?;
        deps[i].hash = hex::encode(hasher.finalize());
        deps[i].hash_type = HashType::Sha256;
    }
    Ok(())
}

/// Attach licenses from `doc/<package>/copyright` entries.
fn apply_licenses(stream: impl Read, deps: &mut [Dependency]) -> Result<(), BomError> {
    let err = |source| BomError::Metadata {
        path: DOC_DIR.to_owned(),
        source,
    };
    let by_name = index(deps);
    let mut ar = tar::Archive::new(stream);
    for entry in ar.entries().map_err(err)? {
        let entry = entry.map_err(err)?;
        let path = entry.path().map_err(err)?.into_owned();
        let Some(package) = copyright_package(&path) else {
            continue;
        };
        let Some(&i) = by_name.get(&package) else {
            continue;
        };
        deps[i].license = find_license(BufReader::new(entry)).map_err(err)?;
    }
    Ok(())
}

fn copyright_package(path: &Path) -> Option<String> {
    let path = path.to_str()?;
    let fields: Vec<&str> = path.split('/').collect();
    match fields.as_slice() {
        [_, package, "copyright"] => Some((*package).to_owned()),
        _ => None,
    }
}

/// First license named in a Debian copyright file.
///
/// A `License: <token>` line wins; otherwise a reference to a file under
/// `/usr/share/common-licenses/` names it.
fn find_license(mut reader: impl BufRead) -> std::io::Result<String> {
    let mut raw = Vec::new();
    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw)? == 0 {
            return Ok(String::new());
        }
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim_end_matches(['\n', '\r']);
        if let Some(rest) = line.strip_prefix(LICENSE_PREFIX) {
            let token = rest.split(char::is_whitespace).next().unwrap_or_default();
            return Ok(token.to_owned());
        }
        for (at, _) in line.match_indices(COMMON_LICENSES) {
            let name: String = line[at + COMMON_LICENSES.len()..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
                .collect();
            if !name.is_empty() {
                return Ok(name);
            }
        }
    }
}
