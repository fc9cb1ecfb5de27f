//! Red Hat package database (`/var/lib/rpm/Packages`).
//!
//! A package hash is the XOR of all its per-file digests. Files without a
//! digest (symlinks, directories) do not contribute, and packages with no
//! digested files are left out.

use std::io::Write as _;

use tracing::debug;

use super::blocking;
use crate::dependency::Dependency;
use crate::error::BomError;
use crate::executor::Executor;
use crate::rpmdb::{self, RpmPackage};

const PACKAGES_DB: &str = "/var/lib/rpm/Packages";
const KIND: &str = "rpm";
const NO_LICENSE: &str = "NONE";

pub(super) async fn packages<E: Executor>(executor: &E) -> Result<Vec<Dependency>, BomError> {
    let buf = executor.read_file(PACKAGES_DB).await?;
    blocking(move || {
        let mut staged = tempfile::Builder::new().prefix("konishi.rpmdb").tempfile()?;
        staged.write_all(&buf)?;
        staged.flush()?;
        let file = staged.reopen()?;
        // the open handle keeps the data readable after the path is gone
        staged.close()?;
        let pkgs = rpmdb::read_packages(file)?;
        to_dependencies(pkgs)
    })
    .await
}

fn to_dependencies(pkgs: Vec<RpmPackage>) -> Result<Vec<Dependency>, BomError> {
    let mut deps = Vec::with_capacity(pkgs.len());
    for pkg in pkgs {
        let hash = fold_digests(&pkg.name, &pkg.file_digests)?;
        if hash.is_empty() {
            debug!(package = %pkg.name, "no file digests, skipping");
            continue;
        }
        let license = match pkg.license {
            Some(l) if !l.is_empty() => l,
            _ => NO_LICENSE.to_owned(),
        };
        deps.push(Dependency {
            version: format!("{}-{}", pkg.version, pkg.release),
            hash,
            hash_type: pkg.digest_algorithm,
            kind: KIND.to_owned(),
            license,
            ..Dependency::new(pkg.name, "")
        });
    }
    Ok(deps)
}

/// XOR of every non-empty hex digest, hex encoded.
fn fold_digests(package: &str, digests: &[String]) -> Result<String, BomError> {
    let mut acc: Vec<u8> = Vec::new();
    for digest in digests.iter().filter(|d| !d.is_empty()) {
        let bytes = hex::decode(digest).map_err(|e| BomError::MalformedDigest {
            package: package.to_owned(),
            reason: e.to_string(),
        })?;
        if acc.is_empty() {
            acc = bytes;
        } else if acc.len() != bytes.len() {
            return Err(BomError::MalformedDigest {
                package: package.to_owned(),
                reason: format!("digest length {} differs from {}", bytes.len(), acc.len()),
            });
        } else {
            acc.iter_mut().zip(&bytes).for_each(|(a, b)| *a ^= b);
        }
    }
    Ok(hex::encode(acc))
}
