//! Alpine installed-package database (`/lib/apk/db/installed`).
//!
//! Records are blocks of `X:value` lines separated by a blank line. The
//! checksum line carries a two-character format marker (`Q1`, SHA-1)
//! followed by the base64 digest.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::dependency::{Dependency, HashType};
use crate::error::BomError;
use crate::executor::Executor;

const INSTALLED_DB: &str = "/lib/apk/db/installed";
const KIND: &str = "apk";

pub(super) async fn packages<E: Executor>(executor: &E) -> Result<Vec<Dependency>, BomError> {
    let buf = executor.read_file(INSTALLED_DB).await?;
    parse_installed(&buf)
}

fn parse_installed(buf: &[u8]) -> Result<Vec<Dependency>, BomError> {
    let text = String::from_utf8_lossy(buf);
    let mut deps = Vec::new();
    let mut current = new_record();

    for (n, line) in text.lines().enumerate() {
        if line.is_empty() {
            if !current.name.is_empty() {
                deps.push(std::mem::replace(&mut current, new_record()));
            }
            continue;
        }
        let Some(value) = line.get(2..).map(str::trim_start) else {
            continue;
        };
        match line.as_bytes()[0] {
            b'P' => current.name = value.to_owned(),
            b'V' => current.version = value.to_owned(),
            b'L' => current.license = value.to_owned(),
            b'C' => {
                let digest = value
                    .get(2..)
                    .and_then(|b64| STANDARD.decode(b64).ok())
                    .ok_or(BomError::MalformedChecksum { line: n + 1 })?;
                current.hash = hex::encode(digest);
                current.hash_type = HashType::Sha1;
            }
            _ => {}
        }
    }
    if !current.name.is_empty() {
        deps.push(current);
    }
    Ok(deps)
}

fn new_record() -> Dependency {
    Dependency {
        kind: KIND.to_owned(),
        ..Dependency::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSTALLED: &str = "\
C:Q1VGhlIGFwayBjaGVja3N1bQ==
P:musl
V:1.2.4-r2
A:x86_64
L:MIT
T:the musl c library (libc) implementation

C:Q1AAECAwQFBgcICQoLDA0ODxAREhM=
P:busybox
V:1.36.1-r5
L:GPL-2.0-only

";

    #[test]
    fn parses_records_in_file_order() {
        let deps = parse_installed(INSTALLED.as_bytes()).expect("parse");
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "musl");
        assert_eq!(deps[0].version, "1.2.4-r2");
        assert_eq!(deps[0].license, "MIT");
        assert_eq!(deps[0].kind, "apk");
        assert_eq!(deps[0].hash, hex::encode("The apk checksum"));
        assert_eq!(deps[1].name, "busybox");
        assert_eq!(
            deps[1].hash,
            "000102030405060708090a0b0c0d0e0f10111213"
        );
        assert_eq!(deps[1].hash_type, HashType::Sha1);
    }

    #[test]
    fn tagged_values_with_space_after_colon() {
        let record = "P: foo\nV: 1.0\nC: Q1AbCdEfGh\n\n";
        let deps = parse_installed(record.as_bytes()).expect("parse");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "foo");
        assert_eq!(deps[0].version, "1.0");
        assert_eq!(deps[0].hash_type, HashType::Sha1);
        let expected = STANDARD.decode("AbCdEfGh").expect("valid base64");
        assert_eq!(deps[0].hash, hex::encode(expected));
    }

    #[test]
    fn last_record_without_trailing_blank_line() {
        let deps = parse_installed(b"P:zlib\nV:1.3-r0\n").expect("parse");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "zlib");
    }

    #[test]
    fn malformed_checksum_fails_the_build() {
        let record = "P:ok\nC:Q1AAEC\n\nP:bad\nC:Q1!!notbase64!!\n\n";
        let err = parse_installed(record.as_bytes()).expect_err("malformed");
        assert!(matches!(err, BomError::MalformedChecksum { line: 5 }));
    }

    #[test]
    fn empty_database_has_no_packages() {
        assert!(parse_installed(b"").expect("parse").is_empty());
        assert!(parse_installed(b"\n\n").expect("parse").is_empty());
    }
}
