//! End-to-end `konishi bom` run against a scripted stand-in for `docker`.
//!
//! The script answers `create`, `exec` and `cp` for an Alpine-like image
//! whose installed database is served from a tar file. Kept in its own
//! test binary so no other test forks while the script is being written.

#![cfg(unix)]
#![allow(deprecated)] // Command::cargo_bin

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

const INSTALLED: &str = "\
C:Q1AAECAwQFBgcICQoLDA0ODxAREhM=
P:musl
V:1.2.4-r2
L:MIT

C:Q1VGhlIGFwayBjaGVja3N1bQ==
P:busybox
V:1.36.1-r5
L:GPL-2.0-only
";

fn write_installed_tar(path: &Path) {
    let file = std::fs::File::create(path).unwrap();
    let mut builder = tar::Builder::new(file);
    let mut header = tar::Header::new_gnu();
    header.set_size(INSTALLED.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "installed", INSTALLED.as_bytes())
        .unwrap();
    builder.finish().unwrap();
}

fn write_fake_docker(dir: &Path) -> std::path::PathBuf {
    let tar_path = dir.join("installed.tar");
    write_installed_tar(&tar_path);

    let script = format!(
        r#"#!/bin/sh
case "$1" in
  create) echo fake0123 ;;
  start|wait|stop|rm) ;;
  attach) cat >/dev/null ;;
  exec)
    shift 2
    [ "$1" = apk ] || exit 127 ;;
  cp)
    case "$2" in
      *:/lib/apk/db/installed) cat "{tar}" ;;
      *) echo "Error: Could not find the file $2" >&2; exit 1 ;;
    esac ;;
  *) exit 1 ;;
esac
"#,
        tar = tar_path.display()
    );
    let path = dir.join("docker");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn bom_for_alpine_image() {
    let dir = tempfile::tempdir().unwrap();
    let docker = write_fake_docker(dir.path());
    let config = dir.path().join("config.toml");
    std::fs::write(
        &config,
        format!(
            "[docker]\nbinary = \"{}\"\nclose_timeout_secs = 2\n",
            docker.display()
        ),
    )
    .unwrap();
    let spdx = dir.path().join("bom.spdx");
    let cdx = dir.path().join("bom.json");

    konishi_bom(&config)
        .arg("--spdx")
        .arg(&spdx)
        .arg("--cdx-json")
        .arg(&cdx)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("busybox@1.36.1-r5")
                .and(predicate::str::contains(
                    "musl@1.2.4-r2     000102030405060708090a0b0c0d0e0f10111213",
                )),
        );

    let spdx = std::fs::read_to_string(&spdx).unwrap();
    assert!(spdx.contains("DocumentName: alpine:3.19\n"));
    assert!(spdx.contains("PackageName: musl\n"));
    assert!(spdx.contains("PackageChecksum: SHA1: 000102030405060708090a0b0c0d0e0f10111213\n"));

    let cdx: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&cdx).unwrap()).unwrap();
    assert_eq!(cdx["bomFormat"], "CycloneDX");
    assert_eq!(cdx["components"].as_array().map(Vec::len), Some(2));

    let output = konishi_bom(&config)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let deps: serde_json::Value = serde_json::from_slice(&output).expect("valid JSON");
    assert_eq!(deps[0]["name"], "musl");
    assert_eq!(deps[0]["kind"], "apk");
    assert_eq!(deps[0]["type"], "Direct");
}

fn konishi_bom(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("konishi").expect("konishi binary not found");
    cmd.args(["bom", "docker://alpine:3.19", "--config"]).arg(config);
    cmd
}
