//! The `konishi bom` subcommand.
//!
//! Starts a throwaway container from an image, lists its installed
//! packages and writes the requested BOM documents.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use color_eyre::eyre::{Result, WrapErr, bail};
use konishi_bom::{Artifact, ContainerArtifact, Dependency, DockerExecutor, write_all};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;

/// Arguments for `konishi bom`.
#[derive(Args)]
pub struct BomArgs {
    /// Asset to inspect, e.g. `docker://alpine:3.19`.
    pub target: String,

    /// Write an SPDX tag:value document to PATH.
    #[arg(long, value_name = "PATH")]
    pub spdx: Option<PathBuf>,

    /// Write a `CycloneDX` JSON document to PATH.
    #[arg(long = "cdx-json", value_name = "PATH")]
    pub cdx_json: Option<PathBuf>,

    /// Write a `CycloneDX` XML document to PATH.
    #[arg(long = "cdx-xml", value_name = "PATH")]
    pub cdx_xml: Option<PathBuf>,

    /// Print the dependency list as JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Overall deadline in seconds for the whole run; cancels whatever
    /// container command is in flight when it expires.
    #[arg(long, value_name = "SECS")]
    pub exec_timeout: Option<u64>,

    /// Configuration file (defaults to the per-user config).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Image reference from a `docker://` or `docker:` target.
fn image_reference(target: &str) -> Result<&str> {
    let Some((scheme, rest)) = split_scheme(target) else {
        bail!("unsupported artifact format: {target}");
    };
    if scheme != "docker" {
        bail!("unsupported URI {target} for BOM");
    }
    let image = rest.trim_start_matches("//");
    if image.is_empty() {
        bail!("missing image name in {target}");
    }
    Ok(image)
}

/// `scheme:rest` when `target` starts with a URI scheme.
fn split_scheme(target: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = target.split_once(':')?;
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some((scheme, rest))
}

/// Execute the bom command.
pub async fn execute(args: BomArgs) -> Result<()> {
    let image = image_reference(&args.target)?;
    let config = Config::load(args.config.as_deref())?;
    let targets = config.outputs(args.spdx, args.cdx_json, args.cdx_xml);

    let cancel = CancellationToken::new();
    if let Some(secs) = args.exec_timeout {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!(secs, "run deadline reached, cancelling container commands");
            cancel.cancel();
        });
    }

    let executor = DockerExecutor::start(image, config.executor(), cancel.clone()).await?;
    let mut artifact = ContainerArtifact::open(image, executor, &config.probe.order).await?;
    info!(image, manager = %artifact.manager(), "identified package manager");

    artifact
        .resolve_dependencies()
        .await
        .wrap_err("cannot get dependencies")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(artifact.dependencies())?);
    } else {
        print!("{}", format_table(artifact.dependencies()));
    }

    write_all(&artifact, &targets)?;
    Ok(())
}

/// `name@version` and hash columns, sorted by name.
fn format_table(deps: &[Dependency]) -> String {
    let mut rows: Vec<(String, &str)> = deps
        .iter()
        .map(|d| (d.display_name(), d.hash.as_str()))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    let width = rows.iter().map(|(n, _)| n.len()).max().unwrap_or(0);

    rows.iter()
        .map(|(name, hash)| format!("{name:<width$} {hash}\n"))
        .collect()
}
