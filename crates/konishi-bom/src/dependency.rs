//! The canonical dependency record shared by probes, resolvers and serializers.
//!
//! A [`Dependency`] is one installed package or BOM component. Its `hash`
//! is the ledger identity: two dependencies with the same hash are the same
//! artifact even when name or version strings differ.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Digest algorithm of a dependency hash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashType {
    /// Unknown or unsupported algorithm.
    #[default]
    Invalid,
    /// SHA-1.
    Sha1,
    /// SHA-224.
    Sha224,
    /// SHA-256.
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
    /// MD2.
    Md2,
    /// MD4.
    Md4,
    /// MD5.
    Md5,
    /// MD6.
    Md6,
}

impl HashType {
    const ALL: [Self; 10] = [
        Self::Invalid,
        Self::Sha1,
        Self::Sha224,
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
        Self::Md2,
        Self::Md4,
        Self::Md5,
        Self::Md6,
    ];

    /// Textual name as recorded in ledger metadata and SPDX checksums.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::Sha1 => "SHA1",
            Self::Sha224 => "SHA224",
            Self::Sha256 => "SHA256",
            Self::Sha384 => "SHA384",
            Self::Sha512 => "SHA512",
            Self::Md2 => "MD2",
            Self::Md4 => "MD4",
            Self::Md5 => "MD5",
            Self::Md6 => "MD6",
        }
    }

    /// Inverse of [`HashType::name`]; unrecognised names map to `Invalid`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == name)
            .unwrap_or(Self::Invalid)
    }
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ledger-derived attestation status of a dependency.
///
/// The declaration order is meaningful: `Invalid < Untrusted < Unsupported
/// < Unknown < Trusted`, and callers take the minimum across a dependency
/// set to find the worst level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TrustLevel {
    /// Not yet resolved.
    #[default]
    Invalid,
    /// Explicitly untrusted or signed with a revoked key.
    Untrusted,
    /// Marked unsupported.
    Unsupported,
    /// No ledger record.
    Unknown,
    /// Notarized as trusted.
    Trusted,
}

impl TrustLevel {
    /// Display name. Empty for `Invalid` so no annotation is emitted.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Invalid => "",
            Self::Untrusted => "Untrusted",
            Self::Unsupported => "Unsupported",
            Self::Unknown => "Unknown",
            Self::Trusted => "Trusted",
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a trust level name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid trust level `{0}`, supported values are trusted/unknown/unsupported/untrusted")]
pub struct ParseTrustLevelError(String);

impl FromStr for TrustLevel {
    type Err = ParseTrustLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trusted" | "t" => Ok(Self::Trusted),
            "unknown" | "unk" | "uk" => Ok(Self::Unknown),
            "unsupported" | "uns" | "us" => Ok(Self::Unsupported),
            "untrusted" | "unt" | "ut" => Ok(Self::Untrusted),
            _ => Err(ParseTrustLevelError(s.to_owned())),
        }
    }
}

/// Whether a dependency is declared by the asset or pulled in indirectly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepType {
    /// Declared by the asset itself.
    #[default]
    Direct,
    /// Pulled in through another dependency.
    Transient,
}

impl DepType {
    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Direct => "Direct",
            Self::Transient => "Transient",
        }
    }
}

/// One installed package or BOM component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Package name.
    pub name: String,
    /// Package version; empty for ecosystems without one.
    pub version: String,
    /// Hex-encoded content hash, the ledger lookup key.
    pub hash: String,
    /// Algorithm of `hash`.
    pub hash_type: HashType,
    /// Package-manager kind (`apk`, `dpkg`, `rpm`, ...).
    pub kind: String,
    /// License expression, empty when unknown.
    pub license: String,
    /// Set by trust resolution or notarization.
    pub trust_level: TrustLevel,
    /// Identity under which trust was established.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_id: Option<String>,
    /// Time of the ledger record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Direct or transient.
    #[serde(rename = "type")]
    pub dep_type: DepType,
}

impl Dependency {
    /// A fresh, unresolved dependency.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// `name@version`, as used in diagnostics.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}
