//! In-memory ledger for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{LedgerError, LookupError};
use crate::service::{Found, Ledger, LedgerArtifact, Lookup, SetEntry, SignRequest, Status};

pub(crate) const SIGNER: &str = "signer@example.com";

pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

#[derive(Default)]
pub(crate) struct FakeLedger {
    lookups: HashMap<String, Lookup>,
    artifacts: HashMap<String, LedgerArtifact>,
    sets: HashMap<String, Vec<SetEntry>>,
    features: Vec<String>,
    fail_lookup_call: Option<usize>,
    fail_sign_call: Option<usize>,
    pub(crate) lookup_batches: Mutex<Vec<Vec<String>>>,
    pub(crate) signed: Mutex<Vec<Vec<SignRequest>>>,
}

impl FakeLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_record(mut self, hash: &str, status: Status, verified: bool) -> Self {
        let artifact = LedgerArtifact {
            hash: hash.to_owned(),
            status,
            timestamp: at(1_700_000_000),
            signer: SIGNER.to_owned(),
            ..LedgerArtifact::default()
        };
        self.lookups
            .insert(hash.to_owned(), Ok(Found { artifact, verified }));
        self
    }

    pub(crate) fn with_revoked(mut self, hash: &str) -> Self {
        self = self.with_record(hash, Status::Trusted, true);
        if let Some(Ok(found)) = self.lookups.get_mut(hash) {
            found.artifact.revoked = Some(at(1_700_000_100));
        }
        self
    }

    pub(crate) fn with_lookup_error(mut self, hash: &str, reason: &str) -> Self {
        self.lookups
            .insert(hash.to_owned(), Err(LookupError::Failed(reason.to_owned())));
        self
    }

    pub(crate) fn with_artifact(mut self, artifact: LedgerArtifact) -> Self {
        self.artifacts.insert(artifact.hash.clone(), artifact);
        self
    }

    pub(crate) fn with_set(mut self, set: &str, values: &[&str]) -> Self {
        let entries = values
            .iter()
            .map(|v| SetEntry {
                value: v.as_bytes().to_vec(),
                timestamp: at(1_700_000_200),
            })
            .collect();
        self.sets.insert(set.to_owned(), entries);
        self
    }

    pub(crate) fn with_feature(mut self, feature: &str) -> Self {
        self.features.push(feature.to_owned());
        self
    }

    pub(crate) fn failing_lookup_call(mut self, call: usize) -> Self {
        self.fail_lookup_call = Some(call);
        self
    }

    pub(crate) fn failing_sign_call(mut self, call: usize) -> Self {
        self.fail_sign_call = Some(call);
        self
    }

    pub(crate) fn lookup_batch_sizes(&self) -> Vec<usize> {
        self.lookup_batches
            .lock()
            .expect("lock")
            .iter()
            .map(Vec::len)
            .collect()
    }

    pub(crate) fn signed_batches(&self) -> Vec<Vec<SignRequest>> {
        self.signed.lock().expect("lock").clone()
    }
}

impl Ledger for FakeLedger {
    async fn load_artifacts_by_hash(
        &self,
        _signer_id: &str,
        hashes: &[&str],
    ) -> Result<Vec<Lookup>, LedgerError> {
        let mut calls = self.lookup_batches.lock().expect("lock");
        calls.push(hashes.iter().map(|h| (*h).to_owned()).collect());
        if self.fail_lookup_call == Some(calls.len() - 1) {
            return Err(LedgerError::Remote("connection reset".to_owned()));
        }
        Ok(hashes
            .iter()
            .map(|h| {
                self.lookups
                    .get(*h)
                    .cloned()
                    .unwrap_or(Err(LookupError::NotFound))
            })
            .collect())
    }

    async fn sign_artifacts(&self, requests: &[SignRequest]) -> Result<String, LedgerError> {
        let mut signed = self.signed.lock().expect("lock");
        if self.fail_sign_call == Some(signed.len()) {
            return Err(LedgerError::Remote("transaction aborted".to_owned()));
        }
        signed.push(requests.to_vec());
        Ok(format!("tx-{}", signed.len()))
    }

    async fn require_feature(&self, feature: &str) -> Result<(), LedgerError> {
        if self.features.iter().any(|f| f == feature) {
            Ok(())
        } else {
            Err(LedgerError::FeatureUnsupported {
                feature: feature.to_owned(),
            })
        }
    }

    async fn load_artifact(
        &self,
        hash: &str,
        _signer_id: &str,
    ) -> Result<LedgerArtifact, LedgerError> {
        self.artifacts
            .get(hash)
            .cloned()
            .ok_or_else(|| LedgerError::Remote(format!("{hash}: artifact not found")))
    }

    async fn scan_set(&self, set: &str) -> Result<Vec<SetEntry>, LedgerError> {
        Ok(self.sets.get(set).cloned().unwrap_or_default())
    }

    fn signer_id(&self) -> String {
        SIGNER.to_owned()
    }
}
