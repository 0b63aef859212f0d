//! Wire formats: the JSON signal submission and the group publication.

use crate::error::ProtocolError;
use crate::signal::{ExternalNullifier, Signal};
use crate::utils::{field_from_hex, field_to_hex, strip_hex_prefix, validate_hex_string};
use crate::verifier::Submission;
use crate::MAX_SIGNAL_BYTES;
use anyhow::{Context, Result};
use log::debug;
use pasta_curves::pallas;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// JSON body of `POST /signals`, also written to disk by the prover.
///
/// Field elements are 64-character hex strings; `externalNullifier` carries
/// the scope string from which the verifier derives the field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalSubmission {
    pub signal: String,
    pub merkle_root: String,
    pub nullifier_hash: String,
    pub external_nullifier: String,
    /// Proof bytes as hex.
    pub proof: String,
}

impl SignalSubmission {
    /// Encodes a submission for transport.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidEncoding`] if the signal is not UTF-8.
    pub fn encode(submission: &Submission) -> Result<Self, ProtocolError> {
        let signal = std::str::from_utf8(submission.signal.as_bytes())
            .map_err(|e| ProtocolError::InvalidEncoding(format!("signal is not UTF-8: {e}")))?;

        Ok(Self {
            signal: signal.to_string(),
            merkle_root: field_to_hex(submission.root),
            nullifier_hash: field_to_hex(submission.nullifier_hash),
            external_nullifier: submission.external_nullifier.scope().to_string(),
            proof: hex::encode(&submission.proof),
        })
    }

    /// Structural checks that need no cryptography.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidEncoding`] for empty or non-hex
    /// fields, an oversized signal, or a proof above `max_proof_size` bytes.
    pub fn validate(&self, max_proof_size: usize) -> Result<(), ProtocolError> {
        debug!("Validating submission");
        debug!("Signal length: {}", self.signal.len());
        debug!("Proof hex length: {}", self.proof.len());

        if self.signal.len() > MAX_SIGNAL_BYTES {
            return Err(ProtocolError::InvalidEncoding(format!(
                "signal is {} bytes, at most {MAX_SIGNAL_BYTES} allowed",
                self.signal.len()
            )));
        }
        if self.merkle_root.is_empty() {
            return Err(ProtocolError::InvalidEncoding(
                "merkleRoot cannot be empty".into(),
            ));
        }
        if self.nullifier_hash.is_empty() {
            return Err(ProtocolError::InvalidEncoding(
                "nullifierHash cannot be empty".into(),
            ));
        }
        if !validate_hex_string(&self.proof) {
            return Err(ProtocolError::InvalidEncoding(
                "proof must be a non-empty hex string".into(),
            ));
        }
        let proof_bytes = strip_hex_prefix(&self.proof).len() / 2;
        if proof_bytes > max_proof_size {
            return Err(ProtocolError::InvalidEncoding(format!(
                "proof is {proof_bytes} bytes, at most {max_proof_size} allowed"
            )));
        }

        Ok(())
    }

    /// Validates and decodes into a [`Submission`].
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidEncoding`] or
    /// [`ProtocolError::InvalidScope`] for malformed fields.
    pub fn decode(&self, max_proof_size: usize) -> Result<Submission, ProtocolError> {
        self.validate(max_proof_size)?;

        let proof = hex::decode(strip_hex_prefix(&self.proof))
            .map_err(|e| ProtocolError::InvalidEncoding(format!("proof: {e}")))?;

        Ok(Submission {
            signal: Signal::from(self.signal.as_str()),
            external_nullifier: ExternalNullifier::from_scope(&self.external_nullifier)?,
            root: field_from_hex(&self.merkle_root)?,
            nullifier_hash: field_from_hex(&self.nullifier_hash)?,
            proof,
        })
    }
}

/// Parses a group publication: a JSON array of commitment hex strings in
/// leaf order.
///
/// # Errors
/// Returns [`ProtocolError::InvalidEncoding`] naming the first bad entry.
pub fn parse_group(json: &str) -> Result<Vec<pallas::Base>, ProtocolError> {
    let entries: Vec<String> = serde_json::from_str(json)
        .map_err(|e| ProtocolError::InvalidEncoding(format!("group is not a JSON array: {e}")))?;

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            field_from_hex(entry).map_err(|e| {
                ProtocolError::InvalidEncoding(format!("group member {i}: {e}"))
            })
        })
        .collect()
}

/// Serializes commitments in the format read by [`parse_group`].
///
/// # Errors
/// Fails only if JSON serialization fails.
pub fn group_to_json(commitments: &[pallas::Base]) -> Result<String> {
    let entries: Vec<String> = commitments.iter().copied().map(field_to_hex).collect();
    serde_json::to_string_pretty(&entries).context("Failed to serialize group to JSON")
}

/// Reads and parses a group file no larger than `max_file_size` bytes.
///
/// # Errors
/// Fails if the file is missing, too large, or malformed.
pub fn load_group_file(path: &Path, max_file_size: u64) -> Result<Vec<pallas::Base>> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read group file metadata: {}", path.display()))?;
    if metadata.len() > max_file_size {
        return Err(anyhow::anyhow!(
            "Group file too large: {} bytes (max {} bytes)",
            metadata.len(),
            max_file_size
        ));
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read group file: {}", path.display()))?;
    let group = parse_group(&content)
        .with_context(|| format!("Failed to parse group file: {}", path.display()))?;

    debug!("Loaded {} commitments from {}", group.len(), path.display());
    Ok(group)
}
