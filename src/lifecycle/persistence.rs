// src/lifecycle/persistence.rs
//
// On-disk format: a JSON envelope holding the serialized artifact as a string plus its
// SHA-256, so truncation or hand edits are caught before deserialization.

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::artifact::ModelArtifact;

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug)]
struct ArtifactEnvelope {
    format_version: u32,
    sha256: String,
    payload: String,
}

fn checksum(payload: &str) -> String {
    hex::encode(Sha256::digest(payload.as_bytes()))
}

// Unique per process and artifact so concurrent writers never share a temp file.
fn temp_path_for(path: &Path, artifact: &ModelArtifact) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    path.with_file_name(format!(
        ".{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        artifact.artifact_id()
    ))
}

/// Writes the artifact next to `path` and renames it into place, so a reader never
/// sees a half-written file.
pub fn save_artifact(artifact: &ModelArtifact, path: &Path) -> Result<()> {
    if !artifact.is_trained() {
        return Err(anyhow!("Refusing to persist an untrained model"));
    }
    artifact.validate()?;

    let payload = serde_json::to_string(artifact).context("Failed to serialize model")?;
    let envelope = ArtifactEnvelope {
        format_version: ARTIFACT_FORMAT_VERSION,
        sha256: checksum(&payload),
        payload,
    };
    let bytes = serde_json::to_vec(&envelope).context("Failed to serialize model envelope")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let tmp_path = temp_path_for(path, artifact);
    fs::write(&tmp_path, &bytes)
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to move model into place at {}", path.display()))?;

    info!(
        "💾 Saved model {} to {} ({} bytes)",
        artifact.artifact_id(),
        path.display(),
        bytes.len()
    );
    Ok(())
}

/// Reads and verifies a persisted artifact. Any failure here means the file is unusable.
pub fn load_artifact(path: &Path) -> Result<ModelArtifact> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read model file {}", path.display()))?;
    let envelope: ArtifactEnvelope =
        serde_json::from_str(&raw).context("Model file is not a valid model envelope")?;

    if envelope.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(anyhow!(
            "Unsupported model format version {} (expected {})",
            envelope.format_version,
            ARTIFACT_FORMAT_VERSION
        ));
    }
    let actual = checksum(&envelope.payload);
    if actual != envelope.sha256 {
        return Err(anyhow!(
            "Model checksum mismatch: stored {}, computed {}",
            envelope.sha256,
            actual
        ));
    }

    let artifact: ModelArtifact =
        serde_json::from_str(&envelope.payload).context("Failed to deserialize model")?;
    artifact
        .validate_against_survey_fields()
        .context("Persisted model failed validation")?;
    debug!(
        "Loaded model {} trained at {}",
        artifact.artifact_id(),
        artifact.trained_at()
    );
    Ok(artifact)
}
