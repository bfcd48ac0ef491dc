use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{Cursor, Read};
use log::{info, debug};
use crate::core::error::{PipelineError, PipelineResult};
use crate::core::invocation::S3Location;
use crate::core::session::ArtifactSession;

/// Entry inside the zipped source artifact that carries build metadata.
pub const ARTIFACT_FILE: &str = "outfile.txt";

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct TrainingJobArtifact {
    pub training_job_name: String,
}

pub async fn fetch_commit_id(session: &ArtifactSession, location: &S3Location) -> PipelineResult<String> {
    let bytes = session.read(location).await?;
    debug!("Downloaded {} byte source artifact", bytes.len());
    let commit = commit_id_from_archive(&bytes)?;
    info!("Source artifact built from commit {}", commit);
    Ok(commit)
}

pub async fn fetch_training_job_name(session: &ArtifactSession, location: &S3Location) -> PipelineResult<String> {
    let bytes = session.read(location).await?;
    training_job_name_from(&bytes)
}

pub fn commit_id_from_archive(bytes: &[u8]) -> PipelineResult<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| unreadable(format!("not a zip archive: {}", e)))?;
    let mut entry = archive.by_name(ARTIFACT_FILE)
        .map_err(|e| unreadable(format!("missing {}: {}", ARTIFACT_FILE, e)))?;
    let mut contents = String::new();
    entry.read_to_string(&mut contents)
        .map_err(|e| unreadable(format!("{} is not UTF-8 text: {}", ARTIFACT_FILE, e)))?;

    let doc: Value = serde_json::from_str(&contents)
        .map_err(|e| unreadable(format!("{} is not JSON: {}", ARTIFACT_FILE, e)))?;
    match doc.get("COMMIT_ID") {
        Some(Value::String(commit)) => Ok(commit.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(unreadable(format!("{} has no COMMIT_ID", ARTIFACT_FILE))),
    }
}

pub fn training_job_name_from(bytes: &[u8]) -> PipelineResult<String> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| unreadable(format!("training job artifact is not UTF-8: {}", e)))?;
    let first_line = text.lines().next().unwrap_or_default();
    let artifact: TrainingJobArtifact = serde_json::from_str(first_line)
        .map_err(|e| unreadable(format!("training job artifact is malformed: {}", e)))?;
    Ok(artifact.training_job_name)
}

pub fn training_job_artifact(job_name: &str) -> PipelineResult<Vec<u8>> {
    let artifact = TrainingJobArtifact { training_job_name: job_name.to_string() };
    serde_json::to_vec(&artifact)
        .map_err(|e| unreadable(format!("failed to encode training job artifact: {}", e)))
}

fn unreadable(message: String) -> PipelineError {
    PipelineError::ArtifactUnreadable(message)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    pub(crate) fn zipped(name: &str, body: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file(name, FileOptions::default()).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn reads_commit_id_from_zipped_outfile() {
        let bytes = zipped(ARTIFACT_FILE, r#"{"COMMIT_ID": "4f2a9c1"}"#);
        assert_eq!(commit_id_from_archive(&bytes).unwrap(), "4f2a9c1");
    }

    #[test]
    fn rejects_archives_without_outfile() {
        let bytes = zipped("other.txt", r#"{"COMMIT_ID": "4f2a9c1"}"#);
        assert!(matches!(commit_id_from_archive(&bytes), Err(PipelineError::ArtifactUnreadable(_))));
    }

    #[test]
    fn rejects_outfile_without_commit() {
        let bytes = zipped(ARTIFACT_FILE, r#"{"BRANCH": "main"}"#);
        let err = commit_id_from_archive(&bytes).unwrap_err();
        assert!(err.to_string().contains("COMMIT_ID"));
    }

    #[test]
    fn rejects_non_zip_payloads() {
        assert!(matches!(commit_id_from_archive(b"plain text"), Err(PipelineError::ArtifactUnreadable(_))));
    }

    #[test]
    fn training_job_name_is_read_from_first_line() {
        let body = b"{\"training_job_name\": \"sentiment-2024-01-01-12-00-00\"}\ntrailing";
        assert_eq!(training_job_name_from(body).unwrap(), "sentiment-2024-01-01-12-00-00");
    }

    #[test]
    fn training_stage_output_is_readable_by_deployment_stage() {
        let bytes = training_job_artifact("sentiment-2024-01-01-12-00-00").unwrap();
        assert_eq!(training_job_name_from(&bytes).unwrap(), "sentiment-2024-01-01-12-00-00");
    }

    #[test]
    fn empty_training_job_artifact_is_unreadable() {
        assert!(matches!(training_job_name_from(b""), Err(PipelineError::ArtifactUnreadable(_))));
    }
}
