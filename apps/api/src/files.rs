//! Uploaded resume files: spooling, the current selection, and data-URI reading.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Extensions the upload form offers. Advisory only: other files are still accepted.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "txt"];

const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum FileReadError {
    #[error("Failed to store {file_name}: {source}")]
    Spool {
        file_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {file_name}: {source}")]
    Read {
        file_name: String,
        #[source]
        source: std::io::Error,
    },
}

/// A resume upload spooled to a temporary file.
///
/// Cloning shares the spool; the file on disk is removed once the last handle drops.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    file_name: String,
    content_type: String,
    size: u64,
    spool: Arc<NamedTempFile>,
}

impl UploadedFile {
    /// Writes `bytes` to a fresh temporary file and wraps it.
    pub fn spool(
        file_name: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<Self, FileReadError> {
        let spool_err = |source| FileReadError::Spool {
            file_name: file_name.to_string(),
            source,
        };
        let mut spool = NamedTempFile::new().map_err(spool_err)?;
        spool.write_all(bytes).map_err(spool_err)?;
        spool.flush().map_err(spool_err)?;

        Ok(Self {
            file_name: file_name.to_string(),
            content_type: resolve_mime(file_name, content_type),
            size: bytes.len() as u64,
            spool: Arc::new(spool),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    fn path(&self) -> &Path {
        self.spool.path()
    }
}

/// Reads the file and encodes it as `data:<mime>;base64,<data>`.
pub async fn read_as_data_uri(file: &UploadedFile) -> Result<String, FileReadError> {
    let bytes = tokio::fs::read(file.path())
        .await
        .map_err(|source| FileReadError::Read {
            file_name: file.file_name.clone(),
            source,
        })?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(format!("data:{};base64,{}", file.content_type, encoded))
}

/// Splits a base64 data URI into its MIME type and payload.
pub fn split_data_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("data:")?;
    let (mime, data) = rest.split_once(";base64,")?;
    if mime.is_empty() {
        return None;
    }
    Some((mime, data))
}

pub fn has_accepted_extension(file_name: &str) -> bool {
    extension(file_name)
        .map(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// The declared content type wins unless it is missing or generic; then the extension decides.
fn resolve_mime(file_name: &str, declared: Option<&str>) -> String {
    if let Some(declared) = declared.map(str::trim) {
        if !declared.is_empty() && declared != FALLBACK_MIME {
            return declared.to_string();
        }
    }
    let mime = match extension(file_name).as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("txt") => "text/plain",
        _ => FALLBACK_MIME,
    };
    mime.to_string()
}

/// Summary of a selected file, as listed to the client.
#[derive(Debug, Clone, Serialize)]
pub struct SelectedFile {
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
}

/// Files chosen for the next batch, unique by file name, in upload order.
#[derive(Debug, Default)]
pub struct Selection {
    files: Vec<UploadedFile>,
}

impl Selection {
    /// Adds a file unless one with the same name is already selected.
    /// Returns whether the file was added.
    pub fn add(&mut self, file: UploadedFile) -> bool {
        if self.contains(file.file_name()) {
            return false;
        }
        self.files.push(file);
        true
    }

    /// Removes the file with this name. Returns whether anything was removed.
    pub fn remove(&mut self, file_name: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|f| f.file_name() != file_name);
        self.files.len() != before
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.files.iter().any(|f| f.file_name() == file_name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Handles to every selected file, in order.
    pub fn snapshot(&self) -> Vec<UploadedFile> {
        self.files.clone()
    }

    pub fn list(&self) -> Vec<SelectedFile> {
        self.files
            .iter()
            .map(|f| SelectedFile {
                file_name: f.file_name().to_string(),
                content_type: f.content_type().to_string(),
                size: f.size(),
            })
            .collect()
    }
}
