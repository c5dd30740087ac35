//! File storage for CVs and handover documents
//!
//! Files are written flat into the upload directory as `<uuid>.<ext>` and
//! addressed by that bare name afterwards.

use crate::config::UploadConfig;
use crate::services::error::{ServiceError, ServiceResult};
use anyhow::Context;
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

/// A file accepted into storage
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    /// Download path, `/api/uploads/<filename>`
    pub path: String,
    pub filename: String,
    /// Name the client sent, if any
    pub original_name: Option<String>,
    pub size: u64,
    pub content_type: String,
}

pub struct UploadService {
    config: UploadConfig,
}

impl UploadService {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Check type and size, then write the file under a fresh name
    pub async fn store(
        &self,
        original_name: Option<&str>,
        content_type: &str,
        data: &[u8],
    ) -> ServiceResult<StoredFile> {
        if !self.config.is_type_allowed(content_type) {
            return Err(ServiceError::validation(format!(
                "Invalid file type: {}. Allowed types: {}",
                content_type,
                self.config.allowed_types.join(", ")
            )));
        }
        if data.is_empty() {
            return Err(ServiceError::validation("The file is empty"));
        }
        if data.len() as u64 > self.config.max_file_size {
            return Err(ServiceError::validation(format!(
                "File too large. Maximum size: {} MB",
                self.config.max_file_size / 1024 / 1024
            )));
        }

        fs::create_dir_all(&self.config.path)
            .await
            .context("Failed to create upload directory")?;
        let filename = format!("{}.{}", Uuid::new_v4(), self.config.get_extension(content_type));
        fs::write(self.config.path.join(&filename), data)
            .await
            .context("Failed to save file")?;

        tracing::info!(filename = %filename, size = data.len(), "File stored");
        Ok(StoredFile {
            path: format!("/api/uploads/{}", filename),
            filename,
            original_name: original_name.map(str::to_string),
            size: data.len() as u64,
            content_type: content_type.to_string(),
        })
    }

    /// Read a stored file and its content type
    pub async fn read(&self, name: &str) -> ServiceResult<(Vec<u8>, &'static str)> {
        let path = self.resolve(name)?;
        match fs::read(&path).await {
            Ok(data) => Ok((data, content_type_for(name))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ServiceError::not_found("File", name)),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read file").into()),
        }
    }

    pub async fn delete(&self, name: &str) -> ServiceResult<()> {
        let path = self.resolve(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ServiceError::not_found("File", name)),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete file").into()),
        }
    }

    fn resolve(&self, name: &str) -> ServiceResult<PathBuf> {
        if !is_bare_name(name) {
            return Err(ServiceError::validation("Invalid file name"));
        }
        Ok(self.config.path.join(name))
    }
}

/// A single path component without traversal
pub fn is_bare_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !name.starts_with('.')
}

fn content_type_for(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()).as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
