//! Multipart upload collection
//!
//! Uploaded buffers live only for the duration of a request.

use std::collections::HashMap;

use axum::extract::Multipart;
use tracing::debug;

use crate::error::ServerError;

/// One uploaded file
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub filename: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Display name for logs and error messages
    pub fn display_name(&self) -> &str {
        self.filename.as_deref().unwrap_or(&self.field)
    }
}

/// Everything a multipart request carried: files by role plus text fields
#[derive(Debug, Default)]
pub struct Upload {
    files: Vec<UploadedFile>,
    fields: HashMap<String, String>,
}

impl Upload {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ServerError> {
        let mut upload = Upload::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            let filename = field.file_name().map(str::to_string);
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field.bytes().await?;

            if filename.is_some() {
                debug!(field = %name, ?filename, size = bytes.len(), "Received file");
                upload.files.push(UploadedFile {
                    field: name,
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            } else {
                let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
                    ServerError::invalid_request(format!("Field '{}' is not valid UTF-8", name))
                })?;
                upload.fields.insert(name, text);
            }
        }

        Ok(upload)
    }

    /// All files uploaded under a role, in upload order
    pub fn take_files(&mut self, role: &str) -> Vec<UploadedFile> {
        let (taken, rest) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|f| f.field == role);
        self.files = rest;
        taken
    }

    /// Exactly the first file uploaded under a role
    pub fn take_file(&mut self, role: &str) -> Result<UploadedFile, ServerError> {
        self.take_files(role)
            .into_iter()
            .next()
            .ok_or_else(|| ServerError::invalid_request(format!("No file uploaded in field '{}'", role)))
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn take_field(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }
}
