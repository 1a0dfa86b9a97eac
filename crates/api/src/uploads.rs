//! Multipart form intake and staged blob writes.
//!
//! Handlers buffer the whole form with [`read_multipart`], validate it, then
//! write files through [`StagedBlobs`]. If the database work that follows
//! fails, the staged blobs are discarded so storage never holds files no row
//! points at.

use axum::extract::Multipart;
use cantus_core::assets::{AssetKind, UploadedFile};
use cantus_core::storage::BlobStore;
use cantus_db::models::asset::StoredFile;

use crate::error::{AppError, AppResult};

/// One part of a multipart form.
#[derive(Debug)]
pub enum FormPart {
    Text { name: String, value: String },
    File { name: String, file: UploadedFile },
}

/// Buffer every part of a multipart form.
///
/// A file input left empty by the browser (no file name, no bytes) is
/// dropped, so "no file chosen" and "field absent" look the same.
pub async fn read_multipart(mut multipart: Multipart) -> AppResult<Vec<FormPart>> {
    let mut parts = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or("").to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        match file_name {
            Some(file_name) if file_name.is_empty() && data.is_empty() => {}
            Some(file_name) => parts.push(FormPart::File {
                name,
                file: UploadedFile {
                    file_name,
                    content_type,
                    bytes: data.to_vec(),
                },
            }),
            None => {
                let value = String::from_utf8(data.to_vec()).map_err(|_| {
                    AppError::BadRequest(format!("Field '{name}' is not valid UTF-8"))
                })?;
                parts.push(FormPart::Text { name, value });
            }
        }
    }

    Ok(parts)
}

/// Last path component of a client file name.
fn display_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() {
        "upload".to_string()
    } else {
        base.to_string()
    }
}

/// Blobs written during one request, pending the database commit.
#[derive(Debug, Default)]
pub struct StagedBlobs {
    locators: Vec<String>,
}

impl StagedBlobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `file` to the bucket for `kind` and remember its locator.
    pub async fn store(
        &mut self,
        blobs: &dyn BlobStore,
        kind: AssetKind,
        file: &UploadedFile,
    ) -> AppResult<StoredFile> {
        let locator = blobs
            .store(kind.bucket(), &file.file_name, &file.bytes)
            .await?;
        self.locators.push(locator.clone());
        Ok(StoredFile {
            file_locator: locator,
            original_name: display_name(&file.file_name),
            content_type: file.resolved_content_type(),
            size_bytes: file.size_bytes(),
        })
    }

    pub fn len(&self) -> usize {
        self.locators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }

    /// Delete everything staged so far (best effort).
    pub async fn discard(self, blobs: &dyn BlobStore) {
        if !self.locators.is_empty() {
            tracing::info!(count = self.locators.len(), "Discarding staged blobs");
        }
        delete_blobs(blobs, &self.locators).await;
    }
}

/// Delete blobs that no row references any more. Failures are logged only.
pub async fn delete_blobs(blobs: &dyn BlobStore, locators: &[String]) {
    for locator in locators {
        if let Err(e) = blobs.delete(locator).await {
            tracing::warn!(%locator, error = %e, "Failed to delete blob");
        }
    }
}
