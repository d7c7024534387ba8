//! Document management handlers

use crate::AppState;
use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use lectern_common::{
    errors::{AppError, Result},
    metrics,
    models::Document,
};
use lectern_ingestion::hash_file;
use serde::Serialize;
use std::path::Path as FsPath;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Indexed,
    AlreadyIndexed,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub document_id: String,
    pub filename: String,
    pub status: UploadStatus,
    pub chunks_created: usize,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct DocumentList {
    pub documents: Vec<Document>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub document_id: String,
}

/// Final path component of a client filename, if it names a PDF
fn pdf_filename(raw: &str) -> Option<String> {
    let name = FsPath::new(raw.trim()).file_name()?.to_str()?.to_string();
    let is_pdf = FsPath::new(&name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    is_pdf.then_some(name)
}

fn only_pdf() -> AppError {
    AppError::Validation {
        message: "Only PDF files are supported".to_string(),
        field: Some("file".to_string()),
    }
}

async fn remove_quietly(path: &FsPath) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove file");
        }
    }
}

/// Stream a multipart field to `path`, returning bytes written
async fn write_field(field: &mut Field<'_>, path: &FsPath, limit: usize) -> Result<usize> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0usize;

    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                return Err(AppError::PayloadTooLarge {
                    size: written,
                    limit,
                })
            }
            Err(e) => {
                return Err(AppError::Validation {
                    message: e.body_text(),
                    field: Some("file".to_string()),
                })
            }
        };
        written += chunk.len();
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(written)
}

/// Upload and index a PDF
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let data_dir = state.config.storage.data_dir.clone();
    let limit = state.config.server.max_upload_bytes;

    let mut field = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.file_name().is_some() => break field,
            Ok(Some(_)) => continue,
            Ok(None) => {
                return Err(AppError::Validation {
                    message: "No file provided".to_string(),
                    field: Some("file".to_string()),
                })
            }
            Err(e) => {
                return Err(AppError::Validation {
                    message: e.body_text(),
                    field: Some("file".to_string()),
                })
            }
        }
    };

    let filename = field
        .file_name()
        .and_then(pdf_filename)
        .ok_or_else(only_pdf)?;

    tokio::fs::create_dir_all(&data_dir).await?;
    let part_path = data_dir.join(format!(".upload-{}.part", Uuid::new_v4()));

    let written = match write_field(&mut field, &part_path, limit).await {
        Ok(written) => written,
        Err(e) => {
            remove_quietly(&part_path).await;
            metrics::record_upload("rejected");
            return Err(e);
        }
    };

    let source_hash = match hash_file(&part_path).await {
        Ok(hash) => hash,
        Err(e) => {
            remove_quietly(&part_path).await;
            return Err(e.into());
        }
    };

    let already = match state.store.check_processed(&source_hash).await {
        Ok(already) => already,
        Err(e) => {
            remove_quietly(&part_path).await;
            return Err(e);
        }
    };

    if already {
        remove_quietly(&part_path).await;
        state.registry.insert_if_absent(&source_hash, &filename).await?;
        metrics::record_upload("already_indexed");
        info!(source_hash = %source_hash, filename = %filename, "Upload already indexed");

        return Ok(Json(UploadResponse {
            document_id: source_hash,
            filename,
            status: UploadStatus::AlreadyIndexed,
            chunks_created: 0,
            message: "Document was already indexed".to_string(),
        }));
    }

    let stored_path = state.config.document_path(&source_hash);
    if let Err(e) = tokio::fs::rename(&part_path, &stored_path).await {
        remove_quietly(&part_path).await;
        return Err(e.into());
    }

    let chunks_created = match state.indexer.index_new(&stored_path, &source_hash).await {
        Ok(chunks) => chunks,
        Err(e) => {
            remove_quietly(&stored_path).await;
            metrics::record_upload("failed");
            return Err(AppError::Indexing {
                message: e.to_string(),
            });
        }
    };

    if let Err(e) = state.registry.insert(&source_hash, &filename).await {
        warn!(
            source_hash = %source_hash,
            error = %e,
            "Failed to record filename, rolling back upload"
        );
        if let Err(rollback) = state.store.delete_source(&source_hash).await {
            warn!(
                source_hash = %source_hash,
                error = %rollback,
                "Failed to remove indexed chunks"
            );
        }
        remove_quietly(&stored_path).await;
        metrics::record_upload("failed");
        return Err(e);
    }
    metrics::record_upload("indexed");
    info!(
        source_hash = %source_hash,
        filename = %filename,
        bytes = written,
        chunks = chunks_created,
        "Upload indexed"
    );

    Ok(Json(UploadResponse {
        document_id: source_hash,
        filename,
        status: UploadStatus::Indexed,
        chunks_created,
        message: "Document successfully indexed".to_string(),
    }))
}

/// List indexed documents, pruning mapping entries whose chunks are gone
pub async fn list(State(state): State<AppState>) -> Result<Json<DocumentList>> {
    state.registry.prune(state.store.as_ref()).await?;
    let sources = state.store.get_all_sources().await?;
    let mapping = state.registry.load().await?;

    let documents: Vec<Document> = sources
        .into_iter()
        .map(|source| Document {
            filename: mapping
                .get(&source.source_hash)
                .cloned()
                .unwrap_or_else(|| Document::unknown_filename(&source.source_hash)),
            id: source.source_hash,
            chunk_count: source.chunk_count,
            indexed_at: Some(source.indexed_at),
        })
        .collect();

    Ok(Json(DocumentList {
        total: documents.len(),
        documents,
    }))
}

/// Delete a document's chunks, stored file and mapping entry
pub async fn delete(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if !state.store.check_processed(&document_id).await? {
        return Err(AppError::DocumentNotFound { id: document_id });
    }

    let removed = state.store.delete_source(&document_id).await?;
    remove_quietly(&state.config.document_path(&document_id)).await;
    let filename = state.registry.remove(&document_id).await?;

    info!(
        document_id = %document_id,
        filename = filename.as_deref().unwrap_or("unknown"),
        chunks = removed,
        "Document deleted"
    );

    Ok(Json(DeleteResponse {
        message: "Document deleted successfully".to_string(),
        document_id,
    }))
}
