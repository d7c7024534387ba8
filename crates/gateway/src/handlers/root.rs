//! Capability listing

use axum::Json;
use serde_json::{json, Value};

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Lectern document question answering API",
        "version": lectern_common::VERSION,
        "endpoints": {
            "health": "GET /api/health",
            "stats": "GET /api/stats",
            "upload": "POST /api/documents/upload",
            "list_documents": "GET /api/documents",
            "delete_document": "DELETE /api/documents/{document_id}",
            "query": "POST /api/query"
        }
    }))
}
