//! JSON response envelopes for an HTTP front end
//!
//! Each function maps a service call to a status code and a JSON body so a
//! transport layer only has to copy them onto the wire.

use crate::error::IngestError;
use crate::service::{IngestService, IngestSource};
use crate::types::{JobKind, RecordQuery};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

/// Status code and JSON body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Value,
}

impl ApiResponse {
    fn ok<T: Serialize>(body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self { status: 200, body },
            Err(e) => Self::error(&IngestError::from(e)),
        }
    }

    fn error(err: &IngestError) -> Self {
        Self {
            status: err.status_code(),
            body: json!({ "error": err.to_string() }),
        }
    }

    /// Whether the status is 2xx
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Start an import; 202 when accepted
pub fn start_import(service: &IngestService, kind: JobKind, source: IngestSource) -> ApiResponse {
    match service.start(kind, source) {
        Ok(handle) => ApiResponse {
            status: 202,
            body: json!({
                "message": "Import started in background",
                "job_id": handle.job_id(),
                "kind": kind,
                "total_rows": 0,
            }),
        },
        Err(e) => {
            warn!(
                %kind,
                status = e.status_code(),
                category = e.code().category(),
                "import request rejected: {e}"
            );
            ApiResponse::error(&e)
        }
    }
}

/// Progress snapshot of `kind`
#[must_use]
pub fn import_progress(service: &IngestService, kind: JobKind) -> ApiResponse {
    ApiResponse::ok(&service.progress(kind))
}

/// One page of stored records of `kind`
pub async fn list_records(
    service: &IngestService,
    kind: JobKind,
    query: &RecordQuery,
) -> ApiResponse {
    let page = match kind {
        JobKind::Pipeline => service
            .list_pipelines(query)
            .await
            .map(|page| ApiResponse::ok(&page)),
        JobKind::BalanceDrop => service
            .list_balances(query)
            .await
            .map(|page| ApiResponse::ok(&page)),
        JobKind::Rfmt => service
            .list_rfmts(query)
            .await
            .map(|page| ApiResponse::ok(&page)),
    };
    page.unwrap_or_else(|e| ApiResponse::error(&e))
}
