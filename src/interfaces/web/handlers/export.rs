use axum::{
    Json,
    extract::Query,
    extract::rejection::JsonRejection,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{error, info};

use crate::core::deck::PresentationData;
use crate::core::export::exporter_for;

use super::error_response;

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "json".to_string()
}

pub async fn export_endpoint(
    Query(query): Query<ExportQuery>,
    payload: Result<Json<PresentationData>, JsonRejection>,
) -> Response {
    let deck = match payload {
        Ok(Json(deck)) => deck,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("invalid presentation: {}", rejection.body_text()),
            );
        }
    };
    let exporter = match exporter_for(&query.format) {
        Ok(e) => e,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match exporter.export(&deck) {
        Ok(bytes) => {
            info!(
                "Exported deck {} as {} ({} bytes)",
                deck.id,
                exporter.format(),
                bytes.len()
            );
            ([(header::CONTENT_TYPE, exporter.content_type())], bytes).into_response()
        }
        Err(e) => {
            error!("Export of deck {} failed: {}", deck.id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
