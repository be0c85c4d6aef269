use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::services::AuthUser,
    bills,
    scan::{
        dto::{AdviceResponse, ScanResponse},
        gemini::InlineDocument,
        services::{self, ScanSource},
    },
    state::AppState,
};

pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route("/scan", post(scan_bill))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

pub fn advice_routes() -> Router<AppState> {
    Router::new().route("/advice", get(get_advice))
}

/// POST /scan (multipart)
/// Field `file` (image or PDF) or field `text` (pasted bill text).
#[instrument(skip(state, mp))]
pub async fn scan_bill(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<Json<ScanResponse>, (StatusCode, String)> {
    let mut file: Option<(Bytes, String)> = None;
    let mut text: Option<String> = None;

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("file") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
                file = Some((data, content_type));
            }
            Some("text") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
                text = Some(value);
            }
            _ => {}
        }
    }

    let extractor = state.extractor.as_ref();
    let response = match (file, text) {
        (Some((data, content_type)), _) => {
            if services::ext_from_mime(&content_type).is_none() {
                warn!(user_id = %user_id, content_type = %content_type, "unsupported scan type");
                return Err((
                    StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    "Upload an image or a PDF".into(),
                ));
            }
            if data.is_empty() {
                return Err((StatusCode::BAD_REQUEST, "file is empty".into()));
            }

            let key = services::store_document(
                state.storage.as_ref(),
                user_id,
                data.clone(),
                &content_type,
            )
            .await
            .map_err(internal)?;

            let doc = InlineDocument {
                mime_type: &content_type,
                data: &data,
            };
            let extracted = services::extract_bill(extractor, ScanSource::Document(doc)).await;
            ScanResponse {
                document_key: Some(key),
                extracted,
            }
        }
        (None, Some(text)) if !text.trim().is_empty() => ScanResponse {
            document_key: None,
            extracted: services::extract_bill(extractor, ScanSource::Text(&text)).await,
        },
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                "file or text is required".into(),
            ))
        }
    };

    info!(
        user_id = %user_id,
        stored = response.document_key.is_some(),
        extracted = response.extracted.is_some(),
        "bill scanned"
    );
    Ok(Json(response))
}

#[instrument(skip(state))]
pub async fn get_advice(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<AdviceResponse>, (StatusCode, String)> {
    let bills = bills::repo::list_by_user(&state.db, user_id)
        .await
        .map_err(internal)?;
    let advice = services::financial_advice(state.extractor.as_ref(), &bills).await;
    Ok(Json(AdviceResponse { advice }))
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "scan request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
