//! Relay handler: POST /send

use super::SendResponse;
use crate::api::AppState;
use crate::error::Error;
use crate::types::DeliveryRequest;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// POST /send - Relay a media batch to every destination
///
/// Also served at `/api/v1/send`. Delivery failures do not change the status
/// code: the pipeline ran, so the reply is 200 with `ok` reporting whether every
/// item reached every destination.
#[utoipa::path(
    post,
    path = "/send",
    tag = "relay",
    request_body = DeliveryRequest,
    responses(
        (status = 200, description = "Pipeline ran; outcomes per destination", body = SendResponse),
        (status = 400, description = "Malformed body or empty batch", body = crate::error::ApiError),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ApiError),
        (status = 500, description = "Server is not configured to deliver", body = crate::error::ApiError)
    )
)]
pub async fn send_media(
    State(state): State<AppState>,
    payload: Result<Json<DeliveryRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "Rejected malformed send request");
            return Error::Validation(rejection.body_text()).into_response();
        }
    };

    match state.relay.deliver(&request).await {
        Ok(report) => {
            let ok = report.is_complete();
            let message = if ok {
                format!("Delivered {} item(s).", report.delivered)
            } else {
                format!(
                    "Delivered {} item(s), {} failed.",
                    report.delivered, report.failed
                )
            };

            (
                StatusCode::OK,
                Json(SendResponse {
                    ok,
                    message,
                    data: Some(report),
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Send request failed");
            e.into_response()
        }
    }
}
