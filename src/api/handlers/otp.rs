//! `POST /send-otp` and `POST /verify-otp`.

use axum::{extract::Extension, Json};
use std::sync::Arc;

use super::types::{OkResponse, SendOtpRequest, VerifyOtpRequest};
use crate::otp::{ErrorBody, OtpError, OtpService};

/// Issue a code for the address and email it.
#[utoipa::path(
    post,
    path = "/send-otp",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "Code issued and sent", body = OkResponse),
        (status = 400, description = "Email required", body = ErrorBody),
        (status = 429, description = "Resend throttled or quota reached", body = ErrorBody),
        (status = 500, description = "Delivery or storage failure", body = ErrorBody)
    ),
    tag = "otp"
)]
pub async fn send_otp(
    service: Extension<Arc<OtpService>>,
    payload: Option<Json<SendOtpRequest>>,
) -> Result<Json<OkResponse>, OtpError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    service.issue(&request.email).await?;

    Ok(Json(OkResponse::ok()))
}

/// Check a candidate code and consume it on match.
#[utoipa::path(
    post,
    path = "/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Code verified", body = OkResponse),
        (status = 400, description = "Missing input, no code, used, expired or wrong code", body = ErrorBody),
        (status = 429, description = "Too many attempts", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody)
    ),
    tag = "otp"
)]
pub async fn verify_otp(
    service: Extension<Arc<OtpService>>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> Result<Json<OkResponse>, OtpError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    service.verify(&request.email, &request.code).await?;

    Ok(Json(OkResponse::ok()))
}
