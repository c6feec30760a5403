use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Absent fields deserialize as empty strings and fail validation downstream.
#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    #[must_use]
    pub const fn ok() -> Self {
        Self { ok: true }
    }
}
