use axum::Json;
use utoipa::{
    openapi::{Contact, InfoBuilder, License, Tag},
    OpenApi,
};

use super::handlers::{
    health,
    otp,
    types::{OkResponse, SendOtpRequest, VerifyOtpRequest},
};
use crate::otp::ErrorBody;

#[derive(OpenApi)]
#[openapi(
    paths(otp::send_otp, otp::verify_otp, health::health),
    components(schemas(SendOtpRequest, VerifyOtpRequest, OkResponse, ErrorBody, health::Health))
)]
struct ApiDoc;

/// Generated `OpenAPI` document for every served route.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info = cargo_info();

    let mut otp_tag = Tag::new("otp");
    otp_tag.description = Some("Email one-time passcode issuance and verification".to_string());

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Service and record store status".to_string());

    doc.tags = Some(vec![otp_tag, health_tag]);
    doc
}

// axum handler for GET /openapi.json
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}

fn cargo_info() -> utoipa::openapi::Info {
    // Use Cargo.toml metadata instead of the derive defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();
    info
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.find('<') {
        Some(start) => {
            let name = author[..start].trim();
            let email = author[start + 1..].trim_end_matches('>').trim();
            (non_empty(name), non_empty(email))
        }
        None => (non_empty(author.trim()), None),
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
