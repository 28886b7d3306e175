use serde::Deserialize;
use validator::Validate;

use crate::models::qr_record::{Customization, QrType, Security};

#[derive(Deserialize, Validate, Clone)]
pub struct CreateQrRequest {
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
    #[serde(default)]
    pub qr_type: QrType,
    pub customization: Option<Customization>,
    pub security: Option<Security>,
    pub tags: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct UpdateQrRequest {
    pub content: Option<String>,
    pub qr_type: Option<QrType>,
    pub customization: Option<Customization>,
    pub security: Option<Security>,
    pub tags: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct BulkCreateRequest {
    pub qr_codes: Vec<CreateQrRequest>,
}

#[derive(Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<String>,
}

#[derive(Deserialize)]
pub struct FormatContentRequest {
    pub qr_type: QrType,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Deserialize)]
pub struct VerifyPasswordRequest {
    pub password: Option<String>,
}

/// `?format=png` switches the image endpoint from the stored SVG to an
/// on-the-fly PNG render.
#[derive(Deserialize)]
pub struct QrImageParams {
    pub format: Option<String>,
}
