use actix_web::{HttpMessage, HttpRequest, HttpResponse, Result, error, web};
use futures_util::TryStreamExt;
use mongodb::bson::{Document, doc, oid::ObjectId, to_bson};
use validator::{Validate, ValidateUrl};

use crate::db::qr_store::QR_COLLECTION;
use crate::models::qr_record::{QrRecord, QrType};
use crate::state::app_state::AppState;
use crate::structs::qr_request::{
    BulkCreateRequest, BulkDeleteRequest, CreateQrRequest, FormatContentRequest, QrImageParams,
    UpdateQrRequest,
};
use crate::utils::analytics::create_tracking_url;
use crate::utils::jwt::Claims;
use crate::utils::qr_format::format_content;
use crate::utils::qr_render::{render_png, render_svg};

fn public_host() -> String {
    std::env::var("HOST").unwrap_or_else(|_| String::from("http://localhost:8080"))
}

fn claims_from(req: &HttpRequest) -> Result<Claims> {
    req.extensions()
        .get::<Claims>()
        .cloned()
        .ok_or_else(|| error::ErrorInternalServerError("User claims not found in request"))
}

/// Build a complete record from a creation request: sanitize the security
/// block and render the SVG for the tracking URL the printed code encodes.
fn build_record(user_id: &str, req: CreateQrRequest) -> Result<QrRecord> {
    if req.qr_type == QrType::Url && !req.content.validate_url() {
        return Err(error::ErrorBadRequest("Invalid URL format"));
    }

    let mut security = req.security.unwrap_or_default();
    // A protection flag without a password is meaningless; clear it so the
    // gate never locks a record nobody can open.
    if security.password.is_none() {
        security.is_password_protected = false;
    }

    let mut record = QrRecord::new(
        user_id.to_string(),
        req.content,
        req.qr_type,
        req.customization.unwrap_or_default(),
        security,
        req.tags.unwrap_or_default(),
    );

    let tracking_url = create_tracking_url(&public_host(), &record);
    record.qr_image = render_svg(&tracking_url, &record.customization)
        .map_err(|e| error::ErrorInternalServerError(format!("QR rendering error: {}", e)))?;

    Ok(record)
}

pub async fn create_qr_code(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    web::Json(body): web::Json<CreateQrRequest>,
) -> Result<HttpResponse> {
    if let Err(errors) = body.validate() {
        return Ok(HttpResponse::BadRequest().json(errors));
    }
    let claims = claims_from(&req)?;

    let record = build_record(&claims.user_id, body)?;

    let collection = app_state.db.collection::<QrRecord>(QR_COLLECTION);
    collection
        .insert_one(&record)
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    Ok(HttpResponse::Created().json(record))
}

/// All of the caller's QR codes, newest first.
pub async fn get_user_qr_codes(
    app_state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let claims = claims_from(&req)?;

    let collection = app_state.db.collection::<QrRecord>(QR_COLLECTION);
    let records = collection
        .find(doc! { "user_id": &claims.user_id })
        .sort(doc! { "created_at": -1 })
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?
        .try_collect::<Vec<QrRecord>>()
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    Ok(HttpResponse::Ok().json(records))
}

/// Listing for an explicit user id; ownership is enforced by middleware.
pub async fn get_qr_codes_for_user(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();

    let collection = app_state.db.collection::<QrRecord>(QR_COLLECTION);
    let records = collection
        .find(doc! { "user_id": &user_id })
        .sort(doc! { "created_at": -1 })
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?
        .try_collect::<Vec<QrRecord>>()
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    Ok(HttpResponse::Ok().json(records))
}

async fn find_owned(
    app_state: &AppState,
    qr_id: &str,
    user_id: &str,
) -> Result<Option<QrRecord>> {
    let object_id = ObjectId::parse_str(qr_id)
        .map_err(|_| error::ErrorBadRequest("Invalid QR code ID format"))?;

    app_state
        .db
        .collection::<QrRecord>(QR_COLLECTION)
        .find_one(doc! { "_id": object_id, "user_id": user_id })
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))
}

pub async fn get_qr_code(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let claims = claims_from(&req)?;

    match find_owned(&app_state, &path.into_inner(), &claims.user_id).await? {
        Some(record) => Ok(HttpResponse::Ok().json(record)),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "error": "QR code not found or unauthorized"
        }))),
    }
}

/// The stored SVG, or a PNG rendered on demand (with logo compositing) when
/// `?format=png` is asked for.
pub async fn get_qr_image(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<QrImageParams>,
) -> Result<HttpResponse> {
    let claims = claims_from(&req)?;

    let record = match find_owned(&app_state, &path.into_inner(), &claims.user_id).await? {
        Some(record) => record,
        None => {
            return Ok(HttpResponse::NotFound().json(serde_json::json!({
                "error": "QR code not found or unauthorized"
            })));
        }
    };

    if query.format.as_deref() == Some("png") {
        let tracking_url = create_tracking_url(&public_host(), &record);
        let png = render_png(&tracking_url, &record.customization)
            .map_err(|e| error::ErrorInternalServerError(format!("QR rendering error: {}", e)))?;
        return Ok(HttpResponse::Ok().content_type("image/png").body(png));
    }

    Ok(HttpResponse::Ok()
        .content_type("image/svg+xml")
        .body(record.qr_image))
}

pub async fn update_qr_code(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    web::Json(body): web::Json<UpdateQrRequest>,
) -> Result<HttpResponse> {
    let qr_id = path.into_inner();
    let claims = claims_from(&req)?;
    let object_id = ObjectId::parse_str(&qr_id)
        .map_err(|_| error::ErrorBadRequest("Invalid QR code ID format"))?;

    let mut set_doc = Document::new();
    if let Some(content) = &body.content {
        if body.qr_type == Some(QrType::Url) && !content.validate_url() {
            return Err(error::ErrorBadRequest("Invalid URL format"));
        }
        set_doc.insert("content", content);
    }
    if let Some(qr_type) = &body.qr_type {
        set_doc.insert(
            "qr_type",
            to_bson(qr_type)
                .map_err(|e| error::ErrorInternalServerError(format!("Encoding error: {}", e)))?,
        );
    }
    if let Some(customization) = &body.customization {
        set_doc.insert(
            "customization",
            to_bson(customization)
                .map_err(|e| error::ErrorInternalServerError(format!("Encoding error: {}", e)))?,
        );
    }
    if let Some(security) = &body.security {
        let mut security = security.clone();
        if security.password.is_none() {
            security.is_password_protected = false;
        }
        set_doc.insert(
            "security",
            to_bson(&security)
                .map_err(|e| error::ErrorInternalServerError(format!("Encoding error: {}", e)))?,
        );
    }
    if let Some(tags) = &body.tags {
        set_doc.insert(
            "tags",
            to_bson(tags)
                .map_err(|e| error::ErrorInternalServerError(format!("Encoding error: {}", e)))?,
        );
    }

    if set_doc.is_empty() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "No fields to update"
        })));
    }

    // Bumping the version makes any in-flight scan write retry against the
    // edited record instead of clobbering it.
    let update = doc! { "$set": set_doc, "$inc": { "version": 1i64 } };
    let restyled = body.customization.is_some();

    let collection = app_state.db.collection::<QrRecord>(QR_COLLECTION);
    let updated = collection
        .find_one_and_update(doc! { "_id": object_id, "user_id": &claims.user_id }, update)
        .return_document(mongodb::options::ReturnDocument::After)
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    let mut record = match updated {
        Some(record) => record,
        None => {
            return Ok(HttpResponse::NotFound().json(serde_json::json!({
                "error": "QR code not found or unauthorized"
            })));
        }
    };

    // The tracking URL is stable across destination edits, so the image only
    // changes when the styling does.
    if restyled {
        let tracking_url = create_tracking_url(&public_host(), &record);
        record.qr_image = render_svg(&tracking_url, &record.customization)
            .map_err(|e| error::ErrorInternalServerError(format!("QR rendering error: {}", e)))?;
        collection
            .update_one(
                doc! { "_id": object_id },
                doc! { "$set": { "qr_image": &record.qr_image } },
            )
            .await
            .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;
    }

    Ok(HttpResponse::Ok().json(record))
}

pub async fn delete_qr_code(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let qr_id = path.into_inner();
    let claims = claims_from(&req)?;
    let object_id = ObjectId::parse_str(&qr_id)
        .map_err(|_| error::ErrorBadRequest("Invalid QR code ID format"))?;

    let collection = app_state.db.collection::<QrRecord>(QR_COLLECTION);
    let result = collection
        .delete_one(doc! { "_id": object_id, "user_id": &claims.user_id })
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    if result.deleted_count == 0 {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "error": "QR code not found or unauthorized"
        })));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "QR code deleted successfully"
    })))
}

pub async fn bulk_create_qr_codes(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    web::Json(body): web::Json<BulkCreateRequest>,
) -> Result<HttpResponse> {
    if body.qr_codes.is_empty() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "No QR codes provided"
        })));
    }
    let claims = claims_from(&req)?;

    let mut records = Vec::with_capacity(body.qr_codes.len());
    for item in body.qr_codes {
        if let Err(errors) = item.validate() {
            return Ok(HttpResponse::BadRequest().json(errors));
        }
        records.push(build_record(&claims.user_id, item)?);
    }

    let collection = app_state.db.collection::<QrRecord>(QR_COLLECTION);
    collection
        .insert_many(&records)
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    Ok(HttpResponse::Created().json(records))
}

pub async fn bulk_delete_qr_codes(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    web::Json(body): web::Json<BulkDeleteRequest>,
) -> Result<HttpResponse> {
    if body.ids.is_empty() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "No QR code IDs provided"
        })));
    }
    let claims = claims_from(&req)?;

    let mut object_ids = Vec::with_capacity(body.ids.len());
    for id in &body.ids {
        object_ids.push(
            ObjectId::parse_str(id)
                .map_err(|_| error::ErrorBadRequest("Invalid QR code ID format"))?,
        );
    }

    let collection = app_state.db.collection::<QrRecord>(QR_COLLECTION);
    let result = collection
        .delete_many(doc! { "_id": { "$in": object_ids }, "user_id": &claims.user_id })
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "QR codes deleted successfully",
        "deleted_count": result.deleted_count,
    })))
}

/// Turn structured form data into the encoded payload for the chosen kind
/// (vCard, WIFI:, mailto:, ...).
pub async fn format_qr_content(
    web::Json(body): web::Json<FormatContentRequest>,
) -> Result<HttpResponse> {
    let formatted = format_content(body.qr_type, &body.data);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "formatted_content": formatted
    })))
}
