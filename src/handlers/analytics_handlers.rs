use actix_web::{HttpMessage, HttpRequest, HttpResponse, Result, error, http, web};
use mongodb::bson::{doc, oid::ObjectId};

use crate::db::qr_store::{MongoQrStore, QR_COLLECTION};
use crate::models::qr_record::QrRecord;
use crate::state::app_state::AppState;
use crate::structs::qr_request::VerifyPasswordRequest;
use crate::utils::analytics::{ScanContext, UnlockOutcome, get_analytics, unlock_protected};
use crate::utils::jwt::Claims;

fn success_response(record: &QrRecord) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "redirect_url": record.content,
        "qr_code": {
            "content": record.content,
            "qr_type": record.qr_type,
            "analytics": {
                "scan_count": record.analytics.scan_count,
                "max_scans": record.security.max_scans.unwrap_or(0),
            },
        },
    }))
}

/// Second entry point of the scan gate: a protected code's scan is only
/// counted here, after the password checks out.
pub async fn verify_password(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    web::Json(body): web::Json<VerifyPasswordRequest>,
) -> Result<HttpResponse> {
    let qr_id = path.into_inner();
    let object_id = ObjectId::parse_str(&qr_id)
        .map_err(|_| error::ErrorBadRequest("Invalid QR code ID format"))?;

    let ip = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();
    let user_agent = req
        .headers()
        .get(http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let referer = req
        .headers()
        .get(http::header::REFERER)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let ctx = ScanContext::new(user_agent, ip, referer, None, None);

    let store = MongoQrStore::new(&app_state.db);
    match unlock_protected(&store, &object_id, body.password.as_deref(), &ctx).await {
        UnlockOutcome::NotFound => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "error": "QR code not found"
        }))),
        // An anonymous scanner never sees driver internals.
        UnlockOutcome::Unavailable => {
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            })))
        }
        UnlockOutcome::Expired => Ok(HttpResponse::Ok().json(serde_json::json!({
            "expired": true,
            "message": "This QR code has expired or reached maximum scans",
        }))),
        UnlockOutcome::MissingPassword => {
            Ok(HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "Password is required"
            })))
        }
        UnlockOutcome::InvalidPassword => {
            Ok(HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "Invalid password"
            })))
        }
        UnlockOutcome::Unlocked(record) => Ok(success_response(&record)),
    }
}

/// Rollup across all of the caller's records.
pub async fn get_user_analytics(
    app_state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let extensions = req.extensions();
    let claims = extensions
        .get::<Claims>()
        .ok_or_else(|| error::ErrorInternalServerError("User claims not found in request"))?;

    let store = MongoQrStore::new(&app_state.db);
    match get_analytics(&store, None, Some(&claims.user_id)).await {
        Some(view) => Ok(HttpResponse::Ok().json(view)),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "error": "No analytics found"
        }))),
    }
}

/// Analytics for one record, restricted to its owner.
pub async fn get_qr_analytics(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let qr_id = path.into_inner();
    let object_id = ObjectId::parse_str(&qr_id)
        .map_err(|_| error::ErrorBadRequest("Invalid QR code ID format"))?;

    let extensions = req.extensions();
    let claims = extensions
        .get::<Claims>()
        .ok_or_else(|| error::ErrorInternalServerError("User claims not found in request"))?;

    let collection = app_state.db.collection::<QrRecord>(QR_COLLECTION);
    let owned = collection
        .find_one(doc! { "_id": object_id, "user_id": &claims.user_id })
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    if owned.is_none() {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "error": "QR code not found or unauthorized"
        })));
    }

    let store = MongoQrStore::new(&app_state.db);
    match get_analytics(&store, Some(&object_id), None).await {
        Some(view) => Ok(HttpResponse::Ok().json(view)),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "error": "No analytics found for this QR code"
        }))),
    }
}
