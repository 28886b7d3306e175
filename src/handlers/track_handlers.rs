use actix_web::{HttpRequest, HttpResponse, Result, http, web};
use mongodb::bson::oid::ObjectId;

use crate::db::qr_store::{MongoQrStore, QrStore};
use crate::state::app_state::AppState;
use crate::utils::analytics::{ScanContext, record_scan};
use crate::utils::geo;
use crate::utils::hash_ip::hash_ip;

const NOT_FOUND_PAGE: &str = r#"<html>
  <body style="text-align:center;font-family:Arial;padding:20px;">
    <h2>QR Code Not Found</h2>
    <p>This QR code does not exist or has been deleted.</p>
  </body>
</html>"#;

const ERROR_PAGE: &str = r#"<html>
  <body style="text-align:center;font-family:Arial;padding:20px;">
    <h2>Something Went Wrong</h2>
    <p>We could not process this QR code right now. Please try again later.</p>
  </body>
</html>"#;

const EXPIRED_PAGE: &str = r#"<html>
  <body style="text-align:center;font-family:Arial;padding:20px;">
    <h2>QR Code Expired</h2>
    <p>This QR code has expired or reached its maximum scan limit.</p>
  </body>
</html>"#;

/// Password prompt served for protected codes. The form posts to the
/// verify-password endpoint carrying the same record id.
const PASSWORD_PAGE: &str = r#"<html>
  <head>
    <title>Password Protected QR Code</title>
    <style>
      body { font-family: Arial, sans-serif; max-width: 500px; margin: 40px auto; padding: 20px; text-align: center; }
      input[type="password"] { padding: 8px; margin: 10px; width: 200px; }
      button { padding: 8px 20px; background: #007bff; color: white; border: none; border-radius: 4px; cursor: pointer; }
      .error { color: #dc3545; margin-top: 10px; display: none; }
    </style>
  </head>
  <body>
    <h2>Password Protected Content</h2>
    <p>This QR code is password protected. Please enter the password to continue.</p>
    <form id="passwordForm">
      <input type="password" id="password" placeholder="Enter password" required>
      <br>
      <button type="submit">Submit</button>
    </form>
    <p id="error" class="error">Invalid password. Please try again.</p>
    <script>
      document.getElementById('passwordForm').addEventListener('submit', async (e) => {
        e.preventDefault();
        const password = document.getElementById('password').value;
        try {
          const response = await fetch('/api/analytics/verify-password/__QR_ID__', {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: JSON.stringify({ password })
          });
          const data = await response.json();
          if (data.success) {
            window.location.href = data.redirect_url;
          } else if (data.expired) {
            document.body.innerHTML = '<h2>QR Code Expired</h2><p>' + data.message + '</p>';
          } else {
            document.getElementById('error').style.display = 'block';
          }
        } catch (err) {
          document.getElementById('error').style.display = 'block';
        }
      });
    </script>
  </body>
</html>"#;

fn html(body: impl Into<String>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body.into())
}

/// Handle one inbound scan: gate on existence, expiry, and password
/// protection, then record the scan and redirect to the destination.
pub async fn track_scan(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (qr_id, tracking_id) = path.into_inner();
    let store = MongoQrStore::new(&app_state.db);

    let object_id = match ObjectId::parse_str(&qr_id) {
        Ok(id) => id,
        Err(_) => {
            return Ok(HttpResponse::NotFound()
                .content_type("text/html; charset=utf-8")
                .body(NOT_FOUND_PAGE));
        }
    };

    // Scanners are anonymous; they get a generic page, the log gets the
    // driver error.
    let record = match store.find_by_id(&object_id).await {
        Ok(record) => record,
        Err(e) => {
            log::error!("Failed to load QR record {}: {:#}", object_id, e);
            return Ok(HttpResponse::InternalServerError()
                .content_type("text/html; charset=utf-8")
                .body(ERROR_PAGE));
        }
    };

    let record = match record {
        Some(record) => record,
        None => {
            return Ok(HttpResponse::NotFound()
                .content_type("text/html; charset=utf-8")
                .body(NOT_FOUND_PAGE));
        }
    };

    if record.has_expired() {
        return Ok(html(EXPIRED_PAGE));
    }

    // No scan is recorded yet for protected codes; that happens after the
    // password round-trip.
    if record.security.is_password_protected {
        log::info!(
            "Protected scan of {} (instance {}), prompting for password",
            qr_id,
            tracking_id
        );
        return Ok(html(PASSWORD_PAGE.replace("__QR_ID__", &qr_id)));
    }

    let ip = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();

    let user_agent = header_string(&req, http::header::USER_AGENT.as_str());
    let referer = header_string(&req, http::header::REFERER.as_str());
    let location = geo::locate(&req);

    let ctx = ScanContext::new(
        user_agent.unwrap_or_default(),
        ip.clone(),
        referer,
        location.country,
        location.city,
    );

    log::debug!("Scan of {} from visitor {}", qr_id, hash_ip(&ip));

    // Recording must never hold up the redirect; run it in the background
    // and tolerate failure.
    let db = app_state.db.clone();
    actix_web::rt::spawn(async move {
        let store = MongoQrStore::new(&db);
        if record_scan(&store, &object_id, &ctx).await.is_none() {
            log::warn!("Scan of {} was not recorded", object_id);
        }
    });

    Ok(HttpResponse::Found()
        .append_header((http::header::LOCATION, record.content.clone()))
        .finish())
}

fn header_string(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}
