use actix_web::web;

use crate::handlers::analytics_handlers::{
    get_qr_analytics, get_user_analytics, verify_password,
};
use crate::handlers::auth_handlers::{create_superuser, login, signup};
use crate::handlers::health_handlers::health_check;
use crate::handlers::qr_handlers::{
    bulk_create_qr_codes, bulk_delete_qr_codes, create_qr_code, delete_qr_code, format_qr_content,
    get_qr_code, get_qr_codes_for_user, get_qr_image, get_user_qr_codes, update_qr_code,
};
use crate::handlers::track_handlers::track_scan;
use crate::handlers::user_handlers::{
    create_user, delete_user, edit_user, get_all_users, get_user,
};
use crate::middlewares::authmw::{JwtAuth, RequireRoles};
use crate::middlewares::res_owner::ResourceOwnership;
use crate::models::role::Role;

/// Configure the routes
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    // Scan-facing routes at the root level, open to the world. The
    // verify-password route must be registered before the /api scope so the
    // JWT middleware never sees it.
    cfg.route("/track/{qr_id}/{tracking_id}", web::get().to(track_scan));
    cfg.route(
        "/api/analytics/verify-password/{qr_id}",
        web::post().to(verify_password),
    );
    // Authentication routes - no auth required
    cfg.service(
        web::scope("/api/auth")
            .route("/login", web::post().to(login))
            .route("/init", web::post().to(create_superuser))
            .route("/signup", web::post().to(signup)),
    );
    // API routes - require authentication
    cfg.service(
        web::scope("/api")
            .wrap(JwtAuth)
            .route("/health/check", web::get().to(health_check))
            .route("/analytics", web::get().to(get_user_analytics))
            .route("/analytics/{qr_id}", web::get().to(get_qr_analytics))
            .route("/qrcodes", web::post().to(create_qr_code))
            .route("/qrcodes", web::get().to(get_user_qr_codes))
            .route("/qrcodes/bulk", web::post().to(bulk_create_qr_codes))
            .route("/qrcodes/bulk", web::delete().to(bulk_delete_qr_codes))
            .route("/qrcodes/format-content", web::post().to(format_qr_content))
            .route("/qrcodes/{qr_id}", web::get().to(get_qr_code))
            .route("/qrcodes/{qr_id}", web::put().to(update_qr_code))
            .route("/qrcodes/{qr_id}", web::delete().to(delete_qr_code))
            .route("/qrcodes/{qr_id}/image", web::get().to(get_qr_image))
            .service(
                web::resource("/users/{user_id}/qrcodes")
                    .wrap(ResourceOwnership {
                        param_name: "user_id".to_string(),
                    })
                    .route(web::get().to(get_qr_codes_for_user)),
            )
            // User management routes
            .service(
                web::scope("/users")
                    .wrap(RequireRoles(vec![Role::UserViewer, Role::UserManager]))
                    .route("", web::get().to(get_all_users))
                    .route("", web::post().to(create_user))
                    .route("/{user_id}", web::get().to(get_user))
                    .route("/{user_id}", web::put().to(edit_user))
                    .route("/{user_id}", web::delete().to(delete_user)),
            ),
    );
}
