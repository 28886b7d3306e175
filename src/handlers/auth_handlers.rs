use actix_web::{HttpResponse, Result, error, web};
use bcrypt::{DEFAULT_COST, hash, verify};
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};

use crate::models::role::Role;
use crate::models::user::User;
use crate::state::app_state::AppState;
use crate::structs::user::SignupRequest;
use crate::utils::jwt::create_token;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
}

pub async fn login(
    app_state: web::Data<AppState>,
    web::Json(req): web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    let db = &app_state.db;
    let users_collection = db.collection::<User>("users");

    let user = users_collection
        .find_one(doc! { "username": &req.username, "is_active": true })
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    match user {
        Some(mut user) => {
            let password_matches = verify(&req.password, &user.password_hash)
                .map_err(|_| error::ErrorInternalServerError("Password verification failed"))?;

            if !password_matches {
                return Ok(HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": "Invalid credentials"
                })));
            }

            let user_id = user.id.map(|id| id.to_hex()).unwrap_or_default();
            let token = create_token(&user.username, &user_id, &user.roles).map_err(|e| {
                error::ErrorInternalServerError(format!("Token generation failed: {}", e))
            })?;

            user.update_last_login();
            users_collection
                .update_one(
                    doc! { "username": &user.username },
                    doc! { "$set": { "last_login": user.last_login } },
                )
                .await
                .map_err(|e| {
                    error::ErrorInternalServerError(format!("Failed to update last login: {}", e))
                })?;

            Ok(HttpResponse::Ok().json(LoginResponse {
                token,
                username: user.username,
            }))
        }
        None => Ok(HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Invalid credentials"
        }))),
    }
}

pub async fn signup(
    app_state: web::Data<AppState>,
    web::Json(req): web::Json<SignupRequest>,
) -> Result<HttpResponse> {
    let db = &app_state.db;
    let users_collection = db.collection::<User>("users");

    let existing = users_collection
        .find_one(doc! { "username": &req.username })
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    if existing.is_some() {
        return Ok(HttpResponse::Conflict().json(serde_json::json!({
            "error": "Username already exists"
        })));
    }

    let password_hash = hash(&req.password, DEFAULT_COST)
        .map_err(|e| error::ErrorInternalServerError(format!("Failed to hash password: {}", e)))?;

    let new_user = User::new(
        req.username.clone(),
        req.email,
        req.full_name,
        password_hash,
        Role::default_roles(),
    );

    let result = users_collection
        .insert_one(&new_user)
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Failed to create user: {}", e)))?;

    let user_id = result
        .inserted_id
        .as_object_id()
        .map(|id| id.to_hex())
        .unwrap_or_default();

    let token = create_token(&new_user.username, &user_id, &new_user.roles)
        .map_err(|e| error::ErrorInternalServerError(format!("Token generation failed: {}", e)))?;

    Ok(HttpResponse::Created().json(LoginResponse {
        token,
        username: req.username,
    }))
}

/// One-time bootstrap: creates the first superuser from env credentials,
/// refused as soon as any user exists.
pub async fn create_superuser(app_state: web::Data<AppState>) -> Result<HttpResponse> {
    let db = &app_state.db;
    let users_collection = db.collection::<User>("users");

    let count = users_collection
        .count_documents(doc! {})
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    if count > 0 {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Users already exist, cannot create initial superuser"
        })));
    }

    let username = std::env::var("SUPERUSER_USERNAME")
        .map_err(|_| error::ErrorInternalServerError("SUPERUSER_USERNAME not set"))?;
    let password = std::env::var("SUPERUSER_PASSWORD")
        .map_err(|_| error::ErrorInternalServerError("SUPERUSER_PASSWORD not set"))?;

    let password_hash = hash(password, DEFAULT_COST)
        .map_err(|e| error::ErrorInternalServerError(format!("Failed to hash password: {}", e)))?;

    let superuser = User::new(
        username.clone(),
        None,
        None,
        password_hash,
        vec![Role::SuperUser],
    );

    users_collection.insert_one(&superuser).await.map_err(|e| {
        error::ErrorInternalServerError(format!("Failed to create superuser: {}", e))
    })?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": "Superuser created successfully",
        "username": username
    })))
}
