use crate::models::role::Role;
use crate::models::user::User;
use crate::state::app_state::AppState;
use crate::structs::user::{CreateUserRequest, EditUserRequest, UserResponse};
use crate::utils::jwt::Claims;
use actix_web::HttpMessage;
use actix_web::{HttpResponse, Result, error, web};
use bcrypt::{DEFAULT_COST, hash};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};

pub async fn get_all_users(
    app_state: web::Data<AppState>,
    req: actix_web::HttpRequest,
) -> Result<HttpResponse> {
    let db = &app_state.db;
    let users_collection = db.collection::<User>("users");

    let extensions = req.extensions();
    let claims = extensions
        .get::<Claims>()
        .ok_or_else(|| error::ErrorInternalServerError("User claims not found in request"))?;

    let current_user_id = ObjectId::parse_str(&claims.user_id)
        .map_err(|_| error::ErrorInternalServerError("Invalid user ID in token"))?;

    // Everyone except the caller.
    let filter = doc! { "_id": { "$ne": current_user_id } };

    let users = users_collection
        .find(filter)
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?
        .try_collect::<Vec<User>>()
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    let user_responses: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();

    Ok(HttpResponse::Ok().json(user_responses))
}

pub async fn get_user(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    let object_id = ObjectId::parse_str(&user_id)
        .map_err(|_| error::ErrorBadRequest("Invalid user ID format"))?;

    let db = &app_state.db;
    let users_collection = db.collection::<User>("users");

    let user = users_collection
        .find_one(doc! { "_id": object_id })
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?
        .ok_or_else(|| error::ErrorNotFound("User not found"))?;

    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

pub async fn create_user(
    app_state: web::Data<AppState>,
    web::Json(req): web::Json<CreateUserRequest>,
) -> Result<HttpResponse> {
    let db = &app_state.db;
    let users_collection = db.collection::<User>("users");

    let existing_user = users_collection
        .find_one(doc! { "username": &req.username })
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    if existing_user.is_some() {
        return Err(error::ErrorBadRequest("Username already exists"));
    }

    let password_hash = hash(&req.password, DEFAULT_COST)
        .map_err(|e| error::ErrorInternalServerError(format!("Failed to hash password: {}", e)))?;

    let new_user = User::new(
        req.username,
        req.email,
        req.full_name,
        password_hash,
        req.roles.unwrap_or_else(Role::default_roles),
    );

    let result = users_collection
        .insert_one(&new_user)
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Failed to create user: {}", e)))?;

    let id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| error::ErrorInternalServerError("Inserted user has no id"))?;

    let inserted_user = users_collection
        .find_one(doc! { "_id": id })
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?
        .ok_or_else(|| error::ErrorInternalServerError("User created but not found"))?;

    Ok(HttpResponse::Created().json(UserResponse::from(inserted_user)))
}

pub async fn edit_user(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
    web::Json(req): web::Json<EditUserRequest>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    let object_id = ObjectId::parse_str(&user_id)
        .map_err(|_| error::ErrorBadRequest("Invalid user ID format"))?;

    let db = &app_state.db;
    let users_collection = db.collection::<User>("users");

    let mut set_doc = doc! {
        "updated_at": chrono::Utc::now().timestamp_millis(),
    };

    if let Some(username) = req.username {
        set_doc.insert("username", username);
    }

    if let Some(full_name) = req.full_name {
        set_doc.insert("full_name", full_name);
    }

    if let Some(password) = req.password {
        let password_hash = hash(&password, DEFAULT_COST).map_err(|e| {
            error::ErrorInternalServerError(format!("Failed to hash password: {}", e))
        })?;
        set_doc.insert("password_hash", password_hash);
    }

    if let Some(is_active) = req.is_active {
        set_doc.insert("is_active", is_active);
    }

    let updated_user = users_collection
        .find_one_and_update(doc! { "_id": object_id }, doc! { "$set": set_doc })
        .return_document(mongodb::options::ReturnDocument::After)
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Failed to update user: {}", e)))?
        .ok_or_else(|| error::ErrorNotFound("User not found"))?;

    Ok(HttpResponse::Ok().json(UserResponse::from(updated_user)))
}

pub async fn delete_user(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    let object_id = ObjectId::parse_str(&user_id)
        .map_err(|_| error::ErrorBadRequest("Invalid user ID format"))?;

    let db = &app_state.db;
    let users_collection = db.collection::<User>("users");

    let result = users_collection
        .delete_one(doc! { "_id": object_id })
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Failed to delete user: {}", e)))?;

    if result.deleted_count == 0 {
        return Err(error::ErrorNotFound("User not found"));
    }

    Ok(HttpResponse::NoContent().finish())
}
