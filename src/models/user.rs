use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::models::role::Role;

#[derive(Debug, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_login: Option<i64>,
    pub is_active: bool,
}

impl User {
    pub fn new(
        username: String,
        email: Option<String>,
        full_name: Option<String>,
        password_hash: String,
        roles: Vec<Role>,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();

        Self {
            id: None,
            username,
            email,
            full_name,
            password_hash,
            roles,
            created_at: now,
            updated_at: now,
            last_login: None,
            is_active: true,
        }
    }

    pub fn update_last_login(&mut self) {
        self.last_login = Some(chrono::Utc::now().timestamp_millis());
    }
}
