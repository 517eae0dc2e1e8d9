//! User entity model and DTOs.

use autobids_core::roles::role_name;
use autobids_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub last_seen_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    pub fn role(&self) -> &'static str {
        role_name(self.is_admin)
    }
}

/// DTO for inserting a user. The password is already hashed.
#[derive(Debug)]
pub struct CreateUser {
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
}

/// Safe user representation without the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: DbId,
    pub email: String,
    pub is_admin: bool,
    pub last_seen_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            is_admin: user.is_admin,
            last_seen_at: user.last_seen_at,
            created_at: user.created_at,
        }
    }
}

/// DTO for `PUT /admin/users/{id}/admin`.
#[derive(Debug, Deserialize)]
pub struct SetAdmin {
    pub is_admin: bool,
}
