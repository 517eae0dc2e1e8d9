//! Role names embedded in access tokens.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

/// Map the `users.is_admin` flag to a role name.
pub fn role_name(is_admin: bool) -> &'static str {
    if is_admin {
        ROLE_ADMIN
    } else {
        ROLE_USER
    }
}
