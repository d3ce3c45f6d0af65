//! Well-known role name constants.
//!
//! These must match the role claim issued by the identity provider.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MENTOR: &str = "mentor";
pub const ROLE_STUDENT: &str = "student";

/// Staff may manage forms and mark attendance on behalf of others.
pub fn is_staff(role: &str) -> bool {
    role == ROLE_ADMIN || role == ROLE_MENTOR
}
