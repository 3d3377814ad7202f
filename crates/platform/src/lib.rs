//! Platform capabilities shared by the API: session tokens, password
//! hashing, the role policy, admin invitations, and audit action wording.

pub mod audit;
pub mod auth;
pub mod invitations;
pub mod password;
pub mod rbac;

pub use audit::AuditAction;
pub use auth::{Claims, SessionManager};
pub use rbac::{Access, Action, Principal};
