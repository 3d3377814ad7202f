//! Request and response bodies for the timetable API.
//!
//! Integer fields go through `lenient_int` because the browser client posts
//! select-box values as strings. Every field is optional at the serde level
//! so that missing input surfaces as a validation message rather than a
//! deserialization failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use timetable_core::scope::lenient_int;
use timetable_core::types::{DbId, Role};
use utoipa::ToSchema;

// ─── Accounts ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub college_id: Option<DbId>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub department_id: Option<DbId>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AdminSignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub college_id: Option<DbId>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub department_id: Option<DbId>,
    /// Single-use invitation. Older clients send it as `admin_key` or `adminKey`.
    #[serde(alias = "admin_key", alias = "adminKey")]
    pub invitation_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvitationResponse {
    /// Shown once; only its digest is stored.
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

// ─── Catalog ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateCourseRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub credits: Option<i32>,
    #[serde(default)]
    pub is_elective: bool,
    #[serde(default, deserialize_with = "lenient_int")]
    pub semester: Option<i32>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub college_id: Option<DbId>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub department_id: Option<DbId>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ExpertiseRequest {
    #[serde(default, deserialize_with = "lenient_int")]
    pub faculty_id: Option<DbId>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub course_id: Option<DbId>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RoomRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub capacity: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TimeSlotRequest {
    #[schema(example = "Monday")]
    pub day: Option<String>,
    #[schema(example = "09:00")]
    pub start_time: Option<String>,
    #[schema(example = "10:00")]
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeSlotQuery {
    pub day: Option<String>,
    pub start_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepartmentQuery {
    pub college_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct EnrollmentRequest {
    #[serde(default, deserialize_with = "lenient_int")]
    pub student_id: Option<DbId>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub course_id: Option<DbId>,
}

// ─── Timetable ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct GenerateRequest {
    #[serde(default, deserialize_with = "lenient_int")]
    pub semester: Option<i32>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub college_id: Option<DbId>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub department_id: Option<DbId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateResponse {
    pub message: String,
    #[serde(rename = "jobId")]
    pub job_id: DbId,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AssignmentUpdateRequest {
    #[serde(default, deserialize_with = "lenient_int")]
    pub course_id: Option<DbId>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub faculty_id: Option<DbId>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub room_id: Option<DbId>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub time_slot_id: Option<DbId>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub semester: Option<i32>,
}

// ─── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Trimmed, non-empty text or `None`.
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Like `present`, but keeps surrounding whitespace: passwords are hashed
/// and verified exactly as typed.
pub(crate) fn secret(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_ids_accepted() {
        let req: CreateCourseRequest = serde_json::from_str(
            r#"{"name":"Algorithms","code":"CS301","credits":"4","semester":"3","college_id":"1","department_id":""}"#,
        )
        .unwrap();
        assert_eq!(req.credits, Some(4));
        assert_eq!(req.semester, Some(3));
        assert_eq!(req.college_id, Some(1));
        assert_eq!(req.department_id, None);
        assert!(!req.is_elective);
    }

    #[test]
    fn test_admin_key_alias() {
        let req: AdminSignupRequest =
            serde_json::from_str(r#"{"name":"A","email":"a@x.com","password":"p","admin_key":"tt_inv_1"}"#)
                .unwrap();
        assert_eq!(req.invitation_token.as_deref(), Some("tt_inv_1"));

        let req: AdminSignupRequest =
            serde_json::from_str(r#"{"name":"A","email":"a@x.com","password":"p","adminKey":"tt_inv_2"}"#)
                .unwrap();
        assert_eq!(req.invitation_token.as_deref(), Some("tt_inv_2"));
    }

    #[test]
    fn test_generate_response_uses_job_id_key() {
        let json = serde_json::to_value(GenerateResponse {
            message: "Timetable generated".into(),
            job_id: 7,
        })
        .unwrap();
        assert_eq!(json["jobId"], 7);
    }

    #[test]
    fn test_present() {
        assert_eq!(present(&Some("  x ".into())), Some("x"));
        assert_eq!(present(&Some("   ".into())), None);
        assert_eq!(present(&None), None);
    }

    #[test]
    fn test_secret_keeps_whitespace() {
        assert_eq!(secret(&Some(" pass phrase ".into())), Some(" pass phrase "));
        assert_eq!(secret(&Some(" \t ".into())), None);
        assert_eq!(secret(&None), None);
    }
}
