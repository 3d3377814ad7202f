//! Role-based authorization. One policy table decides, for every role and
//! action, whether access is denied, restricted to the caller's own rows,
//! or unrestricted.

use serde::{Deserialize, Serialize};
use timetable_core::types::{DbId, Role};
use timetable_core::{TimetableError, TimetableResult};

use crate::auth::Claims;

/// Operations guarded by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ViewCourses,
    CreateCourse,
    ViewFaculty,
    ManageExpertise,
    ViewRooms,
    ManageRooms,
    ViewTimeSlots,
    ManageTimeSlots,
    ManageEnrollments,
    GenerateTimetable,
    EditTimetable,
    ViewJobs,
    IssueInvitation,
    ViewTimetable,
    ExportTimetable,
}

/// How much of a resource a caller may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Denied,
    /// Only rows tied to courses the caller is enrolled in.
    EnrolledCourses,
    /// Only rows in the caller's own college / department.
    OwnScope,
    /// Everything, subject to optional query filters.
    Full,
}

/// The policy table.
pub fn access(role: Role, action: Action) -> Access {
    use Action::*;

    match (role, action) {
        (Role::Admin, _) => Access::Full,

        (_, ViewRooms | ViewTimeSlots) => Access::Full,

        (Role::Student, ViewTimetable | ExportTimetable) => Access::EnrolledCourses,
        (Role::Faculty, ViewTimetable | ExportTimetable) => Access::OwnScope,

        (
            Role::Student | Role::Faculty,
            ViewCourses | CreateCourse | ViewFaculty | ManageExpertise | ManageRooms
            | ManageTimeSlots | ManageEnrollments | GenerateTimetable | EditTimetable | ViewJobs
            | IssueInvitation,
        ) => Access::Denied,
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub account_id: DbId,
    pub email: String,
    pub role: Role,
}

impl Principal {
    /// Check the policy; denial is reported as `Forbidden`.
    pub fn require(&self, action: Action) -> TimetableResult<Access> {
        match access(self.role, action) {
            Access::Denied => Err(TimetableError::forbidden("Admin only")),
            granted => Ok(granted),
        }
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            account_id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}
