//! Domain types shared across the workspace: accounts, academic entities,
//! timetable assignments, generation jobs, and audit entries.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::TimetableError;

/// Primary key type of every table.
pub type DbId = i32;

// ─── Roles ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Faculty,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = TimetableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "faculty" => Ok(Role::Faculty),
            "admin" => Ok(Role::Admin),
            other => Err(TimetableError::validation(format!("Unknown role: {other}"))),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = TimetableError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ─── Weekdays ──────────────────────────────────────────────────────────────

/// Teaching days. Serialized with their full English names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Weekday {
    pub const ALL: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
        }
    }

    /// Days after Monday.
    pub fn offset_from_monday(&self) -> u32 {
        match self {
            Weekday::Monday => 0,
            Weekday::Tuesday => 1,
            Weekday::Wednesday => 2,
            Weekday::Thursday => 3,
            Weekday::Friday => 4,
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Weekday {
    type Err = TimetableError;

    /// Accepts full names and three-letter abbreviations, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Weekday::ALL
            .into_iter()
            .find(|day| {
                let name = day.as_str().to_ascii_lowercase();
                lower == name || (lower.len() == 3 && name.starts_with(&lower))
            })
            .ok_or_else(|| TimetableError::validation(format!("Unknown day: {s}")))
    }
}

impl TryFrom<String> for Weekday {
    type Error = TimetableError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ─── Timetable job lifecycle ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }

    /// Validate a lifecycle step and return the new state.
    pub fn transition(self, next: JobStatus) -> Result<JobStatus, TimetableError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TimetableError::internal(format!(
                "Illegal job transition {} -> {}",
                self.as_str(),
                next.as_str()
            )))
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = TimetableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(TimetableError::internal(format!("Unknown job status: {other}"))),
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = TimetableError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ─── Accounts ──────────────────────────────────────────────────────────────

/// A login-capable account, unified over the Students and Faculty tables.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Account {
    pub id: DbId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub college_id: Option<DbId>,
    pub department_id: Option<DbId>,
}

/// Row to insert into Students (role student) or Faculty (faculty / admin).
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub college_id: Option<DbId>,
    pub department_id: Option<DbId>,
    /// Teaching load capacity. Only stored for Faculty-table rows.
    pub max_load: i32,
}

/// Faculty-table row without credentials.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct FacultyMember {
    pub id: DbId,
    pub name: String,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub college_id: Option<DbId>,
    pub department_id: Option<DbId>,
    pub max_load: i32,
}

// ─── Academic structure ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct College {
    pub id: DbId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Department {
    pub id: DbId,
    pub name: String,
    pub college_id: DbId,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Course {
    pub id: DbId,
    pub name: String,
    pub code: String,
    pub credits: i32,
    pub is_elective: bool,
    pub semester: i32,
    pub college_id: DbId,
    pub department_id: DbId,
}

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub name: String,
    pub code: String,
    pub credits: i32,
    pub is_elective: bool,
    pub semester: i32,
    pub college_id: DbId,
    pub department_id: DbId,
}

/// Faculty expertise: the faculty member may teach the course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow, ToSchema)]
pub struct FacultyCourse {
    pub faculty_id: DbId,
    pub course_id: DbId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Enrollment {
    pub student_id: DbId,
    pub course_id: DbId,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Room {
    pub id: DbId,
    pub name: String,
    pub capacity: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TimeSlot {
    pub id: DbId,
    #[sqlx(try_from = "String")]
    pub day: Weekday,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "10:00:00")]
    pub end_time: NaiveTime,
}

// ─── Timetable ─────────────────────────────────────────────────────────────

/// One course placed into a room, time slot and faculty member.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TimetableAssignment {
    pub id: DbId,
    pub course_id: DbId,
    pub faculty_id: DbId,
    pub room_id: DbId,
    pub time_slot_id: DbId,
    pub semester: i32,
    pub college_id: Option<DbId>,
    pub department_id: Option<DbId>,
}

/// Column values of an assignment, used for inserts and full replaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentFields {
    pub course_id: DbId,
    pub faculty_id: DbId,
    pub room_id: DbId,
    pub time_slot_id: DbId,
    pub semester: i32,
    pub college_id: Option<DbId>,
    pub department_id: Option<DbId>,
}

/// Assignment joined with the names of everything it references.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AssignmentView {
    pub id: DbId,
    pub course_id: DbId,
    pub faculty_id: DbId,
    pub room_id: DbId,
    pub time_slot_id: DbId,
    pub semester: i32,
    pub college_id: Option<DbId>,
    pub department_id: Option<DbId>,
    pub course_name: String,
    pub course_code: String,
    pub faculty_name: String,
    pub room_name: String,
    #[sqlx(try_from = "String")]
    pub day: Weekday,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "10:00:00")]
    pub end_time: NaiveTime,
}

impl AssignmentView {
    /// `HH:MM-HH:MM` label of the slot.
    pub fn time_range(&self) -> String {
        format!(
            "{}-{}",
            self.start_time.format("%H:%M"),
            self.end_time.format("%H:%M")
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TimetableJob {
    pub id: DbId,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    pub semester: i32,
    pub college_id: DbId,
    pub department_id: Option<DbId>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ─── Audit & provisioning ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AuditLogEntry {
    pub id: DbId,
    pub user_id: Option<DbId>,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

/// Single-use admin invitation. Only the token digest is persisted.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct AdminInvitation {
    pub id: DbId,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub created_by: Option<DbId>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}
