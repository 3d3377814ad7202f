//! Data-access contract for the timetable tier.
//!
//! `PgStore` implements it over PostgreSQL; `MemoryStore` implements it over
//! DashMap for tests and the in-memory development mode. Handlers only see
//! `Arc<dyn TimetableStore>`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use thiserror::Error;
use timetable_core::types::*;
use timetable_core::{ScopeFilter, TimetableError};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("job {job_id} is not in state {expected}")]
    StaleJobState { job_id: DbId, expected: JobStatus },

    #[error("database error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some("23505") {
                return StoreError::UniqueViolation {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                };
            }
        }
        StoreError::Backend(err.to_string())
    }
}

impl From<StoreError> for TimetableError {
    fn from(err: StoreError) -> Self {
        TimetableError::internal(err.to_string())
    }
}

/// Rows required before a timetable can be generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub courses: i64,
    pub faculty: i64,
    pub rooms: i64,
    pub time_slots: i64,
}

impl ResourceCounts {
    /// Names of the resource kinds with no rows.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.courses == 0 {
            missing.push("Courses");
        }
        if self.faculty == 0 {
            missing.push("Faculty");
        }
        if self.rooms == 0 {
            missing.push("Rooms");
        }
        if self.time_slots == 0 {
            missing.push("Time Slots");
        }
        missing
    }
}

/// Optional filters for the time slot listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeSlotFilter {
    pub day: Option<Weekday>,
    pub start_time: Option<NaiveTime>,
}

/// Which assignments a timetable query may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentVisibility {
    /// Assignments of courses the student is enrolled in.
    EnrolledStudent { student_id: DbId },
    /// Assignments owned by the scope.
    Scoped(ScopeFilter),
}

#[async_trait]
pub trait TimetableStore: Send + Sync {
    // ─── Accounts ──────────────────────────────────────────────────────────

    /// Look an email up across Students and Faculty.
    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>>;
    async fn find_student_by_email(&self, email: &str) -> StoreResult<Option<Account>>;
    async fn get_student(&self, id: DbId) -> StoreResult<Option<Account>>;
    /// Insert into Students for `Role::Student`, Faculty otherwise.
    async fn insert_account(&self, account: NewAccount) -> StoreResult<Account>;

    // ─── Colleges & departments ────────────────────────────────────────────

    async fn list_colleges(&self) -> StoreResult<Vec<College>>;
    async fn get_college(&self, id: DbId) -> StoreResult<Option<College>>;
    async fn list_departments(&self, college_id: Option<DbId>) -> StoreResult<Vec<Department>>;
    async fn get_department(&self, id: DbId) -> StoreResult<Option<Department>>;

    // ─── Courses ───────────────────────────────────────────────────────────

    async fn list_courses(&self, scope: &ScopeFilter) -> StoreResult<Vec<Course>>;
    async fn get_course(&self, id: DbId) -> StoreResult<Option<Course>>;
    async fn course_code_exists(&self, code: &str) -> StoreResult<bool>;
    async fn insert_course(&self, course: NewCourse) -> StoreResult<Course>;

    // ─── Faculty ───────────────────────────────────────────────────────────

    /// Faculty-role accounts in scope (admins excluded).
    async fn list_faculty(&self, scope: &ScopeFilter) -> StoreResult<Vec<FacultyMember>>;
    async fn get_faculty(&self, id: DbId) -> StoreResult<Option<FacultyMember>>;
    async fn find_faculty_by_email(&self, email: &str) -> StoreResult<Option<FacultyMember>>;
    async fn list_faculty_courses(&self, faculty_id: DbId) -> StoreResult<Vec<Course>>;
    async fn insert_faculty_course(&self, link: FacultyCourse) -> StoreResult<FacultyCourse>;

    // ─── Rooms, time slots, enrollments ────────────────────────────────────

    async fn list_rooms(&self) -> StoreResult<Vec<Room>>;
    async fn get_room(&self, id: DbId) -> StoreResult<Option<Room>>;
    async fn insert_room(&self, name: &str, capacity: Option<i32>) -> StoreResult<Room>;
    async fn list_time_slots(&self, filter: &TimeSlotFilter) -> StoreResult<Vec<TimeSlot>>;
    async fn get_time_slot(&self, id: DbId) -> StoreResult<Option<TimeSlot>>;
    async fn insert_time_slot(
        &self,
        day: Weekday,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> StoreResult<TimeSlot>;
    async fn insert_enrollment(&self, enrollment: Enrollment) -> StoreResult<Enrollment>;

    // ─── Generation jobs ───────────────────────────────────────────────────

    async fn count_resources(&self, semester: i32, scope: &ScopeFilter) -> StoreResult<ResourceCounts>;
    /// Create a job in `pending`.
    async fn insert_job(
        &self,
        semester: i32,
        college_id: DbId,
        department_id: Option<DbId>,
    ) -> StoreResult<TimetableJob>;
    /// Move a job from `from` to `to`; terminal states stamp `completed_at`.
    /// Fails with `StaleJobState` if the job is not currently in `from`.
    async fn update_job_status(
        &self,
        id: DbId,
        from: JobStatus,
        to: JobStatus,
        error: Option<&str>,
    ) -> StoreResult<TimetableJob>;
    async fn get_job(&self, id: DbId) -> StoreResult<Option<TimetableJob>>;

    // ─── Assignments ───────────────────────────────────────────────────────

    async fn list_assignments(&self, visibility: &AssignmentVisibility) -> StoreResult<Vec<AssignmentView>>;
    /// Full replace by id. `None` when the assignment does not exist.
    async fn replace_assignment(
        &self,
        id: DbId,
        fields: AssignmentFields,
    ) -> StoreResult<Option<TimetableAssignment>>;

    // ─── Admin invitations ─────────────────────────────────────────────────

    async fn insert_invitation(
        &self,
        token_hash: &str,
        created_by: Option<DbId>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<AdminInvitation>;
    /// Unconsumed, unexpired invitation with this digest.
    async fn find_active_invitation(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AdminInvitation>>;
    /// Atomically mark an active invitation consumed. `None` if it was
    /// missing, expired, or already used.
    async fn consume_invitation(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AdminInvitation>>;

    // ─── Audit ─────────────────────────────────────────────────────────────

    async fn append_audit(&self, user_id: Option<DbId>, action: &str) -> StoreResult<()>;

    /// Cheap round trip for readiness probes.
    async fn ping(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_resources() {
        let counts = ResourceCounts {
            courses: 3,
            faculty: 0,
            rooms: 2,
            time_slots: 0,
        };
        assert_eq!(counts.missing(), vec!["Faculty", "Time Slots"]);
        assert!(ResourceCounts {
            courses: 1,
            faculty: 1,
            rooms: 1,
            time_slots: 1
        }
        .missing()
        .is_empty());
    }
}
