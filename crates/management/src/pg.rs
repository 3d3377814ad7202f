//! PostgreSQL implementation of the store over an injected `PgPool`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use sqlx::PgPool;
use timetable_core::types::*;
use timetable_core::ScopeFilter;
use tracing::debug;

use crate::query::{ScopeColumns, ScopedQuery};
use crate::store::*;

const ACCOUNT_COLUMNS: &str = "id, name, email, password_hash, role, college_id, department_id";
const FACULTY_COLUMNS: &str = "id, name, email, role, college_id, department_id, max_load";
const COURSE_COLUMNS: &str =
    "id, name, code, credits, is_elective, semester, college_id, department_id";
const JOB_COLUMNS: &str =
    "id, status, semester, college_id, department_id, error, created_at, completed_at";
const ASSIGNMENT_COLUMNS: &str =
    "id, course_id, faculty_id, room_id, time_slot_id, semester, college_id, department_id";
const INVITATION_COLUMNS: &str = "id, token_hash, created_by, created_at, expires_at, consumed_at";

const ASSIGNMENT_VIEW: &str = "SELECT ta.id, ta.course_id, ta.faculty_id, ta.room_id, \
     ta.time_slot_id, ta.semester, ta.college_id, ta.department_id, \
     c.name AS course_name, c.code AS course_code, f.name AS faculty_name, \
     r.name AS room_name, ts.day, ts.start_time, ts.end_time \
     FROM timetable_assignments ta \
     JOIN courses c ON ta.course_id = c.id \
     JOIN faculty f ON ta.faculty_id = f.id \
     JOIN rooms r ON ta.room_id = r.id \
     JOIN time_slots ts ON ta.time_slot_id = ts.id";

const PLAIN_SCOPE: ScopeColumns = ScopeColumns::new("college_id", "department_id");
const ASSIGNMENT_SCOPE: ScopeColumns = ScopeColumns::new("ta.college_id", "ta.department_id");

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn count(&self, query: ScopedQuery<'_>) -> StoreResult<i64> {
        debug!(sql = query.sql(), "Counting rows");
        let count = query
            .into_builder()
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl TimetableStore for PgStore {
    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM students WHERE email = $1 \
             UNION ALL \
             SELECT {ACCOUNT_COLUMNS} FROM faculty WHERE email = $1 \
             LIMIT 1"
        );
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn find_student_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM students WHERE email = $1");
        Ok(sqlx::query_as::<_, Account>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_student(&self, id: DbId) -> StoreResult<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM students WHERE id = $1");
        Ok(sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_account(&self, account: NewAccount) -> StoreResult<Account> {
        let created = match account.role {
            Role::Student => {
                let sql = format!(
                    "INSERT INTO students (name, email, password_hash, role, college_id, department_id) \
                     VALUES ($1, $2, $3, $4, $5, $6) RETURNING {ACCOUNT_COLUMNS}"
                );
                sqlx::query_as::<_, Account>(&sql)
                    .bind(&account.name)
                    .bind(&account.email)
                    .bind(&account.password_hash)
                    .bind(account.role.as_str())
                    .bind(account.college_id)
                    .bind(account.department_id)
                    .fetch_one(&self.pool)
                    .await?
            }
            Role::Faculty | Role::Admin => {
                let sql = format!(
                    "INSERT INTO faculty (name, email, password_hash, role, college_id, department_id, max_load) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {ACCOUNT_COLUMNS}"
                );
                sqlx::query_as::<_, Account>(&sql)
                    .bind(&account.name)
                    .bind(&account.email)
                    .bind(&account.password_hash)
                    .bind(account.role.as_str())
                    .bind(account.college_id)
                    .bind(account.department_id)
                    .bind(account.max_load)
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(created)
    }

    async fn list_colleges(&self) -> StoreResult<Vec<College>> {
        Ok(
            sqlx::query_as::<_, College>("SELECT id, name FROM colleges ORDER BY name")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_college(&self, id: DbId) -> StoreResult<Option<College>> {
        Ok(
            sqlx::query_as::<_, College>("SELECT id, name FROM colleges WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_departments(&self, college_id: Option<DbId>) -> StoreResult<Vec<Department>> {
        let mut query = ScopedQuery::new("SELECT id, name, college_id FROM departments");
        query.and_opt_eq("college_id", college_id).order_by("name");
        Ok(query
            .into_builder()
            .build_query_as::<Department>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_department(&self, id: DbId) -> StoreResult<Option<Department>> {
        Ok(sqlx::query_as::<_, Department>(
            "SELECT id, name, college_id FROM departments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_courses(&self, scope: &ScopeFilter) -> StoreResult<Vec<Course>> {
        let base = format!("SELECT {COURSE_COLUMNS} FROM courses");
        let mut query = ScopedQuery::new(&base);
        query.scoped(PLAIN_SCOPE, scope).order_by("id");
        debug!(sql = query.sql(), scope = %scope.describe(), "Listing courses");
        Ok(query
            .into_builder()
            .build_query_as::<Course>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_course(&self, id: DbId) -> StoreResult<Option<Course>> {
        let sql = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1");
        Ok(sqlx::query_as::<_, Course>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn course_code_exists(&self, code: &str) -> StoreResult<bool> {
        Ok(
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM courses WHERE code = $1)")
                .bind(code)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn insert_course(&self, course: NewCourse) -> StoreResult<Course> {
        let sql = format!(
            "INSERT INTO courses (name, code, credits, is_elective, semester, college_id, department_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {COURSE_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Course>(&sql)
            .bind(&course.name)
            .bind(&course.code)
            .bind(course.credits)
            .bind(course.is_elective)
            .bind(course.semester)
            .bind(course.college_id)
            .bind(course.department_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_faculty(&self, scope: &ScopeFilter) -> StoreResult<Vec<FacultyMember>> {
        let base = format!("SELECT {FACULTY_COLUMNS} FROM faculty");
        let mut query = ScopedQuery::new(&base);
        query
            .and_eq("role", Role::Faculty.as_str())
            .scoped(PLAIN_SCOPE, scope)
            .order_by("id");
        Ok(query
            .into_builder()
            .build_query_as::<FacultyMember>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_faculty(&self, id: DbId) -> StoreResult<Option<FacultyMember>> {
        let sql = format!("SELECT {FACULTY_COLUMNS} FROM faculty WHERE id = $1");
        Ok(sqlx::query_as::<_, FacultyMember>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_faculty_by_email(&self, email: &str) -> StoreResult<Option<FacultyMember>> {
        let sql = format!("SELECT {FACULTY_COLUMNS} FROM faculty WHERE email = $1");
        Ok(sqlx::query_as::<_, FacultyMember>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_faculty_courses(&self, faculty_id: DbId) -> StoreResult<Vec<Course>> {
        Ok(sqlx::query_as::<_, Course>(
            "SELECT c.id, c.name, c.code, c.credits, c.is_elective, c.semester, c.college_id, c.department_id \
             FROM courses c JOIN faculty_courses fc ON fc.course_id = c.id \
             WHERE fc.faculty_id = $1 ORDER BY c.id",
        )
        .bind(faculty_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_faculty_course(&self, link: FacultyCourse) -> StoreResult<FacultyCourse> {
        Ok(sqlx::query_as::<_, FacultyCourse>(
            "INSERT INTO faculty_courses (faculty_id, course_id) VALUES ($1, $2) \
             RETURNING faculty_id, course_id",
        )
        .bind(link.faculty_id)
        .bind(link.course_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_rooms(&self) -> StoreResult<Vec<Room>> {
        Ok(
            sqlx::query_as::<_, Room>("SELECT id, name, capacity FROM rooms ORDER BY id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_room(&self, id: DbId) -> StoreResult<Option<Room>> {
        Ok(
            sqlx::query_as::<_, Room>("SELECT id, name, capacity FROM rooms WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn insert_room(&self, name: &str, capacity: Option<i32>) -> StoreResult<Room> {
        Ok(sqlx::query_as::<_, Room>(
            "INSERT INTO rooms (name, capacity) VALUES ($1, $2) RETURNING id, name, capacity",
        )
        .bind(name)
        .bind(capacity)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_time_slots(&self, filter: &TimeSlotFilter) -> StoreResult<Vec<TimeSlot>> {
        let mut query = ScopedQuery::new("SELECT id, day, start_time, end_time FROM time_slots");
        query
            .and_opt_eq("day", filter.day.map(|day| day.as_str()))
            .and_opt_eq("start_time", filter.start_time)
            .order_by("id");
        Ok(query
            .into_builder()
            .build_query_as::<TimeSlot>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_time_slot(&self, id: DbId) -> StoreResult<Option<TimeSlot>> {
        Ok(sqlx::query_as::<_, TimeSlot>(
            "SELECT id, day, start_time, end_time FROM time_slots WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_time_slot(
        &self,
        day: Weekday,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> StoreResult<TimeSlot> {
        Ok(sqlx::query_as::<_, TimeSlot>(
            "INSERT INTO time_slots (day, start_time, end_time) VALUES ($1, $2, $3) \
             RETURNING id, day, start_time, end_time",
        )
        .bind(day.as_str())
        .bind(start_time)
        .bind(end_time)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn insert_enrollment(&self, enrollment: Enrollment) -> StoreResult<Enrollment> {
        Ok(sqlx::query_as::<_, Enrollment>(
            "INSERT INTO enrollments (student_id, course_id) VALUES ($1, $2) \
             RETURNING student_id, course_id",
        )
        .bind(enrollment.student_id)
        .bind(enrollment.course_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn count_resources(&self, semester: i32, scope: &ScopeFilter) -> StoreResult<ResourceCounts> {
        let mut courses = ScopedQuery::new("SELECT COUNT(*) FROM courses");
        courses.and_eq("semester", semester).scoped(PLAIN_SCOPE, scope);

        let mut faculty = ScopedQuery::new("SELECT COUNT(*) FROM faculty");
        faculty
            .and_eq("role", Role::Faculty.as_str())
            .scoped(PLAIN_SCOPE, scope);

        let (courses, faculty, rooms, time_slots) = tokio::try_join!(
            self.count(courses),
            self.count(faculty),
            self.count(ScopedQuery::new("SELECT COUNT(*) FROM rooms")),
            self.count(ScopedQuery::new("SELECT COUNT(*) FROM time_slots")),
        )?;

        Ok(ResourceCounts {
            courses,
            faculty,
            rooms,
            time_slots,
        })
    }

    async fn insert_job(
        &self,
        semester: i32,
        college_id: DbId,
        department_id: Option<DbId>,
    ) -> StoreResult<TimetableJob> {
        let sql = format!(
            "INSERT INTO timetable_jobs (status, semester, college_id, department_id) \
             VALUES ($1, $2, $3, $4) RETURNING {JOB_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, TimetableJob>(&sql)
            .bind(JobStatus::Pending.as_str())
            .bind(semester)
            .bind(college_id)
            .bind(department_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_job_status(
        &self,
        id: DbId,
        from: JobStatus,
        to: JobStatus,
        error: Option<&str>,
    ) -> StoreResult<TimetableJob> {
        let completed_at = to.is_terminal().then(Utc::now);
        let sql = format!(
            "UPDATE timetable_jobs \
             SET status = $1, error = COALESCE($2, error), completed_at = COALESCE($3, completed_at) \
             WHERE id = $4 AND status = $5 RETURNING {JOB_COLUMNS}"
        );
        sqlx::query_as::<_, TimetableJob>(&sql)
            .bind(to.as_str())
            .bind(error)
            .bind(completed_at)
            .bind(id)
            .bind(from.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::StaleJobState {
                job_id: id,
                expected: from,
            })
    }

    async fn get_job(&self, id: DbId) -> StoreResult<Option<TimetableJob>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM timetable_jobs WHERE id = $1");
        Ok(sqlx::query_as::<_, TimetableJob>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_assignments(&self, visibility: &AssignmentVisibility) -> StoreResult<Vec<AssignmentView>> {
        let mut query = match visibility {
            AssignmentVisibility::EnrolledStudent { student_id } => {
                let base = format!(
                    "{ASSIGNMENT_VIEW} JOIN enrollments e ON e.course_id = ta.course_id"
                );
                let mut query = ScopedQuery::new(&base);
                query.and_eq("e.student_id", *student_id);
                query
            }
            AssignmentVisibility::Scoped(scope) => {
                let mut query = ScopedQuery::new(ASSIGNMENT_VIEW);
                query.scoped(ASSIGNMENT_SCOPE, scope);
                query
            }
        };
        query.order_by("ta.id");
        debug!(sql = query.sql(), "Listing timetable assignments");
        Ok(query
            .into_builder()
            .build_query_as::<AssignmentView>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn replace_assignment(
        &self,
        id: DbId,
        fields: AssignmentFields,
    ) -> StoreResult<Option<TimetableAssignment>> {
        let sql = format!(
            "UPDATE timetable_assignments \
             SET course_id = $1, faculty_id = $2, room_id = $3, time_slot_id = $4, \
                 semester = $5, college_id = $6, department_id = $7 \
             WHERE id = $8 RETURNING {ASSIGNMENT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, TimetableAssignment>(&sql)
            .bind(fields.course_id)
            .bind(fields.faculty_id)
            .bind(fields.room_id)
            .bind(fields.time_slot_id)
            .bind(fields.semester)
            .bind(fields.college_id)
            .bind(fields.department_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_invitation(
        &self,
        token_hash: &str,
        created_by: Option<DbId>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<AdminInvitation> {
        let sql = format!(
            "INSERT INTO admin_invitations (token_hash, created_by, expires_at) \
             VALUES ($1, $2, $3) RETURNING {INVITATION_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, AdminInvitation>(&sql)
            .bind(token_hash)
            .bind(created_by)
            .bind(expires_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn find_active_invitation(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AdminInvitation>> {
        let sql = format!(
            "SELECT {INVITATION_COLUMNS} FROM admin_invitations \
             WHERE token_hash = $1 AND consumed_at IS NULL AND expires_at > $2"
        );
        Ok(sqlx::query_as::<_, AdminInvitation>(&sql)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn consume_invitation(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AdminInvitation>> {
        let sql = format!(
            "UPDATE admin_invitations SET consumed_at = $2 \
             WHERE token_hash = $1 AND consumed_at IS NULL AND expires_at > $2 \
             RETURNING {INVITATION_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, AdminInvitation>(&sql)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn append_audit(&self, user_id: Option<DbId>, action: &str) -> StoreResult<()> {
        sqlx::query("INSERT INTO audit_logs (user_id, action) VALUES ($1, $2)")
            .bind(user_id)
            .bind(action)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
