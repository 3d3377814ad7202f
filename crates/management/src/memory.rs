//! In-memory store backed by DashMap.
//!
//! Serves the test suite and `serve --in-memory` development runs. Unique
//! constraints are enforced through secondary index maps so that duplicate
//! inserts fail the same way PostgreSQL does.

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicI32, Ordering};
use timetable_core::types::*;
use timetable_core::ScopeFilter;
use tracing::info;

use crate::store::*;

#[derive(Default)]
struct Sequence(AtomicI32);

impl Sequence {
    fn next(&self) -> DbId {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

fn unique_violation(constraint: &str) -> StoreError {
    StoreError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

fn sorted_by_id<T, F>(mut rows: Vec<T>, id: F) -> Vec<T>
where
    F: Fn(&T) -> DbId,
{
    rows.sort_by_key(|row| id(row));
    rows
}

#[derive(Default)]
pub struct MemoryStore {
    colleges: DashMap<DbId, College>,
    departments: DashMap<DbId, Department>,
    students: DashMap<DbId, Account>,
    faculty: DashMap<DbId, (Account, i32)>,
    student_emails: DashMap<String, DbId>,
    faculty_emails: DashMap<String, DbId>,
    courses: DashMap<DbId, Course>,
    course_codes: DashMap<String, DbId>,
    faculty_courses: DashSet<FacultyCourse>,
    rooms: DashMap<DbId, Room>,
    time_slots: DashMap<DbId, TimeSlot>,
    enrollments: DashSet<Enrollment>,
    assignments: DashMap<DbId, TimetableAssignment>,
    jobs: DashMap<DbId, TimetableJob>,
    invitations: DashMap<String, AdminInvitation>,
    audit_log: DashMap<DbId, AuditLogEntry>,
    college_seq: Sequence,
    department_seq: Sequence,
    student_seq: Sequence,
    faculty_seq: Sequence,
    course_seq: Sequence,
    room_seq: Sequence,
    slot_seq: Sequence,
    assignment_seq: Sequence,
    job_seq: Sequence,
    invitation_seq: Sequence,
    audit_seq: Sequence,
    #[cfg(test)]
    failing_job_status: std::sync::Mutex<Option<JobStatus>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store preloaded with one college, two departments, rooms, a week
    /// of slots and a handful of courses.
    pub fn with_demo_data() -> Self {
        info!("Timetable store initialized (in-memory, development mode)");
        let store = Self::new();
        store.seed_demo_data();
        store
    }

    fn seed_demo_data(&self) {
        let college = self.insert_college("College of Engineering");
        let cs = self.insert_department("Computer Science", college.id);
        let ee = self.insert_department("Electrical Engineering", college.id);

        for (name, capacity) in [("LH-101", 60), ("LH-102", 60), ("Lab-A", 30)] {
            let id = self.room_seq.next();
            self.rooms.insert(
                id,
                Room {
                    id,
                    name: name.to_string(),
                    capacity: Some(capacity),
                },
            );
        }

        for day in Weekday::ALL {
            for hour in [9, 11, 14] {
                if let (Some(start), Some(end)) = (
                    NaiveTime::from_hms_opt(hour, 0, 0),
                    NaiveTime::from_hms_opt(hour + 1, 0, 0),
                ) {
                    self.push_time_slot(day, start, end);
                }
            }
        }

        let demo_courses = [
            ("Data Structures", "CS201", 4, cs.id),
            ("Operating Systems", "CS301", 4, cs.id),
            ("Circuit Analysis", "EE201", 3, ee.id),
        ];
        for (name, code, credits, department_id) in demo_courses {
            let id = self.course_seq.next();
            self.course_codes.insert(code.to_string(), id);
            self.courses.insert(
                id,
                Course {
                    id,
                    name: name.to_string(),
                    code: code.to_string(),
                    credits,
                    is_elective: false,
                    semester: 3,
                    college_id: college.id,
                    department_id,
                },
            );
        }
    }

    pub fn insert_college(&self, name: &str) -> College {
        let college = College {
            id: self.college_seq.next(),
            name: name.to_string(),
        };
        self.colleges.insert(college.id, college.clone());
        college
    }

    pub fn insert_department(&self, name: &str, college_id: DbId) -> Department {
        let department = Department {
            id: self.department_seq.next(),
            name: name.to_string(),
            college_id,
        };
        self.departments.insert(department.id, department.clone());
        department
    }

    /// Write an assignment the way the solver would.
    pub fn insert_assignment(&self, fields: AssignmentFields) -> TimetableAssignment {
        let assignment = TimetableAssignment {
            id: self.assignment_seq.next(),
            course_id: fields.course_id,
            faculty_id: fields.faculty_id,
            room_id: fields.room_id,
            time_slot_id: fields.time_slot_id,
            semester: fields.semester,
            college_id: fields.college_id,
            department_id: fields.department_id,
        };
        self.assignments.insert(assignment.id, assignment.clone());
        assignment
    }

    pub fn audit_entries(&self) -> Vec<AuditLogEntry> {
        sorted_by_id(
            self.audit_log.iter().map(|r| r.value().clone()).collect(),
            |entry| entry.id,
        )
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Make every later update of a job into `status` fail.
    #[cfg(test)]
    pub fn fail_job_updates_to(&self, status: JobStatus) {
        if let Ok(mut failing) = self.failing_job_status.lock() {
            *failing = Some(status);
        }
    }

    pub fn account_count(&self) -> usize {
        self.students.len() + self.faculty.len()
    }

    fn push_time_slot(&self, day: Weekday, start_time: NaiveTime, end_time: NaiveTime) -> TimeSlot {
        let slot = TimeSlot {
            id: self.slot_seq.next(),
            day,
            start_time,
            end_time,
        };
        self.time_slots.insert(slot.id, slot.clone());
        slot
    }

    fn faculty_member(account: &Account, max_load: i32) -> FacultyMember {
        FacultyMember {
            id: account.id,
            name: account.name.clone(),
            email: account.email.clone(),
            role: account.role,
            college_id: account.college_id,
            department_id: account.department_id,
            max_load,
        }
    }

    fn assignment_view(&self, assignment: &TimetableAssignment) -> Option<AssignmentView> {
        let course = self.courses.get(&assignment.course_id)?;
        let faculty = self.faculty.get(&assignment.faculty_id)?;
        let room = self.rooms.get(&assignment.room_id)?;
        let slot = self.time_slots.get(&assignment.time_slot_id)?;

        Some(AssignmentView {
            id: assignment.id,
            course_id: assignment.course_id,
            faculty_id: assignment.faculty_id,
            room_id: assignment.room_id,
            time_slot_id: assignment.time_slot_id,
            semester: assignment.semester,
            college_id: assignment.college_id,
            department_id: assignment.department_id,
            course_name: course.name.clone(),
            course_code: course.code.clone(),
            faculty_name: faculty.0.name.clone(),
            room_name: room.name.clone(),
            day: slot.day,
            start_time: slot.start_time,
            end_time: slot.end_time,
        })
    }
}

#[async_trait]
impl TimetableStore for MemoryStore {
    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        if let Some(student) = self.find_student_by_email(email).await? {
            return Ok(Some(student));
        }
        Ok(self
            .faculty_emails
            .get(email)
            .and_then(|id| self.faculty.get(id.value()).map(|r| r.value().0.clone())))
    }

    async fn find_student_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        Ok(self
            .student_emails
            .get(email)
            .and_then(|id| self.students.get(id.value()).map(|r| r.value().clone())))
    }

    async fn get_student(&self, id: DbId) -> StoreResult<Option<Account>> {
        Ok(self.students.get(&id).map(|r| r.value().clone()))
    }

    async fn insert_account(&self, account: NewAccount) -> StoreResult<Account> {
        let (emails, constraint) = match account.role {
            Role::Student => (&self.student_emails, "students_email_key"),
            Role::Faculty | Role::Admin => (&self.faculty_emails, "faculty_email_key"),
        };

        let id = match emails.entry(account.email.clone()) {
            Entry::Occupied(_) => return Err(unique_violation(constraint)),
            Entry::Vacant(slot) => {
                let id = match account.role {
                    Role::Student => self.student_seq.next(),
                    Role::Faculty | Role::Admin => self.faculty_seq.next(),
                };
                slot.insert(id);
                id
            }
        };

        let created = Account {
            id,
            name: account.name,
            email: account.email,
            password_hash: account.password_hash,
            role: account.role,
            college_id: account.college_id,
            department_id: account.department_id,
        };
        match created.role {
            Role::Student => {
                self.students.insert(id, created.clone());
            }
            Role::Faculty | Role::Admin => {
                self.faculty.insert(id, (created.clone(), account.max_load));
            }
        }
        Ok(created)
    }

    async fn list_colleges(&self) -> StoreResult<Vec<College>> {
        let mut colleges: Vec<College> = self.colleges.iter().map(|r| r.value().clone()).collect();
        colleges.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(colleges)
    }

    async fn get_college(&self, id: DbId) -> StoreResult<Option<College>> {
        Ok(self.colleges.get(&id).map(|r| r.value().clone()))
    }

    async fn list_departments(&self, college_id: Option<DbId>) -> StoreResult<Vec<Department>> {
        let mut departments: Vec<Department> = self
            .departments
            .iter()
            .filter(|r| college_id.map_or(true, |c| r.value().college_id == c))
            .map(|r| r.value().clone())
            .collect();
        departments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(departments)
    }

    async fn get_department(&self, id: DbId) -> StoreResult<Option<Department>> {
        Ok(self.departments.get(&id).map(|r| r.value().clone()))
    }

    async fn list_courses(&self, scope: &ScopeFilter) -> StoreResult<Vec<Course>> {
        Ok(sorted_by_id(
            self.courses
                .iter()
                .filter(|r| scope.matches(Some(r.value().college_id), Some(r.value().department_id)))
                .map(|r| r.value().clone())
                .collect(),
            |course| course.id,
        ))
    }

    async fn get_course(&self, id: DbId) -> StoreResult<Option<Course>> {
        Ok(self.courses.get(&id).map(|r| r.value().clone()))
    }

    async fn course_code_exists(&self, code: &str) -> StoreResult<bool> {
        Ok(self.course_codes.contains_key(code))
    }

    async fn insert_course(&self, course: NewCourse) -> StoreResult<Course> {
        let id = match self.course_codes.entry(course.code.clone()) {
            Entry::Occupied(_) => return Err(unique_violation("courses_code_key")),
            Entry::Vacant(slot) => {
                let id = self.course_seq.next();
                slot.insert(id);
                id
            }
        };
        let created = Course {
            id,
            name: course.name,
            code: course.code,
            credits: course.credits,
            is_elective: course.is_elective,
            semester: course.semester,
            college_id: course.college_id,
            department_id: course.department_id,
        };
        self.courses.insert(id, created.clone());
        Ok(created)
    }

    async fn list_faculty(&self, scope: &ScopeFilter) -> StoreResult<Vec<FacultyMember>> {
        Ok(sorted_by_id(
            self.faculty
                .iter()
                .filter(|r| {
                    let (account, _) = r.value();
                    account.role == Role::Faculty
                        && scope.matches(account.college_id, account.department_id)
                })
                .map(|r| Self::faculty_member(&r.value().0, r.value().1))
                .collect(),
            |member| member.id,
        ))
    }

    async fn get_faculty(&self, id: DbId) -> StoreResult<Option<FacultyMember>> {
        Ok(self
            .faculty
            .get(&id)
            .map(|r| Self::faculty_member(&r.value().0, r.value().1)))
    }

    async fn find_faculty_by_email(&self, email: &str) -> StoreResult<Option<FacultyMember>> {
        let id = match self.faculty_emails.get(email) {
            Some(id) => *id.value(),
            None => return Ok(None),
        };
        self.get_faculty(id).await
    }

    async fn list_faculty_courses(&self, faculty_id: DbId) -> StoreResult<Vec<Course>> {
        Ok(sorted_by_id(
            self.faculty_courses
                .iter()
                .filter(|link| link.faculty_id == faculty_id)
                .filter_map(|link| self.courses.get(&link.course_id).map(|r| r.value().clone()))
                .collect(),
            |course| course.id,
        ))
    }

    async fn insert_faculty_course(&self, link: FacultyCourse) -> StoreResult<FacultyCourse> {
        if self.faculty_courses.insert(link) {
            Ok(link)
        } else {
            Err(unique_violation("faculty_courses_pkey"))
        }
    }

    async fn list_rooms(&self) -> StoreResult<Vec<Room>> {
        Ok(sorted_by_id(
            self.rooms.iter().map(|r| r.value().clone()).collect(),
            |room| room.id,
        ))
    }

    async fn get_room(&self, id: DbId) -> StoreResult<Option<Room>> {
        Ok(self.rooms.get(&id).map(|r| r.value().clone()))
    }

    async fn insert_room(&self, name: &str, capacity: Option<i32>) -> StoreResult<Room> {
        let room = Room {
            id: self.room_seq.next(),
            name: name.to_string(),
            capacity,
        };
        self.rooms.insert(room.id, room.clone());
        Ok(room)
    }

    async fn list_time_slots(&self, filter: &TimeSlotFilter) -> StoreResult<Vec<TimeSlot>> {
        Ok(sorted_by_id(
            self.time_slots
                .iter()
                .filter(|r| filter.day.map_or(true, |day| r.value().day == day))
                .filter(|r| filter.start_time.map_or(true, |start| r.value().start_time == start))
                .map(|r| r.value().clone())
                .collect(),
            |slot| slot.id,
        ))
    }

    async fn get_time_slot(&self, id: DbId) -> StoreResult<Option<TimeSlot>> {
        Ok(self.time_slots.get(&id).map(|r| r.value().clone()))
    }

    async fn insert_time_slot(
        &self,
        day: Weekday,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> StoreResult<TimeSlot> {
        Ok(self.push_time_slot(day, start_time, end_time))
    }

    async fn insert_enrollment(&self, enrollment: Enrollment) -> StoreResult<Enrollment> {
        if self.enrollments.insert(enrollment) {
            Ok(enrollment)
        } else {
            Err(unique_violation("enrollments_pkey"))
        }
    }

    async fn count_resources(&self, semester: i32, scope: &ScopeFilter) -> StoreResult<ResourceCounts> {
        let courses = self
            .courses
            .iter()
            .filter(|r| {
                let course = r.value();
                course.semester == semester
                    && scope.matches(Some(course.college_id), Some(course.department_id))
            })
            .count();
        let faculty = self.list_faculty(scope).await?.len();

        Ok(ResourceCounts {
            courses: courses as i64,
            faculty: faculty as i64,
            rooms: self.rooms.len() as i64,
            time_slots: self.time_slots.len() as i64,
        })
    }

    async fn insert_job(
        &self,
        semester: i32,
        college_id: DbId,
        department_id: Option<DbId>,
    ) -> StoreResult<TimetableJob> {
        let job = TimetableJob {
            id: self.job_seq.next(),
            status: JobStatus::Pending,
            semester,
            college_id,
            department_id,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn update_job_status(
        &self,
        id: DbId,
        from: JobStatus,
        to: JobStatus,
        error: Option<&str>,
    ) -> StoreResult<TimetableJob> {
        #[cfg(test)]
        if self.failing_job_status.lock().is_ok_and(|failing| *failing == Some(to)) {
            return Err(StoreError::Backend("connection reset".into()));
        }
        let stale = StoreError::StaleJobState {
            job_id: id,
            expected: from,
        };
        let mut job = self.jobs.get_mut(&id).ok_or(stale)?;
        if job.status != from {
            return Err(StoreError::StaleJobState {
                job_id: id,
                expected: from,
            });
        }
        job.status = to;
        if let Some(error) = error {
            job.error = Some(error.to_string());
        }
        if to.is_terminal() {
            job.completed_at = Some(Utc::now());
        }
        Ok(job.clone())
    }

    async fn get_job(&self, id: DbId) -> StoreResult<Option<TimetableJob>> {
        Ok(self.jobs.get(&id).map(|r| r.value().clone()))
    }

    async fn list_assignments(&self, visibility: &AssignmentVisibility) -> StoreResult<Vec<AssignmentView>> {
        let visible = |assignment: &TimetableAssignment| match visibility {
            AssignmentVisibility::EnrolledStudent { student_id } => self.enrollments.contains(&Enrollment {
                student_id: *student_id,
                course_id: assignment.course_id,
            }),
            AssignmentVisibility::Scoped(scope) => {
                scope.matches(assignment.college_id, assignment.department_id)
            }
        };

        let assignments: Vec<TimetableAssignment> = self
            .assignments
            .iter()
            .filter(|r| visible(r.value()))
            .map(|r| r.value().clone())
            .collect();

        Ok(sorted_by_id(
            assignments
                .iter()
                .filter_map(|assignment| self.assignment_view(assignment))
                .collect(),
            |view| view.id,
        ))
    }

    async fn replace_assignment(
        &self,
        id: DbId,
        fields: AssignmentFields,
    ) -> StoreResult<Option<TimetableAssignment>> {
        Ok(self.assignments.get_mut(&id).map(|mut assignment| {
            *assignment = TimetableAssignment {
                id,
                course_id: fields.course_id,
                faculty_id: fields.faculty_id,
                room_id: fields.room_id,
                time_slot_id: fields.time_slot_id,
                semester: fields.semester,
                college_id: fields.college_id,
                department_id: fields.department_id,
            };
            assignment.clone()
        }))
    }

    async fn insert_invitation(
        &self,
        token_hash: &str,
        created_by: Option<DbId>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<AdminInvitation> {
        match self.invitations.entry(token_hash.to_string()) {
            Entry::Occupied(_) => Err(unique_violation("admin_invitations_token_hash_key")),
            Entry::Vacant(slot) => {
                let invitation = AdminInvitation {
                    id: self.invitation_seq.next(),
                    token_hash: token_hash.to_string(),
                    created_by,
                    created_at: Utc::now(),
                    expires_at,
                    consumed_at: None,
                };
                slot.insert(invitation.clone());
                Ok(invitation)
            }
        }
    }

    async fn find_active_invitation(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AdminInvitation>> {
        Ok(self
            .invitations
            .get(token_hash)
            .filter(|r| r.consumed_at.is_none() && r.expires_at > now)
            .map(|r| r.value().clone()))
    }

    async fn consume_invitation(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AdminInvitation>> {
        let Some(mut invitation) = self.invitations.get_mut(token_hash) else {
            return Ok(None);
        };
        if invitation.consumed_at.is_some() || invitation.expires_at <= now {
            return Ok(None);
        }
        invitation.consumed_at = Some(now);
        Ok(Some(invitation.clone()))
    }

    async fn append_audit(&self, user_id: Option<DbId>, action: &str) -> StoreResult<()> {
        let entry = AuditLogEntry {
            id: self.audit_seq.next(),
            user_id,
            action: action.to_string(),
            timestamp: Utc::now(),
        };
        self.audit_log.insert(entry.id, entry);
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_account(email: &str, role: Role) -> NewAccount {
        NewAccount {
            name: "Test".into(),
            email: email.into(),
            password_hash: "hash".into(),
            role,
            college_id: Some(1),
            department_id: Some(1),
            max_load: 20,
        }
    }

    #[tokio::test]
    async fn test_unified_account_lookup() {
        let store = MemoryStore::new();
        store.insert_account(new_account("s@uni.edu", Role::Student)).await.unwrap();
        store.insert_account(new_account("f@uni.edu", Role::Faculty)).await.unwrap();

        let student = store.find_account_by_email("s@uni.edu").await.unwrap().unwrap();
        assert_eq!(student.role, Role::Student);
        let faculty = store.find_account_by_email("f@uni.edu").await.unwrap().unwrap();
        assert_eq!(faculty.role, Role::Faculty);
        assert!(store.find_account_by_email("x@uni.edu").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let store = MemoryStore::new();
        store.insert_account(new_account("a@uni.edu", Role::Student)).await.unwrap();
        let err = store
            .insert_account(new_account("a@uni.edu", Role::Student))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(store.account_count(), 1);
    }

    #[tokio::test]
    async fn test_list_faculty_excludes_admins() {
        let store = MemoryStore::new();
        store.insert_account(new_account("f@uni.edu", Role::Faculty)).await.unwrap();
        store.insert_account(new_account("admin@uni.edu", Role::Admin)).await.unwrap();

        let faculty = store.list_faculty(&ScopeFilter::unscoped()).await.unwrap();
        assert_eq!(faculty.len(), 1);
        assert_eq!(faculty[0].email, "f@uni.edu");
    }

    #[tokio::test]
    async fn test_job_status_guards_stale_state() {
        let store = MemoryStore::new();
        let job = store.insert_job(3, 1, None).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        let running = store
            .update_job_status(job.id, JobStatus::Pending, JobStatus::Running, None)
            .await
            .unwrap();
        assert!(running.completed_at.is_none());

        let err = store
            .update_job_status(job.id, JobStatus::Pending, JobStatus::Running, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StaleJobState { .. }));

        let failed = store
            .update_job_status(job.id, JobStatus::Running, JobStatus::Failed, Some("boom"))
            .await
            .unwrap();
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert!(failed.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_invitation_consumed_once() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .insert_invitation("digest", None, now + Duration::hours(1))
            .await
            .unwrap();

        assert!(store.find_active_invitation("digest", now).await.unwrap().is_some());
        assert!(store.consume_invitation("digest", now).await.unwrap().is_some());
        assert!(store.consume_invitation("digest", now).await.unwrap().is_none());
        assert!(store.find_active_invitation("digest", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_invitation_not_consumable() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .insert_invitation("old", None, now - Duration::minutes(1))
            .await
            .unwrap();
        assert!(store.consume_invitation("old", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_demo_data_is_sufficient_for_generation() {
        let store = MemoryStore::with_demo_data();
        let counts = store
            .count_resources(3, &ScopeFilter::college(1))
            .await
            .unwrap();
        assert_eq!(counts.courses, 3);
        assert_eq!(counts.rooms, 3);
        assert_eq!(counts.time_slots, 15);
        // No faculty accounts are seeded.
        assert_eq!(counts.missing(), vec!["Faculty"]);
    }
}
