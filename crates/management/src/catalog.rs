//! Admin-managed catalog: courses, faculty expertise, rooms, time slots and
//! enrollments, plus the college / department pair validation shared with
//! signup and generation.

use chrono::NaiveTime;
use timetable_core::types::*;
use timetable_core::{ScopeFilter, TimetableError, TimetableResult};
use timetable_platform::{Action, AuditAction, Principal};
use tracing::info;

use crate::models::{
    present, CreateCourseRequest, EnrollmentRequest, ExpertiseRequest, RoomRequest, TimeSlotQuery,
    TimeSlotRequest,
};
use crate::store::{TimeSlotFilter, TimetableStore};

/// Check that the college exists and, when given, that the department
/// exists and belongs to it.
pub async fn resolve_scope(
    store: &dyn TimetableStore,
    college_id: DbId,
    department_id: Option<DbId>,
) -> TimetableResult<ScopeFilter> {
    if store.get_college(college_id).await?.is_none() {
        return Err(TimetableError::validation("College not found"));
    }

    if let Some(department_id) = department_id {
        let department = store
            .get_department(department_id)
            .await?
            .ok_or_else(|| TimetableError::validation("Department not found"))?;
        if department.college_id != college_id {
            return Err(TimetableError::validation(
                "Department does not belong to the selected college",
            ));
        }
    }

    Ok(ScopeFilter::new(Some(college_id), department_id))
}

/// Parse `HH:MM` or `HH:MM:SS`.
pub fn parse_clock(field: &str, raw: &str) -> TimetableResult<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| TimetableError::validation(format!("{field} must be a time (HH:MM)")))
}

// ─── Courses ───────────────────────────────────────────────────────────────

pub async fn create_course(
    store: &dyn TimetableStore,
    actor: &Principal,
    req: CreateCourseRequest,
) -> TimetableResult<Course> {
    actor.require(Action::CreateCourse)?;

    let (Some(name), Some(code), Some(credits), Some(semester), Some(college_id), Some(department_id)) = (
        present(&req.name),
        present(&req.code),
        req.credits,
        req.semester,
        req.college_id,
        req.department_id,
    ) else {
        return Err(TimetableError::validation("All fields are required"));
    };

    if semester <= 0 {
        return Err(TimetableError::validation("Semester must be a positive integer"));
    }
    if credits <= 0 {
        return Err(TimetableError::validation("Credits must be a positive integer"));
    }
    resolve_scope(store, college_id, Some(department_id)).await?;
    if store.course_code_exists(code).await? {
        return Err(TimetableError::DuplicateCode);
    }

    let course = insert_course(
        store,
        NewCourse {
            name: name.to_string(),
            code: code.to_string(),
            credits,
            is_elective: req.is_elective,
            semester,
            college_id,
            department_id,
        },
    )
    .await?;

    store
        .append_audit(
            Some(actor.account_id),
            &AuditAction::CreateCourse {
                code: course.code.clone(),
            }
            .to_string(),
        )
        .await?;

    metrics::counter!("courses.created").increment(1);
    info!(course_id = course.id, code = %course.code, "Course created");
    Ok(course)
}

// ─── Faculty expertise ─────────────────────────────────────────────────────

pub async fn faculty_courses(store: &dyn TimetableStore, faculty_id: DbId) -> TimetableResult<Vec<Course>> {
    if store.get_faculty(faculty_id).await?.is_none() {
        return Err(TimetableError::not_found("Faculty not found"));
    }
    Ok(store.list_faculty_courses(faculty_id).await?)
}

pub async fn add_expertise(
    store: &dyn TimetableStore,
    actor: &Principal,
    req: ExpertiseRequest,
) -> TimetableResult<FacultyCourse> {
    actor.require(Action::ManageExpertise)?;

    let (Some(faculty_id), Some(course_id)) = (req.faculty_id, req.course_id) else {
        return Err(TimetableError::validation("faculty_id and course_id are required"));
    };
    match store.get_faculty(faculty_id).await? {
        Some(member) if member.role == Role::Faculty => {}
        _ => return Err(TimetableError::validation("Faculty not found")),
    }
    if store.get_course(course_id).await?.is_none() {
        return Err(TimetableError::validation("Course not found"));
    }

    let link = store
        .insert_faculty_course(FacultyCourse { faculty_id, course_id })
        .await
        .map_err(|err| {
            if err.is_unique_violation() {
                TimetableError::validation("Expertise already exists")
            } else {
                err.into()
            }
        })?;

    store
        .append_audit(
            Some(actor.account_id),
            &AuditAction::AddExpertise { faculty_id, course_id }.to_string(),
        )
        .await?;
    metrics::counter!("faculty.expertise.added").increment(1);
    Ok(link)
}

// ─── Rooms ─────────────────────────────────────────────────────────────────

pub async fn create_room(
    store: &dyn TimetableStore,
    actor: &Principal,
    req: RoomRequest,
) -> TimetableResult<Room> {
    actor.require(Action::ManageRooms)?;

    let Some(name) = present(&req.name) else {
        return Err(TimetableError::validation("Room name is required"));
    };
    if matches!(req.capacity, Some(capacity) if capacity <= 0) {
        return Err(TimetableError::validation("Capacity must be a positive integer"));
    }

    let room = store.insert_room(name, req.capacity).await?;
    store
        .append_audit(
            Some(actor.account_id),
            &AuditAction::CreateRoom {
                name: room.name.clone(),
            }
            .to_string(),
        )
        .await?;
    metrics::counter!("rooms.created").increment(1);
    Ok(room)
}

// ─── Time slots ────────────────────────────────────────────────────────────

pub async fn list_time_slots(store: &dyn TimetableStore, query: TimeSlotQuery) -> TimetableResult<Vec<TimeSlot>> {
    let filter = TimeSlotFilter {
        day: present(&query.day).map(str::parse::<Weekday>).transpose()?,
        start_time: present(&query.start_time)
            .map(|raw| parse_clock("start_time", raw))
            .transpose()?,
    };
    Ok(store.list_time_slots(&filter).await?)
}

pub async fn create_time_slot(
    store: &dyn TimetableStore,
    actor: &Principal,
    req: TimeSlotRequest,
) -> TimetableResult<TimeSlot> {
    actor.require(Action::ManageTimeSlots)?;

    let (Some(day), Some(start), Some(end)) = (
        present(&req.day),
        present(&req.start_time),
        present(&req.end_time),
    ) else {
        return Err(TimetableError::validation("All fields are required"));
    };
    let day: Weekday = day.parse()?;
    let start_time = parse_clock("start_time", start)?;
    let end_time = parse_clock("end_time", end)?;
    if end_time <= start_time {
        return Err(TimetableError::validation("End time must be after start time"));
    }

    let slot = store.insert_time_slot(day, start_time, end_time).await?;
    store
        .append_audit(
            Some(actor.account_id),
            &AuditAction::CreateTimeSlot { slot_id: slot.id }.to_string(),
        )
        .await?;
    metrics::counter!("time_slots.created").increment(1);
    Ok(slot)
}

// ─── Enrollments ───────────────────────────────────────────────────────────

pub async fn enroll(
    store: &dyn TimetableStore,
    actor: &Principal,
    req: EnrollmentRequest,
) -> TimetableResult<Enrollment> {
    actor.require(Action::ManageEnrollments)?;

    let (Some(student_id), Some(course_id)) = (req.student_id, req.course_id) else {
        return Err(TimetableError::validation("student_id and course_id are required"));
    };
    if store.get_student(student_id).await?.is_none() {
        return Err(TimetableError::validation("Student not found"));
    }
    if store.get_course(course_id).await?.is_none() {
        return Err(TimetableError::validation("Course not found"));
    }

    let enrollment = store
        .insert_enrollment(Enrollment { student_id, course_id })
        .await
        .map_err(|err| {
            if err.is_unique_violation() {
                TimetableError::validation("Student already enrolled in this course")
            } else {
                err.into()
            }
        })?;

    store
        .append_audit(
            Some(actor.account_id),
            &AuditAction::Enroll { student_id, course_id }.to_string(),
        )
        .await?;
    metrics::counter!("enrollments.created").increment(1);
    Ok(enrollment)
}

/// Insert without the pre-check; a concurrent insert of the same code
/// surfaces as the store's unique violation.
pub(crate) async fn insert_course(store: &dyn TimetableStore, course: NewCourse) -> TimetableResult<Course> {
    store.insert_course(course).await.map_err(|err| {
        if err.is_unique_violation() {
            TimetableError::DuplicateCode
        } else {
            err.into()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn admin() -> Principal {
        Principal {
            account_id: 1,
            email: "admin@uni.edu".into(),
            role: Role::Admin,
        }
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let engineering = store.insert_college("Engineering");
        store.insert_department("Computer Science", engineering.id);
        let arts = store.insert_college("Arts");
        store.insert_department("History", arts.id);
        store
    }

    fn course_req(code: &str) -> CreateCourseRequest {
        CreateCourseRequest {
            name: Some("Algorithms".into()),
            code: Some(code.into()),
            credits: Some(4),
            is_elective: false,
            semester: Some(3),
            college_id: Some(1),
            department_id: Some(1),
        }
    }

    #[tokio::test]
    async fn test_code_race_reported_as_duplicate() {
        let store = seeded();
        let new_course = |name: &str| NewCourse {
            name: name.into(),
            code: "CS301".into(),
            credits: 4,
            is_elective: false,
            semester: 3,
            college_id: 1,
            department_id: 1,
        };
        insert_course(&store, new_course("Algorithms")).await.unwrap();

        // Both requests passed the code pre-check; the store catches the second.
        let err = insert_course(&store, new_course("Algorithms II")).await.unwrap_err();
        assert!(matches!(err, TimetableError::DuplicateCode));
        assert_eq!(err.to_string(), "Course code already exists");
        assert_eq!(store.list_courses(&ScopeFilter::unscoped()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_course_and_audit() {
        let store = seeded();
        let course = create_course(&store, &admin(), course_req("CS301")).await.unwrap();
        assert_eq!(course.code, "CS301");

        let audit = store.audit_entries();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, "Create Course CS301");
        assert_eq!(audit[0].user_id, Some(1));
    }

    #[tokio::test]
    async fn test_create_course_validation_order() {
        let store = seeded();

        let mut req = course_req("CS1");
        req.code = None;
        let err = create_course(&store, &admin(), req).await.unwrap_err();
        assert_eq!(err.to_string(), "All fields are required");

        let mut req = course_req("CS1");
        req.semester = Some(0);
        req.credits = Some(0);
        let err = create_course(&store, &admin(), req).await.unwrap_err();
        assert_eq!(err.to_string(), "Semester must be a positive integer");

        let mut req = course_req("CS1");
        req.credits = Some(-1);
        let err = create_course(&store, &admin(), req).await.unwrap_err();
        assert_eq!(err.to_string(), "Credits must be a positive integer");

        let mut req = course_req("CS1");
        req.college_id = Some(99);
        let err = create_course(&store, &admin(), req).await.unwrap_err();
        assert_eq!(err.to_string(), "College not found");

        let mut req = course_req("CS1");
        req.department_id = Some(99);
        let err = create_course(&store, &admin(), req).await.unwrap_err();
        assert_eq!(err.to_string(), "Department not found");

        let mut req = course_req("CS1");
        req.department_id = Some(2);
        let err = create_course(&store, &admin(), req).await.unwrap_err();
        assert_eq!(err.to_string(), "Department does not belong to the selected college");

        assert!(store.audit_entries().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_course_code() {
        let store = seeded();
        create_course(&store, &admin(), course_req("CS101")).await.unwrap();
        let err = create_course(&store, &admin(), course_req("CS101")).await.unwrap_err();
        assert!(matches!(err, TimetableError::DuplicateCode));
        assert_eq!(err.to_string(), "Course code already exists");
    }

    #[tokio::test]
    async fn test_non_admin_cannot_create() {
        let store = seeded();
        let faculty = Principal {
            account_id: 2,
            email: "f@uni.edu".into(),
            role: Role::Faculty,
        };
        let err = create_course(&store, &faculty, course_req("CS1")).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
        let err = create_room(&store, &faculty, RoomRequest::default()).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_time_slot_rules() {
        let store = seeded();
        let slot = create_time_slot(
            &store,
            &admin(),
            TimeSlotRequest {
                day: Some("mon".into()),
                start_time: Some("09:00".into()),
                end_time: Some("10:00:00".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(slot.day, Weekday::Monday);

        let err = create_time_slot(
            &store,
            &admin(),
            TimeSlotRequest {
                day: Some("Tuesday".into()),
                start_time: Some("11:00".into()),
                end_time: Some("10:00".into()),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "End time must be after start time");

        let found = list_time_slots(
            &store,
            TimeSlotQuery {
                day: Some("Monday".into()),
                start_time: Some("09:00:00".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);

        let all = list_time_slots(&store, TimeSlotQuery::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_expertise_unique() {
        let store = seeded();
        let course = create_course(&store, &admin(), course_req("CS1")).await.unwrap();
        let faculty = store
            .insert_account(NewAccount {
                name: "Dr. Rao".into(),
                email: "rao@uni.edu".into(),
                password_hash: "x".into(),
                role: Role::Faculty,
                college_id: Some(1),
                department_id: Some(1),
                max_load: 20,
            })
            .await
            .unwrap();

        let req = ExpertiseRequest {
            faculty_id: Some(faculty.id),
            course_id: Some(course.id),
        };
        add_expertise(&store, &admin(), req.clone()).await.unwrap();
        let err = add_expertise(&store, &admin(), req).await.unwrap_err();
        assert_eq!(err.to_string(), "Expertise already exists");

        let courses = faculty_courses(&store, faculty.id).await.unwrap();
        assert_eq!(courses.len(), 1);
        assert!(matches!(
            faculty_courses(&store, 404).await,
            Err(TimetableError::NotFound(_))
        ));
    }

    #[test]
    fn test_parse_clock() {
        assert_eq!(
            parse_clock("start_time", "09:30").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert!(parse_clock("start_time", "9.30").is_err());
    }
}
