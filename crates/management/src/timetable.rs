//! Role-aware timetable reads and the admin's manual assignment edit.

use timetable_core::types::*;
use timetable_core::{ScopeFilter, TimetableError, TimetableResult};
use timetable_platform::{Access, Action, AuditAction, Principal};
use tracing::{debug, info};

use crate::models::AssignmentUpdateRequest;
use crate::store::{AssignmentVisibility, TimetableStore};

/// Which assignments the caller may see for `action`. `None` means the
/// caller has no matching account record and sees nothing.
pub async fn visibility_for(
    store: &dyn TimetableStore,
    principal: &Principal,
    action: Action,
    requested: ScopeFilter,
) -> TimetableResult<Option<AssignmentVisibility>> {
    match principal.require(action)? {
        Access::Full => Ok(Some(AssignmentVisibility::Scoped(requested))),
        Access::EnrolledCourses => Ok(store
            .find_student_by_email(&principal.email)
            .await?
            .map(|student| AssignmentVisibility::EnrolledStudent {
                student_id: student.id,
            })),
        Access::OwnScope => {
            let own = store.find_faculty_by_email(&principal.email).await?;
            Ok(own.and_then(|member| {
                member.college_id.map(|college_id| {
                    AssignmentVisibility::Scoped(ScopeFilter::new(Some(college_id), member.department_id))
                })
            }))
        }
        Access::Denied => Err(TimetableError::forbidden("Admin only")),
    }
}

/// Assignments visible to the caller, in insertion order. Query filters
/// only apply to callers with full access.
pub async fn list_timetable(
    store: &dyn TimetableStore,
    principal: &Principal,
    action: Action,
    requested: ScopeFilter,
) -> TimetableResult<Vec<AssignmentView>> {
    let Some(visibility) = visibility_for(store, principal, action, requested).await? else {
        debug!(email = %principal.email, role = %principal.role, "No account record; empty timetable");
        return Ok(Vec::new());
    };
    Ok(store.list_assignments(&visibility).await?)
}

pub async fn update_assignment(
    store: &dyn TimetableStore,
    actor: &Principal,
    assignment_id: DbId,
    req: AssignmentUpdateRequest,
) -> TimetableResult<TimetableAssignment> {
    actor.require(Action::EditTimetable)?;

    let (Some(course_id), Some(faculty_id), Some(room_id), Some(time_slot_id), Some(semester)) = (
        req.course_id,
        req.faculty_id,
        req.room_id,
        req.time_slot_id,
        req.semester,
    ) else {
        return Err(TimetableError::validation("All fields are required"));
    };
    if semester <= 0 {
        return Err(TimetableError::validation("Semester must be a positive integer"));
    }

    let course = store
        .get_course(course_id)
        .await?
        .ok_or_else(|| TimetableError::validation("Course not found"))?;
    if store.get_faculty(faculty_id).await?.is_none() {
        return Err(TimetableError::validation("Faculty not found"));
    }
    if store.get_room(room_id).await?.is_none() {
        return Err(TimetableError::validation("Room not found"));
    }
    if store.get_time_slot(time_slot_id).await?.is_none() {
        return Err(TimetableError::validation("Time slot not found"));
    }

    // Scope follows the course so the pair stays consistent.
    let fields = AssignmentFields {
        course_id,
        faculty_id,
        room_id,
        time_slot_id,
        semester,
        college_id: Some(course.college_id),
        department_id: Some(course.department_id),
    };
    let updated = store
        .replace_assignment(assignment_id, fields)
        .await?
        .ok_or_else(|| TimetableError::not_found("Assignment not found"))?;

    store
        .append_audit(
            Some(actor.account_id),
            &AuditAction::UpdateAssignment { assignment_id }.to_string(),
        )
        .await?;
    metrics::counter!("timetable.assignments.updated").increment(1);
    info!(assignment_id, course_id, faculty_id, room_id, time_slot_id, "Assignment replaced");
    Ok(updated)
}

pub async fn get_job(store: &dyn TimetableStore, actor: &Principal, job_id: DbId) -> TimetableResult<TimetableJob> {
    actor.require(Action::ViewJobs)?;
    store
        .get_job(job_id)
        .await?
        .ok_or_else(|| TimetableError::not_found("Job not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use chrono::NaiveTime;

    struct Fixture {
        store: MemoryStore,
        cs_course: Course,
        ee_course: Course,
        cs_faculty: Account,
        slot: TimeSlot,
        room: Room,
    }

    async fn account(store: &MemoryStore, email: &str, role: Role, college: Option<DbId>, dept: Option<DbId>) -> Account {
        store
            .insert_account(NewAccount {
                name: email.split('@').next().unwrap_or_default().to_string(),
                email: email.into(),
                password_hash: "x".into(),
                role,
                college_id: college,
                department_id: dept,
                max_load: 20,
            })
            .await
            .unwrap()
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let college = store.insert_college("Engineering");
        let cs = store.insert_department("Computer Science", college.id);
        let ee = store.insert_department("Electrical", college.id);

        let new_course = |code: &str, dept: DbId| NewCourse {
            name: format!("Course {code}"),
            code: code.into(),
            credits: 3,
            is_elective: false,
            semester: 3,
            college_id: college.id,
            department_id: dept,
        };
        let cs_course = store.insert_course(new_course("CS1", cs.id)).await.unwrap();
        let ee_course = store.insert_course(new_course("EE1", ee.id)).await.unwrap();

        let cs_faculty = account(&store, "cs@uni.edu", Role::Faculty, Some(college.id), Some(cs.id)).await;
        let ee_faculty = account(&store, "ee@uni.edu", Role::Faculty, Some(college.id), Some(ee.id)).await;
        let room = store.insert_room("LH-1", Some(40)).await.unwrap();
        let slot = store
            .insert_time_slot(
                Weekday::Monday,
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            )
            .await
            .unwrap();

        for (course, faculty) in [(&cs_course, &cs_faculty), (&ee_course, &ee_faculty)] {
            store.insert_assignment(AssignmentFields {
                course_id: course.id,
                faculty_id: faculty.id,
                room_id: room.id,
                time_slot_id: slot.id,
                semester: 3,
                college_id: Some(course.college_id),
                department_id: Some(course.department_id),
            });
        }

        Fixture {
            store,
            cs_course,
            ee_course,
            cs_faculty,
            slot,
            room,
        }
    }

    fn principal(email: &str, role: Role) -> Principal {
        Principal {
            account_id: 1,
            email: email.into(),
            role,
        }
    }

    #[tokio::test]
    async fn test_student_sees_enrolled_courses_only() {
        let f = fixture().await;
        let student = account(&f.store, "s@uni.edu", Role::Student, Some(1), None).await;
        f.store
            .insert_enrollment(Enrollment {
                student_id: student.id,
                course_id: f.ee_course.id,
            })
            .await
            .unwrap();

        // Query filters are ignored for students.
        let rows = list_timetable(
            &f.store,
            &principal("s@uni.edu", Role::Student),
            Action::ViewTimetable,
            ScopeFilter::new(Some(1), Some(1)),
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].course_id, f.ee_course.id);
    }

    #[tokio::test]
    async fn test_faculty_sees_own_department() {
        let f = fixture().await;
        let rows = list_timetable(
            &f.store,
            &principal("cs@uni.edu", Role::Faculty),
            Action::ViewTimetable,
            ScopeFilter::unscoped(),
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].course_id, f.cs_course.id);
        assert_eq!(rows[0].faculty_name, "cs");
    }

    #[tokio::test]
    async fn test_faculty_without_college_sees_nothing() {
        let f = fixture().await;
        account(&f.store, "loose@uni.edu", Role::Faculty, None, None).await;
        let rows = list_timetable(
            &f.store,
            &principal("loose@uni.edu", Role::Faculty),
            Action::ExportTimetable,
            ScopeFilter::unscoped(),
        )
        .await
        .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_admin_filters_apply() {
        let f = fixture().await;
        let admin = principal("admin@uni.edu", Role::Admin);
        let all = list_timetable(&f.store, &admin, Action::ViewTimetable, ScopeFilter::unscoped())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let ee_only = list_timetable(
            &f.store,
            &admin,
            Action::ViewTimetable,
            ScopeFilter::new(None, Some(f.ee_course.department_id)),
        )
        .await
        .unwrap();
        assert_eq!(ee_only.len(), 1);
        assert_eq!(ee_only[0].course_code, "EE1");
    }

    #[tokio::test]
    async fn test_update_then_read() {
        let f = fixture().await;
        let admin = principal("admin@uni.edu", Role::Admin);
        let assignment_id = 2;

        let updated = update_assignment(
            &f.store,
            &admin,
            assignment_id,
            AssignmentUpdateRequest {
                course_id: Some(f.cs_course.id),
                faculty_id: Some(f.cs_faculty.id),
                room_id: Some(f.room.id),
                time_slot_id: Some(f.slot.id),
                semester: Some(3),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.department_id, Some(f.cs_course.department_id));

        let rows = list_timetable(&f.store, &admin, Action::ViewTimetable, ScopeFilter::unscoped())
            .await
            .unwrap();
        let row = rows.iter().find(|r| r.id == assignment_id).unwrap();
        assert_eq!(row.course_code, "CS1");
        assert_eq!(row.faculty_name, "cs");

        let audit = f.store.audit_entries();
        assert_eq!(audit.last().unwrap().action, "Update Timetable Assignment 2");
    }

    #[tokio::test]
    async fn test_update_missing_assignment() {
        let f = fixture().await;
        let err = update_assignment(
            &f.store,
            &principal("admin@uni.edu", Role::Admin),
            999,
            AssignmentUpdateRequest {
                course_id: Some(f.cs_course.id),
                faculty_id: Some(f.cs_faculty.id),
                room_id: Some(f.room.id),
                time_slot_id: Some(f.slot.id),
                semester: Some(3),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.to_string(), "Assignment not found");
    }
}
