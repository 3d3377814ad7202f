//! Audit actions. Every mutating operation appends one entry whose action
//! text is produced here, so wording stays uniform across handlers.

use std::fmt;
use timetable_core::types::DbId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditAction {
    Login,
    Signup,
    AdminSignup,
    CreateCourse { code: String },
    AddExpertise { faculty_id: DbId, course_id: DbId },
    CreateRoom { name: String },
    CreateTimeSlot { slot_id: DbId },
    Enroll { student_id: DbId, course_id: DbId },
    GenerateTimetable { job_id: DbId, semester: i32 },
    TimetableJobFailed { job_id: DbId },
    UpdateAssignment { assignment_id: DbId },
    IssueInvitation { invitation_id: DbId },
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditAction::Login => write!(f, "Login"),
            AuditAction::Signup => write!(f, "Signup"),
            AuditAction::AdminSignup => write!(f, "Admin Signup"),
            AuditAction::CreateCourse { code } => write!(f, "Create Course {code}"),
            AuditAction::AddExpertise { faculty_id, course_id } => {
                write!(f, "Add Expertise {faculty_id}:{course_id}")
            }
            AuditAction::CreateRoom { name } => write!(f, "Create Room {name}"),
            AuditAction::CreateTimeSlot { slot_id } => write!(f, "Create Time Slot {slot_id}"),
            AuditAction::Enroll { student_id, course_id } => {
                write!(f, "Enroll Student {student_id} in Course {course_id}")
            }
            AuditAction::GenerateTimetable { job_id, semester } => {
                write!(f, "Generate Timetable Job {job_id} for Semester {semester}")
            }
            AuditAction::TimetableJobFailed { job_id } => write!(f, "Timetable Job {job_id} failed"),
            AuditAction::UpdateAssignment { assignment_id } => {
                write!(f, "Update Timetable Assignment {assignment_id}")
            }
            AuditAction::IssueInvitation { invitation_id } => {
                write!(f, "Issue Admin Invitation {invitation_id}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_text() {
        assert_eq!(AuditAction::Login.to_string(), "Login");
        assert_eq!(AuditAction::AdminSignup.to_string(), "Admin Signup");
        assert_eq!(
            AuditAction::CreateCourse { code: "CS101".into() }.to_string(),
            "Create Course CS101"
        );
        assert_eq!(
            AuditAction::GenerateTimetable { job_id: 4, semester: 2 }.to_string(),
            "Generate Timetable Job 4 for Semester 2"
        );
        assert_eq!(
            AuditAction::UpdateAssignment { assignment_id: 9 }.to_string(),
            "Update Timetable Assignment 9"
        );
    }
}
