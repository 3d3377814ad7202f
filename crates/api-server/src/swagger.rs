//! OpenAPI document for the timetable API.

use utoipa::openapi::schema::{KnownFormat, ObjectBuilder, Schema, SchemaFormat, SchemaType};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::RefOr;
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Timetable API",
        version = "0.1.0",
        description = "University timetable management: role-based accounts, the academic catalog, solver-backed timetable generation, and PDF/xlsx/iCalendar exports.",
        license(name = "MIT"),
    ),
    modifiers(&SharedComponents),
    tags(
        (name = "Accounts", description = "Login, signup and admin invitations"),
        (name = "Catalog", description = "Colleges, departments, courses, faculty, rooms and time slots"),
        (name = "Timetable", description = "Generation jobs and the assignment grid"),
        (name = "Export", description = "PDF, Excel and iCalendar downloads"),
        (name = "Operations", description = "Health, readiness, and liveness probes"),
    ),
    paths(
        // Accounts
        timetable_management::handlers::login,
        timetable_management::handlers::signup,
        timetable_management::handlers::admin_signup,
        timetable_management::handlers::create_invitation,
        // Catalog
        timetable_management::handlers::list_colleges,
        timetable_management::handlers::list_departments,
        timetable_management::handlers::list_courses,
        timetable_management::handlers::create_course,
        timetable_management::handlers::list_faculty,
        timetable_management::handlers::get_faculty_courses,
        timetable_management::handlers::add_faculty_course,
        timetable_management::handlers::list_rooms,
        timetable_management::handlers::create_room,
        timetable_management::handlers::list_time_slots,
        timetable_management::handlers::create_time_slot,
        timetable_management::handlers::create_enrollment,
        // Timetable
        timetable_management::handlers::generate_timetable,
        timetable_management::handlers::get_timetable,
        timetable_management::handlers::update_timetable,
        timetable_management::handlers::get_job,
        // Export
        timetable_management::handlers::export_timetable,
        // Operations
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
    ),
    components(schemas(
        // Accounts & roles
        timetable_core::types::Role,
        timetable_core::types::Account,
        timetable_core::types::FacultyMember,
        timetable_management::models::LoginRequest,
        timetable_management::models::SignupRequest,
        timetable_management::models::AdminSignupRequest,
        timetable_management::models::AuthResponse,
        timetable_management::models::InvitationResponse,
        // Catalog
        timetable_core::types::College,
        timetable_core::types::Department,
        timetable_core::types::Course,
        timetable_core::types::FacultyCourse,
        timetable_core::types::Enrollment,
        timetable_core::types::Room,
        timetable_core::types::Weekday,
        timetable_core::types::TimeSlot,
        timetable_management::models::CreateCourseRequest,
        timetable_management::models::ExpertiseRequest,
        timetable_management::models::RoomRequest,
        timetable_management::models::TimeSlotRequest,
        timetable_management::models::EnrollmentRequest,
        // Timetable
        timetable_core::types::TimetableAssignment,
        timetable_core::types::AssignmentView,
        timetable_core::types::JobStatus,
        timetable_core::types::TimetableJob,
        timetable_management::models::GenerateRequest,
        timetable_management::models::GenerateResponse,
        timetable_management::models::AssignmentUpdateRequest,
        // Errors & operations
        timetable_management::models::ErrorResponse,
        crate::rest::HealthResponse,
    ))
)]
pub struct ApiDoc;

/// Components the derive cannot produce: the `DbId` alias every id field
/// refers to, and the bearer scheme protected routes declare.
struct SharedComponents;

impl Modify for SharedComponents {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.schemas.insert(
            "DbId".to_string(),
            RefOr::T(Schema::Object(
                ObjectBuilder::new()
                    .schema_type(SchemaType::Integer)
                    .format(Some(SchemaFormat::KnownFormat(KnownFormat::Int32)))
                    .build(),
            )),
        );
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
        );
    }
}
