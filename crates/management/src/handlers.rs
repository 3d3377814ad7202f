//! Axum REST handlers for the timetable API. Handlers stay thin: they
//! unpack the request, call the service functions, and shape the response.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use std::sync::Arc;
use timetable_core::types::*;
use timetable_core::{ScopeFilter, ScopeParams, TimetableError};
use timetable_platform::{Action, SessionManager};
use timetable_reporting::ExportFormat;
use tracing::info;

use crate::auth::Session;
use crate::error::{ApiResult, AppJson, AppPath, AppQuery};
use crate::models::*;
use crate::orchestrator::Orchestrator;
use crate::solver::Solver;
use crate::store::TimetableStore;
use crate::{accounts, catalog, timetable};

/// Shared state of the timetable API.
#[derive(Clone)]
pub struct ManagementState {
    pub store: Arc<dyn TimetableStore>,
    pub sessions: Arc<SessionManager>,
    pub solver: Arc<dyn Solver>,
    /// Monday of the week calendar exports are laid onto.
    pub reference_monday: NaiveDate,
    pub invitation_ttl_hours: i64,
}

// ─── Auth ──────────────────────────────────────────────────────────────────

#[utoipa::path(
    post,
    path = "/login",
    tag = "Accounts",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = AuthResponse),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<ManagementState>,
    AppJson(req): AppJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let response = accounts::login(state.store.as_ref(), &state.sessions, req).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/signup",
    tag = "Accounts",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Student or faculty account created", body = AuthResponse),
        (status = 400, description = "Validation failed", body = ErrorResponse)
    )
)]
pub async fn signup(
    State(state): State<ManagementState>,
    AppJson(req): AppJson<SignupRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let response = accounts::signup(state.store.as_ref(), &state.sessions, req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    post,
    path = "/admin-signup",
    tag = "Accounts",
    request_body = AdminSignupRequest,
    responses(
        (status = 201, description = "Admin account created", body = AuthResponse),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Invitation invalid, used or expired", body = ErrorResponse)
    )
)]
pub async fn admin_signup(
    State(state): State<ManagementState>,
    AppJson(req): AppJson<AdminSignupRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let response = accounts::admin_signup(state.store.as_ref(), &state.sessions, req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    post,
    path = "/admin-invitations",
    tag = "Accounts",
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Invitation issued; the token is shown once", body = InvitationResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse)
    )
)]
pub async fn create_invitation(
    State(state): State<ManagementState>,
    Session(principal): Session,
) -> ApiResult<(StatusCode, Json<InvitationResponse>)> {
    principal.require(Action::IssueInvitation)?;
    let response = accounts::issue_invitation(
        state.store.as_ref(),
        Some(principal.account_id),
        state.invitation_ttl_hours,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

// ─── Colleges & departments ────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/colleges",
    tag = "Catalog",
    responses((status = 200, description = "All colleges", body = [College]))
)]
pub async fn list_colleges(State(state): State<ManagementState>) -> ApiResult<Json<Vec<College>>> {
    Ok(Json(state.store.list_colleges().await?))
}

#[utoipa::path(
    get,
    path = "/departments",
    tag = "Catalog",
    params(("college_id" = Option<String>, Query, description = "Restrict to one college")),
    responses(
        (status = 200, description = "Departments", body = [Department]),
        (status = 400, description = "Validation failed", body = ErrorResponse)
    )
)]
pub async fn list_departments(
    State(state): State<ManagementState>,
    AppQuery(query): AppQuery<DepartmentQuery>,
) -> ApiResult<Json<Vec<Department>>> {
    let scope = ScopeFilter::from_params(query.college_id.as_deref(), None)?;
    Ok(Json(state.store.list_departments(scope.college_id).await?))
}

// ─── Courses ───────────────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/courses",
    tag = "Catalog",
    security(("bearer" = [])),
    params(
        ("college_id" = Option<String>, Query, description = "Restrict to one college"),
        ("department_id" = Option<String>, Query, description = "Restrict to one department")
    ),
    responses(
        (status = 200, description = "Courses in scope", body = [Course]),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse)
    )
)]
pub async fn list_courses(
    State(state): State<ManagementState>,
    Session(principal): Session,
    AppQuery(params): AppQuery<ScopeParams>,
) -> ApiResult<Json<Vec<Course>>> {
    principal.require(Action::ViewCourses)?;
    let scope = params.into_filter()?;
    Ok(Json(state.store.list_courses(&scope).await?))
}

#[utoipa::path(
    post,
    path = "/courses",
    tag = "Catalog",
    security(("bearer" = [])),
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Course created", body = Course),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse)
    )
)]
pub async fn create_course(
    State(state): State<ManagementState>,
    Session(principal): Session,
    AppJson(req): AppJson<CreateCourseRequest>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    let course = catalog::create_course(state.store.as_ref(), &principal, req).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

// ─── Faculty ───────────────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/faculty",
    tag = "Catalog",
    security(("bearer" = [])),
    params(
        ("college_id" = Option<String>, Query, description = "Restrict to one college"),
        ("department_id" = Option<String>, Query, description = "Restrict to one department")
    ),
    responses(
        (status = 200, description = "Faculty in scope", body = [FacultyMember]),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse)
    )
)]
pub async fn list_faculty(
    State(state): State<ManagementState>,
    Session(principal): Session,
    AppQuery(params): AppQuery<ScopeParams>,
) -> ApiResult<Json<Vec<FacultyMember>>> {
    principal.require(Action::ViewFaculty)?;
    let scope = params.into_filter()?;
    Ok(Json(state.store.list_faculty(&scope).await?))
}

#[utoipa::path(
    get,
    path = "/faculty_courses/{faculty_id}",
    tag = "Catalog",
    security(("bearer" = [])),
    params(("faculty_id" = i32, Path, description = "Faculty member id")),
    responses(
        (status = 200, description = "Courses the faculty member may teach", body = [Course]),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse)
    )
)]
pub async fn get_faculty_courses(
    State(state): State<ManagementState>,
    Session(principal): Session,
    AppPath(faculty_id): AppPath<DbId>,
) -> ApiResult<Json<Vec<Course>>> {
    principal.require(Action::ManageExpertise)?;
    Ok(Json(catalog::faculty_courses(state.store.as_ref(), faculty_id).await?))
}

#[utoipa::path(
    post,
    path = "/faculty_courses",
    tag = "Catalog",
    security(("bearer" = [])),
    request_body = ExpertiseRequest,
    responses(
        (status = 201, description = "Expertise recorded", body = FacultyCourse),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse)
    )
)]
pub async fn add_faculty_course(
    State(state): State<ManagementState>,
    Session(principal): Session,
    AppJson(req): AppJson<ExpertiseRequest>,
) -> ApiResult<(StatusCode, Json<FacultyCourse>)> {
    let link = catalog::add_expertise(state.store.as_ref(), &principal, req).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

// ─── Rooms & time slots ────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/rooms",
    tag = "Catalog",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All rooms", body = [Room]),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse)
    )
)]
pub async fn list_rooms(
    State(state): State<ManagementState>,
    Session(principal): Session,
) -> ApiResult<Json<Vec<Room>>> {
    principal.require(Action::ViewRooms)?;
    Ok(Json(state.store.list_rooms().await?))
}

#[utoipa::path(
    post,
    path = "/rooms",
    tag = "Catalog",
    security(("bearer" = [])),
    request_body = RoomRequest,
    responses(
        (status = 201, description = "Room created", body = Room),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse)
    )
)]
pub async fn create_room(
    State(state): State<ManagementState>,
    Session(principal): Session,
    AppJson(req): AppJson<RoomRequest>,
) -> ApiResult<(StatusCode, Json<Room>)> {
    let room = catalog::create_room(state.store.as_ref(), &principal, req).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

#[utoipa::path(
    get,
    path = "/time_slots",
    tag = "Catalog",
    security(("bearer" = [])),
    params(
        ("day" = Option<String>, Query, description = "Weekday name"),
        ("start_time" = Option<String>, Query, description = "Exact start time, HH:MM")
    ),
    responses(
        (status = 200, description = "Matching time slots", body = [TimeSlot]),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse)
    )
)]
pub async fn list_time_slots(
    State(state): State<ManagementState>,
    Session(principal): Session,
    AppQuery(query): AppQuery<TimeSlotQuery>,
) -> ApiResult<Json<Vec<TimeSlot>>> {
    principal.require(Action::ViewTimeSlots)?;
    Ok(Json(catalog::list_time_slots(state.store.as_ref(), query).await?))
}

#[utoipa::path(
    post,
    path = "/time_slots",
    tag = "Catalog",
    security(("bearer" = [])),
    request_body = TimeSlotRequest,
    responses(
        (status = 201, description = "Time slot created", body = TimeSlot),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse)
    )
)]
pub async fn create_time_slot(
    State(state): State<ManagementState>,
    Session(principal): Session,
    AppJson(req): AppJson<TimeSlotRequest>,
) -> ApiResult<(StatusCode, Json<TimeSlot>)> {
    let slot = catalog::create_time_slot(state.store.as_ref(), &principal, req).await?;
    Ok((StatusCode::CREATED, Json(slot)))
}

#[utoipa::path(
    post,
    path = "/enrollments",
    tag = "Catalog",
    security(("bearer" = [])),
    request_body = EnrollmentRequest,
    responses(
        (status = 201, description = "Student enrolled", body = Enrollment),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse)
    )
)]
pub async fn create_enrollment(
    State(state): State<ManagementState>,
    Session(principal): Session,
    AppJson(req): AppJson<EnrollmentRequest>,
) -> ApiResult<(StatusCode, Json<Enrollment>)> {
    let enrollment = catalog::enroll(state.store.as_ref(), &principal, req).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

// ─── Timetable ─────────────────────────────────────────────────────────────

#[utoipa::path(
    post,
    path = "/generate-timetable",
    tag = "Timetable",
    security(("bearer" = [])),
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Solver finished and the job completed", body = GenerateResponse),
        (status = 400, description = "Validation failed or data insufficient", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse),
        (status = 500, description = "Solver failed; the job is marked failed", body = ErrorResponse)
    )
)]
pub async fn generate_timetable(
    State(state): State<ManagementState>,
    Session(principal): Session,
    AppJson(req): AppJson<GenerateRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    let orchestrator = Orchestrator::new(state.store.clone(), state.solver.clone());
    Ok(Json(orchestrator.generate(&principal, req).await?))
}

#[utoipa::path(
    get,
    path = "/timetable",
    tag = "Timetable",
    security(("bearer" = [])),
    params(
        ("college_id" = Option<String>, Query, description = "Restrict to one college"),
        ("department_id" = Option<String>, Query, description = "Restrict to one department")
    ),
    responses(
        (status = 200, description = "Assignments visible to the caller", body = [AssignmentView]),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse)
    )
)]
pub async fn get_timetable(
    State(state): State<ManagementState>,
    Session(principal): Session,
    AppQuery(params): AppQuery<ScopeParams>,
) -> ApiResult<Json<Vec<AssignmentView>>> {
    let scope = params.into_filter()?;
    let rows = timetable::list_timetable(state.store.as_ref(), &principal, Action::ViewTimetable, scope).await?;
    Ok(Json(rows))
}

#[utoipa::path(
    put,
    path = "/timetable/{id}",
    tag = "Timetable",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Assignment id")),
    request_body = AssignmentUpdateRequest,
    responses(
        (status = 200, description = "Assignment updated", body = TimetableAssignment),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse),
        (status = 404, description = "Assignment not found", body = ErrorResponse)
    )
)]
pub async fn update_timetable(
    State(state): State<ManagementState>,
    Session(principal): Session,
    AppPath(assignment_id): AppPath<DbId>,
    AppJson(req): AppJson<AssignmentUpdateRequest>,
) -> ApiResult<Json<TimetableAssignment>> {
    let updated = timetable::update_assignment(state.store.as_ref(), &principal, assignment_id, req).await?;
    Ok(Json(updated))
}

#[utoipa::path(
    get,
    path = "/timetable-jobs/{id}",
    tag = "Timetable",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job status", body = TimetableJob),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse),
        (status = 404, description = "Job not found", body = ErrorResponse)
    )
)]
pub async fn get_job(
    State(state): State<ManagementState>,
    Session(principal): Session,
    AppPath(job_id): AppPath<DbId>,
) -> ApiResult<Json<TimetableJob>> {
    Ok(Json(timetable::get_job(state.store.as_ref(), &principal, job_id).await?))
}

// ─── Export ────────────────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/export/{format}",
    tag = "Export",
    security(("bearer" = [])),
    params(
        ("format" = String, Path, description = "pdf, excel or ical"),
        ("college_id" = Option<String>, Query, description = "Restrict to one college"),
        ("department_id" = Option<String>, Query, description = "Restrict to one department")
    ),
    responses(
        (status = 200, description = "Timetable file as an attachment"),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Role not permitted", body = ErrorResponse),
        (status = 404, description = "Unknown export format", body = ErrorResponse)
    )
)]
pub async fn export_timetable(
    State(state): State<ManagementState>,
    Session(principal): Session,
    AppPath(format): AppPath<String>,
    AppQuery(params): AppQuery<ScopeParams>,
) -> ApiResult<Response> {
    let format: ExportFormat = format
        .parse()
        .map_err(|_| TimetableError::not_found(format!("Unknown export format: {format}")))?;
    let scope = params.into_filter()?;
    let rows = timetable::list_timetable(state.store.as_ref(), &principal, Action::ExportTimetable, scope).await?;
    let row_count = rows.len();

    let reference_monday = state.reference_monday;
    let bytes = tokio::task::spawn_blocking(move || format.render(&rows, reference_monday))
        .await
        .map_err(|e| TimetableError::internal(format!("Export task failed: {e}")))?
        .map_err(TimetableError::from)?;

    metrics::counter!("exports.generated", "format" => format.extension()).increment(1);
    info!(format = format.extension(), rows = row_count, account_id = principal.account_id, "Timetable exported");

    let disposition = format!("attachment; filename={}", format.filename());
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
