//! Timetable API router. Account and reference-data routes are public;
//! everything else runs behind the session middleware.

use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;

use crate::auth;
use crate::handlers::{self, ManagementState};

/// Build the timetable router. Merge it into the server's main router.
pub fn management_router(state: ManagementState) -> Router {
    let public = Router::new()
        .route("/login", post(handlers::login))
        .route("/signup", post(handlers::signup))
        .route("/admin-signup", post(handlers::admin_signup))
        .route("/colleges", get(handlers::list_colleges))
        .route("/departments", get(handlers::list_departments));

    let protected = Router::new()
        // Catalog
        .route("/courses", get(handlers::list_courses).post(handlers::create_course))
        .route("/faculty", get(handlers::list_faculty))
        .route("/faculty_courses", post(handlers::add_faculty_course))
        .route("/faculty_courses/:faculty_id", get(handlers::get_faculty_courses))
        .route("/rooms", get(handlers::list_rooms).post(handlers::create_room))
        .route("/time_slots", get(handlers::list_time_slots).post(handlers::create_time_slot))
        .route("/enrollments", post(handlers::create_enrollment))
        // Timetable
        .route("/generate-timetable", post(handlers::generate_timetable))
        .route("/timetable", get(handlers::get_timetable))
        .route("/timetable/:id", put(handlers::update_timetable))
        .route("/timetable-jobs/:id", get(handlers::get_job))
        .route("/export/:format", get(handlers::export_timetable))
        // Provisioning
        .route("/admin-invitations", post(handlers::create_invitation))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_session));

    public.merge(protected).with_state(state)
}
