//! Timetable generation: validate, check data sufficiency, then drive one
//! job through pending → running → completed / failed around a solver call.
//!
//! The solver call and the final status update run on their own task, so a
//! client that disconnects mid-solve never leaves a job stuck in `running`.

use std::sync::Arc;

use timetable_core::types::{DbId, JobStatus, TimetableJob};
use timetable_core::{TimetableError, TimetableResult};
use timetable_platform::{Action, AuditAction, Principal};
use tracing::{error, info, warn};

use crate::catalog::resolve_scope;
use crate::models::{GenerateRequest, GenerateResponse};
use crate::solver::{SolveRequest, Solver, SolverError};
use crate::store::TimetableStore;

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn TimetableStore>,
    solver: Arc<dyn Solver>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn TimetableStore>, solver: Arc<dyn Solver>) -> Self {
        Self { store, solver }
    }

    pub async fn generate(&self, actor: &Principal, req: GenerateRequest) -> TimetableResult<GenerateResponse> {
        actor.require(Action::GenerateTimetable)?;

        let semester = match req.semester {
            Some(semester) if semester > 0 => semester,
            _ => {
                return Err(TimetableError::validation(
                    "Semester is required and must be a positive integer",
                ))
            }
        };
        let Some(college_id) = req.college_id else {
            return Err(TimetableError::validation("College is required"));
        };
        let scope = resolve_scope(self.store.as_ref(), college_id, req.department_id).await?;

        let counts = self.store.count_resources(semester, &scope).await?;
        let missing = counts.missing();
        if !missing.is_empty() {
            metrics::counter!("timetable.generate.insufficient").increment(1);
            return Err(TimetableError::InsufficientData(format!(
                "Insufficient data for Semester {semester} in {}: missing {}",
                scope.describe(),
                missing.join(", ")
            )));
        }

        let job = self.store.insert_job(semester, college_id, scope.department_id).await?;
        info!(job_id = job.id, semester, scope = %scope.describe(), "Timetable job created");

        let job = match self.advance(&job, JobStatus::Running, None).await {
            Ok(job) => job,
            Err(err) => {
                self.abandon(&job, &err.to_string()).await;
                return Err(err);
            }
        };

        let request = SolveRequest {
            job_id: job.id,
            semester,
            college_id,
            department_id: scope.department_id,
        };

        // Dropping the handle detaches the task; the job still reaches a
        // terminal state.
        let worker = self.clone();
        let account_id = actor.account_id;
        tokio::spawn(async move {
            let outcome = worker.solver.solve(&request).await;
            worker.finish(account_id, &job, semester, outcome).await
        })
        .await
        .map_err(|err| TimetableError::internal(format!("Timetable job task failed: {err}")))?
    }

    /// Persist the solver outcome. A solver error is always the one returned,
    /// whatever happens to the status update.
    async fn finish(
        &self,
        account_id: DbId,
        job: &TimetableJob,
        semester: i32,
        outcome: Result<(), SolverError>,
    ) -> TimetableResult<GenerateResponse> {
        match outcome {
            Ok(()) => {
                if let Err(err) = self.advance(job, JobStatus::Completed, None).await {
                    error!(job_id = job.id, error = %err, "Could not mark job completed");
                    self.abandon(job, &err.to_string()).await;
                    return Err(err);
                }
                self.store
                    .append_audit(
                        Some(account_id),
                        &AuditAction::GenerateTimetable {
                            job_id: job.id,
                            semester,
                        }
                        .to_string(),
                    )
                    .await?;
                metrics::counter!("timetable.jobs.completed").increment(1);
                info!(job_id = job.id, "Timetable job completed");
                Ok(GenerateResponse {
                    message: "Timetable generated".to_string(),
                    job_id: job.id,
                })
            }
            Err(solver_err) => {
                let detail = solver_err.to_string();
                metrics::counter!("timetable.jobs.failed").increment(1);
                warn!(job_id = job.id, error = %detail, "Timetable job failed");

                self.abandon(job, &detail).await;
                self.audit_failure(account_id, job.id).await;
                Err(solver_err.into())
            }
        }
    }

    /// Validate the transition, then persist it guarded on the current state.
    async fn advance(
        &self,
        job: &TimetableJob,
        next: JobStatus,
        error: Option<&str>,
    ) -> TimetableResult<TimetableJob> {
        job.status.transition(next)?;
        Ok(self
            .store
            .update_job_status(job.id, job.status, next, error)
            .await?)
    }

    /// Best effort: mark the job failed, logging if even that is refused.
    async fn abandon(&self, job: &TimetableJob, reason: &str) {
        if let Err(err) = self.advance(job, JobStatus::Failed, Some(reason)).await {
            error!(job_id = job.id, error = %err, "Could not mark job failed");
        }
    }

    async fn audit_failure(&self, account_id: DbId, job_id: DbId) {
        let action = AuditAction::TimetableJobFailed { job_id }.to_string();
        if let Err(err) = self.store.append_audit(Some(account_id), &action).await {
            error!(job_id, error = %err, "Could not record job failure in audit log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use timetable_core::types::*;

    /// Records requests and answers with a fixed outcome after `delay`.
    struct ScriptedSolver {
        fail_with: Option<String>,
        delay: Duration,
        seen: Mutex<Vec<SolveRequest>>,
    }

    impl ScriptedSolver {
        fn ok() -> Arc<Self> {
            Self::build(None, Duration::ZERO)
        }

        fn failing(message: &str) -> Arc<Self> {
            Self::build(Some(message.to_string()), Duration::ZERO)
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Self::build(None, delay)
        }

        fn build(fail_with: Option<String>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                fail_with,
                delay,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Solver for ScriptedSolver {
        async fn solve(&self, request: &SolveRequest) -> Result<(), SolverError> {
            self.seen.lock().unwrap().push(request.clone());
            tokio::time::sleep(self.delay).await;
            match &self.fail_with {
                Some(message) => Err(SolverError::Rejected(message.clone())),
                None => Ok(()),
            }
        }
    }

    fn admin() -> Principal {
        Principal {
            account_id: 1,
            email: "admin@uni.edu".into(),
            role: Role::Admin,
        }
    }

    fn request(semester: i32) -> GenerateRequest {
        GenerateRequest {
            semester: Some(semester),
            college_id: Some(1),
            department_id: None,
        }
    }

    async fn ready_store() -> Arc<MemoryStore> {
        let store = MemoryStore::with_demo_data();
        store
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
        Arc::new(store)
    }

    fn orchestrator(store: &Arc<MemoryStore>, solver: &Arc<ScriptedSolver>) -> Orchestrator {
        Orchestrator::new(store.clone(), solver.clone())
    }

    #[tokio::test]
    async fn test_successful_generation() {
        let store = ready_store().await;
        let solver = ScriptedSolver::ok();

        let response = orchestrator(&store, &solver)
            .generate(&admin(), request(3))
            .await
            .unwrap();
        assert_eq!(response.message, "Timetable generated");

        let job = store.get_job(response.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.completed_at.is_some());

        let seen = solver.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].job_id, response.job_id);
        assert_eq!(seen[0].college_id, 1);

        let audit = store.audit_entries();
        assert_eq!(
            audit.last().unwrap().action,
            format!("Generate Timetable Job {} for Semester 3", response.job_id)
        );
    }

    #[tokio::test]
    async fn test_solver_failure_marks_job_failed() {
        let store = ready_store().await;
        let solver = ScriptedSolver::failing("No feasible solution");

        let err = orchestrator(&store, &solver)
            .generate(&admin(), request(3))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.details().as_deref(), Some("No feasible solution"));

        let job = store.get_job(1).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("No feasible solution"));
        assert!(job.completed_at.is_some());
        assert_eq!(store.audit_entries().last().unwrap().action, "Timetable Job 1 failed");
    }

    #[tokio::test]
    async fn test_insufficient_data_creates_no_job() {
        // Demo data has no faculty accounts.
        let store = Arc::new(MemoryStore::with_demo_data());
        let solver = ScriptedSolver::ok();

        let err = orchestrator(&store, &solver)
            .generate(&admin(), request(3))
            .await
            .unwrap_err();
        assert!(matches!(err, TimetableError::InsufficientData(_)));
        assert_eq!(
            err.to_string(),
            "Insufficient data for Semester 3 in College 1: missing Faculty"
        );
        assert_eq!(store.job_count(), 0);
        assert!(solver.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_semester_without_courses() {
        let store = ready_store().await;
        let err = orchestrator(&store, &ScriptedSolver::ok())
            .generate(&admin(), request(8))
            .await
            .unwrap_err();
        assert!(err.to_string().ends_with("missing Courses"));
        assert_eq!(store.job_count(), 0);
    }

    #[tokio::test]
    async fn test_validation() {
        let store = ready_store().await;
        let solver = ScriptedSolver::ok();
        let orchestrator = orchestrator(&store, &solver);

        let err = orchestrator.generate(&admin(), request(0)).await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = orchestrator
            .generate(
                &admin(),
                GenerateRequest {
                    semester: Some(3),
                    college_id: Some(1),
                    department_id: Some(42),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Department not found");

        let student = Principal {
            account_id: 5,
            email: "s@uni.edu".into(),
            role: Role::Student,
        };
        let err = orchestrator.generate(&student, request(3)).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(store.job_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_request_still_finishes_job() {
        let store = ready_store().await;
        let solver = ScriptedSolver::slow(Duration::from_millis(300));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(100),
            orchestrator(&store, &solver).generate(&admin(), request(3)),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(store.get_job(1).await.unwrap().unwrap().status, JobStatus::Running);

        let mut status = JobStatus::Running;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            status = store.get_job(1).await.unwrap().unwrap().status;
            if status.is_terminal() {
                break;
            }
        }
        assert_eq!(status, JobStatus::Completed);
        assert_eq!(
            store.audit_entries().last().unwrap().action,
            "Generate Timetable Job 1 for Semester 3"
        );
    }

    #[tokio::test]
    async fn test_failed_completion_update_marks_job_failed() {
        let store = ready_store().await;
        store.fail_job_updates_to(JobStatus::Completed);

        let err = orchestrator(&store, &ScriptedSolver::ok())
            .generate(&admin(), request(3))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);

        let job = store.get_job(1).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("Internal error: database error: connection reset"));
    }

    #[tokio::test]
    async fn test_solver_error_survives_store_failure() {
        let store = ready_store().await;
        store.fail_job_updates_to(JobStatus::Failed);

        let err = orchestrator(&store, &ScriptedSolver::failing("No feasible solution"))
            .generate(&admin(), request(3))
            .await
            .unwrap_err();
        assert!(matches!(err, TimetableError::Solver(_)));
        assert_eq!(err.details().as_deref(), Some("No feasible solution"));
        assert_eq!(store.audit_entries().last().unwrap().action, "Timetable Job 1 failed");
    }

    #[tokio::test]
    async fn test_terminal_job_does_not_restart() {
        let store = ready_store().await;
        let solver = ScriptedSolver::ok();
        let orchestrator = orchestrator(&store, &solver);
        let response = orchestrator.generate(&admin(), request(3)).await.unwrap();

        let job = store.get_job(response.job_id).await.unwrap().unwrap();
        let err = orchestrator
            .advance(&job, JobStatus::Running, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TimetableError::Internal(_)));
        assert_eq!(
            store.get_job(job.id).await.unwrap().unwrap().status,
            JobStatus::Completed
        );
    }
}
