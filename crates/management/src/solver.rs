//! Client for the external constraint solver.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use timetable_core::config::SolverConfig;
use timetable_core::types::DbId;
use timetable_core::TimetableError;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("solver did not answer within {0}s")]
    Timeout(u64),

    #[error("solver unreachable: {0}")]
    Transport(String),

    #[error("{0}")]
    Rejected(String),

    #[error("solver returned HTTP {0}")]
    Status(u16),
}

impl From<SolverError> for TimetableError {
    fn from(err: SolverError) -> Self {
        TimetableError::Solver(err.to_string())
    }
}

/// Body of `POST /solve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolveRequest {
    #[serde(rename = "jobId")]
    pub job_id: DbId,
    pub semester: i32,
    pub college_id: DbId,
    pub department_id: Option<DbId>,
}

#[derive(Debug, Deserialize)]
struct SolverFailure {
    error: Option<String>,
}

#[async_trait]
pub trait Solver: Send + Sync {
    async fn solve(&self, request: &SolveRequest) -> Result<(), SolverError>;
}

pub struct HttpSolver {
    client: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
}

impl HttpSolver {
    pub fn new(config: &SolverConfig) -> Result<Self, SolverError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SolverError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/solve", config.url.trim_end_matches('/')),
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl Solver for HttpSolver {
    async fn solve(&self, request: &SolveRequest) -> Result<(), SolverError> {
        info!(job_id = request.job_id, endpoint = %self.endpoint, "Calling solver");

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SolverError::Timeout(self.timeout_secs)
                } else {
                    SolverError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(job_id = request.job_id, "Solver accepted job");
            return Ok(());
        }

        // Only `{error}` is read from a failure body.
        match response.json::<SolverFailure>().await {
            Ok(SolverFailure { error: Some(message) }) => Err(SolverError::Rejected(message)),
            _ => Err(SolverError::Status(status.as_u16())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_keys() {
        let body = serde_json::to_value(SolveRequest {
            job_id: 12,
            semester: 3,
            college_id: 1,
            department_id: None,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"jobId": 12, "semester": 3, "college_id": 1, "department_id": null})
        );
    }

    #[test]
    fn test_endpoint_normalised() {
        let solver = HttpSolver::new(&SolverConfig {
            url: "http://solver:5000/".into(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(solver.endpoint, "http://solver:5000/solve");
    }

    #[tokio::test]
    async fn test_unreachable_solver_is_transport_error() {
        let solver = HttpSolver::new(&SolverConfig {
            url: "http://127.0.0.1:1".into(),
            timeout_secs: 2,
        })
        .unwrap();
        let err = solver
            .solve(&SolveRequest {
                job_id: 1,
                semester: 1,
                college_id: 1,
                department_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SolverError::Transport(_) | SolverError::Timeout(_)));
    }
}
