//! Startup reconciliation job
//!
//! Enriches rows missing a metascore and writes the results back once, in
//! the background, right after the server starts. Progress is published on
//! a watch channel so the health endpoint can report it.

use crate::enrich::EnrichmentReport;
use crate::service::GameLog;
use crate::writeback::FlushReport;
use gamelog_common::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Lifecycle of the startup job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    /// Auto-enrichment is turned off in the configuration
    Disabled,
    Pending,
    Running,
    Completed {
        report: EnrichmentReport,
        /// `None` when nothing was updated and the file was left alone
        flushed: Option<FlushReport>,
    },
    Failed {
        error: String,
    },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Disabled | JobStatus::Completed { .. } | JobStatus::Failed { .. }
        )
    }
}

/// Handle to the background job
#[derive(Debug, Clone)]
pub struct AutoEnrichJob {
    status: watch::Receiver<JobStatus>,
}

impl AutoEnrichJob {
    /// Handle for a job that never runs
    pub fn disabled() -> Self {
        let (_tx, rx) = watch::channel(JobStatus::Disabled);
        Self { status: rx }
    }

    /// Start the job on the runtime
    pub fn spawn(service: Arc<GameLog>) -> Self {
        let (tx, rx) = watch::channel(JobStatus::Pending);

        tokio::spawn(async move {
            tx.send_replace(JobStatus::Running);
            info!("Auto-enrichment started");

            let status = match run(&service).await {
                Ok((report, flushed)) => {
                    info!(
                        missing = report.missing,
                        updated = report.updated,
                        not_found = report.not_found,
                        "Auto-enrichment completed"
                    );
                    JobStatus::Completed { report, flushed }
                }
                Err(e) => {
                    error!("Auto-enrichment failed: {}", e);
                    JobStatus::Failed { error: e.to_string() }
                }
            };
            tx.send_replace(status);
        });

        Self { status: rx }
    }

    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    /// Resolve once the job reaches a terminal state
    pub async fn wait(&self) -> JobStatus {
        let mut rx = self.status.clone();
        let result = rx.wait_for(JobStatus::is_terminal).await.map(|s| s.clone());
        match result {
            Ok(status) => status,
            // Sender gone without a terminal state: the task panicked
            Err(_) => {
                let last = rx.borrow().clone();
                if last.is_terminal() {
                    last
                } else {
                    JobStatus::Failed {
                        error: "auto-enrichment task aborted".to_string(),
                    }
                }
            }
        }
    }
}

async fn run(service: &GameLog) -> Result<(EnrichmentReport, Option<FlushReport>)> {
    let report = service.enrich_missing().await?;
    if report.updated == 0 {
        info!("No new metascores found");
        return Ok((report, None));
    }
    let flushed = service.flush_enrichment().await?;
    Ok((report, Some(flushed)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_job_is_terminal() {
        let job = AutoEnrichJob::disabled();
        assert_eq!(job.status(), JobStatus::Disabled);
        assert_eq!(job.wait().await, JobStatus::Disabled);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(JobStatus::Failed {
            error: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["error"], "boom");
        assert_eq!(serde_json::to_value(JobStatus::Running).unwrap()["state"], "running");
    }
}
