//! Run entry points.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::warn;

use crate::config::ProbeOptions;
use crate::domain::{Credentials, DiagnosticReport, TargetConfig};
use crate::error::{ProbeError, Result};
use crate::orchestrator::FlowOrchestrator;
use crate::transport::Transport;

/// Probe one credential record against one target configuration.
///
/// Returns `Err` only for invalid input or a malformed call; every expected
/// failure of the pipeline is described by the returned report.
pub async fn run_probe(
    transport: &dyn Transport,
    credentials: &Credentials,
    target: &TargetConfig,
    options: &ProbeOptions,
) -> Result<DiagnosticReport> {
    credentials.validate()?;
    target.validate()?;
    FlowOrchestrator::new(transport)
        .run(credentials, target, options)
        .await
}

/// One independent run of a batch.
#[derive(Debug, Clone)]
pub struct ProbeJob {
    pub label: String,
    pub credentials: Credentials,
    pub target: TargetConfig,
    pub options: ProbeOptions,
}

/// Run every job concurrently. Runs share the transport and nothing else.
///
/// Results come back in job order, paired with the job label. A job that
/// faults (bad input, a malformed call, a panicked task) fills its own slot
/// with the error; the other jobs still run to completion.
pub async fn run_probes(
    transport: Arc<dyn Transport>,
    jobs: Vec<ProbeJob>,
) -> Vec<(String, Result<DiagnosticReport>)> {
    let labels: Vec<String> = jobs.iter().map(|job| job.label.clone()).collect();

    let mut join_set = JoinSet::new();
    for (idx, job) in jobs.into_iter().enumerate() {
        let transport = Arc::clone(&transport);
        join_set.spawn(async move {
            let result =
                run_probe(transport.as_ref(), &job.credentials, &job.target, &job.options).await;
            (idx, result)
        });
    }

    let mut slots: Vec<Option<Result<DiagnosticReport>>> = labels.iter().map(|_| None).collect();
    let mut join_failure: Option<String> = None;
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((idx, result)) => slots[idx] = Some(result),
            Err(e) => {
                warn!(error = %e, "probe task did not complete");
                join_failure.get_or_insert_with(|| e.to_string());
            }
        }
    }

    labels
        .into_iter()
        .zip(slots)
        .map(|(label, slot)| {
            let result = slot.unwrap_or_else(|| {
                Err(ProbeError::Join {
                    label: label.clone(),
                    detail: join_failure
                        .clone()
                        .unwrap_or_else(|| "task produced no report".to_string()),
                })
            });
            (label, result)
        })
        .collect()
}
