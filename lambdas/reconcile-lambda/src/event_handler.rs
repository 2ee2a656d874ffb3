use std::sync::Arc;

use chrono::Utc;
use lambda_runtime::{tracing, Error, LambdaEvent};
use lifecycle_block::{JobResponse, Reconciler};

/// Scheduled trigger: the payload carries nothing the job needs
pub(crate) async fn function_handler(
    event: LambdaEvent<serde_json::Value>,
    reconciler: Arc<Reconciler>,
) -> Result<JobResponse, Error> {
    tracing::info!(request_id = %event.context.request_id, "Reconcile lambda invoked");

    match reconciler.run(Utc::now()).await {
        Ok(summary) => Ok(JobResponse::ok(&summary)?),
        Err(e) => {
            let response = JobResponse::failure(&e);
            tracing::error!(status_code = response.status_code, body = %response.body, "Reconciliation failed");
            // Surface as an invocation error so the scheduler retries and alarms
            Err(e.into())
        }
    }
}
