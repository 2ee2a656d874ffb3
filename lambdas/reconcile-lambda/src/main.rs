use std::sync::Arc;

use board_shared::AppState;
use lambda_runtime::{run, service_fn, tracing, Error, LambdaEvent};
use lifecycle_block::{ReconcileSettings, Reconciler};

mod event_handler;
use event_handler::function_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let state = AppState::from_env().await?;
    let reconciler = Arc::new(Reconciler::new(
        state.item_store(),
        state.event_queue()?,
        ReconcileSettings::from_config(&state.config),
    ));

    run(service_fn(move |event: LambdaEvent<serde_json::Value>| {
        let reconciler = reconciler.clone();
        async move { function_handler(event, reconciler).await }
    }))
    .await
}
