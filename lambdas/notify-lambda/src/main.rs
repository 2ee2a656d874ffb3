use std::sync::Arc;

use aws_lambda_events::event::sqs::SqsEvent;
use board_shared::AppState;
use lambda_runtime::{run, service_fn, tracing, Error, LambdaEvent};
use notifications_block::{DispatchSettings, NotificationDispatcher};

mod event_handler;
use event_handler::function_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let state = AppState::from_env().await?;
    let dispatcher = Arc::new(NotificationDispatcher::new(
        state.item_store(),
        state.directory()?,
        state.delivery_channel()?,
        DispatchSettings::from_config(&state.config),
    ));

    run(service_fn(move |event: LambdaEvent<SqsEvent>| {
        let dispatcher = dispatcher.clone();
        async move { function_handler(event, dispatcher).await }
    }))
    .await
}
