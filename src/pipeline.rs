//! Per-event pipeline: resolve channel, extract, route.
//!
//! Events are independent. [`Pipeline::run`] gives each one its own task, so
//! a slow gateway holds up only its own reply.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::extractor::{self, ChannelMap};
use crate::router::{DispatchOutcome, Dispatcher, ReplyTarget};
use crate::slack::{BotIdentity, IncomingEvent};

/// Turns inbound events into dispatched outcomes.
pub struct Pipeline {
    channels: ChannelMap,
    dispatcher: Dispatcher,
    identity: BotIdentity,
}

impl Pipeline {
    /// Create a pipeline. Events posted by `identity` are ignored.
    pub fn new(channels: ChannelMap, dispatcher: Dispatcher, identity: BotIdentity) -> Self {
        Self {
            channels,
            dispatcher,
            identity,
        }
    }

    /// Process one event to completion.
    pub async fn handle(&self, event: IncomingEvent) -> DispatchOutcome {
        if event.is_from(&self.identity) {
            debug!(channel_id = %event.channel_id, "ignoring own message");
            return DispatchOutcome::Dropped;
        }

        let channel = self.channels.resolve(&event.channel_id);
        let record = match extractor::extract(&channel, &event.payload) {
            Ok(record) => record,
            Err(failure) => {
                warn!(
                    channel = %failure.channel,
                    error = %failure.cause,
                    payload = %failure.payload,
                    "dropping event that could not be extracted"
                );
                return DispatchOutcome::Dropped;
            }
        };

        let target = ReplyTarget::for_event(&event);
        self.dispatcher.route(&channel, &record, &target).await
    }

    /// Consume events until the sender side closes or `shutdown` resolves,
    /// then give in-flight events up to `drain_timeout` to post their replies.
    ///
    /// Tasks still running after the timeout are aborted.
    pub async fn run<F>(
        self: Arc<Self>,
        mut events: mpsc::Receiver<IncomingEvent>,
        shutdown: F,
        drain_timeout: Duration,
    ) where
        F: Future<Output = ()>,
    {
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested, no longer accepting events");
                    break;
                }
                received = events.recv() => {
                    let Some(event) = received else {
                        info!("event stream closed");
                        break;
                    };
                    let pipeline = Arc::clone(&self);
                    tasks.spawn(async move { pipeline.handle(event).await });
                }
            }

            while let Some(finished) = tasks.try_join_next() {
                log_task_result(finished);
            }
        }

        events.close();
        info!(in_flight = tasks.len(), "draining in-flight events");
        let drained = tokio::time::timeout(drain_timeout, async {
            while let Some(finished) = tasks.join_next().await {
                log_task_result(finished);
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                abandoned = tasks.len(),
                "drain timed out, aborting remaining events"
            );
            tasks.abort_all();
        }
    }
}

fn log_task_result(result: Result<DispatchOutcome, tokio::task::JoinError>) {
    if let Err(e) = result {
        error!(error = %e, "event task failed");
    }
}
