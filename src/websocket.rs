use crate::db::{
    option::{InternalPollOption, PollOptionId},
    poll::{PollId, PollSnapshot},
    user::UserId,
};
use crate::error::Error;
use crate::services::execute;
use crate::span::ActorFutureSpanWrap;
use actix::prelude::*;
use actix_web_actors::ws;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Span};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SnapshotPlace {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotVote {
    pub user_id: UserId,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SnapshotOption {
    pub id: PollOptionId,
    pub place: SnapshotPlace,
    pub votes: Vec<SnapshotVote>,
}

impl From<InternalPollOption> for SnapshotOption {
    fn from(option: InternalPollOption) -> Self {
        Self {
            id: option.id,
            place: SnapshotPlace {
                name: option.place.name,
                description: option.place.description,
            },
            votes: option
                .votes
                .into_iter()
                .map(|vote| SnapshotVote {
                    user_id: vote.user_id,
                })
                .collect(),
        }
    }
}

/// Full state of a poll's options, sent as one self-contained text frame
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub options: Vec<SnapshotOption>,
    /// Server time in epoch milliseconds
    pub timestamp: i64,
}

impl Snapshot {
    pub fn now(options: Vec<SnapshotOption>) -> Self {
        Self {
            options,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Where subscribers get their snapshots from
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// `Ok(None)` when the poll does not exist
    async fn snapshot(&self, poll_id: PollId) -> Result<Option<Snapshot>, Error>;
}

/// Reads snapshots from the store through the [`crate::db::DbExecutor`]
pub struct DbSnapshotSource;

#[async_trait]
impl SnapshotSource for DbSnapshotSource {
    async fn snapshot(&self, poll_id: PollId) -> Result<Option<Snapshot>, Error> {
        let options = execute(PollSnapshot(poll_id)).await?;
        Ok(options.map(|options| {
            Snapshot::now(options.into_iter().map(SnapshotOption::from).collect())
        }))
    }
}

/// Shared by every subscriber of the server
#[derive(Clone)]
pub struct SnapshotSettings {
    pub source: Arc<dyn SnapshotSource>,
    pub interval: Duration,
}

impl SnapshotSettings {
    pub fn new(source: Arc<dyn SnapshotSource>, interval: Duration) -> Self {
        Self { source, interval }
    }
}

pub struct WsClient {
    poll_id: PollId,
    source: Arc<dyn SnapshotSource>,
    interval: Duration,
    ticker: Option<SpawnHandle>,
    in_flight: bool,
    span: Span,
}

impl WsClient {
    pub fn new(poll_id: PollId, settings: &SnapshotSettings) -> WsClient {
        let span = info_span!("ws_client", poll_id = poll_id.as_string().as_str());
        WsClient {
            poll_id,
            source: Arc::clone(&settings.source),
            interval: settings.interval,
            ticker: None,
            in_flight: false,
            span,
        }
    }

    fn send_json<T: Serialize>(&self, ctx: &mut ws::WebsocketContext<Self>, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => ctx.text(json),
            Err(err) => error!("Failed to convert to JSON {error}", error = err.to_string()),
        }
    }

    /// Fetches one snapshot and sends it. A failed fetch only skips this tick,
    /// and so does a tick that fires while the previous fetch is running.
    fn push_snapshot(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        if self.in_flight {
            debug!("Previous snapshot still in flight, skipping tick");
            return;
        }
        self.in_flight = true;
        let source = Arc::clone(&self.source);
        let poll_id = self.poll_id.clone();
        let fetch = async move { source.snapshot(poll_id).await }
            .into_actor(self)
            .map(|result, act, ctx| {
                act.in_flight = false;
                act.send_snapshot(ctx, result)
            });
        ctx.spawn(ActorFutureSpanWrap::new(fetch, self.span.clone()));
    }

    fn send_snapshot(
        &self,
        ctx: &mut ws::WebsocketContext<Self>,
        result: Result<Option<Snapshot>, Error>,
    ) {
        match result {
            Ok(Some(snapshot)) => {
                debug!(options = snapshot.options.len(), "Sending snapshot");
                self.send_json(ctx, &snapshot)
            }
            Ok(None) => debug!("Poll not found, nothing to send"),
            Err(err) => warn!(error = %err, "Failed to fetch snapshot, skipping tick"),
        }
    }
}

impl Actor for WsClient {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let span = self.span.clone();
        let _enter = span.enter();
        info!("New snapshot subscriber");
        self.push_snapshot(ctx);
        let ticker = ctx.run_interval(self.interval, |act, ctx| act.push_snapshot(ctx));
        self.ticker = Some(ticker);
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        let _enter = self.span.enter();
        if let Some(ticker) = self.ticker.take() {
            ctx.cancel_future(ticker);
        }
        info!("Snapshot subscriber left");
    }
}

// Incoming messages from ws. The channel is push only, so anything but
// control frames is ignored.
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsClient {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let _enter = self.span.enter();
        match msg {
            Ok(ws::Message::Ping(bytes)) => ctx.pong(&bytes),
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Close(reason)) => {
                debug!("Got close message from WS. Reason: {:#?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(message) => {
                warn!("Client sent a message on a push only channel: {:#?}", message);
            }
            Err(err) => {
                error!("ProtocolError in StreamHandler {:#?}", err);
                ctx.stop();
            }
        }
    }
}
