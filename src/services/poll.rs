use super::execute;
use crate::db::{
    option::PollOptionId,
    poll::{
        ActivePoll, ClosePoll, ClosedPoll, CreatePoll, DeletePoll, HistoricPoll, InternalPoll,
        PollHistory, PollId, PollWithOptions,
    },
};
use crate::error::Error;
use crate::identity::Caller;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// The active poll as seen by one caller
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivePollView {
    #[serde(flatten)]
    pub poll: PollWithOptions,
    /// Option the caller currently votes for
    pub my_option_id: Option<PollOptionId>,
}

#[instrument(skip(caller), fields(user_id = %caller.user_id))]
pub async fn create_poll(caller: &Caller) -> Result<PollWithOptions, Error> {
    caller.require_admin()?;
    let poll = execute(CreatePoll).await?;
    info!(
        poll_id = %poll.poll.id,
        options = poll.options.len(),
        "Poll created"
    );
    Ok(poll)
}

#[instrument(skip(caller), fields(user_id = %caller.user_id))]
pub async fn close_poll(caller: &Caller, poll_id: PollId) -> Result<ClosedPoll, Error> {
    caller.require_admin()?;
    let closed = execute(ClosePoll(poll_id)).await?;
    if let Some(award) = &closed.awarded {
        info!(
            proposer = %award.user_id,
            points = award.points,
            "Winning proposer rewarded"
        );
    }
    Ok(closed)
}

#[instrument(skip(caller), fields(user_id = %caller.user_id))]
pub async fn delete_poll(caller: &Caller, poll_id: PollId) -> Result<InternalPoll, Error> {
    caller.require_admin()?;
    let poll = execute(DeletePoll(poll_id)).await?;
    info!(poll_id = %poll.id, "Poll deleted");
    Ok(poll)
}

#[instrument(skip(caller), fields(user_id = %caller.user_id))]
pub async fn active_poll(caller: &Caller) -> Result<Option<ActivePollView>, Error> {
    let poll = execute(ActivePoll).await?;
    Ok(poll.map(|poll| {
        let my_option_id = poll
            .options
            .iter()
            .find(|option| option.votes.iter().any(|v| v.user_id == caller.user_id))
            .map(|option| option.id.clone());
        ActivePollView { poll, my_option_id }
    }))
}

#[instrument]
pub async fn history() -> Result<Vec<HistoricPoll>, Error> {
    execute(PollHistory).await
}
