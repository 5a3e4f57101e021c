use super::execute;
use crate::db::{
    option::PollOptionId,
    vote::{CastVote, CastVoteOutcome},
};
use crate::error::Error;
use crate::identity::Caller;
use tracing::{info, instrument};

#[instrument(skip(caller, note), fields(user_id = %caller.user_id))]
pub async fn cast_vote(
    caller: &Caller,
    option_id: PollOptionId,
    note: Option<String>,
) -> Result<CastVoteOutcome, Error> {
    let note = note
        .map(|note| note.trim().to_owned())
        .filter(|note| !note.is_empty());
    let outcome = execute(CastVote {
        user_id: caller.user_id.clone(),
        option_id,
        note,
    })
    .await?;
    info!(
        poll_id = %outcome.vote.poll_id,
        option_id = %outcome.vote.option_id,
        first_vote = outcome.first_vote,
        "Vote recorded"
    );
    Ok(outcome)
}
