//! Optimistic vote projection for clients.
//!
//! A client that has just cast a vote shows it right away by applying the
//! pending vote to the last snapshot it received, and keeps doing so until a
//! snapshot from the server already contains it.

use crate::db::{option::PollOptionId, user::UserId};
use crate::websocket::{SnapshotOption, SnapshotVote};

/// A vote the client has sent but not yet seen confirmed
#[derive(Clone, Debug, PartialEq)]
pub struct PendingVote {
    pub user_id: UserId,
    pub option_id: PollOptionId,
}

/// Moves `pending.user_id`'s vote onto `pending.option_id`. Voting for the
/// option the user already holds keeps it, it never toggles off.
pub fn apply_pending_vote(options: &[SnapshotOption], pending: &PendingVote) -> Vec<SnapshotOption> {
    options
        .iter()
        .map(|option| {
            let mut option = option.clone();
            option.votes.retain(|vote| vote.user_id != pending.user_id);
            if option.id == pending.option_id {
                option.votes.push(SnapshotVote {
                    user_id: pending.user_id.clone(),
                });
            }
            option
        })
        .collect()
}

/// True when `options` holds exactly the state `pending` asks for
pub fn is_confirmed(options: &[SnapshotOption], pending: &PendingVote) -> bool {
    options.iter().all(|option| {
        let voted = option
            .votes
            .iter()
            .any(|vote| vote.user_id == pending.user_id);
        voted == (option.id == pending.option_id)
    })
}

/// Merges an authoritative server state with the client's pending vote.
/// Returns the state to show and the vote that is still pending, which is
/// dropped once the server state reflects it.
pub fn reconcile(
    server: &[SnapshotOption],
    pending: Option<PendingVote>,
) -> (Vec<SnapshotOption>, Option<PendingVote>) {
    match pending {
        Some(pending) if !is_confirmed(server, &pending) => {
            (apply_pending_vote(server, &pending), Some(pending))
        }
        _ => (server.to_vec(), None),
    }
}
