use super::{id_type, option::PollOptionId, poll::PollId, user::UserId, DbExecutor};
use crate::async_message_handler_with_span;
use crate::error::Error;
use crate::tally::VOTE_POINTS;
use actix::prelude::*;
use actix_interop::with_ctx;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

id_type!(VoteId);

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct InternalVote {
    pub id: VoteId,
    pub user_id: UserId,
    pub poll_id: PollId,
    pub option_id: PollOptionId,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CastVoteOutcome {
    pub vote: InternalVote,
    /// True when this was the user's first vote in the poll and earned points
    pub first_vote: bool,
}

/// Records `user_id`'s vote for `option_id`, replacing any vote they already
/// hold in the same poll
#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<CastVoteOutcome, Error>")]
pub struct CastVote {
    pub user_id: UserId,
    pub option_id: PollOptionId,
    pub note: Option<String>,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<CastVote> for DbExecutor {
        async fn handle(msg: CastVote) -> Result<CastVoteOutcome, Error> {
            let CastVote { user_id, option_id, note } = msg;
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let mut tx = pool.begin().await?;

            // Shared lock on the poll, a concurrent close waits for us or we see it closed
            let (poll_id, active) = sqlx::query_as::<_, (PollId, bool)>(
                r#"
                SELECT p.id, p.active
                FROM poll_options o JOIN polls p ON p.id = o.poll_id
                WHERE o.id = $1
                FOR SHARE OF p
                "#,
            )
            .bind(&option_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(Error::NotFound("poll option"))?;
            if !active {
                return Err(Error::ClosedPoll);
            }

            // Votes of the same user serialize on their user row
            sqlx::query_scalar::<_, UserId>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
                .bind(&user_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(Error::NotFound("user"))?;

            let existing = sqlx::query_as::<_, InternalVote>(
                r#"
                SELECT id, user_id, poll_id, option_id, note, created_at
                FROM votes WHERE user_id = $1 AND poll_id = $2
                "#,
            )
            .bind(&user_id)
            .bind(&poll_id)
            .fetch_optional(&mut *tx)
            .await?;

            let first_vote = existing.is_none();
            let vote = match existing {
                Some(existing) if existing.option_id == option_id => {
                    debug!("Same option voted again, updating note only");
                    sqlx::query_as::<_, InternalVote>(
                        r#"
                        UPDATE votes SET note = $2 WHERE id = $1
                        RETURNING id, user_id, poll_id, option_id, note, created_at
                        "#,
                    )
                    .bind(&existing.id)
                    .bind(&note)
                    .fetch_one(&mut *tx)
                    .await?
                }
                Some(existing) => {
                    debug!(previous = existing.option_id.as_string().as_str(), "Switching vote");
                    sqlx::query("DELETE FROM votes WHERE id = $1")
                        .bind(&existing.id)
                        .execute(&mut *tx)
                        .await?;
                    insert_vote(&mut tx, &user_id, &poll_id, &option_id, &note).await?
                }
                None => insert_vote(&mut tx, &user_id, &poll_id, &option_id, &note).await?,
            };

            if first_vote {
                sqlx::query("UPDATE users SET points = points + $2 WHERE id = $1")
                    .bind(&user_id)
                    .bind(VOTE_POINTS)
                    .execute(&mut *tx)
                    .await?;
            }

            tx.commit().await?;
            Ok(CastVoteOutcome { vote, first_vote })
        }
    }
}

async fn insert_vote(
    conn: &mut sqlx::PgConnection,
    user_id: &UserId,
    poll_id: &PollId,
    option_id: &PollOptionId,
    note: &Option<String>,
) -> Result<InternalVote, sqlx::Error> {
    sqlx::query_as::<_, InternalVote>(
        r#"
        INSERT INTO votes (id, user_id, poll_id, option_id, note) VALUES ($1, $2, $3, $4, $5)
        RETURNING id, user_id, poll_id, option_id, note, created_at
        "#,
    )
    .bind(VoteId::new())
    .bind(user_id)
    .bind(poll_id)
    .bind(option_id)
    .bind(note)
    .fetch_one(conn)
    .await
}
