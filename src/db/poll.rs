use super::{
    id_type,
    option::{options_for_poll, seed_options, InternalPollOption, PollOptionId},
    user::UserId,
    DbExecutor,
};
use crate::async_message_handler_with_span;
use crate::error::{violates, Error};
use crate::tally::{pick_winner, winner_bonus};
use actix::prelude::*;
use actix_interop::with_ctx;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

id_type!(PollId);

const SINGLE_ACTIVE_INDEX: &str = "polls_single_active";

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct InternalPoll {
    pub id: PollId,
    pub date: DateTime<Utc>,
    pub active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollWithOptions {
    #[serde(flatten)]
    pub poll: InternalPoll,
    pub options: Vec<InternalPollOption>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Winner {
    pub option_id: PollOptionId,
    pub place_name: String,
    pub votes: i64,
}

/// Bonus paid to the proposer of the winning place
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Award {
    pub user_id: UserId,
    pub points: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClosedPoll {
    pub poll: InternalPoll,
    pub winner: Option<Winner>,
    pub awarded: Option<Award>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoricPoll {
    #[serde(flatten)]
    pub poll: InternalPoll,
    pub options: Vec<InternalPollOption>,
    pub winner: Option<Winner>,
}

fn winner_of(options: &[InternalPollOption]) -> Option<Winner> {
    pick_winner(options, InternalPollOption::vote_count).map(|option| Winner {
        option_id: option.id.clone(),
        place_name: option.place.name.clone(),
        votes: option.vote_count(),
    })
}

// Create

/// Opens a new poll seeded with every existing place
#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<PollWithOptions, Error>")]
pub struct CreatePoll;

async_message_handler_with_span! {
    impl AsyncSpanHandler<CreatePoll> for DbExecutor {
        async fn handle(_msg: CreatePoll) -> Result<PollWithOptions, Error> {
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let mut tx = pool.begin().await?;

            let active: Option<PollId> = sqlx::query_scalar("SELECT id FROM polls WHERE active")
                .fetch_optional(&mut *tx)
                .await?;
            if let Some(active) = active {
                debug!("Poll {id} is already active", id = active);
                return Err(Error::Conflict);
            }

            let poll = sqlx::query_as::<_, InternalPoll>(
                "INSERT INTO polls (id, date, active) VALUES ($1, now(), TRUE) RETURNING id, date, active",
            )
            .bind(PollId::new())
            .fetch_one(&mut *tx)
            .await
            .map_err(|err| {
                if violates(&err, SINGLE_ACTIVE_INDEX) {
                    Error::Conflict
                } else {
                    Error::Database(err)
                }
            })?;

            let options = seed_options(&mut tx, &poll.id).await?;
            tx.commit().await?;
            Ok(PollWithOptions { poll, options })
        }
    }
}

// Close

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<ClosedPoll, Error>")]
pub struct ClosePoll(pub PollId);

async_message_handler_with_span! {
    impl AsyncSpanHandler<ClosePoll> for DbExecutor {
        async fn handle(msg: ClosePoll) -> Result<ClosedPoll, Error> {
            let ClosePoll(poll_id) = msg;
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let mut tx = pool.begin().await?;

            // Row lock keeps votes out until the tally is written
            let poll = sqlx::query_as::<_, InternalPoll>(
                "SELECT id, date, active FROM polls WHERE id = $1 FOR UPDATE",
            )
            .bind(&poll_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(Error::NotFound("poll"))?;
            if !poll.active {
                return Err(Error::AlreadyClosed);
            }

            let options = options_for_poll(&mut tx, &poll_id).await?;
            let winner = winner_of(&options);

            let poll = sqlx::query_as::<_, InternalPoll>(
                "UPDATE polls SET active = FALSE WHERE id = $1 RETURNING id, date, active",
            )
            .bind(&poll_id)
            .fetch_one(&mut *tx)
            .await?;

            let mut awarded = None;
            if let Some(winner) = &winner {
                let bonus = winner_bonus(winner.votes);
                let proposer: Option<UserId> = sqlx::query_scalar(
                    r#"
                    UPDATE users SET points = points + $2
                    WHERE id = (
                        SELECT p.added_by FROM poll_options o JOIN places p ON p.id = o.place_id
                        WHERE o.id = $1
                    )
                    RETURNING id
                    "#,
                )
                .bind(&winner.option_id)
                .bind(bonus)
                .fetch_optional(&mut *tx)
                .await?;
                awarded = proposer.map(|user_id| Award { user_id, points: bonus });
            }

            tx.commit().await?;
            info!(
                poll_id = poll_id.as_string().as_str(),
                winner = ?winner.as_ref().map(|w| w.place_name.as_str()),
                "Poll closed"
            );
            Ok(ClosedPoll { poll, winner, awarded })
        }
    }
}

// Delete

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<InternalPoll, Error>")]
pub struct DeletePoll(pub PollId);

async_message_handler_with_span! {
    impl AsyncSpanHandler<DeletePoll> for DbExecutor {
        async fn handle(msg: DeletePoll) -> Result<InternalPoll, Error> {
            let DeletePoll(poll_id) = msg;
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let mut tx = pool.begin().await?;

            let poll = sqlx::query_as::<_, InternalPoll>(
                "SELECT id, date, active FROM polls WHERE id = $1 FOR UPDATE",
            )
            .bind(&poll_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(Error::NotFound("poll"))?;
            if !poll.active {
                return Err(Error::InvalidState("cannot delete a closed poll"));
            }

            sqlx::query("DELETE FROM polls WHERE id = $1")
                .bind(&poll_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(poll)
        }
    }
}

// Queries

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<Option<PollWithOptions>, Error>")]
pub struct ActivePoll;

async_message_handler_with_span! {
    impl AsyncSpanHandler<ActivePoll> for DbExecutor {
        async fn handle(_msg: ActivePoll) -> Result<Option<PollWithOptions>, Error> {
            debug!("Retrieving active poll");
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let mut tx = pool.begin().await?;
            sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
                .execute(&mut *tx)
                .await?;

            let poll = sqlx::query_as::<_, InternalPoll>(
                "SELECT id, date, active FROM polls WHERE active",
            )
            .fetch_optional(&mut *tx)
            .await?;
            let poll = match poll {
                Some(poll) => poll,
                None => return Ok(None),
            };

            let options = options_for_poll(&mut tx, &poll.id).await?;
            tx.commit().await?;
            Ok(Some(PollWithOptions { poll, options }))
        }
    }
}

/// Closed polls, newest first
#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<Vec<HistoricPoll>, Error>")]
pub struct PollHistory;

async_message_handler_with_span! {
    impl AsyncSpanHandler<PollHistory> for DbExecutor {
        async fn handle(_msg: PollHistory) -> Result<Vec<HistoricPoll>, Error> {
            debug!("Retrieving poll history");
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let mut conn = pool.acquire().await?;

            let polls = sqlx::query_as::<_, InternalPoll>(
                "SELECT id, date, active FROM polls WHERE NOT active ORDER BY date DESC, id",
            )
            .fetch_all(&mut *conn)
            .await?;

            let mut history = Vec::with_capacity(polls.len());
            for poll in polls {
                let options = options_for_poll(&mut conn, &poll.id).await?;
                let winner = winner_of(&options);
                history.push(HistoricPoll { poll, options, winner });
            }
            Ok(history)
        }
    }
}

/// Point-in-time options and votes of one poll, `None` when the poll is gone
#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<Option<Vec<InternalPollOption>>, Error>")]
pub struct PollSnapshot(pub PollId);

async_message_handler_with_span! {
    impl AsyncSpanHandler<PollSnapshot> for DbExecutor {
        async fn handle(msg: PollSnapshot) -> Result<Option<Vec<InternalPollOption>>, Error> {
            let PollSnapshot(poll_id) = msg;
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let mut tx = pool.begin().await?;
            sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
                .execute(&mut *tx)
                .await?;

            let exists: Option<PollId> = sqlx::query_scalar("SELECT id FROM polls WHERE id = $1")
                .bind(&poll_id)
                .fetch_optional(&mut *tx)
                .await?;
            if exists.is_none() {
                return Ok(None);
            }

            let options = options_for_poll(&mut tx, &poll_id).await?;
            tx.commit().await?;
            Ok(Some(options))
        }
    }
}
