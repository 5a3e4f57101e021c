use super::{id_type, place::PlaceId, poll::PollId, user::UserId};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::debug;

id_type!(PollOptionId);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaceSummary {
    pub id: PlaceId,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoteSummary {
    pub user_id: UserId,
    pub note: Option<String>,
}

/// A poll option with its place and the votes it currently holds
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InternalPollOption {
    pub id: PollOptionId,
    pub place: PlaceSummary,
    pub votes: Vec<VoteSummary>,
}

impl InternalPollOption {
    pub fn vote_count(&self) -> i64 {
        self.votes.len() as i64
    }
}

#[derive(sqlx::FromRow)]
struct OptionRow {
    id: PollOptionId,
    place_id: PlaceId,
    name: String,
    description: Option<String>,
}

#[derive(sqlx::FromRow)]
struct VoteRow {
    option_id: PollOptionId,
    user_id: UserId,
    note: Option<String>,
}

/// Loads the options of a poll in stored order together with their votes
pub(crate) async fn options_for_poll(
    conn: &mut PgConnection,
    poll_id: &PollId,
) -> Result<Vec<InternalPollOption>, sqlx::Error> {
    debug!("Retrieving options for poll {id}", id = poll_id);
    let rows = sqlx::query_as::<_, OptionRow>(
        r#"
        SELECT o.id, o.place_id, p.name, p.description
        FROM poll_options o JOIN places p ON p.id = o.place_id
        WHERE o.poll_id = $1
        ORDER BY o.position
        "#,
    )
    .bind(poll_id)
    .fetch_all(&mut *conn)
    .await?;

    let votes = sqlx::query_as::<_, VoteRow>(
        "SELECT option_id, user_id, note FROM votes WHERE poll_id = $1 ORDER BY created_at, id",
    )
    .bind(poll_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut votes_by_option: HashMap<PollOptionId, Vec<VoteSummary>> = HashMap::new();
    for vote in votes {
        votes_by_option
            .entry(vote.option_id)
            .or_default()
            .push(VoteSummary {
                user_id: vote.user_id,
                note: vote.note,
            });
    }

    Ok(rows
        .into_iter()
        .map(|row| InternalPollOption {
            votes: votes_by_option.remove(&row.id).unwrap_or_default(),
            id: row.id,
            place: PlaceSummary {
                id: row.place_id,
                name: row.name,
                description: row.description,
            },
        })
        .collect())
}

/// Adds one option per existing place, oldest place first
pub(crate) async fn seed_options(
    conn: &mut PgConnection,
    poll_id: &PollId,
) -> Result<Vec<InternalPollOption>, sqlx::Error> {
    let places = sqlx::query_as::<_, (PlaceId, String, Option<String>)>(
        "SELECT id, name, description FROM places ORDER BY created_at, id",
    )
    .fetch_all(&mut *conn)
    .await?;
    debug!("Seeding {count} options", count = places.len());

    let mut options = Vec::with_capacity(places.len());
    for (place_id, name, description) in places {
        let id = PollOptionId::new();
        sqlx::query("INSERT INTO poll_options (id, poll_id, place_id) VALUES ($1, $2, $3)")
            .bind(&id)
            .bind(poll_id)
            .bind(&place_id)
            .execute(&mut *conn)
            .await?;
        options.push(InternalPollOption {
            id,
            place: PlaceSummary {
                id: place_id,
                name,
                description,
            },
            votes: vec![],
        });
    }
    Ok(options)
}
