use super::{
    id_type,
    user::{Role, UserId},
    DbExecutor,
};
use crate::async_message_handler_with_span;
use crate::error::Error;
use crate::tally::PLACE_POINTS;
use actix::prelude::*;
use actix_interop::with_ctx;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

id_type!(PlaceId);

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct InternalPlace {
    pub id: PlaceId,
    pub name: String,
    pub description: Option<String>,
    pub added_by: Option<UserId>,
    pub added_by_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<Vec<InternalPlace>, Error>")]
pub struct ListPlaces;

async_message_handler_with_span! {
    impl AsyncSpanHandler<ListPlaces> for DbExecutor {
        async fn handle(_msg: ListPlaces) -> Result<Vec<InternalPlace>, Error> {
            debug!("Retrieving places");
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let places = sqlx::query_as::<_, InternalPlace>(
                r#"
                SELECT p.id, p.name, p.description, p.added_by, u.name AS added_by_name, p.created_at
                FROM places p LEFT JOIN users u ON u.id = p.added_by
                ORDER BY p.created_at DESC, p.id
                "#,
            )
            .fetch_all(&pool)
            .await?;

            Ok(places)
        }
    }
}

/// Stores a place proposed by `added_by` and credits them in the same
/// transaction
#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<InternalPlace, Error>")]
pub struct AddPlace {
    pub added_by: UserId,
    pub name: String,
    pub description: Option<String>,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<AddPlace> for DbExecutor {
        async fn handle(msg: AddPlace) -> Result<InternalPlace, Error> {
            let AddPlace { added_by, name, description } = msg;
            debug!(added_by = added_by.as_string().as_str(), "Adding place");
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let mut tx = pool.begin().await?;

            let proposer = sqlx::query_scalar::<_, String>(
                "UPDATE users SET points = points + $2 WHERE id = $1 RETURNING name",
            )
            .bind(&added_by)
            .bind(PLACE_POINTS)
            .fetch_optional(&mut *tx)
            .await?;
            let proposer = proposer.ok_or(Error::NotFound("user"))?;

            let mut place = sqlx::query_as::<_, InternalPlace>(
                r#"
                INSERT INTO places (id, name, description, added_by) VALUES ($1, $2, $3, $4)
                RETURNING id, name, description, added_by, NULL::TEXT AS added_by_name, created_at
                "#,
            )
            .bind(PlaceId::new())
            .bind(&name)
            .bind(&description)
            .bind(&added_by)
            .fetch_one(&mut *tx)
            .await?;
            place.added_by_name = Some(proposer);

            tx.commit().await?;
            Ok(place)
        }
    }
}

/// Deletes a place, cascading to its options in every poll. Only the
/// proposer or an admin may do so.
#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<InternalPlace, Error>")]
pub struct DeletePlace {
    pub place_id: PlaceId,
    pub requested_by: UserId,
    pub role: Role,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<DeletePlace> for DbExecutor {
        async fn handle(msg: DeletePlace) -> Result<InternalPlace, Error> {
            let DeletePlace { place_id, requested_by, role } = msg;
            debug!(place_id = place_id.as_string().as_str(), "Deleting place");
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let mut tx = pool.begin().await?;

            let place = sqlx::query_as::<_, InternalPlace>(
                r#"
                SELECT p.id, p.name, p.description, p.added_by, u.name AS added_by_name, p.created_at
                FROM places p LEFT JOIN users u ON u.id = p.added_by
                WHERE p.id = $1
                FOR UPDATE OF p
                "#,
            )
            .bind(&place_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(Error::NotFound("place"))?;

            if role != Role::Admin && place.added_by.as_ref() != Some(&requested_by) {
                return Err(Error::Unauthorized);
            }

            sqlx::query("DELETE FROM places WHERE id = $1")
                .bind(&place_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(place)
        }
    }
}
