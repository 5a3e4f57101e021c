use super::{id_type, DbExecutor};
use crate::async_message_handler_with_span;
use crate::error::Error;
use actix::prelude::*;
use actix_interop::with_ctx;
use serde::{Deserialize, Serialize};
use tracing::debug;

id_type!(UserId);

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Member,
    Admin,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct InternalUser {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub points: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct LeaderboardEntry {
    pub id: UserId,
    pub name: String,
    pub points: i32,
}

// Find user

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<Option<InternalUser>, Error>")]
pub struct UserById(pub UserId);

async_message_handler_with_span! {
    impl AsyncSpanHandler<UserById> for DbExecutor {
        async fn handle(msg: UserById) -> Result<Option<InternalUser>, Error> {
            let UserById(user_id) = msg;
            debug!(user_id = user_id.as_string().as_str(), "Retrieving user by id");
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let user = sqlx::query_as::<_, InternalUser>(
                "SELECT id, email, name, role, points FROM users WHERE id = $1",
            )
            .bind(&user_id)
            .fetch_optional(&pool)
            .await?;

            Ok(user)
        }
    }
}

// Ranking

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<Vec<LeaderboardEntry>, Error>")]
pub struct Leaderboard;

async_message_handler_with_span! {
    impl AsyncSpanHandler<Leaderboard> for DbExecutor {
        async fn handle(_msg: Leaderboard) -> Result<Vec<LeaderboardEntry>, Error> {
            debug!("Retrieving leaderboard");
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let entries = sqlx::query_as::<_, LeaderboardEntry>(
                "SELECT id, name, points FROM users ORDER BY points DESC, name ASC, id ASC",
            )
            .fetch_all(&pool)
            .await?;

            Ok(entries)
        }
    }
}
