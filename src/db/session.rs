use super::{
    id_type,
    user::{InternalUser, Role, UserId},
    DbExecutor,
};
use crate::async_message_handler_with_span;
use crate::error::Error;
use actix::prelude::*;
use actix_interop::with_ctx;
use tracing::debug;

id_type!(SessionId);

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct InternalSession {
    pub id: SessionId,
    pub user_id: UserId,
}

#[derive(Message, Clone)]
#[rtype(result = "Result<Option<InternalUser>, Error>")]
pub struct UserBySession(pub SessionId);

async_message_handler_with_span! {
    impl AsyncSpanHandler<UserBySession> for DbExecutor {
        async fn handle(msg: UserBySession) -> Result<Option<InternalUser>, Error> {
            let UserBySession(session_id) = msg;
            debug!(id = session_id.as_string().as_str(), "Get user by session id");
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let user = sqlx::query_as::<_, InternalUser>(
                r#"
                SELECT u.id, u.email, u.name, u.role, u.points
                FROM sessions s JOIN users u ON u.id = s.user_id
                WHERE s.id = $1
                "#,
            )
            .bind(&session_id)
            .fetch_optional(&pool)
            .await?;

            Ok(user)
        }
    }
}

/// Creates the user on first sign-in (with `role_on_create`), refreshes the
/// display name otherwise, and opens a new session for them
#[derive(Message, Clone)]
#[rtype(result = "Result<(InternalSession, InternalUser), Error>")]
pub struct SignIn {
    pub email: String,
    pub name: String,
    pub role_on_create: Role,
}

async_message_handler_with_span! {
    impl AsyncSpanHandler<SignIn> for DbExecutor {
        async fn handle(msg: SignIn) -> Result<(InternalSession, InternalUser), Error> {
            let SignIn { email, name, role_on_create } = msg;
            debug!(email = email.as_str(), "Sign in user");
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let mut tx = pool.begin().await?;

            let user = sqlx::query_as::<_, InternalUser>(
                r#"
                INSERT INTO users (id, email, name, role) VALUES ($1, $2, $3, $4)
                ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name
                RETURNING id, email, name, role, points
                "#,
            )
            .bind(UserId::new())
            .bind(&email)
            .bind(&name)
            .bind(role_on_create)
            .fetch_one(&mut *tx)
            .await?;

            let session = sqlx::query_as::<_, InternalSession>(
                r#"
                INSERT INTO sessions (id, user_id) VALUES ($1, $2)
                RETURNING id, user_id
                "#,
            )
            .bind(SessionId::new())
            .bind(&user.id)
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok((session, user))
        }
    }
}

#[derive(Message, Clone)]
#[rtype(result = "Result<bool, Error>")]
pub struct DeleteSession(pub SessionId);

async_message_handler_with_span! {
    impl AsyncSpanHandler<DeleteSession> for DbExecutor {
        async fn handle(msg: DeleteSession) -> Result<bool, Error> {
            let DeleteSession(session_id) = msg;
            debug!(id = session_id.as_string().as_str(), "Delete session");
            let pool = with_ctx(|a: &mut DbExecutor, _| a.pool());
            let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
                .bind(&session_id)
                .execute(&pool)
                .await?;

            Ok(result.rows_affected() > 0)
        }
    }
}
