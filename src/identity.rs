use crate::db::{
    session::{SessionId, UserBySession},
    user::{InternalUser, Role, UserId},
};
use crate::error::Error;
use crate::services::execute;
use actix_web::{dev::Payload, http::header::AUTHORIZATION, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use sqlx::types::Uuid;
use tracing::debug;

/// Authenticated caller of an engine operation
#[derive(Clone, Debug)]
pub struct Caller {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), Error> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(Error::Unauthorized)
        }
    }
}

impl From<InternalUser> for Caller {
    fn from(user: InternalUser) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
        }
    }
}

/// Reads the session id from `Authorization: Bearer <session id>`
pub fn session_id(req: &HttpRequest) -> Option<SessionId> {
    let header = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?;
    Uuid::parse_str(token.trim()).ok().map(SessionId)
}

impl FromRequest for Caller {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let session_id = session_id(req);
        Box::pin(async move {
            let session_id = match session_id {
                Some(session_id) => session_id,
                None => {
                    debug!("Request without a valid bearer token");
                    return Err(Error::Unauthorized);
                }
            };
            let user = execute(UserBySession(session_id)).await?;
            user.map(Caller::from).ok_or(Error::Unauthorized)
        })
    }
}
