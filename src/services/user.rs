use super::execute;
use crate::db::{
    session::{DeleteSession, InternalSession, SignIn},
    user::{InternalUser, Leaderboard, LeaderboardEntry, Role, UserById},
};
use crate::error::Error;
use crate::identity::Caller;
use tracing::{info, instrument};

/// Signs in a user handed over by the identity provider. Users listed in
/// `admin_emails` start out as admins.
#[instrument(skip(admin_emails))]
pub async fn sign_in(
    email: &str,
    name: &str,
    admin_emails: &[String],
) -> Result<(InternalSession, InternalUser), Error> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::Validation("a valid email is required"));
    }
    let name = match name.trim() {
        "" => email.split('@').next().unwrap_or_default().to_owned(),
        name => name.to_owned(),
    };
    let role_on_create = if admin_emails.iter().any(|admin| admin == &email) {
        Role::Admin
    } else {
        Role::Member
    };

    let (session, user) = execute(SignIn {
        email,
        name,
        role_on_create,
    })
    .await?;
    info!(user_id = %user.id, role = ?user.role, "User signed in");
    Ok((session, user))
}

#[instrument(skip(session_id))]
pub async fn sign_out(session_id: crate::db::session::SessionId) -> Result<(), Error> {
    if execute(DeleteSession(session_id)).await? {
        Ok(())
    } else {
        Err(Error::Unauthorized)
    }
}

#[instrument(skip(caller), fields(user_id = %caller.user_id))]
pub async fn me(caller: &Caller) -> Result<InternalUser, Error> {
    execute(UserById(caller.user_id.clone()))
        .await?
        .ok_or(Error::NotFound("user"))
}

#[instrument]
pub async fn leaderboard() -> Result<Vec<LeaderboardEntry>, Error> {
    execute(Leaderboard).await
}
