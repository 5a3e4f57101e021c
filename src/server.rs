use actix::prelude::*;
use actix::registry::SystemRegistry;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::{Deserialize, Serialize};
use sqlx::{types::Uuid, PgPool};
use tracing::instrument;

use crate::config::Config;
use crate::db::{
    self,
    option::PollOptionId,
    place::PlaceId,
    poll::PollId,
    session::SessionId,
    user::InternalUser,
};
use crate::error::Error;
use crate::identity::{self, Caller};
use crate::services;
use crate::websocket::{SnapshotSettings, WsClient};

#[derive(Serialize, Deserialize, Debug)]
pub struct SignInRequest {
    pub email: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SignInResponse {
    pub session_id: SessionId,
    pub user: InternalUser,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct NewPlace {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct NewVote {
    pub option_id: PollOptionId,
    pub note: Option<String>,
}

async fn sign_in(
    body: web::Json<SignInRequest>,
    config: web::Data<Config>,
) -> Result<HttpResponse, Error> {
    let SignInRequest { email, name } = body.into_inner();
    let (session, user) = services::user::sign_in(&email, &name, &config.admin_emails).await?;
    Ok(HttpResponse::Created().json(SignInResponse {
        session_id: session.id,
        user,
    }))
}

async fn sign_out(req: HttpRequest, _caller: Caller) -> Result<HttpResponse, Error> {
    let session_id = identity::session_id(&req).ok_or(Error::Unauthorized)?;
    services::user::sign_out(session_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn me(caller: Caller) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(services::user::me(&caller).await?))
}

async fn leaderboard(_caller: Caller) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(services::user::leaderboard().await?))
}

async fn list_places(_caller: Caller) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(services::place::list_places().await?))
}

async fn add_place(caller: Caller, body: web::Json<NewPlace>) -> Result<HttpResponse, Error> {
    let place =
        services::place::add_place(&caller, &body.name, body.description.as_deref()).await?;
    Ok(HttpResponse::Created().json(place))
}

async fn delete_place(caller: Caller, path: web::Path<Uuid>) -> Result<HttpResponse, Error> {
    let place = services::place::delete_place(&caller, PlaceId(path.into_inner())).await?;
    Ok(HttpResponse::Ok().json(place))
}

async fn active_poll(caller: Caller) -> Result<HttpResponse, Error> {
    match services::poll::active_poll(&caller).await? {
        Some(poll) => Ok(HttpResponse::Ok().json(poll)),
        None => Err(Error::NotFound("active poll")),
    }
}

async fn create_poll(caller: Caller) -> Result<HttpResponse, Error> {
    let poll = services::poll::create_poll(&caller).await?;
    Ok(HttpResponse::Created().json(poll))
}

async fn close_poll(caller: Caller, path: web::Path<Uuid>) -> Result<HttpResponse, Error> {
    let closed = services::poll::close_poll(&caller, PollId(path.into_inner())).await?;
    Ok(HttpResponse::Ok().json(closed))
}

async fn delete_poll(caller: Caller, path: web::Path<Uuid>) -> Result<HttpResponse, Error> {
    let poll = services::poll::delete_poll(&caller, PollId(path.into_inner())).await?;
    Ok(HttpResponse::Ok().json(poll))
}

async fn history(_caller: Caller) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(services::poll::history().await?))
}

async fn cast_vote(caller: Caller, body: web::Json<NewVote>) -> Result<HttpResponse, Error> {
    let NewVote { option_id, note } = body.into_inner();
    let outcome = services::vote::cast_vote(&caller, option_id, note).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[instrument(skip(req, stream, settings))]
async fn ws_route(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<Uuid>,
    settings: web::Data<SnapshotSettings>,
) -> Result<HttpResponse, actix_web::Error> {
    ws::start(
        WsClient::new(PollId(path.into_inner()), settings.get_ref()),
        &req,
        stream,
    )
}

pub fn register_db_actor(pool: PgPool) {
    SystemRegistry::set(db::DbExecutor(pool).start());
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/sessions", web::post().to(sign_in))
            .route("/sessions", web::delete().to(sign_out))
            .route("/me", web::get().to(me))
            .route("/leaderboard", web::get().to(leaderboard))
            .route("/history", web::get().to(history))
            .route("/places", web::get().to(list_places))
            .route("/places", web::post().to(add_place))
            .route("/places/{place_id}", web::delete().to(delete_place))
            .route("/polls", web::post().to(create_poll))
            .route("/polls/active", web::get().to(active_poll))
            .route("/polls/{poll_id}/close", web::post().to(close_poll))
            .route("/polls/{poll_id}", web::delete().to(delete_poll))
            .route("/votes", web::post().to(cast_vote)),
    )
    // websocket
    .service(web::resource("/ws/polls/{poll_id}").route(web::get().to(ws_route)));
}
