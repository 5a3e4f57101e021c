extern crate lunch_vote_server;
mod integration_db;

use futures::future::{join3, join_all};
use integration_db::IntegrationTestDb;
use lunch_vote_server::{
    db::{
        option::PollOptionId,
        place::InternalPlace,
        poll::{PollId, PollWithOptions},
        session::UserBySession,
        user::{Role, UserId},
    },
    error::Error,
    identity::Caller,
    server, services,
};
use sqlx::PgPool;

async fn setup() -> IntegrationTestDb {
    let db = IntegrationTestDb::new().await;
    server::register_db_actor(db.pool());
    db
}

async fn sign_in(email: &str, admin: bool) -> Caller {
    let admins = if admin { vec![email.to_owned()] } else { vec![] };
    let (_session, user) = services::user::sign_in(email, "", &admins).await.unwrap();
    Caller::from(user)
}

async fn add_place(caller: &Caller, name: &str) -> InternalPlace {
    services::place::add_place(caller, name, None).await.unwrap()
}

async fn points(pool: &PgPool, user_id: &UserId) -> i32 {
    sqlx::query_scalar("SELECT points FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn votes_of(pool: &PgPool, user_id: &UserId, poll_id: &PollId) -> Vec<PollOptionId> {
    sqlx::query_scalar("SELECT option_id FROM votes WHERE user_id = $1 AND poll_id = $2")
        .bind(user_id)
        .bind(poll_id)
        .fetch_all(pool)
        .await
        .unwrap()
}

async fn count(pool: &PgPool, sql: &str, poll_id: &PollId) -> i64 {
    sqlx::query_scalar(sql)
        .bind(poll_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn option_named(poll: &PollWithOptions, name: &str) -> PollOptionId {
    poll.options
        .iter()
        .find(|option| option.place.name == name)
        .map(|option| option.id.clone())
        .expect("option for place")
}

#[actix_rt::test]
async fn create_poll_seeds_existing_places_only() {
    let db = setup().await;
    let admin = sign_in("admin@example.com", true).await;
    let member = sign_in("member@example.com", false).await;
    add_place(&member, "Noodle Bar").await;
    add_place(&admin, "Taco Truck").await;

    let poll = services::poll::create_poll(&admin).await.unwrap();
    assert!(poll.poll.active);
    let names: Vec<_> = poll.options.iter().map(|o| o.place.name.as_str()).collect();
    assert_eq!(names, vec!["Noodle Bar", "Taco Truck"]);

    // Places proposed later are not added to the open poll
    add_place(&member, "Salad Place").await;
    let active = services::poll::active_poll(&member).await.unwrap().unwrap();
    assert_eq!(active.poll.options.len(), 2);
    assert_eq!(active.my_option_id, None);

    assert!(matches!(
        services::poll::create_poll(&admin).await,
        Err(Error::Conflict)
    ));
    assert!(matches!(
        services::poll::create_poll(&member).await,
        Err(Error::Unauthorized)
    ));
    let active_polls = count(
        &db.pool(),
        "SELECT COUNT(*) FROM polls WHERE active AND id = $1",
        &poll.poll.id,
    )
    .await;
    assert_eq!(active_polls, 1);
}

#[actix_rt::test]
async fn concurrent_create_poll_has_single_winner() {
    let db = setup().await;
    let admin = sign_in("admin@example.com", true).await;
    add_place(&admin, "Noodle Bar").await;

    let results = join_all((0..5).map(|_| services::poll::create_poll(&admin))).await;
    let created = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(Error::Conflict)))
        .count();
    assert_eq!(created, 1);
    assert_eq!(conflicts, 4);

    let active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM polls WHERE active")
        .fetch_one(&db.pool())
        .await
        .unwrap();
    assert_eq!(active, 1);
}

#[actix_rt::test]
async fn switching_vote_keeps_one_vote_and_one_point() {
    let db = setup().await;
    let pool = db.pool();
    let admin = sign_in("admin@example.com", true).await;
    let member = sign_in("member@example.com", false).await;
    add_place(&admin, "Noodle Bar").await;
    add_place(&admin, "Taco Truck").await;
    let poll = services::poll::create_poll(&admin).await.unwrap();
    let noodles = option_named(&poll, "Noodle Bar");
    let tacos = option_named(&poll, "Taco Truck");
    let before = points(&pool, &member.user_id).await;

    let first = services::vote::cast_vote(&member, noodles.clone(), None)
        .await
        .unwrap();
    assert!(first.first_vote);
    let switched = services::vote::cast_vote(&member, tacos.clone(), Some("hungry".to_owned()))
        .await
        .unwrap();
    assert!(!switched.first_vote);
    let again = services::vote::cast_vote(&member, tacos.clone(), Some("very hungry".to_owned()))
        .await
        .unwrap();
    assert!(!again.first_vote);
    assert_eq!(again.vote.note.as_deref(), Some("very hungry"));

    assert_eq!(votes_of(&pool, &member.user_id, &poll.poll.id).await, vec![tacos.clone()]);
    assert_eq!(points(&pool, &member.user_id).await, before + 1);

    let active = services::poll::active_poll(&member).await.unwrap().unwrap();
    assert_eq!(active.my_option_id, Some(tacos));
}

#[actix_rt::test]
async fn concurrent_votes_by_one_user_serialize() {
    let db = setup().await;
    let pool = db.pool();
    let admin = sign_in("admin@example.com", true).await;
    let member = sign_in("member@example.com", false).await;
    add_place(&admin, "Noodle Bar").await;
    add_place(&admin, "Taco Truck").await;
    let poll = services::poll::create_poll(&admin).await.unwrap();
    let options = [option_named(&poll, "Noodle Bar"), option_named(&poll, "Taco Truck")];
    let before = points(&pool, &member.user_id).await;

    let results = join_all(
        (0..6).map(|i| services::vote::cast_vote(&member, options[i % 2].clone(), None)),
    )
    .await;
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(results.iter().filter(|r| r.as_ref().unwrap().first_vote).count(), 1);

    assert_eq!(votes_of(&pool, &member.user_id, &poll.poll.id).await.len(), 1);
    assert_eq!(points(&pool, &member.user_id).await, before + 1);
}

#[actix_rt::test]
async fn voting_requires_open_poll_and_known_option() {
    let _db = setup().await;
    let admin = sign_in("admin@example.com", true).await;
    let member = sign_in("member@example.com", false).await;
    add_place(&admin, "Noodle Bar").await;
    let poll = services::poll::create_poll(&admin).await.unwrap();
    let noodles = option_named(&poll, "Noodle Bar");

    assert!(matches!(
        services::vote::cast_vote(&member, PollOptionId::new(), None).await,
        Err(Error::NotFound(_))
    ));

    services::poll::close_poll(&admin, poll.poll.id.clone())
        .await
        .unwrap();
    assert!(matches!(
        services::vote::cast_vote(&member, noodles, None).await,
        Err(Error::ClosedPoll)
    ));
}

#[actix_rt::test]
async fn close_poll_breaks_ties_by_option_order() {
    let db = setup().await;
    let pool = db.pool();
    let admin = sign_in("admin@example.com", true).await;
    let proposer_a = sign_in("a@example.com", false).await;
    let proposer_b = sign_in("b@example.com", false).await;
    let proposer_c = sign_in("c@example.com", false).await;
    add_place(&proposer_a, "A").await;
    add_place(&proposer_b, "B").await;
    add_place(&proposer_c, "C").await;
    let poll = services::poll::create_poll(&admin).await.unwrap();

    let mut voter_number = 0;
    for (name, votes) in &[("A", 3), ("B", 5), ("C", 5)] {
        let option_id = option_named(&poll, name);
        for _ in 0..*votes {
            voter_number += 1;
            let voter = sign_in(&format!("voter{}@example.com", voter_number), false).await;
            services::vote::cast_vote(&voter, option_id.clone(), None)
                .await
                .unwrap();
        }
    }
    let before_a = points(&pool, &proposer_a.user_id).await;
    let before_b = points(&pool, &proposer_b.user_id).await;
    let before_c = points(&pool, &proposer_c.user_id).await;

    let closed = services::poll::close_poll(&admin, poll.poll.id.clone())
        .await
        .unwrap();
    assert!(!closed.poll.active);
    let winner = closed.winner.unwrap();
    assert_eq!(winner.place_name, "B");
    assert_eq!(winner.votes, 5);
    let award = closed.awarded.unwrap();
    assert_eq!(award.user_id, proposer_b.user_id);
    assert_eq!(award.points, 15);

    assert_eq!(points(&pool, &proposer_a.user_id).await, before_a);
    assert_eq!(points(&pool, &proposer_b.user_id).await, before_b + 15);
    assert_eq!(points(&pool, &proposer_c.user_id).await, before_c);

    assert!(matches!(
        services::poll::close_poll(&admin, poll.poll.id.clone()).await,
        Err(Error::AlreadyClosed)
    ));
}

#[actix_rt::test]
async fn close_poll_without_votes_or_options() {
    let db = setup().await;
    let pool = db.pool();
    let admin = sign_in("admin@example.com", true).await;
    let member = sign_in("member@example.com", false).await;

    // No places, so no options
    let empty = services::poll::create_poll(&admin).await.unwrap();
    assert!(empty.options.is_empty());
    let closed = services::poll::close_poll(&admin, empty.poll.id.clone())
        .await
        .unwrap();
    assert!(closed.winner.is_none());
    assert!(closed.awarded.is_none());

    // Without votes the first option wins and its proposer gets the base bonus
    add_place(&member, "Noodle Bar").await;
    add_place(&admin, "Taco Truck").await;
    let poll = services::poll::create_poll(&admin).await.unwrap();
    let before = points(&pool, &member.user_id).await;
    let closed = services::poll::close_poll(&admin, poll.poll.id.clone())
        .await
        .unwrap();
    assert_eq!(closed.winner.unwrap().place_name, "Noodle Bar");
    assert_eq!(points(&pool, &member.user_id).await, before + 10);

    assert!(matches!(
        services::poll::close_poll(&admin, PollId::new()).await,
        Err(Error::NotFound(_))
    ));
}

#[actix_rt::test]
async fn close_between_concurrent_votes_counts_committed_votes() {
    let db = setup().await;
    let pool = db.pool();
    let admin = sign_in("admin@example.com", true).await;
    let proposer = sign_in("proposer@example.com", false).await;
    add_place(&proposer, "Noodle Bar").await;
    let poll = services::poll::create_poll(&admin).await.unwrap();
    let noodles = option_named(&poll, "Noodle Bar");

    let mut voters = Vec::with_capacity(30);
    for n in 0..30 {
        voters.push(sign_in(&format!("voter{}@example.com", n), false).await);
    }
    let (early, late) = voters.split_at(15);

    // Close is queued between two batches of votes all in flight together
    let (early, closed, late) = join3(
        join_all(
            early
                .iter()
                .map(|voter| services::vote::cast_vote(voter, noodles.clone(), None)),
        ),
        services::poll::close_poll(&admin, poll.poll.id.clone()),
        join_all(
            late.iter()
                .map(|voter| services::vote::cast_vote(voter, noodles.clone(), None)),
        ),
    )
    .await;
    let closed = closed.unwrap();

    let mut accepted = 0;
    for result in early.iter().chain(late.iter()) {
        match result {
            Ok(_) => accepted += 1,
            Err(Error::ClosedPoll) => {}
            Err(err) => panic!("unexpected vote error {:?}", err),
        }
    }
    let stored = count(&pool, "SELECT COUNT(*) FROM votes WHERE poll_id = $1", &poll.poll.id).await;
    assert_eq!(accepted, stored);
    assert_eq!(closed.winner.unwrap().votes, stored);
}

#[actix_rt::test]
async fn members_cannot_close_or_delete_polls() {
    let _db = setup().await;
    let admin = sign_in("admin@example.com", true).await;
    let member = sign_in("member@example.com", false).await;
    let poll = services::poll::create_poll(&admin).await.unwrap();

    assert!(matches!(
        services::poll::close_poll(&member, poll.poll.id.clone()).await,
        Err(Error::Unauthorized)
    ));
    assert!(matches!(
        services::poll::delete_poll(&member, poll.poll.id.clone()).await,
        Err(Error::Unauthorized)
    ));
}

#[actix_rt::test]
async fn delete_poll_only_while_active() {
    let db = setup().await;
    let pool = db.pool();
    let admin = sign_in("admin@example.com", true).await;
    let member = sign_in("member@example.com", false).await;
    add_place(&admin, "Noodle Bar").await;

    let poll = services::poll::create_poll(&admin).await.unwrap();
    services::vote::cast_vote(&member, option_named(&poll, "Noodle Bar"), None)
        .await
        .unwrap();
    services::poll::delete_poll(&admin, poll.poll.id.clone())
        .await
        .unwrap();
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM poll_options WHERE poll_id = $1", &poll.poll.id).await,
        0
    );
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM votes WHERE poll_id = $1", &poll.poll.id).await,
        0
    );
    assert!(services::poll::active_poll(&member).await.unwrap().is_none());

    let poll = services::poll::create_poll(&admin).await.unwrap();
    services::poll::close_poll(&admin, poll.poll.id.clone())
        .await
        .unwrap();
    assert!(matches!(
        services::poll::delete_poll(&admin, poll.poll.id.clone()).await,
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(
        services::poll::delete_poll(&admin, PollId::new()).await,
        Err(Error::NotFound(_))
    ));
}

#[actix_rt::test]
async fn add_place_validates_and_awards_points() {
    let db = setup().await;
    let pool = db.pool();
    let member = sign_in("member@example.com", false).await;
    let before = points(&pool, &member.user_id).await;

    assert!(matches!(
        services::place::add_place(&member, "", None).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        services::place::add_place(&member, "   ", Some("nothing")).await,
        Err(Error::Validation(_))
    ));
    assert_eq!(points(&pool, &member.user_id).await, before);

    let place = services::place::add_place(&member, " Noodle Bar ", Some("  "))
        .await
        .unwrap();
    assert_eq!(place.name, "Noodle Bar");
    assert_eq!(place.description, None);
    assert_eq!(place.added_by, Some(member.user_id.clone()));
    assert_eq!(points(&pool, &member.user_id).await, before + 5);

    let places = services::place::list_places().await.unwrap();
    assert_eq!(places.len(), 1);
    assert_eq!(places[0].added_by_name.as_deref(), Some("member"));
}

#[actix_rt::test]
async fn delete_place_by_proposer_or_admin_cascades() {
    let db = setup().await;
    let pool = db.pool();
    let admin = sign_in("admin@example.com", true).await;
    let proposer = sign_in("proposer@example.com", false).await;
    let other = sign_in("other@example.com", false).await;
    let noodles = add_place(&proposer, "Noodle Bar").await;
    let tacos = add_place(&proposer, "Taco Truck").await;

    let poll = services::poll::create_poll(&admin).await.unwrap();
    services::vote::cast_vote(&other, option_named(&poll, "Noodle Bar"), None)
        .await
        .unwrap();

    assert!(matches!(
        services::place::delete_place(&other, noodles.id.clone()).await,
        Err(Error::Unauthorized)
    ));
    services::place::delete_place(&proposer, noodles.id.clone())
        .await
        .unwrap();
    services::place::delete_place(&admin, tacos.id.clone())
        .await
        .unwrap();
    assert!(matches!(
        services::place::delete_place(&admin, tacos.id.clone()).await,
        Err(Error::NotFound(_))
    ));

    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM poll_options WHERE poll_id = $1", &poll.poll.id).await,
        0
    );
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM votes WHERE poll_id = $1", &poll.poll.id).await,
        0
    );
}

#[actix_rt::test]
async fn history_and_leaderboard_ordering() {
    let _db = setup().await;
    let admin = sign_in("admin@example.com", true).await;
    let member = sign_in("member@example.com", false).await;
    add_place(&member, "Noodle Bar").await;

    let first = services::poll::create_poll(&admin).await.unwrap();
    services::poll::close_poll(&admin, first.poll.id.clone())
        .await
        .unwrap();
    let second = services::poll::create_poll(&admin).await.unwrap();
    services::vote::cast_vote(&member, option_named(&second, "Noodle Bar"), None)
        .await
        .unwrap();
    services::poll::close_poll(&admin, second.poll.id.clone())
        .await
        .unwrap();
    // Still open polls are not history
    services::poll::create_poll(&admin).await.unwrap();

    let history = services::poll::history().await.unwrap();
    let ids: Vec<_> = history.iter().map(|p| p.poll.id.clone()).collect();
    assert_eq!(ids, vec![second.poll.id.clone(), first.poll.id.clone()]);
    assert_eq!(history[0].winner.as_ref().unwrap().votes, 1);
    assert_eq!(history[0].options[0].votes[0].user_id, member.user_id);

    // member: 5 (place) + 10 (first win) + 1 (vote) + 11 (second win)
    let leaderboard = services::user::leaderboard().await.unwrap();
    assert_eq!(leaderboard[0].id, member.user_id);
    assert_eq!(leaderboard[0].points, 27);
    assert_eq!(leaderboard[1].id, admin.user_id);
    assert_eq!(leaderboard[1].points, 0);
}

#[actix_rt::test]
async fn sign_in_creates_once_and_sessions_resolve() {
    let _db = setup().await;
    let admins = vec!["boss@example.com".to_owned()];
    let (session, user) = services::user::sign_in("Boss@Example.com", "The Boss", &admins)
        .await
        .unwrap();
    assert_eq!(user.role, Role::Admin);
    assert_eq!(user.email, "boss@example.com");

    // Role is only assigned on creation, name refreshes
    let (_, again) = services::user::sign_in("boss@example.com", "Boss", &[])
        .await
        .unwrap();
    assert_eq!(again.id, user.id);
    assert_eq!(again.role, Role::Admin);
    assert_eq!(again.name, "Boss");

    assert!(matches!(
        services::user::sign_in("not-an-email", "x", &[]).await,
        Err(Error::Validation(_))
    ));

    let resolved = services::execute(UserBySession(session.id.clone()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.id, user.id);

    services::user::sign_out(session.id.clone()).await.unwrap();
    assert!(services::execute(UserBySession(session.id.clone()))
        .await
        .unwrap()
        .is_none());
    assert!(matches!(
        services::user::sign_out(session.id).await,
        Err(Error::Unauthorized)
    ));
}
