pub mod option;
pub mod place;
pub mod poll;
pub mod session;
pub mod user;
pub mod vote;

use actix::prelude::*;
use sqlx::{
    migrate::Migrator,
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};

/// Embedded schema migrations from `migrations/`
pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Declares a UUID backed identifier that is stored as `UUID` and serialized
/// as a hyphenated string
macro_rules! id_type {
    ($name:ident) => {
        #[derive(
            Clone,
            Hash,
            PartialEq,
            Eq,
            Debug,
            serde::Deserialize,
            serde::Serialize,
            sqlx::Type,
        )]
        #[sqlx(transparent)]
        pub struct $name(pub sqlx::types::Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(sqlx::types::Uuid::new_v4())
            }

            pub fn as_string(&self) -> String {
                self.0.hyphenated().to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

pub(crate) use id_type;

#[derive(Debug)]
pub struct DbExecutor(pub PgPool);

impl DbExecutor {
    pub fn pool(&mut self) -> PgPool {
        self.0.clone()
    }
}

impl Actor for DbExecutor {
    type Context = Context<Self>;
}

impl Default for DbExecutor {
    fn default() -> Self {
        unimplemented!("DbExecutor cannot automatically be started");
    }
}

impl SystemService for DbExecutor {}
impl Supervised for DbExecutor {}

pub async fn new_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    new_pool_with(database_url.parse()?, max_connections).await
}

pub async fn new_pool_with(
    connect_options: PgConnectOptions,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_with(connect_options)
        .await
}
