use actix_web::{web, App, HttpServer};
use color_eyre::eyre::Report;
use dotenv::dotenv;
use lunch_vote_server::{
    config::Config,
    db, log, server,
    websocket::{DbSnapshotSource, SnapshotSettings},
};
use std::sync::Arc;
use tracing::info;

#[actix_web::main]
async fn main() -> Result<(), Report> {
    dotenv().ok();
    log::init()?;
    let config = Config::from_env()?;

    let pool = db::new_pool(&config.database_url, config.database_max_connections).await?;
    info!("Running migrations");
    db::MIGRATOR.run(&pool).await?;
    server::register_db_actor(pool);

    let settings = SnapshotSettings::new(Arc::new(DbSnapshotSource), config.snapshot_interval);
    let bind_address = config.bind_address.clone();
    info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(settings.clone()))
            .configure(server::configure)
    })
    .bind(bind_address)?
    .run()
    .await?;

    info!("Server stopped");
    Ok(())
}
