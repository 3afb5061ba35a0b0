use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpServer};
use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod balance;
mod config;
mod controller;
mod error;
mod exchange;
mod mongo_store;
mod mutations;
mod routes;
mod schemas;
mod store;

use crate::{
    config::Config,
    controller::TripController,
    mongo_store::MongoStore,
    store::{DocumentStore, MemoryStore},
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn DocumentStore> = match &config.mongodb_uri {
        Some(uri) => {
            info!(database = %config.database, "Using MongoDB document store");
            Arc::new(
                MongoStore::connect(uri, &config.database)
                    .await
                    .context("failed to connect to MongoDB")?,
            )
        }
        None => {
            warn!("MONGODB_URI is not set, trips will only be kept in memory");
            Arc::new(MemoryStore::default())
        }
    };

    let controller = web::Data::new(TripController::new(
        store,
        config.trip.clone(),
        config.write_retries,
    ));
    let cors_origin = config.cors_origin.clone();

    info!(bind = %config.bind, trip = %config.trip.name, "Starting trip board");
    HttpServer::new(move || {
        let cors = match &cors_origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header()
                .expose_headers([header::ETAG]),
            None => Cors::permissive(),
        };
        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(controller.clone())
            .configure(routes::configure)
    })
    .bind(&config.bind)
    .with_context(|| format!("failed to bind {}", config.bind))?
    .run()
    .await?;

    Ok(())
}
