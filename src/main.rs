use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use boardroom::api::middleware::ApiKeyAuth;
use boardroom::cli::{
    commands::{Cli, Commands},
    run_cli,
};
use boardroom::config::AppConfig;
use boardroom::db;
use boardroom::gateway::{LocalGateway, PersistenceGateway};
use boardroom::tools::BusinessDesk;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({"status": "healthy"}))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Serve) {
        if let Err(e) = run_cli(cli).await {
            error!("{}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    info!("Starting Boardroom server...");

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let db_pool = match db::get_connection(&config.database) {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let gateway: Arc<dyn PersistenceGateway> = Arc::new(LocalGateway::new(db_pool));
    let desk = web::Data::new(BusinessDesk::new());

    if config.auth.api_keys.is_empty() {
        info!("No API keys configured; requests are not authenticated");
    }

    let host = config.server.host.clone();
    let port = config.server.port;

    info!("Server listening on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(desk.clone())
            .route("/health", web::get().to(health))
            .wrap(ApiKeyAuth)
            .configure(boardroom::api::routes::configure)
    })
    .bind((host, port))?
    .run()
    .await
}
