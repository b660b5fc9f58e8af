use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use claim_ledger::{ClaimService, RateLimiter};
use claim_server::config::{self, LogConfig, Settings};
use claim_server::handlers;
use dotenv::dotenv;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let settings = Settings::from_env().context("Failed to load server configuration")?;
    init_tracing(&settings.log);

    info!("Starting claim server...");

    let ledger_config = config::load_ledger_config().context("Failed to load ledger configuration")?;
    let service = ClaimService::from_config(ledger_config).context("Failed to open claim ledger")?;
    info!(
        mode = %service.ledger().mode(),
        claims = service.ledger().len(),
        "Claim ledger ready"
    );

    let service = web::Data::new(service);
    let limiter = web::Data::new(RateLimiter::new());

    // Drop rate limit windows that have rolled over
    let purge = limiter.clone();
    let purge_every = Duration::from_secs(settings.server.purge_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(purge_every);
        loop {
            ticker.tick().await;
            let purged = purge.purge_expired();
            if purged > 0 {
                debug!(purged, tracked = purge.tracked(), "Purged rate limit windows");
            }
        }
    });

    let server = settings.server.clone();
    info!("Starting HTTP server on {}:{}", server.host, server.port);

    HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .app_data(limiter.clone())
            .wrap(
                middleware::Logger::new(r#"%a "%{request}xi" %s %b %T"#)
                    .custom_request_replace("request", handlers::loggable_request),
            )
            .configure(handlers::configure_routes)
    })
    .workers(server.workers)
    .bind((server.host, server.port))?
    .run()
    .await?;

    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    if log.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
