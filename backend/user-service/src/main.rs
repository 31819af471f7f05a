/// User Service Main Entry Point
///
/// Starts, on one shutdown signal:
/// - gRPC server (UsersService)
/// - HTTP/JSON gateway sharing the same interceptor chain
/// - PostgreSQL pool, or in-memory storage when DATABASE_URL is unset
use anyhow::{Context, Result};
use crypto_core::jwt::TokenAuthenticator;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{info, warn};
use user_service::{
    app,
    config::Settings,
    db::{MemoryUserStore, PostgresUserStore, UserStore},
    http::{start_http_server, GatewayState},
    middleware::{RateLimiter, TracingRequestLog},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "user_service=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("Starting User Service");

    let settings = Settings::load().context("Failed to load configuration")?;
    info!("Configuration loaded successfully");

    let tokens = Arc::new(
        TokenAuthenticator::new(settings.jwt.secret.as_bytes(), settings.jwt.session_days)
            .context("Failed to initialize JWT authenticator")?,
    );

    let limiter = Arc::new(
        RateLimiter::new(
            settings.rate_limit.capacity,
            settings.rate_limit.refill_per_second,
        )
        .context("Invalid rate limit configuration")?,
    );
    info!(
        capacity = settings.rate_limit.capacity,
        refill_per_second = settings.rate_limit.refill_per_second,
        "Rate limiter initialized"
    );

    let store: Arc<dyn UserStore> = match &settings.database.url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(settings.database.max_connections)
                .acquire_timeout(Duration::from_secs(5))
                .connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            info!(
                "Database pool initialized with {} max connections",
                settings.database.max_connections
            );

            let store = PostgresUserStore::new(pool);
            store
                .ensure_schema()
                .await
                .context("Failed to apply database schema")?;
            info!("Database schema ready");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set - using in-memory storage (data is lost on restart)");
            Arc::new(MemoryUserStore::new())
        }
    };

    let service = app::build_service(tokens, limiter, store, Arc::new(TracingRequestLog))
        .context("Invalid route policy")?;

    if let Some(admin) = &settings.bootstrap_admin {
        let created = service
            .ensure_admin(&admin.username, &admin.password)
            .await
            .context("Failed to bootstrap admin account")?;
        if created {
            info!(username = %admin.username, "Bootstrap admin account created");
        }
    }

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let grpc_addr: SocketAddr = settings
        .server
        .grpc_addr()
        .parse()
        .context("Invalid gRPC address")?;
    let http_listener = tokio::net::TcpListener::bind(settings.server.http_addr())
        .await
        .context("Failed to bind HTTP listener")?;

    let grpc_server = {
        let shutdown = shutdown.clone();
        let service = app::grpc_service(&service, shutdown.clone());
        async move {
            info!("Starting gRPC server on {}", grpc_addr);
            Server::builder()
                .add_service(service)
                .serve_with_shutdown(grpc_addr, shutdown.cancelled())
                .await
                .context("gRPC server error")
        }
    };

    let http_server = start_http_server(
        GatewayState {
            service,
            shutdown: shutdown.clone(),
        },
        http_listener,
    );

    let result = tokio::try_join!(grpc_server, http_server);
    // Either server failing takes the other down too
    shutdown.cancel();
    result?;

    info!("User service shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Shutting down gracefully...");
}
