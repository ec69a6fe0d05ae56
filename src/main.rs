use std::net::SocketAddr;

use axum::Router;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use boxoffice_server::config::Config;
use boxoffice_server::db;
use boxoffice_server::metrics::register_business_metrics;
use boxoffice_server::queue::WaitingRoom;
use boxoffice_server::rate_limit::RateLimiter;
use boxoffice_server::routes::create_routes;
use boxoffice_server::signing::TicketSigner;
use boxoffice_server::state::AppState;
use boxoffice_server::worker::RecoveryWorker;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    register_business_metrics();

    let pool = db::connect_postgres(&config.postgres)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let redis = db::connect_redis(&config.redis)
        .await
        .expect("Failed to connect to Redis");

    tracing::info!("Successfully connected to Redis");

    let signer = TicketSigner::new(&config.sale.qr_secret);
    let waiting_room = WaitingRoom::new(redis.clone(), &config.sale);
    let rate_limiter = RateLimiter::new(redis);

    let worker = RecoveryWorker::new(
        pool.clone(),
        signer.clone(),
        config.sale.recovery_interval(),
    );
    tokio::spawn(worker.run());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .expect("Invalid HOST/PORT configuration");

    let state = AppState {
        pool,
        waiting_room,
        rate_limiter,
        signer,
        config,
    };
    let app: Router = create_routes(state);

    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
