use aerobook_api::{app, worker, AppState, AuthConfig};
use aerobook_booking::InMemoryBookingRepository;
use aerobook_catalog::InMemorySeatInventory;
use aerobook_core::{BookingRepository, EventPublisher, SeatInventory, SystemClock};
use aerobook_store::{app_config::Config, DbClient, EventProducer, PgBookingRepository, PgSeatInventory, RedisClient};
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aerobook_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Aerobook API on port {}", config.server.port);

    let mut business_rules = config.business_rules.clone();
    let (inventory, repository): (Arc<dyn SeatInventory>, Arc<dyn BookingRepository>) = match &config.database {
        Some(db_config) => {
            let db = DbClient::new(&db_config.url, db_config.max_connections)
                .await
                .context("Failed to connect to PostgreSQL")?;
            db.migrate().await.context("Failed to run migrations")?;
            business_rules = match db.fetch_business_rules(business_rules.clone()).await {
                Ok(rules) => rules,
                Err(e) => {
                    tracing::warn!("Using configured business rules, overrides unavailable: {}", e);
                    business_rules
                }
            };
            (
                Arc::new(PgSeatInventory::new(db.pool.clone())) as Arc<dyn SeatInventory>,
                Arc::new(PgBookingRepository::new(db.pool.clone())) as Arc<dyn BookingRepository>,
            )
        }
        None => {
            tracing::warn!("No database configured, inventory and bookings live in memory");
            (
                Arc::new(InMemorySeatInventory::new()) as Arc<dyn SeatInventory>,
                Arc::new(InMemoryBookingRepository::new()) as Arc<dyn BookingRepository>,
            )
        }
    };

    let mut sinks: Vec<Arc<dyn EventPublisher>> = Vec::new();
    if let Some(kafka) = &config.kafka {
        let producer = EventProducer::new(&kafka.brokers).context("Failed to create Kafka producer")?;
        sinks.push(Arc::new(producer));
    }
    let redis = match &config.redis {
        Some(redis) => {
            let client = Arc::new(RedisClient::new(&redis.url).await.context("Failed to connect to Redis")?);
            sinks.push(client.clone());
            Some(client)
        }
        None => None,
    };

    let mut state = AppState::assemble(
        inventory,
        repository,
        sinks,
        Arc::new(SystemClock),
        business_rules,
        config.pricing.clone(),
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    )
    .context("Failed to assemble application state")?;
    if let Some(redis) = redis {
        state = state.with_redis(redis, config.rate_limit.clone());
    }

    let _sweeper = worker::start_hold_sweeper(&state);

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.context("Failed to bind")?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("Server error")?;
    Ok(())
}
