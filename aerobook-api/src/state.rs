use crate::events::BroadcastPublisher;
use crate::metrics::ApiMetrics;
use aerobook_booking::{BookingManager, BookingRules, HoldPolicy, ReservationCoordinator};
use aerobook_catalog::{PriceRecalculator, PricingConfig, PricingEngine};
use aerobook_core::{BookingRepository, Clock, EventPublisher, FanoutPublisher, SeatInventory};
use aerobook_shared::models::events::DomainEvent;
use aerobook_store::app_config::{BusinessRules, RateLimitConfig};
use aerobook_store::RedisClient;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub inventory: Arc<dyn SeatInventory>,
    pub coordinator: Arc<ReservationCoordinator>,
    pub bookings: Arc<BookingManager>,
    pub redis: Option<Arc<RedisClient>>,
    pub sse_tx: broadcast::Sender<DomainEvent>,
    pub metrics: Arc<ApiMetrics>,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub business_rules: BusinessRules,
}

impl AppState {
    /// Wires the booking core around the given stores. Every event goes to the
    /// SSE channel and the metrics first, then to `sinks` (Kafka, cache).
    pub fn assemble(
        inventory: Arc<dyn SeatInventory>,
        repository: Arc<dyn BookingRepository>,
        sinks: Vec<Arc<dyn EventPublisher>>,
        clock: Arc<dyn Clock>,
        business_rules: BusinessRules,
        pricing: PricingConfig,
        auth: AuthConfig,
    ) -> anyhow::Result<Self> {
        let (sse_tx, _) = broadcast::channel(256);
        let metrics = Arc::new(ApiMetrics::new()?);

        let mut fanout = FanoutPublisher::new()
            .with(Arc::new(BroadcastPublisher::new(sse_tx.clone())))
            .with(metrics.clone());
        for sink in sinks {
            fanout = fanout.with(sink);
        }
        let events: Arc<dyn EventPublisher> = Arc::new(fanout);

        let coordinator = Arc::new(ReservationCoordinator::new(
            inventory.clone(),
            events.clone(),
            clock.clone(),
            HoldPolicy::from_seconds(business_rules.seat_hold_seconds, business_rules.max_seat_hold_seconds)?,
        ));
        let pricing = Arc::new(PriceRecalculator::new(
            PricingEngine::new(pricing),
            inventory.clone(),
            events.clone(),
            clock.clone(),
        ));
        let bookings = Arc::new(BookingManager::new(
            inventory.clone(),
            repository,
            pricing,
            events,
            clock,
            BookingRules {
                adult_age: business_rules.adult_age,
                max_tickets_per_booking: business_rules.max_tickets_per_booking,
            },
        ));

        Ok(Self {
            inventory,
            coordinator,
            bookings,
            redis: None,
            sse_tx,
            metrics,
            auth,
            rate_limit: RateLimitConfig::default(),
            business_rules,
        })
    }

    pub fn with_redis(mut self, redis: Arc<RedisClient>, rate_limit: RateLimitConfig) -> Self {
        self.redis = Some(redis);
        self.rate_limit = rate_limit;
        self
    }
}
