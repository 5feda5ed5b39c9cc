use aerobook_api::middleware::auth::{issue_token, ROLE_ADMIN, ROLE_CUSTOMER};
use aerobook_api::{app, AppState, AuthConfig};
use aerobook_booking::InMemoryBookingRepository;
use aerobook_catalog::{InMemorySeatInventory, PricingConfig};
use aerobook_core::{Clock, ManualClock};
use aerobook_store::app_config::BusinessRules;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    auth: AuthConfig,
    clock: Arc<ManualClock>,
}

impl TestApp {
    fn new() -> Self {
        let auth = AuthConfig { secret: "test-secret".to_string(), expiration: 3600 };
        let clock = Arc::new(ManualClock::default());
        let state = AppState::assemble(
            Arc::new(InMemorySeatInventory::new()),
            Arc::new(InMemoryBookingRepository::new()),
            Vec::new(),
            clock.clone(),
            BusinessRules { seat_hold_seconds: 600, ..BusinessRules::default() },
            PricingConfig::default(),
            auth.clone(),
        )
        .unwrap();
        Self { router: app(state), auth, clock }
    }

    fn token(&self, sub: &str, role: &str) -> String {
        issue_token(&self.auth, sub, role).unwrap().0
    }

    async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn metrics_text(&self) -> String {
        let response = self
            .router
            .clone()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn create_flight(&self, number: &str, economy: u32) -> String {
        let admin = self.token("ops", ROLE_ADMIN);
        let (status, flight) = self
            .send(
                "POST",
                "/v1/flights",
                Some(&admin),
                Some(json!({
                    "flight_number": number,
                    "origin": "SFO",
                    "destination": "NRT",
                    "departure_at": "2030-05-01T09:30:00Z",
                    "currency": "USD",
                    "cabins": [
                        { "cabin": "economy", "capacity": economy, "base_price_cents": 10000 },
                        { "cabin": "business", "capacity": 2, "base_price_cents": 40000 }
                    ]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        flight["id"].as_str().unwrap().to_string()
    }
}

fn ticket(flight_id: &str, seat: &str, age: u8) -> Value {
    json!({
        "passenger": { "first_name": "Grace", "last_name": "Hopper", "age": age },
        "departure": { "flight_id": flight_id, "cabin": "economy", "seat_number": seat }
    })
}

#[tokio::test]
async fn test_health_and_guest_token() {
    let app = TestApp::new();

    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.send("POST", "/v1/auth/guest", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();
    assert!(body["owner"].as_str().unwrap().starts_with("guest-"));

    let (status, _) = app.send("GET", "/v1/bookings", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_flight_registration_requires_admin() {
    let app = TestApp::new();
    let customer = app.token("alice", ROLE_CUSTOMER);
    let body = json!({
        "flight_number": "AB1",
        "origin": "SFO",
        "destination": "LAX",
        "departure_at": "2030-05-01T09:30:00Z",
        "currency": "USD",
        "cabins": [{ "cabin": "economy", "capacity": 3, "base_price_cents": 5000 }]
    });

    let (status, error) = app.send("POST", "/v1/flights", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error["kind"], "UNAUTHORIZED");

    let (status, error) = app.send("POST", "/v1/flights", Some(&customer), Some(body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error["kind"], "FORBIDDEN");

    let flight_id = app.create_flight("AB2", 3).await;
    let (status, flights) = app.send("GET", "/v1/flights", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(flights.as_array().unwrap().len(), 1);

    let (status, flight) = app.send("GET", &format!("/v1/flights/{}", flight_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(flight["origin"], "SFO");
}

#[tokio::test]
async fn test_hold_book_and_cancel_over_http() {
    let app = TestApp::new();
    let flight_id = app.create_flight("AB100", 2).await;
    let a = app.token("A", ROLE_CUSTOMER);
    let b = app.token("B", ROLE_CUSTOMER);
    let c = app.token("C", ROLE_CUSTOMER);

    let hold_uri = |seat: &str| format!("/v1/seats/{}/economy/{}/hold", flight_id, seat);

    let (status, hold) = app.send("POST", &hold_uri("E1"), Some(&a), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(hold["seat_number"], "E1");
    let (status, _) = app.send("POST", &hold_uri("E2"), Some(&b), None).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, error) = app.send("POST", &hold_uri("E1"), Some(&c), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["kind"], "SEAT_UNAVAILABLE");

    let (status, map) = app
        .send("GET", &format!("/v1/flights/{}/seats/economy", flight_id), Some(&a), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(map["seats"][0]["held_by_you"], true);
    assert_eq!(map["seats"][1]["held_by_you"], false);
    assert_eq!(map["seats"][1]["state"], "HELD");

    let (status, error) = app
        .send("POST", "/v1/bookings", Some(&a), Some(json!({ "tickets": [ticket(&flight_id, "E1", 16)] })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["kind"], "VALIDATION_ERROR");

    let (status, booking) = app
        .send("POST", "/v1/bookings", Some(&a), Some(json!({ "tickets": [ticket(&flight_id, "E1", 35)] })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "CONFIRMED");
    assert_eq!(booking["total_cents"], 10000);
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let (_, flight) = app.send("GET", &format!("/v1/flights/{}", flight_id), None, None).await;
    let economy = flight["cabins"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["cabin"] == "economy")
        .unwrap()
        .clone();
    assert_eq!(economy["occupied"], 1);
    assert!(economy["current_price_cents"].as_i64().unwrap() > 10000);

    let (status, _) = app.send("GET", &format!("/v1/bookings/{}", booking_id), Some(&b), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send("PATCH", &format!("/v1/bookings/{}/cancel", booking_id), Some(&b), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, cancelled) = app
        .send("PATCH", &format!("/v1/bookings/{}/cancel", booking_id), Some(&a), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");

    let (status, error) = app
        .send("PATCH", &format!("/v1/bookings/{}/cancel", booking_id), Some(&a), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["kind"], "ALREADY_CANCELLED");

    // The freed seat can be held again.
    let (status, _) = app.send("POST", &hold_uri("E1"), Some(&c), None).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_expired_hold_reports_gone() {
    let app = TestApp::new();
    let flight_id = app.create_flight("AB200", 2).await;
    let a = app.token("A", ROLE_CUSTOMER);

    let uri = format!("/v1/seats/{}/economy/E1/hold?ttl_seconds=60", flight_id);
    let (status, _) = app.send("POST", &uri, Some(&a), None).await;
    assert_eq!(status, StatusCode::CREATED);

    app.clock.advance(chrono::Duration::seconds(61));
    let (status, error) = app
        .send("POST", "/v1/bookings", Some(&a), Some(json!({ "tickets": [ticket(&flight_id, "E1", 40)] })))
        .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(error["kind"], "HOLD_EXPIRED");
}

#[tokio::test]
async fn test_release_endpoints_and_metrics() {
    let app = TestApp::new();
    let flight_id = app.create_flight("AB300", 3).await;
    let a = app.token("A", ROLE_CUSTOMER);

    for seat in ["E1", "E2", "E3"] {
        let (status, _) = app
            .send("POST", &format!("/v1/seats/{}/economy/{}/hold", flight_id, seat), Some(&a), None)
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, _) = app
        .send("DELETE", &format!("/v1/seats/{}/economy/E1/hold", flight_id), Some(&a), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, error) = app
        .send("DELETE", &format!("/v1/seats/{}/economy/E1/hold", flight_id), Some(&a), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["kind"], "NOT_FOUND");

    let (status, body) = app.send("DELETE", "/v1/holds", Some(&a), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["released"].as_array().unwrap().len(), 2);

    let (status, error) = app
        .send("GET", &format!("/v1/flights/{}/seats/first", flight_id), Some(&a), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["kind"], "VALIDATION_ERROR");

    let text = app.metrics_text().await;
    assert!(text.contains(r#"aerobook_holds_total{outcome="granted"} 3"#));
    assert!(text.contains(r#"aerobook_holds_total{outcome="released"} 3"#));
}

#[tokio::test]
async fn test_hold_ttl_is_validated_and_clamped() {
    let app = TestApp::new();
    let flight_id = app.create_flight("AB400", 2).await;
    let a = app.token("A", ROLE_CUSTOMER);
    let b = app.token("B", ROLE_CUSTOMER);
    let hold_uri = |seat: &str, ttl: &str| format!("/v1/seats/{}/economy/{}/hold?ttl_seconds={}", flight_id, seat, ttl);

    let (status, hold) = app.send("POST", &hold_uri("E1", "9223372036854775807"), Some(&a), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let expires_at: chrono::DateTime<chrono::Utc> = hold["expires_at"].as_str().unwrap().parse().unwrap();
    assert_eq!(expires_at - app.clock.now(), chrono::Duration::seconds(1800));

    let (status, error) = app.send("POST", &hold_uri("E2", "-5"), Some(&a), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["kind"], "VALIDATION_ERROR");

    let (status, _) = app.send("POST", &hold_uri("E9", "60"), Some(&a), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send("POST", &hold_uri("E1", "60"), Some(&b), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Only seat contention counts as a denied hold.
    let text = app.metrics_text().await;
    assert!(text.contains(r#"aerobook_holds_total{outcome="denied"} 1"#));
    assert!(text.contains(r#"aerobook_holds_total{outcome="granted"} 1"#));
}

#[tokio::test]
async fn test_availability_without_cache_reads_inventory() {
    let app = TestApp::new();
    let flight_id = app.create_flight("AB500", 2).await;
    let a = app.token("A", ROLE_CUSTOMER);

    let (status, _) = app
        .send("POST", &format!("/v1/seats/{}/economy/E1/hold", flight_id), Some(&a), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app
        .send("POST", "/v1/bookings", Some(&a), Some(json!({ "tickets": [ticket(&flight_id, "E1", 35)] })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, availability) = app
        .send("GET", &format!("/v1/flights/{}/availability", flight_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let cabins = availability.as_array().unwrap();
    let economy = cabins.iter().find(|c| c["cabin"] == "economy").unwrap();
    assert_eq!(economy["free"], 1);
    assert_eq!(economy["current_price_cents"], 15000);
    let business = cabins.iter().find(|c| c["cabin"] == "business").unwrap();
    assert_eq!(business["free"], 2);

    let (status, error) = app
        .send("GET", &format!("/v1/flights/{}/availability", uuid::Uuid::new_v4()), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["kind"], "NOT_FOUND");
}

#[test]
fn test_unrepresentable_hold_setting_is_rejected_at_startup() {
    let result = AppState::assemble(
        Arc::new(InMemorySeatInventory::new()),
        Arc::new(InMemoryBookingRepository::new()),
        Vec::new(),
        Arc::new(ManualClock::default()),
        BusinessRules { seat_hold_seconds: u64::MAX, ..BusinessRules::default() },
        PricingConfig::default(),
        AuthConfig { secret: "test-secret".to_string(), expiration: 3600 },
    );
    assert!(result.is_err());
}
