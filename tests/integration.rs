use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use freightboard::api::rest::router;
use freightboard::config::Config;
use freightboard::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup() -> axum::Router {
    let state = AppState::new(Config::default()).unwrap();
    router(Arc::new(state))
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }

    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Registers a user and returns (id, bearer token).
async fn register(app: &axum::Router, name: &str, role: &str) -> (String, String) {
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/users",
            None,
            Some(json!({
                "name": name,
                "email": format!("{name}@example.com"),
                "country": "PT",
                "role": role
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    (
        body["user"]["id"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

fn sample_load() -> Value {
    json!({
        "title": "Palletized electronics",
        "origin": { "address": "Av. da Liberdade 1", "city": "Lisboa", "country": "PT" },
        "dest": { "address": "Gran Via 1", "city": "Madrid", "country": "ES" },
        "load_type": "GENERAL",
        "weight_kg": 5000.0,
        "pickup_date": "2027-01-10T08:00:00Z",
        "delivery_date": "2027-01-12T18:00:00Z",
        "suggested_price": "935.00"
    })
}

/// Registers a shipper and carrier, publishes a load, submits and accepts an
/// offer at 650.00. Returns (shipper token, carrier token, load id, trip id).
async fn accepted_load(app: &axum::Router, tag: &str) -> (String, String, String, String) {
    let (_shipper_id, shipper) = register(app, &format!("shipper-{tag}"), "SHIPPER").await;
    let (_carrier_id, carrier) = register(app, &format!("carrier-{tag}"), "CARRIER").await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/vehicles",
            Some(&carrier),
            Some(json!({ "plate": "AA-00-BB", "vehicle_type": "VAN", "capacity_kg": 3500.0 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(request("POST", "/loads", Some(&shipper), Some(sample_load())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let load_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/loads/{load_id}/publish"),
            Some(&shipper),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/offers",
            Some(&carrier),
            Some(json!({
                "load_id": load_id,
                "price": "650.00",
                "estimated_pickup": "2027-01-10T08:00:00Z",
                "estimated_delivery": "2027-01-12T18:00:00Z"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let offer_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/offers/{offer_id}/accept"),
            Some(&shipper),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = body_json(response).await;
    let trip_id = outcome["trip"]["id"].as_str().unwrap().to_string();

    (shipper, carrier, load_id, trip_id)
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(request("GET", "/health", None, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["users"], 0);
    assert_eq!(body["loads"], 0);
    assert_eq!(body["offers"], 0);
    assert_eq!(body["trips"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app.oneshot(request("GET", "/metrics", None, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("loads_published_total"));
    assert!(body.contains("trips_completed_total"));
}

#[tokio::test]
async fn register_returns_user_and_token() {
    let app = setup();
    let response = app
        .oneshot(request(
            "POST",
            "/users",
            None,
            Some(json!({
                "name": "Ana",
                "email": "ana@example.com",
                "company_name": "Ana Transportes",
                "country": "pt",
                "role": "CARRIER"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["user"]["name"], "Ana");
    assert_eq!(body["user"]["country"], "PT");
    assert_eq!(body["user"]["role"], "CARRIER");
    assert_eq!(body["user"]["completed_trips"], 0);
    assert!(!body["token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let app = setup();
    register(&app, "dup", "SHIPPER").await;

    let response = app
        .oneshot(request(
            "POST",
            "/users",
            None,
            Some(json!({
                "name": "Other",
                "email": "dup@example.com",
                "country": "PT",
                "role": "SHIPPER"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn missing_token_returns_401() {
    let app = setup();
    let response = app
        .oneshot(request("POST", "/loads", None, Some(sample_load())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn shippers_cannot_register_vehicles() {
    let app = setup();
    let (_id, shipper) = register(&app, "novan", "SHIPPER").await;

    let response = app
        .oneshot(request(
            "POST",
            "/vehicles",
            Some(&shipper),
            Some(json!({ "plate": "XX-11-YY", "vehicle_type": "VAN", "capacity_kg": 3500.0 })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn quote_matches_reference_route() {
    let app = setup();
    let response = app
        .oneshot(request(
            "POST",
            "/pricing/quote",
            None,
            Some(json!({
                "distance_km": 800.0,
                "weight_kg": 5000.0,
                "load_type": "GENERAL",
                "origin_country": "PT",
                "dest_country": "ES"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["breakdown"]["subtotal"], "935.00");
    assert_eq!(body["breakdown"]["platform_fee"], "93.50");
    assert_eq!(body["breakdown"]["vat_rate"], "0.23");
    assert_eq!(body["breakdown"]["vat_amount"], "215.05");
    assert_eq!(body["breakdown"]["total"], "1243.55");
    assert_eq!(body["breakdown"]["currency"], "EUR");
    assert_eq!(body["range"]["min_price"], "794.75");
    assert_eq!(body["range"]["suggested_price"], "935.00");
    assert_eq!(body["range"]["max_price"], "1028.50");
}

#[tokio::test]
async fn quote_rejects_negative_distance() {
    let app = setup();
    let response = app
        .oneshot(request(
            "POST",
            "/pricing/quote",
            None,
            Some(json!({
                "distance_km": -10.0,
                "weight_kg": 100.0,
                "load_type": "GENERAL",
                "origin_country": "PT",
                "dest_country": "PT"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn get_nonexistent_load_returns_404() {
    let app = setup();
    let response = app
        .oneshot(request(
            "GET",
            "/loads/00000000-0000-0000-0000-000000000000",
            None,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn full_marketplace_flow() {
    let app = setup();
    let (_shipper_id, shipper) = register(&app, "flow-shipper", "SHIPPER").await;
    let (carrier_a_id, carrier_a) = register(&app, "flow-carrier-a", "CARRIER").await;
    let (_carrier_b_id, carrier_b) = register(&app, "flow-carrier-b", "CARRIER").await;
    let (_carrier_c_id, carrier_c) = register(&app, "flow-carrier-c", "CARRIER").await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/vehicles",
            Some(&carrier_a),
            Some(json!({ "plate": "AB-12-CD", "vehicle_type": "SEMI_TRAILER", "capacity_kg": 24000.0 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(request("POST", "/loads", Some(&shipper), Some(sample_load())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let load = body_json(response).await;
    let load_id = load["id"].as_str().unwrap().to_string();
    assert_eq!(load["status"], "DRAFT");
    assert_eq!(load["suggested_price"], "935.00");

    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/loads/{load_id}/publish"),
            Some(&shipper),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let published = body_json(response).await;
    assert_eq!(published["status"], "PUBLISHED");
    assert!(!published["expires_at"].is_null());

    // Three carriers bid; the cheapest one wins.
    let mut accepted_offer_id = String::new();
    for (token, price) in [(&carrier_b, "700.00"), (&carrier_a, "650.00"), (&carrier_c, "680.00")] {
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/offers",
                Some(token),
                Some(json!({
                    "load_id": load_id,
                    "price": price,
                    "estimated_pickup": "2027-01-10T08:00:00Z",
                    "estimated_delivery": "2027-01-12T18:00:00Z"
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let offer = body_json(response).await;
        if price == "650.00" {
            accepted_offer_id = offer["id"].as_str().unwrap().to_string();
        }
    }

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/loads/{load_id}/offers"),
            Some(&shipper),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let offers = body_json(response).await;
    let prices: Vec<&str> = offers
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["price"].as_str().unwrap())
        .collect();
    assert_eq!(prices, vec!["650.00", "680.00", "700.00"]);

    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/offers/{accepted_offer_id}/accept"),
            Some(&shipper),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = body_json(response).await;
    assert_eq!(outcome["offer"]["status"], "ACCEPTED");
    assert_eq!(outcome["rejected_offers"], 2);
    assert_eq!(outcome["trip"]["status"], "SCHEDULED");
    assert_eq!(outcome["trip"]["carrier_id"], carrier_a_id.as_str());
    let trip_id = outcome["trip"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request("GET", &format!("/loads/{load_id}"), None, None))
        .await
        .unwrap();
    let load = body_json(response).await;
    assert_eq!(load["status"], "ACCEPTED");
    assert_eq!(load["final_price"], "650.00");

    // The terms are committed, so the listing can no longer be edited.
    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/loads/{load_id}"),
            Some(&shipper),
            Some(sample_load()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/trips/{trip_id}/start"),
            Some(&carrier_a),
            Some(json!({ "position": { "lat": 38.7223, "lng": -9.1393 } })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let trip = body_json(response).await;
    assert_eq!(trip["status"], "IN_PROGRESS");

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/trips/{trip_id}/location"),
            Some(&carrier_a),
            Some(json!({ "lat": 39.5, "lng": -7.9, "speed": 85.0 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/trips/{trip_id}/locations?limit=10"),
            Some(&shipper),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let pings = body_json(response).await;
    assert_eq!(pings.as_array().unwrap().len(), 2);
    assert_eq!(pings[0]["position"]["lat"], 39.5);

    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/trips/{trip_id}/complete"),
            Some(&carrier_a),
            Some(json!({ "pod_signature": "J. Silva" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let trip = body_json(response).await;
    assert_eq!(trip["status"], "COMPLETED");

    let response = app
        .clone()
        .oneshot(request("GET", &format!("/loads/{load_id}"), None, None))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["status"], "DELIVERED");

    let response = app
        .clone()
        .oneshot(request("GET", &format!("/users/{carrier_a_id}"), None, None))
        .await
        .unwrap();
    let profile = body_json(response).await;
    assert_eq!(profile["completed_trips"], 1);

    // The carrier invoices the shipper for the accepted price plus VAT and fee.
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/invoices",
            Some(&carrier_a),
            Some(json!({ "load_id": load_id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let invoice = body_json(response).await;
    let invoice_id = invoice["id"].as_str().unwrap().to_string();
    assert!(invoice["number"].as_str().unwrap().starts_with("FB"));
    assert_eq!(invoice["subtotal"], "650.00");
    assert_eq!(invoice["vat_amount"], "149.50");
    assert_eq!(invoice["platform_fee"], "65.00");
    assert_eq!(invoice["total"], "864.50");
    assert_eq!(invoice["status"], "ISSUED");

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/invoices/{invoice_id}/pay"),
            Some(&shipper),
            Some(json!({ "method": "card", "token": "tok_visa" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let paid = body_json(response).await;
    assert_eq!(paid["status"], "PAID");
    assert!(!paid["payment_reference"].is_null());

    // Post-delivery rating shows up on the carrier's public profile.
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/ratings",
            Some(&shipper),
            Some(json!({ "to_user_id": carrier_a_id, "load_id": load_id, "score": 5, "comment": "On time" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(request("GET", &format!("/users/{carrier_a_id}"), None, None))
        .await
        .unwrap();
    let profile = body_json(response).await;
    assert_eq!(profile["rating"], 5.0);
    assert_eq!(profile["total_ratings"], 1);
}

#[tokio::test]
async fn resolved_load_is_closed_for_new_offers() {
    let app = setup();
    let (_shipper, _carrier, load_id, _trip_id) = accepted_load(&app, "resolved").await;
    let (_id, late_carrier) = register(&app, "late-carrier", "CARRIER").await;

    let response = app
        .oneshot(request(
            "POST",
            "/offers",
            Some(&late_carrier),
            Some(json!({
                "load_id": load_id,
                "price": "600.00",
                "estimated_pickup": "2027-01-10T08:00:00Z",
                "estimated_delivery": "2027-01-12T18:00:00Z"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn declined_card_leaves_invoice_unpaid() {
    let app = setup();
    let (shipper, carrier, load_id, _trip_id) = accepted_load(&app, "declined").await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/invoices",
            Some(&carrier),
            Some(json!({ "load_id": load_id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let invoice_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/invoices/{invoice_id}/pay"),
            Some(&shipper),
            Some(json!({ "method": "card", "token": "tok_card_declined" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "payment_declined");

    let response = app
        .oneshot(request(
            "GET",
            &format!("/invoices/{invoice_id}"),
            Some(&shipper),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["status"], "ISSUED");
}

#[tokio::test]
async fn only_the_assigned_carrier_reports_positions() {
    let app = setup();
    let (shipper, carrier, _load_id, trip_id) = accepted_load(&app, "positions").await;

    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/trips/{trip_id}/start"),
            Some(&carrier),
            Some(json!({})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(request(
            "POST",
            &format!("/trips/{trip_id}/location"),
            Some(&shipper),
            Some(json!({ "lat": 40.0, "lng": -8.0 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
