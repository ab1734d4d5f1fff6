use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use delivery_dispatch::api::rest::router;
use delivery_dispatch::error::AppError;
use delivery_dispatch::external::{
    Collaborators, FileStorage, InMemoryLocations, InMemoryOrders, LocalFileStorage,
    MerchantLocation, OrderRef, ProofFile,
};
use delivery_dispatch::geo::{offset_north, GeoPoint};
use delivery_dispatch::state::{AppState, DispatchSettings};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const CENTER: GeoPoint = GeoPoint { lat: 6.5, lng: 3.3 };

struct TestApp {
    app: Router,
    orders: Arc<InMemoryOrders>,
    locations: Arc<InMemoryLocations>,
}

struct UnreachableStorage;

#[async_trait]
impl FileStorage for UnreachableStorage {
    async fn store(
        &self,
        _delivery_id: Uuid,
        _file: ProofFile,
    ) -> Result<Option<String>, AppError> {
        Err(AppError::Storage("bucket unreachable".to_string()))
    }
}

impl TestApp {
    fn new() -> Self {
        Self::with_storage(Arc::new(LocalFileStorage::unconfigured()))
    }

    fn with_storage(storage: Arc<dyn FileStorage>) -> Self {
        let orders = Arc::new(InMemoryOrders::new());
        let locations = Arc::new(InMemoryLocations::new());
        let state = AppState::new(
            DispatchSettings::default(),
            Collaborators {
                orders: orders.clone(),
                locations: locations.clone(),
                storage,
            },
        );

        Self {
            app: router(Arc::new(state)),
            orders,
            locations,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    /// Zone of radius 5 km at 500 + 50/km with one merchant at its center.
    async fn zone_with_merchant(&self) -> (Uuid, Uuid) {
        let (status, zone) = self
            .send(json_request(
                "POST",
                "/zones",
                json!({
                    "name": "Ikeja",
                    "center": { "lat": CENTER.lat, "lng": CENTER.lng },
                    "radius_km": 5.0,
                    "base_fee": 500,
                    "fee_per_km": 50
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let zone_id: Uuid = zone["id"].as_str().unwrap().parse().unwrap();

        let merchant = Uuid::new_v4();
        self.locations.upsert(MerchantLocation {
            id: merchant,
            address: "12 Awolowo Way".to_string(),
            coordinates: Some(CENTER),
            currency: "NGN".to_string(),
        });
        let (status, _) = self
            .send(json_request(
                "PUT",
                &format!("/merchants/{merchant}/zone"),
                json!({ "zone_id": zone_id }),
            ))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        (zone_id, merchant)
    }

    fn order_for(&self, merchant: Uuid) -> Uuid {
        let order_id = Uuid::new_v4();
        self.orders.insert(OrderRef {
            order_id,
            merchant_location_id: merchant,
            public_id: "ORD-1001".to_string(),
        });
        order_id
    }

    async fn create_delivery(&self, merchant: Uuid, km: f64) -> (StatusCode, Value) {
        let order_id = self.order_for(merchant);
        self.send(json_request("POST", "/deliveries", delivery_body(order_id, merchant, km)))
            .await
    }

    /// Pending delivery 2 km out, claimed by a fresh approved courier.
    async fn claimed_delivery(&self) -> (Uuid, String) {
        let (zone_id, merchant) = self.zone_with_merchant().await;
        let courier = self.approved_courier(zone_id).await;
        let (_, delivery) = self.create_delivery(merchant, 2.0).await;
        let delivery_id = delivery["id"].as_str().unwrap().to_string();

        let (status, _) = self
            .send(courier_request(
                "POST",
                &format!("/courier/deliveries/{delivery_id}/claim"),
                courier,
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        (courier, delivery_id)
    }

    async fn courier_view(&self, courier: Uuid, delivery_id: &str) -> Value {
        let (status, body) = self
            .send(courier_request(
                "GET",
                &format!("/courier/deliveries/{delivery_id}"),
                courier,
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    async fn approved_courier(&self, zone_id: Uuid) -> Uuid {
        let (status, courier) = self
            .send(json_request(
                "POST",
                "/couriers",
                json!({ "name": "Tunde", "zone_id": zone_id }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(courier["verification"], "PENDING");
        let id: Uuid = courier["id"].as_str().unwrap().parse().unwrap();

        let (status, courier) = self
            .send(json_request(
                "PATCH",
                &format!("/couriers/{id}/verification"),
                json!({ "verification": "APPROVED" }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(courier["verification"], "APPROVED");
        id
    }
}

fn delivery_body(order_id: Uuid, merchant: Uuid, km: f64) -> Value {
    let destination = offset_north(&CENTER, km);
    json!({
        "source_order_id": order_id,
        "merchant_location_id": merchant,
        "destination_address": "7 Isaac John Street",
        "destination": { "lat": destination.lat, "lng": destination.lng }
    })
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn courier_request(method: &str, uri: &str, courier: Uuid, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-courier-id", courier.to_string());
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn health_returns_ok() {
    let test = TestApp::new();
    let (status, body) = test.send(get_request("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["zones"], 0);
    assert_eq!(body["couriers"], 0);
    assert_eq!(body["deliveries"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let test = TestApp::new();
    let response = test.app.clone().oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains("claim_conflicts_total"));
}

#[tokio::test]
async fn create_zone_rejects_non_positive_radius() {
    let test = TestApp::new();
    let (status, body) = test
        .send(json_request(
            "POST",
            "/zones",
            json!({
                "name": "Lekki",
                "center": { "lat": 6.44, "lng": 3.47 },
                "radius_km": 0,
                "base_fee": 500,
                "fee_per_km": 50
            }),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("radius"));
}

#[tokio::test]
async fn get_unknown_zone_returns_not_found() {
    let test = TestApp::new();
    let (status, body) = test
        .send(get_request(&format!("/zones/{}", Uuid::new_v4())))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn create_delivery_prices_by_distance() {
    let test = TestApp::new();
    let (zone_id, merchant) = test.zone_with_merchant().await;

    let (status, body) = test.create_delivery(merchant, 3.0).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["fee"].as_f64(), Some(650.0));
    assert_eq!(body["currency"], "NGN");
    assert_eq!(body["zone_id"], zone_id.to_string());
    assert!(body["courier_id"].is_null());
    assert_eq!(body["version"], 0);
}

#[tokio::test]
async fn create_delivery_outside_zone_is_rejected() {
    let test = TestApp::new();
    let (_, merchant) = test.zone_with_merchant().await;

    let (status, body) = test.create_delivery(merchant, 7.0).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("outside delivery zone"));
    assert!(message.contains("7.00 km"));
}

#[tokio::test]
async fn duplicate_delivery_for_order_conflicts() {
    let test = TestApp::new();
    let (_, merchant) = test.zone_with_merchant().await;
    let order_id = test.order_for(merchant);

    let (first, _) = test
        .send(json_request("POST", "/deliveries", delivery_body(order_id, merchant, 1.0)))
        .await;
    let (second, body) = test
        .send(json_request("POST", "/deliveries", delivery_body(order_id, merchant, 1.0)))
        .await;

    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("duplicate"));
}

#[tokio::test]
async fn unknown_order_returns_not_found() {
    let test = TestApp::new();
    let (_, merchant) = test.zone_with_merchant().await;

    let (status, _) = test
        .send(json_request(
            "POST",
            "/deliveries",
            delivery_body(Uuid::new_v4(), merchant, 1.0),
        ))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn courier_runs_delivery_from_pool_to_doorstep() {
    let test = TestApp::new();
    let (zone_id, merchant) = test.zone_with_merchant().await;
    let courier = test.approved_courier(zone_id).await;
    let (_, delivery) = test.create_delivery(merchant, 2.0).await;
    let delivery_id = delivery["id"].as_str().unwrap().to_string();

    let (status, _) = test
        .send(courier_request(
            "PUT",
            "/courier/location",
            courier,
            Some(json!({ "lat": CENTER.lat, "lng": CENTER.lng })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, pool) = test
        .send(courier_request(
            "GET",
            "/courier/deliveries/available",
            courier,
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pool.as_array().unwrap().len(), 1);
    assert_eq!(pool[0]["id"], delivery_id.as_str());
    assert_eq!(pool[0]["pickup_distance_km"].as_f64(), Some(0.0));

    let (status, claimed) = test
        .send(courier_request(
            "POST",
            &format!("/courier/deliveries/{delivery_id}/claim"),
            courier,
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(claimed["status"], "ASSIGNED");
    assert_eq!(claimed["courier_id"], courier.to_string());

    let (status, started) = test
        .send(courier_request(
            "POST",
            &format!("/courier/deliveries/{delivery_id}/start"),
            courier,
            Some(json!({ "picked_up": true })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["status"], "PICKED_UP");

    let (status, completed) = test
        .send(courier_request(
            "POST",
            &format!("/courier/deliveries/{delivery_id}/complete"),
            courier,
            Some(json!({ "proof": { "kind": "signature", "payload": "data:image/png;base64,AA==" } })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "DELIVERED");
    assert!(completed["courier_id"].is_null());
    assert_eq!(completed["delivered_by"], courier.to_string());

    let (_, profile) = test.send(get_request(&format!("/couriers/{courier}"))).await;
    assert_eq!(profile["available"], true);

    let (status, history) = test
        .send(get_request(&format!("/deliveries/{delivery_id}/tracking")))
        .await;
    assert_eq!(status, StatusCode::OK);
    let statuses: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|event| event["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["PENDING", "ASSIGNED", "PICKED_UP", "DELIVERED"]);
}

#[tokio::test]
async fn second_claim_conflicts_and_stranger_sees_not_found() {
    let test = TestApp::new();
    let (zone_id, merchant) = test.zone_with_merchant().await;
    let first = test.approved_courier(zone_id).await;
    let second = test.approved_courier(zone_id).await;
    let (_, delivery) = test.create_delivery(merchant, 2.0).await;
    let delivery_id = delivery["id"].as_str().unwrap().to_string();
    let claim_uri = format!("/courier/deliveries/{delivery_id}/claim");

    let (status, _) = test
        .send(courier_request("POST", &claim_uri, first, None))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = test
        .send(courier_request("POST", &claim_uri, second, None))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already claimed"));

    let (status, _) = test
        .send(courier_request(
            "GET",
            &format!("/courier/deliveries/{delivery_id}"),
            second,
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reject_returns_delivery_to_pending() {
    let test = TestApp::new();
    let (zone_id, merchant) = test.zone_with_merchant().await;
    let courier = test.approved_courier(zone_id).await;
    let (_, delivery) = test.create_delivery(merchant, 2.0).await;
    let delivery_id = delivery["id"].as_str().unwrap().to_string();

    test.send(courier_request(
        "POST",
        &format!("/courier/deliveries/{delivery_id}/claim"),
        courier,
        None,
    ))
    .await;
    let (status, rejected) = test
        .send(courier_request(
            "POST",
            &format!("/courier/deliveries/{delivery_id}/reject"),
            courier,
            None,
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "PENDING");
    assert!(rejected["courier_id"].is_null());

    let (_, pending) = test
        .send(get_request(&format!(
            "/merchants/{merchant}/deliveries?status=PENDING"
        )))
        .await;
    assert_eq!(pending.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn complete_before_pickup_is_a_conflict() {
    let test = TestApp::new();
    let (zone_id, merchant) = test.zone_with_merchant().await;
    let courier = test.approved_courier(zone_id).await;
    let (_, delivery) = test.create_delivery(merchant, 2.0).await;
    let delivery_id = delivery["id"].as_str().unwrap().to_string();

    test.send(courier_request(
        "POST",
        &format!("/courier/deliveries/{delivery_id}/claim"),
        courier,
        None,
    ))
    .await;
    let (status, body) = test
        .send(courier_request(
            "POST",
            &format!("/courier/deliveries/{delivery_id}/complete"),
            courier,
            None,
        ))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("ASSIGNED"));
}

#[tokio::test]
async fn courier_endpoints_require_identity_header() {
    let test = TestApp::new();
    let (status, body) = test.send(get_request("/courier/deliveries")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("x-courier-id"));
}

#[tokio::test]
async fn failed_delivery_can_be_rescheduled() {
    let test = TestApp::new();
    let (zone_id, merchant) = test.zone_with_merchant().await;
    let courier = test.approved_courier(zone_id).await;
    let (_, delivery) = test.create_delivery(merchant, 2.0).await;
    let delivery_id = delivery["id"].as_str().unwrap().to_string();

    let (status, _) = test
        .send(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/assign"),
            json!({ "courier_id": courier }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, failed) = test
        .send(courier_request(
            "POST",
            &format!("/courier/deliveries/{delivery_id}/fail"),
            courier,
            Some(json!({ "reason": "customer unreachable" })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(failed["status"], "FAILED");
    assert_eq!(failed["failure_reason"], "customer unreachable");

    let (status, reopened) = test
        .send(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/reschedule"),
            json!({}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reopened["status"], "PENDING");
    assert!(reopened["failure_reason"].is_null());
}

#[tokio::test]
async fn malformed_start_body_is_rejected() {
    let test = TestApp::new();
    let (courier, delivery_id) = test.claimed_delivery().await;

    let (status, body) = test
        .send(courier_request(
            "POST",
            &format!("/courier/deliveries/{delivery_id}/start"),
            courier,
            Some(json!({ "picked_up": "no" })),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid request body"));
    assert_eq!(test.courier_view(courier, &delivery_id).await["status"], "ASSIGNED");
}

#[tokio::test]
async fn start_without_body_defaults_to_picked_up() {
    let test = TestApp::new();
    let (courier, delivery_id) = test.claimed_delivery().await;

    let (status, started) = test
        .send(courier_request(
            "POST",
            &format!("/courier/deliveries/{delivery_id}/start"),
            courier,
            None,
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["status"], "PICKED_UP");
}

#[tokio::test]
async fn complete_with_unknown_proof_kind_is_rejected() {
    let test = TestApp::new();
    let (courier, delivery_id) = test.claimed_delivery().await;
    test.send(courier_request(
        "POST",
        &format!("/courier/deliveries/{delivery_id}/start"),
        courier,
        Some(json!({ "picked_up": true })),
    ))
    .await;

    let (status, _) = test
        .send(courier_request(
            "POST",
            &format!("/courier/deliveries/{delivery_id}/complete"),
            courier,
            Some(json!({ "proof": { "kind": "selfie", "payload": "data:image/png;base64,AA==" } })),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(test.courier_view(courier, &delivery_id).await["status"], "PICKED_UP");
}

#[tokio::test]
async fn reschedule_with_invalid_time_is_rejected() {
    let test = TestApp::new();
    let (courier, delivery_id) = test.claimed_delivery().await;
    test.send(courier_request(
        "POST",
        &format!("/courier/deliveries/{delivery_id}/fail"),
        courier,
        Some(json!({ "reason": "gate locked" })),
    ))
    .await;

    let (status, _) = test
        .send(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/reschedule"),
            json!({ "scheduled_at": "tomorrow morning" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, reopened) = test
        .send(
            Request::builder()
                .method("POST")
                .uri(format!("/deliveries/{delivery_id}/reschedule"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reopened["status"], "PENDING");
}

#[tokio::test]
async fn proof_upload_storage_failure_is_service_unavailable() {
    let test = TestApp::with_storage(Arc::new(UnreachableStorage));
    let (courier, delivery_id) = test.claimed_delivery().await;
    test.send(courier_request(
        "POST",
        &format!("/courier/deliveries/{delivery_id}/start"),
        courier,
        None,
    ))
    .await;

    let (status, body) = test
        .send(
            Request::builder()
                .method("POST")
                .uri(format!(
                    "/courier/deliveries/{delivery_id}/proof?kind=photo&filename=door.jpg"
                ))
                .header("x-courier-id", courier.to_string())
                .header("content-type", "application/octet-stream")
                .body(Body::from(vec![0xff_u8, 0xd8, 0xff]))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("bucket unreachable"));
}
