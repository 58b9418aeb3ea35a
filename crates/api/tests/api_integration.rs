//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{CartId, Money, ProductId, Sku, UserId};
use fulfillment::{
    Cart, Collaborators, FulfillmentConfig, InMemoryCartStore, InMemoryCatalog, LogNotifier,
    Product, SimulatedGateway,
};
use inventory::InventoryLedger;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

const USER: u64 = 42;

struct TestApp {
    app: axum::Router,
    carts: InMemoryCartStore,
    gateway: SimulatedGateway,
}

impl TestApp {
    async fn new() -> Self {
        let catalog = InMemoryCatalog::new();
        catalog
            .add_product(Product {
                id: ProductId::new(1),
                name: "Widget".to_string(),
                price: Money::from_cents(1250),
                active: true,
            })
            .await;
        let carts = InMemoryCartStore::new();
        let gateway = SimulatedGateway::new();
        let collaborators = Collaborators {
            catalog: Arc::new(catalog),
            carts: Arc::new(carts.clone()),
            gateway: Arc::new(gateway.clone()),
            notifier: Arc::new(LogNotifier),
        };
        let state = api::create_state(
            InventoryLedger::default(),
            collaborators,
            FulfillmentConfig::default(),
        );
        Self {
            app: api::create_app(state, get_metrics_handle()),
            carts,
            gateway,
        }
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", USER.to_string());
        let body = match body {
            Some(body) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_string(&body).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// One warehouse holding `quantity` widgets.
    async fn stock_widgets(&self, quantity: u32) -> u64 {
        let (status, warehouse) = self
            .send(
                "POST",
                "/warehouses",
                Some(json!({ "code": "MAIN", "name": "Main warehouse" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let warehouse_id = warehouse["id"].as_u64().unwrap();

        let (status, _) = self
            .send(
                "POST",
                "/inventory/stock",
                Some(json!({ "warehouse_id": warehouse_id, "product_id": 1, "quantity": quantity })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        warehouse_id
    }

    async fn place_order(&self, cart: u64, quantity: u32) -> (StatusCode, Value) {
        self.carts
            .put(
                Cart::new(CartId::new(cart), UserId::new(USER))
                    .with_item(Sku::product(ProductId::new(1)), quantity),
            )
            .await;
        self.send("POST", "/orders", Some(json!({ "cart_id": cart })))
            .await
    }

    async fn available(&self) -> u64 {
        let (_, stock) = self.send("GET", "/inventory/1", None).await;
        stock["total_available"].as_u64().unwrap()
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().await;

    let (status, json) = app.send("GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_missing_user_header_is_unauthorized() {
    let app = TestApp::new().await;

    let response = app
        .app
        .clone()
        .oneshot(Request::builder().uri("/orders/1").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_place_and_get_order() {
    let app = TestApp::new().await;
    app.stock_widgets(10).await;

    let (status, order) = app.place_order(1, 3).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "PLACED");
    assert_eq!(order["totals"]["total"], 3750);
    assert_eq!(app.available().await, 7);

    let id = order["id"].as_u64().unwrap();
    let (status, fetched) = app.send("GET", &format!("/orders/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["order_number"], order["order_number"]);

    let (status, list) = app.send("GET", "/orders?status=PLACED", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_insufficient_stock_is_bad_request() {
    let app = TestApp::new().await;
    app.stock_widgets(2).await;

    let (status, body) = app.place_order(1, 3).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Insufficient"));
    assert_eq!(app.available().await, 2);
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let app = TestApp::new().await;

    let (status, body) = app.send("GET", "/orders/999", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_cancel_then_deliver_is_conflict() {
    let app = TestApp::new().await;
    app.stock_widgets(10).await;
    let (_, order) = app.place_order(1, 4).await;
    let id = order["id"].as_u64().unwrap();

    let (status, cancelled) = app
        .send(
            "POST",
            &format!("/orders/{id}/cancel"),
            Some(json!({ "reason": "Changed my mind" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");
    assert_eq!(app.available().await, 10);

    let (status, _) = app
        .send(
            "POST",
            &format!("/orders/{id}/status"),
            Some(json!({ "status": "DELIVERED" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_payment_shipment_and_delivery() {
    let app = TestApp::new().await;
    app.stock_widgets(10).await;
    let (_, order) = app.place_order(1, 2).await;
    let id = order["id"].as_u64().unwrap();

    let (status, payment) = app
        .send(
            "POST",
            &format!("/orders/{id}/payments"),
            Some(json!({ "method": "CREDIT_CARD" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payment["status"], "PENDING");
    let reference = payment["reference"].as_str().unwrap().to_string();

    let (status, processed) = app
        .send("POST", &format!("/payments/{reference}/process"), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(processed["status"], "COMPLETED");

    let (status, shipment) = app
        .send(
            "POST",
            &format!("/orders/{id}/shipments"),
            Some(json!({ "carrier": "UPS", "method": "express" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let shipment_id = shipment["id"].as_u64().unwrap();

    for next in ["SHIPPED", "IN_TRANSIT", "DELIVERED"] {
        let (status, updated) = app
            .send(
                "POST",
                &format!("/shipments/{shipment_id}/status"),
                Some(json!({ "status": next })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], next);
    }

    let (_, delivered) = app.send("GET", &format!("/orders/{id}"), None).await;
    assert_eq!(delivered["status"], "DELIVERED");
    assert_eq!(delivered["inventory_committed"], true);

    let (_, stock) = app.send("GET", "/inventory/1", None).await;
    assert_eq!(stock["total_on_hand"], 8);
    assert_eq!(stock["total_available"], 8);
}

#[tokio::test]
async fn test_declined_payment_and_refund_errors() {
    let app = TestApp::new().await;
    app.stock_widgets(10).await;
    let (_, order) = app.place_order(1, 1).await;
    let id = order["id"].as_u64().unwrap();

    app.gateway.set_decline_charges(true).await;
    let (_, payment) = app
        .send(
            "POST",
            &format!("/orders/{id}/payments"),
            Some(json!({ "method": "PAYPAL" })),
        )
        .await;
    let reference = payment["reference"].as_str().unwrap().to_string();
    let (status, processed) = app
        .send("POST", &format!("/payments/{reference}/process"), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(processed["status"], "FAILED");
    assert_eq!(app.available().await, 9);

    let payment_id = processed["id"].as_u64().unwrap();
    let (status, _) = app
        .send(
            "POST",
            &format!("/payments/{payment_id}/refund"),
            Some(json!({ "amount_cents": 100, "reason": "Oops" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_refund_gateway_failure_is_bad_gateway() {
    let app = TestApp::new().await;
    app.stock_widgets(10).await;
    let (_, order) = app.place_order(1, 1).await;
    let id = order["id"].as_u64().unwrap();
    let (_, payment) = app
        .send(
            "POST",
            &format!("/orders/{id}/payments"),
            Some(json!({ "method": "STRIPE" })),
        )
        .await;
    let reference = payment["reference"].as_str().unwrap().to_string();
    let (_, processed) = app
        .send("POST", &format!("/payments/{reference}/process"), Some(json!({})))
        .await;
    let payment_id = processed["id"].as_u64().unwrap();

    let (status, _) = app
        .send(
            "POST",
            &format!("/payments/{payment_id}/refund"),
            Some(json!({ "amount_cents": 5000, "reason": "Too much" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.gateway.set_fail_refunds(true).await;
    let (status, _) = app
        .send(
            "POST",
            &format!("/payments/{payment_id}/refund"),
            Some(json!({ "amount_cents": 1250, "reason": "Damaged" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    app.gateway.set_fail_refunds(false).await;
    let (status, refunded) = app
        .send(
            "POST",
            &format!("/payments/{payment_id}/refund"),
            Some(json!({ "amount_cents": 1250, "reason": "Damaged" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refunded["status"], "REFUNDED");

    let (_, order) = app.send("GET", &format!("/orders/{id}"), None).await;
    assert_eq!(order["status"], "REFUNDED");
    assert_eq!(app.available().await, 10);
}

#[tokio::test]
async fn test_adjust_and_transfer_stock() {
    let app = TestApp::new().await;
    let main = app.stock_widgets(10).await;
    let (_, backup) = app
        .send(
            "POST",
            "/warehouses",
            Some(json!({ "code": "BACKUP", "name": "Backup warehouse" })),
        )
        .await;
    let backup = backup["id"].as_u64().unwrap();

    let (status, record) = app
        .send(
            "POST",
            "/inventory/adjust",
            Some(json!({
                "warehouse_id": main,
                "product_id": 1,
                "transaction_type": "DAMAGE",
                "quantity": 2,
                "reason": "Dropped pallet"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["quantity_on_hand"], 8);

    let (status, transfer) = app
        .send(
            "POST",
            "/inventory/transfer",
            Some(json!({
                "from_warehouse_id": main,
                "to_warehouse_id": backup,
                "product_id": 1,
                "quantity": 3
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(transfer["source"]["quantity_on_hand"], 5);
    assert_eq!(transfer["destination"]["quantity_on_hand"], 3);

    let (_, stock) = app.send("GET", "/inventory/1", None).await;
    assert_eq!(stock["records"].as_array().unwrap().len(), 2);
    assert_eq!(stock["total_on_hand"], 8);

    let (status, _) = app
        .send(
            "POST",
            "/inventory/adjust",
            Some(json!({
                "warehouse_id": main,
                "product_id": 1,
                "transaction_type": "STOCK_OUT",
                "quantity": 50
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::new().await;

    let response = app
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
