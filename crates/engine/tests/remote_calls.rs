use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use funcmesh_api::{InvocationCause, RemoteClient, StubDispatcher, TransportSettings};
use funcmesh_engine::{Binder, CapabilitySlot, Component, RemoteConsumer, RemoteFunction, RemoteProducer, Slot, StubFactory, UntypedFunction};
use funcmesh_util::{EndpointResolver, Properties};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct QuoteRequest {
    sku: String,
    quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Quote {
    sku: String,
    total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct CatalogItem {
    sku: String,
    name: String,
}

#[derive(Clone, Default)]
struct Shop {
    audit_log: Arc<Mutex<Vec<Value>>>,
}

async fn price(headers: HeaderMap, Json(request): Json<QuoteRequest>) -> Result<Json<Quote>, StatusCode> {
    if headers.get("x-capability").and_then(|value| value.to_str().ok()) != Some("pricing") {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(Json(Quote {
        sku: request.sku,
        total: f64::from(request.quantity) * 2.5,
    }))
}

async fn catalog() -> Json<Vec<CatalogItem>> {
    Json(vec![CatalogItem {
        sku: "A1".into(),
        name: "Anvil".into(),
    }])
}

async fn audit(State(shop): State<Shop>, Json(event): Json<Value>) -> (StatusCode, &'static str) {
    shop.audit_log.lock().expect("audit lock").push(event);
    (StatusCode::ACCEPTED, "queued")
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable")
}

async fn overloaded() -> (StatusCode, Json<Quote>) {
    let placeholder = Quote {
        sku: "A1".into(),
        total: 0.0,
    };
    (StatusCode::SERVICE_UNAVAILABLE, Json(placeholder))
}

async fn stock_outage() -> (StatusCode, Json<Value>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "inventory offline"})))
}

async fn start_shop() -> (String, Shop) {
    let shop = Shop::default();
    let router = Router::new()
        .route("/pricing", post(price))
        .route("/catalog", get(catalog))
        .route("/audit", post(audit))
        .route("/ledger", post(broken))
        .route("/status", get(|| async { StatusCode::NO_CONTENT }))
        .route("/surcharge", post(overloaded))
        .route("/stock", get(stock_outage))
        .with_state(shop.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    (format!("http://{address}"), shop)
}

/// Factory pointing every capability at `base` through `functions.<name>.url`.
fn factory_for(base: &str, names: &[&str]) -> StubFactory {
    let properties = Properties::from_pairs(names.iter().map(|name| (format!("functions.{name}.url"), base.to_string())));
    let resolver = EndpointResolver::new(Arc::new(HashMap::<String, String>::new()), Arc::new(properties));
    let client = RemoteClient::new(&TransportSettings::default()).expect("client");
    StubFactory::new(Arc::new(resolver), Arc::new(StubDispatcher::new(client)))
}

struct Storefront {
    pricing: Slot<RemoteFunction<QuoteRequest, Quote>>,
    catalog: Slot<RemoteProducer<Vec<CatalogItem>>>,
    audit: Slot<RemoteConsumer<Value>>,
}

impl Storefront {
    fn new() -> Self {
        Self {
            pricing: Slot::new("pricing"),
            catalog: Slot::new("catalog"),
            audit: Slot::new("audit"),
        }
    }
}

impl Component for Storefront {
    fn capability_slots(&mut self) -> Vec<&mut dyn CapabilitySlot> {
        vec![&mut self.pricing as &mut dyn CapabilitySlot, &mut self.catalog, &mut self.audit]
    }
}

#[tokio::test]
async fn bound_component_reaches_every_capability() {
    let (base, shop) = start_shop().await;
    let binder = Binder::new(factory_for(&base, &["pricing", "catalog", "audit"]));
    let mut storefront = Storefront::new();
    binder.bind(&mut storefront).expect("bind");

    let request = QuoteRequest {
        sku: "A1".into(),
        quantity: 4,
    };
    let quote = storefront.pricing.stub().unwrap().call(&request).await.expect("pricing call");
    assert_eq!(
        quote,
        Some(Quote {
            sku: "A1".into(),
            total: 10.0
        })
    );

    let items = storefront.catalog.stub().unwrap().get().await.expect("catalog call").expect("catalog body");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Anvil");

    storefront.audit.stub().unwrap().accept(&json!({"event": "quoted"})).await.expect("audit call");
    assert_eq!(*shop.audit_log.lock().unwrap(), vec![json!({"event": "quoted"})]);
}

#[tokio::test]
async fn cloned_stubs_run_concurrently() {
    let (base, _) = start_shop().await;
    let pricing: RemoteFunction<QuoteRequest, Quote> = factory_for(&base, &["pricing"]).make_stub("pricing");
    let other = pricing.clone();

    let first = QuoteRequest {
        sku: "A1".into(),
        quantity: 1,
    };
    let second = QuoteRequest {
        sku: "B2".into(),
        quantity: 2,
    };
    let (a, b) = tokio::join!(pricing.call(&first), other.call(&second));
    assert_eq!(a.unwrap().map(|quote| quote.total), Some(2.5));
    assert_eq!(b.unwrap().map(|quote| quote.sku), Some("B2".to_string()));
}

#[tokio::test]
async fn consumer_failure_names_the_capability() {
    let (base, _) = start_shop().await;
    let ledger: RemoteConsumer<Value> = factory_for(&base, &["ledger"]).make_stub("ledger");

    let error = ledger.accept(&json!({"amount": 5})).await.unwrap_err();
    assert_eq!(error.capability, "ledger");
    assert!(matches!(error.cause, InvocationCause::RemoteStatus { status: 500, .. }));
    assert!(error.to_string().contains("ledger"));
}

#[tokio::test]
async fn function_error_status_fails_even_when_body_decodes() {
    let (base, _) = start_shop().await;
    let surcharge: RemoteFunction<QuoteRequest, Quote> = factory_for(&base, &["surcharge"]).make_stub("surcharge");

    let request = QuoteRequest {
        sku: "A1".into(),
        quantity: 1,
    };
    let error = surcharge.call(&request).await.unwrap_err();
    assert_eq!(error.capability, "surcharge");
    assert_eq!(error.status(), Some(503));
}

#[tokio::test]
async fn producer_error_status_carries_the_error_document() {
    let (base, _) = start_shop().await;
    let stock: RemoteProducer<Value> = factory_for(&base, &["stock"]).make_stub("stock");

    let error = stock.get().await.unwrap_err();
    match error.cause {
        InvocationCause::RemoteStatus { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, Some(json!({"error": "inventory offline"})));
        }
        other => panic!("unexpected cause: {other:?}"),
    }
}

#[tokio::test]
async fn no_content_producer_returns_none() {
    let (base, _) = start_shop().await;
    let status: RemoteProducer<Value> = factory_for(&base, &["status"]).make_stub("status");
    assert_eq!(status.get().await.expect("status call"), None);
}

#[tokio::test]
async fn untyped_function_decodes_generic_json() {
    let (base, _) = start_shop().await;
    let pricing: UntypedFunction = factory_for(&base, &["pricing"]).make_stub("pricing");

    let reply = pricing.call(&json!({"sku": "C3", "quantity": 2})).await.expect("pricing call");
    assert_eq!(reply, Some(json!({"sku": "C3", "total": 5.0})));
}

#[tokio::test]
async fn rebinding_keeps_calls_working() {
    let (base, _) = start_shop().await;
    let binder = Binder::new(factory_for(&base, &["pricing", "catalog", "audit"]));
    let mut storefront = Storefront::new();
    binder.bind(&mut storefront).expect("first bind");
    let report = binder.bind(&mut storefront).expect("second bind");
    assert_eq!(report.len(), 3);

    let items = storefront.catalog.stub().unwrap().get().await.expect("catalog call");
    assert!(items.is_some());
}
