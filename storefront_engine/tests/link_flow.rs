//! End-to-end reconciliation tests for the payment-link lifecycle, run against a throwaway SQLite database and a
//! scripted gateway.

use chrono::{Duration, Utc};
use spg_common::Money;
use storefront_engine::{
    api::objects::{LinkSettings, PaymentLinkRequest},
    db_types::{LinkStatus, NewPaymentLink, NewProduct, OrderType, PaymentStatus, Product, Reference},
    events::EventProducers,
    test_utils::{prepare_test_env, random_db_path, MockGateway},
    traits::{GatewayError, LinkQueryFilter, PaymentOutcome, PaymentVerification, StoreDatabase},
    LinkFlowApi,
    LinkFlowError,
    SqliteDatabase,
};

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database")
}

fn new_api(db: SqliteDatabase, gateway: MockGateway) -> LinkFlowApi<SqliteDatabase, MockGateway> {
    LinkFlowApi::new(db, gateway, EventProducers::default(), LinkSettings::default())
}

async fn seed_product(db: &SqliteDatabase, price_naira: i64, quantity: i64) -> Product {
    db.insert_product(NewProduct {
        name: "Aso-oke throw pillow".to_string(),
        price: Money::from_naira(price_naira),
        quantity,
        badge: None,
        image: Some("/img/pillow.jpg".to_string()),
    })
    .await
    .expect("Error seeding product")
}

#[tokio::test]
async fn creating_a_product_link_resolves_the_amount_from_the_catalog() {
    let db = new_db().await;
    let gateway = MockGateway::new();
    let product = seed_product(&db, 5000, 10).await;
    let api = new_api(db, gateway.clone());

    let req = PaymentLinkRequest { product_id: Some(product.id), quantity: 2, ..Default::default() };
    let before = Utc::now();
    let link = api.create_payment_link(req).await.expect("Link creation failed");

    assert_eq!(link.amount, Money::from_naira(10_000));
    assert_eq!(link.status, LinkStatus::Pending);
    assert_eq!(link.quantity, 2);
    assert_eq!(link.product_id, Some(product.id));
    assert!(link.reference.as_str().starts_with("PAY-"));
    assert!(link.authorization_url.contains(link.reference.as_str()));
    // expires_at = created_at + 1440 minutes (the default session timeout)
    let timeout = link.expires_at - before;
    assert!(timeout > Duration::minutes(1439) && timeout < Duration::minutes(1441), "got {timeout}");
    // The gateway saw the same amount we persisted
    let init = gateway.last_init().expect("Gateway was not called");
    assert_eq!(init.amount, Money::from_naira(10_000));
}

#[tokio::test]
async fn gateway_failure_at_creation_persists_nothing() {
    let db = new_db().await;
    let gateway = MockGateway::new();
    gateway.fail_initialization(GatewayError::Unavailable("connection reset".to_string()));
    let api = new_api(db.clone(), gateway);

    let req = PaymentLinkRequest { custom_amount: Some("1200.50".to_string()), ..Default::default() };
    let err = api.create_payment_link(req).await.expect_err("Expected the gateway error to surface");
    assert!(matches!(err, LinkFlowError::GatewayError(GatewayError::Unavailable(_))));
    let links = db.fetch_payment_links(LinkQueryFilter::default()).await.unwrap();
    assert!(links.is_empty(), "No link may be persisted when the gateway call fails");
}

#[tokio::test]
async fn unresolvable_amounts_are_rejected_before_the_gateway_is_called() {
    let db = new_db().await;
    let gateway = MockGateway::new();
    let api = new_api(db, gateway.clone());

    let err = api.create_payment_link(PaymentLinkRequest::default()).await.expect_err("No amount given");
    assert!(matches!(err, LinkFlowError::InvalidAmount(_)));

    let req = PaymentLinkRequest { custom_amount: Some("0.00".to_string()), ..Default::default() };
    let err = api.create_payment_link(req).await.expect_err("Zero is not a valid amount");
    assert!(matches!(err, LinkFlowError::InvalidAmount(_)));

    let req = PaymentLinkRequest { custom_amount: Some("100.00".to_string()), quantity: 0, ..Default::default() };
    let err = api.create_payment_link(req).await.expect_err("Zero quantity is invalid");
    assert!(matches!(err, LinkFlowError::InvalidQuantity(0)));

    let req = PaymentLinkRequest { product_id: Some(999), quantity: 1, ..Default::default() };
    let err = api.create_payment_link(req).await.expect_err("Unknown product");
    assert!(matches!(err, LinkFlowError::ProductNotFound(999)));

    assert_eq!(gateway.init_call_count(), 0);
}

#[tokio::test]
async fn a_successful_verification_derives_an_order_exactly_once() {
    let db = new_db().await;
    let gateway = MockGateway::new();
    let product = seed_product(&db, 5000, 10).await;
    let api = new_api(db.clone(), gateway.clone());

    let req = PaymentLinkRequest { product_id: Some(product.id), quantity: 2, ..Default::default() };
    let link = api.create_payment_link(req).await.unwrap();
    gateway.script_success(&link.reference, link.amount);

    let outcome = api.verify_payment_link(&link.reference).await.expect("Verification failed");
    assert_eq!(outcome.link.status, LinkStatus::Completed);
    assert!(outcome.link.paid_at.is_some());
    assert!(outcome.link.verified_at.is_some());
    let order = outcome.order.expect("An order should have been derived");
    assert_eq!(order.order_type, OrderType::PaymentLink);
    assert_eq!(order.payment_reference, Some(link.reference.clone()));
    assert_eq!(order.total, Money::from_naira(10_000));
    assert_eq!(order.total, order.subtotal + order.shipping);
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    let stock = db.fetch_product(product.id).await.unwrap().unwrap();
    assert_eq!(stock.quantity, 8, "Stock must drop by the link quantity");

    // A duplicate trigger (webhook racing a manual verify, say) is a no-op, not an error.
    let second = api.verify_payment_link(&link.reference).await.expect("Re-verification failed");
    let again = second.order.expect("The existing order is re-affirmed");
    assert_eq!(again.id, order.id, "No second order may be created");
    assert_eq!(again.payment_status, PaymentStatus::Paid);
    let stock = db.fetch_product(product.id).await.unwrap().unwrap();
    assert_eq!(stock.quantity, 8, "Stock must be decremented exactly once");

    // Item prices are frozen from the link amount
    let items = db.fetch_order_items(order.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].unit_price, Money::from_naira(5000));
    assert_eq!(items[0].quantity, 2);
    assert_eq!(items[0].product_id, Some(product.id));
}

#[tokio::test]
async fn a_failure_report_fails_a_pending_link_but_never_downgrades_a_completed_one() {
    let db = new_db().await;
    let gateway = MockGateway::new();
    let api = new_api(db.clone(), gateway.clone());

    let req = PaymentLinkRequest { custom_amount: Some("750.00".to_string()), ..Default::default() };
    let link = api.create_payment_link(req).await.unwrap();

    gateway.script_failure(&link.reference, link.amount);
    let outcome = api.verify_payment_link(&link.reference).await.unwrap();
    assert_eq!(outcome.link.status, LinkStatus::Failed);
    assert!(outcome.order.is_none());

    // The customer retried and the charge went through: a late success always wins.
    gateway.script_success(&link.reference, link.amount);
    let outcome = api.verify_payment_link(&link.reference).await.unwrap();
    assert_eq!(outcome.link.status, LinkStatus::Completed);
    assert!(outcome.order.is_some());

    // ... and from here no failure report can move it.
    gateway.script_failure(&link.reference, link.amount);
    let outcome = api.verify_payment_link(&link.reference).await.unwrap();
    assert_eq!(outcome.link.status, LinkStatus::Completed);
}

#[tokio::test]
async fn gateway_errors_during_verification_leave_the_link_untouched() {
    let db = new_db().await;
    let gateway = MockGateway::new();
    let api = new_api(db.clone(), gateway.clone());

    let req = PaymentLinkRequest { custom_amount: Some("300.00".to_string()), ..Default::default() };
    let link = api.create_payment_link(req).await.unwrap();
    gateway.script_error(&link.reference, GatewayError::Unavailable("timeout".to_string()));

    let err = api.verify_payment_link(&link.reference).await.expect_err("The gateway error must surface");
    assert!(matches!(err, LinkFlowError::GatewayError(GatewayError::Unavailable(_))));
    let stored = db.fetch_payment_link(&link.reference).await.unwrap().unwrap();
    assert_eq!(stored.status, LinkStatus::Pending, "A failed call is not a failed payment");
}

#[tokio::test]
async fn a_mismatched_gateway_reference_is_ignored() {
    let db = new_db().await;
    let gateway = MockGateway::new();
    let api = new_api(db.clone(), gateway.clone());

    let req = PaymentLinkRequest { custom_amount: Some("300.00".to_string()), ..Default::default() };
    let link = api.create_payment_link(req).await.unwrap();
    // Script an answer that talks about some other reference entirely
    let bogus = PaymentVerification {
        reference: Reference("PAY-0-OTHER1".to_string()),
        outcome: PaymentOutcome::Success,
        amount: link.amount,
        paid_at: Some(Utc::now()),
        customer_email: None,
        customer_name: None,
    };
    gateway.script(&link.reference, Ok(bogus));

    let outcome = api.verify_payment_link(&link.reference).await.unwrap();
    assert!(outcome.order.is_none());
    let stored = db.fetch_payment_link(&link.reference).await.unwrap().unwrap();
    assert_eq!(stored.status, LinkStatus::Pending);
}

#[tokio::test]
async fn the_sweep_expires_overdue_links_without_creating_orders() {
    let db = new_db().await;
    let gateway = MockGateway::new();
    let api = new_api(db.clone(), gateway.clone());

    let now = Utc::now();
    let reference = Reference("PAY-1000-EXPIRD".to_string());
    db.insert_payment_link(NewPaymentLink {
        reference: reference.clone(),
        amount: Money::from_naira(400),
        quantity: 1,
        product_id: None,
        description: None,
        customer_email: None,
        customer_name: None,
        authorization_url: "https://checkout.mock/PAY-1000-EXPIRD".to_string(),
        access_code: "ac_x".to_string(),
        created_at: now - Duration::hours(26),
        expires_at: now - Duration::hours(2),
    })
    .await
    .unwrap();

    let result = api.sweep().await.expect("Sweep failed");
    assert_eq!(result.expired_count(), 1);
    assert_eq!(result.expired[0].reference, reference);
    assert_eq!(result.checked, 0, "An expired link is no longer pending, so it is not re-verified");
    assert_eq!(gateway.verify_call_count(), 0);

    let stored = db.fetch_payment_link(&reference).await.unwrap().unwrap();
    assert_eq!(stored.status, LinkStatus::Expired);
    assert!(db.fetch_order_by_payment_reference(&reference).await.unwrap().is_none(), "Expiry must not create orders");
}

#[tokio::test]
async fn the_sweep_reverifies_stale_links_and_tolerates_individual_failures() {
    let db = new_db().await;
    let gateway = MockGateway::new();
    let api = new_api(db.clone(), gateway.clone());

    let now = Utc::now();
    let make_link = |suffix: &str| NewPaymentLink {
        reference: Reference(format!("PAY-2000-{suffix}")),
        amount: Money::from_naira(900),
        quantity: 1,
        product_id: None,
        description: Some("Invoice 77".to_string()),
        customer_email: Some("ada@example.com".to_string()),
        customer_name: None,
        authorization_url: format!("https://checkout.mock/PAY-2000-{suffix}"),
        access_code: format!("ac_{suffix}"),
        created_at: now - Duration::minutes(20),
        expires_at: now + Duration::hours(12),
    };
    let paid = db.insert_payment_link(make_link("AAAAAA")).await.unwrap();
    let flaky = db.insert_payment_link(make_link("BBBBBB")).await.unwrap();
    let fresh_req = PaymentLinkRequest { custom_amount: Some("50.00".to_string()), ..Default::default() };
    let fresh = api.create_payment_link(fresh_req).await.unwrap();

    gateway.script_success(&paid.reference, paid.amount);
    gateway.script_error(&flaky.reference, GatewayError::Unavailable("502".to_string()));

    let result = api.sweep().await.expect("Sweep failed");
    assert_eq!(result.expired_count(), 0);
    assert_eq!(result.checked, 2, "Only links older than the staleness threshold are re-verified");
    assert_eq!(result.completed, 1);
    assert_eq!(result.failures, 1);

    let stored = db.fetch_payment_link(&paid.reference).await.unwrap().unwrap();
    assert_eq!(stored.status, LinkStatus::Completed);
    let order = db.fetch_order_by_payment_reference(&paid.reference).await.unwrap().expect("Order derived by sweep");
    assert_eq!(order.total, Money::from_naira(900));
    // The flaky one is untouched and will be retried by the next sweep
    let stored = db.fetch_payment_link(&flaky.reference).await.unwrap().unwrap();
    assert_eq!(stored.status, LinkStatus::Pending);
    // The fresh one was too young to bother the gateway about
    let stored = db.fetch_payment_link(&fresh.reference).await.unwrap().unwrap();
    assert_eq!(stored.status, LinkStatus::Pending);
}

#[tokio::test]
async fn custom_links_derive_a_synthetic_line_item() {
    let db = new_db().await;
    let gateway = MockGateway::new();
    let api = new_api(db.clone(), gateway.clone());

    let req = PaymentLinkRequest {
        custom_amount: Some("2500.00".to_string()),
        description: Some("Bespoke consultation".to_string()),
        customer_email: Some("ada@example.com".to_string()),
        ..Default::default()
    };
    let link = api.create_payment_link(req).await.unwrap();
    gateway.script_success(&link.reference, link.amount);

    let outcome = api.verify_payment_link(&link.reference).await.unwrap();
    let order = outcome.order.expect("Order derived");
    assert_eq!(order.total, Money::from_naira(2500));
    assert_eq!(order.customer_email, "ada@example.com");
    let items = db.fetch_order_items(order.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_id, None);
    assert_eq!(items[0].name, "Bespoke consultation");
    assert_eq!(items[0].quantity, 1);
    assert_eq!(items[0].unit_price, Money::from_naira(2500));
}

#[tokio::test]
async fn link_views_are_tracked_with_deduplicated_ips() {
    let db = new_db().await;
    let gateway = MockGateway::new();
    let api = new_api(db.clone(), gateway);

    let req = PaymentLinkRequest { custom_amount: Some("10.00".to_string()), ..Default::default() };
    let link = api.create_payment_link(req).await.unwrap();

    api.record_view(&link.reference, Some("203.0.113.9".to_string())).await.unwrap();
    api.record_view(&link.reference, Some("203.0.113.9".to_string())).await.unwrap();
    let viewed = api.record_view(&link.reference, Some("198.51.100.4".to_string())).await.unwrap();

    assert_eq!(viewed.view_count, 3);
    assert!(viewed.last_viewed_at.is_some());
    assert_eq!(viewed.viewer_ips(), vec!["203.0.113.9".to_string(), "198.51.100.4".to_string()]);
}
