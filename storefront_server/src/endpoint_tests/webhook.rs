use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use serde_json::json;
use spg_common::Secret;
use storefront_engine::{
    api::objects::PaymentLinkRequest,
    db_types::{LinkStatus, PaymentLink},
    test_utils::MockGateway,
    traits::StoreDatabase,
    SqliteDatabase,
};

use super::{link_api, test_db};
use crate::{
    data_objects::JsonResponse,
    helpers::calculate_hmac,
    middleware::HmacMiddlewareFactory,
    webhook_routes::paystack_webhook,
};

const TEST_SECRET: &str = "sk_test_0123456789abcdef";
const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Creates a pending link through the normal flow so the webhook has something to land on.
async fn pending_link(db: &SqliteDatabase, gateway: &MockGateway) -> PaymentLink {
    let api = link_api(db.clone(), gateway.clone());
    let req = PaymentLinkRequest { custom_amount: Some("1500.00".to_string()), ..Default::default() };
    api.create_payment_link(req).await.expect("Link creation failed")
}

fn charge_event(event: &str, reference: &str, amount_kobo: i64) -> String {
    json!({
        "event": event,
        "data": {
            "status": if event == "charge.success" { "success" } else { "failed" },
            "reference": reference,
            "amount": amount_kobo,
            "paid_at": "2024-06-20T19:15:00.000Z",
            "customer": { "email": "ada@example.com" }
        }
    })
    .to_string()
}

async fn post_webhook(
    db: SqliteDatabase,
    gateway: MockGateway,
    body: String,
    signature: Option<String>,
) -> Result<(StatusCode, String), String> {
    let api = link_api(db, gateway);
    let app = App::new().app_data(web::Data::new(api)).service(
        web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new(SIGNATURE_HEADER, Secret::new(TEST_SECRET.to_string()), true))
            .service(web::resource("/paystack").route(web::post().to(paystack_webhook::<SqliteDatabase, MockGateway>))),
    );
    let service = test::init_service(app).await;
    let mut req = TestRequest::post().uri("/webhook/paystack").insert_header(("Content-Type", "application/json"));
    if let Some(sig) = signature {
        req = req.insert_header((SIGNATURE_HEADER, sig));
    }
    let req = req.set_payload(body).to_request();
    let res = test::try_call_service(&service, req).await.map_err(|e| e.to_string())?;
    let status = res.status();
    let body = test::read_body(res).await;
    Ok((status, String::from_utf8_lossy(&body).into_owned()))
}

#[actix_web::test]
async fn a_tampered_body_is_rejected_and_nothing_changes() {
    let _ = env_logger::try_init();
    let db = test_db().await;
    let gateway = MockGateway::new();
    let link = pending_link(&db, &gateway).await;
    gateway.script_success(&link.reference, link.amount);

    let body = charge_event("charge.success", link.reference.as_str(), link.amount.value());
    // Signature computed over a different body than the one sent
    let signature = calculate_hmac(TEST_SECRET, b"{\"event\":\"charge.success\"}");
    let err = post_webhook(db.clone(), gateway, body, Some(signature)).await.expect_err("Expected rejection");
    assert_eq!(err, "Invalid HMAC signature.");

    let stored = db.fetch_payment_link(&link.reference).await.unwrap().unwrap();
    assert_eq!(stored.status, LinkStatus::Pending, "A rejected webhook must not mutate anything");
    assert!(db.fetch_order_by_payment_reference(&link.reference).await.unwrap().is_none());
}

#[actix_web::test]
async fn a_missing_signature_is_rejected() {
    let _ = env_logger::try_init();
    let db = test_db().await;
    let gateway = MockGateway::new();
    let link = pending_link(&db, &gateway).await;

    let body = charge_event("charge.success", link.reference.as_str(), link.amount.value());
    let err = post_webhook(db.clone(), gateway, body, None).await.expect_err("Expected rejection");
    assert_eq!(err, "No HMAC signature found.");
    let stored = db.fetch_payment_link(&link.reference).await.unwrap().unwrap();
    assert_eq!(stored.status, LinkStatus::Pending);
}

#[actix_web::test]
async fn a_signed_success_event_completes_the_link_and_derives_the_order() {
    let _ = env_logger::try_init();
    let db = test_db().await;
    let gateway = MockGateway::new();
    let link = pending_link(&db, &gateway).await;
    gateway.script_success(&link.reference, link.amount);

    let body = charge_event("charge.success", link.reference.as_str(), link.amount.value());
    let signature = calculate_hmac(TEST_SECRET, body.as_bytes());
    let (status, response) = post_webhook(db.clone(), gateway, body, Some(signature)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let response: JsonResponse = serde_json::from_str(&response).unwrap();
    assert!(response.success);

    let stored = db.fetch_payment_link(&link.reference).await.unwrap().unwrap();
    assert_eq!(stored.status, LinkStatus::Completed);
    let order = db.fetch_order_by_payment_reference(&link.reference).await.unwrap().expect("Order derived");
    assert_eq!(order.total, link.amount);
}

#[actix_web::test]
async fn a_signed_failure_event_fails_the_link() {
    let _ = env_logger::try_init();
    let db = test_db().await;
    let gateway = MockGateway::new();
    let link = pending_link(&db, &gateway).await;

    let body = charge_event("charge.failed", link.reference.as_str(), link.amount.value());
    let signature = calculate_hmac(TEST_SECRET, body.as_bytes());
    let (status, _) = post_webhook(db.clone(), gateway, body, Some(signature)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);

    let stored = db.fetch_payment_link(&link.reference).await.unwrap().unwrap();
    assert_eq!(stored.status, LinkStatus::Failed);
}

#[actix_web::test]
async fn unrecognized_events_are_acknowledged_and_ignored() {
    let _ = env_logger::try_init();
    let db = test_db().await;
    let gateway = MockGateway::new();
    let link = pending_link(&db, &gateway).await;

    let body = json!({
        "event": "subscription.create",
        "data": { "status": "pending", "reference": link.reference.as_str(), "amount": 100 }
    })
    .to_string();
    let signature = calculate_hmac(TEST_SECRET, body.as_bytes());
    let (status, response) = post_webhook(db.clone(), gateway, body, Some(signature)).await.expect("Request failed");
    // 200 even for types we ignore, so the gateway does not retry forever
    assert_eq!(status, StatusCode::OK);
    let response: JsonResponse = serde_json::from_str(&response).unwrap();
    assert!(response.success);

    let stored = db.fetch_payment_link(&link.reference).await.unwrap().unwrap();
    assert_eq!(stored.status, LinkStatus::Pending);
}
