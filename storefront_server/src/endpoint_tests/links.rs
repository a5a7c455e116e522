use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use serde_json::{json, Value};
use spg_common::Money;
use storefront_engine::{test_utils::MockGateway, SqliteDatabase};

use super::{link_api, test_db};
use crate::{
    config::ServerOptions,
    routes::{create_payment_link, health, list_payment_links, view_payment_link},
};

fn test_options() -> ServerOptions {
    ServerOptions { use_x_forwarded_for: false, use_forwarded: false, shipping_fee: Money::from(0) }
}

async fn service(
    db: SqliteDatabase,
    gateway: MockGateway,
) -> impl actix_web::dev::Service<
    actix_http::Request,
    Response = actix_web::dev::ServiceResponse,
    Error = actix_web::Error,
> {
    let api = link_api(db, gateway);
    let app = App::new()
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(test_options()))
        .service(health)
        .service(
            web::scope("/api").service(
                web::resource("/payment_links")
                    .route(web::post().to(create_payment_link::<SqliteDatabase, MockGateway>))
                    .route(web::get().to(list_payment_links::<SqliteDatabase, MockGateway>)),
            ),
        )
        .service(
            web::resource("/paylink/{reference}")
                .route(web::get().to(view_payment_link::<SqliteDatabase, MockGateway>)),
        );
    test::init_service(app).await
}

#[actix_web::test]
async fn health_answers() {
    let service = service(test_db().await, MockGateway::new()).await;
    let res = test::call_service(&service, TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[actix_web::test]
async fn creating_and_listing_links_over_http() {
    let _ = env_logger::try_init();
    let service = service(test_db().await, MockGateway::new()).await;

    let req = TestRequest::post()
        .uri("/api/payment_links")
        .set_json(json!({ "custom_amount": "250.00", "description": "Deposit" }))
        .to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let link: Value = test::read_body_json(res).await;
    assert_eq!(link["status"], "Pending");
    assert_eq!(link["amount"], 25_000);
    let reference = link["reference"].as_str().unwrap().to_string();

    let res = test::call_service(&service, TestRequest::get().uri("/api/payment_links").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let listing: Value = test::read_body_json(res).await;
    assert_eq!(listing["links"].as_array().unwrap().len(), 1);
    assert_eq!(listing["links"][0]["reference"], reference.as_str());
    assert_eq!(listing["sweep"]["expired"], 0);

    // Bad filter values are a client error, not a 500
    let res =
        test::call_service(&service, TestRequest::get().uri("/api/payment_links?status=Bogus").to_request()).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn the_public_link_view_tracks_views() {
    let _ = env_logger::try_init();
    let db = test_db().await;
    let gateway = MockGateway::new();
    let service = service(db, gateway).await;

    let req = TestRequest::post()
        .uri("/api/payment_links")
        .set_json(json!({ "custom_amount": "99.99" }))
        .to_request();
    let link: Value = test::read_body_json(test::call_service(&service, req).await).await;
    let reference = link["reference"].as_str().unwrap();

    let res = test::call_service(&service, TestRequest::get().uri(&format!("/paylink/{reference}")).to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let view: Value = test::read_body_json(res).await;
    assert_eq!(view["amount"], "99.99");
    assert_eq!(view["status"], "Pending");
    assert!(view["seconds_remaining"].as_i64().unwrap() > 0);
    // The public view does not leak analytics or customer fields
    assert!(view.get("view_count").is_none());
    assert!(view.get("ip_addresses").is_none());

    let res = test::call_service(&service, TestRequest::get().uri("/paylink/PAY-0-MISSING").to_request()).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = test::call_service(
        &service,
        TestRequest::post().uri("/api/payment_links").set_json(json!({ "custom_amount": "0.00" })).to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
