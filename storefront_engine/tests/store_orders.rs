//! Store-checkout and cancellation tests, run against a throwaway SQLite database.

use spg_common::Money;
use storefront_engine::{
    api::objects::{CartLine, CustomerDetails},
    db_types::{NewProduct, OrderStatusType, OrderType, PaymentStatus, Product, SOLD_OUT_BADGE},
    events::EventProducers,
    test_utils::{prepare_test_env, random_db_path},
    traits::StoreDatabase,
    OrderFlowApi,
    OrderFlowError,
    SqliteDatabase,
};

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database")
}

fn new_api(db: SqliteDatabase) -> OrderFlowApi<SqliteDatabase> {
    OrderFlowApi::new(db, EventProducers::default())
}

async fn seed_product(db: &SqliteDatabase, name: &str, price_naira: i64, quantity: i64) -> Product {
    db.insert_product(NewProduct {
        name: name.to_string(),
        price: Money::from_naira(price_naira),
        quantity,
        badge: None,
        image: None,
    })
    .await
    .expect("Error seeding product")
}

fn walk_in_customer() -> CustomerDetails {
    CustomerDetails {
        name: "Ada Obi".to_string(),
        email: "ada@example.com".to_string(),
        phone: Some("+2348012345678".to_string()),
        shipping_address: Some("14 Glover Road, Ikoyi, Lagos".to_string()),
    }
}

#[tokio::test]
async fn totals_are_computed_server_side_from_catalog_prices() {
    let db = new_db().await;
    let throw = seed_product(&db, "Aso-oke throw pillow", 5000, 10).await;
    let lamp = seed_product(&db, "Brass table lamp", 12_500, 3).await;
    let api = new_api(db.clone());

    let cart = vec![
        CartLine { product_id: throw.id, quantity: 2, color: Some("Indigo".to_string()), size: None },
        CartLine { product_id: lamp.id, quantity: 1, color: None, size: None },
    ];
    let order = api.place_store_order(cart, walk_in_customer(), Money::from_naira(1500)).await.expect("Order failed");

    assert_eq!(order.order_type, OrderType::Store);
    assert_eq!(order.subtotal, Money::from_naira(22_500));
    assert_eq!(order.shipping, Money::from_naira(1500));
    assert_eq!(order.total, Money::from_naira(24_000));
    assert_eq!(order.total, order.subtotal + order.shipping);
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert!(order.order_number.as_str().starts_with("ORD-"));
    assert!(order.payment_reference.is_none());

    let items = db.fetch_order_items(order.id).await.unwrap();
    assert_eq!(items.len(), 2);
    let subtotal: Money = items.iter().map(|i| i.line_total()).sum();
    assert_eq!(subtotal, order.subtotal);
    assert_eq!(items[0].name, "Aso-oke throw pillow (Indigo)");

    assert_eq!(db.fetch_product(throw.id).await.unwrap().unwrap().quantity, 8);
    assert_eq!(db.fetch_product(lamp.id).await.unwrap().unwrap().quantity, 2);
}

#[tokio::test]
async fn one_bad_line_aborts_the_whole_order_before_any_mutation() {
    let db = new_db().await;
    let throw = seed_product(&db, "Aso-oke throw pillow", 5000, 10).await;
    let lamp = seed_product(&db, "Brass table lamp", 12_500, 3).await;
    let api = new_api(db.clone());

    let cart = vec![
        CartLine { product_id: throw.id, quantity: 2, color: None, size: None },
        CartLine { product_id: lamp.id, quantity: 99, color: None, size: None },
    ];
    let err = api.place_store_order(cart, walk_in_customer(), Money::from(0)).await.expect_err("Expected rejection");
    assert!(matches!(err, OrderFlowError::OutOfStock { requested: 99, available: 3, .. }));

    // Nothing moved: the valid line was not partially applied
    assert_eq!(db.fetch_product(throw.id).await.unwrap().unwrap().quantity, 10);
    assert_eq!(db.fetch_product(lamp.id).await.unwrap().unwrap().quantity, 3);

    let cart = vec![CartLine { product_id: 404, quantity: 1, color: None, size: None }];
    let err = api.place_store_order(cart, walk_in_customer(), Money::from(0)).await.expect_err("Unknown product");
    assert!(matches!(err, OrderFlowError::ProductNotFound(404)));

    let err = api.place_store_order(vec![], walk_in_customer(), Money::from(0)).await.expect_err("Empty cart");
    assert!(matches!(err, OrderFlowError::EmptyCart));
}

#[tokio::test]
async fn cancellation_restores_stock_and_clears_the_sold_out_badge() {
    let db = new_db().await;
    let throw = seed_product(&db, "Aso-oke throw pillow", 5000, 2).await;
    let api = new_api(db.clone());

    let cart = vec![CartLine { product_id: throw.id, quantity: 2, color: None, size: None }];
    let order = api.place_store_order(cart, walk_in_customer(), Money::from(0)).await.unwrap();

    let sold_out = db.fetch_product(throw.id).await.unwrap().unwrap();
    assert_eq!(sold_out.quantity, 0);
    assert!(!sold_out.in_stock());
    assert_eq!(sold_out.effective_badge(), Some(SOLD_OUT_BADGE));

    let cancelled = api.cancel_order(&order.order_number).await.expect("Cancellation failed");
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);

    let restocked = db.fetch_product(throw.id).await.unwrap().unwrap();
    assert_eq!(restocked.quantity, 2);
    assert!(restocked.in_stock());
    assert_eq!(restocked.effective_badge(), None, "The sold-out badge lifts as soon as stock is positive");
}

#[tokio::test]
async fn completed_and_cancelled_orders_cannot_be_cancelled() {
    let db = new_db().await;
    let throw = seed_product(&db, "Aso-oke throw pillow", 5000, 5).await;
    let api = new_api(db.clone());

    let cart = vec![CartLine { product_id: throw.id, quantity: 1, color: None, size: None }];
    let order = api.place_store_order(cart, walk_in_customer(), Money::from(0)).await.unwrap();

    api.cancel_order(&order.order_number).await.unwrap();
    let err = api.cancel_order(&order.order_number).await.expect_err("Already cancelled");
    assert!(matches!(err, OrderFlowError::NotCancellable(_, OrderStatusType::Cancelled)));
    // Stock was restored exactly once
    assert_eq!(db.fetch_product(throw.id).await.unwrap().unwrap().quantity, 5);

    let cart = vec![CartLine { product_id: throw.id, quantity: 1, color: None, size: None }];
    let order = api.place_store_order(cart, walk_in_customer(), Money::from(0)).await.unwrap();
    api.set_order_status(&order.order_number, OrderStatusType::Processing).await.unwrap();
    api.set_order_status(&order.order_number, OrderStatusType::Completed).await.unwrap();
    let err = api.cancel_order(&order.order_number).await.expect_err("Completed orders are final");
    assert!(matches!(err, OrderFlowError::NotCancellable(_, OrderStatusType::Completed)));
}

#[tokio::test]
async fn fulfillment_status_moves_independently_of_payment_status() {
    let db = new_db().await;
    let throw = seed_product(&db, "Aso-oke throw pillow", 5000, 5).await;
    let api = new_api(db.clone());

    let cart = vec![CartLine { product_id: throw.id, quantity: 1, color: None, size: None }];
    let order = api.place_store_order(cart, walk_in_customer(), Money::from(0)).await.unwrap();

    let updated = api.set_order_status(&order.order_number, OrderStatusType::Processing).await.unwrap();
    assert_eq!(updated.status, OrderStatusType::Processing);
    assert_eq!(updated.payment_status, PaymentStatus::Pending, "Fulfillment and payment are independent axes");

    let err = api.set_order_status(&order.order_number, OrderStatusType::Cancelled).await.expect_err("Guarded");
    assert!(matches!(err, OrderFlowError::CancelViaStatusUpdate));

    api.cancel_order(&order.order_number).await.unwrap();
    let err = api.set_order_status(&order.order_number, OrderStatusType::Processing).await.expect_err("Locked");
    assert!(matches!(err, OrderFlowError::StatusLocked(_, OrderStatusType::Cancelled)));
}
