use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProduct, Product},
    traits::StoreError,
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, StoreError> {
    let product: Product = sqlx::query_as(
        "INSERT INTO products (name, price, quantity, badge, image) VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(product.name)
    .bind(product.price)
    .bind(product.quantity)
    .bind(product.badge)
    .bind(product.image)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Product [{}] saved with id {}", product.name, product.id);
    Ok(product)
}

pub async fn fetch_product(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(product)
}

/// Adjusts stock by `delta` in a single in-place update. The guard in the WHERE clause means a decrement that would
/// take the quantity below zero writes nothing; `None` tells the caller to work out whether the product is missing
/// or just short on stock.
pub async fn adjust_stock(id: i64, delta: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product: Option<Product> = sqlx::query_as(
        "UPDATE products SET quantity = quantity + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND quantity + \
         $1 >= 0 RETURNING *",
    )
    .bind(delta)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    if let Some(p) = &product {
        debug!("🗃️ Stock for product #{} adjusted by {delta} to {}", p.id, p.quantity);
    }
    Ok(product)
}
