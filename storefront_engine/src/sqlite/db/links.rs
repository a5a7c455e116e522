use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{LinkStatus, NewPaymentLink, PaymentLink, Reference},
    traits::{LinkQueryFilter, StoreError},
};

pub async fn insert_link(link: NewPaymentLink, conn: &mut SqliteConnection) -> Result<PaymentLink, StoreError> {
    let result: Result<PaymentLink, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO payment_links (
                reference,
                amount,
                quantity,
                product_id,
                description,
                customer_email,
                customer_name,
                authorization_url,
                access_code,
                created_at,
                expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *;
        "#,
    )
    .bind(link.reference.clone())
    .bind(link.amount)
    .bind(link.quantity)
    .bind(link.product_id)
    .bind(link.description)
    .bind(link.customer_email)
    .bind(link.customer_name)
    .bind(link.authorization_url)
    .bind(link.access_code)
    .bind(link.created_at)
    .bind(link.expires_at)
    .fetch_one(conn)
    .await;
    match result {
        Ok(link) => {
            debug!("🗃️ Payment link [{}] saved", link.reference);
            Ok(link)
        },
        Err(sqlx::Error::Database(e)) if e.kind() == sqlx::error::ErrorKind::UniqueViolation => {
            Err(StoreError::LinkAlreadyExists(link.reference))
        },
        Err(e) => Err(e.into()),
    }
}

/// Returns the payment link for the given gateway reference.
pub async fn fetch_link_by_reference(
    reference: &Reference,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentLink>, sqlx::Error> {
    let link = sqlx::query_as("SELECT * FROM payment_links WHERE reference = $1")
        .bind(reference.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(link)
}

/// Fetches links matching the filter criteria, most recent first.
pub async fn search_links(
    filter: LinkQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentLink>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM payment_links ");
    if !filter.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(status) = filter.status {
        where_clause.push("status = ");
        where_clause.push_bind_unseparated(status.to_string());
    }
    if let Some(since) = filter.since {
        where_clause.push("unixepoch(created_at) >= ");
        where_clause.push_bind_unseparated(since.timestamp());
    }
    if let Some(until) = filter.until {
        where_clause.push("unixepoch(created_at) <= ");
        where_clause.push_bind_unseparated(until.timestamp());
    }
    builder.push(" ORDER BY created_at DESC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let links = builder.build_query_as::<PaymentLink>().fetch_all(conn).await?;
    Ok(links)
}

/// Moves the link to the given status. `paid_at`/`verified_at` are only ever stamped on completion, and `COALESCE`
/// keeps the first recorded payment time if a duplicate trigger lands here again.
pub async fn update_link_status(
    reference: &Reference,
    status: LinkStatus,
    paid_at: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<PaymentLink, StoreError> {
    let result: Option<PaymentLink> = match (status, paid_at) {
        (LinkStatus::Completed, Some(ts)) => {
            sqlx::query_as(
                "UPDATE payment_links SET status = $1, updated_at = CURRENT_TIMESTAMP, paid_at = COALESCE(paid_at, \
                 $2), verified_at = COALESCE(verified_at, $2) WHERE reference = $3 RETURNING *",
            )
            .bind(status.to_string())
            .bind(ts)
            .bind(reference.as_str())
            .fetch_optional(conn)
            .await?
        },
        _ => {
            sqlx::query_as(
                "UPDATE payment_links SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE reference = $2 RETURNING *",
            )
            .bind(status.to_string())
            .bind(reference.as_str())
            .fetch_optional(conn)
            .await?
        },
    };
    result.ok_or_else(|| StoreError::LinkNotFound(reference.clone()))
}

/// Bumps the view counter and merges the viewer's IP into the stored set. The counter bump is an in-place update;
/// the IP-set merge is a read-modify-write on a single row, which is as much atomicity as the design asks for.
pub async fn record_view(
    reference: &Reference,
    ip: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<PaymentLink, StoreError> {
    let link = fetch_link_by_reference(reference, conn)
        .await?
        .ok_or_else(|| StoreError::LinkNotFound(reference.clone()))?;
    let mut ips = link.viewer_ips();
    if let Some(ip) = ip {
        if !ips.contains(&ip) {
            ips.push(ip);
        }
    }
    let ips = serde_json::to_string(&ips).unwrap_or_else(|_| "[]".to_string());
    let updated = sqlx::query_as(
        "UPDATE payment_links SET view_count = view_count + 1, last_viewed_at = CURRENT_TIMESTAMP, ip_addresses = \
         $1, updated_at = CURRENT_TIMESTAMP WHERE reference = $2 RETURNING *",
    )
    .bind(ips)
    .bind(reference.as_str())
    .fetch_optional(conn)
    .await?;
    updated.ok_or_else(|| StoreError::LinkNotFound(reference.clone()))
}

/// Bulk-marks every pending link whose expiry window has closed as expired, returning the affected links.
pub async fn expire_links(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<PaymentLink>, StoreError> {
    let rows = sqlx::query_as(
        "UPDATE payment_links SET status = 'Expired', updated_at = CURRENT_TIMESTAMP WHERE status = 'Pending' AND \
         unixepoch(expires_at) < $1 RETURNING *;",
    )
    .bind(now.timestamp())
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Pending links created before `cutoff`, oldest first. These are the candidates for a gateway re-verification.
pub async fn fetch_stale_pending(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentLink>, StoreError> {
    let rows = sqlx::query_as(
        "SELECT * FROM payment_links WHERE status = 'Pending' AND unixepoch(created_at) < $1 ORDER BY created_at ASC",
    )
    .bind(cutoff.timestamp())
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
