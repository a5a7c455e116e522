//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are generic over the [`StoreDatabase`] and [`PaymentGateway`] implementations so that endpoint tests
//! can swap in a scripted gateway; the composition root in [`crate::server`] pins the concrete types.

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use serde::{Deserialize, Serialize};
use storefront_engine::{
    api::objects::{PaymentLinkRequest, SweepResult},
    db_types::{LinkStatus, OrderNumber, PaymentLink, Reference},
    traits::{LinkQueryFilter, PaymentGateway, PaymentOutcome, StoreDatabase},
    LinkFlowApi,
    OrderFlowApi,
};

use crate::{
    config::ServerOptions,
    data_objects::{OrderStatusUpdateRequest, OrderWithItems, PaymentLinkView, StoreOrderRequest},
    errors::ServerError,
    helpers::get_remote_ip,
};

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------------   Payment links  ----------------------------------------------
/// Admin: create a new payment link against the gateway.
pub async fn create_payment_link<B, G>(
    body: web::Json<PaymentLinkRequest>,
    api: web::Data<LinkFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: StoreDatabase,
    G: PaymentGateway,
{
    trace!("💻️ POST payment link");
    let link = api.create_payment_link(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(link))
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkListParams {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub expired: usize,
    pub checked: usize,
    pub completed: usize,
    pub failures: usize,
}

impl From<&SweepResult> for SweepSummary {
    fn from(r: &SweepResult) -> Self {
        Self { expired: r.expired_count(), checked: r.checked, completed: r.completed, failures: r.failures }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkListResponse {
    pub sweep: SweepSummary,
    pub links: Vec<PaymentLink>,
}

/// Admin: list payment links. This is also where the sweep runs — opportunistically, inside the list fetch, so the
/// admin always looks at a reconciled view and no background scheduler is needed.
pub async fn list_payment_links<B, G>(
    params: web::Query<LinkListParams>,
    api: web::Data<LinkFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: StoreDatabase,
    G: PaymentGateway,
{
    trace!("💻️ GET payment links");
    let filter = match params.into_inner().status {
        Some(s) => {
            let status = s
                .parse::<LinkStatus>()
                .map_err(|e| ServerError::InvalidRequestPath(e.to_string()))?;
            LinkQueryFilter::with_status(status)
        },
        None => LinkQueryFilter::default(),
    };
    let sweep = api.sweep().await?;
    let links = api.list_links(filter).await?;
    Ok(HttpResponse::Ok().json(LinkListResponse { sweep: SweepSummary::from(&sweep), links }))
}

/// Public: the payment-link landing payload. Records the view (count + IP) as a side effect.
pub async fn view_payment_link<B, G>(
    req: HttpRequest,
    path: web::Path<String>,
    api: web::Data<LinkFlowApi<B, G>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: StoreDatabase,
    G: PaymentGateway,
{
    let reference = Reference(path.into_inner());
    trace!("💻️ GET paylink {reference}");
    let ip = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded).map(|ip| ip.to_string());
    let link = api.record_view(&reference, ip).await?;
    Ok(HttpResponse::Ok().json(PaymentLinkView::from_link(&link)))
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    pub reference: String,
    pub outcome: PaymentOutcome,
    pub link_status: String,
    pub order_number: Option<String>,
}

/// Public: verify a payment by reference. Runs the full Verify transition server-side and reports the gateway's
/// current view back to the caller.
pub async fn verify_payment<B, G>(
    path: web::Path<String>,
    api: web::Data<LinkFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: StoreDatabase,
    G: PaymentGateway,
{
    let reference = Reference(path.into_inner());
    trace!("💻️ GET verify {reference}");
    let outcome = api.verify_payment_link(&reference).await?;
    let response = VerifyResponse {
        reference: outcome.link.reference.as_str().to_string(),
        outcome: outcome.outcome,
        link_status: outcome.link.status.to_string(),
        order_number: outcome.order.map(|o| o.order_number.as_str().to_string()),
    };
    Ok(HttpResponse::Ok().json(response))
}

// ----------------------------------------------   Orders  -----------------------------------------------------
/// Public: store checkout. The shipping fee comes from site settings; item prices come from the catalog.
pub async fn create_order<B>(
    body: web::Json<StoreOrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where B: StoreDatabase
{
    trace!("💻️ POST store order");
    let request = body.into_inner();
    let order = api.place_store_order(request.items, request.customer, options.shipping_fee).await?;
    let items = api.fetch_order_items(order.id).await?;
    Ok(HttpResponse::Created().json(OrderWithItems { order, items }))
}

pub async fn get_order<B>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where B: StoreDatabase
{
    let order_number = OrderNumber(path.into_inner());
    trace!("💻️ GET order {order_number}");
    let order = api
        .fetch_order(&order_number)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No order {order_number}")))?;
    let items = api.fetch_order_items(order.id).await?;
    Ok(HttpResponse::Ok().json(OrderWithItems { order, items }))
}

pub async fn cancel_order<B>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where B: StoreDatabase
{
    let order_number = OrderNumber(path.into_inner());
    debug!("💻️ POST cancel order {order_number}");
    let order = api.cancel_order(&order_number).await?;
    Ok(HttpResponse::Ok().json(order))
}

pub async fn update_order_status<B>(
    path: web::Path<String>,
    body: web::Json<OrderStatusUpdateRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where B: StoreDatabase
{
    let order_number = OrderNumber(path.into_inner());
    debug!("💻️ PATCH order {order_number} status to {}", body.status);
    let order = api.set_order_status(&order_number, body.status).await?;
    Ok(HttpResponse::Ok().json(order))
}
