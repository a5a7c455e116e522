//----------------------------------------------   Webhook  ----------------------------------------------------
//
// The gateway's webhook lands here after the HMAC middleware has authenticated the raw body. From this point every
// response is a 200: a non-2xx answer makes the gateway retry indefinitely, including for event types this system
// does not care about. Failures are reported in the JSON body and logged instead.

use actix_web::{web, HttpResponse};
use log::{debug, info, warn};
use paystack_tools::WebhookEvent;
use storefront_engine::{
    db_types::Reference,
    traits::{PaymentGateway, StoreDatabase},
    LinkFlowApi,
    LinkFlowError,
};

use crate::data_objects::JsonResponse;

pub async fn paystack_webhook<B, G>(body: web::Bytes, api: web::Data<LinkFlowApi<B, G>>) -> HttpResponse
where
    B: StoreDatabase,
    G: PaymentGateway,
{
    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("💳️ Could not parse webhook payload. {e}");
            return HttpResponse::Ok().json(JsonResponse::failure("Could not parse webhook payload."));
        },
    };
    debug!("💳️ Received webhook event {} for [{}]", event.event, event.data.reference);
    let reference = Reference(event.data.reference.clone());
    let result = if event.is_charge_success() {
        // The webhook is a trigger, not a source of truth: the engine re-verifies against the gateway before
        // flipping any state.
        match api.verify_payment_link(&reference).await {
            Ok(outcome) => {
                info!("💳️ Webhook verified [{}]: link is {}", reference, outcome.link.status);
                JsonResponse::success("Webhook processed.")
            },
            Err(LinkFlowError::LinkNotFound(_)) => {
                info!("💳️ Webhook for unknown reference [{}]. Ignoring.", reference);
                JsonResponse::success("Unknown reference.")
            },
            Err(e) => {
                warn!("💳️ Could not process success webhook for [{}]. {e}", reference);
                JsonResponse::failure("Could not process webhook.")
            },
        }
    } else if event.is_charge_failed() {
        match api.handle_gateway_failure(&reference).await {
            Ok(link) => {
                info!("💳️ Webhook failure report applied to [{}]: link is {}", reference, link.status);
                JsonResponse::success("Webhook processed.")
            },
            Err(LinkFlowError::LinkNotFound(_)) => {
                info!("💳️ Failure webhook for unknown reference [{}]. Ignoring.", reference);
                JsonResponse::success("Unknown reference.")
            },
            Err(e) => {
                warn!("💳️ Could not process failure webhook for [{}]. {e}", reference);
                JsonResponse::failure("Could not process webhook.")
            },
        }
    } else {
        info!("💳️ Ignoring webhook event type '{}'", event.event);
        JsonResponse::success("Event ignored.")
    };
    HttpResponse::Ok().json(result)
}
