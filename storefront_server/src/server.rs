use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::info;
use storefront_engine::{
    api::objects::LinkSettings,
    events::{EventHandlers, EventHooks, EventProducers},
    traits::PaymentGateway,
    LinkFlowApi,
    OrderFlowApi,
    SqliteDatabase,
};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::paystack::PaystackGateway,
    mailer::Mailer,
    middleware::HmacMiddlewareFactory,
    routes::{
        cancel_order,
        create_order,
        create_payment_link,
        get_order,
        health,
        list_payment_links,
        update_order_status,
        verify_payment,
        view_payment_link,
    },
    webhook_routes::paystack_webhook,
};

/// Composition root. Everything with process-wide reach — the database pool, the gateway client, the mailer and the
/// event handlers feeding it — is constructed here and injected downward; nothing reaches for a global.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = PaystackGateway::new(config.paystack.clone())?;
    let mailer = Arc::new(Mailer::new(&config.smtp));
    let handlers = EventHandlers::new(64, mailer_hooks(mailer));
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Wires the engine's notification events to the mailer. Every hook is fire-and-forget: it runs on the event
/// handler's own tasks, and the boolean send results are only logged inside the mailer.
pub fn mailer_hooks(mailer: Arc<Mailer>) -> EventHooks {
    let mut hooks = EventHooks::default();
    let m = Arc::clone(&mailer);
    hooks.on_order_confirmed(move |ev| {
        let m = Arc::clone(&m);
        Box::pin(async move {
            m.send_order_confirmation(&ev.order, &ev.items).await;
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let m = Arc::clone(&mailer);
    hooks.on_payment_confirmed(move |ev| {
        let m = Arc::clone(&m);
        Box::pin(async move {
            m.send_payment_confirmed(&ev.order).await;
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let m = Arc::clone(&mailer);
    hooks.on_status_changed(move |ev| {
        let m = Arc::clone(&m);
        Box::pin(async move {
            m.send_status_update(&ev.order, ev.old_status, ev.new_status).await;
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks
}

pub fn create_server_instance<G>(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: G,
    producers: EventProducers,
) -> Result<Server, ServerError>
where G: PaymentGateway + Send + Sync + 'static
{
    let host = config.host.clone();
    let port = config.port;
    info!("🚀️ Starting server on {host}:{port}");
    let srv = HttpServer::new(move || {
        let settings = LinkSettings {
            session_timeout: config.session_timeout,
            staleness: config.link_staleness,
            callback_url: config.callback_url.clone(),
        };
        let link_api = LinkFlowApi::new(db.clone(), gateway.clone(), producers.clone(), settings);
        let order_api = OrderFlowApi::new(db.clone(), producers.clone());
        let options = ServerOptions::from_config(&config);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sps::access_log"))
            .app_data(web::Data::new(link_api))
            .app_data(web::Data::new(order_api))
            .app_data(web::Data::new(options));
        let api_scope = web::scope("/api")
            .service(
                web::resource("/payment_links")
                    .route(web::post().to(create_payment_link::<SqliteDatabase, G>))
                    .route(web::get().to(list_payment_links::<SqliteDatabase, G>)),
            )
            .service(web::resource("/orders").route(web::post().to(create_order::<SqliteDatabase>)))
            .service(web::resource("/orders/{order_number}").route(web::get().to(get_order::<SqliteDatabase>)))
            .service(
                web::resource("/orders/{order_number}/cancel").route(web::post().to(cancel_order::<SqliteDatabase>)),
            )
            .service(
                web::resource("/orders/{order_number}/status")
                    .route(web::patch().to(update_order_status::<SqliteDatabase>)),
            );
        let webhook_scope = web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new(
                &config.signature_header,
                config.paystack.secret_key.clone(),
                config.hmac_checks,
            ))
            .service(web::resource("/paystack").route(web::post().to(paystack_webhook::<SqliteDatabase, G>)));
        app.service(health)
            .service(api_scope)
            .service(webhook_scope)
            .service(web::resource("/paylink/{reference}").route(web::get().to(view_payment_link::<SqliteDatabase, G>)))
            .service(web::resource("/verify/{reference}").route(web::get().to(verify_payment::<SqliteDatabase, G>)))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
