use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use cleanpay_engine::{MessageProvider, ReconcileApi, ReconciliationDatabase, SqliteDatabase};
use log::info;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    gateway_routes::{gateway_return, gateway_subscription, gateway_webhook},
    messenger::HttpMessenger,
    middleware::OperatorMiddlewareFactory,
    recovery_worker::start_recovery_worker,
    routes::{booking_view, cancel_booking, fulfillment_ledger, health, reconcile_booking},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let messenger =
        HttpMessenger::new(&config.messaging).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let api = ReconcileApi::new(db.clone(), messenger.clone()).with_commission_pct(config.commission_pct);
    let worker = start_recovery_worker(api, config.recovery_interval_secs, config.stale_payment_after);
    let srv = create_server_instance(config, db, messenger)?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    worker.abort();
    result
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    messenger: HttpMessenger,
) -> Result<Server, ServerError> {
    info!("🚀️ Gateway signature checks are {}", if config.gateway.signature_checks { "on" } else { "OFF" });
    let srv = HttpServer::new(move || {
        let api = ReconcileApi::new(db.clone(), messenger.clone()).with_commission_pct(config.commission_pct);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("cps::access_log"))
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(config.gateway.clone()));
        let gateway_scope = web::scope("/gateway")
            .route("/webhook", web::post().to(gateway_webhook::<SqliteDatabase, HttpMessenger>))
            .route("/subscription", web::post().to(gateway_subscription::<SqliteDatabase, HttpMessenger>));
        let return_route =
            web::resource("/payment/return").route(web::get().to(gateway_return::<SqliteDatabase, HttpMessenger>));
        // Routes that require the operator token
        let operator_scope = web::scope("/api")
            .wrap(OperatorMiddlewareFactory::new(config.operator_token.clone()))
            .route("/reconcile/{booking_id}", web::post().to(reconcile_booking::<SqliteDatabase, HttpMessenger>))
            .route("/fulfillment/{booking_id}", web::get().to(fulfillment_ledger::<SqliteDatabase, HttpMessenger>))
            .route("/booking/{booking_id}", web::get().to(booking_view::<SqliteDatabase, HttpMessenger>))
            .route("/cancel/{booking_id}", web::post().to(cancel_booking::<SqliteDatabase, HttpMessenger>));
        app.service(health).service(return_route).service(gateway_scope).service(operator_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
