use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use marketplace_engine::{events::EventProducers, helpers::SystemClock, PaymentApi, SqliteDatabase};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    escalation_worker::start_escalation_worker,
    routes::{health, PaymentWebhookRoute},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let producers = EventProducers::default();
    let _worker = start_escalation_worker(db.clone(), producers.clone(), config.escalation, config.sweep_interval);
    info!("🕰️ Escalation worker handed off");
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let webhook = web::Data::new(config.webhook.clone());
    let srv = HttpServer::new(move || {
        let payments_api = PaymentApi::new(db.clone(), producers.clone(), Arc::new(SystemClock));
        let json_config = web::JsonConfig::default()
            .error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mkt::access_log"))
            .app_data(json_config)
            .app_data(web::Data::new(payments_api))
            .app_data(webhook.clone())
            .service(health)
            .service(PaymentWebhookRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
