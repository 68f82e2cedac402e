mod config;
mod error;
mod handlers;
mod models;
mod services;
mod tasks;

use actix_web::{web, App, HttpServer, middleware::Logger};
use actix_cors::Cors;
use dotenv::dotenv;
use std::sync::Arc;
use tokio::sync::mpsc;

use services::{
    database::DatabaseService,
    mailer::{DisabledMailer, HttpMailer, Mailer},
    notifier::NotificationDispatcher,
};
use tasks::delivery_task::run_delivery_worker;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = config::Config::from_env().expect("Failed to load configuration");

    let database_service = DatabaseService::new(&config.database_url).await
        .expect("Failed to initialize database");

    let mailer: Arc<dyn Mailer> = match config.mail.clone() {
        Some(mail) => Arc::new(HttpMailer::new(mail)),
        None => {
            log::warn!("MAIL_API_URL not set; notification emails will be marked failed");
            Arc::new(DisabledMailer)
        }
    };

    // Outbox: records are committed first, emails go out from the worker.
    let (outbox, jobs) = mpsc::unbounded_channel();
    actix_web::rt::spawn(run_delivery_worker(
        database_service.clone(),
        mailer,
        jobs,
        config.delivery.clone(),
    ));

    let dispatcher = NotificationDispatcher::new(
        database_service.clone(),
        outbox,
        config.app.min_skill_count,
    );

    if let Err(e) = dispatcher.requeue_pending().await {
        log::error!("Failed to re-queue pending notifications: {}", e);
    }

    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting volunteer matching server on {}", bind_address);

    let app_config = config.app.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
            )
            .app_data(web::Data::new(database_service.clone()))
            .app_data(web::Data::new(dispatcher.clone()))
            .app_data(web::Data::new(app_config.clone()))
            .service(
                web::scope("/api/v1")
                    // Volunteers
                    .service(
                        web::scope("/volunteers")
                            .service(handlers::volunteers::register_volunteer)
                            .service(handlers::volunteers::get_volunteer)
                            .service(handlers::volunteers::update_skills)
                            .service(handlers::volunteers::get_dashboard)
                            .service(handlers::volunteers::list_notifications)
                            .service(handlers::volunteers::get_eligibility)
                            .service(handlers::volunteers::join_activity)
                    )
                    // Organization side
                    .service(
                        web::scope("/activities")
                            .service(handlers::activities::create_activity)
                            .service(handlers::activities::get_roster)
                    )
                    .service(
                        web::scope("/organizations")
                            .service(handlers::activities::list_org_activities)
                    )
                    .service(
                        web::scope("/positions")
                            .service(handlers::activities::get_candidates)
                            .service(handlers::activities::notify_candidates)
                    )
                    .service(
                        web::scope("/participations")
                            .service(handlers::activities::update_participation)
                    )
                    // Health check
                    .route("/health", web::get().to(handlers::health::health_check))
            )
    })
    .bind(&bind_address)?
    .run()
    .await
}
