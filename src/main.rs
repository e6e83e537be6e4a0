mod api;
mod config;
mod datastore;
mod forms;
mod metrics;
mod passwords;
mod session;
mod twoface;
mod views;

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate guard;
#[macro_use]
extern crate diesel;
#[macro_use]
extern crate diesel_migrations;

use crate::config::Config;
use crate::datastore::postgres::PostgresStore;
use crate::session::Sessions;
use crate::views::Templates;
use actix_service::Service;
use actix_web::{dev::ServiceResponse, middleware, web, App, HttpServer};
use futures::future::FutureExt;
use std::sync::Arc;
use tracing::{error, info, Level};

#[allow(clippy::cognitive_complexity)]
fn main() {
    let args: Vec<_> = std::env::args().collect();
    guard!(let [_, config_file_path, ..] = &args[..] else {
        eprintln!("First argument should be path to config file");
        return
    });

    let config = match Config::from_file(config_file_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            return;
        }
    };

    // Set up logger output
    let subscriber_builder = tracing_subscriber::fmt().with_max_level(Level::DEBUG);
    if config.human_logs {
        subscriber_builder.init();
    } else {
        subscriber_builder.json().init();
    }

    info!("starting microblog");

    let sys = actix_rt::System::new("microblog");

    // Build the postgres client
    let db = PostgresStore::new(&config).expect("couldn't connect to Postgres");
    prometheus::register(Box::new(db.clone())).expect("couldn't register DB metrics");
    if config.run_migrations {
        if let Err(e) = db.run_migrations() {
            error!(error = %format!("{:#}", e), "schema is not up to date");
            return;
        }
        info!("database migrations applied");
    }

    let templates = match Templates::new() {
        Ok(templates) => templates,
        Err(e) => {
            error!(error = %format!("{:#}", e), "couldn't parse templates");
            return;
        }
    };
    let state = api::State {
        ds: Arc::new(db),
        templates: Arc::new(templates),
        posts_per_page: config.posts_per_page,
    };
    let sessions = web::Data::new(Sessions::new(&config));
    if !config.secure_cookies {
        info!("session cookies will be sent over plain HTTP");
    }

    // Start the website
    info!(addr = &config.listen_address[..], "starting website");
    let max_body_size = config.max_body_size;
    HttpServer::new(move || {
        App::new()
            // Middleware for Prometheus
            .wrap_fn(|request, srv| srv.call(request).map(increment_response_metrics))
            // Send back whatever the handlers did to the session
            .wrap_fn(|request, srv| srv.call(request).map(session::write_cookie))
            .app_data(sessions.clone())
            .data(state.clone())
            // enable logger
            .wrap(middleware::Logger::default())
            // limit size of the payload (global configuration)
            .app_data(web::FormConfig::default().limit(max_body_size))
            .configure(api::configure::<PostgresStore>)
            .default_service(web::route().to(api::not_found::<PostgresStore>))
    })
    .bind(config.listen_address.clone())
    .expect("couldn't start website HTTP server")
    .run();

    // Start the metrics server
    info!(
        addr = &config.metrics_address[..],
        "starting metrics server"
    );
    HttpServer::new(|| {
        App::new().service(
            web::scope("/metrics")
                .service(web::resource("/").route(web::get().to(metrics::endpoint::gather)))
                .service(web::resource("").route(web::get().to(metrics::endpoint::gather))),
        )
    })
    .bind(config.metrics_address)
    .expect("couldn't start metrics server")
    .run();

    sys.run().expect("actix runtime terminated");
}

/// If response is OK, increment the metrics for HTTP statuses.
fn increment_response_metrics<E, B>(
    response: Result<ServiceResponse<B>, E>,
) -> Result<ServiceResponse<B>, E> {
    match response {
        Ok(response) => {
            metrics::HTTP_RESPONSES
                .with_label_values(&[response.status().as_str()])
                .inc();
            Ok(response)
        }
        other => other,
    }
}
