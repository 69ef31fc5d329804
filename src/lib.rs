#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod mail;
pub mod model;
pub mod upload;

pub use config::Config;

/// Assemble the server: routes, catchers and the fairings that load
/// configuration, connect to MongoDB, and construct the external clients.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(config::ConfigFairing)
        .attach(config::DatabaseFairing)
        .attach(config::MailFairing)
        .attach(config::PaymentFairing)
        .attach(logging::LoggerFairing)
}

/// Connect to the test database server configured via `db_uri`.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri = rocket::build()
        .figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(&db_uri)
        .await
        .unwrap_or_else(|_| panic!("Could not connect to database with `db_uri` \"{db_uri}\""))
}

/// Get a random database name to avoid collisions between tests.
#[cfg(test)]
pub(crate) fn database() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}

/// Assemble a server against a specific database, bypassing the database
/// fairing so tests control which database gets dropped afterwards.
#[cfg(test)]
pub(crate) async fn rocket_for_db(client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    use rocket::fs::FileServer;

    let rocket = rocket::build();
    let config = rocket
        .figment()
        .extract::<Config>()
        .expect("invalid test config");
    let mail_config = rocket
        .figment()
        .extract::<config::MailConfig>()
        .expect("invalid test SMTP config");
    let payment_config = rocket
        .figment()
        .extract::<config::PaymentConfig>()
        .expect("invalid test payment config");

    let db = client.database(db_name);
    model::mongodb::ensure_indexes_exist(&db)
        .await
        .expect("failed to create indexes");
    std::fs::create_dir_all(config.upload_dir()).expect("failed to create upload directory");

    rocket
        .mount("/", api::routes())
        .mount("/uploads", FileServer::from(config.upload_dir()))
        .register("/", api::catchers())
        .manage(mail::Mailer::from_config(&mail_config).expect("failed to construct mailer"))
        .manage(gateway::PaymentClient::new(payment_config))
        .manage(config)
        .manage(client)
        .manage(db)
}
