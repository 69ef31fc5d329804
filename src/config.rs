use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    fs::FileServer,
    Build, Rocket,
};
use serde::Deserialize;

use crate::{
    error::Error,
    gateway::PaymentClient,
    mail::Mailer,
    model::{db::user::ensure_superadmin_exists, mongodb::{ensure_indexes_exist, Coll}},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
///
/// The signing secret is deliberately optional: launching without it is
/// allowed, but any operation that needs it responds with an explicit 500
/// instead of running insecurely.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    base_url: String,
    frontend_url: String,
    upload_dir: String,
    auth_ttl: u32,
    // secrets
    #[serde(default)]
    jwt_secret: Option<String>,
    #[serde(default)]
    superadmin_email: Option<String>,
    #[serde(default)]
    superadmin_password: Option<String>,
}

impl Config {
    /// The public URL this server is reachable on.
    /// Used to build upload URLs and payment-gateway redirect targets.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL of the single-page frontend.
    /// Used in emailed registration links and payment redirects.
    pub fn frontend_url(&self) -> &str {
        &self.frontend_url
    }

    /// Directory uploaded files are stored in and served from.
    pub fn upload_dir(&self) -> &str {
        &self.upload_dir
    }

    /// Valid lifetime of auth tokens in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign JWTs.
    /// Configured via `JWT_SECRET`; unset yields a `Configuration` error.
    pub fn jwt_secret(&self) -> Result<&[u8], Error> {
        self.jwt_secret
            .as_deref()
            .map(str::as_bytes)
            .ok_or_else(|| Error::Configuration("JWT_SECRET is not set".to_string()))
    }

    /// Bootstrap credentials for the default superadmin account, if configured.
    pub fn superadmin_credentials(&self) -> Option<(&str, &str)> {
        match (&self.superadmin_email, &self.superadmin_password) {
            (Some(email), Some(password)) => Some((email, password)),
            _ => None,
        }
    }
}

/// A fairing that loads the application config, prepares the upload
/// directory, mounts the static file server over it, and puts the config in
/// managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // The upload directory must exist before the file server is mounted.
        if let Err(e) = std::fs::create_dir_all(config.upload_dir()) {
            error!("Failed to create upload directory: {e}");
            return Err(rocket);
        }
        rocket = rocket.mount("/uploads", FileServer::from(config.upload_dir()));

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }

        // Ensure there is a superadmin able to approve institutions, when
        // bootstrap credentials are configured.
        let app_config = rocket
            .state::<Config>()
            .expect("Config fairing must be attached first");
        if let Err(e) = ensure_superadmin_exists(&Coll::from_db(&db), app_config).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "knot".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

/// Configuration for outbound email.
#[derive(Deserialize)]
pub struct MailConfig {
    // non-secrets
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    // secrets
    #[serde(default)]
    pub email_user: Option<String>,
    #[serde(default)]
    pub email_pass: Option<String>,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

/// A fairing that loads the SMTP config and places a [`Mailer`] into managed
/// state. Missing credentials are tolerated: the mailer is constructed
/// disabled and reports a configuration error when asked to send.
pub struct MailFairing;

#[rocket::async_trait]
impl Fairing for MailFairing {
    fn info(&self) -> Info {
        Info {
            name: "SMTP",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<MailConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load SMTP config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let mailer = match Mailer::from_config(&config) {
            Ok(mailer) => mailer,
            Err(e) => {
                error!("Failed to construct SMTP transport: {e}");
                return Err(rocket);
            }
        };

        rocket = rocket.manage(mailer);
        Ok(rocket)
    }
}

/// Configuration for the payment gateway.
#[derive(Deserialize)]
pub struct PaymentConfig {
    // non-secrets
    #[serde(default = "default_payment_url")]
    pub payment_url: String,
    #[serde(default)]
    pub paymaya_smi: Option<String>,
    // secrets
    #[serde(default)]
    pub paymaya_public_key: Option<String>,
    #[serde(default)]
    pub paymaya_secret_key: Option<String>,
}

fn default_payment_url() -> String {
    "https://pg-sandbox.paymaya.com/payby/v2/paymaya/payments".to_string()
}

/// A fairing that loads the payment gateway config and places a
/// [`PaymentClient`] into managed state.
pub struct PaymentFairing;

#[rocket::async_trait]
impl Fairing for PaymentFairing {
    fn info(&self) -> Info {
        Info {
            name: "Payment gateway",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<PaymentConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load payment gateway config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        rocket = rocket.manage(PaymentClient::new(config));
        Ok(rocket)
    }
}
