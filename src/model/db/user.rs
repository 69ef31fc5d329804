use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{
    doc, serde_helpers::chrono_datetime_as_bson_datetime, to_bson, Bson,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{error::Error, model::mongodb::{Coll, Id}, Config};

/// The role a user acts in. Stored as a lowercase string in the database and
/// on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A regular alumni account.
    User,
    /// The single managing account of an institution.
    Admin,
    /// Platform operator; approves institutions.
    Superadmin,
}

impl From<Role> for Bson {
    fn from(role: Role) -> Self {
        to_bson(&role).expect("Serialisation is infallible")
    }
}

/// Core user data, as stored in the database.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserCore {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    /// The institution this account belongs to. Superadmins have none;
    /// regular users may register without one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution: Option<Id>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl UserCore {
    /// Create a new user, hashing the given plaintext password.
    pub fn new(
        full_name: String,
        email: String,
        password: &str,
        role: Role,
        institution: Option<Id>,
    ) -> Self {
        Self {
            full_name,
            email,
            password_hash: hash_password(password),
            role,
            institution,
            created_at: Utc::now(),
        }
    }

    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // Unwrap safe because the only way to store a hash is via
        // `hash_password`, so it is always well-formed.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap()
    }
}

/// Hash a password for storage.
fn hash_password(password: &str) -> String {
    // 16 bytes of salt is the recommendation for argon2.
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    argon2::hash_encoded(password.as_bytes(), &salt, &argon2::Config::default()).unwrap() // Safe because the default `Config` is valid.
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Ensure a superadmin account exists, creating one from the configured
/// bootstrap credentials when the collection has none. Skipped (with a
/// warning) when no credentials are configured.
pub async fn ensure_superadmin_exists(
    users: &Coll<NewUser>,
    config: &Config,
) -> Result<(), Error> {
    let (email, password) = match config.superadmin_credentials() {
        Some(credentials) => credentials,
        None => {
            warn!("Superadmin bootstrap credentials not configured; skipping");
            return Ok(());
        }
    };

    let existing = users
        .find_one(doc! { "role": Role::Superadmin }, None)
        .await?;
    if existing.is_none() {
        let superadmin = NewUser::new(
            "Platform Operator".to_string(),
            email.to_string(),
            password,
            Role::Superadmin,
            None,
        );
        users.insert_one(superadmin, None).await?;
        info!("Created default superadmin account for {email}");
    }

    Ok(())
}


#[cfg(test)]
pub use examples::EXAMPLE_PASSWORD;
