use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{
    db::user::{Role, User},
    mongodb::{Coll, Id},
};

use super::rights::{AnyUser, Rights};

pub const BEARER_PREFIX: &str = "Bearer ";

/// An authentication token representing a specific user with a specific role.
/// Carried in the `Authorization` header as a signed, time-boxed JWT.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<R> {
    pub id: Id,
    pub role: Role,
    #[serde(skip)]
    phantom: PhantomData<R>,
}

impl AuthToken<AnyUser> {
    /// Create a new [`AuthToken`] for the given user.
    pub fn for_user(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            phantom: PhantomData,
        }
    }

    /// Sign this token into its wire form.
    pub fn encode(self, config: &Config) -> Result<String, Error> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()?),
        )?;
        Ok(token)
    }
}

impl<R> AuthToken<R> {
    /// Verify and decode a token from its wire form.
    pub fn decode(token: &str, config: &Config) -> Result<Self, Error> {
        let data: TokenData<Claims<R>> = jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()?),
            &Validation::default(),
        )?;
        Ok(data.claims.token)
    }
}

/// Token claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<R> {
    #[serde(flatten, bound = "")]
    token: AuthToken<R>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, R> FromRequest<'r> for AuthToken<R>
where
    R: Rights,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the `Authorization` header, check the user
    /// behind it still exists, and verify their current role carries the
    /// required rights.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let header = match req.headers().get_one("Authorization") {
            Some(header) => header,
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::unauthorized("No authentication token provided"),
                ))
            }
        };
        let token = match header.strip_prefix(BEARER_PREFIX) {
            Some(token) => token,
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::unauthorized("Malformed Authorization header"),
                ))
            }
        };

        // Decode the token. A missing signing secret is a server problem,
        // not the client's.
        let token = match Self::decode(token, config) {
            Ok(token) => token,
            Err(err @ Error::Configuration(_)) => {
                return Outcome::Failure((Status::InternalServerError, err))
            }
            Err(err) => return Outcome::Failure((Status::Unauthorized, err)),
        };

        // Check the user still exists, and judge rights by their current
        // role rather than the one baked into the token.
        let db = req.guard::<&State<mongodb::Database>>().await.unwrap();
        let user = match Coll::<User>::from_db(db).find_one(token.id.as_doc(), None).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::unauthorized("Invalid or expired token"),
                ))
            }
            Err(err) => return Outcome::Failure((Status::InternalServerError, err.into())),
        };

        if R::permits(user.role) {
            Outcome::Success(Self {
                id: token.id,
                role: user.role,
                phantom: PhantomData,
            })
        } else {
            Outcome::Failure((
                Status::Forbidden,
                Error::forbidden("You do not have permission to perform this action"),
            ))
        }
    }
}

/// Like `Option<AuthToken<AnyUser>>`, but only the *absence* of the
/// `Authorization` header falls through to the anonymous case; a header that
/// is present but invalid still fails the request with 401.
pub struct OptionalToken(pub Option<AuthToken<AnyUser>>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for OptionalToken {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        if req.headers().get_one("Authorization").is_none() {
            return Outcome::Success(Self(None));
        }
        match req.guard::<AuthToken<AnyUser>>().await {
            Outcome::Success(token) => Outcome::Success(Self(Some(token))),
            Outcome::Failure(failure) => Outcome::Failure(failure),
            Outcome::Forward(forward) => Outcome::Forward(forward),
        }
    }
}
