use std::io::Cursor;

use jsonwebtoken::errors::Error as JwtError;
use mongodb::error::Error as DbError;
use rocket::{
    http::{ContentType, Status},
    response::Responder,
    serde::json::serde_json::json,
    Request, Response,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// All the ways a request can fail. Every variant maps onto a status code and
/// is rendered as a JSON body with a human-readable `message`.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    BsonSer(#[from] mongodb::bson::ser::Error),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error(transparent)]
    Email(#[from] lettre::error::Error),
    #[error(transparent)]
    EmailAddress(#[from] lettre::address::AddressError),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Server misconfigured: {0}")]
    Configuration(String),
    /// A non-2xx reply from the payment gateway; status and body are passed
    /// through to the client verbatim.
    #[error("Payment gateway error ({status}): {body}")]
    Upstream { status: u16, body: String },
}

impl Error {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    fn status(&self) -> Status {
        match self {
            Self::BadRequest(_) => Status::BadRequest,
            // Expired and malformed tokens alike must not reveal more than
            // "not authenticated".
            Self::Unauthorized(_) | Self::Jwt(_) => Status::Unauthorized,
            Self::Forbidden(_) => Status::Forbidden,
            Self::NotFound(_) => Status::NotFound,
            Self::Upstream { status, .. } => Status::new(*status),
            Self::Db(_)
            | Self::BsonSer(_)
            | Self::Io(_)
            | Self::Http(_)
            | Self::Smtp(_)
            | Self::Email(_)
            | Self::EmailAddress(_)
            | Self::Configuration(_) => Status::InternalServerError,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status.code >= 500 {
            error!("{self}");
        } else {
            warn!("{self}");
        }

        let body = match self {
            Self::Upstream { body, .. } => body,
            other => json!({ "message": other.to_string() }).to_string(),
        };

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}
