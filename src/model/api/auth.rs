use serde::{Deserialize, Serialize};

use crate::model::{
    api::{id::ApiId, institution::InstitutionDescription},
    db::{
        institution::Institution,
        user::{Role, User},
    },
    mongodb::Id,
};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Self-registration request. Always produces a `role=user` account.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub institution: Option<Id>,
}

/// Raw login credentials. These are never stored; the password only ever
/// meets the stored hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Request to create the single admin account of an approved institution.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAdminRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

/// Confirmation of a newly registered account.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: ApiId,
}

/// A user profile as returned by `/auth/me` and the login response, with the
/// institution reference resolved to its full record.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDescription {
    pub id: ApiId,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub institution: Option<InstitutionDescription>,
}

impl UserDescription {
    pub fn new(user: User, institution: Option<Institution>) -> Self {
        Self {
            id: user.id.into(),
            full_name: user.user.full_name,
            email: user.user.email,
            role: user.user.role,
            institution: institution.map(InstitutionDescription::from),
        }
    }
}

/// Successful login: the bearer token plus the profile it represents.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserDescription,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;
    use crate::model::db::user::EXAMPLE_PASSWORD;

    impl Credentials {
        pub fn example_user() -> Self {
            Self {
                email: "avery.cole@example.com".to_string(),
                password: EXAMPLE_PASSWORD.to_string(),
            }
        }

        pub fn example_admin() -> Self {
            Self {
                email: "morgan.reyes@example.com".to_string(),
                password: EXAMPLE_PASSWORD.to_string(),
            }
        }

        pub fn example_superadmin() -> Self {
            Self {
                email: "operator@example.com".to_string(),
                password: EXAMPLE_PASSWORD.to_string(),
            }
        }
    }

    impl RegisterRequest {
        pub fn example() -> Self {
            Self {
                full_name: "Rowan Diaz".to_string(),
                email: "rowan.diaz@example.com".to_string(),
                password: "a-long-enough-password".to_string(),
                institution: None,
            }
        }
    }
}

/// A ready-to-attach `Authorization` header for a logged-in test account,
/// injected by the `backend_test` harness.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct AuthHeader(pub String);

#[cfg(test)]
impl From<AuthHeader> for rocket::http::Header<'static> {
    fn from(auth: AuthHeader) -> Self {
        rocket::http::Header::new("Authorization", format!("Bearer {}", auth.0))
    }
}
