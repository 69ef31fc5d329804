use rocket::fs::TempFile;

use crate::error::{Error, Result};
use crate::model::{
    auth::AuthToken,
    db::{
        campaign::{MAX_DESCRIPTION_LENGTH, MAX_PICTURES},
        user::User,
    },
    mongodb::{Coll, Id},
};
use crate::{upload, Config};

/// Resolve the full user record behind an authentication token.
pub async fn get_user_from_token<R>(token: &AuthToken<R>, users: &Coll<User>) -> Result<User> {
    users
        .find_one(token.id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("No user found with ID {:?}", token.id)))
}

/// The institution a user manages content under. Accounts without one cannot
/// touch institution-scoped resources.
pub fn require_institution(user: &User) -> Result<Id> {
    user.institution.ok_or_else(|| {
        Error::forbidden("You must belong to an institution to access this resource")
    })
}

/// Enforce the description length cap shared by campaigns and events.
pub fn validate_description(description: &str) -> Result<()> {
    if description.len() > MAX_DESCRIPTION_LENGTH {
        return Err(Error::bad_request(format!(
            "Description must be at most {MAX_DESCRIPTION_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Store the pictures of a campaign/event form, enforcing the count cap and
/// the per-file image checks. Returns the public URLs in upload order.
pub async fn store_pictures(files: &mut [TempFile<'_>], config: &Config) -> Result<Vec<String>> {
    if files.len() > MAX_PICTURES {
        return Err(Error::bad_request(format!(
            "A maximum of {MAX_PICTURES} pictures is allowed"
        )));
    }
    let mut urls = Vec::with_capacity(files.len());
    for file in files.iter_mut() {
        if file.len() == 0 {
            continue;
        }
        urls.push(upload::store_picture(file, "pictures", config).await?);
    }
    Ok(urls)
}

/// Builder for raw multipart bodies, for exercising the upload endpoints from
/// local dispatches.
#[cfg(test)]
pub mod multipart {
    use rocket::http::ContentType;

    const BOUNDARY: &str = "knot-test-boundary";

    pub struct MultipartBody {
        body: Vec<u8>,
    }

    impl MultipartBody {
        #[allow(clippy::new_without_default)]
        pub fn new() -> Self {
            Self { body: Vec::new() }
        }

        pub fn text(mut self, name: &str, value: &str) -> Self {
            self.body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
            self
        }

        pub fn file(
            mut self,
            name: &str,
            filename: &str,
            content_type: &str,
            bytes: &[u8],
        ) -> Self {
            self.body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                     filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            self.body.extend_from_slice(bytes);
            self.body.extend_from_slice(b"\r\n");
            self
        }

        pub fn finish(mut self) -> Vec<u8> {
            self.body
                .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
            self.body
        }

        pub fn content_type() -> ContentType {
            ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY))
        }
    }

    /// A few bytes that pass for a JPEG as far as the declared MIME type is
    /// concerned.
    pub const FAKE_JPEG: &[u8] = b"\xFF\xD8\xFF\xE0fake-jpeg-bytes";
}
