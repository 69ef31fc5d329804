use std::path::Path;

use mongodb::bson::oid::ObjectId;
use rocket::fs::TempFile;
use rocket::http::ContentType;

use crate::{
    error::{Error, Result},
    Config,
};

/// Size cap for campaign/event pictures.
pub const MAX_IMAGE_SIZE: u64 = 5 * 1024 * 1024;

/// Size cap for institution uploads (verification documents and logo).
pub const MAX_DOCUMENT_SIZE: u64 = 10 * 1024 * 1024;

/// Persist a picture upload, enforcing the image MIME types and size cap.
/// Returns the public URL of the stored file.
pub async fn store_picture(
    file: &mut TempFile<'_>,
    field: &str,
    config: &Config,
) -> Result<String> {
    let is_image = matches!(
        file.content_type(),
        Some(ct) if *ct == ContentType::JPEG || *ct == ContentType::PNG || *ct == ContentType::GIF
    );
    if !is_image {
        return Err(Error::bad_request(
            "Only JPEG, PNG, GIF images are allowed.",
        ));
    }
    if file.len() > MAX_IMAGE_SIZE {
        return Err(Error::bad_request("Images must be at most 5MB each"));
    }
    store(file, field, config).await
}

/// Persist an institution document upload. Any file type is accepted, within
/// the size cap.
pub async fn store_document(
    file: &mut TempFile<'_>,
    field: &str,
    config: &Config,
) -> Result<String> {
    if file.len() > MAX_DOCUMENT_SIZE {
        return Err(Error::bad_request("Documents must be at most 10MB each"));
    }
    store(file, field, config).await
}

/// Write the upload into the upload directory under a unique name derived
/// from the form field, and return its public URL.
async fn store(file: &mut TempFile<'_>, field: &str, config: &Config) -> Result<String> {
    let extension = file
        .content_type()
        .and_then(ContentType::extension)
        .map(|ext| ext.as_str().to_owned())
        .unwrap_or_else(|| "bin".to_owned());
    let filename = format!("{field}-{}.{extension}", ObjectId::new().to_hex());

    let path = Path::new(config.upload_dir()).join(&filename);
    file.copy_to(&path).await?;

    Ok(format!("{}/uploads/{filename}", config.base_url()))
}

/// Best-effort removal of a previously stored file, given its public URL.
/// Unrecognised URLs and already-missing files are ignored; removal failures
/// are logged and swallowed.
pub fn remove_stored_file(url: &str, config: &Config) {
    let filename = match url.split("/uploads/").nth(1) {
        Some(filename) if !filename.is_empty() => filename,
        _ => return,
    };
    // Stored names never contain separators; anything else is not ours.
    if filename.contains('/') || filename.contains('\\') {
        return;
    }

    let path = Path::new(config.upload_dir()).join(filename);
    if path.exists() {
        if let Err(err) = std::fs::remove_file(&path) {
            warn!("Failed to delete upload {}: {err}", path.display());
        }
    }
}
