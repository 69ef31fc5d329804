use chrono::{DateTime, Utc};
use rocket::fs::TempFile;
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{datetime::ApiDateTime, id::ApiId},
    db::event::Event,
};

/// The multipart creation form for an event.
#[derive(FromForm)]
pub struct EventForm<'r> {
    pub title: String,
    pub location: String,
    #[field(name = "startDate")]
    pub start_date: ApiDateTime,
    #[field(name = "endDate")]
    pub end_date: ApiDateTime,
    pub description: String,
    /// JSON-encoded array of strings, as the frontend submits it.
    #[field(name = "keyTerms")]
    pub key_terms: Option<String>,
    pub pictures: Vec<TempFile<'r>>,
}

/// The multipart update form: every field optional, fresh pictures replace
/// the existing list.
#[derive(FromForm)]
pub struct EventUpdateForm<'r> {
    pub title: Option<String>,
    pub location: Option<String>,
    #[field(name = "startDate")]
    pub start_date: Option<ApiDateTime>,
    #[field(name = "endDate")]
    pub end_date: Option<ApiDateTime>,
    pub description: Option<String>,
    #[field(name = "keyTerms")]
    pub key_terms: Option<String>,
    pub pictures: Vec<TempFile<'r>>,
}

/// An event as returned by the API.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDescription {
    pub id: ApiId,
    pub title: String,
    pub location: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub description: String,
    pub pictures: Vec<String>,
    pub key_terms: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub is_closed: bool,
    pub institution: ApiId,
}

impl From<Event> for EventDescription {
    fn from(event: Event) -> Self {
        let core = event.event;
        Self {
            id: event.id.into(),
            title: core.title,
            location: core.location,
            start_date: core.start_date,
            end_date: core.end_date,
            description: core.description,
            pictures: core.pictures,
            key_terms: core.key_terms,
            created_at: core.created_at,
            is_closed: core.is_closed,
            institution: core.institution.into(),
        }
    }
}
