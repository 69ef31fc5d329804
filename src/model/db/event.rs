use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, Document};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core event data, as stored in the database.
///
/// Events share the campaign archival semantics but carry no donations.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventCore {
    pub title: String,
    pub location: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
    pub description: String,
    /// URLs of the uploaded pictures.
    pub pictures: Vec<String>,
    pub key_terms: Vec<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    /// One-way archival flag; there is no reopen operation.
    pub is_closed: bool,
    /// The owning institution. Every read and write is scoped by it.
    pub institution: Id,
}

/// An event without an ID.
pub type NewEvent = EventCore;

/// An event from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub event: EventCore,
}

impl Event {
    /// Filter for the institution-scoped listing, optionally narrowed by the
    /// archival flag and a case-insensitive substring match on the title.
    pub fn list_filter(institution: Id, is_closed: Option<bool>, search: Option<&str>) -> Document {
        let mut filter = doc! { "institution": institution };
        if let Some(is_closed) = is_closed {
            filter.insert("is_closed", is_closed);
        }
        if let Some(search) = search {
            filter.insert("title", doc! { "$regex": search, "$options": "i" });
        }
        filter
    }
}

impl Deref for Event {
    type Target = EventCore;

    fn deref(&self) -> &Self::Target {
        &self.event
    }
}

impl DerefMut for Event {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.event
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;
    use chrono::Duration;

    impl EventCore {
        pub fn example(institution: Id) -> Self {
            Self {
                title: "Alumni Homecoming Gala".to_string(),
                location: "Riverdale Grand Hall".to_string(),
                start_date: Utc::now() + Duration::days(7),
                end_date: Utc::now() + Duration::days(8),
                description: "An evening to reconnect with your batchmates.".to_string(),
                pictures: Vec::new(),
                key_terms: vec!["homecoming".to_string()],
                created_at: Utc::now(),
                is_closed: false,
                institution,
            }
        }
    }
}
