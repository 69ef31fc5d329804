use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, Document};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Maximum number of pictures attached to a campaign or event.
pub const MAX_PICTURES: usize = 3;

/// Maximum length of a campaign or event description.
pub const MAX_DESCRIPTION_LENGTH: usize = 300;

/// A single monetary contribution, embedded in its campaign.
///
/// Donations are append-only; there is no operation to edit or remove one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donation {
    pub name: String,
    pub email: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub receive_updates: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub donated_at: DateTime<Utc>,
}

/// Core campaign data, as stored in the database.
#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignCore {
    pub title: String,
    pub target_amount: f64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
    pub description: String,
    /// URLs of the uploaded pictures.
    pub pictures: Vec<String>,
    pub key_terms: Vec<String>,
    pub contact_email: String,
    pub contact_phone: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    /// One-way archival flag; there is no reopen operation.
    pub is_closed: bool,
    /// The owning institution. Every read and write is scoped by it.
    pub institution: Id,
    /// Amount credited by confirmed gateway payments.
    pub collected_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_payment_status: Option<String>,
    pub donations: Vec<Donation>,
}

impl CampaignCore {
    /// Total raised across the embedded donations.
    pub fn total_raised(&self) -> f64 {
        self.donations.iter().map(|donation| donation.amount).sum()
    }
}

/// A campaign without an ID.
pub type NewCampaign = CampaignCore;

/// A campaign from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Campaign {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub campaign: CampaignCore,
}

impl Campaign {
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

impl Deref for Campaign {
    type Target = CampaignCore;

    fn deref(&self) -> &Self::Target {
        &self.campaign
    }
}

impl DerefMut for Campaign {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.campaign
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_raised_sums_donations() {
        let mut campaign = CampaignCore::example(Id::new());
        for amount in [100.0, 50.0, 75.0] {
            campaign.donations.push(Donation::example(amount));
        }
        assert_eq!(campaign.total_raised(), 225.0);
        assert_eq!(campaign.target_amount, 500.0);
    }

    #[test]
    fn list_filter_is_institution_scoped() {
        let institution = Id::new();
        let filter = Campaign::list_filter(institution, Some(false), Some("fund"));
        assert_eq!(filter.get_object_id("institution").unwrap(), *institution);
        assert_eq!(filter.get_bool("is_closed").unwrap(), false);
        assert_eq!(
            filter.get_document("title").unwrap().get_str("$regex").unwrap(),
            "fund"
        );
    }

    #[test]
    fn list_filter_without_flags_only_scopes() {
        let filter = Campaign::list_filter(Id::new(), None, None);
        assert!(filter.get("is_closed").is_none());
        assert!(filter.get("title").is_none());
    }
}
