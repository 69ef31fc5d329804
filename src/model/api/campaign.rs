use chrono::{DateTime, Utc};
use rocket::fs::TempFile;
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{datetime::ApiDateTime, id::ApiId},
    db::campaign::{Campaign, Donation},
};

/// The multipart creation form for a campaign.
#[derive(FromForm)]
pub struct CampaignForm<'r> {
    pub title: String,
    #[field(name = "targetAmount")]
    pub target_amount: f64,
    #[field(name = "startDate")]
    pub start_date: ApiDateTime,
    #[field(name = "endDate")]
    pub end_date: ApiDateTime,
    pub description: String,
    /// JSON-encoded array of strings, as the frontend submits it.
    #[field(name = "keyTerms")]
    pub key_terms: Option<String>,
    #[field(name = "contactEmail")]
    pub contact_email: String,
    #[field(name = "contactPhone")]
    pub contact_phone: String,
    pub pictures: Vec<TempFile<'r>>,
}

/// The multipart update form: every field optional, fresh pictures replace
/// the existing list.
#[derive(FromForm)]
pub struct CampaignUpdateForm<'r> {
    pub title: Option<String>,
    #[field(name = "targetAmount")]
    pub target_amount: Option<f64>,
    #[field(name = "startDate")]
    pub start_date: Option<ApiDateTime>,
    #[field(name = "endDate")]
    pub end_date: Option<ApiDateTime>,
    pub description: Option<String>,
    #[field(name = "keyTerms")]
    pub key_terms: Option<String>,
    #[field(name = "contactEmail")]
    pub contact_email: Option<String>,
    #[field(name = "contactPhone")]
    pub contact_phone: Option<String>,
    pub pictures: Vec<TempFile<'r>>,
}

/// Decode the frontend's JSON-encoded key terms, tolerating garbage the same
/// way the frontend tolerates it: by dropping it.
pub fn parse_key_terms(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|raw| rocket::serde::json::serde_json::from_str(raw).ok())
        .unwrap_or_default()
}

/// A donation request from the public form. Deliberately unauthenticated.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationRequest {
    pub name: String,
    pub email: String,
    pub amount: f64,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub receive_updates: bool,
}

impl From<DonationRequest> for Donation {
    fn from(request: DonationRequest) -> Self {
        Self {
            name: request.name,
            email: request.email,
            amount: request.amount,
            company: request.company,
            receive_updates: request.receive_updates,
            donated_at: Utc::now(),
        }
    }
}

/// A donation as returned inside a campaign.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationDescription {
    pub name: String,
    pub email: String,
    pub amount: f64,
    pub company: Option<String>,
    pub receive_updates: bool,
    pub donated_at: DateTime<Utc>,
}

impl From<Donation> for DonationDescription {
    fn from(donation: Donation) -> Self {
        Self {
            name: donation.name,
            email: donation.email,
            amount: donation.amount,
            company: donation.company,
            receive_updates: donation.receive_updates,
            donated_at: donation.donated_at,
        }
    }
}

/// A campaign as returned by the API.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignDescription {
    pub id: ApiId,
    pub title: String,
    pub target_amount: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub description: String,
    pub pictures: Vec<String>,
    pub key_terms: Vec<String>,
    pub contact_email: String,
    pub contact_phone: String,
    pub created_at: DateTime<Utc>,
    pub is_closed: bool,
    pub institution: ApiId,
    pub collected_amount: f64,
    pub last_payment_status: Option<String>,
    /// Total of the embedded donations, precomputed for progress displays.
    pub raised_amount: f64,
    pub donations: Vec<DonationDescription>,
}

impl From<Campaign> for CampaignDescription {
    fn from(campaign: Campaign) -> Self {
        let raised_amount = campaign.total_raised();
        let core = campaign.campaign;
        Self {
            id: campaign.id.into(),
            title: core.title,
            target_amount: core.target_amount,
            start_date: core.start_date,
            end_date: core.end_date,
            description: core.description,
            pictures: core.pictures,
            key_terms: core.key_terms,
            contact_email: core.contact_email,
            contact_phone: core.contact_phone,
            created_at: core.created_at,
            is_closed: core.is_closed,
            institution: core.institution.into(),
            collected_amount: core.collected_amount,
            last_payment_status: core.last_payment_status,
            raised_amount,
            donations: core.donations.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_terms_fall_back_to_empty() {
        assert_eq!(
            parse_key_terms(Some(r#"["library","alumni"]"#)),
            vec!["library".to_string(), "alumni".to_string()]
        );
        assert!(parse_key_terms(Some("not json")).is_empty());
        assert!(parse_key_terms(None).is_empty());
    }
}
