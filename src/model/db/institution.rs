use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, Document};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Maximum number of verification documents accepted at registration.
pub const MAX_VERIFICATION_DOCUMENTS: usize = 5;

/// Maximum length of the mission statement.
pub const MAX_MISSION_STATEMENT_LENGTH: usize = 500;

/// Core institution data, as stored in the database.
///
/// Institutions register themselves and stay invisible to the rest of the
/// platform until a superadmin approves them; approval is one-way.
#[derive(Debug, Serialize, Deserialize)]
pub struct InstitutionCore {
    pub official_name: String,
    pub institution_type: String,
    pub accreditation_status: String,
    pub contact_email: String,
    pub contact_phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    pub physical_address: String,
    /// URLs of the uploaded verification documents.
    pub verification_documents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mission_statement: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    pub is_approved: bool,
}

/// An institution without an ID.
pub type NewInstitution = InstitutionCore;

/// An institution from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Institution {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub institution: InstitutionCore,
}

impl Institution {
    /// Filter for the approval listings, optionally narrowed by a
    /// case-insensitive substring match on the official name.
    ///
    /// Pending institutions are matched as "not approved" rather than
    /// "approved is false" so that documents predating the flag still show up.
    pub fn list_filter(approved: bool, search: Option<&str>) -> Document {
        let mut filter = if approved {
            doc! { "is_approved": true }
        } else {
            doc! { "is_approved": { "$ne": true } }
        };
        if let Some(search) = search {
            filter.insert("official_name", doc! { "$regex": search, "$options": "i" });
        }
        filter
    }
}

impl Deref for Institution {
    type Target = InstitutionCore;

    fn deref(&self) -> &Self::Target {
        &self.institution
    }
}

impl DerefMut for Institution {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.institution
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl InstitutionCore {
        pub fn example() -> Self {
            Self {
                official_name: "Riverdale State University".to_string(),
                institution_type: "University".to_string(),
                accreditation_status: "Accredited".to_string(),
                contact_email: "registrar@riverdale.example.edu".to_string(),
                contact_phone: "+63 2 8123 4567".to_string(),
                website: Some("https://riverdale.example.edu".to_string()),
                physical_address: "1 University Avenue, Riverdale".to_string(),
                verification_documents: Vec::new(),
                logo: None,
                mission_statement: Some("Lifelong learning for all.".to_string()),
                created_at: Utc::now(),
                is_approved: true,
            }
        }

        pub fn example2() -> Self {
            Self {
                official_name: "Lakeshore Community College".to_string(),
                institution_type: "College".to_string(),
                accreditation_status: "Candidate".to_string(),
                contact_email: "office@lakeshore.example.edu".to_string(),
                contact_phone: "+63 2 8765 4321".to_string(),
                website: None,
                physical_address: "22 Shoreline Drive, Lakeshore".to_string(),
                verification_documents: Vec::new(),
                logo: None,
                mission_statement: None,
                created_at: Utc::now(),
                is_approved: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_filter_matches_missing_flag() {
        let filter = Institution::list_filter(false, None);
        assert_eq!(filter.get_document("is_approved").unwrap(), &doc! { "$ne": true });
    }

    #[test]
    fn search_is_case_insensitive_regex() {
        let filter = Institution::list_filter(true, Some("river"));
        assert_eq!(filter.get_bool("is_approved").unwrap(), true);
        let search = filter.get_document("official_name").unwrap();
        assert_eq!(search.get_str("$regex").unwrap(), "river");
        assert_eq!(search.get_str("$options").unwrap(), "i");
    }
}
