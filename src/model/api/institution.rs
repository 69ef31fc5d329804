use chrono::{DateTime, Utc};
use rocket::fs::TempFile;
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::institution::Institution};

/// The multipart registration form for a new institution.
#[derive(FromForm)]
pub struct InstitutionForm<'r> {
    #[field(name = "officialInstitutionName")]
    pub official_name: String,
    #[field(name = "institutionType")]
    pub institution_type: String,
    #[field(name = "accreditationStatus")]
    pub accreditation_status: String,
    #[field(name = "contactEmail")]
    pub contact_email: String,
    #[field(name = "contactPhone")]
    pub contact_phone: String,
    #[field(name = "institutionWebsite")]
    pub website: Option<String>,
    #[field(name = "physicalAddress")]
    pub physical_address: String,
    #[field(name = "missionStatement")]
    pub mission_statement: Option<String>,
    #[field(name = "verificationDocuments")]
    pub verification_documents: Vec<TempFile<'r>>,
    #[field(name = "institutionLogo")]
    pub logo: Option<TempFile<'r>>,
}

/// An institution as returned by the API.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionDescription {
    pub id: ApiId,
    pub official_name: String,
    pub institution_type: String,
    pub accreditation_status: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub website: Option<String>,
    pub physical_address: String,
    pub verification_documents: Vec<String>,
    pub logo: Option<String>,
    pub mission_statement: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_approved: bool,
}

impl From<Institution> for InstitutionDescription {
    fn from(institution: Institution) -> Self {
        let core = institution.institution;
        Self {
            id: institution.id.into(),
            official_name: core.official_name,
            institution_type: core.institution_type,
            accreditation_status: core.accreditation_status,
            contact_email: core.contact_email,
            contact_phone: core.contact_phone,
            website: core.website,
            physical_address: core.physical_address,
            verification_documents: core.verification_documents,
            logo: core.logo,
            mission_statement: core.mission_statement,
            created_at: core.created_at,
            is_approved: core.is_approved,
        }
    }
}

/// The caller's own institution, as returned by `/institutions/mine`.
#[derive(Debug, Serialize, Deserialize)]
pub struct InstitutionSummary {
    pub id: ApiId,
    pub name: String,
}

impl From<Institution> for InstitutionSummary {
    fn from(institution: Institution) -> Self {
        Self {
            id: institution.id.into(),
            name: institution.institution.official_name,
        }
    }
}
