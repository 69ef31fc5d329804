use mongodb::bson::doc;
use rocket::{
    form::Form,
    futures::TryStreamExt,
    response::status,
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    mail::Mailer,
    model::{
        api::{
            institution::{InstitutionDescription, InstitutionForm, InstitutionSummary},
            pagination::{ListRequest, Paginated},
        },
        auth::{AnyUser, AuthToken, SuperAdmin},
        db::{
            institution::{
                Institution, NewInstitution, MAX_MISSION_STATEMENT_LENGTH,
                MAX_VERIFICATION_DOCUMENTS,
            },
            user::User,
        },
        mongodb::{Coll, Id},
    },
    upload, Config,
};

use super::common::get_user_from_token;

pub fn routes() -> Vec<Route> {
    routes![
        create_institution,
        pending_institutions,
        approved_institutions,
        approve_institution,
        my_institution,
    ]
}

#[post("/institutions", data = "<form>")]
async fn create_institution(
    form: Form<InstitutionForm<'_>>,
    new_institutions: Coll<NewInstitution>,
    institutions: Coll<Institution>,
    config: &State<Config>,
) -> Result<status::Created<Json<InstitutionDescription>>> {
    let mut form = form.into_inner();

    if form.verification_documents.len() > MAX_VERIFICATION_DOCUMENTS {
        return Err(Error::bad_request(format!(
            "A maximum of {MAX_VERIFICATION_DOCUMENTS} verification documents is allowed"
        )));
    }
    if let Some(mission) = &form.mission_statement {
        if mission.len() > MAX_MISSION_STATEMENT_LENGTH {
            return Err(Error::bad_request(format!(
                "Mission statement must be at most {MAX_MISSION_STATEMENT_LENGTH} characters"
            )));
        }
    }

    let mut verification_documents = Vec::with_capacity(form.verification_documents.len());
    for file in form.verification_documents.iter_mut() {
        if file.len() == 0 {
            continue;
        }
        verification_documents
            .push(upload::store_document(file, "verificationDocuments", config).await?);
    }
    let logo = match form.logo.as_mut().filter(|file| file.len() > 0) {
        Some(file) => Some(upload::store_document(file, "institutionLogo", config).await?),
        None => None,
    };

    let institution = NewInstitution {
        official_name: form.official_name,
        institution_type: form.institution_type,
        accreditation_status: form.accreditation_status,
        contact_email: form.contact_email,
        contact_phone: form.contact_phone,
        website: form.website,
        physical_address: form.physical_address,
        verification_documents,
        logo,
        mission_statement: form.mission_statement,
        created_at: chrono::Utc::now(),
        is_approved: false,
    };

    let new_id: Id = new_institutions
        .insert_one(&institution, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Safe because the ID comes directly from the database.
        .into();
    let institution = institutions.find_one(new_id.as_doc(), None).await?.unwrap();

    Ok(status::Created::new(format!("/institutions/{new_id}"))
        .body(Json(institution.into())))
}

#[get("/institutions/pending?<query..>")]
async fn pending_institutions(
    _token: AuthToken<SuperAdmin>,
    query: ListRequest,
    institutions: Coll<Institution>,
) -> Result<Json<Paginated<InstitutionDescription>>> {
    list_institutions(false, query, institutions).await
}

/// The approved listing is public: the sign-up flow lists it before any
/// account exists.
#[get("/institutions/approved?<query..>")]
async fn approved_institutions(
    query: ListRequest,
    institutions: Coll<Institution>,
) -> Result<Json<Paginated<InstitutionDescription>>> {
    list_institutions(true, query, institutions).await
}

async fn list_institutions(
    approved: bool,
    query: ListRequest,
    institutions: Coll<Institution>,
) -> Result<Json<Paginated<InstitutionDescription>>> {
    let filter = Institution::list_filter(approved, query.search.as_deref());
    let total_count = institutions.count_documents(filter.clone(), None).await?;
    let items = institutions
        .find(filter, query.find_options(doc! { "created_at": -1 }))
        .await?
        .map_ok(InstitutionDescription::from)
        .try_collect()
        .await?;
    Ok(Json(Paginated { items, total_count }))
}

#[patch("/institutions/<id>/approve")]
async fn approve_institution(
    _token: AuthToken<SuperAdmin>,
    id: Id,
    institutions: Coll<Institution>,
    mailer: &State<Mailer>,
    config: &State<Config>,
) -> Result<()> {
    let institution = institutions
        .find_one(id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Institution {id}")))?;

    // Setting the flag again on an already-approved institution is harmless.
    institutions
        .update_one(id.as_doc(), doc! { "$set": { "is_approved": true } }, None)
        .await?;

    // The notification email is best-effort: a failed send never rolls back
    // the approval.
    if let Err(err) = mailer
        .send_approval_email(&institution, config.frontend_url())
        .await
    {
        warn!(
            "Failed to send approval email to {}: {err}",
            institution.contact_email
        );
    }

    Ok(())
}

#[get("/institutions/mine")]
async fn my_institution(
    token: AuthToken<AnyUser>,
    users: Coll<User>,
    institutions: Coll<Institution>,
) -> Result<Json<InstitutionSummary>> {
    let user = get_user_from_token(&token, &users).await?;
    let institution_id = match user.institution {
        Some(id) => id,
        None => {
            return Err(Error::not_found(
                "No institution associated with this user",
            ))
        }
    };
    let institution = institutions
        .find_one(institution_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("No institution associated with this user"))?;
    Ok(Json(institution.into()))
}
