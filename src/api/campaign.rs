use mongodb::bson::{doc, to_bson, DateTime as BsonDateTime, Document};
use rocket::{
    form::Form, futures::TryStreamExt, response::status, serde::json::Json, Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            campaign::{
                parse_key_terms, CampaignDescription, CampaignForm, CampaignUpdateForm,
                DonationRequest,
            },
            pagination::{ListRequest, Paginated},
        },
        auth::{AnyUser, AuthToken},
        db::{
            campaign::{Campaign, Donation, NewCampaign},
            user::User,
        },
        mongodb::{Coll, Id},
    },
    upload, Config,
};

use super::common::{get_user_from_token, require_institution, store_pictures, validate_description};

pub fn routes() -> Vec<Route> {
    routes![
        create_campaign,
        list_campaigns,
        get_campaign,
        close_campaign,
        update_campaign,
        delete_campaign,
        add_donation,
    ]
}

/// A filter selecting one campaign within one institution. Using it for every
/// read and write makes cross-institution access indistinguishable from a
/// missing record.
fn scoped(id: Id, institution: Id) -> Document {
    doc! { "_id": id, "institution": institution }
}

#[post("/campaigns", data = "<form>")]
async fn create_campaign(
    token: AuthToken<AnyUser>,
    form: Form<CampaignForm<'_>>,
    users: Coll<User>,
    new_campaigns: Coll<NewCampaign>,
    campaigns: Coll<Campaign>,
    config: &State<Config>,
) -> Result<status::Created<Json<CampaignDescription>>> {
    let user = get_user_from_token(&token, &users).await?;
    let institution = require_institution(&user)?;

    let mut form = form.into_inner();
    validate_description(&form.description)?;
    let pictures = store_pictures(&mut form.pictures, config).await?;

    let campaign = NewCampaign {
        title: form.title,
        target_amount: form.target_amount,
        start_date: form.start_date.0,
        end_date: form.end_date.0,
        description: form.description,
        pictures,
        key_terms: parse_key_terms(form.key_terms.as_deref()),
        contact_email: form.contact_email,
        contact_phone: form.contact_phone,
        created_at: chrono::Utc::now(),
        is_closed: false,
        institution,
        collected_amount: 0.0,
        last_payment_status: None,
        donations: Vec::new(),
    };

    let new_id: Id = new_campaigns
        .insert_one(&campaign, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Safe because the ID comes directly from the database.
        .into();
    let campaign = campaigns.find_one(new_id.as_doc(), None).await?.unwrap();

    Ok(status::Created::new(format!("/campaigns/{new_id}")).body(Json(campaign.into())))
}

#[get("/campaigns?<query..>")]
async fn list_campaigns(
    token: AuthToken<AnyUser>,
    query: ListRequest,
    users: Coll<User>,
    campaigns: Coll<Campaign>,
) -> Result<Json<Paginated<CampaignDescription>>> {
    let user = get_user_from_token(&token, &users).await?;
    let institution = require_institution(&user)?;

    let filter = Campaign::list_filter(institution, query.is_closed, query.search.as_deref());
    let total_count = campaigns.count_documents(filter.clone(), None).await?;
    let items = campaigns
        .find(filter, query.find_options(doc! { "start_date": -1 }))
        .await?
        .map_ok(CampaignDescription::from)
        .try_collect()
        .await?;
    Ok(Json(Paginated { items, total_count }))
}

#[get("/campaigns/<id>")]
async fn get_campaign(
    token: AuthToken<AnyUser>,
    id: Id,
    users: Coll<User>,
    campaigns: Coll<Campaign>,
) -> Result<Json<CampaignDescription>> {
    let user = get_user_from_token(&token, &users).await?;
    let institution = require_institution(&user)?;

    let campaign = campaigns
        .find_one(scoped(id, institution), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Campaign {id}")))?;
    Ok(Json(campaign.into()))
}

/// One-way close. Closing an already-closed campaign is a harmless repeat.
#[patch("/campaigns/<id>/close")]
async fn close_campaign(
    token: AuthToken<AnyUser>,
    id: Id,
    users: Coll<User>,
    campaigns: Coll<Campaign>,
) -> Result<()> {
    let user = get_user_from_token(&token, &users).await?;
    let institution = require_institution(&user)?;

    let result = campaigns
        .update_one(
            scoped(id, institution),
            doc! { "$set": { "is_closed": true } },
            None,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Campaign {id}")));
    }
    Ok(())
}

/// Replace the provided fields. Fresh pictures replace the URL list, but the
/// old files stay on disk until the campaign itself is deleted.
#[put("/campaigns/<id>", data = "<form>")]
async fn update_campaign(
    token: AuthToken<AnyUser>,
    id: Id,
    form: Form<CampaignUpdateForm<'_>>,
    users: Coll<User>,
    campaigns: Coll<Campaign>,
    config: &State<Config>,
) -> Result<Json<CampaignDescription>> {
    let user = get_user_from_token(&token, &users).await?;
    let institution = require_institution(&user)?;

    let mut form = form.into_inner();
    let mut set = Document::new();
    if let Some(title) = form.title {
        set.insert("title", title);
    }
    if let Some(target_amount) = form.target_amount {
        set.insert("target_amount", target_amount);
    }
    if let Some(start_date) = form.start_date {
        set.insert("start_date", BsonDateTime::from_chrono(start_date.0));
    }
    if let Some(end_date) = form.end_date {
        set.insert("end_date", BsonDateTime::from_chrono(end_date.0));
    }
    if let Some(description) = form.description {
        validate_description(&description)?;
        set.insert("description", description);
    }
    if let Some(key_terms) = form.key_terms.as_deref() {
        set.insert("key_terms", parse_key_terms(Some(key_terms)));
    }
    if let Some(contact_email) = form.contact_email {
        set.insert("contact_email", contact_email);
    }
    if let Some(contact_phone) = form.contact_phone {
        set.insert("contact_phone", contact_phone);
    }
    if !form.pictures.is_empty() {
        let pictures = store_pictures(&mut form.pictures, config).await?;
        if !pictures.is_empty() {
            set.insert("pictures", pictures);
        }
    }

    if !set.is_empty() {
        let result = campaigns
            .update_one(scoped(id, institution), doc! { "$set": set }, None)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::not_found(format!("Campaign {id}")));
        }
    }

    let campaign = campaigns
        .find_one(scoped(id, institution), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Campaign {id}")))?;
    Ok(Json(campaign.into()))
}

/// Remove the campaign and best-effort delete its stored picture files.
#[delete("/campaigns/<id>")]
async fn delete_campaign(
    token: AuthToken<AnyUser>,
    id: Id,
    users: Coll<User>,
    campaigns: Coll<Campaign>,
    config: &State<Config>,
) -> Result<()> {
    let user = get_user_from_token(&token, &users).await?;
    let institution = require_institution(&user)?;

    let campaign = campaigns
        .find_one_and_delete(scoped(id, institution), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Campaign {id}")))?;

    for url in &campaign.pictures {
        upload::remove_stored_file(url, config);
    }
    Ok(())
}

/// Append a donation. Deliberately unauthenticated: donors are not required
/// to hold an account. The append is atomic, so concurrent donors never
/// overwrite each other.
#[post("/campaigns/<id>/donations", data = "<request>", format = "json")]
async fn add_donation(
    id: Id,
    request: Json<DonationRequest>,
    campaigns: Coll<Campaign>,
) -> Result<Json<CampaignDescription>> {
    let request = request.into_inner();
    if !request.amount.is_finite() || request.amount < 0.0 {
        return Err(Error::bad_request("Donation amount cannot be negative"));
    }

    let donation = Donation::from(request);
    let result = campaigns
        .update_one(
            id.as_doc(),
            doc! { "$push": { "donations": to_bson(&donation)? } },
            None,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Campaign {id}")));
    }

    let campaign = campaigns
        .find_one(id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Campaign {id}")))?;
    Ok(Json(campaign.into()))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::{serde_json, serde_json::json},
    };

    use crate::api::common::multipart::{MultipartBody, FAKE_JPEG};
    use crate::model::{
        api::auth::{AuthHeader, LoginResponse, RegisterRequest},
        db::institution::{Institution, NewInstitution},
    };

    use super::*;

    fn campaign_form() -> MultipartBody {
        MultipartBody::new()
            .text("title", "Library Renovation Fund")
            .text("targetAmount", "500")
            .text("startDate", "2026-06-01")
            .text("endDate", "2026-07-01")
            .text("description", "Help us renovate the main library.")
            .text("keyTerms", r#"["library","renovation"]"#)
            .text("contactEmail", "giving@riverdale.example.edu")
            .text("contactPhone", "+63 2 8123 4567")
    }

    async fn own_institution(institutions: &Coll<Institution>) -> Id {
        institutions
            .find_one(
                doc! { "official_name": NewInstitution::example().official_name },
                None,
            )
            .await
            .unwrap()
            .unwrap()
            .id
    }

    #[backend_test]
    async fn listing_requires_authentication(client: Client) {
        let response = client.get("/campaigns").dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn create_requires_institution(client: Client) {
        // An account registered without an institution cannot create content.
        let request = RegisterRequest::example();
        client
            .post("/auth/register")
            .header(ContentType::JSON)
            .body(json!(request).to_string())
            .dispatch()
            .await;
        let response = client
            .post("/auth/login")
            .header(ContentType::JSON)
            .body(
                json!({ "email": &request.email, "password": &request.password }).to_string(),
            )
            .dispatch()
            .await;
        let login: LoginResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        let auth = AuthHeader(login.token);

        let response = client
            .post(uri!(create_campaign))
            .header(auth.clone())
            .header(MultipartBody::content_type())
            .body(campaign_form().finish())
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
    }

    #[backend_test(admin)]
    async fn create_and_fetch_campaign(client: Client, auth: AuthHeader) {
        let body = campaign_form()
            .file("pictures", "cover.jpg", "image/jpeg", FAKE_JPEG)
            .file("pictures", "hall.png", "image/png", FAKE_JPEG)
            .finish();
        let response = client
            .post(uri!(create_campaign))
            .header(auth.clone())
            .header(MultipartBody::content_type())
            .body(body)
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        let description: CampaignDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(!description.is_closed);
        assert_eq!(description.target_amount, 500.0);
        assert_eq!(description.pictures.len(), 2);
        assert_eq!(description.key_terms, ["library", "renovation"]);
        assert_eq!(description.collected_amount, 0.0);

        // The new campaign is immediately visible by ID.
        let response = client
            .get(format!("/campaigns/{}", description.id))
            .header(auth.clone())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
    }

    #[backend_test(admin)]
    async fn fourth_picture_rejected(client: Client, auth: AuthHeader, campaigns: Coll<Campaign>) {
        let mut form = campaign_form();
        for i in 0..4 {
            form = form.file("pictures", &format!("p{i}.jpg"), "image/jpeg", FAKE_JPEG);
        }
        let response = client
            .post(uri!(create_campaign))
            .header(auth.clone())
            .header(MultipartBody::content_type())
            .body(form.finish())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(campaigns.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test(admin)]
    async fn overlong_description_rejected(client: Client, auth: AuthHeader) {
        let body = MultipartBody::new()
            .text("title", "Library Renovation Fund")
            .text("targetAmount", "500")
            .text("startDate", "2026-06-01")
            .text("endDate", "2026-07-01")
            .text("description", &"x".repeat(301))
            .text("contactEmail", "giving@riverdale.example.edu")
            .text("contactPhone", "+63 2 8123 4567")
            .finish();
        let response = client
            .post(uri!(create_campaign))
            .header(auth.clone())
            .header(MultipartBody::content_type())
            .body(body)
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
    }

    #[backend_test(admin)]
    async fn listing_is_institution_scoped(
        client: Client,
        auth: AuthHeader,
        institutions: Coll<Institution>,
        new_campaigns: Coll<NewCampaign>,
    ) {
        let own = own_institution(&institutions).await;
        let mut closed = NewCampaign::example(own);
        closed.title = "Closed Drive".to_string();
        closed.is_closed = true;
        new_campaigns
            .insert_many(
                [
                    NewCampaign::example(own),
                    closed,
                    NewCampaign::example(Id::new()),
                ],
                None,
            )
            .await
            .unwrap();

        // Only the caller's institution is visible.
        let response = client.get("/campaigns").header(auth.clone()).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let page: Paginated<CampaignDescription> = response.into_json().await.unwrap();
        assert_eq!(page.total_count, 2);
        assert!(page.items.iter().all(|c| c.institution == own.into()));

        // `isClosed` partitions active vs archived.
        let response = client
            .get("/campaigns?isClosed=false")
            .header(auth.clone())
            .dispatch()
            .await;
        let page: Paginated<CampaignDescription> = response.into_json().await.unwrap();
        assert_eq!(page.total_count, 1);
        assert!(!page.items[0].is_closed);

        let response = client
            .get("/campaigns?isClosed=true")
            .header(auth.clone())
            .dispatch()
            .await;
        let page: Paginated<CampaignDescription> = response.into_json().await.unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.items[0].title, "Closed Drive");

        // Search narrows by title substring, case-insensitively.
        let response = client
            .get("/campaigns?search=CLOSED")
            .header(auth.clone())
            .dispatch()
            .await;
        let page: Paginated<CampaignDescription> = response.into_json().await.unwrap();
        assert_eq!(page.total_count, 1);
    }

    #[backend_test(admin)]
    async fn cross_institution_access_fails_closed(
        client: Client,
        auth: AuthHeader,
        new_campaigns: Coll<NewCampaign>,
        campaigns: Coll<Campaign>,
    ) {
        let foreign: Id = new_campaigns
            .insert_one(NewCampaign::example(Id::new()), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();

        let response = client
            .get(format!("/campaigns/{foreign}"))
            .header(auth.clone())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        let response = client
            .patch(format!("/campaigns/{foreign}/close"))
            .header(auth.clone())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        let response = client
            .delete(format!("/campaigns/{foreign}"))
            .header(auth.clone())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
        // The foreign record is untouched.
        assert_eq!(campaigns.count_documents(None, None).await.unwrap(), 1);
    }

    #[backend_test(admin)]
    async fn close_is_one_way(
        client: Client,
        auth: AuthHeader,
        institutions: Coll<Institution>,
        new_campaigns: Coll<NewCampaign>,
        campaigns: Coll<Campaign>,
    ) {
        let own = own_institution(&institutions).await;
        let id: Id = new_campaigns
            .insert_one(NewCampaign::example(own), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();

        // Closing twice succeeds both times and leaves the flag set.
        for _ in 0..2 {
            let response = client
                .patch(format!("/campaigns/{id}/close"))
                .header(auth.clone())
                .dispatch()
                .await;
            assert_eq!(Status::Ok, response.status());
            let stored = campaigns.find_one(id.as_doc(), None).await.unwrap().unwrap();
            assert!(stored.is_closed);
        }
    }

    #[backend_test(admin)]
    async fn update_replaces_only_given_fields(
        client: Client,
        auth: AuthHeader,
        institutions: Coll<Institution>,
        new_campaigns: Coll<NewCampaign>,
        campaigns: Coll<Campaign>,
    ) {
        let own = own_institution(&institutions).await;
        let original = NewCampaign::example(own);
        let description = original.description.clone();
        let id: Id = new_campaigns
            .insert_one(original, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();

        let body = MultipartBody::new()
            .text("title", "Extended Library Fund")
            .text("targetAmount", "750")
            .finish();
        let response = client
            .put(format!("/campaigns/{id}"))
            .header(auth.clone())
            .header(MultipartBody::content_type())
            .body(body)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let stored = campaigns.find_one(id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(stored.title, "Extended Library Fund");
        assert_eq!(stored.target_amount, 750.0);
        // Untouched fields keep their values.
        assert_eq!(stored.description, description);
    }

    #[backend_test(admin)]
    async fn updating_archived_campaign_is_permitted(
        client: Client,
        auth: AuthHeader,
        institutions: Coll<Institution>,
        new_campaigns: Coll<NewCampaign>,
        campaigns: Coll<Campaign>,
    ) {
        let own = own_institution(&institutions).await;
        let mut archived = NewCampaign::example(own);
        archived.is_closed = true;
        let id: Id = new_campaigns
            .insert_one(archived, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();

        let body = MultipartBody::new().text("title", "Final Tally").finish();
        let response = client
            .put(format!("/campaigns/{id}"))
            .header(auth.clone())
            .header(MultipartBody::content_type())
            .body(body)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let stored = campaigns.find_one(id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(stored.title, "Final Tally");
        assert!(stored.is_closed);
    }

    #[backend_test(admin)]
    async fn delete_removes_picture_files(
        client: Client,
        auth: AuthHeader,
        campaigns: Coll<Campaign>,
    ) {
        let body = campaign_form()
            .file("pictures", "cover.jpg", "image/jpeg", FAKE_JPEG)
            .file("pictures", "hall.jpg", "image/jpeg", FAKE_JPEG)
            .finish();
        let response = client
            .post(uri!(create_campaign))
            .header(auth.clone())
            .header(MultipartBody::content_type())
            .body(body)
            .dispatch()
            .await;
        let description: CampaignDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();

        let config = client.rocket().state::<Config>().unwrap();
        let paths: Vec<_> = description
            .pictures
            .iter()
            .map(|url| {
                Path::new(config.upload_dir()).join(url.split("/uploads/").nth(1).unwrap())
            })
            .collect();
        assert!(paths.iter().all(|path| path.exists()));

        // One file already missing must not fail the delete.
        std::fs::remove_file(&paths[0]).unwrap();

        let response = client
            .delete(format!("/campaigns/{}", description.id))
            .header(auth.clone())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert!(paths.iter().all(|path| !path.exists()));
        assert_eq!(campaigns.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test(admin)]
    async fn donations_append_without_authentication(
        client: Client,
        auth: AuthHeader,
        institutions: Coll<Institution>,
        new_campaigns: Coll<NewCampaign>,
        campaigns: Coll<Campaign>,
    ) {
        let own = own_institution(&institutions).await;
        let id: Id = new_campaigns
            .insert_one(NewCampaign::example(own), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();

        // Three anonymous donations, no Authorization header anywhere.
        for amount in [100.0, 50.0, 75.0] {
            let response = client
                .post(format!("/campaigns/{id}/donations"))
                .header(ContentType::JSON)
                .body(
                    json!({
                        "name": "Jamie Tan",
                        "email": "jamie.tan@example.com",
                        "amount": amount,
                    })
                    .to_string(),
                )
                .dispatch()
                .await;
            assert_eq!(Status::Ok, response.status());
        }

        let stored = campaigns.find_one(id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(stored.donations.len(), 3);
        assert_eq!(stored.total_raised(), 225.0);
        assert_eq!(stored.target_amount, 500.0);

        // The precomputed total is exposed on reads.
        let response = client
            .get(format!("/campaigns/{id}"))
            .header(auth.clone())
            .dispatch()
            .await;
        let description: CampaignDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(description.raised_amount, 225.0);

        // Negative amounts never reach the database.
        let response = client
            .post(format!("/campaigns/{id}/donations"))
            .header(ContentType::JSON)
            .body(
                json!({ "name": "N", "email": "n@example.com", "amount": -5.0 }).to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        // Unknown campaigns are a 404.
        let response = client
            .post(format!("/campaigns/{}/donations", Id::new()))
            .header(ContentType::JSON)
            .body(
                json!({ "name": "N", "email": "n@example.com", "amount": 5.0 }).to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }
}
