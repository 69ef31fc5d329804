use mongodb::bson::{doc, DateTime as BsonDateTime, Document};
use rocket::{
    form::Form, futures::TryStreamExt, response::status, serde::json::Json, Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            campaign::parse_key_terms,
            event::{EventDescription, EventForm, EventUpdateForm},
            pagination::{ListRequest, Paginated},
        },
        auth::{AnyUser, AuthToken},
        db::{
            event::{Event, NewEvent},
            user::User,
        },
        mongodb::{Coll, Id},
    },
    upload, Config,
};

use super::common::{get_user_from_token, require_institution, store_pictures, validate_description};

pub fn routes() -> Vec<Route> {
    routes![
        create_event,
        list_events,
        get_event,
        close_event,
        update_event,
        delete_event,
    ]
}

fn scoped(id: Id, institution: Id) -> Document {
    doc! { "_id": id, "institution": institution }
}

#[post("/events", data = "<form>")]
async fn create_event(
    token: AuthToken<AnyUser>,
    form: Form<EventForm<'_>>,
    users: Coll<User>,
    new_events: Coll<NewEvent>,
    events: Coll<Event>,
    config: &State<Config>,
) -> Result<status::Created<Json<EventDescription>>> {
    let user = get_user_from_token(&token, &users).await?;
    let institution = require_institution(&user)?;

    let mut form = form.into_inner();
    validate_description(&form.description)?;
    let pictures = store_pictures(&mut form.pictures, config).await?;

    let event = NewEvent {
        title: form.title,
        location: form.location,
        start_date: form.start_date.0,
        end_date: form.end_date.0,
        description: form.description,
        pictures,
        key_terms: parse_key_terms(form.key_terms.as_deref()),
        created_at: chrono::Utc::now(),
        is_closed: false,
        institution,
    };

    let new_id: Id = new_events
        .insert_one(&event, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Safe because the ID comes directly from the database.
        .into();
    let event = events.find_one(new_id.as_doc(), None).await?.unwrap();

    Ok(status::Created::new(format!("/events/{new_id}")).body(Json(event.into())))
}

#[get("/events?<query..>")]
async fn list_events(
    token: AuthToken<AnyUser>,
    query: ListRequest,
    users: Coll<User>,
    events: Coll<Event>,
) -> Result<Json<Paginated<EventDescription>>> {
    let user = get_user_from_token(&token, &users).await?;
    let institution = require_institution(&user)?;

    let filter = Event::list_filter(institution, query.is_closed, query.search.as_deref());
    let total_count = events.count_documents(filter.clone(), None).await?;
    let items = events
        .find(filter, query.find_options(doc! { "start_date": -1 }))
        .await?
        .map_ok(EventDescription::from)
        .try_collect()
        .await?;
    Ok(Json(Paginated { items, total_count }))
}

#[get("/events/<id>")]
async fn get_event(
    token: AuthToken<AnyUser>,
    id: Id,
    users: Coll<User>,
    events: Coll<Event>,
) -> Result<Json<EventDescription>> {
    let user = get_user_from_token(&token, &users).await?;
    let institution = require_institution(&user)?;

    let event = events
        .find_one(scoped(id, institution), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Event {id}")))?;
    Ok(Json(event.into()))
}

/// One-way close, repeatable without effect.
#[patch("/events/<id>/close")]
async fn close_event(
    token: AuthToken<AnyUser>,
    id: Id,
    users: Coll<User>,
    events: Coll<Event>,
) -> Result<()> {
    let user = get_user_from_token(&token, &users).await?;
    let institution = require_institution(&user)?;

    let result = events
        .update_one(
            scoped(id, institution),
            doc! { "$set": { "is_closed": true } },
            None,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Event {id}")));
    }
    Ok(())
}

/// Replace the provided fields; fresh pictures replace the URL list without
/// removing the old files from disk.
#[put("/events/<id>", data = "<form>")]
async fn update_event(
    token: AuthToken<AnyUser>,
    id: Id,
    form: Form<EventUpdateForm<'_>>,
    users: Coll<User>,
    events: Coll<Event>,
    config: &State<Config>,
) -> Result<Json<EventDescription>> {
    let user = get_user_from_token(&token, &users).await?;
    let institution = require_institution(&user)?;

    let mut form = form.into_inner();
    let mut set = Document::new();
    if let Some(title) = form.title {
        set.insert("title", title);
    }
    if let Some(location) = form.location {
        set.insert("location", location);
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
    if !form.pictures.is_empty() {
        let pictures = store_pictures(&mut form.pictures, config).await?;
        if !pictures.is_empty() {
            set.insert("pictures", pictures);
        }
    }

    if !set.is_empty() {
        let result = events
            .update_one(scoped(id, institution), doc! { "$set": set }, None)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::not_found(format!("Event {id}")));
        }
    }

    let event = events
        .find_one(scoped(id, institution), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Event {id}")))?;
    Ok(Json(event.into()))
}

/// Remove the event and best-effort delete its stored picture files.
#[delete("/events/<id>")]
async fn delete_event(
    token: AuthToken<AnyUser>,
    id: Id,
    users: Coll<User>,
    events: Coll<Event>,
    config: &State<Config>,
) -> Result<()> {
    let user = get_user_from_token(&token, &users).await?;
    let institution = require_institution(&user)?;

    let event = events
        .find_one_and_delete(scoped(id, institution), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Event {id}")))?;

    for url in &event.pictures {
        upload::remove_stored_file(url, config);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::Status,
        local::asynchronous::Client,
        serde::json::serde_json,
    };

    use crate::api::common::multipart::{MultipartBody, FAKE_JPEG};
    use crate::model::{
        api::auth::AuthHeader,
        db::institution::{Institution, NewInstitution},
    };

    use super::*;

    fn event_form() -> MultipartBody {
        MultipartBody::new()
            .text("title", "Alumni Homecoming Gala")
            .text("location", "Riverdale Grand Hall")
            .text("startDate", "2026-09-12")
            .text("endDate", "2026-09-13")
            .text("description", "An evening to reconnect with your batchmates.")
            .text("keyTerms", r#"["homecoming"]"#)
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
    async fn events_require_authentication(client: Client) {
        let response = client.get("/events").dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(admin)]
    async fn create_and_list_events(
        client: Client,
        auth: AuthHeader,
        new_events: Coll<NewEvent>,
    ) {
        let body = event_form()
            .file("pictures", "hall.jpg", "image/jpeg", FAKE_JPEG)
            .finish();
        let response = client
            .post(uri!(create_event))
            .header(auth.clone())
            .header(MultipartBody::content_type())
            .body(body)
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        let description: EventDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(!description.is_closed);
        assert_eq!(description.location, "Riverdale Grand Hall");
        assert_eq!(description.pictures.len(), 1);

        // An event belonging to another institution never shows up.
        new_events
            .insert_one(NewEvent::example(Id::new()), None)
            .await
            .unwrap();
        let response = client.get("/events").header(auth.clone()).dispatch().await;
        let page: Paginated<EventDescription> = response.into_json().await.unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.items[0].title, "Alumni Homecoming Gala");
    }

    #[backend_test(admin)]
    async fn fourth_picture_rejected(client: Client, auth: AuthHeader, events: Coll<Event>) {
        let mut form = event_form();
        for i in 0..4 {
            form = form.file("pictures", &format!("p{i}.jpg"), "image/jpeg", FAKE_JPEG);
        }
        let response = client
            .post(uri!(create_event))
            .header(auth.clone())
            .header(MultipartBody::content_type())
            .body(form.finish())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(events.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test(admin)]
    async fn close_update_and_delete(
        client: Client,
        auth: AuthHeader,
        institutions: Coll<Institution>,
        new_events: Coll<NewEvent>,
        events: Coll<Event>,
    ) {
        let own = own_institution(&institutions).await;
        let id: Id = new_events
            .insert_one(NewEvent::example(own), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();

        // Close twice; the flag stays set.
        for _ in 0..2 {
            let response = client
                .patch(format!("/events/{id}/close"))
                .header(auth.clone())
                .dispatch()
                .await;
            assert_eq!(Status::Ok, response.status());
            assert!(events.find_one(id.as_doc(), None).await.unwrap().unwrap().is_closed);
        }

        // Update replaces only the provided fields.
        let body = MultipartBody::new().text("location", "Lakeside Pavilion").finish();
        let response = client
            .put(format!("/events/{id}"))
            .header(auth.clone())
            .header(MultipartBody::content_type())
            .body(body)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let stored = events.find_one(id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(stored.location, "Lakeside Pavilion");
        assert_eq!(stored.title, NewEvent::example(own).title);

        // Delete removes the record; a second delete is a 404.
        let response = client
            .delete(format!("/events/{id}"))
            .header(auth.clone())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let response = client
            .delete(format!("/events/{id}"))
            .header(auth.clone())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(admin)]
    async fn cross_institution_event_hidden(
        client: Client,
        auth: AuthHeader,
        new_events: Coll<NewEvent>,
    ) {
        let foreign: Id = new_events
            .insert_one(NewEvent::example(Id::new()), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();
        let response = client
            .get(format!("/events/{foreign}"))
            .header(auth.clone())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }
}
