use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    campaign::{Campaign, CampaignCore},
    event::{Event, EventCore},
    institution::{Institution, InstitutionCore},
    survey::{Survey, SurveyCore},
    user::{User, UserCore},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// User collections
const USERS: &str = "users";
impl MongoCollection for UserCore {
    const NAME: &'static str = USERS;
}
impl MongoCollection for User {
    const NAME: &'static str = USERS;
}

// Institution collections
const INSTITUTIONS: &str = "institutions";
impl MongoCollection for InstitutionCore {
    const NAME: &'static str = INSTITUTIONS;
}
impl MongoCollection for Institution {
    const NAME: &'static str = INSTITUTIONS;
}

// Campaign collections
const CAMPAIGNS: &str = "campaigns";
impl MongoCollection for CampaignCore {
    const NAME: &'static str = CAMPAIGNS;
}
impl MongoCollection for Campaign {
    const NAME: &'static str = CAMPAIGNS;
}

// Event collections
const EVENTS: &str = "events";
impl MongoCollection for EventCore {
    const NAME: &'static str = EVENTS;
}
impl MongoCollection for Event {
    const NAME: &'static str = EVENTS;
}

// Survey collections
const SURVEYS: &str = "surveys";
impl MongoCollection for SurveyCore {
    const NAME: &'static str = SURVEYS;
}
impl MongoCollection for Survey {
    const NAME: &'static str = SURVEYS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // User collection: emails are unique.
    let user_index = IndexModel::builder()
        .keys(doc! {"email": 1})
        .options(unique)
        .build();
    Coll::<User>::from_db(db)
        .create_index(user_index, None)
        .await?;

    // Content collections are always queried by owning institution.
    let campaign_index = IndexModel::builder()
        .keys(doc! {"institution": 1, "start_date": -1})
        .build();
    Coll::<Campaign>::from_db(db)
        .create_index(campaign_index, None)
        .await?;

    let event_index = IndexModel::builder()
        .keys(doc! {"institution": 1, "start_date": -1})
        .build();
    Coll::<Event>::from_db(db)
        .create_index(event_index, None)
        .await?;

    let survey_index = IndexModel::builder()
        .keys(doc! {"institution": 1, "created_at": -1})
        .build();
    Coll::<Survey>::from_db(db)
        .create_index(survey_index, None)
        .await?;

    Ok(())
}
