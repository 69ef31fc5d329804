use mongodb::bson::doc;
use rocket::{response::status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::auth::{
            Credentials, LoginResponse, RegisterAdminRequest, RegisterRequest, RegisterResponse,
            UserDescription, MIN_PASSWORD_LENGTH,
        },
        auth::{AnyUser, AuthToken},
        db::{
            institution::Institution,
            user::{NewUser, Role, User},
        },
        mongodb::{Coll, Id},
    },
    Config,
};

use super::common::get_user_from_token;

pub fn routes() -> Vec<Route> {
    routes![register, login, current_user, register_admin]
}

#[post("/auth/register", data = "<request>", format = "json")]
async fn register(
    request: Json<RegisterRequest>,
    users: Coll<User>,
    new_users: Coll<NewUser>,
) -> Result<status::Created<Json<RegisterResponse>>> {
    let request = request.into_inner();
    validate_registration(&request.full_name, &request.email, &request.password)?;

    // Check email uniqueness.
    let existing = users.find_one(doc! { "email": &request.email }, None).await?;
    if existing.is_some() {
        return Err(Error::bad_request("Email already in use"));
    }

    let user = NewUser::new(
        request.full_name,
        request.email,
        &request.password,
        Role::User,
        request.institution,
    );
    let new_id: Id = new_users
        .insert_one(&user, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Safe because the ID comes directly from the database.
        .into();

    Ok(status::Created::new(format!("/auth/users/{new_id}")).body(Json(RegisterResponse {
        message: "User registered successfully".to_string(),
        user_id: new_id.into(),
    })))
}

#[post("/auth/login", data = "<credentials>", format = "json")]
async fn login(
    credentials: Json<Credentials>,
    users: Coll<User>,
    institutions: Coll<Institution>,
    config: &State<Config>,
) -> Result<Json<LoginResponse>> {
    // The same error for an unknown email and a wrong password, so the
    // response does not reveal whether the email is registered.
    let user = users
        .find_one(doc! { "email": &credentials.email }, None)
        .await?
        .filter(|user| user.verify_password(&credentials.password))
        .ok_or_else(|| Error::bad_request("Invalid credentials"))?;

    let token = AuthToken::for_user(&user).encode(config)?;
    let institution = find_institution(&user, &institutions).await?;

    Ok(Json(LoginResponse {
        token,
        user: UserDescription::new(user, institution),
    }))
}

#[get("/auth/me")]
async fn current_user(
    token: AuthToken<AnyUser>,
    users: Coll<User>,
    institutions: Coll<Institution>,
) -> Result<Json<UserDescription>> {
    let user = get_user_from_token(&token, &users).await?;
    let institution = find_institution(&user, &institutions).await?;
    Ok(Json(UserDescription::new(user, institution)))
}

#[post("/register-admin/<institution_id>", data = "<request>", format = "json")]
async fn register_admin(
    institution_id: Id,
    request: Json<RegisterAdminRequest>,
    users: Coll<User>,
    new_users: Coll<NewUser>,
    institutions: Coll<Institution>,
) -> Result<status::Created<Json<RegisterResponse>>> {
    let request = request.into_inner();
    validate_registration(&request.full_name, &request.email, &request.password)?;

    // The institution must exist...
    let institution = institutions
        .find_one(institution_id.as_doc(), None)
        .await?;
    if institution.is_none() {
        return Err(Error::bad_request("Invalid institution ID"));
    }

    // ...and can only ever have one admin.
    let existing_admin = users
        .find_one(
            doc! { "institution": institution_id, "role": Role::Admin },
            None,
        )
        .await?;
    if existing_admin.is_some() {
        return Err(Error::bad_request(
            "Admin account already exists for this institution",
        ));
    }

    let existing_email = users.find_one(doc! { "email": &request.email }, None).await?;
    if existing_email.is_some() {
        return Err(Error::bad_request("Email already in use"));
    }

    let admin = NewUser::new(
        request.full_name,
        request.email,
        &request.password,
        Role::Admin,
        Some(institution_id),
    );
    let new_id: Id = new_users
        .insert_one(&admin, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Safe because the ID comes directly from the database.
        .into();

    Ok(status::Created::new(format!("/auth/users/{new_id}")).body(Json(RegisterResponse {
        message: "Admin account created successfully. You can now login.".to_string(),
        user_id: new_id.into(),
    })))
}

fn validate_registration(full_name: &str, email: &str, password: &str) -> Result<()> {
    if full_name.is_empty() || email.is_empty() {
        return Err(Error::bad_request("All fields are required"));
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(Error::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

async fn find_institution(
    user: &User,
    institutions: &Coll<Institution>,
) -> Result<Option<Institution>> {
    let institution = match user.institution {
        Some(id) => institutions.find_one(id.as_doc(), None).await?,
        None => None,
    };
    Ok(institution)
}
