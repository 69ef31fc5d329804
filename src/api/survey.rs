use chrono::Utc;
use mongodb::bson::{doc, to_bson, Document};
use rocket::{futures::TryStreamExt, response::status, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            pagination::{ListRequest, Paginated},
            survey::{
                ResolvedAnswer, ResolvedResponse, ResponseDescription, SubmitResponseRequest,
                SurveyDescription, SurveyPatch, SurveySpec,
            },
        },
        auth::{AnyUser, AuthToken, OptionalToken},
        db::{
            survey::{Answer, NewSurvey, Question, Survey, SurveyResponse},
            user::User,
        },
        mongodb::{Coll, Id},
    },
};

use super::common::{get_user_from_token, require_institution};

pub fn routes() -> Vec<Route> {
    routes![
        create_survey,
        list_surveys,
        get_survey,
        submit_response,
        get_responses,
        delete_response,
        close_survey,
        update_survey,
        delete_survey,
    ]
}

fn scoped(id: Id, institution: Id) -> Document {
    doc! { "_id": id, "institution": institution }
}

#[post("/surveys", data = "<spec>", format = "json")]
async fn create_survey(
    token: AuthToken<AnyUser>,
    spec: Json<SurveySpec>,
    users: Coll<User>,
    new_surveys: Coll<NewSurvey>,
    surveys: Coll<Survey>,
) -> Result<status::Created<Json<SurveyDescription>>> {
    let user = get_user_from_token(&token, &users).await?;
    let institution = require_institution(&user)?;

    let spec = spec.into_inner();
    if spec.title.is_empty() || spec.description.is_empty() {
        return Err(Error::bad_request("Title and description are required"));
    }

    let survey = NewSurvey {
        title: spec.title,
        description: spec.description,
        creator: user.id,
        institution,
        target_audience: spec.target_audience,
        is_active: true,
        created_at: Utc::now(),
        questions: spec.questions.into_iter().map(Into::into).collect(),
        responses: Vec::new(),
    };

    let new_id: Id = new_surveys
        .insert_one(&survey, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Safe because the ID comes directly from the database.
        .into();
    let survey = surveys.find_one(new_id.as_doc(), None).await?.unwrap();

    Ok(status::Created::new(format!("/surveys/{new_id}")).body(Json(survey.into())))
}

/// List surveys. Authenticated callers are scoped to their own institution;
/// the public path (used by respondents following a link) must name one
/// explicitly.
#[get("/surveys?<institution>&<query..>")]
async fn list_surveys(
    token: OptionalToken,
    institution: Option<Id>,
    query: ListRequest,
    users: Coll<User>,
    surveys: Coll<Survey>,
) -> Result<Json<Paginated<SurveyDescription>>> {
    let institution = match token.0 {
        Some(token) => {
            let user = get_user_from_token(&token, &users).await?;
            require_institution(&user)?
        }
        None => institution.ok_or_else(|| Error::bad_request("Institution is required"))?,
    };

    let archived = query.is_closed.unwrap_or(false);
    let filter = Survey::list_filter(institution, archived, query.search.as_deref());
    let total_count = surveys.count_documents(filter.clone(), None).await?;
    let items = surveys
        .find(filter, query.find_options(doc! { "created_at": -1 }))
        .await?
        .map_ok(SurveyDescription::from)
        .try_collect()
        .await?;
    Ok(Json(Paginated { items, total_count }))
}

/// Fetch one survey with its full question list. Respondents reach this
/// without an account, so the institution scope only applies to callers that
/// do authenticate.
#[get("/surveys/<id>")]
async fn get_survey(
    token: OptionalToken,
    id: Id,
    users: Coll<User>,
    surveys: Coll<Survey>,
) -> Result<Json<SurveyDescription>> {
    let survey = surveys
        .find_one(id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Survey {id}")))?;

    if let Some(token) = token.0 {
        let user = get_user_from_token(&token, &users).await?;
        let institution = require_institution(&user)?;
        if survey.institution != institution {
            return Err(Error::not_found(format!("Survey {id}")));
        }
    }
    Ok(Json(survey.into()))
}

/// Append a response. Open to anonymous respondents; the submission time is
/// stamped by the server, and the append is atomic. Answer conformance to the
/// declared questions is left to the frontend.
#[post("/surveys/<id>/responses", data = "<request>", format = "json")]
async fn submit_response(
    id: Id,
    request: Json<SubmitResponseRequest>,
    surveys: Coll<Survey>,
) -> Result<status::Created<Json<ResponseDescription>>> {
    let request = request.into_inner();
    let answers = request
        .answers
        .into_iter()
        .map(Answer::try_from)
        .collect::<Result<Vec<_>>>()?;

    let response = SurveyResponse {
        id: Id::new(),
        user: request.user_id,
        submitted_at: Utc::now(),
        answers,
    };
    let response_id = response.id;

    let result = surveys
        .update_one(
            id.as_doc(),
            doc! { "$push": { "responses": to_bson(&response)? } },
            None,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Survey {id}")));
    }

    Ok(status::Created::new(format!("/surveys/{id}/responses/{response_id}"))
        .body(Json(response.into())))
}

/// Review all responses, with every answer labelled by the survey's *current*
/// question text. Answers to questions that were since edited away keep a
/// "Deleted question" placeholder instead of disappearing.
#[get("/surveys/<id>/responses")]
async fn get_responses(
    token: AuthToken<AnyUser>,
    id: Id,
    users: Coll<User>,
    surveys: Coll<Survey>,
) -> Result<Json<Vec<ResolvedResponse>>> {
    let user = get_user_from_token(&token, &users).await?;
    let institution = require_institution(&user)?;

    let survey = surveys
        .find_one(scoped(id, institution), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Survey {id}")))?;

    let core = &survey.survey;
    let resolved = core
        .responses
        .iter()
        .map(|response| ResolvedResponse {
            id: response.id.into(),
            user: response.user.map(Into::into),
            submitted_at: response.submitted_at,
            answers: response
                .answers
                .iter()
                .map(|answer| ResolvedAnswer {
                    question: core
                        .question_text(answer.question_id)
                        .unwrap_or("Deleted question")
                        .to_string(),
                    answer: answer.answer.clone().into_relaxed_extjson(),
                })
                .collect(),
        })
        .collect();
    Ok(Json(resolved))
}

#[delete("/surveys/<survey_id>/responses/<response_id>")]
async fn delete_response(
    token: AuthToken<AnyUser>,
    survey_id: Id,
    response_id: Id,
    users: Coll<User>,
    surveys: Coll<Survey>,
) -> Result<()> {
    let user = get_user_from_token(&token, &users).await?;
    let institution = require_institution(&user)?;

    let result = surveys
        .update_one(
            scoped(survey_id, institution),
            doc! { "$pull": { "responses": { "_id": response_id } } },
            None,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Survey {survey_id}")));
    }
    if result.modified_count == 0 {
        return Err(Error::not_found(format!("Response {response_id}")));
    }
    Ok(())
}

/// Archive the survey. There is no reopen operation.
#[patch("/surveys/<id>/close")]
async fn close_survey(
    token: AuthToken<AnyUser>,
    id: Id,
    users: Coll<User>,
    surveys: Coll<Survey>,
) -> Result<()> {
    let user = get_user_from_token(&token, &users).await?;
    let institution = require_institution(&user)?;

    let result = surveys
        .update_one(
            scoped(id, institution),
            doc! { "$set": { "is_active": false } },
            None,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Survey {id}")));
    }
    Ok(())
}

/// Merge-patch the survey. Questions that keep their IDs stay linked to the
/// responses already collected against them.
#[patch("/surveys/<id>", data = "<patch>", format = "json")]
async fn update_survey(
    token: AuthToken<AnyUser>,
    id: Id,
    patch: Json<SurveyPatch>,
    users: Coll<User>,
    surveys: Coll<Survey>,
) -> Result<Json<SurveyDescription>> {
    let user = get_user_from_token(&token, &users).await?;
    let institution = require_institution(&user)?;

    let patch = patch.into_inner();
    let mut set = Document::new();
    if let Some(title) = patch.title {
        set.insert("title", title);
    }
    if let Some(description) = patch.description {
        set.insert("description", description);
    }
    if let Some(target_audience) = patch.target_audience {
        set.insert("target_audience", target_audience);
    }
    if let Some(questions) = patch.questions {
        let questions: Vec<Question> = questions.into_iter().map(Into::into).collect();
        set.insert("questions", to_bson(&questions)?);
    }

    if !set.is_empty() {
        let result = surveys
            .update_one(scoped(id, institution), doc! { "$set": set }, None)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::not_found(format!("Survey {id}")));
        }
    }

    let survey = surveys
        .find_one(scoped(id, institution), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Survey {id}")))?;
    Ok(Json(survey.into()))
}

/// Remove the survey together with all embedded responses.
#[delete("/surveys/<id>")]
async fn delete_survey(
    token: AuthToken<AnyUser>,
    id: Id,
    users: Coll<User>,
    surveys: Coll<Survey>,
) -> Result<()> {
    let user = get_user_from_token(&token, &users).await?;
    let institution = require_institution(&user)?;

    let result = surveys.delete_one(scoped(id, institution), None).await?;
    if result.deleted_count == 0 {
        return Err(Error::not_found(format!("Survey {id}")));
    }
    Ok(())
}
