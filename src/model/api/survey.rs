use chrono::{DateTime, Utc};
use mongodb::bson::Bson;
use rocket::serde::json::Value;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    api::id::ApiId,
    db::survey::{Answer, Question, QuestionOption, QuestionType, Survey, SurveyResponse},
    mongodb::Id,
};

/// A question choice as submitted or returned.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionSpec {
    pub text: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub order: Option<i32>,
    #[serde(default)]
    pub row_text: Option<String>,
    #[serde(default)]
    pub col_text: Option<String>,
}

impl From<OptionSpec> for QuestionOption {
    fn from(spec: OptionSpec) -> Self {
        Self {
            text: spec.text,
            value: spec.value,
            order: spec.order,
            row_text: spec.row_text,
            col_text: spec.col_text,
        }
    }
}

impl From<QuestionOption> for OptionSpec {
    fn from(option: QuestionOption) -> Self {
        Self {
            text: option.text,
            value: option.value,
            order: option.order,
            row_text: option.row_text,
            col_text: option.col_text,
        }
    }
}

/// A question as submitted. Questions carrying an `id` keep it, so existing
/// responses stay linked across edits; new questions get a fresh one.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionSpec {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub scale: Option<Vec<i32>>,
    #[serde(default)]
    pub options: Vec<OptionSpec>,
}

impl From<QuestionSpec> for Question {
    fn from(spec: QuestionSpec) -> Self {
        Self {
            id: spec.id.unwrap_or_else(Id::new),
            question_type: spec.question_type,
            text: spec.text,
            required: spec.required,
            order: spec.order,
            scale: spec.scale,
            options: spec.options.into_iter().map(Into::into).collect(),
        }
    }
}

/// The creation request for a survey.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveySpec {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub questions: Vec<QuestionSpec>,
}

/// A merge-patch for a survey: only the supplied fields are replaced.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub questions: Option<Vec<QuestionSpec>>,
}

/// A single answer in a submission.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question_id: Id,
    pub answer: Value,
}

impl TryFrom<AnswerRequest> for Answer {
    type Error = Error;

    fn try_from(request: AnswerRequest) -> Result<Self, Self::Error> {
        let answer = Bson::try_from(request.answer)
            .map_err(|_| Error::bad_request("Unsupported answer value"))?;
        Ok(Self {
            question_id: request.question_id,
            answer,
        })
    }
}

/// A response submission. Anonymous submissions carry no user ID.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponseRequest {
    pub answers: Vec<AnswerRequest>,
    #[serde(default)]
    pub user_id: Option<Id>,
}

/// A question as returned by the API.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDescription {
    pub id: ApiId,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    pub required: bool,
    pub order: i32,
    pub scale: Option<Vec<i32>>,
    pub options: Vec<OptionSpec>,
}

impl From<Question> for QuestionDescription {
    fn from(question: Question) -> Self {
        Self {
            id: question.id.into(),
            question_type: question.question_type,
            text: question.text,
            required: question.required,
            order: question.order,
            scale: question.scale,
            options: question.options.into_iter().map(Into::into).collect(),
        }
    }
}

/// A raw response as embedded in a survey description: answers still refer to
/// questions by ID.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDescription {
    pub id: ApiId,
    pub user: Option<ApiId>,
    pub submitted_at: DateTime<Utc>,
    pub answers: Vec<AnswerDescription>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerDescription {
    pub question_id: ApiId,
    pub answer: Value,
}

impl From<SurveyResponse> for ResponseDescription {
    fn from(response: SurveyResponse) -> Self {
        Self {
            id: response.id.into(),
            user: response.user.map(Into::into),
            submitted_at: response.submitted_at,
            answers: response
                .answers
                .into_iter()
                .map(|answer| AnswerDescription {
                    question_id: answer.question_id.into(),
                    answer: answer.answer.into_relaxed_extjson(),
                })
                .collect(),
        }
    }
}

/// A survey as returned by the API.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyDescription {
    pub id: ApiId,
    pub title: String,
    pub description: String,
    pub creator: ApiId,
    pub institution: ApiId,
    pub target_audience: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub questions: Vec<QuestionDescription>,
    pub responses: Vec<ResponseDescription>,
}

impl From<Survey> for SurveyDescription {
    fn from(survey: Survey) -> Self {
        let core = survey.survey;
        Self {
            id: survey.id.into(),
            title: core.title,
            description: core.description,
            creator: core.creator.into(),
            institution: core.institution.into(),
            target_audience: core.target_audience,
            is_active: core.is_active,
            created_at: core.created_at,
            questions: core.questions.into_iter().map(Into::into).collect(),
            responses: core.responses.into_iter().map(Into::into).collect(),
        }
    }
}

/// A response denormalised for review: every answer labelled with the current
/// question text, or a placeholder when the question has since been removed.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedResponse {
    pub id: ApiId,
    pub user: Option<ApiId>,
    pub submitted_at: DateTime<Utc>,
    pub answers: Vec<ResolvedAnswer>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolvedAnswer {
    pub question: String,
    pub answer: Value,
}
