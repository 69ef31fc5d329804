use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, Bson, Document};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// The supported question kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    MultipleChoice,
    YesNo,
    Rating,
    OpenEnded,
    Dropdown,
    Checkbox,
    Matrix,
    Ranking,
    SemanticDifferential,
    Demographic,
}

/// A selectable choice attached to a question. The row/column texts are only
/// populated for matrix questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub col_text: Option<String>,
}

/// A question embedded in a survey. Questions keep their own IDs so responses
/// can refer back to them even after the question list is edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    pub required: bool,
    pub order: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec<i32>>,
    pub options: Vec<QuestionOption>,
}

/// A single answer within a response. The value is free-form: whatever shape
/// the frontend submitted for the question kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: Id,
    pub answer: Bson,
}

/// A submitted response, embedded in its survey. Responses are append-only
/// but individually deletable by ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyResponse {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Id>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub submitted_at: DateTime<Utc>,
    pub answers: Vec<Answer>,
}

/// Core survey data, as stored in the database.
#[derive(Debug, Serialize, Deserialize)]
pub struct SurveyCore {
    pub title: String,
    pub description: String,
    pub creator: Id,
    /// The owning institution. Every authenticated read and write is scoped
    /// by it.
    pub institution: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    /// `false` means archived; there is no reopen operation.
    pub is_active: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    pub questions: Vec<Question>,
    pub responses: Vec<SurveyResponse>,
}

impl SurveyCore {
    /// Look up the current text of a question, if it still exists.
    pub fn question_text(&self, question_id: Id) -> Option<&str> {
        self.questions
            .iter()
            .find(|question| question.id == question_id)
            .map(|question| question.text.as_str())
    }
}

/// A survey without an ID.
pub type NewSurvey = SurveyCore;

/// A survey from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Survey {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub survey: SurveyCore,
}

impl Survey {
    /// Filter for the listing: scoped to an institution, partitioned into
    /// active vs. archived, optionally narrowed by a case-insensitive
    /// substring match on the title.
    pub fn list_filter(institution: Id, archived: bool, search: Option<&str>) -> Document {
        let mut filter = doc! {
            "institution": institution,
            "is_active": !archived,
        };
        if let Some(search) = search {
            filter.insert("title", doc! { "$regex": search, "$options": "i" });
        }
        filter
    }
}

impl Deref for Survey {
    type Target = SurveyCore;

    fn deref(&self) -> &Self::Target {
        &self.survey
    }
}

impl DerefMut for Survey {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.survey
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Question {
        pub fn example_open(text: &str, order: i32) -> Self {
            Self {
                id: Id::new(),
                question_type: QuestionType::OpenEnded,
                text: text.to_string(),
                required: true,
                order,
                scale: None,
                options: Vec::new(),
            }
        }

        pub fn example_yes_no(text: &str, order: i32) -> Self {
            Self {
                id: Id::new(),
                question_type: QuestionType::YesNo,
                text: text.to_string(),
                required: false,
                order,
                scale: None,
                options: Vec::new(),
            }
        }
    }

    impl SurveyCore {
        pub fn example(creator: Id, institution: Id) -> Self {
            Self {
                title: "Alumni Engagement Pulse".to_string(),
                description: "Tell us how connected you feel.".to_string(),
                creator,
                institution,
                target_audience: Some("All alumni".to_string()),
                is_active: true,
                created_at: Utc::now(),
                questions: vec![
                    Question::example_open("What would bring you back to campus?", 0),
                    Question::example_yes_no("Did you attend last year's homecoming?", 1),
                ],
                responses: Vec::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_text_resolves_by_id() {
        let survey = SurveyCore::example(Id::new(), Id::new());
        let first = &survey.questions[0];
        assert_eq!(survey.question_text(first.id), Some(first.text.as_str()));
        assert_eq!(survey.question_text(Id::new()), None);
    }

    #[test]
    fn list_filter_partitions_by_activity() {
        let institution = Id::new();
        let active = Survey::list_filter(institution, false, None);
        assert_eq!(active.get_bool("is_active").unwrap(), true);
        let archived = Survey::list_filter(institution, true, None);
        assert_eq!(archived.get_bool("is_active").unwrap(), false);
    }

    #[test]
    fn question_type_uses_kebab_case_tags() {
        let bson = mongodb::bson::to_bson(&QuestionType::SemanticDifferential).unwrap();
        assert_eq!(bson, Bson::String("semantic-differential".to_string()));
    }
}
