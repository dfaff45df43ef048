//! Answer cleaning and storage shape, dispatched on [`AnswerShape`].

use std::collections::HashSet;

use serde_json::{Value, json};
use thiserror::Error;
use time::{Date, macros::format_description};
use uuid::Uuid;

use crate::domain::{
    entities::FieldRecord,
    remapping::canonicalize,
    types::AnswerShape,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerError {
    #[error("this question requires an answer")]
    Required,
    #[error("`{0}` is not one of the available choices")]
    UnknownChoice(String),
    #[error("select at most {max} choices")]
    TooManyChoices { max: i32 },
    #[error("enter at most {max} answers")]
    TooManyAnswers { max: i32 },
    #[error("`{0}` is not a valid date (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("expected {expected}")]
    WrongType { expected: &'static str },
}

/// Columns written for one field result.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAnswer {
    /// Always `{"answer": value}`.
    pub answer: Value,
    pub upload: String,
    pub mapped_answer: Option<Value>,
}

impl StoredAnswer {
    /// Storage shape for an already cleaned value. Upload fields keep the blob path
    /// outside the answer payload.
    pub fn for_field(field: &FieldRecord, cleaned: Value) -> Self {
        match field.field_type.answer_shape() {
            AnswerShape::Upload => Self {
                answer: json!({ "answer": "" }),
                upload: cleaned.as_str().unwrap_or_default().to_string(),
                mapped_answer: None,
            },
            _ => {
                let mapped_answer = if field.field_type.remappable() {
                    canonicalize(&cleaned, &field.mapping)
                } else {
                    None
                };
                Self {
                    answer: json!({ "answer": cleaned }),
                    upload: String::new(),
                    mapped_answer,
                }
            }
        }
    }
}

/// Validate a raw submitted value for `field`. `Value::Null` stands for "not submitted".
///
/// `allowed_choices` holds the ids a choice answer may reference: the field's own choices,
/// or the choices of its scale for ordinal fields.
pub fn clean(
    field: &FieldRecord,
    allowed_choices: &HashSet<Uuid>,
    raw: &Value,
) -> Result<Value, AnswerError> {
    match field.field_type.answer_shape() {
        AnswerShape::Text | AnswerShape::Upload => {
            let text = single_text(raw)?;
            require(field, !text.is_empty())?;
            Ok(Value::String(text))
        }
        AnswerShape::SingleChoice | AnswerShape::ScaleChoice => {
            let text = single_text(raw)?;
            require(field, !text.is_empty())?;
            if !text.is_empty() {
                check_choice(&text, allowed_choices)?;
            }
            Ok(Value::String(text))
        }
        AnswerShape::MultiChoice => {
            let mut picked: Vec<String> = Vec::new();
            for value in text_list(raw)? {
                check_choice(&value, allowed_choices)?;
                if !picked.contains(&value) {
                    picked.push(value);
                }
            }
            require(field, !picked.is_empty())?;
            if let Some(max) = field.maximum_choices {
                if picked.len() > usize::try_from(max).unwrap_or(0) {
                    return Err(AnswerError::TooManyChoices { max });
                }
            }
            Ok(json!(picked))
        }
        AnswerShape::Date => {
            let text = single_text(raw)?;
            require(field, !text.is_empty())?;
            if !text.is_empty() {
                Date::parse(&text, format_description!("[year]-[month]-[day]"))
                    .map_err(|_| AnswerError::InvalidDate(text.clone()))?;
            }
            Ok(Value::String(text))
        }
        AnswerShape::Boolean => {
            let checked = boolean(raw)?;
            require(field, checked)?;
            Ok(Value::Bool(checked))
        }
        AnswerShape::TextList => {
            let entries = text_list(raw)?;
            require(field, !entries.is_empty())?;
            if entries.len() > usize::try_from(field.expected_answers).unwrap_or(0) {
                return Err(AnswerError::TooManyAnswers {
                    max: field.expected_answers,
                });
            }
            Ok(json!(entries))
        }
    }
}

/// Whether `value` is an empty answer for the purpose of display and completion checks.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn require(field: &FieldRecord, present: bool) -> Result<(), AnswerError> {
    if field.required && !present {
        Err(AnswerError::Required)
    } else {
        Ok(())
    }
}

fn check_choice(value: &str, allowed: &HashSet<Uuid>) -> Result<(), AnswerError> {
    Uuid::parse_str(value)
        .ok()
        .filter(|id| allowed.contains(id))
        .map(|_| ())
        .ok_or_else(|| AnswerError::UnknownChoice(value.to_string()))
}

fn single_text(raw: &Value) -> Result<String, AnswerError> {
    match raw {
        Value::Null => Ok(String::new()),
        Value::String(text) => Ok(text.trim().to_string()),
        Value::Number(number) => Ok(number.to_string()),
        _ => Err(AnswerError::WrongType {
            expected: "a single text value",
        }),
    }
}

fn text_list(raw: &Value) -> Result<Vec<String>, AnswerError> {
    let items = match raw {
        Value::Null => return Ok(Vec::new()),
        Value::String(_) => std::slice::from_ref(raw),
        Value::Array(items) => items.as_slice(),
        _ => {
            return Err(AnswerError::WrongType {
                expected: "a list of text values",
            });
        }
    };

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        let text = single_text(item)?;
        if !text.is_empty() {
            entries.push(text);
        }
    }
    Ok(entries)
}

fn boolean(raw: &Value) -> Result<bool, AnswerError> {
    match raw {
        Value::Null => Ok(false),
        Value::Bool(flag) => Ok(*flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "" | "false" | "off" | "0" => Ok(false),
            "true" | "on" | "1" => Ok(true),
            _ => Err(AnswerError::WrongType {
                expected: "true or false",
            }),
        },
        _ => Err(AnswerError::WrongType {
            expected: "true or false",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::fixtures::GraphBuilder;
    use crate::domain::types::FieldType;

    fn field(field_type: FieldType) -> FieldRecord {
        let mut builder = GraphBuilder::new();
        let page = builder.page(1);
        builder.field(Some(page), field_type);
        builder.fields.remove(0)
    }

    fn required(field_type: FieldType) -> FieldRecord {
        FieldRecord {
            required: true,
            ..field(field_type)
        }
    }

    #[test]
    fn optional_blank_text_is_stored_empty() {
        let cleaned = clean(&field(FieldType::TextField), &HashSet::new(), &Value::Null);
        assert_eq!(cleaned, Ok(json!("")));
    }

    #[test]
    fn required_fields_reject_blank_answers() {
        let none = HashSet::new();
        assert_eq!(
            clean(&required(FieldType::TextArea), &none, &json!("   ")),
            Err(AnswerError::Required)
        );
        assert_eq!(
            clean(&required(FieldType::Checkbox), &none, &json!([])),
            Err(AnswerError::Required)
        );
        assert_eq!(
            clean(&required(FieldType::Boolean), &none, &json!(false)),
            Err(AnswerError::Required)
        );
    }

    #[test]
    fn choice_answers_must_reference_allowed_ids() {
        let allowed_id = Uuid::new_v4();
        let allowed = HashSet::from([allowed_id]);
        let radio = field(FieldType::Radio);

        assert_eq!(
            clean(&radio, &allowed, &json!(allowed_id.to_string())),
            Ok(json!(allowed_id.to_string()))
        );
        assert!(matches!(
            clean(&radio, &allowed, &json!(Uuid::new_v4().to_string())),
            Err(AnswerError::UnknownChoice(_))
        ));
        assert!(matches!(
            clean(&radio, &allowed, &json!("not-a-uuid")),
            Err(AnswerError::UnknownChoice(_))
        ));
    }

    #[test]
    fn checkbox_honours_maximum_choices() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let allowed: HashSet<_> = ids.iter().copied().collect();
        let checkbox = FieldRecord {
            maximum_choices: Some(2),
            ..field(FieldType::Checkbox)
        };
        let picks: Vec<String> = ids.iter().map(Uuid::to_string).collect();

        assert_eq!(
            clean(&checkbox, &allowed, &json!(picks)),
            Err(AnswerError::TooManyChoices { max: 2 })
        );
        assert_eq!(
            clean(&checkbox, &allowed, &json!([picks[0], picks[0], picks[1]])),
            Ok(json!([picks[0], picks[1]]))
        );
    }

    #[test]
    fn multiple_text_honours_expected_answers() {
        let multi = FieldRecord {
            expected_answers: 2,
            ..field(FieldType::MultipleText)
        };
        let none = HashSet::new();

        assert_eq!(
            clean(&multi, &none, &json!(["a", "", " b "])),
            Ok(json!(["a", "b"]))
        );
        assert_eq!(
            clean(&multi, &none, &json!(["a", "b", "c"])),
            Err(AnswerError::TooManyAnswers { max: 2 })
        );
    }

    #[test]
    fn dates_must_be_calendar_days() {
        let date = field(FieldType::Date);
        let none = HashSet::new();
        assert_eq!(clean(&date, &none, &json!("2024-02-29")), Ok(json!("2024-02-29")));
        assert!(matches!(
            clean(&date, &none, &json!("2023-02-29")),
            Err(AnswerError::InvalidDate(_))
        ));
    }

    #[test]
    fn uploads_store_path_outside_the_answer() {
        let media = field(FieldType::Media);
        let stored = StoredAnswer::for_field(&media, json!("2024/05/01/abc-photo.png"));
        assert_eq!(stored.answer, json!({ "answer": "" }));
        assert_eq!(stored.upload, "2024/05/01/abc-photo.png");
    }

    #[test]
    fn free_text_is_mapped_on_store() {
        let mut text = field(FieldType::TextField);
        text.mapping.reassign(["NYC"], "New York");

        let stored = StoredAnswer::for_field(&text, json!("nyc"));
        assert_eq!(stored.answer, json!({ "answer": "nyc" }));
        assert_eq!(stored.mapped_answer, Some(json!("New York")));
        assert!(stored.upload.is_empty());
    }
}
