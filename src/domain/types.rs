//! Shared domain enumerations aligned with persisted database enums.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Question kinds a survey field can take (mirrors Postgres enum `field_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "field_type", rename_all = "snake_case")]
pub enum FieldType {
    TextField,
    TextArea,
    Radio,
    Select,
    Checkbox,
    Date,
    Media,
    Boolean,
    MultipleText,
    Likert,
    Rating,
}

/// How an answer is validated and stored for a field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerShape {
    /// A single free-text string.
    Text,
    /// One choice id out of the field's own choices.
    SingleChoice,
    /// Any number of the field's choice ids, bounded by `maximum_choices`.
    MultiChoice,
    /// A calendar date (`YYYY-MM-DD`).
    Date,
    /// A stored blob reference kept outside the answer payload.
    Upload,
    Boolean,
    /// Up to `expected_answers` free-text strings.
    TextList,
    /// One ordinal choice id out of the field's scale.
    ScaleChoice,
}

/// Input control a front end should render for a field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    TextInput,
    TextArea,
    RadioGroup,
    Dropdown,
    CheckboxGroup,
    DateInput,
    FileInput,
    Checkbox,
    MultiTextInput,
    ScaleRadioGroup,
}

struct FieldTypeInfo {
    name: &'static str,
    label: &'static str,
    shape: AnswerShape,
    widget: WidgetKind,
    scale: Option<ScaleKind>,
}

impl FieldType {
    pub const ALL: [FieldType; 11] = [
        FieldType::TextField,
        FieldType::TextArea,
        FieldType::Radio,
        FieldType::Select,
        FieldType::Checkbox,
        FieldType::Date,
        FieldType::Media,
        FieldType::Boolean,
        FieldType::MultipleText,
        FieldType::Likert,
        FieldType::Rating,
    ];

    fn info(self) -> FieldTypeInfo {
        let (name, label, shape, widget, scale) = match self {
            FieldType::TextField => (
                "text_field",
                "Free Response - One Line",
                AnswerShape::Text,
                WidgetKind::TextInput,
                None,
            ),
            FieldType::TextArea => (
                "text_area",
                "Free Response - Box",
                AnswerShape::Text,
                WidgetKind::TextArea,
                None,
            ),
            FieldType::Radio => (
                "radio",
                "Multiple Choice - Pick One",
                AnswerShape::SingleChoice,
                WidgetKind::RadioGroup,
                None,
            ),
            FieldType::Select => (
                "select",
                "Multiple Choice - Pick One (Dropdown)",
                AnswerShape::SingleChoice,
                WidgetKind::Dropdown,
                None,
            ),
            FieldType::Checkbox => (
                "checkbox",
                "Multiple Choice - Can select multiple answers",
                AnswerShape::MultiChoice,
                WidgetKind::CheckboxGroup,
                None,
            ),
            FieldType::Date => (
                "date",
                "Date",
                AnswerShape::Date,
                WidgetKind::DateInput,
                None,
            ),
            FieldType::Media => (
                "media",
                "File Upload",
                AnswerShape::Upload,
                WidgetKind::FileInput,
                None,
            ),
            FieldType::Boolean => (
                "boolean",
                "True/False",
                AnswerShape::Boolean,
                WidgetKind::Checkbox,
                None,
            ),
            FieldType::MultipleText => (
                "multiple_text",
                "Multiple Free Responses - Single Lines",
                AnswerShape::TextList,
                WidgetKind::MultiTextInput,
                None,
            ),
            FieldType::Likert => (
                "likert",
                "Likert Scale",
                AnswerShape::ScaleChoice,
                WidgetKind::ScaleRadioGroup,
                Some(ScaleKind::Likert),
            ),
            FieldType::Rating => (
                "rating",
                "Rating Scale",
                AnswerShape::ScaleChoice,
                WidgetKind::ScaleRadioGroup,
                Some(ScaleKind::Rating),
            ),
        };

        FieldTypeInfo {
            name,
            label,
            shape,
            widget,
            scale,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.info().name
    }

    /// Human-readable label shown to survey designers.
    pub fn label(self) -> &'static str {
        self.info().label
    }

    pub fn answer_shape(self) -> AnswerShape {
        self.info().shape
    }

    pub fn widget(self) -> WidgetKind {
        self.info().widget
    }

    /// Scale kind the field must reference, for ordinal field types.
    pub fn scale_kind(self) -> Option<ScaleKind> {
        self.info().scale
    }

    /// Whether the field carries its own designer-defined choices.
    pub fn needs_choices(self) -> bool {
        matches!(
            self.answer_shape(),
            AnswerShape::SingleChoice | AnswerShape::MultiChoice
        )
    }

    pub fn uses_scale(self) -> bool {
        self.scale_kind().is_some()
    }

    /// Free-text answers can be canonicalised through a field mapping.
    pub fn remappable(self) -> bool {
        matches!(self.answer_shape(), AnswerShape::Text | AnswerShape::TextList)
    }

    pub fn is_multiple(self) -> bool {
        self == FieldType::MultipleText
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFieldType(pub String);

impl fmt::Display for UnknownFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown field type `{}`", self.0)
    }
}

impl std::error::Error for UnknownFieldType {}

impl FromStr for FieldType {
    type Err = UnknownFieldType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        FieldType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| UnknownFieldType(value.to_string()))
    }
}

/// Ordinal scale flavours (mirrors Postgres enum `scale_kind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "scale_kind", rename_all = "snake_case")]
pub enum ScaleKind {
    Likert,
    Rating,
}

impl ScaleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScaleKind::Likert => "likert",
            ScaleKind::Rating => "rating",
        }
    }
}
