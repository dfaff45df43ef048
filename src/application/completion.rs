//! Where a respondent goes once a survey has nothing left to answer.

use uuid::Uuid;

pub trait CompletionRedirect: Send + Sync {
    fn redirect_for(&self, survey_id: Uuid) -> String;
}

/// Redirect built from a template; `{survey_id}` is replaced with the survey id.
#[derive(Debug, Clone)]
pub struct TemplateRedirect {
    template: String,
}

impl TemplateRedirect {
    pub const PLACEHOLDER: &'static str = "{survey_id}";

    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl CompletionRedirect for TemplateRedirect {
    fn redirect_for(&self, survey_id: Uuid) -> String {
        self.template
            .replace(Self::PLACEHOLDER, &survey_id.to_string())
    }
}
