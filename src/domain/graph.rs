//! In-memory view over a survey's page/field/choice topology.

use uuid::Uuid;

use crate::domain::{
    entities::{FieldChoiceRecord, FieldRecord, PageRecord, SurveyRecord},
    error::DomainError,
};

/// Snapshot of one survey's design graph.
///
/// Pages are kept in `page_num` order, fields in `(ordinal, id)` order and choices in
/// `(created_at, id)` order so every traversal is deterministic.
#[derive(Debug, Clone)]
pub struct SurveyGraph {
    survey: SurveyRecord,
    pages: Vec<PageRecord>,
    fields: Vec<FieldRecord>,
    choices: Vec<FieldChoiceRecord>,
}

impl SurveyGraph {
    pub fn new(
        survey: SurveyRecord,
        mut pages: Vec<PageRecord>,
        mut fields: Vec<FieldRecord>,
        mut choices: Vec<FieldChoiceRecord>,
    ) -> Self {
        pages.sort_by_key(|page| (page.page_num, page.id));
        fields.sort_by_key(|field| (field.ordinal, field.id));
        choices.sort_by_key(|choice| (choice.created_at, choice.id));
        Self {
            survey,
            pages,
            fields,
            choices,
        }
    }

    pub fn survey(&self) -> &SurveyRecord {
        &self.survey
    }

    pub fn pages(&self) -> &[PageRecord] {
        &self.pages
    }

    pub fn fields(&self) -> &[FieldRecord] {
        &self.fields
    }

    pub fn choices(&self) -> &[FieldChoiceRecord] {
        &self.choices
    }

    /// Page with the lowest `page_num`.
    pub fn first_page(&self) -> Option<&PageRecord> {
        self.pages.first()
    }

    pub fn page(&self, id: Uuid) -> Option<&PageRecord> {
        self.pages.iter().find(|page| page.id == id)
    }

    pub fn page_by_num(&self, page_num: i32) -> Option<&PageRecord> {
        self.pages.iter().find(|page| page.page_num == page_num)
    }

    pub fn field(&self, id: Uuid) -> Option<&FieldRecord> {
        self.fields.iter().find(|field| field.id == id)
    }

    pub fn choice(&self, id: Uuid) -> Option<&FieldChoiceRecord> {
        self.choices.iter().find(|choice| choice.id == id)
    }

    pub fn fields_on_page(&self, page_id: Uuid) -> impl Iterator<Item = &FieldRecord> {
        self.fields
            .iter()
            .filter(move |field| field.page_id == Some(page_id))
    }

    pub fn choices_for(&self, field_id: Uuid) -> impl Iterator<Item = &FieldChoiceRecord> {
        self.choices
            .iter()
            .filter(move |choice| choice.field_id == field_id)
    }

    /// Choices with a branch target on the page's fields, in tie-break order:
    /// field ordinal, field id, choice creation time, choice id.
    pub fn branch_choices(
        &self,
        page_id: Uuid,
    ) -> impl Iterator<Item = (&FieldRecord, &FieldChoiceRecord)> {
        self.fields_on_page(page_id)
            .filter(|field| field.field_type.needs_choices())
            .flat_map(move |field| {
                self.choices_for(field.id)
                    .filter(|choice| choice.target_id.is_some())
                    .map(move |choice| (field, choice))
            })
    }

    /// Off-page fields revealed by choices on this page, paired with the revealing choice.
    pub fn revealed_fields(
        &self,
        page_id: Uuid,
    ) -> impl Iterator<Item = (&FieldChoiceRecord, &FieldRecord)> {
        self.branch_choices(page_id).filter_map(move |(_, choice)| {
            choice
                .target_id
                .and_then(|target| self.field(target))
                .filter(|target| target.is_off_page())
                .map(|target| (choice, target))
        })
    }

    /// A choice may only target an off-page field of the same survey.
    pub fn validate_choice_target(&self, target_field_id: Uuid) -> Result<(), DomainError> {
        let target = self
            .field(target_field_id)
            .ok_or_else(|| DomainError::not_found("field"))?;

        if target.page_id.is_some() {
            return Err(DomainError::validation(
                "target",
                "choice targets can only be questions not associated with a page",
            ));
        }

        Ok(())
    }
}
