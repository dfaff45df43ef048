//! Canonicalising free-text answers of one field.

use std::collections::BTreeMap;
use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::audit::{AuditAction, AuditService};
use crate::application::permissions::{Permission, PermissionDenied, PermissionPolicy};
use crate::application::repos::{
    FieldsRepo, FieldsWriteRepo, MappingUpdate, RepoError, ResultsRepo, SurveysRepo,
};
use crate::domain::entities::FieldRecord;
use crate::domain::remapping::build_unmapped_list;

const METRIC_MAPPINGS_APPLIED: &str = "surveyor_mappings_applied_total";

#[derive(Debug, Error)]
pub enum RemapError {
    #[error("{0}")]
    ConstraintViolation(&'static str),
    #[error(transparent)]
    Forbidden(#[from] PermissionDenied),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// State of a field's mapping as shown to the designer.
#[derive(Debug, Clone)]
pub struct RemapOverview {
    pub field: FieldRecord,
    /// Normalized answers not mapped yet, sorted.
    pub unmapped: Vec<String>,
    /// Canonical label → tokens mapped to it.
    pub groups: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ApplyMappingCommand {
    pub field_id: Uuid,
    pub tokens: Vec<String>,
    pub canonical_label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingOutcome {
    pub mapped_tokens: usize,
    pub results_updated: u64,
}

#[derive(Serialize)]
struct MappingSnapshot<'a> {
    canonical_label: &'a str,
    tokens: &'a [String],
    results_updated: u64,
}

#[derive(Clone)]
pub struct RemapService {
    surveys: Arc<dyn SurveysRepo>,
    fields: Arc<dyn FieldsRepo>,
    writer: Arc<dyn FieldsWriteRepo>,
    results: Arc<dyn ResultsRepo>,
    policy: Arc<dyn PermissionPolicy>,
    audit: AuditService,
}

impl RemapService {
    pub fn new(
        surveys: Arc<dyn SurveysRepo>,
        fields: Arc<dyn FieldsRepo>,
        writer: Arc<dyn FieldsWriteRepo>,
        results: Arc<dyn ResultsRepo>,
        policy: Arc<dyn PermissionPolicy>,
        audit: AuditService,
    ) -> Self {
        Self {
            surveys,
            fields,
            writer,
            results,
            policy,
            audit,
        }
    }

    async fn load(&self, actor: &str, field_id: Uuid) -> Result<FieldRecord, RemapError> {
        let field = self
            .fields
            .find_field(field_id)
            .await?
            .ok_or(RepoError::NotFound)?;
        let survey = self
            .surveys
            .find_survey(field.survey_id)
            .await?
            .ok_or(RepoError::NotFound)?;
        self.policy
            .ensure(actor, Permission::ViewResults, Some(&survey))?;
        if !field.field_type.remappable() {
            return Err(RemapError::ConstraintViolation("field_type"));
        }
        Ok(field)
    }

    pub async fn overview(&self, actor: &str, field_id: Uuid) -> Result<RemapOverview, RemapError> {
        let field = self.load(actor, field_id).await?;
        let results = self.results.list_answers_for_field(field.id).await?;
        let unmapped = build_unmapped_list(
            results.iter().filter_map(|result| result.answer_value()),
            &field.mapping,
        );
        let groups = field
            .mapping
            .grouped()
            .into_iter()
            .map(|(label, tokens)| {
                (
                    label.to_string(),
                    tokens.into_iter().map(str::to_string).collect(),
                )
            })
            .collect();

        Ok(RemapOverview {
            field,
            unmapped,
            groups,
        })
    }

    /// Point the chosen tokens at `canonical_label` (dropping tokens previously mapped to
    /// it) and rewrite every mapped answer of the field.
    pub async fn apply_mapping(
        &self,
        actor: &str,
        command: ApplyMappingCommand,
    ) -> Result<MappingOutcome, RemapError> {
        let field = self.load(actor, command.field_id).await?;
        let label = command.canonical_label.trim();
        if label.is_empty() {
            return Err(RemapError::ConstraintViolation("canonical_label"));
        }

        let MappingUpdate {
            mapped_tokens,
            results_updated,
        } = self
            .writer
            .apply_mapping(field.id, &command.tokens, label)
            .await?;

        counter!(METRIC_MAPPINGS_APPLIED).increment(1);
        info!(
            target = "surveyor::remap",
            field_id = %field.id,
            canonical_label = label,
            mapped_tokens,
            results_updated,
            "answer mapping applied"
        );
        let snapshot = MappingSnapshot {
            canonical_label: label,
            tokens: &command.tokens,
            results_updated,
        };
        self.audit
            .record(actor, AuditAction::FieldRemap, field.id, &snapshot)
            .await?;

        Ok(MappingOutcome {
            mapped_tokens,
            results_updated,
        })
    }
}
