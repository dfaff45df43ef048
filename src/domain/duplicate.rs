//! Deep copy of a survey design with cross references remapped.
//!
//! Copies are built in two passes. The first pass clones every page, field and choice
//! under a fresh id with its outgoing targets cleared, recording `old id → new id`. The
//! second pass translates each original target through those maps. Persisting the plan in
//! the same order (rows first, targets last) never references a row that does not exist yet.

use std::collections::HashMap;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::{
    entities::{FieldChoiceRecord, FieldRecord, PageRecord, SurveyRecord},
    graph::SurveyGraph,
};

/// Target link to set once every copied row exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetLink {
    pub source: Uuid,
    pub target: Uuid,
}

/// Which kind of edge a dropped target belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    PageTarget,
    ChoiceTarget,
}

/// An original target that did not resolve inside the copied survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DroppedTarget {
    pub kind: EdgeKind,
    pub original_source: Uuid,
    pub original_target: Uuid,
}

#[derive(Debug, Clone)]
pub struct SurveyCopyPlan {
    pub survey: SurveyRecord,
    /// Page copies with `target_id` cleared.
    pub pages: Vec<PageRecord>,
    pub fields: Vec<FieldRecord>,
    /// Choice copies with `target_id` cleared.
    pub choices: Vec<FieldChoiceRecord>,
    pub page_targets: Vec<TargetLink>,
    pub choice_targets: Vec<TargetLink>,
    pub dropped: Vec<DroppedTarget>,
}

impl SurveyCopyPlan {
    pub fn new(graph: &SurveyGraph, now: OffsetDateTime) -> Self {
        let source = graph.survey();
        let survey = SurveyRecord {
            id: Uuid::new_v4(),
            name: source.name.clone(),
            creator: source.creator.clone(),
            created_at: now,
            updated_at: now,
            published_at: None,
        };

        let mut page_map = HashMap::with_capacity(graph.pages().len());
        let pages: Vec<_> = graph
            .pages()
            .iter()
            .map(|page| {
                let copy = PageRecord {
                    id: Uuid::new_v4(),
                    survey_id: survey.id,
                    page_num: page.page_num,
                    subtitle: page.subtitle.clone(),
                    target_id: None,
                    created_at: now,
                };
                page_map.insert(page.id, copy.id);
                copy
            })
            .collect();

        let mut field_map = HashMap::with_capacity(graph.fields().len());
        let fields: Vec<_> = graph
            .fields()
            .iter()
            .map(|field| {
                let copy = FieldRecord {
                    id: Uuid::new_v4(),
                    survey_id: survey.id,
                    page_id: field.page_id.and_then(|page| page_map.get(&page).copied()),
                    created_at: now,
                    updated_at: now,
                    ..field.clone()
                };
                field_map.insert(field.id, copy.id);
                copy
            })
            .collect();

        let mut choice_map = HashMap::with_capacity(graph.choices().len());
        let choices: Vec<_> = graph
            .choices()
            .iter()
            .filter_map(|choice| {
                let field_id = field_map.get(&choice.field_id).copied()?;
                let copy = FieldChoiceRecord {
                    id: Uuid::new_v4(),
                    field_id,
                    label: choice.label.clone(),
                    target_id: None,
                    created_at: choice.created_at,
                };
                choice_map.insert(choice.id, copy.id);
                Some(copy)
            })
            .collect();

        let mut dropped = Vec::new();

        let page_targets = graph
            .pages()
            .iter()
            .filter_map(|page| {
                let original_target = page.target_id?;
                let source = page_map.get(&page.id).copied()?;
                match page_map.get(&original_target) {
                    Some(&target) => Some(TargetLink { source, target }),
                    None => {
                        dropped.push(DroppedTarget {
                            kind: EdgeKind::PageTarget,
                            original_source: page.id,
                            original_target,
                        });
                        None
                    }
                }
            })
            .collect();

        let choice_targets = graph
            .choices()
            .iter()
            .filter_map(|choice| {
                let original_target = choice.target_id?;
                let source = choice_map.get(&choice.id).copied()?;
                match field_map.get(&original_target) {
                    Some(&target) => Some(TargetLink { source, target }),
                    None => {
                        dropped.push(DroppedTarget {
                            kind: EdgeKind::ChoiceTarget,
                            original_source: choice.id,
                            original_target,
                        });
                        None
                    }
                }
            })
            .collect();

        Self {
            survey,
            pages,
            fields,
            choices,
            page_targets,
            choice_targets,
            dropped,
        }
    }

    /// The copy as it reads once every target link has been applied.
    pub fn linked_graph(&self) -> SurveyGraph {
        let mut pages = self.pages.clone();
        for link in &self.page_targets {
            if let Some(page) = pages.iter_mut().find(|page| page.id == link.source) {
                page.target_id = Some(link.target);
            }
        }

        let mut choices = self.choices.clone();
        for link in &self.choice_targets {
            if let Some(choice) = choices.iter_mut().find(|choice| choice.id == link.source) {
                choice.target_id = Some(link.target);
            }
        }

        SurveyGraph::new(self.survey.clone(), pages, self.fields.clone(), choices)
    }
}
