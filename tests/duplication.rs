mod support;

use std::collections::{HashMap, HashSet};

use serde_json::json;
use uuid::Uuid;

use surveyor::application::duplication::DuplicationError;
use surveyor::domain::types::FieldType;

use support::{
    DESIGNER, RESPONDENT, add_choice, add_field, add_page, draft, harness, new_survey,
    place_field, publish, set_page_target,
};

#[tokio::test]
async fn copy_preserves_topology_with_fresh_ids() {
    let h = harness();
    let (survey, page1) = new_survey(&h.state, "Original").await;
    let page2 = add_page(&h.state, survey.id).await;
    let page3 = add_page(&h.state, survey.id).await;
    set_page_target(&h.state, &page1, Some(page3.id)).await;

    let question = add_field(&h.state, survey.id, Some(page1.id), draft("Route", FieldType::Radio)).await;
    add_field(&h.state, survey.id, Some(page2.id), draft("Middle", FieldType::TextField)).await;
    let hidden = add_field(&h.state, survey.id, None, draft("Why", FieldType::TextArea)).await;
    let landing = add_field(&h.state, survey.id, None, draft("Landing", FieldType::TextField)).await;
    add_choice(&h.state, question.id, "Explain", Some(hidden.id)).await;
    add_choice(&h.state, question.id, "Jump", Some(landing.id)).await;
    add_choice(&h.state, question.id, "Stay", None).await;
    place_field(&h.state, &landing, Some(page3.id)).await;

    publish(&h.state, survey.id).await;
    h.state
        .answers
        .save_result(RESPONDENT, survey.id, question.id, json!(""), None)
        .await
        .expect("answer on the source");

    let copy = h
        .state
        .duplication
        .duplicate(DESIGNER, survey.id)
        .await
        .expect("duplicate");
    assert_ne!(copy.id, survey.id);
    assert_eq!(copy.creator, DESIGNER);
    assert!(!copy.is_published());

    let source = h.state.surveys.detail(DESIGNER, survey.id).await.expect("source");
    let copied = h.state.surveys.detail(DESIGNER, copy.id).await.expect("copy");

    assert_eq!(copied.pages().len(), source.pages().len());
    assert_eq!(copied.fields().len(), source.fields().len());
    assert_eq!(copied.choices().len(), source.choices().len());

    let source_ids: HashSet<Uuid> = source
        .pages()
        .iter()
        .map(|p| p.id)
        .chain(source.fields().iter().map(|f| f.id))
        .chain(source.choices().iter().map(|c| c.id))
        .collect();

    // Every copied reference points inside the copy.
    for page in copied.pages() {
        assert_eq!(page.survey_id, copy.id);
        assert!(!source_ids.contains(&page.id));
        if let Some(target) = page.target_id {
            assert!(copied.page(target).is_some());
        }
    }
    for field in copied.fields() {
        assert_eq!(field.survey_id, copy.id);
        assert!(!source_ids.contains(&field.id));
        if let Some(page_id) = field.page_id {
            assert!(copied.page(page_id).is_some());
        }
    }
    for choice in copied.choices() {
        assert!(!source_ids.contains(&choice.id));
        assert!(copied.field(choice.field_id).is_some());
        if let Some(target) = choice.target_id {
            assert!(copied.field(target).is_some());
        }
    }

    // Same shape: page numbers keep their targets, choices keep their destinations.
    let copied_page1 = copied.page_by_num(1).expect("page 1");
    let target = copied_page1.target_id.and_then(|id| copied.page(id)).expect("target");
    assert_eq!(target.page_num, 3);

    let by_label: HashMap<&str, Option<Uuid>> = copied
        .choices()
        .iter()
        .map(|c| (c.label.as_str(), c.target_id))
        .collect();
    let explain = by_label["Explain"].and_then(|id| copied.field(id)).expect("explain target");
    assert_eq!(explain.label, "Why");
    assert!(explain.is_off_page());
    let jump = by_label["Jump"].and_then(|id| copied.field(id)).expect("jump target");
    let jump_page = jump.page_id.and_then(|id| copied.page(id)).expect("jump page");
    assert_eq!(jump_page.page_num, 3);
    assert_eq!(by_label["Stay"], None);

    // Results stay with the source.
    assert!(
        h.repos
            .survey_results()
            .await
            .iter()
            .all(|result| result.survey_id == survey.id)
    );
}

#[tokio::test]
async fn duplicating_twice_gives_independent_copies() {
    let h = harness();
    let (survey, page1) = new_survey(&h.state, "Twice").await;
    add_field(&h.state, survey.id, Some(page1.id), draft("Q", FieldType::TextField)).await;

    let first = h.state.duplication.duplicate(DESIGNER, survey.id).await.expect("first");
    let second = h.state.duplication.duplicate(DESIGNER, survey.id).await.expect("second");
    assert_ne!(first.id, second.id);

    h.state.surveys.delete(DESIGNER, first.id).await.expect("delete first copy");
    let remaining = h.state.surveys.detail(DESIGNER, second.id).await.expect("second copy");
    assert_eq!(remaining.fields().len(), 1);
    let original = h.state.surveys.detail(DESIGNER, survey.id).await.expect("source");
    assert_eq!(original.fields().len(), 1);
}

#[tokio::test]
async fn only_the_creator_may_duplicate() {
    let h = harness();
    let (survey, _) = new_survey(&h.state, "Private").await;

    let err = h
        .state
        .duplication
        .duplicate(RESPONDENT, survey.id)
        .await
        .expect_err("not the creator");
    assert!(matches!(err, DuplicationError::Forbidden(_)));
    assert_eq!(h.repos.all_surveys().await.len(), 1);
}

#[tokio::test]
async fn duplication_is_audited() {
    let h = harness();
    let (survey, _) = new_survey(&h.state, "Audited").await;
    h.state.duplication.duplicate(DESIGNER, survey.id).await.expect("duplicate");

    let actions = h.repos.audit_actions().await;
    assert!(actions.iter().any(|action| action == "survey.duplicate"));
}
