mod support;

use std::collections::HashMap;

use serde_json::json;

use surveyor::application::answers::AnswerServiceError;
use surveyor::application::design::fields::FieldDraft;
use surveyor::domain::types::FieldType;

use support::{
    RESPONDENT, add_choice, add_field, add_page, draft, harness, new_survey, publish, required,
    step_page, stored_answer,
};

#[tokio::test]
async fn saving_the_same_field_twice_updates_in_place() {
    let h = harness();
    let (survey, page1) = new_survey(&h.state, "Upsert").await;
    let city = add_field(&h.state, survey.id, Some(page1.id), draft("City", FieldType::TextField)).await;
    publish(&h.state, survey.id).await;

    let first = h
        .state
        .answers
        .save_result(RESPONDENT, survey.id, city.id, json!("Paris"), None)
        .await
        .expect("first save");
    let second = h
        .state
        .answers
        .save_result(RESPONDENT, survey.id, city.id, json!("  Lyon "), None)
        .await
        .expect("second save");

    assert_eq!(first.id, second.id);
    assert_eq!(stored_answer(&second), Some(&json!("Lyon")));

    let stored = h.repos.field_results().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored_answer(&stored[0]), Some(&json!("Lyon")));
    assert_eq!(h.repos.survey_results().await.len(), 1);
}

#[tokio::test]
async fn invalid_page_reports_every_field_and_saves_nothing() {
    let h = harness();
    let (survey, page1) = new_survey(&h.state, "Validation").await;
    let name = add_field(&h.state, survey.id, Some(page1.id), required("Name", FieldType::TextField)).await;
    let born = add_field(&h.state, survey.id, Some(page1.id), draft("Born", FieldType::Date)).await;
    let note = add_field(&h.state, survey.id, Some(page1.id), draft("Note", FieldType::TextArea)).await;
    publish(&h.state, survey.id).await;

    let submitted = HashMap::from([
        (born.id, json!("31/12/1999")),
        (note.id, json!("fine")),
    ]);
    let err = h
        .state
        .answers
        .submit_page(RESPONDENT, survey.id, page1.id, submitted)
        .await
        .expect_err("page must be rejected");

    match err {
        AnswerServiceError::InvalidPage { errors } => {
            assert_eq!(errors.len(), 2);
            assert!(errors.contains_key(&name.id));
            assert!(errors.contains_key(&born.id));
            assert!(!errors.contains_key(&note.id));
        }
        other => panic!("expected per-field errors, got {other:?}"),
    }
    assert!(h.repos.field_results().await.is_empty());
    assert!(h.repos.survey_results().await.is_empty());
}

#[tokio::test]
async fn revealed_off_page_field_is_validated_only_when_shown() {
    let h = harness();
    let (survey, page1) = new_survey(&h.state, "Reveal").await;
    add_page(&h.state, survey.id).await;
    let smoker = add_field(&h.state, survey.id, Some(page1.id), draft("Smoker?", FieldType::Radio)).await;
    let how_many = add_field(&h.state, survey.id, None, required("How many per day", FieldType::TextField)).await;
    let yes = add_choice(&h.state, smoker.id, "Yes", Some(how_many.id)).await;
    let no = add_choice(&h.state, smoker.id, "No", None).await;
    publish(&h.state, survey.id).await;

    let err = h
        .state
        .answers
        .submit_page(
            RESPONDENT,
            survey.id,
            page1.id,
            HashMap::from([(smoker.id, json!(yes.id.to_string()))]),
        )
        .await
        .expect_err("revealed field is required");
    assert!(matches!(
        err,
        AnswerServiceError::InvalidPage { ref errors } if errors.contains_key(&how_many.id)
    ));

    let saved = h
        .state
        .answers
        .submit_page(
            RESPONDENT,
            survey.id,
            page1.id,
            HashMap::from([
                (smoker.id, json!(yes.id.to_string())),
                (how_many.id, json!("3")),
            ]),
        )
        .await
        .expect("revealed field answered");
    let hidden = saved
        .saved
        .iter()
        .find(|result| result.question_id == how_many.id)
        .expect("off-page answer stored");
    assert_eq!(hidden.page_id, page1.id);

    let declined = h
        .state
        .answers
        .submit_page(
            "dave",
            survey.id,
            page1.id,
            HashMap::from([(smoker.id, json!(no.id.to_string()))]),
        )
        .await
        .expect("hidden field is not required when not shown");
    assert!(declined.saved.iter().all(|result| result.question_id != how_many.id));
}

#[tokio::test]
async fn unknown_choice_is_rejected() {
    let h = harness();
    let (survey, page1) = new_survey(&h.state, "Choices").await;
    let colour = add_field(&h.state, survey.id, Some(page1.id), draft("Colour", FieldType::Select)).await;
    add_choice(&h.state, colour.id, "Red", None).await;
    publish(&h.state, survey.id).await;

    let err = h
        .state
        .answers
        .save_result(RESPONDENT, survey.id, colour.id, json!("not-a-choice"), None)
        .await
        .expect_err("unknown choice");
    assert!(matches!(err, AnswerServiceError::Invalid { field_id, .. } if field_id == colour.id));
}

#[tokio::test]
async fn checkbox_answers_are_deduplicated_and_capped() {
    let h = harness();
    let (survey, page1) = new_survey(&h.state, "Toppings").await;
    let toppings = add_field(
        &h.state,
        survey.id,
        Some(page1.id),
        FieldDraft {
            maximum_choices: Some(2),
            ..draft("Toppings", FieldType::Checkbox)
        },
    )
    .await;
    let cheese = add_choice(&h.state, toppings.id, "Cheese", None).await;
    let ham = add_choice(&h.state, toppings.id, "Ham", None).await;
    let olive = add_choice(&h.state, toppings.id, "Olive", None).await;
    publish(&h.state, survey.id).await;

    let saved = h
        .state
        .answers
        .save_result(
            RESPONDENT,
            survey.id,
            toppings.id,
            json!([cheese.id.to_string(), cheese.id.to_string(), ham.id.to_string()]),
            None,
        )
        .await
        .expect("duplicates collapse");
    assert_eq!(
        stored_answer(&saved),
        Some(&json!([cheese.id.to_string(), ham.id.to_string()]))
    );

    let err = h
        .state
        .answers
        .save_result(
            RESPONDENT,
            survey.id,
            toppings.id,
            json!([cheese.id.to_string(), ham.id.to_string(), olive.id.to_string()]),
            None,
        )
        .await
        .expect_err("too many choices");
    assert!(matches!(err, AnswerServiceError::Invalid { .. }));
}

#[tokio::test]
async fn multiple_text_respects_expected_answers() {
    let h = harness();
    let (survey, page1) = new_survey(&h.state, "Lists").await;
    let cities = add_field(
        &h.state,
        survey.id,
        Some(page1.id),
        FieldDraft {
            expected_answers: Some(2),
            ..draft("Cities", FieldType::MultipleText)
        },
    )
    .await;
    publish(&h.state, survey.id).await;

    let saved = h
        .state
        .answers
        .save_result(RESPONDENT, survey.id, cities.id, json!(["Oslo", "", "Rome"]), None)
        .await
        .expect("blank entries are dropped");
    assert_eq!(stored_answer(&saved), Some(&json!(["Oslo", "Rome"])));

    let err = h
        .state
        .answers
        .save_result(RESPONDENT, survey.id, cities.id, json!(["a", "b", "c"]), None)
        .await
        .expect_err("too many entries");
    assert!(matches!(err, AnswerServiceError::Invalid { .. }));
}

#[tokio::test]
async fn upload_fields_cannot_be_answered_with_text() {
    let h = harness();
    let (survey, page1) = new_survey(&h.state, "Files").await;
    let cv = add_field(&h.state, survey.id, Some(page1.id), draft("CV", FieldType::Media)).await;
    publish(&h.state, survey.id).await;

    let err = h
        .state
        .answers
        .save_result(RESPONDENT, survey.id, cv.id, json!("cv.pdf"), None)
        .await
        .expect_err("text answer for an upload field");
    assert!(matches!(err, AnswerServiceError::ConstraintViolation("field_type")));

    let saved = h
        .state
        .answers
        .save_upload(RESPONDENT, survey.id, cv.id, "s/f/cv.pdf", None)
        .await
        .expect("upload answer");
    assert_eq!(saved.upload, "s/f/cv.pdf");
    assert_eq!(stored_answer(&saved), Some(&json!("")));
}

#[tokio::test]
async fn off_page_answer_needs_the_visited_page() {
    let h = harness();
    let (survey, page1) = new_survey(&h.state, "Hidden").await;
    let hidden = add_field(&h.state, survey.id, None, draft("Hidden", FieldType::TextField)).await;
    publish(&h.state, survey.id).await;

    let err = h
        .state
        .answers
        .save_result(RESPONDENT, survey.id, hidden.id, json!("x"), None)
        .await
        .expect_err("page is required for off-page fields");
    assert!(matches!(err, AnswerServiceError::ConstraintViolation("page_id")));

    let saved = h
        .state
        .answers
        .save_result(RESPONDENT, survey.id, hidden.id, json!("x"), Some(page1.id))
        .await
        .expect("visited page given");
    assert_eq!(saved.page_id, page1.id);
}

#[tokio::test]
async fn boolean_required_means_checked() {
    let h = harness();
    let (survey, page1) = new_survey(&h.state, "Consent").await;
    let consent = add_field(&h.state, survey.id, Some(page1.id), required("I agree", FieldType::Boolean)).await;
    publish(&h.state, survey.id).await;

    let err = h
        .state
        .answers
        .submit_page(RESPONDENT, survey.id, page1.id, HashMap::from([(consent.id, json!(false))]))
        .await
        .expect_err("unchecked consent");
    assert!(matches!(err, AnswerServiceError::InvalidPage { .. }));

    let done = h
        .state
        .answers
        .submit_page(RESPONDENT, survey.id, page1.id, HashMap::from([(consent.id, json!("on"))]))
        .await
        .expect("checked consent");
    assert_eq!(stored_answer(&done.saved[0]), Some(&json!(true)));
    assert_eq!(step_page(&done.next), None);
}
