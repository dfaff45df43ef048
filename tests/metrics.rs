mod support;

use std::collections::HashMap;
use std::sync::OnceLock;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::json;
use serial_test::serial;

use surveyor::domain::types::FieldType;

use support::{
    DESIGNER, RESPONDENT, add_field, add_page, draft, harness, new_survey, publish,
    set_page_target,
};

static SNAPSHOTTER: OnceLock<Snapshotter> = OnceLock::new();

fn snapshotter() -> &'static Snapshotter {
    SNAPSHOTTER.get_or_init(|| {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        recorder
            .install()
            .expect("debug metrics recorder should install in this test process");
        snapshotter
    })
}

/// Counter values recorded since the previous snapshot.
///
/// The debugging recorder resets counters whenever it is read, so each test drains it
/// once before acting and then reads every counter from a single snapshot.
struct Counters(Vec<(String, Option<String>, u64)>);

impl Counters {
    fn take() -> Self {
        let values = snapshotter()
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(key, _, _, value)| {
                let DebugValue::Counter(count) = value else {
                    return None;
                };
                let outcome = key
                    .key()
                    .labels()
                    .find(|label| label.key() == "outcome")
                    .map(|label| label.value().to_string());
                Some((key.key().name().to_string(), outcome, count))
            })
            .collect();
        Self(values)
    }

    /// Sum of `name`, optionally restricted to one `outcome` label.
    fn get(&self, name: &str, outcome: Option<&str>) -> u64 {
        self.0
            .iter()
            .filter(|(key, label, _)| key == name)
            .filter(|(_, label, _)| outcome.is_none() || label.as_deref() == outcome)
            .map(|(_, _, count)| count)
            .sum()
    }
}

#[tokio::test]
#[serial]
async fn design_operations_are_counted() {
    Counters::take();

    let h = harness();
    let (survey, _) = new_survey(&h.state, "Counted").await;
    h.state
        .duplication
        .duplicate(DESIGNER, survey.id)
        .await
        .expect("duplicate");

    let counters = Counters::take();
    assert_eq!(counters.get("surveyor_surveys_created_total", None), 1);
    assert_eq!(counters.get("surveyor_surveys_duplicated_total", None), 1);
}

#[tokio::test]
#[serial]
async fn answers_count_every_stored_field() {
    Counters::take();

    let h = harness();
    let (survey, page1) = new_survey(&h.state, "Answers").await;
    let a = add_field(&h.state, survey.id, Some(page1.id), draft("A", FieldType::TextField)).await;
    let b = add_field(&h.state, survey.id, Some(page1.id), draft("B", FieldType::TextField)).await;
    publish(&h.state, survey.id).await;

    h.state
        .answers
        .submit_page(
            RESPONDENT,
            survey.id,
            page1.id,
            HashMap::from([(a.id, json!("one")), (b.id, json!("two"))]),
        )
        .await
        .expect("submit");

    assert_eq!(Counters::take().get("surveyor_answers_saved_total", None), 2);
}

#[tokio::test]
#[serial]
async fn flow_resolutions_are_labelled_by_outcome() {
    Counters::take();

    let h = harness();
    let (survey, page1) = new_survey(&h.state, "Outcomes").await;
    let page2 = add_page(&h.state, survey.id).await;
    let q1 = add_field(&h.state, survey.id, Some(page1.id), draft("A", FieldType::TextField)).await;
    let q2 = add_field(&h.state, survey.id, Some(page2.id), draft("B", FieldType::TextField)).await;
    set_page_target(&h.state, &page2, Some(page1.id)).await;
    publish(&h.state, survey.id).await;

    h.state.flow.next_page(RESPONDENT, survey.id).await.expect("first page");
    let counters = Counters::take();
    assert_eq!(counters.get("surveyor_flow_resolutions_total", Some("page")), 1);
    assert_eq!(counters.get("surveyor_flow_resolutions_total", Some("cycle")), 0);

    for (page_id, field_id) in [(page1.id, q1.id), (page2.id, q2.id)] {
        h.state
            .answers
            .submit_page(
                RESPONDENT,
                survey.id,
                page_id,
                HashMap::from([(field_id, json!("x"))]),
            )
            .await
            .expect("submit");
    }
    assert_eq!(
        Counters::take().get("surveyor_flow_resolutions_total", Some("cycle")),
        1
    );
}
