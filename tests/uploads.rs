mod support;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use surveyor::domain::types::FieldType;
use surveyor::infra::http::build_router;

use support::{RESPONDENT, USER_HEADER, add_field, draft, harness, new_survey, publish};

const BOUNDARY: &str = "surveyor-test-boundary";

fn multipart_body(page_id: Option<Uuid>, filename: &str, contents: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(page_id) = page_id {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"page_id\"\r\n\r\n{page_id}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn upload(
    h: &support::Harness,
    survey_id: Uuid,
    field_id: Uuid,
    page_id: Option<Uuid>,
    filename: &str,
    contents: &[u8],
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(format!(
            "/api/v1/run/surveys/{survey_id}/fields/{field_id}/upload"
        ))
        .header(USER_HEADER, RESPONDENT)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(page_id, filename, contents)))
        .expect("request");
    let response = build_router(h.state.clone(), 1024 * 1024)
        .oneshot(request)
        .await
        .expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn upload_is_stored_and_recorded() {
    let h = harness();
    let (survey, page1) = new_survey(&h.state, "Files").await;
    let cv = add_field(&h.state, survey.id, Some(page1.id), draft("CV", FieldType::Media)).await;
    publish(&h.state, survey.id).await;

    let (status, body) = upload(&h, survey.id, cv.id, None, "My CV.PDF", b"%PDF-1.7").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["size_bytes"], 8);
    assert_eq!(body["checksum"].as_str().map(str::len), Some(64));

    let stored = body["result"]["upload"].as_str().expect("stored path").to_string();
    assert!(stored.starts_with(&format!("{}/{}/", survey.id, cv.id)));
    assert!(stored.ends_with("-my-cv.pdf"));
    let on_disk = h.state.upload_storage.resolve(&stored).expect("resolve");
    assert_eq!(std::fs::read(on_disk).expect("read upload"), b"%PDF-1.7");

    let results = h.repos.field_results().await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].upload, stored);
    assert_eq!(results[0].page_id, page1.id);
}

#[tokio::test]
async fn replacing_an_upload_removes_the_previous_file() {
    let h = harness();
    let (survey, page1) = new_survey(&h.state, "Replace").await;
    let photo = add_field(&h.state, survey.id, Some(page1.id), draft("Photo", FieldType::Media)).await;
    publish(&h.state, survey.id).await;

    let (_, first) = upload(&h, survey.id, photo.id, None, "a.png", b"first").await;
    let first_path = first["result"]["upload"].as_str().expect("path").to_string();
    let (status, second) = upload(&h, survey.id, photo.id, None, "b.png", b"second").await;
    assert_eq!(status, StatusCode::CREATED);
    let second_path = second["result"]["upload"].as_str().expect("path").to_string();

    assert_ne!(first_path, second_path);
    assert!(!h.state.upload_storage.resolve(&first_path).expect("resolve").exists());
    assert!(h.state.upload_storage.resolve(&second_path).expect("resolve").exists());
    assert_eq!(h.repos.field_results().await.len(), 1);
}

#[tokio::test]
async fn off_page_upload_uses_the_given_page() {
    let h = harness();
    let (survey, page1) = new_survey(&h.state, "Hidden file").await;
    let proof = add_field(&h.state, survey.id, None, draft("Proof", FieldType::Media)).await;
    publish(&h.state, survey.id).await;

    let (status, body) = upload(&h, survey.id, proof.id, None, "p.txt", b"x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
    // The orphaned blob is removed when the answer cannot be recorded.
    let field_dir = h
        .state
        .upload_storage
        .root()
        .join(survey.id.to_string())
        .join(proof.id.to_string());
    let leftovers = std::fs::read_dir(&field_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);

    let (status, body) = upload(&h, survey.id, proof.id, Some(page1.id), "p.txt", b"x").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["result"]["page_id"], page1.id.to_string());
}

#[tokio::test]
async fn uploads_are_rejected_for_other_field_types() {
    let h = harness();
    let (survey, page1) = new_survey(&h.state, "Text").await;
    let name = add_field(&h.state, survey.id, Some(page1.id), draft("Name", FieldType::TextField)).await;
    publish(&h.state, survey.id).await;

    let (status, body) = upload(&h, survey.id, name.id, None, "n.txt", b"x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn empty_uploads_are_rejected() {
    let h = harness();
    let (survey, page1) = new_survey(&h.state, "Empty").await;
    let cv = add_field(&h.state, survey.id, Some(page1.id), draft("CV", FieldType::Media)).await;
    publish(&h.state, survey.id).await;

    let (status, body) = upload(&h, survey.id, cv.id, None, "cv.pdf", b"").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "upload_error");
    assert!(h.repos.field_results().await.is_empty());
}
