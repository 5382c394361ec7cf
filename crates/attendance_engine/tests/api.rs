use std::fs;

use attendance_core::{ExportRequest, TaskId, TaskStatus};
use attendance_engine::{ApiClient, ApiError, ClientSettings, ReqwestApi};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, body_string_contains, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> ReqwestApi {
    ReqwestApi::new(&ClientSettings {
        base_url: server.uri(),
        ..ClientSettings::default()
    })
    .expect("client")
}

#[tokio::test]
async fn analysis_report_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/analyze-full"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "summary": {
                "total_persons": 5,
                "total_missing": 3,
                "persons_with_issues": 2,
                "total_matched": 40
            },
            "records": [{
                "person_name": "An",
                "date": "2024-03-04",
                "weekday": "Monday",
                "issue_description": "Missing check-out",
                "matched_image": null,
                "department": "Ops"
            }]
        })))
        .mount(&server)
        .await;

    let report = api_for(&server).analyze_full().await.expect("report");
    assert_eq!(report.summary.total_persons, 5);
    assert_eq!(report.summary.total_missing, 3);
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].person_name, "An");
    assert_eq!(report.records[0].extra.get("department"), Some(&json!("Ops")));
}

#[tokio::test]
async fn unsuccessful_envelope_surfaces_server_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/export-word"))
        .and(body_json(json!({
            "project_name": "Site A",
            "month": "03/2024",
            "records": []
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "No records to export"
        })))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .export_word(&ExportRequest {
            project_name: "Site A".into(),
            month: "03/2024".into(),
            records: vec![],
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No records to export");
}

#[tokio::test]
async fn http_error_body_wins_over_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/pdf/status/gone"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": "Task not found"})),
        )
        .mount(&server)
        .await;

    let err = api_for(&server)
        .task_status(&TaskId::new("gone"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ApiError::Server {
            status: Some(404),
            message: "Task not found".into()
        }
    );
}

#[tokio::test]
async fn upload_sends_multipart_pdf() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/pdf/upload"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .and(body_string_contains("name=\"file\""))
        .and(body_string_contains("filename=\"scan.pdf\""))
        .and(body_string_contains("application/pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "filename": "20240304_scan.pdf"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let pdf = temp.path().join("scan.pdf");
    fs::write(&pdf, b"%PDF-1.4 test").unwrap();

    let stored = api_for(&server).upload_pdf(&pdf).await.expect("upload");
    assert_eq!(stored, "20240304_scan.pdf");
}

#[tokio::test]
async fn upload_of_missing_file_is_an_io_error() {
    let server = MockServer::start().await;
    let err = api_for(&server)
        .upload_pdf(std::path::Path::new("/nonexistent/scan.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Io(_)));
}

#[tokio::test]
async fn start_extraction_returns_task_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/pdf/extract"))
        .and(body_json(json!({"filename": "scan.pdf"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "task_id": "abc-123"
        })))
        .mount(&server)
        .await;

    let task_id = api_for(&server).start_extraction("scan.pdf").await.unwrap();
    assert_eq!(task_id, TaskId::new("abc-123"));
}

#[tokio::test]
async fn listings_tolerate_missing_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/files/results"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"files": null})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/pdf/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "folders": [{
                "folder": "scan",
                "count": 1,
                "files": [{"name": "page_1.docx", "size": 2048}]
            }]
        })))
        .mount(&server)
        .await;

    let api = api_for(&server);
    assert!(api.list_result_files().await.unwrap().is_empty());

    let folders = api.list_extracted_files().await.unwrap();
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0].files[0].name, "page_1.docx");
    assert_eq!(folders[0].files[0].size, 2048);
}

#[tokio::test]
async fn download_encodes_path_segments() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/pdf/download/March%202024/page%201.docx"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"DOCX".to_vec()))
        .mount(&server)
        .await;

    let bytes = api_for(&server)
        .download_extracted("March 2024", "page 1.docx")
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"DOCX");
}

#[tokio::test]
async fn unknown_status_is_kept_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/pdf/status/t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "queued",
            "progress": 0
        })))
        .mount(&server)
        .await;

    let snapshot = api_for(&server).task_status(&TaskId::new("t")).await.unwrap();
    assert_eq!(snapshot.status, TaskStatus::Other("queued".into()));
    assert!(!snapshot.status.is_terminal());
}
