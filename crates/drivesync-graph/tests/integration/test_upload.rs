//! Integration tests for OneDrive uploads through GraphDriveUploader

use std::time::Duration;

use drivesync_core::{
    domain::{DriveTarget, OwnerId, UploadDescriptor},
    ports::IDriveUploader,
};
use drivesync_graph::{upload::GraphDriveUploader, GraphError};
use serde_json::json;
use wiremock::{
    matchers::{header, method, path},
    Mock, ResponseTemplate,
};

use crate::common;

fn descriptor(destination: &str, key: &str, size: u64) -> UploadDescriptor {
    UploadDescriptor::new(DriveTarget::parse(destination).unwrap(), key, size).unwrap()
}

#[tokio::test]
async fn test_upload_small_puts_streamed_body() {
    let (server, client) = common::setup_graph_mock().await;
    let data: Vec<u8> = (0..5000).map(|i| (i % 251) as u8).collect();

    Mock::given(method("PUT"))
        .and(path("/drives/drive-1/root:/Docs/report.pdf:/content"))
        .and(header("authorization", "Bearer test-access-token"))
        .and(header("content-type", "application/octet-stream"))
        .and(header("content-length", "5000"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "item-001",
            "name": "report.pdf",
            "size": 5000
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uploader = GraphDriveUploader::new(client);
    let item = uploader
        .upload_small(
            OwnerId::new(123),
            &descriptor("drive-1:/Docs", "incoming/report.pdf", 5000),
            common::body_stream(data.clone()),
        )
        .await
        .expect("upload failed");

    assert_eq!(item.id, "item-001");
    assert_eq!(item.name, "report.pdf");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body, data);
}

#[tokio::test]
async fn test_upload_small_default_drive_encodes_names() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("PUT"))
        .and(path("/me/drive/root:/My%20Files/a%20b.txt:/content"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "item-002",
            "name": "a b.txt"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uploader = GraphDriveUploader::new(client);
    let item = uploader
        .upload_small(
            OwnerId::new(1),
            &descriptor("/My Files/", "a b.txt", 3),
            common::body_stream(b"abc".to_vec()),
        )
        .await
        .unwrap();

    assert_eq!(item.name, "a b.txt");
    assert_eq!(item.size, None);
}

#[tokio::test]
async fn test_upload_failure_carries_status_and_body() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(507).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let uploader = GraphDriveUploader::new(client);
    let err = uploader
        .upload_small(
            OwnerId::new(1),
            &descriptor("", "a.txt", 1),
            common::body_stream(b"a".to_vec()),
        )
        .await
        .unwrap_err();

    match err.downcast_ref::<GraphError>() {
        Some(GraphError::ServerError { status, body }) => {
            assert_eq!(*status, 507);
            assert_eq!(body, "quota exceeded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_upload_conflict_maps_to_conflict() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(409).set_body_string("nameAlreadyExists"))
        .mount(&server)
        .await;

    let uploader = GraphDriveUploader::new(client);
    let err = uploader
        .upload_small(
            OwnerId::new(1),
            &descriptor("", "a.txt", 1),
            common::body_stream(b"a".to_vec()),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<GraphError>(),
        Some(GraphError::Conflict(body)) if body == "nameAlreadyExists"
    ));
}

#[tokio::test]
async fn test_upload_large_is_unsupported_and_sends_nothing() {
    let (server, client) = common::setup_graph_mock().await;

    let uploader = GraphDriveUploader::new(client);
    let err = uploader
        .upload_large(
            OwnerId::new(1),
            &descriptor("", "big.bin", 4 * 1024 * 1024),
            common::body_stream(Vec::new()),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<GraphError>(),
        Some(GraphError::Unsupported(_))
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_times_out_on_stalled_server() {
    let (server, client) = common::setup_graph_mock_with_timeout(Duration::from_millis(100)).await;

    Mock::given(method("PUT"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"id": "late", "name": "a.txt"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let uploader = GraphDriveUploader::new(client);
    let err = uploader
        .upload_small(
            OwnerId::new(1),
            &descriptor("/Docs", "a.txt", 3),
            common::body_stream(vec![1, 2, 3]),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<GraphError>(),
        Some(GraphError::NetworkError(e)) if e.is_timeout()
    ));
}
