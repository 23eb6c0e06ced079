//! Error handling and boundary conditions
//!
//! Local validation must reject bad uploads without any network traffic;
//! remote failures must map onto distinct error kinds.

use imgly_bgstudio::{
    classify_status, ClientConfig, ExportOptions, ImageUpload, OutputFormat, ProcessingClient,
    RemovalModel, StudioError, UploadValidator,
};

/// Client pointed at a port nothing listens on; any network use would fail differently
fn offline_client() -> ProcessingClient {
    let config = ClientConfig::builder()
        .base_url("http://127.0.0.1:1")
        .build()
        .unwrap();
    ProcessingClient::new(config).unwrap()
}

#[tokio::test]
async fn test_text_file_rejected_without_network() {
    let upload = ImageUpload::from_bytes(b"hello".to_vec(), "notes.txt", Some("text/plain"));
    let err = offline_client()
        .submit(upload, RemovalModel::Auto)
        .await
        .unwrap_err();

    assert!(matches!(err, StudioError::Validation(_)), "got {err:?}");
    assert!(!err.is_remote());
}

#[tokio::test]
async fn test_eleven_mib_file_rejected_without_network() {
    let upload = ImageUpload::from_bytes(vec![0u8; 11 * 1024 * 1024], "huge.png", None);
    let err = offline_client()
        .submit(upload, RemovalModel::Auto)
        .await
        .unwrap_err();

    assert!(matches!(err, StudioError::Validation(_)), "got {err:?}");
    let message = err.to_string();
    assert!(message.contains("11.00 MB") || message.contains("exceeds"), "{message}");
}

#[test]
fn test_exactly_ten_mib_is_accepted() {
    let upload = ImageUpload::from_bytes(vec![0u8; 10 * 1024 * 1024], "limit.png", None);
    assert_eq!(UploadValidator::default().validate(&upload).unwrap(), "image/png");
}

#[tokio::test]
async fn test_unreachable_service_is_network_unavailable() {
    let upload = ImageUpload::from_bytes(vec![0u8; 64], "ok.png", None);
    let err = offline_client()
        .submit(upload, RemovalModel::Silueta)
        .await
        .unwrap_err();
    assert!(matches!(err, StudioError::NetworkUnavailable(_)), "got {err:?}");
    assert!(err.is_remote());
}

#[test]
fn test_status_classification() {
    assert!(matches!(
        classify_status(400, r#"{"detail":"No file"}"#),
        StudioError::InvalidInput(_)
    ));
    assert!(matches!(
        classify_status(422, r#"{"detail":[{"msg":"field required"}]}"#),
        StudioError::UnprocessableImage(_)
    ));
    assert!(matches!(
        classify_status(
            500,
            r#"{"detail":"Error processing image: cannot identify image file <_io.BytesIO>"}"#
        ),
        StudioError::UnprocessableImage(_)
    ));

    match classify_status(503, "upstream down") {
        StudioError::ServerError { status, message } => {
            assert_eq!(status, 503);
            assert!(message.contains("upstream down"));
        },
        other => panic!("expected ServerError, got {other:?}"),
    }
}

#[test]
fn test_config_validation_edge_cases() {
    assert!(ClientConfig::builder().base_url("ftp://example.com").build().is_err());
    assert!(ClientConfig::builder().max_upload_bytes(0).build().is_err());

    let config = ClientConfig::default();
    assert_eq!(config.base_url, "http://localhost:8000");
    assert_eq!(config.default_model, RemovalModel::Auto);
    assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
    assert!(config.timeout.is_none());

    let options = ExportOptions::new(OutputFormat::Jpeg).with_jpeg_quality(150);
    assert_eq!(options.jpeg_quality, 100);
    assert!(options.validate().is_ok());
}

#[test]
fn test_decode_errors_for_garbage_bytes() {
    let err = imgly_bgstudio::SourceImage::decode(b"definitely not an image").unwrap_err();
    assert!(matches!(err, StudioError::Decode(_)), "got {err:?}");
}
