//! Client behaviour against a local HTTP responder

mod common;

use common::{cutout_500, png_bytes, serve_once, CannedResponse};
use futures::StreamExt;
use imgly_bgstudio::{
    ClientConfig, ImageKind, ImageUpload, ProcessingClient, QualityLevel, RemovalModel,
    RemovalOptions, ServerOutputFormat, SourceImage, StudioError,
};

fn client_for(base_url: &str) -> ProcessingClient {
    let config = ClientConfig::builder().base_url(base_url).build().unwrap();
    ProcessingClient::new(config).unwrap()
}

fn sample_upload() -> ImageUpload {
    ImageUpload::from_bytes(png_bytes(&cutout_500()), "portrait.png", None)
}

#[tokio::test]
async fn test_submission_reports_monotonic_progress_and_ids() {
    let result_png = png_bytes(&cutout_500());
    let (base_url, server) =
        serve_once(CannedResponse::image(result_png.clone(), "orig-42", "proc-42")).await;

    let options = RemovalOptions {
        model: RemovalModel::IsNetGeneralUse,
        output_format: ServerOutputFormat::Png,
        quality: QualityLevel::Medium,
    };
    let mut submission = client_for(&base_url).submit_with_progress(sample_upload(), options);

    let mut seen = Vec::new();
    while let Some(percent) = submission.next().await {
        seen.push(percent);
    }
    let processed = submission.result().await.unwrap();

    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "progress went backwards: {seen:?}");
    assert_eq!(seen.last(), Some(&100));

    assert_eq!(processed.bytes, result_png);
    assert_eq!(processed.content_type, "image/png");
    assert_eq!(processed.original_id.as_deref(), Some("orig-42"));
    assert_eq!(processed.processed_id.as_deref(), Some("proc-42"));
    assert_eq!(SourceImage::decode(&processed.bytes).unwrap().dimensions(), (500, 500));

    let request = server.await.unwrap();
    assert!(request.request_line().starts_with("POST /remove-background"));
    let body = request.body_text();
    assert!(body.contains(r#"name="image"; filename="portrait.png""#));
    assert!(body.contains("image/png"));
    assert!(body.contains("isnet-general-use"));
    assert!(body.contains(r#"name="output_format""#));
    assert!(body.contains("medium"));
}

#[tokio::test]
async fn test_corrupt_upload_maps_to_unprocessable() {
    let (base_url, _server) = serve_once(CannedResponse::json(
        500,
        r#"{"detail":"Error processing image: cannot identify image file <_io.BytesIO object>"}"#,
    ))
    .await;

    let err = client_for(&base_url)
        .submit(sample_upload(), RemovalModel::Auto)
        .await
        .unwrap_err();
    assert!(matches!(err, StudioError::UnprocessableImage(_)), "got {err:?}");
}

#[tokio::test]
async fn test_server_failure_keeps_status() {
    let (base_url, _server) =
        serve_once(CannedResponse::json(500, r#"{"detail":"Error processing image: out of memory"}"#))
            .await;

    let err = client_for(&base_url)
        .submit(sample_upload(), RemovalModel::Auto)
        .await
        .unwrap_err();
    match err {
        StudioError::ServerError { status, message } => {
            assert_eq!(status, 500);
            assert!(message.contains("out of memory"));
        },
        other => panic!("expected ServerError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_list_models() {
    let (base_url, server) = serve_once(CannedResponse::json(
        200,
        r#"{"models":[
            {"id":"u2net","name":"U2-Net","description":"General purpose","recommended":true},
            {"id":"silueta","name":"Silueta"}
        ]}"#,
    ))
    .await;

    let models = client_for(&base_url).list_models().await.unwrap();
    assert_eq!(models.len(), 2);
    assert!(models[0].recommended);
    assert_eq!(models[1].description, "");
    assert!(server.await.unwrap().request_line().starts_with("GET /models"));
}

#[tokio::test]
async fn test_list_images_sends_filters() {
    let (base_url, server) = serve_once(CannedResponse::json(
        200,
        r#"{"images":[{
            "id":"p1","filename":"cat_no_bg.png","type":"processed","parent_id":"o1",
            "file_size":2048,"created_at":"2024-05-01T10:00:00","updated_at":"2024-05-01T10:00:00",
            "metadata":{"model":"u2net"}
        }]}"#,
    ))
    .await;

    let images = client_for(&base_url)
        .list_images(Some(ImageKind::Processed), Some("o1"))
        .await
        .unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].kind, ImageKind::Processed);
    assert_eq!(images[0].parent_id.as_deref(), Some("o1"));

    let line = server.await.unwrap().request_line().to_string();
    assert!(line.contains("image_type=processed"), "{line}");
    assert!(line.contains("parent_id=o1"), "{line}");
}

#[tokio::test]
async fn test_save_edited_returns_assigned_id() {
    let (base_url, server) =
        serve_once(CannedResponse::json(200, r#"{"success":true,"image_id":"e7"}"#)).await;

    let metadata = serde_json::json!({ "filters": { "sepia": 40.0 } });
    let id = client_for(&base_url)
        .save_edited("p1", png_bytes(&cutout_500()), "cat_edited.png", &metadata)
        .await
        .unwrap();
    assert_eq!(id.as_deref(), Some("e7"));

    let request = server.await.unwrap();
    assert!(request.request_line().starts_with("POST /images/p1/save-edited"));
    assert!(request.body_text().contains(r#"name="metadata""#));
    assert!(request.body_text().contains(r#"name="edited_image""#));
    assert!(!request.body_text().contains(r#"name="image""#));
}
