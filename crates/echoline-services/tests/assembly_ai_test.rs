use std::time::Duration;

use bytes::Bytes;
use echoline_core::models::MediaType;
use echoline_services::{AssemblyAiTranscriber, TranscriptionError, TranscriptionService};

fn transcriber(url: String) -> AssemblyAiTranscriber {
    AssemblyAiTranscriber::new("test-assembly-key", url, Duration::from_secs(5))
        .unwrap()
        .with_polling(Duration::from_millis(5), 3)
}

async fn mock_upload_and_start(server: &mut mockito::ServerGuard) {
    server
        .mock("POST", "/v2/upload")
        .match_header("authorization", "test-assembly-key")
        .with_status(200)
        .with_body(r#"{"upload_url":"https://cdn.example/upload/1"}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/v2/transcript")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"audio_url":"https://cdn.example/upload/1","language_detection":true}"#.to_string(),
        ))
        .with_status(200)
        .with_body(r#"{"id":"tr_1","status":"queued"}"#)
        .create_async()
        .await;
}

#[tokio::test]
async fn test_transcribe_completed_job() {
    let mut server = mockito::Server::new_async().await;
    mock_upload_and_start(&mut server).await;
    server
        .mock("GET", "/v2/transcript/tr_1")
        .with_status(200)
        .with_body(
            r#"{"id":"tr_1","status":"completed","text":"Bonjour tout le monde","confidence":0.93,"language_code":"fr","language_confidence":0.88}"#,
        )
        .create_async()
        .await;

    let transcript = transcriber(server.url())
        .transcribe(Bytes::from_static(b"ID3...."), MediaType::Audio, "audio/mpeg")
        .await
        .unwrap();

    assert_eq!(transcript.text, "Bonjour tout le monde");
    assert_eq!(transcript.confidence, Some(0.93));
    assert_eq!(transcript.language.as_deref(), Some("fr"));
    assert_eq!(transcript.language_confidence, Some(0.88));
}

#[tokio::test]
async fn test_transcribe_job_error_is_failed() {
    let mut server = mockito::Server::new_async().await;
    mock_upload_and_start(&mut server).await;
    server
        .mock("GET", "/v2/transcript/tr_1")
        .with_status(200)
        .with_body(r#"{"id":"tr_1","status":"error","error":"Internal transcoding error"}"#)
        .create_async()
        .await;

    let err = transcriber(server.url())
        .transcribe(Bytes::from_static(b"data"), MediaType::Video, "video/mp4")
        .await
        .unwrap_err();

    assert!(matches!(err, TranscriptionError::Failed(_)));
}

#[tokio::test]
async fn test_transcribe_still_processing_times_out() {
    let mut server = mockito::Server::new_async().await;
    mock_upload_and_start(&mut server).await;
    server
        .mock("GET", "/v2/transcript/tr_1")
        .with_status(200)
        .with_body(r#"{"id":"tr_1","status":"processing"}"#)
        .expect(3)
        .create_async()
        .await;

    let err = transcriber(server.url())
        .transcribe(Bytes::from_static(b"data"), MediaType::Audio, "audio/wav")
        .await
        .unwrap_err();

    assert!(matches!(err, TranscriptionError::Failed(msg) if msg.contains("still pending")));
}

#[tokio::test]
async fn test_unsupported_mime_never_uploads() {
    let mut server = mockito::Server::new_async().await;
    let upload = server
        .mock("POST", "/v2/upload")
        .expect(0)
        .create_async()
        .await;

    let err = transcriber(server.url())
        .transcribe(Bytes::from_static(b"%PDF"), MediaType::Audio, "application/pdf")
        .await
        .unwrap_err();

    assert!(matches!(err, TranscriptionError::UnsupportedFormat(_)));
    upload.assert_async().await;
}

#[tokio::test]
async fn test_upload_rejection_is_failed() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v2/upload")
        .with_status(401)
        .with_body("Invalid API key")
        .create_async()
        .await;

    let err = transcriber(server.url())
        .transcribe(Bytes::from_static(b"data"), MediaType::Audio, "audio/ogg")
        .await
        .unwrap_err();

    assert!(matches!(err, TranscriptionError::Failed(msg) if msg.contains("401")));
}
