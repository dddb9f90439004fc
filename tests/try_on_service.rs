//! Try-on, video and studio workflows driven by scripted generators.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    RecordingSleeper, ScriptedGenerator, ScriptedVideo, StaticFetcher, finished_operation,
    image_response, payload, pending_operation, rate_limited, response_with,
};
use tryon_studio::catalog;
use tryon_studio::error::StudioError;
use tryon_studio::generation::{Part, TryOnService, VideoOperation, VideoService};
use tryon_studio::studio::{
    FailedStep, Selection, SelectionMode, Studio, TRY_ON_FAILED_MESSAGE, VIDEO_FAILED_MESSAGE,
    user_message,
};

fn try_on_service(
    generator: &Arc<ScriptedGenerator>,
    sleeper: &Arc<RecordingSleeper>,
) -> TryOnService<Arc<ScriptedGenerator>, Arc<RecordingSleeper>> {
    TryOnService::with_sleeper(Arc::clone(generator), Arc::clone(sleeper))
}

fn video_service(
    video: &Arc<ScriptedVideo>,
    sleeper: &Arc<RecordingSleeper>,
) -> VideoService<Arc<ScriptedVideo>, Arc<RecordingSleeper>> {
    VideoService::with_sleeper(Arc::clone(video), Arc::clone(sleeper))
}

#[tokio::test]
async fn test_virtual_try_on_request_and_result() {
    let generator = Arc::new(ScriptedGenerator::new([Ok(image_response(
        "Sharp tailoring. The palette sings.",
        "cmVuZGVy",
    ))]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let service = try_on_service(&generator, &sleeper);

    let subject = payload("image/jpeg", "c3ViamVjdA==");
    let garments = [payload("image/png", "Z2FybWVudDE="), payload("image/webp", "Z2FybWVudDI=")];
    let background = payload("image/jpeg", "Ymc=");

    let output = service
        .virtual_try_on(&subject, &garments, Some(&background), Some("Cobalt Blue"))
        .await
        .unwrap();

    assert_eq!(output.advice, "Sharp tailoring. The palette sings.");
    assert_eq!(output.image_data_url(), "data:image/png;base64,cmVuZGVy");
    assert!(sleeper.delays().is_empty());

    let requests = generator.requests();
    assert_eq!(requests.len(), 1);
    let parts = requests[0].parts();
    assert_eq!(parts.len(), 5);
    let sent: Vec<&str> = parts[..4]
        .iter()
        .map(|part| part.inline_data.as_ref().unwrap().data.as_str())
        .collect();
    assert_eq!(sent, vec!["c3ViamVjdA==", "Z2FybWVudDE=", "Z2FybWVudDI=", "Ymc="]);
    let instruction = parts[4].text.as_deref().unwrap();
    assert!(instruction.contains("Cobalt Blue"));
    assert!(instruction.contains("provided background"));

    let config = requests[0].generation_config.as_ref().unwrap();
    assert_eq!(config.image_config.as_ref().unwrap().aspect_ratio, "3:4");
}

#[tokio::test]
async fn test_try_on_retries_rate_limits() {
    let generator = Arc::new(ScriptedGenerator::new([
        Err(rate_limited()),
        Err(rate_limited()),
        Ok(image_response("Looks great.", "aW1n")),
    ]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let service = try_on_service(&generator, &sleeper);

    let output = service
        .virtual_try_on(&payload("image/jpeg", "cA=="), &[], None, None)
        .await
        .unwrap();

    assert_eq!(output.advice, "Looks great.");
    assert_eq!(generator.calls(), 3);
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_millis(2000), Duration::from_millis(4000)]
    );
}

#[tokio::test]
async fn test_try_on_gives_up_after_three_rate_limits() {
    let generator = Arc::new(ScriptedGenerator::new([
        Err(rate_limited()),
        Err(rate_limited()),
        Err(rate_limited()),
        Ok(image_response("never reached", "aW1n")),
    ]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let service = try_on_service(&generator, &sleeper);

    let err = service
        .virtual_try_on(&payload("image/jpeg", "cA=="), &[], None, None)
        .await
        .unwrap_err();

    assert!(err.is_rate_limited());
    assert_eq!(generator.calls(), 3);
}

#[tokio::test]
async fn test_empty_response_is_no_response() {
    let generator = Arc::new(ScriptedGenerator::new([Ok(response_with(Vec::new()))]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let service = try_on_service(&generator, &sleeper);

    let err = service
        .virtual_try_on(&payload("image/jpeg", "cA=="), &[], None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, StudioError::NoResponse { .. }));
    assert_eq!(err.to_string(), "No response from AI.");
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn test_text_only_response_is_no_image() {
    let generator = Arc::new(ScriptedGenerator::new([Ok(response_with(vec![Part::text(
        "I cannot render this photo.",
    )]))]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let service = try_on_service(&generator, &sleeper);

    let err = service
        .virtual_try_on(&payload("image/jpeg", "cA=="), &[], None, None)
        .await
        .unwrap_err();

    match &err {
        StudioError::NoImage { advice, .. } => {
            assert_eq!(advice.as_deref(), Some("I cannot render this photo."));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.to_string(), "Failed to generate image.");
}

#[tokio::test]
async fn test_image_found_in_any_part() {
    let generator = Arc::new(ScriptedGenerator::new([Ok(response_with(vec![
        Part::text("First thoughts. "),
        Part::image(&payload("image/png", "Zmlyc3Q=")),
        Part::text("Second thoughts."),
        Part::image(&payload("image/jpeg", "c2Vjb25k")),
    ]))]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let service = try_on_service(&generator, &sleeper);

    let output = service
        .virtual_try_on(&payload("image/jpeg", "cA=="), &[], None, None)
        .await
        .unwrap();

    assert_eq!(output.image, payload("image/jpeg", "c2Vjb25k"));
    assert_eq!(output.advice, "First thoughts. Second thoughts.");
}

#[tokio::test]
async fn test_custom_try_on_requires_description() {
    let generator = Arc::new(ScriptedGenerator::new([]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let service = try_on_service(&generator, &sleeper);

    let err = service
        .custom_try_on(&payload("image/jpeg", "cA=="), "   ", &[], None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, StudioError::Validation { .. }));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_custom_try_on_sends_description() {
    let generator = Arc::new(ScriptedGenerator::new([Ok(image_response("Bold.", "aW1n"))]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let service = try_on_service(&generator, &sleeper);

    service
        .custom_try_on(
            &payload("image/jpeg", "cA=="),
            "an emerald velvet cape",
            &[payload("image/png", "cmVm")],
            None,
            Some("Sage Green"),
        )
        .await
        .unwrap();

    let requests = generator.requests();
    let parts = requests[0].parts();
    assert_eq!(parts.len(), 3);
    let instruction = parts[2].text.as_deref().unwrap();
    assert!(instruction.contains("an emerald velvet cape"));
    assert!(instruction.contains("Sage Green"));
}

#[tokio::test]
async fn test_video_polls_every_ten_seconds_until_done() {
    let video = Arc::new(ScriptedVideo::new(
        Ok(pending_operation("operations/abc")),
        [
            Ok(pending_operation("operations/abc")),
            Ok(finished_operation("operations/abc", "https://files.test/v.mp4")),
        ],
    ));
    let sleeper = Arc::new(RecordingSleeper::default());
    let service = video_service(&video, &sleeper);

    let output = service
        .generate_360_video("data:image/jpeg;base64,aW1hZ2U=")
        .await
        .unwrap();

    assert_eq!(output.uri, "https://files.test/v.mp4");
    assert_eq!(output.bytes, b"mp4-bytes");
    assert_eq!(output.mime_type, "video/mp4");
    assert_eq!(video.poll_count(), 2);
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(10); 2]);
    assert_eq!(video.downloads(), vec!["https://files.test/v.mp4".to_string()]);

    let request = &video.requests()[0];
    assert_eq!(request.image.data, "aW1hZ2U=");
    assert_eq!(request.image.mime_type, "image/png");
    assert_eq!(request.config.number_of_videos, 1);
    assert_eq!(request.config.resolution, "720p");
    assert_eq!(request.config.aspect_ratio, "9:16");
    assert!(request.prompt.contains("360-degree"));
}

#[tokio::test]
async fn test_video_entity_not_found_is_surfaced() {
    let failed = VideoOperation {
        name: "operations/abc".into(),
        done: true,
        error: Some("Requested entity was not found.".into()),
        video_uri: None,
    };
    let video = Arc::new(ScriptedVideo::new(Ok(pending_operation("operations/abc")), [Ok(failed)]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let service = video_service(&video, &sleeper);

    let err = service.generate_360_video("aW1hZ2U=").await.unwrap_err();

    assert!(matches!(err, StudioError::EntityNotFound { .. }));
    assert!(err.to_string().contains("Requested entity was not found."));
    assert_eq!(video.requests().len(), 1);
    assert!(video.downloads().is_empty());

    let shown = user_message(FailedStep::Video, &err);
    assert_eq!(shown.message, VIDEO_FAILED_MESSAGE);
    assert!(shown.requires_key_reselection);
}

#[tokio::test]
async fn test_video_rate_limit_is_not_retried() {
    let video = Arc::new(ScriptedVideo::new(Err(rate_limited()), []));
    let sleeper = Arc::new(RecordingSleeper::default());
    let service = video_service(&video, &sleeper);

    let err = service.generate_360_video("aW1hZ2U=").await.unwrap_err();

    assert!(err.is_rate_limited());
    assert_eq!(video.requests().len(), 1);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_video_done_without_uri_fails() {
    let done = VideoOperation {
        name: "operations/abc".into(),
        done: true,
        ..VideoOperation::default()
    };
    let video = Arc::new(ScriptedVideo::new(Ok(done), []));
    let sleeper = Arc::new(RecordingSleeper::default());
    let service = video_service(&video, &sleeper);

    let err = service.generate_360_video("aW1hZ2U=").await.unwrap_err();

    assert!(matches!(err, StudioError::VideoOperation { .. }));
    assert!(err.to_string().contains("Video generation failed."));
    assert_eq!(video.poll_count(), 0);
}

#[tokio::test]
async fn test_video_poll_cap_times_out() {
    let video = Arc::new(ScriptedVideo::new(Ok(pending_operation("operations/slow")), []));
    let sleeper = Arc::new(RecordingSleeper::default());
    let service = video_service(&video, &sleeper).with_max_polls(Some(3));

    let err = service.generate_360_video("aW1hZ2U=").await.unwrap_err();

    assert!(matches!(err, StudioError::Timeout { .. }));
    assert_eq!(video.poll_count(), 3);
}

fn studio(
    generator: &Arc<ScriptedGenerator>,
    video: &Arc<ScriptedVideo>,
    fetcher: &Arc<StaticFetcher>,
) -> Studio<Arc<ScriptedGenerator>, Arc<ScriptedVideo>, Arc<StaticFetcher>, Arc<RecordingSleeper>>
{
    let sleeper = Arc::new(RecordingSleeper::default());
    Studio::new(
        try_on_service(generator, &sleeper),
        video_service(video, &sleeper),
        Arc::clone(fetcher),
    )
}

#[tokio::test]
async fn test_studio_collection_fetches_catalog_images() {
    let generator = Arc::new(ScriptedGenerator::new([Ok(image_response("Chic.", "aW1n"))]));
    let video = Arc::new(ScriptedVideo::default());
    let fetcher = Arc::new(StaticFetcher::default());
    let studio = studio(&generator, &video, &fetcher);

    let (selection, _) = Selection::new(payload("image/jpeg", "cA=="))
        .with_background(catalog::find_background("b3").unwrap())
        .with_palette("None")
        .with_scanned_tag("g3");
    let (selection, _) = selection.with_scanned_tag("Chelsea Boots");

    let result = studio.try_on(&selection).await.unwrap();

    assert_eq!(result.advice, "Chic.");
    assert_eq!(result.garment_ids, vec!["g3".to_string(), "s3".to_string()]);
    assert_eq!(result.background_id.as_deref(), Some("b3"));
    assert!(result.custom_prompt.is_none());
    assert!(result.image_data_url().starts_with("data:image/png;base64,"));

    // background plus two garments
    assert_eq!(fetcher.fetched().len(), 3);
    let parts = generator.requests()[0].parts().to_vec();
    assert_eq!(parts.len(), 5);
    assert!(!parts[4].text.as_deref().unwrap().contains("PALETTE"));
}

#[tokio::test]
async fn test_studio_uploaded_background_wins() {
    let generator = Arc::new(ScriptedGenerator::new([Ok(image_response("Chic.", "aW1n"))]));
    let video = Arc::new(ScriptedVideo::default());
    let fetcher = Arc::new(StaticFetcher::default());
    let studio = studio(&generator, &video, &fetcher);

    let selection = Selection::new(payload("image/jpeg", "cA=="))
        .with_mode(SelectionMode::Upload)
        .with_uploaded_garment(payload("image/png", "dXA="))
        .with_background(catalog::find_background("b1").unwrap())
        .with_uploaded_background(payload("image/png", "b3du"));

    studio.try_on(&selection).await.unwrap();

    assert!(fetcher.fetched().is_empty());
    let parts = generator.requests()[0].parts().to_vec();
    assert_eq!(parts[2].inline_data.as_ref().unwrap().data, "b3du");
}

#[tokio::test]
async fn test_studio_custom_mode_and_video() {
    let generator = Arc::new(ScriptedGenerator::new([Ok(image_response("Daring.", "aW1n"))]));
    let video = Arc::new(ScriptedVideo::new(
        Ok(finished_operation("operations/v", "https://files.test/v.mp4")),
        [],
    ));
    let fetcher = Arc::new(StaticFetcher::default());
    let studio = studio(&generator, &video, &fetcher);

    let selection = Selection::new(payload("image/jpeg", "cA=="))
        .with_mode(SelectionMode::Custom)
        .with_custom_prompt("a silver sequin jumpsuit");

    let result = studio.try_on(&selection).await.unwrap();
    assert_eq!(result.custom_prompt.as_deref(), Some("a silver sequin jumpsuit"));

    let rendered = studio.render_video(&result).await.unwrap();
    assert_eq!(rendered.id, result.id);
    assert_eq!(rendered.video.unwrap().uri, "https://files.test/v.mp4");
    assert_eq!(video.requests()[0].image.mime_type, "image/png");
    assert!(result.video.is_none());
}

#[tokio::test]
async fn test_studio_failure_maps_to_user_message() {
    let generator = Arc::new(ScriptedGenerator::new([Ok(response_with(Vec::new()))]));
    let video = Arc::new(ScriptedVideo::default());
    let fetcher = Arc::new(StaticFetcher::default());
    let studio = studio(&generator, &video, &fetcher);

    let (selection, _) = Selection::new(payload("image/jpeg", "cA==")).with_scanned_tag("a1");
    let err = studio.try_on(&selection).await.unwrap_err();

    let shown = user_message(FailedStep::TryOn, &err);
    assert_eq!(
        shown.message,
        "AI transformation failed. Ensure your photo has a clear subject."
    );
    assert_eq!(shown.message, TRY_ON_FAILED_MESSAGE);
    assert!(!shown.requires_key_reselection);
}

#[tokio::test]
async fn test_studio_requires_subject_and_garments() {
    let generator = Arc::new(ScriptedGenerator::new([]));
    let video = Arc::new(ScriptedVideo::default());
    let fetcher = Arc::new(StaticFetcher::default());
    let studio = studio(&generator, &video, &fetcher);

    let err = studio.try_on(&Selection::default()).await.unwrap_err();
    assert!(matches!(err, StudioError::Validation { .. }));

    let err = studio
        .try_on(&Selection::new(payload("image/jpeg", "cA==")))
        .await
        .unwrap_err();
    assert!(matches!(err, StudioError::Validation { .. }));
    assert_eq!(generator.calls(), 0);
}
