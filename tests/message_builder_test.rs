//! Message construction from files on disk.

mod common;

use std::{path::Path, sync::Arc};

use base64::{engine::general_purpose::STANDARD, Engine};
use chat_protocol::{ContentPart, ImageDetail, Message, Role};
use common::*;
use image::{GenericImageView, Rgb, RgbImage};
use llm_multimodal::{MediaInput, MultiModalResult, VideoDecoder, VideoInfo, VisionConfig};
use mm_chat::{
    CaptureBuffer, CaptureCursor, ChatError, ConversationMode, MessageBuilder,
    StaticPromptCatalog, TurnInput,
};
use tempfile::tempdir;

struct SyntheticDecoder(VideoInfo);

impl VideoDecoder for SyntheticDecoder {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn probe(&self, _path: &Path) -> MultiModalResult<VideoInfo> {
        Ok(self.0)
    }

    fn read_frames(
        &self,
        _path: &Path,
        info: &VideoInfo,
        indices: &[usize],
    ) -> MultiModalResult<Vec<RgbImage>> {
        Ok(indices
            .iter()
            .map(|_| RgbImage::from_pixel(info.width, info.height, Rgb([10, 20, 30])))
            .collect())
    }
}

fn only_user_parts(messages: &[Message]) -> &[ContentPart] {
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
    messages[0].parts()
}

fn image_dims(part: &ContentPart) -> (u32, u32) {
    let ContentPart::ImageUrl { image_url } = part else {
        panic!("expected an image part, got {part:?}");
    };
    assert_eq!(image_url.detail, Some(ImageDetail::High));
    let payload = image_url.base64_payload().unwrap();
    image::load_from_memory(&STANDARD.decode(payload).unwrap())
        .unwrap()
        .dimensions()
}

#[test]
fn image_turn_puts_media_before_text() {
    let dir = tempdir().unwrap();
    let photo = dir.path().join("photo.png");
    write_png(&photo, 640, 480);

    let input = TurnInput::text("describe").with_media(MediaInput::from_path(&photo));
    let messages = builder().build(&input, ConversationMode::General).unwrap();
    let parts = only_user_parts(&messages);

    assert_eq!(parts.len(), 2);
    assert_eq!(image_dims(&parts[0]), (644, 476));
    assert_eq!(parts[1], ContentPart::text("describe"));
}

#[test]
fn media_only_turn_has_no_text_part() {
    let dir = tempdir().unwrap();
    let photo = dir.path().join("photo.png");
    write_png(&photo, 64, 64);

    let input = TurnInput::default().with_media(MediaInput::image(&photo));
    let messages = builder().build(&input, ConversationMode::General).unwrap();
    let parts = only_user_parts(&messages);
    assert_eq!(parts.len(), 1);
    assert!(parts[0].is_image());
}

#[test]
fn capture_frames_are_labelled_in_order() {
    let dir = tempdir().unwrap();
    let buffer = CaptureBuffer::new();
    for n in 0..3 {
        let frame = dir.path().join(format!("frame-{n}.png"));
        write_png(&frame, 320, 240);
        buffer.push(frame);
    }

    let mut cursor = CaptureCursor::default();
    assert_eq!(buffer.take_new(&mut cursor).len(), 3);
    assert!(buffer.take_new(&mut cursor).is_empty());

    let frame = dir.path().join("frame-3.png");
    write_png(&frame, 320, 240);
    buffer.push(&frame);
    let frame = dir.path().join("frame-4.png");
    write_png(&frame, 320, 240);
    buffer.push(&frame);

    let input = TurnInput {
        text: "what changed?".to_string(),
        media: buffer.take_new(&mut cursor),
        streaming_index: None,
    };
    assert_eq!(input.resolved_streaming_index(), Some(4));

    let messages = builder().build(&input, ConversationMode::General).unwrap();
    let parts = only_user_parts(&messages);
    assert_eq!(parts.len(), 5);
    assert_eq!(parts[0], ContentPart::text("[3 second]"));
    assert!(parts[1].is_image());
    assert_eq!(parts[2], ContentPart::text("[4 second]"));
    assert!(parts[3].is_image());
    assert_eq!(parts[4], ContentPart::text("what changed?"));
}

#[test]
fn first_capture_frame_gets_system_prompt() {
    let dir = tempdir().unwrap();
    let frame = dir.path().join("frame-0.png");
    write_png(&frame, 320, 240);

    let input = TurnInput::text("start").with_media(MediaInput::capture_frame(&frame, 0));
    let messages = builder().build(&input, ConversationMode::General).unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0], Message::system(GENERAL_PROMPT));
    assert_eq!(messages[1].parts()[0], ContentPart::text("[0 second]"));
}

#[test]
fn missing_prompt_is_an_error() {
    let builder = MessageBuilder::new(
        VisionConfig::default(),
        ImageDetail::High,
        Arc::new(StaticPromptCatalog::default()),
    );
    let input = TurnInput::text("hi").with_streaming_index(0);

    let err = builder.build(&input, ConversationMode::DeepThinking).unwrap_err();
    assert!(matches!(err, ChatError::PromptNotFound(ref key) if key == "deep_thinking"));
}

#[test]
fn video_becomes_timestamped_frames() {
    let decoder = SyntheticDecoder(VideoInfo {
        total_frames: 300,
        fps: 30.0,
        width: 64,
        height: 48,
    });
    let builder = builder().with_decoder(Arc::new(decoder));

    let input = TurnInput::text("summarize").with_media(MediaInput::video("clip.mp4"));
    let messages = builder.build(&input, ConversationMode::General).unwrap();
    let parts = only_user_parts(&messages);

    assert_eq!(parts.len(), 16 * 2 + 1);
    assert_eq!(parts[0], ContentPart::text("[0.0 second]"));
    assert_eq!(parts[30], ContentPart::text("[10.0 second]"));
    let first = image_dims(&parts[1]);
    for pair in parts[..32].chunks(2) {
        assert!(pair[0].as_text().unwrap().ends_with(" second]"));
        assert_eq!(image_dims(&pair[1]), first);
    }
    assert_eq!(parts[32], ContentPart::text("summarize"));
}

#[test]
fn unreadable_media_aborts_the_turn() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good.png");
    write_png(&good, 64, 64);
    let bad = dir.path().join("bad.jpg");
    std::fs::write(&bad, b"definitely not a jpeg").unwrap();

    let input = TurnInput::text("hi")
        .with_media(MediaInput::from_path(&good))
        .with_media(MediaInput::from_path(&bad));
    let err = builder().build(&input, ConversationMode::General).unwrap_err();

    assert!(matches!(err, ChatError::Media(_)), "got {err:?}");
    assert!(err.to_string().contains("bad.jpg"));
}

#[test]
fn capture_frames_use_the_smaller_capture_budget() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("screen.png");
    write_png(&path, 1920, 1080);

    let builder = builder();
    let as_capture = TurnInput::default().with_media(MediaInput::capture_frame(&path, 7));
    let as_image = TurnInput::default().with_media(MediaInput::image(&path));

    let capture_parts = builder.build(&as_capture, ConversationMode::General).unwrap();
    let image_parts = builder.build(&as_image, ConversationMode::General).unwrap();
    let (cw, ch) = image_dims(&only_user_parts(&capture_parts)[1]);
    let (iw, ih) = image_dims(&only_user_parts(&image_parts)[0]);

    let capture_max = builder.vision().capture_budget().max_pixels;
    assert!(u64::from(cw * ch) <= capture_max, "{cw}x{ch} over {capture_max}");
    assert!(cw * ch < iw * ih, "capture {cw}x{ch} not smaller than image {iw}x{ih}");
}
