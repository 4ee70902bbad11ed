mod common;

use common::{Call, TestSession, new_session};
use editor::crop::{AnchorKey, CropEditorState};
use editor::geometry::{Point, Rect, Size, TimeRange};
use editor::time_range::{Direction, Marker, Modifiers, TweakButton, TweakTarget};
use editor::{Command, Input, SessionEvent, VideoProperties};

fn load(session: &mut TestSession, filename: &str) -> Vec<SessionEvent> {
    session.handle(Input::SelectFile {
        filename: filename.to_string(),
        url: format!("blob:{filename}"),
        confirmed: false,
    });
    session.handle(Input::MediaLoadedMetadata)
}

fn first_args(session: &TestSession) -> Vec<String> {
    session
        .commands()
        .first()
        .map(Command::args)
        .expect("pipeline should have a first command")
}

fn timeline() -> Rect {
    Rect::from_xywh(0.0, 0.0, 100.0, 10.0)
}

fn drag_start_marker_to(session: &mut TestSession, x: f64) {
    session.handle(Input::MarkerPointerDown(Marker::Start));
    session.handle(Input::TimelinePointerMove {
        pointer: Point::new(x, 5.0),
        timeline: timeline(),
    });
    session.handle(Input::TimelinePointerUp);
}

#[test]
fn loading_a_file_publishes_properties_and_gif_pipeline() {
    let (mut session, media) = new_session();

    let events = session.handle(Input::SelectFile {
        filename: "clip.mp4".to_string(),
        url: "blob:clip".to_string(),
        confirmed: false,
    });
    assert!(events.is_empty());
    assert_eq!(media.take_calls(), vec![Call::Source("blob:clip".to_string())]);

    let events = session.handle(Input::MediaLoadedMetadata);

    assert_eq!(
        events.first(),
        Some(&SessionEvent::FileLoaded(VideoProperties::new(
            "clip.mp4",
            Size::new(640.0, 360.0),
            10_000
        )))
    );
    let Some(SessionEvent::CommandsChanged(commands)) = events.last() else {
        panic!("expected a pipeline update, got {events:?}");
    };
    assert_eq!(commands.len(), 3);
    assert_eq!(commands[2].program(), "rm");

    let args = first_args(&session);
    assert_eq!(&args[..6], ["-i", "clip.mp4", "-ss", "0", "-t", "10"]);
    assert!(args.iter().any(|arg| arg.starts_with("crop=640:360:0:0")));
    assert!(!session.model().is_modified());
    assert_eq!(session.time_range_editor().duration_ms(), 10_000);
}

#[test]
fn dragging_the_start_marker_moves_trim_loop_and_commands() {
    let (mut session, media) = new_session();
    load(&mut session, "clip.mp4");
    media.take_calls();

    drag_start_marker_to(&mut session, 20.0);

    assert_eq!(session.model().trim().get(), TimeRange::new(2_000, 10_000));
    assert_eq!(
        session.playback().loop_time_range(),
        Some(TimeRange::new(2_000, 10_000))
    );
    assert_eq!(session.time_range_editor().marker_ratios(), (0.2, 1.0));
    assert_eq!(media.take_calls().last(), Some(&Call::Seek(2.0)));

    let args = first_args(&session);
    assert_eq!(&args[2..6], ["-ss", "2", "-t", "8"]);
    assert!(session.model().is_modified());
}

#[test]
fn playback_past_trim_end_restarts_once_at_trim_start() {
    let (mut session, media) = new_session();
    load(&mut session, "clip.mp4");
    drag_start_marker_to(&mut session, 20.0);

    session.handle(Input::Key(" ".to_string()));
    let events = session.handle(Input::MediaPlay);
    assert_eq!(events, vec![SessionEvent::PlayingChanged(true)]);
    media.take_calls();

    media.set_current_time_seconds(10.0);
    session.handle(Input::MediaTimeUpdate);

    assert_eq!(
        media.take_calls(),
        vec![Call::Pause, Call::Seek(2.0), Call::Play]
    );
    assert!((session.time_range_editor().progress_ratio() - 0.2).abs() < 1e-9);

    media.set_current_time_seconds(2.05);
    session.handle(Input::MediaTimeUpdate);
    assert!(media.take_calls().is_empty());
    assert!(!media.is_paused());
}

#[test]
fn start_key_uses_current_time_and_previews_start() {
    let (mut session, media) = new_session();
    load(&mut session, "clip.mp4");

    media.set_current_time_seconds(3.0);
    session.handle(Input::MediaTimeUpdate);
    media.take_calls();

    session.handle(Input::Key("s".to_string()));

    assert_eq!(session.model().trim().get(), TimeRange::new(3_000, 10_000));
    assert_eq!(media.take_calls().last(), Some(&Call::Seek(3.0)));
    assert_eq!(
        session.crop_editor().preview(),
        editor::PreviewSelect::Start
    );
}

#[test]
fn mute_and_seek_keys_reach_the_media_element() {
    let (mut session, media) = new_session();
    load(&mut session, "clip.mp4");
    media.take_calls();

    session.handle(Input::Key("m".to_string()));
    assert_eq!(media.take_calls(), vec![Call::Muted(true)]);
    let events = session.handle(Input::MediaVolumeChange);
    assert_eq!(events, vec![SessionEvent::MutedChanged(true)]);

    session.handle(Input::Key("ArrowRight".to_string()));
    assert_eq!(media.take_calls(), vec![Call::Seek(10.0)]);
}

#[test]
fn corner_drag_updates_model_labels_and_commands() {
    let (mut session, _media) = new_session();
    load(&mut session, "clip.mp4");
    session.handle(Input::CropToggle);

    session.handle(Input::CropPointerDown(Point::new(0.0, 0.0)));
    assert_eq!(
        session.crop_editor().state(),
        CropEditorState::Dragging(AnchorKey::TopLeft)
    );
    session.handle(Input::CropPointerMove(Point::new(100.0, 50.0)));
    session.handle(Input::CropPointerUp);

    assert_eq!(
        session.model().crop().get(),
        Rect::from_xywh(100.0, 50.0, 540.0, 310.0)
    );
    assert_eq!(
        session.crop_editor().crop_pixels(),
        Rect::from_xywh(100.0, 50.0, 540.0, 310.0)
    );
    assert_eq!(
        session.crop_labels(),
        ("640x360".to_string(), "100,50 540x310".to_string())
    );
    assert!(
        first_args(&session)
            .iter()
            .any(|arg| arg.starts_with("crop=540:310:100:50"))
    );
}

#[test]
fn corner_dragged_past_the_frame_keeps_minimum_size() {
    let (mut session, _media) = new_session();
    load(&mut session, "clip.mp4");
    session.handle(Input::CropToggle);

    session.handle(Input::CropPointerDown(Point::new(0.0, 0.0)));
    session.handle(Input::CropPointerMove(Point::new(700.0, 400.0)));

    let crop = session.model().crop().get();
    assert_eq!(crop, Rect::from_xywh(616.0, 336.0, 24.0, 24.0));
    assert!(crop.right() <= 640.0 && crop.bottom() <= 360.0);
}

#[test]
fn moved_crop_keeps_its_size_at_the_frame_edge() {
    let (mut session, _media) = new_session();
    load(&mut session, "clip.mp4");
    session.handle(Input::CropToggle);
    session.handle(Input::CropPointerDown(Point::new(0.0, 0.0)));
    session.handle(Input::CropPointerMove(Point::new(100.0, 50.0)));
    session.handle(Input::CropPointerUp);

    session.handle(Input::CropPointerDown(Point::new(370.0, 205.0)));
    assert_eq!(
        session.crop_editor().state(),
        CropEditorState::Dragging(AnchorKey::Rect)
    );
    session.handle(Input::CropPointerMove(Point::new(390.0, 205.0)));

    let crop = session.model().crop().get();
    assert_eq!(crop.size, Size::new(540.0, 310.0));
    assert_eq!(crop.right(), 640.0);
}

#[test]
fn replacing_a_modified_file_requires_confirmation() {
    let (mut session, media) = new_session();
    load(&mut session, "clip.mp4");
    drag_start_marker_to(&mut session, 20.0);
    media.take_calls();

    let events = session.handle(Input::SelectFile {
        filename: "other.mp4".to_string(),
        url: "blob:other".to_string(),
        confirmed: false,
    });
    assert_eq!(
        events,
        vec![SessionEvent::FileRejected {
            filename: "other.mp4".to_string()
        }]
    );
    assert_eq!(session.model().filename().get().as_deref(), Some("clip.mp4"));

    let events = session.handle(Input::SelectFile {
        filename: "other.mp4".to_string(),
        url: "blob:other".to_string(),
        confirmed: true,
    });
    assert_eq!(events, vec![SessionEvent::CommandsChanged(Vec::new())]);
    assert_eq!(session.model().filename().get(), None);
    assert_eq!(session.playback().loop_time_range(), None);
    assert_eq!(media.take_calls(), vec![Call::Source("blob:other".to_string())]);
}

#[test]
fn reselecting_the_current_file_is_ignored() {
    let (mut session, media) = new_session();
    load(&mut session, "clip.mp4");
    drag_start_marker_to(&mut session, 20.0);
    media.take_calls();

    let events = session.handle(Input::SelectFile {
        filename: "clip.mp4".to_string(),
        url: "blob:clip-again".to_string(),
        confirmed: true,
    });

    assert!(events.is_empty());
    assert!(media.take_calls().is_empty());
    assert_eq!(session.model().trim().get(), TimeRange::new(2_000, 10_000));
}

#[test]
fn mp4_format_switch_collapses_pipeline_to_one_command() {
    let (mut session, _media) = new_session();
    load(&mut session, "clip.mp4");

    let events = session.handle(Input::SetFormat("MP4".to_string()));

    let Some(SessionEvent::CommandsChanged(commands)) = events.last() else {
        panic!("expected a pipeline update, got {events:?}");
    };
    assert_eq!(commands.len(), 1);
    let args = commands[0].args();
    assert_eq!(args.last().map(String::as_str), Some(session.options().output_filename().as_str()));
    assert!(args.last().is_some_and(|name| name.ends_with(".mp4")));

    let events = session.handle(Input::SetFormat("webm".to_string()));
    assert!(events.is_empty());
}

fn nudge(session: &mut TestSession, target: TweakTarget, direction: Direction, coarse: bool) {
    session.handle(Input::Tweak {
        target,
        button: TweakButton { direction, coarse },
        modifiers: Modifiers::default(),
    });
}

#[test]
fn start_nudged_below_zero_recovers_on_the_next_later_nudge() {
    let (mut session, _media) = new_session();
    load(&mut session, "clip.mp4");

    for _ in 0..3 {
        nudge(&mut session, TweakTarget::Start, Direction::Earlier, false);
    }
    assert_eq!(session.model().trim().get(), TimeRange::new(0, 10_000));

    nudge(&mut session, TweakTarget::Start, Direction::Later, false);
    assert_eq!(session.model().trim().get(), TimeRange::new(50, 10_000));
}

#[test]
fn end_nudged_past_duration_recovers_on_the_next_earlier_nudge() {
    let (mut session, _media) = new_session();
    load(&mut session, "clip.mp4");

    nudge(&mut session, TweakTarget::End, Direction::Later, true);
    nudge(&mut session, TweakTarget::End, Direction::Later, false);
    assert_eq!(session.model().trim().get(), TimeRange::new(0, 10_000));

    nudge(&mut session, TweakTarget::End, Direction::Earlier, false);
    assert_eq!(session.model().trim().get(), TimeRange::new(0, 9_950));
}

#[test]
fn span_nudged_past_the_end_recovers_on_the_next_earlier_nudge() {
    let (mut session, _media) = new_session();
    load(&mut session, "clip.mp4");
    drag_start_marker_to(&mut session, 20.0);

    nudge(&mut session, TweakTarget::Span, Direction::Later, true);
    nudge(&mut session, TweakTarget::Span, Direction::Later, true);
    assert_eq!(session.model().trim().get(), TimeRange::new(2_000, 10_000));

    nudge(&mut session, TweakTarget::Span, Direction::Earlier, false);
    assert_eq!(session.model().trim().get(), TimeRange::new(1_950, 9_950));
}
