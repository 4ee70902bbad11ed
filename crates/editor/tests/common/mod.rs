#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use editor::geometry::Size;
use editor::{EditorConfig, MediaElement, Session, TimeSource};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Source(String),
    Seek(f64),
    Play,
    Pause,
    Muted(bool),
}

#[derive(Debug)]
pub struct MediaState {
    pub calls: Vec<Call>,
    pub paused: bool,
    pub muted: bool,
    pub duration_seconds: f64,
    pub size: Size,
    pub current_time_seconds: f64,
    pub error_code: Option<u16>,
}

/// Media element double whose state stays inspectable after the session
/// takes ownership of it.
#[derive(Clone)]
pub struct SharedMedia(pub Rc<RefCell<MediaState>>);

impl SharedMedia {
    pub fn new(size: Size, duration_seconds: f64) -> Self {
        Self(Rc::new(RefCell::new(MediaState {
            calls: Vec::new(),
            paused: true,
            muted: false,
            duration_seconds,
            size,
            current_time_seconds: 0.0,
            error_code: None,
        })))
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.0.borrow_mut().calls)
    }

    pub fn set_current_time_seconds(&self, seconds: f64) {
        self.0.borrow_mut().current_time_seconds = seconds;
    }

    pub fn is_paused(&self) -> bool {
        self.0.borrow().paused
    }
}

impl MediaElement for SharedMedia {
    fn set_source(&mut self, url: &str) {
        self.0.borrow_mut().calls.push(Call::Source(url.to_string()));
    }
    fn duration_seconds(&self) -> f64 {
        self.0.borrow().duration_seconds
    }
    fn video_size(&self) -> Size {
        self.0.borrow().size
    }
    fn current_time_seconds(&self) -> f64 {
        self.0.borrow().current_time_seconds
    }
    fn seek(&mut self, seconds: f64) {
        let mut state = self.0.borrow_mut();
        state.current_time_seconds = seconds;
        state.calls.push(Call::Seek(seconds));
    }
    fn play(&mut self) {
        let mut state = self.0.borrow_mut();
        state.paused = false;
        state.calls.push(Call::Play);
    }
    fn pause(&mut self) {
        let mut state = self.0.borrow_mut();
        state.paused = true;
        state.calls.push(Call::Pause);
    }
    fn paused(&self) -> bool {
        self.0.borrow().paused
    }
    fn muted(&self) -> bool {
        self.0.borrow().muted
    }
    fn set_muted(&mut self, muted: bool) {
        let mut state = self.0.borrow_mut();
        state.muted = muted;
        state.calls.push(Call::Muted(muted));
    }
    fn error_code(&self) -> Option<u16> {
        self.0.borrow().error_code
    }
}

#[derive(Clone, Default)]
pub struct ManualTime(pub Rc<Cell<f64>>);

impl TimeSource for ManualTime {
    fn now_ms(&self) -> f64 {
        self.0.get()
    }
}

pub type TestSession = Session<SharedMedia, ManualTime>;

/// Session over a 640x360, 10 s video with a canvas of the same size.
pub fn new_session() -> (TestSession, SharedMedia) {
    let media = SharedMedia::new(Size::new(640.0, 360.0), 10.0);
    let session = Session::new(
        &EditorConfig::default(),
        media.clone(),
        ManualTime::default(),
        Size::new(640.0, 360.0),
        0.0,
    );
    (session, media)
}
