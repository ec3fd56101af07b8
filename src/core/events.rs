use crate::core::metadata::MetadataDocument;

/// Native player-state codes as reported by the iframe API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeState {
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
    /// Synthetic state for the separate error channel; carries the platform's error code.
    Error(i32),
}

impl NativeState {
    pub const ENDED: i32 = 0;
    pub const PLAYING: i32 = 1;
    pub const PAUSED: i32 = 2;
    pub const BUFFERING: i32 = 3;
    pub const CUED: i32 = 5;

    /// Unknown codes (including "unstarted", -1) map to `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            Self::ENDED => Some(Self::Ended),
            Self::PLAYING => Some(Self::Playing),
            Self::PAUSED => Some(Self::Paused),
            Self::BUFFERING => Some(Self::Buffering),
            Self::CUED => Some(Self::Cued),
            _ => None,
        }
    }
}

/// Signals delivered by a remote player to its adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeSignal {
    Ready,
    StateChange(i32),
    Error(i32),
}

impl NativeSignal {
    /// Routes both the state-change and error channels into one state vocabulary.
    pub fn state(self) -> Option<NativeState> {
        match self {
            NativeSignal::Ready => None,
            NativeSignal::StateChange(code) => NativeState::from_code(code),
            NativeSignal::Error(code) => Some(NativeState::Error(code)),
        }
    }
}

/// What happens to the polling timer on a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEffect {
    Restart,
    Stop,
    Keep,
}

/// Semantic events emitted to the host application.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Ready,
    Playing,
    Pause,
    Buffering,
    Cued,
    Ended,
    Error { code: i32 },
    TimeUpdate(f64),
    LoadedMetadata(MetadataDocument),
}

impl PlayerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::Ready => "ready",
            PlayerEvent::Playing => "playing",
            PlayerEvent::Pause => "pause",
            PlayerEvent::Buffering => "buffering",
            PlayerEvent::Cued => "cued",
            PlayerEvent::Ended => "ended",
            PlayerEvent::Error { .. } => "error",
            PlayerEvent::TimeUpdate(_) => "timeupdate",
            PlayerEvent::LoadedMetadata(_) => "loadedmetadata",
        }
    }
}

/// One row of the native → semantic table.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub event: PlayerEvent,
    /// New value of the `playing` flag, if the transition sets it.
    pub playing: Option<bool>,
    pub timer: TimerEffect,
}

pub fn translate(state: NativeState) -> Transition {
    let (event, playing, timer) = match state {
        NativeState::Ended => (PlayerEvent::Ended, Some(false), TimerEffect::Stop),
        NativeState::Playing => (PlayerEvent::Playing, Some(true), TimerEffect::Restart),
        NativeState::Paused => (PlayerEvent::Pause, Some(false), TimerEffect::Stop),
        NativeState::Buffering => (PlayerEvent::Buffering, None, TimerEffect::Keep),
        NativeState::Cued => (PlayerEvent::Cued, None, TimerEffect::Keep),
        NativeState::Error(code) => (PlayerEvent::Error { code }, Some(false), TimerEffect::Stop),
    };
    Transition {
        event,
        playing,
        timer,
    }
}
