pub mod loader;
pub mod simulated;

pub use loader::{LoadState, ScriptLoader};
pub use simulated::{RemoteCommand, SimulatedPlatform, SimulatedPlayer};

use crate::core::events::NativeSignal;
use crate::core::extractor::VideoId;
use crate::core::mount::MountId;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything the platform needs to construct a remote player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSpec {
    pub width: u32,
    pub height: u32,
    pub video_id: VideoId,
    pub player_vars: Map<String, Value>,
}

/// Control surface of a player object owned by the external platform.
pub trait RemotePlayer: Send + Sync {
    fn play_video(&self);
    fn pause_video(&self);
    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
}

/// A freshly built remote player plus the channel its native callbacks arrive on.
pub struct RemoteHandle {
    pub player: Arc<dyn RemotePlayer>,
    pub signals: mpsc::UnboundedReceiver<NativeSignal>,
}

/// Bridge to the external embed platform.
///
/// `load` fetches the bootstrap script and resolves once the platform reports
/// itself usable. It is driven by [`ScriptLoader`], which calls it at most once.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn load(&self) -> Result<()>;
    fn build_player(&self, mount: &MountId, spec: PlayerSpec) -> Result<RemoteHandle>;
}
