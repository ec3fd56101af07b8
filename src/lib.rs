pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod platform;
pub mod utils;

pub use config::{Config, PlayerOptions};
pub use core::{
    extract_video_id, MetadataDocument, MetadataFetcher, PlayerAdapter, PlayerEvent,
    PlayerSnapshot, Services, VideoId,
};
pub use error::{Error, Result};
pub use platform::{Platform, ScriptLoader};
