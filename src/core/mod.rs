pub mod adapter;
pub mod events;
pub mod extractor;
pub mod metadata;
pub mod mount;

pub use adapter::{MetaCallback, PlayerAdapter, PlayerSnapshot, Services};
pub use events::{NativeSignal, NativeState, PlayerEvent};
pub use extractor::{extract_video_id, VideoId};
pub use metadata::{HttpMetadataFetcher, MetadataDocument, MetadataFetcher};
pub use mount::{MemorySurface, MountId, Surface};
