use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio_test::{assert_err, assert_ok};
use yt_player_ng::core::{MemorySurface, Surface, VideoId};
use yt_player_ng::platform::{RemoteCommand, SimulatedPlatform};
use yt_player_ng::{
    Error, MetadataDocument, MetadataFetcher, PlayerAdapter, PlayerEvent, PlayerOptions,
    ScriptLoader, Services,
};

struct StaticFetcher(Option<MetadataDocument>);

#[async_trait]
impl MetadataFetcher for StaticFetcher {
    async fn fetch(&self, id: &VideoId) -> yt_player_ng::Result<MetadataDocument> {
        self.0
            .clone()
            .ok_or_else(|| Error::MetadataFetch(format!("nothing for {}", id)))
    }
}

struct Harness {
    platform: Arc<SimulatedPlatform>,
    loader: Arc<ScriptLoader>,
    surface: Arc<MemorySurface>,
}

impl Harness {
    fn new(platform: SimulatedPlatform) -> Self {
        let platform = Arc::new(platform);
        Self {
            loader: ScriptLoader::new(platform.clone()),
            platform,
            surface: Arc::new(MemorySurface::new()),
        }
    }

    fn spawn(&self, source: &str) -> yt_player_ng::Result<PlayerAdapter> {
        self.spawn_with(source, StaticFetcher(None))
    }

    fn spawn_with(
        &self,
        source: &str,
        fetcher: StaticFetcher,
    ) -> yt_player_ng::Result<PlayerAdapter> {
        let services = Services::new(self.loader.clone(), Arc::new(fetcher));
        PlayerAdapter::spawn(source, self.surface.clone(), PlayerOptions::default(), services)
    }
}

async fn next_event(events: &mut broadcast::Receiver<PlayerEvent>) -> PlayerEvent {
    tokio::time::timeout(Duration::from_secs(30), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

fn drain(events: &mut broadcast::Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
    let mut seen = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => seen.push(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return seen,
            Err(TryRecvError::Lagged(_)) => continue,
        }
    }
}

fn count_time_updates(events: &[PlayerEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, PlayerEvent::TimeUpdate(_)))
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_lifecycle_scenario() -> Result<()> {
    let harness = Harness::new(SimulatedPlatform::new().with_duration(212.0));
    let adapter = harness.spawn("abc123")?;
    let mut events = adapter.subscribe();

    let player = harness.platform.player(0).await;
    assert_eq!(player.spec().video_id.as_str(), "abc123");
    assert_eq!(player.spec().width, 640);
    assert_eq!(player.mount(), adapter.mount_id());
    assert!(harness.surface.contains(adapter.mount_id()));

    player.fire_ready();
    assert_eq!(next_event(&mut events).await, PlayerEvent::Ready);
    let snapshot = adapter.snapshot();
    assert!(snapshot.is_ready);
    assert_eq!(snapshot.duration, 212.0);

    player.fire_state(1);
    assert_eq!(next_event(&mut events).await, PlayerEvent::Playing);
    let snapshot = adapter.snapshot();
    assert!(snapshot.playing);
    assert!(snapshot.polling);

    player.set_current_time(1.5);
    assert_eq!(next_event(&mut events).await, PlayerEvent::TimeUpdate(1.5));
    assert_eq!(adapter.snapshot().current_time, 1.5);

    player.fire_state(2);
    assert_eq!(next_event(&mut events).await, PlayerEvent::Pause);
    let snapshot = adapter.snapshot();
    assert!(!snapshot.playing);
    assert!(!snapshot.polling);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(count_time_updates(&drain(&mut events)), 0);

    player.fire_state(0);
    assert_eq!(next_event(&mut events).await, PlayerEvent::Ended);
    assert!(!adapter.snapshot().playing);
    assert!(adapter.snapshot().is_ready);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_play_before_ready_is_deferred_once() -> Result<()> {
    let harness = Harness::new(SimulatedPlatform::new());
    let adapter = harness.spawn("dQw4w9WgXcQ")?;
    let mut events = adapter.subscribe();

    adapter.play();
    let player = harness.platform.player(0).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(player.commands().is_empty());
    assert!(!adapter.is_ready());

    player.fire_ready();
    assert_eq!(next_event(&mut events).await, PlayerEvent::Ready);

    let mut state = adapter.state_changes();
    state.wait_for(|s| s.playing).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(player.commands(), vec![RemoteCommand::Play]);

    adapter.pause();
    state.wait_for(|s| !s.playing).await?;
    assert_eq!(player.commands(), vec![RemoteCommand::Play, RemoteCommand::Pause]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_optimistic_play_runs_ahead_of_poller() -> Result<()> {
    let harness = Harness::new(SimulatedPlatform::new());
    let adapter = harness.spawn("abc123")?;
    let mut events = adapter.subscribe();
    let player = harness.platform.player(0).await;

    player.fire_ready();
    assert_eq!(next_event(&mut events).await, PlayerEvent::Ready);

    adapter.play();
    let mut state = adapter.state_changes();
    state.wait_for(|s| s.playing).await?;
    let snapshot = adapter.snapshot();
    assert!(snapshot.playing);
    assert!(!snapshot.polling);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(count_time_updates(&drain(&mut events)), 0);

    player.fire_state(1);
    assert_eq!(next_event(&mut events).await, PlayerEvent::Playing);
    assert!(adapter.snapshot().polling);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_repeated_playing_keeps_one_poller() -> Result<()> {
    let harness = Harness::new(SimulatedPlatform::new());
    let adapter = harness.spawn("abc123")?;
    let mut events = adapter.subscribe();
    let player = harness.platform.player(0).await;

    player.fire_ready();
    assert_eq!(next_event(&mut events).await, PlayerEvent::Ready);

    player.fire_state(1);
    player.fire_state(1);
    assert_eq!(next_event(&mut events).await, PlayerEvent::Playing);
    assert_eq!(next_event(&mut events).await, PlayerEvent::Playing);

    tokio::time::sleep(Duration::from_millis(1010)).await;
    assert_eq!(count_time_updates(&drain(&mut events)), 4);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unknown_and_early_codes_are_ignored() -> Result<()> {
    let harness = Harness::new(SimulatedPlatform::new());
    let adapter = harness.spawn("abc123")?;
    let mut events = adapter.subscribe();
    let player = harness.platform.player(0).await;

    // Native listeners are not bound before the ready signal.
    player.fire_state(1);
    player.fire_ready();
    assert_eq!(next_event(&mut events).await, PlayerEvent::Ready);
    assert!(!adapter.snapshot().polling);

    player.fire_state(-1);
    player.fire_state(4);
    player.fire_state(3);
    player.fire_state(5);
    assert_eq!(next_event(&mut events).await, PlayerEvent::Buffering);
    assert_eq!(next_event(&mut events).await, PlayerEvent::Cued);
    assert!(!adapter.snapshot().playing);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_error_stops_time_updates() -> Result<()> {
    let harness = Harness::new(SimulatedPlatform::new());
    let adapter = harness.spawn("abc123")?;
    let mut events = adapter.subscribe();
    let player = harness.platform.player(0).await;

    player.fire_ready();
    player.fire_state(1);
    assert_eq!(next_event(&mut events).await, PlayerEvent::Ready);
    assert_eq!(next_event(&mut events).await, PlayerEvent::Playing);
    assert!(matches!(next_event(&mut events).await, PlayerEvent::TimeUpdate(_)));

    player.fire_error(150);
    let mut after = next_event(&mut events).await;
    while matches!(after, PlayerEvent::TimeUpdate(_)) {
        after = next_event(&mut events).await;
    }
    assert_eq!(after, PlayerEvent::Error { code: 150 });
    assert!(!adapter.snapshot().playing);
    assert!(!adapter.snapshot().polling);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(count_time_updates(&drain(&mut events)), 0);

    // Playback can resume after an error.
    player.fire_state(1);
    assert_eq!(next_event(&mut events).await, PlayerEvent::Playing);
    assert!(adapter.snapshot().polling);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_meta_emits_and_calls_back() -> Result<()> {
    let harness = Harness::new(SimulatedPlatform::new());
    let document = MetadataDocument::from(json!({"title": "Never Gonna Give You Up"}));
    let adapter = harness.spawn_with("dQw4w9WgXcQ", StaticFetcher(Some(document.clone())))?;
    let mut events = adapter.subscribe();

    let (tx, rx) = tokio::sync::oneshot::channel();
    adapter.meta(Some(Box::new(move |doc: &MetadataDocument| {
        let _ = tx.send(doc.clone());
    })));

    assert_eq!(
        next_event(&mut events).await,
        PlayerEvent::LoadedMetadata(document.clone())
    );
    assert_eq!(rx.await?, document);
    assert_eq!(adapter.snapshot().metadata, Some(document.clone()));

    assert_eq!(adapter.fetch_meta().await.title(), Some("Never Gonna Give You Up"));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_meta_failure_yields_empty_document() -> Result<()> {
    let harness = Harness::new(SimulatedPlatform::new());
    let adapter = harness.spawn("abc123")?;
    let mut events = adapter.subscribe();

    let (tx, rx) = tokio::sync::oneshot::channel();
    adapter.meta(Some(Box::new(move |doc: &MetadataDocument| {
        let _ = tx.send(doc.clone());
    })));

    match next_event(&mut events).await {
        PlayerEvent::LoadedMetadata(doc) => assert!(doc.is_empty()),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(rx.await?.is_empty());
    assert!(adapter.fetch_meta().await.is_empty());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_invalid_source_fails_construction() -> Result<()> {
    let harness = Harness::new(SimulatedPlatform::new());

    let err = assert_err!(harness.spawn("https://vimeo.com/123456"));
    assert!(matches!(err, Error::InvalidSource(_)));
    assert!(harness.surface.is_empty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.platform.load_calls(), 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_pending_adapters_share_one_script_load() -> Result<()> {
    let harness = Harness::new(SimulatedPlatform::new().manual_load());
    let adapters: Vec<_> = ["abc123", "def456", "https://youtu.be/ghi789"]
        .into_iter()
        .map(|source| harness.spawn(source))
        .collect::<std::result::Result<_, _>>()?;

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(harness.platform.players().is_empty());
    assert!(!harness.loader.is_ready());

    harness.platform.release();
    harness.platform.player(2).await;

    assert_eq!(harness.platform.load_calls(), 1);
    assert_eq!(harness.loader.load_requests(), 1);
    let mut ids: Vec<_> = harness
        .platform
        .players()
        .iter()
        .map(|p| p.spec().video_id.to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["abc123", "def456", "ghi789"]);

    // A late adapter reuses the loaded platform.
    let late = harness.spawn("jkl012")?;
    harness.platform.player(3).await;
    assert_eq!(harness.platform.load_calls(), 1);
    assert_eq!(adapters.len() + 1, harness.surface.len());
    assert_eq!(late.id().as_str(), "jkl012");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failed_load_leaves_adapter_pending() -> Result<()> {
    let harness = Harness::new(SimulatedPlatform::new().failing_load("offline"));
    let adapter = harness.spawn("abc123")?;

    adapter.play();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!adapter.is_ready());
    assert!(harness.platform.players().is_empty());
    assert_err!(harness.loader.ensure_loaded().await);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_remove_detaches_and_stops_polling() -> Result<()> {
    let harness = Harness::new(SimulatedPlatform::new());
    let adapter = harness.spawn("abc123")?;
    let mut events = adapter.subscribe();
    let player = harness.platform.player(0).await;

    player.fire_ready();
    player.fire_state(1);
    assert_eq!(next_event(&mut events).await, PlayerEvent::Ready);
    assert_eq!(next_event(&mut events).await, PlayerEvent::Playing);

    assert!(adapter.remove());
    assert!(harness.surface.is_empty());
    adapter.state_changes().wait_for(|s| !s.polling).await?;

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(count_time_updates(&drain(&mut events)), 0);
    assert!(!adapter.remove());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_auto_platform_plays_to_end() -> Result<()> {
    let harness = Harness::new(SimulatedPlatform::new().with_duration(2.0).auto());
    let adapter = harness.spawn("https://www.youtube.com/watch?v=dQw4w9WgXcQ")?;
    let mut events = adapter.subscribe();
    adapter.play();

    let mut seen = Vec::new();
    loop {
        let event = next_event(&mut events).await;
        let done = event == PlayerEvent::Ended;
        seen.push(event);
        if done {
            break;
        }
    }

    assert_eq!(
        &seen[..3],
        &[PlayerEvent::Ready, PlayerEvent::Buffering, PlayerEvent::Playing]
    );
    let positions: Vec<f64> = seen
        .iter()
        .filter_map(|e| match e {
            PlayerEvent::TimeUpdate(t) => Some(*t),
            _ => None,
        })
        .collect();
    assert!(positions.len() >= 6);
    assert!(positions.windows(2).all(|w| w[0] <= w[1]));
    assert!(positions.iter().all(|t| *t <= 2.0));

    let snapshot = adapter.snapshot();
    assert!(!snapshot.playing);
    assert!(!snapshot.polling);
    assert_eq!(snapshot.duration, 2.0);

    Ok(())
}

#[tokio::test]
async fn test_identifier_for() -> Result<()> {
    let id = PlayerAdapter::identifier_for("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=123")?;
    assert_eq!(id.as_str(), "dQw4w9WgXcQ");
    assert_ok!(PlayerAdapter::identifier_for("abc123"));
    assert_err!(PlayerAdapter::identifier_for("https://example.com"));
    Ok(())
}
