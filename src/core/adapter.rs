//! The player adapter.
//!
//! Each adapter is a handle to one driver task that owns all player state:
//! platform readiness, the remote player, the native → semantic translation
//! and the time-update poller. Commands from the handle and native signals
//! from the remote player are processed one at a time by that task.

use crate::config::{Config, PlayerOptions};
use crate::core::events::{translate, NativeSignal, PlayerEvent, TimerEffect, Transition};
use crate::core::extractor::{extract_video_id, VideoId};
use crate::core::metadata::{MetadataDocument, MetadataFetcher};
use crate::core::mount::{MountId, Surface};
use crate::error::Result;
use crate::platform::{PlayerSpec, RemotePlayer, ScriptLoader};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub type MetaCallback = Box<dyn FnOnce(&MetadataDocument) + Send>;

/// Collaborators shared by adapters.
#[derive(Clone)]
pub struct Services {
    pub loader: Arc<ScriptLoader>,
    pub metadata: Arc<dyn MetadataFetcher>,
    pub timeupdate_interval: Duration,
    pub event_capacity: usize,
}

impl Services {
    pub fn new(loader: Arc<ScriptLoader>, metadata: Arc<dyn MetadataFetcher>) -> Self {
        Self::from_config(&Config::default(), loader, metadata)
    }

    pub fn from_config(
        config: &Config,
        loader: Arc<ScriptLoader>,
        metadata: Arc<dyn MetadataFetcher>,
    ) -> Self {
        Self {
            loader,
            metadata,
            timeupdate_interval: config.timeupdate_interval(),
            event_capacity: config.event_capacity,
        }
    }
}

/// Observable adapter state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerSnapshot {
    pub is_ready: bool,
    /// Set optimistically by `play()`, so it can be `true` before the native
    /// playing signal arrives and `polling` turns on.
    pub playing: bool,
    pub current_time: f64,
    pub duration: f64,
    /// Whether the time-update poller is running.
    pub polling: bool,
    pub metadata: Option<MetadataDocument>,
}

enum Command {
    Play,
    Pause,
    Metadata {
        document: MetadataDocument,
        callback: Option<MetaCallback>,
        ack: Option<oneshot::Sender<()>>,
    },
}

#[derive(Clone)]
pub struct PlayerAdapter {
    id: VideoId,
    mount: MountId,
    surface: Arc<dyn Surface>,
    metadata: Arc<dyn MetadataFetcher>,
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<PlayerEvent>,
    first_subscriber: Arc<Mutex<Option<broadcast::Receiver<PlayerEvent>>>>,
    state: watch::Receiver<PlayerSnapshot>,
    shutdown: CancellationToken,
}

impl fmt::Debug for PlayerAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerAdapter")
            .field("id", &self.id)
            .field("mount", &self.mount)
            .finish_non_exhaustive()
    }
}

impl PlayerAdapter {
    /// Mounts a new player for `source` on `surface` and starts its driver task.
    ///
    /// Fails without mounting anything when no video id can be resolved from
    /// `source`. Must be called from within a Tokio runtime.
    pub fn spawn(
        source: &str,
        surface: Arc<dyn Surface>,
        options: PlayerOptions,
        services: Services,
    ) -> Result<Self> {
        let id = extract_video_id(source)?;
        let mount = MountId::generate();
        surface.attach(&mount);

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, first) = broadcast::channel(services.event_capacity.max(1));
        let (state_tx, state) = watch::channel(PlayerSnapshot::default());
        let shutdown = CancellationToken::new();

        let driver = Driver {
            id: id.clone(),
            mount: mount.clone(),
            options,
            loader: Arc::clone(&services.loader),
            events: events.clone(),
            state: state_tx,
            remote: None,
            is_ready: false,
            playing: false,
            current_time: 0.0,
            duration: 0.0,
            metadata: None,
            poller: None,
            period: services.timeupdate_interval,
            deferred_plays: 0,
        };
        info!("Mounting player for {} at {}", id, mount);
        tokio::spawn(driver.run(command_rx, shutdown.clone()));

        Ok(Self {
            id,
            mount,
            surface,
            metadata: services.metadata,
            commands,
            events,
            first_subscriber: Arc::new(Mutex::new(Some(first))),
            state,
            shutdown,
        })
    }

    /// Resolves a video id from a URL without touching any adapter state.
    pub fn identifier_for(url: &str) -> Result<VideoId> {
        extract_video_id(url)
    }

    pub fn id(&self) -> &VideoId {
        &self.id
    }

    pub fn mount_id(&self) -> &MountId {
        &self.mount
    }

    /// The first call sees every event since the adapter was spawned; later
    /// calls see events from the moment of subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        let first = self
            .first_subscriber
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        first.unwrap_or_else(|| self.events.subscribe())
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.state.borrow().clone()
    }

    pub fn state_changes(&self) -> watch::Receiver<PlayerSnapshot> {
        self.state.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state.borrow().is_ready
    }

    /// Plays now if ready, otherwise once `ready` has fired.
    pub fn play(&self) {
        self.send(Command::Play);
    }

    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    /// Fetches metadata in the background, then emits `loadedmetadata` and
    /// invokes `callback` with the document (empty if the fetch failed).
    pub fn meta(&self, callback: Option<MetaCallback>) {
        let fetcher = Arc::clone(&self.metadata);
        let id = self.id.clone();
        let commands = self.commands.clone();
        tokio::spawn(async move {
            let document = load_metadata(fetcher.as_ref(), &id).await;
            let _ = commands.send(Command::Metadata {
                document,
                callback,
                ack: None,
            });
        });
    }

    /// Awaitable form of [`meta`](Self::meta).
    pub async fn fetch_meta(&self) -> MetadataDocument {
        let document = load_metadata(self.metadata.as_ref(), &self.id).await;
        let (ack, done) = oneshot::channel();
        self.send(Command::Metadata {
            document: document.clone(),
            callback: None,
            ack: Some(ack),
        });
        let _ = done.await;
        document
    }

    /// Detaches the mount node and stops the driver task.
    /// Returns `false` if the node was no longer attached.
    pub fn remove(&self) -> bool {
        let detached = self.surface.detach(&self.mount);
        if !detached {
            warn!("Mount {} was not attached", self.mount);
        }
        self.shutdown.cancel();
        detached
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Player {} is no longer running", self.mount);
        }
    }
}

async fn load_metadata(fetcher: &dyn MetadataFetcher, id: &VideoId) -> MetadataDocument {
    match fetcher.fetch(id).await {
        Ok(document) => document,
        Err(e) => {
            warn!("Metadata for {} unavailable: {}", id, e);
            MetadataDocument::empty()
        }
    }
}

struct Driver {
    id: VideoId,
    mount: MountId,
    options: PlayerOptions,
    loader: Arc<ScriptLoader>,
    events: broadcast::Sender<PlayerEvent>,
    state: watch::Sender<PlayerSnapshot>,
    remote: Option<Arc<dyn RemotePlayer>>,
    is_ready: bool,
    playing: bool,
    current_time: f64,
    duration: f64,
    metadata: Option<MetadataDocument>,
    // Some exactly while in the "playing" semantic state.
    poller: Option<Interval>,
    period: Duration,
    deferred_plays: usize,
}

impl Driver {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        shutdown: CancellationToken,
    ) {
        let loader = Arc::clone(&self.loader);
        let platform_ready = loader.ensure_loaded();
        tokio::pin!(platform_ready);
        let mut waiting_for_platform = true;
        let mut signals: Option<mpsc::UnboundedReceiver<NativeSignal>> = None;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                result = &mut platform_ready, if waiting_for_platform => {
                    waiting_for_platform = false;
                    match result {
                        Ok(()) => signals = self.build(),
                        Err(e) => warn!("Player {} stays pending: {}", self.mount, e),
                    }
                }

                signal = next_signal(&mut signals) => match signal {
                    Some(signal) => self.on_signal(signal),
                    None => {
                        debug!("Remote player {} closed its signal channel", self.mount);
                        signals = None;
                    }
                },

                command = commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },

                _ = next_tick(&mut self.poller) => self.on_tick(),
            }
        }

        self.stop_polling();
        self.publish();
        debug!("Player {} driver stopped", self.mount);
    }

    fn build(&mut self) -> Option<mpsc::UnboundedReceiver<NativeSignal>> {
        let spec = PlayerSpec {
            width: self.options.width,
            height: self.options.height,
            video_id: self.id.clone(),
            player_vars: self.options.player_vars.clone(),
        };
        match self.loader.platform().build_player(&self.mount, spec) {
            Ok(handle) => {
                debug!("Built remote player for {}", self.id);
                self.remote = Some(handle.player);
                Some(handle.signals)
            }
            Err(e) => {
                error!("Could not build player for {}: {}", self.id, e);
                None
            }
        }
    }

    fn on_signal(&mut self, signal: NativeSignal) {
        if signal == NativeSignal::Ready {
            self.on_native_ready();
            return;
        }
        if !self.is_ready {
            debug!("Ignoring {:?} before native ready", signal);
            return;
        }
        match signal.state() {
            Some(state) => self.apply(translate(state)),
            None => debug!("Ignoring unknown native signal {:?}", signal),
        }
    }

    fn on_native_ready(&mut self) {
        if self.is_ready {
            return;
        }
        let Some(remote) = self.remote.clone() else {
            return;
        };

        self.is_ready = true;
        self.duration = remote.duration();
        info!("Player {} ready ({}s)", self.id, self.duration);
        self.publish();
        self.emit(PlayerEvent::Ready);

        for _ in 0..std::mem::take(&mut self.deferred_plays) {
            self.play();
        }
    }

    fn apply(&mut self, transition: Transition) {
        debug!("Player {} -> {}", self.id, transition.event.name());
        if let Some(playing) = transition.playing {
            self.playing = playing;
        }
        match transition.timer {
            TimerEffect::Restart => self.start_polling(),
            TimerEffect::Stop => self.stop_polling(),
            TimerEffect::Keep => {}
        }
        self.publish();
        self.emit(transition.event);
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Play => self.play(),
            Command::Pause => self.pause(),
            Command::Metadata {
                document,
                callback,
                ack,
            } => {
                self.metadata = Some(document.clone());
                self.publish();
                self.emit(PlayerEvent::LoadedMetadata(document.clone()));
                if let Some(callback) = callback {
                    callback(&document);
                }
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
            }
        }
    }

    fn play(&mut self) {
        if !self.is_ready {
            self.deferred_plays += 1;
            debug!("Deferring play for {} until ready", self.id);
            return;
        }
        if let Some(remote) = &self.remote {
            remote.play_video();
            self.playing = true;
            self.publish();
        }
    }

    fn pause(&mut self) {
        let Some(remote) = &self.remote else {
            warn!("Pause on {} before the player exists", self.id);
            return;
        };
        remote.pause_video();
        self.playing = false;
        self.stop_polling();
        self.publish();
    }

    fn on_tick(&mut self) {
        let Some(remote) = &self.remote else {
            return;
        };
        self.current_time = remote.current_time();
        self.publish();
        self.emit(PlayerEvent::TimeUpdate(self.current_time));
    }

    fn start_polling(&mut self) {
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.poller = Some(interval);
    }

    fn stop_polling(&mut self) {
        self.poller = None;
    }

    fn publish(&self) {
        self.state.send_replace(PlayerSnapshot {
            is_ready: self.is_ready,
            playing: self.playing,
            current_time: self.current_time,
            duration: self.duration,
            polling: self.poller.is_some(),
            metadata: self.metadata.clone(),
        });
    }

    fn emit(&self, event: PlayerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

async fn next_signal(rx: &mut Option<mpsc::UnboundedReceiver<NativeSignal>>) -> Option<NativeSignal> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(poller: &mut Option<Interval>) {
    match poller {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
