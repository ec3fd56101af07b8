//! Headless in-process platform.
//!
//! Used by the `simulate` command and by tests to drive the adapter without a
//! browser. Players can be scripted by hand (`fire_*`) or left in auto mode,
//! where they answer play/pause the way the iframe player does.

use crate::core::events::{NativeSignal, NativeState};
use crate::core::mount::MountId;
use crate::error::{Error, Result};
use crate::platform::{Platform, PlayerSpec, RemoteHandle, RemotePlayer};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
enum LoadMode {
    Delay(Duration),
    Manual,
    Fail(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    Play,
    Pause,
}

pub struct SimulatedPlatform {
    load_mode: LoadMode,
    release: watch::Sender<bool>,
    loads: AtomicUsize,
    duration: f64,
    auto: bool,
    players: Mutex<Vec<SimulatedPlayer>>,
    built: Notify,
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPlatform {
    /// Loads immediately; players wait for `fire_ready`.
    pub fn new() -> Self {
        let (release, _) = watch::channel(false);
        Self {
            load_mode: LoadMode::Delay(Duration::ZERO),
            release,
            loads: AtomicUsize::new(0),
            duration: 0.0,
            auto: false,
            players: Mutex::new(Vec::new()),
            built: Notify::new(),
        }
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_mode = LoadMode::Delay(delay);
        self
    }

    /// Load stays pending until [`release`](Self::release) is called.
    pub fn manual_load(mut self) -> Self {
        self.load_mode = LoadMode::Manual;
        self
    }

    pub fn failing_load(mut self, reason: impl Into<String>) -> Self {
        self.load_mode = LoadMode::Fail(reason.into());
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = seconds;
        self
    }

    /// Players signal ready on their own and respond to play/pause commands.
    pub fn auto(mut self) -> Self {
        self.auto = true;
        self
    }

    pub fn release(&self) {
        self.release.send_replace(true);
    }

    pub fn load_calls(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn players(&self) -> Vec<SimulatedPlayer> {
        lock(&self.players).clone()
    }

    /// Waits until the `index`-th player has been built.
    pub async fn player(&self, index: usize) -> SimulatedPlayer {
        loop {
            let notified = self.built.notified();
            if let Some(player) = lock(&self.players).get(index).cloned() {
                return player;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Platform for SimulatedPlatform {
    async fn load(&self) -> Result<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match &self.load_mode {
            LoadMode::Delay(delay) => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                Ok(())
            }
            LoadMode::Manual => {
                let mut rx = self.release.subscribe();
                rx.wait_for(|released| *released)
                    .await
                    .map_err(|_| Error::PlatformLoad("release channel closed".to_string()))?;
                Ok(())
            }
            LoadMode::Fail(reason) => Err(Error::PlatformLoad(reason.clone())),
        }
    }

    fn build_player(&self, mount: &MountId, spec: PlayerSpec) -> Result<RemoteHandle> {
        let (signals, rx) = mpsc::unbounded_channel();
        let player = SimulatedPlayer {
            inner: Arc::new(PlayerInner {
                mount: mount.clone(),
                spec,
                duration: self.duration,
                auto: self.auto,
                signals,
                commands: Mutex::new(Vec::new()),
                clock: Mutex::new(Clock::default()),
            }),
        };
        debug!("Built simulated player in {}", mount);

        if self.auto {
            player.fire_ready();
        }
        lock(&self.players).push(player.clone());
        self.built.notify_waiters();

        Ok(RemoteHandle {
            player: Arc::new(player),
            signals: rx,
        })
    }
}

#[derive(Debug, Default)]
struct Clock {
    position: f64,
    started: Option<Instant>,
    epoch: u64,
}

impl Clock {
    fn now(&self, duration: f64) -> f64 {
        let elapsed = self
            .started
            .map(|at| at.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let position = self.position + elapsed;
        if duration > 0.0 {
            position.min(duration)
        } else {
            position
        }
    }

    fn stop(&mut self, duration: f64) {
        self.position = self.now(duration);
        self.started = None;
        self.epoch += 1;
    }
}

struct PlayerInner {
    mount: MountId,
    spec: PlayerSpec,
    duration: f64,
    auto: bool,
    signals: mpsc::UnboundedSender<NativeSignal>,
    commands: Mutex<Vec<RemoteCommand>>,
    clock: Mutex<Clock>,
}

#[derive(Clone)]
pub struct SimulatedPlayer {
    inner: Arc<PlayerInner>,
}

impl SimulatedPlayer {
    pub fn mount(&self) -> &MountId {
        &self.inner.mount
    }

    pub fn spec(&self) -> &PlayerSpec {
        &self.inner.spec
    }

    pub fn commands(&self) -> Vec<RemoteCommand> {
        lock(&self.inner.commands).clone()
    }

    pub fn set_current_time(&self, seconds: f64) {
        let mut clock = lock(&self.inner.clock);
        clock.position = seconds;
        if clock.started.is_some() {
            clock.started = Some(Instant::now());
        }
    }

    pub fn fire_ready(&self) {
        self.signal(NativeSignal::Ready);
    }

    pub fn fire_state(&self, code: i32) {
        self.signal(NativeSignal::StateChange(code));
    }

    pub fn fire_error(&self, code: i32) {
        self.signal(NativeSignal::Error(code));
    }

    fn signal(&self, signal: NativeSignal) {
        if self.inner.signals.send(signal).is_err() {
            debug!("Adapter for {} is gone, dropping {:?}", self.inner.mount, signal);
        }
    }

    fn start_clock(&self) {
        let duration = self.inner.duration;
        let (epoch, remaining) = {
            let mut clock = lock(&self.inner.clock);
            if clock.started.is_some() {
                return;
            }
            clock.started = Some(Instant::now());
            clock.epoch += 1;
            (clock.epoch, duration - clock.position)
        };

        self.fire_state(NativeState::PLAYING);

        if duration <= 0.0 {
            return;
        }
        let player = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(remaining.max(0.0))).await;
            let finished = {
                let mut clock = lock(&player.inner.clock);
                if clock.epoch == epoch && clock.started.is_some() {
                    clock.stop(duration);
                    true
                } else {
                    false
                }
            };
            if finished {
                player.fire_state(NativeState::ENDED);
            }
        });
    }
}

impl RemotePlayer for SimulatedPlayer {
    fn play_video(&self) {
        lock(&self.inner.commands).push(RemoteCommand::Play);
        if self.inner.auto {
            if lock(&self.inner.clock).now(self.inner.duration) >= self.inner.duration
                && self.inner.duration > 0.0
            {
                self.set_current_time(0.0);
            }
            self.fire_state(NativeState::BUFFERING);
            self.start_clock();
        }
    }

    fn pause_video(&self) {
        lock(&self.inner.commands).push(RemoteCommand::Pause);
        if self.inner.auto {
            lock(&self.inner.clock).stop(self.inner.duration);
            self.fire_state(NativeState::PAUSED);
        }
    }

    fn current_time(&self) -> f64 {
        lock(&self.inner.clock).now(self.inner.duration)
    }

    fn duration(&self) -> f64 {
        self.inner.duration
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
