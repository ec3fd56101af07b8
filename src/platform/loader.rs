use crate::error::{Error, Result};
use crate::platform::Platform;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    NotRequested,
    Requested,
    Ready,
    Failed(String),
}

impl LoadState {
    fn is_settled(&self) -> bool {
        matches!(self, LoadState::Ready | LoadState::Failed(_))
    }
}

static SHARED: OnceLock<Arc<ScriptLoader>> = OnceLock::new();

/// Readiness gate for the platform bootstrap script.
///
/// The script is requested at most once per loader, and readiness is broadcast
/// to every waiter. A failed load is final.
pub struct ScriptLoader {
    platform: Arc<dyn Platform>,
    state: watch::Sender<LoadState>,
    requests: AtomicUsize,
}

impl ScriptLoader {
    pub fn new(platform: Arc<dyn Platform>) -> Arc<Self> {
        let (state, _) = watch::channel(LoadState::NotRequested);
        Arc::new(Self {
            platform,
            state,
            requests: AtomicUsize::new(0),
        })
    }

    /// Returns the process-wide loader, installing one around `platform` on first use.
    /// Later calls ignore their argument.
    pub fn shared(platform: Arc<dyn Platform>) -> Arc<Self> {
        let mut installed = false;
        let loader = SHARED.get_or_init(|| {
            installed = true;
            Self::new(platform)
        });
        if !installed {
            debug!("Reusing process-wide script loader");
        }
        Arc::clone(loader)
    }

    pub fn platform(&self) -> Arc<dyn Platform> {
        Arc::clone(&self.platform)
    }

    pub fn state(&self) -> LoadState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.state.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        *self.state.borrow() == LoadState::Ready
    }

    /// Number of times the platform was asked to load its script.
    pub fn load_requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Resolves once the platform is usable, starting the load if nobody has yet.
    pub async fn ensure_loaded(self: &Arc<Self>) -> Result<()> {
        let mut rx = self.state.subscribe();
        self.request();

        let settled = rx
            .wait_for(LoadState::is_settled)
            .await
            .map(|state| state.clone())
            .map_err(|_| Error::PlatformLoad("loader dropped".to_string()))?;

        match settled {
            LoadState::Failed(reason) => Err(Error::PlatformLoad(reason)),
            _ => Ok(()),
        }
    }

    /// Callback form of [`ensure_loaded`](Self::ensure_loaded). Runs `callback`
    /// inline when the platform is already ready.
    pub fn on_ready<F>(self: &Arc<Self>, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_ready() {
            callback();
            return;
        }
        let loader = Arc::clone(self);
        tokio::spawn(async move {
            if loader.ensure_loaded().await.is_ok() {
                callback();
            }
        });
    }

    fn request(self: &Arc<Self>) {
        let first = self.state.send_if_modified(|state| {
            if *state == LoadState::NotRequested {
                *state = LoadState::Requested;
                true
            } else {
                false
            }
        });
        if !first {
            return;
        }

        self.requests.fetch_add(1, Ordering::SeqCst);
        let loader = Arc::clone(self);
        tokio::spawn(async move {
            info!("Loading platform bootstrap script");
            match loader.platform.load().await {
                Ok(()) => {
                    info!("Platform ready");
                    loader.state.send_replace(LoadState::Ready);
                }
                Err(e) => {
                    error!("{}", e);
                    let reason = match e {
                        Error::PlatformLoad(reason) => reason,
                        other => other.to_string(),
                    };
                    loader.state.send_replace(LoadState::Failed(reason));
                }
            }
        });
    }
}
