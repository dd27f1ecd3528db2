//! Timed scene playback.
//!
//! An [`AutoPlayer`] fires a list of scenes one after another on a background
//! thread. Scene `i` fires at `t0 + i × bars × 4 × 60 / tempo` seconds, with
//! deadlines measured from the start of the run so send latency never
//! accumulates. Only one run exists at a time; starting another cancels the
//! first and waits for its thread.

use crate::error::{Error, Result};
use crate::live::LiveApi;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Cancellation flag that wakes sleepers immediately.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep until `deadline` or cancellation. Returns `true` if cancelled.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let (flag, cvar) = &*self.inner;
        let mut cancelled = flag.lock().unwrap_or_else(PoisonError::into_inner);
        while !*cancelled {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            cancelled = cvar
                .wait_timeout(cancelled, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }
}

/// Something that can launch a scene. Implemented by [`LiveApi`].
pub trait SceneLauncher: Send + 'static {
    fn launch_scene(&self, scene: i32) -> Result<()>;
}

impl SceneLauncher for LiveApi {
    fn launch_scene(&self, scene: i32) -> Result<()> {
        self.fire_scene(scene)
    }
}

/// Wall-clock length of one scene. Fails for a tempo that gives no
/// representable duration.
pub fn scene_duration(bars_per_scene: u32, tempo: f64) -> Result<Duration> {
    if !(tempo.is_finite() && tempo > 0.0) {
        return Err(Error::InvalidParameter(format!("invalid tempo {}", tempo)));
    }
    Duration::try_from_secs_f64(bars_per_scene as f64 * 4.0 * 60.0 / tempo)
        .map_err(|_| Error::InvalidParameter(format!("tempo {} gives no usable scene length", tempo)))
}

struct Run {
    cancel: CancelToken,
    finished: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct AutoPlayer {
    run: Mutex<Option<Run>>,
}

impl AutoPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start firing `scenes`, replacing any run in progress. Returns the
    /// time each scene plays for.
    pub fn start<L: SceneLauncher>(
        &self,
        launcher: L,
        scenes: Vec<i32>,
        bars_per_scene: u32,
        tempo: f64,
    ) -> Result<Duration> {
        if scenes.is_empty() {
            return Err(Error::InvalidParameter("no scenes to play".to_string()));
        }
        if bars_per_scene == 0 {
            return Err(Error::InvalidParameter("bars_per_scene must be at least 1".to_string()));
        }
        let step = scene_duration(bars_per_scene, tempo)?;

        let mut run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = run.take() {
            info!("[AutoPlay] Replacing run in progress");
            finish(previous);
        }

        let count = scenes.len();
        let cancel = CancelToken::new();
        let finished = Arc::new(AtomicBool::new(false));
        let handle = {
            let cancel = cancel.clone();
            let finished = Arc::clone(&finished);
            thread::Builder::new()
                .name("liveosc-autoplay".to_string())
                .spawn(move || {
                    play_scenes(&launcher, &scenes, step, &cancel);
                    finished.store(true, Ordering::Release);
                })?
        };

        info!(
            "[AutoPlay] Started: {} scenes, {} bars each ({:.2}s)",
            count,
            bars_per_scene,
            step.as_secs_f64()
        );
        *run = Some(Run {
            cancel,
            finished,
            handle,
        });
        Ok(step)
    }

    /// Cancel and join the current run. Returns whether one was active.
    pub fn stop(&self) -> bool {
        let previous = self.run.lock().unwrap_or_else(PoisonError::into_inner).take();
        match previous {
            Some(run) => {
                let was_running = !run.finished.load(Ordering::Acquire);
                finish(run);
                if was_running {
                    info!("[AutoPlay] Stopped");
                }
                was_running
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|run| !run.finished.load(Ordering::Acquire))
    }
}

impl Drop for AutoPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for AutoPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoPlayer")
            .field("running", &self.is_running())
            .finish()
    }
}

fn finish(run: Run) {
    run.cancel.cancel();
    if run.handle.join().is_err() {
        warn!("[AutoPlay] Playback thread panicked");
    }
}

fn play_scenes<L: SceneLauncher>(launcher: &L, scenes: &[i32], step: Duration, cancel: &CancelToken) {
    let t0 = Instant::now();
    for (i, &scene) in scenes.iter().enumerate() {
        let Some(deadline) = u32::try_from(i)
            .ok()
            .and_then(|i| step.checked_mul(i))
            .and_then(|offset| t0.checked_add(offset))
        else {
            warn!("[AutoPlay] Scene {} is too far in the future, stopping", scene);
            return;
        };
        if cancel.wait_until(deadline) {
            info!("[AutoPlay] Cancelled before scene {}", scene);
            return;
        }
        if let Err(e) = launcher.launch_scene(scene) {
            warn!("[AutoPlay] Failed to fire scene {}: {}", scene, e);
            return;
        }
        info!("[AutoPlay] Fired scene {} ({}/{})", scene, i + 1, scenes.len());
    }
    info!("[AutoPlay] Finished");
}
