//! # Complication Feeds Core Library
//!
//! Two watch-face data sources ("complications") and the seams they need:
//!
//! - [`heart_rate::HeartRateFeed`]: latest measured heart rate, as short text
//!   or on a gauge, with a pulsing heart icon
//! - [`moon_phase::MoonPhaseFeed`]: one of 25 moon images chosen from the
//!   current time, re-rendered periodically while active
//!
//! ## Design Philosophy
//!
//! ### Passive responders
//! Neither feed runs on its own. The host activates a slot, requests renders,
//! and deactivates it; the feeds only ask the host to re-render (push
//! triggers pull) when a sensor sample arrives or the refresh timer ticks.
//!
//! ### Injected collaborators
//! Everything platform-specific is behind a trait and passed in:
//! [`sensor::MeasureClient`] for the heart-rate stream,
//! [`host::UpdateRequester`] for re-render requests, [`assets::AssetLookup`]
//! for icons and [`moon_phase::Clock`] for the time. The crate ships in-process
//! implementations of each so it runs and tests off-device.
//!
//! ### Shared state
//! The only state shared across threads is the heart-rate cache (an atomic
//! bpm plus per-slot render counts) and the per-feed subscription/timer slot
//! (a mutex around an `Option`).
//! The moon phase is a pure function of the time and never cached.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;

pub mod assets;
pub mod config;
pub mod heart_rate;
pub mod host;
pub mod lunar;
pub mod moon_phase;
pub mod refresh;
pub mod sensor;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use heart_rate::{HeartRateCache, HeartRateFeed};
pub use host::{ComplicationData, ComplicationDataSource, ComplicationRequest, ComplicationType};
pub use lunar::{moon_phase as compute_moon_phase, phase_bucket, MoonPhase, MoonPhaseReference};
pub use moon_phase::MoonPhaseFeed;

/// Lock a mutex, carrying on with the inner value if a holder panicked.
///
/// Guarded values here are plain `Option`s, `Vec`s and maps that stay consistent
/// across a panic.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Both feeds wired to one host, sensor and asset set.
pub struct Feeds {
    pub heart_rate: Arc<HeartRateFeed>,
    pub moon_phase: Arc<MoonPhaseFeed>,
}

impl Feeds {
    pub fn build(
        config: &Config,
        host: &host::LoopbackHost,
        sensor: Arc<dyn sensor::MeasureClient>,
        clock: Arc<dyn moon_phase::Clock>,
        runtime: Handle,
    ) -> Self {
        let assets: Arc<dyn assets::AssetLookup> =
            Arc::new(assets::BuiltinAssets::new(config.assets.glyph_size));

        let heart_rate = Arc::new(HeartRateFeed::new(
            Arc::new(HeartRateCache::new()),
            sensor,
            host.requester(HeartRateFeed::component_name()),
            Arc::clone(&assets),
            config.heart_rate.clone(),
        ));
        let moon_phase = Arc::new(MoonPhaseFeed::new(
            config.moon.reference(),
            clock,
            host.requester(MoonPhaseFeed::component_name()),
            assets,
            runtime,
            config.moon.clone(),
        ));

        Self {
            heart_rate,
            moon_phase,
        }
    }

    /// Register both feeds with `host`.
    pub fn register(&self, host: &mut host::LoopbackHost) {
        host.register(self.heart_rate.clone());
        host.register(self.moon_phase.clone());
    }
}
