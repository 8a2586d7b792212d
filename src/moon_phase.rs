//! # Moon-Phase Complication
//!
//! Shows one of 25 moon images chosen from the current wall-clock time (see
//! [`crate::lunar`]). The phase is recomputed on every render and never
//! cached. While any slot is active a [`RefreshTimer`] asks the host to
//! re-render at the configured period.

use crate::assets::{AssetId, AssetLookup};
use crate::config::MoonConfig;
use crate::host::{
    ComplicationData, ComplicationDataSource, ComplicationRequest, ComplicationType,
    ComponentName, InstanceId, SmallImageType, UpdateRequester,
};
use crate::lock;
use crate::lunar::{moon_phase, MoonPhase, MoonPhaseReference};
use crate::refresh::RefreshTimer;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

pub const COMPONENT_PACKAGE: &str = "com.ofd.heartbeat";
pub const COMPONENT_CLASS: &str = "com.ofd.heartbeat.MoonPhaseProviderService";

const PREVIEW_DESCRIPTION: &str = "Short Text version of Number.";

/// Source of "now" in Unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self(AtomicI64::new(now_ms))
    }

    pub fn set(&self, now_ms: i64) {
        self.0.store(now_ms, Ordering::Relaxed);
    }

    pub fn advance_ms(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct MoonPhaseFeed {
    component: ComponentName,
    reference: MoonPhaseReference,
    clock: Arc<dyn Clock>,
    updater: Arc<dyn UpdateRequester>,
    assets: Arc<dyn AssetLookup>,
    runtime: Handle,
    config: MoonConfig,
    timer: Mutex<Option<RefreshTimer>>,
}

impl MoonPhaseFeed {
    pub fn component_name() -> ComponentName {
        ComponentName::new(COMPONENT_PACKAGE, COMPONENT_CLASS)
    }

    pub fn new(
        reference: MoonPhaseReference,
        clock: Arc<dyn Clock>,
        updater: Arc<dyn UpdateRequester>,
        assets: Arc<dyn AssetLookup>,
        runtime: Handle,
        config: MoonConfig,
    ) -> Self {
        Self {
            component: Self::component_name(),
            reference,
            clock,
            updater,
            assets,
            runtime,
            config,
            timer: Mutex::new(None),
        }
    }

    /// Phase at the clock's current time.
    pub fn current_phase(&self) -> MoonPhase {
        moon_phase(self.clock.now_ms(), &self.reference)
    }

    pub fn is_refreshing(&self) -> bool {
        lock(&self.timer).is_some()
    }

    /// Refresh ticks issued by the running timer, 0 when inactive.
    pub fn refresh_ticks(&self) -> u64 {
        lock(&self.timer).as_ref().map_or(0, RefreshTimer::ticks)
    }
}

impl ComplicationDataSource for MoonPhaseFeed {
    fn component(&self) -> &ComponentName {
        &self.component
    }

    fn on_activated(&self, instance_id: InstanceId, complication_type: ComplicationType) {
        debug!(
            "moon phase activated: instance {} as {:?}",
            instance_id, complication_type
        );
        let mut timer = lock(&self.timer);
        if timer.is_none() {
            let period = self.config.refresh_interval();
            info!("moon phase refresh every {:?}", period);
            *timer = Some(RefreshTimer::start(
                &self.runtime,
                period,
                Arc::clone(&self.updater),
            ));
        }
    }

    fn on_request(&self, request: &ComplicationRequest) -> Option<ComplicationData> {
        let phase = self.current_phase();
        debug!(
            "moon phase request: bucket {} ({}) as {:?}",
            phase.bucket,
            phase.name.label(),
            request.complication_type
        );
        let content_description = phase.name.label().to_string();

        match request.complication_type {
            ComplicationType::PhotoImage => Some(ComplicationData::PhotoImage {
                image: self.assets.icon(AssetId::MoonPhase(phase.bucket)),
                content_description,
            }),
            ComplicationType::SmallImage => Some(ComplicationData::SmallImage {
                image: self.assets.icon(AssetId::MoonPhase(phase.bucket)),
                image_type: SmallImageType::Photo,
                content_description,
            }),
            other => {
                warn!("unexpected complication type {:?}", other);
                None
            }
        }
    }

    fn preview(&self, _complication_type: ComplicationType) -> ComplicationData {
        ComplicationData::short_text(self.config.preview_text.as_str(), PREVIEW_DESCRIPTION)
    }

    fn on_deactivated(&self, instance_id: InstanceId) {
        debug!("moon phase deactivated: instance {}", instance_id);
        if let Some(timer) = lock(&self.timer).take() {
            debug!("moon phase refresh stopped after {} ticks", timer.ticks());
            timer.cancel();
        }
    }
}
