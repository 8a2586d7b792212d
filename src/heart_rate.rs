//! # Heart-Rate Complication
//!
//! Bridges a push-based sensor stream to the host's pull-based render
//! requests. The sensor listener writes every new sample into a shared
//! [`HeartRateCache`] and asks the host to re-render; render requests read
//! whatever value is cached at that moment.
//!
//! ## Views
//! - **Short text**: the cached bpm as text, with a heart icon that flips
//!   between red outline and plain outline on every render
//! - **Ranged value**: the cached bpm on a gauge (50–130 by default), with a
//!   heart icon that flips between filled and outline
//!
//! Any other requested type yields no data.

use crate::assets::{AssetId, AssetLookup};
use crate::config::HeartRateConfig;
use crate::host::{
    ComplicationData, ComplicationDataSource, ComplicationRequest, ComplicationType,
    ComponentName, InstanceId, UpdateRequester,
};
use crate::lock;
use crate::sensor::{Availability, DataPoint, DataType, MeasureCallback, MeasureClient};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub const COMPONENT_PACKAGE: &str = "com.ofd.heartbeat";
pub const COMPONENT_CLASS: &str = "com.ofd.heartbeat.HeartRateProviderService";

const SHORT_TEXT_DESCRIPTION: &str = "Short Text version of Number.";
const RANGED_DESCRIPTION: &str = "Heart Rate";

/// Latest heart rate plus the render counters that drive icon alternation.
///
/// One writer (the sensor listener) and any number of readers (render
/// requests); the bpm is a plain atomic, so last write wins without locking.
/// Each slot keeps its own render count so that two slots rendered on the
/// same update both flip their icon.
#[derive(Debug, Default)]
pub struct HeartRateCache {
    bpm: AtomicI32,
    renders: AtomicU64,
    per_instance: Mutex<BTreeMap<InstanceId, u64>>,
}

impl HeartRateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> i32 {
        self.bpm.load(Ordering::Acquire)
    }

    pub fn store(&self, bpm: i32) {
        self.bpm.store(bpm, Ordering::Release);
    }

    /// Bump the render count of `instance_id` and report whether it is now even.
    pub fn next_pulse(&self, instance_id: InstanceId) -> bool {
        self.renders.fetch_add(1, Ordering::AcqRel);
        let mut counts = lock(&self.per_instance);
        let count = counts.entry(instance_id).or_insert(0);
        *count = count.wrapping_add(1);
        *count % 2 == 0
    }

    /// Drop the render count of a slot that went away.
    pub fn forget(&self, instance_id: InstanceId) {
        lock(&self.per_instance).remove(&instance_id);
    }

    /// Renders across all slots.
    pub fn render_count(&self) -> u64 {
        self.renders.load(Ordering::Acquire)
    }
}

/// Sensor-side half of the feed: cache the sample, then ask for a re-render.
struct HeartRateListener {
    cache: Arc<HeartRateCache>,
    updater: Arc<dyn UpdateRequester>,
}

impl MeasureCallback for HeartRateListener {
    fn on_availability_changed(&self, data_type: DataType, availability: Availability) {
        debug!("{:?} availability: {:?}", data_type, availability);
    }

    fn on_data_received(&self, data_type: DataType, points: &[DataPoint]) {
        if data_type != DataType::HeartRateBpm {
            return;
        }
        let Some(latest) = points.last() else {
            return;
        };
        self.cache.store(latest.value as i32);
        self.updater.request_update_all();
    }
}

/// Live subscription held while the complication is active.
struct Subscription {
    callback: Arc<dyn MeasureCallback>,
}

pub struct HeartRateFeed {
    component: ComponentName,
    cache: Arc<HeartRateCache>,
    client: Arc<dyn MeasureClient>,
    updater: Arc<dyn UpdateRequester>,
    assets: Arc<dyn AssetLookup>,
    config: HeartRateConfig,
    subscription: Mutex<Option<Subscription>>,
}

impl HeartRateFeed {
    pub fn component_name() -> ComponentName {
        ComponentName::new(COMPONENT_PACKAGE, COMPONENT_CLASS)
    }

    pub fn new(
        cache: Arc<HeartRateCache>,
        client: Arc<dyn MeasureClient>,
        updater: Arc<dyn UpdateRequester>,
        assets: Arc<dyn AssetLookup>,
        config: HeartRateConfig,
    ) -> Self {
        Self {
            component: Self::component_name(),
            cache,
            client,
            updater,
            assets,
            config,
            subscription: Mutex::new(None),
        }
    }

    pub fn cache(&self) -> &Arc<HeartRateCache> {
        &self.cache
    }

    pub fn is_subscribed(&self) -> bool {
        lock(&self.subscription).is_some()
    }

    fn short_text(&self, instance_id: InstanceId, bpm: i32) -> ComplicationData {
        let icon = if self.cache.next_pulse(instance_id) {
            AssetId::HeartOutlineRed
        } else {
            AssetId::HeartOutline
        };
        ComplicationData::ShortText {
            text: bpm.to_string(),
            content_description: SHORT_TEXT_DESCRIPTION.to_string(),
            monochromatic_image: Some(self.assets.icon(icon)),
        }
    }

    fn ranged_value(&self, instance_id: InstanceId, bpm: i32) -> ComplicationData {
        let icon = if self.cache.next_pulse(instance_id) {
            AssetId::HeartFilled
        } else {
            AssetId::HeartOutline
        };
        ComplicationData::RangedValue {
            value: bpm as f32,
            min: self.config.ranged_min,
            max: self.config.ranged_max,
            text: bpm.to_string(),
            content_description: RANGED_DESCRIPTION.to_string(),
            monochromatic_image: Some(self.assets.icon(icon)),
        }
    }
}

impl ComplicationDataSource for HeartRateFeed {
    fn component(&self) -> &ComponentName {
        &self.component
    }

    fn on_activated(&self, instance_id: InstanceId, complication_type: ComplicationType) {
        debug!(
            "heart rate activated: instance {} as {:?}",
            instance_id, complication_type
        );
        let mut subscription = lock(&self.subscription);
        if subscription.is_some() {
            return;
        }

        let callback: Arc<dyn MeasureCallback> = Arc::new(HeartRateListener {
            cache: Arc::clone(&self.cache),
            updater: Arc::clone(&self.updater),
        });
        match self
            .client
            .register(DataType::HeartRateBpm, Arc::clone(&callback))
        {
            Ok(()) => {
                info!("heart rate callback registered");
                *subscription = Some(Subscription { callback });
            }
            // Stays unsubscribed until the next activation.
            Err(e) => warn!("heart rate subscription failed: {}", e),
        }
    }

    fn on_request(&self, request: &ComplicationRequest) -> Option<ComplicationData> {
        let bpm = self.cache.latest();
        match request.complication_type {
            ComplicationType::ShortText => Some(self.short_text(request.instance_id, bpm)),
            ComplicationType::RangedValue => Some(self.ranged_value(request.instance_id, bpm)),
            other => {
                warn!("unexpected complication type {:?}", other);
                None
            }
        }
    }

    fn preview(&self, _complication_type: ComplicationType) -> ComplicationData {
        ComplicationData::short_text(self.config.preview_text.as_str(), SHORT_TEXT_DESCRIPTION)
    }

    fn on_deactivated(&self, instance_id: InstanceId) {
        debug!("heart rate deactivated: instance {}", instance_id);
        self.cache.forget(instance_id);
        let Some(subscription) = lock(&self.subscription).take() else {
            return;
        };
        match self
            .client
            .unregister(DataType::HeartRateBpm, &subscription.callback)
        {
            Ok(()) => info!("heart rate callback unregistered"),
            Err(e) => warn!("heart rate unsubscribe failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::BuiltinAssets;
    use crate::sensor::SimulatedHeartSensor;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingUpdater(AtomicUsize);

    impl UpdateRequester for CountingUpdater {
        fn request_update_all(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn feed(sensor: Arc<SimulatedHeartSensor>) -> (HeartRateFeed, Arc<CountingUpdater>) {
        let updater = Arc::new(CountingUpdater::default());
        let feed = HeartRateFeed::new(
            Arc::new(HeartRateCache::new()),
            sensor,
            updater.clone(),
            Arc::new(BuiltinAssets::default()),
            HeartRateConfig::default(),
        );
        (feed, updater)
    }

    fn short_text(id: InstanceId) -> ComplicationRequest {
        ComplicationRequest::new(id, ComplicationType::ShortText)
    }

    #[test]
    fn test_render_before_any_sample_shows_zero() {
        let (feed, _) = feed(Arc::new(SimulatedHeartSensor::manual()));
        match feed.on_request(&short_text(1)) {
            Some(ComplicationData::ShortText { text, .. }) => assert_eq!(text, "0"),
            other => panic!("expected short text, got {other:?}"),
        }
    }

    #[test]
    fn test_sample_updates_cache_and_requests_render() {
        let sensor = Arc::new(SimulatedHeartSensor::manual());
        let (feed, updater) = feed(sensor.clone());
        feed.on_activated(1, ComplicationType::ShortText);

        sensor.deliver(&[DataPoint::new(64.0, 0), DataPoint::new(78.6, 1)]);

        assert_eq!(feed.cache().latest(), 78);
        assert_eq!(updater.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_delivery_is_ignored() {
        let sensor = Arc::new(SimulatedHeartSensor::manual());
        let (feed, updater) = feed(sensor.clone());
        feed.on_activated(1, ComplicationType::ShortText);
        sensor.deliver(&[]);
        assert_eq!(feed.cache().latest(), 0);
        assert_eq!(updater.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_short_text_icon_alternates() {
        let (feed, _) = feed(Arc::new(SimulatedHeartSensor::manual()));
        let icons: Vec<AssetId> = (0..4)
            .filter_map(|_| feed.on_request(&short_text(1)))
            .filter_map(|data| data.icon().map(|i| i.asset))
            .collect();
        assert_eq!(
            icons,
            vec![
                AssetId::HeartOutline,
                AssetId::HeartOutlineRed,
                AssetId::HeartOutline,
                AssetId::HeartOutlineRed,
            ]
        );
    }

    #[test]
    fn test_icon_parity_is_kept_per_slot() {
        let (feed, _) = feed(Arc::new(SimulatedHeartSensor::manual()));
        let ranged = ComplicationRequest::new(2, ComplicationType::RangedValue);
        let mut short_icons = Vec::new();
        let mut ranged_icons = Vec::new();
        for _ in 0..4 {
            let icon_of = |data: Option<ComplicationData>| data.and_then(|d| d.icon().map(|i| i.asset));
            short_icons.extend(icon_of(feed.on_request(&short_text(1))));
            ranged_icons.extend(icon_of(feed.on_request(&ranged)));
        }
        assert_eq!(
            short_icons,
            vec![
                AssetId::HeartOutline,
                AssetId::HeartOutlineRed,
                AssetId::HeartOutline,
                AssetId::HeartOutlineRed,
            ]
        );
        assert_eq!(
            ranged_icons,
            vec![
                AssetId::HeartOutline,
                AssetId::HeartFilled,
                AssetId::HeartOutline,
                AssetId::HeartFilled,
            ]
        );
        assert_eq!(feed.cache().render_count(), 8);
    }

    #[test]
    fn test_deactivated_slot_restarts_parity() {
        let (feed, _) = feed(Arc::new(SimulatedHeartSensor::manual()));
        let first_icon = |feed: &HeartRateFeed| {
            feed.on_request(&short_text(1))
                .and_then(|d| d.icon().map(|i| i.asset))
        };
        assert_eq!(first_icon(&feed), Some(AssetId::HeartOutline));
        feed.on_deactivated(1);
        assert_eq!(first_icon(&feed), Some(AssetId::HeartOutline));
    }

    #[test]
    fn test_ranged_value_uses_gauge_bounds() {
        let sensor = Arc::new(SimulatedHeartSensor::manual());
        let (feed, _) = feed(sensor.clone());
        feed.on_activated(3, ComplicationType::RangedValue);
        sensor.deliver(&[DataPoint::new(92.0, 0)]);

        let request = ComplicationRequest::new(3, ComplicationType::RangedValue);
        let first = feed.on_request(&request);
        let second = feed.on_request(&request);
        match first {
            Some(ComplicationData::RangedValue {
                value,
                min,
                max,
                text,
                monochromatic_image,
                ..
            }) => {
                assert_eq!(value, 92.0);
                assert_eq!((min, max), (50.0, 130.0));
                assert_eq!(text, "92");
                assert_eq!(monochromatic_image.map(|i| i.asset), Some(AssetId::HeartOutline));
            }
            other => panic!("expected ranged value, got {other:?}"),
        }
        assert_eq!(
            second.and_then(|d| d.icon().map(|i| i.asset)),
            Some(AssetId::HeartFilled)
        );
    }

    #[test]
    fn test_unsupported_type_yields_no_data() {
        let (feed, _) = feed(Arc::new(SimulatedHeartSensor::manual()));
        for ty in [
            ComplicationType::LongText,
            ComplicationType::PhotoImage,
            ComplicationType::SmallImage,
            ComplicationType::MonochromaticImage,
        ] {
            assert!(feed.on_request(&ComplicationRequest::new(1, ty)).is_none());
        }
    }

    #[test]
    fn test_single_subscription_and_idempotent_deactivate() {
        let sensor = Arc::new(SimulatedHeartSensor::manual());
        let (feed, _) = feed(sensor.clone());

        feed.on_deactivated(1);
        assert!(!feed.is_subscribed());

        feed.on_activated(1, ComplicationType::ShortText);
        feed.on_activated(2, ComplicationType::RangedValue);
        assert_eq!(sensor.subscriber_count(), 1);

        feed.on_deactivated(1);
        feed.on_deactivated(2);
        assert_eq!(sensor.subscriber_count(), 0);
        assert!(!feed.is_subscribed());

        feed.on_activated(1, ComplicationType::ShortText);
        assert_eq!(sensor.subscriber_count(), 1);
    }

    #[test]
    fn test_failed_subscription_is_silent() {
        let (feed, updater) = feed(Arc::new(SimulatedHeartSensor::unavailable()));
        feed.on_activated(1, ComplicationType::ShortText);
        assert!(!feed.is_subscribed());
        assert!(feed.on_request(&short_text(1)).is_some());
        assert_eq!(updater.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_preview_ignores_live_value() {
        let sensor = Arc::new(SimulatedHeartSensor::manual());
        let (feed, _) = feed(sensor.clone());
        feed.on_activated(1, ComplicationType::ShortText);
        sensor.deliver(&[DataPoint::new(88.0, 0)]);

        let preview = feed.preview(ComplicationType::ShortText);
        assert_eq!(
            preview,
            ComplicationData::short_text("6?", "Short Text version of Number.")
        );
    }
}
