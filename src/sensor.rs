//! # Measurement Subscription
//!
//! Event-subscription seam between a live sensor and the heart-rate feed.
//! A [`MeasureClient`] accepts one [`MeasureCallback`] per data type and calls
//! it asynchronously, on whatever thread the sensor stack uses, whenever
//! availability changes or new data points arrive.
//!
//! [`SimulatedHeartSensor`] stands in for the platform sensor off-device. It can
//! be driven by hand (`deliver`) or stream a synthetic heart-rate wave from a
//! tokio task.

use crate::lock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Measurement streams a client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    HeartRateBpm,
}

/// Sensor availability as reported to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Unknown,
    Acquiring,
    Available,
    Unavailable,
    UnavailableDeviceOffBody,
}

/// One measured value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DataPoint {
    pub value: f64,
    /// Unix milliseconds at which the value was measured.
    pub timestamp_ms: i64,
}

impl DataPoint {
    pub fn new(value: f64, timestamp_ms: i64) -> Self {
        Self {
            value,
            timestamp_ms,
        }
    }

    /// Stamped with the current wall-clock time.
    pub fn now(value: f64) -> Self {
        Self::new(value, chrono::Utc::now().timestamp_millis())
    }
}

/// Errors from subscribing to or unsubscribing from a sensor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    #[error("sensor does not support {0:?}")]
    Unsupported(DataType),

    #[error("sensor unavailable")]
    Unavailable,

    #[error("a callback for {0:?} is already registered")]
    AlreadyRegistered(DataType),

    #[error("no matching callback registered for {0:?}")]
    NotRegistered(DataType),
}

/// Receiver of sensor events.
pub trait MeasureCallback: Send + Sync {
    fn on_availability_changed(&self, data_type: DataType, availability: Availability);

    /// `points` is in measurement order, oldest first.
    fn on_data_received(&self, data_type: DataType, points: &[DataPoint]);
}

/// Subscription API of the sensor stack.
pub trait MeasureClient: Send + Sync {
    fn register(
        &self,
        data_type: DataType,
        callback: Arc<dyn MeasureCallback>,
    ) -> Result<(), SensorError>;

    /// Removes `callback` (matched by identity).
    fn unregister(
        &self,
        data_type: DataType,
        callback: &Arc<dyn MeasureCallback>,
    ) -> Result<(), SensorError>;
}

/// Settings for the synthetic heart-rate wave.
#[derive(Debug, Clone, Copy)]
pub struct StreamSettings {
    pub baseline_bpm: f64,
    pub sample_interval: Duration,
}

#[derive(Default)]
struct Subscribers {
    callbacks: Mutex<Vec<Arc<dyn MeasureCallback>>>,
    samples: AtomicU64,
}

impl Subscribers {
    fn snapshot(&self) -> Vec<Arc<dyn MeasureCallback>> {
        lock(&self.callbacks).clone()
    }

    fn deliver(&self, points: &[DataPoint]) {
        self.samples.fetch_add(points.len() as u64, Ordering::Relaxed);
        // Call out without holding the lock; callbacks may re-enter the client.
        for callback in self.snapshot() {
            callback.on_data_received(DataType::HeartRateBpm, points);
        }
    }
}

/// In-process heart-rate sensor.
pub struct SimulatedHeartSensor {
    subscribers: Arc<Subscribers>,
    stream: Option<(Handle, StreamSettings)>,
    task: Mutex<Option<JoinHandle<()>>>,
    available: bool,
}

impl SimulatedHeartSensor {
    fn build(stream: Option<(Handle, StreamSettings)>, available: bool) -> Self {
        Self {
            subscribers: Arc::default(),
            stream,
            task: Mutex::new(None),
            available,
        }
    }

    /// Sensor that only emits what is passed to [`deliver`](Self::deliver).
    pub fn manual() -> Self {
        Self::build(None, true)
    }

    /// Sensor that streams a synthetic wave on `runtime` while anyone is subscribed.
    pub fn streaming(runtime: Handle, settings: StreamSettings) -> Self {
        Self::build(Some((runtime, settings)), true)
    }

    /// Sensor whose registrations always fail.
    pub fn unavailable() -> Self {
        Self::build(None, false)
    }

    /// Push `points` to every subscriber.
    pub fn deliver(&self, points: &[DataPoint]) {
        self.subscribers.deliver(points);
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers.callbacks).len()
    }

    /// Total data points delivered so far.
    pub fn samples_delivered(&self) -> u64 {
        self.subscribers.samples.load(Ordering::Relaxed)
    }

    fn start_stream(&self) {
        let Some((runtime, settings)) = &self.stream else {
            return;
        };
        let mut task = lock(&self.task);
        if task.is_some() {
            return;
        }
        let subscribers = Arc::clone(&self.subscribers);
        let settings = *settings;
        info!(
            "simulated heart sensor streaming every {:?} around {} bpm",
            settings.sample_interval, settings.baseline_bpm
        );
        *task = Some(runtime.spawn(async move {
            let period = settings.sample_interval.max(Duration::from_millis(1));
            let mut interval = tokio::time::interval(period);
            let mut step: u64 = 0;
            loop {
                interval.tick().await;
                let bpm = synthetic_bpm(settings.baseline_bpm, step);
                subscribers.deliver(&[DataPoint::now(bpm)]);
                step += 1;
            }
        }));
    }

    fn stop_stream(&self) {
        if let Some(task) = lock(&self.task).take() {
            task.abort();
            debug!("simulated heart sensor stream stopped");
        }
    }
}

impl Drop for SimulatedHeartSensor {
    fn drop(&mut self) {
        self.stop_stream();
    }
}

/// Slow breathing-like swing of ±8 bpm with a one-beat flutter.
pub fn synthetic_bpm(baseline: f64, step: u64) -> f64 {
    let swing = (step as f64 / 20.0 * std::f64::consts::TAU).sin() * 8.0;
    let flutter = if step % 3 == 0 { 1.0 } else { 0.0 };
    (baseline + swing + flutter).round()
}

impl MeasureClient for SimulatedHeartSensor {
    fn register(
        &self,
        data_type: DataType,
        callback: Arc<dyn MeasureCallback>,
    ) -> Result<(), SensorError> {
        if !self.available {
            return Err(SensorError::Unavailable);
        }
        {
            let mut callbacks = lock(&self.subscribers.callbacks);
            if callbacks.iter().any(|c| Arc::ptr_eq(c, &callback)) {
                return Err(SensorError::AlreadyRegistered(data_type));
            }
            callbacks.push(Arc::clone(&callback));
        }
        callback.on_availability_changed(data_type, Availability::Acquiring);
        self.start_stream();
        Ok(())
    }

    fn unregister(
        &self,
        data_type: DataType,
        callback: &Arc<dyn MeasureCallback>,
    ) -> Result<(), SensorError> {
        let now_empty = {
            let mut callbacks = lock(&self.subscribers.callbacks);
            let before = callbacks.len();
            callbacks.retain(|c| !Arc::ptr_eq(c, callback));
            if callbacks.len() == before {
                return Err(SensorError::NotRegistered(data_type));
            }
            callbacks.is_empty()
        };
        if now_empty {
            self.stop_stream();
        }
        Ok(())
    }
}
