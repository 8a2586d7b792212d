//! # Complication Host Contract
//!
//! The watch-face host drives every data source through the same lifecycle:
//!
//! ```text
//! INACTIVE --activate--> ACTIVE --request--> ACTIVE (repeatable)
//! ACTIVE --deactivate--> INACTIVE (may be activated again)
//! ```
//!
//! Data sources never render on their own. When something changes they ask
//! the host, through an [`UpdateRequester`], to re-issue render requests for
//! every active instance of that source (push triggers pull).
//!
//! [`LoopbackHost`] is a small in-process host used by the binary and tests:
//! it tracks active instances and answers update requests arriving on a
//! [`ChannelUpdateRequester`].

use crate::assets::Icon;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Host-assigned id of one complication slot on a watch face.
pub type InstanceId = i32;

/// Shapes of data a complication slot can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplicationType {
    NoData,
    Empty,
    NotConfigured,
    ShortText,
    LongText,
    RangedValue,
    MonochromaticImage,
    SmallImage,
    PhotoImage,
}

/// Stable identity of a data source, used to target update requests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ComponentName {
    pub package: String,
    pub class: String,
}

impl ComponentName {
    pub fn new(package: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            class: class.into(),
        }
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.class)
    }
}

/// One render request from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplicationRequest {
    pub instance_id: InstanceId,
    pub complication_type: ComplicationType,
}

impl ComplicationRequest {
    pub fn new(instance_id: InstanceId, complication_type: ComplicationType) -> Self {
        Self {
            instance_id,
            complication_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SmallImageType {
    Icon,
    Photo,
}

/// Rendered payload returned to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComplicationData {
    ShortText {
        text: String,
        content_description: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        monochromatic_image: Option<Icon>,
    },
    RangedValue {
        value: f32,
        min: f32,
        max: f32,
        text: String,
        content_description: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        monochromatic_image: Option<Icon>,
    },
    PhotoImage {
        image: Icon,
        content_description: String,
    },
    SmallImage {
        image: Icon,
        image_type: SmallImageType,
        content_description: String,
    },
}

impl ComplicationData {
    pub fn complication_type(&self) -> ComplicationType {
        match self {
            ComplicationData::ShortText { .. } => ComplicationType::ShortText,
            ComplicationData::RangedValue { .. } => ComplicationType::RangedValue,
            ComplicationData::PhotoImage { .. } => ComplicationType::PhotoImage,
            ComplicationData::SmallImage { .. } => ComplicationType::SmallImage,
        }
    }

    /// Image or monochromatic icon carried by this payload, if any.
    pub fn icon(&self) -> Option<&Icon> {
        match self {
            ComplicationData::ShortText {
                monochromatic_image,
                ..
            }
            | ComplicationData::RangedValue {
                monochromatic_image,
                ..
            } => monochromatic_image.as_ref(),
            ComplicationData::PhotoImage { image, .. }
            | ComplicationData::SmallImage { image, .. } => Some(image),
        }
    }

    /// Plain short text with no icon, the shape used for editor previews.
    pub fn short_text(text: impl Into<String>, content_description: impl Into<String>) -> Self {
        ComplicationData::ShortText {
            text: text.into(),
            content_description: content_description.into(),
            monochromatic_image: None,
        }
    }
}

/// Lifecycle callbacks a data source implements for the host.
///
/// Callbacks may arrive on different threads; implementations synchronise
/// internally and take `&self`.
pub trait ComplicationDataSource: Send + Sync {
    fn component(&self) -> &ComponentName;

    /// One-time set-up for a slot. Activating an already active source is a no-op.
    fn on_activated(&self, instance_id: InstanceId, complication_type: ComplicationType);

    /// Current data for a slot, or `None` when the type is not supported.
    fn on_request(&self, request: &ComplicationRequest) -> Option<ComplicationData>;

    /// Static representative data for editor surfaces.
    fn preview(&self, complication_type: ComplicationType) -> ComplicationData;

    /// Tear-down for a slot. Safe to call when nothing is active.
    fn on_deactivated(&self, instance_id: InstanceId);
}

/// Asks the host to re-render every active instance of one data source.
pub trait UpdateRequester: Send + Sync {
    fn request_update_all(&self);
}

/// Update requester that forwards requests to a [`LoopbackHost`] over a channel.
#[derive(Debug, Clone)]
pub struct ChannelUpdateRequester {
    component: ComponentName,
    tx: mpsc::UnboundedSender<ComponentName>,
}

impl ChannelUpdateRequester {
    pub fn new(component: ComponentName, tx: mpsc::UnboundedSender<ComponentName>) -> Self {
        Self { component, tx }
    }
}

impl UpdateRequester for ChannelUpdateRequester {
    fn request_update_all(&self) {
        if self.tx.send(self.component.clone()).is_err() {
            debug!("update request for {} dropped, host is gone", self.component);
        }
    }
}

/// A render produced by the host in response to an update request.
#[derive(Debug, Clone, Serialize)]
pub struct Rendered {
    pub component: ComponentName,
    pub instance_id: InstanceId,
    pub data: Option<ComplicationData>,
}

/// Minimal host: remembers which slots are active and re-renders them on demand.
pub struct LoopbackHost {
    sources: BTreeMap<ComponentName, Arc<dyn ComplicationDataSource>>,
    active: BTreeMap<ComponentName, BTreeMap<InstanceId, ComplicationType>>,
    tx: mpsc::UnboundedSender<ComponentName>,
    rx: mpsc::UnboundedReceiver<ComponentName>,
}

impl LoopbackHost {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            sources: BTreeMap::new(),
            active: BTreeMap::new(),
            tx,
            rx,
        }
    }

    /// Requester a data source should use to reach this host.
    pub fn requester(&self, component: ComponentName) -> Arc<dyn UpdateRequester> {
        Arc::new(ChannelUpdateRequester::new(component, self.tx.clone()))
    }

    pub fn register(&mut self, source: Arc<dyn ComplicationDataSource>) {
        self.sources.insert(source.component().clone(), source);
    }

    pub fn activate(
        &mut self,
        component: &ComponentName,
        instance_id: InstanceId,
        complication_type: ComplicationType,
    ) {
        let Some(source) = self.sources.get(component) else {
            warn!("activate for unknown data source {}", component);
            return;
        };
        self.active
            .entry(component.clone())
            .or_default()
            .insert(instance_id, complication_type);
        source.on_activated(instance_id, complication_type);
    }

    pub fn deactivate(&mut self, component: &ComponentName, instance_id: InstanceId) {
        if let Some(slots) = self.active.get_mut(component) {
            slots.remove(&instance_id);
            if slots.is_empty() {
                self.active.remove(component);
            }
        }
        if let Some(source) = self.sources.get(component) {
            source.on_deactivated(instance_id);
        }
    }

    pub fn active_instances(&self, component: &ComponentName) -> Vec<InstanceId> {
        self.active
            .get(component)
            .map(|slots| slots.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Render every active slot of `component` once.
    pub fn render_all(&self, component: &ComponentName) -> Vec<Rendered> {
        let (Some(source), Some(slots)) = (self.sources.get(component), self.active.get(component))
        else {
            return Vec::new();
        };
        slots
            .iter()
            .map(|(&instance_id, &complication_type)| Rendered {
                component: component.clone(),
                instance_id,
                data: source.on_request(&ComplicationRequest::new(instance_id, complication_type)),
            })
            .collect()
    }

    /// Wait for the next update request and render the slots it targets.
    ///
    /// Returns `None` once every requester has been dropped.
    pub async fn next_update(&mut self) -> Option<Vec<Rendered>> {
        let component = self.rx.recv().await?;
        Some(self.render_all(&component))
    }

    /// Handle every update request already queued, without waiting.
    pub fn drain_updates(&mut self) -> Vec<Rendered> {
        let mut out = Vec::new();
        while let Ok(component) = self.rx.try_recv() {
            out.extend(self.render_all(&component));
        }
        out
    }
}

impl Default for LoopbackHost {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        name: ComponentName,
        renders: AtomicUsize,
    }

    impl ComplicationDataSource for Counter {
        fn component(&self) -> &ComponentName {
            &self.name
        }
        fn on_activated(&self, _: InstanceId, _: ComplicationType) {}
        fn on_request(&self, request: &ComplicationRequest) -> Option<ComplicationData> {
            let n = self.renders.fetch_add(1, Ordering::SeqCst) + 1;
            (request.complication_type == ComplicationType::ShortText)
                .then(|| ComplicationData::short_text(n.to_string(), "count"))
        }
        fn preview(&self, _: ComplicationType) -> ComplicationData {
            ComplicationData::short_text("0", "count")
        }
        fn on_deactivated(&self, _: InstanceId) {}
    }

    fn counter() -> Arc<Counter> {
        Arc::new(Counter {
            name: ComponentName::new("test", "Counter"),
            renders: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_update_request_renders_active_slots() {
        let source = counter();
        let name = source.component().clone();
        let mut host = LoopbackHost::new();
        host.register(source.clone());
        host.activate(&name, 1, ComplicationType::ShortText);
        host.activate(&name, 2, ComplicationType::LongText);

        host.requester(name.clone()).request_update_all();
        let rendered = host.drain_updates();

        assert_eq!(rendered.len(), 2);
        assert!(rendered[0].data.is_some());
        assert!(rendered[1].data.is_none(), "unsupported type yields no data");
    }

    #[test]
    fn test_deactivated_slot_is_not_rendered() {
        let source = counter();
        let name = source.component().clone();
        let mut host = LoopbackHost::new();
        host.register(source.clone());
        host.activate(&name, 7, ComplicationType::ShortText);
        host.deactivate(&name, 7);
        host.deactivate(&name, 7);

        host.requester(name.clone()).request_update_all();
        assert!(host.drain_updates().is_empty());
        assert!(host.active_instances(&name).is_empty());
        assert!(!host.active.contains_key(&name));
    }

    #[test]
    fn test_complication_data_accessors() {
        let data = ComplicationData::short_text("6?", "preview");
        assert_eq!(data.complication_type(), ComplicationType::ShortText);
        assert!(data.icon().is_none());
        assert_eq!(
            ComponentName::new("com.example", "Feed").to_string(),
            "com.example/Feed"
        );
    }
}
