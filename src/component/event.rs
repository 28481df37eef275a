//! Minimal DOM-style event dispatch.
//!
//! Targets form a tree through [`EventTarget::append_child`]. A shadow root
//! is attached to its host with a boundary link: events bubbling out of a
//! shadow tree only cross into the host when they are `composed`.
//!
//! # Example
//!
//! ```ignore
//! use session_bridge::component::{CustomEvent, EventTarget};
//!
//! let body = EventTarget::new("body");
//! let child = EventTarget::new("div");
//! body.append_child(&child);
//!
//! body.add_event_listener("ping", |event| println!("{}", event.event_type()));
//! child.dispatch_event(&CustomEvent::new("ping", serde_json::Value::Null));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

use crate::error::Result;

// ============================================================================
// CustomEvent
// ============================================================================

/// Event with a JSON detail payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomEvent {
    event_type: String,
    detail: Value,
    bubbles: bool,
    composed: bool,
}

impl CustomEvent {
    /// Creates a bubbling, non-composed event.
    #[must_use]
    pub fn new(event_type: impl Into<String>, detail: Value) -> Self {
        Self {
            event_type: event_type.into(),
            detail,
            bubbles: true,
            composed: false,
        }
    }

    /// Sets whether the event bubbles to ancestors.
    #[inline]
    #[must_use]
    pub fn with_bubbles(mut self, bubbles: bool) -> Self {
        self.bubbles = bubbles;
        self
    }

    /// Sets whether the event crosses shadow boundaries.
    #[inline]
    #[must_use]
    pub fn with_composed(mut self, composed: bool) -> Self {
        self.composed = composed;
        self
    }

    /// Event type name.
    #[inline]
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Raw detail payload.
    #[inline]
    #[must_use]
    pub fn detail(&self) -> &Value {
        &self.detail
    }

    /// Deserializes the detail payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the detail has a different shape.
    pub fn detail_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.detail)?)
    }

    /// Returns `true` if the event bubbles.
    #[inline]
    #[must_use]
    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    /// Returns `true` if the event crosses shadow boundaries.
    #[inline]
    #[must_use]
    pub fn composed(&self) -> bool {
        self.composed
    }
}

// ============================================================================
// EventTarget
// ============================================================================

/// Event listener callback.
pub type Listener = Arc<dyn Fn(&CustomEvent) + Send + Sync>;

/// Link from a target to the next one up the propagation path.
///
/// Children keep their ancestors alive; ancestors never own children.
enum ParentLink {
    /// Regular tree parent.
    Node(Arc<TargetInner>),
    /// Shadow root to its host; crossed only by composed events.
    ShadowHost(Arc<TargetInner>),
}

struct TargetInner {
    name: String,
    listeners: Mutex<FxHashMap<String, Vec<Listener>>>,
    parent: Mutex<Option<ParentLink>>,
}

/// A node that listeners can be attached to.
#[derive(Clone)]
pub struct EventTarget {
    inner: Arc<TargetInner>,
}

impl fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTarget")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}

impl EventTarget {
    /// Creates a detached target.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TargetInner {
                name: name.into(),
                listeners: Mutex::new(FxHashMap::default()),
                parent: Mutex::new(None),
            }),
        }
    }

    /// Node name, e.g. a tag name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Makes `child` propagate events to `self`.
    pub fn append_child(&self, child: &EventTarget) {
        *child.inner.parent.lock() = Some(ParentLink::Node(Arc::clone(&self.inner)));
    }

    /// Attaches `shadow_root` to `self` as its host.
    pub(crate) fn attach_shadow(&self, shadow_root: &EventTarget) {
        *shadow_root.inner.parent.lock() =
            Some(ParentLink::ShadowHost(Arc::clone(&self.inner)));
    }

    /// Registers a listener for `event_type`.
    pub fn add_event_listener<F>(&self, event_type: impl Into<String>, listener: F)
    where
        F: Fn(&CustomEvent) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .lock()
            .entry(event_type.into())
            .or_default()
            .push(Arc::new(listener));
    }

    /// Dispatches `event` at this target and along its propagation path.
    ///
    /// Returns the number of listeners invoked.
    pub fn dispatch_event(&self, event: &CustomEvent) -> usize {
        let mut invoked = self.invoke(event);
        if !event.bubbles() {
            return invoked;
        }

        let mut current = Arc::clone(&self.inner);
        loop {
            let next = match &*current.parent.lock() {
                Some(ParentLink::Node(parent)) => Some(Arc::clone(parent)),
                Some(ParentLink::ShadowHost(host)) if event.composed() => Some(Arc::clone(host)),
                Some(ParentLink::ShadowHost(_)) | None => None,
            };
            let Some(next) = next else { break };

            invoked += EventTarget {
                inner: Arc::clone(&next),
            }
            .invoke(event);
            current = next;
        }

        trace!(event = event.event_type(), target = %self.inner.name, invoked, "Event dispatched");
        invoked
    }

    /// Runs this target's listeners for `event`.
    fn invoke(&self, event: &CustomEvent) -> usize {
        // Snapshot so listeners may register more listeners.
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .get(event.event_type())
            .cloned()
            .unwrap_or_default();

        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }
}

// ============================================================================
// Tests
// ============================================================================
