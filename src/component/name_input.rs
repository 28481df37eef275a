//! The `name-input` element.
//!
//! A self-contained text field plus confirm button. Its internals live in a
//! closed shadow fragment; the only thing the host page ever observes is the
//! `name-input` event fired when the user confirms.
//!
//! # Example
//!
//! ```ignore
//! use session_bridge::component::{NameInput, NameInputDetail};
//!
//! let input = NameInput::new();
//! input.add_event_listener(|detail: NameInputDetail| {
//!     println!("player name: {}", detail.name);
//! });
//!
//! // User interaction
//! input.type_text("Alex");
//! input.click_confirm();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::event::{CustomEvent, EventTarget};

// ============================================================================
// Constants
// ============================================================================

/// Tag the element is registered under.
pub const TAG_NAME: &str = "name-input";

/// Event type fired on confirm.
pub const NAME_INPUT_EVENT: &str = "name-input";

const PLACEHOLDER: &str = "Dein Name";
const CONFIRM_LABEL: &str = "Mitspielen";

// ============================================================================
// NameInputDetail
// ============================================================================

/// Payload of the `name-input` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameInputDetail {
    /// Field contents at confirm time, untrimmed and possibly empty.
    pub name: String,
}

// ============================================================================
// Shadow Fragment
// ============================================================================

/// Single-line text field.
struct TextField {
    target: EventTarget,
    value: Mutex<String>,
}

/// Closed shadow tree of the element.
///
/// The shadow root is reachable only through its children's parent links.
struct ShadowFragment {
    field: Arc<TextField>,
    confirm: EventTarget,
}

impl ShadowFragment {
    /// Builds the fragment under `host` and wires confirm handling.
    fn render(host: &EventTarget) -> Self {
        let root = EventTarget::new("#shadow-root");
        host.attach_shadow(&root);

        let field = Arc::new(TextField {
            target: EventTarget::new(format!("input[placeholder=\"{PLACEHOLDER}\"]")),
            value: Mutex::new(String::new()),
        });
        root.append_child(&field.target);

        let confirm = EventTarget::new(format!("button[{CONFIRM_LABEL}]"));
        root.append_child(&confirm);

        let live_field = Arc::clone(&field);
        let dispatch_on = host.clone();
        confirm.add_event_listener("click", move |_| {
            let name = live_field.value.lock().clone();
            fire_name_input(&dispatch_on, name);
        });

        Self { field, confirm }
    }
}

/// Dispatches the public event on the host.
fn fire_name_input(host: &EventTarget, name: String) {
    let detail = match serde_json::to_value(NameInputDetail { name }) {
        Ok(detail) => detail,
        Err(e) => {
            warn!(error = %e, "Failed to serialize name-input detail");
            return;
        }
    };

    let event = CustomEvent::new(NAME_INPUT_EVENT, detail)
        .with_bubbles(true)
        .with_composed(true);
    let invoked = host.dispatch_event(&event);
    debug!(invoked, "name-input dispatched");
}

// ============================================================================
// NameInput
// ============================================================================

/// The `name-input` element.
///
/// Holds no externally observable state: the field value can only be
/// learned through the `name-input` event.
pub struct NameInput {
    host: EventTarget,
    shadow: ShadowFragment,
}

impl fmt::Debug for NameInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameInput")
            .field("tag", &TAG_NAME)
            .finish_non_exhaustive()
    }
}

impl Default for NameInput {
    fn default() -> Self {
        Self::new()
    }
}

impl NameInput {
    /// Creates the element and renders its shadow fragment once.
    #[must_use]
    pub fn new() -> Self {
        let host = EventTarget::new(TAG_NAME);
        let shadow = ShadowFragment::render(&host);
        Self { host, shadow }
    }

    /// Tag the element is registered under.
    #[inline]
    #[must_use]
    pub fn tag_name(&self) -> &'static str {
        TAG_NAME
    }

    /// Host node, for attaching to a parent or adding other listeners.
    #[inline]
    #[must_use]
    pub fn host(&self) -> &EventTarget {
        &self.host
    }

    /// Subscribes to confirmed names.
    pub fn add_event_listener<F>(&self, listener: F)
    where
        F: Fn(NameInputDetail) + Send + Sync + 'static,
    {
        self.host.add_event_listener(NAME_INPUT_EVENT, move |event| {
            match event.detail_as::<NameInputDetail>() {
                Ok(detail) => listener(detail),
                Err(e) => warn!(error = %e, "Unexpected name-input detail"),
            }
        });
    }

    /// The shadow root is closed.
    #[inline]
    #[must_use]
    pub fn shadow_root(&self) -> Option<&EventTarget> {
        None
    }

    /// Light-DOM serialization; shadow content is never included.
    #[must_use]
    pub fn outer_html(&self) -> String {
        format!("<{TAG_NAME}></{TAG_NAME}>")
    }
}

// ============================================================================
// NameInput - User Interaction
// ============================================================================

impl NameInput {
    /// Types `text` into the field, appending to its contents.
    pub fn type_text(&self, text: &str) {
        self.shadow.field.value.lock().push_str(text);
        self.shadow
            .field
            .target
            .dispatch_event(&CustomEvent::new("input", Value::Null));
    }

    /// Clears the field.
    pub fn clear(&self) {
        self.shadow.field.value.lock().clear();
    }

    /// Clicks the confirm button.
    pub fn click_confirm(&self) {
        self.shadow
            .confirm
            .dispatch_event(&CustomEvent::new("click", Value::Null));
    }
}

// ============================================================================
// Tests
// ============================================================================
