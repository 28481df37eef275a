//! Page-side UI components.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`NameInput`] | Encapsulated text field that fires `name-input` on confirm |
//! | [`EventTarget`] | Listener registry with bubbling and shadow boundaries |
//! | [`CustomEvent`] | Event with a JSON detail payload |

// ============================================================================
// Submodules
// ============================================================================

/// Event dispatch.
pub mod event;

/// The `name-input` element.
pub mod name_input;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{CustomEvent, EventTarget, Listener};
pub use name_input::{NAME_INPUT_EVENT, NameInput, NameInputDetail, TAG_NAME};
