//! Document model.
//!
//! The communicator and finders only need a handful of read-only document
//! queries. They are expressed by [`HtmlElementUtils`]; [`Document`] is an
//! in-memory implementation.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `element` | Element and frame handles, geometry |
//! | `selector` | CSS selector parsing and generation |
//! | `document` | In-memory document |
//! | `utils` | The [`HtmlElementUtils`] trait |

// ============================================================================
// Submodules
// ============================================================================

/// In-memory document.
pub mod document;

/// Element and frame handles.
pub mod element;

/// CSS selectors.
pub mod selector;

/// Document query trait.
pub mod utils;

// ============================================================================
// Re-exports
// ============================================================================

pub use document::Document;
pub use element::{Element, ElementBuilder, FrameElement, Offset, Rect};
pub use selector::{Selector, escape_identifier};
pub use utils::HtmlElementUtils;
