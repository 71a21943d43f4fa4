//! Typed command definitions.
//!
//! Commands are string tags on the wire. Each one is modelled here as a
//! type implementing [`FrameCommand`], which ties the tag to its payload
//! and response types so call sites get compile-time payload checking
//! while the handler stays generic over [`serde_json::Value`].
//!
//! # Built-in Commands
//!
//! | Type | Tag | Message | Response |
//! |------|-----|---------|----------|
//! | [`Ping`] | `insights.ping` | any | echo |
//! | [`Dispose`] | `insights.dispose` | any | echo |
//! | [`FindElementByPath`] | `insights.findElementByPath` | [`PathMessage`] | outer HTML |
//! | [`FindElementByPosition`] | `insights.findElementByPosition` | [`PositionMessage`] | selector chain |
//! | [`ReportElementPath`] | `insights.reportElementPath` | [`ElementReport`] | none |

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// FrameCommand
// ============================================================================

/// A command with statically known payload and response types.
pub trait FrameCommand: Send + Sync + 'static {
    /// Wire tag.
    const NAME: &'static str;

    /// Request payload.
    type Message: Serialize + DeserializeOwned + Send + 'static;

    /// Response payload.
    type Response: Serialize + DeserializeOwned + Send + 'static;
}

// ============================================================================
// Lifecycle Commands
// ============================================================================

/// Liveness check sent before every real request.
#[derive(Debug, Clone, Copy)]
pub struct Ping;

impl FrameCommand for Ping {
    const NAME: &'static str = "insights.ping";
    type Message = Option<Value>;
    type Response = Option<Value>;
}

/// Recursive teardown of a frame and its descendants.
#[derive(Debug, Clone, Copy)]
pub struct Dispose;

impl FrameCommand for Dispose {
    const NAME: &'static str = "insights.dispose";
    type Message = Option<Value>;
    type Response = Option<Value>;
}

// ============================================================================
// Finder Commands
// ============================================================================

/// Resolve an element from a chain of frame-relative selectors.
#[derive(Debug, Clone, Copy)]
pub struct FindElementByPath;

impl FrameCommand for FindElementByPath {
    const NAME: &'static str = "insights.findElementByPath";
    type Message = PathMessage;
    type Response = String;
}

/// Resolve the element under a viewport point, through nested frames.
#[derive(Debug, Clone, Copy)]
pub struct FindElementByPosition;

impl FrameCommand for FindElementByPosition {
    const NAME: &'static str = "insights.findElementByPosition";
    type Message = PositionMessage;
    type Response = Vec<String>;
}

/// Bubble an element report from a frame up to the top window.
#[derive(Debug, Clone, Copy)]
pub struct ReportElementPath;

impl FrameCommand for ReportElementPath {
    const NAME: &'static str = "insights.reportElementPath";
    type Message = ElementReport;
    type Response = ();
}

// ============================================================================
// Payloads
// ============================================================================

/// Payload of [`FindElementByPath`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMessage {
    /// Selectors, outermost frame first.
    pub path: Vec<String>,

    /// Frame hops taken so far.
    #[serde(default)]
    pub depth: u32,
}

impl PathMessage {
    /// Creates a top-level path query.
    #[must_use]
    pub fn new<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            depth: 0,
        }
    }
}

/// Payload of [`FindElementByPosition`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionMessage {
    /// Viewport x coordinate in the receiving frame.
    pub x: f64,

    /// Viewport y coordinate in the receiving frame.
    pub y: f64,

    /// Frame hops taken so far.
    #[serde(default)]
    pub depth: u32,
}

impl PositionMessage {
    /// Creates a top-level position query.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, depth: 0 }
    }
}

/// Payload of [`ReportElementPath`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementReport {
    /// Selector chain, outermost frame first.
    pub target: Vec<String>,

    /// Outer HTML of the reported element.
    pub html: String,

    /// Frame hops taken so far.
    #[serde(default)]
    pub depth: u32,
}

// ============================================================================
// Tests
// ============================================================================
