//! Frame-aware element finders.
//!
//! Each finder subscribes to one command and answers it through the
//! [`FrameCommunicator`](crate::communicator::FrameCommunicator) of its
//! context, recursing into child frames (or up to the parent) as needed.
//!
//! | Finder | Command | Direction |
//! |--------|---------|-----------|
//! | [`ElementFinderByPath`] | `insights.findElementByPath` | down |
//! | [`ElementFinderByPosition`] | `insights.findElementByPosition` | down |
//! | [`FrameFinder`] | `insights.reportElementPath` | up |
//!
//! Every hop increments a `depth` counter. A message deeper than
//! `max_frame_depth` is rejected with [`Error::FrameDepthExceeded`].

use crate::error::{Error, Result};

// ============================================================================
// Submodules
// ============================================================================

/// Upward report relay.
pub mod frame;

/// Lookup by selector path.
pub mod path;

/// Lookup by viewport point.
pub mod position;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::{FrameFinder, ReportListener};
pub use path::ElementFinderByPath;
pub use position::ElementFinderByPosition;

// ============================================================================
// Helpers
// ============================================================================

#[inline]
fn check_depth(depth: u32, max: u32) -> Result<()> {
    if depth > max {
        Err(Error::frame_depth_exceeded(depth, max))
    } else {
        Ok(())
    }
}

/// Depth of the next hop. A counter that cannot grow is over any bound.
#[inline]
fn next_depth(depth: u32, max: u32) -> Result<u32> {
    let next = depth
        .checked_add(1)
        .ok_or_else(|| Error::frame_depth_exceeded(depth, max))?;
    check_depth(next, max)?;
    Ok(next)
}

// ============================================================================
// Tests
// ============================================================================
