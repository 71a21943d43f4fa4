//! Communicator timing and recursion limits.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use frame_messenger::CommunicatorOptions;
//!
//! let options = CommunicatorOptions::new()
//!     .with_ping_timeout(Duration::from_millis(250))
//!     .with_max_frame_depth(8);
//! options.validate()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Time a frame has to acknowledge a ping.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_millis(500);

/// Budget for a whole request, ping included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(100_000);

/// Budget for the dispose fan-out.
pub const DEFAULT_DISPOSE_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Frame hops allowed for recursive finder commands.
pub const DEFAULT_MAX_FRAME_DEPTH: u32 = 32;

// ============================================================================
// CommunicatorOptions
// ============================================================================

/// Timeouts and limits of a [`FrameCommunicator`](super::FrameCommunicator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommunicatorOptions {
    /// Time a frame has to acknowledge a ping.
    pub ping_timeout: Duration,

    /// Budget for a whole request, ping included.
    pub request_timeout: Duration,

    /// Budget for the dispose fan-out.
    pub dispose_timeout: Duration,

    /// Frame hops allowed for recursive finder commands.
    pub max_frame_depth: u32,
}

impl Default for CommunicatorOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl CommunicatorOptions {
    /// Creates options with the default limits.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ping_timeout: DEFAULT_PING_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            dispose_timeout: DEFAULT_DISPOSE_TIMEOUT,
            max_frame_depth: DEFAULT_MAX_FRAME_DEPTH,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl CommunicatorOptions {
    /// Sets the ping timeout.
    #[inline]
    #[must_use]
    pub const fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    /// Sets the overall request timeout.
    #[inline]
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the dispose fan-out timeout.
    #[inline]
    #[must_use]
    pub const fn with_dispose_timeout(mut self, timeout: Duration) -> Self {
        self.dispose_timeout = timeout;
        self
    }

    /// Sets the maximum frame depth.
    #[inline]
    #[must_use]
    pub const fn with_max_frame_depth(mut self, depth: u32) -> Self {
        self.max_frame_depth = depth;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl CommunicatorOptions {
    /// Checks that the limits are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a timeout is zero, the depth is zero,
    /// or the ping timeout does not fit inside the request timeout.
    pub fn validate(&self) -> Result<()> {
        if self.ping_timeout.is_zero() {
            return Err(Error::config("ping_timeout must be greater than zero"));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::config("request_timeout must be greater than zero"));
        }
        if self.dispose_timeout.is_zero() {
            return Err(Error::config("dispose_timeout must be greater than zero"));
        }
        if self.max_frame_depth == 0 {
            return Err(Error::config("max_frame_depth must be at least 1"));
        }
        if self.ping_timeout >= self.request_timeout {
            return Err(Error::config(format!(
                "ping_timeout ({}ms) must be shorter than request_timeout ({}ms)",
                self.ping_timeout.as_millis(),
                self.request_timeout.as_millis()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
