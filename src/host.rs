//! Lifecycle signaling back to the hosting platform.
//!
//! The synchronizer owns cache state but not page control. Promoting a
//! waiting instance and claiming open clients are host capabilities
//! exposed through [`HostHandle`].

use anyhow::Result;

/// Host-side lifecycle operations.
#[allow(async_fn_in_trait)]
pub trait HostHandle {
    /// Signal that a waiting instance should activate immediately.
    /// Any page reload that follows is the caller's responsibility.
    fn skip_waiting(&self);

    /// Make this instance authoritative for currently open pages.
    async fn claim_clients(&self) -> Result<()>;
}

/// No-op host for embedders that wire lifecycle control elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHost;

impl HostHandle for NullHost {
    fn skip_waiting(&self) {}

    async fn claim_clients(&self) -> Result<()> {
        Ok(())
    }
}
