//! Single-owner guard for the live session
//!
//! A `SessionHost` hands out at most one `OwnerClaim` at a time. The claim
//! lives inside the `SessionCoordinator`, so dropping the coordinator frees
//! the host for the next one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};

/// Hands out the one live session owner
#[derive(Debug, Clone, Default)]
pub struct SessionHost {
    claimed: Arc<AtomicBool>,
}

impl SessionHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim ownership; fails while another claim is alive
    pub fn claim(&self) -> Result<OwnerClaim> {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::SessionOwnerBusy)?;
        debug!("Session owner claimed");
        Ok(OwnerClaim {
            claimed: Arc::clone(&self.claimed),
        })
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}

/// Proof of session ownership, released on drop
#[derive(Debug)]
pub struct OwnerClaim {
    claimed: Arc<AtomicBool>,
}

impl Drop for OwnerClaim {
    fn drop(&mut self) {
        self.claimed.store(false, Ordering::Release);
        debug!("Session owner released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_is_rejected() {
        let host = SessionHost::new();
        let _claim = host.claim().unwrap();

        let err = host.claim().unwrap_err();
        assert!(matches!(err, Error::SessionOwnerBusy));
        assert!(host.is_claimed());
    }

    #[test]
    fn test_drop_releases_claim() {
        let host = SessionHost::new();
        let claim = host.claim().unwrap();
        drop(claim);

        assert!(!host.is_claimed());
        assert!(host.claim().is_ok());
    }

    #[test]
    fn test_hosts_are_independent() {
        let a = SessionHost::new();
        let b = SessionHost::new();
        let _claim = a.claim().unwrap();
        assert!(b.claim().is_ok());
    }
}
