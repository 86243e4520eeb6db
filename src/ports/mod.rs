//! Ephemeral port allocation
//!
//! Hands out locally-available ports by bind-then-release probing. The
//! allocation is best-effort, not a reservation: the harness performs its
//! own bind and may lose the port to another process in between.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::debug;

/// First candidate port.
const PORT_BASE: u32 = 45032;
/// Candidates wrap back to the base before the upper port bound.
const PORT_SPAN: u32 = 65535 - PORT_BASE;

/// Allocator with a monotonically increasing candidate counter shared by
/// every concurrent run. Distinct allocations probe distinct candidates, so
/// two unreleased allocations never receive the same port (until the
/// counter wraps through the whole span).
#[derive(Clone, Debug, Default)]
pub struct PortAllocator {
    next: Arc<AtomicU32>,
}

impl PortAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a locally-bindable port.
    ///
    /// Bind failures advance the candidate and retry; in practice the loop
    /// is bounded by the OS port range.
    pub async fn allocate(&self) -> u16 {
        loop {
            let candidate = self.next_candidate();
            match TcpListener::bind(("127.0.0.1", candidate)).await {
                Ok(listener) => {
                    drop(listener);
                    return candidate;
                }
                Err(e) => {
                    debug!("port {} unavailable: {}", candidate, e);
                }
            }
        }
    }

    fn next_candidate(&self) -> u16 {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        (PORT_BASE + n % PORT_SPAN) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_are_monotonic() {
        let allocator = PortAllocator::new();
        assert_eq!(allocator.next_candidate(), 45032);
        assert_eq!(allocator.next_candidate(), 45033);
        assert_eq!(allocator.next_candidate(), 45034);
    }

    #[test]
    fn test_candidates_shared_between_clones() {
        let allocator = PortAllocator::new();
        let other = allocator.clone();
        let a = allocator.next_candidate();
        let b = other.next_candidate();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_allocate_returns_bindable_port() {
        let allocator = PortAllocator::new();
        let port = allocator.allocate().await;
        assert!(port >= 45032);

        // Released by the allocator, so a fresh bind must succeed.
        let listener = TcpListener::bind(("127.0.0.1", port)).await;
        assert!(listener.is_ok());
    }

    #[tokio::test]
    async fn test_allocate_skips_occupied_port() {
        let allocator = PortAllocator::new();
        let first = allocator.allocate().await;

        // Hold the first port and allocate again.
        let _held = TcpListener::bind(("127.0.0.1", first)).await.unwrap();
        let second = allocator.allocate().await;
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_allocations_are_distinct() {
        let allocator = PortAllocator::new();
        let mut ports = Vec::new();
        for _ in 0..8 {
            ports.push(allocator.allocate().await);
        }
        let mut deduped = ports.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), ports.len());
    }
}
