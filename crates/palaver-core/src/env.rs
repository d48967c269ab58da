//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples session logic from system resources
//! (time and randomness). Production wires in the real clock and OS entropy;
//! tests wire in a manual clock and a seeded RNG, so the optimistic-echo
//! window and correlation-id generation are perfectly reproducible.
//!
//! # Invariants
//!
//! - Monotonicity: `now()` must never go backwards within one session.
//! - Determinism: given the same seed, a simulation environment's
//!   `random_bytes()` produces the same sequence.

use std::time::{Duration, Instant};

use palaver_proto::CorrelationId;

/// Abstract environment providing time, randomness and async sleeping.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current time.
    ///
    /// Subsequent calls must return values >= previous calls.
    fn now(&self) -> Instant;

    /// Sleeps for the specified duration.
    ///
    /// The only async method in the trait; session logic never blocks, so
    /// this is for driver code only.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// Production implementations use a cryptographic source; simulation
    /// implementations use a seeded RNG whose seed is logged.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a random `u128`.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_be_bytes(bytes)
    }
}

/// Mint a fresh correlation id from 128 bits of environment entropy.
///
/// Uniqueness is probabilistic; ids are never checked for collisions.
pub fn new_correlation_id<E: Environment>(env: &E) -> CorrelationId {
    CorrelationId::from_entropy(env.random_u128())
}

#[cfg(test)]
mod tests {
    use std::{
        future::Future,
        pin::Pin,
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        task::{Context, Poll},
    };

    use super::*;

    struct ImmediateFuture;

    impl Future for ImmediateFuture {
        type Output = ();

        fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
            Poll::Ready(())
        }
    }

    #[derive(Clone)]
    struct CountingEnv {
        counter: Arc<AtomicU64>,
    }

    impl Environment for CountingEnv {
        fn now(&self) -> Instant {
            Instant::now()
        }

        fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
            ImmediateFuture
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = (n as u8).wrapping_add(i as u8);
            }
        }
    }

    #[test]
    fn correlation_ids_differ_across_calls() {
        let env = CountingEnv { counter: Arc::new(AtomicU64::new(0)) };

        let a = new_correlation_id(&env);
        let b = new_correlation_id(&env);

        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn random_u128_consumes_sixteen_bytes() {
        let env = CountingEnv { counter: Arc::new(AtomicU64::new(0)) };
        let value = env.random_u128();
        // first call fills 0x01, 0x02, ... 0x10
        assert_eq!(value, u128::from_be_bytes(std::array::from_fn(|i| 1 + i as u8)));
    }
}
