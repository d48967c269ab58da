//! Production environment using the system clock and OS entropy.

use std::time::{Duration, Instant};

use palaver_core::Environment;

/// Production environment.
///
/// Correlation ids are minted from this entropy, so `random_bytes` prefers
/// the OS cryptographic source and falls back to a time-seeded stream if
/// that source fails - ids must stay collision-resistant even then.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        if getrandom::fill(buffer).is_ok() {
            return;
        }

        tracing::error!("getrandom failed, falling back to time-seeded stream");
        let mut state = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0x9e37_79b9_7f4a_7c15, |since_epoch| since_epoch.as_nanos() as u64);
        for byte in buffer.iter_mut() {
            *byte = (splitmix64(&mut state) & 0xff) as u8;
        }
    }
}

/// SplitMix64 step, enough spread for fallback id generation.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
