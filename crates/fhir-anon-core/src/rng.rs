//! Secure RNG (C2): a single source of cryptographically secure randomness
//! for the perturb and differential-privacy processors. Every sample is
//! drawn from the OS CSPRNG (`rand::rngs::OsRng`, itself backed by
//! `getrandom`) — this is never a seedable or reproducible PRNG, by design.

use rand::RngCore;
use rand::rngs::OsRng;
use std::cell::RefCell;

#[derive(Debug, Default, Clone, Copy)]
pub struct SecureRng;

impl SecureRng {
    pub fn new() -> Self {
        SecureRng
    }

    fn next_u64(&self) -> u64 {
        let mut buf = [0u8; 8];
        OsRng.fill_bytes(&mut buf);
        u64::from_le_bytes(buf)
    }

    pub fn fill_bytes(&self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }

    /// Uniform sample in the open interval (0, 1), suitable as input to a
    /// `ln()`-based inverse-CDF transform.
    pub fn uniform_open01(&self) -> f64 {
        loop {
            let v = (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64);
            if v > 0.0 {
                return v;
            }
        }
    }

    /// Uniform sample in `[low, high)`.
    pub fn uniform_range(&self, low: f64, high: f64) -> f64 {
        low + self.uniform_open01() * (high - low)
    }

    /// Standard normal sample via the Box–Muller polar transform.
    pub fn standard_normal(&self) -> f64 {
        let u1 = self.uniform_open01();
        let u2 = self.uniform_open01();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    pub fn gaussian(&self, mean: f64, std_dev: f64) -> f64 {
        mean + self.standard_normal() * std_dev
    }

    /// Laplace(0, scale) sample via inverse-CDF: draw `u ~ Uniform(-0.5, 0.5)`
    /// and return `-scale * sign(u) * ln(1 - 2|u|)`.
    pub fn laplace(&self, scale: f64) -> f64 {
        let u = self.uniform_open01() - 0.5;
        let sign = if u < 0.0 { -1.0 } else { 1.0 };
        -scale * sign * (1.0 - 2.0 * u.abs()).ln()
    }
}

thread_local! {
    static THREAD_RNG: RefCell<SecureRng> = RefCell::new(SecureRng::new());
}

/// A per-thread `SecureRng` handle. Every call still draws from the OS
/// CSPRNG directly (there is no per-thread seed to reseed from); this
/// exists so callers that want a thread-affine handle rather than a shared
/// one have a real code path to reach for, per the engine's concurrency
/// notes on per-thread RNG instances.
pub fn with_thread_rng<F, R>(f: F) -> R
where
    F: FnOnce(&SecureRng) -> R,
{
    THREAD_RNG.with(|rng| f(&rng.borrow()))
}
