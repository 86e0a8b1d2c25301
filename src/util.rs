// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

use rand::SeedableRng;
use rand::distr::{Distribution, StandardUniform};
use rand::rngs::StdRng;
use rand::Rng;
use std::cell::RefCell;

/// Seed a new StdRng from OS entropy
fn new_seeded_rng() -> StdRng {
    StdRng::from_os_rng()
}

thread_local! {
    /// Provides a local instance of StdRng for each thread
    static RNG: RefCell<StdRng> = RefCell::new(new_seeded_rng());
}

/// Generate a random nonce from a thread-local RNG
pub fn generate_nonce<T>() -> T
where
    StandardUniform: Distribution<T>,
{
    RNG.with_borrow_mut(|rng| rng.random())
}
