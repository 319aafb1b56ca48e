//! Deterministic seed derivation.
//!
//! Every random stream in a run (per-channel loss draws, per-application
//! on/off sampling) is seeded from the run seed, a domain tag and a counter,
//! so that two runs with the same seed and topology are identical.

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Deterministically derive a 64-bit seed from a run seed, domain, and counter.
pub fn derive_seed(seed: u64, domain: u64, counter: u64) -> u64 {
    let x0 = splitmix64(seed ^ domain).wrapping_add(counter);
    splitmix64(x0)
}

pub const SEED_DOMAIN_CHANNEL: u64 = 0x4348_414E_4E45_4C5F; // "CHANNEL_" (tag)
pub const SEED_DOMAIN_APPLICATION: u64 = 0x4150_504C_4943_4E5F; // "APPLICN_" (tag)
