//! Seed-stable 53-bit string hash (cyrb53).
//!
//! Every deterministic decision (stochastic branches, sampling) is derived
//! from this hash of an identity string, never from a stateful PRNG, so the
//! same entry id and seed always reproduce the same choice.

/// Hash `input` (as UTF-16 code units) into 53 bits.
pub fn cyrb53(input: &str, seed: u32) -> u64 {
    let mut h1: u32 = 0xdead_beef ^ seed;
    let mut h2: u32 = 0x41c6_ce57 ^ seed;
    for unit in input.encode_utf16() {
        let ch = u32::from(unit);
        h1 = (h1 ^ ch).wrapping_mul(2_654_435_761);
        h2 = (h2 ^ ch).wrapping_mul(1_597_334_677);
    }
    h1 = (h1 ^ (h1 >> 16)).wrapping_mul(2_246_822_507);
    h1 ^= (h2 ^ (h2 >> 13)).wrapping_mul(3_266_489_909);
    h2 = (h2 ^ (h2 >> 16)).wrapping_mul(2_246_822_507);
    h2 ^= (h1 ^ (h1 >> 13)).wrapping_mul(3_266_489_909);
    (u64::from(h2 & 0x1f_ffff) << 32) | u64::from(h1)
}

/// `cyrb53(input)` mapped into `[0, 1)`.
pub fn cyrb53_random(input: &str) -> f64 {
    cyrb53(input, 0) as f64 / (1u64 << 53) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_vectors() {
        assert_eq!(cyrb53("a", 0), 7_929_297_801_672_961);
        assert_eq!(cyrb53("b", 0), 8_684_336_938_537_663);
        assert_eq!(cyrb53("revenge", 0), 4_051_478_007_546_757);
    }

    #[test]
    fn random_is_stable_and_in_unit_interval() {
        for key in ["", "0", "00", "10", "5seed", "ünïcode"] {
            let r = cyrb53_random(key);
            assert!((0.0..1.0).contains(&r), "{key} -> {r}");
            assert_eq!(r, cyrb53_random(key));
        }
        assert_ne!(cyrb53_random("00"), cyrb53_random("10"));
    }

    #[test]
    fn seed_changes_the_hash() {
        assert_ne!(cyrb53("a", 0), cyrb53("a", 1));
    }
}
