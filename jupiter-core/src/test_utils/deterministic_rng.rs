/*!
    Deterministic RNG helpers for reproducible tests

    Randomized convergence tests pick positions, texts and delivery orders
    from these generators so a failure can be replayed from its seed.
*/

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default seed for deterministic tests
pub const DEFAULT_TEST_SEED: u64 = 42;

const ALPHABET: &[char] = &['a', 'b', 'c', 'x', 'y', 'z', ' ', 'é', 'ß', '字'];

/// Create a deterministic RNG with the default seed
pub fn test_rng() -> StdRng {
    test_rng_with_seed(DEFAULT_TEST_SEED)
}

/// Create a deterministic RNG with a custom seed
pub fn test_rng_with_seed(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Random text of `1..=max_len` chars, including multi-byte ones
pub fn random_text(rng: &mut StdRng, max_len: usize) -> String {
    let len = rng.random_range(1..=max_len.max(1));
    (0..len).map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_is_deterministic() {
        let mut rng1 = test_rng();
        let mut rng2 = test_rng();

        for _ in 0..100 {
            assert_eq!(rng1.random::<u64>(), rng2.random::<u64>());
        }
    }

    #[test]
    fn test_different_seeds_produce_different_sequences() {
        let mut rng1 = test_rng_with_seed(1);
        let mut rng2 = test_rng_with_seed(2);

        assert_ne!(rng1.random::<u64>(), rng2.random::<u64>());
    }

    #[test]
    fn test_random_text_reproducible() {
        let a = random_text(&mut test_rng_with_seed(7), 12);
        let b = random_text(&mut test_rng_with_seed(7), 12);

        assert_eq!(a, b);
        assert!(!a.is_empty());
        assert!(a.chars().count() <= 12);
    }
}
