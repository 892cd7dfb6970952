//! Reproducible shuffling keyed by participant identifiers.
//!
//! The hash and generator below are part of the stimulus-assignment contract: a
//! participant must receive the same stimuli on every device and in every session, so
//! neither may change without migrating existing participants.

const LCG_MULTIPLIER: u64 = 9301;
const LCG_INCREMENT: u64 = 49297;
const LCG_MODULUS: u64 = 233_280;

/// Randomization seed derived from an identifier string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Seed(i32);

impl Seed {
    /// Polynomial rolling hash (`hash * 31 + unit`) over UTF-16 code units, wrapped to
    /// 32 bits.
    pub fn from_str_hash(raw: &str) -> Self {
        let hash = raw
            .encode_utf16()
            .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32));
        Self(hash)
    }

    /// Seed shared by every phase of one participant.
    pub fn for_user(user_id: &str) -> Self {
        Self::from_str_hash(user_id)
    }

    /// Seed private to one participant and phase (`"{user}_{phase}"`).
    pub fn for_user_phase(user_id: &str, phase_key: &str) -> Self {
        Self::from_str_hash(&format!("{user_id}_{phase_key}"))
    }

    pub fn value(self) -> i32 {
        self.0
    }

    pub fn rng(self) -> SeededRng {
        SeededRng::new(self)
    }
}

/// Linear-congruential generator producing draws in `[0, 1)`.
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    pub fn new(seed: Seed) -> Self {
        Self {
            state: u64::from(seed.0.unsigned_abs()),
        }
    }

    pub fn next_draw(&mut self) -> f64 {
        self.state = (self.state * LCG_MULTIPLIER + LCG_INCREMENT) % LCG_MODULUS;
        self.state as f64 / LCG_MODULUS as f64
    }

    /// Uniform index in `0..bound`; `bound` must be non-zero.
    fn next_index(&mut self, bound: usize) -> usize {
        let index = (self.next_draw() * bound as f64).floor() as usize;
        index.min(bound - 1)
    }
}

/// Fisher–Yates shuffle driven by [`SeededRng`]. Identical seeds give identical output.
pub fn seeded_shuffle<T: Clone>(items: &[T], seed: Seed) -> Vec<T> {
    let mut shuffled = items.to_vec();
    let mut rng = seed.rng();
    for i in (1..shuffled.len()).rev() {
        let j = rng.next_index(i + 1);
        shuffled.swap(i, j);
    }
    shuffled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_rolling_polynomial() {
        // "ab" = 97 * 31 + 98
        assert_eq!(Seed::from_str_hash("ab").value(), 3105);
        assert_eq!(Seed::from_str_hash("").value(), 0);
    }

    #[test]
    fn hash_wraps_instead_of_overflowing() {
        let long = "participant-".repeat(64);
        let seed = Seed::from_str_hash(&long);
        assert_eq!(seed, Seed::from_str_hash(&long));
    }

    #[test]
    fn generator_follows_lcg_recurrence() {
        let mut rng = Seed::from_str_hash("").rng();
        let first = rng.next_draw();
        assert!((first - 49297.0 / 233280.0).abs() < 1e-12);
        let expected_state = (49297u64 * 9301 + 49297) % 233280;
        let second = rng.next_draw();
        assert!((second - expected_state as f64 / 233280.0).abs() < 1e-12);
    }

    #[test]
    fn same_seed_same_permutation() {
        let items: Vec<u16> = (1..=40).collect();
        let a = seeded_shuffle(&items, Seed::for_user("p1"));
        let b = seeded_shuffle(&items, Seed::for_user("p1"));
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, items);
    }

    #[test]
    fn different_users_usually_differ() {
        let items: Vec<u16> = (1..=40).collect();
        let a = seeded_shuffle(&items, Seed::for_user("p1"));
        let b = seeded_shuffle(&items, Seed::for_user("p2"));
        assert_ne!(a, b);
    }

    #[test]
    fn phase_qualified_seed_is_distinct() {
        assert_ne!(
            Seed::for_user("p1"),
            Seed::for_user_phase("p1", "pretest")
        );
        assert_eq!(
            Seed::for_user_phase("p1", "pretest"),
            Seed::from_str_hash("p1_pretest")
        );
    }
}
