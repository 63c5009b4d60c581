/// Utility functions
use rand::Rng;

/// Round to one decimal place (sensor precision)
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round to six decimal places (coordinate precision)
pub fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[derive(Debug, thiserror::Error)]
pub enum WeightError {
    #[error("weighted choice requires at least one entry")]
    Empty,
    #[error("weights must be positive, got {0}")]
    NonPositive(f64),
    #[error("weights must sum to 1.0, got {0}")]
    BadTotal(f64),
}

/// Weighted random dispatch over a fixed catalog.
///
/// Weights are validated at construction: all positive, summing to 1.0.
/// Draws take an injected random source so callers stay deterministic
/// under test.
#[derive(Debug, Clone)]
pub struct WeightedChoice<T> {
    entries: Vec<(T, f64)>,
}

impl<T> WeightedChoice<T> {
    pub fn new(entries: Vec<(T, f64)>) -> Result<Self, WeightError> {
        if entries.is_empty() {
            return Err(WeightError::Empty);
        }
        let mut total = 0.0;
        for (_, weight) in &entries {
            if *weight <= 0.0 {
                return Err(WeightError::NonPositive(*weight));
            }
            total += weight;
        }
        if (total - 1.0).abs() > 1e-9 {
            return Err(WeightError::BadTotal(total));
        }
        Ok(Self { entries })
    }

    /// Draw one entry. The final entry absorbs floating-point remainder.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> &T {
        let roll: f64 = rng.random();
        let mut acc = 0.0;
        for (item, weight) in &self.entries {
            acc += weight;
            if roll < acc {
                return item;
            }
        }
        &self.entries[self.entries.len() - 1].0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn round1_truncates_to_one_decimal() {
        assert_eq!(round1(42.449), 42.4);
        assert_eq!(round1(42.45), 42.5);
        assert_eq!(round1(-1.26), -1.3);
    }

    #[test]
    fn round6_keeps_coordinate_precision() {
        assert_eq!(round6(4.123_456_789), 4.123_457);
    }

    #[test]
    fn weighted_choice_rejects_empty() {
        let result: Result<WeightedChoice<&str>, _> = WeightedChoice::new(Vec::new());
        assert!(matches!(result, Err(WeightError::Empty)));
    }

    #[test]
    fn weighted_choice_rejects_bad_total() {
        let result = WeightedChoice::new(vec![("a", 0.5), ("b", 0.4)]);
        assert!(matches!(result, Err(WeightError::BadTotal(_))));
    }

    #[test]
    fn weighted_choice_rejects_non_positive_weights() {
        let result = WeightedChoice::new(vec![("a", 1.2), ("b", -0.2)]);
        assert!(matches!(result, Err(WeightError::NonPositive(_))));
    }

    #[test]
    fn weighted_choice_is_deterministic_under_a_seed() {
        let choice = WeightedChoice::new(vec![("common", 0.9), ("rare", 0.1)]).unwrap();
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(choice.draw(&mut a), choice.draw(&mut b));
        }
    }

    #[test]
    fn weighted_choice_respects_the_distribution() {
        let choice = WeightedChoice::new(vec![("common", 0.9), ("rare", 0.1)]).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let common = (0..10_000)
            .filter(|_| *choice.draw(&mut rng) == "common")
            .count();
        // 0.9 of 10k draws, with generous slack
        assert!(common > 8_700 && common < 9_300, "common drawn {common} times");
    }
}
