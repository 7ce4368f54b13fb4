//! Niche bonuses and niche inheritance.
//!
//! Every player belongs to one [`Niche`]. The niche adds a bonus to the player's
//! fitness depending on a property of the revealed draw:
//!
//! | niche              | bonus                                             |
//! |--------------------|---------------------------------------------------|
//! | `EvenAffinity`     | even numbers in the draw × 0.5                    |
//! | `OddAffinity`      | odd numbers in the draw × 0.5                     |
//! | `SequenceAffinity` | length-3 consecutive runs in the draw × 1.2       |
//! | `General`          | 0.3                                               |
//!
//! Offspring inherit a preferred niche with some probability and otherwise fall
//! back to a uniformly random one, which keeps all niches represented.

use drawforge_engine::{Niche, NumberSet};
use rand::Rng;

pub const EVEN_BONUS_PER_NUMBER: f32 = 0.5;
pub const ODD_BONUS_PER_NUMBER: f32 = 0.5;
pub const SEQUENCE_BONUS_PER_RUN: f32 = 1.2;
pub const GENERAL_BONUS: f32 = 0.3;

/// Assigns, perturbs and scores niches.
#[derive(Debug, Default, Clone, Copy)]
pub struct NicheClassifier;

impl NicheClassifier {
    /// Niche bonus of `niche` for a draw.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn bonus(&self, niche: Niche, draw: NumberSet) -> f32 {
        match niche {
            Niche::EvenAffinity => {
                draw.iter().filter(|n| n % 2 == 0).count() as f32 * EVEN_BONUS_PER_NUMBER
            }
            Niche::OddAffinity => {
                draw.iter().filter(|n| n % 2 != 0).count() as f32 * ODD_BONUS_PER_NUMBER
            }
            Niche::SequenceAffinity => draw.consecutive_triples() as f32 * SEQUENCE_BONUS_PER_RUN,
            Niche::General => GENERAL_BONUS,
        }
    }

    /// Picks a niche uniformly at random.
    pub fn random<R>(&self, rng: &mut R) -> Niche
    where
        R: Rng + ?Sized,
    {
        rng.random()
    }

    /// Keeps `preferred` with probability `retain_probability`, otherwise resamples.
    ///
    /// The resampled niche may coincide with `preferred`.
    pub fn inherit<R>(&self, preferred: Niche, retain_probability: f64, rng: &mut R) -> Niche
    where
        R: Rng + ?Sized,
    {
        if rng.random_bool(retain_probability.clamp(0.0, 1.0)) {
            preferred
        } else {
            self.random(rng)
        }
    }

    /// The niche that earns the highest bonus on a draw.
    ///
    /// Ties resolve to the niche with the lowest discriminant.
    #[must_use]
    pub fn dominant(&self, draw: NumberSet) -> Niche {
        Niche::ALL
            .into_iter()
            .fold((Niche::General, f32::MIN), |(best, best_bonus), niche| {
                let bonus = self.bonus(niche, draw);
                if bonus > best_bonus {
                    (niche, bonus)
                } else {
                    (best, best_bonus)
                }
            })
            .0
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;

    fn set(numbers: &[i64]) -> NumberSet {
        NumberSet::new(numbers.iter().copied()).unwrap()
    }

    #[test]
    fn test_bonus_per_niche() {
        let classifier = NicheClassifier;
        let draw = set(&[1, 2, 3, 4, 5]);
        assert_eq!(classifier.bonus(Niche::EvenAffinity, draw), 1.0);
        assert_eq!(classifier.bonus(Niche::OddAffinity, draw), 1.5);
        assert!((classifier.bonus(Niche::SequenceAffinity, draw) - 3.6).abs() < 1e-6);
        assert_eq!(classifier.bonus(Niche::General, draw), 0.3);
    }

    #[test]
    fn test_bonus_on_empty_draw() {
        let classifier = NicheClassifier;
        assert_eq!(classifier.bonus(Niche::EvenAffinity, NumberSet::EMPTY), 0.0);
        assert_eq!(classifier.bonus(Niche::SequenceAffinity, NumberSet::EMPTY), 0.0);
        assert_eq!(classifier.bonus(Niche::General, NumberSet::EMPTY), 0.3);
    }

    #[test]
    fn test_dominant() {
        let classifier = NicheClassifier;
        assert_eq!(
            classifier.dominant(set(&[1, 2, 3, 4, 5])),
            Niche::SequenceAffinity
        );
        assert_eq!(classifier.dominant(set(&[2, 4, 6, 8, 11])), Niche::EvenAffinity);
        assert_eq!(classifier.dominant(set(&[1, 3, 5, 8])), Niche::OddAffinity);
        assert_eq!(classifier.dominant(NumberSet::EMPTY), Niche::General);
    }

    #[test]
    fn test_inherit_extremes() {
        let classifier = NicheClassifier;
        let mut rng = Pcg32::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(
                classifier.inherit(Niche::OddAffinity, 1.0, &mut rng),
                Niche::OddAffinity
            );
        }
        let resampled = (0..400)
            .map(|_| classifier.inherit(Niche::OddAffinity, 0.0, &mut rng))
            .filter(|n| *n != Niche::OddAffinity)
            .count();
        // roughly three quarters of uniform resamples land on another niche
        assert!((200..=400).contains(&resampled));
    }
}
