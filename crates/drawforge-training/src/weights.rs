//! Weight vector initialization and perturbation.
//!
//! # Operations
//!
//! - **Initialization**: [`random`] draws integer-scaled weights `k / 1000`;
//!   [`elite`] draws from the higher band `(k + 500) / 1500`
//! - **Mutation**: [`jitter`] scales individual weights by `1 + u`, `u ~ U[-0.05, 0.05]`
//! - **Crossover**: [`uniform_pick`] takes each weight from one of two parents
//!
//! All results stay in `[0, 1]`: [`Weights::from_fn`] clamps every generated value.

use drawforge_engine::Weights;
use rand::Rng;

/// Resolution of integer-scaled initial weights.
pub const SCALE: u32 = 1000;
/// Offset added to the integer draw of the elite slot.
pub const ELITE_OFFSET: u32 = 500;
/// Half-width of the multiplicative mutation noise.
pub const JITTER: f32 = 0.05;

/// Uniform weights on the grid `{0, 1/1000, ..., 1}`.
#[expect(clippy::cast_precision_loss)]
pub fn random<R>(rng: &mut R) -> Weights
where
    R: Rng + ?Sized,
{
    Weights::from_fn(|_| rng.random_range(0..=SCALE) as f32 / SCALE as f32)
}

/// Head-start weights on the grid `{500/1500, ..., 1}`.
///
/// ```
/// use rand::SeedableRng as _;
///
/// let mut rng = rand_pcg::Pcg32::seed_from_u64(0);
/// let weights = drawforge_training::weights::elite(&mut rng);
/// assert!(weights.iter().all(|w| w >= 1.0 / 3.0));
/// ```
#[expect(clippy::cast_precision_loss)]
pub fn elite<R>(rng: &mut R) -> Weights
where
    R: Rng + ?Sized,
{
    let max = SCALE + ELITE_OFFSET;
    Weights::from_fn(|_| (rng.random_range(0..=SCALE) + ELITE_OFFSET) as f32 / max as f32)
}

/// Perturbs each weight with probability `rate`.
pub fn jitter<R>(weights: &Weights, rate: f64, rng: &mut R) -> Weights
where
    R: Rng + ?Sized,
{
    let rate = rate.clamp(0.0, 1.0);
    Weights::from_fn(|i| {
        let w = weights[i];
        if rng.random_bool(rate) {
            w * (1.0 + rng.random_range(-JITTER..=JITTER))
        } else {
            w
        }
    })
}

/// Takes each weight from `a` with probability `prob_a`, otherwise from `b`.
pub fn uniform_pick<R>(a: &Weights, b: &Weights, prob_a: f64, rng: &mut R) -> Weights
where
    R: Rng + ?Sized,
{
    let prob_a = prob_a.clamp(0.0, 1.0);
    Weights::from_fn(|i| if rng.random_bool(prob_a) { a[i] } else { b[i] })
}

/// Mean of each weight across a set of vectors.
///
/// Returns an empty vector when `weights` is empty.
#[expect(clippy::cast_precision_loss)]
pub fn means<'a, I>(weights: I) -> Vec<f32>
where
    I: IntoIterator<Item = &'a Weights>,
{
    let mut sums: Vec<f32> = vec![];
    let mut count = 0;
    for w in weights {
        if sums.is_empty() {
            sums = vec![0.0; w.len()];
        }
        for (sum, v) in sums.iter_mut().zip(w.iter()) {
            *sum += v;
        }
        count += 1;
    }
    for sum in &mut sums {
        *sum /= count as f32;
    }
    sums
}

#[cfg(test)]
mod tests {
    use drawforge_engine::WEIGHT_COUNT;
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;

    #[test]
    fn test_random_is_integer_scaled() {
        let mut rng = Pcg32::seed_from_u64(3);
        for _ in 0..50 {
            let weights = random(&mut rng);
            assert_eq!(weights.len(), WEIGHT_COUNT);
            for w in weights.iter() {
                assert!((0.0..=1.0).contains(&w));
                let k = w * 1000.0;
                assert!((k - k.round()).abs() < 1e-3, "{w}");
            }
        }
    }

    #[test]
    fn test_elite_band() {
        let mut rng = Pcg32::seed_from_u64(4);
        for _ in 0..50 {
            for w in elite(&mut rng).iter() {
                assert!((500.0 / 1500.0..=1.0).contains(&w), "{w}");
            }
        }
    }

    #[test]
    fn test_jitter_stays_in_unit_range() {
        let mut rng = Pcg32::seed_from_u64(5);
        let ones = Weights::from_fn(|_| 1.0);
        let zeros = Weights::from_fn(|_| 0.0);
        for _ in 0..50 {
            assert!(jitter(&ones, 1.0, &mut rng).iter().all(|w| (0.95..=1.0).contains(&w)));
            assert!(jitter(&zeros, 1.0, &mut rng).iter().all(|w| w == 0.0));
        }
        let half = Weights::from_fn(|_| 0.5);
        assert_eq!(jitter(&half, 0.0, &mut rng), half);
        // out-of-range rates are clamped instead of panicking
        let _ = jitter(&half, 7.0, &mut rng);
        let _ = jitter(&half, -1.0, &mut rng);
    }

    #[test]
    fn test_uniform_pick_extremes() {
        let mut rng = Pcg32::seed_from_u64(6);
        let a = Weights::from_fn(|_| 0.25);
        let b = Weights::from_fn(|_| 0.75);
        assert_eq!(uniform_pick(&a, &b, 1.0, &mut rng), a);
        assert_eq!(uniform_pick(&a, &b, 0.0, &mut rng), b);
    }

    #[test]
    fn test_means() {
        let a = Weights::from_fn(|_| 0.2);
        let b = Weights::from_fn(|_| 0.4);
        let means = means([&a, &b]);
        assert_eq!(means.len(), WEIGHT_COUNT);
        assert!(means.iter().all(|m| (m - 0.3).abs() < 1e-6));
        assert!(super::means([]).is_empty());
    }
}
