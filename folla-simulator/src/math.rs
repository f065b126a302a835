use std::f32::consts::{FRAC_PI_2, PI, TAU};

use once_cell::sync::Lazy;

const SIN_TABLE_LEN: usize = 16_384;
const ATAN_TABLE_LEN: usize = 4_096;

static SIN_TABLE: Lazy<Vec<f32>> = Lazy::new(|| {
    (0..SIN_TABLE_LEN)
        .map(|i| (i as f32 / SIN_TABLE_LEN as f32 * TAU).sin())
        .collect()
});

// atan over [0, 1]; one extra entry so interpolation can read index + 1.
static ATAN_TABLE: Lazy<Vec<f32>> = Lazy::new(|| {
    (0..=ATAN_TABLE_LEN)
        .map(|i| (i as f32 / ATAN_TABLE_LEN as f32).atan())
        .collect()
});

/// Table-based sine, absolute error below 5e-4.
pub fn sin_lut(x: f32) -> f32 {
    let t = (x.rem_euclid(TAU)) / TAU * SIN_TABLE_LEN as f32;
    SIN_TABLE[(t.round() as usize) % SIN_TABLE_LEN]
}

/// Table-based cosine, absolute error below 5e-4.
pub fn cos_lut(x: f32) -> f32 {
    sin_lut(x + FRAC_PI_2)
}

fn atan_unit(t: f32) -> f32 {
    let scaled = t * ATAN_TABLE_LEN as f32;
    let index = (scaled as usize).min(ATAN_TABLE_LEN - 1);
    let frac = scaled - index as f32;
    ATAN_TABLE[index] + (ATAN_TABLE[index + 1] - ATAN_TABLE[index]) * frac
}

/// Table-based four-quadrant arctangent, absolute error below 2e-5 rad.
pub fn atan2_lut(y: f32, x: f32) -> f32 {
    if y == 0.0 && x == 0.0 {
        return 0.0;
    }

    let ay = y.abs();
    let ax = x.abs();
    let r = if ay <= ax {
        atan_unit(ay / ax)
    } else {
        FRAC_PI_2 - atan_unit(ax / ay)
    };
    let r = if x < 0.0 { PI - r } else { r };
    if y < 0.0 {
        -r
    } else {
        r
    }
}

pub fn hypot(a: f32, b: f32) -> f32 {
    a.hypot(b)
}

/// Gaussian sample clamped into `[lo, hi]`; resamples a few times before
/// falling back to a hard clamp so the tails cannot escape the interval.
pub fn clipped_normal(rng: &mut fastrand::Rng, mean: f32, sd: f32, lo: f32, hi: f32) -> f32 {
    use fastrand_contrib::RngExt;

    for _ in 0..8 {
        let sample = rng.f32_normal_approx(mean, sd);
        if (lo..=hi).contains(&sample) {
            return sample;
        }
    }
    mean.clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use assert_float_eq::*;

    use super::*;

    #[test]
    fn test_sin_cos_precision() {
        let mut worst: f32 = 0.0;
        for i in 0..20_000 {
            let x = -12.0 + i as f32 * 1.2e-3;
            worst = worst.max((sin_lut(x) - x.sin()).abs());
            worst = worst.max((cos_lut(x) - x.cos()).abs());
        }
        assert!(worst < 5e-4, "worst trig error {worst}");
    }

    #[test]
    fn test_atan2_precision() {
        let mut worst: f32 = 0.0;
        for i in 0..400 {
            for j in 0..400 {
                let y = -2.0 + i as f32 * 0.01;
                let x = -2.0 + j as f32 * 0.01;
                if y == 0.0 && x == 0.0 {
                    continue;
                }
                worst = worst.max((atan2_lut(y, x) - y.atan2(x)).abs());
            }
        }
        assert!(worst < 2e-5, "worst atan2 error {worst}");
    }

    #[test]
    fn test_atan2_axes() {
        assert_float_absolute_eq!(atan2_lut(0.0, 1.0), 0.0);
        assert_float_absolute_eq!(atan2_lut(1.0, 0.0), FRAC_PI_2);
        assert_float_absolute_eq!(atan2_lut(0.0, -1.0), PI);
        assert_float_absolute_eq!(atan2_lut(-1.0, 0.0), -FRAC_PI_2);
    }

    #[test]
    fn test_hypot() {
        assert_float_absolute_eq!(hypot(3.0, 4.0), 5.0);
        assert_float_absolute_eq!(hypot(-3.0, 4.0), 5.0);
    }

    #[test]
    fn test_clipped_normal_stays_inside() {
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..1_000 {
            let v = clipped_normal(&mut rng, 1.34, 0.26, 0.3, 3.0);
            assert!((0.3..=3.0).contains(&v));
        }
    }
}
