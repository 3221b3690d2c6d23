const PERMUTATION_SIZE: usize = 256;
const LCG_MULTIPLIER: u64 = 16_807;
const LCG_MODULUS: u64 = 2_147_483_647;
const GRADIENTS: [f32; 8] = [1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 0.0, 0.0];

pub const DEFAULT_LACUNARITY: f32 = 2.0;
pub const DEFAULT_GAIN: f32 = 0.5;

/// Seeded 1-D gradient noise. Output of `noise1d` stays within [-0.5, 0.5] and `fbm`
/// within the same range since it is normalized by the summed amplitude.
#[derive(Debug, Clone)]
pub struct NoiseField {
    permutation: [u8; PERMUTATION_SIZE * 2],
}

impl NoiseField {
    pub fn new(seed: u32) -> Self {
        let mut table = [0_u8; PERMUTATION_SIZE];
        for (index, slot) in table.iter_mut().enumerate() {
            *slot = index as u8;
        }

        let mut state = u64::from(seed);
        for index in (1..PERMUTATION_SIZE).rev() {
            state = (state * LCG_MULTIPLIER) % LCG_MODULUS;
            let swap = (state % (index as u64 + 1)) as usize;
            table.swap(index, swap);
        }

        let mut permutation = [0_u8; PERMUTATION_SIZE * 2];
        for (index, slot) in permutation.iter_mut().enumerate() {
            *slot = table[index & (PERMUTATION_SIZE - 1)];
        }
        Self { permutation }
    }

    pub fn noise1d(&self, x: f32) -> f32 {
        let floor = x.floor();
        let lattice = floor as i32;
        let offset = x - floor;
        let blend = fade(offset);

        let left = self.permutation[(lattice & 255) as usize];
        let right = self.permutation[(lattice.wrapping_add(1) & 255) as usize];
        lerp(
            gradient(left, offset),
            gradient(right, offset - 1.0),
            blend,
        )
    }

    pub fn fbm(&self, x: f32, octaves: u32) -> f32 {
        self.fbm_with(x, octaves, DEFAULT_LACUNARITY, DEFAULT_GAIN)
    }

    pub fn fbm_with(&self, x: f32, octaves: u32, lacunarity: f32, gain: f32) -> f32 {
        let mut sum = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut total_amplitude = 0.0;
        for _ in 0..octaves {
            sum += self.noise1d(x * frequency) * amplitude;
            total_amplitude += amplitude;
            amplitude *= gain;
            frequency *= lacunarity;
        }

        if total_amplitude <= f32::EPSILON {
            return 0.0;
        }
        sum / total_amplitude
    }
}

fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

fn gradient(hash: u8, offset: f32) -> f32 {
    GRADIENTS[(hash & 7) as usize] * offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_gives_identical_samples() {
        let a = NoiseField::new(42);
        let b = NoiseField::new(42);
        for step in -200..200 {
            let x = step as f32 * 0.37;
            assert_eq!(a.noise1d(x), b.noise1d(x));
            assert_eq!(a.fbm(x, 4), b.fbm(x, 4));
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let a = NoiseField::new(42);
        let b = NoiseField::new(7);
        let differs = (0..100).any(|step| {
            let x = step as f32 * 0.61 + 0.3;
            (a.noise1d(x) - b.noise1d(x)).abs() > 1.0e-4
        });
        assert!(differs);
    }

    #[test]
    fn noise_vanishes_on_lattice_points() {
        let field = NoiseField::new(42);
        for lattice in -10..10 {
            assert!(field.noise1d(lattice as f32).abs() < 1.0e-6);
        }
    }

    #[test]
    fn fbm_stays_bounded_for_any_octave_count() {
        let field = NoiseField::new(42);
        for octaves in 1..8 {
            for step in -500..500 {
                let value = field.fbm(step as f32 * 0.173, octaves);
                assert!(value.is_finite());
                assert!(value.abs() <= 0.5 + 1.0e-4, "{value} at {octaves} octaves");
            }
        }
    }

    #[test]
    fn zero_octaves_is_flat() {
        let field = NoiseField::new(42);
        assert_eq!(field.fbm(12.5, 0), 0.0);
    }

    #[test]
    fn noise_is_continuous_across_cell_boundaries() {
        let field = NoiseField::new(42);
        for lattice in -5..5 {
            let x = lattice as f32;
            let below = field.noise1d(x - 1.0e-4);
            let above = field.noise1d(x + 1.0e-4);
            assert!((below - above).abs() < 1.0e-3);
        }
    }
}
