use super::noise::NoiseField;
use crate::config::{ConfigError, TerrainConfig};
use bevy::math::Vec2;

// Absorbs float error when `end - start` is an exact multiple of the interval.
const SAMPLE_COUNT_EPSILON: f32 = 1.0e-4;

pub type TerrainPoint = Vec2;

#[derive(Debug, Clone)]
pub struct TerrainGenerator {
    config: TerrainConfig,
    noise: NoiseField,
}

impl TerrainGenerator {
    pub fn new(config: &TerrainConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            noise: NoiseField::new(config.seed),
        })
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn difficulty_at(&self, x: f32) -> f32 {
        (x.max(0.0) * self.config.difficulty_ramp).min(self.config.max_difficulty)
    }

    pub fn height_at(&self, x: f32) -> f32 {
        let cfg = &self.config;
        if x < cfg.flat_zone {
            return cfg.base_y;
        }

        let blend = if cfg.transition_width > 0.0 {
            ((x - cfg.flat_zone) / cfg.transition_width).min(1.0)
        } else {
            1.0
        };
        let base = self.noise.fbm(x * cfg.base_frequency, cfg.base_octaves) * cfg.base_amplitude;
        let detail = self
            .noise
            .fbm(x * cfg.detail_frequency + cfg.detail_offset, cfg.detail_octaves)
            * cfg.detail_amplitude;
        let hills = self
            .noise
            .fbm(x * cfg.hills_frequency + cfg.hills_offset, cfg.hills_octaves)
            * cfg.hills_amplitude
            * (1.0 + self.difficulty_at(x));

        cfg.base_y + blend * (base + detail + hills)
    }

    /// Samples `[start_x, end_x]` at the configured interval, both ends included when
    /// the span is a whole number of intervals.
    pub fn generate(&self, start_x: f32, end_x: f32) -> Vec<TerrainPoint> {
        if !(start_x.is_finite() && end_x.is_finite()) || end_x < start_x {
            return Vec::new();
        }

        let step = self.config.sample_interval;
        let count = ((end_x - start_x) / step + SAMPLE_COUNT_EPSILON).floor() as usize;
        (0..=count)
            .map(|index| {
                let x = start_x + index as f32 * step;
                Vec2::new(x, self.height_at(x))
            })
            .collect()
    }
}
