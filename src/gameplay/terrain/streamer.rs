use super::generator::{TerrainGenerator, TerrainPoint};
use crate::config::{ConfigError, TerrainConfig};
use crate::gameplay::physics::{BodyDesc, BodyHandle, BodyLabel, BodyShape, PhysicsWorld};
use bevy::log::debug;
use bevy::math::Vec2;
use std::collections::BTreeMap;

const DUPLICATE_X_EPSILON: f32 = 1.0e-4;

#[derive(Debug, Clone)]
pub struct TerrainChunk {
    pub points: Vec<TerrainPoint>,
    segments: Vec<BodyHandle>,
}

impl TerrainChunk {
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    pub left: i64,
    pub right: i64,
}

impl ChunkWindow {
    /// `right` is the last chunk starting before the far margin, so a margin edge that
    /// lands exactly on a chunk boundary does not pull in one more chunk.
    pub fn for_camera(camera_x: f32, view_width: f32, chunk_width: f32) -> Self {
        Self {
            left: ((camera_x - chunk_width) / chunk_width).floor() as i64,
            right: ((camera_x + view_width + chunk_width) / chunk_width).ceil() as i64 - 1,
        }
    }

    pub fn keeps(&self, index: i64) -> bool {
        index >= self.left - 1 && index <= self.right + 1
    }
}

/// Keeps the chunks around the camera materialized, each with one static quad per
/// sample pair. Resident chunks always cover `[left, right]` and never leave
/// `[left - 1, right + 1]`.
pub struct TerrainStreamer {
    generator: TerrainGenerator,
    chunks: BTreeMap<i64, TerrainChunk>,
    points: Vec<TerrainPoint>,
    window: Option<ChunkWindow>,
}

impl TerrainStreamer {
    pub fn new(config: &TerrainConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            generator: TerrainGenerator::new(config)?,
            chunks: BTreeMap::new(),
            points: Vec::new(),
            window: None,
        })
    }

    pub fn generator(&self) -> &TerrainGenerator {
        &self.generator
    }

    pub fn update<W: PhysicsWorld>(&mut self, world: &mut W, camera_x: f32, view_width: f32) {
        if !(camera_x.is_finite() && view_width.is_finite()) {
            return;
        }
        let chunk_width = self.generator.config().chunk_width;
        let window = ChunkWindow::for_camera(camera_x, view_width.max(0.0), chunk_width);

        for index in window.left..=window.right {
            if !self.chunks.contains_key(&index) {
                let chunk = self.build_chunk(world, index);
                self.chunks.insert(index, chunk);
            }
        }

        let stale: Vec<i64> = self
            .chunks
            .keys()
            .copied()
            .filter(|index| !window.keeps(*index))
            .collect();
        for index in stale {
            if let Some(chunk) = self.chunks.remove(&index) {
                for segment in chunk.segments {
                    world.remove_body(segment);
                }
                debug!("Evicted terrain chunk {index}.");
            }
        }

        if self.window != Some(window) || self.points.is_empty() {
            self.rebuild_points();
            self.window = Some(window);
        }
    }

    fn build_chunk<W: PhysicsWorld>(&self, world: &mut W, index: i64) -> TerrainChunk {
        let config = self.generator.config();
        let start_x = index as f32 * config.chunk_width;
        let points = self.generator.generate(start_x, start_x + config.chunk_width);

        let mut skipped = 0;
        let segments: Vec<BodyHandle> = points
            .windows(2)
            .filter_map(|pair| {
                let handle = world.add_body(&segment_body(pair[0], pair[1], config));
                if handle.is_none() {
                    skipped += 1;
                }
                handle
            })
            .collect();
        if skipped > 0 {
            debug!("Skipped {skipped} degenerate terrain segment(s) in chunk {index}.");
        }
        debug!(
            "Created terrain chunk {index} with {} segment(s).",
            segments.len()
        );

        TerrainChunk {
            points,
            segments,
        }
    }

    fn rebuild_points(&mut self) {
        self.points.clear();
        for chunk in self.chunks.values() {
            for point in &chunk.points {
                let duplicate = self
                    .points
                    .last()
                    .is_some_and(|last| point.x <= last.x + DUPLICATE_X_EPSILON);
                if !duplicate {
                    self.points.push(*point);
                }
            }
        }
    }

    /// Interpolated surface height, or the configured fallback outside resident chunks.
    pub fn height_at(&self, x: f32) -> f32 {
        for pair in self.points.windows(2) {
            let (left, right) = (pair[0], pair[1]);
            if x < left.x || x > right.x {
                continue;
            }
            let width = right.x - left.x;
            if width <= f32::EPSILON {
                return left.y;
            }
            let t = (x - left.x) / width;
            return left.y + (right.y - left.y) * t;
        }
        self.generator.config().fallback_height
    }

    pub fn points(&self) -> &[TerrainPoint] {
        &self.points
    }

    #[cfg(test)]
    pub fn resident_indices(&self) -> Vec<i64> {
        self.chunks.keys().copied().collect()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn segment_count(&self) -> usize {
        self.chunks.values().map(TerrainChunk::segment_count).sum()
    }
}

fn segment_body(left: Vec2, right: Vec2, config: &TerrainConfig) -> BodyDesc {
    let depth = config.collision_depth;
    let center = Vec2::new((left.x + right.x) * 0.5, (left.y + right.y) * 0.5 - depth * 0.5);
    let drop = Vec2::new(0.0, depth);
    let points = [left, right, right - drop, left - drop]
        .into_iter()
        .map(|corner| corner - center)
        .collect();

    let mut desc = BodyDesc::fixed(BodyLabel::Terrain, BodyShape::Polygon { points }, center);
    desc.friction = config.friction;
    desc.restitution = config.restitution;
    desc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;
    use crate::gameplay::physics::mock::MockWorld;

    fn wide_chunks() -> TerrainConfig {
        TerrainConfig {
            chunk_width: 400.0,
            sample_interval: 20.0,
            ..TerrainConfig::default()
        }
    }

    fn streamer_and_world(config: &TerrainConfig) -> (TerrainStreamer, MockWorld) {
        (
            TerrainStreamer::new(config).expect("valid config"),
            MockWorld::create(&PhysicsConfig::default()),
        )
    }

    #[test]
    fn first_update_materializes_margin_window() {
        let (mut streamer, mut world) = streamer_and_world(&wide_chunks());
        streamer.update(&mut world, 0.0, 800.0);
        assert_eq!(streamer.resident_indices(), vec![-1, 0, 1, 2]);
        assert_eq!(world.body_count(), 4 * 20);
        assert_eq!(streamer.segment_count(), world.body_count());
    }

    #[test]
    fn repeated_updates_are_idempotent() {
        let (mut streamer, mut world) = streamer_and_world(&wide_chunks());
        streamer.update(&mut world, 130.0, 800.0);
        let indices = streamer.resident_indices();
        let bodies = world.body_count();
        let points = streamer.points().to_vec();

        streamer.update(&mut world, 130.0, 800.0);
        assert_eq!(streamer.resident_indices(), indices);
        assert_eq!(world.body_count(), bodies);
        assert_eq!(streamer.points(), points.as_slice());
    }

    #[test]
    fn far_jump_evicts_every_old_chunk_and_its_bodies() {
        let (mut streamer, mut world) = streamer_and_world(&wide_chunks());
        streamer.update(&mut world, 0.0, 800.0);
        streamer.update(&mut world, 2_000.0, 800.0);

        assert_eq!(streamer.resident_indices(), vec![4, 5, 6, 7]);
        assert_eq!(world.body_count(), streamer.segment_count());
        assert_eq!(world.count_label(BodyLabel::Terrain), 4 * 20);
    }

    #[test]
    fn residency_stays_within_margin_for_any_history() {
        let config = wide_chunks();
        let (mut streamer, mut world) = streamer_and_world(&config);
        let path = [0.0, 390.0, 810.0, 420.0, 2_500.0, 2_100.0, -900.0, 10.0, 10.0, 5_000.0];

        for camera_x in path {
            streamer.update(&mut world, camera_x, 800.0);
            let window = ChunkWindow::for_camera(camera_x, 800.0, config.chunk_width);
            let resident = streamer.resident_indices();
            for index in window.left..=window.right {
                assert!(resident.contains(&index), "{index} missing at {camera_x}");
            }
            assert!(resident.iter().all(|index| window.keeps(*index)));
            assert!(resident.len() <= (window.right - window.left + 3) as usize);
            assert_eq!(world.body_count(), streamer.segment_count());
        }
    }

    #[test]
    fn flattened_points_are_sorted_without_duplicates() {
        let (mut streamer, mut world) = streamer_and_world(&wide_chunks());
        streamer.update(&mut world, 400.0, 800.0);
        let points = streamer.points();
        assert!(points.windows(2).all(|pair| pair[1].x > pair[0].x));
        // four chunks of 20 intervals share their boundary samples
        assert_eq!(streamer.chunk_count(), 4);
        assert_eq!(points.len(), 4 * 20 + 1);
    }

    #[test]
    fn height_interpolates_between_samples() {
        let config = TerrainConfig {
            flat_zone: 0.0,
            ..wide_chunks()
        };
        let (mut streamer, mut world) = streamer_and_world(&config);
        streamer.update(&mut world, 600.0, 800.0);

        let points = streamer.points().to_vec();
        for pair in points.windows(2).step_by(7) {
            for t in [0.0, 0.25, 0.5, 0.9] {
                let x = pair[0].x + (pair[1].x - pair[0].x) * t;
                let expected = pair[0].y + (pair[1].y - pair[0].y) * t;
                assert!((streamer.height_at(x) - expected).abs() < 1.0e-3);
            }
        }
    }

    #[test]
    fn height_outside_resident_chunks_uses_fallback() {
        let config = TerrainConfig {
            fallback_height: -7.5,
            ..wide_chunks()
        };
        let (mut streamer, mut world) = streamer_and_world(&config);
        assert_eq!(streamer.height_at(10.0), -7.5);

        streamer.update(&mut world, 0.0, 800.0);
        assert_eq!(streamer.height_at(50_000.0), -7.5);
        assert_eq!(streamer.height_at(10.0), config.base_y);
    }

    #[test]
    fn segment_quads_hang_below_the_surface() {
        let config = wide_chunks();
        let (mut streamer, mut world) = streamer_and_world(&config);
        streamer.update(&mut world, 0.0, 800.0);

        for body in world.bodies.values() {
            let BodyShape::Polygon { points } = &body.desc.shape else {
                panic!("terrain segments are polygons");
            };
            assert_eq!(points.len(), 4);
            assert!(body.desc.fixed);
            let top = points[0].y.max(points[1].y);
            let bottom = points[2].y.min(points[3].y);
            assert!(top - bottom >= config.collision_depth - 1.0e-4);
            assert_eq!(body.desc.friction, config.friction);
        }
    }

    #[test]
    fn invalid_chunk_width_is_rejected() {
        let config = TerrainConfig {
            chunk_width: -1.0,
            ..TerrainConfig::default()
        };
        assert!(TerrainStreamer::new(&config).is_err());
    }
}
