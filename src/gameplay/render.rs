use super::session::RenderSnapshot;
use super::{ActiveRun, RunTickSet};
use bevy::prelude::*;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_3, PI};

const LINE_WIDTH_PX: f32 = 2.5;
const INK: Color = Color::srgb(0.10, 0.10, 0.10);
const TERRAIN_INK: Color = Color::srgb(0.16, 0.16, 0.16);
const PELICAN_INK: Color = Color::srgb(0.35, 0.32, 0.30);
const WING_INK: Color = Color::srgb(0.55, 0.52, 0.48);
const BEAK_INK: Color = Color::srgb(0.95, 0.60, 0.10);
const EYE_INK: Color = Color::srgb(0.05, 0.05, 0.05);
const HATCH_INK: Color = Color::srgb(0.78, 0.78, 0.78);
const TERRAIN_MARGIN_M: f32 = 2.0;
const HATCH_EVERY: usize = 3;
const HATCH_DEPTH_M: f32 = 0.8;
const SPOKE_COUNT: usize = 6;
const NECK_STRETCH_LIMIT: f32 = 1.5;

pub struct RenderGameplayPlugin;

impl Plugin for RenderGameplayPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, configure_line_gizmos).add_systems(
            Update,
            draw_run_gizmos
                .after(RunTickSet)
                .run_if(resource_exists::<ActiveRun>),
        );
    }
}

fn configure_line_gizmos(mut config_store: ResMut<GizmoConfigStore>) {
    let (config, _) = config_store.config_mut::<DefaultGizmoConfigGroup>();
    config.line.width = LINE_WIDTH_PX;
}

fn draw_run_gizmos(mut gizmos: Gizmos, run: Res<ActiveRun>) {
    let snapshot = run.session.snapshot();

    draw_terrain(&mut gizmos, &snapshot);
    draw_bicycle(&mut gizmos, &snapshot);
    draw_pelican(&mut gizmos, &snapshot);
}

fn draw_terrain(gizmos: &mut Gizmos, snapshot: &RenderSnapshot) {
    let camera = snapshot.camera;
    let visible = visible_terrain(
        snapshot.terrain,
        camera.origin.x - TERRAIN_MARGIN_M,
        camera.origin.x + camera.view_size.x + TERRAIN_MARGIN_M,
    );
    if visible.len() < 2 {
        return;
    }
    for (top, bottom) in terrain_hatching(visible, snapshot.rig.sample_interval) {
        gizmos.line_2d(top, bottom, HATCH_INK);
    }
    gizmos.linestrip_2d(visible.iter().copied(), TERRAIN_INK);
}

fn draw_bicycle(gizmos: &mut Gizmos, snapshot: &RenderSnapshot) {
    let radius = snapshot.rig.wheel_radius;

    for wheel in [snapshot.rear_wheel, snapshot.front_wheel] {
        gizmos.circle_2d(wheel.position, radius, INK);
        gizmos.circle_2d(wheel.position, radius * 0.08, INK);
        for (from, to) in wheel_spokes(wheel.position, radius, wheel.angle) {
            gizmos.line_2d(from, to, INK);
        }
    }

    let frame = BikeFrameSketch::new(snapshot, radius);
    let rear = snapshot.rear_wheel.position;
    let front = snapshot.front_wheel.position;
    gizmos.line_2d(rear, frame.seat, INK);
    gizmos.line_2d(frame.seat, front, INK);
    gizmos.line_2d(rear, frame.bottom_bracket, INK);
    gizmos.line_2d(frame.bottom_bracket, frame.seat, INK);
    gizmos.line_2d(front, frame.handlebar, INK);
    let bar = Vec2::from_angle(snapshot.frame.angle) * radius * 0.35;
    gizmos.line_2d(frame.handlebar - bar, frame.handlebar + bar, INK);

    let [left, right] = frame.pedals;
    gizmos.line_2d(left, right, INK);
    for pedal in frame.pedals {
        let half = Vec2::new(radius * 0.2, 0.0);
        gizmos.line_2d(pedal - half, pedal + half, INK);
    }
}

fn draw_pelican(gizmos: &mut Gizmos, snapshot: &RenderSnapshot) {
    let rig = snapshot.rig;
    let facing = snapshot.facing;
    let body = snapshot.body;
    let body_half = Vec2::new(rig.body_radius * 1.25, rig.body_radius);

    let frame = BikeFrameSketch::new(snapshot, rig.wheel_radius);
    let hip = body.transform_point(Vec2::new(0.0, -rig.body_radius * 0.7));
    for pedal in frame.pedals {
        gizmos.line_2d(hip, pedal, PELICAN_INK);
    }

    gizmos.ellipse_2d(
        Isometry2d::new(body.position, Rot2::radians(body.angle)),
        body_half,
        PELICAN_INK,
    );
    let wing_center = body.transform_point(Vec2::new(-0.2 * body_half.x * facing, -0.05));
    gizmos.ellipse_2d(
        Isometry2d::new(wing_center, Rot2::radians(body.angle - 0.15 * facing)),
        body_half * Vec2::new(0.55, 0.6),
        WING_INK,
    );

    let head = snapshot.head;
    let neck_end = clamp_neck(
        snapshot.neck_base,
        head.position - Vec2::new(0.0, rig.head_radius * 0.4),
        rig.neck_length * NECK_STRETCH_LIMIT,
    );
    gizmos.line_2d(snapshot.neck_base, neck_end, PELICAN_INK);

    gizmos.circle_2d(head.position, rig.head_radius, PELICAN_INK);
    let eye = head.transform_point(Vec2::new(
        rig.head_radius * 0.35 * facing,
        rig.head_radius * 0.25,
    ));
    gizmos.circle_2d(eye, rig.head_radius * 0.2, EYE_INK);

    let beak: Vec<Vec2> = beak_outline(rig.head_radius, facing)
        .into_iter()
        .map(|point| head.transform_point(point))
        .collect();
    gizmos.linestrip_2d(beak, BEAK_INK);
}

/// Derived frame points used for drawing; the physics frame is a plain box.
struct BikeFrameSketch {
    seat: Vec2,
    bottom_bracket: Vec2,
    handlebar: Vec2,
    pedals: [Vec2; 2],
}

impl BikeFrameSketch {
    fn new(snapshot: &RenderSnapshot, wheel_radius: f32) -> Self {
        let angle = snapshot.frame.angle;
        let along = Vec2::from_angle(angle);
        let up = Vec2::from_angle(angle + FRAC_PI_2);
        let mid = (snapshot.rear_wheel.position + snapshot.front_wheel.position) * 0.5;

        let seat = mid + up * wheel_radius * 0.9;
        let bottom_bracket = mid - along * wheel_radius * 0.15;
        let handlebar = snapshot.front_wheel.position + up * wheel_radius * 1.35;
        let crank = wheel_radius * 0.4;
        let pedals = [
            bottom_bracket + Vec2::from_angle(snapshot.crank_angle) * crank,
            bottom_bracket + Vec2::from_angle(snapshot.crank_angle + PI) * crank,
        ];

        Self {
            seat,
            bottom_bracket,
            handlebar,
            pedals,
        }
    }
}

fn visible_terrain(points: &[Vec2], left: f32, right: f32) -> &[Vec2] {
    let start = points.partition_point(|point| point.x < left);
    let end = points.partition_point(|point| point.x <= right);
    &points[start.saturating_sub(1)..(end + 1).min(points.len())]
}

/// Slanted strokes hanging below every few samples, anchored to absolute sample
/// indices so they don't crawl while the view scrolls.
fn terrain_hatching(
    points: &[Vec2],
    sample_interval: f32,
) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
    let spacing = sample_interval.max(f32::EPSILON);
    points
        .iter()
        .filter(move |point| {
            ((point.x / spacing).round() as i64).rem_euclid(HATCH_EVERY as i64) == 0
        })
        .map(|point| (*point, *point + Vec2::new(-HATCH_DEPTH_M * 0.5, -HATCH_DEPTH_M)))
}

fn wheel_spokes(center: Vec2, radius: f32, angle: f32) -> [(Vec2, Vec2); SPOKE_COUNT] {
    std::array::from_fn(|index| {
        let direction = Vec2::from_angle(angle + index as f32 * FRAC_PI_3);
        (
            center + direction * radius * 0.08,
            center + direction * radius * 0.95,
        )
    })
}

fn clamp_neck(base: Vec2, end: Vec2, max_length: f32) -> Vec2 {
    let span = end - base;
    let length = span.length();
    if length > max_length && length > f32::EPSILON {
        base + span * (max_length / length)
    } else {
        end
    }
}

/// Closed beak triangle in head-local coordinates.
fn beak_outline(head_radius: f32, facing: f32) -> [Vec2; 4] {
    let root = head_radius * 0.7 * facing;
    let tip = head_radius * 2.8 * facing;
    let top = Vec2::new(root, head_radius * 0.3);
    [
        top,
        Vec2::new(tip, -head_radius * 0.1),
        Vec2::new(root, -head_radius * 0.4),
        top,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(count: usize) -> Vec<Vec2> {
        (0..count)
            .map(|index| Vec2::new(index as f32, index as f32 * 0.5))
            .collect()
    }

    #[test]
    fn visible_terrain_keeps_one_point_past_each_edge() {
        let points = ramp(20);
        let visible = visible_terrain(&points, 4.5, 9.5);
        assert_eq!(visible.first().map(|point| point.x), Some(4.0));
        assert_eq!(visible.last().map(|point| point.x), Some(10.0));
    }

    #[test]
    fn visible_terrain_handles_views_off_the_ends() {
        let points = ramp(5);
        assert_eq!(visible_terrain(&points, -10.0, 100.0).len(), 5);
        assert_eq!(visible_terrain(&points, 50.0, 60.0).len(), 1);
        assert!(visible_terrain(&[], 0.0, 1.0).is_empty());
    }

    #[test]
    fn hatching_hangs_below_the_surface() {
        let points = ramp(12);
        let strokes: Vec<_> = terrain_hatching(&points, 1.0).collect();
        assert_eq!(strokes.len(), 4);
        for (top, bottom) in strokes {
            assert!(bottom.y < top.y);
            assert!(points.contains(&top));
        }
    }

    #[test]
    fn spokes_stay_inside_the_rim() {
        let center = Vec2::new(3.0, 1.0);
        for (from, to) in wheel_spokes(center, 0.35, 0.4) {
            assert!(from.distance(center) < to.distance(center));
            assert!(to.distance(center) < 0.35);
        }
    }

    #[test]
    fn neck_drawing_is_capped_during_crashes() {
        let base = Vec2::ZERO;
        assert_eq!(clamp_neck(base, Vec2::new(0.3, 0.0), 1.0), Vec2::new(0.3, 0.0));
        let capped = clamp_neck(base, Vec2::new(0.0, 4.0), 1.0);
        assert!((capped - Vec2::new(0.0, 1.0)).length() < 1.0e-6);
    }

    #[test]
    fn beak_points_the_way_the_rider_faces() {
        let right = beak_outline(0.14, 1.0);
        let left = beak_outline(0.14, -1.0);
        assert!(right[1].x > 0.0);
        assert!(left[1].x < 0.0);
        assert_eq!(right[0], right[3]);
    }
}
