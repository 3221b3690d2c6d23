use crate::gameplay::session::{CrashCause, RunEvent};
use crate::gameplay::RunTickSet;
use bevy::prelude::*;

const CAMERA_SHAKE_DECAY_PER_SECOND: f32 = 1.8;
const CAMERA_SHAKE_MAX_OFFSET_X_M: f32 = 0.9;
const CAMERA_SHAKE_MAX_OFFSET_Y_M: f32 = 0.55;
const TILT_CRASH_TRAUMA: f32 = 0.35;
const HEAD_STRIKE_TRAUMA: f32 = 0.55;
const FEEDBACK_PARTICLE_Z_M: f32 = 5.1;

pub struct FeedbackGameplayPlugin;

impl Plugin for FeedbackGameplayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CameraShakeState>()
            .add_systems(
                Update,
                (
                    collect_feedback_events,
                    decay_camera_shake,
                    update_feedback_particles,
                )
                    .chain()
                    .after(RunTickSet),
            )
            .add_systems(PostUpdate, apply_camera_shake);
    }
}

#[derive(Component, Debug, Clone, Copy)]
struct FeedbackParticle {
    velocity_mps: Vec2,
    gravity_mps2: f32,
    drag_per_second: f32,
    remaining_s: f32,
    total_s: f32,
    initial_alpha: f32,
}

#[derive(Resource, Debug, Clone, Copy)]
struct CameraShakeState {
    trauma: f32,
    rng_state: u64,
}

impl Default for CameraShakeState {
    fn default() -> Self {
        Self {
            trauma: 0.0,
            rng_state: 0x8A37_2BC1_D9E4_1023,
        }
    }
}

impl CameraShakeState {
    fn add_trauma(&mut self, amount: f32) {
        self.trauma = (self.trauma + amount).clamp(0.0, 1.0);
    }

    fn decay(&mut self, dt: f32) {
        self.trauma = (self.trauma - (CAMERA_SHAKE_DECAY_PER_SECOND * dt)).max(0.0);
    }
}

fn crash_trauma(cause: CrashCause) -> f32 {
    match cause {
        CrashCause::Tilt => TILT_CRASH_TRAUMA,
        CrashCause::HeadStrike => HEAD_STRIKE_TRAUMA,
    }
}

fn collect_feedback_events(
    mut commands: Commands,
    mut run_events: MessageReader<RunEvent>,
    mut shake: ResMut<CameraShakeState>,
    particle_query: Query<Entity, With<FeedbackParticle>>,
) {
    for event in run_events.read() {
        match *event {
            RunEvent::CrashStarted {
                cause, position, ..
            } => {
                shake.add_trauma(crash_trauma(cause));
                spawn_crash_dust_particles(&mut commands, position, cause, &mut shake.rng_state);
            }
            RunEvent::Reset => {
                shake.trauma = 0.0;
                for entity in &particle_query {
                    commands.entity(entity).try_despawn();
                }
            }
            RunEvent::Started | RunEvent::CrashSettled { .. } => {}
        }
    }
}

fn decay_camera_shake(time: Res<Time>, mut shake: ResMut<CameraShakeState>) {
    shake.decay(time.delta_secs().max(0.000_1));
}

fn apply_camera_shake(
    mut shake: ResMut<CameraShakeState>,
    mut camera_query: Query<&mut Transform, With<Camera2d>>,
) {
    if shake.trauma <= f32::EPSILON {
        return;
    }

    let shake_amount = shake.trauma * shake.trauma;
    let offset_x =
        next_signed_unit_random(&mut shake.rng_state) * CAMERA_SHAKE_MAX_OFFSET_X_M * shake_amount;
    let offset_y =
        next_signed_unit_random(&mut shake.rng_state) * CAMERA_SHAKE_MAX_OFFSET_Y_M * shake_amount;

    for mut camera_transform in &mut camera_query {
        camera_transform.translation.x += offset_x;
        camera_transform.translation.y += offset_y;
    }
}

fn update_feedback_particles(
    mut commands: Commands,
    time: Res<Time>,
    mut particle_query: Query<(Entity, &mut Transform, &mut Sprite, &mut FeedbackParticle)>,
) {
    let dt = time.delta_secs().max(0.000_1);
    for (entity, mut transform, mut sprite, mut particle) in &mut particle_query {
        particle.velocity_mps.y -= particle.gravity_mps2 * dt;
        let drag = f32::exp(-(particle.drag_per_second.max(0.0) * dt));
        particle.velocity_mps *= drag;
        transform.translation += (particle.velocity_mps * dt).extend(0.0);

        particle.remaining_s -= dt;
        let life_t = (particle.remaining_s / particle.total_s.max(0.001)).clamp(0.0, 1.0);
        let mut color = sprite.color;
        color.set_alpha(particle.initial_alpha * life_t);
        sprite.color = color;
        transform.scale = Vec3::splat(0.45 + (0.55 * life_t));

        if particle.remaining_s <= 0.0 {
            commands.entity(entity).try_despawn();
        }
    }
}

fn spawn_crash_dust_particles(
    commands: &mut Commands,
    world_position: Vec2,
    cause: CrashCause,
    rng_state: &mut u64,
) {
    let count = match cause {
        CrashCause::Tilt => 10,
        CrashCause::HeadStrike => 16,
    };
    for _ in 0..count {
        let x_jitter = next_signed_unit_random(rng_state) * 0.6;
        let launch_speed = lerp(1.8, 5.2, next_unit_random(rng_state));
        let vx = next_signed_unit_random(rng_state) * launch_speed;
        let vy = lerp(1.0, 4.2, next_unit_random(rng_state));
        let size = lerp(0.08, 0.20, next_unit_random(rng_state));
        let lifetime = lerp(0.30, 0.60, next_unit_random(rng_state));
        let alpha = lerp(0.35, 0.72, next_unit_random(rng_state));

        commands.spawn((
            Name::new("CrashDustFx"),
            FeedbackParticle {
                velocity_mps: Vec2::new(vx, vy),
                gravity_mps2: 11.5,
                drag_per_second: 2.4,
                remaining_s: lifetime,
                total_s: lifetime,
                initial_alpha: alpha,
            },
            Sprite::from_color(Color::srgba(0.55, 0.52, 0.48, alpha), Vec2::splat(size)),
            Transform::from_xyz(
                world_position.x + x_jitter,
                world_position.y - 0.2,
                FEEDBACK_PARTICLE_Z_M,
            ),
        ));
    }
}

fn next_signed_unit_random(seed: &mut u64) -> f32 {
    (next_unit_random(seed) * 2.0) - 1.0
}

fn next_unit_random(seed: &mut u64) -> f32 {
    *seed = seed
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1_442_695_040_888_963_407);
    ((*seed >> 32) as u32) as f32 / u32::MAX as f32
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + ((b - a) * t.clamp(0.0, 1.0))
}
