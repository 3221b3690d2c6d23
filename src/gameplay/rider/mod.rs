pub mod bicycle;
pub mod pelican;

use bicycle::Bicycle;
use pelican::Pelican;

use crate::config::{CrashConfig, RiderFile};
use crate::gameplay::physics::{
    CollisionGroup, JointDesc, JointHandle, JointKind, PhysicsError, PhysicsWorld,
};
use bevy::math::Vec2;
use std::f32::consts::{PI, TAU};

/// Pelican seated on a bicycle. Owns the seat spring and the one-way crash transition.
#[derive(Debug, Clone)]
pub struct PelicanBike {
    pub bicycle: Bicycle,
    pub pelican: Pelican,
    seat: JointHandle,
    crash: CrashConfig,
    crashing: bool,
    crash_elapsed: f32,
    facing_right: bool,
    start_x: f32,
}

impl PelicanBike {
    pub fn spawn<W: PhysicsWorld>(
        world: &mut W,
        config: &RiderFile,
        x: f32,
        ground_y: f32,
    ) -> Result<Self, PhysicsError> {
        let bicycle = Bicycle::spawn(world, &config.bicycle, x, ground_y)?;
        let frame_top = bicycle.frame_pose(world).position.y + config.bicycle.frame_height * 0.5;

        let body_radius = config.pelican.body_radius;
        let seat_gap = config.pelican.seat_gap;
        let body_y = frame_top + config.crash.seat_length + body_radius - seat_gap;
        let pelican = Pelican::spawn(world, &config.pelican, Vec2::new(x, body_y), 1.0)?;

        let seat = world
            .add_joint(&JointDesc {
                kind: JointKind::Spring,
                body_a: pelican.body,
                body_b: bicycle.frame,
                anchor_a: Vec2::new(0.0, -(body_radius - seat_gap)),
                anchor_b: Vec2::new(0.0, config.bicycle.frame_height * 0.5),
                rest_length: config.crash.seat_length,
                stiffness: config.crash.seat_stiffness,
                damping: config.crash.seat_damping,
            })
            .ok_or(PhysicsError::JointRejected("seat"))?;

        Ok(Self {
            bicycle,
            pelican,
            seat,
            crash: config.crash.clone(),
            crashing: false,
            crash_elapsed: 0.0,
            facing_right: true,
            start_x: x,
        })
    }

    pub fn facing(&self) -> f32 {
        if self.facing_right {
            1.0
        } else {
            -1.0
        }
    }

    #[cfg(test)]
    pub fn is_facing_right(&self) -> bool {
        self.facing_right
    }

    pub fn position<W: PhysicsWorld>(&self, world: &W) -> Vec2 {
        self.bicycle.frame_pose(world).position
    }

    pub fn distance<W: PhysicsWorld>(&self, world: &W) -> f32 {
        (self.position(world).x - self.start_x).abs()
    }

    pub fn angle<W: PhysicsWorld>(&self, world: &W) -> f32 {
        self.bicycle.angle(world)
    }

    pub fn speed<W: PhysicsWorld>(&self, world: &W) -> f32 {
        self.bicycle.speed(world)
    }

    #[cfg(test)]
    pub fn is_crashing(&self) -> bool {
        self.crashing
    }

    pub fn crash_angle(&self) -> f32 {
        self.crash.crash_angle
    }

    pub fn crash_elapsed(&self) -> f32 {
        self.crash_elapsed
    }

    pub fn seat(&self) -> JointHandle {
        self.seat
    }

    pub fn pedal<W: PhysicsWorld>(&mut self, world: &mut W) {
        if self.crashing {
            return;
        }
        let facing = self.facing();
        self.bicycle.pedal(world, facing);
    }

    pub fn brake<W: PhysicsWorld>(&self, world: &mut W) {
        if self.crashing {
            return;
        }
        self.bicycle.brake(world);
    }

    /// Negative `direction` leans left, positive leans right.
    pub fn lean<W: PhysicsWorld>(&self, world: &mut W, direction: f32) {
        if self.crashing {
            return;
        }
        self.bicycle.lean(world, direction);
        let push = self.pelican.config().lean_body_force * direction.signum();
        world.add_force(self.pelican.body, Vec2::new(push, 0.0));
    }

    pub fn turn_around(&mut self) {
        if self.crashing {
            return;
        }
        self.facing_right = !self.facing_right;
    }

    /// Torque pair between body and frame that keeps the pelican seated upright.
    /// Released on crash, when the seat spring alone holds the body.
    pub fn hold_posture<W: PhysicsWorld>(&self, world: &mut W) {
        if self.crashing {
            return;
        }
        let config = self.pelican.config();
        let frame = self.bicycle.frame;
        let body = self.pelican.body;
        let error = wrap_angle(world.pose(frame).angle - world.pose(body).angle);
        let slip = world.angular_velocity(frame) - world.angular_velocity(body);
        let torque = error * config.posture_stiffness + slip * config.posture_damping;
        world.add_torque(body, torque);
        world.add_torque(frame, -torque);
    }

    /// Self-righting torque that grows with speed. Only acts while riding.
    pub fn stabilize<W: PhysicsWorld>(&self, world: &mut W) {
        if self.crashing {
            return;
        }
        let speed = self.speed(world);
        if speed <= self.crash.gyro_min_speed {
            return;
        }
        let torque = -self.angle(world) * self.crash.gyro_factor * speed;
        world.add_torque(self.bicycle.frame, torque);
    }

    pub fn update<W: PhysicsWorld>(&mut self, world: &mut W, dt: f32) {
        let facing = self.facing();
        if !self.crashing {
            self.pelican.compute_head_position(world, facing);
            return;
        }

        self.crash_elapsed += dt.max(0.0);
        world.set_joint_stiffness(self.seat, self.seat_stiffness_at(self.crash_elapsed));
        if let Some(neck) = self.pelican.neck() {
            world.set_joint_stiffness(neck, self.neck_stiffness_at(self.crash_elapsed));
        }
        self.pelican.update_neck_base(world, facing);
    }

    fn crash_progress(&self, elapsed: f32) -> f32 {
        (elapsed / self.crash.stiffness_duration).clamp(0.0, 1.0)
    }

    pub fn seat_stiffness_at(&self, elapsed: f32) -> f32 {
        let progress = self.crash_progress(elapsed);
        self.crash.seat_stiffness * (1.0 - (1.0 - self.crash.seat_floor) * progress)
    }

    pub fn neck_stiffness_at(&self, elapsed: f32) -> f32 {
        let progress = self.crash_progress(elapsed);
        self.crash.neck_stiffness * (1.0 - (1.0 - self.crash.neck_floor) * progress)
    }

    /// Starts the ragdoll transition. Returns `false` if already crashing.
    pub fn trigger_crash<W: PhysicsWorld>(&mut self, world: &mut W) -> bool {
        if self.crashing {
            return false;
        }
        self.crashing = true;
        self.crash_elapsed = 0.0;

        let facing = self.facing();
        self.pelican.release_head(world, facing, self.crash.neck_stiffness);
        if let Some(head) = self.pelican.head_body() {
            world.set_collision_group(head, CollisionGroup::Ragdoll);
        }
        world.set_collision_group(self.pelican.body, CollisionGroup::Ragdoll);
        world.set_collision_group(self.bicycle.frame, CollisionGroup::Ragdoll);
        true
    }

    pub fn should_crash<W: PhysicsWorld>(&self, world: &W) -> bool {
        !self.crashing && self.angle(world).abs() > self.crash.crash_angle
    }

    pub fn is_settled<W: PhysicsWorld>(&self, world: &W) -> bool {
        if !self.crashing || self.crash_elapsed < self.crash.settle_min_time {
            return false;
        }
        self.speed(world) < self.crash.settle_speed
            || self.crash_elapsed >= self.crash.settle_max_time
    }
}

fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}
