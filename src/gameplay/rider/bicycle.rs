use crate::config::BicycleConfig;
use crate::gameplay::physics::{
    BodyDesc, BodyHandle, BodyLabel, BodyShape, CollisionGroup, JointDesc, PhysicsError,
    PhysicsWorld, Pose,
};
use bevy::math::Vec2;
use std::f32::consts::TAU;

#[derive(Debug, Clone)]
pub struct Bicycle {
    pub rear_wheel: BodyHandle,
    pub front_wheel: BodyHandle,
    pub frame: BodyHandle,
    crank_angle: f32,
    config: BicycleConfig,
}

impl Bicycle {
    /// Spawns both wheels resting on `ground_y`, centered on `x`.
    pub fn spawn<W: PhysicsWorld>(
        world: &mut W,
        config: &BicycleConfig,
        x: f32,
        ground_y: f32,
    ) -> Result<Self, PhysicsError> {
        let half_base = config.wheelbase * 0.5;
        let wheel_y = ground_y + config.wheel_radius;
        let frame_drop = config.wheel_radius + config.frame_lift;
        let frame_y = wheel_y + frame_drop;

        let rear_wheel = add_wheel(
            world,
            config,
            BodyLabel::RearWheel,
            Vec2::new(x - half_base, wheel_y),
        )?;
        let front_wheel = add_wheel(
            world,
            config,
            BodyLabel::FrontWheel,
            Vec2::new(x + half_base, wheel_y),
        )?;

        let mut frame_desc = BodyDesc::dynamic(
            BodyLabel::BikeFrame,
            BodyShape::Rect {
                half_extents: Vec2::new(config.frame_width * 0.5, config.frame_height * 0.5),
            },
            Vec2::new(x, frame_y),
            config.frame_mass,
        );
        frame_desc.friction = config.frame_friction;
        let frame = world
            .add_body(&frame_desc)
            .ok_or(PhysicsError::BodyRejected(BodyLabel::BikeFrame))?;

        world
            .add_joint(&JointDesc::pin(
                frame,
                rear_wheel,
                Vec2::new(-half_base, -frame_drop),
                Vec2::ZERO,
            ))
            .ok_or(PhysicsError::JointRejected("rear axle"))?;
        world
            .add_joint(&JointDesc::pin(
                frame,
                front_wheel,
                Vec2::new(half_base, -frame_drop),
                Vec2::ZERO,
            ))
            .ok_or(PhysicsError::JointRejected("front axle"))?;

        Ok(Self {
            rear_wheel,
            front_wheel,
            frame,
            crank_angle: 0.0,
            config: config.clone(),
        })
    }

    pub fn pedal<W: PhysicsWorld>(&mut self, world: &mut W, direction: f32) {
        if self.speed(world) < self.config.max_speed {
            world.add_torque(self.rear_wheel, -self.config.pedal_torque * direction);
        }
        self.crank_angle = (self.crank_angle + self.config.crank_step * direction).rem_euclid(TAU);
    }

    pub fn brake<W: PhysicsWorld>(&self, world: &mut W) {
        for wheel in [self.rear_wheel, self.front_wheel] {
            let spin = world.angular_velocity(wheel);
            world.set_angular_velocity(wheel, spin * self.config.brake_factor);
        }
    }

    /// Positive `direction` tips the frame clockwise (to the right).
    pub fn lean<W: PhysicsWorld>(&self, world: &mut W, direction: f32) {
        world.add_torque(self.frame, -self.config.lean_torque * direction);
    }

    pub fn frame_pose<W: PhysicsWorld>(&self, world: &W) -> Pose {
        world.pose(self.frame)
    }

    pub fn angle<W: PhysicsWorld>(&self, world: &W) -> f32 {
        world.pose(self.frame).angle
    }

    pub fn speed<W: PhysicsWorld>(&self, world: &W) -> f32 {
        world.linear_velocity(self.frame).length()
    }

    pub fn crank_angle(&self) -> f32 {
        self.crank_angle
    }

    pub fn config(&self) -> &BicycleConfig {
        &self.config
    }
}

fn add_wheel<W: PhysicsWorld>(
    world: &mut W,
    config: &BicycleConfig,
    label: BodyLabel,
    position: Vec2,
) -> Result<BodyHandle, PhysicsError> {
    let mut desc = BodyDesc::dynamic(
        label,
        BodyShape::Circle {
            radius: config.wheel_radius,
        },
        position,
        config.wheel_mass,
    );
    desc.friction = config.wheel_friction;
    desc.restitution = config.wheel_restitution;
    desc.linear_drag = config.wheel_air_drag;
    desc.group = CollisionGroup::Wheel;
    world
        .add_body(&desc)
        .ok_or(PhysicsError::BodyRejected(label))
}
