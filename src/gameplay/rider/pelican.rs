use crate::config::PelicanConfig;
use crate::gameplay::physics::{
    BodyDesc, BodyHandle, BodyLabel, BodyShape, CollisionGroup, JointDesc, JointHandle,
    JointKind, PhysicsError, PhysicsWorld, Pose,
};
use bevy::log::warn;
use bevy::math::Vec2;
use std::f32::consts::FRAC_PI_2;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadPose {
    pub position: Vec2,
    pub angle: f32,
    pub velocity: Vec2,
}

/// The head is either placed from the body pose every tick or, after a crash, a real
/// body hanging off a neck spring. There is no way back to `Tracked`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeadState {
    Tracked(HeadPose),
    Released { body: BodyHandle, neck: JointHandle },
}

#[derive(Debug, Clone)]
pub struct Pelican {
    pub body: BodyHandle,
    head: HeadState,
    neck_base: Vec2,
    config: PelicanConfig,
}

impl Pelican {
    pub fn spawn<W: PhysicsWorld>(
        world: &mut W,
        config: &PelicanConfig,
        position: Vec2,
        facing: f32,
    ) -> Result<Self, PhysicsError> {
        let mut desc = BodyDesc::dynamic(
            BodyLabel::PelicanBody,
            BodyShape::Circle {
                radius: config.body_radius,
            },
            position,
            config.body_mass,
        );
        desc.friction = config.body_friction;
        desc.linear_drag = config.body_air_drag;
        let body = world
            .add_body(&desc)
            .ok_or(PhysicsError::BodyRejected(BodyLabel::PelicanBody))?;

        let mut pelican = Self {
            body,
            head: HeadState::Tracked(HeadPose::default()),
            neck_base: position,
            config: config.clone(),
        };
        pelican.compute_head_position(world, facing);
        Ok(pelican)
    }

    fn neck_base_local(&self, facing: f32) -> Vec2 {
        Vec2::new(
            self.config.neck_offset_x * facing,
            self.config.body_radius - self.config.neck_inset_y,
        )
    }

    pub fn update_neck_base<W: PhysicsWorld>(&mut self, world: &W, facing: f32) {
        let pose = world.pose(self.body);
        self.neck_base = pose.transform_point(self.neck_base_local(facing));
    }

    /// Places the tracked head from the body pose. No-op once the head is released.
    pub fn compute_head_position<W: PhysicsWorld>(&mut self, world: &W, facing: f32) {
        self.update_neck_base(world, facing);
        let HeadState::Tracked(head) = &mut self.head else {
            return;
        };

        let pose = world.pose(self.body);
        let neck_direction = pose.angle + FRAC_PI_2 - self.config.neck_tilt * facing;
        head.position = self.neck_base + Vec2::from_angle(neck_direction) * self.config.neck_length;
        head.angle = pose.angle * self.config.head_angle_factor;
        head.velocity = world.linear_velocity(self.body);
    }

    /// Swaps the tracked head for a simulated one. Returns `false` if the head was
    /// already released or the world refused the new body.
    pub fn release_head<W: PhysicsWorld>(
        &mut self,
        world: &mut W,
        facing: f32,
        neck_stiffness: f32,
    ) -> bool {
        let HeadState::Tracked(tracked) = self.head else {
            return false;
        };

        let mut desc = BodyDesc::dynamic(
            BodyLabel::PelicanHead,
            BodyShape::Circle {
                radius: self.config.head_radius,
            },
            tracked.position,
            self.config.head_mass,
        );
        desc.angle = tracked.angle;
        desc.linear_velocity = tracked.velocity;
        desc.friction = self.config.head_friction;
        desc.linear_drag = self.config.head_air_drag;
        desc.group = CollisionGroup::Ragdoll;
        let Some(head) = world.add_body(&desc) else {
            warn!("Physics world rejected the pelican head; keeping it tracked.");
            return false;
        };

        let neck = world.add_joint(&JointDesc {
            kind: JointKind::Spring,
            body_a: self.body,
            body_b: head,
            anchor_a: self.neck_base_local(facing),
            anchor_b: Vec2::new(0.0, -self.config.head_radius * 0.5),
            rest_length: self.config.neck_length * self.config.release_length_factor,
            stiffness: neck_stiffness,
            damping: self.config.release_damping,
        });
        let Some(neck) = neck else {
            warn!("Physics world rejected the pelican neck; keeping the head tracked.");
            world.remove_body(head);
            return false;
        };

        self.head = HeadState::Released { body: head, neck };
        true
    }

    #[cfg(test)]
    pub fn is_head_released(&self) -> bool {
        matches!(self.head, HeadState::Released { .. })
    }

    pub fn head_pose<W: PhysicsWorld>(&self, world: &W) -> Pose {
        match self.head {
            HeadState::Tracked(head) => Pose {
                position: head.position,
                angle: head.angle,
            },
            HeadState::Released { body, .. } => world.pose(body),
        }
    }

    pub fn head_body(&self) -> Option<BodyHandle> {
        match self.head {
            HeadState::Tracked(_) => None,
            HeadState::Released { body, .. } => Some(body),
        }
    }

    pub fn neck(&self) -> Option<JointHandle> {
        match self.head {
            HeadState::Tracked(_) => None,
            HeadState::Released { neck, .. } => Some(neck),
        }
    }

    pub fn neck_base(&self) -> Vec2 {
        self.neck_base
    }

    pub fn body_pose<W: PhysicsWorld>(&self, world: &W) -> Pose {
        world.pose(self.body)
    }

    pub fn config(&self) -> &PelicanConfig {
        &self.config
    }
}
