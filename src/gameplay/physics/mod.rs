pub mod rapier;

#[cfg(test)]
pub mod mock;

use crate::config::PhysicsConfig;
use bevy::prelude::*;
use std::error::Error;
use std::fmt::{Display, Formatter};

const MIN_POLYGON_AREA: f32 = 1.0e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointHandle(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyLabel {
    Terrain,
    RearWheel,
    FrontWheel,
    BikeFrame,
    PelicanBody,
    PelicanHead,
}

impl BodyLabel {
    pub fn is_pelican(self) -> bool {
        matches!(self, Self::PelicanBody | Self::PelicanHead)
    }

    pub(crate) fn to_bits(self) -> u128 {
        match self {
            Self::Terrain => 1,
            Self::RearWheel => 2,
            Self::FrontWheel => 3,
            Self::BikeFrame => 4,
            Self::PelicanBody => 5,
            Self::PelicanHead => 6,
        }
    }

    pub(crate) fn from_bits(bits: u128) -> Option<Self> {
        match bits {
            1 => Some(Self::Terrain),
            2 => Some(Self::RearWheel),
            3 => Some(Self::FrontWheel),
            4 => Some(Self::BikeFrame),
            5 => Some(Self::PelicanBody),
            6 => Some(Self::PelicanHead),
            _ => None,
        }
    }
}

/// Terrain touches everything. Rider parts never touch each other or the wheels;
/// once a crash starts they move to `Ragdoll`, which also lands on the wheels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionGroup {
    Terrain,
    Wheel,
    Rider,
    Ragdoll,
}

impl CollisionGroup {
    pub fn interacts_with(self, other: Self) -> bool {
        use CollisionGroup::*;
        match (self, other) {
            (Terrain, _) | (_, Terrain) => true,
            (Wheel, Wheel) => true,
            (Wheel, Ragdoll) | (Ragdoll, Wheel) => true,
            _ => false,
        }
    }

    pub(crate) fn membership_bit(self) -> u32 {
        match self {
            Self::Terrain => 1 << 0,
            Self::Wheel => 1 << 1,
            Self::Rider => 1 << 2,
            Self::Ragdoll => 1 << 3,
        }
    }

    pub(crate) fn filter_bits(self) -> u32 {
        [Self::Terrain, Self::Wheel, Self::Rider, Self::Ragdoll]
            .into_iter()
            .filter(|other| self.interacts_with(*other))
            .fold(0, |bits, other| bits | other.membership_bit())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyShape {
    Circle { radius: f32 },
    Rect { half_extents: Vec2 },
    Polygon { points: Vec<Vec2> },
}

impl BodyShape {
    pub fn is_degenerate(&self) -> bool {
        match self {
            Self::Circle { radius } => !(radius.is_finite() && *radius > 0.0),
            Self::Rect { half_extents } => {
                !(half_extents.is_finite() && half_extents.x > 0.0 && half_extents.y > 0.0)
            }
            Self::Polygon { points } => {
                points.len() < 3
                    || points.iter().any(|point| !point.is_finite())
                    || polygon_area(points).abs() < MIN_POLYGON_AREA
            }
        }
    }
}

pub fn polygon_area(points: &[Vec2]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for (index, current) in points.iter().enumerate() {
        let next = points[(index + 1) % points.len()];
        twice_area += current.perp_dot(next);
    }
    twice_area * 0.5
}

#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    pub label: BodyLabel,
    pub shape: BodyShape,
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub mass: f32,
    pub friction: f32,
    pub restitution: f32,
    pub linear_drag: f32,
    pub angular_drag: f32,
    pub fixed: bool,
    pub group: CollisionGroup,
}

impl BodyDesc {
    pub fn dynamic(label: BodyLabel, shape: BodyShape, position: Vec2, mass: f32) -> Self {
        Self {
            label,
            shape,
            position,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            mass,
            friction: 0.3,
            restitution: 0.0,
            linear_drag: 0.0,
            angular_drag: 0.0,
            fixed: false,
            group: CollisionGroup::Rider,
        }
    }

    pub fn fixed(label: BodyLabel, shape: BodyShape, position: Vec2) -> Self {
        Self {
            fixed: true,
            group: CollisionGroup::Terrain,
            ..Self::dynamic(label, shape, position, 0.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointKind {
    /// Rigid hinge between the two anchors. Ignores rest length, stiffness and damping.
    Pin,
    /// Damped spring; a zero rest length is still a spring.
    Spring,
}

/// Point-to-point link. `stiffness` and `damping` are dimensionless in `[0, 1]`;
/// backends scale them to their own units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointDesc {
    pub kind: JointKind,
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub anchor_a: Vec2,
    pub anchor_b: Vec2,
    pub rest_length: f32,
    pub stiffness: f32,
    pub damping: f32,
}

impl JointDesc {
    pub fn pin(body_a: BodyHandle, body_b: BodyHandle, anchor_a: Vec2, anchor_b: Vec2) -> Self {
        Self {
            kind: JointKind::Pin,
            body_a,
            body_b,
            anchor_a,
            anchor_b,
            rest_length: 0.0,
            stiffness: 1.0,
            damping: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pose {
    pub position: Vec2,
    pub angle: f32,
}

impl Pose {
    pub fn transform_point(&self, local: Vec2) -> Vec2 {
        self.position + Vec2::from_angle(self.angle).rotate(local)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhysicsError {
    BodyRejected(BodyLabel),
    JointRejected(&'static str),
}

impl Display for PhysicsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BodyRejected(label) => {
                write!(f, "physics world rejected body `{label:?}`")
            }
            Self::JointRejected(name) => {
                write!(f, "physics world rejected joint `{name}`")
            }
        }
    }
}

impl Error for PhysicsError {}

/// Rigid-body collaborator. Lookups on handles that are no longer registered are no-ops
/// and read back as zero.
pub trait PhysicsWorld {
    fn create(config: &PhysicsConfig) -> Self
    where
        Self: Sized;

    /// Returns `None` for degenerate geometry.
    fn add_body(&mut self, desc: &BodyDesc) -> Option<BodyHandle>;
    fn remove_body(&mut self, body: BodyHandle);
    fn add_joint(&mut self, desc: &JointDesc) -> Option<JointHandle>;
    /// Also used by `remove_body` for every joint attached to the body.
    fn remove_joint(&mut self, joint: JointHandle);
    fn set_joint_stiffness(&mut self, joint: JointHandle, stiffness: f32);
    fn joint_stiffness(&self, joint: JointHandle) -> Option<f32>;

    fn pose(&self, body: BodyHandle) -> Pose;
    fn linear_velocity(&self, body: BodyHandle) -> Vec2;
    fn angular_velocity(&self, body: BodyHandle) -> f32;
    fn set_angular_velocity(&mut self, body: BodyHandle, angular_velocity: f32);
    /// Torques and forces act during the next `step` only.
    fn add_torque(&mut self, body: BodyHandle, torque: f32);
    fn add_force(&mut self, body: BodyHandle, force: Vec2);
    fn set_collision_group(&mut self, body: BodyHandle, group: CollisionGroup);

    fn step(&mut self, dt: f32);
    fn drain_collision_starts(&mut self) -> Vec<(BodyLabel, BodyLabel)>;

    fn body_count(&self) -> usize;
    fn joint_count(&self) -> usize;
}
