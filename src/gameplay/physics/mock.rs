use super::{
    BodyDesc, BodyHandle, BodyLabel, CollisionGroup, JointDesc, JointHandle, PhysicsWorld, Pose,
};
use crate::config::PhysicsConfig;
use bevy::math::Vec2;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct MockBody {
    pub desc: BodyDesc,
    pub pose: Pose,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub group: CollisionGroup,
    pub torque: f32,
    pub force: Vec2,
}

#[derive(Debug, Clone)]
pub struct MockJoint {
    pub desc: JointDesc,
    pub stiffness: f32,
}

/// Scriptable world for rig and session tests. `step` integrates velocities without
/// gravity or contacts; tests drive poses and collisions directly.
#[derive(Debug, Default)]
pub struct MockWorld {
    pub bodies: BTreeMap<BodyHandle, MockBody>,
    pub joints: BTreeMap<JointHandle, MockJoint>,
    pub steps: Vec<f32>,
    collisions: Vec<(BodyLabel, BodyLabel)>,
    next_id: u64,
}

impl MockWorld {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn body(&self, body: BodyHandle) -> Option<&MockBody> {
        self.bodies.get(&body)
    }

    pub fn set_pose(&mut self, body: BodyHandle, pose: Pose) {
        if let Some(entry) = self.bodies.get_mut(&body) {
            entry.pose = pose;
        }
    }

    pub fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec2) {
        if let Some(entry) = self.bodies.get_mut(&body) {
            entry.linear_velocity = velocity;
        }
    }

    pub fn pending_torque(&self, body: BodyHandle) -> f32 {
        self.bodies.get(&body).map(|entry| entry.torque).unwrap_or(0.0)
    }

    pub fn pending_force(&self, body: BodyHandle) -> Vec2 {
        self.bodies
            .get(&body)
            .map(|entry| entry.force)
            .unwrap_or(Vec2::ZERO)
    }

    pub fn push_collision(&mut self, a: BodyLabel, b: BodyLabel) {
        self.collisions.push((a, b));
    }

    pub fn count_label(&self, label: BodyLabel) -> usize {
        self.bodies
            .values()
            .filter(|entry| entry.desc.label == label)
            .count()
    }
}

impl PhysicsWorld for MockWorld {
    fn create(_config: &PhysicsConfig) -> Self {
        Self::default()
    }

    fn add_body(&mut self, desc: &BodyDesc) -> Option<BodyHandle> {
        if desc.shape.is_degenerate() {
            return None;
        }
        let handle = BodyHandle(self.next_id());
        self.bodies.insert(
            handle,
            MockBody {
                desc: desc.clone(),
                pose: Pose {
                    position: desc.position,
                    angle: desc.angle,
                },
                linear_velocity: desc.linear_velocity,
                angular_velocity: 0.0,
                group: desc.group,
                torque: 0.0,
                force: Vec2::ZERO,
            },
        );
        Some(handle)
    }

    fn remove_body(&mut self, body: BodyHandle) {
        if self.bodies.remove(&body).is_none() {
            return;
        }
        let attached: Vec<JointHandle> = self
            .joints
            .iter()
            .filter(|(_, joint)| joint.desc.body_a == body || joint.desc.body_b == body)
            .map(|(handle, _)| *handle)
            .collect();
        for joint in attached {
            self.remove_joint(joint);
        }
    }

    fn add_joint(&mut self, desc: &JointDesc) -> Option<JointHandle> {
        if !self.bodies.contains_key(&desc.body_a) || !self.bodies.contains_key(&desc.body_b) {
            return None;
        }
        let handle = JointHandle(self.next_id());
        self.joints.insert(
            handle,
            MockJoint {
                desc: *desc,
                stiffness: desc.stiffness,
            },
        );
        Some(handle)
    }

    fn remove_joint(&mut self, joint: JointHandle) {
        self.joints.remove(&joint);
    }

    fn set_joint_stiffness(&mut self, joint: JointHandle, stiffness: f32) {
        if let Some(entry) = self.joints.get_mut(&joint) {
            entry.stiffness = stiffness;
        }
    }

    fn joint_stiffness(&self, joint: JointHandle) -> Option<f32> {
        self.joints.get(&joint).map(|entry| entry.stiffness)
    }

    fn pose(&self, body: BodyHandle) -> Pose {
        self.bodies
            .get(&body)
            .map(|entry| entry.pose)
            .unwrap_or_default()
    }

    fn linear_velocity(&self, body: BodyHandle) -> Vec2 {
        self.bodies
            .get(&body)
            .map(|entry| entry.linear_velocity)
            .unwrap_or(Vec2::ZERO)
    }

    fn angular_velocity(&self, body: BodyHandle) -> f32 {
        self.bodies
            .get(&body)
            .map(|entry| entry.angular_velocity)
            .unwrap_or(0.0)
    }

    fn set_angular_velocity(&mut self, body: BodyHandle, angular_velocity: f32) {
        if let Some(entry) = self.bodies.get_mut(&body) {
            entry.angular_velocity = angular_velocity;
        }
    }

    fn add_torque(&mut self, body: BodyHandle, torque: f32) {
        if let Some(entry) = self.bodies.get_mut(&body) {
            entry.torque += torque;
        }
    }

    fn add_force(&mut self, body: BodyHandle, force: Vec2) {
        if let Some(entry) = self.bodies.get_mut(&body) {
            entry.force += force;
        }
    }

    fn set_collision_group(&mut self, body: BodyHandle, group: CollisionGroup) {
        if let Some(entry) = self.bodies.get_mut(&body) {
            entry.group = group;
        }
    }

    fn step(&mut self, dt: f32) {
        if !(dt.is_finite() && dt > 0.0) {
            return;
        }
        self.steps.push(dt);
        for entry in self.bodies.values_mut() {
            if !entry.desc.fixed {
                entry.pose.position += entry.linear_velocity * dt;
                entry.pose.angle += entry.angular_velocity * dt;
            }
            entry.torque = 0.0;
            entry.force = Vec2::ZERO;
        }
    }

    fn drain_collision_starts(&mut self) -> Vec<(BodyLabel, BodyLabel)> {
        std::mem::take(&mut self.collisions)
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn joint_count(&self) -> usize {
        self.joints.len()
    }
}
