use super::{
    BodyDesc, BodyHandle, BodyLabel, BodyShape, CollisionGroup, JointDesc, JointHandle,
    JointKind, PhysicsWorld, Pose,
};
use crate::config::PhysicsConfig;
use bevy::log::debug;
use bevy::math::Vec2;
use bevy_rapier2d::rapier::prelude::*;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct CollisionStartCollector {
    starts: Mutex<Vec<(ColliderHandle, ColliderHandle)>>,
}

impl CollisionStartCollector {
    fn drain(&self) -> Vec<(ColliderHandle, ColliderHandle)> {
        match self.starts.lock() {
            Ok(mut starts) => std::mem::take(&mut *starts),
            Err(_) => Vec::new(),
        }
    }
}

impl EventHandler for CollisionStartCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if let CollisionEvent::Started(a, b, _) = event {
            if let Ok(mut starts) = self.starts.lock() {
                starts.push((a, b));
            }
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

#[derive(Debug, Clone, Copy)]
struct BodySlot {
    rigid_body: RigidBodyHandle,
    collider: ColliderHandle,
}

#[derive(Debug, Clone, Copy)]
struct JointSlot {
    joint: ImpulseJointHandle,
    body_a: BodyHandle,
    body_b: BodyHandle,
    rest_length: f32,
    stiffness: f32,
    damping: f32,
    kind: JointKind,
}

/// Self-stepped rapier2d world. Owned by one run session and rebuilt on reset.
pub struct RapierWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    rigid_bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    collector: CollisionStartCollector,
    bodies: HashMap<BodyHandle, BodySlot>,
    joints: HashMap<JointHandle, JointSlot>,
    next_id: u64,
    stiffness_scale: f32,
    damping_scale: f32,
}

impl RapierWorld {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn rigid_body(&self, body: BodyHandle) -> Option<&RigidBody> {
        let slot = self.bodies.get(&body)?;
        self.rigid_bodies.get(slot.rigid_body)
    }

    fn rigid_body_mut(&mut self, body: BodyHandle) -> Option<&mut RigidBody> {
        let slot = self.bodies.get(&body)?;
        self.rigid_bodies.get_mut(slot.rigid_body)
    }

    fn label_of(&self, collider: ColliderHandle) -> Option<BodyLabel> {
        let collider = self.colliders.get(collider)?;
        BodyLabel::from_bits(collider.user_data)
    }

    fn spring_coefficients(&self, stiffness: f32, damping: f32) -> (Real, Real) {
        (
            stiffness.max(0.0) * self.stiffness_scale,
            damping.max(0.0) * self.damping_scale,
        )
    }

    fn collider_builder(shape: &BodyShape) -> Option<ColliderBuilder> {
        if shape.is_degenerate() {
            return None;
        }
        match shape {
            BodyShape::Circle { radius } => Some(ColliderBuilder::ball(*radius)),
            BodyShape::Rect { half_extents } => {
                Some(ColliderBuilder::cuboid(half_extents.x, half_extents.y))
            }
            BodyShape::Polygon { points } => {
                let points: Vec<Point<Real>> =
                    points.iter().map(|point| point![point.x, point.y]).collect();
                ColliderBuilder::convex_hull(&points)
            }
        }
    }
}

fn interaction_groups(group: CollisionGroup) -> InteractionGroups {
    InteractionGroups::all()
        .with_memberships(Group::from_bits_truncate(group.membership_bit()))
        .with_filter(Group::from_bits_truncate(group.filter_bits()))
}

impl PhysicsWorld for RapierWorld {
    fn create(config: &PhysicsConfig) -> Self {
        Self {
            gravity: vector![0.0, -config.gravity],
            integration_parameters: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            collector: CollisionStartCollector::default(),
            bodies: HashMap::new(),
            joints: HashMap::new(),
            next_id: 0,
            stiffness_scale: config.stiffness_scale,
            damping_scale: config.damping_scale,
        }
    }

    fn add_body(&mut self, desc: &BodyDesc) -> Option<BodyHandle> {
        let Some(collider) = Self::collider_builder(&desc.shape) else {
            debug!("Skipping degenerate {:?} collider.", desc.label);
            return None;
        };

        let builder = if desc.fixed {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic()
        };
        let rigid_body = builder
            .translation(vector![desc.position.x, desc.position.y])
            .rotation(desc.angle)
            .linvel(vector![desc.linear_velocity.x, desc.linear_velocity.y])
            .linear_damping(desc.linear_drag.max(0.0))
            .angular_damping(desc.angular_drag.max(0.0))
            .ccd_enabled(!desc.fixed)
            .user_data(desc.label.to_bits())
            .build();
        let rigid_body = self.rigid_bodies.insert(rigid_body);

        let mut collider = collider
            .friction(desc.friction.max(0.0))
            .restitution(desc.restitution.max(0.0))
            .collision_groups(interaction_groups(desc.group))
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .user_data(desc.label.to_bits());
        if !desc.fixed {
            collider = collider.mass(desc.mass.max(0.001));
        }
        let collider =
            self.colliders
                .insert_with_parent(collider.build(), rigid_body, &mut self.rigid_bodies);

        let handle = BodyHandle(self.next_id());
        self.bodies.insert(
            handle,
            BodySlot {
                rigid_body,
                collider,
            },
        );
        Some(handle)
    }

    fn remove_body(&mut self, body: BodyHandle) {
        let Some(slot) = self.bodies.remove(&body) else {
            return;
        };
        let attached: Vec<JointHandle> = self
            .joints
            .iter()
            .filter(|(_, joint)| joint.body_a == body || joint.body_b == body)
            .map(|(handle, _)| *handle)
            .collect();
        for joint in attached {
            self.remove_joint(joint);
        }
        self.rigid_bodies.remove(
            slot.rigid_body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    fn add_joint(&mut self, desc: &JointDesc) -> Option<JointHandle> {
        let rigid_a = self.bodies.get(&desc.body_a)?.rigid_body;
        let rigid_b = self.bodies.get(&desc.body_b)?.rigid_body;
        let anchor_a = point![desc.anchor_a.x, desc.anchor_a.y];
        let anchor_b = point![desc.anchor_b.x, desc.anchor_b.y];

        let joint: GenericJoint = match desc.kind {
            JointKind::Pin => RevoluteJointBuilder::new()
                .local_anchor1(anchor_a)
                .local_anchor2(anchor_b)
                .build()
                .into(),
            JointKind::Spring => {
                let (stiffness, damping) =
                    self.spring_coefficients(desc.stiffness, desc.damping);
                SpringJointBuilder::new(desc.rest_length.max(0.0), stiffness, damping)
                    .spring_model(MotorModel::AccelerationBased)
                    .local_anchor1(anchor_a)
                    .local_anchor2(anchor_b)
                    .build()
                    .into()
            }
        };
        let joint = self.impulse_joints.insert(rigid_a, rigid_b, joint, true);

        let handle = JointHandle(self.next_id());
        self.joints.insert(
            handle,
            JointSlot {
                joint,
                body_a: desc.body_a,
                body_b: desc.body_b,
                rest_length: desc.rest_length.max(0.0),
                stiffness: desc.stiffness,
                damping: desc.damping,
                kind: desc.kind,
            },
        );
        Some(handle)
    }

    fn remove_joint(&mut self, joint: JointHandle) {
        if let Some(slot) = self.joints.remove(&joint) {
            self.impulse_joints.remove(slot.joint, true);
        }
    }

    fn set_joint_stiffness(&mut self, joint: JointHandle, stiffness: f32) {
        let Some(slot) = self.joints.get_mut(&joint) else {
            return;
        };
        slot.stiffness = stiffness;
        if slot.kind == JointKind::Pin {
            return;
        }

        let slot = *slot;
        let (stiffness, damping) = self.spring_coefficients(slot.stiffness, slot.damping);
        if let Some(impulse_joint) = self.impulse_joints.get_mut(slot.joint, true) {
            impulse_joint
                .data
                .set_motor_position(JointAxis::LinX, slot.rest_length, stiffness, damping);
        }
    }

    fn joint_stiffness(&self, joint: JointHandle) -> Option<f32> {
        self.joints.get(&joint).map(|slot| slot.stiffness)
    }

    fn pose(&self, body: BodyHandle) -> Pose {
        self.rigid_body(body)
            .map(|rigid_body| {
                let translation = rigid_body.translation();
                Pose {
                    position: Vec2::new(translation.x, translation.y),
                    angle: rigid_body.rotation().angle(),
                }
            })
            .unwrap_or_default()
    }

    fn linear_velocity(&self, body: BodyHandle) -> Vec2 {
        self.rigid_body(body)
            .map(|rigid_body| {
                let linvel = rigid_body.linvel();
                Vec2::new(linvel.x, linvel.y)
            })
            .unwrap_or(Vec2::ZERO)
    }

    fn angular_velocity(&self, body: BodyHandle) -> f32 {
        self.rigid_body(body)
            .map(|rigid_body| rigid_body.angvel())
            .unwrap_or(0.0)
    }

    fn set_angular_velocity(&mut self, body: BodyHandle, angular_velocity: f32) {
        if let Some(rigid_body) = self.rigid_body_mut(body) {
            rigid_body.set_angvel(angular_velocity, true);
        }
    }

    fn add_torque(&mut self, body: BodyHandle, torque: f32) {
        if let Some(rigid_body) = self.rigid_body_mut(body) {
            rigid_body.add_torque(torque, true);
        }
    }

    fn add_force(&mut self, body: BodyHandle, force: Vec2) {
        if let Some(rigid_body) = self.rigid_body_mut(body) {
            rigid_body.add_force(vector![force.x, force.y], true);
        }
    }

    fn set_collision_group(&mut self, body: BodyHandle, group: CollisionGroup) {
        let Some(slot) = self.bodies.get(&body).copied() else {
            return;
        };
        if let Some(collider) = self.colliders.get_mut(slot.collider) {
            collider.set_collision_groups(interaction_groups(group));
        }
    }

    fn step(&mut self, dt: f32) {
        if !(dt.is_finite() && dt > 0.0) {
            return;
        }
        self.integration_parameters.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &self.collector,
        );

        for (_, rigid_body) in self.rigid_bodies.iter_mut() {
            rigid_body.reset_forces(false);
            rigid_body.reset_torques(false);
        }
    }

    fn drain_collision_starts(&mut self) -> Vec<(BodyLabel, BodyLabel)> {
        self.collector
            .drain()
            .into_iter()
            .filter_map(|(a, b)| Some((self.label_of(a)?, self.label_of(b)?)))
            .collect()
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn joint_count(&self) -> usize {
        self.joints.len()
    }
}
