use crate::config::{CameraConfig, ConfigError, GameConfig};
use crate::gameplay::physics::{BodyLabel, PhysicsError, PhysicsWorld, Pose};
use crate::gameplay::rider::PelicanBike;
use crate::gameplay::terrain::TerrainStreamer;
use bevy::log::info;
use bevy::math::Vec2;
use bevy::prelude::Message;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunState {
    #[default]
    Ready,
    Playing,
    Crashing,
    GameOver,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    pub held: bool,
    pub just_pressed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlInput {
    pub pedal: ButtonState,
    pub brake: ButtonState,
    pub lean_left: ButtonState,
    pub lean_right: ButtonState,
    pub turn: ButtonState,
    pub start: ButtonState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashCause {
    Tilt,
    HeadStrike,
}

#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub enum RunEvent {
    Started,
    CrashStarted {
        cause: CrashCause,
        distance: f32,
        position: Vec2,
    },
    CrashSettled {
        distance: f32,
    },
    Reset,
}

/// Bottom-left anchored view that trails the rider with exponential smoothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowCamera {
    pub origin: Vec2,
    pub view_size: Vec2,
}

impl FollowCamera {
    pub fn target_origin(focus: Vec2, view_size: Vec2, config: &CameraConfig) -> Vec2 {
        focus - view_size * Vec2::new(config.offset_x, 1.0 - config.offset_y)
    }

    pub fn snap_to(&mut self, focus: Vec2, config: &CameraConfig) {
        self.origin = Self::target_origin(focus, self.view_size, config);
    }

    pub fn follow(&mut self, focus: Vec2, config: &CameraConfig, dt: f32) {
        let target = Self::target_origin(focus, self.view_size, config);
        let blend = 1.0 - (-config.follow_rate * dt.max(0.0)).exp();
        self.origin += (target - self.origin) * blend;
    }

    pub fn center(&self) -> Vec2 {
        self.origin + self.view_size * 0.5
    }
}

/// Sizes of the rig that is actually running. A pending config only applies after reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigDimensions {
    pub wheel_radius: f32,
    pub body_radius: f32,
    pub head_radius: f32,
    pub neck_length: f32,
    pub sample_interval: f32,
}

#[derive(Debug, Clone)]
pub struct RenderSnapshot<'a> {
    pub terrain: &'a [Vec2],
    pub rear_wheel: Pose,
    pub front_wheel: Pose,
    pub frame: Pose,
    pub body: Pose,
    pub head: Pose,
    pub neck_base: Vec2,
    pub crank_angle: f32,
    pub facing: f32,
    pub camera: FollowCamera,
    pub distance: f32,
    pub balance: f32,
    pub rig: RigDimensions,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionDiagnostics {
    pub state: RunState,
    pub resident_chunks: usize,
    pub terrain_segments: usize,
    pub bodies: usize,
    pub joints: usize,
    pub seat_stiffness: Option<f32>,
    pub neck_stiffness: Option<f32>,
    pub crash_elapsed: f32,
    pub speed: f32,
}

#[derive(Debug)]
pub enum SessionError {
    Config(ConfigError),
    Physics(PhysicsError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(error) => write!(f, "invalid run configuration: {error}"),
            Self::Physics(error) => write!(f, "failed to build run: {error}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(error) => Some(error),
            Self::Physics(error) => Some(error),
        }
    }
}

impl From<ConfigError> for SessionError {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

impl From<PhysicsError> for SessionError {
    fn from(error: PhysicsError) -> Self {
        Self::Physics(error)
    }
}

struct RunParts<W> {
    world: W,
    streamer: TerrainStreamer,
    rider: PelicanBike,
    camera: FollowCamera,
}

/// One run of the game: owns the physics world, terrain and rig, and advances them
/// once per frame. A reset throws all of it away and builds it again.
pub struct Session<W: PhysicsWorld> {
    config: GameConfig,
    world: W,
    streamer: TerrainStreamer,
    rider: PelicanBike,
    camera: FollowCamera,
    state: RunState,
    overlay_alpha: f32,
}

impl<W: PhysicsWorld> Session<W> {
    pub fn new(config: &GameConfig, view_size: Vec2) -> Result<Self, SessionError> {
        config.validate()?;
        let parts = Self::build(config, view_size)?;
        Ok(Self {
            config: config.clone(),
            world: parts.world,
            streamer: parts.streamer,
            rider: parts.rider,
            camera: parts.camera,
            state: RunState::Ready,
            overlay_alpha: 0.0,
        })
    }

    fn build(config: &GameConfig, view_size: Vec2) -> Result<RunParts<W>, SessionError> {
        let mut world = W::create(&config.game.physics);
        let mut streamer = TerrainStreamer::new(&config.game.terrain)?;
        let start_x = config.game.app.start_x;

        let mut camera = FollowCamera {
            origin: Vec2::ZERO,
            view_size,
        };
        let ground_guess = streamer.generator().height_at(start_x);
        camera.snap_to(Vec2::new(start_x, ground_guess), &config.game.camera);
        streamer.update(&mut world, camera.origin.x, camera.view_size.x);

        let ground_y = streamer.height_at(start_x);
        let rider = PelicanBike::spawn(&mut world, &config.rider, start_x, ground_y)?;
        camera.snap_to(rider.position(&world), &config.game.camera);

        Ok(RunParts {
            world,
            streamer,
            rider,
            camera,
        })
    }

    /// Rebuilds the world from the stored config. Counts as a fresh run in `Ready`.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        let parts = Self::build(&self.config, self.camera.view_size)?;
        self.world = parts.world;
        self.streamer = parts.streamer;
        self.rider = parts.rider;
        self.camera = parts.camera;
        self.state = RunState::Ready;
        self.overlay_alpha = 0.0;
        info!("Run reset; world rebuilt.");
        Ok(())
    }

    /// Swaps the config used by the next reset. The running world is left alone.
    pub fn set_config(&mut self, config: &GameConfig) -> Result<(), SessionError> {
        config.validate()?;
        self.config = config.clone();
        Ok(())
    }

    pub fn set_view_size(&mut self, view_size: Vec2) {
        if view_size.is_finite() && view_size.x > 0.0 && view_size.y > 0.0 {
            self.camera.view_size = view_size;
        }
    }

    pub fn tick(
        &mut self,
        raw_dt: f32,
        input: &ControlInput,
    ) -> Result<Vec<RunEvent>, SessionError> {
        let dt = if raw_dt.is_finite() {
            raw_dt.clamp(0.0, self.config.game.app.max_frame_dt)
        } else {
            0.0
        };
        let mut events = Vec::new();

        match self.state {
            RunState::Ready if input.pedal.held || input.start.just_pressed => {
                self.state = RunState::Playing;
                info!("Run started.");
                events.push(RunEvent::Started);
            }
            RunState::GameOver if input.start.just_pressed => {
                self.reset()?;
                events.push(RunEvent::Reset);
                return Ok(events);
            }
            _ => {}
        }

        if self.state == RunState::Playing {
            self.actuate(input);
        }
        if matches!(self.state, RunState::Ready | RunState::Playing) {
            self.rider.hold_posture(&mut self.world);
            self.rider.stabilize(&mut self.world);
        }

        if self.state != RunState::GameOver {
            self.world.step(dt);
        }
        let collisions = self.world.drain_collision_starts();

        self.streamer.update(&mut self.world, self.camera.origin.x, self.camera.view_size.x);

        if self.state != RunState::GameOver {
            self.rider.update(&mut self.world, dt);
        }

        match self.state {
            RunState::Playing => {
                let head_strike = collisions.iter().any(|(a, b)| {
                    (*a == BodyLabel::Terrain && b.is_pelican())
                        || (*b == BodyLabel::Terrain && a.is_pelican())
                });
                let cause = if head_strike {
                    Some(CrashCause::HeadStrike)
                } else if self.rider.should_crash(&self.world) {
                    Some(CrashCause::Tilt)
                } else {
                    None
                };
                if let Some(cause) = cause {
                    events.push(self.start_crash(cause));
                }
            }
            RunState::Crashing => {
                if self.rider.is_settled(&self.world) {
                    let distance = self.distance();
                    self.state = RunState::GameOver;
                    self.overlay_alpha = 0.0;
                    info!(
                        "Crash settled after {:.2} s at {distance:.1} m.",
                        self.rider.crash_elapsed()
                    );
                    events.push(RunEvent::CrashSettled { distance });
                }
            }
            RunState::GameOver => {
                let fade = self.config.game.app.overlay_fade_per_second;
                self.overlay_alpha = (self.overlay_alpha + fade * dt).min(1.0);
            }
            RunState::Ready => {}
        }

        let focus = self.rider.position(&self.world);
        self.camera.follow(focus, &self.config.game.camera, dt);
        Ok(events)
    }

    fn actuate(&mut self, input: &ControlInput) {
        if input.pedal.held {
            self.rider.pedal(&mut self.world);
        }
        if input.brake.held {
            self.rider.brake(&mut self.world);
        }
        if input.lean_left.held {
            self.rider.lean(&mut self.world, -1.0);
        }
        if input.lean_right.held {
            self.rider.lean(&mut self.world, 1.0);
        }
        if input.turn.just_pressed {
            self.rider.turn_around();
        }
    }

    fn start_crash(&mut self, cause: CrashCause) -> RunEvent {
        self.rider.trigger_crash(&mut self.world);
        self.state = RunState::Crashing;
        let distance = self.distance();
        let position = self.rider.position(&self.world);
        info!(
            "Crash started ({cause:?}) at {distance:.1} m, angle {:.2} rad.",
            self.rider.angle(&self.world)
        );
        RunEvent::CrashStarted {
            cause,
            distance,
            position,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn distance(&self) -> f32 {
        self.rider.distance(&self.world)
    }

    pub fn overlay_alpha(&self) -> f32 {
        self.overlay_alpha
    }

    pub fn camera(&self) -> &FollowCamera {
        &self.camera
    }

    pub fn rider(&self) -> &PelicanBike {
        &self.rider
    }

    pub fn streamer(&self) -> &TerrainStreamer {
        &self.streamer
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    #[cfg(test)]
    pub(crate) fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn snapshot(&self) -> RenderSnapshot<'_> {
        let world = &self.world;
        let rider = &self.rider;
        let angle = rider.angle(world);
        let crash_angle = rider.crash_angle();
        let pelican = rider.pelican.config();
        RenderSnapshot {
            terrain: self.streamer.points(),
            rear_wheel: world.pose(rider.bicycle.rear_wheel),
            front_wheel: world.pose(rider.bicycle.front_wheel),
            frame: world.pose(rider.bicycle.frame),
            body: rider.pelican.body_pose(world),
            head: rider.pelican.head_pose(world),
            neck_base: rider.pelican.neck_base(),
            crank_angle: rider.bicycle.crank_angle(),
            facing: rider.facing(),
            camera: self.camera,
            distance: rider.distance(world),
            balance: (angle / crash_angle).clamp(-1.0, 1.0),
            rig: RigDimensions {
                wheel_radius: rider.bicycle.config().wheel_radius,
                body_radius: pelican.body_radius,
                head_radius: pelican.head_radius,
                neck_length: pelican.neck_length,
                sample_interval: self.streamer.generator().config().sample_interval,
            },
        }
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        let world = &self.world;
        SessionDiagnostics {
            state: self.state,
            resident_chunks: self.streamer.chunk_count(),
            terrain_segments: self.streamer.segment_count(),
            bodies: world.body_count(),
            joints: world.joint_count(),
            seat_stiffness: world.joint_stiffness(self.rider.seat()),
            neck_stiffness: self
                .rider
                .pelican
                .neck()
                .and_then(|neck| world.joint_stiffness(neck)),
            crash_elapsed: self.rider.crash_elapsed(),
            speed: self.rider.speed(world),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiderFile;
    use crate::gameplay::physics::mock::MockWorld;
    use crate::gameplay::physics::rapier::RapierWorld;

    const VIEW: Vec2 = Vec2::new(32.0, 18.0);
    const FRAME_DT: f32 = 1.0 / 60.0;

    fn session() -> Session<MockWorld> {
        Session::new(&GameConfig::default(), VIEW).expect("default config builds a run")
    }

    fn pressed() -> ButtonState {
        ButtonState {
            held: true,
            just_pressed: true,
        }
    }

    fn start_input() -> ControlInput {
        ControlInput {
            start: pressed(),
            ..ControlInput::default()
        }
    }

    fn tilt_frame(session: &mut Session<MockWorld>, angle: f32) {
        let frame = session.rider().bicycle.frame;
        let position = session.rider().position(session.world());
        session.world_mut().set_pose(frame, Pose { position, angle });
    }

    fn crash(session: &mut Session<MockWorld>) {
        session.tick(FRAME_DT, &start_input()).expect("tick");
        tilt_frame(session, 1.4);
        let events = session.tick(FRAME_DT, &ControlInput::default()).expect("tick");
        assert!(matches!(
            events.as_slice(),
            [RunEvent::CrashStarted {
                cause: CrashCause::Tilt,
                ..
            }]
        ));
    }

    #[test]
    fn new_run_waits_for_input_on_streamed_terrain() {
        let mut session = session();
        assert_eq!(session.state(), RunState::Ready);
        assert!(session.streamer().chunk_count() > 0);
        assert_eq!(
            session.world().body_count(),
            session.streamer().segment_count() + 4
        );

        let events = session.tick(FRAME_DT, &ControlInput::default()).expect("tick");
        assert!(events.is_empty());
        assert_eq!(session.state(), RunState::Ready);
    }

    #[test]
    fn pedal_starts_the_run_and_drives_the_crank() {
        let mut session = session();
        let input = ControlInput {
            pedal: pressed(),
            ..ControlInput::default()
        };
        let events = session.tick(FRAME_DT, &input).expect("tick");
        assert_eq!(events, vec![RunEvent::Started]);
        assert_eq!(session.state(), RunState::Playing);
        assert!(session.rider().bicycle.crank_angle() > 0.0);
    }

    #[test]
    fn frame_time_is_clamped_before_stepping() {
        let mut session = session();
        let max_dt = GameConfig::default().game.app.max_frame_dt;
        session.tick(5.0, &ControlInput::default()).expect("tick");
        assert_eq!(session.world().steps.last().copied(), Some(max_dt));

        let steps = session.world().steps.len();
        session.tick(f32::NAN, &ControlInput::default()).expect("tick");
        session.tick(-1.0, &ControlInput::default()).expect("tick");
        assert_eq!(session.world().steps.len(), steps);
    }

    #[test]
    fn tilt_past_threshold_starts_crash() {
        let mut session = session();
        crash(&mut session);
        assert_eq!(session.state(), RunState::Crashing);
        assert!(session.rider().pelican.is_head_released());
    }

    #[test]
    fn terrain_contact_with_the_pelican_starts_crash() {
        let mut session = session();
        session.tick(FRAME_DT, &start_input()).expect("tick");
        session
            .world_mut()
            .push_collision(BodyLabel::PelicanHead, BodyLabel::Terrain);
        let events = session.tick(FRAME_DT, &ControlInput::default()).expect("tick");
        assert!(matches!(
            events.as_slice(),
            [RunEvent::CrashStarted {
                cause: CrashCause::HeadStrike,
                ..
            }]
        ));
    }

    #[test]
    fn wheel_contact_is_not_a_crash() {
        let mut session = session();
        session.tick(FRAME_DT, &start_input()).expect("tick");
        session
            .world_mut()
            .push_collision(BodyLabel::Terrain, BodyLabel::RearWheel);
        let events = session.tick(FRAME_DT, &ControlInput::default()).expect("tick");
        assert!(events.is_empty());
        assert_eq!(session.state(), RunState::Playing);
    }

    #[test]
    fn collisions_before_the_run_do_not_leak_into_play() {
        let mut session = session();
        session
            .world_mut()
            .push_collision(BodyLabel::Terrain, BodyLabel::PelicanBody);
        session.tick(FRAME_DT, &ControlInput::default()).expect("tick");

        session.tick(FRAME_DT, &start_input()).expect("tick");
        assert_eq!(session.state(), RunState::Playing);
    }

    #[test]
    fn inputs_do_nothing_while_crashing() {
        let mut session = session();
        crash(&mut session);
        let crank = session.rider().bicycle.crank_angle();
        let input = ControlInput {
            pedal: pressed(),
            turn: pressed(),
            ..ControlInput::default()
        };
        session.tick(FRAME_DT, &input).expect("tick");
        assert_eq!(session.rider().bicycle.crank_angle(), crank);
        assert!(session.rider().is_facing_right());
    }

    #[test]
    fn crash_settles_into_game_over_and_freezes_physics() {
        let mut session = session();
        crash(&mut session);

        let mut settled = Vec::new();
        for _ in 0..400 {
            let events = session.tick(FRAME_DT, &ControlInput::default()).expect("tick");
            settled.extend(
                events
                    .into_iter()
                    .filter(|event| matches!(event, RunEvent::CrashSettled { .. })),
            );
            if session.state() == RunState::GameOver {
                break;
            }
        }
        assert_eq!(settled.len(), 1);
        assert_eq!(session.state(), RunState::GameOver);
        let elapsed = session.rider().crash_elapsed();
        assert!(elapsed >= 1.0 - 1.0e-4 && elapsed < 1.1, "elapsed {elapsed}");

        let steps = session.world().steps.len();
        for _ in 0..30 {
            session.tick(FRAME_DT, &ControlInput::default()).expect("tick");
        }
        assert_eq!(session.world().steps.len(), steps);
        assert!(session.overlay_alpha() > 0.5);
        for _ in 0..120 {
            session.tick(FRAME_DT, &ControlInput::default()).expect("tick");
        }
        assert_eq!(session.overlay_alpha(), 1.0);
    }

    #[test]
    fn restart_after_game_over_rebuilds_everything() {
        let mut session = session();
        let fresh_bodies = session.world().body_count();
        crash(&mut session);
        while session.state() != RunState::GameOver {
            session.tick(FRAME_DT, &ControlInput::default()).expect("tick");
        }

        let events = session.tick(FRAME_DT, &start_input()).expect("tick");
        assert_eq!(events, vec![RunEvent::Reset]);
        assert_eq!(session.state(), RunState::Ready);
        assert!(session.world().steps.is_empty());
        assert_eq!(session.world().body_count(), fresh_bodies);
        assert!(!session.rider().is_crashing());
        assert!(!session.rider().pelican.is_head_released());
        assert_eq!(session.overlay_alpha(), 0.0);
    }

    #[test]
    fn camera_eases_toward_the_rider() {
        let mut session = session();
        let config = GameConfig::default();
        let frame = session.rider().bicycle.frame;
        let start = session.rider().position(session.world());
        session.world_mut().set_pose(
            frame,
            Pose {
                position: start + Vec2::new(20.0, 0.0),
                angle: 0.0,
            },
        );

        let before = session.camera().origin;
        session.tick(FRAME_DT, &ControlInput::default()).expect("tick");
        let after = session.camera().origin;
        let target = FollowCamera::target_origin(
            start + Vec2::new(20.0, 0.0),
            VIEW,
            &config.game.camera,
        );
        assert!(after.x > before.x && after.x < target.x);
    }

    #[test]
    fn snapshot_reports_balance_ratio() {
        let mut session = session();
        tilt_frame(&mut session, 0.65);
        let snapshot = session.snapshot();
        assert!((snapshot.balance - 0.5).abs() < 1.0e-5);
        assert!(!snapshot.terrain.is_empty());

        tilt_frame(&mut session, -3.0);
        assert_eq!(session.snapshot().balance, -1.0);
    }

    #[test]
    fn snapshot_sizes_follow_the_running_rig() {
        let mut session = session();
        let mut bigger = GameConfig::default();
        bigger.rider.bicycle.wheel_radius = 0.6;
        bigger.rider.pelican.head_radius = 0.3;
        bigger.game.terrain.sample_interval = 1.0;
        session.set_config(&bigger).expect("valid config");

        let running = RiderFile::default();
        let rig = session.snapshot().rig;
        assert_eq!(rig.wheel_radius, running.bicycle.wheel_radius);
        assert_eq!(rig.head_radius, running.pelican.head_radius);
        assert_eq!(rig.body_radius, running.pelican.body_radius);
        assert_eq!(rig.neck_length, running.pelican.neck_length);
        assert_eq!(rig.sample_interval, 0.5);

        session.reset().expect("reset");
        let rig = session.snapshot().rig;
        assert_eq!(rig.wheel_radius, 0.6);
        assert_eq!(rig.head_radius, 0.3);
        assert_eq!(rig.sample_interval, 1.0);
    }

    fn rapier_session() -> Session<RapierWorld> {
        Session::new(&GameConfig::default(), VIEW).expect("default config builds a rapier run")
    }

    #[test]
    fn waiting_rider_stays_seated_on_a_real_world() {
        let mut session = rapier_session();
        for tick in 0..240 {
            let events = session.tick(FRAME_DT, &ControlInput::default()).expect("tick");
            assert!(events.is_empty());

            let world = session.world();
            let rider = session.rider();
            let frame = rider.bicycle.frame_pose(world);
            let body = rider.pelican.body_pose(world);
            let head = rider.pelican.head_pose(world);
            assert!(
                body.position.y > frame.position.y,
                "tick {tick}: body {} below frame {}",
                body.position.y,
                frame.position.y
            );
            assert!(body.angle.abs() < 0.35, "tick {tick}: body angle {}", body.angle);
            assert!(head.position.y > body.position.y, "tick {tick}: head dipped");
        }
        assert_eq!(session.state(), RunState::Ready);
        assert!(session.distance() < 0.2);
    }

    #[test]
    fn pedalling_moves_the_real_rig_forward() {
        let mut session = rapier_session();
        let start_x = session.rider().position(session.world()).x;
        let pedal = ControlInput {
            pedal: ButtonState {
                held: true,
                just_pressed: false,
            },
            ..ControlInput::default()
        };

        let mut started = false;
        for _ in 0..120 {
            let events = session.tick(FRAME_DT, &pedal).expect("tick");
            started |= events.contains(&RunEvent::Started);
        }

        assert!(started);
        assert_eq!(session.state(), RunState::Playing);
        assert!(session.distance() > 0.3, "distance {}", session.distance());
        assert!(session.rider().position(session.world()).x > start_x);
        assert!(session.rider().angle(session.world()).abs() < 0.5);
    }

    #[test]
    fn real_crash_settles_into_game_over() {
        let mut session = rapier_session();
        session.tick(FRAME_DT, &start_input()).expect("tick");
        let bodies = session.world().body_count();
        let event = session.start_crash(CrashCause::Tilt);
        assert!(matches!(
            event,
            RunEvent::CrashStarted {
                cause: CrashCause::Tilt,
                ..
            }
        ));
        assert_eq!(session.state(), RunState::Crashing);
        assert_eq!(session.world().body_count(), bodies + 1);

        let crash = RiderFile::default().crash;
        let limit = ((crash.settle_max_time + 1.0) / FRAME_DT) as usize;
        let mut settled_after = None;
        for tick in 1..=limit {
            let events = session.tick(FRAME_DT, &ControlInput::default()).expect("tick");
            if events
                .iter()
                .any(|event| matches!(event, RunEvent::CrashSettled { .. }))
            {
                settled_after = Some(tick as f32 * FRAME_DT);
                break;
            }
        }

        let settled_after = settled_after.expect("crash settles before the timeout");
        assert!(settled_after >= crash.settle_min_time - FRAME_DT);
        assert_eq!(session.state(), RunState::GameOver);

        let frozen = session.rider().position(session.world());
        for _ in 0..30 {
            session.tick(FRAME_DT, &ControlInput::default()).expect("tick");
        }
        assert_eq!(session.rider().position(session.world()), frozen);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = GameConfig::default();
        config.game.terrain.chunk_width = 0.0;
        assert!(matches!(
            Session::<MockWorld>::new(&config, VIEW),
            Err(SessionError::Config(_))
        ));
    }
}
