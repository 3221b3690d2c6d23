pub mod feedback;
pub mod physics;
pub mod render;
pub mod rider;
pub mod session;
pub mod terrain;

use crate::config::{CameraConfig, GameConfig};
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use feedback::FeedbackGameplayPlugin;
use physics::rapier::RapierWorld;
use render::RenderGameplayPlugin;
use session::{ButtonState, ControlInput, RunEvent, Session};

const FALLBACK_WINDOW_SIZE_PX: Vec2 = Vec2::new(1_280.0, 720.0);

pub struct GameplayPlugin;

impl Plugin for GameplayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RiderInputBindings>()
            .init_resource::<RiderControls>()
            .add_message::<RunEvent>()
            .add_systems(
                Update,
                start_session
                    .run_if(resource_exists_and_changed::<GameConfig>)
                    .run_if(not(resource_exists::<ActiveRun>)),
            )
            .add_systems(
                Update,
                (
                    read_rider_input,
                    forward_config_changes.run_if(resource_exists_and_changed::<GameConfig>),
                    sync_view_size,
                    tick_session,
                    sync_camera_transform,
                )
                    .chain()
                    .in_set(RunTickSet)
                    .run_if(resource_exists::<ActiveRun>),
            )
            .add_plugins(FeedbackGameplayPlugin)
            .add_plugins(RenderGameplayPlugin);
    }
}

/// Systems that advance the active run. Anything reading `RunEvent` or the session
/// for display runs after this set.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunTickSet;

#[derive(Resource)]
pub struct ActiveRun {
    pub session: Session<RapierWorld>,
}

#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct RiderControls {
    pub input: ControlInput,
}

#[derive(Resource, Debug, Clone)]
struct RiderInputBindings {
    pedal: Vec<KeyCode>,
    brake: Vec<KeyCode>,
    lean_left: Vec<KeyCode>,
    lean_right: Vec<KeyCode>,
    turn: Vec<KeyCode>,
    start: Vec<KeyCode>,
}

impl Default for RiderInputBindings {
    fn default() -> Self {
        Self {
            pedal: vec![KeyCode::ArrowUp, KeyCode::KeyW],
            brake: vec![KeyCode::ArrowDown, KeyCode::KeyS],
            lean_left: vec![KeyCode::ArrowLeft, KeyCode::KeyA],
            lean_right: vec![KeyCode::ArrowRight, KeyCode::KeyD],
            turn: vec![KeyCode::KeyZ],
            start: vec![KeyCode::Space],
        }
    }
}

fn button_state(keyboard: &ButtonInput<KeyCode>, keys: &[KeyCode]) -> ButtonState {
    ButtonState {
        held: keys.iter().any(|key| keyboard.pressed(*key)),
        just_pressed: keys.iter().any(|key| keyboard.just_pressed(*key)),
    }
}

fn window_view_size(
    window_query: &Query<&Window, With<PrimaryWindow>>,
    camera: &CameraConfig,
) -> Vec2 {
    let window_px = window_query
        .single()
        .map(|window| Vec2::new(window.width(), window.height()))
        .unwrap_or(FALLBACK_WINDOW_SIZE_PX);
    window_px.max(Vec2::ONE) * camera.meters_per_pixel
}

fn start_session(
    mut commands: Commands,
    config: Res<GameConfig>,
    window_query: Query<&Window, With<PrimaryWindow>>,
) {
    let view_size = window_view_size(&window_query, &config.game.camera);
    match Session::<RapierWorld>::new(&config, view_size) {
        Ok(session) => {
            info!(
                "Run session ready: {} terrain chunk(s), view {:.1} x {:.1} m.",
                session.streamer().chunk_count(),
                view_size.x,
                view_size.y
            );
            commands.insert_resource(ActiveRun { session });
        }
        Err(error) => {
            error!("Could not start a run; fix the config and press F5: {error}");
        }
    }
}

fn read_rider_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    bindings: Res<RiderInputBindings>,
    mut controls: ResMut<RiderControls>,
) {
    controls.input = ControlInput {
        pedal: button_state(&keyboard, &bindings.pedal),
        brake: button_state(&keyboard, &bindings.brake),
        lean_left: button_state(&keyboard, &bindings.lean_left),
        lean_right: button_state(&keyboard, &bindings.lean_right),
        turn: button_state(&keyboard, &bindings.turn),
        start: button_state(&keyboard, &bindings.start),
    };
}

fn forward_config_changes(config: Res<GameConfig>, mut run: ResMut<ActiveRun>) {
    match run.session.set_config(&config) {
        Ok(()) => debug!("Run config updated; changes apply from the next run."),
        Err(error) => warn!("Ignoring config update for the active run: {error}"),
    }
}

fn sync_view_size(
    window_query: Query<&Window, With<PrimaryWindow>>,
    mut run: ResMut<ActiveRun>,
    mut camera_query: Query<&mut Projection, With<Camera2d>>,
) {
    let camera = run.session.config().game.camera.clone();
    let view_size = window_view_size(&window_query, &camera);
    if run.session.camera().view_size != view_size {
        run.session.set_view_size(view_size);
    }

    let Ok(mut projection) = camera_query.single_mut() else {
        return;
    };
    if let Projection::Orthographic(ortho) = &mut *projection {
        if ortho.scale != camera.meters_per_pixel {
            ortho.scale = camera.meters_per_pixel;
        }
    }
}

fn tick_session(
    time: Res<Time>,
    controls: Res<RiderControls>,
    mut run: ResMut<ActiveRun>,
    mut run_events: MessageWriter<RunEvent>,
) {
    match run.session.tick(time.delta_secs(), &controls.input) {
        Ok(events) => {
            for event in events {
                run_events.write(event);
            }
        }
        Err(error) => error!("Run tick failed: {error}"),
    }
}

fn sync_camera_transform(
    run: Res<ActiveRun>,
    mut camera_query: Query<&mut Transform, With<Camera2d>>,
) {
    let Ok(mut camera_transform) = camera_query.single_mut() else {
        return;
    };
    let center = run.session.camera().center();
    camera_transform.translation.x = center.x;
    camera_transform.translation.y = center.y;
}
