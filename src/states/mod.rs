use crate::gameplay::session::{RunEvent, RunState};
use crate::gameplay::{ActiveRun, RunTickSet};
use bevy::prelude::*;

const GAME_OVER_Z_INDEX: i32 = 300;
const GAME_OVER_SCRIM_ALPHA: f32 = 0.85;
const GAME_OVER_TEXT_THRESHOLD: f32 = 0.5;
const GAME_OVER_INK: Color = Color::srgb(0.0, 0.0, 0.0);

/// Mirror of the session's run state so systems can hang off `OnEnter`/`in_state`.
#[derive(States, Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum GameState {
    #[default]
    Ready,
    Playing,
    Crashing,
    GameOver,
}

impl From<RunState> for GameState {
    fn from(state: RunState) -> Self {
        match state {
            RunState::Ready => Self::Ready,
            RunState::Playing => Self::Playing,
            RunState::Crashing => Self::Crashing,
            RunState::GameOver => Self::GameOver,
        }
    }
}

pub struct GameStatePlugin;

impl Plugin for GameStatePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RunSummary>()
            .add_systems(Startup, setup_camera)
            .add_systems(OnEnter(GameState::Ready), enter_ready)
            .add_systems(OnEnter(GameState::Playing), enter_playing)
            .add_systems(OnEnter(GameState::Crashing), enter_crashing)
            .add_systems(OnEnter(GameState::GameOver), enter_game_over)
            .add_systems(OnExit(GameState::GameOver), cleanup_game_over_screen)
            .add_systems(
                Update,
                (record_run_summary, sync_game_state)
                    .chain()
                    .after(RunTickSet)
                    .run_if(resource_exists::<ActiveRun>),
            )
            .add_systems(
                Update,
                fade_game_over_screen
                    .after(RunTickSet)
                    .run_if(in_state(GameState::GameOver))
                    .run_if(resource_exists::<ActiveRun>),
            );
    }
}

#[derive(Component)]
struct GameOverScreenRoot;

#[derive(Component)]
struct GameOverText;

#[derive(Component)]
struct GameOverButton;

#[derive(Resource, Debug, Clone, Default)]
pub struct RunSummary {
    pub last_distance_m: f32,
    pub best_distance_m: f32,
    pub finished_runs: u32,
}

impl RunSummary {
    /// Records a finished run. Returns `true` when it beat the previous best.
    pub fn record(&mut self, distance_m: f32) -> bool {
        let distance_m = distance_m.max(0.0);
        self.last_distance_m = distance_m;
        self.finished_runs = self.finished_runs.saturating_add(1);
        if distance_m > self.best_distance_m {
            self.best_distance_m = distance_m;
            true
        } else {
            false
        }
    }
}

fn setup_camera(mut commands: Commands) {
    commands.spawn(Camera2d);
}

fn enter_ready() {
    info!("Entered state: Ready");
}

fn enter_playing() {
    info!("Entered state: Playing");
}

fn enter_crashing() {
    info!("Entered state: Crashing");
}

fn record_run_summary(mut run_events: MessageReader<RunEvent>, mut summary: ResMut<RunSummary>) {
    for event in run_events.read() {
        if let RunEvent::CrashSettled { distance } = *event {
            let new_best = summary.record(distance);
            info!(
                "Run finished at {:.0} m (best {:.0} m{}).",
                summary.last_distance_m,
                summary.best_distance_m,
                if new_best { ", new record" } else { "" }
            );
        }
    }
}

fn sync_game_state(
    run: Res<ActiveRun>,
    state: Res<State<GameState>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let target = GameState::from(run.session.state());
    if *state.get() != target {
        next_state.set(target);
    }
}

fn traveled_line(distance_m: f32) -> String {
    format!("Your pelican traveled {}m!", distance_m.max(0.0).floor() as u32)
}

fn best_line(summary: &RunSummary) -> String {
    if summary.finished_runs > 1 && summary.last_distance_m >= summary.best_distance_m {
        format!("New best: {}m", summary.best_distance_m.floor() as u32)
    } else {
        format!("Best: {}m", summary.best_distance_m.floor() as u32)
    }
}

fn enter_game_over(mut commands: Commands, summary: Res<RunSummary>) {
    commands
        .spawn((
            Name::new("GameOverOverlay"),
            GameOverScreenRoot,
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                position_type: PositionType::Absolute,
                flex_direction: FlexDirection::Column,
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                row_gap: Val::Px(18.0),
                ..default()
            },
            BackgroundColor(Color::srgba(1.0, 1.0, 1.0, 0.0)),
            ZIndex(GAME_OVER_Z_INDEX),
        ))
        .with_children(|parent| {
            parent.spawn((
                GameOverText,
                Text::new("GAME OVER"),
                TextFont {
                    font_size: 52.0,
                    ..default()
                },
                TextColor(GAME_OVER_INK.with_alpha(0.0)),
            ));
            parent.spawn((
                GameOverText,
                Text::new(traveled_line(summary.last_distance_m)),
                TextFont {
                    font_size: 28.0,
                    ..default()
                },
                TextColor(GAME_OVER_INK.with_alpha(0.0)),
            ));
            parent.spawn((
                GameOverText,
                Text::new(best_line(&summary)),
                TextFont {
                    font_size: 20.0,
                    ..default()
                },
                TextColor(GAME_OVER_INK.with_alpha(0.0)),
            ));
            parent
                .spawn((
                    GameOverButton,
                    Node {
                        width: Val::Px(230.0),
                        height: Val::Px(50.0),
                        justify_content: JustifyContent::Center,
                        align_items: AlignItems::Center,
                        border: UiRect::all(Val::Px(2.0)),
                        ..default()
                    },
                    BorderColor::all(GAME_OVER_INK.with_alpha(0.0)),
                    BackgroundColor(Color::srgba(1.0, 1.0, 1.0, 0.0)),
                ))
                .with_children(|button| {
                    button.spawn((
                        GameOverText,
                        Text::new("Play Again (Space)"),
                        TextFont {
                            font_size: 18.0,
                            ..default()
                        },
                        TextColor(GAME_OVER_INK.with_alpha(0.0)),
                    ));
                });
        });

    info!(
        "Entered state: GameOver ({:.0} m, best {:.0} m)",
        summary.last_distance_m, summary.best_distance_m
    );
}

fn overlay_text_alpha(overlay_alpha: f32) -> f32 {
    if overlay_alpha < GAME_OVER_TEXT_THRESHOLD {
        0.0
    } else {
        1.0
    }
}

#[allow(clippy::type_complexity)]
fn fade_game_over_screen(
    run: Res<ActiveRun>,
    mut root_query: Query<&mut BackgroundColor, With<GameOverScreenRoot>>,
    mut text_query: Query<&mut TextColor, With<GameOverText>>,
    mut button_query: Query<
        (&mut BorderColor, &mut BackgroundColor),
        (With<GameOverButton>, Without<GameOverScreenRoot>),
    >,
) {
    let overlay_alpha = run.session.overlay_alpha().clamp(0.0, 1.0);
    let text_alpha = overlay_text_alpha(overlay_alpha);

    for mut background in &mut root_query {
        background.0 = Color::srgba(1.0, 1.0, 1.0, GAME_OVER_SCRIM_ALPHA * overlay_alpha);
    }
    for mut color in &mut text_query {
        color.0 = GAME_OVER_INK.with_alpha(text_alpha);
    }
    for (mut border, mut background) in &mut button_query {
        *border = BorderColor::all(GAME_OVER_INK.with_alpha(text_alpha));
        background.0 = Color::srgba(1.0, 1.0, 1.0, text_alpha);
    }
}

fn cleanup_game_over_screen(
    mut commands: Commands,
    game_over_query: Query<Entity, With<GameOverScreenRoot>>,
) {
    for entity in &game_over_query {
        commands.entity(entity).try_despawn();
    }
}
