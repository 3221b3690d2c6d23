use crate::gameplay::{ActiveRun, RunTickSet};
use crate::states::GameState;
use bevy::prelude::*;

const HUD_Z_INDEX: i32 = 190;
const HUD_BAR_BG: Color = Color::srgba(0.90, 0.90, 0.90, 0.85);
const HUD_TEXT_PRIMARY: Color = Color::srgb(0.0, 0.0, 0.0);
const HUD_TEXT_MUTED: Color = Color::srgb(0.60, 0.60, 0.60);
const BALANCE_BAR_WIDTH_PX: f32 = 160.0;
const BALANCE_BAR_HEIGHT_PX: f32 = 8.0;
const BALANCE_DOT_SIZE_PX: f32 = 12.0;
const BALANCE_DANGER_FRACTION: f32 = 0.15;
const BALANCE_SAFE_COLOR: Color = Color::srgb(0.298, 0.686, 0.314);
const BALANCE_WARN_COLOR: Color = Color::srgb(1.0, 0.596, 0.0);
const BALANCE_DANGER_COLOR: Color = Color::srgb(0.957, 0.263, 0.212);
const CONTROLS_HINT: &str = "Up Pedal  |  Down Slow  |  Left/Right Balance  |  Z Turn Around";
const READY_HINT: &str = "Press Up or Space to start!";

pub struct HudPlugin;

impl Plugin for HudPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_hud).add_systems(
            Update,
            (update_hud, sync_ready_hint)
                .after(RunTickSet)
                .run_if(resource_exists::<ActiveRun>),
        );
    }
}

#[derive(Component)]
struct HudRoot;

#[derive(Component)]
struct HudDistanceText;

#[derive(Component)]
struct HudBalanceDot;

#[derive(Component)]
struct HudReadyHint;

fn spawn_hud(mut commands: Commands) {
    commands
        .spawn((
            Name::new("HudRoot"),
            HudRoot,
            Node {
                position_type: PositionType::Absolute,
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                ..default()
            },
            ZIndex(HUD_Z_INDEX),
        ))
        .with_children(|root| {
            root.spawn((
                Name::new("HudTopBar"),
                Node {
                    position_type: PositionType::Absolute,
                    top: Val::Px(0.0),
                    width: Val::Percent(100.0),
                    height: Val::Px(32.0),
                    ..default()
                },
                BackgroundColor(HUD_BAR_BG),
            ));
            root.spawn((
                Name::new("HudBottomBar"),
                Node {
                    position_type: PositionType::Absolute,
                    bottom: Val::Px(0.0),
                    width: Val::Percent(100.0),
                    height: Val::Px(36.0),
                    justify_content: JustifyContent::Center,
                    align_items: AlignItems::Center,
                    ..default()
                },
                BackgroundColor(HUD_BAR_BG),
            ))
            .with_children(|bar| {
                bar.spawn((
                    Text::new(CONTROLS_HINT),
                    TextFont {
                        font_size: 14.0,
                        ..default()
                    },
                    TextColor(HUD_TEXT_MUTED),
                ));
            });

            root.spawn((
                HudDistanceText,
                Text::new("0m"),
                TextFont {
                    font_size: 36.0,
                    ..default()
                },
                TextColor(HUD_TEXT_PRIMARY),
                Node {
                    position_type: PositionType::Absolute,
                    top: Val::Px(44.0),
                    right: Val::Px(20.0),
                    ..default()
                },
            ));

            root.spawn((
                Name::new("HudBalance"),
                Node {
                    position_type: PositionType::Absolute,
                    top: Val::Px(40.0),
                    width: Val::Percent(100.0),
                    flex_direction: FlexDirection::Column,
                    align_items: AlignItems::Center,
                    row_gap: Val::Px(4.0),
                    ..default()
                },
            ))
            .with_children(|balance| {
                balance.spawn((
                    Text::new("Balance"),
                    TextFont {
                        font_size: 11.0,
                        ..default()
                    },
                    TextColor(HUD_TEXT_MUTED),
                ));
                balance
                    .spawn((
                        Name::new("HudBalanceBar"),
                        Node {
                            width: Val::Px(BALANCE_BAR_WIDTH_PX),
                            height: Val::Px(BALANCE_BAR_HEIGHT_PX),
                            ..default()
                        },
                        BackgroundColor(Color::srgb(0.91, 0.91, 0.91)),
                    ))
                    .with_children(|bar| {
                        let danger_width = BALANCE_BAR_WIDTH_PX * BALANCE_DANGER_FRACTION;
                        for left in [0.0, BALANCE_BAR_WIDTH_PX - danger_width] {
                            bar.spawn((
                                Node {
                                    position_type: PositionType::Absolute,
                                    left: Val::Px(left),
                                    width: Val::Px(danger_width),
                                    height: Val::Percent(100.0),
                                    ..default()
                                },
                                BackgroundColor(Color::srgba(1.0, 0.31, 0.31, 0.3)),
                            ));
                        }
                        bar.spawn((
                            Node {
                                position_type: PositionType::Absolute,
                                left: Val::Px(BALANCE_BAR_WIDTH_PX * 0.5 - 1.0),
                                width: Val::Px(2.0),
                                height: Val::Percent(100.0),
                                ..default()
                            },
                            BackgroundColor(Color::srgb(0.8, 0.8, 0.8)),
                        ));
                        bar.spawn((
                            HudBalanceDot,
                            Node {
                                position_type: PositionType::Absolute,
                                left: Val::Px(balance_dot_left(0.0)),
                                top: Val::Px((BALANCE_BAR_HEIGHT_PX - BALANCE_DOT_SIZE_PX) * 0.5),
                                width: Val::Px(BALANCE_DOT_SIZE_PX),
                                height: Val::Px(BALANCE_DOT_SIZE_PX),
                                border: UiRect::all(Val::Px(1.5)),
                                ..default()
                            },
                            BackgroundColor(BALANCE_SAFE_COLOR),
                            BorderColor::all(Color::WHITE),
                        ));
                    });
            });

            root.spawn((
                HudReadyHint,
                Node {
                    position_type: PositionType::Absolute,
                    top: Val::Percent(20.0),
                    width: Val::Percent(100.0),
                    justify_content: JustifyContent::Center,
                    ..default()
                },
                Visibility::Hidden,
            ))
            .with_children(|hint| {
                hint.spawn((
                    Text::new(READY_HINT),
                    TextFont {
                        font_size: 24.0,
                        ..default()
                    },
                    TextColor(HUD_TEXT_PRIMARY),
                ));
            });
        });
}

/// Screen-space lean in [-1, 1], positive when the bike tips clockwise (rightward).
fn screen_lean(balance: f32) -> f32 {
    (-balance).clamp(-1.0, 1.0)
}

fn balance_dot_left(lean: f32) -> f32 {
    let travel = BALANCE_BAR_WIDTH_PX * 0.5 - BALANCE_DOT_SIZE_PX * 0.5;
    BALANCE_BAR_WIDTH_PX * 0.5 + lean.clamp(-1.0, 1.0) * travel - BALANCE_DOT_SIZE_PX * 0.5
}

fn balance_color(lean: f32) -> Color {
    let magnitude = lean.abs();
    if magnitude < 0.4 {
        BALANCE_SAFE_COLOR
    } else if magnitude < 0.7 {
        BALANCE_WARN_COLOR
    } else {
        BALANCE_DANGER_COLOR
    }
}

fn distance_label(distance_m: f32) -> String {
    format!("{}m", distance_m.max(0.0).floor() as u32)
}

fn update_hud(
    run: Res<ActiveRun>,
    mut distance_query: Query<&mut Text, With<HudDistanceText>>,
    mut dot_query: Query<(&mut Node, &mut BackgroundColor), With<HudBalanceDot>>,
) {
    let snapshot = run.session.snapshot();

    if let Ok(mut text) = distance_query.single_mut() {
        let label = distance_label(snapshot.distance);
        if text.0 != label {
            text.0 = label;
        }
    }

    if let Ok((mut node, mut color)) = dot_query.single_mut() {
        let lean = screen_lean(snapshot.balance);
        node.left = Val::Px(balance_dot_left(lean));
        color.0 = balance_color(lean);
    }
}

fn sync_ready_hint(
    state: Res<State<GameState>>,
    mut hint_query: Query<&mut Visibility, With<HudReadyHint>>,
) {
    let next_visibility = if *state.get() == GameState::Ready {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    };
    for mut visibility in &mut hint_query {
        if *visibility != next_visibility {
            *visibility = next_visibility;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_clockwise_tilt_moves_the_dot_left() {
        assert!(screen_lean(0.5) < 0.0);
        assert!(balance_dot_left(screen_lean(0.5)) < balance_dot_left(0.0));
        assert_eq!(screen_lean(-4.0), 1.0);
    }

    #[test]
    fn dot_stays_inside_the_bar() {
        assert_eq!(balance_dot_left(-1.0), 0.0);
        assert_eq!(
            balance_dot_left(1.0),
            BALANCE_BAR_WIDTH_PX - BALANCE_DOT_SIZE_PX
        );
        assert_eq!(
            balance_dot_left(0.0),
            (BALANCE_BAR_WIDTH_PX - BALANCE_DOT_SIZE_PX) * 0.5
        );
    }

    #[test]
    fn dot_color_steps_with_lean() {
        assert_eq!(balance_color(0.1), BALANCE_SAFE_COLOR);
        assert_eq!(balance_color(-0.5), BALANCE_WARN_COLOR);
        assert_eq!(balance_color(0.7), BALANCE_DANGER_COLOR);
    }

    #[test]
    fn distance_is_whole_meters() {
        assert_eq!(distance_label(0.0), "0m");
        assert_eq!(distance_label(17.99), "17m");
        assert_eq!(distance_label(-2.0), "0m");
    }
}
