use crate::config::{GameConfig, RiderFile, CONFIG_DIR};
use crate::gameplay::session::SessionDiagnostics;
use crate::gameplay::ActiveRun;
use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

pub struct DebugOverlayPlugin;

impl Plugin for DebugOverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DebugOverlayState>()
            .init_resource::<RiderTuningPanelState>()
            .add_systems(Update, spawn_debug_overlay)
            .add_systems(Update, (toggle_debug_overlays, sync_debug_overlay_visibility).chain())
            .add_systems(Update, toggle_rider_tuning_panel)
            .add_systems(
                Update,
                update_debug_overlay_text.run_if(resource_exists::<ActiveRun>),
            )
            .add_systems(
                EguiPrimaryContextPass,
                rider_tuning_panel_ui.run_if(resource_exists::<GameConfig>),
            );
    }
}

#[derive(Component)]
struct DebugOverlayText;

#[derive(Component)]
struct KeybindOverlayText;

#[derive(Resource, Debug, Clone)]
struct DebugOverlayState {
    stats_visible: bool,
    keybinds_visible: bool,
}

impl Default for DebugOverlayState {
    fn default() -> Self {
        Self {
            stats_visible: true,
            keybinds_visible: false,
        }
    }
}

/// One editable `rider.toml` value: its table, key, slider range and accessor.
struct TuningField {
    section: &'static str,
    key: &'static str,
    range: RangeInclusive<f32>,
    drag_speed: f32,
    value: fn(&mut RiderFile) -> &mut f32,
}

fn tuning_fields() -> Vec<(&'static str, Vec<TuningField>)> {
    vec![
        (
            "Bicycle",
            vec![
                TuningField {
                    section: "bicycle",
                    key: "pedal_torque",
                    range: 0.0..=40.0,
                    drag_speed: 0.05,
                    value: |rider| &mut rider.bicycle.pedal_torque,
                },
                TuningField {
                    section: "bicycle",
                    key: "max_speed",
                    range: 0.5..=30.0,
                    drag_speed: 0.05,
                    value: |rider| &mut rider.bicycle.max_speed,
                },
                TuningField {
                    section: "bicycle",
                    key: "brake_factor",
                    range: 0.5..=0.999,
                    drag_speed: 0.001,
                    value: |rider| &mut rider.bicycle.brake_factor,
                },
                TuningField {
                    section: "bicycle",
                    key: "lean_torque",
                    range: 0.0..=60.0,
                    drag_speed: 0.1,
                    value: |rider| &mut rider.bicycle.lean_torque,
                },
                TuningField {
                    section: "bicycle",
                    key: "wheel_friction",
                    range: 0.0..=3.0,
                    drag_speed: 0.01,
                    value: |rider| &mut rider.bicycle.wheel_friction,
                },
                TuningField {
                    section: "bicycle",
                    key: "frame_mass",
                    range: 0.1..=20.0,
                    drag_speed: 0.05,
                    value: |rider| &mut rider.bicycle.frame_mass,
                },
            ],
        ),
        (
            "Pelican",
            vec![
                TuningField {
                    section: "pelican",
                    key: "body_mass",
                    range: 0.1..=20.0,
                    drag_speed: 0.05,
                    value: |rider| &mut rider.pelican.body_mass,
                },
                TuningField {
                    section: "pelican",
                    key: "neck_length",
                    range: 0.05..=2.0,
                    drag_speed: 0.01,
                    value: |rider| &mut rider.pelican.neck_length,
                },
                TuningField {
                    section: "pelican",
                    key: "lean_body_force",
                    range: 0.0..=40.0,
                    drag_speed: 0.1,
                    value: |rider| &mut rider.pelican.lean_body_force,
                },
                TuningField {
                    section: "pelican",
                    key: "posture_stiffness",
                    range: 0.0..=120.0,
                    drag_speed: 0.1,
                    value: |rider| &mut rider.pelican.posture_stiffness,
                },
            ],
        ),
        (
            "Crash",
            vec![
                TuningField {
                    section: "crash",
                    key: "crash_angle",
                    range: 0.2..=3.0,
                    drag_speed: 0.01,
                    value: |rider| &mut rider.crash.crash_angle,
                },
                TuningField {
                    section: "crash",
                    key: "seat_stiffness",
                    range: 0.0..=1.0,
                    drag_speed: 0.01,
                    value: |rider| &mut rider.crash.seat_stiffness,
                },
                TuningField {
                    section: "crash",
                    key: "neck_stiffness",
                    range: 0.0..=1.0,
                    drag_speed: 0.01,
                    value: |rider| &mut rider.crash.neck_stiffness,
                },
                TuningField {
                    section: "crash",
                    key: "stiffness_duration",
                    range: 0.05..=5.0,
                    drag_speed: 0.01,
                    value: |rider| &mut rider.crash.stiffness_duration,
                },
                TuningField {
                    section: "crash",
                    key: "gyro_factor",
                    range: 0.0..=5.0,
                    drag_speed: 0.01,
                    value: |rider| &mut rider.crash.gyro_factor,
                },
            ],
        ),
    ]
}

#[derive(Resource, Debug, Default)]
struct RiderTuningPanelState {
    visible: bool,
    params: Option<RiderFile>,
    status: String,
}

fn spawn_debug_overlay(
    mut commands: Commands,
    overlay_state: Res<DebugOverlayState>,
    config: Option<Res<GameConfig>>,
    existing_overlay: Query<Entity, With<DebugOverlayText>>,
) {
    if !existing_overlay.is_empty() {
        return;
    }

    let Some(config) = config else {
        return;
    };

    if !config.game.app.debug_overlay {
        return;
    }

    commands.spawn((
        DebugOverlayText,
        Text::new("debug overlay initializing..."),
        TextFont {
            font_size: 14.0,
            ..default()
        },
        TextColor(Color::srgb(0.20, 0.22, 0.25)),
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(12.0),
            top: Val::Px(44.0),
            ..default()
        },
        visibility_for(overlay_state.stats_visible),
        ZIndex(100),
    ));

    commands.spawn((
        KeybindOverlayText,
        Text::new(keybind_overlay_text()),
        TextFont {
            font_size: 15.0,
            ..default()
        },
        TextColor(Color::srgb(0.90, 0.94, 0.97)),
        BackgroundColor(Color::srgba(0.06, 0.08, 0.10, 0.82)),
        BorderColor::all(Color::srgba(0.60, 0.68, 0.74, 0.9)),
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(12.0),
            top: Val::Px(200.0),
            padding: UiRect::axes(Val::Px(10.0), Val::Px(8.0)),
            border: UiRect::all(Val::Px(1.0)),
            ..default()
        },
        visibility_for(overlay_state.keybinds_visible),
        ZIndex(100),
    ));
}

fn visibility_for(visible: bool) -> Visibility {
    if visible {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    }
}

fn toggle_debug_overlays(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut state: ResMut<DebugOverlayState>,
    config: Option<Res<GameConfig>>,
) {
    let Some(config) = config else {
        return;
    };

    if !config.game.app.debug_overlay {
        return;
    }

    if keyboard.just_pressed(KeyCode::F3) {
        state.stats_visible = !state.stats_visible;
        info!(
            "Debug stats overlay {}.",
            if state.stats_visible { "shown" } else { "hidden" }
        );
    }
    if keyboard.just_pressed(KeyCode::KeyH) {
        state.keybinds_visible = !state.keybinds_visible;
        info!(
            "Debug keybind panel {}.",
            if state.keybinds_visible { "shown" } else { "hidden" }
        );
    }
}

#[allow(clippy::type_complexity)]
fn sync_debug_overlay_visibility(
    state: Res<DebugOverlayState>,
    mut stats_query: Query<&mut Visibility, (With<DebugOverlayText>, Without<KeybindOverlayText>)>,
    mut keybind_query: Query<&mut Visibility, (With<KeybindOverlayText>, Without<DebugOverlayText>)>,
) {
    if !state.is_changed() {
        return;
    }

    for mut visibility in &mut stats_query {
        *visibility = visibility_for(state.stats_visible);
    }
    for mut visibility in &mut keybind_query {
        *visibility = visibility_for(state.keybinds_visible);
    }
}

fn update_debug_overlay_text(
    diagnostics: Res<DiagnosticsStore>,
    run: Res<ActiveRun>,
    mut overlay_query: Query<&mut Text, With<DebugOverlayText>>,
) {
    let Ok(mut text) = overlay_query.single_mut() else {
        return;
    };

    let fps = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|value| value.smoothed())
        .unwrap_or(0.0);

    *text = Text::new(debug_overlay_text(
        fps,
        run.session.distance(),
        &run.session.diagnostics(),
    ));
}

fn debug_overlay_text(fps: f64, distance_m: f32, stats: &SessionDiagnostics) -> String {
    format!(
        "FPS: {fps:>5.1}\nState: {state:?}\nDistance: {distance_m:>7.1} m | Speed: {speed:>5.2} m/s\nTerrain: {chunks} chunk(s), {segments} segment(s)\nBodies: {bodies} | Joints: {joints}\nSeat stiffness: {seat} | Neck stiffness: {neck}\nCrash clock: {elapsed:>4.2} s\nHotkeys: F3 stats | H help | V rider tune | F5 reload config",
        state = stats.state,
        speed = stats.speed,
        chunks = stats.resident_chunks,
        segments = stats.terrain_segments,
        bodies = stats.bodies,
        joints = stats.joints,
        seat = format_stiffness(stats.seat_stiffness),
        neck = format_stiffness(stats.neck_stiffness),
        elapsed = stats.crash_elapsed,
    )
}

fn format_stiffness(stiffness: Option<f32>) -> String {
    stiffness
        .map(|value| format!("{value:.3}"))
        .unwrap_or_else(|| "n/a".to_string())
}

fn toggle_rider_tuning_panel(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut panel_state: ResMut<RiderTuningPanelState>,
    config: Option<Res<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::KeyV) {
        return;
    }

    panel_state.visible = !panel_state.visible;
    if panel_state.visible {
        if let Some(config) = config {
            panel_state.params = Some(config.rider.clone());
        }
        info!("Rider tuning panel shown.");
    } else {
        info!("Rider tuning panel hidden.");
    }
}

fn rider_tuning_panel_ui(
    mut egui_contexts: EguiContexts,
    mut panel_state: ResMut<RiderTuningPanelState>,
    mut config: ResMut<GameConfig>,
) {
    if !panel_state.visible {
        return;
    }

    let mut params = panel_state
        .params
        .clone()
        .unwrap_or_else(|| config.rider.clone());

    let mut window_open = panel_state.visible;
    let mut params_changed = false;
    let mut reload_clicked = false;
    let mut apply_clicked = false;
    let status = panel_state.status.clone();

    let Ok(ctx) = egui_contexts.ctx_mut() else {
        return;
    };
    egui::Window::new("Rider Tuning")
        .open(&mut window_open)
        .resizable(true)
        .default_width(520.0)
        .show(ctx, |ui| {
            ui.label("Changes apply from the next run (crash, then Space).");
            ui.separator();

            for (group, fields) in tuning_fields() {
                ui.collapsing(group, |ui| {
                    for field in &fields {
                        params_changed |= tuning_slider_row(
                            ui,
                            field.key,
                            (field.value)(&mut params),
                            field.range.clone(),
                            field.drag_speed,
                        );
                    }
                });
            }

            ui.separator();
            ui.horizontal(|ui| {
                if ui.button("Reload From Config").clicked() {
                    reload_clicked = true;
                }
                if ui.button("Apply To rider.toml").clicked() {
                    apply_clicked = true;
                }
            });

            if !status.is_empty() {
                ui.separator();
                ui.label(status);
            }
        });

    panel_state.visible = window_open;

    if reload_clicked {
        panel_state.params = Some(config.rider.clone());
        panel_state.status = "Reloaded values from current config.".to_string();
        return;
    }

    panel_state.params = Some(params.clone());

    if params_changed {
        let mut candidate = config.clone();
        candidate.rider = params.clone();
        match candidate.validate() {
            Ok(()) => {
                config.rider = params.clone();
                panel_state.status = "Live-tuning active (in-memory config updated).".to_string();
            }
            Err(error) => panel_state.status = format!("Not applied: {error}"),
        }
    }

    if apply_clicked {
        match persist_rider_tuning_and_reload(&mut config, &params) {
            Ok(message) => {
                panel_state.status = message;
                panel_state.params = Some(config.rider.clone());
            }
            Err(error) => panel_state.status = error,
        }
    }
}

fn tuning_slider_row(
    ui: &mut egui::Ui,
    label: &str,
    value: &mut f32,
    slider_range: RangeInclusive<f32>,
    drag_speed: f32,
) -> bool {
    let mut changed = false;
    ui.horizontal(|ui| {
        ui.label(label);
        changed |= ui
            .add(egui::Slider::new(value, slider_range).show_value(false))
            .changed();
        changed |= ui
            .add(egui::DragValue::new(value).speed(drag_speed as f64))
            .changed();
    });
    changed
}

fn persist_rider_tuning_and_reload(
    config: &mut GameConfig,
    params: &RiderFile,
) -> Result<String, String> {
    let config_dir = Path::new(CONFIG_DIR);
    let path = config_dir.join("rider.toml");
    let original_raw = fs::read_to_string(&path)
        .map_err(|error| format!("Failed reading `{}`: {error}", path.display()))?;
    let mut root: toml::Value = toml::from_str(&original_raw)
        .map_err(|error| format!("Failed parsing `{}`: {error}", path.display()))?;

    write_params_to_toml_value(&mut root, params)?;

    let updated_raw = toml::to_string_pretty(&root)
        .map_err(|error| format!("Failed serializing rider TOML: {error}"))?;
    fs::write(&path, updated_raw)
        .map_err(|error| format!("Failed writing `{}`: {error}", path.display()))?;

    match GameConfig::load_from_dir(config_dir) {
        Ok(new_config) => {
            *config = new_config;
            Ok(format!(
                "Applied tuning and saved to {}.",
                path.to_string_lossy()
            ))
        }
        Err(error) => {
            let _ = fs::write(&path, original_raw);
            if let Ok(restored) = GameConfig::load_from_dir(config_dir) {
                *config = restored;
            }
            Err(format!(
                "Apply failed validation: {error}. Reverted `{}`.",
                path.display()
            ))
        }
    }
}

fn write_params_to_toml_value(root: &mut toml::Value, params: &RiderFile) -> Result<(), String> {
    let Some(root_table) = root.as_table_mut() else {
        return Err("rider.toml: root is not a table".to_string());
    };

    let mut params = params.clone();
    for (_, fields) in tuning_fields() {
        for field in fields {
            let section = root_table
                .entry(field.section.to_string())
                .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
            let Some(section) = section.as_table_mut() else {
                return Err(format!(
                    "rider.toml: `{}` is not a table",
                    field.section
                ));
            };
            set_toml_float(section, field.key, *(field.value)(&mut params))?;
        }
    }
    Ok(())
}

fn set_toml_float(
    table: &mut toml::map::Map<String, toml::Value>,
    key: &str,
    value: f32,
) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("`{key}` is not a finite number"));
    }

    table.insert(key.to_string(), toml::Value::Float(value as f64));
    Ok(())
}

fn keybind_overlay_text() -> &'static str {
    "Keybinds\n\
H - Toggle this panel\n\
F3 - Toggle debug stats\n\
V - Toggle rider tuning panel\n\
F5 - Hot-reload config\n\
Up / W - Pedal (starts the run)\n\
Down / S - Brake\n\
Left / A - Lean left\n\
Right / D - Lean right\n\
Z - Turn around\n\
Space - Start / play again"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gameplay::session::RunState;
    use std::collections::HashSet;

    #[test]
    fn tuning_fields_are_unique_and_cover_their_defaults() {
        let mut seen = HashSet::new();
        let mut rider = RiderFile::default();
        for (_, fields) in tuning_fields() {
            for field in fields {
                assert!(seen.insert((field.section, field.key)), "{}", field.key);
                let value = *(field.value)(&mut rider);
                assert!(
                    field.range.contains(&value),
                    "default {} = {value} outside slider range",
                    field.key
                );
            }
        }
    }

    #[test]
    fn tuned_values_are_written_into_their_sections() {
        let mut root: toml::Value = toml::from_str(
            r#"
            [bicycle]
            wheel_radius = 0.35
            pedal_torque = 6.0

            [crash]
            crash_angle = 1.3
            "#,
        )
        .expect("fixture parses");

        let mut params = RiderFile::default();
        params.bicycle.pedal_torque = 9.5;
        params.crash.crash_angle = 1.1;
        write_params_to_toml_value(&mut root, &params).expect("write succeeds");

        assert_eq!(
            root["bicycle"]["pedal_torque"].as_float(),
            Some(9.5_f32 as f64)
        );
        assert_eq!(root["bicycle"]["wheel_radius"].as_float(), Some(0.35));
        assert_eq!(
            root["crash"]["crash_angle"].as_float(),
            Some(1.1_f32 as f64)
        );
        assert!(root["pelican"]["neck_length"].as_float().is_some());
    }

    #[test]
    fn non_finite_values_are_refused() {
        let mut root: toml::Value = toml::from_str("[bicycle]\n").expect("fixture parses");
        let mut params = RiderFile::default();
        params.bicycle.max_speed = f32::NAN;
        let error = write_params_to_toml_value(&mut root, &params).expect_err("NaN rejected");
        assert!(error.contains("max_speed"));
    }

    #[test]
    fn overlay_text_reports_missing_neck_as_na() {
        let stats = SessionDiagnostics {
            state: RunState::Playing,
            resident_chunks: 4,
            terrain_segments: 160,
            bodies: 164,
            joints: 3,
            seat_stiffness: Some(0.6),
            neck_stiffness: None,
            crash_elapsed: 0.0,
            speed: 2.5,
        };
        let text = debug_overlay_text(60.0, 12.0, &stats);
        assert!(text.contains("State: Playing"));
        assert!(text.contains("Seat stiffness: 0.600"));
        assert!(text.contains("Neck stiffness: n/a"));
        assert!(text.contains("4 chunk(s), 160 segment(s)"));
    }
}
