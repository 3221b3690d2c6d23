use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = "config";

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, load_game_config)
            .add_systems(Update, reload_game_config_hotkey)
            .add_systems(
                Update,
                apply_window_title.run_if(resource_exists_and_changed::<GameConfig>),
            );
    }
}

fn apply_window_title(
    config: Res<GameConfig>,
    mut window_query: Query<&mut Window, With<PrimaryWindow>>,
) {
    for mut window in &mut window_query {
        if window.title != config.game.app.title {
            window.title = config.game.app.title.clone();
        }
    }
}

fn load_game_config(mut commands: Commands) {
    let config = GameConfig::load_from_dir(Path::new(CONFIG_DIR)).unwrap_or_else(|error| {
        panic!("failed to load configuration from `{CONFIG_DIR}`: {error}");
    });

    log_config_summary("Loaded", &config);
    info!("Press F5 to hot-reload config files from `{CONFIG_DIR}`.");

    commands.insert_resource(config);
}

fn reload_game_config_hotkey(
    keyboard: Res<ButtonInput<KeyCode>>,
    game_config: Option<ResMut<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::F5) {
        return;
    }

    let Some(mut current_config) = game_config else {
        warn!("Config hot-reload requested, but `GameConfig` resource is not initialized yet.");
        return;
    };

    match GameConfig::load_from_dir(Path::new(CONFIG_DIR)) {
        Ok(new_config) => {
            *current_config = new_config;
            log_config_summary("Hot-reloaded", &current_config);
            info!("Reloaded values apply from the next run.");
        }
        Err(error) => {
            error!("Config hot-reload failed; keeping previous config: {error}");
        }
    }
}

fn log_config_summary(prefix: &str, config: &GameConfig) {
    info!(
        "{prefix} config: chunk {:.1} m @ {:.2} m samples, crash angle {:.2} rad, seat stiffness {:.2}.",
        config.game.terrain.chunk_width,
        config.game.terrain.sample_interval,
        config.rider.crash.crash_angle,
        config.rider.crash.seat_stiffness,
    );
}

#[derive(Resource, Debug, Clone, Default)]
pub struct GameConfig {
    pub game: GameFile,
    pub rider: RiderFile,
}

impl GameConfig {
    pub fn load_from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let game: GameFile = read_toml(&config_dir.join("game.toml"))?;
        let rider: RiderFile = read_toml(&config_dir.join("rider.toml"))?;

        let config = Self { game, rider };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let app = &self.game.app;
        require_positive("game.toml::app.max_frame_dt", app.max_frame_dt)?;
        require_non_negative(
            "game.toml::app.overlay_fade_per_second",
            app.overlay_fade_per_second,
        )?;
        if !app.start_x.is_finite() {
            return Err(ConfigError::Validation(
                "game.toml::app.start_x must be finite".to_string(),
            ));
        }

        self.game.physics.validate()?;
        self.game.terrain.validate()?;
        self.game.camera.validate()?;
        self.rider.bicycle.validate()?;
        self.rider.pelican.validate()?;
        self.rider.crash.validate()?;
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },
    Validation(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse `{}`: {source}", path.display())
            }
            Self::Validation(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

fn require_positive(label: &str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{label} must be > 0")))
    }
}

fn require_non_negative(label: &str, value: f32) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{label} must be >= 0")))
    }
}

fn require_unit_interval(label: &str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{label} must be in [0, 1]"
        )))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GameFile {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub terrain: TerrainConfig,
    #[serde(default)]
    pub camera: CameraConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub title: String,
    pub debug_overlay: bool,
    pub max_frame_dt: f32,
    pub start_x: f32,
    pub overlay_fade_per_second: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Pelican Ride".to_string(),
            debug_overlay: true,
            max_frame_dt: 0.033,
            start_x: 5.0,
            overlay_fade_per_second: 1.8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: f32,
    pub stiffness_scale: f32,
    pub damping_scale: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 12.0,
            stiffness_scale: 4_000.0,
            damping_scale: 60.0,
        }
    }
}

impl PhysicsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_negative("game.toml::physics.gravity", self.gravity)?;
        require_positive("game.toml::physics.stiffness_scale", self.stiffness_scale)?;
        require_non_negative("game.toml::physics.damping_scale", self.damping_scale)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub seed: u32,
    pub chunk_width: f32,
    pub sample_interval: f32,
    pub base_y: f32,
    pub flat_zone: f32,
    pub transition_width: f32,
    pub collision_depth: f32,
    pub base_frequency: f32,
    pub base_octaves: u32,
    pub base_amplitude: f32,
    pub detail_frequency: f32,
    pub detail_offset: f32,
    pub detail_octaves: u32,
    pub detail_amplitude: f32,
    pub hills_frequency: f32,
    pub hills_offset: f32,
    pub hills_octaves: u32,
    pub hills_amplitude: f32,
    pub difficulty_ramp: f32,
    pub max_difficulty: f32,
    pub fallback_height: f32,
    pub friction: f32,
    pub restitution: f32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            chunk_width: 20.0,
            sample_interval: 0.5,
            base_y: 0.0,
            flat_zone: 25.0,
            transition_width: 20.0,
            collision_depth: 2.0,
            base_frequency: 0.015,
            base_octaves: 3,
            base_amplitude: 6.0,
            detail_frequency: 0.06,
            detail_offset: 500.0,
            detail_octaves: 2,
            detail_amplitude: 0.8,
            hills_frequency: 0.004,
            hills_offset: 1_000.0,
            hills_octaves: 2,
            hills_amplitude: 8.0,
            difficulty_ramp: 0.001,
            max_difficulty: 2.0,
            fallback_height: 0.0,
            friction: 0.8,
            restitution: 0.02,
        }
    }
}

impl TerrainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("game.toml::terrain.chunk_width", self.chunk_width)?;
        require_positive("game.toml::terrain.sample_interval", self.sample_interval)?;
        if self.sample_interval > self.chunk_width {
            return Err(ConfigError::Validation(
                "game.toml::terrain.sample_interval must be <= chunk_width".to_string(),
            ));
        }
        require_positive("game.toml::terrain.transition_width", self.transition_width)?;
        require_positive("game.toml::terrain.collision_depth", self.collision_depth)?;
        require_non_negative("game.toml::terrain.difficulty_ramp", self.difficulty_ramp)?;
        require_non_negative("game.toml::terrain.max_difficulty", self.max_difficulty)?;
        require_non_negative("game.toml::terrain.friction", self.friction)?;
        require_non_negative("game.toml::terrain.restitution", self.restitution)?;
        if !self.base_y.is_finite() || !self.flat_zone.is_finite() {
            return Err(ConfigError::Validation(
                "game.toml::terrain.base_y and flat_zone must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub meters_per_pixel: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub follow_rate: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            meters_per_pixel: 0.04,
            offset_x: 0.35,
            offset_y: 0.4,
            follow_rate: 6.0,
        }
    }
}

impl CameraConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("game.toml::camera.meters_per_pixel", self.meters_per_pixel)?;
        require_unit_interval("game.toml::camera.offset_x", self.offset_x)?;
        require_unit_interval("game.toml::camera.offset_y", self.offset_y)?;
        require_positive("game.toml::camera.follow_rate", self.follow_rate)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RiderFile {
    #[serde(default)]
    pub bicycle: BicycleConfig,
    #[serde(default)]
    pub pelican: PelicanConfig,
    #[serde(default)]
    pub crash: CrashConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BicycleConfig {
    pub wheel_radius: f32,
    pub wheel_mass: f32,
    pub wheel_friction: f32,
    pub wheel_restitution: f32,
    pub wheel_air_drag: f32,
    pub wheelbase: f32,
    pub frame_width: f32,
    pub frame_height: f32,
    pub frame_mass: f32,
    pub frame_friction: f32,
    pub frame_lift: f32,
    pub pedal_torque: f32,
    pub max_speed: f32,
    pub brake_factor: f32,
    pub lean_torque: f32,
    pub crank_step: f32,
}

impl Default for BicycleConfig {
    fn default() -> Self {
        Self {
            wheel_radius: 0.35,
            wheel_mass: 2.0,
            wheel_friction: 1.2,
            wheel_restitution: 0.05,
            wheel_air_drag: 0.05,
            wheelbase: 1.05,
            frame_width: 1.0,
            frame_height: 0.12,
            frame_mass: 4.0,
            frame_friction: 0.3,
            frame_lift: 0.04,
            pedal_torque: 6.0,
            max_speed: 9.0,
            brake_factor: 0.92,
            lean_torque: 11.0,
            crank_step: 0.15,
        }
    }
}

impl BicycleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("rider.toml::bicycle.wheel_radius", self.wheel_radius)?;
        require_positive("rider.toml::bicycle.wheel_mass", self.wheel_mass)?;
        require_positive("rider.toml::bicycle.wheelbase", self.wheelbase)?;
        require_positive("rider.toml::bicycle.frame_width", self.frame_width)?;
        require_positive("rider.toml::bicycle.frame_height", self.frame_height)?;
        require_positive("rider.toml::bicycle.frame_mass", self.frame_mass)?;
        require_positive("rider.toml::bicycle.max_speed", self.max_speed)?;
        require_non_negative("rider.toml::bicycle.pedal_torque", self.pedal_torque)?;
        require_non_negative("rider.toml::bicycle.lean_torque", self.lean_torque)?;
        if !(0.0 < self.brake_factor && self.brake_factor < 1.0) {
            return Err(ConfigError::Validation(
                "rider.toml::bicycle.brake_factor must be in (0, 1)".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PelicanConfig {
    pub body_radius: f32,
    pub body_mass: f32,
    pub body_friction: f32,
    pub body_air_drag: f32,
    pub head_radius: f32,
    pub head_mass: f32,
    pub head_friction: f32,
    pub head_air_drag: f32,
    pub neck_length: f32,
    pub neck_offset_x: f32,
    pub neck_inset_y: f32,
    pub neck_tilt: f32,
    pub head_angle_factor: f32,
    pub release_damping: f32,
    pub release_length_factor: f32,
    pub seat_gap: f32,
    pub lean_body_force: f32,
    /// Torque per radian holding the seated body at the frame's angle (N·m/rad).
    pub posture_stiffness: f32,
    pub posture_damping: f32,
}

impl Default for PelicanConfig {
    fn default() -> Self {
        Self {
            body_radius: 0.32,
            body_mass: 3.0,
            body_friction: 0.3,
            body_air_drag: 0.02,
            head_radius: 0.14,
            head_mass: 0.5,
            head_friction: 0.3,
            head_air_drag: 0.4,
            neck_length: 0.45,
            neck_offset_x: 0.12,
            neck_inset_y: 0.03,
            neck_tilt: 0.35,
            head_angle_factor: 0.2,
            release_damping: 0.3,
            release_length_factor: 0.6,
            seat_gap: 0.05,
            lean_body_force: 6.0,
            posture_stiffness: 30.0,
            posture_damping: 3.0,
        }
    }
}

impl PelicanConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("rider.toml::pelican.body_radius", self.body_radius)?;
        require_positive("rider.toml::pelican.body_mass", self.body_mass)?;
        require_positive("rider.toml::pelican.head_radius", self.head_radius)?;
        require_positive("rider.toml::pelican.head_mass", self.head_mass)?;
        require_positive("rider.toml::pelican.neck_length", self.neck_length)?;
        require_unit_interval("rider.toml::pelican.release_damping", self.release_damping)?;
        require_positive(
            "rider.toml::pelican.release_length_factor",
            self.release_length_factor,
        )?;
        if self.release_length_factor > 1.0 {
            return Err(ConfigError::Validation(
                "rider.toml::pelican.release_length_factor must be <= 1".to_string(),
            ));
        }
        require_non_negative("rider.toml::pelican.seat_gap", self.seat_gap)?;
        require_non_negative("rider.toml::pelican.lean_body_force", self.lean_body_force)?;
        require_non_negative("rider.toml::pelican.posture_stiffness", self.posture_stiffness)?;
        require_non_negative("rider.toml::pelican.posture_damping", self.posture_damping)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrashConfig {
    pub crash_angle: f32,
    pub seat_stiffness: f32,
    pub seat_damping: f32,
    pub seat_length: f32,
    pub seat_floor: f32,
    pub neck_stiffness: f32,
    pub neck_floor: f32,
    pub stiffness_duration: f32,
    pub gyro_factor: f32,
    pub gyro_min_speed: f32,
    pub settle_min_time: f32,
    pub settle_max_time: f32,
    pub settle_speed: f32,
}

impl Default for CrashConfig {
    fn default() -> Self {
        Self {
            crash_angle: 1.3,
            seat_stiffness: 0.6,
            seat_damping: 0.15,
            seat_length: 0.05,
            seat_floor: 0.1,
            neck_stiffness: 0.4,
            neck_floor: 0.15,
            stiffness_duration: 1.0,
            gyro_factor: 0.6,
            gyro_min_speed: 1.0,
            settle_min_time: 1.0,
            settle_max_time: 3.0,
            settle_speed: 0.5,
        }
    }
}

impl CrashConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("rider.toml::crash.crash_angle", self.crash_angle)?;
        require_unit_interval("rider.toml::crash.seat_stiffness", self.seat_stiffness)?;
        require_unit_interval("rider.toml::crash.seat_damping", self.seat_damping)?;
        require_non_negative("rider.toml::crash.seat_length", self.seat_length)?;
        require_unit_interval("rider.toml::crash.seat_floor", self.seat_floor)?;
        require_unit_interval("rider.toml::crash.neck_stiffness", self.neck_stiffness)?;
        require_unit_interval("rider.toml::crash.neck_floor", self.neck_floor)?;
        if self.seat_floor == 0.0 || self.neck_floor == 0.0 {
            return Err(ConfigError::Validation(
                "rider.toml::crash stiffness floors must be > 0".to_string(),
            ));
        }
        require_positive(
            "rider.toml::crash.stiffness_duration",
            self.stiffness_duration,
        )?;
        require_non_negative("rider.toml::crash.gyro_factor", self.gyro_factor)?;
        require_non_negative("rider.toml::crash.gyro_min_speed", self.gyro_min_speed)?;
        require_non_negative("rider.toml::crash.settle_min_time", self.settle_min_time)?;
        require_non_negative("rider.toml::crash.settle_speed", self.settle_speed)?;
        if self.settle_min_time > self.settle_max_time {
            return Err(ConfigError::Validation(
                "rider.toml::crash.settle_min_time must be <= settle_max_time".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_non_positive_chunk_width() {
        let mut config = GameConfig::default();
        config.game.terrain.chunk_width = 0.0;

        let error = config.validate().expect_err("validation should fail");
        assert!(error.to_string().contains("chunk_width"));
    }

    #[test]
    fn validation_rejects_non_positive_sample_interval() {
        let mut config = GameConfig::default();
        config.game.terrain.sample_interval = -0.5;

        let error = config.validate().expect_err("validation should fail");
        assert!(error.to_string().contains("sample_interval"));
    }

    #[test]
    fn validation_rejects_brake_factor_outside_unit_range() {
        let mut config = GameConfig::default();
        config.rider.bicycle.brake_factor = 1.0;

        let error = config.validate().expect_err("validation should fail");
        assert!(error.to_string().contains("brake_factor"));
    }

    #[test]
    fn validation_rejects_inverted_settle_window() {
        let mut config = GameConfig::default();
        config.rider.crash.settle_min_time = 4.0;
        config.rider.crash.settle_max_time = 3.0;

        let error = config.validate().expect_err("validation should fail");
        assert!(error.to_string().contains("settle_min_time"));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let game: GameFile = toml::from_str(
            r#"
            [terrain]
            chunk_width = 40.0
            "#,
        )
        .expect("partial game.toml should parse");

        assert_eq!(game.terrain.chunk_width, 40.0);
        assert_eq!(game.terrain.sample_interval, 0.5);
        assert_eq!(game.app.max_frame_dt, 0.033);
    }

    #[test]
    fn shipped_config_files_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join(CONFIG_DIR);
        let config = GameConfig::load_from_dir(&dir).expect("shipped config should be valid");
        assert!(config.game.terrain.chunk_width > 0.0);
        assert!(config.rider.crash.crash_angle > 0.0);
    }

    #[test]
    fn missing_file_reports_io_error() {
        let error = GameConfig::load_from_dir(Path::new("definitely/not/here"))
            .expect_err("missing dir should fail");
        assert!(matches!(error, ConfigError::Io { .. }));
        assert!(error.source().is_some());
    }
}
