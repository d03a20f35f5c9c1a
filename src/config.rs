//! Dataset and run parameter loading
//!
//! A dataset is a TOML or JSON document, picked by the file extension. In JSON:
//!
//! ```json
//! {
//!     "config": { "motion_trail_length": 365, "motion_trail_density": 1 },
//!     "simulation": { "days_per_second": 10 },
//!     "object": [
//!         { "name": "Sun", "mass": 1989000000 },
//!         { "name": "Earth", "mass": 5972, "distance": 149.6, "orbital_velocity": 29.78,
//!           "satellites": [ { "name": "Moon", "mass": 73.5, "distance": 0.384, "orbital_velocity": 1.022 } ] }
//!     ]
//! }
//! ```
//!
//! The TOML form uses the same keys, with `[config]`, `[simulation]`, `[[object]]` and
//! `[[object.satellites]]` tables.
//!
//! Masses are in Yg, distances in Gm, velocities in km/s. A scalar distance `d` places the body at
//! `(0, d, 0)` and a scalar velocity `v` moves it at `(v, 0, 0)`. Satellites are given relative to
//! their parent.

use std::{fs, path::{Path, PathBuf}};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use crate::{
    camera::ViewRadius,
    components::{Body, Color, PixelRadius},
    constants::*,
    math::*,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("cannot parse {origin}: {source}")]
    Parse { origin: String, #[source] source: serde_json::Error },
    #[error("cannot parse {origin}: {source}")]
    ParseToml { origin: String, #[source] source: toml::de::Error },
    #[error("unsupported dataset format {0:?}, expected a .toml or .json file")]
    UnsupportedFormat(PathBuf),
    #[error("{body}: `{field}` must be a number or an array of 1 or 3 numbers")]
    InvalidVector { body: String, field: &'static str },
    #[error("{body}: `{field}` cannot be negative")]
    NegativeValue { body: String, field: &'static str },
    #[error("{body}: invalid color {value:?}")]
    InvalidColor { body: String, value: String },
    #[error("dataset has no `{0}` entries")]
    MissingField(&'static str),
}

/// Knobs of one simulation run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunParams {
    pub days_per_second: f64,
    pub first_day: u32,
    pub last_day: u32,
    /// Largest integration sub-step
    pub max_timestep: Time,
    /// Wall-clock pacing tick
    pub tick: Time,
    pub paced: bool,
    pub view_radius: Length,
    pub min_view_radius: Length,
    pub max_view_radius: Length,
    /// How often the reporter looks for a new day, zero disables it
    pub report_frequency: Frequency,
}

impl Default for RunParams {
    fn default() -> Self {
        RunParams {
            days_per_second: 1.0,
            first_day: 1,
            last_day: 365,
            max_timestep: Time::seconds(DT_MAX),
            tick: Time::seconds(TICK),
            paced: true,
            view_radius: Length(1.1 * std::f64::consts::SQRT_2 * EARTH_DIST_TO_SOL),
            min_view_radius: Length(0.1),
            max_view_radius: Length(100000.0),
            report_frequency: Frequency::hertz(10.0),
        }
    }
}

impl RunParams {
    pub fn view_radius(&self) -> ViewRadius {
        ViewRadius::new(self.view_radius, self.min_view_radius, self.max_view_radius)
    }
}

/// A number or an array of one or three numbers
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum VectorSpec {
    Scalar(f64),
    Components(Vec<f64>),
}

impl Default for VectorSpec {
    fn default() -> Self { VectorSpec::Scalar(0.0) }
}

impl VectorSpec {
    /// Components, with a lone value `v` placed on `axis`
    fn resolve(&self, axis: usize, body: &str, field: &'static str) -> Result<DVec3, ConfigError> {
        let on_axis = |v: f64| {
            let mut raw = [0.0; 3];
            raw[axis] = v;
            DVec3::from(raw)
        };

        let raw = match self {
            VectorSpec::Scalar(v) => on_axis(*v),
            VectorSpec::Components(c) if c.len() == 1 => on_axis(c[0]),
            VectorSpec::Components(c) if c.len() == 3 => DVec3::new(c[0], c[1], c[2]),
            VectorSpec::Components(_) => return Err(ConfigError::InvalidVector { body: body.to_string(), field }),
        };

        if !raw.is_finite() {
            return Err(ConfigError::InvalidVector { body: body.to_string(), field });
        }
        Ok(raw)
    }
}

/// `0xRRGGBB` as a number, or a `"#RRGGBB"` / `"0xRRGGBB"` string
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Packed(u32),
    Text(String),
}

impl ColorSpec {
    fn resolve(&self, body: &str) -> Result<Color, ConfigError> {
        match self {
            ColorSpec::Packed(rgb) => Ok(Color::from_rgb(*rgb)),
            ColorSpec::Text(text) => {
                let digits = text.trim_start_matches('#').trim_start_matches("0x").trim_start_matches("0X");
                match u32::from_str_radix(digits, 16) {
                    Ok(rgb) if digits.len() == 6 => Ok(Color::from_rgb(rgb)),
                    _ => Err(ConfigError::InvalidColor { body: body.to_string(), value: text.clone() }),
                }
            }
        }
    }
}

/// Values applied to objects that don't set their own
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub motion_trail_length: u32,
    pub motion_trail_density: f64,
    pub default_color: ColorSpec,
    pub default_px_radius: f32,
}

impl Default for Defaults {
    fn default() -> Self {
        Defaults {
            motion_trail_length: 0,
            motion_trail_density: 5.0,
            default_color: ColorSpec::Packed(0xFFFFFF),
            default_px_radius: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectSpec {
    pub name: String,
    pub mass: f64,
    #[serde(default)]
    pub distance: VectorSpec,
    #[serde(default)]
    pub orbital_velocity: Option<VectorSpec>,
    #[serde(default)]
    pub color: Option<ColorSpec>,
    #[serde(default)]
    pub px_radius: Option<f32>,
    #[serde(default)]
    pub motion_trail_length: Option<u32>,
    #[serde(default)]
    pub motion_trail_density: Option<f64>,
    #[serde(default)]
    pub satellites: Vec<ObjectSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub config: Defaults,
    #[serde(default)]
    pub simulation: RunParams,
    #[serde(default)]
    pub object: Vec<ObjectSpec>,
}

impl Dataset {
    pub fn load(path: &Path) -> Result<Dataset, ConfigError> {
        let format = path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        let parse: fn(&str, &str) -> Result<Dataset, ConfigError> = match format.as_deref() {
            Some("toml") => Self::parse_toml,
            Some("json") => Self::parse_json,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let dataset = parse(&text, &path.display().to_string())?;
        info!(path = %path.display(), objects = dataset.object.len(), "loaded dataset");
        Ok(dataset)
    }

    pub fn from_json(text: &str) -> Result<Dataset, ConfigError> {
        Self::parse_json(text, "<inline>")
    }

    pub fn from_toml(text: &str) -> Result<Dataset, ConfigError> {
        Self::parse_toml(text, "<inline>")
    }

    fn parse_json(text: &str, origin: &str) -> Result<Dataset, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse { origin: origin.to_string(), source })
    }

    fn parse_toml(text: &str, origin: &str) -> Result<Dataset, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::ParseToml { origin: origin.to_string(), source })
    }

    /// Every object and satellite as a `Body` in absolute coordinates, parents before their satellites
    pub fn bodies(&self) -> Result<Vec<Body>, ConfigError> {
        if self.object.is_empty() {
            return Err(ConfigError::MissingField("object"));
        }
        if self.config.motion_trail_density < 0.0 {
            return Err(ConfigError::NegativeValue { body: String::from("config"), field: "motion_trail_density" });
        }
        if self.config.default_px_radius < 0.0 {
            return Err(ConfigError::NegativeValue { body: String::from("config"), field: "default_px_radius" });
        }

        let mut bodies = Vec::new();
        for spec in self.object.iter() {
            self.collect(spec, None, &mut bodies)?;
        }
        Ok(bodies)
    }

    fn collect(&self, spec: &ObjectSpec, parent: Option<&Body>, out: &mut Vec<Body>) -> Result<(), ConfigError> {
        let name = spec.name.as_str();
        let negative = |field| ConfigError::NegativeValue { body: name.to_string(), field };

        if !(spec.mass >= 0.0) {
            return Err(negative("mass"));
        }

        let px_radius = spec.px_radius.unwrap_or(self.config.default_px_radius);
        if !(px_radius >= 0.0) {
            return Err(negative("px_radius"));
        }

        let density = spec.motion_trail_density.unwrap_or(self.config.motion_trail_density);
        if !(density >= 0.0) {
            return Err(negative("motion_trail_density"));
        }
        let length = spec.motion_trail_length.unwrap_or(self.config.motion_trail_length);
        let trail = (length as f64 * density).floor() as usize;

        let color = spec.color.as_ref().unwrap_or(&self.config.default_color).resolve(name)?;
        let position = Position::from_raw(spec.distance.resolve(1, name, "distance")?);

        let mut body = Body::new(name)
            .with_mass(Mass(spec.mass))
            .with_position(position)
            .with_trail(trail)
            .with_color(color)
            .with_pixel_radius(PixelRadius(px_radius));

        if let Some(velocity) = spec.orbital_velocity.as_ref() {
            body = body.with_velocity(Velocity::from_raw(velocity.resolve(0, name, "orbital_velocity")?));
        }
        if let Some(parent) = parent {
            body = body.relative_to(parent);
        }

        debug!(name, satellites = spec.satellites.len(), trail, "registered object");
        out.push(body.clone());

        for satellite in spec.satellites.iter() {
            self.collect(satellite, Some(&body), out)?;
        }
        Ok(())
    }
}
