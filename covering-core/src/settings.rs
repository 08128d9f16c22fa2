use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use toml::{Table, Value};

use crate::control::{AxisPolicy, MotionConfig};
use crate::error::{Error, Result};
use crate::models::{InstalledLimits, Percent100ths};

const DEFAULT_SETTINGS: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../configs/default.toml"));

const MAX_TICK_INTERVAL_MS: u64 = 60_000;

const ENV_PREFIX: &str = "COVERING__";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Motion {
    pub tick_interval_ms: u64,
    pub step_delta: u16,
    #[serde(default)]
    pub axis_policy: AxisPolicy,
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisSettings {
    pub installed_open_limit: u16,
    pub installed_closed_limit: u16,
    pub actuator_min: u8,
    pub actuator_max: u8,
    pub current_position: Option<u16>,
    pub target_position: Option<u16>,
}

impl AxisSettings {
    pub fn installed_limits(&self) -> InstalledLimits {
        InstalledLimits::new(self.installed_open_limit, self.installed_closed_limit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    pub motion: Motion,
    pub lift: AxisSettings,
    pub tilt: Option<AxisSettings>,
}

impl Settings {
    /// Bundled defaults, overlaid by `configs/{RUN_MODE}.toml` when present,
    /// then by `COVERING__SECTION__KEY` environment variables.
    pub fn new() -> Result<Self> {
        let run_mode = env::var("RUN_MODE").unwrap_or("development".into());
        let path = format!("configs/{run_mode}.toml");

        let mut table: Table = DEFAULT_SETTINGS.parse()?;
        if Path::new(&path).is_file() {
            merge_tables(&mut table, std::fs::read_to_string(&path)?.parse()?);
        }
        apply_environment(&mut table, env::vars());

        Self::from_table(table)
    }

    /// Loads one complete settings file, without defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        std::fs::read_to_string(path)?.parse()
    }

    fn from_table(table: Table) -> Result<Self> {
        let settings: Settings = table.try_into()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let motion = &self.motion;

        if motion.tick_interval_ms == 0 || motion.tick_interval_ms > MAX_TICK_INTERVAL_MS {
            return Err(Error::InvalidConfiguration(format!(
                "tick_interval_ms must be within 1..={MAX_TICK_INTERVAL_MS}, got {}",
                motion.tick_interval_ms
            )));
        }

        if motion.step_delta == 0 || motion.step_delta > Percent100ths::FULLY_CLOSED.value() {
            return Err(Error::InvalidConfiguration(format!(
                "step_delta must be within 1..=10000, got {}",
                motion.step_delta
            )));
        }

        if motion.queue_capacity == 0 {
            return Err(Error::InvalidConfiguration(
                "queue_capacity must be positive".into(),
            ));
        }

        Self::validate_axis("lift", &self.lift)?;
        if let Some(tilt) = &self.tilt {
            Self::validate_axis("tilt", tilt)?;
        }

        Ok(())
    }

    pub fn motion_config(&self) -> MotionConfig {
        MotionConfig {
            tick_interval: Duration::from_millis(self.motion.tick_interval_ms),
            step_delta: self.motion.step_delta,
        }
    }

    fn validate_axis(name: &str, axis: &AxisSettings) -> Result<()> {
        if axis.actuator_min > axis.actuator_max {
            return Err(Error::InvalidConfiguration(format!(
                "{name}: actuator_min {} exceeds actuator_max {}",
                axis.actuator_min, axis.actuator_max
            )));
        }

        for position in [axis.current_position, axis.target_position].into_iter().flatten() {
            Percent100ths::try_from(position)?;
        }

        Ok(())
    }
}

/// Recursively overlays `overlay` onto `base`; tables merge, other values replace.
fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(base)), Value::Table(overlay)) => merge_tables(base, overlay),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// `COVERING__MOTION__STEP_DELTA=500` sets `motion.step_delta`. Values parse
/// as TOML, falling back to a plain string.
fn apply_environment(table: &mut Table, vars: impl IntoIterator<Item = (String, String)>) {
    'vars: for (name, raw) in vars {
        let Some(path) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let keys: Vec<String> = path
            .split(ENV_SEPARATOR)
            .map(str::to_ascii_lowercase)
            .collect();
        let Some((last, sections)) = keys.split_last() else {
            continue;
        };

        let mut target = &mut *table;
        for section in sections {
            let entry = target
                .entry(section.as_str())
                .or_insert_with(|| Value::Table(Table::new()));
            let Value::Table(next) = entry else {
                tracing::warn!(variable = %name, "Setting override skipped, {section} is not a table");
                continue 'vars;
            };
            target = next;
        }

        let value = format!("value = {raw}")
            .parse::<Table>()
            .ok()
            .and_then(|mut parsed| parsed.remove("value"))
            .unwrap_or(Value::String(raw));
        target.insert(last.clone(), value);
    }
}

impl FromStr for Settings {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        let axis = |closed_limit| AxisSettings {
            installed_open_limit: 0,
            installed_closed_limit: closed_limit,
            actuator_min: 0,
            actuator_max: 255,
            current_position: Some(0),
            target_position: Some(0),
        };

        Self {
            logger: Logger {
                level: "info".into(),
            },
            motion: Motion {
                tick_interval_ms: 100,
                step_delta: 100,
                axis_policy: AxisPolicy::Exclusive,
                queue_capacity: 10,
            },
            lift: axis(u16::MAX),
            tilt: Some(axis(90)),
        }
    }
}
