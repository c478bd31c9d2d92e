use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use super::error::{ConfigError, SessionError};
use super::session::SequencerSession;

const MAX_DAC_VALUE: i64 = 255;

/// Locations in the ODB that the noise scan talks to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdbPaths {
    /// Directory of the voltage DAC arrays, indexed by chip configuration id
    pub vdacs: String,
    /// Directory of the configuration DAC arrays (EnPLL lives here)
    pub confdacs: String,
    /// Directory of the front-end command flags
    pub commands: String,
    pub minalyzer_settings: String,
    /// Prefix of the per-chip minalyzer result records; the chip id is appended
    pub minalyzer_output: String,
}

impl Default for OdbPaths {
    fn default() -> Self {
        Self {
            vdacs: String::from("/Equipment/Quads/Settings/Config/VDACS"),
            confdacs: String::from("/Equipment/Quads/Settings/Config/CONFDACS"),
            commands: String::from("/Equipment/Quads/Settings/DAQ/Commands"),
            minalyzer_settings: String::from("/Equipment/MinAna/Settings"),
            minalyzer_output: String::from("/Equipment/MinAna/Output/"),
        }
    }
}

/// Structure representing the noise scan configuration.
///
/// Populated once, either from a YAML file or from the parameters registered with
/// the sequencer, and then handed to the scan by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseScanConfig {
    pub max_hits: u32,
    pub run_time: u32,
    pub start_threshold: u32,
    pub stop_threshold: u32,
    pub step_threshold: u32,
    pub max_iterations: u32,
    pub max_errorrate_retries: u32,
    pub max_link_errors: u32,
    pub reset_masks: bool,
    pub do_tuning: bool,
    /// Seconds to let the PLLs settle during a reset
    pub pll_settle_time: u32,
    pub chips: Vec<u32>,
    pub odb: OdbPaths,
}

impl Default for NoiseScanConfig {
    fn default() -> Self {
        Self {
            max_hits: 3,
            run_time: 3,
            start_threshold: 130,
            stop_threshold: 118,
            step_threshold: 1,
            max_iterations: 10,
            max_errorrate_retries: 5,
            max_link_errors: 500,
            reset_masks: true,
            do_tuning: false,
            pll_settle_time: 1,
            chips: vec![0, 1, 2, 3],
            odb: OdbPaths::default(),
        }
    }
}

/// Sequencer parameters as (name, description)
const PARAMS: [(&str, &str); 10] = [
    ("max_hits", "Maximum hits for tuning"),
    ("run_time", "Run time in seconds"),
    ("start_threshold", "Start threshold value"),
    ("stop_threshold", "Stop threshold value"),
    ("step_threshold", "Step threshold value"),
    ("max_iterations", "Maximum iteration"),
    ("max_errorrate_retries", "Max errorrate retries"),
    ("max_link_errors", "Maximum link errors"),
    ("reset_masks", "Reset Mask"),
    ("do_tuning", "Also adjust TDACs"),
];

fn value_as_u32(name: &str, value: &Value) -> Result<u32, ConfigError> {
    let parsed = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        Value::Bool(b) => Some(*b as u64),
        _ => None,
    };
    parsed
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| ConfigError::BadParameter(name.to_string(), value.to_string()))
}

fn value_as_bool(name: &str, value: &Value) -> Result<bool, ConfigError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.eq_ignore_ascii_case("y") || s.eq_ignore_ascii_case("true") => {
            Ok(true)
        }
        Value::String(s) if s.eq_ignore_ascii_case("n") || s.eq_ignore_ascii_case("false") => {
            Ok(false)
        }
        _ => Ok(value_as_u32(name, value)? != 0),
    }
}

impl NoiseScanConfig {
    /// Read the configuration in a YAML file
    /// Returns a NoiseScanConfig if successful and valid
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;
        let config = serde_yaml::from_str::<Self>(&yaml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    fn param_default(&self, name: &str) -> Value {
        match name {
            "max_hits" => Value::from(self.max_hits),
            "run_time" => Value::from(self.run_time),
            "start_threshold" => Value::from(self.start_threshold),
            "stop_threshold" => Value::from(self.stop_threshold),
            "step_threshold" => Value::from(self.step_threshold),
            "max_iterations" => Value::from(self.max_iterations),
            "max_errorrate_retries" => Value::from(self.max_errorrate_retries),
            "max_link_errors" => Value::from(self.max_link_errors),
            "reset_masks" => Value::from(self.reset_masks as u32),
            "do_tuning" => Value::from(self.do_tuning as u32),
            _ => Value::Null,
        }
    }

    /// Register the scan parameters with the sequencer, using this config's values as defaults
    pub fn register_params<S: SequencerSession>(&self, session: &mut S) -> Result<(), ConfigError> {
        for (name, description) in PARAMS {
            session.register_param(name, description, self.param_default(name))?;
        }
        Ok(())
    }

    /// Build a config from the parameters registered with the sequencer.
    ///
    /// Fields which are not sequencer parameters (chips, ODB paths) are taken from `base`.
    pub fn from_session<S: SequencerSession>(
        session: &mut S,
        base: NoiseScanConfig,
    ) -> Result<Self, ConfigError> {
        base.register_params(session)?;

        let get = |name: &str| -> Result<Value, ConfigError> {
            Ok(session
                .get_param(name)?
                .ok_or_else(|| SessionError::MissingParameter(name.to_string()))?)
        };

        let config = Self {
            max_hits: value_as_u32("max_hits", &get("max_hits")?)?,
            run_time: value_as_u32("run_time", &get("run_time")?)?,
            start_threshold: value_as_u32("start_threshold", &get("start_threshold")?)?,
            stop_threshold: value_as_u32("stop_threshold", &get("stop_threshold")?)?,
            step_threshold: value_as_u32("step_threshold", &get("step_threshold")?)?,
            max_iterations: value_as_u32("max_iterations", &get("max_iterations")?)?,
            max_errorrate_retries: value_as_u32(
                "max_errorrate_retries",
                &get("max_errorrate_retries")?,
            )?,
            max_link_errors: value_as_u32("max_link_errors", &get("max_link_errors")?)?,
            reset_masks: value_as_bool("reset_masks", &get("reset_masks")?)?,
            do_tuning: value_as_bool("do_tuning", &get("do_tuning")?)?,
            ..base
        };
        config.validate()?;
        Ok(config)
    }

    /// The thresholds to scan, from the start threshold downwards.
    ///
    /// Stepping continues while the threshold is above `stop - step`, so with a step that
    /// does not divide the range the last threshold can fall below the stop threshold.
    pub fn thresholds(&self) -> Vec<u32> {
        let step = self.step_threshold.max(1) as i64;
        let end = self.stop_threshold as i64 - step;
        let mut thresholds = Vec::new();
        let mut threshold = self.start_threshold as i64;
        while threshold > end {
            thresholds.push(threshold as u32);
            threshold -= step;
        }
        thresholds
    }

    /// Total number of scan iterations, saturating at `u32::MAX`
    pub fn total_iterations(&self) -> u32 {
        u32::try_from(self.thresholds().len())
            .unwrap_or(u32::MAX)
            .saturating_mul(self.max_iterations)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bad = |name: &str, reason: String| ConfigError::BadParameter(name.to_string(), reason);
        if self.step_threshold < 1 {
            return Err(bad("step_threshold", String::from("must be at least 1")));
        }
        if self.max_iterations < 1 {
            return Err(bad("max_iterations", String::from("must be at least 1")));
        }
        if self.start_threshold < self.stop_threshold {
            return Err(bad(
                "start_threshold",
                format!(
                    "{} is below the stop threshold {}",
                    self.start_threshold, self.stop_threshold
                ),
            ));
        }
        if self.start_threshold as i64 > MAX_DAC_VALUE {
            return Err(bad(
                "start_threshold",
                format!("{} does not fit in a DAC", self.start_threshold),
            ));
        }
        // ThLow sits one below ThHigh, so the lowest threshold must stay above zero
        if (self.stop_threshold as i64 - self.step_threshold as i64) < 0 {
            return Err(bad(
                "stop_threshold",
                format!(
                    "{} minus the step {} leaves no room for ThLow",
                    self.stop_threshold, self.step_threshold
                ),
            ));
        }
        if self.chips.is_empty() {
            return Err(bad("chips", String::from("no chips to scan")));
        }
        // The global iteration counter is a u32
        let threshold_count = self.thresholds().len() as u64;
        if threshold_count * self.max_iterations as u64 > u32::MAX as u64 {
            return Err(bad(
                "max_iterations",
                format!(
                    "{} iterations over {threshold_count} thresholds is too many",
                    self.max_iterations
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::OfflineSession;
    use serde_json::json;

    #[test]
    fn test_default_thresholds() {
        let config = NoiseScanConfig::default();
        let thresholds = config.thresholds();
        assert_eq!(thresholds.len(), 13);
        assert_eq!(thresholds.first(), Some(&130));
        assert_eq!(thresholds.last(), Some(&118));
        assert_eq!(config.total_iterations(), 130);
    }

    #[test]
    fn test_uneven_step() {
        let config = NoiseScanConfig {
            start_threshold: 130,
            stop_threshold: 119,
            step_threshold: 3,
            ..Default::default()
        };
        assert_eq!(config.thresholds(), vec![130, 127, 124, 121, 118]);
    }

    #[test]
    fn test_validate() {
        assert!(NoiseScanConfig::default().validate().is_ok());
        let bad_step = NoiseScanConfig {
            step_threshold: 0,
            ..Default::default()
        };
        assert!(bad_step.validate().is_err());
        let inverted = NoiseScanConfig {
            start_threshold: 100,
            stop_threshold: 120,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
        let no_chips = NoiseScanConfig {
            chips: vec![],
            ..Default::default()
        };
        assert!(no_chips.validate().is_err());
        let too_low = NoiseScanConfig {
            stop_threshold: 0,
            ..Default::default()
        };
        assert!(too_low.validate().is_err());
    }

    #[test]
    fn test_iteration_overflow() {
        let config = NoiseScanConfig {
            max_iterations: u32::MAX,
            ..Default::default()
        };
        assert_eq!(config.total_iterations(), u32::MAX);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadParameter(name, _)) if name == "max_iterations"
        ));

        let single = NoiseScanConfig {
            start_threshold: 118,
            max_iterations: u32::MAX,
            ..Default::default()
        };
        assert_eq!(single.total_iterations(), u32::MAX);
        assert!(single.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let path = std::env::temp_dir().join(format!("noise_scan_{}.yml", std::process::id()));
        let config = NoiseScanConfig {
            chips: vec![5, 6],
            run_time: 10,
            ..Default::default()
        };
        config.write_config_file(&path).unwrap();
        let read = NoiseScanConfig::read_config_file(&path).unwrap();
        assert_eq!(read, config);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_partial_yaml() {
        let config: NoiseScanConfig = serde_yaml::from_str("run_time: 20\nchips: [1]\n").unwrap();
        assert_eq!(config.run_time, 20);
        assert_eq!(config.chips, vec![1]);
        assert_eq!(config.start_threshold, 130);
        assert_eq!(config.odb, OdbPaths::default());
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("does_not_exist_noise_scan.yml");
        assert!(matches!(
            NoiseScanConfig::read_config_file(&path),
            Err(ConfigError::BadFilePath(_))
        ));
    }

    #[test]
    fn test_from_session() {
        let mut session = OfflineSession::new("test");
        session
            .odb_set("/Sequencer/Param/Value/start_threshold", json!("125"))
            .unwrap();
        session
            .odb_set("/Sequencer/Param/Value/do_tuning", json!(true))
            .unwrap();
        let base = NoiseScanConfig {
            chips: vec![2],
            ..Default::default()
        };
        let config = NoiseScanConfig::from_session(&mut session, base).unwrap();
        assert_eq!(config.start_threshold, 125);
        assert!(config.do_tuning);
        assert!(config.reset_masks);
        assert_eq!(config.max_link_errors, 500);
        assert_eq!(config.chips, vec![2]);
        assert_eq!(session.params().len(), 10);
        assert_eq!(session.params()[1].description, "Run time in seconds");
    }

    #[test]
    fn test_from_session_bad_value() {
        let mut session = OfflineSession::new("test");
        session
            .odb_set("/Sequencer/Param/Value/run_time", json!("soon"))
            .unwrap();
        assert!(matches!(
            NoiseScanConfig::from_session(&mut session, NoiseScanConfig::default()),
            Err(ConfigError::BadParameter(_, _))
        ));
    }
}
