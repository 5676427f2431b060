//! Configuration of the robot state publisher.
//! The configuration is serialized in the RON format, for example:
//!
//! ```ron
//! (
//!     publish_frequency: 100.0,
//!     use_static_channel: false,
//! )
//! ```
//!
//! Every field is optional and falls back to its default.

use crate::error::{RspError, RspResult};
use ron::extensions::Extensions;
use ron::Options;
use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::path::Path;
use std::time::Duration;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PublisherConfig {
    /// Maximum rate, in Hz, at which moving transforms of a given joint are published.
    pub publish_frequency: f64,
    /// Publish fixed transforms once on the latched channel instead of
    /// periodically on the dynamic one.
    pub use_static_channel: bool,
    /// Publish every joint state, regardless of the publish frequency.
    pub ignore_timestamp: bool,
    /// Minimum time between two warnings about the same unknown joint.
    pub missing_joint_warn_period_s: f64,
    /// Joint states older than this are reported as stale.
    pub stale_joint_state_threshold_s: f64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            publish_frequency: 50.0,
            use_static_channel: true,
            ignore_timestamp: false,
            missing_joint_warn_period_s: 10.0,
            stale_joint_state_threshold_s: 30.0,
        }
    }
}

impl PublisherConfig {
    fn get_options() -> Options {
        Options::default()
            .with_default_extension(Extensions::IMPLICIT_SOME)
            .with_default_extension(Extensions::UNWRAP_NEWTYPES)
            .with_default_extension(Extensions::UNWRAP_VARIANT_NEWTYPES)
    }

    pub fn from_ron(ron: &str) -> RspResult<Self> {
        let config: Self = Self::get_options().from_str(ron)?;
        config.validate()?;
        Ok(config)
    }

    pub fn serialize_ron(&self) -> RspResult<String> {
        let pretty = ron::ser::PrettyConfig::default();
        Ok(Self::get_options().to_string_pretty(self, pretty)?)
    }

    /// Every value must convert to a [`Duration`]; the accessors below rely on it.
    pub fn validate(&self) -> RspResult<()> {
        if !self.publish_frequency.is_finite() || self.publish_frequency <= 0.0 {
            return Err(RspError::InvalidConfig(format!(
                "publish_frequency must be a positive number of Hz, got {}",
                self.publish_frequency
            )));
        }
        if Duration::try_from_secs_f64(1.0 / self.publish_frequency).is_err() {
            return Err(RspError::InvalidConfig(format!(
                "publish_frequency {} Hz gives a publish interval too long to represent",
                self.publish_frequency
            )));
        }
        for (name, value) in [
            ("missing_joint_warn_period_s", self.missing_joint_warn_period_s),
            ("stale_joint_state_threshold_s", self.stale_joint_state_threshold_s),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RspError::InvalidConfig(format!(
                    "{name} must be a non negative number of seconds, got {value}"
                )));
            }
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(RspError::InvalidConfig(format!(
                    "{name} is too large to represent, got {value}"
                )));
            }
        }
        Ok(())
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.publish_frequency)
    }

    pub fn missing_joint_warn_period(&self) -> Duration {
        Duration::from_secs_f64(self.missing_joint_warn_period_s)
    }

    pub fn stale_joint_state_threshold(&self) -> Duration {
        Duration::from_secs_f64(self.stale_joint_state_threshold_s)
    }
}

/// Read a publisher configuration from a file.
pub fn read_configuration(config_filename: impl AsRef<Path>) -> RspResult<PublisherConfig> {
    let path = config_filename.as_ref();
    let config_content = read_to_string(path).map_err(|source| RspError::ConfigIo {
        path: path.to_path_buf(),
        source,
    })?;
    PublisherConfig::from_ron(&config_content)
}
