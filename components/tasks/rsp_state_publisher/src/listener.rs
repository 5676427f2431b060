//! Feeds joint state messages to a [`RobotStatePublisher`], limiting how often
//! each joint is published.

use crate::config::PublisherConfig;
use crate::error::{RspError, RspResult};
use crate::mimic::JointPositions;
use crate::publisher::{PublishStatus, RobotStatePublisher};
use crate::segment::JointName;
use crate::sink::TransformSinks;
use crate::throttle::Throttle;
use log::{error, info, warn};
use rsp_clock::{RobotClock, RobotTime};
use rsp_kinematics::DescriptionProvider;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const EMPTY_POSITION_WARN_PERIOD: Duration = Duration::from_secs(300);
const STALE_STATE_WARN_PERIOD: Duration = Duration::from_secs(10);

/// Positions of a set of joints, measured at `stamp`.
/// `name` and `position` are parallel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointState {
    pub stamp: RobotTime,
    pub name: Vec<String>,
    pub position: Vec<f64>,
}

impl JointState {
    pub fn new(stamp: RobotTime, joints: &[(&str, f64)]) -> Self {
        Self {
            stamp,
            name: joints.iter().map(|(n, _)| n.to_string()).collect(),
            position: joints.iter().map(|(_, p)| *p).collect(),
        }
    }
}

pub struct JointStateListener<P: DescriptionProvider> {
    publisher: Arc<RobotStatePublisher<P>>,
    config: PublisherConfig,
    last_callback_time: RobotTime,
    last_publish_time: HashMap<JointName, RobotTime>,
    empty_position_warnings: Throttle,
    stale_state_warnings: Throttle,
}

impl<P: DescriptionProvider> JointStateListener<P> {
    /// Creates and initializes a publisher for `provider`, then starts listening.
    pub fn start(
        provider: P,
        sinks: TransformSinks,
        clock: RobotClock,
        config: PublisherConfig,
    ) -> RspResult<Self> {
        config.validate()?;
        let publisher = RobotStatePublisher::new(provider, sinks, clock, &config);
        publisher.init()?;
        Ok(Self::new(Arc::new(publisher), config))
    }

    /// Listens for an already initialized publisher. With the static channel
    /// enabled the fixed transforms are published once, here.
    pub fn new(publisher: Arc<RobotStatePublisher<P>>, config: PublisherConfig) -> Self {
        if config.use_static_channel {
            let status = publisher.publish_fixed(true);
            info!("Published fixed transforms on the latched channel: {status:?}");
        }
        let last_callback_time = publisher.clock().now();
        Self {
            publisher,
            config,
            last_callback_time,
            last_publish_time: HashMap::new(),
            empty_position_warnings: Throttle::new(EMPTY_POSITION_WARN_PERIOD),
            stale_state_warnings: Throttle::new(STALE_STATE_WARN_PERIOD),
        }
    }

    pub fn publisher(&self) -> &Arc<RobotStatePublisher<P>> {
        &self.publisher
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Handles one joint state message.
    ///
    /// Returns `Ok(None)` when every joint of the message was published too
    /// recently, and an error for a malformed message.
    pub fn on_joint_state(&mut self, state: &JointState) -> RspResult<Option<PublishStatus>> {
        self.publisher.publish_if_description_changed();

        let now = self.publisher.clock().now();
        if state.name.len() != state.position.len() {
            if state.position.is_empty() {
                if self.empty_position_warnings.allow("empty_position", now) {
                    warn!(
                        "Ignored a joint state about {:?} with no positions. This message will not reappear for {} seconds",
                        state.name,
                        EMPTY_POSITION_WARN_PERIOD.as_secs()
                    );
                }
            } else {
                error!(
                    "Ignored an invalid joint state with {} names and {} positions",
                    state.name.len(),
                    state.position.len()
                );
            }
            return Err(RspError::InvalidJointState(format!(
                "{} names but {} positions",
                state.name.len(),
                state.position.len()
            )));
        }

        if now < self.last_callback_time {
            warn!("Moved backwards in time (probably because the clock was reset), re-publishing joint transforms");
            self.last_publish_time.clear();
        }
        self.last_callback_time = now;

        if now > state.stamp
            && now - state.stamp > self.config.stale_joint_state_threshold().into()
            && self.stale_state_warnings.allow("stale", now)
        {
            warn!("Received a joint state that is {} old", now - state.stamp);
        }

        let last_published = state
            .name
            .iter()
            .map(|name| {
                self.last_publish_time
                    .get(name.as_str())
                    .copied()
                    .unwrap_or(RobotTime::ZERO)
            })
            .min()
            .unwrap_or(now);

        if !self.config.ignore_timestamp
            && state.stamp < last_published + self.config.publish_interval()
        {
            return Ok(None);
        }

        let mut direct = JointPositions::new();
        for (name, &position) in state.name.iter().zip(&state.position) {
            direct.entry(name.as_str().into()).or_insert(position);
        }
        let positions = match self.publisher.expand_mimic(&direct) {
            Some(expanded) => expanded,
            None => direct,
        };

        let status = self.publisher.publish_moving(&positions, state.stamp);
        if !status.is_skipped() {
            for name in &state.name {
                self.last_publish_time
                    .insert(name.as_str().into(), state.stamp);
            }
        }
        Ok(Some(status))
    }

    /// Periodic republish of the fixed transforms on the dynamic channel.
    /// Does nothing when they go to the latched channel.
    pub fn on_fixed_timer(&self) -> Option<PublishStatus> {
        if self.config.use_static_channel {
            return None;
        }
        Some(self.publisher.publish_fixed(false))
    }
}
