//! Robot state publisher: computes the transforms between the frames of a
//! kinematic tree from joint positions, and keeps publishing while the robot
//! description is swapped at runtime.
//!
//! ```no_run
//! use rsp_clock::RobotClock;
//! use rsp_kinematics::{BodyModel, JointInfo, JointType, RobotDescription, SharedDescription};
//! use rsp_state_publisher::{
//!     JointState, JointStateListener, PublisherConfig, RecordingSink, TransformSinks,
//! };
//! use std::sync::Arc;
//!
//! let model = BodyModel::new("pan")
//!     .with_link("base")
//!     .with_link("head")
//!     .with_joint(JointInfo::new("pan_joint", JointType::Continuous, "base", "head"));
//! let provider = SharedDescription::new(RobotDescription::new(model).unwrap());
//! let sink = Arc::new(RecordingSink::new());
//! let mut listener = JointStateListener::start(
//!     provider,
//!     TransformSinks::new(sink.clone(), sink.clone()),
//!     RobotClock::new(),
//!     PublisherConfig::default(),
//! )
//! .unwrap();
//! let clock = listener.publisher().clock().clone();
//! listener
//!     .on_joint_state(&JointState::new(clock.now(), &[("pan_joint", 0.3)]))
//!     .unwrap();
//! ```

pub mod config;
pub mod error;
pub mod listener;
pub mod mimic;
pub mod publisher;
pub mod segment;
pub mod sink;
pub mod throttle;

pub use config::{read_configuration, PublisherConfig};
pub use error::{RspError, RspResult};
pub use listener::{JointState, JointStateListener};
pub use mimic::{JointPositions, MimicEntry, MimicMap, MimicResolver};
pub use publisher::{PublishStatus, RobotStatePublisher, FIXED_TRANSFORM_LEAD};
pub use segment::{JointName, Segment, SegmentTable};
pub use sink::{LatchedSink, RecordingSink, TransformSink, TransformSinks};
pub use throttle::Throttle;
