pub mod description;
pub mod error;
pub mod model;
pub mod tree;

pub use description::{DescriptionProvider, RobotDescription, SharedDescription};
pub use error::{KinematicsError, KinematicsResult};
pub use model::{BodyModel, JointInfo, JointType, MimicRelation};
pub use tree::{KinematicTree, SegmentIndex, TreeJoint, TreeJointKind, TreeSegment};

pub use rsp_transform_payloads::RigidTransform;
