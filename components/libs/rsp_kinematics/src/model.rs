//! Flat joint metadata of a robot body, as read from its description.
//!
//! The model is what the description authority hands over: links, joints with
//! their kind, origin, axis and optional mimic relation. The kinematic tree is
//! derived from it (see [`crate::tree`]).

use rsp_transform_payloads::RigidTransform;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Kind of a joint as declared in the body description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JointType {
    /// Rotation about a single axis, with position limits.
    Revolute,
    /// Unlimited rotation about a single axis.
    Continuous,
    /// Translation along an axis.
    Prismatic,
    /// No relative motion between parent and child.
    Fixed,
    /// Unconstrained 6-DOF joint. Its pose cannot be derived from one scalar.
    Floating,
    /// Motion in a plane. Not expressible with one scalar either.
    Planar,
}

/// `position = source_position * multiplier + offset`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MimicRelation {
    pub joint: String,
    pub multiplier: f64,
    pub offset: f64,
}

impl MimicRelation {
    pub fn new(joint: impl Into<String>, multiplier: f64, offset: f64) -> Self {
        Self {
            joint: joint.into(),
            multiplier,
            offset,
        }
    }
}

/// Metadata of one joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointInfo {
    pub name: String,
    pub joint_type: JointType,
    pub parent: String,
    pub child: String,
    /// Pose of the child link frame relative to the parent link frame at position 0.
    pub origin: RigidTransform,
    /// Joint axis in the joint frame.
    pub axis: [f64; 3],
    pub mimic: Option<MimicRelation>,
}

impl JointInfo {
    pub fn new(
        name: impl Into<String>,
        joint_type: JointType,
        parent: impl Into<String>,
        child: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            joint_type,
            parent: parent.into(),
            child: child.into(),
            origin: RigidTransform::identity(),
            axis: [0.0, 0.0, 1.0],
            mimic: None,
        }
    }

    pub fn with_origin(mut self, origin: RigidTransform) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_axis(mut self, axis: [f64; 3]) -> Self {
        self.axis = axis;
        self
    }

    pub fn with_mimic(mut self, mimic: MimicRelation) -> Self {
        self.mimic = Some(mimic);
        self
    }
}

/// Links and joints of a robot body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyModel {
    pub name: String,
    pub links: BTreeSet<String>,
    pub joints: BTreeMap<String, JointInfo>,
}

impl BodyModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_link(mut self, name: impl Into<String>) -> Self {
        self.add_link(name);
        self
    }

    pub fn with_joint(mut self, joint: JointInfo) -> Self {
        self.add_joint(joint);
        self
    }

    pub fn add_link(&mut self, name: impl Into<String>) {
        self.links.insert(name.into());
    }

    /// Adds or replaces the joint with the same name.
    pub fn add_joint(&mut self, joint: JointInfo) {
        self.joints.insert(joint.name.clone(), joint);
    }

    pub fn joint(&self, name: &str) -> Option<&JointInfo> {
        self.joints.get(name)
    }

    pub fn is_floating(&self, joint_name: &str) -> bool {
        self.joint(joint_name)
            .is_some_and(|j| j.joint_type == JointType::Floating)
    }

    /// `(dependent joint, relation)` for every joint declaring a mimic relation.
    pub fn mimic_relations(&self) -> impl Iterator<Item = (&str, &MimicRelation)> {
        self.joints
            .iter()
            .filter_map(|(name, joint)| joint.mimic.as_ref().map(|m| (name.as_str(), m)))
    }
}
