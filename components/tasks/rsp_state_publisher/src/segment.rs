use compact_str::CompactString;
use log::{debug, info};
use rsp_clock::RobotTime;
use rsp_kinematics::{BodyModel, KinematicTree, TreeJoint, TreeJointKind};
use rsp_transform_payloads::{frame_id, RigidTransform, StampedTransform};
use std::collections::HashMap;

pub type JointName = CompactString;

/// A joint's transform-producing unit with the frames it connects.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    joint: TreeJoint,
    parent_frame: String,
    child_frame: String,
}

impl Segment {
    pub fn new(joint: TreeJoint, parent_frame: impl Into<String>, child_frame: impl Into<String>) -> Self {
        Self {
            joint,
            parent_frame: parent_frame.into(),
            child_frame: child_frame.into(),
        }
    }

    pub fn joint_name(&self) -> &str {
        &self.joint.name
    }

    pub fn parent_frame(&self) -> &str {
        &self.parent_frame
    }

    pub fn child_frame(&self) -> &str {
        &self.child_frame
    }

    pub fn pose(&self, position: f64) -> RigidTransform {
        self.joint.pose(position)
    }

    /// Pose at `position`, stamped, with frame ids ready to publish.
    pub fn stamped(&self, position: f64, stamp: RobotTime) -> StampedTransform {
        StampedTransform::new(
            self.pose(position),
            stamp,
            frame_id(&self.parent_frame),
            frame_id(&self.child_frame),
        )
    }
}

/// Segments indexed by joint name, split between joints driven by a joint
/// position and joints with a constant transform.
/// A joint name is in at most one of the two tables.
#[derive(Debug, Clone, Default)]
pub struct SegmentTable {
    moving: HashMap<JointName, Segment>,
    fixed: HashMap<JointName, Segment>,
}

impl SegmentTable {
    /// Walks `tree` from its root and classifies every joint.
    ///
    /// Joints without motion in the tree go to the fixed table, unless the body
    /// model declares them floating: a floating pose cannot be derived from a
    /// joint position, so no segment is created. Every other joint is moving.
    pub fn build(tree: &KinematicTree, model: &BodyModel) -> Self {
        let mut table = SegmentTable::default();
        let mut stack = vec![tree.root()];
        while let Some(idx) = stack.pop() {
            let Some(segment) = tree.segment(idx) else {
                continue;
            };
            let root = segment.name.as_str();
            for &child_idx in tree.children(idx) {
                let Some(child) = tree.segment(child_idx) else {
                    continue;
                };
                let joint_name = child.joint.name.as_str();
                let s = Segment::new(child.joint.clone(), root, child.name.as_str());
                if matches!(child.joint.kind, TreeJointKind::None) {
                    if model.is_floating(joint_name) {
                        info!(
                            "Floating joint. Not adding segment from {} to {}. This transform can not be published based on joint state info",
                            root, child.name
                        );
                    } else {
                        table.insert_fixed(joint_name, s);
                        debug!("Adding fixed segment from {} to {}", root, child.name);
                    }
                } else {
                    table.insert_moving(joint_name, s);
                    debug!("Adding moving segment from {} to {}", root, child.name);
                }
                stack.push(child_idx);
            }
        }
        table
    }

    // An existing entry wins, in either table.
    fn insert_moving(&mut self, joint: &str, segment: Segment) {
        if !self.fixed.contains_key(joint) {
            self.moving.entry(joint.into()).or_insert(segment);
        }
    }

    fn insert_fixed(&mut self, joint: &str, segment: Segment) {
        if !self.moving.contains_key(joint) {
            self.fixed.entry(joint.into()).or_insert(segment);
        }
    }

    pub fn moving(&self, joint: &str) -> Option<&Segment> {
        self.moving.get(joint)
    }

    pub fn fixed(&self, joint: &str) -> Option<&Segment> {
        self.fixed.get(joint)
    }

    pub fn fixed_segments(&self) -> impl Iterator<Item = (&str, &Segment)> {
        self.fixed.iter().map(|(name, s)| (name.as_str(), s))
    }

    pub fn moving_len(&self) -> usize {
        self.moving.len()
    }

    pub fn fixed_len(&self) -> usize {
        self.fixed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moving.is_empty() && self.fixed.is_empty()
    }

    pub fn clear(&mut self) {
        self.moving.clear();
        self.fixed.clear();
    }
}
