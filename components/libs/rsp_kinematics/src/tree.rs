//! Rooted kinematic tree derived from a [`BodyModel`].
//!
//! Each tree segment is named after the link it ends in and carries the joint
//! that connects it to its parent segment. The root segment has no joint.
//! Fixed, floating and planar joints all become [`TreeJointKind::None`]: the
//! tree alone cannot tell them apart, the body model can.

use crate::error::{KinematicsError, KinematicsResult};
use crate::model::{BodyModel, JointType};
use rsp_transform_payloads::RigidTransform;
use std::collections::{BTreeMap, HashMap};

pub type SegmentIndex = usize;

/// How a tree joint turns a scalar position into motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TreeJointKind {
    /// No motion; the position is ignored.
    None,
    Rotational { axis: [f64; 3] },
    Translational { axis: [f64; 3] },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeJoint {
    pub name: String,
    pub kind: TreeJointKind,
    pub origin: RigidTransform,
}

impl TreeJoint {
    /// Pose of the child frame in the parent frame for the joint position `q`.
    pub fn pose(&self, q: f64) -> RigidTransform {
        match self.kind {
            TreeJointKind::None => self.origin,
            TreeJointKind::Rotational { axis } => {
                self.origin * RigidTransform::from_axis_angle(axis, q)
            }
            TreeJointKind::Translational { axis } => {
                self.origin * RigidTransform::from_axis_translation(axis, q)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeSegment {
    /// Name of the link this segment ends in.
    pub name: String,
    pub joint: TreeJoint,
    pub parent: Option<SegmentIndex>,
    pub children: Vec<SegmentIndex>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KinematicTree {
    segments: Vec<TreeSegment>,
    by_name: HashMap<String, SegmentIndex>,
}

impl KinematicTree {
    const ROOT: SegmentIndex = 0;

    /// Builds the tree from the links and joints of `model`.
    ///
    /// The model must describe exactly one root link, every link may have at
    /// most one parent joint, and every joint must reference existing links.
    pub fn from_model(model: &BodyModel) -> KinematicsResult<Self> {
        if model.links.is_empty() {
            return Err(KinematicsError::EmptyModel(model.name.clone()));
        }

        let mut parent_joint: HashMap<&str, &str> = HashMap::new();
        let mut children_of: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for joint in model.joints.values() {
            for link in [&joint.parent, &joint.child] {
                if !model.links.contains(link) {
                    return Err(KinematicsError::MissingLink {
                        joint: joint.name.clone(),
                        link: link.clone(),
                    });
                }
            }
            if let Some(first) = parent_joint.insert(&joint.child, &joint.name) {
                return Err(KinematicsError::MultipleParents {
                    link: joint.child.clone(),
                    first: first.to_string(),
                    second: joint.name.clone(),
                });
            }
            children_of
                .entry(joint.parent.as_str())
                .or_default()
                .push(joint.name.as_str());
        }

        let roots: Vec<&String> = model
            .links
            .iter()
            .filter(|l| !parent_joint.contains_key(l.as_str()))
            .collect();
        let root = match roots.as_slice() {
            [] => return Err(KinematicsError::NoRootLink),
            [root] => *root,
            _ => {
                return Err(KinematicsError::MultipleRoots(
                    roots.iter().map(|r| r.to_string()).collect(),
                ))
            }
        };

        let mut tree = KinematicTree {
            segments: Vec::with_capacity(model.links.len()),
            by_name: HashMap::with_capacity(model.links.len()),
        };
        tree.push_segment(
            root.clone(),
            TreeJoint {
                name: format!("{root}_root"),
                kind: TreeJointKind::None,
                origin: RigidTransform::identity(),
            },
            None,
        );

        let mut stack = vec![Self::ROOT];
        while let Some(parent_idx) = stack.pop() {
            let parent_link = tree.segments[parent_idx].name.clone();
            let Some(joint_names) = children_of.get(parent_link.as_str()) else {
                continue;
            };
            for joint_name in joint_names {
                // joint_names come from model.joints, the lookup cannot miss
                let Some(joint) = model.joint(joint_name) else {
                    continue;
                };
                let tree_joint = TreeJoint {
                    name: joint.name.clone(),
                    kind: match joint.joint_type {
                        JointType::Revolute | JointType::Continuous => {
                            TreeJointKind::Rotational { axis: joint.axis }
                        }
                        JointType::Prismatic => TreeJointKind::Translational { axis: joint.axis },
                        JointType::Fixed | JointType::Floating | JointType::Planar => {
                            TreeJointKind::None
                        }
                    },
                    origin: joint.origin,
                };
                let child_idx = tree.push_segment(joint.child.clone(), tree_joint, Some(parent_idx));
                tree.segments[parent_idx].children.push(child_idx);
                stack.push(child_idx);
            }
        }

        if tree.segments.len() != model.links.len() {
            let unreachable = model
                .links
                .iter()
                .filter(|l| !tree.by_name.contains_key(l.as_str()))
                .cloned()
                .collect();
            return Err(KinematicsError::CyclicTree(unreachable));
        }

        Ok(tree)
    }

    fn push_segment(
        &mut self,
        name: String,
        joint: TreeJoint,
        parent: Option<SegmentIndex>,
    ) -> SegmentIndex {
        let idx = self.segments.len();
        self.by_name.insert(name.clone(), idx);
        self.segments.push(TreeSegment {
            name,
            joint,
            parent,
            children: Vec::new(),
        });
        idx
    }

    pub fn root(&self) -> SegmentIndex {
        Self::ROOT
    }

    pub fn root_segment(&self) -> &TreeSegment {
        &self.segments[Self::ROOT]
    }

    pub fn segment(&self, idx: SegmentIndex) -> Option<&TreeSegment> {
        self.segments.get(idx)
    }

    pub fn find(&self, link: &str) -> Option<SegmentIndex> {
        self.by_name.get(link).copied()
    }

    pub fn children(&self, idx: SegmentIndex) -> &[SegmentIndex] {
        self.segments
            .get(idx)
            .map(|s| s.children.as_slice())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JointInfo;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn arm() -> BodyModel {
        BodyModel::new("arm")
            .with_link("base_link")
            .with_link("upper_arm")
            .with_link("forearm")
            .with_link("tool")
            .with_joint(
                JointInfo::new("shoulder", JointType::Revolute, "base_link", "upper_arm")
                    .with_origin(RigidTransform::from_translation(0.0, 0.0, 0.1)),
            )
            .with_joint(
                JointInfo::new("elbow", JointType::Prismatic, "upper_arm", "forearm")
                    .with_axis([1.0, 0.0, 0.0]),
            )
            .with_joint(JointInfo::new("tool_mount", JointType::Fixed, "forearm", "tool"))
    }

    #[test]
    fn test_tree_from_model() {
        let tree = KinematicTree::from_model(&arm()).expect("valid model");
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.root_segment().name, "base_link");
        let upper = tree.find("upper_arm").expect("upper_arm");
        assert_eq!(tree.segment(upper).map(|s| s.parent), Some(Some(tree.root())));
        assert_eq!(tree.children(tree.root()), &[upper]);
        let tool = tree.find("tool").and_then(|i| tree.segment(i)).expect("tool");
        assert_eq!(tool.joint.kind, TreeJointKind::None);
    }

    #[test]
    fn test_joint_pose() {
        let tree = KinematicTree::from_model(&arm()).expect("valid model");
        let shoulder = &tree.segment(tree.find("upper_arm").unwrap()).unwrap().joint;
        let pose = shoulder.pose(FRAC_PI_2);
        assert_eq!(pose.translation(), [0.0, 0.0, 0.1]);
        let [_, _, qz, qw] = pose.rotation();
        assert_relative_eq!(qz, (FRAC_PI_2 / 2.0).sin(), epsilon = 1e-12);
        assert_relative_eq!(qw, (FRAC_PI_2 / 2.0).cos(), epsilon = 1e-12);

        let elbow = &tree.segment(tree.find("forearm").unwrap()).unwrap().joint;
        assert_eq!(elbow.pose(0.3).translation(), [0.3, 0.0, 0.0]);
    }

    #[test]
    fn test_missing_link() {
        let model = arm().with_joint(JointInfo::new(
            "camera_mount",
            JointType::Fixed,
            "tool",
            "camera",
        ));
        assert_eq!(
            KinematicTree::from_model(&model),
            Err(KinematicsError::MissingLink {
                joint: "camera_mount".into(),
                link: "camera".into(),
            })
        );
    }

    #[test]
    fn test_multiple_parents() {
        let model = arm().with_joint(JointInfo::new(
            "other_mount",
            JointType::Fixed,
            "base_link",
            "tool",
        ));
        assert!(matches!(
            KinematicTree::from_model(&model),
            Err(KinematicsError::MultipleParents { link, .. }) if link == "tool"
        ));
    }

    #[test]
    fn test_multiple_roots() {
        let model = arm().with_link("orphan");
        assert!(matches!(
            KinematicTree::from_model(&model),
            Err(KinematicsError::MultipleRoots(roots)) if roots.contains(&"orphan".to_string())
        ));
    }

    #[test]
    fn test_no_root_and_cycle() {
        let ring = BodyModel::new("ring")
            .with_link("a")
            .with_link("b")
            .with_joint(JointInfo::new("ab", JointType::Fixed, "a", "b"))
            .with_joint(JointInfo::new("ba", JointType::Fixed, "b", "a"));
        assert_eq!(
            KinematicTree::from_model(&ring),
            Err(KinematicsError::NoRootLink)
        );

        let detached_cycle = ring.with_link("root");
        assert!(matches!(
            KinematicTree::from_model(&detached_cycle),
            Err(KinematicsError::CyclicTree(links)) if links.len() == 2
        ));
    }

    #[test]
    fn test_empty_model() {
        assert_eq!(
            KinematicTree::from_model(&BodyModel::new("nothing")),
            Err(KinematicsError::EmptyModel("nothing".into()))
        );
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let mut model = BodyModel::new("snake").with_link("l0");
        for i in 1..20_000 {
            model.add_link(format!("l{i}"));
            model.add_joint(JointInfo::new(
                format!("j{i}"),
                JointType::Continuous,
                format!("l{}", i - 1),
                format!("l{i}"),
            ));
        }
        let tree = KinematicTree::from_model(&model).expect("valid chain");
        assert_eq!(tree.len(), 20_000);
    }
}
