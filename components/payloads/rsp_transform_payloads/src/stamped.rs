use crate::RigidTransform;
use bincode::{Decode, Encode};
use rsp_clock::RobotTime;
use serde::{Deserialize, Serialize};

/// Frame ids are published without a leading path separator.
/// Only one leading `/` is removed; everything else is kept as is.
pub fn frame_id(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

/// A transform between two named frames, valid at `stamp`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct StampedTransform {
    pub transform: RigidTransform,
    pub stamp: RobotTime,
    pub parent_frame: String,
    pub child_frame: String,
}

impl StampedTransform {
    pub fn new(
        transform: RigidTransform,
        stamp: RobotTime,
        parent_frame: impl Into<String>,
        child_frame: impl Into<String>,
    ) -> Self {
        Self {
            transform,
            stamp,
            parent_frame: parent_frame.into(),
            child_frame: child_frame.into(),
        }
    }
}

/// All the transforms of one publish call. A batch is always handed to a sink
/// in a single call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct TransformBatch {
    pub transforms: Vec<StampedTransform>,
}

impl TransformBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            transforms: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, transform: StampedTransform) {
        self.transforms.push(transform);
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StampedTransform> {
        self.transforms.iter()
    }

    /// `(parent, child)` pairs, sorted, to compare batches regardless of order.
    pub fn frame_pairs(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<_> = self
            .transforms
            .iter()
            .map(|t| (t.parent_frame.as_str(), t.child_frame.as_str()))
            .collect();
        pairs.sort_unstable();
        pairs
    }

    pub fn find_child(&self, child_frame: &str) -> Option<&StampedTransform> {
        self.transforms.iter().find(|t| t.child_frame == child_frame)
    }
}

impl FromIterator<StampedTransform> for TransformBatch {
    fn from_iter<I: IntoIterator<Item = StampedTransform>>(iter: I) -> Self {
        Self {
            transforms: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for TransformBatch {
    type Item = StampedTransform;
    type IntoIter = std::vec::IntoIter<StampedTransform>;

    fn into_iter(self) -> Self::IntoIter {
        self.transforms.into_iter()
    }
}
