use crate::error::KinematicsResult;
use crate::model::BodyModel;
use crate::tree::KinematicTree;
use log::{debug, info};
use parking_lot::RwLock;
use std::sync::Arc;

/// A body model together with the kinematic tree built from it.
/// Immutable: a new description replaces the old one wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotDescription {
    model: BodyModel,
    tree: KinematicTree,
}

impl RobotDescription {
    /// Fails when no tree can be built from `model`.
    pub fn new(model: BodyModel) -> KinematicsResult<Self> {
        let tree = KinematicTree::from_model(&model)?;
        debug!(
            "Built kinematic tree for '{}' with {} segments",
            model.name,
            tree.len()
        );
        Ok(Self { model, tree })
    }

    pub fn model(&self) -> &BodyModel {
        &self.model
    }

    pub fn tree(&self) -> &KinematicTree {
        &self.tree
    }
}

/// Source of the currently active robot description.
pub trait DescriptionProvider: Send + Sync {
    /// Snapshot of the active description, `None` if there is none.
    fn current(&self) -> Option<Arc<RobotDescription>>;
}

impl<P: DescriptionProvider + ?Sized> DescriptionProvider for Arc<P> {
    fn current(&self) -> Option<Arc<RobotDescription>> {
        (**self).current()
    }
}

/// In-memory description slot that an external authority can swap at runtime.
#[derive(Debug, Default)]
pub struct SharedDescription {
    active: RwLock<Option<Arc<RobotDescription>>>,
}

impl SharedDescription {
    pub fn new(description: RobotDescription) -> Self {
        Self {
            active: RwLock::new(Some(Arc::new(description))),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Installs `description` and returns the one it replaced.
    pub fn swap(&self, description: RobotDescription) -> Option<Arc<RobotDescription>> {
        info!("Swapping robot description to '{}'", description.model().name);
        self.active.write().replace(Arc::new(description))
    }

    /// Drops the active description. Readers holding a snapshot keep it.
    pub fn clear(&self) -> Option<Arc<RobotDescription>> {
        self.active.write().take()
    }
}

impl DescriptionProvider for SharedDescription {
    fn current(&self) -> Option<Arc<RobotDescription>> {
        self.active.read().clone()
    }
}
