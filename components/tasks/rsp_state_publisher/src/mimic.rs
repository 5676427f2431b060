use crate::segment::JointName;
use log::{debug, warn};
use parking_lot::RwLock;
use rsp_kinematics::BodyModel;
use std::collections::{BTreeMap, HashMap};

/// Joint positions of one cycle, by joint name.
pub type JointPositions = BTreeMap<JointName, f64>;

/// How a dependent joint follows its source joint.
#[derive(Debug, Clone, PartialEq)]
pub struct MimicEntry {
    pub source_joint: JointName,
    pub multiplier: f64,
    pub offset: f64,
}

impl MimicEntry {
    pub fn position(&self, source_position: f64) -> f64 {
        source_position * self.multiplier + self.offset
    }
}

/// Dependent joint name to mimic entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MimicMap {
    entries: HashMap<JointName, MimicEntry>,
}

impl MimicMap {
    pub fn from_model(model: &BodyModel) -> Self {
        let mut map = MimicMap::default();
        for (dependent, relation) in model.mimic_relations() {
            map.insert(
                dependent,
                MimicEntry {
                    source_joint: relation.joint.as_str().into(),
                    multiplier: relation.multiplier,
                    offset: relation.offset,
                },
            );
        }
        map
    }

    /// Returns false, and keeps the map unchanged, when the joint would mimic itself.
    pub fn insert(&mut self, dependent: &str, entry: MimicEntry) -> bool {
        if entry.source_joint == dependent {
            warn!("Joint '{dependent}' mimics itself, ignoring its mimic relation");
            return false;
        }
        self.entries.insert(dependent.into(), entry);
        true
    }

    pub fn get(&self, dependent: &str) -> Option<&MimicEntry> {
        self.entries.get(dependent)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of `positions` augmented with the position of every mimic joint
    /// whose source is present.
    ///
    /// Sources are read from `positions` only, so a joint mimicking another
    /// mimic joint is not resolved: one level of indirection per cycle.
    /// A position reported directly for a dependent joint is kept.
    pub fn expand(&self, positions: &JointPositions) -> JointPositions {
        let mut expanded = positions.clone();
        for (dependent, entry) in &self.entries {
            if let Some(&source) = positions.get(entry.source_joint.as_str()) {
                expanded
                    .entry(dependent.clone())
                    .or_insert_with(|| entry.position(source));
            }
        }
        expanded
    }
}

/// The mimic map behind its own reader/writer lock.
#[derive(Debug, Default)]
pub struct MimicResolver {
    map: RwLock<MimicMap>,
}

impl MimicResolver {
    pub fn new(map: MimicMap) -> Self {
        Self {
            map: RwLock::new(map),
        }
    }

    /// Replaces the map with one built from `model`. Blocks until readers are done.
    pub fn rebuild(&self, model: &BodyModel) {
        debug!("Updating mimic map");
        let map = MimicMap::from_model(model);
        *self.map.write() = map;
    }

    /// Expands `positions`, or returns `None` without waiting when the map is
    /// being rebuilt. Callers then go on with the direct positions only.
    pub fn try_expand(&self, positions: &JointPositions) -> Option<JointPositions> {
        let Some(map) = self.map.try_read() else {
            debug!("Failed to update positions for mimic joints -- could not get lock");
            return None;
        };
        Some(map.expand(positions))
    }

    pub fn snapshot(&self) -> MimicMap {
        self.map.read().clone()
    }

    #[cfg(test)]
    pub(crate) fn lock_for_rebuild(&self) -> parking_lot::RwLockWriteGuard<'_, MimicMap> {
        self.map.write()
    }
}
