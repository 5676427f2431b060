use crate::config::PublisherConfig;
use crate::error::{RspError, RspResult};
use crate::mimic::{JointPositions, MimicResolver};
use crate::segment::SegmentTable;
use crate::sink::TransformSinks;
use crate::throttle::Throttle;
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use rsp_clock::{RobotClock, RobotTime};
use rsp_kinematics::{BodyModel, DescriptionProvider, RobotDescription, SharedDescription};
use rsp_transform_payloads::TransformBatch;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fixed transforms sent on the dynamic channel are stamped this far in the
/// future, so consumers can interpolate until the next periodic publish.
pub const FIXED_TRANSFORM_LEAD: Duration = Duration::from_millis(500);

/// Outcome of a publish call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    /// Number of transforms handed to the sink.
    Published(usize),
    /// The structure was being rebuilt: nothing was sent this cycle.
    Skipped,
}

impl PublishStatus {
    pub fn is_skipped(&self) -> bool {
        matches!(self, PublishStatus::Skipped)
    }

    pub fn published(&self) -> usize {
        match self {
            PublishStatus::Published(n) => *n,
            PublishStatus::Skipped => 0,
        }
    }
}

/// Everything rebuilt together when the description changes.
#[derive(Debug, Default)]
struct Structure {
    description: Option<Arc<RobotDescription>>,
    segments: SegmentTable,
}

impl Structure {
    fn from_description(description: Arc<RobotDescription>) -> Self {
        let segments = SegmentTable::build(description.tree(), description.model());
        Self {
            description: Some(description),
            segments,
        }
    }
}

/// Turns joint positions into frame transforms for the active robot description.
///
/// Publish calls never wait on a rebuild: they try the structure lock once and
/// report [`PublishStatus::Skipped`] when a description swap holds it.
pub struct RobotStatePublisher<P: DescriptionProvider> {
    provider: P,
    structure: RwLock<Structure>,
    mimic: MimicResolver,
    sinks: TransformSinks,
    clock: RobotClock,
    initialized: AtomicBool,
    description_changed: AtomicBool,
    missing_joints: Throttle,
}

impl<P: DescriptionProvider> RobotStatePublisher<P> {
    pub fn new(
        provider: P,
        sinks: TransformSinks,
        clock: RobotClock,
        config: &PublisherConfig,
    ) -> Self {
        Self {
            provider,
            structure: RwLock::new(Structure::default()),
            mimic: MimicResolver::default(),
            sinks,
            clock,
            initialized: AtomicBool::new(false),
            description_changed: AtomicBool::new(false),
            missing_joints: Throttle::new(config.missing_joint_warn_period()),
        }
    }

    /// Builds the segment tables and the mimic map from the active description.
    pub fn init(&self) -> RspResult<()> {
        let Some(description) = self.provider.current() else {
            return Err(RspError::Initialization(
                "no robot description is available to build a kinematic tree from".to_string(),
            ));
        };
        let structure = Structure::from_description(description.clone());
        info!(
            "Robot '{}' has {} moving and {} fixed segments",
            description.model().name,
            structure.segments.moving_len(),
            structure.segments.fixed_len()
        );
        let mut guard = self.structure.write();
        *guard = structure;
        self.mimic.rebuild(description.model());
        drop(guard);
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn clock(&self) -> &RobotClock {
        &self.clock
    }

    /// `positions` with the mimic joints added, `None` while the mimic map is rebuilt.
    pub fn expand_mimic(&self, positions: &JointPositions) -> Option<JointPositions> {
        self.mimic.try_expand(positions)
    }

    /// Publishes the transform of every moving joint in `positions`, stamped `stamp`,
    /// on the dynamic channel.
    pub fn publish_moving(&self, positions: &JointPositions, stamp: RobotTime) -> PublishStatus {
        let batch = {
            let Some(structure) = self.structure.try_read() else {
                debug!("Skipping moving transforms, the robot description is being updated");
                return PublishStatus::Skipped;
            };
            let mut batch = TransformBatch::with_capacity(positions.len());
            for (joint, &position) in positions {
                match structure.segments.moving(joint) {
                    Some(segment) => batch.push(segment.stamped(position, stamp)),
                    None => {
                        if self.missing_joints.allow(joint, self.clock.now()) {
                            warn!(
                                "Joint state with name \"{joint}\" was received but not found in the robot description"
                            );
                        }
                    }
                }
            }
            batch
        };
        self.send(batch, false)
    }

    /// Publishes every fixed joint at its rest pose.
    ///
    /// On the latched channel the transforms are stamped now, on the dynamic
    /// one they are stamped [`FIXED_TRANSFORM_LEAD`] ahead.
    pub fn publish_fixed(&self, use_static_channel: bool) -> PublishStatus {
        let batch = {
            let Some(structure) = self.structure.try_read() else {
                debug!("Skipping fixed transforms, the robot description is being updated");
                return PublishStatus::Skipped;
            };
            let mut stamp = self.clock.now();
            if !use_static_channel {
                stamp = stamp + FIXED_TRANSFORM_LEAD;
            }
            structure
                .segments
                .fixed_segments()
                .map(|(_, segment)| segment.stamped(0.0, stamp))
                .collect::<TransformBatch>()
        };
        self.send(batch, use_static_channel)
    }

    /// Republishes the fixed transforms on the latched channel if the
    /// description changed since the last call. `None` when nothing changed.
    pub fn publish_if_description_changed(&self) -> Option<PublishStatus> {
        if !self.description_changed.swap(false, Ordering::AcqRel) {
            return None;
        }
        let status = self.publish_fixed(true);
        if status.is_skipped() {
            self.description_changed.store(true, Ordering::Release);
        }
        Some(status)
    }

    /// Rebuilds the segment tables and the mimic map after the provider
    /// switched to a new description. Does nothing before [`Self::init`].
    ///
    /// Waits for in-flight publish calls to release the structure; publish
    /// calls arriving meanwhile are skipped. The structure stays locked until
    /// both the segment tables and the mimic map are rebuilt from the same
    /// description.
    pub fn on_description_changed(&self, affected_frame: &str) {
        if !self.is_initialized() {
            debug!("Ignoring description change of '{affected_frame}' before initialization");
            return;
        }
        let mut structure = self.structure.write();
        let current = self.provider.current();
        let rebuilt_from = match (&current, &structure.description) {
            (Some(current), _) => current.clone(),
            (None, Some(previous)) => previous.clone(),
            (None, None) => {
                structure.segments.clear();
                return;
            }
        };
        *structure = Structure::from_description(rebuilt_from);
        match current {
            Some(description) => self.mimic.rebuild(description.model()),
            None => error!(
                "Robot description unavailable after a change of '{affected_frame}', keeping the previous mimic joints"
            ),
        }
        drop(structure);
        self.description_changed.store(true, Ordering::Release);
    }

    /// Runs `f` on the current segment tables, `None` while they are rebuilt.
    pub fn with_segments<R>(&self, f: impl FnOnce(&SegmentTable) -> R) -> Option<R> {
        self.structure.try_read().map(|structure| f(&structure.segments))
    }

    /// The description the segment tables were built from.
    pub fn active_description(&self) -> Option<Arc<RobotDescription>> {
        self.structure.read().description.clone()
    }

    fn send(&self, batch: TransformBatch, latched: bool) -> PublishStatus {
        let count = batch.len();
        if count > 0 {
            self.sinks.send(batch, latched);
        }
        PublishStatus::Published(count)
    }
}

impl RobotStatePublisher<SharedDescription> {
    /// Installs `model` as the active description and rebuilds from it.
    /// An invalid model leaves the active description untouched.
    pub fn swap_description(&self, model: BodyModel) -> RspResult<()> {
        let description = RobotDescription::new(model)?;
        let root = description.tree().root_segment().name.clone();
        self.provider.swap(description);
        self.on_description_changed(&root);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use approx::assert_relative_eq;
    use rsp_kinematics::{JointInfo, JointType, MimicRelation, RigidTransform};
    use std::thread;
    use std::time::Instant;

    struct Harness {
        publisher: RobotStatePublisher<SharedDescription>,
        dynamic: Arc<RecordingSink>,
        latched: Arc<RecordingSink>,
        clock: rsp_clock::RobotClockMock,
    }

    fn arm() -> BodyModel {
        BodyModel::new("arm")
            .with_link("/base_link")
            .with_link("shoulder")
            .with_link("camera")
            .with_link("finger_l")
            .with_link("finger_r")
            .with_joint(
                JointInfo::new("shoulder_joint", JointType::Revolute, "/base_link", "shoulder")
                    .with_origin(RigidTransform::from_translation(0.0, 0.0, 0.5)),
            )
            .with_joint(
                JointInfo::new("camera_joint", JointType::Fixed, "shoulder", "camera")
                    .with_origin(RigidTransform::from_translation(0.1, 0.0, 0.0)),
            )
            .with_joint(
                JointInfo::new("finger_l_joint", JointType::Prismatic, "shoulder", "finger_l")
                    .with_axis([0.0, 1.0, 0.0]),
            )
            .with_joint(
                JointInfo::new("finger_r_joint", JointType::Prismatic, "shoulder", "finger_r")
                    .with_axis([0.0, 1.0, 0.0])
                    .with_mimic(MimicRelation::new("finger_l_joint", -1.0, 0.0)),
            )
    }

    fn harness(provider: SharedDescription) -> Harness {
        let dynamic = Arc::new(RecordingSink::new());
        let latched = Arc::new(RecordingSink::new());
        let (clock, mock) = RobotClock::mock();
        let publisher = RobotStatePublisher::new(
            provider,
            TransformSinks::new(dynamic.clone(), latched.clone()),
            clock,
            &PublisherConfig::default(),
        );
        Harness {
            publisher,
            dynamic,
            latched,
            clock: mock,
        }
    }

    fn initialized() -> Harness {
        let description = RobotDescription::new(arm()).expect("valid arm");
        let h = harness(SharedDescription::new(description));
        h.publisher.init().expect("init");
        h
    }

    fn positions(values: &[(&str, f64)]) -> JointPositions {
        values.iter().map(|(n, v)| ((*n).into(), *v)).collect()
    }

    #[test]
    fn test_init_without_description_fails() {
        let h = harness(SharedDescription::empty());
        assert!(matches!(h.publisher.init(), Err(RspError::Initialization(_))));
        assert!(!h.publisher.is_initialized());
        assert_eq!(h.publisher.with_segments(|s| s.is_empty()), Some(true));
    }

    #[test]
    fn test_publish_moving() {
        let h = initialized();
        let status = h
            .publisher
            .publish_moving(&positions(&[("finger_l_joint", 0.02)]), RobotTime(42));
        assert_eq!(status, PublishStatus::Published(1));
        let batch = h.dynamic.last().expect("one batch");
        let finger = batch.find_child("finger_l").expect("finger transform");
        assert_eq!(finger.parent_frame, "shoulder");
        assert_eq!(finger.stamp, RobotTime(42));
        assert_relative_eq!(finger.transform.translation()[1], 0.02, epsilon = 1e-12);
    }

    #[test]
    fn test_publish_moving_strips_leading_separator() {
        let h = initialized();
        h.publisher
            .publish_moving(&positions(&[("shoulder_joint", 0.0)]), RobotTime(1));
        let batch = h.dynamic.last().expect("one batch");
        assert_eq!(batch.frame_pairs(), vec![("base_link", "shoulder")]);
    }

    #[test]
    fn test_unknown_and_fixed_joints_are_not_published_as_moving() {
        let h = initialized();
        let status = h.publisher.publish_moving(
            &positions(&[("camera_joint", 1.0), ("ghost_joint", 1.0)]),
            RobotTime(1),
        );
        assert_eq!(status, PublishStatus::Published(0));
        assert_eq!(h.dynamic.count(), 0);
    }

    #[test]
    fn test_publish_fixed_channels_and_lead() {
        let h = initialized();
        h.clock.set_value(2_000_000_000);

        assert_eq!(h.publisher.publish_fixed(true), PublishStatus::Published(1));
        let latched = h.latched.last().expect("latched batch");
        assert_eq!(latched.transforms[0].stamp, RobotTime::from_secs_f64(2.0));
        assert_eq!(h.dynamic.count(), 0);

        assert_eq!(h.publisher.publish_fixed(false), PublishStatus::Published(1));
        let dynamic = h.dynamic.last().expect("dynamic batch");
        assert_eq!(dynamic.transforms[0].stamp, RobotTime::from_secs_f64(2.5));
        assert_eq!(dynamic.transforms[0].transform, latched.transforms[0].transform);
    }

    #[test]
    fn test_publish_fixed_is_repeatable() {
        let h = initialized();
        h.publisher.publish_fixed(true);
        h.publisher.publish_fixed(true);
        let batches = h.latched.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0], batches[1]);
        assert_eq!(batches[0].frame_pairs(), vec![("shoulder", "camera")]);
    }

    #[test]
    fn test_mimic_expansion() {
        let h = initialized();
        let expanded = h
            .publisher
            .expand_mimic(&positions(&[("finger_l_joint", 0.01)]))
            .expect("mimic map free");
        assert_relative_eq!(expanded["finger_r_joint"], -0.01);
    }

    #[test]
    fn test_description_change_before_init_is_ignored() {
        let h = harness(SharedDescription::new(
            RobotDescription::new(arm()).expect("valid arm"),
        ));
        h.publisher.on_description_changed("base_link");
        assert_eq!(h.publisher.publish_if_description_changed(), None);
        assert_eq!(h.publisher.with_segments(|s| s.is_empty()), Some(true));
    }

    #[test]
    fn test_description_change_without_description_keeps_previous() {
        let h = initialized();
        h.publisher.provider().clear();
        h.publisher.on_description_changed("base_link");
        assert_eq!(h.publisher.with_segments(|s| s.moving_len()), Some(3));
        assert_eq!(h.publisher.mimic.snapshot().len(), 1);
        assert_eq!(
            h.publisher.publish_if_description_changed(),
            Some(PublishStatus::Published(1))
        );
    }

    #[test]
    fn test_swap_description() {
        let h = initialized();
        let gripperless = BodyModel::new("bare")
            .with_link("base_link")
            .with_link("lidar")
            .with_link("mast")
            .with_joint(JointInfo::new("lidar_joint", JointType::Fixed, "base_link", "lidar"))
            .with_joint(JointInfo::new("mast_joint", JointType::Fixed, "base_link", "mast"));
        h.publisher.swap_description(gripperless).expect("valid model");

        assert_eq!(h.publisher.with_segments(|s| s.moving_len()), Some(0));
        assert!(h.publisher.mimic.snapshot().is_empty());
        assert_eq!(
            h.publisher.publish_if_description_changed(),
            Some(PublishStatus::Published(2))
        );
        assert_eq!(h.publisher.publish_if_description_changed(), None);
        assert_eq!(
            h.publisher.active_description().map(|d| d.model().name.clone()),
            Some("bare".to_string())
        );
    }

    #[test]
    fn test_invalid_swap_is_rejected() {
        let h = initialized();
        let broken = BodyModel::new("broken")
            .with_link("a")
            .with_joint(JointInfo::new("j", JointType::Fixed, "a", "nowhere"));
        assert!(matches!(
            h.publisher.swap_description(broken),
            Err(RspError::Kinematics(_))
        ));
        assert_eq!(h.publisher.publish_if_description_changed(), None);
        assert_eq!(h.publisher.with_segments(|s| s.moving_len()), Some(3));
    }

    #[test]
    fn test_publish_skipped_until_mimic_map_is_rebuilt() {
        let h = Arc::new(initialized());
        let mimic_guard = h.publisher.mimic.lock_for_rebuild();
        let swapping = {
            let h = h.clone();
            thread::spawn(move || h.publisher.swap_description(arm()))
        };

        // the swap holds the structure while it waits for the mimic map
        let deadline = Instant::now() + Duration::from_secs(5);
        while h.publisher.with_segments(|_| ()).is_some() {
            assert!(Instant::now() < deadline, "swap never took the structure lock");
            thread::yield_now();
        }
        let moving = positions(&[("shoulder_joint", 0.3)]);
        assert_eq!(
            h.publisher.publish_moving(&moving, RobotTime(1)),
            PublishStatus::Skipped
        );
        assert_eq!(h.dynamic.count(), 0);

        drop(mimic_guard);
        swapping.join().expect("swap thread").expect("valid model");
        assert_eq!(
            h.publisher.publish_moving(&moving, RobotTime(2)),
            PublishStatus::Published(1)
        );
        assert_eq!(h.publisher.mimic.snapshot().len(), 1);
    }

    #[test]
    fn test_contention_skips_and_keeps_flag() {
        let h = initialized();
        h.publisher.on_description_changed("base_link");
        {
            let _rebuilding = h.publisher.structure.write();
            assert_eq!(
                h.publisher
                    .publish_moving(&positions(&[("shoulder_joint", 0.3)]), RobotTime(1)),
                PublishStatus::Skipped
            );
            assert_eq!(
                h.publisher.publish_if_description_changed(),
                Some(PublishStatus::Skipped)
            );
        }
        assert_eq!(h.dynamic.count(), 0);
        assert_eq!(
            h.publisher.publish_if_description_changed(),
            Some(PublishStatus::Published(1))
        );
        assert_eq!(h.latched.count(), 1);
    }
}
