//! Destinations for published transforms.
//!
//! Two logical channels exist: the dynamic channel receives a batch per cycle
//! and keeps nothing, the latched channel keeps what it received so that late
//! consumers still get the fixed transforms.

use parking_lot::Mutex;
use rsp_transform_payloads::{StampedTransform, TransformBatch};
use std::collections::BTreeMap;
use std::sync::Arc;

pub trait TransformSink: Send + Sync {
    /// Delivers every transform of one publish call at once.
    fn send_transforms(&self, batch: TransformBatch);
}

impl<S: TransformSink + ?Sized> TransformSink for Arc<S> {
    fn send_transforms(&self, batch: TransformBatch) {
        (**self).send_transforms(batch)
    }
}

/// Keeps every batch it receives, in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<TransformBatch>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<TransformBatch> {
        self.batches.lock().clone()
    }

    pub fn last(&self) -> Option<TransformBatch> {
        self.batches.lock().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.batches.lock().len()
    }

    /// Removes and returns everything recorded so far.
    pub fn take(&self) -> Vec<TransformBatch> {
        std::mem::take(&mut *self.batches.lock())
    }
}

impl TransformSink for RecordingSink {
    fn send_transforms(&self, batch: TransformBatch) {
        self.batches.lock().push(batch);
    }
}

/// Retains the latest transform per child frame and forwards the whole
/// retained set downstream on each send, so a consumer attaching late gets
/// every fixed transform from a single message.
#[derive(Debug)]
pub struct LatchedSink<S: TransformSink> {
    inner: S,
    retained: Mutex<BTreeMap<String, StampedTransform>>,
}

impl<S: TransformSink> LatchedSink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            retained: Mutex::new(BTreeMap::new()),
        }
    }

    /// Everything retained so far, ordered by child frame.
    pub fn latched(&self) -> TransformBatch {
        self.retained.lock().values().cloned().collect()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: TransformSink> TransformSink for LatchedSink<S> {
    fn send_transforms(&self, batch: TransformBatch) {
        let snapshot = {
            let mut retained = self.retained.lock();
            for transform in batch {
                retained.insert(transform.child_frame.clone(), transform);
            }
            retained.values().cloned().collect::<TransformBatch>()
        };
        self.inner.send_transforms(snapshot);
    }
}

/// The two channels a publisher writes to.
#[derive(Clone)]
pub struct TransformSinks {
    pub dynamic: Arc<dyn TransformSink>,
    pub latched: Arc<dyn TransformSink>,
}

impl TransformSinks {
    pub fn new(dynamic: Arc<dyn TransformSink>, latched: Arc<dyn TransformSink>) -> Self {
        Self { dynamic, latched }
    }

    /// Routes `batch` to the latched channel when `latched` is set, to the dynamic one otherwise.
    pub fn send(&self, batch: TransformBatch, latched: bool) {
        if latched {
            self.latched.send_transforms(batch);
        } else {
            self.dynamic.send_transforms(batch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsp_clock::RobotTime;
    use rsp_transform_payloads::RigidTransform;

    fn transform(parent: &str, child: &str, x: f64, stamp: u64) -> StampedTransform {
        StampedTransform::new(
            RigidTransform::from_translation(x, 0.0, 0.0),
            RobotTime(stamp),
            parent,
            child,
        )
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.send_transforms([transform("a", "b", 1.0, 1)].into_iter().collect());
        sink.send_transforms(TransformBatch::new());
        assert_eq!(sink.count(), 2);
        assert_eq!(sink.batches()[0].len(), 1);
        assert_eq!(sink.take().len(), 2);
        assert_eq!(sink.count(), 0);
        assert!(sink.last().is_none());
    }

    #[test]
    fn test_latched_sink_supersedes_per_child() {
        let latched = LatchedSink::new(RecordingSink::new());
        latched.send_transforms(
            [transform("base", "laser", 1.0, 1), transform("base", "camera", 2.0, 1)]
                .into_iter()
                .collect(),
        );
        latched.send_transforms([transform("base", "laser", 3.0, 2)].into_iter().collect());

        let retained = latched.latched();
        assert_eq!(retained.len(), 2);
        let laser = retained.find_child("laser").expect("laser retained");
        assert_eq!(laser.transform.translation(), [3.0, 0.0, 0.0]);
        assert_eq!(laser.stamp, RobotTime(2));

        // each send forwards the full retained set
        let forwarded = latched.inner().batches();
        assert_eq!(forwarded.len(), 2);
        assert_eq!(forwarded[1].len(), 2);
    }

    #[test]
    fn test_routing() {
        let dynamic = Arc::new(RecordingSink::new());
        let latched = Arc::new(RecordingSink::new());
        let sinks = TransformSinks::new(dynamic.clone(), latched.clone());
        sinks.send(TransformBatch::new(), true);
        sinks.send(TransformBatch::new(), false);
        sinks.send(TransformBatch::new(), false);
        assert_eq!(latched.count(), 1);
        assert_eq!(dynamic.count(), 2);
    }
}
