use bincode::de::Decoder;
use bincode::enc::Encoder;
use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use nalgebra::{Isometry3, Quaternion, Translation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::ops::Mul;

mod stamped;

pub use stamped::{frame_id, StampedTransform, TransformBatch};

/// RigidTransform is a 6-DOF transformation (rotation + translation).
/// It is backed by nalgebra's `Isometry3<f64>`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform(Isometry3<f64>);

impl RigidTransform {
    pub fn identity() -> Self {
        Self(Isometry3::identity())
    }

    /// Builds a transform from a translation `[x, y, z]` and a quaternion `[x, y, z, w]`.
    /// The quaternion is normalized.
    pub fn from_parts(translation: [f64; 3], rotation: [f64; 4]) -> Self {
        let [qx, qy, qz, qw] = rotation;
        let rotation = UnitQuaternion::from_quaternion(Quaternion::new(qw, qx, qy, qz));
        Self(Isometry3::from_parts(
            Translation3::new(translation[0], translation[1], translation[2]),
            rotation,
        ))
    }

    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self(Isometry3::translation(x, y, z))
    }

    /// Fixed-axis roll, pitch, yaw rotation followed by a translation, the usual
    /// way joint origins are written in body descriptions.
    pub fn from_xyz_rpy(xyz: [f64; 3], rpy: [f64; 3]) -> Self {
        Self(Isometry3::from_parts(
            Translation3::new(xyz[0], xyz[1], xyz[2]),
            UnitQuaternion::from_euler_angles(rpy[0], rpy[1], rpy[2]),
        ))
    }

    /// Pure rotation of `angle` radians about `axis`. A zero axis gives the identity.
    pub fn from_axis_angle(axis: [f64; 3], angle: f64) -> Self {
        match Unit::try_new(Vector3::new(axis[0], axis[1], axis[2]), f64::EPSILON) {
            Some(axis) => Self(Isometry3::from_parts(
                Translation3::identity(),
                UnitQuaternion::from_axis_angle(&axis, angle),
            )),
            None => Self::identity(),
        }
    }

    /// Pure translation of `distance` along `axis`. A zero axis gives the identity.
    pub fn from_axis_translation(axis: [f64; 3], distance: f64) -> Self {
        match Unit::try_new(Vector3::new(axis[0], axis[1], axis[2]), f64::EPSILON) {
            Some(axis) => {
                let offset = axis.into_inner() * distance;
                Self::from_translation(offset.x, offset.y, offset.z)
            }
            None => Self::identity(),
        }
    }

    pub fn translation(&self) -> [f64; 3] {
        let t = &self.0.translation.vector;
        [t.x, t.y, t.z]
    }

    /// Rotation as a quaternion `[x, y, z, w]`.
    pub fn rotation(&self) -> [f64; 4] {
        let q = self.0.rotation.quaternion();
        [q.i, q.j, q.k, q.w]
    }

    pub fn inverse(&self) -> Self {
        Self(self.0.inverse())
    }

    pub fn as_isometry(&self) -> &Isometry3<f64> {
        &self.0
    }

    /// Component-wise comparison of translation and rotation within `epsilon`.
    /// `q` and `-q` encode the same rotation and compare equal.
    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        let close = |a: &[f64], b: &[f64]| a.iter().zip(b).all(|(x, y)| (x - y).abs() <= epsilon);
        let (qa, qb) = (self.rotation(), other.rotation());
        let qb_neg = qb.map(|v| -v);
        close(&self.translation(), &other.translation()) && (close(&qa, &qb) || close(&qa, &qb_neg))
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Isometry3<f64>> for RigidTransform {
    fn from(iso: Isometry3<f64>) -> Self {
        Self(iso)
    }
}

impl Mul for RigidTransform {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self(self.0 * rhs.0)
    }
}

// Translation then quaternion on the wire, matching `from_parts`.
impl Encode for RigidTransform {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        self.translation().encode(encoder)?;
        self.rotation().encode(encoder)
    }
}

impl<Context> Decode<Context> for RigidTransform {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let translation: [f64; 3] = Decode::decode(decoder)?;
        let rotation: [f64; 4] = Decode::decode(decoder)?;
        Ok(Self::from_parts(translation, rotation))
    }
}

bincode::impl_borrow_decode!(RigidTransform);
