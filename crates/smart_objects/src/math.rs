//! # Geometry Primitives
//!
//! Minimal 3D math used by the runtime: vectors, rotations, transforms and
//! axis-aligned boxes. Coordinates are `f64` and rotations follow the usual
//! pitch/yaw/roll convention in degrees, with yaw turning +X towards +Y.
//!
//! ## Key Types
//!
//! - [`Vec3`] - Position / direction / scale vector
//! - [`Rotator`] - Euler rotation in degrees
//! - [`Quat`] - Unit quaternion used for composition and vector rotation
//! - [`Transform`] - Location + rotation + scale
//! - [`Box3`] - Axis-aligned bounding box with an explicit empty state

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

// ============================================================================
// Vectors
// ============================================================================

/// 3D vector for positions, offsets and scales.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const ONE: Vec3 = Vec3 { x: 1.0, y: 1.0, z: 1.0 };

    /// Creates a new vector.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Creates a vector with all components set to `value`.
    pub const fn splat(value: f64) -> Self {
        Self { x: value, y: value, z: value }
    }

    pub fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Squared distance between two points.
    pub fn dist_squared(self, other: Vec3) -> f64 {
        (self - other).length_squared()
    }

    /// Distance between two points.
    pub fn distance(self, other: Vec3) -> f64 {
        self.dist_squared(other).sqrt()
    }

    /// Component-wise product.
    pub fn scale(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    pub fn component_min(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    pub fn component_max(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Returns true when every component is within `tolerance` of `other`.
    pub fn approx_eq(self, other: Vec3, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.z - other.z).abs() <= tolerance
    }

    pub(crate) fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

// ============================================================================
// Rotations
// ============================================================================

/// Euler rotation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotator {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl Rotator {
    pub const ZERO: Rotator = Rotator { pitch: 0.0, yaw: 0.0, roll: 0.0 };

    pub const fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Rotation around the up axis only.
    pub const fn from_yaw(yaw: f64) -> Self {
        Self { pitch: 0.0, yaw, roll: 0.0 }
    }

    /// Adds the given deltas component-wise.
    pub fn add(self, pitch: f64, yaw: f64, roll: f64) -> Self {
        Self::new(self.pitch + pitch, self.yaw + yaw, self.roll + roll)
    }

    /// Wraps every axis into `[0, 360)`.
    pub fn clamp(self) -> Self {
        Self::new(clamp_axis(self.pitch), clamp_axis(self.yaw), clamp_axis(self.roll))
    }

    /// Keeps the yaw and drops pitch and roll.
    pub fn up_axis_locked(self) -> Self {
        Self::from_yaw(self.yaw)
    }

    /// Converts to a unit quaternion.
    pub fn quaternion(self) -> Quat {
        let half = std::f64::consts::PI / 360.0;
        let (sp, cp) = (self.pitch * half).sin_cos();
        let (sy, cy) = (self.yaw * half).sin_cos();
        let (sr, cr) = (self.roll * half).sin_cos();

        Quat {
            x: cr * sp * sy - sr * cp * cy,
            y: -cr * sp * cy - sr * cp * sy,
            z: cr * cp * sy - sr * sp * cy,
            w: cr * cp * cy + sr * sp * sy,
        }
    }

    /// Rotates a vector by this rotation.
    pub fn rotate_vector(self, v: Vec3) -> Vec3 {
        self.quaternion().rotate_vector(v)
    }

    pub fn is_finite(self) -> bool {
        self.pitch.is_finite() && self.yaw.is_finite() && self.roll.is_finite()
    }
}

fn clamp_axis(angle: f64) -> f64 {
    let wrapped = angle % 360.0;
    if wrapped < 0.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

fn normalize_axis(angle: f64) -> f64 {
    let clamped = clamp_axis(angle);
    if clamped > 180.0 {
        clamped - 360.0
    } else {
        clamped
    }
}

/// Unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    pub const IDENTITY: Quat = Quat { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    /// Rotates `v` by this quaternion.
    pub fn rotate_vector(self, v: Vec3) -> Vec3 {
        let q = Vec3::new(self.x, self.y, self.z);
        let t = q.cross(v) * 2.0;
        v + t * self.w + q.cross(t)
    }

    /// Converts back to Euler angles in degrees.
    pub fn rotator(self) -> Rotator {
        const SINGULARITY_THRESHOLD: f64 = 0.499_999_5;
        let rad_to_deg = 180.0 / std::f64::consts::PI;

        let singularity_test = self.z * self.x - self.w * self.y;
        let yaw_y = 2.0 * (self.w * self.z + self.x * self.y);
        let yaw_x = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        let yaw = yaw_y.atan2(yaw_x) * rad_to_deg;

        if singularity_test < -SINGULARITY_THRESHOLD {
            let roll = normalize_axis(-yaw - 2.0 * self.x.atan2(self.w) * rad_to_deg);
            Rotator::new(-90.0, yaw, roll)
        } else if singularity_test > SINGULARITY_THRESHOLD {
            let roll = normalize_axis(yaw - 2.0 * self.x.atan2(self.w) * rad_to_deg);
            Rotator::new(90.0, yaw, roll)
        } else {
            let pitch = (2.0 * singularity_test).asin() * rad_to_deg;
            let roll = (-2.0 * (self.w * self.x + self.y * self.z))
                .atan2(1.0 - 2.0 * (self.x * self.x + self.y * self.y))
                * rad_to_deg;
            Rotator::new(pitch, yaw, roll)
        }
    }
}

impl Mul for Quat {
    type Output = Quat;

    /// `a * b` applies `b` first, then `a`.
    fn mul(self, b: Quat) -> Quat {
        let a = self;
        Quat {
            x: a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            y: a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            z: a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
            w: a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
        }
    }
}

// ============================================================================
// Transforms
// ============================================================================

/// Location, rotation and non-uniform scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default)]
    pub location: Vec3,
    #[serde(default)]
    pub rotation: Rotator,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        location: Vec3::ZERO,
        rotation: Rotator::ZERO,
        scale: Vec3::ONE,
    };

    pub fn new(location: Vec3, rotation: Rotator) -> Self {
        Self { location, rotation, scale: Vec3::ONE }
    }

    pub fn from_location(location: Vec3) -> Self {
        Self::new(location, Rotator::ZERO)
    }

    /// Transforms a local-space point into this transform's parent space.
    pub fn transform_position(&self, point: Vec3) -> Vec3 {
        self.rotation.rotate_vector(point.scale(self.scale)) + self.location
    }

    /// Expresses `local` (relative to `self`) in world space.
    pub fn compose(&self, local: &Transform) -> Transform {
        let rotation = (self.rotation.quaternion() * local.rotation.quaternion()).rotator();
        Transform {
            location: self.transform_position(local.location),
            rotation,
            scale: self.scale.scale(local.scale),
        }
    }
}

// ============================================================================
// Bounds
// ============================================================================

/// Axis-aligned bounding box. A box with `min > max` on any axis is empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Box3 {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Box3 {
    fn default() -> Self {
        Self::empty()
    }
}

impl Box3 {
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// An empty box that absorbs the first point or box added to it.
    pub const fn empty() -> Self {
        Self {
            min: Vec3::splat(f64::INFINITY),
            max: Vec3::splat(f64::NEG_INFINITY),
        }
    }

    pub fn from_center_extent(center: Vec3, extent: Vec3) -> Self {
        Self::new(center - extent, center + extent)
    }

    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Grows the box to contain `point`.
    pub fn add_point(&mut self, point: Vec3) {
        self.min = self.min.component_min(point);
        self.max = self.max.component_max(point);
    }

    /// Union of two boxes; empty boxes are ignored.
    pub fn union(&self, other: &Box3) -> Box3 {
        if !other.is_valid() {
            return *self;
        }
        if !self.is_valid() {
            return *other;
        }
        Box3::new(self.min.component_min(other.min), self.max.component_max(other.max))
    }

    /// Inclusive overlap test.
    pub fn intersects(&self, other: &Box3) -> bool {
        self.is_valid()
            && other.is_valid()
            && self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Inclusive containment test.
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    pub fn expand_by(&self, amount: f64) -> Box3 {
        Box3::new(self.min - Vec3::splat(amount), self.max + Vec3::splat(amount))
    }

    /// Bounds of this box after applying `transform` to its corners.
    pub fn transform_by(&self, transform: &Transform) -> Box3 {
        if !self.is_valid() {
            return *self;
        }
        let mut out = Box3::empty();
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.add_point(transform.transform_position(corner));
        }
        out
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }
}

/// Upright capsule placed in world space, used for overlap checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Capsule {
    pub center: Vec3,
    pub radius: f64,
    /// Distance from the center to the tip of either hemisphere.
    pub half_height: f64,
}

impl Capsule {
    pub fn bounds(&self) -> Box3 {
        Box3::from_center_extent(
            self.center,
            Vec3::new(self.radius, self.radius, self.half_height.max(self.radius)),
        )
    }
}
