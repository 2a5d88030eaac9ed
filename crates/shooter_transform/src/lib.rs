//! # shooter_transform
//!
//! Spatial component for the shooter core. Re-exports [`glam`] for linear
//! algebra and defines [`Transform`], a
//! [`Component`](shooter_ecs::Component) carrying a local pose, a
//! parent/child hierarchy, and lazily cached world matrices.
//!
//! Reads go through `&Transform` plus `&Registry`; anything that changes a
//! node's pose or parent goes through [`TransformExt`] on the registry so
//! that descendants are invalidated.

pub mod hierarchy;
pub mod transform;

// Re-export glam types for convenience.
pub use glam::{EulerRot, Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

pub use hierarchy::{HierarchyError, TransformExt};
pub use transform::{Pose, Transform};
