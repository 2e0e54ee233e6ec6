//! Fixed-size vector aliases used throughout the workspace.
//!
//! All color-like quantities (reflectance, absorption K, scattering S)
//! are `Vec3` in linear RGB; positions on the canvas are `Vec2` with
//! x = column and y = row.

/// 2-D position or direction, f64.
pub type Vec2 = glam::DVec2;

/// 3-component color / coefficient triple, f64.
pub type Vec3 = glam::DVec3;

/// Integer cell coordinate (x = column, y = row).
pub type Vec2i = glam::IVec2;
