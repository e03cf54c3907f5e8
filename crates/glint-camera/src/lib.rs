// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Animated camera for glint layers.
//!
//! The camera keeps an eye/lookat/up pose plus a background color, each
//! eased toward its goal with a cubic that is continuous in velocity, and
//! translates pointer gestures into new goals: primary-drag pans along a
//! manipulation plane, secondary-drag orbits, the wheel and pinches zoom
//! toward the cursor. Hosts drive it with wire-shaped input events and
//! sample a [`LayerSetup`] per frame; the crate itself does no I/O and
//! never reads a clock.

pub mod anim;
pub mod controls;
pub mod math;
pub mod pan;

pub use anim::{Animated, Sample};
pub use controls::{
    CameraControls, CameraMode, LayerSetup, DEFAULT_ANIMATE_MS, DEFAULT_BACKGROUND, DEFAULT_EYE,
    DEFAULT_LOOKAT, DEFAULT_TOUCH_ANIMATE_MS, DEFAULT_UP,
};
pub use math::{
    elu_to_matrix, perspective_for_viewport, plane_point_under_cursor, project, unproject,
    DEFAULT_FOVY_DEGREES, DEFAULT_ZFAR, DEFAULT_ZNEAR,
};
pub use pan::window_space_pan_to;
