// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Projection math shared by the camera and its gesture solvers.

use glam::{DMat4, DVec3, DVec4};

/// Default vertical field of view in degrees.
pub const DEFAULT_FOVY_DEGREES: f64 = 40.0;
/// Default near clip distance.
pub const DEFAULT_ZNEAR: f64 = 0.1;
/// Default far clip distance.
pub const DEFAULT_ZFAR: f64 = 50_000.0;

/// Build a view matrix from eye, look-at and up.
///
/// `up` need not be orthogonal to the view direction; it is normalized and
/// the basis is completed from the cross products.
pub fn elu_to_matrix(eye: DVec3, lookat: DVec3, up: DVec3) -> DMat4 {
    let up = up.normalize_or_zero();
    let f = (lookat - eye).normalize_or_zero();
    let s = f.cross(up);
    let u = s.cross(f);

    let rotation = DMat4::from_cols(
        DVec4::new(s.x, u.x, -f.x, 0.0),
        DVec4::new(s.y, u.y, -f.y, 0.0),
        DVec4::new(s.z, u.z, -f.z, 0.0),
        DVec4::new(0.0, 0.0, 0.0, 1.0),
    );
    rotation * DMat4::from_translation(-eye)
}

/// Default perspective projection for a pixel viewport.
pub fn perspective_for_viewport(viewport: [f32; 4]) -> DMat4 {
    let aspect = f64::from(viewport[2]) / f64::from(viewport[3]);
    DMat4::perspective_rh_gl(
        DEFAULT_FOVY_DEGREES.to_radians(),
        aspect,
        DEFAULT_ZNEAR,
        DEFAULT_ZFAR,
    )
}

/// Project a world point to window coordinates.
///
/// Returns `[win_x, win_y, depth]` with a bottom-left origin; depth is the
/// clip-space z remapped to `0..=1`.
pub fn project(world: DVec3, view: DMat4, projection: DMat4, viewport: [f32; 4]) -> DVec3 {
    let clip = projection * view * world.extend(1.0);
    let ndc = clip / clip.w;
    DVec3::new(
        f64::from(viewport[0]) + f64::from(viewport[2]) * (ndc.x + 1.0) / 2.0,
        f64::from(viewport[1]) + f64::from(viewport[3]) * (ndc.y + 1.0) / 2.0,
        (ndc.z + 1.0) / 2.0,
    )
}

/// Unproject window coordinates back to a world point.
///
/// `window.z` of zero names the near plane and one the far plane.
pub fn unproject(window: DVec3, view: DMat4, projection: DMat4, viewport: [f32; 4]) -> DVec3 {
    let inv = (projection * view).inverse();
    let ndc = DVec4::new(
        2.0 * (window.x - f64::from(viewport[0])) / f64::from(viewport[2]) - 1.0,
        2.0 * (window.y - f64::from(viewport[1])) / f64::from(viewport[3]) - 1.0,
        2.0 * window.z - 1.0,
        1.0,
    );
    let world = inv * ndc;
    world.truncate() / world.w
}

/// Intersect the pick ray under a window-space cursor with a plane.
///
/// The plane is `normal . p = d`. Cursor coordinates have a bottom-left
/// origin; callers flip top-down surface coordinates against the canvas
/// height before picking. A ray parallel to the plane yields a non-finite
/// point the caller must reject.
pub fn plane_point_under_cursor(
    x: f32,
    y: f32,
    normal: DVec3,
    d: f64,
    view: DMat4,
    projection: DMat4,
    viewport: [f32; 4],
) -> DVec3 {
    let win_x = f64::from(x);
    let win_y = f64::from(y);
    let r0 = unproject(DVec3::new(win_x, win_y, 0.0), view, projection, viewport);
    let r1 = unproject(DVec3::new(win_x, win_y, 1.0), view, projection, viewport);
    let dir = r1 - r0;
    let lambda = (d - r0.dot(normal)) / dir.dot(normal);
    r0 + dir * lambda
}
