// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Window-space pan solver.

use glam::{DMat2, DMat4, DVec2, DVec3};

use crate::math::{elu_to_matrix, project};

const MAX_ITERATIONS: usize = 100;
const JACOBIAN_EPS: f64 = 1e-4;
const CONVERGED: f64 = 1e-3;

/// Screen-space sensitivity of a tracked point to camera translation.
///
/// Columns are the window-space movement of `world` per unit of camera
/// translation along `dir1` and `dir2`, measured by finite differences.
#[allow(clippy::too_many_arguments)]
fn pan_jacobian(
    world: DVec3,
    projection: DMat4,
    viewport: [f32; 4],
    eye: DVec3,
    lookat: DVec3,
    up: DVec3,
    dir1: DVec3,
    dir2: DVec3,
) -> DMat2 {
    let w0 = project(world, elu_to_matrix(eye, lookat, up), projection, viewport);
    let w1 = project(
        world,
        elu_to_matrix(eye + dir1 * JACOBIAN_EPS, lookat + dir1 * JACOBIAN_EPS, up),
        projection,
        viewport,
    );
    let w2 = project(
        world,
        elu_to_matrix(eye + dir2 * JACOBIAN_EPS, lookat + dir2 * JACOBIAN_EPS, up),
        projection,
        viewport,
    );

    DMat2::from_cols(
        DVec2::new((w1.x - w0.x) / JACOBIAN_EPS, (w1.y - w0.y) / JACOBIAN_EPS),
        DVec2::new((w2.x - w0.x) / JACOBIAN_EPS, (w2.y - w0.y) / JACOBIAN_EPS),
    )
}

/// Solve for the camera translation that pins `world` under a cursor.
///
/// Newton iteration over translations along the camera's up and left
/// axes: move eye and look-at together until `world` projects to
/// `(win_x, win_y)` in bottom-left window coordinates. Returns the total
/// translation to add to both; the caller's camera is not modified.
/// `preserve_z` drops the vertical component of each step so ground-plane
/// cameras stay at altitude.
#[allow(clippy::too_many_arguments)]
pub fn window_space_pan_to(
    world: DVec3,
    win_x: f64,
    win_y: f64,
    preserve_z: bool,
    projection: DMat4,
    viewport: [f32; 4],
    eye: DVec3,
    lookat: DVec3,
    up: DVec3,
) -> DVec3 {
    let mut eye = eye;
    let mut lookat = lookat;
    let mut moved = DVec3::ZERO;

    for _ in 0..MAX_ITERATIONS {
        let view = elu_to_matrix(eye, lookat, up);
        let win = project(world, view, projection, viewport);
        let err = DVec2::new(win_x - win.x, win_y - win.y);

        let look_dir = (lookat - eye).normalize_or_zero();
        let left = up.cross(look_dir);

        let jacobian = pan_jacobian(world, projection, viewport, eye, lookat, up, up, left);

        let mut dir1 = up;
        let mut dir2 = left;
        if preserve_z {
            dir1.z = 0.0;
            dir2.z = 0.0;
        }

        let weights = jacobian.inverse() * err;
        let dx = dir1 * weights.x + dir2 * weights.y;
        if !dx.is_finite() {
            break;
        }

        eye += dx;
        lookat += dx;
        moved += dx;

        if dx.length() < CONVERGED {
            break;
        }
    }

    moved
}
