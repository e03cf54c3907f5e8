// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Default camera controls: animated ELU state plus gesture handling.

use std::f64::consts::PI;

use glam::{DMat4, DQuat, DVec3};
use glint_proto::{CameraMask, Modifiers, Touch};
use tracing::warn;

use crate::anim::Animated;
use crate::math::{elu_to_matrix, perspective_for_viewport, plane_point_under_cursor};
use crate::pan::window_space_pan_to;

/// Default eye position.
pub const DEFAULT_EYE: DVec3 = DVec3::new(0.0, 0.0, 100.0);
/// Default look-at target.
pub const DEFAULT_LOOKAT: DVec3 = DVec3::ZERO;
/// Default up vector.
pub const DEFAULT_UP: DVec3 = DVec3::new(0.0, 1.0, 0.0);
/// Default layer clear color.
pub const DEFAULT_BACKGROUND: [f32; 4] = [0.1, 0.1, 0.1, 1.0];
/// Default easing window for mouse gestures, in milliseconds.
pub const DEFAULT_ANIMATE_MS: f32 = 200.0;
/// Default easing window for touch gestures, in milliseconds.
pub const DEFAULT_TOUCH_ANIMATE_MS: f32 = 150.0;

/// Constraint applied to every camera goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraMode {
    /// Unconstrained orbit ("3D").
    #[default]
    Full,
    /// Level horizon looking at the ground plane, roll forbidden ("2.5D").
    Oblique,
    /// Straight down with rotation locked entirely ("2F").
    Locked,
    /// Straight down, rotation about the vertical still allowed ("2D").
    TopDown,
}

impl CameraMode {
    /// Parse the wire name of a mode.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "3D" => Some(Self::Full),
            "2.5D" => Some(Self::Oblique),
            "2F" => Some(Self::Locked),
            "2D" => Some(Self::TopDown),
            _ => None,
        }
    }

    /// Wire name of this mode.
    pub fn name(self) -> &'static str {
        match self {
            Self::Full => "3D",
            Self::Oblique => "2.5D",
            Self::Locked => "2F",
            Self::TopDown => "2D",
        }
    }
}

/// Per-frame camera output for one layer.
#[derive(Debug, Clone, Copy)]
pub struct LayerSetup {
    /// Interpolated eye position.
    pub eye: DVec3,
    /// Interpolated look-at target.
    pub lookat: DVec3,
    /// Interpolated up vector.
    pub up: DVec3,
    /// View matrix for this frame.
    pub view: DMat4,
    /// Projection matrix for this frame.
    pub projection: DMat4,
    /// Interpolated clear color.
    pub background: [f32; 4],
    /// Whether the camera pose animation has finished.
    pub elu_settled: bool,
    /// Whether the background animation has finished.
    pub background_settled: bool,
}

/// Animated camera with the stock pan/orbit/zoom gestures.
///
/// All methods take the caller's clock as a millisecond timestamp; the
/// camera never reads time itself. Cursor and touch coordinates are window
/// space: origin at the canvas bottom-left, y growing upward, so hosts
/// flip top-down surface coordinates against the canvas height first.
/// Gesture handlers return whether the camera picked a new goal, which is
/// the caller's cue to redraw continuously until
/// [`LayerSetup::elu_settled`] reports done. Handlers never consume an
/// event: forwarding to other handlers is unaffected.
#[derive(Debug)]
pub struct CameraControls {
    mode: CameraMode,
    mask: CameraMask,
    /// Easing window for mouse gestures, in milliseconds.
    pub animate_ms: f32,
    /// Easing window for touch gestures, in milliseconds.
    pub touch_animate_ms: f32,
    eye: Animated<3>,
    lookat: Animated<3>,
    up: Animated<3>,
    background: Animated<4>,
    plane_normal: DVec3,
    plane_d: f64,
    manipulation_point: Option<DVec3>,
    pressed_button: Option<u8>,
    last_rotate: [f32; 2],
    touches: Vec<(u32, [f32; 2])>,
    last_touch_center: Option<[f32; 2]>,
    last_touch_dist: f64,
}

impl CameraControls {
    /// Camera at the default pose, at rest.
    pub fn new(now_ms: u64) -> Self {
        Self {
            mode: CameraMode::default(),
            mask: CameraMask::all(),
            animate_ms: DEFAULT_ANIMATE_MS,
            touch_animate_ms: DEFAULT_TOUCH_ANIMATE_MS,
            eye: Animated::steady(DEFAULT_EYE.to_array(), now_ms),
            lookat: Animated::steady(DEFAULT_LOOKAT.to_array(), now_ms),
            up: Animated::steady(DEFAULT_UP.to_array(), now_ms),
            background: Animated::steady(
                [
                    f64::from(DEFAULT_BACKGROUND[0]),
                    f64::from(DEFAULT_BACKGROUND[1]),
                    f64::from(DEFAULT_BACKGROUND[2]),
                    f64::from(DEFAULT_BACKGROUND[3]),
                ],
                now_ms,
            ),
            plane_normal: DVec3::Z,
            plane_d: 0.0,
            manipulation_point: None,
            pressed_button: None,
            last_rotate: [0.0, 0.0],
            touches: Vec::new(),
            last_touch_center: None,
            last_touch_dist: 0.0,
        }
    }

    /// Active constraint mode.
    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    /// Switch constraint mode; applies to subsequent goals.
    pub fn set_mode(&mut self, mode: CameraMode) {
        self.mode = mode;
    }

    /// Enabled gesture classes.
    pub fn mask(&self) -> CameraMask {
        self.mask
    }

    /// Enable or disable gesture classes.
    pub fn set_mask(&mut self, mask: CameraMask) {
        self.mask = mask;
    }

    /// Replace the `normal . p = d` plane gestures grab points on.
    pub fn set_manipulation_plane(&mut self, normal: DVec3, d: f64) {
        self.plane_normal = normal;
        self.plane_d = d;
    }

    /// The pose the camera is heading toward, as (eye, lookat, up).
    pub fn target_elu(&self) -> (DVec3, DVec3, DVec3) {
        (
            DVec3::from_array(self.eye.target()),
            DVec3::from_array(self.lookat.target()),
            DVec3::from_array(self.up.target()),
        )
    }

    /// Ease toward a new pose over `duration_ms`.
    ///
    /// The goal is constrained by the active [`CameraMode`] first.
    /// Non-finite goals are logged and discarded; returns whether the
    /// camera accepted the goal.
    pub fn goto_elu(
        &mut self,
        eye: DVec3,
        lookat: DVec3,
        up: DVec3,
        duration_ms: f32,
        now_ms: u64,
    ) -> bool {
        if !(eye.is_finite() && lookat.is_finite() && up.is_finite()) {
            warn!("discarding non-finite camera goal");
            return false;
        }
        let (eye, lookat, up) = self.constrain(eye, lookat, up);
        let duration = f64::from(duration_ms);
        self.eye.retarget(eye.to_array(), duration, now_ms);
        self.lookat.retarget(lookat.to_array(), duration, now_ms);
        self.up.retarget(up.to_array(), duration, now_ms);
        true
    }

    /// Ease the clear color toward `rgba` over `duration_ms`.
    pub fn goto_background(&mut self, rgba: [f32; 4], duration_ms: f32, now_ms: u64) {
        self.background.retarget(
            [
                f64::from(rgba[0]),
                f64::from(rgba[1]),
                f64::from(rgba[2]),
                f64::from(rgba[3]),
            ],
            f64::from(duration_ms),
            now_ms,
        );
    }

    /// Sample the camera for one frame of the given layer viewport.
    #[allow(clippy::cast_possible_truncation)] // colors narrow back to wire width
    pub fn setup(&self, viewport: [f32; 4], now_ms: u64) -> LayerSetup {
        let eye = DVec3::from_array(self.eye.sample(now_ms).value);
        let lookat = DVec3::from_array(self.lookat.sample(now_ms).value);
        let up = DVec3::from_array(self.up.sample(now_ms).value);
        let bg = self.background.sample(now_ms).value;
        LayerSetup {
            eye,
            lookat,
            up,
            view: elu_to_matrix(eye, lookat, up),
            projection: perspective_for_viewport(viewport),
            background: [bg[0] as f32, bg[1] as f32, bg[2] as f32, bg[3] as f32],
            elu_settled: self.eye.settled(now_ms)
                && self.lookat.settled(now_ms)
                && self.up.settled(now_ms),
            background_settled: self.background.settled(now_ms),
        }
    }

    /// Button press: grab the manipulation point under the cursor.
    pub fn on_mouse_down(
        &mut self,
        viewport: [f32; 4],
        x: f32,
        y: f32,
        button: u8,
        now_ms: u64,
    ) -> bool {
        let p = self.pick(viewport, x, y, now_ms);
        self.manipulation_point = p.is_finite().then_some(p);
        self.pressed_button = Some(button);
        self.last_rotate = [x, y];
        false
    }

    /// Button release ends the active drag.
    pub fn on_mouse_up(&mut self) -> bool {
        self.pressed_button = None;
        false
    }

    /// Drag: primary button pans, secondary orbits.
    ///
    /// Holding shift and/or ctrl during an orbit isolates roll, pitch or
    /// yaw; an unmodified orbit combines yaw and pitch.
    pub fn on_mouse_move(
        &mut self,
        viewport: [f32; 4],
        x: f32,
        y: f32,
        modifiers: Modifiers,
        now_ms: u64,
    ) -> bool {
        let Some(button) = self.pressed_button else {
            return false;
        };
        let plain = !modifiers.shift() && !modifiers.ctrl() && !modifiers.alt();

        if button == 0 && plain {
            if !self.mask.pan() {
                return false;
            }
            let Some(grab) = self.manipulation_point else {
                return false;
            };
            let (t_eye, t_lookat, t_up) = self.target_elu();
            let mv = window_space_pan_to(
                grab,
                f64::from(x),
                f64::from(y),
                false,
                perspective_for_viewport(viewport),
                viewport,
                t_eye,
                t_lookat,
                t_up,
            );
            let duration = self.animate_ms;
            self.goto_elu(t_eye + mv, t_lookat + mv, t_up, duration, now_ms)
        } else if button == 2 {
            self.orbit(viewport, x, y, modifiers, now_ms)
        } else {
            false
        }
    }

    /// Wheel: zoom toward the point under the cursor.
    ///
    /// Positive `amount` is a scroll toward the user and zooms out; shift
    /// speeds the step up.
    pub fn on_wheel(
        &mut self,
        viewport: [f32; 4],
        x: f32,
        y: f32,
        amount: f32,
        modifiers: Modifiers,
        now_ms: u64,
    ) -> bool {
        if !self.mask.zoom() {
            return false;
        }
        let speed = if modifiers.shift() { 1.1 } else { 1.05 };
        let ratio = if amount > 0.0 { speed } else { 1.0 / speed };

        let (cur, view, projection) = self.current(viewport, now_ms);
        let (t_eye, t_lookat, _) = self.target_elu();
        let new_eye = (t_eye - t_lookat) * ratio + cur.1;

        // Re-pan so the point under the cursor stays put while zooming.
        let grab = plane_point_under_cursor(
            x,
            y,
            self.plane_normal,
            self.plane_d,
            view,
            projection,
            viewport,
        );
        let mv = if grab.is_finite() {
            window_space_pan_to(
                grab,
                f64::from(x),
                f64::from(y),
                false,
                projection,
                viewport,
                new_eye,
                cur.1,
                cur.2,
            )
        } else {
            DVec3::ZERO
        };

        let duration = self.animate_ms;
        self.goto_elu(new_eye + mv, cur.1 + mv, cur.2, duration, now_ms)
    }

    /// First finger grabs a manipulation point; a second finger arms the
    /// two-finger gesture.
    pub fn on_touch_start(&mut self, viewport: [f32; 4], touch: &Touch, now_ms: u64) -> bool {
        if touch.ntouches == 1 {
            self.touches.clear();
            let p = self.pick(viewport, touch.x, touch.y, now_ms);
            self.manipulation_point = p.is_finite().then_some(p);
        }
        self.track_touch(touch);
        if touch.ntouches == 2 {
            self.manipulation_point = None;
            self.last_touch_center = None;
        }
        false
    }

    /// One finger pans; two fingers orbit and pinch-zoom.
    pub fn on_touch_move(&mut self, viewport: [f32; 4], touch: &Touch, now_ms: u64) -> bool {
        self.track_touch(touch);

        if touch.ntouches == 1 {
            if !self.mask.pan() {
                return false;
            }
            let Some(grab) = self.manipulation_point else {
                return false;
            };
            let (t_eye, t_lookat, t_up) = self.target_elu();
            let mv = window_space_pan_to(
                grab,
                f64::from(touch.x),
                f64::from(touch.y),
                false,
                perspective_for_viewport(viewport),
                viewport,
                t_eye,
                t_lookat,
                t_up,
            );
            let duration = self.touch_animate_ms;
            return self.goto_elu(t_eye + mv, t_lookat + mv, t_up, duration, now_ms);
        }

        if touch.ntouches == 2 && self.touches.len() >= 2 {
            let a = self.touches[0].1;
            let b = self.touches[1].1;
            let center = [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0];
            let dist = f64::from(a[0] - b[0]).hypot(f64::from(a[1] - b[1]));
            let last_center = self.last_touch_center.replace(center);
            let last_dist = std::mem::replace(&mut self.last_touch_dist, dist);

            if let Some(last) = last_center {
                let dx = f64::from(center[0] - last[0]);
                let dy = f64::from(center[1] - last[1]);
                let (cur, _, _) = self.current(viewport, now_ms);
                let px_to_rad = PI / f64::from(viewport[2].max(viewport[3]));
                let to_eye_now = cur.0 - cur.1;
                let left = cur.2.cross(to_eye_now);
                // Window y grows upward, so an upward drag pitches positive.
                let q = axis_quat(cur.2, -dx * px_to_rad) * axis_quat(left, dy * px_to_rad);

                let (t_eye, t_lookat, t_up) = self.target_elu();
                let mut to_eye = t_eye - t_lookat;
                let mut new_up = t_up;
                if self.mask.rotate() {
                    to_eye = q * to_eye;
                    new_up = q * t_up;
                }
                let mut new_eye = t_lookat + to_eye;
                if self.mask.zoom() {
                    let ratio = last_dist / dist;
                    new_eye = (new_eye - t_lookat) * ratio + t_lookat;
                }
                let duration = self.touch_animate_ms;
                return self.goto_elu(new_eye, t_lookat, new_up, duration, now_ms);
            }
        }
        false
    }

    /// Lifting the last finger releases the grab.
    pub fn on_touch_end(&mut self, touch: &Touch) -> bool {
        self.touches.retain(|(id, _)| *id != touch.touch_id);
        if touch.ntouches == 0 {
            self.touches.clear();
            self.manipulation_point = None;
            self.last_touch_center = None;
        }
        false
    }

    fn orbit(
        &mut self,
        viewport: [f32; 4],
        x: f32,
        y: f32,
        modifiers: Modifiers,
        now_ms: u64,
    ) -> bool {
        if !self.mask.rotate() {
            return false;
        }
        let only_roll = modifiers.shift() && modifiers.ctrl();
        let only_pitch = modifiers.shift() && !modifiers.ctrl();
        let only_yaw = modifiers.ctrl() && !modifiers.shift();

        let dx = f64::from(x - self.last_rotate[0]);
        let dy = f64::from(y - self.last_rotate[1]);
        let px_to_rad = PI / f64::from(viewport[2].max(viewport[3]));

        let (cur, view, projection) = self.current(viewport, now_ms);
        let to_eye_now = cur.0 - cur.1;
        let left = cur.2.cross(to_eye_now);

        let q = if only_roll {
            let cx = f64::from(viewport[0]) + f64::from(viewport[2]) / 2.0;
            let cy = f64::from(viewport[1]) + f64::from(viewport[3]) / 2.0;
            let theta0 = (f64::from(self.last_rotate[1]) - cy)
                .atan2(f64::from(self.last_rotate[0]) - cx);
            let theta1 = (f64::from(y) - cy).atan2(f64::from(x) - cx);
            axis_quat(to_eye_now, theta0 - theta1)
        } else if only_yaw {
            axis_quat(cur.2, -dx * px_to_rad)
        } else if only_pitch {
            axis_quat(left, dy * px_to_rad)
        } else {
            axis_quat(cur.2, -dx * px_to_rad) * axis_quat(left, dy * px_to_rad)
        };
        self.last_rotate = [x, y];

        let (t_eye, t_lookat, t_up) = self.target_elu();
        let new_eye = t_lookat + q * (t_eye - t_lookat);
        let new_up = q * t_up;

        // Re-center the orbit on whatever sits mid-viewport right now.
        let center = plane_point_under_cursor(
            viewport[2] / 2.0,
            viewport[3] / 2.0,
            self.plane_normal,
            self.plane_d,
            view,
            projection,
            viewport,
        );
        let new_lookat = if center.is_finite() { center } else { t_lookat };

        let duration = self.animate_ms;
        self.goto_elu(new_eye, new_lookat, new_up, duration, now_ms)
    }

    fn constrain(&self, eye: DVec3, lookat: DVec3, up: DVec3) -> (DVec3, DVec3, DVec3) {
        match self.mode {
            CameraMode::Full => (eye, lookat, up),
            CameraMode::Oblique => {
                let dist = eye.distance(lookat);
                let lookat = DVec3::new(lookat.x, lookat.y, 0.0);
                let look_dir = (lookat - eye).normalize_or_zero();
                let mut left = up.cross(look_dir);
                left.z = 0.0;
                let left = left.normalize_or_zero();
                let up = look_dir.cross(left).normalize_or_zero();
                let dir = up.cross(left);
                (lookat + dir * dist, lookat, up)
            }
            CameraMode::Locked => {
                let up = DVec3::new(0.0, 1.0, 0.0);
                (DVec3::new(lookat.x, lookat.y, eye.z), lookat, up)
            }
            CameraMode::TopDown => (DVec3::new(lookat.x, lookat.y, eye.z), lookat, up),
        }
    }

    fn current(&self, viewport: [f32; 4], now_ms: u64) -> ((DVec3, DVec3, DVec3), DMat4, DMat4) {
        let eye = DVec3::from_array(self.eye.sample(now_ms).value);
        let lookat = DVec3::from_array(self.lookat.sample(now_ms).value);
        let up = DVec3::from_array(self.up.sample(now_ms).value);
        (
            (eye, lookat, up),
            elu_to_matrix(eye, lookat, up),
            perspective_for_viewport(viewport),
        )
    }

    fn pick(&self, viewport: [f32; 4], x: f32, y: f32, now_ms: u64) -> DVec3 {
        let (_, view, projection) = self.current(viewport, now_ms);
        plane_point_under_cursor(
            x,
            y,
            self.plane_normal,
            self.plane_d,
            view,
            projection,
            viewport,
        )
    }

    fn track_touch(&mut self, touch: &Touch) {
        match self.touches.iter_mut().find(|(id, _)| *id == touch.touch_id) {
            Some((_, pos)) => *pos = [touch.x, touch.y],
            None => self.touches.push((touch.touch_id, [touch.x, touch.y])),
        }
    }
}

fn axis_quat(axis: DVec3, angle: f64) -> DQuat {
    let axis = axis.normalize_or_zero();
    if axis == DVec3::ZERO {
        DQuat::IDENTITY
    } else {
        DQuat::from_axis_angle(axis, angle)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use approx::assert_relative_eq;

    const VIEWPORT: [f32; 4] = [0.0, 0.0, 800.0, 600.0];

    // ── 1. defaults and easing ──

    #[test]
    fn fresh_camera_is_settled_at_the_default_pose() {
        let cam = CameraControls::new(0);
        let setup = cam.setup(VIEWPORT, 0);

        assert_relative_eq!(setup.eye.z, 100.0);
        assert_relative_eq!(setup.lookat.x, 0.0);
        assert_relative_eq!(setup.background[0], 0.1);
        assert!(setup.elu_settled);
        assert!(setup.background_settled);
    }

    #[test]
    fn goto_elu_eases_and_settles() {
        let mut cam = CameraControls::new(0);
        assert!(cam.goto_elu(
            DVec3::new(10.0, 0.0, 100.0),
            DVec3::ZERO,
            DVec3::Y,
            200.0,
            0,
        ));

        let mid = cam.setup(VIEWPORT, 100);
        assert!(mid.eye.x > 0.0 && mid.eye.x < 10.0);
        assert!(!mid.elu_settled);

        let end = cam.setup(VIEWPORT, 200);
        assert_relative_eq!(end.eye.x, 10.0);
        assert!(end.elu_settled);
    }

    #[test]
    fn non_finite_goal_is_rejected() {
        let mut cam = CameraControls::new(0);
        assert!(!cam.goto_elu(
            DVec3::new(f64::NAN, 0.0, 0.0),
            DVec3::ZERO,
            DVec3::Y,
            0.0,
            0,
        ));
        let (eye, _, _) = cam.target_elu();
        assert_relative_eq!(eye.z, 100.0);
    }

    #[test]
    fn background_eases_between_colors() {
        let mut cam = CameraControls::new(0);
        cam.goto_background([1.0, 0.0, 0.0, 1.0], 100.0, 0);

        let mid = cam.setup(VIEWPORT, 50);
        assert!(mid.background[0] > 0.1 && mid.background[0] < 1.0);
        assert!(!mid.background_settled);

        let end = cam.setup(VIEWPORT, 100);
        assert_relative_eq!(end.background[0], 1.0);
        assert!(end.background_settled);
    }

    // ── 2. mode constraints ──

    #[test]
    fn top_down_mode_pins_eye_over_lookat() {
        let mut cam = CameraControls::new(0);
        cam.set_mode(CameraMode::TopDown);
        cam.goto_elu(
            DVec3::new(5.0, 7.0, 50.0),
            DVec3::new(1.0, 2.0, 0.0),
            DVec3::Y,
            0.0,
            0,
        );

        let (eye, lookat, _) = cam.target_elu();
        assert_relative_eq!(eye.x, lookat.x);
        assert_relative_eq!(eye.y, lookat.y);
        assert_relative_eq!(eye.z, 50.0);
    }

    #[test]
    fn locked_mode_also_resets_up() {
        let mut cam = CameraControls::new(0);
        cam.set_mode(CameraMode::Locked);
        cam.goto_elu(
            DVec3::new(5.0, 7.0, 50.0),
            DVec3::new(1.0, 2.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            0.0,
            0,
        );

        let (eye, lookat, up) = cam.target_elu();
        assert_relative_eq!(eye.x, lookat.x);
        assert_relative_eq!(up.y, 1.0);
        assert_relative_eq!(up.x, 0.0);
    }

    #[test]
    fn oblique_mode_levels_the_horizon_and_keeps_distance() {
        let mut cam = CameraControls::new(0);
        cam.set_mode(CameraMode::Oblique);
        let eye = DVec3::new(0.0, -50.0, 50.0);
        let lookat = DVec3::new(3.0, 4.0, 10.0);
        let dist = eye.distance(lookat);
        cam.goto_elu(eye, lookat, DVec3::Z, 0.0, 0);

        let (new_eye, new_lookat, new_up) = cam.target_elu();
        assert_relative_eq!(new_lookat.z, 0.0);
        assert_relative_eq!(new_eye.distance(new_lookat), dist, epsilon = 1e-9);
        // Level horizon: the left vector has no vertical component, so up
        // stays in the plane spanned by the view direction and +z.
        assert_relative_eq!(new_up.length(), 1.0, epsilon = 1e-9);
    }

    // ── 3. gesture mask ──

    #[test]
    fn wheel_is_ignored_when_zoom_is_masked_off() {
        let mut cam = CameraControls::new(0);
        cam.set_mask(CameraMask(CameraMask::PAN));

        assert!(!cam.on_wheel(VIEWPORT, 400.0, 300.0, 1.0, Modifiers(0), 0));
        let (eye, _, _) = cam.target_elu();
        assert_relative_eq!(eye.z, 100.0);
    }

    // ── 4. gestures ──

    #[test]
    fn wheel_zooms_out_around_the_center() {
        let mut cam = CameraControls::new(0);
        assert!(cam.on_wheel(VIEWPORT, 400.0, 300.0, 1.0, Modifiers(0), 0));

        let (eye, lookat, _) = cam.target_elu();
        assert_relative_eq!(eye.z, 105.0, epsilon = 0.01);
        assert_relative_eq!(lookat.x, 0.0, epsilon = 0.01);
    }

    #[test]
    fn shift_wheel_zooms_faster() {
        let mut cam = CameraControls::new(0);
        cam.on_wheel(VIEWPORT, 400.0, 300.0, 1.0, Modifiers(Modifiers::SHIFT), 0);

        let (eye, _, _) = cam.target_elu();
        assert_relative_eq!(eye.z, 110.0, epsilon = 0.01);
    }

    #[test]
    fn primary_drag_pans_eye_and_lookat_together() {
        let mut cam = CameraControls::new(0);
        cam.on_mouse_down(VIEWPORT, 400.0, 300.0, 0, 0);
        assert!(cam.on_mouse_move(VIEWPORT, 420.0, 300.0, Modifiers(0), 0));

        let (eye, lookat, _) = cam.target_elu();
        // Dragging the scene rightward moves the camera left.
        assert!(eye.x < 0.0);
        assert_relative_eq!(eye.x, lookat.x, epsilon = 1e-9);
        assert_relative_eq!(eye.z, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn secondary_drag_orbits_at_constant_radius() {
        let mut cam = CameraControls::new(0);
        cam.on_mouse_down(VIEWPORT, 400.0, 300.0, 2, 0);
        assert!(cam.on_mouse_move(VIEWPORT, 440.0, 300.0, Modifiers(0), 0));

        let (eye, lookat, _) = cam.target_elu();
        assert!(eye.x.abs() > 0.1);
        assert_relative_eq!(eye.distance(lookat), 100.0, epsilon = 1e-6);
    }

    #[test]
    fn drag_after_release_does_nothing() {
        let mut cam = CameraControls::new(0);
        cam.on_mouse_down(VIEWPORT, 400.0, 300.0, 0, 0);
        cam.on_mouse_up();

        assert!(!cam.on_mouse_move(VIEWPORT, 500.0, 300.0, Modifiers(0), 0));
        let (eye, _, _) = cam.target_elu();
        assert_relative_eq!(eye.x, 0.0);
    }

    #[test]
    fn pinch_apart_zooms_in() {
        let mut cam = CameraControls::new(0);
        let touch = |id: u32, x: f32, n: u32| Touch {
            x,
            y: 300.0,
            ntouches: n,
            touch_id: id,
        };

        cam.on_touch_start(VIEWPORT, &touch(0, 350.0, 1), 0);
        cam.on_touch_start(VIEWPORT, &touch(1, 450.0, 2), 0);
        // First two-finger move only records the baseline.
        assert!(!cam.on_touch_move(VIEWPORT, &touch(0, 340.0, 2), 0));
        // Spreading the fingers shrinks the eye distance.
        assert!(cam.on_touch_move(VIEWPORT, &touch(1, 460.0, 2), 0));

        let (eye, lookat, _) = cam.target_elu();
        let expected = 100.0 * (110.0 / 120.0);
        assert_relative_eq!(eye.distance(lookat), expected, epsilon = 1e-6);
    }

    #[test]
    fn mode_names_round_trip() {
        for mode in [
            CameraMode::Full,
            CameraMode::Oblique,
            CameraMode::Locked,
            CameraMode::TopDown,
        ] {
            assert_eq!(CameraMode::from_name(mode.name()), Some(mode));
        }
        assert_eq!(CameraMode::from_name("1D"), None);
    }
}
