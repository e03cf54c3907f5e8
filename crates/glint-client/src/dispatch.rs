// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Input event routing across layers.

use glint_proto::{EventKind, Touch};
use glint_scene::Registry;

/// A raw input event as the host surface delivers it.
///
/// Coordinates are canvas pixels with a top-left origin, the way window
/// systems report them. The wheel keeps its cursor position here even
/// though the wire encoding drops it; zooming needs a pivot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceEvent {
    /// Mouse button pressed.
    MouseDown {
        /// Canvas x in pixels.
        x: f32,
        /// Canvas y in pixels, top-down.
        y: f32,
        /// Button index.
        button: u8,
    },
    /// Mouse moved.
    MouseMove {
        /// Canvas x in pixels.
        x: f32,
        /// Canvas y in pixels, top-down.
        y: f32,
    },
    /// Mouse button released.
    MouseUp {
        /// Canvas x in pixels.
        x: f32,
        /// Canvas y in pixels, top-down.
        y: f32,
        /// Button index.
        button: u8,
    },
    /// Press and release in place.
    MouseClick {
        /// Canvas x in pixels.
        x: f32,
        /// Canvas y in pixels, top-down.
        y: f32,
        /// Button index.
        button: u8,
    },
    /// Wheel turned at a cursor position.
    Wheel {
        /// Canvas x in pixels.
        x: f32,
        /// Canvas y in pixels, top-down.
        y: f32,
        /// Wheel delta; positive is a scroll toward the user.
        amount: f32,
    },
    /// Key pressed down.
    KeyDown {
        /// Host key code.
        key_code: u32,
    },
    /// Key repeat/press.
    KeyPress {
        /// Host key code.
        key_code: u32,
    },
    /// Key released.
    KeyUp {
        /// Host key code.
        key_code: u32,
    },
    /// Touch began.
    TouchStart(Touch),
    /// Touch moved.
    TouchMove(Touch),
    /// Touch ended.
    TouchEnd(Touch),
    /// Short tap.
    TouchTap(Touch),
}

enum RouteClass {
    HitTest,
    Capture,
    Focus,
}

impl SurfaceEvent {
    /// The wire event this becomes when forwarded.
    pub fn to_wire(&self) -> EventKind {
        match *self {
            Self::MouseDown { x, y, button } => EventKind::MouseDown { x, y, button },
            Self::MouseMove { x, y } => EventKind::MouseMoved { x, y },
            Self::MouseUp { x, y, button } => EventKind::MouseUp { x, y, button },
            Self::MouseClick { x, y, button } => EventKind::MouseClicked { x, y, button },
            Self::Wheel { amount, .. } => EventKind::MouseWheel { amount },
            Self::KeyDown { key_code } => EventKind::KeyDown { key_code },
            Self::KeyPress { key_code } => EventKind::KeyPressed { key_code },
            Self::KeyUp { key_code } => EventKind::KeyUp { key_code },
            Self::TouchStart(t) => EventKind::TouchStart(t),
            Self::TouchMove(t) => EventKind::TouchMove(t),
            Self::TouchEnd(t) => EventKind::TouchEnd(t),
            Self::TouchTap(t) => EventKind::TouchTap(t),
        }
    }

    fn position(&self) -> Option<(f32, f32)> {
        match *self {
            Self::MouseDown { x, y, .. }
            | Self::MouseMove { x, y }
            | Self::MouseUp { x, y, .. }
            | Self::MouseClick { x, y, .. }
            | Self::Wheel { x, y, .. } => Some((x, y)),
            Self::TouchStart(t) | Self::TouchMove(t) | Self::TouchEnd(t) | Self::TouchTap(t) => {
                Some((t.x, t.y))
            }
            Self::KeyDown { .. } | Self::KeyPress { .. } | Self::KeyUp { .. } => None,
        }
    }

    fn class(&self) -> RouteClass {
        match self {
            Self::MouseDown { .. }
            | Self::MouseClick { .. }
            | Self::Wheel { .. }
            | Self::TouchStart(_)
            | Self::TouchTap(_) => RouteClass::HitTest,
            Self::MouseMove { .. }
            | Self::MouseUp { .. }
            | Self::TouchMove(_)
            | Self::TouchEnd(_) => RouteClass::Capture,
            Self::KeyDown { .. } | Self::KeyPress { .. } | Self::KeyUp { .. } => RouteClass::Focus,
        }
    }
}

/// Decides which layer receives each event.
///
/// Press, wheel, click and tap events are hit-tested from the topmost
/// layer down; the winning layer takes both keyboard focus and pointer
/// capture. Move and release events follow the capture unconditionally so
/// drags keep working outside the layer's bounds; capture clears on mouse
/// release and when the last touch lifts. Key events go to the focus
/// layer, defaulting to the bottom-most layer.
#[derive(Debug, Default)]
pub struct EventRouter {
    keyboard_focus: Option<String>,
    capture: Option<String>,
}

impl EventRouter {
    /// Router with no focus or capture yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current keyboard focus layer, if any.
    pub fn keyboard_focus(&self) -> Option<&str> {
        self.keyboard_focus.as_deref()
    }

    /// Currently captured layer, if any.
    pub fn captured(&self) -> Option<&str> {
        self.capture.as_deref()
    }

    /// Pick the target layer, updating focus and capture on the way.
    ///
    /// `None` means the event lands nowhere and is dropped.
    #[allow(clippy::cast_precision_loss)] // canvas sizes are far below 2^24
    pub fn route(
        &mut self,
        registry: &Registry,
        canvas_width: u32,
        canvas_height: u32,
        event: &SurfaceEvent,
    ) -> Option<String> {
        match event.class() {
            RouteClass::HitTest => {
                let (x, y) = event.position()?;
                let win_y = canvas_height as f32 - y;
                for layer in registry.layers_in_draw_order().iter().rev() {
                    if !layer.visible {
                        continue;
                    }
                    let vp = layer.pixel_viewport(canvas_width, canvas_height);
                    let inside = x >= vp[0]
                        && x < vp[0] + vp[2]
                        && win_y >= vp[1]
                        && win_y < vp[1] + vp[3];
                    if inside {
                        self.keyboard_focus = Some(layer.name.clone());
                        self.capture = Some(layer.name.clone());
                        return Some(layer.name.clone());
                    }
                }
                None
            }
            RouteClass::Capture => {
                let target = self.capture.clone();
                match event {
                    SurfaceEvent::MouseUp { .. } => self.capture = None,
                    SurfaceEvent::TouchEnd(t) if t.ntouches == 0 => self.capture = None,
                    _ => {}
                }
                target
            }
            RouteClass::Focus => {
                if self.keyboard_focus.is_none() {
                    self.keyboard_focus = registry
                        .layers_in_draw_order()
                        .first()
                        .map(|l| l.name.clone());
                }
                self.keyboard_focus.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn two_stacked_layers() -> Registry {
        let mut reg = Registry::new();
        reg.upsert_buffer("back", "b", 0.0, vec![]);
        reg.set_layer_draw_order("back", 0.0);
        reg.upsert_buffer("front", "b", 0.0, vec![]);
        reg.set_layer_draw_order("front", 1.0);
        reg
    }

    fn down(x: f32, y: f32) -> SurfaceEvent {
        SurfaceEvent::MouseDown { x, y, button: 0 }
    }

    // ── 1. hit testing ──

    #[test]
    fn press_routes_to_the_topmost_layer() {
        let reg = two_stacked_layers();
        let mut router = EventRouter::new();

        let target = router.route(&reg, 800, 600, &down(400.0, 300.0));
        assert_eq!(target.as_deref(), Some("front"));
    }

    #[test]
    fn invisible_layers_are_skipped() {
        let mut reg = two_stacked_layers();
        reg.layer_mut("front").unwrap().visible = false;
        let mut router = EventRouter::new();

        let target = router.route(&reg, 800, 600, &down(400.0, 300.0));
        assert_eq!(target.as_deref(), Some("back"));
    }

    #[test]
    fn hit_test_respects_layer_position() {
        let mut reg = two_stacked_layers();
        // Right half of the canvas only.
        reg.layer_mut("front").unwrap().position = [0.5, 0.0, 0.5, 1.0];
        let mut router = EventRouter::new();

        assert_eq!(
            router.route(&reg, 800, 600, &down(600.0, 300.0)).as_deref(),
            Some("front")
        );
        assert_eq!(
            router.route(&reg, 800, 600, &down(100.0, 300.0)).as_deref(),
            Some("back")
        );
    }

    #[test]
    fn hit_test_flips_y_against_the_canvas() {
        let mut reg = Registry::new();
        reg.upsert_buffer("top", "b", 0.0, vec![]);
        // Upper half of the canvas: window y in [300, 600).
        reg.layer_mut("top").unwrap().position = [0.0, 0.5, 1.0, 0.5];
        let mut router = EventRouter::new();

        // Near the top of the screen in surface coordinates.
        assert_eq!(
            router.route(&reg, 800, 600, &down(400.0, 100.0)).as_deref(),
            Some("top")
        );
        // Near the bottom: outside the layer.
        assert!(router.route(&reg, 800, 600, &down(400.0, 500.0)).is_none());
    }

    // ── 2. capture ──

    #[test]
    fn drags_follow_the_captured_layer_until_release() {
        let mut reg = two_stacked_layers();
        reg.layer_mut("front").unwrap().position = [0.5, 0.0, 0.5, 1.0];
        let mut router = EventRouter::new();

        router.route(&reg, 800, 600, &down(600.0, 300.0));
        // Dragging far outside the layer still goes to it.
        let moved = router.route(
            &reg,
            800,
            600,
            &SurfaceEvent::MouseMove { x: 10.0, y: 10.0 },
        );
        assert_eq!(moved.as_deref(), Some("front"));

        let up = router.route(
            &reg,
            800,
            600,
            &SurfaceEvent::MouseUp {
                x: 10.0,
                y: 10.0,
                button: 0,
            },
        );
        assert_eq!(up.as_deref(), Some("front"));

        // Capture is gone; a hover move lands nowhere.
        assert!(router
            .route(
                &reg,
                800,
                600,
                &SurfaceEvent::MouseMove { x: 600.0, y: 300.0 },
            )
            .is_none());
    }

    #[test]
    fn touch_capture_clears_when_the_last_finger_lifts() {
        let reg = two_stacked_layers();
        let mut router = EventRouter::new();
        let touch = |ntouches: u32| Touch {
            x: 400.0,
            y: 300.0,
            ntouches,
            touch_id: 0,
        };

        router.route(&reg, 800, 600, &SurfaceEvent::TouchStart(touch(1)));
        assert_eq!(router.captured(), Some("front"));

        // One finger still down: capture holds.
        router.route(&reg, 800, 600, &SurfaceEvent::TouchEnd(touch(1)));
        assert_eq!(router.captured(), Some("front"));

        router.route(&reg, 800, 600, &SurfaceEvent::TouchEnd(touch(0)));
        assert!(router.captured().is_none());
    }

    // ── 3. keyboard focus ──

    #[test]
    fn keys_default_to_the_bottom_most_layer() {
        let reg = two_stacked_layers();
        let mut router = EventRouter::new();

        let target = router.route(&reg, 800, 600, &SurfaceEvent::KeyDown { key_code: 65 });
        assert_eq!(target.as_deref(), Some("back"));
    }

    #[test]
    fn focus_follows_the_last_hit_layer() {
        let reg = two_stacked_layers();
        let mut router = EventRouter::new();

        router.route(&reg, 800, 600, &down(400.0, 300.0));
        let target = router.route(&reg, 800, 600, &SurfaceEvent::KeyDown { key_code: 65 });
        assert_eq!(target.as_deref(), Some("front"));
    }
}
