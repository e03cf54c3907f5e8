// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Client-side canvas runtime for glint remote rendering.
//!
//! One [`Canvas`] embodies the client half of a connection: it applies
//! server opcode frames to a scene, coalesces redraw pressure onto the
//! host's render tick, routes raw input through per-layer handler chains
//! anchored by an animated camera, and queues the reports the server
//! expects back. Everything here is single-threaded and I/O-free; the
//! embedder owns the socket, the clock and the render backend, and pumps
//! the canvas from its own loop.

pub mod canvas;
pub mod dispatch;
pub mod forward;
pub mod redraw;

pub use canvas::{Canvas, EventHandler, HostAction};
pub use dispatch::{EventRouter, SurfaceEvent};
pub use forward::{EventForwarder, DEFAULT_CULL_WINDOW_MS};
pub use redraw::RedrawScheduler;
