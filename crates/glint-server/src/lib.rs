// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Authoring side of glint remote rendering.
//!
//! Applications build [`SceneObject`] trees into named buffers of shared
//! [`World`]s; `swap` publishes a buffer atomically to every canvas showing
//! it. A [`CanvasSession`] speaks for one connected client: it turns
//! authoring directives into wire frames, defines each resource before its
//! first use on that connection and undefines it after its last, and routes
//! decoded client events to registered handlers. Transport is not owned
//! here — a gateway shuttles the session's outbound frames and inbound
//! bytes over whatever socket it terminates.

pub mod connection;
pub mod object;
pub mod resource;
pub mod world;

pub use connection::{CanvasHandler, CanvasSession, InputHandler, LayerHandle};
pub use object::{DrawObject, PixcoordOrigin, SceneObject};
pub use resource::{Resource, ResourceData, ResourceError, TextureData};
pub use world::World;
