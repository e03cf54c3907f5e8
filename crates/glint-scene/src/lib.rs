// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Client-side scene state for glint remote rendering.
//!
//! Everything a canvas holds between frames lives here: the define-once
//! resource store, the layer/buffer registry with draw ordering, and the
//! stack machine that replays buffer command streams against a
//! [`RenderPort`] backend. The crate stays free of I/O and timing; the
//! canvas runtime owns both and drives these types from a single thread.

pub mod port;
pub mod registry;
pub mod replay;
pub mod stacks;
pub mod store;

pub use port::{PortError, RecordingPort, RenderOp, RenderPort};
pub use registry::{Buffer, Layer, LayoutChange, Registry};
pub use replay::{ReplayEnv, ReplayState};
pub use stacks::{mat4_from_row_major, mat4_to_row_major, EnableStack, MatrixStack};
pub use store::{ObjectStore, ResourcePayload, StoreError, TextureImage, TextureUpload};
