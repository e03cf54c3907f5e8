// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Coalesced redraw scheduling.

use std::collections::BTreeSet;

/// Dirty flag plus named continuous-redraw claims.
///
/// Mutations never draw synchronously; they mark the canvas dirty or
/// register a named claim that keeps frames coming while an animation
/// runs. The host polls [`needs_frame`](Self::needs_frame) on a fixed
/// timer (30ms or so) and renders exactly one frame when it reports true.
/// Rendering clears the dirty flag; claims stay until the owning
/// animation settles and ends them by name.
#[derive(Debug, Default)]
pub struct RedrawScheduler {
    dirty: bool,
    claims: BTreeSet<String>,
}

impl RedrawScheduler {
    /// Fresh scheduler with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a one-shot redraw.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Register a continuous-redraw claim. Re-adding is a no-op.
    pub fn begin_continuous(&mut self, claim: impl Into<String>) {
        self.claims.insert(claim.into());
    }

    /// Drop a continuous-redraw claim.
    pub fn end_continuous(&mut self, claim: &str) {
        self.claims.remove(claim);
    }

    /// Whether the next timer tick should render a frame.
    pub fn needs_frame(&self) -> bool {
        self.dirty || !self.claims.is_empty()
    }

    /// Note that a frame was rendered.
    pub fn frame_rendered(&mut self) {
        self.dirty = false;
    }
}
