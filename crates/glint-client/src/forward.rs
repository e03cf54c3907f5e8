// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Outbound message coalescing.

/// Default cull window in milliseconds.
pub const DEFAULT_CULL_WINDOW_MS: u64 = 5;

/// Rate limiter for outbound event traffic.
///
/// Back-to-back messages of the same wire code inside a small window are
/// culled; the window is anchored at the last message actually admitted,
/// so a steady stream still gets through at the window rate. A message of
/// a different code always passes and becomes the new anchor. Echo replies
/// and pixel readbacks never pass through here.
#[derive(Debug)]
pub struct EventForwarder {
    window_ms: u64,
    last: Option<(u32, u64)>,
}

impl EventForwarder {
    /// Limiter with the given cull window.
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            last: None,
        }
    }

    /// Whether a message with this code may go out now.
    ///
    /// Admitting updates the anchor; a culled message does not.
    pub fn admit(&mut self, code: u32, now_ms: u64) -> bool {
        if let Some((last_code, at)) = self.last {
            if last_code == code && now_ms.saturating_sub(at) < self.window_ms {
                return false;
            }
        }
        self.last = Some((code, now_ms));
        true
    }
}

impl Default for EventForwarder {
    fn default() -> Self {
        Self::new(DEFAULT_CULL_WINDOW_MS)
    }
}
