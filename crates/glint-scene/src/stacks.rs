// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Transform and render-state stacks used during command replay.

use glam::DMat4;
use tracing::warn;

/// Convert a row-major wire matrix into a [`DMat4`].
pub fn mat4_from_row_major(values: &[f64; 16]) -> DMat4 {
    DMat4::from_cols_array(values).transpose()
}

/// Flatten a [`DMat4`] into row-major wire order.
pub fn mat4_to_row_major(m: DMat4) -> [f64; 16] {
    m.transpose().to_cols_array()
}

/// Matrix stack with a guaranteed top entry.
///
/// Pop never removes the base entry; an unbalanced stream is logged and
/// replay continues with whatever is left.
#[derive(Debug, Clone)]
pub struct MatrixStack {
    entries: Vec<DMat4>,
}

impl MatrixStack {
    /// New stack seeded with `top`.
    pub fn new(top: DMat4) -> Self {
        Self { entries: vec![top] }
    }

    /// New stack seeded with the identity matrix.
    pub fn identity() -> Self {
        Self::new(DMat4::IDENTITY)
    }

    /// Duplicate the top entry.
    pub fn push(&mut self) {
        self.entries.push(self.top());
    }

    /// Drop the top entry; refuses to drop the base.
    pub fn pop(&mut self) -> bool {
        if self.entries.len() > 1 {
            self.entries.pop();
            true
        } else {
            warn!("matrix stack pop with no matching push");
            false
        }
    }

    /// Current top entry.
    pub fn top(&self) -> DMat4 {
        self.entries.last().copied().unwrap_or(DMat4::IDENTITY)
    }

    /// Replace the top entry.
    pub fn set_top(&mut self, m: DMat4) {
        if let Some(top) = self.entries.last_mut() {
            *top = m;
        }
    }

    /// Right-multiply the top entry: `top = top * m`.
    pub fn multiply(&mut self, m: DMat4) {
        self.set_top(self.top() * m);
    }

    /// Number of entries.
    pub fn depth(&self) -> usize {
        self.entries.len()
    }
}

/// Boolean state stack with the same discipline as [`MatrixStack`].
#[derive(Debug, Clone)]
pub struct EnableStack {
    entries: Vec<bool>,
}

impl EnableStack {
    /// New stack seeded with `top`.
    pub fn new(top: bool) -> Self {
        Self { entries: vec![top] }
    }

    /// Duplicate the top entry.
    pub fn push(&mut self) {
        self.entries.push(self.top());
    }

    /// Drop the top entry; refuses to drop the base.
    pub fn pop(&mut self) -> bool {
        if self.entries.len() > 1 {
            self.entries.pop();
            true
        } else {
            warn!("enable stack pop with no matching push");
            false
        }
    }

    /// Current top entry.
    pub fn top(&self) -> bool {
        self.entries.last().copied().unwrap_or(true)
    }

    /// Replace the top entry.
    pub fn set_top(&mut self, v: bool) {
        if let Some(top) = self.entries.last_mut() {
            *top = v;
        }
    }

    /// Number of entries.
    pub fn depth(&self) -> usize {
        self.entries.len()
    }
}
