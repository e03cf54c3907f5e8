// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Layer and buffer registry with draw ordering.

use std::collections::HashMap;

use glint_proto::BufferCommand;
use tracing::{debug, warn};

/// Whether a registry edit moved anything in the draw order.
///
/// Content-only buffer updates leave the layout alone; hosts use this to
/// decide whether an ordering notification is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutChange {
    /// A layer or buffer appeared, vanished, or changed order.
    Changed,
    /// Only buffer contents changed.
    Unchanged,
}

impl LayoutChange {
    /// Whether the edit changed the layout.
    pub fn changed(self) -> bool {
        matches!(self, Self::Changed)
    }
}

/// One named command buffer inside a layer.
#[derive(Debug, Clone)]
pub struct Buffer {
    /// Buffer name, unique within its layer.
    pub name: String,
    /// Draw order among sibling buffers, ascending.
    pub draw_order: f32,
    /// Local visibility toggle; nothing on the wire flips this.
    pub visible: bool,
    /// Decoded command stream.
    pub commands: Vec<BufferCommand>,
}

/// One named layer: a viewport region plus its buffers.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Layer name, unique within the canvas.
    pub name: String,
    /// Draw order among layers, ascending.
    pub draw_order: f32,
    /// Local visibility toggle; nothing on the wire flips this.
    pub visible: bool,
    /// Position as `[x, y, w, h]`. Magnitudes at most one are fractions
    /// of the canvas size; larger magnitudes are pixels. Negative x or y
    /// measures from the opposite edge.
    pub position: [f32; 4],
    buffers: HashMap<String, Buffer>,
}

impl Layer {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            draw_order: 0.0,
            visible: true,
            position: [0.0, 0.0, 1.0, 1.0],
            buffers: HashMap::new(),
        }
    }

    /// Buffer by name.
    pub fn buffer(&self, name: &str) -> Option<&Buffer> {
        self.buffers.get(name)
    }

    /// Mutable buffer by name.
    pub fn buffer_mut(&mut self, name: &str) -> Option<&mut Buffer> {
        self.buffers.get_mut(name)
    }

    /// Number of buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Buffers sorted ascending by draw order, name-tie-broken.
    pub fn buffers_in_draw_order(&self) -> Vec<&Buffer> {
        let mut buffers: Vec<&Buffer> = self.buffers.values().collect();
        buffers.sort_by(|a, b| {
            a.draw_order
                .total_cmp(&b.draw_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        buffers
    }

    /// Resolve [`position`](Self::position) to a pixel viewport
    /// `[x, y, w, h]` with a bottom-left origin.
    #[allow(clippy::cast_precision_loss)] // canvas sizes are far below 2^24
    pub fn pixel_viewport(&self, canvas_width: u32, canvas_height: u32) -> [f32; 4] {
        let cw = canvas_width as f32;
        let ch = canvas_height as f32;
        let resolve = |v: f32, span: f32| if v.abs() <= 1.0 { v * span } else { v };
        let w = resolve(self.position[2], cw).max(0.0);
        let h = resolve(self.position[3], ch).max(0.0);
        let x = resolve(self.position[0], cw);
        let y = resolve(self.position[1], ch);
        let x = if x < 0.0 { cw + x } else { x };
        let y = if y < 0.0 { ch + y } else { y };
        [x, y, w, h]
    }
}

/// All layers of one canvas.
///
/// Lookup by name creates on miss, mirroring how buffer and directive
/// traffic may name a layer before anything else mentions it.
#[derive(Debug, Default)]
pub struct Registry {
    layers: HashMap<String, Layer>,
}

impl Registry {
    /// New empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether no layer exists yet.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layer by name.
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    /// Mutable layer by name.
    pub fn layer_mut(&mut self, name: &str) -> Option<&mut Layer> {
        self.layers.get_mut(name)
    }

    /// Layer by name, created with defaults on first mention.
    pub fn get_or_create_layer(&mut self, name: &str) -> &mut Layer {
        self.layers.entry(name.to_owned()).or_insert_with(|| {
            debug!(layer = name, "layer created");
            Layer::new(name)
        })
    }

    /// Create or replace a buffer's command stream.
    ///
    /// A replacement adopts the received draw order. Returns
    /// [`LayoutChange::Changed`] when a layer or buffer appears or an
    /// order moves; a content-only update is
    /// [`LayoutChange::Unchanged`].
    #[allow(clippy::float_cmp)] // orders arrive verbatim off the wire; any bit change re-sorts
    pub fn upsert_buffer(
        &mut self,
        layer: &str,
        buffer: &str,
        draw_order: f32,
        commands: Vec<BufferCommand>,
    ) -> LayoutChange {
        let new_layer = !self.layers.contains_key(layer);
        let layer = self.get_or_create_layer(layer);
        match layer.buffers.get_mut(buffer) {
            Some(existing) => {
                let moved = existing.draw_order != draw_order;
                existing.draw_order = draw_order;
                existing.commands = commands;
                if new_layer || moved {
                    LayoutChange::Changed
                } else {
                    LayoutChange::Unchanged
                }
            }
            None => {
                layer.buffers.insert(
                    buffer.to_owned(),
                    Buffer {
                        name: buffer.to_owned(),
                        draw_order,
                        visible: true,
                        commands,
                    },
                );
                LayoutChange::Changed
            }
        }
    }

    /// Remove a buffer. The layer stays even when its last buffer goes.
    pub fn destroy_buffer(&mut self, layer: &str, buffer: &str) -> LayoutChange {
        if let Some(l) = self.layers.get_mut(layer) {
            if l.buffers.remove(buffer).is_some() {
                return LayoutChange::Changed;
            }
        }
        warn!(layer, buffer, "destroy of unknown buffer");
        LayoutChange::Unchanged
    }

    /// Set a layer's draw order, creating the layer on first mention.
    #[allow(clippy::float_cmp)] // orders arrive verbatim off the wire; any bit change re-sorts
    pub fn set_layer_draw_order(&mut self, layer: &str, order: f32) -> LayoutChange {
        let layer = self.get_or_create_layer(layer);
        if layer.draw_order == order {
            LayoutChange::Unchanged
        } else {
            layer.draw_order = order;
            LayoutChange::Changed
        }
    }

    /// Layers sorted ascending by draw order, name-tie-broken.
    ///
    /// The first entry is the bottom-most layer, which also serves as the
    /// default keyboard focus target.
    pub fn layers_in_draw_order(&self) -> Vec<&Layer> {
        let mut layers: Vec<&Layer> = self.layers.values().collect();
        layers.sort_by(|a, b| {
            a.draw_order
                .total_cmp(&b.draw_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        layers
    }
}
