// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Per-client connection state.
//!
//! A [`CanvasSession`] speaks for one connected canvas. Authoring calls
//! enqueue directives without blocking; a pump task owned by the session
//! turns them into wire frames on an outbound channel, one opcode per
//! frame. The pump tracks which resources the client has been told about so
//! every snapshot's resources are defined before its redraw and undefined
//! once no snapshot on this connection references them. Inbound client
//! frames decode here and dispatch to registered handlers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use glint_proto::{
    command::encode_stream, encode_frame, CameraMask, CanvasMessage, ClientMessage, InputEvent,
    ResourceId,
};
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::world::{Snapshot, World};

/// Directives drained per pump wakeup.
const DRAIN_LIMIT: usize = 64;

/// One queued unit of outbound work.
#[derive(Debug, Clone)]
pub(crate) enum Directive {
    /// Send a single pre-built opcode frame.
    Canvas(CanvasMessage),
    /// Send a buffer's published snapshot to one layer.
    Redraw {
        /// Destination layer.
        layer: String,
        /// Buffer whose snapshot to send.
        buffer: String,
        /// World the snapshot is read from at send time.
        world: World,
    },
    /// Tear a buffer down on one layer.
    Destroy {
        /// Destination layer.
        layer: String,
        /// Buffer being destroyed.
        buffer: String,
    },
}

/// Canvas-event handler; returns `true` to consume the message.
pub type CanvasHandler = Box<dyn FnMut(&ClientMessage) -> bool + Send>;

/// Layer input handler; returns `true` to consume the event.
pub type InputHandler = Box<dyn FnMut(&InputEvent) -> bool + Send>;

struct RankedCanvasHandler {
    order: i32,
    callback: CanvasHandler,
}

struct RankedInputHandler {
    order: i32,
    callback: InputHandler,
}

#[derive(Default)]
struct HandlerTable {
    canvas: Vec<RankedCanvasHandler>,
    layers: HashMap<String, Vec<RankedInputHandler>>,
}

/// Authoring handle for one connected client canvas.
///
/// Clones share the directive queue and handler table. Dropping every clone
/// stops the pump once the queue drains.
#[derive(Clone)]
pub struct CanvasSession {
    directives: mpsc::UnboundedSender<Directive>,
    handlers: Arc<Mutex<HandlerTable>>,
}

impl CanvasSession {
    /// Create a session and its outbound frame stream.
    ///
    /// Frames appear on the receiver ready to transmit. An idle session
    /// produces a NOP heartbeat every `keepalive`.
    pub fn new(keepalive: Duration) -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (directive_tx, directive_rx) = mpsc::unbounded_channel();
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let pump = Pump {
            directives: directive_rx,
            frames: frame_tx,
            keepalive,
            refcounts: HashMap::new(),
            last: HashMap::new(),
        };
        tokio::spawn(pump.run());
        let session = Self {
            directives: directive_tx,
            handlers: Arc::new(Mutex::new(HandlerTable::default())),
        };
        (session, frame_rx)
    }

    /// Resize the remote canvas.
    pub fn set_size(&self, width: u32, height: u32) {
        self.post(CanvasMessage::CanvasSetSize { width, height });
    }

    /// Retitle the remote canvas.
    pub fn set_title(&self, title: &str) {
        self.post(CanvasMessage::CanvasSetTitle {
            title: title.to_owned(),
        });
    }

    /// Round-trip a nonce for latency probing; the reply arrives as
    /// [`ClientMessage::Echo`].
    pub fn echo(&self, nonce: f64) {
        self.post(CanvasMessage::CanvasEcho { nonce });
    }

    /// Ask for a full-canvas RGBA readback; the reply arrives as
    /// [`ClientMessage::ReadPixels`] carrying `id`.
    pub fn read_pixels(&self, id: u64) {
        self.post(CanvasMessage::CanvasReadPixels { id });
    }

    /// Log a line on the client.
    pub fn debug_message(&self, text: &str) {
        self.post(CanvasMessage::DebugMessage {
            text: text.to_owned(),
        });
    }

    /// Handle for directing one named layer of this canvas.
    pub fn layer(&self, name: &str) -> LayerHandle {
        LayerHandle {
            name: name.to_owned(),
            session: self.clone(),
        }
    }

    /// Register a canvas-event handler. Lower `dispatch_order` runs first;
    /// returning `true` stops the chain.
    pub async fn add_event_handler(
        &self,
        dispatch_order: i32,
        handler: impl FnMut(&ClientMessage) -> bool + Send + 'static,
    ) {
        let mut table = self.handlers.lock().await;
        let slot = table.canvas.partition_point(|h| h.order <= dispatch_order);
        table.canvas.insert(
            slot,
            RankedCanvasHandler {
                order: dispatch_order,
                callback: Box::new(handler),
            },
        );
    }

    /// Decode and dispatch one inbound client frame.
    ///
    /// Malformed frames are logged and dropped; the connection survives.
    pub async fn handle_frame(&self, bytes: &[u8]) {
        let message = match ClientMessage::decode(bytes) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, len = bytes.len(), "dropping client frame");
                return;
            }
        };
        let mut table = self.handlers.lock().await;
        match &message {
            ClientMessage::Event(event) => {
                let Some(chain) = table.layers.get_mut(&event.ctx.layer) else {
                    debug!(layer = %event.ctx.layer, kind = ?event.kind.code(), "event for a layer with no handlers");
                    return;
                };
                for handler in chain.iter_mut() {
                    if (handler.callback)(event) {
                        break;
                    }
                }
            }
            other => {
                for handler in table.canvas.iter_mut() {
                    if (handler.callback)(other) {
                        break;
                    }
                }
            }
        }
    }

    fn post(&self, message: CanvasMessage) {
        if self.directives.send(Directive::Canvas(message)).is_err() {
            debug!("directive posted after the connection pump stopped");
        }
    }
}

/// Directs one named layer of a session's canvas.
#[derive(Clone)]
pub struct LayerHandle {
    name: String,
    session: CanvasSession,
}

impl LayerHandle {
    /// Layer name as it travels on the wire.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Show `world` on this layer. Buffers the world already holds are
    /// replayed to the client right away.
    pub async fn set_world(&self, world: &World) {
        world.attach(&self.name, &self.session.directives).await;
    }

    /// Animate the camera to an eye/lookat/up pose over `duration_ms`.
    pub fn set_elu(&self, eye: [f64; 3], lookat: [f64; 3], up: [f64; 3], duration_ms: f32) {
        self.session.post(CanvasMessage::SetElu {
            layer: self.name.clone(),
            eye,
            lookat,
            up,
            duration_ms,
        });
    }

    /// Animate the background color over `duration_ms`.
    pub fn set_background(&self, rgba: [f32; 4], duration_ms: f32) {
        self.session.post(CanvasMessage::SetBackgroundColor {
            layer: self.name.clone(),
            rgba,
            duration_ms,
        });
    }

    /// Switch the camera interface mode (`"2D"`, `"2.5D"`, `"2F"`, `"3D"`).
    pub fn set_camera_mode(&self, mode: &str) {
        self.session.post(CanvasMessage::SetCameraMode {
            layer: self.name.clone(),
            mode: mode.to_owned(),
        });
    }

    /// Set the layer's paint-order key among its siblings.
    pub fn set_draw_order(&self, order: f32) {
        self.session.post(CanvasMessage::SetDrawOrder {
            layer: self.name.clone(),
            order,
        });
    }

    /// Choose which camera gestures the client may run on this layer.
    pub fn enable_camera_controls(&self, mask: CameraMask) {
        self.session.post(CanvasMessage::EnableCameraControls {
            layer: self.name.clone(),
            mask,
        });
    }

    /// Place the layer in the canvas as `[x, y, w, h]` canvas fractions.
    pub fn set_position(&self, viewport: [f32; 4], duration_ms: f32) {
        self.session.post(CanvasMessage::SetPosition {
            layer: self.name.clone(),
            viewport,
            duration_ms,
        });
    }

    /// Register an input handler for this layer. Lower `dispatch_order`
    /// runs first; returning `true` stops the chain.
    pub async fn add_event_handler(
        &self,
        dispatch_order: i32,
        handler: impl FnMut(&InputEvent) -> bool + Send + 'static,
    ) {
        let mut table = self.session.handlers.lock().await;
        let chain = table.layers.entry(self.name.clone()).or_default();
        let slot = chain.partition_point(|h| h.order <= dispatch_order);
        chain.insert(
            slot,
            RankedInputHandler {
                order: dispatch_order,
                callback: Box::new(handler),
            },
        );
    }
}

/// Connection slot for one buffer on one layer.
fn slot_key(layer: &str, buffer: &str) -> String {
    format!("{layer}${buffer}")
}

/// Collapse queued redraws of the same slot into the first occurrence.
/// A destroy reopens the slot so a redraw of a recreated buffer survives.
fn dedup_redraws(batch: &mut Vec<Directive>) {
    let mut seen: HashSet<String> = HashSet::new();
    batch.retain(|directive| match directive {
        Directive::Redraw { layer, buffer, .. } => seen.insert(slot_key(layer, buffer)),
        Directive::Destroy { layer, buffer } => {
            seen.remove(&slot_key(layer, buffer));
            true
        }
        Directive::Canvas(_) => true,
    });
}

/// Drains directives into wire frames and owns the per-connection
/// resource bookkeeping.
struct Pump {
    directives: mpsc::UnboundedReceiver<Directive>,
    frames: mpsc::UnboundedSender<Vec<u8>>,
    keepalive: Duration,
    /// Live snapshots on this connection referencing each resource.
    refcounts: HashMap<ResourceId, u32>,
    /// Snapshot most recently sent per slot.
    last: HashMap<String, Arc<Snapshot>>,
}

impl Pump {
    async fn run(mut self) {
        loop {
            let mut batch = Vec::new();
            tokio::select! {
                received = self.directives.recv_many(&mut batch, DRAIN_LIMIT) => {
                    if received == 0 {
                        // Every session handle dropped and the queue drained.
                        return;
                    }
                    dedup_redraws(&mut batch);
                    for directive in batch {
                        if !self.apply(directive).await {
                            return;
                        }
                    }
                }
                () = sleep(self.keepalive) => {
                    if !self.send(encode_frame(&[CanvasMessage::Nop])) {
                        return;
                    }
                }
            }
        }
    }

    async fn apply(&mut self, directive: Directive) -> bool {
        match directive {
            Directive::Canvas(message) => self.send(encode_frame(&[message])),
            Directive::Redraw {
                layer,
                buffer,
                world,
            } => {
                let published = world.published(&buffer).await;
                self.redraw(&layer, &buffer, published)
            }
            Directive::Destroy { layer, buffer } => {
                let frame = encode_frame(&[CanvasMessage::BufferDestroy {
                    layer: layer.clone(),
                    buffer: buffer.clone(),
                }]);
                if !self.send(frame) {
                    return false;
                }
                self.release(&slot_key(&layer, &buffer))
            }
        }
    }

    /// Emit one published snapshot: defines for first-referenced resources,
    /// the redraw itself, then undefines for whatever only the previous
    /// snapshot was holding.
    fn redraw(
        &mut self,
        layer: &str,
        buffer: &str,
        published: Option<(Arc<Snapshot>, f32)>,
    ) -> bool {
        let key = slot_key(layer, buffer);
        let Some((snapshot, draw_order)) = published else {
            // Deleted before we got here; let go of what the slot held.
            return self.release(&key);
        };
        for resource in snapshot.resources.values() {
            let count = self.refcounts.entry(resource.id()).or_insert(0);
            *count += 1;
            if *count == 1 && !self.send(encode_frame(&[resource.define_message()])) {
                return false;
            }
        }
        let mut commands = encode_stream(&snapshot.commands);
        // The stream terminator travels inside byte_len.
        commands.push(0);
        let frame = encode_frame(&[CanvasMessage::BufferRedraw {
            layer: layer.to_owned(),
            buffer: buffer.to_owned(),
            draw_order,
            commands,
        }]);
        if !self.send(frame) {
            return false;
        }
        let previous = self.last.insert(key, snapshot);
        self.drop_snapshot(previous)
    }

    /// Forget a slot's snapshot and undefine what nothing else references.
    fn release(&mut self, key: &str) -> bool {
        let previous = self.last.remove(key);
        self.drop_snapshot(previous)
    }

    fn drop_snapshot(&mut self, snapshot: Option<Arc<Snapshot>>) -> bool {
        let Some(snapshot) = snapshot else {
            return true;
        };
        for resource in snapshot.resources.values() {
            match self.refcounts.get_mut(&resource.id()) {
                Some(count) if *count > 1 => *count -= 1,
                Some(_) => {
                    self.refcounts.remove(&resource.id());
                    if !self.send(encode_frame(&[resource.undefine_message()])) {
                        return false;
                    }
                }
                None => {
                    warn!(id = %resource.id(), "releasing a resource this connection never defined");
                }
            }
        }
        true
    }

    fn send(&self, frame: Vec<u8>) -> bool {
        self.frames.send(frame).is_ok()
    }
}
