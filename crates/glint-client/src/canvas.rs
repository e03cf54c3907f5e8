// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! The per-canvas actor tying frames, scene, cameras and input together.

use std::collections::HashMap;
use std::mem;

use glint_camera::{CameraControls, CameraMode};
use glint_proto::command::decode_stream;
use glint_proto::event::{EV_CANVAS_CHANGE, EV_CANVAS_DRAW};
use glint_proto::{
    CanvasMessage, ClientMessage, EventContext, FrameReader, InputEvent, Modifiers,
    ReadPixelsReply, ResourceFamily, Touch,
};
use glint_scene::{
    mat4_to_row_major, ObjectStore, Registry, RenderPort, ReplayEnv, ReplayState, TextureUpload,
};
use tracing::{info, warn};

use crate::dispatch::{EventRouter, SurfaceEvent};
use crate::forward::EventForwarder;
use crate::redraw::RedrawScheduler;

/// Whole-canvas clear color painted behind all layers.
const CANVAS_CLEAR: [f32; 4] = [0.1, 0.1, 0.1, 1.0];

/// Side effect the host surface has to carry out for a server directive.
///
/// The canvas applies everything it can by itself first; these are the
/// leftovers only the embedder can do.
#[derive(Debug, Clone, PartialEq)]
pub enum HostAction {
    /// Retitle the window or tab.
    SetTitle(String),
    /// Resize the drawing surface. The canvas has already adopted the new
    /// size and queued the size report; the host only mirrors it outward.
    SetSize {
        /// New width in pixels.
        width: u32,
        /// New height in pixels.
        height: u32,
    },
    /// A resource definition failed in a way worth showing the user,
    /// such as a shader that does not compile.
    SurfaceError(String),
}

/// Callback a host application registers on a layer.
///
/// Returning `true` consumes the event: later handlers in the chain,
/// including the one that reports events to the server, are skipped.
pub type EventHandler = Box<dyn FnMut(&SurfaceEvent) -> bool>;

struct RankedHandler {
    order: f32,
    callback: EventHandler,
}

/// A handler chain entry, resolved before any callback runs so the chain
/// survives handlers that mutate the canvas.
enum ChainLink {
    Camera,
    Host(usize),
    Forwarder,
}

const CAMERA_ORDER: f32 = 0.0;
const FORWARDER_ORDER: f32 = 100.0;

/// One remote-rendered drawing surface.
///
/// The canvas owns everything scoped to a single connection on the client
/// side: the resource store, the layer registry, one animated camera per
/// layer, the redraw scheduler and the outgoing event queue. It is a plain
/// state machine; the embedder owns the clock, the socket and the render
/// backend, and drives it through [`apply_frame`](Self::apply_frame),
/// [`dispatch_event`](Self::dispatch_event) and
/// [`render_frame`](Self::render_frame), draining
/// [`take_outgoing`](Self::take_outgoing) onto the wire after each call.
pub struct Canvas<P: RenderPort> {
    port: P,
    store: ObjectStore,
    registry: Registry,
    cameras: HashMap<String, CameraControls>,
    named_matrices: HashMap<String, [f64; 16]>,
    width: u32,
    height: u32,
    scheduler: RedrawScheduler,
    router: EventRouter,
    forwarder: EventForwarder,
    handlers: HashMap<String, Vec<RankedHandler>>,
    outbox: Vec<ClientMessage>,
}

fn elu_claim(layer: &str) -> String {
    format!("{layer}:camera-elu")
}

fn rgba_claim(layer: &str) -> String {
    format!("{layer}:camera-rgba")
}

impl<P: RenderPort> Canvas<P> {
    /// A fresh canvas over `port` at the given surface size.
    pub fn new(port: P, width: u32, height: u32) -> Self {
        Self {
            port,
            store: ObjectStore::new(),
            registry: Registry::new(),
            cameras: HashMap::new(),
            named_matrices: HashMap::new(),
            width,
            height,
            scheduler: RedrawScheduler::new(),
            router: EventRouter::new(),
            forwarder: EventForwarder::default(),
            handlers: HashMap::new(),
            outbox: Vec::new(),
        }
    }

    /// The render backend.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Current surface size in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The shared resource store.
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// The layer registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// A layer's camera, if one has been touched yet.
    pub fn camera(&self, layer: &str) -> Option<&CameraControls> {
        self.cameras.get(layer)
    }

    /// Mutable access to a layer's camera, creating it on first use.
    pub fn camera_mut(&mut self, layer: &str, now_ms: u64) -> &mut CameraControls {
        self.registry.get_or_create_layer(layer);
        self.cameras
            .entry(layer.to_owned())
            .or_insert_with(|| CameraControls::new(now_ms))
    }

    /// A named matrix slot, if defined.
    pub fn named_matrix(&self, name: &str) -> Option<&[f64; 16]> {
        self.named_matrices.get(name)
    }

    /// Whether the next scheduler tick should render.
    pub fn needs_frame(&self) -> bool {
        self.scheduler.needs_frame()
    }

    /// Drain the queued outgoing messages for the socket writer.
    pub fn take_outgoing(&mut self) -> Vec<ClientMessage> {
        mem::take(&mut self.outbox)
    }

    /// Register a host event handler on a layer.
    ///
    /// Handlers run in ascending `order`; the built-in camera sits at 0 and
    /// the server forwarder at 100. Ties keep registration order.
    pub fn add_event_handler(
        &mut self,
        layer: &str,
        order: f32,
        handler: impl FnMut(&SurfaceEvent) -> bool + 'static,
    ) {
        self.registry.get_or_create_layer(layer);
        self.handlers
            .entry(layer.to_owned())
            .or_default()
            .push(RankedHandler {
                order,
                callback: Box::new(handler),
            });
    }

    /// Toggle a whole layer on or off locally.
    pub fn set_layer_visible(&mut self, layer: &str, visible: bool) {
        if let Some(layer) = self.registry.layer_mut(layer) {
            layer.visible = visible;
            self.scheduler.mark_dirty();
        }
    }

    /// Toggle one buffer on or off locally.
    pub fn set_buffer_visible(&mut self, layer: &str, buffer: &str, visible: bool) {
        if let Some(buffer) = self
            .registry
            .layer_mut(layer)
            .and_then(|l| l.buffer_mut(buffer))
        {
            buffer.visible = visible;
            self.scheduler.mark_dirty();
        }
    }

    /// Adopt a new surface size and queue the size report.
    ///
    /// Hosts call this on surface resize; the server's `CANVAS_SET_SIZE`
    /// directive lands here too. The report shares the outgoing rate
    /// limiter, so resize storms collapse to one message per window.
    pub fn resize(&mut self, width: u32, height: u32, now_ms: u64) {
        self.width = width;
        self.height = height;
        self.scheduler.mark_dirty();
        if self.forwarder.admit(EV_CANVAS_CHANGE, now_ms) {
            self.outbox.push(ClientMessage::CanvasChange { width, height });
        }
    }

    /// Apply one server frame, returning whatever the host must do.
    ///
    /// A frame with the wrong magic is dropped whole. A malformed opcode
    /// aborts the rest of the frame but keeps the prefix already applied.
    pub fn apply_frame(&mut self, frame: &[u8], now_ms: u64) -> Vec<HostAction> {
        let mut actions = Vec::new();
        let reader = match FrameReader::new(frame) {
            Ok(reader) => reader,
            Err(err) => {
                warn!("dropping frame: {err}");
                return actions;
            }
        };
        for message in reader {
            match message {
                Ok(message) => self.apply(message, now_ms, &mut actions),
                Err(err) => {
                    warn!("abandoning rest of frame: {err}");
                    break;
                }
            }
        }
        actions
    }

    fn apply(&mut self, message: CanvasMessage, now_ms: u64, actions: &mut Vec<HostAction>) {
        match message {
            CanvasMessage::BufferRedraw {
                layer,
                buffer,
                draw_order,
                commands,
            } => match decode_stream(&commands) {
                Ok(decoded) => {
                    self.registry.upsert_buffer(&layer, &buffer, draw_order, decoded);
                    self.scheduler.mark_dirty();
                }
                Err(err) => {
                    warn!(%layer, %buffer, "dropping undecodable buffer stream: {err}");
                }
            },
            CanvasMessage::BufferDestroy { layer, buffer } => {
                self.registry.destroy_buffer(&layer, &buffer);
                self.scheduler.mark_dirty();
            }
            CanvasMessage::CanvasReadPixels { id } => {
                // Readbacks see the present scene, not the last painted one.
                self.render_frame(now_ms);
                let pixels = self.port.read_pixels(self.width, self.height);
                self.outbox.push(ClientMessage::ReadPixels(ReadPixelsReply {
                    id,
                    width: self.width,
                    height: self.height,
                    bytes_per_pixel: 4,
                    pixels,
                }));
            }
            CanvasMessage::CanvasSetSize { width, height } => {
                self.resize(width, height, now_ms);
                actions.push(HostAction::SetSize { width, height });
            }
            CanvasMessage::CanvasSetTitle { title } => {
                actions.push(HostAction::SetTitle(title));
            }
            CanvasMessage::CanvasEcho { nonce } => {
                // Latency probes skip the rate limiter.
                self.outbox.push(ClientMessage::Echo { nonce });
            }
            CanvasMessage::Nop => {}
            CanvasMessage::DebugMessage { text } => {
                info!("server: {text}");
            }
            CanvasMessage::EnableCameraControls { layer, mask } => {
                self.camera_mut(&layer, now_ms).set_mask(mask);
            }
            CanvasMessage::SetDrawOrder { layer, order } => {
                self.registry.set_layer_draw_order(&layer, order);
                self.scheduler.mark_dirty();
            }
            CanvasMessage::SetBackgroundColor {
                layer,
                rgba,
                duration_ms,
            } => {
                self.camera_mut(&layer, now_ms)
                    .goto_background(rgba, duration_ms, now_ms);
                self.scheduler.begin_continuous(rgba_claim(&layer));
                self.scheduler.mark_dirty();
            }
            CanvasMessage::SetPosition {
                layer,
                viewport,
                duration_ms: _,
            } => {
                self.registry.get_or_create_layer(&layer).position = viewport;
                self.scheduler.mark_dirty();
            }
            CanvasMessage::SetElu {
                layer,
                eye,
                lookat,
                up,
                duration_ms,
            } => {
                let moved = self.camera_mut(&layer, now_ms).goto_elu(
                    eye.into(),
                    lookat.into(),
                    up.into(),
                    duration_ms,
                    now_ms,
                );
                if moved {
                    self.scheduler.begin_continuous(elu_claim(&layer));
                    self.scheduler.mark_dirty();
                }
            }
            CanvasMessage::SetCameraMode { layer, mode } => {
                if let Some(mode) = CameraMode::from_name(&mode) {
                    self.camera_mut(&layer, now_ms).set_mode(mode);
                    self.scheduler.mark_dirty();
                } else {
                    warn!(%layer, "unknown camera mode {mode:?}");
                }
            }
            CanvasMessage::DefineProgram {
                id,
                vertex_src,
                fragment_src,
            } => {
                if let Err(err) =
                    self.store
                        .define_program(&mut self.port, id, vertex_src, fragment_src)
                {
                    warn!(%id, "program definition failed: {err}");
                    actions.push(HostAction::SurfaceError(err.to_string()));
                }
            }
            CanvasMessage::UndefineProgram { id } => {
                self.store.undefine(&mut self.port, ResourceFamily::Program, id);
            }
            CanvasMessage::DefineVertexAttribute { id, data } => {
                self.store.define_attribute(&mut self.port, id, data);
            }
            CanvasMessage::UndefineVertexAttribute { id } => {
                self.store
                    .undefine(&mut self.port, ResourceFamily::VertexAttribute, id);
            }
            CanvasMessage::DefineIndexArray { id, indices } => {
                self.store.define_index_array(&mut self.port, id, indices);
            }
            CanvasMessage::UndefineIndexArray { id } => {
                self.store
                    .undefine(&mut self.port, ResourceFamily::IndexArray, id);
            }
            CanvasMessage::DefineTexture {
                id,
                width,
                height,
                stride,
                encoding,
                flags,
                compression,
                bytes,
            } => {
                let upload = TextureUpload {
                    width,
                    height,
                    stride,
                    encoding,
                    flags,
                    compression,
                    bytes,
                };
                if let Err(err) = self.store.define_texture(&mut self.port, id, upload) {
                    warn!(%id, "texture definition failed: {err}");
                }
            }
            CanvasMessage::UndefineTexture { id } => {
                self.store.undefine(&mut self.port, ResourceFamily::Texture, id);
            }
            CanvasMessage::DefineNamedMatrix { name, matrix } => {
                self.named_matrices.insert(name, matrix);
            }
            CanvasMessage::UndefineNamedMatrix { name } => {
                if self.named_matrices.remove(&name).is_none() {
                    warn!("undefine of unknown named matrix {name:?}");
                }
            }
        }
    }

    /// Route one raw input event through the layer's handler chain.
    ///
    /// The camera sees it first, then host handlers in rank order, then the
    /// forwarder that reports it to the server. Returns whether anything
    /// consumed or sent it.
    pub fn dispatch_event(
        &mut self,
        event: &SurfaceEvent,
        modifiers: Modifiers,
        now_ms: u64,
    ) -> bool {
        let Some(layer) = self
            .router
            .route(&self.registry, self.width, self.height, event)
        else {
            return false;
        };

        let mut chain: Vec<(f32, ChainLink)> = vec![
            (CAMERA_ORDER, ChainLink::Camera),
            (FORWARDER_ORDER, ChainLink::Forwarder),
        ];
        if let Some(ranked) = self.handlers.get(&layer) {
            for (i, handler) in ranked.iter().enumerate() {
                chain.push((handler.order, ChainLink::Host(i)));
            }
        }
        chain.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (_, link) in chain {
            match link {
                ChainLink::Camera => self.run_camera(&layer, event, modifiers, now_ms),
                ChainLink::Host(i) => {
                    let Some(handler) = self.handlers.get_mut(&layer).and_then(|h| h.get_mut(i))
                    else {
                        continue;
                    };
                    if (handler.callback)(event) {
                        return true;
                    }
                }
                ChainLink::Forwarder => {
                    return self.forward_event(&layer, event, modifiers, now_ms);
                }
            }
        }
        false
    }

    /// Feed the event to the layer's camera. The camera never consumes;
    /// hosts further down the chain still get to eavesdrop.
    #[allow(clippy::cast_precision_loss)] // canvas sizes are far below 2^24
    fn run_camera(&mut self, layer: &str, event: &SurfaceEvent, modifiers: Modifiers, now_ms: u64) {
        let viewport = self.layer_viewport(layer);
        let h = self.height as f32;
        let camera = self
            .cameras
            .entry(layer.to_owned())
            .or_insert_with(|| CameraControls::new(now_ms));
        let moved = match *event {
            SurfaceEvent::MouseDown { x, y, button } => {
                camera.on_mouse_down(viewport, x, h - y, button, now_ms)
            }
            SurfaceEvent::MouseMove { x, y } => {
                camera.on_mouse_move(viewport, x, h - y, modifiers, now_ms)
            }
            SurfaceEvent::MouseUp { .. } => camera.on_mouse_up(),
            SurfaceEvent::Wheel { x, y, amount } => {
                camera.on_wheel(viewport, x, h - y, amount, modifiers, now_ms)
            }
            SurfaceEvent::TouchStart(t) => {
                camera.on_touch_start(viewport, &flip_touch(t, h), now_ms)
            }
            SurfaceEvent::TouchMove(t) => camera.on_touch_move(viewport, &flip_touch(t, h), now_ms),
            SurfaceEvent::TouchEnd(t) => camera.on_touch_end(&flip_touch(t, h)),
            SurfaceEvent::MouseClick { .. }
            | SurfaceEvent::TouchTap(_)
            | SurfaceEvent::KeyDown { .. }
            | SurfaceEvent::KeyPress { .. }
            | SurfaceEvent::KeyUp { .. } => false,
        };
        if moved {
            self.scheduler.begin_continuous(elu_claim(layer));
            self.scheduler.mark_dirty();
        }
    }

    /// Report the event to the server with the layer's camera context.
    fn forward_event(
        &mut self,
        layer: &str,
        event: &SurfaceEvent,
        modifiers: Modifiers,
        now_ms: u64,
    ) -> bool {
        let kind = event.to_wire();
        if !self.forwarder.admit(kind.code(), now_ms) {
            return false;
        }
        let viewport = self.layer_viewport(layer);
        let setup = self
            .cameras
            .entry(layer.to_owned())
            .or_insert_with(|| CameraControls::new(now_ms))
            .setup(viewport, now_ms);
        self.outbox.push(ClientMessage::Event(InputEvent {
            ctx: EventContext {
                client_utime: now_ms * 1000,
                layer: layer.to_owned(),
                viewport,
                projection: mat4_to_row_major(setup.projection),
                view: mat4_to_row_major(setup.view),
                modifiers,
            },
            kind,
        }));
        true
    }

    #[allow(clippy::cast_precision_loss)] // canvas sizes are far below 2^24
    fn layer_viewport(&self, layer: &str) -> [f32; 4] {
        self.registry.layer(layer).map_or(
            [0.0, 0.0, self.width as f32, self.height as f32],
            |l| l.pixel_viewport(self.width, self.height),
        )
    }

    /// Paint one frame: clear the canvas, then each visible layer bottom to
    /// top, each layer's buffers in their own draw order under that layer's
    /// camera. Finishes by retiring animation claims that have settled and
    /// queueing the draw notification.
    #[allow(clippy::cast_precision_loss)] // canvas sizes are far below 2^24
    pub fn render_frame(&mut self, now_ms: u64) {
        self.port
            .set_viewport(0.0, 0.0, self.width as f32, self.height as f32);
        self.port.clear(CANVAS_CLEAR);

        let layers = self.registry.layers_in_draw_order();
        for layer in layers {
            let viewport = layer.pixel_viewport(self.width, self.height);
            let camera = self
                .cameras
                .entry(layer.name.clone())
                .or_insert_with(|| CameraControls::new(now_ms));
            let setup = camera.setup(viewport, now_ms);
            if setup.elu_settled {
                self.scheduler.end_continuous(&elu_claim(&layer.name));
            }
            if setup.background_settled {
                self.scheduler.end_continuous(&rgba_claim(&layer.name));
            }
            if !layer.visible {
                continue;
            }
            self.port
                .set_viewport(viewport[0], viewport[1], viewport[2], viewport[3]);
            self.port.clear(setup.background);
            self.port.set_depth_test(true);
            let mut replay = ReplayState::new(ReplayEnv {
                projection: setup.projection,
                view: setup.view,
                viewport,
                eye: setup.eye,
                lookat: setup.lookat,
                depth_test: true,
            });
            for buffer in layer.buffers_in_draw_order() {
                if buffer.visible {
                    replay.replay(&buffer.commands, &self.store, &mut self.port);
                }
            }
        }

        self.scheduler.frame_rendered();
        if self.forwarder.admit(EV_CANVAS_DRAW, now_ms) {
            self.outbox.push(ClientMessage::Draw);
        }
    }
}

fn flip_touch(touch: Touch, canvas_height: f32) -> Touch {
    Touch {
        y: canvas_height - touch.y,
        ..touch
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::cast_precision_loss)]
    #![allow(clippy::float_cmp)]

    use super::*;
    use approx::assert_relative_eq;
    use glint_proto::command::encode_stream;
    use glint_proto::{
        encode_frame, AttributeData, BufferCommand, CameraMask, DrawCall, Primitive,
        ProgramInvocation, ResourceId, UniformBinding,
    };
    use glint_scene::{RecordingPort, RenderOp};

    fn canvas() -> Canvas<RecordingPort> {
        Canvas::new(RecordingPort::new(), 800, 600)
    }

    fn triangle_stream() -> Vec<u8> {
        encode_stream(&[BufferCommand::Execute(ProgramInvocation {
            program: ResourceId(1),
            uniforms: vec![UniformBinding {
                name: "rgba".into(),
                rows: 4,
                cols: 1,
                values: vec![1.0, 0.0, 0.0, 1.0],
            }],
            attributes: vec![],
            textures: vec![],
            draws: vec![DrawCall {
                indices: None,
                primitive: Primitive::Triangles,
                first: 0,
                count: 3,
            }],
        })])
    }

    fn scene_frame() -> Vec<u8> {
        encode_frame(&[
            CanvasMessage::DefineProgram {
                id: ResourceId(1),
                vertex_src: "void main() {}".into(),
                fragment_src: "void main() {}".into(),
            },
            CanvasMessage::BufferRedraw {
                layer: "default".into(),
                buffer: "tri".into(),
                draw_order: 0.0,
                commands: triangle_stream(),
            },
        ])
    }

    // ── 1. frame application ──

    #[test]
    fn frame_with_wrong_magic_is_dropped_whole() {
        let mut c = canvas();
        let mut frame = encode_frame(&[CanvasMessage::CanvasSetTitle {
            title: "hi".into(),
        }]);
        frame[0] ^= 0xff;
        let actions = c.apply_frame(&frame, 0);
        assert!(actions.is_empty());
        assert!(c.take_outgoing().is_empty());
        assert!(!c.needs_frame());
    }

    #[test]
    fn a_scene_frame_defines_and_draws() {
        let mut c = canvas();
        let actions = c.apply_frame(&scene_frame(), 0);
        assert!(actions.is_empty());
        assert!(c.store().contains(ResourceId(1)));
        assert!(c.needs_frame());

        c.render_frame(0);
        let ops = &c.port().ops;
        // Canvas clear first, then the layer's viewport, clear and draw.
        assert_eq!(ops[1], RenderOp::SetViewport(0.0, 0.0, 800.0, 600.0));
        assert_eq!(ops[2], RenderOp::Clear(CANVAS_CLEAR));
        assert!(ops.contains(&RenderOp::UseProgram(ResourceId(1))));
        assert!(ops.contains(&RenderOp::DrawArrays(Primitive::Triangles, 0, 3)));
        assert!(!c.needs_frame());
    }

    #[test]
    fn a_garbage_opcode_keeps_the_prefix_and_drops_the_rest() {
        let mut c = canvas();
        let mut frame = encode_frame(&[CanvasMessage::CanvasSetTitle {
            title: "kept".into(),
        }]);
        // Never-assigned opcode, then a title that must not apply.
        frame.push(200);
        frame.extend_from_slice(&encode_frame(&[CanvasMessage::CanvasSetTitle {
            title: "lost".into(),
        }])[4..]);
        let actions = c.apply_frame(&frame, 0);
        assert_eq!(actions, vec![HostAction::SetTitle("kept".into())]);
    }

    #[test]
    fn malformed_buffer_stream_is_dropped_without_a_layer() {
        let mut c = canvas();
        let frame = encode_frame(&[CanvasMessage::BufferRedraw {
            layer: "bad".into(),
            buffer: "b".into(),
            draw_order: 0.0,
            commands: vec![0xff],
        }]);
        c.apply_frame(&frame, 0);
        assert!(c.registry().layer("bad").is_none());
        assert!(!c.needs_frame());
    }

    #[test]
    fn destroying_a_buffer_keeps_the_layer() {
        let mut c = canvas();
        c.apply_frame(&scene_frame(), 0);
        let frame = encode_frame(&[CanvasMessage::BufferDestroy {
            layer: "default".into(),
            buffer: "tri".into(),
        }]);
        c.apply_frame(&frame, 0);
        let layer = c.registry().layer("default").unwrap();
        assert_eq!(layer.buffer_count(), 0);
    }

    // ── 2. canvas directives ──

    #[test]
    fn set_size_resizes_and_reports() {
        let mut c = canvas();
        let frame = encode_frame(&[CanvasMessage::CanvasSetSize {
            width: 1024,
            height: 768,
        }]);
        let actions = c.apply_frame(&frame, 0);
        assert_eq!(
            actions,
            vec![HostAction::SetSize {
                width: 1024,
                height: 768
            }]
        );
        assert_eq!(c.size(), (1024, 768));
        assert_eq!(
            c.take_outgoing(),
            vec![ClientMessage::CanvasChange {
                width: 1024,
                height: 768
            }]
        );
        assert!(c.needs_frame());
    }

    #[test]
    fn echo_replies_skip_the_rate_limiter() {
        let mut c = canvas();
        let frame = encode_frame(&[
            CanvasMessage::CanvasEcho { nonce: 1.5 },
            CanvasMessage::CanvasEcho { nonce: 2.5 },
        ]);
        c.apply_frame(&frame, 0);
        assert_eq!(
            c.take_outgoing(),
            vec![
                ClientMessage::Echo { nonce: 1.5 },
                ClientMessage::Echo { nonce: 2.5 },
            ]
        );
    }

    #[test]
    fn read_pixels_draws_first_and_replies_in_full() {
        let mut c = canvas();
        c.apply_frame(&scene_frame(), 0);
        let frame = encode_frame(&[CanvasMessage::CanvasReadPixels { id: 7 }]);
        c.apply_frame(&frame, 0);

        assert!(c.port().ops.contains(&RenderOp::ReadPixels(800, 600)));
        let reply = c
            .take_outgoing()
            .into_iter()
            .find_map(|m| match m {
                ClientMessage::ReadPixels(r) => Some(r),
                _ => None,
            })
            .unwrap();
        assert_eq!(reply.id, 7);
        assert_eq!(reply.width, 800);
        assert_eq!(reply.height, 600);
        assert_eq!(reply.bytes_per_pixel, 4);
        assert_eq!(reply.pixels.len(), 800 * 600 * 4);
    }

    #[test]
    fn a_failed_program_link_surfaces_to_the_host() {
        let mut port = RecordingPort::new();
        port.fail_programs.insert(ResourceId(9));
        let mut c = Canvas::new(port, 800, 600);
        let frame = encode_frame(&[CanvasMessage::DefineProgram {
            id: ResourceId(9),
            vertex_src: "bad".into(),
            fragment_src: "bad".into(),
        }]);
        let actions = c.apply_frame(&frame, 0);
        assert!(matches!(actions[0], HostAction::SurfaceError(_)));
        assert!(!c.store().contains(ResourceId(9)));
    }

    #[test]
    fn named_matrices_define_and_undefine() {
        let mut c = canvas();
        let mut m = [0.0_f64; 16];
        m[0] = 2.0;
        let frame = encode_frame(&[CanvasMessage::DefineNamedMatrix {
            name: "world".into(),
            matrix: m,
        }]);
        c.apply_frame(&frame, 0);
        assert_eq!(c.named_matrix("world"), Some(&m));

        let frame = encode_frame(&[CanvasMessage::UndefineNamedMatrix {
            name: "world".into(),
        }]);
        c.apply_frame(&frame, 0);
        assert_eq!(c.named_matrix("world"), None);
    }

    // ── 3. layer directives and animation ──

    #[test]
    fn set_elu_animates_until_it_settles() {
        let mut c = canvas();
        let frame = encode_frame(&[CanvasMessage::SetElu {
            layer: "default".into(),
            eye: [0.0, 0.0, 50.0],
            lookat: [0.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0],
            duration_ms: 100.0,
        }]);
        c.apply_frame(&frame, 0);
        assert!(c.needs_frame());

        c.render_frame(50);
        assert!(c.needs_frame(), "still easing at the midpoint");
        c.render_frame(200);
        assert!(!c.needs_frame(), "settled claims are retired");

        let (eye, _, _) = c.camera("default").unwrap().target_elu();
        assert_eq!(eye.z, 50.0);
    }

    #[test]
    fn background_animation_reaches_the_target_color() {
        let mut c = canvas();
        let frame = encode_frame(&[CanvasMessage::SetBackgroundColor {
            layer: "default".into(),
            rgba: [1.0, 0.0, 0.0, 1.0],
            duration_ms: 100.0,
        }]);
        c.apply_frame(&frame, 0);
        assert!(c.needs_frame());

        c.render_frame(150);
        assert!(!c.needs_frame());
        let clears: Vec<_> = c
            .port()
            .ops
            .iter()
            .filter_map(|op| match op {
                RenderOp::Clear(rgba) => Some(*rgba),
                _ => None,
            })
            .collect();
        assert_eq!(clears.last(), Some(&[1.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn set_position_moves_the_layer_viewport() {
        let mut c = canvas();
        let frame = encode_frame(&[CanvasMessage::SetPosition {
            layer: "hud".into(),
            viewport: [0.5, 0.0, 0.5, 1.0],
            duration_ms: 0.0,
        }]);
        c.apply_frame(&frame, 0);
        let layer = c.registry().layer("hud").unwrap();
        assert_eq!(layer.position, [0.5, 0.0, 0.5, 1.0]);
        assert_eq!(layer.pixel_viewport(800, 600), [400.0, 0.0, 400.0, 600.0]);
    }

    #[test]
    fn unknown_camera_mode_leaves_the_camera_alone() {
        let mut c = canvas();
        let frame = encode_frame(&[CanvasMessage::SetCameraMode {
            layer: "default".into(),
            mode: "5D".into(),
        }]);
        c.apply_frame(&frame, 0);
        assert_eq!(c.camera("default").unwrap().mode(), CameraMode::Full);
    }

    #[test]
    fn camera_mask_applies_to_gestures() {
        let mut c = canvas();
        c.apply_frame(&scene_frame(), 0);
        let frame = encode_frame(&[CanvasMessage::EnableCameraControls {
            layer: "default".into(),
            mask: CameraMask(0),
        }]);
        c.apply_frame(&frame, 0);

        c.dispatch_event(
            &SurfaceEvent::Wheel {
                x: 400.0,
                y: 300.0,
                amount: 1.0,
            },
            Modifiers(0),
            0,
        );
        let (eye, _, _) = c.camera("default").unwrap().target_elu();
        assert_eq!(eye.z, 100.0, "masked-off zoom must not move the camera");
    }

    // ── 4. event dispatch ──

    #[test]
    fn events_forward_with_the_layer_camera_context() {
        let mut c = canvas();
        c.apply_frame(&scene_frame(), 0);
        let sent = c.dispatch_event(
            &SurfaceEvent::MouseDown {
                x: 400.0,
                y: 300.0,
                button: 0,
            },
            Modifiers(Modifiers::SHIFT),
            10,
        );
        assert!(sent);

        let out = c.take_outgoing();
        let ClientMessage::Event(ev) = &out[0] else {
            panic!("expected an event, got {out:?}");
        };
        assert_eq!(ev.ctx.layer, "default");
        assert_eq!(ev.ctx.viewport, [0.0, 0.0, 800.0, 600.0]);
        assert_eq!(ev.ctx.client_utime, 10_000);
        assert!(ev.ctx.modifiers.shift());
        // Row-major perspective: w-from-z lives at row 3, column 2.
        assert_relative_eq!(ev.ctx.projection[14], -1.0);
        assert_eq!(
            ev.kind,
            glint_proto::EventKind::MouseDown {
                x: 400.0,
                y: 300.0,
                button: 0
            }
        );
    }

    #[test]
    fn events_off_every_layer_go_nowhere() {
        let mut c = canvas();
        let sent = c.dispatch_event(
            &SurfaceEvent::MouseDown {
                x: 1.0,
                y: 1.0,
                button: 0,
            },
            Modifiers(0),
            0,
        );
        assert!(!sent);
        assert!(c.take_outgoing().is_empty());
    }

    #[test]
    fn a_consuming_host_handler_blocks_forwarding() {
        let mut c = canvas();
        c.apply_frame(&scene_frame(), 0);
        c.add_event_handler("default", 50.0, |_| true);
        let consumed = c.dispatch_event(
            &SurfaceEvent::MouseDown {
                x: 400.0,
                y: 300.0,
                button: 0,
            },
            Modifiers(0),
            0,
        );
        assert!(consumed);
        assert!(c.take_outgoing().is_empty());
    }

    #[test]
    fn a_passive_host_handler_still_sees_the_event() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut c = canvas();
        c.apply_frame(&scene_frame(), 0);
        let seen = Rc::new(Cell::new(0));
        let tap = Rc::clone(&seen);
        c.add_event_handler("default", 50.0, move |_| {
            tap.set(tap.get() + 1);
            false
        });
        c.dispatch_event(
            &SurfaceEvent::MouseDown {
                x: 400.0,
                y: 300.0,
                button: 0,
            },
            Modifiers(0),
            0,
        );
        assert_eq!(seen.get(), 1);
        assert_eq!(c.take_outgoing().len(), 1, "event still forwarded");
    }

    #[test]
    fn rapid_moves_collapse_under_the_rate_limit() {
        let mut c = canvas();
        c.apply_frame(&scene_frame(), 0);
        c.dispatch_event(
            &SurfaceEvent::MouseDown {
                x: 400.0,
                y: 300.0,
                button: 0,
            },
            Modifiers(0),
            0,
        );
        for t in [1, 2, 3] {
            c.dispatch_event(
                &SurfaceEvent::MouseMove {
                    x: 400.0 + t as f32,
                    y: 300.0,
                },
                Modifiers(0),
                t,
            );
        }
        // Down at 0, first move at 1; moves at 2 and 3 fall in its window.
        assert_eq!(c.take_outgoing().len(), 2);
    }

    #[test]
    fn keys_go_to_the_bottom_most_layer_by_default() {
        let mut c = canvas();
        c.apply_frame(&scene_frame(), 0);
        c.dispatch_event(&SurfaceEvent::KeyDown { key_code: 65 }, Modifiers(0), 0);
        let out = c.take_outgoing();
        let ClientMessage::Event(ev) = &out[0] else {
            panic!("expected an event");
        };
        assert_eq!(ev.ctx.layer, "default");
    }

    #[test]
    fn a_primary_drag_moves_the_camera_and_schedules_frames() {
        let mut c = canvas();
        c.apply_frame(&scene_frame(), 0);
        c.render_frame(0);
        assert!(!c.needs_frame());

        c.dispatch_event(
            &SurfaceEvent::MouseDown {
                x: 400.0,
                y: 300.0,
                button: 0,
            },
            Modifiers(0),
            10,
        );
        c.dispatch_event(
            &SurfaceEvent::MouseMove { x: 440.0, y: 300.0 },
            Modifiers(0),
            20,
        );
        let (eye, lookat, _) = c.camera("default").unwrap().target_elu();
        assert!(eye.x < 0.0, "dragging right pans the scene left");
        assert_eq!(eye.x, lookat.x);
        assert!(c.needs_frame(), "camera motion keeps frames coming");
    }

    #[test]
    fn layer_visibility_gates_hit_testing_and_painting() {
        let mut c = canvas();
        c.apply_frame(&scene_frame(), 0);
        c.set_layer_visible("default", false);

        c.render_frame(0);
        assert!(
            !c.port().ops.contains(&RenderOp::UseProgram(ResourceId(1))),
            "hidden layers are not painted"
        );

        let sent = c.dispatch_event(
            &SurfaceEvent::MouseDown {
                x: 400.0,
                y: 300.0,
                button: 0,
            },
            Modifiers(0),
            0,
        );
        assert!(!sent, "hidden layers are not hit");
    }

    // ── 5. draw notification ──

    #[test]
    fn each_render_queues_one_draw_report() {
        let mut c = canvas();
        c.apply_frame(&scene_frame(), 0);
        c.render_frame(0);
        assert_eq!(c.take_outgoing(), vec![ClientMessage::Draw]);

        // Back-to-back renders inside the cull window stay quiet.
        c.render_frame(2);
        assert!(c.take_outgoing().is_empty());
        c.render_frame(10);
        assert_eq!(c.take_outgoing(), vec![ClientMessage::Draw]);
    }

    #[test]
    fn attribute_definitions_reach_the_port() {
        let mut c = canvas();
        let frame = encode_frame(&[CanvasMessage::DefineVertexAttribute {
            id: ResourceId(3),
            data: AttributeData::F32 {
                ndim: 3,
                values: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            },
        }]);
        c.apply_frame(&frame, 0);
        assert!(c.store().contains(ResourceId(3)));
        assert!(matches!(
            c.port().ops[0],
            RenderOp::UploadAttribute(ResourceId(3), _)
        ));
    }
}
