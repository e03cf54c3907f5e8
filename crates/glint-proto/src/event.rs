// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Client-to-server traffic: input events and canvas replies.
//!
//! Every frame opens with [`CLIENT_MAGIC`] and a u32 event code. Input
//! events carry a common prefix capturing the camera context at the moment
//! of the event (timestamp, layer, viewport, projection and view matrices,
//! modifier keys) so the server can unproject without asking the client
//! anything. Draw notifications, echo replies, size reports and pixel
//! readbacks carry no prefix.

use crate::cursor::{WireError, WireReader, WireWriter};

/// Magic opening every client-to-server frame.
pub const CLIENT_MAGIC: u32 = 0x1186_712a;

/// Event code: a frame finished drawing.
pub const EV_CANVAS_DRAW: u32 = 1000;
/// Event code: mouse button pressed.
pub const EV_MOUSE_DOWN: u32 = 1001;
/// Event code: mouse moved.
pub const EV_MOUSE_MOVED: u32 = 1002;
/// Event code: mouse button released.
pub const EV_MOUSE_UP: u32 = 1003;
/// Event code: mouse click (press and release in place).
pub const EV_MOUSE_CLICKED: u32 = 1004;
/// Event code: mouse wheel.
pub const EV_MOUSE_WHEEL: u32 = 1005;
/// Event code: key pressed down.
pub const EV_KEY_DOWN: u32 = 1010;
/// Event code: key repeat/press.
pub const EV_KEY_PRESSED: u32 = 1011;
/// Event code: key released.
pub const EV_KEY_UP: u32 = 1012;
/// Event code: touch began.
pub const EV_TOUCH_START: u32 = 1020;
/// Event code: touch moved.
pub const EV_TOUCH_MOVE: u32 = 1021;
/// Event code: touch ended.
pub const EV_TOUCH_END: u32 = 1022;
/// Event code: short touch tap.
pub const EV_TOUCH_TAP: u32 = 1023;
/// Event code: echo reply.
pub const EV_CANVAS_ECHO: u32 = 1030;
/// Event code: canvas size change report.
pub const EV_CANVAS_CHANGE: u32 = 1040;
/// Event code: pixel readback reply.
pub const EV_READ_PIXELS: u32 = 2000;

/// Modifier-key bitset carried with every input event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct Modifiers(pub u32);

impl Modifiers {
    /// Alt key bit.
    pub const ALT: u32 = 1;
    /// Ctrl key bit.
    pub const CTRL: u32 = 2;
    /// Shift key bit.
    pub const SHIFT: u32 = 4;

    /// Whether alt was held.
    pub fn alt(self) -> bool {
        self.0 & Self::ALT != 0
    }

    /// Whether ctrl was held.
    pub fn ctrl(self) -> bool {
        self.0 & Self::CTRL != 0
    }

    /// Whether shift was held.
    pub fn shift(self) -> bool {
        self.0 & Self::SHIFT != 0
    }
}

/// Camera context sampled when an input event fired.
#[derive(Debug, Clone, PartialEq)]
pub struct EventContext {
    /// Client wall time in microseconds.
    pub client_utime: u64,
    /// Layer the event was routed to.
    pub layer: String,
    /// Layer viewport at event time, `[x, y, w, h]` in pixels.
    pub viewport: [f32; 4],
    /// Projection matrix at event time, row-major.
    pub projection: [f64; 16],
    /// View matrix at event time, row-major.
    pub view: [f64; 16],
    /// Modifier keys held.
    pub modifiers: Modifiers,
}

/// Event-specific payload of an input event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind {
    /// Mouse button pressed.
    MouseDown {
        /// Canvas x in pixels.
        x: f32,
        /// Canvas y in pixels.
        y: f32,
        /// Button index.
        button: u8,
    },
    /// Mouse moved.
    MouseMoved {
        /// Canvas x in pixels.
        x: f32,
        /// Canvas y in pixels.
        y: f32,
    },
    /// Mouse button released.
    MouseUp {
        /// Canvas x in pixels.
        x: f32,
        /// Canvas y in pixels.
        y: f32,
        /// Button index.
        button: u8,
    },
    /// Press and release in place.
    MouseClicked {
        /// Canvas x in pixels.
        x: f32,
        /// Canvas y in pixels.
        y: f32,
        /// Button index.
        button: u8,
    },
    /// Wheel turned.
    MouseWheel {
        /// Wheel delta; positive is away from the user.
        amount: f32,
    },
    /// Key pressed down.
    KeyDown {
        /// Host key code.
        key_code: u32,
    },
    /// Key repeat/press.
    KeyPressed {
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

/// One touch point report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Touch {
    /// Canvas x in pixels.
    pub x: f32,
    /// Canvas y in pixels.
    pub y: f32,
    /// Touches currently on the surface.
    pub ntouches: u32,
    /// Stable identifier of this touch point.
    pub touch_id: u32,
}

impl EventKind {
    /// Wire code for this event.
    pub fn code(self) -> u32 {
        match self {
            Self::MouseDown { .. } => EV_MOUSE_DOWN,
            Self::MouseMoved { .. } => EV_MOUSE_MOVED,
            Self::MouseUp { .. } => EV_MOUSE_UP,
            Self::MouseClicked { .. } => EV_MOUSE_CLICKED,
            Self::MouseWheel { .. } => EV_MOUSE_WHEEL,
            Self::KeyDown { .. } => EV_KEY_DOWN,
            Self::KeyPressed { .. } => EV_KEY_PRESSED,
            Self::KeyUp { .. } => EV_KEY_UP,
            Self::TouchStart(_) => EV_TOUCH_START,
            Self::TouchMove(_) => EV_TOUCH_MOVE,
            Self::TouchEnd(_) => EV_TOUCH_END,
            Self::TouchTap(_) => EV_TOUCH_TAP,
        }
    }

    fn encode_payload(self, w: &mut WireWriter) {
        match self {
            Self::MouseDown { x, y, button }
            | Self::MouseUp { x, y, button }
            | Self::MouseClicked { x, y, button } => {
                w.write_f32(x);
                w.write_f32(y);
                w.write_u8(button);
            }
            Self::MouseMoved { x, y } => {
                w.write_f32(x);
                w.write_f32(y);
            }
            Self::MouseWheel { amount } => w.write_f32(amount),
            Self::KeyDown { key_code } | Self::KeyPressed { key_code } | Self::KeyUp { key_code } => {
                w.write_u32(key_code);
            }
            Self::TouchStart(t) | Self::TouchMove(t) | Self::TouchEnd(t) | Self::TouchTap(t) => {
                w.write_f32(t.x);
                w.write_f32(t.y);
                w.write_u32(t.ntouches);
                w.write_u32(t.touch_id);
            }
        }
    }

    fn decode_payload(code: u32, r: &mut WireReader<'_>) -> Result<Self, WireError> {
        match code {
            EV_MOUSE_DOWN => Ok(Self::MouseDown {
                x: r.read_f32()?,
                y: r.read_f32()?,
                button: r.read_u8()?,
            }),
            EV_MOUSE_MOVED => Ok(Self::MouseMoved {
                x: r.read_f32()?,
                y: r.read_f32()?,
            }),
            EV_MOUSE_UP => Ok(Self::MouseUp {
                x: r.read_f32()?,
                y: r.read_f32()?,
                button: r.read_u8()?,
            }),
            EV_MOUSE_CLICKED => Ok(Self::MouseClicked {
                x: r.read_f32()?,
                y: r.read_f32()?,
                button: r.read_u8()?,
            }),
            EV_MOUSE_WHEEL => Ok(Self::MouseWheel {
                amount: r.read_f32()?,
            }),
            EV_KEY_DOWN => Ok(Self::KeyDown {
                key_code: r.read_u32()?,
            }),
            EV_KEY_PRESSED => Ok(Self::KeyPressed {
                key_code: r.read_u32()?,
            }),
            EV_KEY_UP => Ok(Self::KeyUp {
                key_code: r.read_u32()?,
            }),
            EV_TOUCH_START => Ok(Self::TouchStart(decode_touch(r)?)),
            EV_TOUCH_MOVE => Ok(Self::TouchMove(decode_touch(r)?)),
            EV_TOUCH_END => Ok(Self::TouchEnd(decode_touch(r)?)),
            EV_TOUCH_TAP => Ok(Self::TouchTap(decode_touch(r)?)),
            other => Err(WireError::UnknownEvent(other)),
        }
    }
}

fn decode_touch(r: &mut WireReader<'_>) -> Result<Touch, WireError> {
    Ok(Touch {
        x: r.read_f32()?,
        y: r.read_f32()?,
        ntouches: r.read_u32()?,
        touch_id: r.read_u32()?,
    })
}

/// An input event together with its camera context.
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    /// Camera context at event time.
    pub ctx: EventContext,
    /// The event itself.
    pub kind: EventKind,
}

/// Pixel readback reply for a server read-pixels request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPixelsReply {
    /// Request id being answered.
    pub id: u64,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Bytes per pixel (4 for RGBA8).
    pub bytes_per_pixel: u32,
    /// Raw pixel bytes, row-major.
    pub pixels: Vec<u8>,
}

/// One client-to-server frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// A frame finished drawing.
    Draw,
    /// Input event with context.
    Event(InputEvent),
    /// Echo reply mirroring a server nonce.
    Echo {
        /// Nonce from the server's echo request.
        nonce: f64,
    },
    /// The canvas changed size.
    CanvasChange {
        /// New width in pixels.
        width: u32,
        /// New height in pixels.
        height: u32,
    },
    /// Pixel readback reply.
    ReadPixels(ReadPixelsReply),
}

impl ClientMessage {
    /// Encode a full frame, magic included.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::with_capacity(64);
        w.write_u32(CLIENT_MAGIC);
        match self {
            Self::Draw => w.write_u32(EV_CANVAS_DRAW),
            Self::Event(ev) => {
                w.write_u32(ev.kind.code());
                w.write_u64(ev.ctx.client_utime);
                w.write_string(&ev.ctx.layer);
                for v in ev.ctx.viewport {
                    w.write_f32(v);
                }
                for v in ev.ctx.projection {
                    w.write_f64(v);
                }
                for v in ev.ctx.view {
                    w.write_f64(v);
                }
                w.write_u32(ev.ctx.modifiers.0);
                ev.kind.encode_payload(&mut w);
            }
            Self::Echo { nonce } => {
                w.write_u32(EV_CANVAS_ECHO);
                w.write_f64(*nonce);
            }
            Self::CanvasChange { width, height } => {
                w.write_u32(EV_CANVAS_CHANGE);
                w.write_u32(*width);
                w.write_u32(*height);
            }
            Self::ReadPixels(reply) => {
                w.write_u32(EV_READ_PIXELS);
                w.write_u64(reply.id);
                w.write_u32(reply.width);
                w.write_u32(reply.height);
                w.write_u32(reply.bytes_per_pixel);
                w.write_bytes(&reply.pixels);
            }
        }
        w.into_bytes()
    }

    /// Decode one frame. Trailing padding after the payload is tolerated.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let mut r = WireReader::new(bytes);
        let magic = r.read_u32()?;
        if magic != CLIENT_MAGIC {
            return Err(WireError::BadMagic {
                got: magic,
                expected: CLIENT_MAGIC,
            });
        }
        let code = r.read_u32()?;
        match code {
            EV_CANVAS_DRAW => Ok(Self::Draw),
            EV_CANVAS_ECHO => Ok(Self::Echo {
                nonce: r.read_f64()?,
            }),
            EV_CANVAS_CHANGE => Ok(Self::CanvasChange {
                width: r.read_u32()?,
                height: r.read_u32()?,
            }),
            EV_READ_PIXELS => {
                let id = r.read_u64()?;
                let width = r.read_u32()?;
                let height = r.read_u32()?;
                let bytes_per_pixel = r.read_u32()?;
                let len = (width as usize)
                    .checked_mul(height as usize)
                    .and_then(|n| n.checked_mul(bytes_per_pixel as usize))
                    .ok_or(WireError::BadValue {
                        field: "readpixels size",
                        value: width,
                    })?;
                let pixels = r.read_bytes(len)?.to_vec();
                Ok(Self::ReadPixels(ReadPixelsReply {
                    id,
                    width,
                    height,
                    bytes_per_pixel,
                    pixels,
                }))
            }
            code => {
                let ctx = EventContext {
                    client_utime: r.read_u64()?,
                    layer: r.read_required_string("layer")?,
                    viewport: r.read_f32s::<4>()?,
                    projection: r.read_f64s::<16>()?,
                    view: r.read_f64s::<16>()?,
                    modifiers: Modifiers(r.read_u32()?),
                };
                let kind = EventKind::decode_payload(code, &mut r)?;
                Ok(Self::Event(InputEvent { ctx, kind }))
            }
        }
    }
}
