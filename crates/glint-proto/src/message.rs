// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Server-to-client traffic: the canvas opcode catalog.
//!
//! A frame opens with [`SERVER_MAGIC`] and then carries tagged opcodes until
//! a zero tag or end of frame. The server in this workspace emits one opcode
//! per frame; the client accepts any number. Decoding is streaming: apply
//! each message as it parses, and stop at the first malformed one.

use std::fmt;

use crate::cursor::{WireError, WireReader, WireWriter};
use crate::ResourceId;

/// Magic opening every server-to-client frame.
pub const SERVER_MAGIC: u32 = 0x1245_78ab;

/// Opcode tag: create or replace a named buffer's command stream.
pub const OP_BUFFER_REDRAW: u8 = 1;
/// Opcode tag: request a pixel readback.
pub const OP_CANVAS_READ_PIXELS: u8 = 2;
/// Opcode tag: resize the canvas.
pub const OP_CANVAS_SET_SIZE: u8 = 3;
/// Opcode tag: set the canvas title.
pub const OP_CANVAS_SET_TITLE: u8 = 4;
/// Opcode tag: set a layer's camera-controls mask.
pub const OP_LAYER_ENABLE_CAMERA_CONTROLS: u8 = 5;
/// Opcode tag: set a layer's draw order.
pub const OP_LAYER_SET_DRAW_ORDER: u8 = 6;
/// Opcode tag: animate a layer's background color.
pub const OP_LAYER_SET_BACKGROUND_COLOR: u8 = 7;
/// Opcode tag: set a layer's viewport position.
pub const OP_LAYER_SET_POSITION: u8 = 8;
/// Opcode tag: animate a layer's camera to an eye/lookat/up target.
pub const OP_LAYER_SET_ELU: u8 = 9;
/// Opcode tag: keepalive, no payload.
pub const OP_NOP: u8 = 10;
/// Opcode tag: log a message on the client.
pub const OP_DEBUG_MESSAGE: u8 = 11;
/// Opcode tag: define a GPU program.
pub const OP_DEFINE_PROGRAM: u8 = 12;
/// Opcode tag: release a GPU program.
pub const OP_UNDEFINE_PROGRAM: u8 = 13;
/// Opcode tag: define a vertex attribute array.
pub const OP_DEFINE_VERTEX_ATTRIBUTE: u8 = 14;
/// Opcode tag: release a vertex attribute array.
pub const OP_UNDEFINE_VERTEX_ATTRIBUTE: u8 = 15;
/// Opcode tag: define an index array.
pub const OP_DEFINE_INDEX_ARRAY: u8 = 16;
/// Opcode tag: release an index array.
pub const OP_UNDEFINE_INDEX_ARRAY: u8 = 17;
/// Opcode tag: define a texture.
pub const OP_DEFINE_TEXTURE: u8 = 18;
/// Opcode tag: release a texture.
pub const OP_UNDEFINE_TEXTURE: u8 = 19;
/// Opcode tag: define a named matrix slot.
pub const OP_DEFINE_NAMED_MATRIX: u8 = 20;
/// Opcode tag: release a named matrix slot.
pub const OP_UNDEFINE_NAMED_MATRIX: u8 = 21;
/// Opcode tag: set a layer's camera interface mode.
pub const OP_LAYER_SET_CAMERA_MODE: u8 = 22;
/// Opcode tag: echo request.
pub const OP_CANVAS_ECHO: u8 = 23;
/// Opcode tag: destroy a named buffer.
pub const OP_BUFFER_DESTROY: u8 = 24;

/// Camera gesture enable bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct CameraMask(pub u32);

impl CameraMask {
    /// Zoom gestures allowed.
    pub const ZOOM: u32 = 1;
    /// Pan gestures allowed.
    pub const PAN: u32 = 2;
    /// Rotate gestures allowed.
    pub const ROTATE: u32 = 4;

    /// All gestures allowed.
    pub fn all() -> Self {
        Self(Self::ZOOM | Self::PAN | Self::ROTATE)
    }

    /// Whether zooming is allowed.
    pub fn zoom(self) -> bool {
        self.0 & Self::ZOOM != 0
    }

    /// Whether panning is allowed.
    pub fn pan(self) -> bool {
        self.0 & Self::PAN != 0
    }

    /// Whether rotating is allowed.
    pub fn rotate(self) -> bool {
        self.0 & Self::ROTATE != 0
    }
}

/// Pixel layout of a texture payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelEncoding {
    /// Four bytes per pixel.
    Rgba,
    /// Three bytes per pixel.
    Rgb,
    /// One byte per pixel.
    Gray,
}

impl PixelEncoding {
    /// Wire code for this encoding.
    pub fn code(self) -> u32 {
        match self {
            Self::Rgba => 0,
            Self::Rgb => 1,
            Self::Gray => 2,
        }
    }

    /// Decode a wire encoding code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Rgba),
            1 => Some(Self::Rgb),
            2 => Some(Self::Gray),
            _ => None,
        }
    }

    /// Bytes per pixel for this encoding.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgba => 4,
            Self::Rgb => 3,
            Self::Gray => 1,
        }
    }
}

impl fmt::Display for PixelEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rgba => "rgba",
            Self::Rgb => "rgb",
            Self::Gray => "gray",
        };
        f.write_str(name)
    }
}

/// Texture sampling/wrapping flag bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct TextureFlags(pub u32);

impl TextureFlags {
    /// Repeat wrap mode (default is clamp-to-edge).
    pub const REPEAT: u32 = 1;
    /// Linear minification filter (default is nearest).
    pub const MIN_LINEAR: u32 = 2;
    /// Linear magnification filter (default is nearest).
    pub const MAG_LINEAR: u32 = 4;
    /// Generate mipmaps after upload.
    pub const MIPMAP: u32 = 8;

    /// Whether the repeat bit is set.
    pub fn repeat(self) -> bool {
        self.0 & Self::REPEAT != 0
    }

    /// Whether the linear-minification bit is set.
    pub fn min_linear(self) -> bool {
        self.0 & Self::MIN_LINEAR != 0
    }

    /// Whether the linear-magnification bit is set.
    pub fn mag_linear(self) -> bool {
        self.0 & Self::MAG_LINEAR != 0
    }

    /// Whether the mipmap bit is set.
    pub fn mipmap(self) -> bool {
        self.0 & Self::MIPMAP != 0
    }
}

/// Compression applied to a texture payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Raw bytes.
    None,
    /// UC5-compressed bytes.
    Uc5,
}

impl Compression {
    /// Wire code for this compression.
    pub fn code(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Uc5 => 1,
        }
    }

    /// Decode a wire compression code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Uc5),
            _ => None,
        }
    }
}

/// Payload of a vertex attribute definition.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    /// 32-bit float elements.
    F32 {
        /// Components per vertex.
        ndim: u8,
        /// All scalar elements, vertex-major.
        values: Vec<f32>,
    },
    /// 32-bit signed integer elements.
    I32 {
        /// Components per vertex.
        ndim: u8,
        /// All scalar elements, vertex-major.
        values: Vec<i32>,
    },
}

impl AttributeData {
    /// Components per vertex.
    pub fn ndim(&self) -> u8 {
        match self {
            Self::F32 { ndim, .. } | Self::I32 { ndim, .. } => *ndim,
        }
    }

    /// Total scalar element count.
    pub fn len(&self) -> usize {
        match self {
            Self::F32 { values, .. } => values.len(),
            Self::I32 { values, .. } => values.len(),
        }
    }

    /// Whether the payload holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One decoded server-to-client message.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasMessage {
    /// Create or replace a named buffer's command stream.
    BufferRedraw {
        /// Owning layer name.
        layer: String,
        /// Buffer name, unique within the layer.
        buffer: String,
        /// Paint-order key (lower draws first).
        draw_order: f32,
        /// Raw command stream bytes as transmitted (terminator included).
        commands: Vec<u8>,
    },
    /// Destroy a named buffer.
    BufferDestroy {
        /// Owning layer name.
        layer: String,
        /// Buffer name.
        buffer: String,
    },
    /// Request a pixel readback of the whole canvas.
    CanvasReadPixels {
        /// Request id echoed in the reply.
        id: u64,
    },
    /// Resize the canvas.
    CanvasSetSize {
        /// New width in pixels.
        width: u32,
        /// New height in pixels.
        height: u32,
    },
    /// Set the canvas title.
    CanvasSetTitle {
        /// New title.
        title: String,
    },
    /// Echo request; the client mirrors the nonce back.
    CanvasEcho {
        /// Opaque nonce.
        nonce: f64,
    },
    /// Keepalive.
    Nop,
    /// Log a message on the client.
    DebugMessage {
        /// Message text.
        text: String,
    },
    /// Set a layer's camera gesture mask.
    EnableCameraControls {
        /// Layer name.
        layer: String,
        /// Gestures to allow.
        mask: CameraMask,
    },
    /// Set a layer's draw order.
    SetDrawOrder {
        /// Layer name.
        layer: String,
        /// Paint-order key (lower draws first).
        order: f32,
    },
    /// Animate a layer's background color.
    SetBackgroundColor {
        /// Layer name.
        layer: String,
        /// Target color.
        rgba: [f32; 4],
        /// Animation duration in milliseconds.
        duration_ms: f32,
    },
    /// Set a layer's viewport within the canvas.
    SetPosition {
        /// Layer name.
        layer: String,
        /// `[x, y, w, h]` as fractions of the canvas.
        viewport: [f32; 4],
        /// Animation duration in milliseconds (currently applied at once).
        duration_ms: f32,
    },
    /// Animate a layer's camera to a new eye/lookat/up.
    SetElu {
        /// Layer name.
        layer: String,
        /// Target eye position.
        eye: [f64; 3],
        /// Target lookat point.
        lookat: [f64; 3],
        /// Target up vector.
        up: [f64; 3],
        /// Animation duration in milliseconds.
        duration_ms: f32,
    },
    /// Set a layer's camera interface mode ("2D", "2.5D", "2F", "3D").
    SetCameraMode {
        /// Layer name.
        layer: String,
        /// Mode name.
        mode: String,
    },
    /// Define a GPU program.
    DefineProgram {
        /// Resource id.
        id: ResourceId,
        /// Vertex shader source.
        vertex_src: String,
        /// Fragment shader source.
        fragment_src: String,
    },
    /// Release a GPU program.
    UndefineProgram {
        /// Resource id.
        id: ResourceId,
    },
    /// Define a vertex attribute array.
    DefineVertexAttribute {
        /// Resource id.
        id: ResourceId,
        /// Element payload.
        data: AttributeData,
    },
    /// Release a vertex attribute array.
    UndefineVertexAttribute {
        /// Resource id.
        id: ResourceId,
    },
    /// Define an index array of u16 elements.
    DefineIndexArray {
        /// Resource id.
        id: ResourceId,
        /// Index elements.
        indices: Vec<u16>,
    },
    /// Release an index array.
    UndefineIndexArray {
        /// Resource id.
        id: ResourceId,
    },
    /// Define a texture.
    DefineTexture {
        /// Resource id.
        id: ResourceId,
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Row stride in bytes (may exceed width × bytes-per-pixel).
        stride: u32,
        /// Pixel layout.
        encoding: PixelEncoding,
        /// Sampling/wrapping flags.
        flags: TextureFlags,
        /// Payload compression.
        compression: Compression,
        /// Payload bytes as transmitted.
        bytes: Vec<u8>,
    },
    /// Release a texture.
    UndefineTexture {
        /// Resource id.
        id: ResourceId,
    },
    /// Define a named matrix slot.
    DefineNamedMatrix {
        /// Slot name.
        name: String,
        /// Row-major matrix.
        matrix: [f64; 16],
    },
    /// Release a named matrix slot.
    UndefineNamedMatrix {
        /// Slot name.
        name: String,
    },
}

impl CanvasMessage {
    /// Append this opcode (tag and payload, no magic) to a frame.
    #[allow(clippy::cast_possible_truncation)] // element counts are far below u32::MAX
    #[allow(clippy::cast_sign_loss)] // i32 elements travel as raw u32 words
    pub fn encode(&self, w: &mut WireWriter) {
        match self {
            Self::BufferRedraw {
                layer,
                buffer,
                draw_order,
                commands,
            } => {
                w.write_u8(OP_BUFFER_REDRAW);
                w.write_string(layer);
                w.write_string(buffer);
                w.write_f32(*draw_order);
                w.write_u32(commands.len() as u32);
                w.write_bytes(commands);
            }
            Self::BufferDestroy { layer, buffer } => {
                w.write_u8(OP_BUFFER_DESTROY);
                w.write_string(layer);
                w.write_string(buffer);
            }
            Self::CanvasReadPixels { id } => {
                w.write_u8(OP_CANVAS_READ_PIXELS);
                w.write_u64(*id);
            }
            Self::CanvasSetSize { width, height } => {
                w.write_u8(OP_CANVAS_SET_SIZE);
                w.write_u32(*width);
                w.write_u32(*height);
            }
            Self::CanvasSetTitle { title } => {
                w.write_u8(OP_CANVAS_SET_TITLE);
                w.write_string(title);
            }
            Self::CanvasEcho { nonce } => {
                w.write_u8(OP_CANVAS_ECHO);
                w.write_f64(*nonce);
            }
            Self::Nop => w.write_u8(OP_NOP),
            Self::DebugMessage { text } => {
                w.write_u8(OP_DEBUG_MESSAGE);
                w.write_string(text);
            }
            Self::EnableCameraControls { layer, mask } => {
                w.write_u8(OP_LAYER_ENABLE_CAMERA_CONTROLS);
                w.write_string(layer);
                w.write_u32(mask.0);
            }
            Self::SetDrawOrder { layer, order } => {
                w.write_u8(OP_LAYER_SET_DRAW_ORDER);
                w.write_string(layer);
                w.write_f32(*order);
            }
            Self::SetBackgroundColor {
                layer,
                rgba,
                duration_ms,
            } => {
                w.write_u8(OP_LAYER_SET_BACKGROUND_COLOR);
                w.write_string(layer);
                for v in rgba {
                    w.write_f32(*v);
                }
                w.write_f32(*duration_ms);
            }
            Self::SetPosition {
                layer,
                viewport,
                duration_ms,
            } => {
                w.write_u8(OP_LAYER_SET_POSITION);
                w.write_string(layer);
                for v in viewport {
                    w.write_f32(*v);
                }
                w.write_f32(*duration_ms);
            }
            Self::SetElu {
                layer,
                eye,
                lookat,
                up,
                duration_ms,
            } => {
                w.write_u8(OP_LAYER_SET_ELU);
                w.write_string(layer);
                for v in eye.iter().chain(lookat).chain(up) {
                    w.write_f64(*v);
                }
                w.write_f32(*duration_ms);
            }
            Self::SetCameraMode { layer, mode } => {
                w.write_u8(OP_LAYER_SET_CAMERA_MODE);
                w.write_string(layer);
                w.write_string(mode);
            }
            Self::DefineProgram {
                id,
                vertex_src,
                fragment_src,
            } => {
                w.write_u8(OP_DEFINE_PROGRAM);
                w.write_u64(id.0);
                w.write_string(vertex_src);
                w.write_string(fragment_src);
            }
            Self::UndefineProgram { id } => {
                w.write_u8(OP_UNDEFINE_PROGRAM);
                w.write_u64(id.0);
            }
            Self::DefineVertexAttribute { id, data } => {
                w.write_u8(OP_DEFINE_VERTEX_ATTRIBUTE);
                w.write_u64(id.0);
                match data {
                    AttributeData::F32 { ndim, values } => {
                        w.write_u8(crate::ResourceKind::AttrF32.code());
                        w.write_u32(values.len() as u32);
                        w.write_u8(*ndim);
                        // Padding byte aligns the floats that follow.
                        w.write_u8(0);
                        for v in values {
                            w.write_f32(*v);
                        }
                    }
                    AttributeData::I32 { ndim, values } => {
                        w.write_u8(crate::ResourceKind::AttrI32.code());
                        w.write_u32(values.len() as u32);
                        w.write_u8(*ndim);
                        for v in values {
                            w.write_u32(*v as u32);
                        }
                    }
                }
            }
            Self::UndefineVertexAttribute { id } => {
                w.write_u8(OP_UNDEFINE_VERTEX_ATTRIBUTE);
                w.write_u64(id.0);
            }
            Self::DefineIndexArray { id, indices } => {
                w.write_u8(OP_DEFINE_INDEX_ARRAY);
                w.write_u64(id.0);
                w.write_u8(crate::ResourceKind::IndexU16.code());
                w.write_u32(indices.len() as u32);
                for v in indices {
                    w.write_u16(*v);
                }
            }
            Self::UndefineIndexArray { id } => {
                w.write_u8(OP_UNDEFINE_INDEX_ARRAY);
                w.write_u64(id.0);
            }
            Self::DefineTexture {
                id,
                width,
                height,
                stride,
                encoding,
                flags,
                compression,
                bytes,
            } => {
                w.write_u8(OP_DEFINE_TEXTURE);
                w.write_u64(id.0);
                w.write_u32(*width);
                w.write_u32(*height);
                w.write_u32(*stride);
                w.write_u32(encoding.code());
                w.write_u32(flags.0);
                w.write_u32(compression.code());
                w.write_u32(bytes.len() as u32);
                w.write_bytes(bytes);
            }
            Self::UndefineTexture { id } => {
                w.write_u8(OP_UNDEFINE_TEXTURE);
                w.write_u64(id.0);
            }
            Self::DefineNamedMatrix { name, matrix } => {
                w.write_u8(OP_DEFINE_NAMED_MATRIX);
                w.write_string(name);
                for v in matrix {
                    w.write_f64(*v);
                }
            }
            Self::UndefineNamedMatrix { name } => {
                w.write_u8(OP_UNDEFINE_NAMED_MATRIX);
                w.write_string(name);
            }
        }
    }

    #[allow(clippy::cast_possible_wrap)] // i32 elements travel as raw u32 words
    fn decode(tag: u8, r: &mut WireReader<'_>) -> Result<Self, WireError> {
        match tag {
            OP_BUFFER_REDRAW => {
                let layer = r.read_required_string("layer")?;
                let buffer = r.read_required_string("buffer")?;
                let draw_order = r.read_f32()?;
                let len = r.read_u32()? as usize;
                let commands = r.read_bytes(len)?.to_vec();
                Ok(Self::BufferRedraw {
                    layer,
                    buffer,
                    draw_order,
                    commands,
                })
            }
            OP_BUFFER_DESTROY => Ok(Self::BufferDestroy {
                layer: r.read_required_string("layer")?,
                buffer: r.read_required_string("buffer")?,
            }),
            OP_CANVAS_READ_PIXELS => Ok(Self::CanvasReadPixels { id: r.read_u64()? }),
            OP_CANVAS_SET_SIZE => Ok(Self::CanvasSetSize {
                width: r.read_u32()?,
                height: r.read_u32()?,
            }),
            OP_CANVAS_SET_TITLE => Ok(Self::CanvasSetTitle {
                title: r.read_required_string("title")?,
            }),
            OP_CANVAS_ECHO => Ok(Self::CanvasEcho {
                nonce: r.read_f64()?,
            }),
            OP_NOP => Ok(Self::Nop),
            OP_DEBUG_MESSAGE => Ok(Self::DebugMessage {
                text: r.read_required_string("text")?,
            }),
            OP_LAYER_ENABLE_CAMERA_CONTROLS => Ok(Self::EnableCameraControls {
                layer: r.read_required_string("layer")?,
                mask: CameraMask(r.read_u32()?),
            }),
            OP_LAYER_SET_DRAW_ORDER => Ok(Self::SetDrawOrder {
                layer: r.read_required_string("layer")?,
                order: r.read_f32()?,
            }),
            OP_LAYER_SET_BACKGROUND_COLOR => Ok(Self::SetBackgroundColor {
                layer: r.read_required_string("layer")?,
                rgba: r.read_f32s::<4>()?,
                duration_ms: r.read_f32()?,
            }),
            OP_LAYER_SET_POSITION => Ok(Self::SetPosition {
                layer: r.read_required_string("layer")?,
                viewport: r.read_f32s::<4>()?,
                duration_ms: r.read_f32()?,
            }),
            OP_LAYER_SET_ELU => Ok(Self::SetElu {
                layer: r.read_required_string("layer")?,
                eye: r.read_f64s::<3>()?,
                lookat: r.read_f64s::<3>()?,
                up: r.read_f64s::<3>()?,
                duration_ms: r.read_f32()?,
            }),
            OP_LAYER_SET_CAMERA_MODE => Ok(Self::SetCameraMode {
                layer: r.read_required_string("layer")?,
                mode: r.read_required_string("mode")?,
            }),
            OP_DEFINE_PROGRAM => Ok(Self::DefineProgram {
                id: ResourceId(r.read_u64()?),
                vertex_src: r.read_required_string("vertex source")?,
                fragment_src: r.read_required_string("fragment source")?,
            }),
            OP_UNDEFINE_PROGRAM => Ok(Self::UndefineProgram {
                id: ResourceId(r.read_u64()?),
            }),
            OP_DEFINE_VERTEX_ATTRIBUTE => {
                let id = ResourceId(r.read_u64()?);
                let elem = r.read_u8()?;
                let nelements = r.read_u32()? as usize;
                let ndim = r.read_u8()?;
                let data = match crate::ResourceKind::from_code(elem) {
                    Some(crate::ResourceKind::AttrF32) => {
                        let _pad = r.read_u8()?;
                        let mut values = Vec::with_capacity(nelements.min(r.remaining() / 4));
                        for _ in 0..nelements {
                            values.push(r.read_f32()?);
                        }
                        AttributeData::F32 { ndim, values }
                    }
                    Some(crate::ResourceKind::AttrI32) => {
                        let mut values = Vec::with_capacity(nelements.min(r.remaining() / 4));
                        for _ in 0..nelements {
                            values.push(r.read_u32()? as i32);
                        }
                        AttributeData::I32 { ndim, values }
                    }
                    _ => {
                        return Err(WireError::BadValue {
                            field: "attribute element type",
                            value: u32::from(elem),
                        })
                    }
                };
                Ok(Self::DefineVertexAttribute { id, data })
            }
            OP_UNDEFINE_VERTEX_ATTRIBUTE => Ok(Self::UndefineVertexAttribute {
                id: ResourceId(r.read_u64()?),
            }),
            OP_DEFINE_INDEX_ARRAY => {
                let id = ResourceId(r.read_u64()?);
                let elem = r.read_u8()?;
                if elem != crate::ResourceKind::IndexU16.code() {
                    return Err(WireError::BadValue {
                        field: "index element type",
                        value: u32::from(elem),
                    });
                }
                let nelements = r.read_u32()? as usize;
                let mut indices = Vec::with_capacity(nelements.min(r.remaining() / 2));
                for _ in 0..nelements {
                    indices.push(r.read_u16()?);
                }
                Ok(Self::DefineIndexArray { id, indices })
            }
            OP_UNDEFINE_INDEX_ARRAY => Ok(Self::UndefineIndexArray {
                id: ResourceId(r.read_u64()?),
            }),
            OP_DEFINE_TEXTURE => {
                let id = ResourceId(r.read_u64()?);
                let width = r.read_u32()?;
                let height = r.read_u32()?;
                let stride = r.read_u32()?;
                let encoding_code = r.read_u32()?;
                let encoding =
                    PixelEncoding::from_code(encoding_code).ok_or(WireError::BadValue {
                        field: "texture encoding",
                        value: encoding_code,
                    })?;
                let flags = TextureFlags(r.read_u32()?);
                let compression_code = r.read_u32()?;
                let compression =
                    Compression::from_code(compression_code).ok_or(WireError::BadValue {
                        field: "texture compression",
                        value: compression_code,
                    })?;
                let len = r.read_u32()? as usize;
                let bytes = r.read_bytes(len)?.to_vec();
                Ok(Self::DefineTexture {
                    id,
                    width,
                    height,
                    stride,
                    encoding,
                    flags,
                    compression,
                    bytes,
                })
            }
            OP_UNDEFINE_TEXTURE => Ok(Self::UndefineTexture {
                id: ResourceId(r.read_u64()?),
            }),
            OP_DEFINE_NAMED_MATRIX => Ok(Self::DefineNamedMatrix {
                name: r.read_required_string("matrix name")?,
                matrix: r.read_f64s::<16>()?,
            }),
            OP_UNDEFINE_NAMED_MATRIX => Ok(Self::UndefineNamedMatrix {
                name: r.read_required_string("matrix name")?,
            }),
            other => Err(WireError::UnknownOpcode(other)),
        }
    }
}

/// Encode a frame carrying the given opcodes.
pub fn encode_frame(messages: &[CanvasMessage]) -> Vec<u8> {
    let mut w = WireWriter::with_capacity(64);
    w.write_u32(SERVER_MAGIC);
    for msg in messages {
        msg.encode(&mut w);
    }
    w.into_bytes()
}

/// Streaming decoder over one server-to-client frame.
///
/// Yields messages until the frame ends, a zero tag terminates it, or a
/// malformed opcode stops it; after an error the iterator fuses. Callers
/// apply messages as they come so everything before a bad opcode still
/// lands.
#[derive(Debug)]
pub struct FrameReader<'a> {
    reader: WireReader<'a>,
    done: bool,
}

impl<'a> FrameReader<'a> {
    /// Check the magic and position the cursor on the first opcode.
    pub fn new(frame: &'a [u8]) -> Result<Self, WireError> {
        let mut reader = WireReader::new(frame);
        let magic = reader.read_u32()?;
        if magic != SERVER_MAGIC {
            return Err(WireError::BadMagic {
                got: magic,
                expected: SERVER_MAGIC,
            });
        }
        Ok(Self {
            reader,
            done: false,
        })
    }
}

impl Iterator for FrameReader<'_> {
    type Item = Result<CanvasMessage, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.reader.remaining() == 0 {
            return None;
        }
        let tag = match self.reader.read_u8() {
            Ok(tag) => tag,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };
        if tag == 0 {
            self.done = true;
            return None;
        }
        match CanvasMessage::decode(tag, &mut self.reader) {
            Ok(msg) => Some(Ok(msg)),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
