// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Buffer command streams.
//!
//! The payload of a buffer redraw is itself a little opcode language: stack
//! operations on the model matrix, the pixel-coordinate overlay, the
//! depth-test flag, and one drawing opcode that binds a program with its
//! uniforms, attributes and textures and issues draw calls. A zero tag ends
//! the stream early and is valid.

use crate::cursor::{WireError, WireReader, WireWriter};
use crate::ResourceId;

/// Stream tag: push (duplicate) the model matrix.
pub const CMD_MODEL_PUSH: u8 = 1;
/// Stream tag: pop the model matrix.
pub const CMD_MODEL_POP: u8 = 2;
/// Stream tag: right-multiply the model matrix.
pub const CMD_MODEL_MULTIPLY: u8 = 3;
/// Stream tag: enter pixel-coordinate overlay space.
pub const CMD_PIXCOORD_PUSH: u8 = 4;
/// Stream tag: leave pixel-coordinate overlay space.
pub const CMD_PIXCOORD_POP: u8 = 5;
/// Stream tag: push a depth-test setting.
pub const CMD_DEPTH_TEST_PUSH: u8 = 6;
/// Stream tag: pop the depth-test setting.
pub const CMD_DEPTH_TEST_POP: u8 = 7;
/// Stream tag: bind a program and draw.
pub const CMD_EXECUTE_PROGRAM: u8 = 100;

/// Uniform name a program uses to receive the projection stack top.
pub const UNIFORM_PROJECTION: &str = "VX_P";
/// Uniform name a program uses to receive the view stack top.
pub const UNIFORM_VIEW: &str = "VX_V";
/// Uniform name a program uses to receive the model stack top.
pub const UNIFORM_MODEL: &str = "VX_M";
/// Uniform name a program uses to receive the camera eye position.
pub const UNIFORM_EYE: &str = "VX_eye";
/// Uniform name a program uses to receive the camera lookat point.
pub const UNIFORM_LOOKAT: &str = "VX_lookat";
/// Pseudo-uniform that sets the rasterizer line width instead.
pub const UNIFORM_LINE_WIDTH: &str = "glLineWidth";

/// Draw primitive kinds, numbered as the render backend expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Isolated points.
    Points,
    /// Isolated line segments.
    Lines,
    /// Closed line loop.
    LineLoop,
    /// Connected line strip.
    LineStrip,
    /// Isolated triangles.
    Triangles,
    /// Triangle strip.
    TriangleStrip,
    /// Triangle fan.
    TriangleFan,
}

impl Primitive {
    /// Wire code for this primitive.
    pub fn code(self) -> u32 {
        match self {
            Self::Points => 0,
            Self::Lines => 1,
            Self::LineLoop => 2,
            Self::LineStrip => 3,
            Self::Triangles => 4,
            Self::TriangleStrip => 5,
            Self::TriangleFan => 6,
        }
    }

    /// Decode a wire primitive code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Points),
            1 => Some(Self::Lines),
            2 => Some(Self::LineLoop),
            3 => Some(Self::LineStrip),
            4 => Some(Self::Triangles),
            5 => Some(Self::TriangleStrip),
            6 => Some(Self::TriangleFan),
            _ => None,
        }
    }
}

/// Scale rule for the pixel-coordinate overlay transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixcoordMode {
    /// One unit per pixel.
    Pixel,
    /// One unit per viewport width.
    Width,
    /// One unit per viewport height.
    Height,
    /// One unit per min(width, height).
    Min,
    /// One unit per max(width, height).
    Max,
}

impl PixcoordMode {
    /// Wire code for this mode.
    pub fn code(self) -> u8 {
        match self {
            Self::Pixel => 0,
            Self::Width => 1,
            Self::Height => 2,
            Self::Min => 3,
            Self::Max => 4,
        }
    }

    /// Decode a wire mode code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Pixel),
            1 => Some(Self::Width),
            2 => Some(Self::Height),
            3 => Some(Self::Min),
            4 => Some(Self::Max),
            _ => None,
        }
    }

    /// Resolve the scale factor against a viewport size in pixels.
    pub fn scale(self, width: f64, height: f64) -> f64 {
        match self {
            Self::Pixel => 1.0,
            Self::Width => width,
            Self::Height => height,
            Self::Min => width.min(height),
            Self::Max => width.max(height),
        }
    }
}

/// One named uniform value, row-major on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBinding {
    /// Uniform name in the program.
    pub name: String,
    /// Row count.
    pub rows: u8,
    /// Column count.
    pub cols: u8,
    /// `rows * cols` values.
    pub values: Vec<f32>,
}

/// One vertex attribute bound to a shader input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeBinding {
    /// Attribute name in the program.
    pub name: String,
    /// Vertex attribute resource to feed it.
    pub resource: ResourceId,
}

/// One texture bound to a sampler uniform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureBinding {
    /// Sampler uniform name in the program.
    pub sampler: String,
    /// Texture resource to bind.
    pub texture: ResourceId,
}

/// One draw call issued after binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    /// Index array to draw through, or `None` for a plain array draw.
    pub indices: Option<ResourceId>,
    /// Primitive kind.
    pub primitive: Primitive,
    /// First vertex (ignored for indexed draws).
    pub first: u32,
    /// Vertex or index count.
    pub count: u32,
}

/// Full description of one program execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramInvocation {
    /// Program resource to bind.
    pub program: ResourceId,
    /// Uniform values to upload.
    pub uniforms: Vec<UniformBinding>,
    /// Vertex attributes to enable.
    pub attributes: Vec<AttributeBinding>,
    /// Textures to bind, in sampler-unit order.
    pub textures: Vec<TextureBinding>,
    /// Draw calls to issue.
    pub draws: Vec<DrawCall>,
}

/// One decoded buffer command.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferCommand {
    /// Duplicate the model matrix stack top.
    ModelPush,
    /// Pop the model matrix stack.
    ModelPop,
    /// Right-multiply the model stack top by a row-major matrix.
    ModelMultiply([f64; 16]),
    /// Replace projection and view with a pixel-space overlay transform.
    PixcoordPush {
        /// Horizontal anchor as a fraction of viewport width.
        width_frac: f32,
        /// Vertical anchor as a fraction of viewport height.
        height_frac: f32,
        /// Scale rule.
        mode: PixcoordMode,
    },
    /// Restore the transforms replaced by the overlay.
    PixcoordPop,
    /// Push a depth-test setting and apply it.
    DepthTestPush(bool),
    /// Pop the depth-test stack and apply what is restored.
    DepthTestPop,
    /// Bind a program and draw.
    Execute(ProgramInvocation),
}

impl BufferCommand {
    /// Append this command to a stream under construction.
    pub fn encode(&self, w: &mut WireWriter) {
        match self {
            Self::ModelPush => w.write_u8(CMD_MODEL_PUSH),
            Self::ModelPop => w.write_u8(CMD_MODEL_POP),
            Self::ModelMultiply(m) => {
                w.write_u8(CMD_MODEL_MULTIPLY);
                for v in m {
                    w.write_f64(*v);
                }
            }
            Self::PixcoordPush {
                width_frac,
                height_frac,
                mode,
            } => {
                w.write_u8(CMD_PIXCOORD_PUSH);
                w.write_f32(*width_frac);
                w.write_f32(*height_frac);
                w.write_u8(mode.code());
            }
            Self::PixcoordPop => w.write_u8(CMD_PIXCOORD_POP),
            Self::DepthTestPush(enabled) => {
                w.write_u8(CMD_DEPTH_TEST_PUSH);
                w.write_u8(u8::from(*enabled));
            }
            Self::DepthTestPop => w.write_u8(CMD_DEPTH_TEST_POP),
            Self::Execute(exec) => encode_execute(exec, w),
        }
    }

    fn decode(tag: u8, r: &mut WireReader<'_>) -> Result<Self, WireError> {
        match tag {
            CMD_MODEL_PUSH => Ok(Self::ModelPush),
            CMD_MODEL_POP => Ok(Self::ModelPop),
            CMD_MODEL_MULTIPLY => Ok(Self::ModelMultiply(r.read_f64s::<16>()?)),
            CMD_PIXCOORD_PUSH => {
                let width_frac = r.read_f32()?;
                let height_frac = r.read_f32()?;
                let code = r.read_u8()?;
                let mode = PixcoordMode::from_code(code).ok_or(WireError::BadValue {
                    field: "pixcoord scale mode",
                    value: u32::from(code),
                })?;
                Ok(Self::PixcoordPush {
                    width_frac,
                    height_frac,
                    mode,
                })
            }
            CMD_PIXCOORD_POP => Ok(Self::PixcoordPop),
            CMD_DEPTH_TEST_PUSH => Ok(Self::DepthTestPush(r.read_u8()? != 0)),
            CMD_DEPTH_TEST_POP => Ok(Self::DepthTestPop),
            CMD_EXECUTE_PROGRAM => Ok(Self::Execute(decode_execute(r)?)),
            other => Err(WireError::UnknownOpcode(other)),
        }
    }
}

#[allow(clippy::cast_possible_truncation)] // binding counts are u8 on the wire
fn encode_execute(exec: &ProgramInvocation, w: &mut WireWriter) {
    w.write_u8(CMD_EXECUTE_PROGRAM);
    w.write_u64(exec.program.0);

    w.write_u8(exec.uniforms.len() as u8);
    for u in &exec.uniforms {
        w.write_string(&u.name);
        w.write_u8(u.rows);
        w.write_u8(u.cols);
        for v in &u.values {
            w.write_f32(*v);
        }
    }

    w.write_u8(exec.attributes.len() as u8);
    for a in &exec.attributes {
        w.write_string(&a.name);
        w.write_u64(a.resource.0);
    }

    w.write_u8(exec.textures.len() as u8);
    for t in &exec.textures {
        w.write_string(&t.sampler);
        w.write_u64(t.texture.0);
    }

    w.write_u8(exec.draws.len() as u8);
    for d in &exec.draws {
        w.write_u8(u8::from(d.indices.is_some()));
        if let Some(idx) = d.indices {
            w.write_u64(idx.0);
        }
        w.write_u32(d.primitive.code());
        w.write_u32(d.first);
        w.write_u32(d.count);
    }
}

fn decode_execute(r: &mut WireReader<'_>) -> Result<ProgramInvocation, WireError> {
    let program = ResourceId(r.read_u64()?);

    let nuniforms = r.read_u8()?;
    let mut uniforms = Vec::with_capacity(usize::from(nuniforms));
    for _ in 0..nuniforms {
        let name = r.read_required_string("uniform name")?;
        let rows = r.read_u8()?;
        let cols = r.read_u8()?;
        let count = usize::from(rows) * usize::from(cols);
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(r.read_f32()?);
        }
        uniforms.push(UniformBinding {
            name,
            rows,
            cols,
            values,
        });
    }

    let nattribs = r.read_u8()?;
    let mut attributes = Vec::with_capacity(usize::from(nattribs));
    for _ in 0..nattribs {
        attributes.push(AttributeBinding {
            name: r.read_required_string("attribute name")?,
            resource: ResourceId(r.read_u64()?),
        });
    }

    let ntextures = r.read_u8()?;
    let mut textures = Vec::with_capacity(usize::from(ntextures));
    for _ in 0..ntextures {
        textures.push(TextureBinding {
            sampler: r.read_required_string("sampler name")?,
            texture: ResourceId(r.read_u64()?),
        });
    }

    let ndraws = r.read_u8()?;
    let mut draws = Vec::with_capacity(usize::from(ndraws));
    for _ in 0..ndraws {
        let uses_indices = r.read_u8()? != 0;
        let indices = if uses_indices {
            Some(ResourceId(r.read_u64()?))
        } else {
            None
        };
        let code = r.read_u32()?;
        let primitive = Primitive::from_code(code).ok_or(WireError::BadValue {
            field: "draw primitive",
            value: code,
        })?;
        draws.push(DrawCall {
            indices,
            primitive,
            first: r.read_u32()?,
            count: r.read_u32()?,
        });
    }

    Ok(ProgramInvocation {
        program,
        uniforms,
        attributes,
        textures,
        draws,
    })
}

/// Serialize a command sequence into stream bytes, without a terminator.
pub fn encode_stream(commands: &[BufferCommand]) -> Vec<u8> {
    let mut w = WireWriter::new();
    for cmd in commands {
        cmd.encode(&mut w);
    }
    w.into_bytes()
}

/// Parse a full command stream, stopping at a zero tag or end of bytes.
pub fn decode_stream(bytes: &[u8]) -> Result<Vec<BufferCommand>, WireError> {
    let mut r = WireReader::new(bytes);
    let mut out = Vec::new();
    while r.remaining() > 0 {
        let tag = r.read_u8()?;
        if tag == 0 {
            break;
        }
        out.push(BufferCommand::decode(tag, &mut r)?);
    }
    Ok(out)
}
