// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Wire schema for glint remote rendering.
//!
//! A glint server describes a scene as compact binary opcode frames; a thin
//! canvas client replays them against a render backend and reports input and
//! camera events back over the same duplex channel. This crate owns the byte
//! layer only: the big-endian cursor, the frame/opcode/event catalogs with
//! typed models and their encode/decode, and the UC5 texture codec. It holds
//! no scene state and performs no I/O.

use std::fmt;

pub mod command;
pub mod cursor;
pub mod event;
pub mod message;
pub mod uc5;

pub use command::{
    AttributeBinding, BufferCommand, DrawCall, PixcoordMode, Primitive, ProgramInvocation,
    TextureBinding, UniformBinding,
};
pub use cursor::{WireError, WireReader, WireWriter, STRING_ABSENT};
pub use event::{
    ClientMessage, EventContext, EventKind, InputEvent, Modifiers, ReadPixelsReply, Touch,
    CLIENT_MAGIC,
};
pub use message::{
    encode_frame, AttributeData, CameraMask, CanvasMessage, Compression, FrameReader,
    PixelEncoding, TextureFlags, SERVER_MAGIC,
};

/// Opaque server-assigned resource handle.
///
/// Ids are allocated by the server and never reused while the resource is
/// live; the client treats them as pure lookup keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Resource kind codes as they appear in define/undefine traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Linked GPU program (vertex + fragment source pair).
    Program,
    /// Vertex attribute array of 32-bit floats.
    AttrF32,
    /// Vertex attribute array of 32-bit signed integers.
    AttrI32,
    /// Index array of unsigned 16-bit elements.
    IndexU16,
    /// Three-channel byte texture.
    TextureRgb,
    /// Single-channel byte texture.
    TextureGray,
    /// Four-channel byte texture.
    TextureRgba,
}

impl ResourceKind {
    /// Wire code for this kind.
    pub fn code(self) -> u8 {
        match self {
            Self::Program => 1,
            Self::AttrF32 => 2,
            Self::AttrI32 => 3,
            Self::IndexU16 => 6,
            Self::TextureRgb => 7,
            Self::TextureGray => 8,
            Self::TextureRgba => 9,
        }
    }

    /// Decode a wire kind code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Program),
            2 => Some(Self::AttrF32),
            3 => Some(Self::AttrI32),
            6 => Some(Self::IndexU16),
            7 => Some(Self::TextureRgb),
            8 => Some(Self::TextureGray),
            9 => Some(Self::TextureRgba),
            _ => None,
        }
    }

    /// Store family this kind belongs to.
    pub fn family(self) -> ResourceFamily {
        match self {
            Self::Program => ResourceFamily::Program,
            Self::AttrF32 | Self::AttrI32 => ResourceFamily::VertexAttribute,
            Self::IndexU16 => ResourceFamily::IndexArray,
            Self::TextureRgb | Self::TextureGray | Self::TextureRgba => ResourceFamily::Texture,
        }
    }
}

/// The four families the object store groups resources into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceFamily {
    /// GPU programs.
    Program,
    /// Vertex attribute arrays.
    VertexAttribute,
    /// Index arrays.
    IndexArray,
    /// Textures.
    Texture,
}

impl fmt::Display for ResourceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Program => "program",
            Self::VertexAttribute => "vertex-attribute",
            Self::IndexArray => "index-array",
            Self::Texture => "texture",
        };
        f.write_str(name)
    }
}
