// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Server-side GPU resources.
//!
//! A resource pairs an immutable payload (program source, attribute array,
//! index array, or texture image) with a process-unique id. Scene objects
//! hold resources by [`Arc`]; each connection counts references per published
//! snapshot and emits a define opcode before a resource's first use and the
//! matching undefine after its last. Ids are never reused, so clients treat
//! them as pure lookup keys.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glint_proto::{
    uc5, AttributeData, CanvasMessage, Compression, PixelEncoding, ResourceFamily, ResourceId,
    TextureFlags,
};
use thiserror::Error;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> ResourceId {
    ResourceId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Rejected resource payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// Attribute dimensionality outside `1..=4`.
    #[error("[RES_NDIM] attribute ndim {0} is outside 1..=4")]
    BadNdim(u8),
    /// Attribute values do not divide into whole elements.
    #[error("[RES_RAGGED] {count} values do not divide into {ndim}-wide elements")]
    Ragged {
        /// Number of scalar values supplied.
        count: usize,
        /// Requested element width.
        ndim: u8,
    },
    /// Texture byte length disagrees with its geometry.
    #[error("[RES_TEXTURE_SIZE] texture payload is {got} bytes, geometry needs {want}")]
    TextureSize {
        /// Bytes supplied.
        got: usize,
        /// `stride * height` the geometry demands.
        want: usize,
    },
    /// Texture row stride shorter than one row of pixels.
    #[error("[RES_TEXTURE_STRIDE] stride {stride} cannot hold {width} {encoding} pixels")]
    TextureStride {
        /// Row stride in bytes.
        stride: u32,
        /// Image width in pixels.
        width: u32,
        /// Pixel layout.
        encoding: PixelEncoding,
    },
}

/// Raw texture image held by a texture resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bytes per row; may exceed `width` × bytes-per-pixel.
    pub stride: u32,
    /// Pixel layout.
    pub encoding: PixelEncoding,
    /// Sampling and wrap flags.
    pub flags: TextureFlags,
    /// Raw pixel bytes, `height * stride` long.
    pub bytes: Vec<u8>,
}

/// Immutable payload of a resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceData {
    /// Shader source pair.
    Program {
        /// Vertex shader source.
        vertex_src: String,
        /// Fragment shader source.
        fragment_src: String,
    },
    /// Vertex attribute array.
    Attribute(AttributeData),
    /// Index array of u16 elements.
    IndexArray(Vec<u16>),
    /// Texture image, stored raw; single-channel payloads are compressed
    /// when the define opcode is built.
    Texture(TextureData),
}

/// A shareable GPU resource with a process-unique id.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    id: ResourceId,
    data: ResourceData,
}

impl Resource {
    /// New program resource from a vertex/fragment source pair.
    pub fn program(vertex_src: impl Into<String>, fragment_src: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: next_id(),
            data: ResourceData::Program {
                vertex_src: vertex_src.into(),
                fragment_src: fragment_src.into(),
            },
        })
    }

    /// New float attribute array of `ndim`-wide elements.
    pub fn attr_f32(ndim: u8, values: Vec<f32>) -> Result<Arc<Self>, ResourceError> {
        check_elements(ndim, values.len())?;
        Ok(Arc::new(Self {
            id: next_id(),
            data: ResourceData::Attribute(AttributeData::F32 { ndim, values }),
        }))
    }

    /// New integer attribute array of `ndim`-wide elements.
    pub fn attr_i32(ndim: u8, values: Vec<i32>) -> Result<Arc<Self>, ResourceError> {
        check_elements(ndim, values.len())?;
        Ok(Arc::new(Self {
            id: next_id(),
            data: ResourceData::Attribute(AttributeData::I32 { ndim, values }),
        }))
    }

    /// New index array.
    pub fn index_u16(indices: Vec<u16>) -> Arc<Self> {
        Arc::new(Self {
            id: next_id(),
            data: ResourceData::IndexArray(indices),
        })
    }

    /// New texture from raw image bytes laid out `height` rows of `stride`
    /// bytes each.
    pub fn texture(
        width: u32,
        height: u32,
        stride: u32,
        encoding: PixelEncoding,
        flags: TextureFlags,
        bytes: Vec<u8>,
    ) -> Result<Arc<Self>, ResourceError> {
        if stride < width * encoding.bytes_per_pixel() {
            return Err(ResourceError::TextureStride {
                stride,
                width,
                encoding,
            });
        }
        let want = stride as usize * height as usize;
        if bytes.len() != want {
            return Err(ResourceError::TextureSize {
                got: bytes.len(),
                want,
            });
        }
        Ok(Arc::new(Self {
            id: next_id(),
            data: ResourceData::Texture(TextureData {
                width,
                height,
                stride,
                encoding,
                flags,
                bytes,
            }),
        }))
    }

    /// Process-unique id.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Payload this resource carries.
    pub fn data(&self) -> &ResourceData {
        &self.data
    }

    /// Store family the payload belongs to.
    pub fn family(&self) -> ResourceFamily {
        match &self.data {
            ResourceData::Program { .. } => ResourceFamily::Program,
            ResourceData::Attribute(_) => ResourceFamily::VertexAttribute,
            ResourceData::IndexArray(_) => ResourceFamily::IndexArray,
            ResourceData::Texture(_) => ResourceFamily::Texture,
        }
    }

    /// Build the define opcode that introduces this resource to a client.
    pub(crate) fn define_message(&self) -> CanvasMessage {
        match &self.data {
            ResourceData::Program {
                vertex_src,
                fragment_src,
            } => CanvasMessage::DefineProgram {
                id: self.id,
                vertex_src: vertex_src.clone(),
                fragment_src: fragment_src.clone(),
            },
            ResourceData::Attribute(data) => CanvasMessage::DefineVertexAttribute {
                id: self.id,
                data: data.clone(),
            },
            ResourceData::IndexArray(indices) => CanvasMessage::DefineIndexArray {
                id: self.id,
                indices: indices.clone(),
            },
            ResourceData::Texture(tex) => {
                // Single-channel images always travel UC5-compressed.
                let (compression, bytes) = match tex.encoding {
                    PixelEncoding::Gray => (Compression::Uc5, uc5::compress(&tex.bytes)),
                    PixelEncoding::Rgb | PixelEncoding::Rgba => {
                        (Compression::None, tex.bytes.clone())
                    }
                };
                CanvasMessage::DefineTexture {
                    id: self.id,
                    width: tex.width,
                    height: tex.height,
                    stride: tex.stride,
                    encoding: tex.encoding,
                    flags: tex.flags,
                    compression,
                    bytes,
                }
            }
        }
    }

    /// Build the undefine opcode that releases this resource on a client.
    pub(crate) fn undefine_message(&self) -> CanvasMessage {
        match self.family() {
            ResourceFamily::Program => CanvasMessage::UndefineProgram { id: self.id },
            ResourceFamily::VertexAttribute => {
                CanvasMessage::UndefineVertexAttribute { id: self.id }
            }
            ResourceFamily::IndexArray => CanvasMessage::UndefineIndexArray { id: self.id },
            ResourceFamily::Texture => CanvasMessage::UndefineTexture { id: self.id },
        }
    }
}

fn check_elements(ndim: u8, count: usize) -> Result<(), ResourceError> {
    if !(1..=4).contains(&ndim) {
        return Err(ResourceError::BadNdim(ndim));
    }
    if count % usize::from(ndim) != 0 {
        return Err(ResourceError::Ragged { count, ndim });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use glint_proto::uc5;

    use super::*;

    // ── 1. id allocation ────────────────────────────────────────────

    #[test]
    fn ids_are_unique_and_ascending() {
        let a = Resource::program("v", "f");
        let b = Resource::index_u16(vec![0, 1, 2]);
        assert!(a.id().0 >= 1);
        assert!(b.id().0 > a.id().0);
    }

    // ── 2. payload validation ───────────────────────────────────────

    #[test]
    fn ragged_attributes_are_rejected() {
        assert_eq!(
            Resource::attr_f32(3, vec![0.0; 4]).unwrap_err(),
            ResourceError::Ragged { count: 4, ndim: 3 }
        );
        assert_eq!(
            Resource::attr_i32(0, vec![]).unwrap_err(),
            ResourceError::BadNdim(0)
        );
        assert_eq!(
            Resource::attr_f32(5, vec![0.0; 5]).unwrap_err(),
            ResourceError::BadNdim(5)
        );
        assert!(Resource::attr_f32(2, vec![0.0; 6]).is_ok());
    }

    #[test]
    fn texture_geometry_is_checked() {
        let flags = TextureFlags::default();
        assert!(Resource::texture(2, 2, 6, PixelEncoding::Rgb, flags, vec![0; 12]).is_ok());
        assert_eq!(
            Resource::texture(2, 2, 6, PixelEncoding::Rgb, flags, vec![0; 11]).unwrap_err(),
            ResourceError::TextureSize { got: 11, want: 12 }
        );
        assert_eq!(
            Resource::texture(2, 2, 5, PixelEncoding::Rgb, flags, vec![0; 10]).unwrap_err(),
            ResourceError::TextureStride {
                stride: 5,
                width: 2,
                encoding: PixelEncoding::Rgb,
            }
        );
    }

    // ── 3. define/undefine opcodes ──────────────────────────────────

    #[test]
    fn gray_textures_define_compressed() {
        let pixels: Vec<u8> = (0..64u8).map(|i| i / 8).collect();
        let tex = Resource::texture(
            8,
            8,
            8,
            PixelEncoding::Gray,
            TextureFlags(TextureFlags::MIN_LINEAR),
            pixels.clone(),
        )
        .unwrap();
        match tex.define_message() {
            CanvasMessage::DefineTexture {
                id,
                compression,
                bytes,
                encoding,
                flags,
                ..
            } => {
                assert_eq!(id, tex.id());
                assert_eq!(compression, Compression::Uc5);
                assert_eq!(encoding, PixelEncoding::Gray);
                assert_eq!(flags, TextureFlags(TextureFlags::MIN_LINEAR));
                assert_eq!(uc5::decompress(&bytes).unwrap(), pixels);
            }
            other => panic!("unexpected define: {other:?}"),
        }
    }

    #[test]
    fn color_textures_define_raw() {
        let pixels = vec![7u8; 2 * 2 * 4];
        let tex = Resource::texture(
            2,
            2,
            8,
            PixelEncoding::Rgba,
            TextureFlags::default(),
            pixels.clone(),
        )
        .unwrap();
        match tex.define_message() {
            CanvasMessage::DefineTexture {
                compression, bytes, ..
            } => {
                assert_eq!(compression, Compression::None);
                assert_eq!(bytes, pixels);
            }
            other => panic!("unexpected define: {other:?}"),
        }
    }

    #[test]
    fn undefine_picks_the_matching_kind() {
        let program = Resource::program("v", "f");
        let attr = Resource::attr_f32(2, vec![0.0, 1.0]).unwrap();
        let index = Resource::index_u16(vec![0]);
        let tex =
            Resource::texture(1, 1, 4, PixelEncoding::Rgba, TextureFlags::default(), vec![0; 4])
                .unwrap();
        assert_eq!(
            program.undefine_message(),
            CanvasMessage::UndefineProgram { id: program.id() }
        );
        assert_eq!(
            attr.undefine_message(),
            CanvasMessage::UndefineVertexAttribute { id: attr.id() }
        );
        assert_eq!(
            index.undefine_message(),
            CanvasMessage::UndefineIndexArray { id: index.id() }
        );
        assert_eq!(
            tex.undefine_message(),
            CanvasMessage::UndefineTexture { id: tex.id() }
        );
    }
}
