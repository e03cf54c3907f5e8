// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Define-once resource store backing command replay.

use std::collections::HashMap;

use glint_proto::uc5::{self, Uc5Error};
use glint_proto::{
    AttributeData, Compression, PixelEncoding, ResourceFamily, ResourceId, ResourceKind,
    TextureFlags,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::port::{PortError, RenderPort};

/// Decoded texture ready for backend upload.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bytes per row.
    pub stride: u32,
    /// Pixel layout.
    pub encoding: PixelEncoding,
    /// Sampling and wrap flags.
    pub flags: TextureFlags,
    /// Raw pixel bytes, `height * stride` long.
    pub bytes: Vec<u8>,
}

/// Texture payload as received, before decompression.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureUpload {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bytes per row of the decoded image.
    pub stride: u32,
    /// Pixel layout.
    pub encoding: PixelEncoding,
    /// Sampling and wrap flags.
    pub flags: TextureFlags,
    /// Compression applied to `bytes`.
    pub compression: Compression,
    /// Payload bytes, compressed or raw per `compression`.
    pub bytes: Vec<u8>,
}

/// Payload retained for a defined resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourcePayload {
    /// Shader source pair of a linked program.
    Program {
        /// Vertex shader source.
        vertex_src: String,
        /// Fragment shader source.
        fragment_src: String,
    },
    /// Vertex attribute array.
    Attribute(AttributeData),
    /// Index array.
    IndexArray(Vec<u16>),
    /// Decoded texture.
    Texture(TextureImage),
}

/// Definition failure surfaced to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected the program; the id stays undefined.
    #[error("[STORE_PROGRAM_LINK] program {id} was not defined")]
    ProgramLink {
        /// Resource id of the rejected program.
        id: ResourceId,
        /// Backend diagnostic.
        #[source]
        source: PortError,
    },
    /// The texture payload could not be decoded; the id stays undefined.
    #[error("[STORE_TEXTURE_PAYLOAD] texture {id} payload is undecodable")]
    TexturePayload {
        /// Resource id of the rejected texture.
        id: ResourceId,
        /// Decoder diagnostic.
        #[source]
        source: Uc5Error,
    },
}

#[derive(Debug, Clone)]
struct StoredResource {
    kind: ResourceKind,
    payload: ResourcePayload,
}

/// Resources defined by the server, keyed by id.
///
/// Definitions are idempotent: a second define of a live id is a no-op and
/// the first payload wins. The server's reference counting guarantees an
/// undefine arrives before any redefinition with new content.
#[derive(Debug, Default)]
pub struct ObjectStore {
    resources: HashMap<ResourceId, StoredResource>,
}

impl ObjectStore {
    /// New empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the store holds no resources.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Whether `id` is defined, regardless of kind.
    pub fn contains(&self, id: ResourceId) -> bool {
        self.resources.contains_key(&id)
    }

    /// Kind of a live resource.
    pub fn kind_of(&self, id: ResourceId) -> Option<ResourceKind> {
        self.resources.get(&id).map(|r| r.kind)
    }

    /// Payload of a live resource, checked against the expected family.
    ///
    /// A family mismatch is treated as a miss: dangling references are
    /// tolerated everywhere downstream, so a lookup never aborts a frame.
    pub fn lookup(&self, family: ResourceFamily, id: ResourceId) -> Option<&ResourcePayload> {
        let stored = self.resources.get(&id)?;
        if stored.kind.family() == family {
            Some(&stored.payload)
        } else {
            warn!(
                %id,
                expected = %family,
                actual = %stored.kind.family(),
                "resource family mismatch"
            );
            None
        }
    }

    /// Define a program, compiling it on the backend.
    ///
    /// Returns `Ok(false)` when the id is already live.
    ///
    /// # Errors
    ///
    /// [`StoreError::ProgramLink`] when the backend rejects the shader
    /// pair; the id stays undefined so a corrected retry can succeed.
    pub fn define_program(
        &mut self,
        port: &mut dyn RenderPort,
        id: ResourceId,
        vertex_src: String,
        fragment_src: String,
    ) -> Result<bool, StoreError> {
        if self.already_defined(id, ResourceKind::Program) {
            return Ok(false);
        }
        port.create_program(id, &vertex_src, &fragment_src)
            .map_err(|source| StoreError::ProgramLink { id, source })?;
        self.resources.insert(
            id,
            StoredResource {
                kind: ResourceKind::Program,
                payload: ResourcePayload::Program {
                    vertex_src,
                    fragment_src,
                },
            },
        );
        Ok(true)
    }

    /// Define a vertex attribute array. Returns `false` when already live.
    pub fn define_attribute(
        &mut self,
        port: &mut dyn RenderPort,
        id: ResourceId,
        data: AttributeData,
    ) -> bool {
        let kind = match data {
            AttributeData::F32 { .. } => ResourceKind::AttrF32,
            AttributeData::I32 { .. } => ResourceKind::AttrI32,
        };
        if self.already_defined(id, kind) {
            return false;
        }
        port.upload_attribute(id, &data);
        self.resources.insert(
            id,
            StoredResource {
                kind,
                payload: ResourcePayload::Attribute(data),
            },
        );
        true
    }

    /// Define a u16 index array. Returns `false` when already live.
    pub fn define_index_array(
        &mut self,
        port: &mut dyn RenderPort,
        id: ResourceId,
        indices: Vec<u16>,
    ) -> bool {
        if self.already_defined(id, ResourceKind::IndexU16) {
            return false;
        }
        port.upload_index_array(id, &indices);
        self.resources.insert(
            id,
            StoredResource {
                kind: ResourceKind::IndexU16,
                payload: ResourcePayload::IndexArray(indices),
            },
        );
        true
    }

    /// Define a texture, decompressing the payload first.
    ///
    /// Returns `Ok(false)` when the id is already live. A short
    /// decompressor output is tolerated: the missing tail is zero-filled
    /// and the texture is defined anyway.
    ///
    /// # Errors
    ///
    /// [`StoreError::TexturePayload`] when the compressed payload is
    /// structurally invalid; the id stays undefined.
    pub fn define_texture(
        &mut self,
        port: &mut dyn RenderPort,
        id: ResourceId,
        upload: TextureUpload,
    ) -> Result<bool, StoreError> {
        let kind = match upload.encoding {
            PixelEncoding::Rgba => ResourceKind::TextureRgba,
            PixelEncoding::Rgb => ResourceKind::TextureRgb,
            PixelEncoding::Gray => ResourceKind::TextureGray,
        };
        if self.already_defined(id, kind) {
            return Ok(false);
        }
        let bytes = match upload.compression {
            Compression::None => upload.bytes,
            Compression::Uc5 => match uc5::decompress(&upload.bytes) {
                Ok(bytes) => bytes,
                Err(Uc5Error::ShortOutput {
                    declared,
                    produced,
                    partial,
                }) => {
                    warn!(%id, declared, produced, "texture payload ended early, zero-filling");
                    let mut bytes = partial;
                    bytes.resize(declared, 0);
                    bytes
                }
                Err(source) => return Err(StoreError::TexturePayload { id, source }),
            },
        };
        let image = TextureImage {
            width: upload.width,
            height: upload.height,
            stride: upload.stride,
            encoding: upload.encoding,
            flags: upload.flags,
            bytes,
        };
        port.upload_texture(id, &image);
        self.resources.insert(
            id,
            StoredResource {
                kind,
                payload: ResourcePayload::Texture(image),
            },
        );
        Ok(true)
    }

    /// Undefine a resource, releasing it on the backend.
    ///
    /// Absent ids and family mismatches are logged and ignored; returns
    /// whether a resource was actually removed.
    pub fn undefine(
        &mut self,
        port: &mut dyn RenderPort,
        family: ResourceFamily,
        id: ResourceId,
    ) -> bool {
        match self.resources.get(&id) {
            None => {
                warn!(%id, %family, "undefine of unknown resource");
                false
            }
            Some(stored) if stored.kind.family() != family => {
                warn!(
                    %id,
                    expected = %family,
                    actual = %stored.kind.family(),
                    "undefine family mismatch, keeping resource"
                );
                false
            }
            Some(_) => {
                port.release(family, id);
                self.resources.remove(&id);
                true
            }
        }
    }

    fn already_defined(&self, id: ResourceId, kind: ResourceKind) -> bool {
        match self.resources.get(&id) {
            None => false,
            Some(stored) => {
                if stored.kind == kind {
                    debug!(%id, "redefinition ignored, first payload wins");
                } else {
                    warn!(
                        %id,
                        live = ?stored.kind,
                        incoming = ?kind,
                        "redefinition under a different kind ignored"
                    );
                }
                true
            }
        }
    }
}
