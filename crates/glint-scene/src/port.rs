// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Render port trait defining the GPU backend contract.

use std::collections::HashSet;

use glint_proto::{AttributeData, Primitive, ResourceFamily, ResourceId};
use thiserror::Error;

use crate::store::TextureImage;

/// Failure reported by a [`RenderPort`] backend.
#[derive(Debug, Error)]
pub enum PortError {
    /// The backend rejected a program's shader pair.
    #[error("[PORT_PROGRAM_LINK] program {id} failed to link: {reason}")]
    ProgramLink {
        /// Resource id of the rejected program.
        id: ResourceId,
        /// Backend-supplied diagnostic, e.g. a compile log.
        reason: String,
    },
}

/// Rendering backend port.
///
/// The scene store and replay engine drive a backend through this trait;
/// adapters wrap a real GPU API (WebGL, wgpu) or record calls for tests.
///
/// # Design
///
/// Calls arrive in draw order from a single thread. Backends own no scene
/// state beyond the uploaded resources: every frame restates viewport,
/// uniforms, and bindings, so an adapter never has to diff.
///
/// Matrix uniforms arrive column-major, already transposed from the wire's
/// row-major layout. Backends should silently ignore uniform and attribute
/// names the bound program does not declare; authored streams routinely
/// carry bindings only some shader variants use.
pub trait RenderPort {
    /// Compile and link a program from vertex and fragment source.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::ProgramLink`] when either shader fails to
    /// compile or the pair fails to link.
    fn create_program(
        &mut self,
        id: ResourceId,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<(), PortError>;

    /// Upload a vertex attribute array.
    fn upload_attribute(&mut self, id: ResourceId, data: &AttributeData);

    /// Upload a u16 index array.
    fn upload_index_array(&mut self, id: ResourceId, indices: &[u16]);

    /// Upload a decoded texture image.
    fn upload_texture(&mut self, id: ResourceId, image: &TextureImage);

    /// Release a previously uploaded resource.
    fn release(&mut self, family: ResourceFamily, id: ResourceId);

    /// Set the viewport and scissor rectangle, in pixels from bottom-left.
    fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32);

    /// Clear the scissored region to the given color.
    fn clear(&mut self, rgba: [f32; 4]);

    /// Enable or disable the depth test.
    fn set_depth_test(&mut self, enabled: bool);

    /// Bind a program for subsequent uniform uploads and draws.
    fn use_program(&mut self, id: ResourceId);

    /// Upload a uniform value to the bound program.
    ///
    /// `rows == cols` is a square matrix (column-major); `cols == 1` is a
    /// vector; `rows == cols == 1` is a scalar.
    fn set_uniform(&mut self, name: &str, rows: u8, cols: u8, values: &[f32]);

    /// Set the rasterizer line width.
    fn set_line_width(&mut self, width: f32);

    /// Bind a vertex attribute resource to a named shader input.
    fn bind_attribute(&mut self, name: &str, resource: ResourceId);

    /// Bind a texture to a sampler uniform on the given texture unit.
    fn bind_texture(&mut self, sampler: &str, unit: u32, texture: ResourceId);

    /// Draw unindexed vertices from the bound attributes.
    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32);

    /// Draw through an index array. Indexed draws always start at index zero.
    fn draw_elements(&mut self, primitive: Primitive, indices: ResourceId, count: u32);

    /// Read back the current framebuffer as tightly packed RGBA bytes.
    fn read_pixels(&mut self, width: u32, height: u32) -> Vec<u8>;
}

/// One recorded [`RenderPort`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOp {
    /// `create_program` succeeded.
    CreateProgram(ResourceId),
    /// `upload_attribute` call.
    UploadAttribute(ResourceId, AttributeData),
    /// `upload_index_array` call.
    UploadIndexArray(ResourceId, Vec<u16>),
    /// `upload_texture` call.
    UploadTexture(ResourceId, TextureImage),
    /// `release` call.
    Release(ResourceFamily, ResourceId),
    /// `set_viewport` call.
    SetViewport(f32, f32, f32, f32),
    /// `clear` call.
    Clear([f32; 4]),
    /// `set_depth_test` call.
    SetDepthTest(bool),
    /// `use_program` call.
    UseProgram(ResourceId),
    /// `set_uniform` call.
    SetUniform {
        /// Uniform name.
        name: String,
        /// Row count.
        rows: u8,
        /// Column count.
        cols: u8,
        /// Uploaded values.
        values: Vec<f32>,
    },
    /// `set_line_width` call.
    SetLineWidth(f32),
    /// `bind_attribute` call.
    BindAttribute(String, ResourceId),
    /// `bind_texture` call.
    BindTexture(String, u32, ResourceId),
    /// `draw_arrays` call.
    DrawArrays(Primitive, u32, u32),
    /// `draw_elements` call.
    DrawElements(Primitive, ResourceId, u32),
    /// `read_pixels` call.
    ReadPixels(u32, u32),
}

/// Recording backend for tests and headless runs.
///
/// Every call is appended to [`ops`](Self::ops); program creation can be
/// rigged to fail per id via [`fail_programs`](Self::fail_programs).
#[derive(Debug, Default)]
pub struct RecordingPort {
    /// Calls in arrival order.
    pub ops: Vec<RenderOp>,
    /// Program ids whose `create_program` should report a link failure.
    pub fail_programs: HashSet<ResourceId>,
}

impl RecordingPort {
    /// New empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded draw calls (arrays and elements), in order.
    pub fn draw_ops(&self) -> Vec<&RenderOp> {
        self.ops
            .iter()
            .filter(|op| matches!(op, RenderOp::DrawArrays(..) | RenderOp::DrawElements(..)))
            .collect()
    }

    /// Recorded uniform uploads with the given name, in order.
    pub fn uniform_ops(&self, name: &str) -> Vec<&RenderOp> {
        self.ops
            .iter()
            .filter(|op| matches!(op, RenderOp::SetUniform { name: n, .. } if n == name))
            .collect()
    }
}

impl RenderPort for RecordingPort {
    fn create_program(
        &mut self,
        id: ResourceId,
        _vertex_src: &str,
        _fragment_src: &str,
    ) -> Result<(), PortError> {
        if self.fail_programs.contains(&id) {
            return Err(PortError::ProgramLink {
                id,
                reason: "rigged link failure".to_owned(),
            });
        }
        self.ops.push(RenderOp::CreateProgram(id));
        Ok(())
    }

    fn upload_attribute(&mut self, id: ResourceId, data: &AttributeData) {
        self.ops.push(RenderOp::UploadAttribute(id, data.clone()));
    }

    fn upload_index_array(&mut self, id: ResourceId, indices: &[u16]) {
        self.ops.push(RenderOp::UploadIndexArray(id, indices.to_vec()));
    }

    fn upload_texture(&mut self, id: ResourceId, image: &TextureImage) {
        self.ops.push(RenderOp::UploadTexture(id, image.clone()));
    }

    fn release(&mut self, family: ResourceFamily, id: ResourceId) {
        self.ops.push(RenderOp::Release(family, id));
    }

    fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.ops.push(RenderOp::SetViewport(x, y, width, height));
    }

    fn clear(&mut self, rgba: [f32; 4]) {
        self.ops.push(RenderOp::Clear(rgba));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.ops.push(RenderOp::SetDepthTest(enabled));
    }

    fn use_program(&mut self, id: ResourceId) {
        self.ops.push(RenderOp::UseProgram(id));
    }

    fn set_uniform(&mut self, name: &str, rows: u8, cols: u8, values: &[f32]) {
        self.ops.push(RenderOp::SetUniform {
            name: name.to_owned(),
            rows,
            cols,
            values: values.to_vec(),
        });
    }

    fn set_line_width(&mut self, width: f32) {
        self.ops.push(RenderOp::SetLineWidth(width));
    }

    fn bind_attribute(&mut self, name: &str, resource: ResourceId) {
        self.ops
            .push(RenderOp::BindAttribute(name.to_owned(), resource));
    }

    fn bind_texture(&mut self, sampler: &str, unit: u32, texture: ResourceId) {
        self.ops
            .push(RenderOp::BindTexture(sampler.to_owned(), unit, texture));
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) {
        self.ops.push(RenderOp::DrawArrays(primitive, first, count));
    }

    fn draw_elements(&mut self, primitive: Primitive, indices: ResourceId, count: u32) {
        self.ops
            .push(RenderOp::DrawElements(primitive, indices, count));
    }

    fn read_pixels(&mut self, width: u32, height: u32) -> Vec<u8> {
        self.ops.push(RenderOp::ReadPixels(width, height));
        vec![0; (width * height * 4) as usize]
    }
}
