// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Composable scene objects.
//!
//! Authoring code builds trees out of transform chains, overlay and
//! depth-test wrappers, and draw objects, then stages them into world
//! buffers. Serialization flattens a tree into the buffer command stream
//! and collects every resource the stream references so the connection can
//! refcount them.

use std::collections::BTreeMap;
use std::sync::Arc;

use glint_proto::{
    AttributeBinding, BufferCommand, DrawCall, PixcoordMode, Primitive, ProgramInvocation,
    ResourceId, TextureBinding, UniformBinding,
};
use tracing::warn;

use crate::resource::{Resource, ResourceData};

/// Resources referenced by a serialized stream, keyed by id.
pub(crate) type ResourceSet = BTreeMap<ResourceId, Arc<Resource>>;

/// Where the pixel-coordinate origin lands in the viewport.
///
/// X grows right and Y up regardless of the anchor, so content under a
/// `Top*` origin needs negative Y coordinates to stay on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixcoordOrigin {
    /// Origin at the lower-left corner.
    BottomLeft,
    /// Origin at the middle of the bottom edge.
    Bottom,
    /// Origin at the lower-right corner.
    BottomRight,
    /// Origin at the middle of the left edge.
    Left,
    /// Origin at the viewport center.
    Center,
    /// Origin at the middle of the right edge.
    Right,
    /// Origin at the upper-left corner.
    TopLeft,
    /// Origin at the middle of the top edge.
    Top,
    /// Origin at the upper-right corner.
    TopRight,
}

impl PixcoordOrigin {
    /// Anchor point as fractions of viewport width and height.
    pub fn fracs(self) -> (f32, f32) {
        match self {
            Self::BottomLeft => (0.0, 0.0),
            Self::Bottom => (0.5, 0.0),
            Self::BottomRight => (1.0, 0.0),
            Self::Left => (0.0, 0.5),
            Self::Center => (0.5, 0.5),
            Self::Right => (1.0, 0.5),
            Self::TopLeft => (0.0, 1.0),
            Self::Top => (0.5, 1.0),
            Self::TopRight => (1.0, 1.0),
        }
    }
}

/// One node of authored scene content.
#[derive(Debug, Clone)]
pub enum SceneObject {
    /// Children drawn inside one model push/pop pair. A [`Matrix`] child
    /// affects the siblings that follow it, and nothing outside the chain.
    ///
    /// [`Matrix`]: SceneObject::Matrix
    Chain(Vec<SceneObject>),
    /// Right-multiplies the model matrix for the rest of the enclosing
    /// group. Row-major.
    Matrix([f64; 16]),
    /// Children drawn in the pixel-coordinate overlay space.
    Pixcoords {
        /// Where the origin lands in the viewport.
        origin: PixcoordOrigin,
        /// How overlay units map to pixels.
        mode: PixcoordMode,
        /// Content drawn inside the overlay.
        children: Vec<SceneObject>,
    },
    /// Children drawn with depth testing forced on or off.
    DepthTest {
        /// Depth-test setting while the children draw.
        enabled: bool,
        /// Wrapped content.
        children: Vec<SceneObject>,
    },
    /// One program invocation.
    Draw(DrawObject),
}

impl SceneObject {
    /// Group `objects` under one model push/pop pair.
    pub fn chain(objects: Vec<SceneObject>) -> Self {
        Self::Chain(objects)
    }

    /// Multiply by an arbitrary row-major matrix.
    pub fn matrix(row_major: [f64; 16]) -> Self {
        Self::Matrix(row_major)
    }

    /// Translate by `(tx, ty, tz)`.
    #[rustfmt::skip]
    pub fn translate(tx: f64, ty: f64, tz: f64) -> Self {
        Self::Matrix([
            1.0, 0.0, 0.0, tx,
            0.0, 1.0, 0.0, ty,
            0.0, 0.0, 1.0, tz,
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    /// Scale uniformly by `s`.
    pub fn scale(s: f64) -> Self {
        Self::scale3(s, s, s)
    }

    /// Scale each axis independently.
    #[rustfmt::skip]
    pub fn scale3(sx: f64, sy: f64, sz: f64) -> Self {
        Self::Matrix([
            sx, 0.0, 0.0, 0.0,
            0.0, sy, 0.0, 0.0,
            0.0, 0.0, sz, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    /// Rotate about the X axis by `rad`.
    #[rustfmt::skip]
    pub fn rotate_x(rad: f64) -> Self {
        let (s, c) = rad.sin_cos();
        Self::Matrix([
            1.0, 0.0, 0.0, 0.0,
            0.0, c,   -s,  0.0,
            0.0, s,   c,   0.0,
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    /// Rotate about the Y axis by `rad`.
    #[rustfmt::skip]
    pub fn rotate_y(rad: f64) -> Self {
        let (s, c) = rad.sin_cos();
        Self::Matrix([
            c,   0.0, s,   0.0,
            0.0, 1.0, 0.0, 0.0,
            -s,  0.0, c,   0.0,
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    /// Rotate about the Z axis by `rad`.
    #[rustfmt::skip]
    pub fn rotate_z(rad: f64) -> Self {
        let (s, c) = rad.sin_cos();
        Self::Matrix([
            c,   -s,  0.0, 0.0,
            s,   c,   0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    /// Draw `children` in pixel-coordinate overlay space anchored at
    /// `origin` and scaled per `mode`.
    pub fn pixcoords(
        origin: PixcoordOrigin,
        mode: PixcoordMode,
        children: Vec<SceneObject>,
    ) -> Self {
        Self::Pixcoords {
            origin,
            mode,
            children,
        }
    }

    /// Draw `children` with depth testing forced to `enabled`.
    pub fn depth_test(enabled: bool, children: Vec<SceneObject>) -> Self {
        Self::DepthTest { enabled, children }
    }

    /// Flatten into buffer commands, registering referenced resources.
    pub(crate) fn serialize(&self, out: &mut Vec<BufferCommand>, resources: &mut ResourceSet) {
        match self {
            Self::Chain(children) => {
                out.push(BufferCommand::ModelPush);
                for child in children {
                    child.serialize(out, resources);
                }
                out.push(BufferCommand::ModelPop);
            }
            Self::Matrix(m) => out.push(BufferCommand::ModelMultiply(*m)),
            Self::Pixcoords {
                origin,
                mode,
                children,
            } => {
                let (width_frac, height_frac) = origin.fracs();
                out.push(BufferCommand::ModelPush);
                out.push(BufferCommand::PixcoordPush {
                    width_frac,
                    height_frac,
                    mode: *mode,
                });
                for child in children {
                    child.serialize(out, resources);
                }
                out.push(BufferCommand::PixcoordPop);
                out.push(BufferCommand::ModelPop);
            }
            Self::DepthTest { enabled, children } => {
                out.push(BufferCommand::ModelPush);
                out.push(BufferCommand::DepthTestPush(*enabled));
                for child in children {
                    child.serialize(out, resources);
                }
                out.push(BufferCommand::DepthTestPop);
                out.push(BufferCommand::ModelPop);
            }
            Self::Draw(draw) => draw.serialize(out, resources),
        }
    }
}

impl From<DrawObject> for SceneObject {
    fn from(draw: DrawObject) -> Self {
        Self::Draw(draw)
    }
}

/// A program invocation under construction.
///
/// Bindings hold their resources by [`Arc`]; serialization writes the ids
/// into the stream and registers the resources for connection refcounting.
/// Binding a resource of the wrong kind is logged and sent anyway — the
/// client logs the dangling reference and skips the draw.
#[derive(Debug, Clone)]
pub struct DrawObject {
    program: Arc<Resource>,
    uniforms: Vec<UniformBinding>,
    attributes: Vec<(String, Arc<Resource>)>,
    textures: Vec<(String, Arc<Resource>)>,
    draws: Vec<Draw>,
}

#[derive(Debug, Clone)]
struct Draw {
    indices: Option<Arc<Resource>>,
    primitive: Primitive,
    first: u32,
    count: u32,
}

impl DrawObject {
    /// Start a draw object executing `program`.
    pub fn new(program: &Arc<Resource>) -> Self {
        if !matches!(program.data(), ResourceData::Program { .. }) {
            warn!(id = %program.id(), family = %program.family(), "program slot bound to a non-program resource");
        }
        Self {
            program: Arc::clone(program),
            uniforms: Vec::new(),
            attributes: Vec::new(),
            textures: Vec::new(),
            draws: Vec::new(),
        }
    }

    /// Upload a `rows`×`cols` float uniform (row-major values).
    pub fn uniform(mut self, name: &str, rows: u8, cols: u8, values: &[f32]) -> Self {
        if usize::from(rows) * usize::from(cols) != values.len() {
            warn!(
                name,
                rows,
                cols,
                got = values.len(),
                "uniform value count disagrees with its shape"
            );
        }
        self.uniforms.push(UniformBinding {
            name: name.to_owned(),
            rows,
            cols,
            values: values.to_vec(),
        });
        self
    }

    /// Feed a vertex attribute resource to the shader input `name`.
    pub fn attribute(mut self, name: &str, resource: &Arc<Resource>) -> Self {
        if !matches!(resource.data(), ResourceData::Attribute(_)) {
            warn!(name, id = %resource.id(), family = %resource.family(), "attribute slot bound to a non-attribute resource");
        }
        self.attributes.push((name.to_owned(), Arc::clone(resource)));
        self
    }

    /// Bind a texture resource to the sampler uniform `sampler`.
    pub fn texture(mut self, sampler: &str, resource: &Arc<Resource>) -> Self {
        if !matches!(resource.data(), ResourceData::Texture(_)) {
            warn!(sampler, id = %resource.id(), family = %resource.family(), "sampler slot bound to a non-texture resource");
        }
        self.textures.push((sampler.to_owned(), Arc::clone(resource)));
        self
    }

    /// Issue a non-indexed draw of `count` vertices starting at `first`.
    pub fn draw_arrays(mut self, primitive: Primitive, first: u32, count: u32) -> Self {
        self.draws.push(Draw {
            indices: None,
            primitive,
            first,
            count,
        });
        self
    }

    /// Issue an indexed draw of `count` elements through `indices`.
    pub fn draw_elements(mut self, indices: &Arc<Resource>, primitive: Primitive, count: u32) -> Self {
        if !matches!(indices.data(), ResourceData::IndexArray(_)) {
            warn!(id = %indices.id(), family = %indices.family(), "index slot bound to a non-index resource");
        }
        self.draws.push(Draw {
            indices: Some(Arc::clone(indices)),
            primitive,
            first: 0,
            count,
        });
        self
    }

    /// Finish building.
    pub fn build(self) -> SceneObject {
        SceneObject::Draw(self)
    }

    fn serialize(&self, out: &mut Vec<BufferCommand>, resources: &mut ResourceSet) {
        register(resources, &self.program);
        let attributes = self
            .attributes
            .iter()
            .map(|(name, resource)| {
                register(resources, resource);
                AttributeBinding {
                    name: name.clone(),
                    resource: resource.id(),
                }
            })
            .collect();
        let textures = self
            .textures
            .iter()
            .map(|(sampler, resource)| {
                register(resources, resource);
                TextureBinding {
                    sampler: sampler.clone(),
                    texture: resource.id(),
                }
            })
            .collect();
        let draws = self
            .draws
            .iter()
            .map(|draw| {
                let indices = draw.indices.as_ref().map(|indices| {
                    register(resources, indices);
                    indices.id()
                });
                DrawCall {
                    indices,
                    primitive: draw.primitive,
                    first: draw.first,
                    count: draw.count,
                }
            })
            .collect();
        out.push(BufferCommand::Execute(ProgramInvocation {
            program: self.program.id(),
            uniforms: self.uniforms.clone(),
            attributes,
            textures,
            draws,
        }));
    }
}

fn register(resources: &mut ResourceSet, resource: &Arc<Resource>) {
    resources
        .entry(resource.id())
        .or_insert_with(|| Arc::clone(resource));
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use std::f64::consts::FRAC_PI_2;

    use approx::assert_relative_eq;
    use glint_proto::{PixelEncoding, TextureFlags};

    use super::*;

    fn flatten(object: &SceneObject) -> (Vec<BufferCommand>, ResourceSet) {
        let mut out = Vec::new();
        let mut resources = ResourceSet::new();
        object.serialize(&mut out, &mut resources);
        (out, resources)
    }

    // ── 1. wrapper bracketing ───────────────────────────────────────

    #[test]
    fn a_chain_brackets_its_children() {
        let program = Resource::program("v", "f");
        let object = SceneObject::chain(vec![
            SceneObject::translate(1.0, 2.0, 3.0),
            DrawObject::new(&program).draw_arrays(Primitive::Points, 0, 1).build(),
        ]);
        let (out, _) = flatten(&object);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], BufferCommand::ModelPush);
        assert!(matches!(out[1], BufferCommand::ModelMultiply(_)));
        assert!(matches!(out[2], BufferCommand::Execute(_)));
        assert_eq!(out[3], BufferCommand::ModelPop);
    }

    #[test]
    fn pixcoords_nests_inside_a_model_pair() {
        let object = SceneObject::pixcoords(PixcoordOrigin::Bottom, PixcoordMode::Min, vec![]);
        let (out, _) = flatten(&object);
        assert_eq!(
            out,
            vec![
                BufferCommand::ModelPush,
                BufferCommand::PixcoordPush {
                    width_frac: 0.5,
                    height_frac: 0.0,
                    mode: PixcoordMode::Min,
                },
                BufferCommand::PixcoordPop,
                BufferCommand::ModelPop,
            ]
        );
    }

    #[test]
    fn depth_test_nests_inside_a_model_pair() {
        let object = SceneObject::depth_test(false, vec![]);
        let (out, _) = flatten(&object);
        assert_eq!(
            out,
            vec![
                BufferCommand::ModelPush,
                BufferCommand::DepthTestPush(false),
                BufferCommand::DepthTestPop,
                BufferCommand::ModelPop,
            ]
        );
    }

    // ── 2. matrix helpers ───────────────────────────────────────────

    #[test]
    fn translate_lands_in_the_fourth_column() {
        let SceneObject::Matrix(m) = SceneObject::translate(1.0, 2.0, 3.0) else {
            panic!("not a matrix");
        };
        assert_relative_eq!(m[3], 1.0);
        assert_relative_eq!(m[7], 2.0);
        assert_relative_eq!(m[11], 3.0);
        assert_relative_eq!(m[15], 1.0);
    }

    #[test]
    fn rotate_z_is_right_handed() {
        let SceneObject::Matrix(m) = SceneObject::rotate_z(FRAC_PI_2) else {
            panic!("not a matrix");
        };
        // x-hat maps to y-hat: column 0 becomes (0, 1, 0).
        assert_relative_eq!(m[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(m[4], 1.0);
        assert_relative_eq!(m[1], -1.0);
    }

    #[test]
    fn scale_is_uniform() {
        let SceneObject::Matrix(m) = SceneObject::scale(2.5) else {
            panic!("not a matrix");
        };
        assert_relative_eq!(m[0], 2.5);
        assert_relative_eq!(m[5], 2.5);
        assert_relative_eq!(m[10], 2.5);
        assert_relative_eq!(m[15], 1.0);
    }

    // ── 3. draw objects and resource collection ─────────────────────

    #[test]
    fn a_draw_object_collects_every_referenced_resource() {
        let program = Resource::program("v", "f");
        let position = Resource::attr_f32(3, vec![0.0; 9]).unwrap();
        let indices = Resource::index_u16(vec![0, 1, 2]);
        let tex = Resource::texture(
            1,
            1,
            4,
            PixelEncoding::Rgba,
            TextureFlags::default(),
            vec![0; 4],
        )
        .unwrap();
        let object = DrawObject::new(&program)
            .uniform("rgba", 4, 1, &[1.0, 0.0, 0.0, 1.0])
            .attribute("position", &position)
            .texture("texture", &tex)
            .draw_elements(&indices, Primitive::Triangles, 3)
            .build();
        let (out, resources) = flatten(&object);

        let BufferCommand::Execute(invocation) = &out[0] else {
            panic!("not an execute");
        };
        assert_eq!(invocation.program, program.id());
        assert_eq!(invocation.uniforms[0].name, "rgba");
        assert_eq!(invocation.attributes[0].resource, position.id());
        assert_eq!(invocation.textures[0].texture, tex.id());
        assert_eq!(invocation.draws[0].indices, Some(indices.id()));
        assert_eq!(invocation.draws[0].count, 3);

        let ids: Vec<_> = resources.keys().copied().collect();
        assert_eq!(resources.len(), 4);
        for id in [program.id(), position.id(), indices.id(), tex.id()] {
            assert!(ids.contains(&id));
        }
    }

    #[test]
    fn shared_resources_register_once() {
        let program = Resource::program("v", "f");
        let position = Resource::attr_f32(2, vec![0.0; 4]).unwrap();
        let object = SceneObject::chain(vec![
            DrawObject::new(&program)
                .attribute("position", &position)
                .draw_arrays(Primitive::Lines, 0, 2)
                .build(),
            DrawObject::new(&program)
                .attribute("position", &position)
                .draw_arrays(Primitive::Points, 0, 2)
                .build(),
        ]);
        let (_, resources) = flatten(&object);
        assert_eq!(resources.len(), 2);
    }
}
