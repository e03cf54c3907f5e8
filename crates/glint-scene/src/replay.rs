// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Buffer command replay against a render port.

use glam::{DMat4, DVec3};
use glint_proto::command::{
    UNIFORM_EYE, UNIFORM_LINE_WIDTH, UNIFORM_LOOKAT, UNIFORM_MODEL, UNIFORM_PROJECTION,
    UNIFORM_VIEW,
};
use glint_proto::{BufferCommand, ProgramInvocation, ResourceFamily};
use tracing::warn;

use crate::port::RenderPort;
use crate::stacks::{mat4_from_row_major, EnableStack, MatrixStack};
use crate::store::ObjectStore;

/// Per-layer inputs to command replay.
#[derive(Debug, Clone, Copy)]
pub struct ReplayEnv {
    /// Projection matrix the camera produced for this layer.
    pub projection: DMat4,
    /// View matrix the camera produced for this layer.
    pub view: DMat4,
    /// Layer viewport `[x, y, w, h]` in pixels.
    pub viewport: [f32; 4],
    /// Camera eye position.
    pub eye: DVec3,
    /// Camera look-at target.
    pub lookat: DVec3,
    /// Base depth-test setting.
    pub depth_test: bool,
}

impl Default for ReplayEnv {
    fn default() -> Self {
        Self {
            projection: DMat4::IDENTITY,
            view: DMat4::IDENTITY,
            viewport: [0.0, 0.0, 0.0, 0.0],
            eye: DVec3::ZERO,
            lookat: DVec3::ZERO,
            depth_test: true,
        }
    }
}

/// Replay state shared by every buffer of one layer in one frame.
///
/// The transform stacks persist across buffers the way the wire format
/// expects: a buffer that pushes without popping leaves its marks on the
/// siblings drawn after it. The caller establishes the base depth-test
/// state on the port before the first buffer.
#[derive(Debug)]
pub struct ReplayState {
    env: ReplayEnv,
    projection: MatrixStack,
    view: MatrixStack,
    model: MatrixStack,
    depth: EnableStack,
}

impl ReplayState {
    /// Fresh stacks seeded from the layer's camera output.
    pub fn new(env: ReplayEnv) -> Self {
        Self {
            projection: MatrixStack::new(env.projection),
            view: MatrixStack::new(env.view),
            model: MatrixStack::identity(),
            depth: EnableStack::new(env.depth_test),
            env,
        }
    }

    /// The environment these stacks were seeded from.
    pub fn env(&self) -> &ReplayEnv {
        &self.env
    }

    /// Replay one buffer's commands against the port.
    ///
    /// Dangling resource references are logged and skipped; they never
    /// abort the rest of the stream.
    pub fn replay(
        &mut self,
        commands: &[BufferCommand],
        store: &ObjectStore,
        port: &mut dyn RenderPort,
    ) {
        for command in commands {
            match command {
                BufferCommand::ModelPush => self.model.push(),
                BufferCommand::ModelPop => {
                    self.model.pop();
                }
                BufferCommand::ModelMultiply(m) => self.model.multiply(mat4_from_row_major(m)),
                BufferCommand::PixcoordPush {
                    width_frac,
                    height_frac,
                    mode,
                } => {
                    let w = f64::from(self.env.viewport[2]);
                    let h = f64::from(self.env.viewport[3]);
                    self.projection.push();
                    self.view.push();
                    self.model.push();
                    self.projection
                        .set_top(DMat4::orthographic_rh_gl(0.0, w, 0.0, h, -1e8, 1e8));
                    self.view.set_top(DMat4::IDENTITY);
                    let anchor = DMat4::from_translation(DVec3::new(
                        w * f64::from(*width_frac),
                        h * f64::from(*height_frac),
                        0.0,
                    ));
                    let scale = DMat4::from_scale(DVec3::splat(mode.scale(w, h)));
                    self.model.set_top(anchor * scale);
                }
                BufferCommand::PixcoordPop => {
                    self.projection.pop();
                    self.view.pop();
                    self.model.pop();
                }
                BufferCommand::DepthTestPush(enabled) => {
                    self.depth.push();
                    self.depth.set_top(*enabled);
                    port.set_depth_test(*enabled);
                }
                BufferCommand::DepthTestPop => {
                    self.depth.pop();
                    port.set_depth_test(self.depth.top());
                }
                BufferCommand::Execute(exec) => self.execute(exec, store, port),
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)] // texture units stay in single digits
    fn execute(&self, exec: &ProgramInvocation, store: &ObjectStore, port: &mut dyn RenderPort) {
        if store
            .lookup(ResourceFamily::Program, exec.program)
            .is_none()
        {
            warn!(program = %exec.program, "execute references unknown program");
            return;
        }
        port.use_program(exec.program);

        for uniform in &exec.uniforms {
            if uniform.name == UNIFORM_LINE_WIDTH {
                port.set_line_width(uniform.values.first().copied().unwrap_or(1.0));
                continue;
            }
            if uniform.rows == uniform.cols && uniform.rows > 1 {
                // Square matrices travel row-major; the port wants columns.
                let n = usize::from(uniform.rows);
                let mut cols = vec![0.0_f32; n * n];
                for r in 0..n {
                    for c in 0..n {
                        if let Some(v) = uniform.values.get(r * n + c) {
                            cols[c * n + r] = *v;
                        }
                    }
                }
                port.set_uniform(&uniform.name, uniform.rows, uniform.cols, &cols);
            } else {
                port.set_uniform(&uniform.name, uniform.rows, uniform.cols, &uniform.values);
            }
        }

        for binding in &exec.attributes {
            if store
                .lookup(ResourceFamily::VertexAttribute, binding.resource)
                .is_some()
            {
                port.bind_attribute(&binding.name, binding.resource);
            } else {
                warn!(
                    attribute = binding.name,
                    resource = %binding.resource,
                    "attribute references unknown resource"
                );
            }
        }

        for (unit, binding) in exec.textures.iter().enumerate() {
            if store
                .lookup(ResourceFamily::Texture, binding.texture)
                .is_some()
            {
                port.bind_texture(&binding.sampler, unit as u32, binding.texture);
            } else {
                warn!(
                    sampler = binding.sampler,
                    resource = %binding.texture,
                    "sampler references unknown texture"
                );
            }
        }

        upload_mat4(port, UNIFORM_PROJECTION, self.projection.top());
        upload_mat4(port, UNIFORM_VIEW, self.view.top());
        upload_mat4(port, UNIFORM_MODEL, self.model.top());
        upload_vec3(port, UNIFORM_EYE, self.env.eye);
        upload_vec3(port, UNIFORM_LOOKAT, self.env.lookat);

        for draw in &exec.draws {
            match draw.indices {
                Some(indices) => {
                    if store
                        .lookup(ResourceFamily::IndexArray, indices)
                        .is_some()
                    {
                        port.draw_elements(draw.primitive, indices, draw.count);
                    } else {
                        warn!(resource = %indices, "draw references unknown index array");
                    }
                }
                None => port.draw_arrays(draw.primitive, draw.first, draw.count),
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation)] // narrowing to the GL float width
fn upload_mat4(port: &mut dyn RenderPort, name: &str, m: DMat4) {
    let cols = m.to_cols_array().map(|v| v as f32);
    port.set_uniform(name, 4, 4, &cols);
}

#[allow(clippy::cast_possible_truncation)] // narrowing to the GL float width
fn upload_vec3(port: &mut dyn RenderPort, name: &str, v: DVec3) {
    port.set_uniform(name, 3, 1, &[v.x as f32, v.y as f32, v.z as f32]);
}
