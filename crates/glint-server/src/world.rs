// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Shared authoring worlds.
//!
//! A world is a set of named buffers mutated from any number of application
//! tasks. Staged objects become visible only on [`World::swap`], which
//! serializes them into an immutable snapshot and notifies every layer
//! showing the world. Notification is a directive on the displaying
//! connection's queue; the connection task reads the published snapshot when
//! it gets there, so a slow client never blocks authoring.

use std::collections::HashMap;
use std::sync::Arc;

use glint_proto::{BufferCommand, CanvasMessage};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::connection::Directive;
use crate::object::{ResourceSet, SceneObject};

/// Immutable published content of one buffer.
#[derive(Debug)]
pub(crate) struct Snapshot {
    /// Decoded command stream.
    pub commands: Vec<BufferCommand>,
    /// Every resource the stream references.
    pub resources: ResourceSet,
}

#[derive(Debug, Default)]
struct BufferState {
    draw_order: f32,
    staged: Vec<SceneObject>,
    published: Option<Arc<Snapshot>>,
}

#[derive(Debug)]
struct Observer {
    layer: String,
    directives: mpsc::UnboundedSender<Directive>,
}

#[derive(Debug, Default)]
struct WorldState {
    buffers: HashMap<String, BufferState>,
    observers: Vec<Observer>,
}

impl WorldState {
    fn buffer_mut(&mut self, name: &str) -> &mut BufferState {
        self.buffers.entry(name.to_owned()).or_default()
    }

    /// Send one directive per attached layer, dropping dead observers.
    fn notify(&mut self, make: impl Fn(&str) -> Directive) {
        self.observers
            .retain(|observer| observer.directives.send(make(&observer.layer)).is_ok());
    }
}

/// Handle to a shared world; clones refer to the same state.
#[derive(Debug, Clone, Default)]
pub struct World {
    state: Arc<Mutex<WorldState>>,
}

impl World {
    /// New empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an object at the back of a buffer, creating the buffer on
    /// first touch. Staged content stays invisible until [`World::swap`].
    pub async fn add(&self, buffer: &str, object: SceneObject) {
        let mut state = self.state.lock().await;
        state.buffer_mut(buffer).staged.push(object);
    }

    /// Publish a buffer's staged content and notify every attached layer.
    ///
    /// The staged list drains into a fresh snapshot; the buffer is ready
    /// for the next round of [`World::add`] immediately.
    pub async fn swap(&self, buffer: &str) {
        let mut state = self.state.lock().await;
        let entry = state.buffer_mut(buffer);
        let mut commands = Vec::new();
        let mut resources = ResourceSet::new();
        for object in entry.staged.drain(..) {
            // Each staged group gets its own push/pop pair so transforms
            // cannot leak between groups.
            commands.push(BufferCommand::ModelPush);
            object.serialize(&mut commands, &mut resources);
            commands.push(BufferCommand::ModelPop);
        }
        entry.published = Some(Arc::new(Snapshot {
            commands,
            resources,
        }));
        self.notify_redraw(&mut state, buffer);
    }

    /// Set a buffer's paint-order key and re-send it to every attached
    /// layer so the change takes effect.
    pub async fn set_draw_order(&self, buffer: &str, draw_order: f32) {
        let mut state = self.state.lock().await;
        state.buffer_mut(buffer).draw_order = draw_order;
        self.notify_redraw(&mut state, buffer);
    }

    /// Remove a buffer everywhere it is shown. The layers survive.
    pub async fn destroy_buffer(&self, buffer: &str) {
        let mut state = self.state.lock().await;
        if state.buffers.remove(buffer).is_none() {
            debug!(buffer, "destroying a buffer that was never created");
            return;
        }
        state.notify(|layer| Directive::Destroy {
            layer: layer.to_owned(),
            buffer: buffer.to_owned(),
        });
    }

    /// Drive every layer showing this world to a new camera pose.
    pub async fn set_elu(&self, eye: [f64; 3], lookat: [f64; 3], up: [f64; 3], duration_ms: f32) {
        let mut state = self.state.lock().await;
        state.notify(|layer| {
            Directive::Canvas(CanvasMessage::SetElu {
                layer: layer.to_owned(),
                eye,
                lookat,
                up,
                duration_ms,
            })
        });
    }

    /// Subscribe a layer's connection to this world and replay whatever
    /// buffers already exist.
    pub(crate) async fn attach(&self, layer: &str, directives: &mpsc::UnboundedSender<Directive>) {
        let mut state = self.state.lock().await;
        state.observers.push(Observer {
            layer: layer.to_owned(),
            directives: directives.clone(),
        });
        let buffers: Vec<String> = state.buffers.keys().cloned().collect();
        for buffer in buffers {
            let directive = Directive::Redraw {
                layer: layer.to_owned(),
                buffer,
                world: self.clone(),
            };
            if directives.send(directive).is_err() {
                break;
            }
        }
    }

    /// Published snapshot and current draw order of a buffer, if any.
    pub(crate) async fn published(&self, buffer: &str) -> Option<(Arc<Snapshot>, f32)> {
        let state = self.state.lock().await;
        let entry = state.buffers.get(buffer)?;
        let snapshot = entry.published.as_ref()?;
        Some((Arc::clone(snapshot), entry.draw_order))
    }

    fn notify_redraw(&self, state: &mut WorldState, buffer: &str) {
        state.notify(|layer| Directive::Redraw {
            layer: layer.to_owned(),
            buffer: buffer.to_owned(),
            world: self.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use approx::assert_relative_eq;
    use glint_proto::Primitive;

    use super::*;
    use crate::object::DrawObject;
    use crate::resource::Resource;

    fn point_object() -> SceneObject {
        let program = Resource::program("v", "f");
        DrawObject::new(&program)
            .draw_arrays(Primitive::Points, 0, 1)
            .build()
    }

    fn observer() -> (mpsc::UnboundedSender<Directive>, mpsc::UnboundedReceiver<Directive>) {
        mpsc::unbounded_channel()
    }

    // ── 1. staging and publishing ───────────────────────────────────

    #[tokio::test]
    async fn staged_content_is_invisible_until_swap() {
        let world = World::new();
        world.add("points", point_object()).await;
        assert!(world.published("points").await.is_none());

        world.swap("points").await;
        let (snapshot, order) = world.published("points").await.unwrap();
        assert_relative_eq!(order, 0.0);
        assert_eq!(snapshot.resources.len(), 1);
        // push, execute, pop for the one staged group
        assert_eq!(snapshot.commands.len(), 3);
    }

    #[tokio::test]
    async fn each_staged_group_is_bracketed() {
        let world = World::new();
        world.add("b", point_object()).await;
        world.add("b", point_object()).await;
        world.swap("b").await;
        let (snapshot, _) = world.published("b").await.unwrap();
        let commands = &snapshot.commands;
        assert_eq!(commands.len(), 6);
        assert_eq!(commands[0], BufferCommand::ModelPush);
        assert_eq!(commands[2], BufferCommand::ModelPop);
        assert_eq!(commands[3], BufferCommand::ModelPush);
        assert_eq!(commands[5], BufferCommand::ModelPop);
    }

    #[tokio::test]
    async fn swap_replaces_the_snapshot_atomically() {
        let world = World::new();
        world.add("b", point_object()).await;
        world.swap("b").await;
        let (first, _) = world.published("b").await.unwrap();

        world.add("b", point_object()).await;
        world.add("b", point_object()).await;
        // Not yet swapped: old snapshot still current.
        let (still, _) = world.published("b").await.unwrap();
        assert_eq!(still.commands.len(), first.commands.len());

        world.swap("b").await;
        let (second, _) = world.published("b").await.unwrap();
        assert_eq!(second.commands.len(), 6);
    }

    // ── 2. observer notification ────────────────────────────────────

    #[tokio::test]
    async fn swap_notifies_every_attached_layer() {
        let world = World::new();
        let (tx_a, mut rx_a) = observer();
        let (tx_b, mut rx_b) = observer();
        world.attach("front", &tx_a).await;
        world.attach("rear", &tx_b).await;

        world.add("b", point_object()).await;
        world.swap("b").await;

        match rx_a.recv().await.unwrap() {
            Directive::Redraw { layer, buffer, .. } => {
                assert_eq!(layer, "front");
                assert_eq!(buffer, "b");
            }
            other => panic!("unexpected directive: {other:?}"),
        }
        assert!(matches!(
            rx_b.recv().await.unwrap(),
            Directive::Redraw { .. }
        ));
    }

    #[tokio::test]
    async fn attaching_replays_existing_buffers() {
        let world = World::new();
        world.add("pre", point_object()).await;
        world.swap("pre").await;

        let (tx, mut rx) = observer();
        world.attach("layer", &tx).await;
        match rx.recv().await.unwrap() {
            Directive::Redraw { buffer, .. } => assert_eq!(buffer, "pre"),
            other => panic!("unexpected directive: {other:?}"),
        }
    }

    #[tokio::test]
    async fn destroy_notifies_then_forgets() {
        let world = World::new();
        let (tx, mut rx) = observer();
        world.attach("layer", &tx).await;

        world.add("b", point_object()).await;
        world.swap("b").await;
        let _ = rx.recv().await.unwrap();

        world.destroy_buffer("b").await;
        match rx.recv().await.unwrap() {
            Directive::Destroy { layer, buffer } => {
                assert_eq!(layer, "layer");
                assert_eq!(buffer, "b");
            }
            other => panic!("unexpected directive: {other:?}"),
        }
        assert!(world.published("b").await.is_none());

        // Unknown buffer: logged, no directive.
        world.destroy_buffer("b").await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_observers_are_pruned() {
        let world = World::new();
        let (tx_dead, rx_dead) = observer();
        let (tx_live, mut rx_live) = observer();
        world.attach("dead", &tx_dead).await;
        world.attach("live", &tx_live).await;
        drop(rx_dead);

        world.add("b", point_object()).await;
        world.swap("b").await;
        world.swap("b").await;

        let mut seen = 0;
        while let Ok(directive) = rx_live.try_recv() {
            assert!(matches!(directive, Directive::Redraw { layer, .. } if layer == "live"));
            seen += 1;
        }
        assert_eq!(seen, 2);
    }

    #[tokio::test]
    async fn set_elu_targets_every_layer() {
        let world = World::new();
        let (tx, mut rx) = observer();
        world.attach("main", &tx).await;

        world
            .set_elu([0.0, 0.0, 50.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], 125.0)
            .await;
        match rx.recv().await.unwrap() {
            Directive::Canvas(CanvasMessage::SetElu {
                layer,
                eye,
                duration_ms,
                ..
            }) => {
                assert_eq!(layer, "main");
                assert_relative_eq!(eye[2], 50.0);
                assert_relative_eq!(duration_ms, 125.0);
            }
            other => panic!("unexpected directive: {other:?}"),
        }
    }
}
