// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! End-to-end loop: a world authored here, published through a session and
//! applied by the client runtime, must land in the client's store and
//! registry exactly as authored — and client reports must come back.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use glint_client::Canvas;
use glint_proto::{
    AttributeData, CanvasMessage, ClientMessage, FrameReader, PixelEncoding, Primitive,
    ResourceFamily, TextureFlags,
};
use glint_scene::{RecordingPort, RenderOp, ResourcePayload};
use glint_server::{CanvasSession, DrawObject, Resource, SceneObject, World};
use tokio::sync::mpsc;
use tokio::time::timeout;

const QUIET: Duration = Duration::from_millis(50);
const KEEPALIVE: Duration = Duration::from_secs(600);

const VERTEX_SRC: &str = "attribute vec3 position;\n\
     uniform mat4 VX_P;\n\
     uniform mat4 VX_V;\n\
     uniform mat4 VX_M;\n\
     void main(void) {\n\
         gl_Position = VX_P * VX_V * VX_M * vec4(position, 1.0);\n\
     }\n";

const FRAGMENT_SRC: &str = "precision mediump float;\n\
     uniform vec4 rgba;\n\
     void main(void) {\n\
         gl_FragColor = rgba;\n\
     }\n";

/// Collect raw frames until the session pump goes quiet.
async fn drain(rx: &mut mpsc::UnboundedReceiver<Vec<u8>>) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    while let Ok(Some(frame)) = timeout(QUIET, rx.recv()).await {
        frames.push(frame);
    }
    frames
}

/// Decode the one message a server frame carries.
fn decode(frame: &[u8]) -> CanvasMessage {
    let mut reader = FrameReader::new(frame).unwrap();
    let message = reader.next().unwrap().unwrap();
    assert!(reader.next().is_none(), "one opcode per frame");
    message
}

#[tokio::test]
async fn authored_scene_round_trips_to_a_client() {
    let world = World::new();
    let program = Resource::program(VERTEX_SRC, FRAGMENT_SRC);
    let position = Resource::attr_f32(
        3,
        vec![-1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 0.0, 1.0, 0.0],
    )
    .unwrap();
    let indices = Resource::index_u16(vec![0, 1, 2]);
    let gray: Vec<u8> = (0..16u8).map(|i| i * 16).collect();
    let tex = Resource::texture(
        4,
        4,
        4,
        PixelEncoding::Gray,
        TextureFlags(TextureFlags::MIN_LINEAR),
        gray.clone(),
    )
    .unwrap();

    world.set_draw_order("model", 2.5).await;
    world
        .add(
            "model",
            SceneObject::chain(vec![
                SceneObject::translate(0.0, 0.0, -1.0),
                DrawObject::new(&program)
                    .uniform("rgba", 4, 1, &[0.2, 0.8, 0.2, 1.0])
                    .attribute("position", &position)
                    .texture("texture", &tex)
                    .draw_elements(&indices, Primitive::Triangles, 3)
                    .build(),
            ]),
        )
        .await;

    let (session, mut rx) = CanvasSession::new(KEEPALIVE);
    session.layer("default").set_world(&world).await;
    world.swap("model").await;

    let mut canvas = Canvas::new(RecordingPort::new(), 320, 240);
    for frame in drain(&mut rx).await {
        assert!(canvas.apply_frame(&frame, 0).is_empty());
    }

    // Resources arrived under the authored ids.
    let store = canvas.store();
    match store.lookup(ResourceFamily::Program, program.id()) {
        Some(ResourcePayload::Program {
            vertex_src,
            fragment_src,
        }) => {
            assert_eq!(vertex_src, VERTEX_SRC);
            assert_eq!(fragment_src, FRAGMENT_SRC);
        }
        other => panic!("program did not arrive: {other:?}"),
    }
    match store.lookup(ResourceFamily::VertexAttribute, position.id()) {
        Some(ResourcePayload::Attribute(AttributeData::F32 { ndim: 3, values })) => {
            assert_eq!(values.len(), 9);
        }
        other => panic!("attribute did not arrive: {other:?}"),
    }
    match store.lookup(ResourceFamily::IndexArray, indices.id()) {
        Some(ResourcePayload::IndexArray(elements)) => assert_eq!(elements, &vec![0, 1, 2]),
        other => panic!("index array did not arrive: {other:?}"),
    }
    match store.lookup(ResourceFamily::Texture, tex.id()) {
        Some(ResourcePayload::Texture(image)) => {
            // The single-channel payload was compressed in flight and
            // decompressed on arrival.
            assert_eq!(image.width, 4);
            assert_eq!(image.bytes, gray);
        }
        other => panic!("texture did not arrive: {other:?}"),
    }

    // The buffer landed on the right layer with its draw order.
    let layer = canvas.registry().layer("default").unwrap();
    let buffer = layer.buffer("model").unwrap();
    assert!((buffer.draw_order - 2.5).abs() < f32::EPSILON);
    assert!(buffer.visible);

    // A frame renders the authored draw against the backend.
    canvas.render_frame(16);
    let ops = &canvas.port().ops;
    assert!(ops.contains(&RenderOp::UseProgram(program.id())));
    assert!(ops.contains(&RenderOp::DrawElements(
        Primitive::Triangles,
        indices.id(),
        3
    )));
    assert!(ops
        .iter()
        .any(|op| matches!(op, RenderOp::BindTexture(sampler, _, id)
            if sampler == "texture" && *id == tex.id())));

    // And the draw report crosses back to the authoring side.
    let draws = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&draws);
    session
        .add_event_handler(0, move |message| {
            if matches!(message, ClientMessage::Draw) {
                *sink.lock().unwrap() += 1;
            }
            false
        })
        .await;
    for message in canvas.take_outgoing() {
        session.handle_frame(&message.encode()).await;
    }
    assert_eq!(*draws.lock().unwrap(), 1);
}

#[tokio::test]
async fn a_shrunken_publish_undefines_exactly_once() {
    let world = World::new();
    let program = Resource::program(VERTEX_SRC, FRAGMENT_SRC);
    let position = Resource::attr_f32(2, vec![0.0; 8]).unwrap();
    let extra = Resource::attr_f32(2, vec![1.0; 8]).unwrap();

    let (session, mut rx) = CanvasSession::new(KEEPALIVE);
    session.layer("default").set_world(&world).await;

    world
        .add(
            "b",
            DrawObject::new(&program)
                .attribute("position", &position)
                .attribute("offset", &extra)
                .draw_arrays(Primitive::Points, 0, 4)
                .build(),
        )
        .await;
    world.swap("b").await;

    let mut canvas = Canvas::new(RecordingPort::new(), 320, 240);
    for frame in drain(&mut rx).await {
        canvas.apply_frame(&frame, 0);
    }
    assert!(canvas
        .store()
        .contains(extra.id()));

    world
        .add(
            "b",
            DrawObject::new(&program)
                .attribute("position", &position)
                .draw_arrays(Primitive::Points, 0, 4)
                .build(),
        )
        .await;
    world.swap("b").await;

    let frames = drain(&mut rx).await;
    let undefines: Vec<CanvasMessage> = frames
        .iter()
        .map(|frame| decode(frame))
        .filter(|message| {
            matches!(
                message,
                CanvasMessage::UndefineProgram { .. }
                    | CanvasMessage::UndefineVertexAttribute { .. }
                    | CanvasMessage::UndefineIndexArray { .. }
                    | CanvasMessage::UndefineTexture { .. }
            )
        })
        .collect();
    assert_eq!(
        undefines,
        vec![CanvasMessage::UndefineVertexAttribute { id: extra.id() }]
    );

    for frame in frames {
        canvas.apply_frame(&frame, 0);
    }
    assert!(!canvas.store().contains(extra.id()));
    assert!(canvas.store().contains(position.id()));
}

#[tokio::test]
async fn probes_cross_both_runtimes_and_come_back() {
    let (session, mut rx) = CanvasSession::new(KEEPALIVE);
    session.echo(7.5);
    session.read_pixels(3);

    let mut canvas = Canvas::new(RecordingPort::new(), 64, 32);
    for frame in drain(&mut rx).await {
        canvas.apply_frame(&frame, 0);
    }

    let replies = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&replies);
    session
        .add_event_handler(0, move |message| {
            match message {
                ClientMessage::Echo { nonce } => sink.lock().unwrap().push(format!("echo {nonce}")),
                ClientMessage::ReadPixels(reply) => sink.lock().unwrap().push(format!(
                    "pixels {} {}x{}x{}",
                    reply.id, reply.width, reply.height, reply.bytes_per_pixel
                )),
                _ => {}
            }
            false
        })
        .await;
    for message in canvas.take_outgoing() {
        session.handle_frame(&message.encode()).await;
    }

    let replies = replies.lock().unwrap();
    assert!(replies.contains(&"echo 7.5".to_owned()));
    assert!(replies.contains(&"pixels 3 64x32x4".to_owned()));
}
