// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! WebSocket front door for glint worlds. Every browser that connects gets a
//! canvas session attached to the hosted demo world and speaks the binary
//! canvas protocol over ws frames.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::ws::{Message, WebSocket},
    extract::{ConnectInfo, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use glint_proto::Primitive;
use glint_server::{CanvasSession, DrawObject, Resource, SceneObject, World};
use tokio::task::{JoinError, JoinHandle};
use tokio::{
    sync::mpsc,
    time::{self, Duration},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Half the grid span, in world units.
const GRID_EXTENT: i8 = 10;
const CUBE_HALF: f32 = 2.0;

const FLAT_VERTEX_SRC: &str = "attribute vec3 position;\n\
     uniform mat4 VX_P;\n\
     uniform mat4 VX_V;\n\
     uniform mat4 VX_M;\n\
     void main(void) {\n\
         gl_Position = VX_P * VX_V * VX_M * vec4(position, 1.0);\n\
     }\n";

const FLAT_FRAGMENT_SRC: &str = "precision mediump float;\n\
     uniform vec4 rgba;\n\
     void main(void) {\n\
         gl_FragColor = rgba;\n\
     }\n";

#[derive(Parser, Debug)]
#[command(author, version, about = "Glint websocket rendering daemon")]
struct Args {
    /// TCP listener for browser clients (e.g. 0.0.0.0:1234)
    #[arg(long, default_value = "0.0.0.0:1234")]
    listen: SocketAddr,
    /// HTTP path serving the websocket endpoint
    #[arg(long, default_value = "/ws")]
    ws_path: String,
    /// Idle heartbeat period in milliseconds (NOP frames)
    #[arg(long, default_value_t = 1000)]
    keepalive_ms: u64,
    /// Demo spinner republish period in milliseconds
    #[arg(long, default_value_t = 100)]
    spin_ms: u64,
    /// TLS certificate (PEM). If provided, key must also be provided.
    #[arg(long)]
    tls_cert: Option<PathBuf>,
    /// TLS private key (PEM). If provided, cert must also be provided.
    #[arg(long)]
    tls_key: Option<PathBuf>,
}

#[derive(Clone)]
struct AppState {
    world: World,
    keepalive: Duration,
}

/// Which connection task stopped first.
enum Ended {
    Outbound(Result<(), JoinError>),
    Inbound(Result<(), JoinError>),
    Writer(Result<(), JoinError>),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let (world, spinner) = demo_world().await?;
    tokio::spawn(spin(spinner, Duration::from_millis(args.spin_ms)));

    let state = Arc::new(AppState {
        world,
        keepalive: Duration::from_millis(args.keepalive_ms),
    });

    let app = Router::new()
        .route(&args.ws_path, get(ws_handler))
        .with_state(state);

    let handle = Handle::new();
    // graceful shutdown on Ctrl+C
    let shutdown = handle.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => shutdown.shutdown(),
            Err(err) => error!(%err, "could not install the ctrl-c handler"),
        }
    });

    match (args.tls_cert, args.tls_key) {
        (Some(cert), Some(key)) => {
            let tls_config = RustlsConfig::from_pem_file(cert, key)
                .await
                .context("load tls config")?;
            info!("glint listening (TLS) on {}{}", args.listen, args.ws_path);
            axum_server::bind_rustls(args.listen, tls_config)
                .handle(handle)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await?;
        }
        (None, None) => {
            info!("glint listening on {}{}", args.listen, args.ws_path);
            axum_server::bind(args.listen)
                .handle(handle)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await?;
        }
        _ => {
            return Err(anyhow!(
                "must provide both --tls-cert and --tls-key or neither"
            ))
        }
    }

    Ok(())
}

async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    info!(%addr, "canvas connected");
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, peer: SocketAddr) {
    let (session, mut frames) = CanvasSession::new(state.keepalive);
    session.set_title("glint demo");
    let layer = session.layer("default");
    layer.set_elu([15.0, -15.0, 20.0], [0.0; 3], [0.0, 0.0, 1.0], 0.0);
    layer.set_world(&state.world).await;

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(256);

    // Writer task: single owner of the websocket sink.
    let mut writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Session frames -> binary ws messages. Dropping this receiver is what
    // stops the session pump once the connection is torn down.
    let frame_tx = out_tx.clone();
    let mut outbound = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if frame_tx.send(Message::Binary(frame.into())).await.is_err() {
                break;
            }
        }
    });

    // ws messages -> session.
    let pong_tx = out_tx.clone();
    let inbound_session = session.clone();
    let mut inbound = tokio::spawn(async move {
        while let Some(msg) = ws_rx.next().await {
            match msg {
                Ok(Message::Binary(data)) => inbound_session.handle_frame(&data).await,
                Ok(Message::Ping(payload)) => {
                    let _ = pong_tx.send(Message::Pong(payload)).await;
                }
                Ok(Message::Close(_)) => break,
                Ok(Message::Text(_)) => {
                    warn!(%peer, "ignoring text frame");
                }
                Err(err) => {
                    warn!(%err, %peer, "ws recv error");
                    break;
                }
                Ok(_) => {}
            }
        }
    });
    drop(out_tx);

    let ended = tokio::select! {
        res = &mut outbound => Ended::Outbound(res),
        res = &mut inbound => Ended::Inbound(res),
        res = &mut writer => Ended::Writer(res),
    };

    match ended {
        Ended::Outbound(res) => {
            log_task("outbound", peer, res);
            reap("inbound", peer, inbound).await;
            reap("writer", peer, writer).await;
        }
        Ended::Inbound(res) => {
            log_task("inbound", peer, res);
            reap("outbound", peer, outbound).await;
            reap("writer", peer, writer).await;
        }
        Ended::Writer(res) => {
            log_task("writer", peer, res);
            reap("outbound", peer, outbound).await;
            reap("inbound", peer, inbound).await;
        }
    }
    info!(%peer, "canvas disconnected");
}

fn log_task(name: &'static str, peer: SocketAddr, res: Result<(), JoinError>) {
    match res {
        Ok(()) => {}
        Err(err) if err.is_cancelled() => {}
        Err(err) if err.is_panic() => error!(%peer, %err, "{name} task panicked"),
        Err(err) => warn!(%peer, %err, "{name} task failed"),
    }
}

async fn reap(name: &'static str, peer: SocketAddr, task: JoinHandle<()>) {
    task.abort();
    log_task(name, peer, task.await);
}

/// Shared scene every browser sees: a ground grid plus a spinning wireframe
/// cube, republished by [`spin`].
async fn demo_world() -> Result<(World, Spinner)> {
    let world = World::new();
    let program = Resource::program(FLAT_VERTEX_SRC, FLAT_FRAGMENT_SRC);

    let grid = grid_vertices();
    let grid_count = u32::try_from(grid.len() / 3)?;
    let grid_verts = Resource::attr_f32(3, grid)?;
    world
        .add(
            "grid",
            DrawObject::new(&program)
                .uniform("rgba", 4, 1, &[0.3, 0.3, 0.3, 1.0])
                .uniform("glLineWidth", 1, 1, &[1.0])
                .attribute("position", &grid_verts)
                .draw_arrays(Primitive::Lines, 0, grid_count)
                .build(),
        )
        .await;
    world.set_draw_order("grid", -1.0).await;
    world.swap("grid").await;

    let edges = cube_edges();
    let edge_count = u32::try_from(edges.len())?;
    let spinner = Spinner {
        world: world.clone(),
        program,
        corners: Resource::attr_f32(3, cube_corners(CUBE_HALF))?,
        edges: Resource::index_u16(edges),
        edge_count,
    };
    Ok((world, spinner))
}

struct Spinner {
    world: World,
    program: Arc<Resource>,
    corners: Arc<Resource>,
    edges: Arc<Resource>,
    edge_count: u32,
}

/// Republishes the cube under a fresh rotation, the way a live pose stream
/// would. Resources stay the same, so steady state is one redraw per tick.
async fn spin(spinner: Spinner, period: Duration) {
    let started = time::Instant::now();
    let mut interval = time::interval(period);
    loop {
        interval.tick().await;
        let object = SceneObject::chain(vec![
            SceneObject::rotate_z(started.elapsed().as_secs_f64()),
            DrawObject::new(&spinner.program)
                .uniform("rgba", 4, 1, &[1.0, 0.5, 0.0, 1.0])
                .uniform("glLineWidth", 1, 1, &[2.0])
                .attribute("position", &spinner.corners)
                .draw_elements(&spinner.edges, Primitive::Lines, spinner.edge_count)
                .build(),
        ]);
        spinner.world.add("spinner", object).await;
        spinner.world.swap("spinner").await;
    }
}

/// Line lattice on the z=0 plane.
fn grid_vertices() -> Vec<f32> {
    let extent = f32::from(GRID_EXTENT);
    let mut verts = Vec::new();
    for i in -GRID_EXTENT..=GRID_EXTENT {
        let v = f32::from(i);
        verts.extend_from_slice(&[v, -extent, 0.0, v, extent, 0.0]);
        verts.extend_from_slice(&[-extent, v, 0.0, extent, v, 0.0]);
    }
    verts
}

/// Eight corners of a cube, x varying fastest so edge indices can use bit
/// arithmetic.
fn cube_corners(half: f32) -> Vec<f32> {
    let mut corners = Vec::with_capacity(24);
    for z in [-half, half] {
        for y in [-half, half] {
            for x in [-half, half] {
                corners.extend_from_slice(&[x, y, z]);
            }
        }
    }
    corners
}

/// Index pairs joining corners that differ in exactly one axis.
fn cube_edges() -> Vec<u16> {
    let mut edges = Vec::with_capacity(24);
    for corner in 0..8u16 {
        for bit in [1, 2, 4] {
            if corner & bit == 0 {
                edges.push(corner);
                edges.push(corner | bit);
            }
        }
    }
    edges
}
