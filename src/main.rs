//! cluster-explorer: HTTP server for browsing and sorting a cluster tree.
//!
//! Members of a node are arranged by similarity, leaf count or distance to
//! starred anchors, and results are served page by page from a compressed
//! in-memory cache.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::net::TcpListener;
use tracing::info;

use cluster_explorer::config::{Cli, Config};
use cluster_explorer::server::{build_router, AppState};
use cluster_explorer::tree::memory::{new_shared_tree, MemoryTree};
use cluster_explorer::tree::TreeError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "cluster_explorer=debug,tower_http=debug"
    } else {
        "cluster_explorer=info,tower_http=info"
    };
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }

    info!("cluster-explorer v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(&cli.config)?;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    let config = Arc::new(config);

    info!(
        page_size = config.cache.page_size,
        compress = config.cache.compress,
        memory_budget = config.cache.memory_budget,
        n_neighbors = config.arrange.n_neighbors,
        safe_margin = config.classify.safe_margin,
        "Configuration loaded"
    );

    let mut tree = MemoryTree::new();
    if cli.seed_demo {
        seed_demo(&mut tree, config.arrange.seed.unwrap_or(0))?;
    }
    let tree = new_shared_tree(tree);

    let state = Arc::new(AppState::new(tree, config.clone()).context("Registering cache metrics")?);
    let app = build_router(state);

    let listen_addr = &config.server.listen;
    info!(addr = %listen_addr, "Starting server");

    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Binding {listen_addr}"))?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

/// A project with three starred clusters, a few unstarred ones and loose objects.
fn seed_demo(tree: &mut MemoryTree, seed: u64) -> Result<(), TreeError> {
    const CENTERS: [[f32; 2]; 5] = [[0.0, 0.0], [10.0, 0.0], [0.0, 10.0], [1.5, 1.0], [9.0, 1.5]];

    let mut rng = StdRng::seed_from_u64(seed);
    let root = tree.add_project("demo");

    for (i, center) in CENTERS.iter().enumerate() {
        let starred = i < 3;
        let node = tree.add_node(root, Some(&format!("cluster-{i}")), starred)?;
        for j in 0..20 {
            let vector = center.iter().map(|c| *c + rng.gen_range(-1.0f32..1.0)).collect();
            tree.add_object(node, &format!("c{i}-{j}"), vector)?;
        }
    }
    for j in 0..30 {
        let vector = vec![rng.gen_range(-2.0f32..12.0), rng.gen_range(-2.0f32..12.0)];
        tree.add_object(root, &format!("loose-{j}"), vector)?;
    }

    info!(root, "Seeded demonstration project");
    Ok(())
}
