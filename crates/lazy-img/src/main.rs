//! lazy-img demo
//!
//! Lays out a feed of lazy images, scrolls through it one viewport at a
//! time and logs which images load. Odd images observe the `.feed`
//! container, even ones the document, so the pool ends up with one
//! monitor per root. Pass a JSON config file to override the defaults.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use lazy_dom::{DOMRect, DomTree, NodeId};
use lazy_img::{Config, DryRunLoader, HttpImageLoader, ImageLoader, LazyImg, LoadState, PageContext};
use lazy_observe::{IntersectionHost, LayoutSnapshot, MonitorPool, ReadinessGate};
use smol::{Executor, Timer};
use tracing_subscriber::EnvFilter;

const IMAGES: usize = 12;
const IMAGE_HEIGHT: f32 = 300.0;
const VIEWPORT_WIDTH: f32 = 800.0;
const VIEWPORT_HEIGHT: f32 = 600.0;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
            Config::from_json(&json).with_context(|| format!("parsing {}", path))?
        }
        None => Config::default(),
    };
    let base_url = config.base_url().context("invalid base_url")?;

    tracing::info!("lazy-img v{} ({})", lazy_img::VERSION, base_url);

    let (tree, feed, nodes) = build_document();

    // Stand-in for a polyfill that takes a moment to install
    let gate = ReadinessGate::new(|| async {
        Timer::after(Duration::from_millis(20)).await;
        Ok(())
    });
    let host = IntersectionHost::new();
    let pool = MonitorPool::new(Arc::new(gate), Arc::new(host.clone()));

    let loader: Arc<dyn ImageLoader> = if config.fetch_images {
        Arc::new(HttpImageLoader::new(&config.user_agent).context("creating HTTP client")?)
    } else {
        Arc::new(DryRunLoader)
    };

    let executor = Arc::new(Executor::new());
    let page = Arc::new(
        PageContext::new(base_url, Arc::new(tree), pool.clone(), loader, executor.clone())
            .with_defaults(config.monitor_config()),
    );

    let images: Vec<LazyImg> = nodes
        .iter()
        .enumerate()
        .map(|(i, &node)| {
            let img = LazyImg::new(page.clone(), node);
            img.set_alt(&format!("photo {}", i + 1));
            if i % 2 == 1 {
                img.set_observe(Some(".feed"));
            }
            img.set_src(&format!("images/photo-{:02}.jpg", i + 1));
            img
        })
        .collect();

    let steps = (IMAGES as f32 * IMAGE_HEIGHT / VIEWPORT_HEIGHT).ceil() as usize;
    smol::block_on(executor.run(async {
        for step in 0..=steps {
            let scroll = step as f32 * VIEWPORT_HEIGHT;

            page.frames().tick();
            // Gate setup and deferred acquires
            Timer::after(Duration::from_millis(30)).await;

            host.update(&layout_at(feed, &nodes, scroll));
            // Image loads
            Timer::after(Duration::from_millis(10)).await;

            let loaded = images.iter().filter(|img| img.state() == LoadState::Loaded).count();
            let stats = pool.stats();
            tracing::info!(
                "scroll {:>5}px: {}/{} loaded, {} monitor(s), {} watcher(s)",
                scroll,
                loaded,
                IMAGES,
                stats.monitors,
                stats.watchers
            );
        }
    }));

    for img in &images {
        let view = img.view();
        tracing::debug!("{} [{}] -> {} (loaded: {})", img.node(), view.alt, view.src, view.loaded);
        img.detached();
    }
    tracing::info!("done: {:?}", pool.stats());

    Ok(())
}

/// `html > body > div.feed > lazy-img*`
fn build_document() -> (DomTree, NodeId, Vec<NodeId>) {
    let mut tree = DomTree::new();
    let html = tree.create_element("html");
    tree.append_child(tree.root(), html);
    let body = tree.create_element("body");
    tree.append_child(html, body);
    let feed = tree.create_element("div");
    tree.add_class(feed, "feed");
    tree.append_child(body, feed);

    let nodes = (0..IMAGES)
        .map(|_| {
            let node = tree.create_element("lazy-img");
            tree.append_child(feed, node);
            node
        })
        .collect();
    (tree, feed, nodes)
}

/// The feed fills the viewport and scrolls its images
fn layout_at(feed: NodeId, nodes: &[NodeId], scroll: f32) -> LayoutSnapshot {
    let viewport = DOMRect::new(0.0, 0.0, VIEWPORT_WIDTH, VIEWPORT_HEIGHT);
    let mut layout = LayoutSnapshot::new(viewport).with_rect(feed, viewport);
    for (i, &node) in nodes.iter().enumerate() {
        let top = i as f32 * IMAGE_HEIGHT - scroll;
        layout.set_rect(node, DOMRect::new(0.0, top, VIEWPORT_WIDTH, IMAGE_HEIGHT));
    }
    layout
}
