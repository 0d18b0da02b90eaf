//! `tether serve` - Serve a simulated graph over the line transport.

use std::path::PathBuf;

use tether_engine::{Bridge, BridgeConfig, RuntimeError, Server};
use tracing::info;

use crate::commands::eval::load_engine;
use crate::output::StyledOutput;

pub fn execute(
    graph: PathBuf,
    root: Option<String>,
    addr: Option<String>,
    config: &BridgeConfig,
    out: &mut StyledOutput,
) -> anyhow::Result<()> {
    let addr = addr.unwrap_or_else(|| config.transport.addr.clone());
    let engine_config = config.clone();

    let bridge = Bridge::spawn(move || {
        load_engine(&graph, root.as_deref(), &engine_config)
            .map_err(|e| RuntimeError::Unavailable(format!("{:#}", e)).into())
    })?;

    let server = Server::bind(addr.as_str(), bridge.handle(), config.transport.max_frame)?;
    let local = server.local_addr()?;
    out.success(&format!("Serving on {}", local));
    out.flush();
    info!(addr = %local, "simulated bridge ready");

    server.serve()?;
    bridge.shutdown();
    Ok(())
}
