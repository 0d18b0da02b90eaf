//! `tether eval` - Evaluate instructions offline against a simulated graph.

use std::path::Path;

use anyhow::Context;
use tether_engine::{BridgeConfig, Engine, SimRuntime};

use crate::output::StyledOutput;

/// Build an engine over the graph at `path`, registering every graph root.
///
/// `default_root` picks the root used by unlabeled instructions; otherwise
/// the first root by name.
pub fn load_engine(path: &Path, default_root: Option<&str>, config: &BridgeConfig) -> anyhow::Result<Engine<SimRuntime>> {
    let runtime = SimRuntime::load(path).with_context(|| format!("cannot load graph {}", path.display()))?;
    let roots = runtime.roots();
    if let Some(name) = default_root {
        if !roots.iter().any(|(n, _)| n == name) {
            anyhow::bail!("graph has no root named {}", name);
        }
    }

    let mut engine = Engine::new(runtime, config.discovery_options());
    for (name, object) in &roots {
        let id = engine.register_root(Some(name.as_str()), object)?;
        if default_root == Some(name.as_str()) {
            engine.set_default_root(id)?;
        }
    }
    engine.declare_roots(config.roots.iter().cloned());
    Ok(engine)
}

pub fn execute(
    graph: &Path,
    instructions: &[String],
    root: Option<&str>,
    show_cache: bool,
    config: &BridgeConfig,
    out: &mut StyledOutput,
) -> anyhow::Result<bool> {
    let mut engine = load_engine(graph, root, config)?;

    let mut all_ok = true;
    for instruction in instructions {
        let reply = engine.evaluate_text(instruction);
        all_ok &= out.reply(&reply);
    }

    if show_cache {
        out.info(&format!("# {} cached methods", engine.cache().method_count()));
        for line in engine.cache().listing() {
            out.value(&line);
        }
    }
    Ok(all_ok)
}
