//! Tether JVM agent
//!
//! Loaded into a JVM (`System.loadLibrary` or `-agentpath`), this library
//! starts a bridge over a [`JvmRuntime`] and serves it on the configured
//! address. Everything runs on threads of its own; `JNI_OnLoad` returns
//! immediately.

#![warn(missing_docs)]

pub mod jvm;

use std::ffi::c_void;
use std::thread;

use jni::sys::{jint, JNI_VERSION_1_8};
use jni::JavaVM;
use tether_engine::{Bridge, BridgeConfig, BridgeError, BridgeResult, Engine, RuntimeError, Server, TransportError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub use jvm::{JvmField, JvmMethod, JvmRuntime};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "TETHER_LOG";

/// Why the agent stopped serving
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Bridge worker could not start
    #[error("Bridge failed: {0}")]
    Bridge(#[from] BridgeError),

    /// Listener could not bind or accept
    #[error("Transport failed: {0}")]
    Transport(#[from] TransportError),
}

/// Initialize logging to stderr; a filter in `TETHER_LOG` wins over `fallback`
pub fn init_logging(fallback: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    // The host may have installed a subscriber already
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Build an engine on the current thread, attaching it to `vm` for good
pub fn attach_engine(vm: JavaVM, config: &BridgeConfig) -> BridgeResult<Engine<JvmRuntime>> {
    vm.attach_current_thread_permanently()
        .map_err(|e| RuntimeError::Unavailable(format!("cannot attach bridge thread: {}", e)))?;
    let mut engine = Engine::new(JvmRuntime::new(vm), config.discovery_options());
    // Classes may still be loading; roots resolve on first use
    engine.declare_roots(config.roots.iter().cloned());
    Ok(engine)
}

/// Start the bridge and serve it until the process exits
pub fn run(vm: JavaVM, config: BridgeConfig) -> Result<(), AgentError> {
    let factory_config = config.clone();
    let bridge = Bridge::spawn(move || attach_engine(vm, &factory_config))?;
    let server = Server::bind(config.transport.addr.as_str(), bridge.handle(), config.transport.max_frame)?;
    info!(addr = %config.transport.addr, "agent ready");
    server.serve()?;
    Ok(())
}

/// JVM entry point: load config, start logging, and spawn the agent thread
#[no_mangle]
#[allow(non_snake_case)]
pub extern "system" fn JNI_OnLoad(vm: JavaVM, _reserved: *mut c_void) -> jint {
    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("tether: {}", err);
            return JNI_VERSION_1_8;
        }
    };
    init_logging(&config.log.filter);

    let spawned = thread::Builder::new()
        .name("tether-agent".to_string())
        .spawn(move || {
            if let Err(err) = run(vm, config) {
                error!(error = %err, "agent stopped");
            }
        });
    if let Err(err) = spawned {
        error!(error = %err, "cannot start agent thread");
    }
    JNI_VERSION_1_8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_errors_keep_their_source() {
        let err = AgentError::from(TransportError::Closed);
        assert_eq!(err.to_string(), "Transport failed: Connection closed");

        let err = AgentError::from(BridgeError::Runtime(RuntimeError::Unavailable("no jvm".to_string())));
        assert!(matches!(err, AgentError::Bridge(_)));
        assert!(err.to_string().starts_with("Bridge failed: "), "{}", err);
        assert!(err.to_string().contains("no jvm"), "{}", err);
    }
}
