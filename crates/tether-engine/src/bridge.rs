//! Bridge: a shared, thread-safe front for one engine
//!
//! The engine lives on a dedicated dispatcher thread. Any number of callers
//! hold a [`BridgeHandle`] and submit requests, which the worker runs one at
//! a time. This is the single mutual-exclusion boundary around a runtime
//! connection.

use parking_lot::Mutex;
use tether_sdk::ForeignRuntime;
use tracing::info;

use crate::dispatch::{Dispatcher, Submitter};
use crate::engine::Engine;
use crate::error::BridgeResult;
use crate::reply::Reply;

/// Reply to `:ping`
pub const PONG: &str = "pong";

/// Type-erased view of an engine, as run by the bridge worker
pub trait Evaluator {
    /// Evaluate instruction text; never fails
    fn evaluate_text(&mut self, instruction: &str) -> Reply;

    /// Cache listing lines
    fn cache_listing(&self) -> Vec<String>;

    /// Names of registered roots
    fn root_names(&self) -> Vec<String>;
}

impl<R: ForeignRuntime> Evaluator for Engine<R> {
    fn evaluate_text(&mut self, instruction: &str) -> Reply {
        Engine::evaluate_text(self, instruction)
    }

    fn cache_listing(&self) -> Vec<String> {
        self.cache().listing()
    }

    fn root_names(&self) -> Vec<String> {
        self.roots().names()
    }
}

type Worker = Box<dyn Evaluator>;

/// Cloneable, `Send` handle for submitting requests to a bridge
#[derive(Clone)]
pub struct BridgeHandle {
    submitter: Submitter<Worker>,
}

impl BridgeHandle {
    /// Evaluate one instruction
    pub fn evaluate(&self, instruction: &str) -> Reply {
        let instruction = instruction.to_string();
        match self
            .submitter
            .submit(move |engine: &mut Worker| engine.evaluate_text(&instruction))
            .wait()
        {
            Ok(reply) => reply,
            Err(err) => Reply::failure(err),
        }
    }

    /// Cache listing of the engine
    pub fn cache_listing(&self) -> BridgeResult<Vec<String>> {
        self.submitter
            .submit(|engine: &mut Worker| engine.cache_listing())
            .wait()
    }

    /// Root names of the engine
    pub fn roots(&self) -> BridgeResult<Vec<String>> {
        self.submitter
            .submit(|engine: &mut Worker| engine.root_names())
            .wait()
    }

    /// Handle one request line: a control command or an instruction.
    pub fn handle_request(&self, line: &str) -> Reply {
        let line = line.trim();
        match line {
            ":ping" => Reply::ok(PONG),
            ":cache" => self.cache_listing().map_or_else(Reply::failure, |l| Reply::ok(l.join("\n"))),
            ":roots" => self.roots().map_or_else(Reply::failure, |l| Reply::ok(l.join("\n"))),
            cmd if cmd.starts_with(':') => Reply::failure(format!("Unknown command: {}", cmd)),
            instruction => self.evaluate(instruction),
        }
    }
}

/// Owner of the bridge worker
pub struct Bridge {
    handle: BridgeHandle,
    dispatcher: Mutex<Option<Dispatcher<Worker>>>,
}

impl Bridge {
    /// Start a worker thread and build the engine on it.
    ///
    /// `factory` runs on the worker, so runtimes bound to their creating
    /// thread can be constructed there.
    pub fn spawn<R, F>(factory: F) -> BridgeResult<Self>
    where
        R: ForeignRuntime + 'static,
        F: FnOnce() -> BridgeResult<Engine<R>> + Send + 'static,
    {
        let dispatcher = Dispatcher::spawn("tether-bridge", move || {
            factory().map(|engine| Box::new(engine) as Worker)
        })?;
        info!("bridge started");
        Ok(Self {
            handle: BridgeHandle {
                submitter: dispatcher.submitter(),
            },
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }

    /// Cloneable handle for transport threads
    pub fn handle(&self) -> BridgeHandle {
        self.handle.clone()
    }

    /// Evaluate one instruction
    pub fn evaluate(&self, instruction: &str) -> Reply {
        self.handle.evaluate(instruction)
    }

    /// Cache listing of the engine
    pub fn cache_listing(&self) -> BridgeResult<Vec<String>> {
        self.handle.cache_listing()
    }

    /// Root names of the engine
    pub fn roots(&self) -> BridgeResult<Vec<String>> {
        self.handle.roots()
    }

    /// Stop the worker; the engine is torn down on its own thread.
    ///
    /// Requests made afterwards fail with [`BridgeError::Disconnected`](crate::BridgeError::Disconnected).
    pub fn shutdown(&self) {
        if let Some(mut dispatcher) = self.dispatcher.lock().take() {
            dispatcher.shutdown();
            info!("bridge stopped");
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}
