//! Chain interpreter
//!
//! Evaluates an instruction hop by hop. Each hop moves through
//! `Resolving -> Invoking -> Converting`; the chain ends in `Done` with the
//! final text or `Failed` with the first error. Calls already made are never
//! rolled back, and only member resolution is cached, never results.

use tether_sdk::{ForeignRuntime, NativeValue, ReturnKind, RuntimeError, RuntimeResult};
use tracing::{debug, warn};

use crate::cache::{member_key, Binding, RuntimeMethod};
use crate::convert::{coerce_literal, convert_result, literal_cost, Converted, NULL_TEXT, VOID_TEXT};
use crate::discovery::{discover_type, settle};
use crate::engine::Engine;
use crate::error::{BridgeError, BridgeResult};
use crate::instruction::{Hop, HopKind, Instruction, Literal};
use crate::reply::Reply;
use crate::roots::RootHandle;

/// Member label for faults raised while rendering a chain with no hops
pub(crate) const ROOT_LABEL: &str = "<root>";

/// Where an evaluation currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Parsing,
    Resolving(usize),
    Invoking(usize),
    Converting(usize),
    Done,
    Failed,
}

impl Stage {
    /// Hop the evaluation is working on, if any
    fn hop(self) -> Option<usize> {
        match self {
            Stage::Resolving(i) | Stage::Invoking(i) | Stage::Converting(i) => Some(i),
            Stage::Parsing | Stage::Done | Stage::Failed => None,
        }
    }
}

struct ChainState<O> {
    receiver: O,
    type_name: String,
    stage: Stage,
}

/// A hop's member, resolved from the cache
struct Target<R: ForeignRuntime> {
    key: String,
    kind: ReturnKind,
    class: R::Type,
    binding: Binding,
    member: TargetMember<R>,
}

enum TargetMember<R: ForeignRuntime> {
    Method {
        handle: R::Method,
        tokens: Vec<String>,
    },
    Field(R::Field),
}

impl<R: ForeignRuntime> Engine<R> {
    /// Evaluate `instruction` starting from `root`.
    ///
    /// A root label in the instruction is ignored.
    pub fn evaluate(&mut self, instruction: &str, root: &R::Object) -> BridgeResult<String> {
        let parsed = Instruction::parse(instruction)?;
        self.run_chain(&parsed, root)
    }

    /// Evaluate `instruction` starting from a registered root
    pub fn evaluate_root(&mut self, instruction: &str, root: RootHandle) -> BridgeResult<String> {
        let parsed = Instruction::parse(instruction)?;
        let object = self
            .roots
            .get(root)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownRoot(root.to_string()))?;
        self.run_chain(&parsed, &object)
    }

    /// Evaluate instruction text, picking the root from its label.
    ///
    /// Never fails: errors become an empty value plus a diagnostic.
    pub fn evaluate_text(&mut self, instruction: &str) -> Reply {
        match self.evaluate_labelled(instruction) {
            Ok(value) => Reply::ok(value),
            Err(err) => {
                warn!(instruction, error = %err, "evaluation failed");
                Reply::failure(err)
            }
        }
    }

    fn evaluate_labelled(&mut self, text: &str) -> BridgeResult<String> {
        let parsed = Instruction::parse(text)?;
        let root = self.select_root(parsed.root.as_deref())?;
        let object = self
            .roots
            .get(root)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownRoot(root.to_string()))?;
        self.run_chain(&parsed, &object)
    }

    /// Named root, then a declared root of that name, then the default.
    fn select_root(&mut self, label: Option<&str>) -> BridgeResult<RootHandle> {
        if let Some(label) = label {
            if let Some(id) = self.roots.by_name(label) {
                return Ok(id);
            }
            if let Some(spec) = self.root_specs.iter().find(|s| s.name == label).cloned() {
                return self.resolve_root(&spec);
            }
        }

        let pending_default = self
            .root_specs
            .iter()
            .find(|s| s.default && self.roots.by_name(&s.name).is_none())
            .cloned();
        if let Some(spec) = pending_default {
            return self.resolve_root(&spec);
        }
        if let Some(id) = self.roots.default_root() {
            return Ok(id);
        }
        if let Some(spec) = self.root_specs.first().cloned() {
            return self.resolve_root(&spec);
        }

        Err(BridgeError::UnknownRoot(label.unwrap_or("<default>").to_string()))
    }

    pub(crate) fn run_chain(&mut self, instruction: &Instruction, root: &R::Object) -> BridgeResult<String> {
        let mut state = ChainState {
            receiver: root.clone(),
            type_name: String::new(),
            stage: Stage::Parsing,
        };

        let result = self.drive(&mut state, &instruction.hops);
        match &result {
            Ok(_) => state.stage = Stage::Done,
            Err(err) => {
                debug!(hop = ?state.stage.hop(), error = %err, "chain failed");
                state.stage = Stage::Failed;
            }
        }
        debug!(stage = ?state.stage, hops = instruction.hops.len(), "chain finished");
        result
    }

    fn drive(&mut self, state: &mut ChainState<R::Object>, hops: &[Hop]) -> BridgeResult<String> {
        state.type_name = self.enter_receiver(&state.receiver)?;

        let Some((last, intermediate)) = hops.split_last() else {
            let receiver = state.receiver.clone();
            return self.render_object(&receiver, ROOT_LABEL);
        };

        for (index, hop) in intermediate.iter().enumerate() {
            let (key, kind, converted) = self.step(state, index, hop)?;
            match converted {
                Converted::Receiver(object) => {
                    state.type_name = self.enter_receiver(&object)?;
                    state.receiver = object;
                }
                Converted::Null => return Err(BridgeError::NullReceiver { member: key }),
                Converted::Void => {
                    return Err(BridgeError::NotAReceiver {
                        member: key,
                        kind: VOID_TEXT.to_string(),
                    })
                }
                Converted::Text(_) => {
                    return Err(BridgeError::NotAReceiver {
                        member: key,
                        kind: kind.to_string(),
                    })
                }
            }
        }

        let (key, _, converted) = self.step(state, intermediate.len(), last)?;
        match converted {
            Converted::Void => Ok(VOID_TEXT.to_string()),
            Converted::Null => Ok(NULL_TEXT.to_string()),
            Converted::Text(text) => Ok(text),
            Converted::Receiver(object) => self.render_object(&object, &key),
        }
    }

    /// Resolve, invoke, and convert one hop against the current receiver
    fn step(
        &mut self,
        state: &mut ChainState<R::Object>,
        index: usize,
        hop: &Hop,
    ) -> BridgeResult<(String, ReturnKind, Converted<R::Object>)> {
        state.stage = Stage::Resolving(index);
        let target = self.resolve_hop(&state.type_name, hop)?;

        state.stage = Stage::Invoking(index);
        debug!(hop = index, member = %target.key, "invoking");
        let value = self.invoke_target(&target, &state.receiver, hop)?;

        state.stage = Stage::Converting(index);
        let converted = convert_result(&target.key, &target.kind, value)?;
        Ok((target.key, target.kind, converted))
    }

    fn resolve_hop(&self, type_name: &str, hop: &Hop) -> BridgeResult<Target<R>> {
        let key = member_key(type_name, &hop.name);
        let not_found = || BridgeError::MemberNotFound {
            type_name: type_name.to_string(),
            member: hop.name.clone(),
        };

        match &hop.kind {
            HopKind::Call(args) => {
                let overloads = self.cache.methods(type_name, &hop.name).ok_or_else(not_found)?;
                let entry = select_overload::<R>(overloads, args).ok_or_else(|| {
                    BridgeError::NoMatchingOverload {
                        member: key.clone(),
                        args: args.iter().map(Literal::to_string).collect::<Vec<_>>().join(", "),
                    }
                })?;
                Ok(Target {
                    key,
                    kind: entry.return_kind.clone(),
                    class: entry.class.clone(),
                    binding: entry.binding,
                    member: TargetMember::Method {
                        handle: entry.handle.clone(),
                        tokens: entry.param_tokens.clone(),
                    },
                })
            }
            HopKind::Field => {
                let entry = self.cache.field(type_name, &hop.name).ok_or_else(not_found)?;
                Ok(Target {
                    key,
                    kind: entry.kind.clone(),
                    class: entry.class.clone(),
                    binding: entry.binding,
                    member: TargetMember::Field(entry.handle.clone()),
                })
            }
        }
    }

    fn invoke_target(
        &mut self,
        target: &Target<R>,
        receiver: &R::Object,
        hop: &Hop,
    ) -> BridgeResult<NativeValue<R::Object>> {
        let receiver = match target.binding {
            Binding::Instance => Some(receiver),
            Binding::Static => None,
        };

        let result = match &target.member {
            TargetMember::Method { handle, tokens } => {
                let args: Vec<NativeValue<R::Object>> = hop
                    .args()
                    .iter()
                    .zip(tokens)
                    .map(|(literal, token)| coerce_literal(literal, token))
                    .collect();
                self.runtime
                    .invoke(handle, &target.class, receiver, &target.kind, &args)
            }
            TargetMember::Field(handle) => {
                self.runtime
                    .read_field(handle, &target.class, receiver, &target.kind)
            }
        };
        self.capture(result, &target.key)
    }

    /// Settle a runtime call made on behalf of `member`.
    ///
    /// Any pending fault is taken and cleared, including one left behind by a
    /// call that reported success.
    pub(crate) fn capture<T>(&mut self, result: RuntimeResult<T>, member: &str) -> BridgeResult<T> {
        match result {
            Ok(value) => {
                if self.runtime.has_pending_fault() {
                    let description = self.runtime.take_fault().unwrap_or_default();
                    warn!(member, fault = %description, "fault raised");
                    return Err(BridgeError::InvocationFault {
                        member: member.to_string(),
                        description,
                    });
                }
                Ok(value)
            }
            Err(err) => {
                let description = match self.runtime.take_fault() {
                    Some(description) => description,
                    None => match err {
                        RuntimeError::Fault(description) => description,
                        other => return Err(BridgeError::Runtime(other)),
                    },
                };
                warn!(member, fault = %description, "fault raised");
                Err(BridgeError::InvocationFault {
                    member: member.to_string(),
                    description,
                })
            }
        }
    }

    /// Default string conversion of the chain's final object
    fn render_object(&mut self, object: &R::Object, member: &str) -> BridgeResult<String> {
        let result = self.runtime.stringify(object);
        self.capture(result, member)
    }

    /// Concrete type name of a new receiver, discovering it on first sight
    fn enter_receiver(&mut self, object: &R::Object) -> BridgeResult<String> {
        let result = self.runtime.type_of(object);
        let ty = settle(&mut self.runtime, result)?;
        let result = self.runtime.type_name(&ty);
        let type_name = settle(&mut self.runtime, result)?;
        if !self.cache.is_discovered(&type_name) {
            discover_type(&mut self.runtime, &mut self.cache, &ty, &self.options, 0)?;
        }
        Ok(type_name)
    }
}

/// Cheapest overload accepting `args`; ties go to the lowest descriptor.
fn select_overload<'a, R: ForeignRuntime>(
    overloads: &'a [RuntimeMethod<R>],
    args: &[Literal],
) -> Option<&'a RuntimeMethod<R>> {
    let mut best: Option<(u32, &RuntimeMethod<R>)> = None;
    for entry in overloads {
        if entry.param_tokens.len() != args.len() {
            continue;
        }
        let cost = args
            .iter()
            .zip(&entry.param_tokens)
            .try_fold(0u32, |acc, (literal, token)| literal_cost(literal, token).map(|c| acc + c));
        let Some(cost) = cost else {
            continue;
        };
        let better = match best {
            None => true,
            Some((best_cost, best_entry)) => {
                cost < best_cost || (cost == best_cost && entry.descriptor < best_entry.descriptor)
            }
        };
        if better {
            best = Some((cost, entry));
        }
    }
    best.map(|(_, entry)| entry)
}
