//! Engine-agnostic Wasm runtime adapter for the otelwasm plugin host.
//!
//! The host above this crate needs a small capability set from a Wasm
//! engine: compile a module, instantiate it with a set of host imports,
//! call exported functions by name, and read/write the guest's linear
//! memory. This crate defines that surface and provides two back-ends:
//!
//! - [`interpreter`]: `wasmi`, the default. Portable, no codegen, runs
//!   anywhere the host compiles.
//! - [`compiled`]: `wasmtime` (cargo feature `compiled`, on by default).
//!   Faster, platform-restricted. When the feature is disabled, requests
//!   for the compiled engine fall back to the interpreter with a warning.
//!
//! All cross-boundary scalars are 32-bit integers interpreted as byte
//! offsets or lengths into the guest's exported `memory`. Out-of-range
//! memory accesses are reported (`None`/`false`), never panics.
//!
//! # Architecture
//!
//! - [`WasmEngine`] → [`CompiledModule`] → [`InstanceHandle`] mirror the
//!   compile → instantiate-with-host → call flow.
//! - [`HostModule`] is a plain record of named [`HostFunction`]s; each
//!   back-end wires the record into its own linker, handing callbacks a
//!   [`GuestContext`] view of the caller's memory.
//! - [`registry::build_engine`] is the one-shot engine table.

#![warn(missing_docs, rust_2018_idioms)]

#[cfg(feature = "compiled")]
pub mod compiled;
mod engine;
mod environment;
mod error;
mod host;
pub mod interpreter;
pub mod registry;
mod value;

pub use engine::{CompiledModule, EngineKind, InstanceHandle, Interrupter, WasmEngine};
pub use environment::GuestEnvironment;
pub use error::{RuntimeError, RuntimeResult};
pub use host::{GuestContext, HostCallback, HostFault, HostFunction, HostModule};
pub use value::{FuncSignature, Value, ValueKind};
