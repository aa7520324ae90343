//! Shared guest-module builders for the integration tests.
//!
//! Guests are inline wat. Imports must precede definitions in the text
//! format, so builders take the import block separately.

#![allow(dead_code)]

use otelwasm_host::{HostError, HostResult, Plugin, PluginConfig};

/// Memory plus the reactor initializer every well-formed guest carries.
pub const BASE: &str = r#"
    (memory (export "memory") 1)
    (func (export "_initialize"))
"#;

/// The ABI v1 marker export.
pub const MARKER: &str = r#"
    (func (export "otelwasm_abi_version_0_1_0"))
"#;

/// A capability query answering with the given bitmap.
pub fn capabilities(bits: u32) -> String {
    format!(
        r#"(func (export "get_supported_telemetry") (result i32) (i32.const {bits}))"#
    )
}

/// An `otelwasm_memory_allocate` that always returns `ptr`.
pub fn fixed_allocator(ptr: u32) -> String {
    format!(
        r#"(func (export "otelwasm_memory_allocate") (param i32) (result i32) (i32.const {ptr}))"#
    )
}

/// Assemble an ABI v1 guest.
pub fn v1_guest(imports: &str, body: &str) -> HostResult<Vec<u8>> {
    assemble(&format!("(module\n{imports}\n{BASE}\n{MARKER}\n{body}\n)"))
}

/// Assemble a guest without the ABI marker.
pub fn unmarked_guest(imports: &str, body: &str) -> HostResult<Vec<u8>> {
    assemble(&format!("(module\n{imports}\n{BASE}\n{body}\n)"))
}

fn assemble(source: &str) -> HostResult<Vec<u8>> {
    wat::parse_str(source).map_err(|e| HostError::Compile {
        reason: e.to_string(),
    })
}

/// Open a guest from bytes with the default (interpreter) engine.
pub fn open(bytes: &[u8], required_exports: &[&str]) -> HostResult<Plugin> {
    Plugin::open_from_bytes(
        &PluginConfig::for_module("inline.wasm"),
        bytes,
        required_exports,
    )
}

/// A processor that supports every signal, allocates at a fixed offset,
/// and consumes traces with status OK.
pub fn nop_traces_processor() -> HostResult<Vec<u8>> {
    v1_guest(
        "",
        &format!(
            r#"
            {caps}
            {alloc}
            (func (export "otelwasm_consume_traces") (param i32 i32) (result i32)
                (i32.const 0))
            "#,
            caps = capabilities(0b111),
            alloc = fixed_allocator(4096),
        ),
    )
}

/// Escape bytes for a wat data segment.
pub fn wat_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("\\{b:02x}")).collect()
}
