//! The `wasmtime` compiled back-end.
//!
//! Cranelift-compiled execution behind the same adapter surface as the
//! interpreter. Epoch interruption is enabled so a guest stuck in a
//! receiver loop can be trapped from the shutdown path; nothing else
//! ever increments the epoch, so well-behaved guests never observe it.

use std::sync::Arc;

use wasmtime::{
    Caller, Config, Engine, Extern, Func, FuncType, Instance, Linker, Module, Store, Val, ValType,
};
use wasmtime_wasi::p1::WasiP1Ctx;
use wasmtime_wasi::WasiCtxBuilder;

use crate::engine::{CompiledModule, EngineKind, InstanceHandle, Interrupter, WasmEngine};
use crate::environment::GuestEnvironment;
use crate::error::{RuntimeError, RuntimeResult};
use crate::host::{GuestContext, HostModule};
use crate::interpreter::{INITIALIZE_EXPORT, MEMORY_EXPORT};
use crate::value::{FuncSignature, Value, ValueKind};

/// The compiled engine.
pub struct CompiledEngine {
    engine: Engine,
}

impl CompiledEngine {
    /// A fresh compiled engine.
    ///
    /// # Errors
    ///
    /// Fails when the underlying engine rejects the configuration on
    /// this platform.
    pub fn new() -> RuntimeResult<Self> {
        let mut config = Config::new();

        // Keep the guest surface small: plugins are single-threaded
        // consumers of flat buffers.
        config.wasm_threads(false);
        config.wasm_bulk_memory(false);
        config.wasm_multi_value(false);

        // Interruption point for receiver shutdown.
        config.epoch_interruption(true);

        let engine = Engine::new(&config).map_err(|e| RuntimeError::InstantiateFailed {
            reason: format!("engine configuration rejected: {e}"),
        })?;
        Ok(Self { engine })
    }
}

impl WasmEngine for CompiledEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Compiled
    }

    fn compile(&self, bytes: &[u8]) -> RuntimeResult<Box<dyn CompiledModule>> {
        let module = Module::new(&self.engine, bytes).map_err(|e| RuntimeError::CompileFailed {
            reason: e.to_string(),
        })?;

        let has_memory = module
            .exports()
            .any(|e| e.name() == MEMORY_EXPORT && e.ty().memory().is_some());
        if !has_memory {
            return Err(RuntimeError::MemoryExportMissing);
        }

        Ok(Box::new(CompiledModuleImpl {
            engine: self.engine.clone(),
            module,
        }))
    }
}

/// A compiled module ready to instantiate.
pub struct CompiledModuleImpl {
    engine: Engine,
    module: Module,
}

/// Store state: the WASI context the linker closures reach for.
struct CompiledState {
    wasi: WasiP1Ctx,
}

impl CompiledModule for CompiledModuleImpl {
    fn instantiate(
        &self,
        host_module: &HostModule,
        env: &GuestEnvironment,
    ) -> RuntimeResult<Box<dyn InstanceHandle>> {
        let mut builder = WasiCtxBuilder::new();
        if env.inherit_stdio {
            builder.inherit_stdio();
        }
        for (key, value) in &env.env_vars {
            builder.env(key, value);
        }
        builder.args(&env.args);
        let wasi = builder.build_p1();

        let mut store = Store::new(&self.engine, CompiledState { wasi });
        // A deadline must exist before any guest code runs; one epoch
        // tick is the interrupt signal.
        store.set_epoch_deadline(1);

        let mut linker: Linker<CompiledState> = Linker::new(&self.engine);
        wasmtime_wasi::p1::add_to_linker_sync(&mut linker, |s: &mut CompiledState| &mut s.wasi)
            .map_err(|e| RuntimeError::InstantiateFailed {
                reason: format!("failed to register wasi imports: {e}"),
            })?;

        register_host_module(&self.engine, &mut linker, host_module)?;

        let instance = linker.instantiate(&mut store, &self.module).map_err(|e| {
            RuntimeError::InstantiateFailed {
                reason: e.to_string(),
            }
        })?;

        let mut handle = CompiledInstance {
            engine: self.engine.clone(),
            inner: Some((store, instance)),
        };

        if handle.export(INITIALIZE_EXPORT).is_some() {
            handle
                .call(INITIALIZE_EXPORT, &[])
                .map_err(|e| RuntimeError::InstantiateFailed {
                    reason: format!("{INITIALIZE_EXPORT} failed: {e}"),
                })?;
        }

        Ok(Box::new(handle))
    }
}

/// A live compiled instance.
pub struct CompiledInstance {
    engine: Engine,
    inner: Option<(Store<CompiledState>, Instance)>,
}

impl CompiledInstance {
    fn func(&mut self, name: &str) -> Option<(Func, FuncType)> {
        let (store, instance) = self.inner.as_mut()?;
        let func = instance.get_func(&mut *store, name)?;
        let ty = func.ty(&*store);
        Some((func, ty))
    }
}

impl InstanceHandle for CompiledInstance {
    fn export(&mut self, name: &str) -> Option<FuncSignature> {
        let (_, ty) = self.func(name)?;
        signature_from_wasmtime(&ty)
    }

    fn call(&mut self, name: &str, args: &[Value]) -> RuntimeResult<Vec<Value>> {
        if self.inner.is_none() {
            return Err(RuntimeError::Closed);
        }
        let (func, ty) = self.func(name).ok_or_else(|| RuntimeError::ExportNotFound {
            export: name.to_owned(),
        })?;

        let params: Vec<Val> = args.iter().map(|v| value_to_wasmtime(*v)).collect();
        let mut results: Vec<Val> = ty.results().map(|t| zero_val(&t)).collect();

        let Some((store, _)) = self.inner.as_mut() else {
            return Err(RuntimeError::Closed);
        };
        // Re-arm the deadline so an interrupt delivered to an earlier
        // call does not leak into this one.
        store.set_epoch_deadline(1);
        func.call(&mut *store, &params, &mut results)
            .map_err(|e| RuntimeError::Trap {
                export: name.to_owned(),
                reason: e.to_string(),
            })?;

        results
            .iter()
            .map(|v| {
                value_from_wasmtime(v).ok_or_else(|| RuntimeError::UnsupportedValueType {
                    value_type: v
                        .ty(&*store)
                        .map_or_else(|e| format!("{e:?}"), |t| format!("{t:?}")),
                })
            })
            .collect::<Result<Vec<_>, _>>()
    }

    fn memory_read(&mut self, offset: u32, len: u32) -> Option<Vec<u8>> {
        let (store, instance) = self.inner.as_mut()?;
        let memory = instance.get_memory(&mut *store, MEMORY_EXPORT)?;
        let start = offset as usize;
        let end = start.checked_add(len as usize)?;
        memory.data(&*store).get(start..end).map(<[u8]>::to_vec)
    }

    fn memory_write(&mut self, offset: u32, bytes: &[u8]) -> bool {
        let Some((store, instance)) = self.inner.as_mut() else {
            return false;
        };
        let Some(memory) = instance.get_memory(&mut *store, MEMORY_EXPORT) else {
            return false;
        };
        let start = offset as usize;
        let Some(end) = start.checked_add(bytes.len()) else {
            return false;
        };
        match memory.data_mut(&mut *store).get_mut(start..end) {
            Some(dest) => {
                dest.copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }

    fn interrupter(&self) -> Option<Arc<dyn Interrupter>> {
        Some(Arc::new(EpochInterrupter {
            engine: self.engine.clone(),
        }))
    }

    fn close(&mut self) {
        self.inner = None;
    }
}

/// Traps running guests by bumping the engine epoch.
struct EpochInterrupter {
    engine: Engine,
}

impl Interrupter for EpochInterrupter {
    fn interrupt(&self) {
        self.engine.increment_epoch();
    }
}

/// Memory view handed to host callbacks during an import call.
struct WasmtimeGuestContext<'a, 'b> {
    caller: &'a mut Caller<'b, CompiledState>,
}

impl GuestContext for WasmtimeGuestContext<'_, '_> {
    fn memory_read(&mut self, offset: u32, len: u32) -> Option<Vec<u8>> {
        let memory = match self.caller.get_export(MEMORY_EXPORT) {
            Some(Extern::Memory(mem)) => mem,
            _ => return None,
        };
        let start = offset as usize;
        let end = start.checked_add(len as usize)?;
        memory.data(&*self.caller).get(start..end).map(<[u8]>::to_vec)
    }

    fn memory_write(&mut self, offset: u32, bytes: &[u8]) -> bool {
        let memory = match self.caller.get_export(MEMORY_EXPORT) {
            Some(Extern::Memory(mem)) => mem,
            _ => return false,
        };
        let start = offset as usize;
        let Some(end) = start.checked_add(bytes.len()) else {
            return false;
        };
        match memory.data_mut(&mut *self.caller).get_mut(start..end) {
            Some(dest) => {
                dest.copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }
}

fn register_host_module(
    engine: &Engine,
    linker: &mut Linker<CompiledState>,
    host_module: &HostModule,
) -> RuntimeResult<()> {
    for function in host_module.functions() {
        let ty = FuncType::new(
            engine,
            function.signature.params.iter().map(|k| valtype_of(*k)),
            function.signature.results.iter().map(|k| valtype_of(*k)),
        );
        let callback = Arc::clone(&function.callback);
        let name = function.name.clone();

        linker
            .func_new(
                host_module.name(),
                &function.name,
                ty,
                move |mut caller: Caller<'_, CompiledState>,
                      params: &[Val],
                      results: &mut [Val]|
                      -> wasmtime::Result<()> {
                    let mut args = Vec::with_capacity(params.len());
                    for param in params {
                        match value_from_wasmtime(param) {
                            Some(v) => args.push(v),
                            None => {
                                return Err(wasmtime::Error::msg(format!(
                                    "host import {name}: unsupported argument type"
                                )));
                            }
                        }
                    }

                    let mut ctx = WasmtimeGuestContext {
                        caller: &mut caller,
                    };
                    let out = callback(&mut ctx, &args)
                        .map_err(|fault| wasmtime::Error::msg(format!("{name}: {fault}")))?;

                    if out.len() != results.len() {
                        return Err(wasmtime::Error::msg(format!(
                            "host import {name} produced {} results, expected {}",
                            out.len(),
                            results.len()
                        )));
                    }
                    for (slot, value) in results.iter_mut().zip(out) {
                        *slot = value_to_wasmtime(value);
                    }
                    Ok(())
                },
            )
            .map_err(|e| RuntimeError::InstantiateFailed {
                reason: format!("failed to register host import {}: {e}", function.name),
            })?;
    }
    Ok(())
}

fn valtype_of(kind: ValueKind) -> ValType {
    match kind {
        ValueKind::I32 => ValType::I32,
        ValueKind::I64 => ValType::I64,
        ValueKind::F32 => ValType::F32,
        ValueKind::F64 => ValType::F64,
    }
}

fn value_to_wasmtime(value: Value) -> Val {
    match value {
        Value::I32(v) => Val::I32(v),
        Value::I64(v) => Val::I64(v),
        Value::F32(v) => Val::F32(v.to_bits()),
        Value::F64(v) => Val::F64(v.to_bits()),
    }
}

fn value_from_wasmtime(value: &Val) -> Option<Value> {
    match value {
        Val::I32(v) => Some(Value::I32(*v)),
        Val::I64(v) => Some(Value::I64(*v)),
        Val::F32(bits) => Some(Value::F32(f32::from_bits(*bits))),
        Val::F64(bits) => Some(Value::F64(f64::from_bits(*bits))),
        _ => None,
    }
}

fn zero_val(ty: &ValType) -> Val {
    match ty {
        ValType::I64 => Val::I64(0),
        ValType::F32 => Val::F32(0),
        ValType::F64 => Val::F64(0),
        _ => Val::I32(0),
    }
}

fn signature_from_wasmtime(ty: &FuncType) -> Option<FuncSignature> {
    let mut params = Vec::new();
    for p in ty.params() {
        params.push(kind_from_valtype(&p)?);
    }
    let mut results = Vec::new();
    for r in ty.results() {
        results.push(kind_from_valtype(&r)?);
    }
    Some(FuncSignature { params, results })
}

fn kind_from_valtype(ty: &ValType) -> Option<ValueKind> {
    match ty {
        ValType::I32 => Some(ValueKind::I32),
        ValType::I64 => Some(ValueKind::I64),
        ValType::F32 => Some(ValueKind::F32),
        ValType::F64 => Some(ValueKind::F64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostFunction;

    fn compile(wat: &str) -> RuntimeResult<Box<dyn CompiledModule>> {
        let bytes = match wat::parse_str(wat) {
            Ok(b) => b,
            Err(e) => {
                return Err(RuntimeError::CompileFailed {
                    reason: e.to_string(),
                });
            }
        };
        CompiledEngine::new()?.compile(&bytes)
    }

    #[test]
    fn compile_requires_memory_export() {
        let result = compile("(module)");
        assert!(matches!(result, Err(RuntimeError::MemoryExportMissing)));
    }

    #[test]
    fn call_and_memory_round_trip() -> RuntimeResult<()> {
        let module = compile(
            r#"(module
                (memory (export "memory") 1)
                (func (export "add") (param i32 i32) (result i32)
                    local.get 0
                    local.get 1
                    i32.add))"#,
        )?;
        let mut instance =
            module.instantiate(&HostModule::new("t"), &GuestEnvironment::default())?;

        let out = instance.call("add", &[Value::I32(40), Value::I32(2)])?;
        assert_eq!(out, vec![Value::I32(42)]);

        assert!(instance.memory_write(32, b"otel"));
        assert_eq!(instance.memory_read(32, 4), Some(b"otel".to_vec()));
        Ok(())
    }

    #[test]
    fn host_import_and_interrupter() -> RuntimeResult<()> {
        let module = compile(
            r#"(module
                (import "t" "echo" (func $echo (param i32) (result i32)))
                (memory (export "memory") 1)
                (func (export "go") (result i32)
                    i32.const 7
                    call $echo))"#,
        )?;

        let mut host = HostModule::new("t");
        host.push(HostFunction::new(
            "echo",
            FuncSignature::new(&[ValueKind::I32], &[ValueKind::I32]),
            |_, args| {
                let v = args.first().and_then(|a| a.as_i32()).unwrap_or(0);
                Ok(vec![Value::I32(v)])
            },
        ))?;

        let mut instance = module.instantiate(&host, &GuestEnvironment::default())?;
        assert_eq!(instance.call("go", &[])?, vec![Value::I32(7)]);
        assert!(instance.interrupter().is_some());
        Ok(())
    }

    #[test]
    fn guest_trap_is_reported() -> RuntimeResult<()> {
        let module = compile(
            r#"(module
                (memory (export "memory") 1)
                (func (export "bad") unreachable))"#,
        )?;
        let mut instance =
            module.instantiate(&HostModule::new("t"), &GuestEnvironment::default())?;
        let result = instance.call("bad", &[]);
        assert!(matches!(result, Err(RuntimeError::Trap { .. })));
        Ok(())
    }
}
