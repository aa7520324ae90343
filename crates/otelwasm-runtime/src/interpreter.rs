//! The `wasmi` interpreter back-end.
//!
//! Portable default engine: no codegen, no platform restrictions. Host
//! imports are registered from the [`HostModule`] record; the
//! system-interface subset (`wasi_snapshot_preview1`) is wired by hand
//! since telemetry guests only touch environment variables, the clock,
//! standard streams, and the random source.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use wasmi::{
    AsContext, AsContextMut, Caller, Engine, Extern, ExternType, Func, FuncType, Instance, Linker,
    Module, Store, Val, ValType,
};

use crate::engine::{CompiledModule, EngineKind, InstanceHandle, Interrupter, WasmEngine};
use crate::environment::GuestEnvironment;
use crate::error::{RuntimeError, RuntimeResult};
use crate::host::{GuestContext, HostModule};
use crate::value::{FuncSignature, Value, ValueKind};

/// Name of the linear memory export every plugin must provide.
pub(crate) const MEMORY_EXPORT: &str = "memory";

/// Reactor start export run once after instantiation.
pub(crate) const INITIALIZE_EXPORT: &str = "_initialize";

const WASI_MODULE: &str = "wasi_snapshot_preview1";

const ERRNO_SUCCESS: i32 = 0;
const ERRNO_BADF: i32 = 8;
const ERRNO_INVAL: i32 = 28;

/// The interpreter engine.
pub struct InterpreterEngine {
    engine: Engine,
}

impl InterpreterEngine {
    /// A fresh interpreter engine with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            engine: Engine::default(),
        }
    }
}

impl Default for InterpreterEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl WasmEngine for InterpreterEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Interpreter
    }

    fn compile(&self, bytes: &[u8]) -> RuntimeResult<Box<dyn CompiledModule>> {
        let module = Module::new(&self.engine, bytes).map_err(|e| RuntimeError::CompileFailed {
            reason: e.to_string(),
        })?;

        let has_memory = module
            .exports()
            .any(|e| e.name() == MEMORY_EXPORT && matches!(e.ty(), ExternType::Memory(_)));
        if !has_memory {
            return Err(RuntimeError::MemoryExportMissing);
        }

        Ok(Box::new(InterpreterModule {
            engine: self.engine.clone(),
            module,
        }))
    }
}

/// A compiled (validated) module ready to instantiate.
pub struct InterpreterModule {
    engine: Engine,
    module: Module,
}

/// Store state for the interpreter back-end: what the WASI shim reads.
struct InterpState {
    env: GuestEnvironment,
    // xorshift64 state for random_get; seeded from the clock once per
    // instance. Guests needing cryptographic entropy are out of scope.
    rng: u64,
}

impl InterpState {
    fn next_random(&mut self) -> u64 {
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng = x;
        x
    }
}

impl CompiledModule for InterpreterModule {
    fn instantiate(
        &self,
        host_module: &HostModule,
        env: &GuestEnvironment,
    ) -> RuntimeResult<Box<dyn InstanceHandle>> {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
            | 1;
        let state = InterpState {
            env: env.clone(),
            rng: seed,
        };

        let mut store = Store::new(&self.engine, state);
        let mut linker = <Linker<InterpState>>::new(&self.engine);

        register_host_module(&mut linker, host_module)?;
        register_wasi_subset(&mut linker)?;

        let instance = linker
            .instantiate(&mut store, &self.module)
            .and_then(|pre| pre.start(&mut store))
            .map_err(|e| RuntimeError::InstantiateFailed {
                reason: e.to_string(),
            })?;

        let mut handle = InterpreterInstance {
            inner: Some((store, instance)),
        };

        // Reactor-style modules expose their constructors through
        // `_initialize` rather than the wasm start section.
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

/// A live interpreter instance.
pub struct InterpreterInstance {
    inner: Option<(Store<InterpState>, Instance)>,
}

impl InterpreterInstance {
    fn func(&mut self, name: &str) -> Option<(Func, FuncType)> {
        let (store, instance) = self.inner.as_mut()?;
        let func = instance.get_export(&mut *store, name)?.into_func()?;
        let ty = func.ty(&*store);
        Some((func, ty))
    }
}

impl InstanceHandle for InterpreterInstance {
    fn export(&mut self, name: &str) -> Option<FuncSignature> {
        let (_, ty) = self.func(name)?;
        signature_from_wasmi(&ty)
    }

    fn call(&mut self, name: &str, args: &[Value]) -> RuntimeResult<Vec<Value>> {
        if self.inner.is_none() {
            return Err(RuntimeError::Closed);
        }
        let (func, ty) = self.func(name).ok_or_else(|| RuntimeError::ExportNotFound {
            export: name.to_owned(),
        })?;

        let params: Vec<Val> = args.iter().map(|v| value_to_wasmi(*v)).collect();
        let mut results: Vec<Val> = ty.results().iter().map(|t| zero_val(t)).collect();

        let Some((store, _)) = self.inner.as_mut() else {
            return Err(RuntimeError::Closed);
        };
        func.call(&mut *store, &params, &mut results)
            .map_err(|e| RuntimeError::Trap {
                export: name.to_owned(),
                reason: e.to_string(),
            })?;

        results
            .iter()
            .map(|v| {
                value_from_wasmi(v).ok_or_else(|| RuntimeError::UnsupportedValueType {
                    value_type: format!("{:?}", v.ty()),
                })
            })
            .collect()
    }

    fn memory_read(&mut self, offset: u32, len: u32) -> Option<Vec<u8>> {
        let (store, instance) = self.inner.as_mut()?;
        let memory = instance.get_export(&mut *store, MEMORY_EXPORT)?.into_memory()?;
        let start = offset as usize;
        let end = start.checked_add(len as usize)?;
        memory.data(&*store).get(start..end).map(<[u8]>::to_vec)
    }

    fn memory_write(&mut self, offset: u32, bytes: &[u8]) -> bool {
        let Some((store, instance)) = self.inner.as_mut() else {
            return false;
        };
        let Some(memory) = instance
            .get_export(&mut *store, MEMORY_EXPORT)
            .and_then(Extern::into_memory)
        else {
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
        // The interpreter has no cross-thread interruption point.
        None
    }

    fn close(&mut self) {
        self.inner = None;
    }
}

/// Memory view handed to host callbacks while a guest call is on the
/// stack.
struct InterpGuestContext<'a, 'b> {
    caller: &'a mut Caller<'b, InterpState>,
}

impl GuestContext for InterpGuestContext<'_, '_> {
    fn memory_read(&mut self, offset: u32, len: u32) -> Option<Vec<u8>> {
        let memory = self
            .caller
            .get_export(MEMORY_EXPORT)
            .and_then(Extern::into_memory)?;
        let start = offset as usize;
        let end = start.checked_add(len as usize)?;
        memory
            .data(self.caller.as_context())
            .get(start..end)
            .map(<[u8]>::to_vec)
    }

    fn memory_write(&mut self, offset: u32, bytes: &[u8]) -> bool {
        let Some(memory) = self
            .caller
            .get_export(MEMORY_EXPORT)
            .and_then(Extern::into_memory)
        else {
            return false;
        };
        let start = offset as usize;
        let Some(end) = start.checked_add(bytes.len()) else {
            return false;
        };
        match memory.data_mut(self.caller.as_context_mut()).get_mut(start..end) {
            Some(dest) => {
                dest.copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }
}

fn register_host_module(
    linker: &mut Linker<InterpState>,
    host_module: &HostModule,
) -> RuntimeResult<()> {
    for function in host_module.functions() {
        let ty = FuncType::new(
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
                move |mut caller: Caller<'_, InterpState>, params: &[Val], results: &mut [Val]| {
                    let mut args = Vec::with_capacity(params.len());
                    for param in params {
                        match value_from_wasmi(param) {
                            Some(v) => args.push(v),
                            None => {
                                return Err(wasmi::Error::new(format!(
                                    "host import {name}: unsupported argument type"
                                )));
                            }
                        }
                    }

                    let mut ctx = InterpGuestContext {
                        caller: &mut caller,
                    };
                    let out = callback(&mut ctx, &args)
                        .map_err(|fault| wasmi::Error::new(format!("{name}: {fault}")))?;

                    if out.len() != results.len() {
                        return Err(wasmi::Error::new(format!(
                            "host import {name} produced {} results, expected {}",
                            out.len(),
                            results.len()
                        )));
                    }
                    for (slot, value) in results.iter_mut().zip(out) {
                        *slot = value_to_wasmi(value);
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

/// Wire the `wasi_snapshot_preview1` subset guests link against.
fn register_wasi_subset(linker: &mut Linker<InterpState>) -> RuntimeResult<()> {
    let map_err = |name: &str| {
        let name = name.to_owned();
        move |e: wasmi::errors::LinkerError| RuntimeError::InstantiateFailed {
            reason: format!("failed to register {WASI_MODULE}.{name}: {e}"),
        }
    };

    linker
        .func_wrap(
            WASI_MODULE,
            "environ_sizes_get",
            |mut caller: Caller<'_, InterpState>, environc: i32, environ_buf_size: i32| -> i32 {
                let (count, bytes) = environ_layout(&caller.data().env);
                let ok = write_u32(&mut caller, environc, count)
                    && write_u32(&mut caller, environ_buf_size, bytes);
                if ok { ERRNO_SUCCESS } else { ERRNO_INVAL }
            },
        )
        .map_err(map_err("environ_sizes_get"))?;

    linker
        .func_wrap(
            WASI_MODULE,
            "environ_get",
            |mut caller: Caller<'_, InterpState>, environ: i32, environ_buf: i32| -> i32 {
                let entries: Vec<Vec<u8>> = caller
                    .data()
                    .env
                    .env_vars
                    .iter()
                    .map(|(k, v)| format!("{k}={v}\0").into_bytes())
                    .collect();
                if write_string_table(&mut caller, environ, environ_buf, &entries) {
                    ERRNO_SUCCESS
                } else {
                    ERRNO_INVAL
                }
            },
        )
        .map_err(map_err("environ_get"))?;

    linker
        .func_wrap(
            WASI_MODULE,
            "args_sizes_get",
            |mut caller: Caller<'_, InterpState>, argc: i32, argv_buf_size: i32| -> i32 {
                let count = caller.data().env.args.len() as u32;
                let bytes: u32 = caller
                    .data()
                    .env
                    .args
                    .iter()
                    .map(|a| a.len() as u32 + 1)
                    .sum();
                let ok =
                    write_u32(&mut caller, argc, count) && write_u32(&mut caller, argv_buf_size, bytes);
                if ok { ERRNO_SUCCESS } else { ERRNO_INVAL }
            },
        )
        .map_err(map_err("args_sizes_get"))?;

    linker
        .func_wrap(
            WASI_MODULE,
            "args_get",
            |mut caller: Caller<'_, InterpState>, argv: i32, argv_buf: i32| -> i32 {
                let entries: Vec<Vec<u8>> = caller
                    .data()
                    .env
                    .args
                    .iter()
                    .map(|a| format!("{a}\0").into_bytes())
                    .collect();
                if write_string_table(&mut caller, argv, argv_buf, &entries) {
                    ERRNO_SUCCESS
                } else {
                    ERRNO_INVAL
                }
            },
        )
        .map_err(map_err("args_get"))?;

    linker
        .func_wrap(
            WASI_MODULE,
            "clock_time_get",
            |mut caller: Caller<'_, InterpState>, _id: i32, _precision: i64, time: i32| -> i32 {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_nanos() as u64)
                    .unwrap_or(0);
                if write_bytes(&mut caller, time, &now.to_le_bytes()) {
                    ERRNO_SUCCESS
                } else {
                    ERRNO_INVAL
                }
            },
        )
        .map_err(map_err("clock_time_get"))?;

    linker
        .func_wrap(
            WASI_MODULE,
            "fd_write",
            |mut caller: Caller<'_, InterpState>,
             fd: i32,
             iovs: i32,
             iovs_len: i32,
             nwritten: i32|
             -> i32 {
                if fd != 1 && fd != 2 {
                    return ERRNO_BADF;
                }
                let mut written: u32 = 0;
                let mut output = Vec::new();
                for i in 0..iovs_len {
                    let iov_addr = iovs.wrapping_add(i.wrapping_mul(8));
                    let Some(base) = read_u32(&mut caller, iov_addr) else {
                        return ERRNO_INVAL;
                    };
                    let Some(len) = read_u32(&mut caller, iov_addr.wrapping_add(4)) else {
                        return ERRNO_INVAL;
                    };
                    let Some(chunk) = read_bytes(&mut caller, base as i32, len) else {
                        return ERRNO_INVAL;
                    };
                    output.extend_from_slice(&chunk);
                    written = written.wrapping_add(len);
                }
                if caller.data().env.inherit_stdio {
                    let text = String::from_utf8_lossy(&output);
                    for line in text.lines().filter(|l| !l.is_empty()) {
                        if fd == 2 {
                            tracing::warn!(target: "otelwasm::guest", "{}", line);
                        } else {
                            tracing::info!(target: "otelwasm::guest", "{}", line);
                        }
                    }
                }
                if write_u32(&mut caller, nwritten, written) {
                    ERRNO_SUCCESS
                } else {
                    ERRNO_INVAL
                }
            },
        )
        .map_err(map_err("fd_write"))?;

    linker
        .func_wrap(
            WASI_MODULE,
            "random_get",
            |mut caller: Caller<'_, InterpState>, buf: i32, buf_len: i32| -> i32 {
                if buf_len < 0 {
                    return ERRNO_INVAL;
                }
                let mut bytes = Vec::with_capacity(buf_len as usize);
                while bytes.len() < buf_len as usize {
                    let word = caller.data_mut().next_random().to_le_bytes();
                    let take = (buf_len as usize - bytes.len()).min(8);
                    bytes.extend_from_slice(word.get(..take).unwrap_or(&word));
                }
                if write_bytes(&mut caller, buf, &bytes) {
                    ERRNO_SUCCESS
                } else {
                    ERRNO_INVAL
                }
            },
        )
        .map_err(map_err("random_get"))?;

    linker
        .func_wrap(
            WASI_MODULE,
            "proc_exit",
            |_caller: Caller<'_, InterpState>, code: i32| -> Result<(), wasmi::Error> {
                Err(wasmi::Error::new(format!("guest called proc_exit({code})")))
            },
        )
        .map_err(map_err("proc_exit"))?;

    linker
        .func_wrap(
            WASI_MODULE,
            "sched_yield",
            |_caller: Caller<'_, InterpState>| -> i32 {
                std::thread::yield_now();
                ERRNO_SUCCESS
            },
        )
        .map_err(map_err("sched_yield"))?;

    Ok(())
}

fn environ_layout(env: &GuestEnvironment) -> (u32, u32) {
    let count = env.env_vars.len() as u32;
    let bytes: u32 = env
        .env_vars
        .iter()
        .map(|(k, v)| (k.len() + v.len() + 2) as u32)
        .sum();
    (count, bytes)
}

fn caller_memory(caller: &mut Caller<'_, InterpState>) -> Option<wasmi::Memory> {
    caller.get_export(MEMORY_EXPORT).and_then(Extern::into_memory)
}

fn read_bytes(caller: &mut Caller<'_, InterpState>, ptr: i32, len: u32) -> Option<Vec<u8>> {
    let memory = caller_memory(caller)?;
    let start = usize::try_from(ptr).ok()?;
    let end = start.checked_add(len as usize)?;
    memory
        .data(caller.as_context())
        .get(start..end)
        .map(<[u8]>::to_vec)
}

fn read_u32(caller: &mut Caller<'_, InterpState>, ptr: i32) -> Option<u32> {
    let bytes = read_bytes(caller, ptr, 4)?;
    let arr: [u8; 4] = bytes.as_slice().try_into().ok()?;
    Some(u32::from_le_bytes(arr))
}

fn write_bytes(caller: &mut Caller<'_, InterpState>, ptr: i32, bytes: &[u8]) -> bool {
    let Some(memory) = caller_memory(caller) else {
        return false;
    };
    let Ok(start) = usize::try_from(ptr) else {
        return false;
    };
    let Some(end) = start.checked_add(bytes.len()) else {
        return false;
    };
    match memory.data_mut(caller.as_context_mut()).get_mut(start..end) {
        Some(dest) => {
            dest.copy_from_slice(bytes);
            true
        }
        None => false,
    }
}

fn write_u32(caller: &mut Caller<'_, InterpState>, ptr: i32, value: u32) -> bool {
    write_bytes(caller, ptr, &value.to_le_bytes())
}

/// Write a WASI string table: a vector of pointers at `table_ptr` and the
/// NUL-terminated strings themselves at `buf_ptr`.
fn write_string_table(
    caller: &mut Caller<'_, InterpState>,
    table_ptr: i32,
    buf_ptr: i32,
    entries: &[Vec<u8>],
) -> bool {
    let mut slot = table_ptr;
    let mut cursor = buf_ptr;
    for entry in entries {
        if !write_u32(caller, slot, cursor as u32) {
            return false;
        }
        if !write_bytes(caller, cursor, entry) {
            return false;
        }
        slot = slot.wrapping_add(4);
        cursor = cursor.wrapping_add(entry.len() as i32);
    }
    true
}

fn valtype_of(kind: ValueKind) -> ValType {
    match kind {
        ValueKind::I32 => ValType::I32,
        ValueKind::I64 => ValType::I64,
        ValueKind::F32 => ValType::F32,
        ValueKind::F64 => ValType::F64,
    }
}

fn value_to_wasmi(value: Value) -> Val {
    match value {
        Value::I32(v) => Val::I32(v),
        Value::I64(v) => Val::I64(v),
        Value::F32(v) => Val::F32(v.into()),
        Value::F64(v) => Val::F64(v.into()),
    }
}

fn value_from_wasmi(value: &Val) -> Option<Value> {
    match value {
        Val::I32(v) => Some(Value::I32(*v)),
        Val::I64(v) => Some(Value::I64(*v)),
        Val::F32(v) => Some(Value::F32(v.to_float())),
        Val::F64(v) => Some(Value::F64(v.to_float())),
        _ => None,
    }
}

fn zero_val(ty: &ValType) -> Val {
    match ty {
        ValType::I64 => Val::I64(0),
        ValType::F32 => Val::F32(0.0f32.into()),
        ValType::F64 => Val::F64(0.0f64.into()),
        _ => Val::I32(0),
    }
}

fn signature_from_wasmi(ty: &FuncType) -> Option<FuncSignature> {
    let mut params = Vec::with_capacity(ty.params().len());
    for p in ty.params() {
        params.push(kind_from_valtype(p)?);
    }
    let mut results = Vec::with_capacity(ty.results().len());
    for r in ty.results() {
        results.push(kind_from_valtype(r)?);
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
        InterpreterEngine::new().compile(&bytes)
    }

    #[test]
    fn compile_rejects_garbage() {
        let err = InterpreterEngine::new().compile(b"not wasm");
        assert!(matches!(err, Err(RuntimeError::CompileFailed { .. })));
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

        assert!(instance.memory_write(16, b"otel"));
        assert_eq!(instance.memory_read(16, 4), Some(b"otel".to_vec()));
        assert_eq!(instance.memory_read(u32::MAX, 4), None);
        Ok(())
    }

    #[test]
    fn host_import_reaches_guest_memory() -> RuntimeResult<()> {
        let module = compile(
            r#"(module
                (import "t" "probe" (func $probe (param i32 i32) (result i32)))
                (memory (export "memory") 1)
                (data (i32.const 8) "ping")
                (func (export "go") (result i32)
                    i32.const 8
                    i32.const 4
                    call $probe))"#,
        )?;

        let mut host = HostModule::new("t");
        host.push(HostFunction::new(
            "probe",
            FuncSignature::new(&[ValueKind::I32, ValueKind::I32], &[ValueKind::I32]),
            |ctx, args| {
                let ptr = args.first().and_then(|v| v.as_i32()).unwrap_or(0);
                let len = args.get(1).and_then(|v| v.as_i32()).unwrap_or(0);
                let bytes = ctx.memory_read(ptr as u32, len as u32);
                Ok(vec![Value::I32(i32::from(bytes.as_deref() == Some(b"ping")))])
            },
        ))?;

        let mut instance = module.instantiate(&host, &GuestEnvironment::default())?;
        assert_eq!(instance.call("go", &[])?, vec![Value::I32(1)]);
        Ok(())
    }

    #[test]
    fn host_fault_becomes_trap() -> RuntimeResult<()> {
        let module = compile(
            r#"(module
                (import "t" "boom" (func $boom))
                (memory (export "memory") 1)
                (func (export "go") call $boom))"#,
        )?;

        let mut host = HostModule::new("t");
        host.push(HostFunction::new(
            "boom",
            FuncSignature::default(),
            |_, _| Err(crate::host::HostFault::new("payload out of bounds")),
        ))?;

        let mut instance = module.instantiate(&host, &GuestEnvironment::default())?;
        let err = instance.call("go", &[]);
        match err {
            Err(RuntimeError::Trap { export, reason }) => {
                assert_eq!(export, "go");
                assert!(reason.contains("payload out of bounds"));
            }
            other => assert!(other.is_err(), "expected trap, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn initialize_runs_on_instantiation() -> RuntimeResult<()> {
        let module = compile(
            r#"(module
                (memory (export "memory") 1)
                (global $ready (mut i32) (i32.const 0))
                (func (export "_initialize") (global.set $ready (i32.const 1)))
                (func (export "is_ready") (result i32) (global.get $ready)))"#,
        )?;
        let mut instance =
            module.instantiate(&HostModule::new("t"), &GuestEnvironment::default())?;
        assert_eq!(instance.call("is_ready", &[])?, vec![Value::I32(1)]);
        Ok(())
    }

    #[test]
    fn close_is_idempotent_and_final() -> RuntimeResult<()> {
        let module = compile(
            r#"(module
                (memory (export "memory") 1)
                (func (export "id") (param i32) (result i32) local.get 0))"#,
        )?;
        let mut instance =
            module.instantiate(&HostModule::new("t"), &GuestEnvironment::default())?;
        instance.close();
        instance.close();
        assert!(matches!(
            instance.call("id", &[Value::I32(1)]),
            Err(RuntimeError::Closed)
        ));
        assert_eq!(instance.memory_read(0, 1), None);
        assert!(!instance.memory_write(0, b"x"));
        Ok(())
    }
}
