//! Plugin-config delivery to the guest.

use std::sync::Arc;

use otelwasm_plugin_abi::constants::host_function;
use otelwasm_runtime::{FuncSignature, HostFault, HostFunction, Value, ValueKind};

use super::arg_i32;

/// `get_plugin_config(buf, buf_limit) -> len`.
///
/// Writes the plugin-config JSON into guest memory at `buf` when it fits
/// within `buf_limit` and returns the number of bytes written; returns 0
/// when it does not fit, in which case the guest retries with a larger
/// buffer. A `buf` outside guest memory traps the guest.
pub(crate) fn get_plugin_config(config_json: Arc<[u8]>) -> HostFunction {
    HostFunction::new(
        host_function::GET_PLUGIN_CONFIG,
        FuncSignature::new(&[ValueKind::I32, ValueKind::I32], &[ValueKind::I32]),
        move |ctx, args| {
            let buf = arg_i32(host_function::GET_PLUGIN_CONFIG, args, 0)?;
            let buf_limit = arg_i32(host_function::GET_PLUGIN_CONFIG, args, 1)?;

            let fits = usize::try_from(buf_limit)
                .map(|limit| config_json.len() <= limit)
                .unwrap_or(false);
            if !fits {
                return Ok(vec![Value::I32(0)]);
            }

            if !ctx.memory_write(buf as u32, &config_json) {
                return Err(HostFault::new(format!(
                    "{}: buffer at {buf} is outside guest memory",
                    host_function::GET_PLUGIN_CONFIG
                )));
            }

            let len = i32::try_from(config_json.len()).map_err(|_| {
                HostFault::new(format!(
                    "{}: config of {} bytes does not fit an i32",
                    host_function::GET_PLUGIN_CONFIG,
                    config_json.len()
                ))
            })?;
            Ok(vec![Value::I32(len)])
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use otelwasm_runtime::GuestContext;

    /// A flat byte buffer standing in for guest memory.
    struct FakeMemory {
        data: Vec<u8>,
    }

    impl GuestContext for FakeMemory {
        fn memory_read(&mut self, offset: u32, len: u32) -> Option<Vec<u8>> {
            let start = offset as usize;
            let end = start.checked_add(len as usize)?;
            self.data.get(start..end).map(<[u8]>::to_vec)
        }

        fn memory_write(&mut self, offset: u32, bytes: &[u8]) -> bool {
            let start = offset as usize;
            let Some(end) = start.checked_add(bytes.len()) else {
                return false;
            };
            match self.data.get_mut(start..end) {
                Some(dest) => {
                    dest.copy_from_slice(bytes);
                    true
                }
                None => false,
            }
        }
    }

    fn call(f: &HostFunction, ctx: &mut FakeMemory, buf: i32, limit: i32) -> Result<i32, HostFault> {
        let out = (f.callback)(ctx, &[Value::I32(buf), Value::I32(limit)])?;
        out.first()
            .and_then(|v| v.as_i32())
            .ok_or_else(|| HostFault::new("no result"))
    }

    #[test]
    fn writes_json_when_it_fits() -> Result<(), HostFault> {
        let json: Arc<[u8]> = Arc::from(br#"{"mode":"redact"}"#.as_slice());
        let f = get_plugin_config(Arc::clone(&json));
        let mut mem = FakeMemory { data: vec![0; 64] };

        let len = call(&f, &mut mem, 8, 64)?;
        assert_eq!(len as usize, json.len());
        assert_eq!(mem.memory_read(8, len as u32).as_deref(), Some(&json[..]));
        Ok(())
    }

    #[test]
    fn returns_zero_when_it_does_not_fit() -> Result<(), HostFault> {
        let f = get_plugin_config(Arc::from(br#"{"k":"0123456789"}"#.as_slice()));
        let mut mem = FakeMemory { data: vec![0; 64] };
        assert_eq!(call(&f, &mut mem, 0, 4)?, 0);
        assert_eq!(call(&f, &mut mem, 0, -1)?, 0);
        Ok(())
    }

    #[test]
    fn out_of_bounds_buffer_traps() {
        let f = get_plugin_config(Arc::from(b"{}".as_slice()));
        let mut mem = FakeMemory { data: vec![0; 4] };
        let err = call(&f, &mut mem, 1000, 64);
        assert!(err.is_err());
    }
}
