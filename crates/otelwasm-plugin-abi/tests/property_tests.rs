//! Property tests for the ABI wire mappings.

use otelwasm_plugin_abi::{Capabilities, Signal, Status, StatusCode};
use proptest::prelude::*;

proptest! {
    /// Every i32 maps to exactly one status code and maps back to itself.
    #[test]
    fn status_code_mapping_is_total_and_lossless(value in any::<i32>()) {
        let code = StatusCode::from_i32(value);
        prop_assert_eq!(code.as_i32(), value);
        prop_assert_eq!(code.is_ok(), value == 0);
    }

    /// The rendered status always contains the code name, and the reason
    /// whenever one is present and non-empty.
    #[test]
    fn status_render_carries_code_and_reason(value in any::<i32>(), reason in "[a-z ]{1,32}") {
        let status = Status::with_reason(StatusCode::from_i32(value), reason.clone());
        let rendered = status.to_string();
        prop_assert!(rendered.contains(&StatusCode::from_i32(value).to_string()));
        prop_assert!(rendered.contains(&reason));
    }

    /// Capability gating looks at exactly one bit per signal.
    #[test]
    fn capability_bits_are_independent(bits in any::<u32>()) {
        let caps = Capabilities::from_bits(bits);
        prop_assert_eq!(caps.supports(Signal::Metrics), bits & 0b001 != 0);
        prop_assert_eq!(caps.supports(Signal::Logs), bits & 0b010 != 0);
        prop_assert_eq!(caps.supports(Signal::Traces), bits & 0b100 != 0);
        prop_assert_eq!(caps.bits(), bits);
    }
}

#[test]
fn signals_have_distinct_bits_and_exports() {
    let mut bits: Vec<u32> = Signal::ALL.iter().map(|s| s.bit()).collect();
    bits.sort_unstable();
    assert_eq!(bits, vec![0, 1, 2]);

    let mut exports: Vec<&str> = Signal::ALL.iter().map(|s| s.consume_export()).collect();
    exports.sort_unstable();
    exports.dedup();
    assert_eq!(exports.len(), 3);
}
