#![no_main]

use libfuzzer_sys::fuzz_target;
use oraclegate::decision_trace::DecisionTracer;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let _ = DecisionTracer::from_json_lines(input);
    }
});
