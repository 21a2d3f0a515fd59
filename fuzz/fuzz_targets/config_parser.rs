#![no_main]

use libfuzzer_sys::fuzz_target;
use oraclegate::config::RunConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Parsing and validation must reject bad input without panicking
        if let Ok(config) = RunConfig::from_toml_str(input) {
            // Anything accepted must survive a write/read cycle
            let written = config.to_toml_string().unwrap();
            assert_eq!(RunConfig::from_toml_str(&written).unwrap(), config);
        }
    }
});
