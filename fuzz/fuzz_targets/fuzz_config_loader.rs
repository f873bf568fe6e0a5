#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = cellmon_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // A validated config must always convert into runtime settings.
            let _ = cellmon_core::MonitorCfg::try_from(&cfg).unwrap();
        }
    }
});
