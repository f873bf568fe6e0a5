use cellmon_config::{BackoffKind, load_toml};
use rstest::rstest;

const FULL: &str = r#"
[bus]
i2c_bus = 1
address = 0x48
conversion_timeout_ms = 20

[sampling]
oversample = 8
settle_us = 125
interval_ms = 1000

[retry]
max_attempts = 3
backoff = "exponential"
backoff_ms = 2
max_backoff_ms = 16

[calibration]
file = "/var/lib/cellmon/calibration.json"
default_gain = [1.042, 2.109, 3.023, 4.033]
default_offset_mv = [0.0, 0.0, 0.0, 0.0]

[taps]
min_mv = [3400.0, 6800.0, 10200.0, 13600.0]
max_mv = [4200.0, 8400.0, 12600.0, 16800.0]

[csv_log]
path = "log.csv"
max_bytes = 512000
utc_offset_s = -10800

[logging]
level = "info"
rotation = "daily"
"#;

#[test]
fn accepts_full_config() {
    let cfg = load_toml(FULL).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.retry.backoff, BackoffKind::Exponential);
    assert_eq!(cfg.csv_log.path.as_deref(), Some("log.csv"));
    assert_eq!(cfg.csv_log.utc_offset_s, -10800);
}

#[test]
fn unknown_backoff_kind_is_a_parse_error() {
    let toml = "[retry]\nbackoff = \"random\"\n";
    assert!(load_toml(toml).is_err());
}

#[rstest]
#[case("[sampling]\noversample = 0\n", "sampling.oversample must be in [1, 64]")]
#[case("[sampling]\ninterval_ms = 0\n", "sampling.interval_ms must be >= 1")]
#[case("[retry]\nmax_attempts = 0\n", "retry.max_attempts must be in [1, 10]")]
#[case(
    "[retry]\nbackoff_ms = 20\nmax_backoff_ms = 10\n",
    "retry.max_backoff_ms must be >= retry.backoff_ms"
)]
#[case(
    "[calibration]\ndefault_gain = [1.0, 0.0, 1.0, 1.0]\n",
    "calibration.default_gain[1] must be finite and > 0"
)]
#[case(
    "[calibration]\nmin_reference_mv = 20000.0\nmax_reference_mv = 3000.0\n",
    "calibration reference band"
)]
#[case(
    "[taps]\nmin_mv = [3400.0, 9000.0, 10200.0, 13600.0]\n",
    "taps window 1 must satisfy min_mv < max_mv"
)]
#[case("[bus]\naddress = 0x90\n", "bus.address must be a 7-bit address")]
#[case("[csv_log]\nmax_bytes = 10\n", "csv_log.max_bytes must be >= 1024")]
#[case("[logging]\nrotation = \"weekly\"\n", "logging.rotation must be one of")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "error {err} does not mention {needle}"
    );
}
