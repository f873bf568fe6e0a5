use std::fs;

use cellmon_config::{CalibrationRecord, parse_calibration_json};
use rstest::rstest;
use tempfile::tempdir;

#[rstest]
fn record_round_trips_through_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    let rec = CalibrationRecord {
        k: [1.05, 2.1, 3.0, 4.0],
        o: [-12.5, 0.0, 3.25, 40.0],
    };
    fs::write(&path, rec.to_json().unwrap()).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let p = parse_calibration_json(&text).unwrap();
    assert_eq!(p.k, rec.k.map(Some));
    assert_eq!(p.o, rec.o.map(Some));
    assert!(p.offsets_present);
}

#[rstest]
fn gain_only_file_has_no_offsets() {
    let p = parse_calibration_json(r#"{"k":[1.0,2.0,3.0,4.0]}"#).unwrap();
    assert_eq!(p.k, [Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);
    assert_eq!(p.o, [None; 4]);
    assert!(!p.offsets_present);
}

#[rstest]
#[case(r#"{"k":{"a":1}}"#)]
#[case(r#"{"k":"1.0"}"#)]
#[case(r#"{}"#)]
fn non_array_fields_are_ignored(#[case] text: &str) {
    let p = parse_calibration_json(text).unwrap();
    assert_eq!(p.k, [None; 4]);
}

#[rstest]
fn short_array_fills_leading_channels_only() {
    let p = parse_calibration_json(r#"{"k":[1.1,2.2],"o":[5.0]}"#).unwrap();
    assert_eq!(p.k, [Some(1.1), Some(2.2), None, None]);
    assert_eq!(p.o, [Some(5.0), None, None, None]);
    assert!(p.offsets_present);
}

#[rstest]
#[case("")]
#[case("not json")]
#[case("[1,2,3,4]")]
#[case(r#"{"k":[1.0,2.0"#)]
fn unparseable_text_is_an_error(#[case] text: &str) {
    let err = parse_calibration_json(text).expect_err("should fail");
    assert!(format!("{err}").contains("invalid calibration JSON"));
}
