use std::fs;

use cellmon_core::{CHANNELS, CalibrationParameters, CalibrationStore, JsonFileStore, StoreError};
use rstest::rstest;

fn defaults() -> CalibrationParameters {
    CalibrationParameters::new([1.5; CHANNELS], [7.0; CHANNELS]).unwrap()
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    let mut store = JsonFileStore::new(&path);
    let params =
        CalibrationParameters::new([1.04, 2.11, 3.02, 4.03], [-12.5, 0.0, 3.25, 40.0]).unwrap();
    store.save(&params).unwrap();
    assert_eq!(store.load(&defaults()).unwrap(), params);

    let text = fs::read_to_string(&path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["k"].as_array().unwrap().len(), CHANNELS);
    assert_eq!(json["o"].as_array().unwrap().len(), CHANNELS);
}

#[test]
fn last_write_wins() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonFileStore::new(dir.path().join("calibration.json"));
    store.save(&defaults()).unwrap();
    store.save(&CalibrationParameters::FACTORY).unwrap();
    assert_eq!(store.load(&defaults()).unwrap(), CalibrationParameters::FACTORY);
}

#[test]
fn gain_only_file_means_zero_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    fs::write(&path, r#"{"k":[1.1,2.2,3.3,4.4]}"#).unwrap();
    let p = JsonFileStore::new(&path).load(&defaults()).unwrap();
    assert_eq!(p.gains(), [1.1, 2.2, 3.3, 4.4]);
    assert_eq!(p.offsets_mv(), [0.0; CHANNELS]);
}

#[rstest]
#[case::negative_gain(r#"{"k":[1.1,-2.2,3.3,4.4],"o":[1,2,3,4]}"#, [1.1, 1.5, 3.3, 4.4], [1.0, 2.0, 3.0, 4.0])]
#[case::null_elements(r#"{"k":[null,2.2,3.3,4.4],"o":[1,null,3,4]}"#, [1.5, 2.2, 3.3, 4.4], [1.0, 7.0, 3.0, 4.0])]
#[case::short_arrays(r#"{"k":[1.1],"o":[1]}"#, [1.1, 1.5, 1.5, 1.5], [1.0, 7.0, 7.0, 7.0])]
#[case::wrong_types(r#"{"k":"fast","o":[1,2,3,4]}"#, [1.5; CHANNELS], [1.0, 2.0, 3.0, 4.0])]
fn bad_fields_keep_defaults(
    #[case] text: &str,
    #[case] gains: [f32; CHANNELS],
    #[case] offsets: [f32; CHANNELS],
) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    fs::write(&path, text).unwrap();
    let p = JsonFileStore::new(&path).load(&defaults()).unwrap();
    assert_eq!(p.gains(), gains);
    assert_eq!(p.offsets_mv(), offsets);
}

#[test]
fn unreadable_json_is_corrupt_and_missing_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    let store = JsonFileStore::new(&path);
    assert!(matches!(store.load(&defaults()), Err(StoreError::NotFound(_))));
    fs::write(&path, "k=1").unwrap();
    assert!(matches!(store.load(&defaults()), Err(StoreError::Corrupt(_))));
}

#[test]
fn save_into_missing_directory_creates_it() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonFileStore::new(dir.path().join("a/b/calibration.json"));
    store.save(&CalibrationParameters::FACTORY).unwrap();
    assert!(store.path().exists());
}
