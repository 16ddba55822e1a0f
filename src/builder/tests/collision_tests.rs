//! Measure key collisions across a build

use super::{OBESITY, raw_row, test_config, write_raw};
use crate::builder::DerivedArtifactBuilder;
use crate::constants::artifact_columns as cols;
use crate::reader::{read_string_frame, string_column};
use tempfile::TempDir;

const URBAN: &str = "Cancer (excluding skin cancer) among adults aged >=18 years in urban areas";
const RURAL: &str = "Cancer (excluding skin cancer) among adults aged >=18 years in rural areas";

fn colliding_rows() -> Vec<String> {
    vec![
        raw_row("Ohio", "Columbus", URBAN, 6.1, "900", -83.0, 40.0),
        raw_row("Ohio", "Athens", RURAL, 7.2, "25", -82.1, 39.3),
        raw_row("Ohio", "Columbus", OBESITY, 33.0, "900", -83.0, 40.0),
    ]
}

#[tokio::test]
async fn test_colliding_labels_are_all_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let raw = write_raw(temp_dir.path(), &colliding_rows());
    let out = temp_dir.path().join("data");

    let builder = DerivedArtifactBuilder::new(&raw, test_config(&out));
    assert_eq!(builder.measure_key(URBAN), builder.measure_key(RURAL));

    let report = builder.build().await.unwrap();

    assert_eq!(report.measures_built, 1);
    assert_eq!(report.failures.len(), 2);
    let labels: Vec<&str> = report.failures.iter().map(|f| f.label.as_str()).collect();
    assert!(labels.contains(&URBAN));
    assert!(labels.contains(&RURAL));
    for failure in &report.failures {
        assert_eq!(failure.key, builder.measure_key(URBAN).as_str());
        assert!(failure.reason.contains("collision"));
    }

    let file_name = builder.measure_file_name(URBAN);
    assert!(!builder.layout().measure_file(&file_name).exists());
    assert!(!builder.layout().state_measure_file(&file_name).exists());

    let catalog = read_string_frame(&builder.layout().catalog_path()).unwrap();
    assert_eq!(
        string_column(&catalog, cols::MEASURE_CLEAN).unwrap(),
        vec![Some(OBESITY.to_string())]
    );
}

#[tokio::test]
async fn test_collision_removes_stale_partition() {
    let temp_dir = TempDir::new().unwrap();
    let out = temp_dir.path().join("data");

    // First extract only has the urban label, so its partition gets written
    let raw = write_raw(temp_dir.path(), &colliding_rows()[..1]);
    let builder = DerivedArtifactBuilder::new(&raw, test_config(&out));
    builder.build().await.unwrap();
    let partition = builder
        .layout()
        .measure_file(&builder.measure_file_name(URBAN));
    assert!(partition.exists());

    let raw = write_raw(temp_dir.path(), &colliding_rows());
    let builder = DerivedArtifactBuilder::new(&raw, test_config(&out));
    builder.build().await.unwrap();

    assert!(!partition.exists());
}
