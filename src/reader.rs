//! Raw extract reading.
//!
//! Loads a PLACES CSV with every column kept as text, so that coercion and
//! drop accounting happen in the cleaner rather than in Polars' type
//! inference, then maps the configured columns onto `RawRecord`s.

use crate::config::ColumnNames;
use crate::constants::artifact_columns as cols;
use crate::error::{PlacesError, Result};
use crate::models::RawRecord;
use polars::prelude::*;
use std::path::Path;
use tracing::debug;

fn ensure_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PlacesError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no such file: {}", path.display()),
        )))
    }
}

/// Read a CSV file with all columns as strings
pub fn read_string_frame(path: &Path) -> Result<DataFrame> {
    ensure_file(path)?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Column type of a derived artifact column; anything not listed is text
fn artifact_dtype(name: &str) -> Option<DataType> {
    match name {
        cols::LAT
        | cols::LNG
        | cols::POPULATION
        | cols::VALUE
        | cols::LOW_CONFIDENCE
        | cols::HIGH_CONFIDENCE => Some(DataType::Float64),
        cols::MEASURE_COUNT | cols::LOCATION_COUNT => Some(DataType::UInt32),
        _ => None,
    }
}

/// Read a derived artifact.
///
/// Identifier columns stay text so codes such as "06" or "01001" keep their
/// leading zeros; only the known numeric columns are cast.
pub fn read_artifact_frame(path: &Path) -> Result<DataFrame> {
    let mut df = read_string_frame(path)?;

    let numeric: Vec<(String, DataType)> = df
        .get_column_names()
        .iter()
        .filter_map(|name| artifact_dtype(name).map(|dtype| (name.to_string(), dtype)))
        .collect();
    for (name, dtype) in numeric {
        let cast = df.column(&name)?.cast(&dtype)?;
        df.with_column(cast)?;
    }

    Ok(df)
}

/// Text values of a column, `None` for nulls
pub fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)?;
    let values = column
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect();
    Ok(values)
}

/// Like `string_column`, but a missing column reads as all-null
pub fn optional_string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    if df.column(name).is_ok() {
        string_column(df, name)
    } else {
        debug!("Optional column '{}' absent, treating as empty", name);
        Ok(vec![None; df.height()])
    }
}

fn required_column(df: &DataFrame, path: &Path, name: &str) -> Result<Vec<Option<String>>> {
    if df.column(name).is_err() {
        return Err(PlacesError::MissingColumn {
            path: path.to_path_buf(),
            column: name.to_string(),
        });
    }
    string_column(df, name)
}

/// Read a raw extract into typed records
pub fn read_raw_records(path: &Path, columns: &ColumnNames) -> Result<Vec<RawRecord>> {
    if !path.exists() {
        return Err(PlacesError::RawInputNotFound {
            path: path.to_path_buf(),
        });
    }

    let df = read_string_frame(path)?;
    debug!(
        "Read raw extract {}: {} rows x {} columns",
        path.display(),
        df.height(),
        df.width()
    );

    let location_names = required_column(&df, path, &columns.location_name)?;
    let states = required_column(&df, path, &columns.state)?;
    let measures = required_column(&df, path, &columns.measure)?;
    let values = required_column(&df, path, &columns.value)?;
    let populations = required_column(&df, path, &columns.population)?;
    let geolocations = required_column(&df, path, &columns.geolocation)?;
    let units = optional_string_column(&df, &columns.value_unit)?;
    let value_types = optional_string_column(&df, &columns.value_type)?;
    let lows = optional_string_column(&df, &columns.low_confidence)?;
    let highs = optional_string_column(&df, &columns.high_confidence)?;
    let location_ids = match &columns.location_id {
        Some(name) => required_column(&df, path, name)?,
        None => vec![None; df.height()],
    };

    let mut records = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        records.push(RawRecord {
            location_name: location_names[i].clone(),
            location_id: location_ids[i].clone(),
            state: states[i].clone(),
            measure: measures[i].clone(),
            value: values[i].clone(),
            value_unit: units[i].clone(),
            value_type: value_types[i].clone(),
            low_confidence: lows[i].clone(),
            high_confidence: highs[i].clone(),
            population: populations[i].clone(),
            geolocation: geolocations[i].clone(),
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = "StateAbbr,StateDesc,LocationName,Measure,Data_Value_Unit,Data_Value_Type,Data_Value,Low_Confidence_Limit,High_Confidence_Limit,TotalPopulation,Geolocation";

    #[test]
    fn test_read_raw_records_maps_columns() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("raw.csv");
        fs::write(
            &path,
            format!(
                "{}\nCA,California,Fresno,Current asthma among adults aged >=18 years,%,Crude prevalence,9.8,9.5,10.1,\"494,665\",POINT (-119.79 36.78)\n",
                HEADER
            ),
        )
        .unwrap();

        let records = read_raw_records(&path, &ColumnNames::places()).unwrap();

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.location_name.as_deref(), Some("Fresno"));
        assert_eq!(r.state.as_deref(), Some("California"));
        assert_eq!(r.value.as_deref(), Some("9.8"));
        assert_eq!(r.population.as_deref(), Some("494,665"));
        assert_eq!(r.geolocation.as_deref(), Some("POINT (-119.79 36.78)"));
        assert_eq!(r.low_confidence.as_deref(), Some("9.5"));
    }

    #[test]
    fn test_read_raw_records_empty_fields_are_none() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("raw.csv");
        fs::write(
            &path,
            format!(
                "{}\nCA,California,Fresno,Obesity,%,Crude prevalence,,,,100,\n",
                HEADER
            ),
        )
        .unwrap();

        let records = read_raw_records(&path, &ColumnNames::places()).unwrap();

        assert_eq!(records[0].value, None);
        assert_eq!(records[0].geolocation, None);
    }

    #[test]
    fn test_read_raw_records_optional_columns_absent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("raw.csv");
        fs::write(
            &path,
            "StateDesc,LocationName,Measure,Data_Value,TotalPopulation,Geolocation\nTexas,Austin,Obesity,30.1,961855,POINT (-97.74 30.27)\n",
        )
        .unwrap();

        let records = read_raw_records(&path, &ColumnNames::places()).unwrap();

        assert_eq!(records[0].value_unit, None);
        assert_eq!(records[0].low_confidence, None);
        assert_eq!(records[0].value.as_deref(), Some("30.1"));
    }

    #[test]
    fn test_read_raw_records_missing_required_column() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("raw.csv");
        fs::write(&path, "StateDesc,LocationName,Measure\nTexas,Austin,Obesity\n").unwrap();

        let err = read_raw_records(&path, &ColumnNames::places()).unwrap_err();
        assert!(matches!(err, PlacesError::MissingColumn { ref column, .. } if column == "Data_Value"));
    }

    #[test]
    fn test_read_raw_records_county_fips_keeps_leading_zeros() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("county.csv");
        fs::write(
            &path,
            "StateDesc,CountyName,CountyFIPS,Measure,Data_Value,TotalPopulation,Geolocation\n\
             Alabama,Autauga,01001,Obesity,33.1,55869,POINT (-86.64 32.53)\n",
        )
        .unwrap();

        let records = read_raw_records(&path, &ColumnNames::county()).unwrap();

        assert_eq!(records[0].location_name.as_deref(), Some("Autauga"));
        assert_eq!(records[0].location_id.as_deref(), Some("01001"));
    }

    #[test]
    fn test_read_artifact_frame_keeps_codes_as_text() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Obesity.csv");
        fs::write(
            &path,
            "StateDesc,lat,lng,TotalPopulation,Data_Value,LocationCount,LocationName,Measure\n\
             06,36.7,-119.4,1200.0,17.5,2,06,2020\n",
        )
        .unwrap();

        let df = read_artifact_frame(&path).unwrap();

        assert_eq!(
            string_column(&df, "StateDesc").unwrap(),
            vec![Some("06".to_string())]
        );
        assert_eq!(
            string_column(&df, "Measure").unwrap(),
            vec![Some("2020".to_string())]
        );
        assert_eq!(df.column("Data_Value").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("LocationCount").unwrap().dtype(), &DataType::UInt32);
    }

    #[test]
    fn test_read_raw_records_missing_file() {
        let err = read_raw_records(Path::new("/nonexistent/raw.csv"), &ColumnNames::places())
            .unwrap_err();
        assert!(matches!(err, PlacesError::RawInputNotFound { .. }));
        assert!(err.is_not_found());
    }
}
