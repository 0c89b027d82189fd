//! CSV export of the cleaned update mapping

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::Writer;

use crate::ingest::{AdmissionRecord, ValueMap};

/// Files written by [`export_update_data`]
#[derive(Debug, Clone)]
pub struct ExportedFiles {
    pub data: PathBuf,
    pub sample: PathBuf,
    pub rows: usize,
}

/// Write `<prefix>_update_data.csv` with every mapping row and
/// `<prefix>_update_sample.csv` with the first `sample_rows`.
/// Columns: id, the target column, college, major, region.
pub fn export_update_data(
    records: &[AdmissionRecord],
    values: &ValueMap,
    column: &str,
    dir: &Path,
    prefix: &str,
    sample_rows: usize,
) -> Result<ExportedFiles> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let mut by_id: HashMap<i64, &AdmissionRecord> = HashMap::with_capacity(records.len());
    for record in records {
        by_id.entry(record.id).or_insert(record);
    }

    let rows: Vec<[String; 5]> = values
        .entries()
        .iter()
        .map(|(id, value)| {
            let record = by_id.get(id);
            [
                id.to_string(),
                value.as_plain(),
                record.map(|r| r.college_name.clone()).unwrap_or_default(),
                record.map(|r| r.major_name.clone()).unwrap_or_default(),
                record.map(|r| r.source_region.clone()).unwrap_or_default(),
            ]
        })
        .collect();

    let header = [
        "id",
        column,
        "college_name_excel",
        "major_name_excel",
        "source_province",
    ];

    let data = dir.join(format!("{}_update_data.csv", prefix));
    write_rows(&data, &header, &rows)?;

    let sample = dir.join(format!("{}_update_sample.csv", prefix));
    write_rows(&sample, &header, &rows[..rows.len().min(sample_rows)])?;

    log::info!(
        "Exported {} mapping rows to {} (sample: {})",
        rows.len(),
        data.display(),
        sample.display()
    );

    Ok(ExportedFiles {
        data,
        sample,
        rows: rows.len(),
    })
}

fn write_rows(path: &Path, header: &[&str], rows: &[[String; 5]]) -> Result<()> {
    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

    wtr.write_record(header)
        .context("Failed to write CSV header")?;

    for row in rows {
        wtr.write_record(row)
            .with_context(|| format!("Failed to write row for id {}", row[0]))?;
    }

    wtr.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SqlValue;

    fn record(id: i64, college: &str) -> AdmissionRecord {
        AdmissionRecord {
            id,
            source_region: "湖北".to_string(),
            college_name: college.to_string(),
            major_name: "临床医学".to_string(),
            min_score: Some(620.0),
            year: Some(2024),
            study_years: Some("五年".to_string()),
            batch: Some("本科批".to_string()),
        }
    }

    #[test]
    fn test_export_update_data() {
        let dir = tempfile::tempdir().unwrap();
        let records: Vec<AdmissionRecord> =
            (1..=5).map(|id| record(id, &format!("院校{}", id))).collect();
        let values =
            ValueMap::from_entries((1..=5).map(|id| (id, SqlValue::Int(600 + id))).collect());

        let files = export_update_data(
            &records,
            &values,
            "major_min_score_2024",
            dir.path(),
            "hubei_score",
            2,
        )
        .unwrap();

        assert_eq!(files.rows, 5);
        assert!(files.data.ends_with("hubei_score_update_data.csv"));

        let mut reader = csv::Reader::from_path(&files.data).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[1], "major_min_score_2024");
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 5);
        assert_eq!(&rows[0][0], "1");
        assert_eq!(&rows[0][1], "601");
        assert_eq!(&rows[0][2], "院校1");
        assert_eq!(&rows[4][4], "湖北");

        let sample_rows = csv::Reader::from_path(&files.sample)
            .unwrap()
            .records()
            .count();
        assert_eq!(sample_rows, 2);
    }

    #[test]
    fn test_sample_larger_than_data() {
        let dir = tempfile::tempdir().unwrap();
        let values = ValueMap::from_entries(vec![(9, SqlValue::Text("四年".to_string()))]);

        let files =
            export_update_data(&[], &values, "study_years", dir.path(), "hubei", 200).unwrap();

        let content = std::fs::read_to_string(&files.sample).unwrap();
        assert_eq!(
            content,
            "id,study_years,college_name_excel,major_name_excel,source_province\n9,四年,,,\n"
        );
    }
}
