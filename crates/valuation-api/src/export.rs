//! Spreadsheet export: a zip holding an input sheet and an indicator sheet,
//! each as CSV.

use anyhow::Result;
use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use formula_engine::CalculationReport;
use std::io::{Cursor, Write};
use valuation_core::{FieldRegistry, ParsedInputs};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

pub const INPUT_SHEET: &str = "inputs.csv";
pub const INDICATOR_SHEET: &str = "indicators.csv";

/// Render a result with thousands separators and four decimals,
/// e.g. `100,000,000.0000`. Missing results render as an empty string.
pub fn format_indicator(value: Option<f64>) -> String {
    let Some(v) = value else {
        return String::new();
    };
    let fixed = format!("{:.4}", v.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "0000"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if v < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac)
}

fn sheet(header: [&str; 2], rows: impl Iterator<Item = [String; 2]>) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush sheet: {}", e.error()))
}

/// Build the two-sheet workbook for the current inputs and results.
pub fn build_workbook(
    fields: &FieldRegistry,
    inputs: &ParsedInputs,
    report: &CalculationReport,
) -> Result<Vec<u8>> {
    let input_rows = fields.iter().map(|f| {
        let value = inputs.get(&f.key).map(|v| v.to_string()).unwrap_or_default();
        [f.name.clone(), value]
    });
    let inputs_csv = sheet(["item", "input value"], input_rows)?;

    let indicator_rows = report
        .indicators
        .iter()
        .map(|r| [r.name.clone(), format_indicator(r.value)]);
    let indicators_csv = sheet(["indicator", "result"], indicator_rows)?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file(INPUT_SHEET, options)?;
    zip.write_all(&inputs_csv)?;
    zip.start_file(INDICATOR_SHEET, options)?;
    zip.write_all(&indicators_csv)?;

    Ok(zip.finish()?.into_inner())
}

pub fn workbook_file_name(now: DateTime<Utc>) -> String {
    format!("valuation_{}.zip", now.format("%Y%m%d_%H%M%S"))
}

pub fn backup_file_name(kind: &str, now: DateTime<Utc>) -> String {
    format!("{}_backup_{}.json", kind, now.format("%Y%m%d_%H%M%S"))
}

/// Downloadable file response.
pub fn attachment(content_type: &'static str, file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use formula_engine::IndicatorResult;
    use std::io::Read;
    use valuation_core::FieldDefinition;

    #[test]
    fn test_format_indicator() {
        assert_eq!(format_indicator(Some(100_000_000.0)), "100,000,000.0000");
        assert_eq!(format_indicator(Some(20.0)), "20.0000");
        assert_eq!(format_indicator(Some(0.25)), "0.2500");
        assert_eq!(format_indicator(Some(1234.56789)), "1,234.5679");
        assert_eq!(format_indicator(Some(-987654.321)), "-987,654.3210");
        assert_eq!(format_indicator(Some(999.99999)), "1,000.0000");
        assert_eq!(format_indicator(None), "");
    }

    #[test]
    fn test_file_names() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 5, 0).unwrap();
        assert_eq!(workbook_file_name(now), "valuation_20261016_090500.zip");
        assert_eq!(backup_file_name("formulas", now), "formulas_backup_20261016_090500.json");
    }

    #[test]
    fn test_workbook_has_two_sheets() {
        let fields = FieldRegistry::new(vec![
            FieldDefinition::new("Price", "price", true),
            FieldDefinition::new("Cash", "cash", false),
        ])
        .unwrap();
        let inputs = ParsedInputs::from_pairs([("price", Some(12.5)), ("cash", None)]);
        let report = CalculationReport {
            indicators: vec![
                IndicatorResult {
                    name: "Market Cap".to_string(),
                    value: Some(1_250_000.0),
                    error: None,
                },
                IndicatorResult {
                    name: "PB".to_string(),
                    value: None,
                    error: None,
                },
            ],
        };

        let bytes = build_workbook(&fields, &inputs, &report).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut inputs_csv = String::new();
        archive
            .by_name(INPUT_SHEET)
            .unwrap()
            .read_to_string(&mut inputs_csv)
            .unwrap();
        assert_eq!(inputs_csv, "item,input value\nPrice,12.5\nCash,\n");

        let mut indicators_csv = String::new();
        archive
            .by_name(INDICATOR_SHEET)
            .unwrap()
            .read_to_string(&mut indicators_csv)
            .unwrap();
        assert_eq!(
            indicators_csv,
            "indicator,result\nMarket Cap,\"1,250,000.0000\"\nPB,\n"
        );
    }
}
