//! CSV and JSON serialization of an [`ExtractionResult`].
//!
//! JSON carries everything (`metadata`, `transactions`, `findings`) with
//! dates as ISO-8601 strings and every decimal as a string. CSV carries the
//! transaction table; metadata goes into `# key: value` comment lines above
//! the header row, or into a JSON sidecar.

use rust_decimal::Decimal;
use std::io::Write;
use tally_core::{ExtractionResult, Result, StatementMetadata};

pub const CSV_HEADER: [&str; 5] = ["date", "description", "amount", "direction", "running_balance"];

/// Decimal places for a currency. Codes not listed use `default`.
pub fn minor_units_for(currency: &str, default: u32) -> u32 {
    match currency.to_ascii_uppercase().as_str() {
        "JPY" | "KRW" | "VND" | "CLP" | "ISK" | "UGX" | "XAF" | "XOF" => 0,
        "BHD" | "KWD" | "OMR" | "JOD" | "TND" | "LYD" | "IQD" => 3,
        _ => default,
    }
}

/// Fixed-point rendering with exactly `scale` decimal places.
pub fn fixed(value: Decimal, scale: u32) -> String {
    let mut v = value.round_dp(scale);
    v.rescale(scale);
    v.to_string()
}

pub fn to_json(result: &ExtractionResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

pub fn from_json(json: &str) -> Result<ExtractionResult> {
    Ok(serde_json::from_str(json)?)
}

/// Metadata alone, for the CSV sidecar file.
pub fn metadata_json(metadata: &StatementMetadata) -> Result<String> {
    Ok(serde_json::to_string_pretty(metadata)?)
}

/// Write the metadata preamble and the transaction table.
pub fn write_csv<W: Write>(result: &ExtractionResult, mut out: W, default_minor_units: u32) -> Result<()> {
    for (key, value) in result.metadata.present_fields() {
        writeln!(out, "# {key}: {}", one_line(&value))?;
    }

    let scale = minor_units_for(&result.metadata.currency, default_minor_units);
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(CSV_HEADER)?;
    for txn in &result.transactions {
        let balance = txn
            .running_balance
            .map(|b| fixed(b, scale))
            .unwrap_or_default();
        wtr.write_record([
            txn.date.format("%Y-%m-%d").to_string(),
            txn.description.clone(),
            fixed(txn.amount, scale),
            txn.direction.as_str().to_string(),
            balance,
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn to_csv(result: &ExtractionResult, default_minor_units: u32) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(result, &mut buf, default_minor_units)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn one_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;
    use tally_core::{Direction, Finding, SourceSpan, Transaction};

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn sample() -> ExtractionResult {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let mut meta = StatementMetadata::default();
        meta.account_holder = Some("Asha\nRao".to_string());
        meta.opening_balance = Some(d("1000.00"));
        meta.currency = "INR".to_string();
        let txns = vec![
            Transaction::new(date, "Grocery Store, Main St", d("45.2"), Direction::Debit, SourceSpan::new(0, 3, 3))
                .with_running_balance(d("954.8")),
            Transaction::new(date, "Refund", d("5"), Direction::Credit, SourceSpan::new(0, 4, 5)),
        ];
        ExtractionResult::new(
            meta,
            txns,
            vec![Finding::ReconciliationSkipped {
                reason: "statement has no closing balance".into(),
            }],
        )
    }

    #[test]
    fn test_fixed_point() {
        assert_eq!(fixed(d("45.2"), 2), "45.20");
        assert_eq!(fixed(d("3.14159"), 2), "3.14");
        assert_eq!(fixed(d("1500"), 0), "1500");
        assert_eq!(minor_units_for("jpy", 2), 0);
        assert_eq!(minor_units_for("KWD", 2), 3);
        assert_eq!(minor_units_for("unknown", 2), 2);
    }

    #[test]
    fn test_csv_layout() {
        let csv = to_csv(&sample(), 2).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "# account_holder: Asha Rao");
        assert_eq!(lines[1], "# opening_balance: 1000.00");
        assert_eq!(lines[2], "# currency: INR");
        assert_eq!(lines[3], "date,description,amount,direction,running_balance");
        assert_eq!(lines[4], "2024-02-01,\"Grocery Store, Main St\",45.20,debit,954.80");
        assert_eq!(lines[5], "2024-02-01,Refund,5.00,credit,");
    }

    #[test]
    fn test_csv_reads_back_with_comment_skipping() {
        let csv = to_csv(&sample(), 2).unwrap();
        let mut rdr = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .from_reader(csv.as_bytes());
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), CSV_HEADER.to_vec());
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "Grocery Store, Main St");
    }

    #[test]
    fn test_json_shape() {
        let json = to_json(&sample()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(v.get("metadata").is_some());
        assert_eq!(v["transactions"][0]["amount"], "45.2");
        assert_eq!(v["transactions"][0]["date"], "2024-02-01");
        assert_eq!(v["metadata"]["opening_balance"], "1000.00");
        assert_eq!(v["findings"][0]["kind"], "ReconciliationSkipped");
    }

    #[test]
    fn test_json_round_trip() {
        let result = sample();
        let back = from_json(&to_json(&result).unwrap()).unwrap();
        assert_eq!(back, result);
        assert_eq!(back.transactions[0].amount.to_string(), "45.2");
    }

    #[test]
    fn test_metadata_sidecar() {
        let json = metadata_json(&sample().metadata).unwrap();
        assert!(json.contains("\"currency\": \"INR\""));
    }
}
