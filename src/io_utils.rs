//! CSV reading, writing, and text decoding helpers.
//!
//! Upstream payloads arrive as raw bytes from a [`crate::fetch::Fetcher`].
//! FAOSTAT bulk archives are latin1 while the JSON/CSV APIs are UTF-8, so
//! every payload is decoded through `encoding_rs` before the CSV layer sees it.
//! Output files are written with `QuoteStyle::Always` so indicator labels
//! containing commas and parentheses survive a round trip.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

use crate::rows::RawTable;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

/// Decodes a CSV payload into a [`RawTable`], keeping every cell as text.
pub fn read_raw_table(bytes: &[u8], encoding: &'static Encoding) -> Result<RawTable> {
    let text = decode_bytes(strip_bom(bytes), encoding)?;
    let mut reader = open_csv_reader(text.as_bytes(), DEFAULT_CSV_DELIMITER);
    let headers = reader
        .headers()
        .context("Reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>();
    let mut rows = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(RawTable::new(headers, rows))
}

pub fn read_raw_table_from_path(path: &Path) -> Result<RawTable> {
    let mut bytes = Vec::new();
    BufReader::new(File::open(path).with_context(|| format!("Opening input file {path:?}"))?)
        .read_to_end(&mut bytes)
        .with_context(|| format!("Reading input file {path:?}"))?;
    read_raw_table(&bytes, UTF_8).with_context(|| format!("Parsing CSV {path:?}"))
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes)
}

pub fn open_csv_writer(path: &Path) -> Result<csv::Writer<Box<dyn Write>>> {
    let base: Box<dyn Write> = Box::new(BufWriter::new(
        File::create(path).with_context(|| format!("Creating output file {path:?}"))?,
    ));
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(DEFAULT_CSV_DELIMITER)
        .quote_style(QuoteStyle::Always)
        .double_quote(true);
    Ok(builder.from_writer(base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_payload_is_decoded() {
        let encoding = resolve_encoding(Some("latin1")).unwrap();
        let bytes = b"Area,Value\nC\xf4te d'Ivoire,1\n";
        let table = read_raw_table(bytes, encoding).unwrap();
        assert_eq!(table.headers(), ["Area", "Value"]);
        assert_eq!(table.rows()[0][0], "C\u{f4}te d'Ivoire");
    }

    #[test]
    fn utf8_bom_is_ignored() {
        let bytes = b"\xEF\xBB\xBFArea,Value\nPeru,2\n";
        let table = read_raw_table(bytes, UTF_8).unwrap();
        assert_eq!(table.headers()[0], "Area");
    }

    #[test]
    fn unknown_encoding_is_an_error() {
        assert!(resolve_encoding(Some("klingon")).is_err());
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
    }
}
