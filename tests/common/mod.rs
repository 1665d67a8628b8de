#![allow(dead_code)]

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use food_insecurity_etl::{
    adapters::{SourceAdapter, default_registry},
    config::{PipelineConfig, WorldBankConfig, WorldBankIndicator},
};
use tempfile::{TempDir, tempdir};
use zip::write::SimpleFileOptions;

pub const WB_BASE: &str = "http://wb.test/v2/country/all/indicator";
pub const GINI: &str = "SI.POV.GINI";
pub const GINI_LABEL: &str = "WB Gini Index (WB estimate)";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Built-in configuration pointed at fake hosts, with a short target list and
/// a single World Bank indicator.
pub fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.target_countries = ["Brazil", "Bolivia", "Chile", "Peru", "Venezuela"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    config.world_bank = WorldBankConfig {
        base_url: WB_BASE.to_string(),
        per_page: 2,
        indicators: vec![WorldBankIndicator {
            code: GINI.to_string(),
            label: "Gini Index (WB estimate)".to_string(),
        }],
    };
    config.fao.food_security.url = "http://fao.test/FS".to_string();
    config.fao.trade.bulk.url = "http://fao.test/trade.zip".to_string();
    config.fao.household_surveys.url = "http://fao.test/HS".to_string();
    config.fao.employment.bulk.url = "http://fao.test/employment.zip".to_string();
    config.fao.emissions.url = "http://fao.test/GT".to_string();
    config
}

pub fn adapter(config: &PipelineConfig, id: &str) -> Box<dyn SourceAdapter> {
    default_registry(config)
        .expect("registry")
        .into_iter()
        .find(|a| a.id() == id)
        .unwrap_or_else(|| panic!("adapter {id} registered"))
}

pub fn wb_page_url(code: &str, page: u32) -> String {
    format!("{WB_BASE}/{code}?per_page=2&format=json&page={page}")
}

/// One World Bank API page holding `(country, date, value)` observations.
pub fn wb_page(page: u32, pages: u32, rows: &[(&str, &str, Option<f64>)]) -> String {
    let data = rows
        .iter()
        .map(|(country, date, value)| {
            serde_json::json!({
                "indicator": {"id": GINI, "value": "Gini index"},
                "country": {"id": "XX", "value": country},
                "countryiso3code": "",
                "date": date,
                "value": value,
                "unit": "",
                "obs_status": "",
                "decimal": 1
            })
        })
        .collect::<Vec<_>>();
    serde_json::json!([
        {"page": page, "pages": pages, "per_page": 2, "total": rows.len()},
        data
    ])
    .to_string()
}

pub fn csv_text(headers: &[&str], rows: &[&[&str]]) -> String {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(headers).expect("header");
    for row in rows {
        writer.write_record(*row).expect("row");
    }
    String::from_utf8(writer.into_inner().expect("flush")).expect("utf8")
}

pub fn zip_archive(member: &str, body: &[u8]) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        writer
            .start_file(member, SimpleFileOptions::default())
            .expect("start member");
        writer.write_all(body).expect("write member");
        writer.finish().expect("finish archive");
    }
    buffer.into_inner()
}

/// Reads a CSV written by one of the sinks into header and rows.
pub fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).expect("open csv");
    let headers = reader
        .headers()
        .expect("headers")
        .iter()
        .map(String::from)
        .collect();
    let rows = reader
        .records()
        .map(|r| r.expect("record").iter().map(String::from).collect())
        .collect();
    (headers, rows)
}
