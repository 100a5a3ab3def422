//! Report sinks.
//!
//! A sink receives each finished `ProcessingReport` and stores it durably.
//! `CsvReportSink` appends one flattened row per run, writing the header only
//! when the file is new or empty.

use crate::error::Result;
use crate::report::ProcessingReport;
use log::info;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

pub trait ReportSink {
    fn append(&mut self, report: &ProcessingReport) -> Result<()>;
}

/// Flat CSV row; the hearing profile is embedded as compact JSON.
#[derive(Debug, Serialize)]
struct ReportRow {
    hearing_loss: String,
    tuning_gain_percent: f32,
    sample_rate: u32,
    latency_ms: f64,
    snr_before: f64,
    snr_after: f64,
    delta_snr: f64,
    pesq: Option<f64>,
    stoi: Option<f64>,
    lsd: f64,
    stereo_energy_balance_db: String,
}

impl ReportRow {
    fn from_report(report: &ProcessingReport) -> Result<Self> {
        let m = &report.metrics;
        Ok(Self {
            hearing_loss: serde_json::to_string(&report.hearing_loss)?,
            tuning_gain_percent: report.tuning_gain_percent.percent(),
            sample_rate: report.sample_rate,
            latency_ms: report.latency_ms,
            snr_before: m.snr_before,
            snr_after: m.snr_after,
            delta_snr: m.delta_snr,
            pesq: m.pesq,
            stoi: m.stoi,
            lsd: m.lsd,
            stereo_energy_balance_db: m.stereo_energy_balance_db.to_string(),
        })
    }
}

pub struct CsvReportSink {
    path: PathBuf,
}

impl CsvReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for CsvReportSink {
    fn append(&mut self, report: &ProcessingReport) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(ReportRow::from_report(report)?)?;
        writer.flush()?;

        info!("CSV updated: {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{EarProfile, HearingProfile, TuningGain};
    use crate::report::{Metrics, StereoBalance};

    fn sample_report(balance: StereoBalance) -> ProcessingReport {
        ProcessingReport {
            hearing_loss: HearingProfile::symmetric(EarProfile::single(1000, 20.0).unwrap()),
            tuning_gain_percent: TuningGain::from_percent(50.0),
            sample_rate: 16000,
            latency_ms: 12.5,
            metrics: Metrics {
                snr_before: 100.0,
                snr_after: 12.0,
                delta_snr: -88.0,
                pesq: None,
                stoi: Some(0.9),
                lsd: 3.25,
                stereo_energy_balance_db: balance,
            },
        }
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.csv");
        let mut sink = CsvReportSink::new(&path);

        sink.append(&sample_report(StereoBalance::Db(0.5))).unwrap();
        sink.append(&sample_report(StereoBalance::Undefined)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("hearing_loss,tuning_gain_percent,sample_rate"));
        assert!(lines[1].ends_with(",0.5"));
        assert!(lines[2].ends_with(",Undefined"));
        assert_eq!(text.matches("hearing_loss").count(), 1);
    }

    #[test]
    fn test_row_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.csv");
        CsvReportSink::new(&path)
            .append(&sample_report(StereoBalance::Db(1.0)))
            .unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let row = reader.records().next().unwrap().unwrap();
        let profile: HearingProfile = serde_json::from_str(&row[0]).unwrap();
        assert_eq!(profile.left.loss_at(1000), Some(20.0));
        assert_eq!(&row[1], "50.0");
        assert_eq!(&row[7], "");
        assert_eq!(&row[8], "0.9");
    }
}
