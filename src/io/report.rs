//! CSV export of per-frame TTC reports.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use csv::Writer;

use crate::system::TtcReport;

/// Writes one row per tracked region and frame. Undefined estimates are
/// written as `NaN`, non-closing ones as `0`.
pub struct ReportWriter<W: std::io::Write> {
    writer: Writer<W>,
    rows: usize,
}

impl ReportWriter<File> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let writer = Writer::from_path(path)
            .with_context(|| format!("Failed to create report {}", path.display()))?;
        Ok(Self { writer, rows: 0 })
    }
}

impl<W: std::io::Write> ReportWriter<W> {
    pub fn from_writer(inner: W) -> Self {
        Self {
            writer: Writer::from_writer(inner),
            rows: 0,
        }
    }

    pub fn write_all(&mut self, reports: &[TtcReport]) -> Result<()> {
        for report in reports {
            self.writer.serialize(report)?;
            self.rows += 1;
        }
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush report: {}", e.error()))
    }
}
