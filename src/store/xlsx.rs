use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto};
use log::{debug, warn};
use rust_xlsxwriter::Workbook;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::email::EmailRecord;
use crate::store::repo::EmailCache;

pub const COLUMNS: [&str; 5] = ["Email ID", "Message ID", "From", "Subject", "Body"];

/// Longest string a spreadsheet cell accepts.
const MAX_CELL_CHARS: usize = 32_767;

/// Email cache kept in a single-sheet `.xlsx` file.
pub struct XlsxCache {
    path: PathBuf,
}

impl XlsxCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl EmailCache for XlsxCache {
    fn all(&self) -> Result<Vec<EmailRecord>> {
        if !self.path.exists() {
            debug!("{} does not exist yet; empty cache", self.path.display());
            return Ok(Vec::new());
        }

        let mut workbook = open_workbook_auto(&self.path)
            .with_context(|| format!("cannot open {}", self.path.display()))?;
        let Some(sheet) = workbook.sheet_names().first().cloned() else {
            return Ok(Vec::new());
        };
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| anyhow!("cannot read sheet {sheet}: {e}"))?;

        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            return Ok(Vec::new());
        };
        let header: Vec<String> = header.iter().map(cell_to_string).collect();
        let col = |name: &str| header.iter().position(|h| h == name);
        let [id, mid, from, subject, body] = COLUMNS.map(col);
        if mid.is_none() {
            warn!("{} has no 'Message ID' column", self.path.display());
        }

        let get = |row: &[Data], idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .map(cell_to_string)
                .unwrap_or_default()
        };

        Ok(rows
            .map(|row| EmailRecord {
                email_id: get(row, id),
                message_id: get(row, mid),
                from: get(row, from),
                subject: get(row, subject),
                body: get(row, body),
            })
            .collect())
    }

    fn replace_all(&self, records: &[EmailRecord]) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (c, name) in COLUMNS.iter().enumerate() {
            sheet.write_string(0, c as u16, *name)?;
        }
        for (r, rec) in records.iter().enumerate() {
            let row = (r + 1) as u32;
            let cells = [
                &rec.email_id,
                &rec.message_id,
                &rec.from,
                &rec.subject,
                &rec.body,
            ];
            for (c, value) in cells.into_iter().enumerate() {
                sheet.write_string(row, c as u16, clip(value))?;
            }
        }
        workbook
            .save(&self.path)
            .with_context(|| format!("cannot write {}", self.path.display()))?;
        debug!("wrote {} rows to {}", records.len(), self.path.display());
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

fn clip(value: &str) -> &str {
    match value.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // sequence numbers written by other tools come back as numbers
        Data::Int(n) => n.to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERR({:?})", e),
        Data::DateTime(dt) => format!("{}", dt),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}
