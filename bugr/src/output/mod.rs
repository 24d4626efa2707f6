//! Output formatting: json (default), pretty json, table, or nothing.

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

mod table;

pub use table::{TableRow, render_table};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Pretty,
    Table,
    Quiet,
}

#[derive(Clone, Debug)]
pub struct Output {
    format: OutputFormat,
    path: Option<PathBuf>,
}

impl Output {
    pub fn new(format: OutputFormat, path: Option<PathBuf>) -> Self {
        Self { format, path }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn emit_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        if self.format == OutputFormat::Quiet {
            return Ok(());
        }

        let data = match self.format {
            OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
            _ => serde_json::to_string(value)?,
        };

        self.write(&data)
    }

    /// Table of `items` in table format, otherwise `json` (which may wrap the
    /// items with paging details).
    pub fn emit_table_or<T, J>(&self, items: &[T], json: &J) -> Result<()>
    where
        T: TableRow,
        J: Serialize + ?Sized,
    {
        match self.format {
            OutputFormat::Table => self.write(&render_table(items)),
            OutputFormat::Quiet => Ok(()),
            _ => self.emit_json(json),
        }
    }

    pub fn emit_table<T: TableRow + Serialize + Sized>(&self, items: &[T]) -> Result<()> {
        self.emit_table_or(items, items)
    }

    pub fn emit_text(&self, text: &str) -> Result<()> {
        if self.format == OutputFormat::Quiet {
            return Ok(());
        }
        self.write(text)
    }

    fn write(&self, data: &str) -> Result<()> {
        let mut output = data.to_string();
        if !output.ends_with('\n') {
            output.push('\n');
        }

        if let Some(path) = &self.path {
            fs::write(path, output)?;
        } else {
            print!("{output}");
        }
        Ok(())
    }
}
