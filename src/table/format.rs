//! VE table text format.
//!
//! Layout (comma delimited on disk, tab or comma accepted when pasting):
//! - Row 1: load label cell, then the RPM breakpoints
//! - Rows 2+: load breakpoint, then one VE value per RPM column
//!
//! RPM values are written as integers when whole, VE values with one decimal.

use std::fs;
use std::path::{Path, PathBuf};

use super::{Axis, Grid, LoadType, TableError, VeTable};

/// Parse a complete table (header row plus load rows)
pub fn parse_table(text: &str) -> Result<VeTable, TableError> {
    let mut lines = numbered_lines(text);

    let (header_no, header_line) = lines
        .next()
        .ok_or_else(|| TableError::Format("table is empty".to_string()))?;
    let delimiter = detect_delimiter(header_line);
    let header = split_cells(header_line, delimiter);

    let load_type = LoadType::from_label(header[0]);
    let rpm_values = header[1..]
        .iter()
        .enumerate()
        .map(|(i, cell)| parse_number(cell, header_no, i + 2))
        .collect::<Result<Vec<f64>, _>>()?;

    if rpm_values.is_empty() {
        return Err(TableError::Format(
            "header has no RPM breakpoints".to_string(),
        ));
    }

    let mut load_values = Vec::new();
    let mut rows = Vec::new();

    for (line_no, line) in lines {
        let cells = split_cells(line, delimiter);

        // Rows with an empty load cell are spacer rows
        if cells[0].is_empty() {
            continue;
        }

        load_values.push(parse_number(cells[0], line_no, 1)?);

        let row = cells[1..]
            .iter()
            .enumerate()
            .map(|(c, cell)| parse_number(cell, line_no, c + 2))
            .collect::<Result<Vec<f64>, _>>()?;

        if row.len() != rpm_values.len() {
            return Err(TableError::Format(format!(
                "Row {} has {} values, expected {}",
                line_no,
                row.len(),
                rpm_values.len()
            )));
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(TableError::Format(
            "No data rows found in table".to_string(),
        ));
    }

    let rpm_axis = Axis::new(rpm_values)
        .map_err(|e| TableError::Format(format!("RPM axis: {}", e)))?;
    let load_axis = Axis::new(load_values)
        .map_err(|e| TableError::Format(format!("load axis: {}", e)))?;

    VeTable::new(rpm_axis, load_axis, load_type, Grid::from_rows(rows)?)
}

/// Render a table in the on-disk layout
pub fn format_table(table: &VeTable) -> String {
    let mut out = String::new();

    out.push_str(&table.load_type().label());
    for &rpm in table.rpm_axis().values() {
        out.push(',');
        out.push_str(&format_breakpoint(rpm));
    }
    out.push('\n');

    for (r, &load) in table.load_axis().values().iter().enumerate() {
        out.push_str(&format_breakpoint(load));
        for ve in table.values().row(r) {
            out.push_str(&format!(",{:.1}", ve));
        }
        out.push('\n');
    }

    out
}

/// Load a table file. No partial table is returned on error.
pub fn load_table(path: &Path) -> Result<VeTable, TableError> {
    let text = fs::read_to_string(path)?;
    let table = parse_table(&text)?;

    tracing::info!(
        "Loaded VE table {:?}: {}x{} ({})",
        path,
        table.load_axis().len(),
        table.rpm_axis().len(),
        table.load_type()
    );

    Ok(table)
}

/// Save a table file, creating parent directories as needed
pub fn save_table(path: &Path, table: &VeTable) -> Result<(), TableError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    fs::write(path, format_table(table))?;
    tracing::info!("Saved VE table to {:?}", path);
    Ok(())
}

/// First free `<name>_fuel_ve_map.csv` path in `dir`, then `_1`, `_2`, ...
pub fn unique_table_path(dir: &Path, name: &str) -> PathBuf {
    let base = dir.join(format!("{}_fuel_ve_map.csv", name));
    if !base.exists() {
        return base;
    }

    (1..)
        .map(|n| dir.join(format!("{}_fuel_ve_map_{}.csv", name, n)))
        .find(|p| !p.exists())
        .unwrap_or(base)
}

// ============================================================================
// Paste
// ============================================================================

/// "Full paste": header and axes included, same layout as the file format
pub fn paste_full(text: &str) -> Result<VeTable, TableError> {
    parse_table(text)
}

/// "Values-only paste": a bare block of VE values replacing the table's cells.
///
/// The block must have exactly the table's shape. On any error the table is
/// left untouched.
pub fn paste_values(table: &mut VeTable, text: &str) -> Result<(), TableError> {
    let values = parse_values_block(text)?;
    let (expected_rows, expected_cols) = table.shape();

    if values.shape() != (expected_rows, expected_cols) {
        return Err(TableError::SizeMismatch {
            expected_rows,
            expected_cols,
            rows: values.rows(),
            cols: values.cols(),
        });
    }

    table.replace_values(values)
}

/// Parse a rectangular block of numbers (tab or comma delimited)
pub fn parse_values_block(text: &str) -> Result<Grid<f64>, TableError> {
    let lines: Vec<(usize, &str)> = numbered_lines(text).collect();
    let delimiter = lines.first().map(|(_, l)| detect_delimiter(l)).unwrap_or(',');

    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(lines.len());
    for &(line_no, line) in &lines {
        let row = split_cells(line, delimiter)
            .iter()
            .enumerate()
            .map(|(c, cell)| parse_number(cell, line_no, c + 1))
            .collect::<Result<Vec<f64>, _>>()?;

        // Ragged blocks are rejected, not padded
        if let Some(expected) = rows.first().map(|r| r.len()) {
            if row.len() != expected {
                return Err(TableError::Format(format!(
                    "Row {} has {} values, expected {}",
                    line_no,
                    row.len(),
                    expected
                )));
            }
        }
        rows.push(row);
    }

    Grid::from_rows(rows)
}

// ============================================================================
// Helpers
// ============================================================================

/// Non-blank lines with their 1-based line numbers in the original text
fn numbered_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty())
}

fn detect_delimiter(line: &str) -> char {
    if line.contains('\t') {
        '\t'
    } else {
        ','
    }
}

fn split_cells(line: &str, delimiter: char) -> Vec<&str> {
    let mut cells: Vec<&str> = line.split(delimiter).map(str::trim).collect();
    // Spreadsheets often leave a trailing delimiter
    if cells.len() > 1 && cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
    cells
}

fn parse_number(cell: &str, line: usize, column: usize) -> Result<f64, TableError> {
    cell.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            TableError::Format(format!(
                "line {}, column {}: '{}' is not a number",
                line, column, cell
            ))
        })
}

fn format_breakpoint(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
