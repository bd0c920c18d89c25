use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::align::DriftRecord;
use crate::consts::{CUMULATIVE_SHIFTS_TABLE_NAME, SHIFTS_TABLE_NAME};
use crate::error::{DriftError, Result};
use crate::frame::Shift;

/// Write one `dx dy` line per shift, in scientific notation.
pub fn write_shift_table(path: &Path, shifts: &[Shift]) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    for s in shifts {
        writeln!(w, "{:.12e} {:.12e}", s.dx, s.dy)?;
    }
    w.flush()?;
    Ok(())
}

/// Parse a table written by `write_shift_table`. Blank lines and lines
/// starting with `#` are ignored.
pub fn read_shift_table(path: &Path) -> Result<Vec<Shift>> {
    let reader = BufReader::new(File::open(path)?);
    let mut shifts = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let values: Vec<f64> = line
            .split_whitespace()
            .map(|v| v.parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| {
                DriftError::UnsupportedFormat(format!("{}:{}: {e}", path.display(), n + 1))
            })?;
        match values.as_slice() {
            [dx, dy] => shifts.push(Shift::new(*dx, *dy)),
            _ => {
                return Err(DriftError::UnsupportedFormat(format!(
                    "{}:{}: expected 2 columns, found {}",
                    path.display(),
                    n + 1,
                    values.len()
                )))
            }
        }
    }
    Ok(shifts)
}

/// Save the pairwise and cumulative shift tables into `dir`.
pub fn save_shift_tables(dir: &Path, records: &[DriftRecord]) -> Result<()> {
    let pairwise: Vec<Shift> = records.iter().map(|r| r.shift).collect();
    let cumulative: Vec<Shift> = records.iter().map(|r| r.cumulative).collect();
    write_shift_table(&dir.join(SHIFTS_TABLE_NAME), &pairwise)?;
    write_shift_table(&dir.join(CUMULATIVE_SHIFTS_TABLE_NAME), &cumulative)?;
    info!(dir = %dir.display(), frames = records.len(), "Shift tables saved");
    Ok(())
}
