//! Sample loading and plain-text result dumps.
//!
//! Sample files hold one sample per line with fields separated by a
//! configurable delimiter. When several workers share a file, worker `rank`
//! takes every non-blank line whose index is congruent to `rank` modulo the
//! worker count.

use crate::error::{AeError, Result};
use crate::utils::rows_to_matrix;
use ndarray::{Array1, Array2, ArrayView2};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Reads the non-blank lines of `path` assigned to worker `rank`.
pub fn load_lines(path: impl AsRef<Path>, rank: usize, world_size: usize) -> Result<Vec<String>> {
    let path = path.as_ref();
    if world_size == 0 || rank >= world_size {
        return Err(AeError::Configuration(format!(
            "worker rank {rank} out of range for {world_size} workers"
        )));
    }
    let reader = BufReader::new(File::open(path)?);

    let mut lines = Vec::new();
    let mut index = 0usize;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if index % world_size == rank {
            lines.push(line);
        }
        index += 1;
    }
    debug!(path = %path.display(), rank, lines = lines.len(), "loaded sample lines");
    Ok(lines)
}

/// Splits one sample line into numeric fields.
///
/// A space delimiter matches any run of whitespace. With `supervised` the last
/// field is a label and is dropped. `line_no` is only used in errors.
pub fn parse_line(line: &str, delimiter: char, supervised: bool, line_no: usize) -> Result<Vec<f64>> {
    let fields: Vec<&str> = if delimiter == ' ' {
        line.split_whitespace().collect()
    } else {
        line.split(delimiter)
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect()
    };
    let features = if supervised {
        match fields.split_last() {
            Some((_label, rest)) => rest,
            None => &fields[..],
        }
    } else {
        &fields[..]
    };
    features
        .iter()
        .map(|field| {
            field.parse::<f64>().map_err(|e| AeError::Parse {
                line: line_no,
                message: format!("'{field}': {e}"),
            })
        })
        .collect()
}

/// Parses sample lines into a matrix with one column per sample.
pub fn parse_samples(lines: &[String], delimiter: char, supervised: bool) -> Result<Array2<f64>> {
    let rows = lines
        .iter()
        .enumerate()
        .map(|(i, line)| parse_line(line, delimiter, supervised, i + 1))
        .collect::<Result<Vec<_>>>()?;
    Ok(rows_to_matrix(&rows)?.reversed_axes())
}

/// Loads worker `rank`'s shard of a sample file as a column-per-sample matrix.
pub fn load_samples(
    path: impl AsRef<Path>,
    delimiter: char,
    supervised: bool,
    rank: usize,
    world_size: usize,
) -> Result<Array2<f64>> {
    let lines = load_lines(path, rank, world_size)?;
    parse_samples(&lines, delimiter, supervised)
}

/// Writes a matrix one row per line, fields joined by `separator`.
pub fn dump_matrix(path: impl AsRef<Path>, m: ArrayView2<f64>, separator: char) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let sep = separator.to_string();
    for row in m.rows() {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(writer, "{}", line.join(&sep))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes a vector one value per line.
pub fn dump_vector(path: impl AsRef<Path>, v: &Array1<f64>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for value in v {
        writeln!(writer, "{value}")?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes column-per-sample data as one comma separated sample per line, the
/// format [`load_samples`] reads back with a `','` delimiter.
pub fn dump_samples(path: impl AsRef<Path>, data: &Array2<f64>) -> Result<()> {
    dump_matrix(path, data.t(), ',')
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_parse_line_whitespace() {
        let fields = parse_line("  1.5   2\t-3e-1 ", ' ', false, 1).unwrap();
        assert_eq!(fields, vec![1.5, 2.0, -0.3]);
    }

    #[test]
    fn test_parse_line_drops_label() {
        let fields = parse_line("0.1,0.2,7", ',', true, 1).unwrap();
        assert_eq!(fields, vec![0.1, 0.2]);
    }

    #[test]
    fn test_parse_line_reports_line_number() {
        let err = parse_line("0.1 abc", ' ', false, 4).unwrap_err();
        assert!(matches!(err, AeError::Parse { line: 4, .. }));
    }

    #[test]
    fn test_parse_samples_is_column_per_sample() {
        let lines = vec!["1 2 3".to_string(), "4 5 6".to_string()];
        let data = parse_samples(&lines, ' ', false).unwrap();
        assert_eq!(data, array![[1.0, 4.0], [2.0, 5.0], [3.0, 6.0]]);
    }

    #[test]
    fn test_parse_samples_rejects_ragged_lines() {
        let lines = vec!["1 2 3".to_string(), "4 5".to_string()];
        assert!(matches!(
            parse_samples(&lines, ' ', false),
            Err(AeError::ShapeMismatch { .. })
        ));
    }
}
