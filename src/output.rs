//! Replicate artifact writing and reading.
//!
//! Each replicate `n` persists two files under the sample directory: a
//! gapless FASTA of the resampled rows (`{n}.seq.fasta`) and the resampled
//! column indices in walk order (`{n}.index`, one per line).

use crate::alignment::AlignmentMatrix;
use crate::error::{Error, Result};
use itertools::Itertools;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const FASTA_LINE_WIDTH: usize = 80;

#[must_use]
pub fn gapless_fasta_path(sample_dir: &Path, replicate: usize) -> PathBuf {
    sample_dir.join(format!("{replicate}.seq.fasta"))
}

#[must_use]
pub fn aligned_fasta_path(sample_dir: &Path, replicate: usize) -> PathBuf {
    sample_dir.join(format!("{replicate}.aln.fasta"))
}

#[must_use]
pub fn index_path(sample_dir: &Path, replicate: usize) -> PathBuf {
    sample_dir.join(format!("{replicate}.index"))
}

/// Writes the resampled matrix with gaps stripped, one record per row.
pub fn write_gapless_fasta(matrix: &AlignmentMatrix, path: &Path) -> Result<()> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);

    for (row, label) in matrix.labels().iter().enumerate() {
        writeln!(writer, ">{label}")?;
        for chunk in matrix.degapped_row(row).chunks(FASTA_LINE_WIDTH) {
            writeln!(writer, "{}", String::from_utf8_lossy(chunk))?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Writes the resampled column indices, one per line, in walk order.
pub fn write_index(indices: &[usize], path: &Path) -> Result<()> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", indices.iter().format("\n"))?;
    writer.flush()?;
    Ok(())
}

/// Reads a replicate's index file back.
pub fn read_index(path: &Path, replicate: usize) -> Result<Vec<usize>> {
    let replicate_error = |message: String| Error::ReplicateIo { replicate, message };
    let text = fs::read_to_string(path)
        .map_err(|e| replicate_error(format!("cannot read '{}': {e}", path.display())))?;

    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.trim()
                .parse()
                .map_err(|_| replicate_error(format!("malformed index line '{line}'")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&str]) -> AlignmentMatrix {
        let labels = (0..rows.len()).map(|i| format!("t{i}")).collect();
        let rows = rows.iter().map(|r| r.as_bytes().to_vec()).collect();
        AlignmentMatrix::new(labels, rows).unwrap()
    }

    #[test]
    fn gapless_fasta_strips_gaps() {
        let m = matrix(&["AC-T", "-CGT"]);
        let dir = tempfile::tempdir().unwrap();
        let path = gapless_fasta_path(dir.path(), 1);
        write_gapless_fasta(&m, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, ">t0\nACT\n>t1\nCGT\n");
    }

    #[test]
    fn index_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = index_path(dir.path(), 2);
        write_index(&[3, 2, 1, 0, 1], &path).unwrap();
        assert_eq!(read_index(&path, 2).unwrap(), vec![3, 2, 1, 0, 1]);
    }

    #[test]
    fn malformed_index_is_a_replicate_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = index_path(dir.path(), 4);
        fs::write(&path, "1\ntwo\n3\n").unwrap();
        assert!(matches!(
            read_index(&path, 4),
            Err(Error::ReplicateIo { replicate: 4, .. })
        ));
    }
}
