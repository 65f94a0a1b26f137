//! Support reduction and serialization.
//!
//! Reduces the accumulated counters into per-pair support fractions, writes
//! the support CSV consumed by downstream tools, the per-column Jalview
//! annotation derived from it, and the optional markdown run report.

use crate::alignment::{AlignmentMatrix, is_gap_char};
use crate::error::{Error, Result};
use crate::pairs::PairIndexer;
use crate::support::SupportCounters;
use itertools::Itertools;
use markdown_tables::{MarkdownTableRow, as_table};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Per-pair and per-column support derived from the counters.
pub struct SupportReport {
    indexer: PairIndexer,
    columns: usize,
    support: Vec<f64>,
    valid: Vec<bool>,
}

impl SupportReport {
    /// Reduces the counters: `support = positive / sample`, with `0/0 = 0`.
    /// A pair is valid if both rows carry a residue at the column in the
    /// *original* alignment, independent of replicate observations.
    #[must_use]
    pub fn new(
        original: &AlignmentMatrix,
        indexer: PairIndexer,
        counters: &SupportCounters,
    ) -> Self {
        let columns = original.column_count();

        let support = counters
            .sample
            .iter()
            .zip(&counters.positive)
            .map(|(&sampled, &positive)| {
                if sampled == 0 {
                    0.0
                } else {
                    f64::from(positive) / f64::from(sampled)
                }
            })
            .collect();

        let mut valid = vec![false; indexer.total(columns)];
        for c in 0..columns {
            let rows: Vec<usize> = (0..original.row_count())
                .filter(|&r| !is_gap_char(original.symbol(r, c)))
                .collect();
            for (i, &r1) in rows.iter().enumerate() {
                for &r2 in &rows[i + 1..] {
                    valid[indexer.index(c, r1, r2)] = true;
                }
            }
        }

        Self {
            indexer,
            columns,
            support,
            valid,
        }
    }

    #[must_use]
    pub fn support(&self) -> &[f64] {
        &self.support
    }

    /// Mean support over the valid pairs of each column; columns without a
    /// valid pair report 0.
    #[must_use]
    pub fn column_means(&self) -> Vec<f64> {
        let mut sums = vec![0.0f64; self.columns];
        let mut counts = vec![0usize; self.columns];
        for (idx, &is_valid) in self.valid.iter().enumerate() {
            if is_valid {
                let (column, _, _) = self.indexer.decode(idx);
                sums[column] += self.support[idx];
                counts[column] += 1;
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let means = sums
            .iter()
            .zip(&counts)
            .map(|(&sum, &count)| if count == 0 { 0.0 } else { sum / count as f64 })
            .collect();
        means
    }

    /// Writes the `columnIndex,rowIndex1,rowIndex2,supportValue` table, one
    /// row per valid pair, in pair-index order.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let map_err = |e| Error::SupportWrite {
            path: path.to_path_buf(),
            source: e,
        };
        let file = std::fs::File::create(path).map_err(map_err)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "columnIndex,rowIndex1,rowIndex2,supportValue").map_err(map_err)?;
        for (idx, &is_valid) in self.valid.iter().enumerate() {
            if is_valid {
                let (column, r1, r2) = self.indexer.decode(idx);
                writeln!(writer, "{column},{r1},{r2},{}", self.support[idx]).map_err(map_err)?;
            }
        }
        writer.flush().map_err(map_err)?;
        Ok(())
    }

    /// Writes the per-column aggregate as a Jalview `BAR_GRAPH` annotation.
    pub fn write_jalview_annotation(&self, path: impl AsRef<Path>, color: &str) -> Result<()> {
        let path = path.as_ref();
        let map_err = |e| Error::SupportWrite {
            path: path.to_path_buf(),
            source: e,
        };
        let file = std::fs::File::create(path).map_err(map_err)?;
        let mut writer = BufWriter::new(file);

        let bars = self
            .column_means()
            .iter()
            .map(|m| format!("{m},{m}"))
            .join("|");
        writeln!(writer, "JALVIEW_ANNOTATION").map_err(map_err)?;
        writeln!(writer, "BAR_GRAPH\tSupport\t{bars}").map_err(map_err)?;
        writeln!(writer, "COLOUR\tSupport\t{color}").map_err(map_err)?;
        writer.flush().map_err(map_err)?;
        Ok(())
    }

    /// Summary statistics for the run report.
    #[must_use]
    pub fn summary(&self) -> SupportSummary {
        let valid_pairs = self.valid.iter().filter(|&&v| v).count();
        let (mut observed, mut full, mut sum) = (0usize, 0usize, 0.0f64);
        for (idx, &is_valid) in self.valid.iter().enumerate() {
            if !is_valid {
                continue;
            }
            sum += self.support[idx];
            if self.support[idx] > 0.0 {
                observed += 1;
            }
            if (self.support[idx] - 1.0).abs() < f64::EPSILON {
                full += 1;
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let mean_support = if valid_pairs == 0 {
            0.0
        } else {
            sum / valid_pairs as f64
        };
        SupportSummary {
            valid_pairs,
            supported_pairs: observed,
            fully_supported_pairs: full,
            mean_support,
        }
    }
}

/// Aggregate figures over all valid pairs.
pub struct SupportSummary {
    pub valid_pairs: usize,
    pub supported_pairs: usize,
    pub fully_supported_pairs: usize,
    pub mean_support: f64,
}

struct RunOption {
    option: String,
    value: String,
}

impl MarkdownTableRow for RunOption {
    fn column_names() -> Vec<&'static str> {
        vec!["Option", "Value"]
    }

    fn column_values(&self) -> Vec<String> {
        vec![self.option.clone(), self.value.clone()]
    }
}

struct SummaryRow {
    metric: String,
    value: String,
}

impl MarkdownTableRow for SummaryRow {
    fn column_names() -> Vec<&'static str> {
        vec!["Metric", "Value"]
    }

    fn column_values(&self) -> Vec<String> {
        vec![self.metric.clone(), self.value.clone()]
    }
}

/// Configuration echo for the run report.
pub struct ReportConfig {
    pub input_path: String,
    pub output_dir: String,
    pub algorithm: String,
    pub task: String,
    pub samples: usize,
    pub reverse_rate: f64,
    pub anchor_len: Option<usize>,
    pub anchor_num: Option<usize>,
    pub seed: Option<u64>,
}

/// Writes a markdown report of the run options and support statistics.
pub fn write_report(
    path: impl AsRef<Path>,
    config: &ReportConfig,
    report: &SupportReport,
    replicates_used: u32,
) -> Result<()> {
    let path = path.as_ref();
    let map_err = |e| Error::ReportWrite {
        path: path.to_path_buf(),
        source: e,
    };
    let file = std::fs::File::create(path).map_err(map_err)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "# Support estimation report\n").map_err(map_err)?;

    let mut options = vec![
        RunOption {
            option: "Input".to_string(),
            value: config.input_path.clone(),
        },
        RunOption {
            option: "Output directory".to_string(),
            value: config.output_dir.clone(),
        },
        RunOption {
            option: "Algorithm".to_string(),
            value: config.algorithm.clone(),
        },
        RunOption {
            option: "Task".to_string(),
            value: config.task.clone(),
        },
        RunOption {
            option: "Replicates".to_string(),
            value: config.samples.to_string(),
        },
        RunOption {
            option: "Reversal rate".to_string(),
            value: config.reverse_rate.to_string(),
        },
    ];
    if let Some(anchor_len) = config.anchor_len {
        options.push(RunOption {
            option: "Anchor length".to_string(),
            value: anchor_len.to_string(),
        });
    }
    if let Some(anchor_num) = config.anchor_num {
        options.push(RunOption {
            option: "Anchor count".to_string(),
            value: anchor_num.to_string(),
        });
    }
    options.push(RunOption {
        option: "Seed".to_string(),
        value: config
            .seed
            .map_or_else(|| "entropy".to_string(), |s| s.to_string()),
    });

    writeln!(writer, "## Options\n\n{}", as_table(&options)).map_err(map_err)?;

    let summary = report.summary();
    let rows = vec![
        SummaryRow {
            metric: "Replicates used".to_string(),
            value: replicates_used.to_string(),
        },
        SummaryRow {
            metric: "Valid pairs".to_string(),
            value: summary.valid_pairs.to_string(),
        },
        SummaryRow {
            metric: "Pairs with support > 0".to_string(),
            value: summary.supported_pairs.to_string(),
        },
        SummaryRow {
            metric: "Pairs with support = 1".to_string(),
            value: summary.fully_supported_pairs.to_string(),
        },
        SummaryRow {
            metric: "Mean support over valid pairs".to_string(),
            value: format!("{:.4}", summary.mean_support),
        },
    ];
    writeln!(writer, "## Support\n\n{}", as_table(&rows)).map_err(map_err)?;

    writer.flush().map_err(map_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&str]) -> AlignmentMatrix {
        let labels = (0..rows.len()).map(|i| format!("t{i}")).collect();
        let rows = rows.iter().map(|r| r.as_bytes().to_vec()).collect();
        AlignmentMatrix::new(labels, rows).unwrap()
    }

    fn counters_for(original: &AlignmentMatrix, indexer: PairIndexer) -> SupportCounters {
        let mut counters = SupportCounters::new(indexer.total(original.column_count()));
        let indices: Vec<usize> = (0..original.column_count()).collect();
        let realigned = original.subsample(&indices);
        crate::support::accumulate_replicate(
            original, &indexer, &indices, &realigned, 1, &mut counters,
        )
        .unwrap();
        counters
    }

    #[test]
    fn unobserved_pairs_have_zero_support() {
        let original = matrix(&["A-", "AC", "-C"]);
        let indexer = PairIndexer::new(3);
        let counters = SupportCounters::new(indexer.total(2));
        let report = SupportReport::new(&original, indexer, &counters);
        assert!(report.support().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn identity_replicate_yields_unit_support() {
        let original = matrix(&["AAAA-A", "AAAAAA", "AAA-AA", "AAAAAA"]);
        let indexer = PairIndexer::new(4);
        let counters = counters_for(&original, indexer);
        let report = SupportReport::new(&original, indexer, &counters);

        for (idx, &s) in report.support().iter().enumerate() {
            if counters.sample[idx] > 0 {
                assert_eq!(s, 1.0, "pair index {idx}");
            } else {
                assert_eq!(s, 0.0);
            }
        }
        // columns 3 and 4 carry a gap each; their means cover fewer pairs
        let means = report.column_means();
        assert_eq!(means.len(), 6);
        assert!(means.iter().all(|&m| m == 1.0));
    }

    #[test]
    fn reduction_is_idempotent() {
        let original = matrix(&["AC-T", "ACGT", "AC-T"]);
        let indexer = PairIndexer::new(3);
        let counters = counters_for(&original, indexer);
        let a = SupportReport::new(&original, indexer, &counters);
        let b = SupportReport::new(&original, indexer, &counters);
        assert_eq!(a.support(), b.support());
        assert_eq!(a.column_means(), b.column_means());
    }

    #[test]
    fn csv_lists_only_valid_pairs() {
        let original = matrix(&["A-", "AC", "-C"]);
        let indexer = PairIndexer::new(3);
        let counters = SupportCounters::new(indexer.total(2));
        let report = SupportReport::new(&original, indexer, &counters);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("support.csv");
        report.write_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "columnIndex,rowIndex1,rowIndex2,supportValue");
        // column 0: rows 0 and 1 are non-gap; column 1: rows 1 and 2
        assert_eq!(lines[1], "0,0,1,0");
        assert_eq!(lines[2], "1,1,2,0");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn jalview_annotation_has_one_bar_per_column() {
        let original = matrix(&["AC", "AC"]);
        let indexer = PairIndexer::new(2);
        let counters = counters_for(&original, indexer);
        let report = SupportReport::new(&original, indexer, &counters);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("support.jalview.txt");
        report.write_jalview_annotation(&path, "pink").unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("JALVIEW_ANNOTATION\n"));
        assert!(text.contains("BAR_GRAPH\tSupport\t1,1|1,1"));
        assert!(text.ends_with("COLOUR\tSupport\tpink\n"));
    }
}
