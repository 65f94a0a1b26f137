//! Per-replicate pipeline: sample, persist, re-align, accumulate.
//!
//! Replicates are independent end-to-end; each worker owns one replicate and
//! seeds its own generator from the master seed and the replicate number, so
//! output is identical whether the pool runs sequentially or in parallel.
//! The only synchronization point is the final counter reduction.

use crate::alignment::AlignmentMatrix;
use crate::anchor::select_barriers;
use crate::error::{Error, Result};
use crate::external::{self, ToolErrorPolicy, ToolLocations};
use crate::fasta::parse_alignment_file;
use crate::output;
use crate::pairs::PairIndexer;
use crate::sampler::{Resample, rawr_sample, seres_sample};
use crate::similarity::column_similarity;
use crate::support::{SupportCounters, accumulate_replicate};
use log::{debug, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// The resampling algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Algorithm {
    #[default]
    Rawr,
    Seres,
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rawr => write!(f, "rawr"),
            Self::Seres => write!(f, "seres"),
        }
    }
}

impl std::str::FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rawr" => Ok(Self::Rawr),
            "seres" => Ok(Self::Seres),
            _ => Err(format!(
                "invalid algorithm '{s}': must be 'rawr' or 'seres'"
            )),
        }
    }
}

/// What the replicates are used to estimate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Task {
    #[default]
    Msa,
    Tree,
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Msa => write!(f, "msa"),
            Self::Tree => write!(f, "tree"),
        }
    }
}

impl std::str::FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "msa" => Ok(Self::Msa),
            "tree" => Ok(Self::Tree),
            _ => Err(format!("invalid task '{s}': must be 'msa' or 'tree'")),
        }
    }
}

/// Configuration for one estimation run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub algorithm: Algorithm,
    pub task: Task,
    pub samples: usize,
    pub reverse_rate: f64,
    pub anchor_len: usize,
    pub anchor_num: usize,
    pub seed: u64,
    pub output_dir: PathBuf,
    pub tools: ToolLocations,
    pub tool_errors: ToolErrorPolicy,
}

impl RunConfig {
    #[must_use]
    pub fn sample_dir(&self) -> PathBuf {
        self.output_dir.join("samples")
    }

    fn replicate_rng(&self, replicate: usize) -> StdRng {
        StdRng::seed_from_u64(self.seed.wrapping_add(replicate as u64))
    }
}

/// Derives the SERES barrier set, or `None` for RAWR. Runs before any
/// sampling so an infeasible anchor configuration aborts early.
pub fn prepare_barriers(
    alignment: &AlignmentMatrix,
    config: &RunConfig,
) -> Result<Option<Vec<usize>>> {
    match config.algorithm {
        Algorithm::Rawr => Ok(None),
        Algorithm::Seres => {
            let similarity = column_similarity(alignment);
            let barriers = select_barriers(&similarity, config.anchor_len, config.anchor_num)?;
            debug!("SERES barriers: {barriers:?}");
            Ok(Some(barriers))
        }
    }
}

fn draw_sample(
    alignment: &AlignmentMatrix,
    barriers: Option<&[usize]>,
    config: &RunConfig,
    replicate: usize,
) -> Resample {
    let mut rng = config.replicate_rng(replicate);
    match barriers {
        None => rawr_sample(alignment, config.reverse_rate, None, &mut rng),
        Some(barriers) => seres_sample(alignment, barriers, config.reverse_rate, &mut rng),
    }
}

/// Generates and persists all replicates under `<output_dir>/samples/`.
pub fn generate_samples(
    alignment: &AlignmentMatrix,
    barriers: Option<&[usize]>,
    config: &RunConfig,
) -> Result<()> {
    let sample_dir = config.sample_dir();
    std::fs::create_dir_all(&sample_dir)?;

    (1..=config.samples)
        .into_par_iter()
        .try_for_each(|n| -> Result<()> {
            let sample = draw_sample(alignment, barriers, config, n);
            debug!("Replicate {n}: sampled {} columns", sample.indices.len());
            output::write_gapless_fasta(&sample.matrix, &output::gapless_fasta_path(&sample_dir, n))?;
            output::write_index(&sample.indices, &output::index_path(&sample_dir, n))?;
            Ok(())
        })
}

/// Re-aligns every replicate with the external aligner. Failures abort or
/// skip according to the configured policy.
pub fn align_samples(config: &RunConfig) -> Result<()> {
    let sample_dir = config.sample_dir();

    (1..=config.samples)
        .into_par_iter()
        .try_for_each(|n| -> Result<()> {
            let gapless = output::gapless_fasta_path(&sample_dir, n);
            let aligned = output::aligned_fasta_path(&sample_dir, n);
            match external::align_replicate(&config.tools, &gapless, &aligned) {
                Ok(()) => Ok(()),
                Err(e) if config.tool_errors == ToolErrorPolicy::Skip => {
                    warn!("Replicate {n}: aligner failed ({e}); skipping");
                    let _ = std::fs::remove_file(&aligned);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        })
}

/// Reads back each replicate's artifacts and reduces the per-replicate
/// counters into global ones. Replicates with missing or inconsistent
/// artifacts contribute nothing.
pub fn accumulate_support(
    alignment: &AlignmentMatrix,
    config: &RunConfig,
) -> Result<SupportCounters> {
    let sample_dir = config.sample_dir();
    let indexer = PairIndexer::new(alignment.row_count());
    let total = indexer.total(alignment.column_count());

    let counters = (1..=config.samples)
        .into_par_iter()
        .map(|n| {
            let mut partial = SupportCounters::new(total);
            match replicate_counters(alignment, &indexer, &sample_dir, n, &mut partial) {
                Ok(()) => {}
                Err(e) => warn!("{e}; replicate skipped"),
            }
            partial
        })
        .reduce(
            || SupportCounters::new(total),
            |mut a, b| {
                a.merge(&b);
                a
            },
        );

    if counters.replicates == 0 {
        return Err(Error::NoUsableReplicates);
    }
    debug!(
        "Accumulated {} of {} replicates",
        counters.replicates, config.samples
    );
    Ok(counters)
}

fn replicate_counters(
    alignment: &AlignmentMatrix,
    indexer: &PairIndexer,
    sample_dir: &Path,
    replicate: usize,
    counters: &mut SupportCounters,
) -> Result<()> {
    let index_file = output::index_path(sample_dir, replicate);
    let aligned_file = output::aligned_fasta_path(sample_dir, replicate);

    if !index_file.is_file() || !aligned_file.is_file() {
        return Err(Error::ReplicateIo {
            replicate,
            message: "index or re-alignment file is missing".to_string(),
        });
    }

    let indices = output::read_index(&index_file, replicate)?;
    let realigned = parse_alignment_file(&aligned_file).map_err(|e| Error::ReplicateIo {
        replicate,
        message: format!("re-alignment is unreadable: {e}"),
    })?;

    accumulate_replicate(alignment, indexer, &indices, &realigned, replicate, counters)
}

/// Builds one tree per replicate alignment with the external tree builder.
/// A missing tree corrupts the aggregate bipartition count, so failures here
/// are always fatal.
pub fn build_trees(config: &RunConfig) -> Result<()> {
    let sample_dir = config.sample_dir();

    (1..=config.samples)
        .into_par_iter()
        .try_for_each(|n| -> Result<()> {
            let seed = config.seed.wrapping_add(n as u64);
            external::build_replicate_tree(&config.tools, &sample_dir, n, seed)
        })
}

/// Annotates the input tree with bipartition support from the replicate
/// trees; the result lands at `<output_dir>/tree.support.txt`.
pub fn annotate_tree(config: &RunConfig, input_tree: &Path) -> Result<()> {
    external::annotate_tree_support(
        &config.tools,
        &config.output_dir,
        &config.sample_dir(),
        input_tree,
        config.samples,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::SupportReport;

    fn matrix(rows: &[&str]) -> AlignmentMatrix {
        let labels = (0..rows.len()).map(|i| format!("t{i}")).collect();
        let rows = rows.iter().map(|r| r.as_bytes().to_vec()).collect();
        AlignmentMatrix::new(labels, rows).unwrap()
    }

    fn config(dir: &Path, samples: usize) -> RunConfig {
        RunConfig {
            algorithm: Algorithm::Rawr,
            task: Task::Msa,
            samples,
            reverse_rate: 0.1,
            anchor_len: 5,
            anchor_num: 20,
            seed: 1234,
            output_dir: dir.to_path_buf(),
            tools: ToolLocations::default(),
            tool_errors: ToolErrorPolicy::default(),
        }
    }

    #[test]
    fn algorithm_and_task_parse() {
        assert_eq!("RAWR".parse(), Ok(Algorithm::Rawr));
        assert_eq!("seres".parse(), Ok(Algorithm::Seres));
        assert!("walk".parse::<Algorithm>().is_err());
        assert_eq!("MSA".parse(), Ok(Task::Msa));
        assert_eq!("tree".parse(), Ok(Task::Tree));
    }

    #[test]
    fn generated_replicates_have_the_expected_shape() {
        let alignment = matrix(&["AAAA-A", "AAAAAA", "AAA-AA", "AAAAAA"]);
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), 2);

        let barriers = prepare_barriers(&alignment, &config).unwrap();
        assert!(barriers.is_none());
        generate_samples(&alignment, barriers.as_deref(), &config).unwrap();

        for n in 1..=2 {
            let indices =
                output::read_index(&output::index_path(&config.sample_dir(), n), n).unwrap();
            assert_eq!(indices.len(), 6);
            assert!(indices.iter().all(|&c| c < 6));

            let fasta =
                std::fs::read_to_string(output::gapless_fasta_path(&config.sample_dir(), n))
                    .unwrap();
            assert!(!fasta.contains('-'));
            assert_eq!(fasta.matches('>').count(), 4);
        }
    }

    #[test]
    fn generation_is_deterministic_for_a_seed() {
        let alignment = matrix(&["ACGTACGT", "ACG-ACGT", "ACGTAC-T"]);
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let config_a = config(dir_a.path(), 3);
        let config_b = config(dir_b.path(), 3);

        generate_samples(&alignment, None, &config_a).unwrap();
        generate_samples(&alignment, None, &config_b).unwrap();

        for n in 1..=3 {
            let a = output::read_index(&output::index_path(&config_a.sample_dir(), n), n).unwrap();
            let b = output::read_index(&output::index_path(&config_b.sample_dir(), n), n).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn identity_realignment_round_trip_gives_unit_support() {
        let alignment = matrix(&["AAAA-A", "AAAAAA", "AAA-AA", "AAAAAA"]);
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), 2);
        generate_samples(&alignment, None, &config).unwrap();

        // Stand in for the external aligner: re-align each replicate to the
        // resampled column order itself.
        for n in 1..=2 {
            let indices =
                output::read_index(&output::index_path(&config.sample_dir(), n), n).unwrap();
            let resampled = alignment.subsample(&indices);
            let mut text = String::new();
            for (row, label) in resampled.labels().iter().enumerate() {
                text.push_str(&format!(
                    ">{label}\n{}\n",
                    String::from_utf8_lossy(resampled.row(row))
                ));
            }
            std::fs::write(output::aligned_fasta_path(&config.sample_dir(), n), text).unwrap();
        }

        let counters = accumulate_support(&alignment, &config).unwrap();
        assert_eq!(counters.replicates, 2);

        let indexer = PairIndexer::new(4);
        let report = SupportReport::new(&alignment, indexer, &counters);
        for (idx, &s) in report.support().iter().enumerate() {
            if counters.sample[idx] > 0 {
                assert_eq!(s, 1.0, "pair index {idx}");
            }
        }
    }

    #[test]
    fn missing_replicates_are_skipped_not_fatal() {
        let alignment = matrix(&["AAAA-A", "AAAAAA", "AAA-AA", "AAAAAA"]);
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), 3);
        generate_samples(&alignment, None, &config).unwrap();

        // only replicate 2 gets a re-alignment
        let indices = output::read_index(&output::index_path(&config.sample_dir(), 2), 2).unwrap();
        let resampled = alignment.subsample(&indices);
        let mut text = String::new();
        for (row, label) in resampled.labels().iter().enumerate() {
            text.push_str(&format!(
                ">{label}\n{}\n",
                String::from_utf8_lossy(resampled.row(row))
            ));
        }
        std::fs::write(output::aligned_fasta_path(&config.sample_dir(), 2), text).unwrap();

        let counters = accumulate_support(&alignment, &config).unwrap();
        assert_eq!(counters.replicates, 1);
    }

    #[test]
    fn no_usable_replicate_is_an_error() {
        let alignment = matrix(&["AC", "AC"]);
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), 2);
        std::fs::create_dir_all(config.sample_dir()).unwrap();
        assert!(matches!(
            accumulate_support(&alignment, &config),
            Err(Error::NoUsableReplicates)
        ));
    }
}
