mod alignment;
mod anchor;
mod error;
mod external;
mod fasta;
mod newick;
mod output;
mod pairs;
mod replicate;
mod report;
mod sampler;
mod similarity;
mod support;

use crate::error::{Error, Result};
use crate::external::{ToolErrorPolicy, ToolLocations};
use crate::fasta::parse_alignment;
use crate::pairs::PairIndexer;
use crate::replicate::{Algorithm, RunConfig, Task};
use crate::report::{ReportConfig, SupportReport, write_report};
use clap::{
    CommandFactory, Parser,
    builder::styling::{AnsiColor, Style, Styles},
};
use clio::Input;
use env_logger::Builder;
use log::{LevelFilter, info};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Cyan.on_default().bold())
    .usage(AnsiColor::Yellow.on_default().bold())
    .literal(AnsiColor::Yellow.on_default().bold())
    .placeholder(Style::new().dimmed());

fn parse_reverse_rate(s: &str) -> std::result::Result<f64, String> {
    let v: f64 = s.parse().map_err(|_| format!("`{s}` isn't a number"))?;
    if v <= 0.0 || v >= 1.0 {
        Err("reversal rate must be strictly between 0 and 1".to_string())
    } else {
        Ok(v)
    }
}

fn parse_positive(s: &str) -> std::result::Result<usize, String> {
    let v: usize = s
        .parse()
        .map_err(|_| format!("`{s}` is not a valid count"))?;
    if v == 0 {
        Err("value must be at least 1".to_string())
    } else {
        Ok(v)
    }
}

#[derive(Parser)]
#[command(version, about, styles = STYLES, max_term_width = 88)]
struct Cli {
    /// Input alignment in FASTA format
    #[arg(default_value = "-")]
    input: Input,

    /// Output directory for replicate artifacts and support tables
    #[arg(short = 'd', long, default_value = "rawr_output")]
    output_dir: PathBuf,

    /// Resampling algorithm: rawr (random walk) or seres (anchor-guided)
    #[arg(short = 'a', long, default_value = "rawr", value_parser = clap::value_parser!(Algorithm))]
    algorithm: Algorithm,

    /// Support target: msa (per-column pair support) or tree (bipartition support)
    #[arg(short = 't', long, default_value = "msa", value_parser = clap::value_parser!(Task))]
    task: Task,

    /// Input tree in Newick format (required for the tree task)
    #[arg(long)]
    tree: Option<PathBuf>,

    /// Number of resampled replicates
    #[arg(short = 'n', long, default_value = "10", value_parser = parse_positive)]
    samples: usize,

    /// Reversal probability of the resampling walk, in (0, 1)
    #[arg(short = 'r', long, default_value = "0.1", value_parser = parse_reverse_rate)]
    reverse_rate: f64,

    /// Anchor length (seres only)
    #[arg(long, default_value = "5", value_parser = parse_positive)]
    anchor_len: usize,

    /// Number of anchors (seres only)
    #[arg(long, default_value = "20", value_parser = parse_positive)]
    anchor_num: usize,

    /// Seed for reproducible resampling; a random seed is drawn if omitted
    #[arg(short = 's', long)]
    seed: Option<u64>,

    /// Path to the external aligner binary
    #[arg(long, default_value = "mafft")]
    mafft: PathBuf,

    /// Path to the external tree builder binary
    #[arg(long, default_value = "raxmlHPC")]
    raxml: PathBuf,

    /// Aligner failure policy: fatal (abort the run) or skip (drop the replicate)
    #[arg(long, default_value = "fatal", value_parser = clap::value_parser!(ToolErrorPolicy))]
    tool_errors: ToolErrorPolicy,

    /// Number of worker threads (0 uses all cores)
    #[arg(short = 'j', long, default_value = "0")]
    threads: usize,

    /// Write a markdown run report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Verbosity level (-v for normal logging, -vv for detailed logging)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbosity: u8,
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Off,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| writeln!(buf, "[{}] {}", buf.timestamp(), record.args()))
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    if cli.input.is_std() && std::io::stdin().is_terminal() {
        #[allow(clippy::unwrap_used)]
        Cli::command().print_help().unwrap();
        return Ok(());
    }

    if cli.threads > 0 {
        #[allow(clippy::unwrap_used)]
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .unwrap();
    }

    let alignment = match parse_alignment(&cli.input) {
        Ok(alignment) => alignment,
        Err(Error::EmptyInput) if cli.input.is_std() => {
            #[allow(clippy::unwrap_used)]
            Cli::command().print_help().unwrap();
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    // A row with no residues can never appear in a valid resample.
    for row in 0..alignment.row_count() {
        if alignment.degapped_row(row).is_empty() {
            return Err(Error::FastaParse(format!(
                "taxon '{}' contains only gaps",
                alignment.label(row)
            )));
        }
    }

    info!(
        "Loaded input alignment (sequences: {}, length: {})",
        alignment.row_count(),
        alignment.column_count()
    );

    let input_tree = match (cli.task, &cli.tree) {
        (Task::Tree, Some(path)) => {
            let text = std::fs::read_to_string(path)?;
            newick::check_taxa(&text, &alignment)?;
            Some(path.clone())
        }
        (Task::Tree, None) => {
            return Err(Error::NewickParse(
                "the tree task requires --tree".to_string(),
            ));
        }
        (Task::Msa, _) => None,
    };

    let seed = cli.seed.unwrap_or_else(rand::random);
    let config = RunConfig {
        algorithm: cli.algorithm,
        task: cli.task,
        samples: cli.samples,
        reverse_rate: cli.reverse_rate,
        anchor_len: cli.anchor_len,
        anchor_num: cli.anchor_num,
        seed,
        output_dir: cli.output_dir.clone(),
        tools: ToolLocations {
            mafft: cli.mafft.clone(),
            raxml: cli.raxml.clone(),
        },
        tool_errors: cli.tool_errors,
    };

    // Fails before any sampling if the anchor configuration is infeasible.
    let barriers = replicate::prepare_barriers(&alignment, &config)?;

    info!(
        "Generating {} {} replicates (seed: {seed})",
        config.samples, config.algorithm
    );
    replicate::generate_samples(&alignment, barriers.as_deref(), &config)?;

    info!("Re-aligning replicates");
    replicate::align_samples(&config)?;

    match config.task {
        Task::Msa => {
            let counters = replicate::accumulate_support(&alignment, &config)?;
            info!(
                "Accumulated support from {} of {} replicates",
                counters.replicates, config.samples
            );

            let indexer = PairIndexer::new(alignment.row_count());
            let support = SupportReport::new(&alignment, indexer, &counters);

            let csv_path = config.output_dir.join("MSA.support.csv");
            support.write_csv(&csv_path)?;
            info!("MSA support written to {}", csv_path.display());

            let jalview_path = config.output_dir.join("MSA.support.jalview.txt");
            support.write_jalview_annotation(&jalview_path, "pink")?;
            info!("Jalview annotation written to {}", jalview_path.display());

            if let Some(ref report_path) = cli.report {
                write_report(
                    report_path,
                    &report_config(cli, &config),
                    &support,
                    counters.replicates,
                )?;
                info!("Report written to {}", report_path.display());
            }
        }
        Task::Tree => {
            info!("Building replicate trees");
            replicate::build_trees(&config)?;

            #[allow(clippy::unwrap_used)]
            replicate::annotate_tree(&config, input_tree.as_deref().unwrap())?;
            info!(
                "Tree support written to {}",
                config.output_dir.join("tree.support.txt").display()
            );
        }
    }

    Ok(())
}

fn report_config(cli: &Cli, config: &RunConfig) -> ReportConfig {
    let input_path = if cli.input.is_std() {
        "<stdin>".to_string()
    } else {
        cli.input.path().to_string_lossy().to_string()
    };

    let seres = config.algorithm == Algorithm::Seres;
    ReportConfig {
        input_path,
        output_dir: config.output_dir.to_string_lossy().to_string(),
        algorithm: config.algorithm.to_string(),
        task: config.task.to_string(),
        samples: config.samples,
        reverse_rate: config.reverse_rate,
        anchor_len: seres.then_some(config.anchor_len),
        anchor_num: seres.then_some(config.anchor_num),
        seed: Some(config.seed),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbosity);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
