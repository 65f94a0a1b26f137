//! External aligner and tree-builder invocation.
//!
//! The core treats both tools as synchronous collaborators with a
//! success/failure outcome. Binary locations are explicit configuration, not
//! global state.

use crate::error::{Error, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Locations of the external binaries. Defaults resolve through `PATH`.
#[derive(Clone, Debug)]
pub struct ToolLocations {
    pub mafft: PathBuf,
    pub raxml: PathBuf,
}

impl Default for ToolLocations {
    fn default() -> Self {
        Self {
            mafft: PathBuf::from("mafft"),
            raxml: PathBuf::from("raxmlHPC"),
        }
    }
}

/// What to do when the external aligner fails for one replicate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ToolErrorPolicy {
    /// Abort the whole run (default).
    #[default]
    Fatal,
    /// Log and skip the replicate; its artifacts stay absent.
    Skip,
}

impl std::fmt::Display for ToolErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fatal => write!(f, "fatal"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

impl std::str::FromStr for ToolErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fatal" => Ok(Self::Fatal),
            "skip" => Ok(Self::Skip),
            _ => Err(format!(
                "invalid tool-error policy '{s}': must be 'fatal' or 'skip'"
            )),
        }
    }
}

fn tool_error(tool: &Path, message: String) -> Error {
    Error::ExternalTool {
        tool: tool.display().to_string(),
        message,
    }
}

fn run_checked(tool: &Path, command: &mut Command) -> Result<()> {
    debug!("Running {command:?}");
    let status = command
        .status()
        .map_err(|e| tool_error(tool, format!("failed to launch: {e}")))?;
    if !status.success() {
        return Err(tool_error(tool, format!("exited with {status}")));
    }
    Ok(())
}

fn require_output(tool: &Path, path: &Path) -> Result<()> {
    let populated = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
    if populated {
        Ok(())
    } else {
        Err(tool_error(
            tool,
            format!("expected output '{}' is missing or empty", path.display()),
        ))
    }
}

/// Re-aligns one replicate's gapless FASTA, writing the aligner's stdout to
/// `aligned`. Non-zero exit or a missing/empty output file is an error.
pub fn align_replicate(tools: &ToolLocations, gapless: &Path, aligned: &Path) -> Result<()> {
    let out = fs::File::create(aligned)?;
    let mut command = Command::new(&tools.mafft);
    command
        .arg(gapless)
        .stdout(Stdio::from(out))
        .stderr(Stdio::null());
    run_checked(&tools.mafft, &mut command)?;
    require_output(&tools.mafft, aligned)
}

/// RAxML refuses to run if logs from a previous run with the same name are
/// present, so stale `RAxML_*.<run_name>` files are removed first.
fn remove_stale_raxml_files(dir: &Path, run_name: &str) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let suffix = format!(".{run_name}");
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("RAxML_") && name.ends_with(suffix.as_str()) {
            let _ = fs::remove_file(entry.path());
        }
    }
}

/// Builds the best tree for one replicate alignment and leaves it at
/// `<sample_dir>/<n>.tree`.
pub fn build_replicate_tree(
    tools: &ToolLocations,
    sample_dir: &Path,
    replicate: usize,
    seed: u64,
) -> Result<()> {
    remove_stale_raxml_files(sample_dir, &replicate.to_string());

    let aligned = sample_dir.join(format!("{replicate}.aln.fasta"));
    let mut command = Command::new(&tools.raxml);
    command
        .arg("-f")
        .arg("a")
        .arg("-s")
        .arg(&aligned)
        .arg("-n")
        .arg(replicate.to_string())
        .arg("-m")
        .arg("GTRCAT")
        .arg("-p")
        .arg(seed.to_string())
        .arg("-x")
        .arg(seed.to_string())
        .arg("-#")
        .arg("10")
        .arg("-w")
        .arg(sample_dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    run_checked(&tools.raxml, &mut command)?;

    let best = sample_dir.join(format!("RAxML_bestTree.{replicate}"));
    require_output(&tools.raxml, &best)?;
    fs::rename(&best, sample_dir.join(format!("{replicate}.tree")))?;
    Ok(())
}

/// Concatenates the replicate trees, annotates the input tree with
/// bipartition support, and leaves the result at
/// `<output_dir>/tree.support.txt`.
pub fn annotate_tree_support(
    tools: &ToolLocations,
    output_dir: &Path,
    sample_dir: &Path,
    input_tree: &Path,
    samples: usize,
) -> Result<()> {
    let all_trees = output_dir.join("sample.trees");
    let mut combined = String::new();
    for n in 1..=samples {
        let tree_file = sample_dir.join(format!("{n}.tree"));
        let text = fs::read_to_string(&tree_file).map_err(|e| {
            tool_error(
                &tools.raxml,
                format!("replicate tree '{}' is unreadable: {e}", tree_file.display()),
            )
        })?;
        combined.push_str(text.trim_end());
        combined.push('\n');
    }
    fs::write(&all_trees, combined)?;

    remove_stale_raxml_files(output_dir, "support");

    let mut command = Command::new(&tools.raxml);
    command
        .arg("-f")
        .arg("b")
        .arg("-m")
        .arg("GTRGAMMA")
        .arg("-t")
        .arg(input_tree)
        .arg("-z")
        .arg(&all_trees)
        .arg("-n")
        .arg("support")
        .arg("-w")
        .arg(output_dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    run_checked(&tools.raxml, &mut command)?;

    let annotated = output_dir.join("RAxML_bipartitions.support");
    require_output(&tools.raxml, &annotated)?;
    fs::rename(&annotated, output_dir.join("tree.support.txt"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_locations_resolve_through_path() {
        let tools = ToolLocations::default();
        assert_eq!(tools.mafft, PathBuf::from("mafft"));
        assert_eq!(tools.raxml, PathBuf::from("raxmlHPC"));
    }

    #[test]
    fn policy_parses_from_str() {
        assert_eq!("fatal".parse(), Ok(ToolErrorPolicy::Fatal));
        assert_eq!("skip".parse(), Ok(ToolErrorPolicy::Skip));
        assert!("quiet".parse::<ToolErrorPolicy>().is_err());
    }

    #[test]
    fn missing_binary_surfaces_an_error() {
        let tools = ToolLocations {
            mafft: PathBuf::from("/nonexistent/mafft"),
            raxml: PathBuf::from("/nonexistent/raxmlHPC"),
        };
        let dir = tempfile::tempdir().unwrap();
        let gapless = dir.path().join("1.seq.fasta");
        std::fs::write(&gapless, ">a\nACGT\n").unwrap();
        let aligned = dir.path().join("1.aln.fasta");
        assert!(matches!(
            align_replicate(&tools, &gapless, &aligned),
            Err(Error::ExternalTool { .. })
        ));
    }
}
