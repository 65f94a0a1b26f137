//! Minimal Newick handling: enough to check that an input tree covers the
//! same taxon set as the input alignment. Tree building and annotation are
//! delegated to the external tree builder.

use crate::alignment::AlignmentMatrix;
use crate::error::{Error, Result};
use itertools::Itertools;
use std::collections::HashSet;

/// Extracts the leaf labels of a Newick tree string.
///
/// A leaf label is any name that directly follows `(` or `,`. Quoted labels
/// and internal node names (which follow `)`) are handled; comments in
/// brackets are not, matching the files the external tree builder emits.
pub fn leaf_labels(newick: &str) -> Result<Vec<String>> {
    let text = newick.trim();
    if !text.starts_with('(') || !text.ends_with(';') {
        return Err(Error::NewickParse(
            "tree must start with '(' and end with ';'".to_string(),
        ));
    }

    let mut labels = Vec::new();
    let mut depth = 0usize;
    let mut chars = text.char_indices().peekable();
    let mut leaf_position = false;

    while let Some((i, c)) = chars.next() {
        match c {
            '(' => {
                depth += 1;
                leaf_position = true;
            }
            ')' => {
                if depth == 0 {
                    return Err(Error::NewickParse("unbalanced parentheses".to_string()));
                }
                depth -= 1;
                leaf_position = false;
            }
            ',' => leaf_position = true,
            ';' => break,
            '\'' => {
                let start = i + 1;
                let mut end = start;
                for (j, q) in chars.by_ref() {
                    if q == '\'' {
                        end = j;
                        break;
                    }
                }
                if leaf_position {
                    labels.push(text[start..end].to_string());
                    leaf_position = false;
                }
            }
            c if c.is_whitespace() || c == ':' => {
                if c == ':' {
                    // branch length follows; skip it
                    while let Some(&(_, n)) = chars.peek() {
                        if matches!(n, ',' | ')' | ';') {
                            break;
                        }
                        chars.next();
                    }
                }
            }
            _ => {
                let start = i;
                let mut end = text.len();
                while let Some(&(j, n)) = chars.peek() {
                    if matches!(n, ',' | ')' | ':' | ';') {
                        end = j;
                        break;
                    }
                    chars.next();
                }
                if leaf_position {
                    labels.push(text[start..end].trim().to_string());
                    leaf_position = false;
                }
            }
        }
    }

    if depth != 0 {
        return Err(Error::NewickParse("unbalanced parentheses".to_string()));
    }
    if labels.is_empty() {
        return Err(Error::NewickParse("tree has no leaves".to_string()));
    }
    Ok(labels)
}

/// Fails unless the tree leaf set equals the alignment label set.
pub fn check_taxa(newick: &str, alignment: &AlignmentMatrix) -> Result<()> {
    let leaves: HashSet<String> = leaf_labels(newick)?.into_iter().collect();
    let taxa: HashSet<String> = alignment.labels().iter().cloned().collect();

    if leaves == taxa {
        return Ok(());
    }

    let missing = taxa.difference(&leaves).sorted().join(", ");
    let extra = leaves.difference(&taxa).sorted().join(", ");
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing from tree: {missing}"));
    }
    if !extra.is_empty() {
        parts.push(format!("not in alignment: {extra}"));
    }
    Err(Error::TaxonMismatch(parts.join("; ")))
}
