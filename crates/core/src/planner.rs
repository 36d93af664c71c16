use crate::renamer::{normalize_path, Renamer};
use crate::selection::{SelectionOptions, SelectionPipeline};
use crate::transform::Transform;
use anyhow::{bail, Context, Result};
use glob::Pattern;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub inputs: Vec<PathBuf>,
    pub recursive: bool,
    pub dir_only: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub selection: SelectionOptions,
    pub transform: Transform,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            inputs: vec![PathBuf::from(".")],
            recursive: false,
            dir_only: false,
            include: Vec::new(),
            exclude: Vec::new(),
            selection: SelectionOptions::default(),
            transform: Transform::Test {
                show_placeholders: false,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct RenameStats {
    pub scanned: usize,
    pub excluded: usize,
    pub skipped_non_utf8: usize,
    pub selected: usize,
    pub planned: usize,
    pub unchanged: usize,
}

#[derive(Debug, Serialize)]
pub struct RenamePlan {
    pub transform: Transform,
    pub renamers: Vec<Renamer>,
    pub stats: RenameStats,
}

/// Enumerates the inputs, runs the selection pipeline and the transform.
///
/// Every configuration, selection and resolution error surfaces here, before
/// anything on disk changes.
pub fn generate_plan(options: &PlanOptions) -> Result<RenamePlan> {
    let pipeline = SelectionPipeline::new(&options.selection)?;
    options.transform.validate()?;
    let filter = PathFilter::new(&options.include, &options.exclude)?;

    let paths = collect_paths(&options.inputs, options.recursive, options.dir_only)?;
    let mut stats = RenameStats::default();
    let mut renamers = Vec::with_capacity(paths.len());

    for path in paths {
        stats.scanned += 1;
        if filter.is_excluded(&path) {
            debug!(path = %path.display(), "excluded");
            stats.excluded += 1;
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            warn!("skipping non UTF-8 file name: {}", path.display());
            stats.skipped_non_utf8 += 1;
            continue;
        };

        let tokens = pipeline.select_file(&path, name)?;
        let renamer = Renamer::new(path, tokens)?;
        if renamer.has_selection() {
            stats.selected += 1;
        }
        renamers.push(renamer);
    }

    options.transform.apply_to_batch(&mut renamers)?;

    stats.planned = renamers.len();
    stats.unchanged = renamers
        .iter()
        .filter(|r| r.destination() == r.path())
        .count();

    Ok(RenamePlan {
        transform: options.transform.clone(),
        renamers,
        stats,
    })
}

/// Include/exclude globs matched against the full path.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl PathFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: compile_globs(include)?,
            exclude: compile_globs(exclude)?,
        })
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        let matches = |patterns: &[Pattern]| patterns.iter().any(|p| p.matches_path(path));
        matches(&self.exclude) && !matches(&self.include)
    }
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).with_context(|| format!("invalid glob pattern: {p}")))
        .collect()
}

/// Absolute, de-duplicated and sorted candidate paths.
pub fn collect_paths(inputs: &[PathBuf], recursive: bool, dir_only: bool) -> Result<Vec<PathBuf>> {
    let cwd = std::env::current_dir().context("failed to read the current directory")?;
    let mut out = BTreeSet::new();

    for input in inputs {
        let top = normalize_path(&cwd.join(input));
        if !top.exists() {
            bail!("file does not exist: {}", input.display());
        }

        if !top.is_dir() {
            if !dir_only {
                out.insert(top);
            }
            continue;
        }

        if recursive {
            for entry in WalkDir::new(&top).min_depth(1).sort_by_file_name() {
                let entry =
                    entry.with_context(|| format!("failed to walk directory: {}", top.display()))?;
                if entry.file_type().is_dir() == dir_only {
                    out.insert(entry.into_path());
                }
            }
        } else if dir_only {
            out.insert(top);
        } else {
            for entry in fs::read_dir(&top)
                .with_context(|| format!("failed to read directory: {}", top.display()))?
            {
                let entry =
                    entry.with_context(|| format!("failed to read entry in: {}", top.display()))?;
                let path = entry.path();
                if !path.is_dir() {
                    out.insert(path);
                }
            }
        }
    }

    Ok(out.into_iter().collect())
}
