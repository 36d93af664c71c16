use crate::planner::RenamePlan;
use crate::renamer::Renamer;
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    DryRun,
    Execute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RenameStatus {
    Renamed,
    Unchanged,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct RenameOutcome {
    pub source: PathBuf,
    pub target: PathBuf,
    #[serde(flatten)]
    pub status: RenameStatus,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ApplyResult {
    pub outcomes: Vec<RenameOutcome>,
    pub applied: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub passes: usize,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Filesystem operations used by the commit loop.
pub trait CommitBackend {
    fn exists(&self, path: &Path) -> bool;
    /// Names listed in `dir`, spelled as stored.
    fn entry_names(&self, dir: &Path) -> HashSet<OsString>;
    /// True when the parent directory lists an entry spelled exactly like `path`.
    fn has_exact_entry(&self, path: &Path) -> bool {
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return false;
        };
        self.entry_names(parent).contains(name)
    }
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn move_path(&self, from: &Path, to: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiskBackend;

impl CommitBackend for DiskBackend {
    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn entry_names(&self, dir: &Path) -> HashSet<OsString> {
        entries_on_disk(dir)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))
    }

    fn move_path(&self, from: &Path, to: &Path) -> Result<()> {
        let Err(err) = fs::rename(from, to) else {
            return Ok(());
        };
        if !from.is_file() {
            return Err(err).with_context(|| {
                format!("failed to rename: {} -> {}", from.display(), to.display())
            });
        }
        debug!(%err, "rename failed, falling back to copy and remove");
        fs::copy(from, to)
            .with_context(|| format!("failed to copy: {} -> {}", from.display(), to.display()))?;
        fs::remove_file(from)
            .with_context(|| format!("failed to remove after copy: {}", from.display()))
    }
}

/// Reads the filesystem but never changes it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedBackend;

impl CommitBackend for SimulatedBackend {
    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn entry_names(&self, dir: &Path) -> HashSet<OsString> {
        entries_on_disk(dir)
    }

    fn create_dir_all(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn move_path(&self, _from: &Path, _to: &Path) -> Result<()> {
        Ok(())
    }
}

fn entries_on_disk(dir: &Path) -> HashSet<OsString> {
    fs::read_dir(dir)
        .map(|entries| entries.flatten().map(|entry| entry.file_name()).collect())
        .unwrap_or_default()
}

pub fn apply_plan(plan: &mut RenamePlan, mode: ApplyMode) -> Result<ApplyResult> {
    match mode {
        ApplyMode::DryRun => commit_batch(&mut plan.renamers, &SimulatedBackend),
        ApplyMode::Execute => commit_batch(&mut plan.renamers, &DiskBackend),
    }
}

enum Step {
    Unchanged,
    Moved,
    Blocked,
    Failed(String),
}

/// Commits every renamer whose destination is free, pass after pass, until a
/// pass makes no progress. Already committed renames are kept when others fail.
///
/// Sources and destinations may overlap (`a -> aa`, `aa -> aaa`): a destination
/// that another renamer of the batch vacated counts as free. A destination
/// claimed by an earlier commit never does. Cyclic swaps (`a <-> b`) end up
/// failed.
pub fn commit_batch(renamers: &mut [Renamer], backend: &dyn CommitBackend) -> Result<ApplyResult> {
    verify_sources(renamers, backend)?;

    let mut vacated = HashSet::<PathBuf>::new();
    let mut claimed = HashSet::<PathBuf>::new();
    let mut errors = HashMap::<usize, String>::new();
    let mut statuses = vec![None::<RenameStatus>; renamers.len()];
    let mut passes = 0usize;

    loop {
        passes += 1;
        let mut progress = false;

        for (index, renamer) in renamers.iter_mut().enumerate() {
            if statuses[index].is_some() || errors.contains_key(&index) {
                continue;
            }
            match commit_one(renamer, backend, &vacated, &claimed) {
                Step::Unchanged => {
                    debug!(path = %renamer.path().display(), "name not changed");
                    renamer.mark_committed();
                    statuses[index] = Some(RenameStatus::Unchanged);
                }
                Step::Moved => {
                    let source = renamer.path().to_path_buf();
                    let target = renamer.destination();
                    info!("{} -> {}", source.display(), target.display());
                    renamer.mark_committed();
                    statuses[index] = Some(RenameStatus::Renamed);
                    claimed.insert(target);
                    vacated.insert(source);
                    progress = true;
                }
                Step::Blocked => {}
                Step::Failed(reason) => {
                    warn!("{reason}");
                    errors.insert(index, reason);
                }
            }
        }

        debug!(pass = passes, progress, "commit pass finished");
        if !progress {
            break;
        }
    }

    let mut result = ApplyResult {
        passes,
        ..Default::default()
    };
    for (index, (renamer, status)) in renamers.iter().zip(statuses).enumerate() {
        let status = status.unwrap_or_else(|| {
            RenameStatus::Failed(
                errors
                    .remove(&index)
                    .unwrap_or_else(|| "destination is occupied".to_string()),
            )
        });
        match status {
            RenameStatus::Renamed => result.applied += 1,
            RenameStatus::Unchanged => result.unchanged += 1,
            RenameStatus::Failed(_) => result.failed += 1,
        }
        result.outcomes.push(RenameOutcome {
            source: renamer.path().to_path_buf(),
            target: renamer.destination(),
            status,
        });
    }
    Ok(result)
}

/// Every source must be listed verbatim by its parent directory. Each
/// directory is read once.
fn verify_sources(renamers: &[Renamer], backend: &dyn CommitBackend) -> Result<()> {
    let mut listings = HashMap::<&Path, HashSet<OsString>>::new();
    for renamer in renamers {
        let path = renamer.path();
        let listed = match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) => listings
                .entry(parent)
                .or_insert_with(|| backend.entry_names(parent))
                .contains(name),
            _ => false,
        };
        if !listed {
            bail!("source does not match the name on disk: {}", path.display());
        }
    }
    Ok(())
}

fn commit_one(
    renamer: &Renamer,
    backend: &dyn CommitBackend,
    vacated: &HashSet<PathBuf>,
    claimed: &HashSet<PathBuf>,
) -> Step {
    let src = renamer.path();
    let dst = renamer.destination();
    if src.as_os_str() == dst.as_os_str() {
        return Step::Unchanged;
    }
    if claimed.contains(&dst) {
        return Step::Blocked;
    }

    if is_case_only_change(src, &dst) && !backend.has_exact_entry(&dst) {
        let temp = temp_path_for(src);
        if backend.exists(&temp) {
            return Step::Blocked;
        }
        debug!(temp = %temp.display(), "case-only rename through temporary name");
        let moved = backend
            .move_path(src, &temp)
            .and_then(|()| backend.move_path(&temp, &dst));
        return match moved {
            Ok(()) => Step::Moved,
            Err(err) => Step::Failed(format!("{err:#}")),
        };
    }

    if backend.exists(&dst) && !vacated.contains(&dst) {
        return Step::Blocked;
    }

    let moved = match dst.parent() {
        Some(parent) => backend.create_dir_all(parent),
        None => Ok(()),
    }
    .and_then(|()| backend.move_path(src, &dst));
    match moved {
        Ok(()) => Step::Moved,
        Err(err) => Step::Failed(format!("{err:#}")),
    }
}

fn is_case_only_change(src: &Path, dst: &Path) -> bool {
    match (src.to_str(), dst.to_str()) {
        (Some(a), Some(b)) => a != b && a.to_lowercase() == b.to_lowercase(),
        _ => false,
    }
}

fn temp_path_for(src: &Path) -> PathBuf {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(5)
        .collect::<String>()
        .to_uppercase();
    let mut name = src.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
