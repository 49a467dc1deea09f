use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gantry_core::{Channel, ManifestFile, UpdateManifest};
use semver::{Version, VersionReq};

use crate::diff::plan_updates;
use crate::listener::ProgressListener;
use crate::transport::{UpdateScope, UpdateTransport};
use crate::verify::sha256_file;

/// Chunk size for the download loop; also the progress granularity.
const DOWNLOAD_CHUNK: usize = 256 * 1024;

/// Downloads per file before a persistent hash mismatch fails the session.
pub const MAX_DOWNLOAD_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("update manifest unavailable for channel '{channel}': {reason}")]
    Manifest { channel: Channel, reason: String },

    #[error("launcher {current} does not satisfy manifest requirement {required}")]
    LauncherOutdated {
        current: Version,
        required: VersionReq,
    },

    #[error("transfer failed for '{path}': {reason}")]
    Transport { path: String, reason: String },

    #[error(
        "hash mismatch for '{path}' after {attempts} attempts (expected {expected}, got {actual})"
    )]
    HashMismatch {
        path: String,
        attempts: u32,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Cooperative cancellation flag, checked between files and between chunks
/// of a single file's download.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// What to do with local files the manifest no longer lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrunePolicy {
    /// Leave extraneous files untouched (default).
    #[default]
    Keep,
    /// Delete extraneous files after the sync completes.
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStats {
    /// Files the diff step selected for download.
    pub planned: usize,
    /// Files actually downloaded, verified, and applied.
    pub downloaded: usize,
    /// Files deleted under [`PrunePolicy::Remove`].
    pub pruned: usize,
    /// Local files absent from the manifest, whether or not they were
    /// pruned.
    pub extraneous: Vec<String>,
}

/// Terminal state of one synchronization pass. Cancellation is a normal
/// outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Completed(UpdateStats),
    Cancelled,
}

enum FileStep {
    Applied,
    Cancelled,
}

/// Synchronizes a local file tree against the remote manifest of one
/// channel/scope, reporting through a [`ProgressListener`].
///
/// One instance can drive any number of passes; all per-pass state lives in
/// the `run` invocation.
pub struct FileUpdater<'a> {
    transport: &'a dyn UpdateTransport,
    listener: &'a dyn ProgressListener,
    prune: PrunePolicy,
    skip: Vec<String>,
}

impl<'a> FileUpdater<'a> {
    pub fn new(transport: &'a dyn UpdateTransport, listener: &'a dyn ProgressListener) -> Self {
        Self {
            transport,
            listener,
            prune: PrunePolicy::default(),
            skip: Vec::new(),
        }
    }

    pub fn prune_policy(mut self, policy: PrunePolicy) -> Self {
        self.prune = policy;
        self
    }

    /// Excludes a relative path from the diff and from pruning. Used for
    /// the running launcher binary, which cannot be replaced in place.
    pub fn skip_path(mut self, path: impl Into<String>) -> Self {
        self.skip.push(path.into());
        self
    }

    /// Runs one full pass: fetch manifest, diff, then per file
    /// download/verify/apply, then the final listener notifications.
    pub fn run(
        &self,
        channel: Channel,
        scope: &UpdateScope,
        target: &Path,
        cancel: &CancelToken,
    ) -> Result<UpdateOutcome, UpdateError> {
        let manifest = self.transport.fetch_manifest(channel, scope)?;
        ensure_launcher_version(&manifest)?;

        let plan = plan_updates(&manifest, target, &self.skip)?;
        log::info!(
            "sync {scope}: {} of {} files need download",
            plan.needed.len(),
            manifest.files.len()
        );

        let mut downloaded = 0_usize;
        for entry in &plan.needed {
            if cancel.is_cancelled() {
                return Ok(UpdateOutcome::Cancelled);
            }
            match self.sync_file(channel, scope, entry, target, cancel)? {
                FileStep::Applied => downloaded += 1,
                FileStep::Cancelled => return Ok(UpdateOutcome::Cancelled),
            }
        }

        let mut pruned = 0_usize;
        if self.prune == PrunePolicy::Remove {
            for path in &plan.extraneous {
                let victim = target.join(path);
                fs::remove_file(&victim)?;
                pruned += 1;
                log::info!("pruned extraneous file {}", victim.display());
            }
        }

        self.listener.update_files(&manifest.files);
        self.listener.done_update();

        Ok(UpdateOutcome::Completed(UpdateStats {
            planned: plan.needed.len(),
            downloaded,
            pruned,
            extraneous: plan.extraneous,
        }))
    }

    /// Download, verify, and atomically apply one file. The destination is
    /// only ever replaced by a fully verified part file, so an interruption
    /// at any point leaves either the old complete file or the new one.
    fn sync_file(
        &self,
        channel: Channel,
        scope: &UpdateScope,
        entry: &ManifestFile,
        target: &Path,
        cancel: &CancelToken,
    ) -> Result<FileStep, UpdateError> {
        let destination = target.join(&entry.path);
        let part_path = part_path_for(&destination);

        self.listener.begin_file(entry);

        let mut attempts = 0_u32;
        loop {
            attempts += 1;
            match self.download_to_part(channel, scope, entry, &part_path, cancel)? {
                FileStep::Cancelled => {
                    let _ = fs::remove_file(&part_path);
                    return Ok(FileStep::Cancelled);
                }
                FileStep::Applied => {}
            }

            let actual = sha256_file(&part_path)?;
            if actual == entry.sha256 {
                break;
            }

            let _ = fs::remove_file(&part_path);
            log::warn!(
                "hash mismatch for '{}' on attempt {attempts}/{MAX_DOWNLOAD_ATTEMPTS}",
                entry.path
            );
            if attempts >= MAX_DOWNLOAD_ATTEMPTS {
                return Err(UpdateError::HashMismatch {
                    path: entry.path.clone(),
                    attempts,
                    expected: entry.sha256.clone(),
                    actual,
                });
            }
        }

        if destination.exists() {
            fs::remove_file(&destination)?;
        }
        fs::rename(&part_path, &destination)?;

        self.listener.end_file(entry);
        Ok(FileStep::Applied)
    }

    fn download_to_part(
        &self,
        channel: Channel,
        scope: &UpdateScope,
        entry: &ManifestFile,
        part_path: &Path,
        cancel: &CancelToken,
    ) -> Result<FileStep, UpdateError> {
        if let Some(parent) = part_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut reader = self.transport.open_file(channel, scope, entry)?;
        let mut file = fs::File::create(part_path)?;
        let mut buffer = vec![0_u8; DOWNLOAD_CHUNK];
        let mut transferred = 0_u64;

        loop {
            if cancel.is_cancelled() {
                return Ok(FileStep::Cancelled);
            }

            let read = reader
                .read(&mut buffer)
                .map_err(|source| UpdateError::Transport {
                    path: entry.path.clone(),
                    reason: source.to_string(),
                })?;
            if read == 0 {
                break;
            }

            file.write_all(&buffer[..read])?;
            transferred += read as u64;
            self.listener.file_progress(entry, transferred);
        }

        file.flush()?;
        Ok(FileStep::Applied)
    }
}

fn ensure_launcher_version(manifest: &UpdateManifest) -> Result<(), UpdateError> {
    let Some(required) = &manifest.min_launcher else {
        return Ok(());
    };
    let Ok(current) = Version::parse(env!("CARGO_PKG_VERSION")) else {
        return Ok(());
    };

    if !required.matches(&current) {
        return Err(UpdateError::LauncherOutdated {
            current,
            required: required.clone(),
        });
    }
    Ok(())
}

fn part_path_for(destination: &Path) -> PathBuf {
    destination.with_file_name(format!(
        "{}.part",
        destination
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("download")
    ))
}
