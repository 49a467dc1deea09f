use gantry_core::ManifestFile;

/// Observer interface the update engine drives while synchronizing a tree.
///
/// Per-file events are ordered: `begin_file` precedes any `file_progress`
/// for that file, which precedes `end_file`. The engine only ever calls
/// through a shared reference, so implementations own their interior
/// mutability.
pub trait ProgressListener {
    /// The final manifest-derived listing, reported once the tree is in
    /// sync, immediately before [`ProgressListener::done_update`].
    fn update_files(&self, files: &[ManifestFile]);

    fn done_update(&self);

    fn begin_file(&self, file: &ManifestFile);

    fn end_file(&self, file: &ManifestFile);

    /// Cumulative transferred bytes for `file`, reported per chunk.
    fn file_progress(&self, file: &ManifestFile, transferred: u64);
}

/// Listener that swallows every event; used by headless flows and tests.
pub struct NullListener;

impl ProgressListener for NullListener {
    fn update_files(&self, _files: &[ManifestFile]) {}

    fn done_update(&self) {}

    fn begin_file(&self, _file: &ManifestFile) {}

    fn end_file(&self, _file: &ManifestFile) {}

    fn file_progress(&self, _file: &ManifestFile, _transferred: u64) {}
}
