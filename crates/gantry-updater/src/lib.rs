mod diff;
mod engine;
mod listener;
mod transport;
mod verify;

pub use diff::{plan_updates, scan_tree, DiffPlan};
pub use engine::{
    CancelToken, FileUpdater, PrunePolicy, UpdateError, UpdateOutcome, UpdateStats,
    MAX_DOWNLOAD_ATTEMPTS,
};
pub use listener::{NullListener, ProgressListener};
pub use transport::{
    ChannelEndpoints, DirTransport, HttpTransport, UpdateScope, UpdateTransport,
    DEFAULT_DEVELOP_ENDPOINT, DEFAULT_MAIN_ENDPOINT,
};
pub use verify::{sha256_file, sha256_hex};
