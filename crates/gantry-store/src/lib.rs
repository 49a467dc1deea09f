mod named_lock;
mod properties;

pub use named_lock::{LockError, NamedLock, NamedLockGuard, LAUNCHER_LOCK, PROPERTIES_LOCK};
pub use properties::PropertyStore;
