//! Polling file watcher.
//!
//! Watches a single file by fingerprint (modification time, length, inode)
//! and calls back once the file has stopped changing for the debounce
//! interval. Runs on its own thread; dropping the watcher stops and joins it.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn};

/// Poll interval.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Quiet period after the last observed change before the callback fires.
pub const DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
    inode: u64,
}

fn fingerprint(path: &std::path::Path) -> Option<Fingerprint> {
    let meta = fs::metadata(path).ok()?;
    #[cfg(unix)]
    let inode = {
        use std::os::unix::fs::MetadataExt;
        meta.ino()
    };
    #[cfg(not(unix))]
    let inode = 0;
    Some(Fingerprint {
        modified: meta.modified().ok(),
        len: meta.len(),
        inode,
    })
}

/// Handle to a running watcher thread.
#[derive(Debug)]
pub struct FileWatcher {
    path: PathBuf,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FileWatcher {
    /// Start watching `path`. `on_change` runs on the watcher thread.
    pub fn watch<F>(path: PathBuf, on_change: F) -> std::io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let thread_path = path.clone();
        let initial = fingerprint(&path);
        let handle = thread::Builder::new()
            .name("authn-file-watch".into())
            .spawn(move || poll_loop(thread_path, initial, thread_stop, on_change))?;
        debug!(path = %path.display(), "watching file");
        Ok(Self {
            path,
            stop,
            handle: Some(handle),
        })
    }

    /// Stop the watcher thread and wait for it. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            // Dropped from inside the callback: the loop exits on its own.
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!(path = %self.path.display(), "file watcher thread panicked");
            }
            debug!(path = %self.path.display(), "stopped watching file");
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn poll_loop<F: Fn()>(
    path: PathBuf,
    initial: Option<Fingerprint>,
    stop: Arc<AtomicBool>,
    on_change: F,
) {
    let mut last = initial;
    let mut pending_since: Option<Instant> = None;

    while !stop.load(Ordering::SeqCst) {
        thread::sleep(POLL_INTERVAL);
        let current = fingerprint(&path);
        if current != last {
            last = current;
            pending_since = Some(Instant::now());
            continue;
        }
        if let Some(since) = pending_since
            && since.elapsed() >= DEBOUNCE
        {
            pending_since = None;
            if last.is_some() {
                on_change();
            }
        }
    }
}
