use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use uuid::Uuid;

use super::FileSource;
use crate::models::evidence::{ClientToken, FileStatus, UploadedFile};

pub(crate) struct TrackedFile {
    pub file: UploadedFile,
    pub transferred: u64,
    /// `None` for files refused by the constraints; they are never sent.
    pub source: Option<Arc<FileSource>>,
}

impl TrackedFile {
    fn weight(&self) -> u64 {
        self.file.size_bytes.max(1)
    }

    /// Bytes counted towards aggregate progress. A file only counts in
    /// full once the sink has acknowledged it.
    fn contribution(&self) -> u64 {
        if self.file.status == FileStatus::Stored {
            self.weight()
        } else {
            self.transferred.min(self.weight() - 1)
        }
    }
}

pub(crate) struct SessionState {
    pub files: Vec<TrackedFile>,
    percent: f64,
}

impl SessionState {
    fn recompute(&mut self) -> f64 {
        let total: u64 = self.files.iter().map(TrackedFile::weight).sum();
        let done: u64 = self.files.iter().map(TrackedFile::contribution).sum();
        let computed = if total == 0 {
            100.0
        } else {
            done as f64 / total as f64 * 100.0
        };
        self.percent = self.percent.max(computed);
        self.percent
    }
}

struct Shared {
    state: Mutex<SessionState>,
    progress: watch::Sender<f64>,
    cancel: watch::Sender<bool>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One invocation of the pipeline over a bounded file set.
///
/// Cloning yields another handle to the same session, so one task can
/// drive the upload while another watches progress or cancels.
#[derive(Clone)]
pub struct UploadSession {
    id: Uuid,
    shared: Arc<Shared>,
}

impl UploadSession {
    pub(crate) fn new(files: Vec<TrackedFile>) -> Self {
        let mut state = SessionState {
            files,
            percent: 0.0,
        };
        let initial = state.recompute();
        let (progress, _) = watch::channel(initial);
        let (cancel, _) = watch::channel(false);

        Self {
            id: Uuid::new_v4(),
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                progress,
                cancel,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current snapshot of every file in the session, in submission order.
    pub fn files(&self) -> Vec<UploadedFile> {
        self.shared.lock().files.iter().map(|t| t.file.clone()).collect()
    }

    pub fn tokens(&self) -> Vec<ClientToken> {
        self.shared
            .lock()
            .files
            .iter()
            .map(|t| t.file.client_token)
            .collect()
    }

    /// Aggregate progress in percent, never decreasing.
    pub fn percent(&self) -> f64 {
        *self.shared.progress.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.shared.progress.subscribe()
    }

    /// Stop transfers of files not yet stored. Stored files stay stored.
    pub fn cancel(&self) {
        self.shared.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.shared.cancel.borrow()
    }

    pub(crate) fn cancelled_signal(&self) -> watch::Receiver<bool> {
        self.shared.cancel.subscribe()
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.shared.lock();
        let result = f(&mut state);
        let percent = state.recompute();
        drop(state);
        self.shared.progress.send_if_modified(|current| {
            if percent > *current {
                *current = percent;
                true
            } else {
                false
            }
        });
        result
    }

    pub(crate) fn progress_for(&self, index: usize) -> ByteProgress {
        ByteProgress {
            session: self.clone(),
            index,
        }
    }
}

/// Handed to the sink so the transport can report bytes as they go out.
#[derive(Clone)]
pub struct ByteProgress {
    session: UploadSession,
    index: usize,
}

impl ByteProgress {
    /// Record the cumulative number of bytes transferred for this file.
    /// Lower values than previously reported are ignored.
    pub fn report(&self, transferred: u64) {
        self.session.with_state(|state| {
            if let Some(tracked) = state.files.get_mut(self.index) {
                let capped = transferred.min(tracked.file.size_bytes);
                tracked.transferred = tracked.transferred.max(capped);
            }
        });
    }
}
