use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::session::{TrackedFile, UploadSession};
use super::sink::{SinkError, SinkObject, UploadSink};
use super::{LocalFile, UploadConstraints};
use crate::models::evidence::{ClientToken, FileStatus, UploadedFile};

const CANCELLED: &str = "cancelled";

/// How a session resolved after a `run` or `retry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Every file reached `Stored`.
    Complete(Vec<UploadedFile>),
    PartialFailure {
        stored: Vec<UploadedFile>,
        failed: Vec<UploadedFile>,
    },
    /// The caller cancelled; files already stored stay stored.
    Cancelled {
        stored: Vec<UploadedFile>,
        unfinished: Vec<UploadedFile>,
    },
}

impl UploadOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, UploadOutcome::Complete(_))
    }

    fn resolve(files: Vec<UploadedFile>, cancelled: bool) -> Self {
        let (stored, rest): (Vec<_>, Vec<_>) = files.into_iter().partition(UploadedFile::is_stored);
        if cancelled && !rest.is_empty() {
            UploadOutcome::Cancelled {
                stored,
                unfinished: rest,
            }
        } else if rest.is_empty() {
            UploadOutcome::Complete(stored)
        } else {
            UploadOutcome::PartialFailure {
                stored,
                failed: rest,
            }
        }
    }
}

/// Drives local files into an [`UploadSink`].
///
/// There is no automatic retry: a failed file stays `Failed` until the
/// caller asks for it again with [`UploadPipeline::retry`], which reuses
/// the original client tokens.
#[derive(Clone)]
pub struct UploadPipeline {
    sink: Arc<dyn UploadSink>,
}

impl UploadPipeline {
    pub fn new(sink: Arc<dyn UploadSink>) -> Self {
        Self { sink }
    }

    /// Validate the files and assign client tokens. No bytes move yet.
    ///
    /// A file violating the constraints is marked `Failed` with the reason;
    /// its siblings are unaffected.
    pub fn begin(&self, files: Vec<LocalFile>, constraints: &UploadConstraints) -> UploadSession {
        let mut seen = HashSet::new();
        let tracked = files
            .into_iter()
            .enumerate()
            .map(|(index, local)| {
                let token = local.client_token.unwrap_or_else(ClientToken::generate);
                let rejection = if seen.insert(token) {
                    constraints.rejection(index, &local)
                } else {
                    Some(format!("duplicate client token {token}"))
                };

                let (status, source) = match &rejection {
                    Some(reason) => {
                        debug!("Refusing {}: {reason}", local.file_name);
                        (FileStatus::Failed, None)
                    }
                    None => (FileStatus::Pending, Some(Arc::new(local.source))),
                };

                TrackedFile {
                    file: UploadedFile {
                        client_token: token,
                        file_name: local.file_name,
                        mime_type: local.mime_type,
                        size_bytes: local.size_bytes,
                        status,
                        remote_url: None,
                        failure: rejection,
                    },
                    transferred: 0,
                    source,
                }
            })
            .collect();

        UploadSession::new(tracked)
    }

    /// Upload every `Pending` file of the session concurrently.
    pub async fn run(&self, session: &UploadSession) -> UploadOutcome {
        let pending: Vec<usize> = session.with_state(|state| {
            state
                .files
                .iter()
                .enumerate()
                .filter(|(_, t)| t.file.status == FileStatus::Pending)
                .map(|(i, _)| i)
                .collect()
        });

        join_all(pending.into_iter().map(|index| self.transfer(session, index))).await;

        let outcome = UploadOutcome::resolve(session.files(), session.is_cancelled());
        match &outcome {
            UploadOutcome::Complete(files) => {
                info!("Upload session {} stored {} file(s)", session.id(), files.len());
            }
            UploadOutcome::PartialFailure { stored, failed } => warn!(
                "Upload session {} incomplete: {} stored, {} failed",
                session.id(),
                stored.len(),
                failed.len()
            ),
            UploadOutcome::Cancelled { stored, unfinished } => info!(
                "Upload session {} cancelled: {} stored, {} unfinished",
                session.id(),
                stored.len(),
                unfinished.len()
            ),
        }
        outcome
    }

    /// Re-attempt the given failed files with their original tokens.
    ///
    /// Tokens of stored files are skipped, files refused by the constraints
    /// stay refused, and a cancelled session is not resumed.
    pub async fn retry(&self, session: &UploadSession, tokens: &[ClientToken]) -> UploadOutcome {
        if !session.is_cancelled() {
            session.with_state(|state| {
                for tracked in state.files.iter_mut() {
                    let retryable = tracked.file.status == FileStatus::Failed
                        && tracked.source.is_some()
                        && tokens.contains(&tracked.file.client_token);
                    if retryable {
                        tracked.file.status = FileStatus::Pending;
                        tracked.file.failure = None;
                    }
                }
            });
        }
        self.run(session).await
    }

    /// Begin and run in one call.
    pub async fn upload(
        &self,
        files: Vec<LocalFile>,
        constraints: &UploadConstraints,
    ) -> (UploadSession, UploadOutcome) {
        let session = self.begin(files, constraints);
        let outcome = self.run(&session).await;
        (session, outcome)
    }

    async fn transfer(&self, session: &UploadSession, index: usize) {
        let claimed = session.with_state(|state| {
            let tracked = state.files.get_mut(index)?;
            if tracked.file.status != FileStatus::Pending {
                return None;
            }
            tracked.file.status = FileStatus::Uploading;
            Some((tracked.file.clone(), tracked.source.clone()?))
        });
        let Some((file, source)) = claimed else {
            return;
        };

        let mut cancelled = session.cancelled_signal();
        if *cancelled.borrow() {
            mark_failed(session, index, CANCELLED.to_string());
            return;
        }

        let progress = session.progress_for(index);
        let sink = Arc::clone(&self.sink);
        let upload = async {
            let bytes = source.read().await?;
            let object = SinkObject {
                client_token: file.client_token,
                file_name: &file.file_name,
                mime_type: &file.mime_type,
                bytes: &bytes,
            };
            let url = sink.put(object, &progress).await?;
            Ok::<String, SinkError>(url)
        };
        let result = tokio::select! {
            result = upload => Some(result),
            _ = cancelled.wait_for(|c| *c) => None,
        };

        match result {
            Some(Ok(url)) => session.with_state(|state| {
                if let Some(tracked) = state.files.get_mut(index) {
                    tracked.transferred = tracked.file.size_bytes;
                    tracked.file.status = FileStatus::Stored;
                    tracked.file.remote_url = Some(url);
                    tracked.file.failure = None;
                }
            }),
            Some(Err(e)) => {
                warn!("Upload of {} failed: {e}", file.file_name);
                mark_failed(session, index, e.to_string());
            }
            None => mark_failed(session, index, CANCELLED.to_string()),
        }
    }
}

fn mark_failed(session: &UploadSession, index: usize, reason: String) {
    session.with_state(|state| {
        if let Some(tracked) = state.files.get_mut(index) {
            tracked.file.status = FileStatus::Failed;
            tracked.file.failure = Some(reason);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::{ByteProgress, MEGABYTE, MemorySink};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Fails the first attempt of any file whose name starts with `flaky`.
    #[derive(Default)]
    struct FlakySink {
        inner: MemorySink,
        attempts: Mutex<Vec<ClientToken>>,
    }

    #[async_trait]
    impl UploadSink for FlakySink {
        async fn put(
            &self,
            object: SinkObject<'_>,
            progress: &ByteProgress,
        ) -> Result<String, SinkError> {
            let first_attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                let first = !attempts.contains(&object.client_token);
                attempts.push(object.client_token);
                first
            };
            if first_attempt && object.file_name.starts_with("flaky") {
                progress.report(object.bytes.len() as u64 / 2);
                return Err(SinkError::Transport("connection reset".into()));
            }
            self.inner.put(object, progress).await
        }
    }

    fn image(name: &str, size: usize) -> LocalFile {
        LocalFile::in_memory(name, "image/png", vec![7u8; size])
    }

    #[tokio::test]
    async fn all_files_stored_resolves_complete_at_100_percent() {
        let pipeline = UploadPipeline::new(Arc::new(MemorySink::new()));
        let (session, outcome) = pipeline
            .upload(
                vec![image("a.png", 200_000), image("b.png", 10)],
                &UploadConstraints::new(MEGABYTE),
            )
            .await;

        let UploadOutcome::Complete(files) = outcome else {
            panic!("expected complete outcome");
        };
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.remote_url.is_some()));
        assert_eq!(session.percent(), 100.0);
    }

    #[tokio::test]
    async fn rejected_file_does_not_abort_siblings() {
        let pipeline = UploadPipeline::new(Arc::new(MemorySink::new()));
        let (session, outcome) = pipeline
            .upload(
                vec![image("ok.png", 10), image("huge.png", 2 * MEGABYTE as usize)],
                &UploadConstraints::new(MEGABYTE),
            )
            .await;

        let UploadOutcome::PartialFailure { stored, failed } = outcome else {
            panic!("expected partial failure");
        };
        assert_eq!(stored[0].file_name, "ok.png");
        assert_eq!(failed[0].file_name, "huge.png");
        assert!(failed[0].failure.as_deref().unwrap().contains("limit"));
        assert!(session.percent() < 100.0);
    }

    #[tokio::test]
    async fn retry_reuses_tokens_and_skips_stored_files() {
        let sink = Arc::new(FlakySink::default());
        let pipeline = UploadPipeline::new(sink.clone());
        let session = pipeline.begin(
            vec![image("stable.png", 100), image("flaky.png", 100)],
            &UploadConstraints::new(MEGABYTE),
        );
        let tokens = session.tokens();

        let first = pipeline.run(&session).await;
        assert!(matches!(first, UploadOutcome::PartialFailure { .. }));
        let before = session.percent();

        let second = pipeline.retry(&session, &tokens).await;
        assert!(second.is_complete());
        assert_eq!(session.tokens(), tokens);
        assert!(session.percent() >= before);

        let attempts = sink.attempts.lock().unwrap().clone();
        assert_eq!(attempts.iter().filter(|t| **t == tokens[0]).count(), 1);
        assert_eq!(attempts.iter().filter(|t| **t == tokens[1]).count(), 2);
        assert_eq!(sink.inner.object_count().await, 2);
    }

    #[tokio::test]
    async fn cancelled_session_is_not_resumed() {
        let pipeline = UploadPipeline::new(Arc::new(MemorySink::new()));
        let session = pipeline.begin(vec![image("a.png", 10)], &UploadConstraints::new(MEGABYTE));
        session.cancel();

        let outcome = pipeline.run(&session).await;
        assert!(matches!(outcome, UploadOutcome::Cancelled { .. }));

        let retried = pipeline.retry(&session, &session.tokens()).await;
        assert!(matches!(retried, UploadOutcome::Cancelled { .. }));
    }

    #[tokio::test]
    async fn reads_files_from_disk() {
        let path = std::env::temp_dir().join(format!("upload-{}.pdf", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"%PDF-1.7 brief").await.unwrap();

        let sink = Arc::new(MemorySink::new());
        let pipeline = UploadPipeline::new(sink.clone());
        let (_, outcome) = pipeline
            .upload(
                vec![
                    LocalFile::on_disk("brief.pdf", "application/pdf", 14, &path),
                    LocalFile::on_disk(
                        "gone.pdf",
                        "application/pdf",
                        3,
                        path.with_extension("missing"),
                    ),
                ],
                &UploadConstraints::new(MEGABYTE),
            )
            .await;
        tokio::fs::remove_file(&path).await.ok();

        let UploadOutcome::PartialFailure { stored, failed } = outcome else {
            panic!("expected partial failure");
        };
        assert_eq!(stored[0].file_name, "brief.pdf");
        assert!(failed[0].failure.as_deref().unwrap().contains("Cannot read"));
        assert_eq!(sink.object_count().await, 1);
    }

    #[tokio::test]
    async fn progress_never_decreases() {
        let pipeline = UploadPipeline::new(Arc::new(MemorySink::new()));
        let session = pipeline.begin(
            vec![image("a.png", 300_000), image("b.png", 150_000)],
            &UploadConstraints::new(MEGABYTE),
        );
        let mut rx = session.subscribe();
        let watcher = tokio::spawn(async move {
            let mut seen = vec![*rx.borrow()];
            while rx.changed().await.is_ok() {
                seen.push(*rx.borrow_and_update());
            }
            seen
        });

        let outcome = pipeline.run(&session).await;
        assert!(outcome.is_complete());
        drop(session);

        let seen = watcher.await.unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last().copied(), Some(100.0));
    }
}
