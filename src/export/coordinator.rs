//! Export pipeline orchestrating a single LDIF export
//!
//! This module brings together the directory cursor, attribute ordering,
//! LDIF encoding and the export sink. One [`ExportPipeline`] performs one
//! run and moves through `Idle -> Running -> {Completed, Cancelled, Failed}`.

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::directory::{DirectorySession, Entry, QuerySpec, ResultCursor};
use crate::error::{CodecError, DirectoryError, ExportError, Result, StatusCode};
use crate::ldif::{AttrValLine, ContentRecord, DnLine, FormatParams, LdifCodec, SepLine};
use crate::ordering::{AttributeOrdering, DefaultAttributeOrdering};

use super::cancel::CancellationSignal;
use super::progress::{ExportCounter, NoProgress, ProgressSink};
use super::sink::ExportSink;

/// Life cycle of an export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Running,
    /// The result set was exhausted or truncated by a server limit
    Completed,
    Cancelled,
    Failed,
}

/// Directory status codes that end an export successfully.
///
/// By default these are the three server-side limits: the server stopped
/// sending results, but everything written so far is valid output. Codes are
/// compared by their numeric value, so `StatusCode::Unknown(4)` counts as a
/// size limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenignStatusCodes(BTreeSet<u32>);

/// Outcome of an export run.
#[derive(Debug)]
pub struct ExportReport {
    /// Identifier of the run, also used in log output
    pub job_id: Uuid,
    /// Terminal state: Completed, Cancelled or Failed
    pub status: ExportState,
    /// Number of records written
    pub records_exported: u64,
    /// Bytes accepted by the sink
    pub bytes_written: u64,
    /// Time taken for export
    pub elapsed_ms: u64,
    /// Cause of a failed run
    pub error: Option<ExportError>,
}

/// Per-run state: what to export, where to, and how far it got.
struct ExportJob {
    id: Uuid,
    query: QuerySpec,
    sink: Box<dyn ExportSink>,
    counter: ExportCounter,
    cancel: Option<Arc<dyn CancellationSignal>>,
}

/// Pipeline for one streaming export
///
/// Pulls entries from the cursor one at a time, sorts their attribute lines,
/// encodes them as LDIF and writes them to the sink in cursor order.
pub struct ExportPipeline {
    job: ExportJob,
    session: Arc<dyn DirectorySession>,
    ordering: Arc<dyn AttributeOrdering>,
    codec: LdifCodec,
    progress: Arc<dyn ProgressSink>,
    benign: BenignStatusCodes,
    version_header: bool,
    state: ExportState,
}

impl BenignStatusCodes {
    /// An empty set: every directory error fails the export.
    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    /// Add another code, e.g. a server-specific partial-results code.
    pub fn with(mut self, code: StatusCode) -> Self {
        self.0.insert(code.code());
        self
    }

    pub fn contains(&self, code: StatusCode) -> bool {
        self.0.contains(&code.code())
    }

    fn is_benign(&self, err: &DirectoryError) -> bool {
        err.status().is_some_and(|code| self.contains(code))
    }
}

impl Default for BenignStatusCodes {
    fn default() -> Self {
        Self::none()
            .with(StatusCode::TimeLimitExceeded)
            .with(StatusCode::SizeLimitExceeded)
            .with(StatusCode::AdminLimitExceeded)
    }
}

impl ExportReport {
    pub fn is_success(&self) -> bool {
        self.status == ExportState::Completed
    }

    /// Turn a failed run into its error.
    pub fn into_result(mut self) -> Result<Self> {
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Turn an entry into a finished record with its lines in `ordering` order.
///
/// Lines are rendered with `params` before sorting, so ties are broken on
/// the text that is actually written.
pub fn build_record(
    entry: Entry,
    ordering: &dyn AttributeOrdering,
    params: &FormatParams,
) -> std::result::Result<ContentRecord, CodecError> {
    let (dn, attributes) = entry.into_parts();
    let mut lines: Vec<AttrValLine> = attributes
        .into_iter()
        .map(|av| AttrValLine::with_params(av.name, av.value, params))
        .collect();
    ordering.sort(&mut lines);

    let mut record = ContentRecord::new(DnLine::new(dn.as_str()));
    for line in lines {
        record.add_attr_val(line)?;
    }
    record.finish(SepLine)?;
    Ok(record)
}

async fn advance(
    cursor: &mut dyn ResultCursor,
) -> std::result::Result<Option<Entry>, DirectoryError> {
    if !cursor.has_next().await? {
        return Ok(None);
    }
    cursor.next().await.map(Some)
}

impl ExportPipeline {
    /// Create a pipeline with default ordering, formatting and no progress
    /// display.
    pub fn new(
        session: Arc<dyn DirectorySession>,
        query: QuerySpec,
        sink: Box<dyn ExportSink>,
    ) -> Self {
        Self {
            job: ExportJob {
                id: Uuid::new_v4(),
                query,
                sink,
                counter: ExportCounter::new(),
                cancel: None,
            },
            session,
            ordering: Arc::new(DefaultAttributeOrdering::default()),
            codec: LdifCodec::default(),
            progress: Arc::new(NoProgress),
            benign: BenignStatusCodes::default(),
            version_header: false,
            state: ExportState::Idle,
        }
    }

    pub fn with_ordering(mut self, ordering: Arc<dyn AttributeOrdering>) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_codec(mut self, codec: LdifCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Set the flag polled before each record
    pub fn with_cancellation(mut self, signal: Arc<dyn CancellationSignal>) -> Self {
        self.job.cancel = Some(signal);
        self
    }

    pub fn with_benign_codes(mut self, codes: BenignStatusCodes) -> Self {
        self.benign = codes;
        self
    }

    /// Write a `version: 1` line before the first record
    pub fn with_version_header(mut self, enabled: bool) -> Self {
        self.version_header = enabled;
        self
    }

    /// Counter that observers may read while the export runs.
    pub fn counter(&self) -> ExportCounter {
        self.job.counter.clone()
    }

    /// Run the export to completion.
    ///
    /// The sink is closed exactly once on every path. Errors are not
    /// returned directly; they are carried in the report together with the
    /// number of records already written.
    pub async fn execute(self) -> ExportReport {
        let span = info_span!("export", job = %self.job.id);
        self.run().instrument(span).await
    }

    async fn run(mut self) -> ExportReport {
        let start_time = Instant::now();
        info!(
            "Starting export: base='{}' scope={} filter='{}'",
            self.job.query.base, self.job.query.scope, self.job.query.filter
        );

        let outcome = self.stream().await;
        let closed = self.job.sink.close().await;

        let (status, error) = match (outcome, closed) {
            (Ok(state), Ok(())) => (state, None),
            (Ok(_), Err(close_err)) => (ExportState::Failed, Some(ExportError::Sink(close_err))),
            (Err(err), Ok(())) => (ExportState::Failed, Some(err)),
            (Err(err), Err(close_err)) => {
                warn!("Failed to close output after error: {}", close_err);
                (ExportState::Failed, Some(err))
            }
        };
        self.transition(status);

        let exported = self.job.counter.get();
        self.notify("finish", |progress| progress.finish(exported));

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        let bytes_written = self.job.sink.bytes_written();
        match &error {
            None => info!(
                "Export {:?}: {} records, {} bytes, {} ms",
                status, exported, bytes_written, elapsed_ms
            ),
            Some(err) => warn!("Export failed after {} records: {}", exported, err),
        }

        ExportReport {
            job_id: self.job.id,
            status,
            records_exported: exported,
            bytes_written,
            elapsed_ms,
            error,
        }
    }

    /// Open the sink and stream records until the cursor ends, the run is
    /// cancelled, or something fails.
    async fn stream(&mut self) -> Result<ExportState> {
        self.job.sink.open().await?;
        self.transition(ExportState::Running);

        if self.version_header {
            let header = self.codec.version_header();
            self.job.sink.write(&header).await?;
        }

        let mut cursor = match self.session.search(&self.job.query).await {
            Ok(cursor) => cursor,
            Err(err) => return self.classify(err),
        };

        loop {
            if self.is_cancelled() {
                info!(
                    "Export cancelled after {} records",
                    self.job.counter.get()
                );
                return Ok(ExportState::Cancelled);
            }

            match advance(cursor.as_mut()).await {
                Ok(Some(entry)) => self.export_entry(entry).await?,
                Ok(None) => {
                    debug!("Result cursor exhausted");
                    return Ok(ExportState::Completed);
                }
                Err(err) => return self.classify(err),
            }
        }
    }

    async fn export_entry(&mut self, entry: Entry) -> Result<()> {
        let record = build_record(entry, self.ordering.as_ref(), self.codec.params())?;
        let text = self.codec.encode(&record)?;
        self.job.sink.write(&text).await?;

        let exported = self.job.counter.increment();
        debug!("Exported {}", record.dn_line().dn());
        self.notify("on_progress", |progress| progress.on_progress(exported));
        if exported % 1000 == 0 {
            info!("Progress: {} records exported", exported);
        }
        Ok(())
    }

    /// Limit conditions end the run normally; anything else fails it.
    fn classify(&self, err: DirectoryError) -> Result<ExportState> {
        if self.benign.is_benign(&err) {
            info!(
                "Server truncated the result set after {} records: {}",
                self.job.counter.get(),
                err
            );
            Ok(ExportState::Completed)
        } else {
            Err(err.into())
        }
    }

    /// Progress reporting is advisory: a panicking reporter is logged and the
    /// export carries on.
    fn notify(&self, call: &str, report: impl FnOnce(&dyn ProgressSink)) {
        let progress = self.progress.as_ref();
        if panic::catch_unwind(AssertUnwindSafe(|| report(progress))).is_err() {
            warn!("Progress reporter panicked in {}; ignoring", call);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.job
            .cancel
            .as_ref()
            .is_some_and(|signal| signal.is_cancelled())
    }

    fn transition(&mut self, next: ExportState) {
        debug!("Export state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{Dn, MemoryDirectory, Scope};
    use crate::error::SinkError;
    use crate::export::LdifFileSink;
    use crate::ldif::{FormatParams, ValueEncoding};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    enum Step {
        Entry(Entry),
        Fail(DirectoryError),
    }

    // Mock cursor replaying a fixed script
    struct ScriptedCursor {
        steps: VecDeque<Step>,
        next_calls: usize,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl ScriptedCursor {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
                next_calls: 0,
                cancel_after: None,
            }
        }

        fn cancelling_after(mut self, calls: usize, token: CancellationToken) -> Self {
            self.cancel_after = Some((calls, token));
            self
        }
    }

    #[async_trait]
    impl ResultCursor for ScriptedCursor {
        async fn has_next(&mut self) -> std::result::Result<bool, DirectoryError> {
            match self.steps.front() {
                None => Ok(false),
                Some(Step::Entry(_)) => Ok(true),
                Some(Step::Fail(_)) => match self.steps.pop_front() {
                    Some(Step::Fail(err)) => Err(err),
                    _ => unreachable!(),
                },
            }
        }

        async fn next(&mut self) -> std::result::Result<Entry, DirectoryError> {
            self.next_calls += 1;
            if let Some((calls, token)) = &self.cancel_after {
                if *calls == self.next_calls {
                    token.cancel();
                }
            }
            match self.steps.pop_front() {
                Some(Step::Entry(entry)) => Ok(entry),
                Some(Step::Fail(err)) => Err(err),
                None => Err(DirectoryError::without_status("exhausted")),
            }
        }
    }

    struct ScriptedSession {
        cursor: Mutex<Option<ScriptedCursor>>,
        search_error: Option<DirectoryError>,
        searches: Mutex<usize>,
    }

    impl ScriptedSession {
        fn new(cursor: ScriptedCursor) -> Arc<Self> {
            Arc::new(Self {
                cursor: Mutex::new(Some(cursor)),
                search_error: None,
                searches: Mutex::new(0),
            })
        }

        fn failing(err: DirectoryError) -> Arc<Self> {
            Arc::new(Self {
                cursor: Mutex::new(None),
                search_error: Some(err),
                searches: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl DirectorySession for ScriptedSession {
        async fn search(
            &self,
            _query: &QuerySpec,
        ) -> std::result::Result<Box<dyn ResultCursor>, DirectoryError> {
            *self.searches.lock().unwrap() += 1;
            if let Some(err) = &self.search_error {
                return Err(err.clone());
            }
            let cursor = self.cursor.lock().unwrap().take().expect("searched twice");
            Ok(Box::new(cursor))
        }
    }

    #[derive(Default)]
    struct SinkLog {
        opens: usize,
        closes: usize,
        records: Vec<String>,
    }

    // Mock sink recording every call
    #[derive(Default)]
    struct RecordingSink {
        log: Arc<Mutex<SinkLog>>,
        fail_open: bool,
        fail_write_at: Option<usize>,
        fail_close: bool,
        bytes: u64,
    }

    impl RecordingSink {
        fn new() -> (Self, Arc<Mutex<SinkLog>>) {
            let sink = Self::default();
            let log = Arc::clone(&sink.log);
            (sink, log)
        }
    }

    #[async_trait]
    impl ExportSink for RecordingSink {
        async fn open(&mut self) -> std::result::Result<(), SinkError> {
            self.log.lock().unwrap().opens += 1;
            if self.fail_open {
                return Err(SinkError::Open {
                    path: "out.ldif".into(),
                    source: std::io::Error::other("read-only file system"),
                });
            }
            Ok(())
        }

        async fn write(&mut self, text: &str) -> std::result::Result<(), SinkError> {
            let mut log = self.log.lock().unwrap();
            if self.fail_write_at == Some(log.records.len() + 1) {
                return Err(SinkError::Write(std::io::Error::other("disk full")));
            }
            log.records.push(text.to_string());
            self.bytes += text.len() as u64;
            Ok(())
        }

        async fn close(&mut self) -> std::result::Result<(), SinkError> {
            self.log.lock().unwrap().closes += 1;
            if self.fail_close {
                return Err(SinkError::Close(std::io::Error::other("flush failed")));
            }
            Ok(())
        }

        fn bytes_written(&self) -> u64 {
            self.bytes
        }
    }

    #[derive(Default)]
    struct RecordingProgress(Mutex<Vec<u64>>);

    impl ProgressSink for RecordingProgress {
        fn on_progress(&self, exported: u64) {
            self.0.lock().unwrap().push(exported);
        }
    }

    struct PanickingProgress;

    impl ProgressSink for PanickingProgress {
        fn on_progress(&self, _exported: u64) {
            panic!("progress display is gone");
        }

        fn finish(&self, _exported: u64) {
            panic!("progress display is gone");
        }
    }

    fn person(uid: &str) -> Entry {
        Entry::new(Dn::parse(&format!("uid={uid},ou=People,dc=example,dc=com")).unwrap())
            .with_text("uid", uid)
            .with_text("objectClass", "person")
            .with_text("cn", &uid.to_uppercase())
            .with_text("objectClass", "top")
    }

    fn entries(n: usize) -> Vec<Step> {
        (1..=n).map(|i| Step::Entry(person(&format!("user{i}")))).collect()
    }

    fn query() -> QuerySpec {
        QuerySpec::new("dc=example,dc=com", "(objectClass=*)", Scope::Subtree)
    }

    fn pipeline(session: Arc<dyn DirectorySession>, sink: RecordingSink) -> ExportPipeline {
        ExportPipeline::new(session, query(), Box::new(sink))
    }

    #[tokio::test]
    async fn test_export_all_entries_in_order() {
        let (sink, log) = RecordingSink::new();
        let progress = Arc::new(RecordingProgress::default());
        let report = pipeline(ScriptedSession::new(ScriptedCursor::new(entries(3))), sink)
            .with_progress(progress.clone())
            .execute()
            .await;

        assert_eq!(report.status, ExportState::Completed);
        assert!(report.is_success());
        assert_eq!(report.records_exported, 3);
        assert!(report.error.is_none());

        let log = log.lock().unwrap();
        assert_eq!((log.opens, log.closes), (1, 1));
        assert_eq!(log.records.len(), 3);
        assert!(log.records[0].starts_with("dn: uid=user1,"));
        assert!(log.records[2].starts_with("dn: uid=user3,"));
        assert_eq!(*progress.0.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_record_lines_are_sorted() {
        let (sink, log) = RecordingSink::new();
        pipeline(ScriptedSession::new(ScriptedCursor::new(entries(1))), sink)
            .execute()
            .await;

        assert_eq!(
            log.lock().unwrap().records[0],
            "dn: uid=user1,ou=People,dc=example,dc=com\n\
             objectClass: person\n\
             objectClass: top\n\
             cn: USER1\n\
             uid: user1\n\n"
        );
    }

    #[tokio::test]
    async fn test_same_entry_encodes_identically() {
        let mut outputs = Vec::new();
        for _ in 0..2 {
            let (sink, log) = RecordingSink::new();
            let steps = vec![Step::Entry(person("same"))];
            pipeline(ScriptedSession::new(ScriptedCursor::new(steps)), sink)
                .execute()
                .await;
            outputs.push(log.lock().unwrap().records.concat());
        }
        assert_eq!(outputs[0], outputs[1]);
    }

    #[tokio::test]
    async fn test_empty_result_set() {
        let (sink, log) = RecordingSink::new();
        let report = pipeline(ScriptedSession::new(ScriptedCursor::new(vec![])), sink)
            .execute()
            .await;

        assert_eq!(report.status, ExportState::Completed);
        assert_eq!(report.records_exported, 0);
        let log = log.lock().unwrap();
        assert!(log.records.is_empty());
        assert_eq!(log.closes, 1);
    }

    #[tokio::test]
    async fn test_limit_codes_are_benign() {
        for code in [
            StatusCode::SizeLimitExceeded,
            StatusCode::TimeLimitExceeded,
            StatusCode::AdminLimitExceeded,
        ] {
            let mut steps = entries(4);
            steps.push(Step::Fail(DirectoryError::new(code, "limit reached")));
            let (sink, log) = RecordingSink::new();
            let report = pipeline(ScriptedSession::new(ScriptedCursor::new(steps)), sink)
                .execute()
                .await;

            assert_eq!(report.status, ExportState::Completed, "{code}");
            assert_eq!(report.records_exported, 4);
            assert!(report.error.is_none());
            let log = log.lock().unwrap();
            assert_eq!(log.records.len(), 4);
            assert_eq!(log.closes, 1);
        }
    }

    #[tokio::test]
    async fn test_hard_failure_is_reported() {
        let mut steps = entries(2);
        steps.push(Step::Fail(DirectoryError::new(StatusCode::Busy, "server busy")));
        steps.extend(entries(2));
        let (sink, log) = RecordingSink::new();
        let report = pipeline(ScriptedSession::new(ScriptedCursor::new(steps)), sink)
            .execute()
            .await;

        assert_eq!(report.status, ExportState::Failed);
        assert_eq!(report.records_exported, 2);
        {
            let log = log.lock().unwrap();
            assert_eq!(log.records.len(), 2);
            assert_eq!(log.closes, 1);
        }
        match report.into_result() {
            Err(ExportError::Directory(err)) => {
                assert_eq!(err.status(), Some(StatusCode::Busy));
                assert_eq!(err.message(), "server busy");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_without_status_is_hard_failure() {
        let mut steps = entries(1);
        steps.push(Step::Fail(DirectoryError::without_status("connection reset")));
        let (sink, _log) = RecordingSink::new();
        let report = pipeline(ScriptedSession::new(ScriptedCursor::new(steps)), sink)
            .execute()
            .await;
        assert_eq!(report.status, ExportState::Failed);
        assert_eq!(report.records_exported, 1);
    }

    #[tokio::test]
    async fn test_cancel_after_third_entry() {
        let token = CancellationToken::new();
        let cursor = ScriptedCursor::new(entries(10)).cancelling_after(3, token.clone());
        let (sink, log) = RecordingSink::new();
        let report = pipeline(ScriptedSession::new(cursor), sink)
            .with_cancellation(Arc::new(token))
            .execute()
            .await;

        assert_eq!(report.status, ExportState::Cancelled);
        assert_eq!(report.records_exported, 3);
        assert!(report.error.is_none());
        let log = log.lock().unwrap();
        assert_eq!(log.records.len(), 3);
        assert_eq!(log.closes, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_entry() {
        let token = CancellationToken::new();
        token.cancel();
        let (sink, log) = RecordingSink::new();
        let report = pipeline(ScriptedSession::new(ScriptedCursor::new(entries(3))), sink)
            .with_cancellation(Arc::new(token))
            .execute()
            .await;

        assert_eq!(report.status, ExportState::Cancelled);
        assert_eq!(report.records_exported, 0);
        assert_eq!(log.lock().unwrap().closes, 1);
    }

    #[tokio::test]
    async fn test_write_failure_closes_sink() {
        let (mut sink, log) = RecordingSink::new();
        sink.fail_write_at = Some(2);
        let report = pipeline(ScriptedSession::new(ScriptedCursor::new(entries(5))), sink)
            .execute()
            .await;

        assert_eq!(report.status, ExportState::Failed);
        assert_eq!(report.records_exported, 1);
        assert!(matches!(report.error, Some(ExportError::Sink(SinkError::Write(_)))));
        let log = log.lock().unwrap();
        assert_eq!(log.records.len(), 1);
        assert_eq!(log.closes, 1);
    }

    #[tokio::test]
    async fn test_open_failure_skips_search() {
        let (mut sink, log) = RecordingSink::new();
        sink.fail_open = true;
        let session = ScriptedSession::new(ScriptedCursor::new(entries(3)));
        let report = pipeline(session.clone(), sink).execute().await;

        assert_eq!(report.status, ExportState::Failed);
        assert!(matches!(report.error, Some(ExportError::Sink(SinkError::Open { .. }))));
        assert_eq!(*session.searches.lock().unwrap(), 0);
        let log = log.lock().unwrap();
        assert!(log.records.is_empty());
        assert_eq!(log.closes, 1);
    }

    #[tokio::test]
    async fn test_close_failure_fails_completed_run() {
        let (mut sink, log) = RecordingSink::new();
        sink.fail_close = true;
        let report = pipeline(ScriptedSession::new(ScriptedCursor::new(entries(2))), sink)
            .execute()
            .await;

        assert_eq!(report.status, ExportState::Failed);
        assert_eq!(report.records_exported, 2);
        assert!(matches!(report.error, Some(ExportError::Sink(SinkError::Close(_)))));
        assert_eq!(log.lock().unwrap().closes, 1);
    }

    #[tokio::test]
    async fn test_close_failure_keeps_original_error() {
        let (mut sink, _log) = RecordingSink::new();
        sink.fail_close = true;
        sink.fail_write_at = Some(1);
        let report = pipeline(ScriptedSession::new(ScriptedCursor::new(entries(2))), sink)
            .execute()
            .await;
        assert!(matches!(report.error, Some(ExportError::Sink(SinkError::Write(_)))));
    }

    #[tokio::test]
    async fn test_search_errors_are_classified() {
        let (sink, log) = RecordingSink::new();
        let session = ScriptedSession::failing(DirectoryError::new(
            StatusCode::SizeLimitExceeded,
            "size limit",
        ));
        let report = pipeline(session, sink).execute().await;
        assert_eq!(report.status, ExportState::Completed);
        assert_eq!(log.lock().unwrap().closes, 1);

        let (sink, log) = RecordingSink::new();
        let session =
            ScriptedSession::failing(DirectoryError::new(StatusCode::NoSuchObject, "no base"));
        let report = pipeline(session, sink).execute().await;
        assert_eq!(report.status, ExportState::Failed);
        assert_eq!(log.lock().unwrap().closes, 1);
    }

    #[tokio::test]
    async fn test_custom_benign_codes() {
        let partial = StatusCode::Unknown(9);
        let mut steps = entries(1);
        steps.push(Step::Fail(DirectoryError::new(partial, "partial results")));
        let (sink, _log) = RecordingSink::new();
        let report = pipeline(ScriptedSession::new(ScriptedCursor::new(steps)), sink)
            .with_benign_codes(BenignStatusCodes::default().with(partial))
            .execute()
            .await;
        assert_eq!(report.status, ExportState::Completed);

        let mut steps = entries(1);
        steps.push(Step::Fail(DirectoryError::new(
            StatusCode::SizeLimitExceeded,
            "size limit",
        )));
        let (sink, _log) = RecordingSink::new();
        let report = pipeline(ScriptedSession::new(ScriptedCursor::new(steps)), sink)
            .with_benign_codes(BenignStatusCodes::none())
            .execute()
            .await;
        assert_eq!(report.status, ExportState::Failed);
    }

    #[tokio::test]
    async fn test_counter_and_version_header() {
        let (sink, log) = RecordingSink::new();
        let pipeline = pipeline(ScriptedSession::new(ScriptedCursor::new(entries(2))), sink)
            .with_version_header(true);
        let counter = pipeline.counter();
        let report = pipeline.execute().await;

        assert_eq!(counter.get(), 2);
        assert_eq!(report.records_exported, 2);
        let log = log.lock().unwrap();
        assert_eq!(log.records[0], "version: 1\n\n");
        assert_eq!(log.records.len(), 3);
    }

    #[tokio::test]
    async fn test_export_from_memory_directory_to_file() {
        let snapshot = r#"{"entries": [
            {"dn": "dc=example,dc=com", "attributes": {"dc": "example", "objectClass": ["domain", "top"]}},
            {"dn": "cn=admin,dc=example,dc=com",
             "attributes": {"cn": "admin", "objectClass": "person", "userPassword": [{"base64": "c2VjcmV0"}],
                            "description": " padded"}},
            {"dn": "cn=guest,dc=example,dc=com", "attributes": {"cn": "guest", "objectClass": "person"}}
        ]}"#;
        let session = Arc::new(MemoryDirectory::from_json(snapshot).unwrap());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.ldif");

        let query = QuerySpec::new("dc=example,dc=com", "(objectClass=person)", Scope::Subtree)
            .with_size_limit(1);
        let report = ExportPipeline::new(session, query, Box::new(LdifFileSink::new(&path)))
            .execute()
            .await;

        assert_eq!(report.status, ExportState::Completed);
        assert_eq!(report.records_exported, 1);
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(
            content,
            "dn: cn=admin,dc=example,dc=com\n\
             objectClass: person\n\
             cn: admin\n\
             description:: IHBhZGRlZA==\n\
             userPassword:: c2VjcmV0\n\n"
        );
        assert_eq!(report.bytes_written, content.len() as u64);
    }

    #[tokio::test]
    async fn test_force_encoded_codec() {
        let (sink, log) = RecordingSink::new();
        let steps = vec![Step::Entry(
            Entry::new(Dn::parse("cn=a").unwrap()).with_text("cn", "a"),
        )];
        let codec = LdifCodec::new(FormatParams {
            value_encoding: ValueEncoding::ForceEncoded,
            ..FormatParams::default()
        });
        pipeline(ScriptedSession::new(ScriptedCursor::new(steps)), sink)
            .with_codec(codec)
            .execute()
            .await;
        assert_eq!(log.lock().unwrap().records[0], "dn: cn=a\ncn:: YQ==\n\n");
    }

    #[tokio::test]
    async fn test_panicking_progress_does_not_abort_export() {
        let (sink, log) = RecordingSink::new();
        let report = pipeline(ScriptedSession::new(ScriptedCursor::new(entries(2))), sink)
            .with_progress(Arc::new(PanickingProgress))
            .execute()
            .await;

        assert_eq!(report.status, ExportState::Completed);
        assert_eq!(report.records_exported, 2);
        assert!(report.error.is_none());
        let log = log.lock().unwrap();
        assert_eq!(log.records.len(), 2);
        assert_eq!(log.closes, 1);
    }

    #[tokio::test]
    async fn test_panicking_progress_with_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.ldif");
        let steps = vec![Step::Entry(person("a")), Step::Entry(person("b"))];
        let report = ExportPipeline::new(
            ScriptedSession::new(ScriptedCursor::new(steps)),
            query(),
            Box::new(LdifFileSink::new(&path)),
        )
        .with_progress(Arc::new(PanickingProgress))
        .execute()
        .await;

        assert_eq!(report.status, ExportState::Completed);
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.starts_with("dn: uid=a,ou=People,dc=example,dc=com\n"));
        assert!(content.contains("dn: uid=b,ou=People,dc=example,dc=com\n"));
    }

    #[test]
    fn test_benign_codes_compare_numerically() {
        let codes = BenignStatusCodes::default();
        assert!(codes.contains(StatusCode::Unknown(4)));
        assert!(codes.contains(StatusCode::Unknown(3)));
        assert!(codes.contains(StatusCode::Unknown(11)));
        assert!(!codes.contains(StatusCode::Unknown(51)));
        assert!(BenignStatusCodes::none().with(StatusCode::Unknown(51)).contains(StatusCode::Busy));
    }

    #[tokio::test]
    async fn test_unnamed_size_limit_code_is_benign() {
        let mut steps = entries(2);
        steps.push(Step::Fail(DirectoryError::new(StatusCode::Unknown(4), "size limit")));
        let (sink, _log) = RecordingSink::new();
        let report = pipeline(ScriptedSession::new(ScriptedCursor::new(steps)), sink)
            .execute()
            .await;

        assert_eq!(report.status, ExportState::Completed);
        assert_eq!(report.records_exported, 2);
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn test_mixed_text_and_binary_values() {
        let snapshot = r#"{"entries": [
            {"dn": "dc=example,dc=com", "attributes": {"dc": "example"}},
            {"dn": "cn=m,dc=example,dc=com",
             "attributes": {"x": ["plain", {"base64": "cGxhaW4="}]}}
        ]}"#;
        let session = Arc::new(MemoryDirectory::from_json(snapshot).unwrap());
        let query = QuerySpec::new("dc=example,dc=com", "(x=*)", Scope::Subtree)
            .with_attributes(vec!["x".to_string()]);
        let (sink, log) = RecordingSink::new();
        let report = ExportPipeline::new(session, query, Box::new(sink)).execute().await;

        assert_eq!(report.status, ExportState::Completed);
        assert_eq!(
            log.lock().unwrap().records,
            vec!["dn: cn=m,dc=example,dc=com\nx: plain\nx:: cGxhaW4=\n\n".to_string()]
        );
    }

    #[tokio::test]
    async fn test_force_encoded_sorts_by_written_text() {
        let (sink, log) = RecordingSink::new();
        let steps = vec![Step::Entry(
            Entry::new(Dn::parse("cn=a").unwrap())
                .with_text("cn", "a")
                .with_text("cn", "Ж"),
        )];
        let codec = LdifCodec::new(FormatParams {
            value_encoding: ValueEncoding::ForceEncoded,
            ..FormatParams::default()
        });
        pipeline(ScriptedSession::new(ScriptedCursor::new(steps)), sink)
            .with_codec(codec)
            .execute()
            .await;
        assert_eq!(
            log.lock().unwrap().records[0],
            "dn: cn=a\ncn:: 0JY=\ncn:: YQ==\n\n"
        );
    }
}
