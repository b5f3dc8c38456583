use std::{
    path::{Path, PathBuf},
    sync::{
        mpsc::{Receiver, RecvTimeoutError, TryRecvError},
        Arc,
    },
    time::{Duration, Instant},
};

use thiserror::Error;
use tracing::{debug, error, info};

use crate::chapters::{self, ChapterIndexer};
use crate::layout::{LayoutError, LineMeasure};
use crate::position::{chapter_index_for_offset, find_page_for_offset, page_for_chapter};
use crate::state::{
    file_identity, load_position, load_settings, save_position, save_settings, KeyValueStore,
};
use crate::text::{CharsetDetector, EncodingSniffer, TextError};
use crate::types::{Chapter, DisplaySettings, Page, ReadingPosition, Viewport};

mod worker;


pub use worker::{load_text, LoadedText};

use worker::{Job, JobOutcome, Layout};

pub const LOAD_FAILED_MESSAGE: &str =
    "Unable to open the file. Please check that it is a valid text file.";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read file: {0}")]
    Io(#[source] std::io::Error),
    #[error("could not decode file: {0}")]
    Decode(#[source] TextError),
    #[error("could not lay out text: {0}")]
    Layout(#[from] LayoutError),
    #[error("background load stopped before reporting a result")]
    Interrupted,
}

impl LoadError {
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Io(_) => "io",
            LoadError::Decode(_) => "decode",
            LoadError::Layout(_) => "layout",
            LoadError::Interrupted => "interrupted",
        }
    }

    /// Every failure reads the same to the user; `kind` tells them apart in
    /// logs.
    pub fn user_message(&self) -> &'static str {
        LOAD_FAILED_MESSAGE
    }
}

#[derive(Debug)]
pub enum SessionState {
    Loading,
    Ready,
    LoadFailed(LoadError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    SettingsChanged(DisplaySettings),
    ViewportChanged(Viewport),
    ChapterJumpRequested(usize),
    PageChanged(usize),
    Paused,
    Resumed,
}

#[derive(Clone)]
pub struct SessionOptions {
    pub viewport: Viewport,
    /// Device pixels per point.
    pub density: f32,
    pub indexer: Arc<ChapterIndexer>,
    pub detector: Arc<dyn CharsetDetector + Send + Sync>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            viewport: Viewport::new(1000, 1600),
            density: 1.0,
            indexer: Arc::new(ChapterIndexer::default()),
            detector: Arc::new(EncodingSniffer),
        }
    }
}

/// One open file. Owns the decoded text, chapters, pages and settings; all
/// mutation happens on the thread that owns the session, while loading and
/// pagination run on a worker whose results are applied by [`poll`] or
/// [`wait`].
///
/// [`poll`]: ReadingSession::poll
/// [`wait`]: ReadingSession::wait
pub struct ReadingSession<M, S>
where
    M: LineMeasure + Send + Sync + 'static,
    S: KeyValueStore,
{
    path: PathBuf,
    identity: String,
    state: SessionState,
    text: Option<Arc<str>>,
    charset: Option<String>,
    chapters: Vec<Chapter>,
    pages: Vec<Page>,
    current: usize,
    settings: DisplaySettings,
    options: SessionOptions,
    measure: Arc<M>,
    store: S,
    generation: u64,
    inbox: Option<Receiver<JobOutcome>>,
}

impl<M, S> ReadingSession<M, S>
where
    M: LineMeasure + Send + Sync + 'static,
    S: KeyValueStore,
{
    /// Starts loading `path` in the background; the session begins in
    /// [`SessionState::Loading`].
    pub fn open(path: &Path, measure: M, store: S, options: SessionOptions) -> Self {
        let settings = load_settings(&store);
        let mut session = Self {
            path: path.to_path_buf(),
            identity: file_identity(path),
            state: SessionState::Loading,
            text: None,
            charset: None,
            chapters: Vec::new(),
            pages: Vec::new(),
            current: 0,
            settings,
            options,
            measure: Arc::new(measure),
            store,
            generation: 0,
            inbox: None,
        };
        session.dispatch_load();
        session
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_identity(&self) -> &str {
        &self.identity
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Ready)
    }

    /// True while a load or re-pagination is outstanding.
    pub fn is_busy(&self) -> bool {
        self.inbox.is_some()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn toc(&self) -> Vec<(usize, &Chapter)> {
        chapters::toc(&self.chapters)
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn current_page_index(&self) -> usize {
        self.current
    }

    pub fn current_page(&self) -> Option<&Page> {
        self.pages.get(self.current)
    }

    pub fn current_chapter(&self) -> Option<&Chapter> {
        let page = self.current_page()?;
        let text_len = self.text.as_ref().map_or(0, |t| t.len());
        chapter_index_for_offset(&self.chapters, text_len, page.start)
            .and_then(|idx| self.chapters.get(idx))
    }

    pub fn settings(&self) -> DisplaySettings {
        self.settings
    }

    pub fn viewport(&self) -> Viewport {
        self.options.viewport
    }

    pub fn position(&self) -> ReadingPosition {
        ReadingPosition {
            file_identity: self.identity.clone(),
            page_index: self.current,
        }
    }

    /// `(current + 1) / page_count` as a percentage, rounded to one decimal.
    pub fn progress_percent(&self) -> f32 {
        if self.pages.is_empty() {
            return 0.0;
        }
        let pct = (self.current + 1) as f32 * 100.0 / self.pages.len() as f32;
        (pct * 10.0).round() / 10.0
    }

    pub fn progress_label(&self) -> String {
        let shown = if self.pages.is_empty() {
            0
        } else {
            self.current + 1
        };
        format!(
            "{}/{} ({:.1}%)",
            shown,
            self.pages.len(),
            self.progress_percent()
        )
    }

    pub fn handle(&mut self, event: SessionEvent) {
        if let SessionState::LoadFailed(_) = self.state {
            debug!(?event, "ignoring event after failed load");
            return;
        }
        match event {
            SessionEvent::SettingsChanged(settings) => {
                let settings = settings.with_font_size(settings.font_size_pt as i64);
                save_settings(&self.store, &settings);
                self.settings = settings;
                self.relayout();
            }
            SessionEvent::ViewportChanged(viewport) => {
                self.options.viewport = viewport;
                self.relayout();
            }
            SessionEvent::ChapterJumpRequested(index) => {
                if !self.is_ready() {
                    debug!(index, "chapter jump before load finished");
                    return;
                }
                match self.chapters.get(index) {
                    Some(chapter) => {
                        let target = page_for_chapter(&self.pages, chapter);
                        self.set_page(target);
                    }
                    None => debug!(index, "no such chapter"),
                }
            }
            SessionEvent::PageChanged(index) => {
                if self.is_ready() {
                    self.set_page(index);
                }
            }
            SessionEvent::Paused => {
                if self.is_ready() {
                    save_position(&self.store, &self.position());
                }
            }
            SessionEvent::Resumed => {}
        }
    }

    /// Applies a finished background result, if any. Returns true when the
    /// session changed.
    pub fn poll(&mut self) -> bool {
        let Some(rx) = &self.inbox else {
            return false;
        };
        match rx.try_recv() {
            Ok(outcome) => self.apply(outcome),
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.inbox = None;
                self.fail(LoadError::Interrupted);
                true
            }
        }
    }

    /// Blocks until outstanding work is applied or `timeout` elapses. A
    /// timeout too large to represent as a deadline waits without one.
    pub fn wait(&mut self, timeout: Duration) -> &SessionState {
        let deadline = Instant::now().checked_add(timeout);
        while let Some(rx) = &self.inbox {
            let received = match deadline {
                Some(deadline) => {
                    rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
                }
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(outcome) => {
                    self.apply(outcome);
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    self.inbox = None;
                    self.fail(LoadError::Interrupted);
                }
            }
        }
        &self.state
    }

    /// Closes the session, persisting the reading position if a document
    /// was loaded.
    pub fn close(self) {
        if self.is_ready() {
            save_position(&self.store, &self.position());
        }
        debug!(file = %self.identity, "session closed");
    }

    /// The single acknowledgement a failed load offers; it closes the
    /// session.
    pub fn acknowledge_failure(self) {
        if let SessionState::LoadFailed(err) = &self.state {
            debug!(kind = err.kind(), "load failure acknowledged");
        }
        self.close();
    }

    fn set_page(&mut self, index: usize) {
        self.current = clamp_page(index, self.pages.len());
        save_position(&self.store, &self.position());
    }

    fn relayout(&mut self) {
        let text = match (&self.state, &self.text) {
            (SessionState::Ready, Some(text)) => Some(Arc::clone(text)),
            _ => None,
        };
        match text {
            Some(text) => self.dispatch(Job::Repaginate { text }),
            // Still loading: restart with the new settings.
            None => self.dispatch_load(),
        }
    }

    fn dispatch_load(&mut self) {
        let job = Job::Load {
            path: self.path.clone(),
            detector: Arc::clone(&self.options.detector),
            indexer: Arc::clone(&self.options.indexer),
        };
        self.dispatch(job);
    }

    // Dropping the previous receiver discards any superseded result.
    fn dispatch(&mut self, job: Job) {
        self.generation += 1;
        let style = self.settings.text_style(self.options.density);
        debug!(generation = self.generation, file = %self.identity, "dispatching layout job");
        self.inbox = Some(worker::spawn(
            self.generation,
            job,
            Arc::clone(&self.measure),
            style,
            self.options.viewport,
        ));
    }

    fn apply(&mut self, outcome: JobOutcome) -> bool {
        if outcome.generation != self.generation {
            debug!(
                stale = outcome.generation,
                current = self.generation,
                "discarding superseded result"
            );
            return false;
        }
        self.inbox = None;
        match outcome.result {
            Ok(Layout {
                document: Some(document),
                pages,
            }) => {
                self.text = Some(document.text);
                self.charset = Some(document.charset);
                self.chapters = document.chapters;
                self.pages = pages;
                let saved = load_position(&self.store, &self.identity);
                self.current = clamp_page(saved.page_index, self.pages.len());
                self.state = SessionState::Ready;
                info!(
                    file = %self.identity,
                    charset = self.charset.as_deref().unwrap_or_default(),
                    chapters = self.chapters.len(),
                    pages = self.pages.len(),
                    page = self.current,
                    "document ready"
                );
            }
            Ok(Layout {
                document: None,
                pages,
            }) => {
                let anchor = self.current_page().map(|p| p.start);
                let previous = self.current;
                self.pages = pages;
                self.current = anchor
                    .and_then(|offset| find_page_for_offset(&self.pages, offset))
                    .unwrap_or_else(|| clamp_page(previous, self.pages.len()));
                save_position(&self.store, &self.position());
                debug!(pages = self.pages.len(), page = self.current, "re-paginated");
            }
            Err(err) => self.fail(err),
        }
        true
    }

    fn fail(&mut self, err: LoadError) {
        error!(file = %self.identity, kind = err.kind(), error = %err, "load failed");
        self.chapters.clear();
        self.pages.clear();
        self.current = 0;
        self.state = SessionState::LoadFailed(err);
    }
}

fn clamp_page(index: usize, count: usize) -> usize {
    index.min(count.saturating_sub(1))
}
