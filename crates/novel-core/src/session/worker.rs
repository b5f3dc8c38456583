use std::{
    path::{Path, PathBuf},
    sync::{
        mpsc::{channel, Receiver},
        Arc,
    },
    thread,
};

use tracing::debug;

use crate::chapters::ChapterIndexer;
use crate::layout::{paginate, LineMeasure};
use crate::text::{CharsetDetector, TextError, TextFile};
use crate::types::{Chapter, Page, TextStyle, Viewport};

use super::LoadError;

pub struct LoadedText {
    pub text: Arc<str>,
    pub charset: String,
    pub chapters: Vec<Chapter>,
}

/// Reads, decodes and indexes `path`. Runs on the worker thread but has no
/// thread affinity of its own.
pub fn load_text(
    path: &Path,
    detector: &dyn CharsetDetector,
    indexer: &ChapterIndexer,
) -> Result<LoadedText, LoadError> {
    let file = TextFile::open(path, detector).map_err(|e| match e {
        TextError::Io(io) => LoadError::Io(io),
        other => LoadError::Decode(other),
    })?;
    let chapters = indexer.index(&file.content);
    debug!(
        path = %path.display(),
        chars = file.content.chars().count(),
        chapters = chapters.len(),
        "indexed chapters"
    );
    Ok(LoadedText {
        text: Arc::from(file.content),
        charset: file.charset,
        chapters,
    })
}

pub(super) enum Job {
    Load {
        path: PathBuf,
        detector: Arc<dyn CharsetDetector + Send + Sync>,
        indexer: Arc<ChapterIndexer>,
    },
    Repaginate {
        text: Arc<str>,
    },
}

pub(super) struct JobOutcome {
    pub generation: u64,
    pub result: Result<Layout, LoadError>,
}

pub(super) struct Layout {
    /// Present only for `Job::Load`.
    pub document: Option<LoadedText>,
    pub pages: Vec<Page>,
}

pub(super) fn spawn<M>(
    generation: u64,
    job: Job,
    measure: Arc<M>,
    style: TextStyle,
    viewport: Viewport,
) -> Receiver<JobOutcome>
where
    M: LineMeasure + Send + Sync + 'static,
{
    let (tx, rx) = channel();
    thread::spawn(move || {
        let result = run(job, measure.as_ref(), &style, viewport);
        // The receiver is gone when a newer job superseded this one.
        let _ = tx.send(JobOutcome { generation, result });
    });
    rx
}

fn run<M: LineMeasure + ?Sized>(
    job: Job,
    measure: &M,
    style: &TextStyle,
    viewport: Viewport,
) -> Result<Layout, LoadError> {
    match job {
        Job::Load {
            path,
            detector,
            indexer,
        } => {
            let document = load_text(&path, detector.as_ref(), &indexer)?;
            let pages = paginate(&document.text, measure, style, viewport)?;
            Ok(Layout {
                document: Some(document),
                pages,
            })
        }
        Job::Repaginate { text } => {
            let pages = paginate(&text, measure, style, viewport)?;
            Ok(Layout {
                document: None,
                pages,
            })
        }
    }
}
