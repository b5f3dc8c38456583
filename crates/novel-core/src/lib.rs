pub mod chapters;
pub mod config;
pub mod layout;
pub mod position;
pub mod session;
pub mod state;
pub mod text;
pub mod types;

pub use chapters::ChapterIndexer;
pub use layout::{paginate, LineMeasure, MonospaceMeasure};
pub use position::page_index_for_offset;
pub use session::{ReadingSession, SessionEvent, SessionOptions, SessionState};
