//! Note service for markidea
//!
//! Ties the per-user repositories, the content/preview caches, the recycle
//! bin and the remote sync settings together behind `NoteService`.

pub mod cache;
pub mod index;
pub mod service;

pub use cache::{CacheError, ContentCache, NotePreview, NoteSource, PreviewCache, WorkingTreeSource};
pub use index::{ContentIndex, NoopContentIndex};
pub use service::{NoteService, NoteStatus, NoteSummary, SearchHit};
