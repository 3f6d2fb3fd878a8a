//! Embeddable engine for showing a user manual: a service over a page
//! renderer, lazily rendered pages, the document outline and a continuous
//! vertical viewport with debounced zoom.

pub mod config;
pub mod document;
pub mod geometry;
pub mod i18n;
pub mod logger;
pub mod manual;
pub mod outline;
pub mod page_item;
pub mod timer;
pub mod viewport;

pub use config::ViewerConfig;
pub use document::pdfium::PdfiumBackend;
pub use document::{DocId, DocumentService, DocumentStatus, OpenError, RenderBackend};
pub use geometry::{RectF, SizeF};
pub use i18n::{I18n, Language};
pub use outline::{ModelIndex, NodeId, OutlineTree};
pub use page_item::{PageItem, RenderState};
pub use timer::{Clock, ManualClock, SingleShot, SystemClock};
pub use viewport::{DocumentViewport, NavigationError, PollOutcome, ViewerStatus};
