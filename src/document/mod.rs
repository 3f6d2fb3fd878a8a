//! Open documents and the primitives the viewer needs from them.

mod backend;
pub mod pdfium;
#[cfg(test)]
pub(crate) mod testing;

pub use backend::{Background, BackendError, OutlineAction, OutlineRef, RenderBackend};

use crate::geometry::SizeF;
use image::RgbaImage;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(pub u32);

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// Result of the most recent open request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentStatus {
    #[default]
    NotLoaded,
    Success,
    FileError,
    FormatError,
    PasswordError,
    /// The document uses a security handler the library refuses.
    HandlerError,
    FileNotFoundError,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpenError {
    #[error("file not found")]
    FileNotFound,
    #[error("file cannot be opened or read")]
    File,
    #[error("file is not a valid document")]
    Format,
    #[error("password required or incorrect")]
    Password,
    #[error("unsupported security handler")]
    Handler,
}

impl OpenError {
    pub fn status(&self) -> DocumentStatus {
        match self {
            Self::FileNotFound => DocumentStatus::FileNotFoundError,
            Self::File => DocumentStatus::FileError,
            Self::Format => DocumentStatus::FormatError,
            Self::Password => DocumentStatus::PasswordError,
            Self::Handler => DocumentStatus::HandlerError,
        }
    }
}

impl From<BackendError> for OpenError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Format => Self::Format,
            BackendError::Password => Self::Password,
            BackendError::Security => Self::Handler,
            BackendError::File
            | BackendError::Page(_)
            | BackendError::Render(_)
            | BackendError::Other(_) => Self::File,
        }
    }
}

/// Owns every open native document, keyed by [`DocId`].
///
/// Page and outline queries always target the document opened last. Handles
/// are dropped (and thereby closed) on [`close`](Self::close) or when the
/// service itself is dropped.
pub struct DocumentService<B: RenderBackend> {
    backend: B,
    documents: HashMap<DocId, B::Document>,
    current: Option<DocId>,
    page_count: usize,
    status: DocumentStatus,
    documents_opened: u64,
}

impl<B: RenderBackend> DocumentService<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            documents: HashMap::new(),
            current: None,
            page_count: 0,
            status: DocumentStatus::NotLoaded,
            documents_opened: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn open(
        &mut self,
        path: &Path,
        password: Option<&str>,
        doc_id: DocId,
    ) -> Result<(), OpenError> {
        if !path.exists() {
            crate::debug_log!("[pdf][open] {} not found: {}", doc_id, path.display());
            return self.fail(OpenError::FileNotFound);
        }

        if !self.documents.contains_key(&doc_id) {
            let started_at = Instant::now();
            let document = match self.backend.open_document(path, password) {
                Ok(document) => document,
                Err(err) => {
                    crate::debug_log!(
                        "[pdf][open] {} failed: {} | {}",
                        doc_id,
                        path.display(),
                        err
                    );
                    return self.fail(OpenError::from(err));
                }
            };
            self.documents.insert(doc_id, document);
            self.documents_opened += 1;
            crate::debug_log!(
                "[pdf][open] {} loaded {} | {}ms",
                doc_id,
                path.display(),
                started_at.elapsed().as_millis()
            );
        }

        self.current = Some(doc_id);
        self.status = DocumentStatus::Success;
        self.page_count = self
            .documents
            .get(&doc_id)
            .map(|document| self.backend.page_count(document))
            .unwrap_or(0);
        Ok(())
    }

    fn fail(&mut self, err: OpenError) -> Result<(), OpenError> {
        self.current = None;
        self.page_count = 0;
        self.status = err.status();
        Err(err)
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    pub fn current_doc(&self) -> Option<DocId> {
        self.current
    }

    pub fn is_open(&self, doc_id: DocId) -> bool {
        self.documents.contains_key(&doc_id)
    }

    /// Number of native parses performed; reopening a cached id does not count.
    pub fn documents_opened(&self) -> u64 {
        self.documents_opened
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn page_size(&self, index: usize) -> Option<SizeF> {
        if index >= self.page_count {
            return None;
        }
        let document = self.current_document()?;
        self.backend.page_size(document, index)
    }

    /// Renders page `index` at `target_size * scale` pixels.
    ///
    /// Returns `None` when nothing is open, the size is not positive or the
    /// page fails; callers keep whatever bitmap they had.
    pub fn render_page(&self, index: usize, target_size: SizeF, scale: f64) -> Option<RgbaImage> {
        let document = self.current_document()?;
        if !target_size.is_positive() || !(scale > 0.0) || index >= self.page_count {
            return None;
        }

        let started_at = Instant::now();
        let (width, height) = target_size.scaled(scale).to_pixels();
        let background = if self.backend.has_transparency(document, index) {
            Background::Transparent
        } else {
            Background::White
        };

        let mut bytes = match self
            .backend
            .render_page_bgra(document, index, width, height, background)
        {
            Ok(bytes) => bytes,
            Err(err) => {
                crate::debug_log!(
                    "[pdf][render] p{} failed: {} | {}ms",
                    index + 1,
                    err,
                    started_at.elapsed().as_millis()
                );
                return None;
            }
        };

        let expected_len = width as usize * height as usize * 4;
        if bytes.len() != expected_len {
            crate::debug_log!(
                "[pdf][render] p{} bitmap length {} != {}",
                index + 1,
                bytes.len(),
                expected_len
            );
            return None;
        }

        bgra_to_rgba(&mut bytes);
        RgbaImage::from_raw(width, height, bytes)
    }

    /// First top-level outline entry of the current document.
    pub fn outline_root(&self) -> Option<B::Bookmark<'_>> {
        let document = self.current_document()?;
        self.backend.outline_root(document)
    }

    pub fn bookmark_first_child<'d>(&'d self, bookmark: &B::Bookmark<'d>) -> Option<B::Bookmark<'d>> {
        self.backend.bookmark_first_child(bookmark)
    }

    pub fn bookmark_next_sibling<'d>(
        &'d self,
        bookmark: &B::Bookmark<'d>,
    ) -> Option<B::Bookmark<'d>> {
        self.backend.bookmark_next_sibling(bookmark)
    }

    pub fn bookmark_title(&self, bookmark: &B::Bookmark<'_>) -> String {
        self.backend.bookmark_title(bookmark).unwrap_or_default()
    }

    /// Page targeted by an outline entry.
    ///
    /// An entry with a go-to action navigates through that action's
    /// destination; an entry with any other action does not navigate; an
    /// entry without an action falls back to the destination stored on it.
    pub fn resolve_destination_page_index(&self, node: &OutlineRef) -> Option<usize> {
        let document = self.current_document()?;
        let destination = match self.backend.outline_action(document, node) {
            Some(OutlineAction::GoTo) => self.backend.outline_action_destination(document, node),
            Some(OutlineAction::Other) => None,
            None => self.backend.outline_direct_destination(document, node),
        }?;
        self.backend.destination_page_index(document, &destination)
    }

    pub fn close(&mut self) {
        let closed = self.documents.len();
        self.documents.clear();
        self.current = None;
        self.page_count = 0;
        self.status = DocumentStatus::NotLoaded;
        crate::debug_log!("[pdf][close] released {} document(s)", closed);
    }

    fn current_document(&self) -> Option<&B::Document> {
        self.documents.get(&self.current?)
    }
}

/// Native renderers write BGRA; images downstream are RGBA.
pub(crate) fn bgra_to_rgba(bytes: &mut [u8]) {
    for pixel in bytes.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }
}
