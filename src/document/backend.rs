use crate::geometry::SizeF;
use std::hash::Hash;
use std::path::Path;

/// Address of one native outline entry: the sibling index at every level,
/// starting from the top-level list. It borrows nothing from the document,
/// so holding one never extends a native handle's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutlineRef {
    path: Vec<usize>,
}

impl OutlineRef {
    pub fn top_level(index: usize) -> Self {
        Self { path: vec![index] }
    }

    pub fn path(&self) -> &[usize] {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Reference to the `index`-th child of this entry.
    pub fn child(&self, index: usize) -> Self {
        let mut path = self.path.clone();
        path.push(index);
        Self { path }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineAction {
    /// Jump to a destination inside the same document.
    GoTo,
    /// URI, launch, remote go-to and everything else that is not navigable here.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    Transparent,
    White,
}

impl Background {
    /// BGRA fill value, the byte order native renderers write.
    pub fn bgra(self) -> [u8; 4] {
        match self {
            Self::Transparent => [0, 0, 0, 0],
            Self::White => [0xFF, 0xFF, 0xFF, 0xFF],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("file cannot be read")]
    File,
    #[error("not a valid document")]
    Format,
    #[error("password required or incorrect")]
    Password,
    #[error("unsupported security handler")]
    Security,
    #[error("page {0} cannot be loaded")]
    Page(usize),
    #[error("render failed: {0}")]
    Render(String),
    #[error("backend error: {0}")]
    Other(String),
}

/// The capabilities the viewer needs from a page-rendering library.
///
/// Implementations own nothing beyond what `open_document` hands back; the
/// [`DocumentService`](super::DocumentService) keeps the documents and drops
/// them on close.
pub trait RenderBackend {
    type Document;
    type Destination;
    /// Handle to one native outline entry while its document is borrowed.
    /// Equal handles name the same entry, which lets a walk notice cycles.
    type Bookmark<'d>: Clone + Eq + Hash
    where
        Self: 'd;

    fn open_document(
        &self,
        path: &Path,
        password: Option<&str>,
    ) -> Result<Self::Document, BackendError>;

    fn page_count(&self, doc: &Self::Document) -> usize;

    fn page_size(&self, doc: &Self::Document, index: usize) -> Option<SizeF>;

    fn has_transparency(&self, doc: &Self::Document, index: usize) -> bool;

    /// Renders a page scaled to exactly `width` x `height` pixels and returns
    /// the pixels in BGRA order, `width * height * 4` bytes.
    fn render_page_bgra(
        &self,
        doc: &Self::Document,
        index: usize,
        width: u32,
        height: u32,
        background: Background,
    ) -> Result<Vec<u8>, BackendError>;

    /// First top-level outline entry.
    fn outline_root<'d>(&'d self, doc: &'d Self::Document) -> Option<Self::Bookmark<'d>>;

    fn bookmark_first_child<'d>(
        &'d self,
        bookmark: &Self::Bookmark<'d>,
    ) -> Option<Self::Bookmark<'d>>;

    /// Native sibling chains may loop; callers guard against revisits.
    fn bookmark_next_sibling<'d>(
        &'d self,
        bookmark: &Self::Bookmark<'d>,
    ) -> Option<Self::Bookmark<'d>>;

    fn bookmark_title(&self, bookmark: &Self::Bookmark<'_>) -> Option<String>;

    // Lazy resolution goes through the stable path, not a live handle.

    fn outline_action(&self, doc: &Self::Document, node: &OutlineRef) -> Option<OutlineAction>;

    fn outline_action_destination(
        &self,
        doc: &Self::Document,
        node: &OutlineRef,
    ) -> Option<Self::Destination>;

    fn outline_direct_destination(
        &self,
        doc: &Self::Document,
        node: &OutlineRef,
    ) -> Option<Self::Destination>;

    fn destination_page_index(&self, doc: &Self::Document, dest: &Self::Destination)
    -> Option<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_ref_navigation() {
        let second = OutlineRef::top_level(1);
        assert_eq!(second.path(), &[1]);
        assert_eq!(second.child(0).path(), &[1, 0]);
        assert_eq!(second.child(0).child(3).depth(), 3);
    }
}
