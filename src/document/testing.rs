//! In-memory `RenderBackend` used by the unit tests.

use super::{Background, BackendError, OutlineAction, OutlineRef, RenderBackend};
use crate::geometry::SizeF;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug, Clone)]
pub(crate) struct FakePage {
    size: SizeF,
    rgba: Option<[u8; 4]>,
    transparent: bool,
    fails: bool,
}

impl FakePage {
    pub(crate) fn new(width: f64, height: f64) -> Self {
        Self {
            size: SizeF::new(width, height),
            rgba: Some([0, 0, 0, 255]),
            transparent: false,
            fails: false,
        }
    }

    pub(crate) fn with_rgba(mut self, rgba: [u8; 4]) -> Self {
        self.rgba = Some(rgba);
        self
    }

    /// Nothing drawn: the background fill shows through.
    pub(crate) fn blank(mut self) -> Self {
        self.rgba = None;
        self
    }

    pub(crate) fn transparent(mut self) -> Self {
        self.transparent = true;
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fails = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeBookmark {
    title: String,
    action: Option<(OutlineAction, Option<usize>)>,
    direct: Option<usize>,
    children: Vec<FakeBookmark>,
}

impl FakeBookmark {
    pub(crate) fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    pub(crate) fn goto(mut self, page_index: usize) -> Self {
        self.action = Some((OutlineAction::GoTo, Some(page_index)));
        self
    }

    pub(crate) fn other_action(mut self) -> Self {
        self.action = Some((OutlineAction::Other, None));
        self
    }

    pub(crate) fn direct(mut self, page_index: usize) -> Self {
        self.direct = Some(page_index);
        self
    }

    pub(crate) fn child(mut self, child: FakeBookmark) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeDocument {
    pages: Vec<FakePage>,
    outline: Vec<FakeBookmark>,
    password: Option<String>,
    error: Option<BackendError>,
    sibling_cycle: bool,
}

impl FakeDocument {
    pub(crate) fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub(crate) fn uniform(count: usize, width: f64, height: f64) -> Self {
        Self::new((0..count).map(|_| FakePage::new(width, height)).collect())
    }

    pub(crate) fn failing(error: BackendError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub(crate) fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub(crate) fn with_outline(mut self, outline: Vec<FakeBookmark>) -> Self {
        self.outline = outline;
        self
    }

    /// The last top-level entry's next sibling is the first one again.
    pub(crate) fn with_sibling_cycle(mut self) -> Self {
        self.sibling_cycle = true;
        self
    }

    fn bookmark(&self, node: &OutlineRef) -> Option<&FakeBookmark> {
        let (first, rest) = node.path().split_first()?;
        let mut current = self.outline.get(*first)?;
        for index in rest {
            current = current.children.get(*index)?;
        }
        Some(current)
    }
}

/// Live outline handle; identity is the entry's position.
#[derive(Debug, Clone)]
pub(crate) struct FakeHandle<'d> {
    doc: &'d FakeDocument,
    node: OutlineRef,
}

impl PartialEq for FakeHandle<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl Eq for FakeHandle<'_> {}

impl Hash for FakeHandle<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.hash(state);
    }
}

impl<'d> FakeHandle<'d> {
    fn at(doc: &'d FakeDocument, node: OutlineRef) -> Option<Self> {
        doc.bookmark(&node)?;
        Some(Self { doc, node })
    }
}

fn next_sibling_ref(node: &OutlineRef) -> Option<OutlineRef> {
    let (last, parents) = node.path().split_last()?;
    let Some((first, rest)) = parents.split_first() else {
        return Some(OutlineRef::top_level(last + 1));
    };
    let parent = rest
        .iter()
        .fold(OutlineRef::top_level(*first), |parent, index| parent.child(*index));
    Some(parent.child(last + 1))
}

#[derive(Debug, Default)]
pub(crate) struct FakeBackend {
    documents: HashMap<PathBuf, FakeDocument>,
    parse_calls: Cell<usize>,
    outline_calls: Cell<usize>,
    render_calls: RefCell<Vec<(usize, u32, u32)>>,
}

impl FakeBackend {
    /// Native outline steps taken: root, first-child and next-sibling calls.
    pub(crate) fn outline_calls(&self) -> usize {
        self.outline_calls.get()
    }

    fn count_outline_call(&self) {
        self.outline_calls.set(self.outline_calls.get() + 1);
    }

    pub(crate) fn parse_calls(&self) -> usize {
        self.parse_calls.get()
    }

    /// `(page index, width, height)` of every render request, oldest first.
    pub(crate) fn render_calls(&self) -> Vec<(usize, u32, u32)> {
        self.render_calls.borrow().clone()
    }

    pub(crate) fn rendered_pages(&self) -> Vec<usize> {
        self.render_calls.borrow().iter().map(|call| call.0).collect()
    }
}

impl RenderBackend for FakeBackend {
    type Document = FakeDocument;
    type Destination = usize;
    type Bookmark<'d>
        = FakeHandle<'d>
    where
        Self: 'd;

    fn open_document(
        &self,
        path: &Path,
        password: Option<&str>,
    ) -> Result<FakeDocument, BackendError> {
        self.parse_calls.set(self.parse_calls.get() + 1);
        let document = self.documents.get(path).ok_or(BackendError::File)?;
        if let Some(error) = &document.error {
            return Err(error.clone());
        }
        if document.password.is_some() && document.password.as_deref() != password {
            return Err(BackendError::Password);
        }
        Ok(document.clone())
    }

    fn page_count(&self, doc: &FakeDocument) -> usize {
        doc.pages.len()
    }

    fn page_size(&self, doc: &FakeDocument, index: usize) -> Option<SizeF> {
        doc.pages.get(index).map(|page| page.size)
    }

    fn has_transparency(&self, doc: &FakeDocument, index: usize) -> bool {
        doc.pages.get(index).is_some_and(|page| page.transparent)
    }

    fn render_page_bgra(
        &self,
        doc: &FakeDocument,
        index: usize,
        width: u32,
        height: u32,
        background: Background,
    ) -> Result<Vec<u8>, BackendError> {
        self.render_calls.borrow_mut().push((index, width, height));
        let page = doc.pages.get(index).ok_or(BackendError::Page(index))?;
        if page.fails {
            return Err(BackendError::Page(index));
        }

        let pixel = match page.rgba {
            Some([r, g, b, a]) => [b, g, r, a],
            None => background.bgra(),
        };
        Ok(pixel.repeat(width as usize * height as usize))
    }

    fn outline_root<'d>(&'d self, doc: &'d FakeDocument) -> Option<FakeHandle<'d>> {
        self.count_outline_call();
        FakeHandle::at(doc, OutlineRef::top_level(0))
    }

    fn bookmark_first_child<'d>(&'d self, bookmark: &FakeHandle<'d>) -> Option<FakeHandle<'d>> {
        self.count_outline_call();
        FakeHandle::at(bookmark.doc, bookmark.node.child(0))
    }

    fn bookmark_next_sibling<'d>(&'d self, bookmark: &FakeHandle<'d>) -> Option<FakeHandle<'d>> {
        self.count_outline_call();
        let doc = bookmark.doc;
        next_sibling_ref(&bookmark.node)
            .and_then(|node| FakeHandle::at(doc, node))
            .or_else(|| {
                (doc.sibling_cycle && bookmark.node.depth() == 1)
                    .then(|| FakeHandle::at(doc, OutlineRef::top_level(0)))
                    .flatten()
            })
    }

    fn bookmark_title(&self, bookmark: &FakeHandle<'_>) -> Option<String> {
        bookmark
            .doc
            .bookmark(&bookmark.node)
            .map(|entry| entry.title.clone())
    }

    fn outline_action(&self, doc: &FakeDocument, node: &OutlineRef) -> Option<OutlineAction> {
        doc.bookmark(node)?.action.map(|(kind, _)| kind)
    }

    fn outline_action_destination(&self, doc: &FakeDocument, node: &OutlineRef) -> Option<usize> {
        doc.bookmark(node)?.action.and_then(|(_, dest)| dest)
    }

    fn outline_direct_destination(&self, doc: &FakeDocument, node: &OutlineRef) -> Option<usize> {
        doc.bookmark(node)?.direct
    }

    fn destination_page_index(&self, doc: &FakeDocument, dest: &usize) -> Option<usize> {
        (*dest < doc.pages.len()).then_some(*dest)
    }
}

/// Temp directory with placeholder files, one per registered fake document.
pub(crate) struct Fixture {
    dir: TempDir,
    documents: HashMap<PathBuf, FakeDocument>,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
            documents: HashMap::new(),
        }
    }

    pub(crate) fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn add(&mut self, name: &str, document: FakeDocument) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"%PDF-fake").expect("write fixture");
        self.documents.insert(path.clone(), document);
        path
    }

    pub(crate) fn backend(&self) -> FakeBackend {
        FakeBackend {
            documents: self.documents.clone(),
            ..FakeBackend::default()
        }
    }
}
