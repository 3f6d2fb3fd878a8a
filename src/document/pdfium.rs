//! `RenderBackend` over PDFium through `pdfium-render`.

use super::{Background, BackendError, OutlineAction, OutlineRef, RenderBackend};
use crate::geometry::SizeF;
use crate::i18n::{I18n, Language};
use anyhow::{Context as _, Result, anyhow};
use pdfium_render::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

static PDFIUM_INSTANCE: OnceLock<Result<Pdfium, String>> = OnceLock::new();
static PASSWORDS: OnceLock<Mutex<HashSet<&'static str>>> = OnceLock::new();

/// pdfium-render ties a document to the password it was opened with, and
/// documents here live as long as the process-wide binding. Each distinct
/// password is stored once for the rest of the process.
fn interned_password(password: &str) -> &'static str {
    let passwords = PASSWORDS.get_or_init(Default::default);
    let mut passwords = passwords
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(existing) = passwords.get(password) {
        return *existing;
    }
    let stored: &'static str = Box::leak(password.to_owned().into_boxed_str());
    passwords.insert(stored);
    stored
}

fn shared_pdfium(language: Language) -> Result<&'static Pdfium> {
    match PDFIUM_INSTANCE.get_or_init(|| init_pdfium(language).map_err(|err| format!("{err:#}"))) {
        Ok(pdfium) => Ok(pdfium),
        Err(message) => Err(anyhow!("{message}")),
    }
}

fn init_pdfium(language: Language) -> Result<Pdfium> {
    let i18n = I18n::new(language);

    let lib_path = "./lib";
    crate::debug_log!("[pdfium] trying path: {}", lib_path);
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(lib_path))
        .or_else(|err| {
            crate::debug_log!("[pdfium] {} failed: {}", lib_path, err);
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        })
        .or_else(|err| {
            crate::debug_log!("[pdfium] ./ failed: {}, trying system library", err);
            Pdfium::bind_to_system_library()
        })
        .context(i18n.pdfium_not_found)?;

    crate::debug_log!("[pdfium] init success");
    Ok(Pdfium::new(bindings))
}

/// Destination read out of a bookmark or its go-to action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfiumDestination {
    page_index: Option<usize>,
}

impl PdfiumDestination {
    fn from_native(destination: &PdfDestination<'_>) -> Self {
        Self {
            page_index: destination.page_index().ok().map(|index| index as usize),
        }
    }
}

/// Binds PDFium once per process; every backend shares that binding.
#[derive(Clone, Copy)]
pub struct PdfiumBackend {
    pdfium: &'static Pdfium,
}

impl PdfiumBackend {
    pub fn bind(language: Language) -> Result<Self> {
        Ok(Self {
            pdfium: shared_pdfium(language)?,
        })
    }

    fn page<'a>(
        &self,
        doc: &'a PdfDocument<'static>,
        index: usize,
    ) -> Result<PdfPage<'a>, BackendError> {
        if index > u16::MAX as usize {
            return Err(BackendError::Page(index));
        }
        doc.pages()
            .get(index as u16)
            .map_err(|_| BackendError::Page(index))
    }
}

fn map_load_error(err: PdfiumError) -> BackendError {
    match err {
        PdfiumError::PdfiumLibraryInternalError(internal) => match internal {
            PdfiumInternalError::FileError => BackendError::File,
            PdfiumInternalError::FormatError => BackendError::Format,
            PdfiumInternalError::PasswordError => BackendError::Password,
            PdfiumInternalError::SecurityError => BackendError::Security,
            other => BackendError::Other(format!("{other:?}")),
        },
        other => BackendError::Other(format!("{other:?}")),
    }
}

/// Walks `first_child`/`next_sibling` from the top-level list down to `node`.
fn bookmark_at<'a>(doc: &'a PdfDocument<'static>, node: &OutlineRef) -> Option<PdfBookmark<'a>> {
    let (first, rest) = node.path().split_first()?;
    let mut current = doc.bookmarks().root()?;
    for _ in 0..*first {
        current = current.next_sibling()?;
    }
    for index in rest {
        current = current.first_child()?;
        for _ in 0..*index {
            current = current.next_sibling()?;
        }
    }
    Some(current)
}

impl RenderBackend for PdfiumBackend {
    type Document = PdfDocument<'static>;
    type Destination = PdfiumDestination;
    type Bookmark<'d>
        = PdfBookmark<'d>
    where
        Self: 'd;

    fn open_document(
        &self,
        path: &Path,
        password: Option<&str>,
    ) -> Result<PdfDocument<'static>, BackendError> {
        self.pdfium
            .load_pdf_from_file(path, password.map(interned_password))
            .map_err(map_load_error)
    }

    fn page_count(&self, doc: &PdfDocument<'static>) -> usize {
        doc.pages().len() as usize
    }

    fn page_size(&self, doc: &PdfDocument<'static>, index: usize) -> Option<SizeF> {
        let page = self.page(doc, index).ok()?;
        let size = SizeF::new(page.width().value as f64, page.height().value as f64);
        size.is_positive().then_some(size)
    }

    fn has_transparency(&self, doc: &PdfDocument<'static>, index: usize) -> bool {
        self.page(doc, index)
            .map(|page| page.has_transparency())
            .unwrap_or(false)
    }

    #[allow(deprecated)]
    fn render_page_bgra(
        &self,
        doc: &PdfDocument<'static>,
        index: usize,
        width: u32,
        height: u32,
        background: Background,
    ) -> Result<Vec<u8>, BackendError> {
        let page = self.page(doc, index)?;
        let clear_color = match background {
            Background::Transparent => PdfColor::new(0, 0, 0, 0),
            Background::White => PdfColor::WHITE,
        };
        let render_config = PdfRenderConfig::new()
            .set_target_size(width as i32, height as i32)
            .set_clear_color(clear_color)
            .render_annotations(true)
            .set_reverse_byte_order(false);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|err| BackendError::Render(format!("{err:?}")))?;

        let format = bitmap.format().unwrap_or(PdfBitmapFormat::BGRA);
        let mut bytes = bitmap.as_raw_bytes();
        if matches!(format, PdfBitmapFormat::BGRx | PdfBitmapFormat::BRGx) {
            for pixel in bytes.chunks_exact_mut(4) {
                pixel[3] = 255;
            }
        }
        Ok(bytes)
    }

    fn outline_root<'d>(&'d self, doc: &'d PdfDocument<'static>) -> Option<PdfBookmark<'d>> {
        doc.bookmarks().root()
    }

    fn bookmark_first_child<'d>(&'d self, bookmark: &PdfBookmark<'d>) -> Option<PdfBookmark<'d>> {
        bookmark.first_child()
    }

    fn bookmark_next_sibling<'d>(
        &'d self,
        bookmark: &PdfBookmark<'d>,
    ) -> Option<PdfBookmark<'d>> {
        bookmark.next_sibling()
    }

    fn bookmark_title(&self, bookmark: &PdfBookmark<'_>) -> Option<String> {
        bookmark.title()
    }

    fn outline_action(
        &self,
        doc: &PdfDocument<'static>,
        node: &OutlineRef,
    ) -> Option<OutlineAction> {
        match bookmark_at(doc, node)?.action()? {
            PdfAction::LocalDestination(_) => Some(OutlineAction::GoTo),
            _ => Some(OutlineAction::Other),
        }
    }

    fn outline_action_destination(
        &self,
        doc: &PdfDocument<'static>,
        node: &OutlineRef,
    ) -> Option<PdfiumDestination> {
        match bookmark_at(doc, node)?.action()? {
            PdfAction::LocalDestination(action) => action
                .destination()
                .ok()
                .map(|destination| PdfiumDestination::from_native(&destination)),
            _ => None,
        }
    }

    fn outline_direct_destination(
        &self,
        doc: &PdfDocument<'static>,
        node: &OutlineRef,
    ) -> Option<PdfiumDestination> {
        bookmark_at(doc, node)?
            .destination()
            .map(|destination| PdfiumDestination::from_native(&destination))
    }

    fn destination_page_index(
        &self,
        doc: &PdfDocument<'static>,
        dest: &PdfiumDestination,
    ) -> Option<usize> {
        dest.page_index
            .filter(|index| *index < doc.pages().len() as usize)
    }
}
