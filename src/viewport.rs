//! Continuous vertical page view: layout, visibility, navigation and zoom.

use crate::config::ViewerConfig;
use crate::document::{DocId, DocumentService, OpenError, RenderBackend};
use crate::geometry::{RectF, SizeF};
use crate::i18n::{I18n, Language};
use crate::outline::{ModelIndex, OutlineTree};
use crate::page_item::PageItem;
use crate::timer::{Clock, SingleShot, SystemClock};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

/// Used when the backend cannot report a page's size (US Letter, points).
const FALLBACK_PAGE_SIZE: SizeF = SizeF::new(612.0, 792.0);
const SCALE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("no document is open")]
    NoDocument,
    #[error("page {requested} is outside 1..={page_count}")]
    PageOutOfRange { requested: usize, page_count: usize },
}

impl NavigationError {
    /// Message for the page-number entry's validation tip.
    pub fn user_message(&self, language: Language) -> String {
        let i18n = I18n::new(language);
        match self {
            Self::NoDocument => i18n.open_not_loaded.to_string(),
            Self::PageOutOfRange { page_count, .. } => i18n.page_out_of_range(*page_count),
        }
    }
}

/// What the host window shows next to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerStatus {
    /// 1-based, 0 when nothing is open.
    pub current_page: usize,
    pub page_count: usize,
    pub zoom_percent: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub relayout: bool,
    /// Zero-based indices of the pages rendered during this poll.
    pub rendered: Vec<usize>,
}

/// Per-document view state, kept while switching between documents.
struct Book {
    pages: Vec<PageItem>,
    outline: OutlineTree,
    current_page: usize,
    scale: f64,
    page_rects: Vec<RectF>,
    scene: SizeF,
    scroll: f64,
}

impl Book {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Stacks pages from the top-left margin, `gap` below each one.
    fn layout(&mut self, margin: f64, gap: f64) {
        let mut top = margin;
        let mut width = margin;
        self.page_rects.clear();
        for page in &self.pages {
            let size = page.size();
            self.page_rects.push(RectF::from_origin_size(margin, top, size));
            top += size.height + gap;
            width = width.max(size.width);
        }
        self.scene = SizeF::new(width, top);
    }

    fn page_is_visible(&self, page_number: usize, view: &RectF) -> bool {
        if page_number == 0 {
            return false;
        }
        self.page_rects
            .get(page_number - 1)
            .is_some_and(|rect| rect.intersects(view))
    }

    /// Closest page to the current one that intersects `view`, looking in
    /// the scroll direction first. `None` when nothing is on screen.
    fn nearest_visible_page(&self, view: &RectF, forward: bool) -> Option<usize> {
        let current = self.current_page;
        let ahead = || (current + 1..=self.page_count()).find(|n| self.page_is_visible(*n, view));
        let behind = || (1..current).rev().find(|n| self.page_is_visible(*n, view));
        if forward {
            ahead().or_else(behind)
        } else {
            behind().or_else(ahead)
        }
    }

    fn set_page_visible(&mut self, page_number: usize, visible: bool, now: Instant) {
        if page_number == 0 {
            return;
        }
        if let Some(page) = self.pages.get_mut(page_number - 1) {
            page.set_visible(visible, now);
        }
    }

    /// Marks the current page and its two neighbours by the intersection
    /// test and everything else as hidden.
    fn refresh_visibility(&mut self, view: &RectF, now: Instant) {
        let current = self.current_page;
        let first = current.saturating_sub(1).max(1);
        let last = (current + 1).min(self.page_count());
        for (index, page) in self.pages.iter_mut().enumerate() {
            let page_number = index + 1;
            if (page_number < first || page_number > last) && page.is_visible() {
                page.set_visible(false, now);
            }
        }

        for page_number in [current, current + 1, current.saturating_sub(1)] {
            let visible = self.page_is_visible(page_number, view);
            self.set_page_visible(page_number, visible, now);
        }
    }

    fn hide_all(&mut self, now: Instant) {
        for page in &mut self.pages {
            page.set_visible(false, now);
        }
    }

    /// Scroll value that brings the current page's top into a view of
    /// `view_height` at `scroll`, moving as little as possible.
    fn ensure_current_visible(&self, scroll: f64, view_height: f64) -> f64 {
        let Some(rect) = self
            .current_page
            .checked_sub(1)
            .and_then(|index| self.page_rects.get(index))
        else {
            return scroll;
        };

        let height = rect.height.min(view_height);
        if rect.y < scroll {
            rect.y
        } else if rect.y + height > scroll + view_height {
            rect.y + height - view_height
        } else {
            scroll
        }
    }
}

/// Lays the pages of the active document on one vertical scroll surface and
/// decides which of them may hold pixels.
///
/// Single-threaded: the host forwards scroll, zoom, resize, page-entry and
/// outline events, and calls [`poll`](Self::poll) from its event loop so the
/// debounced relayout and the delayed page renders can run.
pub struct DocumentViewport<B: RenderBackend, C: Clock = SystemClock> {
    service: DocumentService<B>,
    clock: C,
    config: ViewerConfig,
    books: HashMap<DocId, Book>,
    active: Option<DocId>,
    viewport: SizeF,
    scroll_value: f64,
    last_scroll_value: f64,
    pending_scale: f64,
    relayout_timer: SingleShot,
    relayout_passes: u64,
}

impl<B: RenderBackend> DocumentViewport<B, SystemClock> {
    pub fn with_system_clock(service: DocumentService<B>, config: ViewerConfig) -> Self {
        Self::new(service, config, SystemClock)
    }
}

impl<B: RenderBackend, C: Clock> DocumentViewport<B, C> {
    pub fn new(service: DocumentService<B>, config: ViewerConfig, clock: C) -> Self {
        let relayout_timer = SingleShot::new(config.relayout_delay());
        Self {
            service,
            clock,
            config,
            books: HashMap::new(),
            active: None,
            viewport: SizeF::default(),
            scroll_value: 0.0,
            last_scroll_value: 0.0,
            pending_scale: 1.0,
            relayout_timer,
            relayout_passes: 0,
        }
    }

    pub fn service(&self) -> &DocumentService<B> {
        &self.service
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn active_doc(&self) -> Option<DocId> {
        self.active
    }

    fn active_book(&self) -> Option<&Book> {
        self.books.get(&self.active?)
    }

    fn visible_rect_for(&self) -> RectF {
        RectF::new(
            0.0,
            self.scroll_value,
            self.viewport.width,
            self.viewport.height,
        )
    }

    /// Opens (or switches back to) a document and makes it the active one.
    ///
    /// On failure nothing is built and no document stays active.
    pub fn open_document(
        &mut self,
        path: &Path,
        password: Option<&str>,
        doc_id: DocId,
    ) -> Result<(), OpenError> {
        let now = self.clock.now();
        self.deactivate(now);

        self.service.open(path, password, doc_id)?;

        if !self.books.contains_key(&doc_id) {
            let book = self.build_book();
            crate::debug_log!(
                "[viewport][open] {} built {} pages, {} outline entries",
                doc_id,
                book.page_count(),
                book.outline.len()
            );
            self.books.insert(doc_id, book);
        }

        self.active = Some(doc_id);
        let Some(book) = self.books.get(&doc_id) else {
            return Ok(());
        };
        self.pending_scale = book.scale;
        self.scroll_value = book.scroll;
        self.last_scroll_value = book.scroll;

        let target = book.ensure_current_visible(self.scroll_value, self.viewport.height);
        self.apply_programmatic_scroll(target, now);
        Ok(())
    }

    fn build_book(&self) -> Book {
        let render_delay = self.config.render_delay();
        let pages = (0..self.service.page_count())
            .map(|index| {
                let natural_size = self
                    .service
                    .page_size(index)
                    .filter(|size| size.is_positive())
                    .unwrap_or(FALLBACK_PAGE_SIZE);
                PageItem::new(index, natural_size, self.config.base_zoom, render_delay)
            })
            .collect::<Vec<_>>();

        let mut book = Book {
            current_page: usize::from(!pages.is_empty()),
            pages,
            outline: OutlineTree::build(&self.service, self.config.outline_max_depth),
            scale: 1.0,
            page_rects: Vec::new(),
            scene: SizeF::default(),
            scroll: 0.0,
        };
        book.layout(self.config.page_margin, self.config.page_gap);
        book
    }

    /// Hides the active document's pages and drops its pending relayout.
    fn deactivate(&mut self, now: Instant) {
        if self.relayout_timer.is_armed() {
            self.relayout_timer.cancel();
        }
        let Some(book) = self.active.take().and_then(|id| self.books.get_mut(&id)) else {
            return;
        };
        book.scroll = self.scroll_value;
        book.hide_all(now);
    }

    pub fn close(&mut self) {
        let now = self.clock.now();
        self.deactivate(now);
        self.books.clear();
        self.service.close();
        self.scroll_value = 0.0;
        self.last_scroll_value = 0.0;
        self.pending_scale = 1.0;
    }

    /// Viewport resize from the host. Visibility follows at once; the full
    /// relayout pass is debounced together with zoom.
    pub fn set_viewport_size(&mut self, width: f64, height: f64) {
        let now = self.clock.now();
        self.viewport = SizeF::new(width.max(0.0), height.max(0.0));
        self.scroll_value = self.scroll_value.clamp(0.0, self.scroll_max());
        self.last_scroll_value = self.scroll_value;

        let view = self.visible_rect_for();
        if let Some(book) = self.active.and_then(|id| self.books.get_mut(&id)) {
            book.refresh_visibility(&view, now);
        }
        self.relayout_timer.start(now);
    }

    pub fn viewport_size(&self) -> SizeF {
        self.viewport
    }

    pub fn scene_size(&self) -> SizeF {
        self.active_book().map(|book| book.scene).unwrap_or_default()
    }

    pub fn visible_rect(&self) -> RectF {
        self.visible_rect_for()
    }

    pub fn scroll_value(&self) -> f64 {
        self.scroll_value
    }

    pub fn scroll_min(&self) -> f64 {
        0.0
    }

    pub fn scroll_max(&self) -> f64 {
        (self.scene_size().height - self.viewport.height).max(0.0)
    }

    /// Scroll position change coming from the user (wheel, drag, keys).
    /// Nothing happens if the clamped value equals the current one.
    pub fn scroll_to(&mut self, value: f64) {
        let value = value.clamp(self.scroll_min(), self.scroll_max());
        if value == self.scroll_value {
            return;
        }
        self.scroll_value = value;
        self.on_scroll_changed(value);
    }

    pub fn scroll_by(&mut self, delta: f64) {
        self.scroll_to(self.scroll_value + delta);
    }

    fn on_scroll_changed(&mut self, value: f64) {
        let now = self.clock.now();
        let min = self.scroll_min();
        let max = self.scroll_max();
        let view = self.visible_rect_for();
        let last = self.last_scroll_value;
        let Some(book) = self.active.and_then(|id| self.books.get_mut(&id)) else {
            self.last_scroll_value = value;
            return;
        };
        let page_count = book.page_count();
        if page_count == 0 {
            self.last_scroll_value = value;
            return;
        }

        if value <= min {
            book.current_page = 1;
        } else if value >= max {
            book.current_page = page_count;
        }

        if !book.page_is_visible(book.current_page, &view)
            && let Some(page_number) = book.nearest_visible_page(&view, value > last)
        {
            book.current_page = page_number;
        }

        book.scroll = value;
        book.refresh_visibility(&view, now);
        self.last_scroll_value = value;
    }

    /// Scrolls without re-deriving the current page from the position.
    fn apply_programmatic_scroll(&mut self, target: f64, now: Instant) {
        self.scroll_value = target.clamp(self.scroll_min(), self.scroll_max());
        self.last_scroll_value = self.scroll_value;
        let view = self.visible_rect_for();
        if let Some(book) = self.active.and_then(|id| self.books.get_mut(&id)) {
            book.scroll = self.scroll_value;
            book.refresh_visibility(&view, now);
        }
    }

    pub fn current_page(&self) -> usize {
        self.active_book().map(|book| book.current_page).unwrap_or(0)
    }

    pub fn page_count(&self) -> usize {
        self.active_book().map(Book::page_count).unwrap_or(0)
    }

    pub fn pages(&self) -> &[PageItem] {
        self.active_book()
            .map(|book| book.pages.as_slice())
            .unwrap_or(&[])
    }

    /// Scene rectangle of a 1-based page.
    pub fn page_rect(&self, page_number: usize) -> Option<RectF> {
        let index = page_number.checked_sub(1)?;
        self.active_book()?.page_rects.get(index).copied()
    }

    pub fn page_is_visible(&self, page_number: usize) -> bool {
        let view = self.visible_rect_for();
        self.active_book()
            .is_some_and(|book| book.page_is_visible(page_number, &view))
    }

    /// 1-based numbers of the pages currently allowed to render.
    pub fn render_eligible_pages(&self) -> Vec<usize> {
        self.pages()
            .iter()
            .filter(|page| page.is_visible())
            .map(|page| page.index() + 1)
            .collect()
    }

    pub fn outline(&self) -> Option<&OutlineTree> {
        self.active_book().map(|book| &book.outline)
    }

    pub fn jump_to_page(&mut self, page_number: usize) -> Result<(), NavigationError> {
        let now = self.clock.now();
        let view_height = self.viewport.height;
        let scroll = self.scroll_value;
        let Some(book) = self.active.and_then(|id| self.books.get_mut(&id)) else {
            return Err(NavigationError::NoDocument);
        };

        let page_count = book.page_count();
        if page_number == 0 || page_number > page_count {
            crate::debug_log!(
                "[viewport][jump] rejected page {} of {}",
                page_number,
                page_count
            );
            return Err(NavigationError::PageOutOfRange {
                requested: page_number,
                page_count,
            });
        }

        book.current_page = page_number;
        let target = book.ensure_current_visible(scroll, view_height);
        self.apply_programmatic_scroll(target, now);
        Ok(())
    }

    pub fn next_page(&mut self) -> bool {
        let current = self.current_page();
        current < self.page_count() && self.jump_to_page(current + 1).is_ok()
    }

    pub fn prev_page(&mut self) -> bool {
        let current = self.current_page();
        current > 1 && self.jump_to_page(current - 1).is_ok()
    }

    pub fn first_page(&mut self) -> bool {
        self.jump_to_page(1).is_ok()
    }

    pub fn last_page(&mut self) -> bool {
        let count = self.page_count();
        self.jump_to_page(count).is_ok()
    }

    /// Navigates to the entry's destination. Entries without a usable
    /// destination are ignored. Returns the 1-based page jumped to.
    pub fn on_outline_activated(&mut self, index: ModelIndex) -> Option<usize> {
        let book = self.active_book()?;
        let page_index = book.outline.page_index_for(index, &self.service)?;
        if page_index >= book.page_count() {
            return None;
        }
        self.jump_to_page(page_index + 1).ok()?;
        Some(page_index + 1)
    }

    pub fn scale(&self) -> f64 {
        self.active_book().map(|book| book.scale).unwrap_or(1.0)
    }

    /// Scale shown to the user, applied once the relayout timer fires.
    pub fn pending_scale(&self) -> f64 {
        self.pending_scale
    }

    pub fn zoom_percent(&self) -> u32 {
        (self.pending_scale * 100.0).round() as u32
    }

    pub fn zoom_label(&self) -> String {
        format!("{}%", self.zoom_percent())
    }

    pub fn zoom_in(&mut self) -> bool {
        let next = round_scale(self.pending_scale + self.config.zoom_step).min(self.config.max_scale);
        self.request_scale(next)
    }

    /// Steps below the minimum scale are ignored rather than clamped.
    pub fn zoom_out(&mut self) -> bool {
        let next = round_scale(self.pending_scale - self.config.zoom_step);
        if next < self.config.min_scale - SCALE_EPSILON {
            return false;
        }
        self.request_scale(next)
    }

    pub fn reset_zoom(&mut self) -> bool {
        self.pending_scale = 1.0;
        self.relayout_timer.start(self.clock.now());
        true
    }

    fn request_scale(&mut self, scale: f64) -> bool {
        if (scale - self.pending_scale).abs() < SCALE_EPSILON {
            return false;
        }
        self.pending_scale = scale;
        let generation = self.relayout_timer.start(self.clock.now());
        crate::debug_log!(
            "[viewport][zoom] pending {}%, generation {}",
            self.zoom_percent(),
            generation
        );
        true
    }

    pub fn is_relayout_pending(&self) -> bool {
        self.relayout_timer.is_armed()
    }

    pub fn relayout_generation(&self) -> u64 {
        self.relayout_timer.generation()
    }

    /// Completed relayout passes since construction.
    pub fn relayout_passes(&self) -> u64 {
        self.relayout_passes
    }

    pub fn status(&self) -> ViewerStatus {
        ViewerStatus {
            current_page: self.current_page(),
            page_count: self.page_count(),
            zoom_percent: self.zoom_percent(),
        }
    }

    /// Runs whatever timers are due: first the debounced relayout, then the
    /// delayed renders of the active document's visible pages.
    pub fn poll(&mut self) -> PollOutcome {
        let now = self.clock.now();
        let mut outcome = PollOutcome::default();

        if self.relayout_timer.fire_if_due(now).is_some() {
            outcome.relayout = self.relayout(now);
        }

        if let Some(book) = self.active.and_then(|id| self.books.get_mut(&id)) {
            for page in &mut book.pages {
                if page.poll_render(now, &self.service) {
                    outcome.rendered.push(page.index());
                }
            }
        }
        outcome
    }

    fn relayout(&mut self, now: Instant) -> bool {
        let scale = self.pending_scale;
        let view_height = self.viewport.height;
        let scroll = self.scroll_value;
        let (margin, gap) = (self.config.page_margin, self.config.page_gap);
        let Some(book) = self.active.and_then(|id| self.books.get_mut(&id)) else {
            return false;
        };

        let started_at = Instant::now();
        if (book.scale - scale).abs() < SCALE_EPSILON {
            for page in &mut book.pages {
                page.load_page();
            }
        } else {
            for page in &mut book.pages {
                page.scaled(scale);
            }
            book.scale = scale;
        }
        book.layout(margin, gap);

        let target = book.ensure_current_visible(scroll, view_height);
        self.apply_programmatic_scroll(target, now);
        self.relayout_passes += 1;
        crate::debug_log!(
            "[viewport][relayout] scale {} | {}ms",
            scale,
            started_at.elapsed().as_millis()
        );
        true
    }
}

fn round_scale(scale: f64) -> f64 {
    (scale * 100.0).round() / 100.0
}
