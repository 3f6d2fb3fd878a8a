use crate::document::{DocumentService, RenderBackend};
use crate::geometry::SizeF;
use crate::timer::SingleShot;
use image::RgbaImage;
use image::imageops::{self, FilterType};
use std::time::{Duration, Instant};

const SCALE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// Placeholder only, no pixels held.
    Unrendered,
    /// Interpolated from an earlier render; an exact render is still owed.
    ScaledPreview,
    /// Exact render at the current scale.
    Rendered,
}

/// One page of the continuous view and its lazily rendered bitmap.
///
/// Pixels exist only while the page is visible: hiding a page drops them
/// and the host draws a blank placeholder of [`size`](Self::size) instead.
#[derive(Debug)]
pub struct PageItem {
    index: usize,
    natural_size: SizeF,
    base_zoom: f64,
    scale: f64,
    bitmap: Option<RgbaImage>,
    state: RenderState,
    visible: bool,
    render_timer: SingleShot,
    revision: u64,
    render_count: u64,
}

impl PageItem {
    pub fn new(index: usize, natural_size: SizeF, base_zoom: f64, render_delay: Duration) -> Self {
        Self {
            index,
            natural_size,
            base_zoom,
            scale: 1.0,
            bitmap: None,
            state: RenderState::Unrendered,
            visible: false,
            render_timer: SingleShot::new(render_delay),
            revision: 0,
            render_count: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn natural_size(&self) -> SizeF {
        self.natural_size
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn bitmap(&self) -> Option<&RgbaImage> {
        self.bitmap.as_ref()
    }

    /// Bumped whenever what the host should paint for this page changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    pub fn is_render_pending(&self) -> bool {
        self.render_timer.is_armed()
    }

    /// Size at scale 1.0, the target handed to the renderer.
    pub fn base_size(&self) -> SizeF {
        self.natural_size.scaled(self.base_zoom)
    }

    /// Current bounding size used for layout.
    pub fn size(&self) -> SizeF {
        self.base_size().scaled(self.scale)
    }

    pub fn width(&self) -> f64 {
        self.size().width
    }

    pub fn height(&self) -> f64 {
        self.size().height
    }

    pub fn needs_render(&self) -> bool {
        self.state != RenderState::Rendered
    }

    pub fn set_visible(&mut self, visible: bool, now: Instant) {
        if visible {
            self.visible = true;
            if self.needs_render() && !self.render_timer.is_armed() {
                self.render_timer.start(now);
            }
            return;
        }

        let was_visible = std::mem::replace(&mut self.visible, false);
        if self.render_timer.is_armed() {
            self.render_timer.cancel();
        }
        if was_visible {
            self.release();
        }
    }

    /// Runs the delayed render once its timer is due. Returns whether the
    /// page was rendered.
    pub fn poll_render<B: RenderBackend>(
        &mut self,
        now: Instant,
        service: &DocumentService<B>,
    ) -> bool {
        if self.render_timer.fire_if_due(now).is_none() {
            return false;
        }
        if !self.visible || !self.needs_render() {
            return false;
        }
        self.render(service)
    }

    /// Renders at the current scale right away. On failure the current
    /// bitmap is kept; the next `set_visible(true)` tries again.
    pub fn render<B: RenderBackend>(&mut self, service: &DocumentService<B>) -> bool {
        match service.render_page(self.index, self.base_size(), self.scale) {
            Some(bitmap) => {
                if self.render_timer.is_armed() {
                    self.render_timer.cancel();
                }
                self.bitmap = Some(bitmap);
                self.state = RenderState::Rendered;
                self.render_count += 1;
                self.revision += 1;
                true
            }
            None => false,
        }
    }

    /// Applies a new scale with an interpolated resize of whatever is cached.
    /// The exact render is left to whoever drives visibility afterwards.
    pub fn scaled(&mut self, new_scale: f64) -> bool {
        if (new_scale - self.scale).abs() < SCALE_EPSILON {
            return false;
        }
        self.scale = new_scale;

        if let Some(bitmap) = self.bitmap.take() {
            let (width, height) = self.size().to_pixels();
            self.bitmap = Some(imageops::resize(&bitmap, width, height, FilterType::Triangle));
            self.state = RenderState::ScaledPreview;
            self.revision += 1;
        }
        true
    }

    /// Presents the cached bitmap again without rendering.
    pub fn load_page(&mut self) -> Option<&RgbaImage> {
        self.revision += 1;
        self.bitmap.as_ref()
    }

    fn release(&mut self) {
        if self.bitmap.take().is_some() {
            self.revision += 1;
        }
        self.state = RenderState::Unrendered;
    }
}
