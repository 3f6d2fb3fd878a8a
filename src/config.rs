use anyhow::{Context as _, Result, bail};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const PAGE_MARGIN: f64 = 10.0;
const PAGE_GAP: f64 = 20.0;
const BASE_ZOOM: f64 = 1.5;
const RENDER_DELAY_MS: u64 = 100;
const RELAYOUT_DELAY_MS: u64 = 800;
const ZOOM_STEP: f64 = 0.1;
const ZOOM_MIN: f64 = 0.1;
const ZOOM_MAX: f64 = 5.0;
const OUTLINE_MAX_DEPTH: usize = 64;

/// Tunables of the viewer engine.
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// Left and top offset of the page column on the canvas.
    pub page_margin: f64,
    /// Vertical gap after every page.
    pub page_gap: f64,
    /// Pixels per document point at scale 1.0.
    pub base_zoom: f64,
    pub render_delay_ms: u64,
    /// Debounce window for zoom and resize.
    pub relayout_delay_ms: u64,
    pub zoom_step: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub outline_max_depth: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            page_margin: PAGE_MARGIN,
            page_gap: PAGE_GAP,
            base_zoom: BASE_ZOOM,
            render_delay_ms: RENDER_DELAY_MS,
            relayout_delay_ms: RELAYOUT_DELAY_MS,
            zoom_step: ZOOM_STEP,
            min_scale: ZOOM_MIN,
            max_scale: ZOOM_MAX,
            outline_max_depth: OUTLINE_MAX_DEPTH,
        }
    }
}

impl ViewerConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw).context("viewer config parse failed")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read viewer config {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("invalid viewer config {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_zoom > 0.0) {
            bail!("base_zoom must be positive, got {}", self.base_zoom);
        }
        if !(self.zoom_step > 0.0) {
            bail!("zoom_step must be positive, got {}", self.zoom_step);
        }
        if !(self.min_scale > 0.0) || self.max_scale < self.min_scale {
            bail!(
                "scale bounds must satisfy 0 < min_scale <= max_scale, got {}..{}",
                self.min_scale,
                self.max_scale
            );
        }
        if self.page_margin < 0.0 || self.page_gap < 0.0 {
            bail!("page_margin and page_gap cannot be negative");
        }
        if self.outline_max_depth == 0 {
            bail!("outline_max_depth must be at least 1");
        }
        Ok(())
    }

    pub fn render_delay(&self) -> Duration {
        Duration::from_millis(self.render_delay_ms)
    }

    pub fn relayout_delay(&self) -> Duration {
        Duration::from_millis(self.relayout_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ViewerConfig::from_json_str(r#"{ "page_gap": 8.0, "render_delay_ms": 50 }"#)
            .unwrap();
        assert_eq!(config.page_gap, 8.0);
        assert_eq!(config.render_delay(), Duration::from_millis(50));
        assert_eq!(config.relayout_delay(), Duration::from_millis(800));
        assert_eq!(config.base_zoom, BASE_ZOOM);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_bounds() {
        assert!(ViewerConfig::from_json_str(r#"{ "zoom": 2 }"#).is_err());
        assert!(ViewerConfig::from_json_str(r#"{ "min_scale": 2.0, "max_scale": 1.0 }"#).is_err());
        assert!(ViewerConfig::from_json_str(r#"{ "base_zoom": 0 }"#).is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "max_scale": 3.0 }}"#).unwrap();
        let config = ViewerConfig::load(file.path()).unwrap();
        assert_eq!(config.max_scale, 3.0);

        let missing = file.path().with_extension("missing");
        let err = ViewerConfig::load(&missing).unwrap_err();
        assert!(format!("{err:#}").contains("cannot read viewer config"));
    }
}
