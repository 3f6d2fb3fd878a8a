use anyhow::{Context as _, Result, bail};
use manual_viewer::{
    DocId, DocumentService, DocumentViewport, I18n, Language, PdfiumBackend, ViewerConfig, logger,
    manual,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const CONFIG_ENV: &str = "MANUAL_VIEWER_CONFIG";
const VIEWPORT_WIDTH: f64 = 1280.0;
const VIEWPORT_HEIGHT: f64 = 1024.0;
const RENDER_WAIT: Duration = Duration::from_secs(5);

fn usage() -> String {
    "usage: manual-viewer <manual.pdf | manual-dir> [page] [out.png]".to_string()
}

fn load_config() -> Result<ViewerConfig> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => ViewerConfig::load(Path::new(&path)),
        _ => Ok(ViewerConfig::default()),
    }
}

fn resolve_manual(target: &Path, language: Language) -> Result<PathBuf> {
    if !target.is_dir() {
        return Ok(target.to_path_buf());
    }
    manual::locate_manual(target, language)?.with_context(|| {
        format!(
            "no *{} manual in {}",
            manual::manual_suffix(language),
            target.display()
        )
    })
}

fn print_outline(viewer: &DocumentViewport<PdfiumBackend>, i18n: I18n) {
    let Some(outline) = viewer.outline() else {
        return;
    };
    let mut stack: Vec<(Option<manual_viewer::ModelIndex>, usize)> = vec![(None, 0)];
    while let Some((parent, depth)) = stack.pop() {
        for row in (0..outline.row_count(parent)).rev() {
            let Some(index) = outline.index(row, 0, parent) else {
                continue;
            };
            stack.push((Some(index), depth + 1));
        }
        if let Some(index) = parent {
            let title = outline
                .data(index)
                .filter(|title| !title.is_empty())
                .unwrap_or(i18n.untitled_bookmark);
            println!("{}{}", "  ".repeat(depth - 1), title);
        }
    }
}

fn main() -> Result<()> {
    logger::initialize();
    let language = Language::detect();
    let i18n = I18n::new(language);

    let mut args = std::env::args().skip(1);
    let Some(target) = args.next() else {
        bail!(usage());
    };
    let page: usize = match args.next() {
        Some(raw) => raw.parse().with_context(|| format!("invalid page number: {raw}"))?,
        None => 1,
    };
    let output = args.next().map(PathBuf::from);

    let config = load_config()?;
    config.validate()?;
    let path = resolve_manual(Path::new(&target), language)?;

    let backend = PdfiumBackend::bind(language)?;
    let mut viewer = DocumentViewport::with_system_clock(DocumentService::new(backend), config);
    viewer.set_viewport_size(VIEWPORT_WIDTH, VIEWPORT_HEIGHT);

    if let Err(err) = viewer.open_document(&path, None, DocId(1)) {
        bail!("{} ({err})", i18n.open_status(err.status(), &path));
    }
    println!("{}", i18n.open_status(viewer.service().status(), &path));

    if let Err(err) = viewer.jump_to_page(page) {
        bail!(err.user_message(language));
    }

    let status = viewer.status();
    println!(
        "{} {} | {}",
        status.current_page,
        i18n.page_count_label(status.page_count),
        viewer.zoom_label()
    );
    print_outline(&viewer, i18n);

    let Some(output) = output else {
        return Ok(());
    };

    let started_at = Instant::now();
    loop {
        viewer.poll();
        if let Some(bitmap) = viewer.pages().get(page - 1).and_then(|item| item.bitmap()) {
            bitmap
                .save(&output)
                .with_context(|| format!("cannot write {}", output.display()))?;
            println!("{}", output.display());
            return Ok(());
        }
        if started_at.elapsed() > RENDER_WAIT {
            bail!("page {page} did not render");
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
