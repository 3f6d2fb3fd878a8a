//! Picks the manual matching the UI language out of a directory.

use crate::i18n::Language;
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

/// Suffix a manual for `language` carries, e.g. `.en_US.pdf`.
pub fn manual_suffix(language: Language) -> String {
    format!(".{}.pdf", language.code())
}

/// First file in `dir`, by name, ending in the language suffix.
pub fn locate_manual(dir: &Path, language: Language) -> Result<Option<PathBuf>> {
    let suffix = manual_suffix(language);
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("cannot list manual directory {}", dir.display()))?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("cannot read entry in {}", dir.display()))?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.len() > suffix.len() && name.ends_with(&suffix) && entry.path().is_file() {
            candidates.push(name);
        }
    }

    candidates.sort();
    let found = candidates.into_iter().next().map(|name| dir.join(name));
    crate::debug_log!(
        "[manual] {} in {}: {:?}",
        language.code(),
        dir.display(),
        found
    );
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"%PDF").unwrap();
    }

    #[test]
    fn picks_first_match_by_name() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "Zeta.en_US.pdf");
        touch(dir.path(), "Alpha.en_US.pdf");
        touch(dir.path(), "Alpha.zh_CN.pdf");
        touch(dir.path(), "notes.txt");

        let found = locate_manual(dir.path(), Language::EnUs).unwrap();
        assert_eq!(found, Some(dir.path().join("Alpha.en_US.pdf")));

        let found = locate_manual(dir.path(), Language::ZhCn).unwrap();
        assert_eq!(found, Some(dir.path().join("Alpha.zh_CN.pdf")));
    }

    #[test]
    fn ignores_bare_suffix_and_directories() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), ".en_US.pdf");
        std::fs::create_dir(dir.path().join("old.en_US.pdf")).unwrap();

        assert_eq!(locate_manual(dir.path(), Language::EnUs).unwrap(), None);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = locate_manual(&dir.path().join("nope"), Language::EnUs).unwrap_err();
        assert!(format!("{err:#}").contains("cannot list manual directory"));
    }
}
