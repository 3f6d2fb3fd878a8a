use crate::document::DocumentStatus;
use rust_embed::RustEmbed;
use serde::Deserialize;
use std::ops::Deref;
use std::path::Path;
use std::sync::OnceLock;

#[derive(RustEmbed)]
#[folder = "assets/i18n/"]
#[include = "*.json"]
struct LocaleAssets;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Language {
    ZhCn,
    EnUs,
}

impl Language {
    pub fn detect() -> Self {
        if let Some(locale_tag) = sys_locale::get_locale() {
            return Self::from_locale_tag(&locale_tag);
        }

        Self::EnUs
    }

    pub fn from_locale_tag(raw: &str) -> Self {
        let tag = raw.trim().to_ascii_lowercase();
        if tag.is_empty() {
            return Self::EnUs;
        }

        let is_chinese = tag.starts_with("zh")
            || tag == "cn"
            || tag.starts_with("cn_")
            || tag.starts_with("cn-")
            || tag.contains("_zh")
            || tag.contains("-zh");
        if is_chinese {
            return Self::ZhCn;
        }

        Self::EnUs
    }

    /// Tag used in locale file names and manual file suffixes.
    pub fn code(self) -> &'static str {
        match self {
            Self::ZhCn => "zh_CN",
            Self::EnUs => "en_US",
        }
    }

    fn file_name(self) -> String {
        format!("{}.json", self.code())
    }
}

macro_rules! locale_message_fields {
    ($macro:ident) => {
        $macro! {
            open_success,
            open_not_loaded,
            open_file_not_found,
            open_file_error,
            open_format_error,
            open_password_error,
            open_handler_error,
            page_out_of_range,
            page_count_label,
            untitled_bookmark,
            pdfium_not_found,
        }
    };
}

macro_rules! define_raw_locale_messages {
    ($($field:ident),+ $(,)?) => {
        #[derive(Debug, Deserialize)]
        #[serde(deny_unknown_fields)]
        struct RawLocaleMessages {
            $(
                $field: String,
            )+
        }
    };
}

macro_rules! define_locale_messages {
    ($($field:ident),+ $(,)?) => {
        #[derive(Debug)]
        pub struct LocaleMessages {
            $(
                pub $field: &'static str,
            )+
        }
    };
}

macro_rules! impl_from_raw_locale_messages {
    ($($field:ident),+ $(,)?) => {
        impl From<RawLocaleMessages> for LocaleMessages {
            fn from(raw: RawLocaleMessages) -> Self {
                Self {
                    $(
                        $field: leak_str(raw.$field),
                    )+
                }
            }
        }
    };
}

locale_message_fields!(define_raw_locale_messages);
locale_message_fields!(define_locale_messages);
locale_message_fields!(impl_from_raw_locale_messages);

fn leak_str(value: String) -> &'static str {
    Box::leak(value.into_boxed_str())
}

static ZH_CN_MESSAGES: OnceLock<LocaleMessages> = OnceLock::new();
static EN_US_MESSAGES: OnceLock<LocaleMessages> = OnceLock::new();

#[derive(Clone, Copy, Debug)]
pub struct I18n {
    messages: &'static LocaleMessages,
}

impl I18n {
    pub fn new(lang: Language) -> Self {
        Self {
            messages: messages_for(lang),
        }
    }

    pub fn page_out_of_range(self, page_count: usize) -> String {
        format_template(
            self.page_out_of_range,
            &[("page_count", page_count.to_string())],
        )
    }

    pub fn page_count_label(self, page_count: usize) -> String {
        format_template(
            self.page_count_label,
            &[("page_count", page_count.to_string())],
        )
    }

    /// User-facing text for the result of the last open request.
    pub fn open_status(self, status: DocumentStatus, path: &Path) -> String {
        let template = match status {
            DocumentStatus::NotLoaded => self.open_not_loaded,
            DocumentStatus::Success => self.open_success,
            DocumentStatus::FileError => self.open_file_error,
            DocumentStatus::FormatError => self.open_format_error,
            DocumentStatus::PasswordError => self.open_password_error,
            DocumentStatus::HandlerError => self.open_handler_error,
            DocumentStatus::FileNotFoundError => self.open_file_not_found,
        };
        format_template(template, &[("path", path.to_string_lossy().to_string())])
    }
}

impl Deref for I18n {
    type Target = LocaleMessages;

    fn deref(&self) -> &Self::Target {
        self.messages
    }
}

fn messages_for(lang: Language) -> &'static LocaleMessages {
    match lang {
        Language::ZhCn => ZH_CN_MESSAGES.get_or_init(|| load_messages(Language::ZhCn)),
        Language::EnUs => EN_US_MESSAGES.get_or_init(|| load_messages(Language::EnUs)),
    }
}

fn load_messages(lang: Language) -> LocaleMessages {
    match try_load_messages(lang) {
        Ok(messages) => messages,
        Err(primary_err) => {
            crate::debug_log!("[i18n] failed to load {}: {}", lang.file_name(), primary_err);

            if lang == Language::EnUs {
                panic!(
                    "failed to load embedded i18n file {}: {}",
                    lang.file_name(),
                    primary_err
                );
            }

            match try_load_messages(Language::EnUs) {
                Ok(messages) => {
                    crate::debug_log!(
                        "[i18n] fallback to {} after {} failed",
                        Language::EnUs.file_name(),
                        lang.file_name()
                    );
                    messages
                }
                Err(fallback_err) => panic!(
                    "failed to load embedded i18n files {} ({}) and {} ({})",
                    lang.file_name(),
                    primary_err,
                    Language::EnUs.file_name(),
                    fallback_err
                ),
            }
        }
    }
}

fn try_load_messages(lang: Language) -> Result<LocaleMessages, String> {
    let file_name = lang.file_name();
    let file = LocaleAssets::get(&file_name)
        .ok_or_else(|| format!("{file_name} is not embedded"))?;
    let raw = std::str::from_utf8(&file.data)
        .map_err(|err| format!("{file_name} is not utf-8: {err}"))?;

    serde_json::from_str::<RawLocaleMessages>(raw)
        .map(LocaleMessages::from)
        .map_err(|err| format!("{file_name} parse failed: {err}"))
}

fn format_template(template: &str, vars: &[(&str, String)]) -> String {
    let mut output = template.to_string();
    for (key, value) in vars {
        let token = format!("{{{key}}}");
        output = output.replace(&token, value);
    }
    output
}
