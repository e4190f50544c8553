use std::collections::HashMap;
use std::path::Path;

/// Content type used when an extension is unknown.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Entries layered over the defaults for local web development.
pub const OVERRIDES: &[(&str, &str)] = &[
    (".js", "application/javascript"),
    (".mjs", "application/javascript"),
    (".json", "application/json"),
    (".css", "text/css"),
    (".wasm", "application/wasm"),
    ("", "application/octet-stream"),
];

/// taken from <https://developer.mozilla.org/en-US/docs/Web/HTTP/Guides/MIME_types/Common_types/>
/// NOTE: not exhaustive, only what shows up in a typical front-end build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mime {
    Avif,
    Binary,
    Css,
    Csv,
    GZip,
    Gif,
    Html,
    ICalendar,
    Ico,
    JavaScript,
    Jpeg,
    Json,
    JsonLd,
    Markdown,
    Mp3,
    Mp4,
    Otf,
    Pdf,
    PlainText,
    Png,
    Svg,
    Ttf,
    Wasm,
    Wav,
    Webm,
    Webp,
    Woff,
    Woff2,
    Xml,
    Zip,
}

impl Mime {
    pub const ALL: &'static [Self] = &[
        Self::Avif,
        Self::Binary,
        Self::Css,
        Self::Csv,
        Self::GZip,
        Self::Gif,
        Self::Html,
        Self::ICalendar,
        Self::Ico,
        Self::JavaScript,
        Self::Jpeg,
        Self::Json,
        Self::JsonLd,
        Self::Markdown,
        Self::Mp3,
        Self::Mp4,
        Self::Otf,
        Self::Pdf,
        Self::PlainText,
        Self::Png,
        Self::Svg,
        Self::Ttf,
        Self::Wasm,
        Self::Wav,
        Self::Webm,
        Self::Webp,
        Self::Woff,
        Self::Woff2,
        Self::Xml,
        Self::Zip,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Avif => "image/avif",
            Self::Binary => "application/octet-stream",
            Self::Css => "text/css",
            Self::Csv => "text/csv",
            Self::GZip => "application/gzip",
            Self::Gif => "image/gif",
            Self::Html => "text/html",
            Self::ICalendar => "text/calendar",
            Self::Ico => "image/vnd.microsoft.icon",
            Self::JavaScript => "text/javascript",
            Self::Jpeg => "image/jpeg",
            Self::Json => "application/json",
            Self::JsonLd => "application/ld+json",
            Self::Markdown => "text/markdown",
            Self::Mp3 => "audio/mpeg",
            Self::Mp4 => "video/mp4",
            Self::Otf => "font/otf",
            Self::Pdf => "application/pdf",
            Self::PlainText => "text/plain",
            Self::Png => "image/png",
            Self::Svg => "image/svg+xml",
            Self::Ttf => "font/ttf",
            Self::Wasm => "application/wasm",
            Self::Wav => "audio/wav",
            Self::Webm => "video/webm",
            Self::Webp => "image/webp",
            Self::Woff => "font/woff",
            Self::Woff2 => "font/woff2",
            Self::Xml => "application/xml",
            Self::Zip => "application/zip",
        }
    }

    /// File extensions (without the dot) that map to this type.
    pub const fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Avif => &["avif"],
            Self::Binary => &["bin"],
            Self::Css => &["css"],
            Self::Csv => &["csv"],
            Self::GZip => &["gz"],
            Self::Gif => &["gif"],
            Self::Html => &["html", "htm"],
            Self::ICalendar => &["ics"],
            Self::Ico => &["ico"],
            Self::JavaScript => &["js", "mjs"],
            Self::Jpeg => &["jpeg", "jpg"],
            Self::Json => &["json"],
            Self::JsonLd => &["jsonld"],
            Self::Markdown => &["md"],
            Self::Mp3 => &["mp3"],
            Self::Mp4 => &["mp4"],
            Self::Otf => &["otf"],
            Self::Pdf => &["pdf"],
            Self::PlainText => &["txt"],
            Self::Png => &["png"],
            Self::Svg => &["svg"],
            Self::Ttf => &["ttf"],
            Self::Wasm => &["wasm"],
            Self::Wav => &["wav"],
            Self::Webm => &["webm"],
            Self::Webp => &["webp"],
            Self::Woff => &["woff"],
            Self::Woff2 => &["woff2"],
            Self::Xml => &["xml"],
            Self::Zip => &["zip"],
        }
    }
}

/// Maps extensions (with leading dot, or `""` for none) to content types.
///
/// Built once and shared read-only; lookups are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionTable {
    map: HashMap<String, String>,
}

impl ExtensionTable {
    /// The built-in table derived from [`Mime`].
    pub fn defaults() -> Self {
        let map = Mime::ALL
            .iter()
            .flat_map(|mime| {
                mime.extensions()
                    .iter()
                    .map(move |ext| (format!(".{ext}"), mime.as_str().to_string()))
            })
            .collect();

        Self { map }
    }

    /// Defaults extended with `overrides`; an override replaces any default entry.
    pub fn with_overrides<'a, I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut table = Self::defaults();
        table.map.extend(
            overrides
                .into_iter()
                .map(|(ext, content_type)| (ext.to_string(), content_type.to_string())),
        );
        table
    }

    /// Defaults plus [`OVERRIDES`].
    pub fn dev_server() -> Self {
        Self::with_overrides(OVERRIDES.iter().copied())
    }

    pub fn get(&self, extension: &str) -> Option<&str> {
        self.map.get(extension).map(String::as_str)
    }

    /// Content type for `path`, falling back to [`DEFAULT_CONTENT_TYPE`].
    pub fn content_type(&self, path: &Path) -> &str {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();

        self.get(extension_of(file_name))
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

/// Extension of `file_name` including the dot, or `""`.
///
/// Leading dots don't start an extension, so `.bashrc` has none.
pub fn extension_of(file_name: &str) -> &str {
    let stem_start = file_name.len() - file_name.trim_start_matches('.').len();

    match file_name[stem_start..].rfind('.') {
        Some(dot) => &file_name[stem_start + dot..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_splits_on_last_dot() {
        assert_eq!(extension_of("app.js"), ".js");
        assert_eq!(extension_of("bundle.min.js"), ".js");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("noext"), "");
        assert_eq!(extension_of("trailing."), ".");
    }

    #[test]
    fn dot_files_have_no_extension() {
        assert_eq!(extension_of(".bashrc"), "");
        assert_eq!(extension_of("..hidden"), "");
        assert_eq!(extension_of(".eslintrc.json"), ".json");
    }

    #[test]
    fn overrides_win_over_defaults() {
        let defaults = ExtensionTable::defaults();
        assert_eq!(defaults.get(".js"), Some("text/javascript"));

        let table = ExtensionTable::dev_server();
        assert_eq!(table.get(".js"), Some("application/javascript"));
        assert_eq!(table.get(".mjs"), Some("application/javascript"));
        assert_eq!(table.get(".json"), Some("application/json"));
        assert_eq!(table.get(".css"), Some("text/css"));
        assert_eq!(table.get(".wasm"), Some("application/wasm"));
        assert_eq!(table.get(""), Some("application/octet-stream"));
        // untouched defaults survive
        assert_eq!(table.get(".png"), Some("image/png"));
    }

    #[test]
    fn content_type_resolution() {
        let table = ExtensionTable::dev_server();

        assert_eq!(table.content_type(Path::new("app.js")), "application/javascript");
        assert_eq!(table.content_type(Path::new("data.json")), "application/json");
        assert_eq!(table.content_type(Path::new("noext")), DEFAULT_CONTENT_TYPE);
        assert_eq!(table.content_type(Path::new("dir/index.html")), "text/html");
        assert_eq!(table.content_type(Path::new("x.unknown")), DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let table = ExtensionTable::dev_server();

        assert_eq!(table.content_type(Path::new("style.css")), "text/css");
        assert_eq!(table.content_type(Path::new("style.CSS")), DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn lookup_is_deterministic() {
        let table = ExtensionTable::dev_server();
        let path = Path::new("module.mjs");

        assert_eq!(table.content_type(path), table.content_type(path));
    }

    #[test]
    fn without_empty_override_unknown_still_defaults() {
        let table = ExtensionTable::with_overrides([(".js", "application/javascript")]);

        assert_eq!(table.get(""), None);
        assert_eq!(table.content_type(Path::new("README")), DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn every_default_extension_is_present() {
        let table = ExtensionTable::defaults();

        for mime in Mime::ALL {
            for ext in mime.extensions() {
                assert_eq!(table.get(&format!(".{ext}")), Some(mime.as_str()), "{ext}");
            }
        }
    }
}
