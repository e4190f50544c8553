//! Static file responder.
//!
//! Resolves request targets below a root directory and answers with the file's
//! bytes, an `index.html`, or a generated directory listing. Content types come
//! from an injected [`ExtensionTable`].

use std::fs::{self, File, Metadata};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jiff::Timestamp;

use crate::http::{
    Body, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpStatus, http_date,
    parse_http_date,
};
use crate::mime::ExtensionTable;

const INDEX_FILES: [&str; 2] = ["index.html", "index.htm"];

#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    extensions: Arc<ExtensionTable>,
}

impl StaticFiles {
    pub fn new(root: PathBuf, extensions: Arc<ExtensionTable>) -> Self {
        Self { root, extensions }
    }

    /// Answers one request. Failures become error statuses, never panics.
    pub fn respond(&self, request: &HttpRequest) -> HttpResponse {
        match request.method {
            HttpMethod::Get => self.serve(request),
            HttpMethod::Head => self.serve(request).without_body(),
            HttpMethod::Other(_) => HttpResponse::error(HttpStatus::NotImplemented),
        }
    }

    fn serve(&self, request: &HttpRequest) -> HttpResponse {
        let (url_path, query) = split_target(&request.uri);

        let Some(path) = self.translate_path(url_path) else {
            return HttpResponse::error(HttpStatus::BadRequest);
        };

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) => return HttpResponse::error(status_for(&err)),
        };

        if metadata.is_dir() {
            if !url_path.ends_with('/') {
                return redirect_to_directory(url_path, query);
            }

            for index in INDEX_FILES {
                let index_path = path.join(index);
                if let Ok(index_metadata) = fs::metadata(&index_path) {
                    if index_metadata.is_file() {
                        return self.serve_file(&index_path, &index_metadata, request);
                    }
                }
            }

            return list_directory(&path, url_path);
        }

        // a trailing slash only makes sense for directories
        if url_path.ends_with('/') {
            return HttpResponse::error(HttpStatus::NotFound);
        }

        self.serve_file(&path, &metadata, request)
    }

    /// Maps a URL path onto the filesystem below the root.
    ///
    /// `..` segments pop earlier segments and can never climb above the root.
    /// Returns `None` for paths that don't decode to valid UTF-8 or contain NUL.
    pub fn translate_path(&self, url_path: &str) -> Option<PathBuf> {
        let decoded = urlencoding::decode(url_path).ok()?;
        if decoded.contains('\0') {
            return None;
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in decoded.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                _ if segment.contains('\\') => {}
                _ => segments.push(segment),
            }
        }

        Some(segments.iter().fold(self.root.clone(), |path, segment| path.join(segment)))
    }

    fn serve_file(&self, path: &Path, metadata: &Metadata, request: &HttpRequest) -> HttpResponse {
        let last_modified = metadata
            .modified()
            .ok()
            .and_then(|modified| Timestamp::try_from(modified).ok())
            .and_then(|ts| Timestamp::from_second(ts.as_second()).ok());

        let mut headers = HttpHeaders::new();
        if let Some(modified) = last_modified {
            headers.insert("Last-Modified".to_string(), http_date(modified));

            if is_not_modified(request, modified) {
                return HttpResponse::new(HttpStatus::NotModified, Some(headers), None);
            }
        }

        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => return HttpResponse::error(status_for(&err)),
        };
        let body = Body::File {
            file,
            len: metadata.len(),
        };

        headers.insert(
            "Content-Type".to_string(),
            self.extensions.content_type(path).to_string(),
        );

        HttpResponse::new(HttpStatus::Ok, Some(headers), Some(body))
    }
}

fn is_not_modified(request: &HttpRequest, modified: Timestamp) -> bool {
    // If-None-Match takes precedence and is not supported, so it disables the check
    if request.header("If-None-Match").is_some() {
        return false;
    }

    request
        .header("If-Modified-Since")
        .and_then(parse_http_date)
        .is_some_and(|since| modified <= since)
}

fn split_target(target: &str) -> (&str, Option<&str>) {
    let target = target.split_once('#').map_or(target, |(before, _)| before);

    match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    }
}

fn status_for(err: &io::Error) -> HttpStatus {
    match err.kind() {
        ErrorKind::PermissionDenied => HttpStatus::Forbidden,
        ErrorKind::NotFound | ErrorKind::NotADirectory | ErrorKind::InvalidInput => {
            HttpStatus::NotFound
        }
        _ => HttpStatus::InternalServerError,
    }
}

fn redirect_to_directory(url_path: &str, query: Option<&str>) -> HttpResponse {
    let location = match query {
        Some(query) => format!("{url_path}/?{query}"),
        None => format!("{url_path}/"),
    };

    let mut headers = HttpHeaders::new();
    headers.insert("Location".to_string(), location);

    HttpResponse::new(
        HttpStatus::MovedPermanently,
        Some(headers),
        Some(Vec::new().into()),
    )
}

struct ListingEntry {
    display: String,
    link: String,
}

fn list_directory(dir: &Path, url_path: &str) -> HttpResponse {
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(err) => return HttpResponse::error(status_for(&err)),
    };

    let mut names: Vec<String> = read_dir
        .flatten()
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort_by_key(|name| name.to_lowercase());

    let entries = names.into_iter().map(|name| {
        let full_path = dir.join(&name);
        let encoded = urlencoding::encode(&name).into_owned();

        let mut entry = ListingEntry {
            display: name.clone(),
            link: encoded.clone(),
        };
        if full_path.is_dir() {
            entry.display = format!("{name}/");
            entry.link = format!("{encoded}/");
        }
        if full_path.is_symlink() {
            entry.display = format!("{name}@");
        }
        entry
    });

    let display_path = urlencoding::decode(url_path)
        .map_or_else(|_| url_path.to_string(), |decoded| decoded.into_owned());
    let title = format!("Directory listing for {}", escape_html(&display_path));

    let mut html = format!(
        "<!DOCTYPE HTML>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n<hr>\n<ul>\n"
    );
    for entry in entries {
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            escape_html(&entry.link),
            escape_html(&entry.display)
        ));
    }
    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");

    let mut headers = HttpHeaders::new();
    headers.insert(
        "Content-Type".to_string(),
        "text/html; charset=utf-8".to_string(),
    );

    HttpResponse::new(HttpStatus::Ok, Some(headers), Some(html.into_bytes().into()))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpVersion;
    use std::io::Read;
    use tempfile::TempDir;

    fn responder() -> (TempDir, StaticFiles) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.js"), "console.log(1);").unwrap();
        fs::write(dir.path().join("data.json"), "{\"a\":1}").unwrap();
        fs::write(dir.path().join("noext"), [0u8, 159, 146, 150]).unwrap();
        fs::create_dir(dir.path().join("assets")).unwrap();
        fs::write(dir.path().join("assets").join("style.css"), "body{}").unwrap();

        let files = StaticFiles::new(
            dir.path().to_path_buf(),
            Arc::new(ExtensionTable::dev_server()),
        );
        (dir, files)
    }

    fn get(files: &StaticFiles, uri: &str) -> HttpResponse {
        files.respond(&HttpRequest::new(HttpMethod::Get, uri, HttpVersion::HTTP1_1))
    }

    fn body_bytes(response: &HttpResponse) -> Vec<u8> {
        match &response.body {
            Some(Body::Bytes(bytes)) => bytes.clone(),
            Some(Body::File { file, .. }) => {
                let mut reader: &File = file;
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes).unwrap();
                bytes
            }
            None => Vec::new(),
        }
    }

    fn body_text(response: &HttpResponse) -> String {
        String::from_utf8(body_bytes(response)).unwrap()
    }

    #[test]
    fn serves_files_with_table_content_types() {
        let (_dir, files) = responder();

        let response = get(&files, "/app.js");
        assert_eq!(response.status, HttpStatus::Ok);
        assert_eq!(response.header("Content-Type"), Some("application/javascript"));
        assert_eq!(body_text(&response), "console.log(1);");

        let response = get(&files, "/data.json");
        assert_eq!(response.header("Content-Type"), Some("application/json"));

        let response = get(&files, "/noext");
        assert_eq!(response.header("Content-Type"), Some("application/octet-stream"));
        assert!(matches!(response.body, Some(Body::File { len: 4, .. })));
        assert_eq!(body_bytes(&response), [0u8, 159, 146, 150]);
    }

    #[test]
    fn missing_file_is_404() {
        let (_dir, files) = responder();
        assert_eq!(get(&files, "/nope.js").status, HttpStatus::NotFound);
        assert_eq!(get(&files, "/app.js/").status, HttpStatus::NotFound);
    }

    #[test]
    fn head_has_headers_but_no_body() {
        let (_dir, files) = responder();
        let request = HttpRequest::new(HttpMethod::Head, "/app.js", HttpVersion::HTTP1_0);

        let response = files.respond(&request);
        assert_eq!(response.status, HttpStatus::Ok);
        assert_eq!(response.header("Content-Length"), Some("15"));
        assert!(response.body.is_none());
    }

    #[test]
    fn unsupported_method_is_501() {
        let (_dir, files) = responder();
        let request = HttpRequest::new(
            HttpMethod::Other("POST".to_string()),
            "/app.js",
            HttpVersion::HTTP1_1,
        );

        assert_eq!(files.respond(&request).status, HttpStatus::NotImplemented);
    }

    #[test]
    fn directory_without_slash_redirects() {
        let (_dir, files) = responder();

        let response = get(&files, "/assets?v=1");
        assert_eq!(response.status, HttpStatus::MovedPermanently);
        assert_eq!(response.header("Location"), Some("/assets/?v=1"));
    }

    #[test]
    fn directory_listing() {
        let (dir, files) = responder();
        fs::write(dir.path().join("a <b>.txt"), "x").unwrap();

        let response = get(&files, "/");
        assert_eq!(response.status, HttpStatus::Ok);
        assert_eq!(response.header("Content-Type"), Some("text/html; charset=utf-8"));

        let html = body_text(&response);
        assert!(html.contains("<title>Directory listing for /</title>"));
        assert!(html.contains("<a href=\"assets/\">assets/</a>"));
        assert!(html.contains("<a href=\"a%20%3Cb%3E.txt\">a &lt;b&gt;.txt</a>"));

        let app = html.find("app.js").unwrap();
        let assets = html.find("assets/").unwrap();
        let data = html.find("data.json").unwrap();
        assert!(app < assets && assets < data);
    }

    #[test]
    fn directory_index_is_served() {
        let (dir, files) = responder();
        fs::write(dir.path().join("assets").join("index.html"), "<p>hi</p>").unwrap();

        let response = get(&files, "/assets/");
        assert_eq!(response.header("Content-Type"), Some("text/html"));
        assert_eq!(body_text(&response), "<p>hi</p>");
    }

    #[test]
    fn query_and_fragment_are_ignored() {
        let (_dir, files) = responder();

        let response = get(&files, "/assets/style.css?v=3#top");
        assert_eq!(response.status, HttpStatus::Ok);
        assert_eq!(response.header("Content-Type"), Some("text/css"));
    }

    #[test]
    fn paths_cannot_escape_root() {
        let (dir, files) = responder();

        assert_eq!(
            files.translate_path("/../../etc/passwd"),
            Some(dir.path().join("etc").join("passwd"))
        );
        assert_eq!(
            files.translate_path("/assets/%2e%2e/app.js"),
            Some(dir.path().join("app.js"))
        );
        assert_eq!(files.translate_path("/bad%00name"), None);
        assert_eq!(files.translate_path("/bad%FF"), None);
        assert_eq!(get(&files, "/bad%FF").status, HttpStatus::BadRequest);
    }

    #[test]
    fn percent_encoded_names_resolve() {
        let (dir, files) = responder();
        fs::write(dir.path().join("my file.txt"), "spaced").unwrap();

        let response = get(&files, "/my%20file.txt");
        assert_eq!(body_text(&response), "spaced");
        assert_eq!(response.header("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn if_modified_since_yields_304() {
        let (_dir, files) = responder();
        let first = get(&files, "/app.js");
        let last_modified = first.header("Last-Modified").unwrap().to_string();

        let request = HttpRequest::new(HttpMethod::Get, "/app.js", HttpVersion::HTTP1_1)
            .with_header("If-Modified-Since", &last_modified);
        let response = files.respond(&request);
        assert_eq!(response.status, HttpStatus::NotModified);
        assert!(response.body.is_none());

        let stale = HttpRequest::new(HttpMethod::Get, "/app.js", HttpVersion::HTTP1_1)
            .with_header("If-Modified-Since", "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(files.respond(&stale).status, HttpStatus::Ok);
    }

    #[test]
    fn escape_html_covers_markup() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#x27;");
    }
}
