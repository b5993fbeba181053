//! Line grammar for `.gitmodules`: section headers and `url = value` assignments

use serde::Serialize;

/// Shape of a submodule URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlScheme {
    /// scp-like `[user@]host:owner/repo[.git]`
    SshShorthand,
    /// `ssh://[user@]host[:port]/owner/repo[.git]`
    SshUri,
    /// `https://...`
    Https,
    /// Anything else, including local paths; never rewritten
    Other,
}

/// One `url` assignment found in a `.gitmodules` file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmoduleUrlEntry {
    /// Name from the enclosing `[submodule "<name>"]` header
    pub name: Option<String>,
    /// URL exactly as written in the file
    pub url: String,
    /// Classification of `url`
    pub scheme: UrlScheme,
    /// HTTPS replacement, when the URL is rewritable
    pub rewritten: Option<String>,
    /// 1-based line number
    pub line: usize,
}

/// A `url = value` line split into the parts kept verbatim and the value
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UrlAssignment<'a> {
    /// Indentation, key, separator and opening quote
    pub head: &'a str,
    /// The URL itself
    pub value: &'a str,
    /// Closing quote, trailing whitespace and comment
    pub tail: &'a str,
}

/// Parse a `[submodule "name"]` header, returning the name
pub(crate) fn section_name(line: &str) -> Option<Option<String>> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('[')?;
    let end = inner.find(']')?;
    let inner = inner[..end].trim();

    let name = inner
        .strip_prefix("submodule")
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix('"'))
        .and_then(|rest| rest.strip_suffix('"'))
        .map(str::to_string);

    Some(name)
}

/// Parse a line (without its line ending) as a `url` assignment
pub(crate) fn url_assignment(line: &str) -> Option<UrlAssignment<'_>> {
    let indent = line.len() - line.trim_start().len();
    let rest = &line[indent..];

    if !rest.get(..3)?.eq_ignore_ascii_case("url") {
        return None;
    }
    let after_key = &rest[3..];
    let after_ws = after_key.trim_start_matches([' ', '\t']);
    let after_eq = after_ws.strip_prefix('=')?;
    let value_region = after_eq.trim_start_matches([' ', '\t']);
    let value_start = line.len() - value_region.len();

    if let Some(quoted) = value_region.strip_prefix('"') {
        if let Some(close) = closing_quote(quoted) {
            let value_start = value_start + 1;
            let value_end = value_start + close;
            return Some(UrlAssignment {
                head: &line[..value_start],
                value: &line[value_start..value_end],
                tail: &line[value_end..],
            });
        }
        // unterminated quote: keep the whole region as the value
        return Some(UrlAssignment {
            head: &line[..value_start],
            value: value_region,
            tail: "",
        });
    }

    let comment = value_region.find(['#', ';']).unwrap_or(value_region.len());
    let value = value_region[..comment].trim_end();
    let value_end = value_start + value.len();

    Some(UrlAssignment {
        head: &line[..value_start],
        value,
        tail: &line[value_end..],
    })
}

fn closing_quote(quoted: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in quoted.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => return Some(i),
            _ => escaped = false,
        }
    }
    None
}

/// Classify a submodule URL
pub fn classify_url(url: &str) -> UrlScheme {
    if url.is_empty()
        || url.ends_with('\\')
        || url.contains('"')
        || url.contains(char::is_whitespace)
    {
        return UrlScheme::Other;
    }

    let lower = url.to_ascii_lowercase();
    if lower.starts_with("https://") {
        return UrlScheme::Https;
    }
    if lower.starts_with("ssh://") {
        return if ssh_uri_parts(url).is_some() {
            UrlScheme::SshUri
        } else {
            UrlScheme::Other
        };
    }
    if url.contains("://") {
        return UrlScheme::Other;
    }
    if shorthand_parts(url).is_some() {
        UrlScheme::SshShorthand
    } else {
        UrlScheme::Other
    }
}

/// HTTPS form of an SSH URL, `None` for anything that is not rewritten
pub fn https_equivalent(url: &str) -> Option<String> {
    let (host, path) = match classify_url(url) {
        UrlScheme::SshShorthand => shorthand_parts(url)?,
        UrlScheme::SshUri => ssh_uri_parts(url)?,
        UrlScheme::Https | UrlScheme::Other => return None,
    };
    Some(format!("https://{}/{}", host, path))
}

/// Split `[user@]host:owner/repo[.git]` into host and `owner/repo`
fn shorthand_parts(url: &str) -> Option<(String, String)> {
    let (host_part, path) = url.split_once(':')?;
    if host_part.contains('/') {
        return None;
    }
    let host = host_part.rsplit('@').next().unwrap_or(host_part);
    // `C:\src` or `C:/src` is a Windows path, not a host
    if host.is_empty() || (host.len() == 1 && host_part.len() == 1) {
        return None;
    }
    let path = repo_path(path.trim_start_matches('/'))?;
    Some((host.to_string(), path))
}

/// Split `ssh://[user@]host[:port]/owner/repo[.git]` into host and `owner/repo`
fn ssh_uri_parts(url: &str) -> Option<(String, String)> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str().filter(|h| !h.is_empty())?;
    let path = repo_path(parsed.path().trim_start_matches('/'))?;
    Some((host.to_string(), path))
}

/// Validate an `owner/repo[.git]` path and drop the `.git` suffix
fn repo_path(path: &str) -> Option<String> {
    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    Some(path.to_string())
}
