use url::Url;

/// Normalize a parsed URL into its canonical string form.
///
/// Parsing already lower-cases the scheme, drops default ports and resolves
/// dot segments. On top of that this lower-cases the host of any scheme,
/// collapses duplicate slashes in
/// the path, canonicalizes percent-escapes, drops the fragment and an empty
/// query, and sorts query pairs by key. Values are never rewritten, so the
/// result names the same resource, and normalizing the output again is a no-op.
#[must_use]
pub fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();

    normalized.set_fragment(None);

    // The parser only lower-cases hosts of special schemes (http, https, ...)
    let host = normalized.host_str().map(str::to_ascii_lowercase);
    if let Some(host) = host.filter(|h| Some(h.as_str()) != normalized.host_str()) {
        let _ = normalized.set_host(Some(&host));
    }

    let path = collapse_slashes(&normalize_escapes(normalized.path()));
    if path != normalized.path() {
        normalized.set_path(&path);
    }

    if let Some(query) = normalized.query().map(str::to_string) {
        let sorted = sort_query(&normalize_escapes(&query));
        if sorted.is_empty() {
            normalized.set_query(None);
        } else if sorted != query {
            normalized.set_query(Some(&sorted));
        }
    }

    normalized.to_string()
}

/// Upper-case the hex digits of percent-escapes and decode escaped unreserved characters.
fn normalize_escapes(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                let decoded = hi * 16 + lo;
                if is_unreserved(decoded) {
                    out.push(decoded);
                } else {
                    out.push(b'%');
                    out.push(bytes[i + 1].to_ascii_uppercase());
                    out.push(bytes[i + 2].to_ascii_uppercase());
                }
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8(out).unwrap_or_else(|_| input.to_string())
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// RFC 3986 section 2.3.
fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    out
}

/// Sort `&`-separated query pairs by key, keeping pairs with equal keys in
/// their original order. Empty pairs are dropped.
fn sort_query(query: &str) -> String {
    let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
    pairs.sort_by(|a, b| query_key(a).cmp(query_key(b)));
    pairs.join("&")
}

fn query_key(pair: &str) -> &str {
    pair.split_once('=').map_or(pair, |(key, _)| key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(input: &str) -> String {
        normalize_url(&Url::parse(input).unwrap())
    }

    #[test]
    fn test_lowercase_scheme_and_host() {
        assert_eq!(normalize("HTTP://EXAMPLE.COM/Path"), "http://example.com/Path");
    }

    #[test]
    fn test_lowercase_host_of_non_special_scheme() {
        assert_eq!(normalize("foo://EXAMPLE.com/X"), "foo://example.com/X");
        assert_eq!(normalize("git://Example.COM:9418/repo"), "git://example.com:9418/repo");
        assert_eq!(
            normalize("foo://EXAMPLE.com/x"),
            normalize("foo://example.com/x")
        );
    }

    #[test]
    fn test_keeps_scheme() {
        assert_eq!(normalize("http://example.com/"), "http://example.com/");
    }

    #[test]
    fn test_remove_default_port() {
        assert_eq!(normalize("https://example.com:443/a"), "https://example.com/a");
        assert_eq!(normalize("https://example.com:8443/a"), "https://example.com:8443/a");
    }

    #[test]
    fn test_remove_dot_segments() {
        assert_eq!(normalize("https://example.com/a/./b/../c"), "https://example.com/a/c");
    }

    #[test]
    fn test_collapse_duplicate_slashes() {
        assert_eq!(normalize("https://example.com//a///b/"), "https://example.com/a/b/");
    }

    #[test]
    fn test_remove_fragment() {
        assert_eq!(normalize("https://example.com/page#section"), "https://example.com/page");
    }

    #[test]
    fn test_sort_query_by_key() {
        assert_eq!(
            normalize("https://example.com/search?q=rust&a=2&a=1"),
            "https://example.com/search?a=2&a=1&q=rust"
        );
    }

    #[test]
    fn test_drop_empty_query() {
        assert_eq!(normalize("https://example.com/path?"), "https://example.com/path");
        assert_eq!(normalize("https://example.com/p?&&b=1&"), "https://example.com/p?b=1");
    }

    #[test]
    fn test_escape_normalization() {
        assert_eq!(normalize("https://example.com/%7euser/%2f"), "https://example.com/~user/%2F");
        assert_eq!(normalize("https://example.com/a?x=%41%3d"), "https://example.com/a?x=A%3D");
    }

    #[test]
    fn test_trailing_slash_preserved() {
        assert_eq!(normalize("https://example.com/dir/"), "https://example.com/dir/");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "HTTPS://Example.COM:443//a/./b/../%7ec//d?z=1&&a=%2f&m#frag",
            "http://example.com/",
            "https://sub.example.co.uk/path?b=2&a=1&a=0",
            "https://example.com/%E2%9C%93?q=%e2%9c%93",
            "https://example.com/with%20space",
            "foo://MiXeD.Example.com//a?b=1&a=2",
        ];
        for input in inputs {
            let once = normalize(input);
            let twice = normalize(&once);
            assert_eq!(once, twice, "normalization of {input} is not a fixed point");
        }
    }

    #[test]
    fn test_normalize_escapes_leaves_truncated_escape() {
        assert_eq!(normalize_escapes("abc%4"), "abc%4");
        assert_eq!(normalize_escapes("%zz"), "%zz");
    }
}
