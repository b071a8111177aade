//! Text normalization and URL scrubbing.

use unicode_normalization::UnicodeNormalization;
use url::Url;

/// Query parameters that only exist to track the sharer.
const TRACKING_PARAMS: &[&str] = &["si", "fbclid", "gclid", "igshid", "ref", "feature"];

/// NFKC-normalize text and collapse runs of whitespace into single spaces.
///
/// Compatibility composition folds fullwidth forms and presentation
/// variants so host and token matching see one spelling.
pub fn normalize_text(text: &str) -> String {
    let composed: String = text.nfkc().collect();
    composed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip tracking query parameters (`utm_*` and the usual share tokens)
/// from a URL. Returns the input unchanged when it does not parse.
pub fn scrub_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        let query = kept
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{}={}", k, v)
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }

    url.to_string()
}

fn is_tracking_param(name: &str) -> bool {
    name.starts_with("utm_") || TRACKING_PARAMS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(normalize_text("  a \t b\n\nc  "), "a b c");
    }

    #[test]
    fn test_nfkc_fullwidth() {
        assert_eq!(normalize_text("ｓｐｏｔｉｆｙ"), "spotify");
    }

    #[test]
    fn test_scrub_tracking_params() {
        assert_eq!(
            scrub_url("https://open.spotify.com/track/abc?si=xyz&utm_source=share"),
            "https://open.spotify.com/track/abc"
        );
    }

    #[test]
    fn test_scrub_keeps_meaningful_params() {
        assert_eq!(
            scrub_url("https://youtube.com/watch?v=dQw4&si=abc"),
            "https://youtube.com/watch?v=dQw4"
        );
    }

    #[test]
    fn test_scrub_passes_through_unparseable() {
        assert_eq!(scrub_url("not a url"), "not a url");
    }
}
