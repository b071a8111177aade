//! URL extraction from message text and message-kind classification.

use crate::{MessageKind, Providers};
use url::Url;

/// Pull http(s) URLs out of free text.
///
/// Tokens are split on whitespace; trailing punctuation that chat users
/// commonly glue onto links is trimmed before parsing.
pub fn extract_urls(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|token| token.starts_with("http://") || token.starts_with("https://"))
        .map(|token| token.trim_end_matches(['.', ',', ';', ')', ']', '!', '?']))
        .filter(|token| Url::parse(token).is_ok())
        .map(str::to_string)
        .collect()
}

/// Classify a normalized message.
///
/// A streaming URI token or a streaming-host URL wins; otherwise any
/// known foreign music host; otherwise free text.
pub fn classify(text: &str, urls: &[String], providers: &Providers) -> MessageKind {
    let has_uri_token = text
        .split_whitespace()
        .any(|token| token.starts_with(&providers.streaming_uri_prefix));

    if has_uri_token || urls.iter().any(|u| url_host_matches(u, |h| providers.is_streaming_host(h)))
    {
        return MessageKind::StreamingLink;
    }

    if urls
        .iter()
        .any(|u| url_host_matches(u, |h| providers.is_foreign_host(h)))
    {
        return MessageKind::ForeignMusicLink;
    }

    MessageKind::FreeText
}

fn url_host_matches(raw: &str, pred: impl Fn(&str) -> bool) -> bool {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| pred(h)))
        .unwrap_or(false)
}
