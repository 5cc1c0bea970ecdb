use ammonia::Builder;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

static IMAGE_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^https?://.+\.(jpg|jpeg|png|gif|webp)$").expect("Invalid image URL pattern")
});

const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "strong", "em", "u", "s", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "ul",
    "ol", "li", "a", "img", "code", "pre",
];

const ALLOWED_ATTRIBUTES: &[&str] = &["href", "src", "alt", "title", "target", "rel"];

/// Rich-text filter applied to post bodies before they are stored.
pub struct HtmlSanitizer {
    builder: Builder<'static>,
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlSanitizer {
    pub fn new() -> Self {
        let tags: HashSet<&'static str> = ALLOWED_TAGS.iter().copied().collect();
        let attrs: HashSet<&'static str> = ALLOWED_ATTRIBUTES.iter().copied().collect();

        let mut builder = Builder::default();
        builder
            .tags(tags)
            .generic_attributes(attrs)
            .tag_attributes(HashMap::new())
            // ammonia panics when `rel` is allowed and also injected
            .link_rel(None);

        Self { builder }
    }

    pub fn clean(&self, html: &str) -> String {
        self.builder.clean(html).to_string()
    }
}

/// Empty means "no image" and is accepted.
pub fn validate_image_url(url: &str) -> bool {
    if url.is_empty() {
        return true;
    }
    url::Url::parse(url).is_ok() && IMAGE_URL_REGEX.is_match(url)
}
