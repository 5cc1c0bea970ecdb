use once_cell::sync::Lazy;
use regex::Regex;

pub const EXCERPT_LENGTH: usize = 300;
pub const WORDS_PER_MINUTE: usize = 200;

static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("Invalid tag pattern"));

pub fn strip_tags(html: &str) -> String {
    TAG_REGEX.replace_all(html, "").into_owned()
}

/// Plain-text summary of a post body, cut at 300 characters.
pub fn generate_excerpt(content: &str) -> String {
    let plain = strip_tags(content);
    let plain = plain.trim();
    if plain.chars().count() > EXCERPT_LENGTH {
        let cut: String = plain.chars().take(EXCERPT_LENGTH).collect();
        format!("{}...", cut)
    } else {
        plain.to_string()
    }
}

/// Estimated minutes to read, never less than one.
pub fn reading_time(content: &str) -> u32 {
    let words = strip_tags(content).split_whitespace().count().max(1);
    words.div_ceil(WORDS_PER_MINUTE) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_strips_markup() {
        assert_eq!(generate_excerpt("<p>Hello <b>there</b></p>  "), "Hello there");
    }

    #[test]
    fn test_excerpt_truncates_long_text() {
        let body = format!("<p>{}</p>", "x".repeat(400));
        let excerpt = generate_excerpt(&body);
        assert_eq!(excerpt.len(), 303);
        assert!(excerpt.ends_with("..."));
    }

    #[test]
    fn test_excerpt_exactly_at_limit_is_untouched() {
        let body = "y".repeat(300);
        assert_eq!(generate_excerpt(&body), body);
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(reading_time(""), 1);
        assert_eq!(reading_time(&"word ".repeat(200)), 1);
        assert_eq!(reading_time(&"word ".repeat(201)), 2);
        assert_eq!(reading_time(&"<p>word</p> ".repeat(400)), 2);
    }
}
