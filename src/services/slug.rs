use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;

pub const MAX_BASE_LEN: usize = 100;
pub const MAX_COLLISIONS: u32 = 1000;
pub const FALLBACK_SLUG: &str = "untitled";

static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\s-]").expect("Invalid slug filter pattern"));
static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-_\s]+").expect("Invalid slug separator pattern"));

/// Answers "is this slug taken by an active post other than `exclude_id`?".
pub trait SlugLookup {
    fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;
}

impl SlugLookup for rusqlite::Connection {
    fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let exists: bool = self.query_row(
            "SELECT EXISTS(SELECT 1 FROM posts WHERE slug = ?1 AND is_deleted = 0 AND (?2 IS NULL OR id != ?2))",
            rusqlite::params![slug, exclude_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

/// Derives the base slug for a title. Never returns an empty string.
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let filtered = DISALLOWED.replace_all(lowered.trim(), "");
    let joined = SEPARATORS.replace_all(&filtered, "-");
    let mut slug = joined.trim_matches('-').to_string();

    if slug.is_empty() {
        slug = FALLBACK_SLUG.to_string();
    }
    // only ASCII survives the filter, so byte truncation is char-safe
    slug.truncate(MAX_BASE_LEN);
    slug
}

/// Resolves a slug for `title` that no other active post holds.
///
/// Candidates are probed one at a time: the base, then `base-1`, `base-2`, ...
/// After [`MAX_COLLISIONS`] taken candidates the current millisecond timestamp
/// is appended instead, without a further lookup.
pub fn assign_unique_slug<L>(lookup: &L, title: &str, exclude_id: Option<i64>) -> Result<String>
where
    L: SlugLookup + ?Sized,
{
    resolve_unique(lookup, &normalize_title(title), exclude_id, || {
        chrono::Utc::now().timestamp_millis()
    })
}

fn resolve_unique<L, F>(lookup: &L, base: &str, exclude_id: Option<i64>, now_ms: F) -> Result<String>
where
    L: SlugLookup + ?Sized,
    F: FnOnce() -> i64,
{
    let mut candidate = base.to_string();
    let mut counter = 1u32;

    while lookup.slug_exists(&candidate, exclude_id)? {
        candidate = format!("{}-{}", base, counter);
        counter += 1;

        if counter > MAX_COLLISIONS {
            let fallback = format!("{}-{}", base, now_ms());
            tracing::warn!(
                "Slug '{}' collided {} times, falling back to '{}'",
                base,
                MAX_COLLISIONS,
                fallback
            );
            return Ok(fallback);
        }
    }

    Ok(candidate)
}

pub fn validate_slug(slug: &str) -> bool {
    if slug.is_empty() || slug.len() > 200 {
        return false;
    }
    slug.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;

    struct FakeLookup {
        taken: HashSet<String>,
        reads: Cell<usize>,
        seen_exclude: RefCell<Vec<Option<i64>>>,
    }

    impl FakeLookup {
        fn new(taken: &[&str]) -> Self {
            Self {
                taken: taken.iter().map(|s| s.to_string()).collect(),
                reads: Cell::new(0),
                seen_exclude: RefCell::new(Vec::new()),
            }
        }
    }

    impl SlugLookup for FakeLookup {
        fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
            self.reads.set(self.reads.get() + 1);
            self.seen_exclude.borrow_mut().push(exclude_id);
            Ok(self.taken.contains(slug))
        }
    }

    struct AlwaysTaken {
        reads: Cell<usize>,
    }

    impl SlugLookup for AlwaysTaken {
        fn slug_exists(&self, _slug: &str, _exclude_id: Option<i64>) -> Result<bool> {
            self.reads.set(self.reads.get() + 1);
            Ok(true)
        }
    }

    struct Failing;

    impl SlugLookup for Failing {
        fn slug_exists(&self, _slug: &str, _exclude_id: Option<i64>) -> Result<bool> {
            anyhow::bail!("database unavailable")
        }
    }

    #[test]
    fn test_normalize_punctuation() {
        assert_eq!(normalize_title("Hello, World!"), "hello-world");
    }

    #[test]
    fn test_normalize_whitespace_and_hyphen_runs() {
        assert_eq!(normalize_title("  Rust -- is   fun  "), "rust-is-fun");
        assert_eq!(normalize_title("--leading and trailing--"), "leading-and-trailing");
    }

    #[test]
    fn test_normalize_drops_non_ascii_letters() {
        assert_eq!(normalize_title("Café au lait"), "caf-au-lait");
    }

    #[test]
    fn test_normalize_underscores_become_hyphens() {
        assert_eq!(normalize_title("snake_case_title"), "snake-case-title");
    }

    #[test]
    fn test_normalize_empty_falls_back() {
        assert_eq!(normalize_title("!!!"), "untitled");
        assert_eq!(normalize_title("   "), "untitled");
    }

    #[test]
    fn test_normalize_truncates_to_100() {
        let title = "a".repeat(150);
        let slug = normalize_title(&title);
        assert_eq!(slug.len(), 100);

        let words = "word ".repeat(40);
        assert_eq!(normalize_title(&words).len(), 100);
    }

    #[test]
    fn test_normalized_output_is_valid() {
        for title in ["Hello, World!", "!!!", "Ünïcödé ☃ Title", "a_b-c d", "123"] {
            assert!(validate_slug(&normalize_title(title)), "{}", title);
        }
    }

    #[test]
    fn test_free_base_is_used_verbatim() {
        let lookup = FakeLookup::new(&[]);
        let slug = assign_unique_slug(&lookup, "Hello, World!", None).unwrap();
        assert_eq!(slug, "hello-world");
        assert_eq!(lookup.reads.get(), 1);
    }

    #[test]
    fn test_collisions_increment_suffix() {
        let lookup = FakeLookup::new(&["hello-world", "hello-world-1"]);
        let slug = assign_unique_slug(&lookup, "Hello World", None).unwrap();
        assert_eq!(slug, "hello-world-2");
        assert_eq!(lookup.reads.get(), 3);
    }

    #[test]
    fn test_untitled_collisions() {
        let lookup = FakeLookup::new(&["untitled", "untitled-1"]);
        assert_eq!(assign_unique_slug(&lookup, "???", None).unwrap(), "untitled-2");
    }

    #[test]
    fn test_exclude_id_is_forwarded() {
        let lookup = FakeLookup::new(&[]);
        assign_unique_slug(&lookup, "Title", Some(42)).unwrap();
        assert_eq!(*lookup.seen_exclude.borrow(), vec![Some(42)]);
    }

    #[test]
    fn test_idempotent_against_empty_collection() {
        let lookup = FakeLookup::new(&[]);
        let first = assign_unique_slug(&lookup, "Same Title", None).unwrap();
        let second = assign_unique_slug(&lookup, "Same Title", None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_timestamp_fallback_after_bound() {
        let lookup = AlwaysTaken { reads: Cell::new(0) };
        let slug = resolve_unique(&lookup, "busy", None, || 1_700_000_000_123).unwrap();
        assert_eq!(slug, "busy-1700000000123");
        assert_eq!(lookup.reads.get(), MAX_COLLISIONS as usize);
    }

    #[test]
    fn test_lookup_errors_propagate() {
        assert!(assign_unique_slug(&Failing, "Title", None).is_err());
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("hello-world"));
        assert!(validate_slug("a"));
        assert!(!validate_slug(""));
        assert!(!validate_slug("Hello"));
        assert!(!validate_slug("hello_world"));
        assert!(!validate_slug(&"a".repeat(201)));
    }
}
