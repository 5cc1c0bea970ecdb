use crate::models::{
    CreatePost, Pagination, Post, PostPage, PostQuery, PostQueryParams, PostStats, PostStatus,
    PostSummary, SitemapEntry, SortOrder, UpdatePost,
};
use crate::services::excerpt::{generate_excerpt, reading_time, EXCERPT_LENGTH};
use crate::services::sanitize::{validate_image_url, HtmlSanitizer};
use crate::services::slug::{assign_unique_slug, SlugLookup};
use crate::Database;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_AUTHOR: &str = "Admin";
const INSERT_ATTEMPTS: u32 = 3;

const POST_COLUMNS: &str = "id, title, slug, content, excerpt, status, featured_image, tags, meta_title, meta_description, author, view_count, created_at, updated_at";
const SUMMARY_COLUMNS: &str = "id, title, slug, excerpt, status, featured_image, tags, author, view_count, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("post not found")]
    NotFound,
    #[error("an active post already uses this slug")]
    DuplicateSlug,
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for PostError {
    fn from(err: rusqlite::Error) -> Self {
        if is_unique_violation(&err) {
            Self::DuplicateSlug
        } else {
            Self::Database(err.into())
        }
    }
}

pub type PostResult<T> = Result<T, PostError>;

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn create_post(db: &Database, sanitizer: &HtmlSanitizer, input: CreatePost) -> PostResult<Post> {
    let mut errors = Vec::new();

    let title = check_title(&input.title, &mut errors);
    let content = check_content(&input.content, sanitizer, &mut errors);
    let status = match input.status.as_deref() {
        Some(s) => check_status(s, &mut errors),
        None => PostStatus::Draft,
    };
    let excerpt = check_excerpt(input.excerpt, &mut errors);
    let featured_image = check_featured_image(input.featured_image, &mut errors);
    let meta_title = check_max_len(input.meta_title, "metaTitle", "Meta title", 60, &mut errors);
    let meta_description = check_max_len(
        input.meta_description,
        "metaDescription",
        "Meta description",
        160,
        &mut errors,
    );
    let tags = normalize_tags(input.tags);

    if !errors.is_empty() {
        return Err(PostError::Validation(errors));
    }

    let excerpt = excerpt.or_else(|| Some(generate_excerpt(&content)));
    let now = now_timestamp();

    let tags = serde_json::to_string(&tags).map_err(anyhow::Error::from)?;
    let row = NewPostRow {
        title: &title,
        content: &content,
        excerpt: excerpt.as_deref(),
        status,
        featured_image: featured_image.as_deref(),
        tags: &tags,
        meta_title: meta_title.as_deref(),
        meta_description: meta_description.as_deref(),
        now: &now,
    };

    let conn = db.get()?;
    let (id, slug) = insert_post(&conn, &*conn, &row)?;
    tracing::info!("Created post id={} slug={}", id, slug);

    let post = conn.query_row(
        &format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS),
        [id],
        row_to_post,
    )?;
    Ok(post)
}

struct NewPostRow<'a> {
    title: &'a str,
    content: &'a str,
    excerpt: Option<&'a str>,
    status: PostStatus,
    featured_image: Option<&'a str>,
    tags: &'a str,
    meta_title: Option<&'a str>,
    meta_description: Option<&'a str>,
    now: &'a str,
}

/// Assigns a slug through `lookup` and inserts the row, re-assigning when the
/// active-slug index rejects the insert. Returns the new id and slug.
fn insert_post<L>(conn: &Connection, lookup: &L, row: &NewPostRow) -> PostResult<(i64, String)>
where
    L: SlugLookup + ?Sized,
{
    let mut attempt = 1;
    loop {
        let slug = assign_unique_slug(lookup, row.title, None)?;
        let inserted = conn.execute(
            r#"
            INSERT INTO posts (title, slug, content, excerpt, status, featured_image, tags, meta_title, meta_description, author, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            (
                row.title,
                &slug,
                row.content,
                row.excerpt,
                row.status.to_string(),
                row.featured_image,
                row.tags,
                row.meta_title,
                row.meta_description,
                DEFAULT_AUTHOR,
                row.now,
                row.now,
            ),
        );
        match inserted {
            Ok(_) => return Ok((conn.last_insert_rowid(), slug)),
            // another writer took the slug between lookup and insert
            Err(e) if is_unique_violation(&e) && attempt < INSERT_ATTEMPTS => {
                tracing::warn!("Slug '{}' was claimed concurrently, retrying", slug);
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

pub fn update_post(
    db: &Database,
    sanitizer: &HtmlSanitizer,
    slug: &str,
    input: UpdatePost,
) -> PostResult<Post> {
    let conn = db.get()?;
    let current = conn
        .query_row(
            &format!("SELECT {} FROM posts WHERE slug = ? AND is_deleted = 0", POST_COLUMNS),
            [slug],
            row_to_post,
        )
        .optional()?
        .ok_or(PostError::NotFound)?;

    let mut errors = Vec::new();

    let title = input.title.as_deref().map(|t| check_title(t, &mut errors));
    let content = input
        .content
        .as_deref()
        .map(|c| check_content(c, sanitizer, &mut errors));
    let status = input.status.as_deref().map(|s| check_status(s, &mut errors));
    let excerpt = input.excerpt.map(|e| check_excerpt(Some(e), &mut errors));
    let featured_image = input
        .featured_image
        .map(|f| check_featured_image(Some(f), &mut errors));
    let meta_title = input
        .meta_title
        .map(|m| check_max_len(Some(m), "metaTitle", "Meta title", 60, &mut errors));
    let meta_description = input.meta_description.map(|m| {
        check_max_len(Some(m), "metaDescription", "Meta description", 160, &mut errors)
    });

    if !errors.is_empty() {
        return Err(PostError::Validation(errors));
    }

    let (title, new_slug) = match title {
        Some(t) if t != current.title => {
            let new_slug = assign_unique_slug(&*conn, &t, Some(current.id))?;
            (t, new_slug)
        }
        _ => (current.title.clone(), current.slug.clone()),
    };

    let content_changed = content.is_some();
    let content = content.unwrap_or(current.content);
    let mut excerpt = excerpt.unwrap_or(current.excerpt);
    if excerpt.is_none() && content_changed {
        excerpt = Some(generate_excerpt(&content));
    }

    let status = status.unwrap_or(current.status);
    let tags = input.tags.map(normalize_tags).unwrap_or(current.tags);
    let featured_image = featured_image.unwrap_or(current.featured_image);
    let meta_title = meta_title.unwrap_or(current.meta_title);
    let meta_description = meta_description.unwrap_or(current.meta_description);

    conn.execute(
        r#"
        UPDATE posts SET title = ?, slug = ?, content = ?, excerpt = ?, status = ?, featured_image = ?, tags = ?, meta_title = ?, meta_description = ?, updated_at = ?
        WHERE id = ?
        "#,
        (
            &title,
            &new_slug,
            &content,
            &excerpt,
            status.to_string(),
            &featured_image,
            serde_json::to_string(&tags).map_err(anyhow::Error::from)?,
            &meta_title,
            &meta_description,
            now_timestamp(),
            current.id,
        ),
    )?;

    if new_slug != current.slug {
        tracing::info!("Post id={} slug changed {} -> {}", current.id, current.slug, new_slug);
    }

    let post = conn.query_row(
        &format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS),
        [current.id],
        row_to_post,
    )?;
    Ok(post)
}

/// Public read: only active, published posts. Bumps the view counter.
pub fn view_published_post(db: &Database, slug: &str) -> PostResult<Option<Post>> {
    let conn = db.get()?;
    let post = conn
        .query_row(
            &format!(
                "UPDATE posts SET view_count = view_count + 1 WHERE slug = ? AND is_deleted = 0 AND status = 'published' RETURNING {}",
                POST_COLUMNS
            ),
            [slug],
            row_to_post,
        )
        .optional()?;
    Ok(post)
}

/// Admin read: any status, no view bump.
pub fn get_post(db: &Database, slug: &str) -> PostResult<Option<Post>> {
    let conn = db.get()?;
    let post = conn
        .query_row(
            &format!("SELECT {} FROM posts WHERE slug = ? AND is_deleted = 0", POST_COLUMNS),
            [slug],
            row_to_post,
        )
        .optional()?;
    Ok(post)
}

/// Soft delete. Returns `false` when no active post has this slug.
pub fn delete_post(db: &Database, slug: &str) -> PostResult<bool> {
    let conn = db.get()?;
    let changed = conn.execute(
        "UPDATE posts SET is_deleted = 1, updated_at = ? WHERE slug = ? AND is_deleted = 0",
        (now_timestamp(), slug),
    )?;
    if changed > 0 {
        tracing::info!("Soft-deleted post slug={}", slug);
    }
    Ok(changed > 0)
}

pub fn parse_query(params: PostQueryParams) -> PostResult<PostQuery> {
    let mut errors = Vec::new();
    let mut query = PostQuery::default();

    if let Some(page) = params.page {
        match page.trim().parse::<usize>() {
            Ok(p) if (1..=1000).contains(&p) => query.page = p,
            _ => errors.push(FieldError::new("page", "Page must be a number between 1 and 1000")),
        }
    }
    if let Some(limit) = params.limit {
        match limit.trim().parse::<usize>() {
            Ok(l) if (1..=50).contains(&l) => query.limit = l,
            _ => errors.push(FieldError::new("limit", "Limit must be a number between 1 and 50")),
        }
    }
    if let Some(status) = params.status {
        query.status = check_status(&status, &mut errors);
    }
    if let Some(sort_by) = params.sort_by {
        match sort_by.parse() {
            Ok(s) => query.sort_by = s,
            Err(()) => errors.push(FieldError::new(
                "sortBy",
                "Sort field must be one of createdAt, updatedAt, viewCount, title",
            )),
        }
    }
    if let Some(sort_order) = params.sort_order {
        match sort_order.parse() {
            Ok(o) => query.sort_order = o,
            Err(()) => errors.push(FieldError::new("sortOrder", "Sort order must be asc or desc")),
        }
    }

    query.search = params
        .search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    query.tags = params
        .tags
        .map(|t| normalize_tags(t.split(',').map(String::from).collect()))
        .unwrap_or_default();

    if errors.is_empty() {
        Ok(query)
    } else {
        Err(PostError::Validation(errors))
    }
}

pub fn list_posts(db: &Database, query: &PostQuery) -> PostResult<PostPage> {
    let mut where_sql = String::from("is_deleted = 0 AND status = ?");
    let mut params: Vec<Value> = vec![Value::Text(query.status.to_string())];

    if let Some(fts) = query.search.as_deref().and_then(fts_query) {
        where_sql.push_str(" AND id IN (SELECT rowid FROM posts_fts WHERE posts_fts MATCH ?)");
        params.push(Value::Text(fts));
    }

    if !query.tags.is_empty() {
        let placeholders = vec!["?"; query.tags.len()].join(", ");
        where_sql.push_str(&format!(
            " AND EXISTS (SELECT 1 FROM json_each(posts.tags) WHERE json_each.value IN ({}))",
            placeholders
        ));
        params.extend(query.tags.iter().cloned().map(Value::Text));
    }

    let conn = db.get()?;
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM posts WHERE {}", where_sql),
        params_from_iter(params.iter()),
        |row| row.get(0),
    )?;

    let direction = match query.sort_order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    let sql = format!(
        "SELECT {} FROM posts WHERE {} ORDER BY {} {}, id {} LIMIT ? OFFSET ?",
        SUMMARY_COLUMNS,
        where_sql,
        query.sort_by.column(),
        direction,
        direction
    );
    params.push(Value::Integer(query.limit as i64));
    params.push(Value::Integer(((query.page - 1) * query.limit) as i64));

    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map(params_from_iter(params.iter()), row_to_summary)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PostPage {
        posts,
        pagination: Pagination::new(query.page, query.limit, total),
    })
}

pub fn recent_published(db: &Database, limit: usize) -> PostResult<Vec<Post>> {
    let conn = db.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM posts WHERE is_deleted = 0 AND status = 'published' ORDER BY created_at DESC, id DESC LIMIT ?",
        POST_COLUMNS
    ))?;
    let posts = stmt
        .query_map([limit as i64], row_to_post)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

pub fn sitemap_entries(db: &Database) -> PostResult<Vec<SitemapEntry>> {
    let conn = db.get()?;
    let mut stmt = conn.prepare(
        "SELECT slug, updated_at FROM posts WHERE is_deleted = 0 AND status = 'published' ORDER BY updated_at DESC, id DESC",
    )?;
    let entries = stmt
        .query_map([], |row| {
            Ok(SitemapEntry {
                slug: row.get(0)?,
                updated_at: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub fn post_stats(db: &Database) -> PostResult<PostStats> {
    let conn = db.get()?;
    let stats = conn.query_row(
        r#"
        SELECT
            COUNT(*),
            COALESCE(SUM(status = 'published'), 0),
            COALESCE(SUM(status = 'draft'), 0),
            COALESCE(SUM(status = 'archived'), 0),
            COALESCE(SUM(view_count), 0)
        FROM posts
        WHERE is_deleted = 0
        "#,
        [],
        |row| {
            Ok(PostStats {
                total_posts: row.get(0)?,
                published_posts: row.get(1)?,
                draft_posts: row.get(2)?,
                archived_posts: row.get(3)?,
                total_views: row.get(4)?,
            })
        },
    )?;
    Ok(stats)
}

/// Turns free text into an FTS5 query matching any of its terms.
fn fts_query(search: &str) -> Option<String> {
    let terms: Vec<String> = search
        .split_whitespace()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

fn check_title(raw: &str, errors: &mut Vec<FieldError>) -> String {
    let title = raw.trim().to_string();
    let len = title.chars().count();
    if len < 3 {
        errors.push(FieldError::new("title", "Title must be at least 3 characters"));
    } else if len > 200 {
        errors.push(FieldError::new("title", "Title cannot exceed 200 characters"));
    }
    title
}

fn check_content(raw: &str, sanitizer: &HtmlSanitizer, errors: &mut Vec<FieldError>) -> String {
    if raw.chars().count() < 10 {
        errors.push(FieldError::new("content", "Content must be at least 10 characters"));
        return raw.to_string();
    }
    let clean = sanitizer.clean(raw);
    if clean.chars().count() < 10 {
        errors.push(FieldError::new(
            "content",
            "Content must be at least 10 characters after sanitization",
        ));
    }
    clean
}

fn check_status(raw: &str, errors: &mut Vec<FieldError>) -> PostStatus {
    raw.parse().unwrap_or_else(|()| {
        errors.push(FieldError::new(
            "status",
            "Status must be one of draft, published, archived",
        ));
        PostStatus::Draft
    })
}

/// Empty strings mean "not set".
fn check_excerpt(raw: Option<String>, errors: &mut Vec<FieldError>) -> Option<String> {
    let excerpt = raw.filter(|e| !e.trim().is_empty())?;
    if excerpt.chars().count() > EXCERPT_LENGTH {
        errors.push(FieldError::new("excerpt", "Excerpt cannot exceed 300 characters"));
    }
    Some(excerpt)
}

fn check_featured_image(raw: Option<String>, errors: &mut Vec<FieldError>) -> Option<String> {
    let url = raw.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())?;
    if !validate_image_url(&url) {
        errors.push(FieldError::new(
            "featuredImage",
            "Featured image must be a valid image URL",
        ));
    }
    Some(url)
}

fn check_max_len(
    raw: Option<String>,
    field: &'static str,
    label: &str,
    max: usize,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    let value = raw.filter(|v| !v.is_empty())?;
    if value.chars().count() > max {
        errors.push(FieldError::new(
            field,
            format!("{} cannot exceed {} characters", label, max),
        ));
    }
    Some(value)
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn parse_tags(raw: String) -> Vec<String> {
    serde_json::from_str(&raw).unwrap_or_default()
}

fn row_to_post(row: &rusqlite::Row) -> rusqlite::Result<Post> {
    let content: String = row.get(3)?;
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        reading_time: reading_time(&content),
        content,
        excerpt: row.get(4)?,
        status: row
            .get::<_, String>(5)?
            .parse()
            .unwrap_or(PostStatus::Draft),
        featured_image: row.get(6)?,
        tags: parse_tags(row.get(7)?),
        meta_title: row.get(8)?,
        meta_description: row.get(9)?,
        author: row.get(10)?,
        view_count: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn row_to_summary(row: &rusqlite::Row) -> rusqlite::Result<PostSummary> {
    Ok(PostSummary {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        excerpt: row.get(3)?,
        status: row
            .get::<_, String>(4)?
            .parse()
            .unwrap_or(PostStatus::Draft),
        featured_image: row.get(5)?,
        tags: parse_tags(row.get(6)?),
        author: row.get(7)?,
        view_count: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}
