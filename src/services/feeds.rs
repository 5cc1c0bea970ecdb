use crate::config::SiteConfig;
use crate::models::{Post, SitemapEntry};
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::escape::escape;

pub const FEED_ITEM_LIMIT: usize = 20;

fn cdata(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}

fn rfc2822(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.with_timezone(&Utc).to_rfc2822())
        .unwrap_or_else(|_| timestamp.to_string())
}

pub fn render_rss(site: &SiteConfig, posts: &[Post], now: DateTime<Utc>) -> String {
    let base = site.base_url();

    let mut items = String::new();
    for post in posts {
        let link = format!("{}/posts/{}", base, post.slug);
        items.push_str(&format!(
            r#"
    <item>
      <title>{}</title>
      <description>{}</description>
      <link>{}</link>
      <guid>{}</guid>
      <pubDate>{}</pubDate>
      <author>{}</author>
    </item>"#,
            escape(post.title.as_str()),
            cdata(post.excerpt.as_deref().unwrap_or("")),
            escape(link.as_str()),
            escape(link.as_str()),
            rfc2822(&post.created_at),
            escape(post.author.as_str()),
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>{}</title>
    <description>{}</description>
    <link>{}</link>
    <atom:link href="{}/api/rss" rel="self" type="application/rss+xml" />
    <language>{}</language>
    <lastBuildDate>{}</lastBuildDate>{}
  </channel>
</rss>"#,
        escape(site.title.as_str()),
        escape(site.description.as_str()),
        escape(base),
        escape(base),
        escape(site.language.as_str()),
        now.to_rfc2822(),
        items
    )
}

pub fn render_sitemap(site: &SiteConfig, entries: &[SitemapEntry], now: DateTime<Utc>) -> String {
    let base = escape(site.base_url()).into_owned();
    let now = now.to_rfc3339_opts(SecondsFormat::Millis, true);

    let mut urls = format!(
        r#"  <url>
    <loc>{base}</loc>
    <lastmod>{now}</lastmod>
    <changefreq>daily</changefreq>
    <priority>1.0</priority>
  </url>
  <url>
    <loc>{base}/posts</loc>
    <lastmod>{now}</lastmod>
    <changefreq>daily</changefreq>
    <priority>0.8</priority>
  </url>
"#
    );

    for entry in entries {
        urls.push_str(&format!(
            r#"  <url>
    <loc>{}/posts/{}</loc>
    <lastmod>{}</lastmod>
    <changefreq>weekly</changefreq>
    <priority>0.6</priority>
  </url>
"#,
            base,
            entry.slug,
            escape(entry.updated_at.as_str())
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
{}</urlset>"#,
        urls
    )
}

pub fn render_robots(site: &SiteConfig) -> String {
    format!(
        r#"User-agent: *
Allow: /

# Sitemap
Sitemap: {}/sitemap.xml

# Disallow admin areas
Disallow: /admin/
Disallow: /api/

# Allow public content
Allow: /posts/
Allow: /rss.xml

Crawl-delay: 1"#,
        site.base_url()
    )
}
