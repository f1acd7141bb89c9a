//! sitemaps.org 0.9 output for static pages and job detail pages.

use chrono::NaiveDate;
use jobfeed_core::Record;
use serde::{Deserialize, Serialize};

pub const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub static_pages: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://jobupdate.site".to_string(),
            static_pages: [
                "",
                "latest-jobs.html",
                "govt-jobs.html",
                "private-jobs.html",
                "results.html",
                "admit-cards.html",
                "exams.html",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl SiteConfig {
    fn page_url(&self, page: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), page.trim_start_matches('/'))
    }

    fn job_url(&self, id: u64) -> String {
        format!("{}/job-details.html?id={id}", self.base_url.trim_end_matches('/'))
    }
}

/// Render the sitemap. Jobs without an id are left out.
pub fn render_sitemap(site: &SiteConfig, jobs: &[Record], run_date: NaiveDate) -> String {
    let lastmod = run_date.format("%Y-%m-%d").to_string();
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!("<urlset xmlns=\"{SITEMAP_NAMESPACE}\">\n"));

    for page in &site.static_pages {
        let is_root = page.trim_matches('/').is_empty();
        let priority = if is_root { "1.0" } else { "0.8" };
        push_url(&mut out, &site.page_url(page), &lastmod, "daily", priority);
    }
    for id in jobs.iter().filter_map(Record::id) {
        push_url(&mut out, &site.job_url(id), &lastmod, "weekly", "0.7");
    }

    out.push_str("</urlset>\n");
    out
}

fn push_url(out: &mut String, loc: &str, lastmod: &str, changefreq: &str, priority: &str) {
    out.push_str(&format!(
        "  <url>\n    <loc>{}</loc>\n    <lastmod>{lastmod}</lastmod>\n    <changefreq>{changefreq}</changefreq>\n    <priority>{priority}</priority>\n  </url>\n",
        escape_xml(loc)
    ));
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
