use crate::feed::Article;

/// Articles listed in full in a WhatsApp digest
const WHATSAPP_MAX_ARTICLES: usize = 3;
const WHATSAPP_TITLE_CHARS: usize = 80;
const WHATSAPP_SUMMARY_CHARS: usize = 200;
/// Twilio rejects WhatsApp bodies longer than this
pub const WHATSAPP_MAX_CHARS: usize = 1600;

pub fn email_subject(articles: &[Article]) -> String {
    match articles.len() {
        1 => "1 New Cybersecurity Article".to_string(),
        n => format!("{} New Cybersecurity Articles", n),
    }
}

/// HTML digest with summary and key points of every article
pub fn email_body(articles: &[Article]) -> String {
    let mut html = String::from(
        r#"<html>
<head>
<style>
  body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }
  .header { background-color: #1f3a5f; color: white; padding: 20px; text-align: center; }
  .article { margin: 20px 0; padding: 15px; border-left: 4px solid #1f3a5f; background-color: #f8f9fa; }
  .article-title { font-size: 18px; font-weight: bold; margin-bottom: 10px; }
  .article-source { color: #6c757d; font-size: 14px; margin-bottom: 10px; }
  .read-more { display: inline-block; background-color: #1f3a5f; color: white; padding: 8px 16px; text-decoration: none; border-radius: 4px; }
  .footer { margin-top: 30px; padding: 20px; text-align: center; color: #6c757d; }
</style>
</head>
<body>
<div class="header">
  <h1>Cybersecurity Articles Digest</h1>
  <p>New articles from your monitored cybersecurity blogs</p>
</div>
"#,
    );

    for article in articles {
        let summary = article
            .summary
            .as_deref()
            .map(multiline_html)
            .unwrap_or_else(|| "Summary not available".to_string());

        html.push_str(&format!(
            r#"<div class="article">
  <div class="article-title">{title}</div>
  <div class="article-source">Source: {source}</div>
  <div class="article-summary"><strong>Summary:</strong><br>{summary}</div>
"#,
            title = escape_html(&article.title),
            source = escape_html(&article.source_name),
        ));

        if let Some(key_points) = article.key_points.as_deref().filter(|k| !k.is_empty()) {
            html.push_str(&format!(
                "  <div class=\"key-points\"><strong>Key Points:</strong><br>{}</div>\n",
                multiline_html(key_points)
            ));
        }

        html.push_str(&format!(
            "  <a href=\"{}\" class=\"read-more\">Read Full Article</a>\n</div>\n",
            escape_html(&article.url)
        ));
    }

    html.push_str(
        r#"<div class="footer">
  <p>This digest was generated automatically by blogsentry.</p>
</div>
</body>
</html>
"#,
    );

    html
}

/// Short text digest: first three articles, then a count of the rest
pub fn whatsapp_body(articles: &[Article]) -> String {
    if articles.is_empty() {
        return "No new cybersecurity articles found.".to_string();
    }

    let mut message = String::from("*Cybersecurity Articles Digest*\n\n");

    for (i, article) in articles.iter().take(WHATSAPP_MAX_ARTICLES).enumerate() {
        message.push_str(&format!(
            "*{}. {}*\n",
            i + 1,
            cut_chars(&article.title, WHATSAPP_TITLE_CHARS)
        ));
        message.push_str(&format!("Source: {}\n", article.source_name));

        if let Some(summary) = article.summary.as_deref() {
            message.push_str(&cut_chars(summary, WHATSAPP_SUMMARY_CHARS));
            message.push('\n');
        }

        message.push_str(&article.url);
        message.push_str("\n\n");
    }

    if articles.len() > WHATSAPP_MAX_ARTICLES {
        message.push_str(&format!(
            "... and {} more articles. Run `blogsentry articles` to see them all.",
            articles.len() - WHATSAPP_MAX_ARTICLES
        ));
    }

    cut_chars(message.trim_end(), WHATSAPP_MAX_CHARS)
}

/// Cut to at most `max_chars` characters including the trailing "..."
fn cut_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

fn multiline_html(text: &str) -> String {
    escape_html(text).replace('\n', "<br>")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
