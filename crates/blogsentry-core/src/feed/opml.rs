use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use super::models::NewSource;
use crate::Result;

/// Read an OPML subscription export into RSS sources
pub fn parse_opml_file(path: &Path) -> Result<Vec<NewSource>> {
    let content = std::fs::read_to_string(path)?;
    parse_opml(&content)
}

/// Parse OPML content string. Outlines without `xmlUrl` are categories and are skipped.
pub fn parse_opml(content: &str) -> Result<Vec<NewSource>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut sources = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                let mut xml_url = None;
                let mut html_url = None;
                let mut name = None;

                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).to_string();

                    match attr.key.as_ref() {
                        b"xmlUrl" => xml_url = Some(value),
                        b"htmlUrl" => html_url = Some(value),
                        b"title" => name = Some(value),
                        b"text" if name.is_none() => name = Some(value),
                        _ => {}
                    }
                }

                if let Some(feed_url) = xml_url {
                    let url = html_url
                        .filter(|u| !u.is_empty())
                        .unwrap_or_else(|| feed_url.clone());

                    sources.push(NewSource {
                        name: name.unwrap_or_else(|| url.clone()),
                        feed_url: (url != feed_url).then_some(feed_url),
                        url,
                        is_rss: true,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(crate::Error::FeedParse(format!("Failed to parse OPML: {}", e)));
            }
            _ => {}
        }
    }

    Ok(sources)
}
