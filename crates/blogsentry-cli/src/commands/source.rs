use std::path::Path;

use anyhow::{bail, Context, Result};

use blogsentry_core::{
    feed::{opml, NewSource, Source},
    storage::{Database, SourceRepository},
};

pub async fn add(
    db: &Database,
    name: &str,
    url: &str,
    rss: bool,
    feed_url: Option<String>,
) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Source name must not be empty");
    }
    url::Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
    if let Some(feed) = &feed_url {
        url::Url::parse(feed).with_context(|| format!("Invalid feed URL: {}", feed))?;
    }

    let repo = SourceRepository::new(db);
    if repo.find_by_name(name).await?.is_some() {
        bail!("A source named '{}' already exists", name);
    }

    let source = repo
        .create(&NewSource {
            name: name.to_string(),
            url: url.to_string(),
            is_rss: rss || feed_url.is_some(),
            feed_url,
        })
        .await?;

    println!("Added {} source: {} ({})", source.kind(), source.name, source.fetch_url());
    Ok(())
}

/// Requested changes to a source; `None` keeps the current value
#[derive(Debug, Default)]
pub struct SourceEdit {
    pub name: Option<String>,
    pub url: Option<String>,
    pub is_rss: Option<bool>,
    /// An empty string clears the feed URL
    pub feed_url: Option<String>,
}

impl SourceEdit {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.url.is_none() && self.is_rss.is_none() && self.feed_url.is_none()
    }

    /// Merge the edit into the current source, validating the result
    fn apply(self, current: &Source) -> Result<NewSource> {
        let name = match self.name {
            Some(name) => name.trim().to_string(),
            None => current.name.clone(),
        };
        if name.is_empty() {
            bail!("Source name must not be empty");
        }

        let url = match self.url {
            Some(url) => {
                let url = url.trim().to_string();
                url::Url::parse(&url).with_context(|| format!("Invalid URL: {}", url))?;
                url
            }
            None => current.url.clone(),
        };

        let mut feed_url = match self.feed_url {
            Some(feed) if feed.trim().is_empty() => None,
            Some(feed) => {
                let feed = feed.trim().to_string();
                url::Url::parse(&feed).with_context(|| format!("Invalid feed URL: {}", feed))?;
                Some(feed)
            }
            None => current.feed_url.clone(),
        };

        let is_rss = match self.is_rss {
            Some(false) => {
                feed_url = None;
                false
            }
            Some(true) => true,
            None => current.is_rss || feed_url.is_some(),
        };

        Ok(NewSource {
            name,
            url,
            is_rss,
            feed_url,
        })
    }
}

pub async fn edit(db: &Database, name: &str, edit: SourceEdit) -> Result<()> {
    if edit.is_empty() {
        bail!("Nothing to change; pass --new-name, --url, --rss, --no-rss or --feed-url");
    }

    let repo = SourceRepository::new(db);

    let Some(source) = repo.find_by_name(name).await? else {
        bail!("Source not found: {}", name);
    };

    let updated = edit.apply(&source)?;
    if updated.name != source.name && repo.find_by_name(&updated.name).await?.is_some() {
        bail!("A source named '{}' already exists", updated.name);
    }

    repo.update(source.id, &updated).await?;
    println!(
        "Updated source '{}': {} [{}]",
        updated.name,
        updated.feed_url.as_deref().unwrap_or(&updated.url),
        if updated.is_rss { "rss" } else { "html" }
    );
    Ok(())
}

pub async fn remove(db: &Database, name: &str) -> Result<()> {
    let repo = SourceRepository::new(db);

    let Some(source) = repo.find_by_name(name).await? else {
        bail!("Source not found: {}", name);
    };

    repo.delete(source.id).await?;
    println!("Removed source '{}' and its articles.", source.name);
    Ok(())
}

pub async fn set_active(db: &Database, name: &str, active: bool) -> Result<()> {
    let repo = SourceRepository::new(db);

    let Some(source) = repo.find_by_name(name).await? else {
        bail!("Source not found: {}", name);
    };

    repo.set_active(source.id, active).await?;
    println!(
        "Source '{}' {}.",
        source.name,
        if active { "enabled" } else { "disabled" }
    );
    Ok(())
}

pub async fn list(db: &Database) -> Result<()> {
    let sources = SourceRepository::new(db).list_all().await?;

    if sources.is_empty() {
        println!("No sources yet.");
        println!("\nTo add one, run:");
        println!("  blogsentry source add -n <name> -u <url> [--rss]");
        return Ok(());
    }

    println!("Sources ({}):\n", sources.len());

    for source in &sources {
        let state = if source.active { "" } else { " (disabled)" };
        let error = match &source.last_error {
            Some(err) => format!(" [ERROR: {}]", err),
            None => String::new(),
        };

        println!("  {} [{}]{}{}", source.name, source.kind(), state, error);
        println!("    URL: {}", source.fetch_url());
        if let Some(last) = source.last_scraped_at {
            println!("    Last scraped: {}", last.format("%Y-%m-%d %H:%M"));
        }
        println!();
    }

    Ok(())
}

pub async fn import(db: &Database, path: &Path) -> Result<()> {
    println!("Importing feeds from: {}", path.display());

    let sources = opml::parse_opml_file(path)?;
    if sources.is_empty() {
        println!("No feeds found in OPML file.");
        return Ok(());
    }

    let repo = SourceRepository::new(db);
    let mut imported = 0;
    let mut skipped = 0;

    for source in &sources {
        let exists = repo.find_by_name(&source.name).await?.is_some()
            || repo
                .find_by_url(source.feed_url.as_deref().unwrap_or(&source.url))
                .await?
                .is_some();

        if exists {
            println!("  Skipping '{}' (already exists)", source.name);
            skipped += 1;
            continue;
        }

        repo.create(source).await?;
        println!("  Imported: {}", source.name);
        imported += 1;
    }

    println!("\nImported {} feeds, skipped {}.", imported, skipped);
    Ok(())
}
