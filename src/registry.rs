use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use compact_str::CompactString;
use hashbrown::{HashMap, hash_map::Entry};

use crate::model::{Comment, Post, Record, UserComment};

pub const POST_FILE: &str = "posts.feed";
pub const POST_COMMENT_FILE: &str = "post_comments.feed";
pub const USER_COMMENT_FILE: &str = "user_comments.feed";

/// Records of one kind, unique by id. The first record seen for an id is the one kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Feed<T> {
    records: HashMap<CompactString, T>,
}

impl<T> Default for Feed<T> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
        }
    }
}

impl<T: Record> Feed<T> {
    /// Returns `false` (and drops `record`) when its id is already present.
    pub fn insert(&mut self, record: T) -> bool {
        match self.records.entry(CompactString::new(record.id())) {
            Entry::Occupied(_) => false,
            Entry::Vacant(e) => {
                e.insert(record);
                true
            }
        }
    }

    /// Number of records that were new.
    pub fn extend(&mut self, records: impl IntoIterator<Item = T>) -> usize {
        records.into_iter().map(|r| usize::from(self.insert(r))).sum()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.values()
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let mut feed = Self::default();
        if !path.exists() {
            return Ok(feed);
        }

        let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("cannot read {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line)
                .with_context(|| format!("{}:{}: malformed record", path.display(), n + 1))?;
            feed.insert(record);
        }

        Ok(feed)
    }

    fn write(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for record in self.iter() {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl<T: Record> FromIterator<T> for Feed<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut feed = Self::default();
        feed.extend(iter);
        feed
    }
}

/// Everything scraped so far.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Registry {
    pub posts: Feed<Post>,
    pub post_comments: Feed<Comment>,
    pub user_comments: Feed<UserComment>,
}

pub fn post_file(root: &Path) -> PathBuf {
    root.join(POST_FILE)
}

pub fn post_comment_file(root: &Path) -> PathBuf {
    root.join(POST_COMMENT_FILE)
}

pub fn user_comment_file(root: &Path) -> PathBuf {
    root.join(USER_COMMENT_FILE)
}

/// Reads every feed under `root`; a missing file is an empty feed.
pub fn load(root: &Path) -> anyhow::Result<Registry> {
    let registry = Registry {
        posts: Feed::read(&post_file(root))?,
        post_comments: Feed::read(&post_comment_file(root))?,
        user_comments: Feed::read(&user_comment_file(root))?,
    };

    tracing::info!(
        target: "registry",
        "loaded {} posts, {} post comments, {} user comments from {}",
        registry.posts.len(),
        registry.post_comments.len(),
        registry.user_comments.len(),
        root.display(),
    );

    Ok(registry)
}

/// Rewrites the feed file of every non-empty feed. Files of empty feeds are left as they are.
pub fn dump(registry: &Registry, root: &Path) -> anyhow::Result<()> {
    if !registry.posts.is_empty() {
        registry.posts.write(&post_file(root))?;
    }
    if !registry.post_comments.is_empty() {
        registry.post_comments.write(&post_comment_file(root))?;
    }
    if !registry.user_comments.is_empty() {
        registry.user_comments.write(&user_comment_file(root))?;
    }

    tracing::info!(
        target: "registry",
        "\x1b[36mdumped {} posts, {} post comments, {} user comments to {}\x1b[0m",
        registry.posts.len(),
        registry.post_comments.len(),
        registry.user_comments.len(),
        root.display(),
    );

    Ok(())
}
