use compact_str::CompactString;
use serde::{Deserialize, Serialize};

pub const MAIN_URL: &str = "https://www.reddit.com";
pub const SHORT_URL: &str = "https://redd.it";

/// Prefix of a fully qualified post id (`t3_abc123`).
pub const POST_KIND: &str = "t3_";

/// Anything the registry stores: identity is the `id` alone.
pub trait Record: Serialize + for<'de> Deserialize<'de> {
    fn id(&self) -> &str;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: CompactString,
    pub title: String,
    pub permalink: String,
    pub author: CompactString,
    pub author_id: Option<CompactString>,
    pub subreddit: CompactString,
    pub subreddit_id: CompactString,
    pub comment_count: i64,
    pub score: i64,
    pub content: Option<String>,
    pub is_deleted: bool,
    pub created_at: String,
}

/// A comment found under a post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CompactString,
    pub permalink: Option<String>,
    pub post_id: CompactString,
    /// `None` for top-level comments.
    pub parent_id: Option<CompactString>,
    pub author: CompactString,
    pub score: Option<i64>,
    pub content: Option<String>,
    pub is_deleted: bool,
    pub created_at: String,
}

/// A comment as listed on its author's profile page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserComment {
    pub id: CompactString,
    pub href: String,
    pub post_id: CompactString,
    pub author: CompactString,
    pub author_id: CompactString,
    pub subreddit: CompactString,
    pub score: i64,
    pub content: Option<String>,
    pub is_deleted: bool,
}

impl Record for Post {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Comment {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for UserComment {
    fn id(&self) -> &str {
        &self.id
    }
}

pub fn url_from_permalink(permalink: &str) -> String {
    format!("{MAIN_URL}{permalink}")
}

/// Short link for a post id; the kind prefix is dropped when present.
pub fn url_from_id(id: &str) -> String {
    let bare = id.strip_prefix(POST_KIND).unwrap_or(id);
    format!("{SHORT_URL}/{bare}")
}

pub fn overview_permalink(username: &str) -> String {
    format!("/user/{username}/")
}

pub fn comment_permalink(username: &str) -> String {
    overview_permalink(username) + "comments/"
}

pub fn comment_url(username: &str) -> String {
    url_from_permalink(&comment_permalink(username))
}
