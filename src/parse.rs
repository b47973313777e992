//! Record extraction from the rendered document.
//!
//! Every reader here works on a snapshot of the page taken after expansion, so the reads are plain
//! attribute lookups and text walks over a `scraper` tree. The page itself is never touched.

use std::sync::LazyLock;

use anyhow::{Context, anyhow};
use compact_str::{CompactString, format_compact};
use scraper::{ElementRef, Html, Selector};

use crate::model::{Comment, POST_KIND, Post, UserComment};

pub const POST_TAG: &str = "shreddit-post";
pub const COMMENT_TAG: &str = "shreddit-comment";
pub const PROFILE_COMMENT_TAG: &str = "shreddit-profile-comment";

/// Title a post carries once its author deleted it.
pub const DELETED_TITLE: &str = "[deleted by user]";

static SEL_POST: LazyLock<Selector> = LazyLock::new(|| Selector::parse(POST_TAG).unwrap());
static SEL_COMMENT: LazyLock<Selector> = LazyLock::new(|| Selector::parse(COMMENT_TAG).unwrap());
static SEL_PROFILE_COMMENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(PROFILE_COMMENT_TAG).unwrap());
static SEL_TEXT_BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[slot="text-body"]"#).unwrap());
static SEL_REMOVED_BANNER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[slot="post-removed-banner"]"#).unwrap());
static SEL_COMMENT_BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[slot="comment"]"#).unwrap());
static SEL_COMMENT_TIME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[slot="commentMeta"] time"#).unwrap());
static SEL_ACTION_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("shreddit-comment-action-row").unwrap());
static SEL_RTJSON: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#-post-rtjson-content").unwrap());
static SEL_H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());

fn required<'a>(element: ElementRef<'a>, name: &str) -> anyhow::Result<&'a str> {
    element
        .attr(name)
        .ok_or_else(|| anyhow!("<{}> has no `{name}` attribute", element.value().name()))
}

fn number(element: ElementRef<'_>, name: &str) -> anyhow::Result<i64> {
    let value = required(element, name)?;
    value
        .trim()
        .parse::<i64>()
        .with_context(|| format!("`{name}` is not a number: {value:?}"))
}

/// Missing or empty attribute reads as `None`, anything else must be a number.
fn optional_number(element: ElementRef<'_>, name: &str) -> anyhow::Result<Option<i64>> {
    element
        .attr(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value
                .parse::<i64>()
                .with_context(|| format!("`{name}` is not a number: {value:?}"))
        })
        .transpose()
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div" | "li" | "ul" | "ol" | "blockquote" | "pre" | "tr" | "table" | "h1" | "h2" | "h3"
            | "h4" | "h5" | "h6" | "hr"
    )
}

fn break_line(out: &mut String) {
    while out.ends_with(' ') {
        out.pop();
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn push_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    match name {
        "script" | "style" | "template" => return,
        "br" => {
            while out.ends_with(' ') {
                out.pop();
            }
            out.push('\n');
            return;
        }
        _ => {}
    }

    let block = is_block(name);
    if block {
        break_line(out);
    }

    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            for c in text.chars() {
                if c.is_whitespace() {
                    if !out.is_empty() && !out.ends_with([' ', '\n']) {
                        out.push(' ');
                    }
                } else {
                    out.push(c);
                }
            }
        } else if let Some(child) = ElementRef::wrap(child) {
            push_text(child, out);
        }
    }

    if block {
        break_line(out);
    }
}

/// Rendered text of an element: whitespace collapsed, block elements on their own lines.
pub fn inner_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_text(element, &mut out);
    out.trim().to_owned()
}

/// Whether `element` belongs to `root` rather than to a comment nested inside it.
fn owned_by(element: ElementRef<'_>, root: ElementRef<'_>) -> bool {
    let root_tag = root.value().name();
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == root_tag)
        .is_some_and(|ancestor| ancestor == root)
}

fn first_owned<'a>(root: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    root.select(selector).find(|element| owned_by(*element, root))
}

pub fn post(root: ElementRef<'_>) -> anyhow::Result<Post> {
    let id = required(root, "id")?;
    let title = required(root, "post-title")?;
    let permalink = required(root, "permalink")?;

    let author = required(root, "author")?;
    let author_id = root.attr("author-id");

    let subreddit = required(root, "subreddit-prefixed-name")?;
    let subreddit_id = required(root, "subreddit-id")?;

    let comment_count = number(root, "comment-count")?;
    let score = number(root, "score")?;

    let content = root.select(&SEL_TEXT_BODY).next().map(inner_text);

    let is_deleted = root.select(&SEL_REMOVED_BANNER).next().is_some() || title == DELETED_TITLE;

    let created_at = required(root, "created-timestamp")?;

    Ok(Post {
        id: id.into(),
        title: title.to_owned(),
        permalink: permalink.to_owned(),
        author: author.into(),
        author_id: author_id.map(Into::into),
        subreddit: subreddit.into(),
        subreddit_id: subreddit_id.into(),
        comment_count,
        score,
        content,
        is_deleted,
        created_at: created_at.to_owned(),
    })
}

pub fn comment(root: ElementRef<'_>, post_id: &str) -> anyhow::Result<Comment> {
    let body = first_owned(root, &SEL_COMMENT_BODY);

    let id = required(root, "thingid")?;
    let permalink = root.attr("permalink");
    let parent_id = root.attr("parentid").filter(|p| !p.is_empty());

    let author = required(root, "author")?;

    let is_deleted = root.attr("is-comment-deleted") == Some("true") || body.is_none();

    let score = optional_number(root, "score")?;
    let content = if is_deleted { None } else { body.map(inner_text) };

    let created_at = first_owned(root, &SEL_COMMENT_TIME)
        .ok_or_else(|| anyhow!("comment {id} has no time element"))
        .and_then(|time| required(time, "datetime"))?;

    Ok(Comment {
        id: id.into(),
        permalink: permalink.map(ToOwned::to_owned),
        post_id: post_id.into(),
        parent_id: parent_id.map(Into::into),
        author: author.into(),
        score,
        content,
        is_deleted,
        created_at: created_at.to_owned(),
    })
}

/// Splits a profile comment href (`/r/<sub>/comments/<post>/…`) into subreddit and post id.
pub fn split_href(href: &str) -> anyhow::Result<(CompactString, CompactString)> {
    let parts = href.split('/').collect::<Vec<_>>();
    let (Some(subreddit), Some(post)) = (parts.get(2), parts.get(4)) else {
        anyhow::bail!("malformed comment href {href:?}");
    };

    Ok(((*subreddit).into(), format_compact!("{POST_KIND}{post}")))
}

pub fn user_comment(root: ElementRef<'_>, author: &str) -> anyhow::Result<UserComment> {
    let id = required(root, "comment-id")?;
    let href = required(root, "href")?;
    let author_id = required(root, "user-id")?;

    let (subreddit, post_id) = split_href(href)?;

    let action_row = root
        .select(&SEL_ACTION_ROW)
        .next()
        .ok_or_else(|| anyhow!("comment {id} has no action row"))?;
    let score = number(action_row, "score")?;

    let body = root.select(&SEL_RTJSON).next();
    let is_deleted = body.is_none();
    let content = body.map(inner_text);

    Ok(UserComment {
        id: id.into(),
        href: href.to_owned(),
        post_id,
        author: author.into(),
        author_id: author_id.into(),
        subreddit,
        score,
        content,
        is_deleted,
    })
}

/// The post of a thread page together with every comment in document order.
pub fn thread(html: &Html) -> anyhow::Result<(Post, Vec<Comment>)> {
    let root = html
        .select(&SEL_POST)
        .next()
        .ok_or_else(|| anyhow!("no <{POST_TAG}> on page"))?;
    let post = post(root)?;

    let comments = html
        .select(&SEL_COMMENT)
        .map(|root| comment(root, &post.id))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok((post, comments))
}

/// Every comment listed on a profile page, attributed to the profile's username.
pub fn profile(html: &Html) -> anyhow::Result<Vec<UserComment>> {
    let heading = html
        .select(&SEL_H1)
        .next()
        .ok_or_else(|| anyhow!("no username heading on page"))?;
    let username = inner_text(heading);

    html.select(&SEL_PROFILE_COMMENT)
        .map(|root| user_comment(root, &username))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first<'a>(html: &'a Html, selector: &Selector) -> ElementRef<'a> {
        html.select(selector).next().unwrap()
    }

    const POST: &str = r##"
        <shreddit-post id="t3_abc" post-title="Hello world" permalink="/r/rust/comments/abc/hello_world/"
            author="ferris" author-id="t2_crab" subreddit-prefixed-name="r/rust" subreddit-id="t5_2qh1"
            comment-count="2" score="42" created-timestamp="2024-05-01T10:00:00.000000+0000">
            <div slot="text-body"><p>First   line</p><p>Second <a href="#">link</a> line</p></div>
        </shreddit-post>
    "##;

    #[test]
    fn parses_post() {
        let html = Html::parse_document(POST);
        let post = post(first(&html, &SEL_POST)).unwrap();

        assert_eq!(post.id, "t3_abc");
        assert_eq!(post.title, "Hello world");
        assert_eq!(post.author_id.as_deref(), Some("t2_crab"));
        assert_eq!(post.subreddit, "r/rust");
        assert_eq!(post.comment_count, 2);
        assert_eq!(post.score, 42);
        assert_eq!(post.content.as_deref(), Some("First line\nSecond link line"));
        assert!(!post.is_deleted);
    }

    #[test]
    fn post_without_body_or_author_id() {
        let html = Html::parse_document(
            r#"<shreddit-post id="t3_x" post-title="[deleted by user]" permalink="/p" author="[deleted]"
                subreddit-prefixed-name="r/a" subreddit-id="t5_a" comment-count="0" score="1"
                created-timestamp="t"></shreddit-post>"#,
        );
        let post = post(first(&html, &SEL_POST)).unwrap();

        assert_eq!(post.author_id, None);
        assert_eq!(post.content, None);
        assert!(post.is_deleted);
    }

    #[test]
    fn removed_banner_marks_post_deleted() {
        let html = Html::parse_document(
            r#"<shreddit-post id="t3_x" post-title="fine" permalink="/p" author="a"
                subreddit-prefixed-name="r/a" subreddit-id="t5_a" comment-count="0" score="1"
                created-timestamp="t"><div slot="post-removed-banner">removed</div></shreddit-post>"#,
        );

        assert!(post(first(&html, &SEL_POST)).unwrap().is_deleted);
    }

    #[test]
    fn post_missing_required_attribute() {
        let html = Html::parse_document(r#"<shreddit-post id="t3_x"></shreddit-post>"#);
        let err = post(first(&html, &SEL_POST)).unwrap_err();

        assert!(err.to_string().contains("post-title"), "{err}");
    }

    #[test]
    fn post_with_bad_count() {
        let html = Html::parse_document(
            r#"<shreddit-post id="t3_x" post-title="t" permalink="/p" author="a"
                subreddit-prefixed-name="r/a" subreddit-id="t5_a" comment-count="many" score="1"
                created-timestamp="t"></shreddit-post>"#,
        );

        assert!(post(first(&html, &SEL_POST)).is_err());
    }

    const THREAD: &str = r#"
        <shreddit-comment thingid="t1_a" permalink="/r/rust/comments/abc/c/a/" author="alice" score="5"
            is-comment-deleted="false">
            <div slot="commentMeta"><time datetime="2024-05-01T11:00:00.000Z">1h</time></div>
            <div slot="comment"><p>Top level</p></div>
            <shreddit-comment thingid="t1_b" parentid="t1_a" author="[deleted]" score=""
                is-comment-deleted="false">
                <div slot="commentMeta"><time datetime="2024-05-01T12:00:00.000Z">1h</time></div>
                <shreddit-comment thingid="t1_c" parentid="t1_b" author="carol" score="-3">
                    <div slot="commentMeta"><time datetime="2024-05-01T13:00:00.000Z">1h</time></div>
                    <div slot="comment">Reply to a deleted one</div>
                </shreddit-comment>
            </shreddit-comment>
        </shreddit-comment>
    "#;

    #[test]
    fn parses_comments_in_document_order() {
        let html = Html::parse_document(THREAD);
        let comments = html
            .select(&SEL_COMMENT)
            .map(|root| comment(root, "t3_abc"))
            .collect::<anyhow::Result<Vec<_>>>()
            .unwrap();

        let ids = comments.iter().map(|c| c.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["t1_a", "t1_b", "t1_c"]);

        let [a, b, c] = &comments[..] else { unreachable!() };

        assert_eq!(a.parent_id, None);
        assert_eq!(a.score, Some(5));
        assert_eq!(a.content.as_deref(), Some("Top level"));
        assert_eq!(a.created_at, "2024-05-01T11:00:00.000Z");
        assert!(a.post_id == "t3_abc");

        assert_eq!(b.parent_id.as_deref(), Some("t1_a"));
        assert_eq!(b.score, None);
        assert!(b.is_deleted);
        assert_eq!(b.content, None);
        assert_eq!(b.created_at, "2024-05-01T12:00:00.000Z");

        assert_eq!(c.score, Some(-3));
        assert_eq!(c.content.as_deref(), Some("Reply to a deleted one"));
        assert_eq!(c.permalink, None);
    }

    #[test]
    fn comment_without_body_is_deleted_regardless_of_flag() {
        let html = Html::parse_document(
            r#"<shreddit-comment thingid="t1_z" author="zed" score="3" is-comment-deleted="false">
                <div slot="commentMeta"><time datetime="d"></time></div>
            </shreddit-comment>"#,
        );
        let comment = comment(first(&html, &SEL_COMMENT), "t3_abc").unwrap();

        assert!(comment.is_deleted);
        assert_eq!(comment.content, None);
    }

    #[test]
    fn flagged_comment_drops_body() {
        let html = Html::parse_document(
            r#"<shreddit-comment thingid="t1_z" author="zed" is-comment-deleted="true">
                <div slot="commentMeta"><time datetime="d"></time></div>
                <div slot="comment">[removed]</div>
            </shreddit-comment>"#,
        );
        let comment = comment(first(&html, &SEL_COMMENT), "t3_abc").unwrap();

        assert!(comment.is_deleted);
        assert_eq!(comment.content, None);
        assert_eq!(comment.score, None);
    }

    #[test]
    fn comment_without_time_fails() {
        let html = Html::parse_document(
            r#"<shreddit-comment thingid="t1_z" author="zed"><div slot="comment">x</div></shreddit-comment>"#,
        );

        assert!(comment(first(&html, &SEL_COMMENT), "t3_abc").is_err());
    }

    #[test]
    fn splits_href() {
        let (subreddit, post_id) =
            split_href("/r/universityofamsterdam/comments/1c2d3e/some_title/l0abcd/").unwrap();

        assert_eq!(subreddit, "universityofamsterdam");
        assert_eq!(post_id, "t3_1c2d3e");
        assert!(split_href("/r/short").is_err());
    }

    const PROFILE: &str = r#"
        <h1> spez </h1>
        <shreddit-profile-comment comment-id="t1_p" href="/r/rust/comments/abc/title/t1_p/" user-id="t2_s">
            <shreddit-comment-action-row score="12"></shreddit-comment-action-row>
            <div id="-post-rtjson-content"><p>hello</p><p>there</p></div>
        </shreddit-profile-comment>
        <shreddit-profile-comment comment-id="t1_q" href="/r/golang/comments/def/title/t1_q/" user-id="t2_s">
            <shreddit-comment-action-row score="0"></shreddit-comment-action-row>
        </shreddit-profile-comment>
    "#;

    #[test]
    fn parses_profile() {
        let html = Html::parse_document(PROFILE);
        let comments = profile(&html).unwrap();

        assert_eq!(comments.len(), 2);

        assert_eq!(comments[0].author, "spez");
        assert_eq!(comments[0].subreddit, "rust");
        assert_eq!(comments[0].post_id, "t3_abc");
        assert_eq!(comments[0].score, 12);
        assert_eq!(comments[0].content.as_deref(), Some("hello\nthere"));
        assert!(!comments[0].is_deleted);

        assert_eq!(comments[1].subreddit, "golang");
        assert!(comments[1].is_deleted);
        assert_eq!(comments[1].content, None);
    }

    #[test]
    fn thread_needs_a_post() {
        let html = Html::parse_document(THREAD);
        assert!(thread(&html).is_err());
    }

    #[test]
    fn text_walk() {
        let html = Html::parse_fragment("<div>a<br>b <span> c </span><script>x()</script><ul><li>d</li><li>e</li></ul></div>");
        let root = html.root_element();

        assert_eq!(inner_text(root), "a\nb c\nd\ne");
    }
}
