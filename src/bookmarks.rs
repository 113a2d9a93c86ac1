/// Bookmark tree model, flattening, and search matching
use serde::{Deserialize, Serialize};

/// A node of the browser's bookmark tree; folders carry `children`, leaves carry `url`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkNode {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub children: Option<Vec<BookmarkNode>>,
    #[serde(default)]
    pub date_added: Option<f64>,
    #[serde(default)]
    pub date_last_used: Option<f64>,
}

impl BookmarkNode {
    pub fn is_folder(&self) -> bool {
        self.children.is_some()
    }

    pub fn children(&self) -> &[BookmarkNode] {
        self.children.as_deref().unwrap_or_default()
    }

    fn recency(&self) -> f64 {
        self.date_last_used.or(self.date_added).unwrap_or(0.0)
    }
}

/// A leaf bookmark together with the title of its immediate folder
#[derive(Debug, Clone, PartialEq)]
pub struct FlatBookmark {
    pub bookmark: BookmarkNode,
    pub folder: String,
}

/// Flatten a subtree into its leaf bookmarks
pub fn collect_bookmarks(node: &BookmarkNode) -> Vec<FlatBookmark> {
    let mut out = Vec::new();
    collect_into(node, "", &mut out);
    out
}

fn collect_into(node: &BookmarkNode, folder: &str, out: &mut Vec<FlatBookmark>) {
    match &node.children {
        Some(children) => {
            for child in children {
                collect_into(child, &node.title, out);
            }
        }
        None => out.push(FlatBookmark {
            bookmark: node.clone(),
            folder: folder.to_string(),
        }),
    }
}

/// Most recently used (or added) first
pub fn sort_by_recent(bookmarks: &mut [FlatBookmark]) {
    bookmarks.sort_by(|a, b| b.bookmark.recency().total_cmp(&a.bookmark.recency()));
}

/// Every space-separated word of `term` must occur in `text`, ignoring case
pub fn contains_search_term(text: &str, term: &str) -> bool {
    let text = text.to_lowercase();
    term.to_lowercase()
        .split_whitespace()
        .all(|word| text.contains(word))
}

pub fn matches_search(node: &BookmarkNode, term: &str) -> bool {
    if term.trim().is_empty() {
        return true;
    }
    contains_search_term(&node.title, term)
        || node
            .url
            .as_deref()
            .is_some_and(|url| contains_search_term(url, term))
}

/// Number of leaf bookmarks under `node` that match `term`
pub fn count_matching(node: &BookmarkNode, term: &str) -> usize {
    match &node.children {
        Some(children) => children.iter().map(|child| count_matching(child, term)).sum(),
        None if node.url.is_some() && matches_search(node, term) => 1,
        None => 0,
    }
}

pub fn find_node<'a>(nodes: &'a [BookmarkNode], id: &str) -> Option<&'a BookmarkNode> {
    nodes.iter().find_map(|node| {
        if node.id == id {
            Some(node)
        } else {
            find_node(node.children(), id)
        }
    })
}

/// Leaves of `nodes` matching `term`, most recent first
pub fn search(nodes: &[BookmarkNode], term: &str) -> Vec<FlatBookmark> {
    let mut found: Vec<FlatBookmark> = nodes
        .iter()
        .flat_map(collect_bookmarks)
        .filter(|flat| flat.bookmark.url.is_some() && matches_search(&flat.bookmark, term))
        .collect();
    sort_by_recent(&mut found);
    found
}

/// Folders that directly hold matching bookmarks, in tree order. Each returned
/// folder is a shallow copy whose children are just those matches.
pub fn folder_sections(nodes: &[BookmarkNode], term: &str) -> Vec<BookmarkNode> {
    let mut sections = Vec::new();
    for node in nodes.iter().filter(|node| node.is_folder()) {
        let matches: Vec<BookmarkNode> = node
            .children()
            .iter()
            .filter(|child| child.url.is_some() && matches_search(child, term))
            .cloned()
            .collect();

        if !matches.is_empty() {
            sections.push(BookmarkNode {
                children: Some(matches),
                ..node.clone()
            });
        }
        sections.extend(folder_sections(node.children(), term));
    }
    sections
}

/// A run of text that either matched a search word or didn't
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Plain(String),
    Match(String),
}

/// Split `text` into plain and matching runs for every word of `term`
pub fn highlight(text: &str, term: &str) -> Vec<Segment> {
    let words: Vec<String> = term.split_whitespace().map(str::to_lowercase).collect();
    if words.is_empty() || text.is_empty() {
        return vec![Segment::Plain(text.to_string())];
    }

    // Byte offsets in `lower` must line up with `text`
    let lower = text.to_lowercase();
    if lower.len() != text.len() {
        return vec![Segment::Plain(text.to_string())];
    }

    let mut marked = vec![false; text.len()];
    for word in &words {
        for (start, _) in lower.match_indices(word.as_str()) {
            marked[start..start + word.len()].iter_mut().for_each(|m| *m = true);
        }
    }

    let mut segments = Vec::new();
    let mut start = 0;
    for (idx, _) in text.char_indices().skip(1).chain(std::iter::once((text.len(), ' '))) {
        if idx == text.len() || marked[idx] != marked[start] {
            let run = text[start..idx].to_string();
            segments.push(if marked[start] { Segment::Match(run) } else { Segment::Plain(run) });
            start = idx;
        }
    }
    segments
}

/// Hostname shown under a card title
pub fn display_host(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|host| host.trim_start_matches("www.").to_string()))
}
