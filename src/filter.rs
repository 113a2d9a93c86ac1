/// Folder filter options and the headings shown above results
use serde::{Deserialize, Serialize};

use crate::bookmarks::{BookmarkNode, count_matching};

/// Top-level folders the browser creates; they are descended into but never offered
const SYSTEM_FOLDERS: [&str; 3] = ["Bookmarks Bar", "Other Bookmarks", "Mobile Bookmarks"];

/// An entry of the folder filter dropdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOption {
    /// Folder id
    pub value: String,
    pub label: String,
    /// Ancestor chain as `-root-...-self-`, so ancestry is a substring test
    pub path_id: String,
    pub level: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FolderFilter {
    #[default]
    All,
    Folder(String),
}

impl FolderFilter {
    /// Parse a dropdown value; "all", "0", and "" mean no filter
    pub fn from_value(value: &str) -> FolderFilter {
        match value.trim() {
            "" | "0" | "all" => FolderFilter::All,
            id => FolderFilter::Folder(id.to_string()),
        }
    }

    pub fn value(&self) -> &str {
        match self {
            FolderFilter::All => "all",
            FolderFilter::Folder(id) => id,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, FolderFilter::Folder(_))
    }

    /// True when `folder_id` is the filtered folder, one of its ancestors, or
    /// one of its descendants
    pub fn is_in_scope(&self, folder_id: &str, options: &[FilterOption]) -> bool {
        let FolderFilter::Folder(filter_id) = self else {
            return true;
        };
        if folder_id == filter_id {
            return true;
        }

        let ancestor = find_option(options, self)
            .is_some_and(|option| option.path_id.contains(&format!("-{}-", folder_id)));
        let descendant = options
            .iter()
            .find(|option| option.value == folder_id)
            .is_some_and(|option| option.path_id.contains(&format!("-{}-", filter_id)));

        ancestor || descendant
    }
}

/// Flatten the folder hierarchy into dropdown options
pub fn filter_options(tree: &[BookmarkNode]) -> Vec<FilterOption> {
    let mut options = Vec::new();
    collect_options(tree, "", "", 0, false, &mut options);
    options
}

/// Every named folder, system folders included, as destinations for a move
pub fn move_targets(tree: &[BookmarkNode]) -> Vec<FilterOption> {
    let mut options = Vec::new();
    collect_options(tree, "", "", 0, true, &mut options);
    options
}

fn collect_options(
    nodes: &[BookmarkNode],
    prefix: &str,
    path: &str,
    level: usize,
    with_system: bool,
    out: &mut Vec<FilterOption>,
) {
    for node in nodes.iter().filter(|node| node.is_folder()) {
        let path = format!("{}-{}", path, node.id);

        let hidden = node.title.is_empty() || (!with_system && SYSTEM_FOLDERS.contains(&node.title.as_str()));
        if hidden {
            collect_options(node.children(), prefix, &path, level, with_system, out);
            continue;
        }

        let label = if prefix.is_empty() {
            node.title.clone()
        } else {
            format!("{} - {}", prefix, node.title)
        };

        out.push(FilterOption {
            value: node.id.clone(),
            label: label.clone(),
            path_id: format!("{}-", path),
            level,
        });
        collect_options(node.children(), &label, &path, level + 1, with_system, out);
    }
}

pub fn find_option<'a>(options: &'a [FilterOption], filter: &FolderFilter) -> Option<&'a FilterOption> {
    match filter {
        FolderFilter::All => None,
        FolderFilter::Folder(id) => options.iter().find(|option| &option.value == id),
    }
}

/// Matching bookmarks of `folder` that fall inside the active filter.
/// Ancestors of the filtered folder only contribute through it.
pub fn count_in_folder(folder: &BookmarkNode, term: &str, filter: &FolderFilter, options: &[FilterOption]) -> usize {
    let FolderFilter::Folder(filter_id) = filter else {
        return count_matching(folder, term);
    };
    if &folder.id == filter_id {
        return count_matching(folder, term);
    }

    if find_option(options, filter).is_none() {
        log::warn!("No filter option for folder {}", filter_id);
        return count_matching(folder, term);
    }
    if !filter.is_in_scope(&folder.id, options) {
        return 0;
    }

    folder
        .children()
        .iter()
        .filter(|child| child.is_folder())
        .map(|child| count_in_folder(child, term, filter, options))
        .sum()
}

fn folder_path(option: &FilterOption) -> String {
    option
        .label
        .trim_start_matches(|c: char| c.is_whitespace() || c == '-')
        .replace(" - ", " > ")
}

/// Heading for the result list
pub fn dynamic_title(term: &str, filter: &FolderFilter, count: usize, options: &[FilterOption]) -> String {
    let term = term.trim();
    let path = find_option(options, filter).map(folder_path);

    match (term.is_empty(), path) {
        (false, Some(path)) if count == 0 => format!("No results for \"{}\" in {}", term, path),
        (false, Some(path)) => format!("Results for \"{}\" in {} ({})", term, path, count),
        (false, None) if count == 0 => format!("No results for \"{}\"", term),
        (false, None) => format!("Results for \"{}\" ({})", term, count),
        (true, Some(path)) => format!("Folder: {} ({})", path, count),
        (true, None) => format!("Bookmarks ({})", count),
    }
}

/// Heading for one folder section; `None` hides folders without matches
pub fn section_title(folder: &BookmarkNode, term: &str) -> Option<String> {
    let count = count_matching(folder, term);
    if count == 0 {
        return None;
    }

    let term = term.trim();
    if term.is_empty() {
        Some(format!("{} ({})", folder.title, count))
    } else {
        Some(format!("{} - Results for \"{}\" ({})", folder.title, term, count))
    }
}
