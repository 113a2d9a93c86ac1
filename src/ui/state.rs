/// Page-wide UI state, owned by the root component and changed only through `UiAction`
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use yew::prelude::*;

use crate::bookmarks::BookmarkNode;
use crate::filter::FolderFilter;
use crate::settings::{Appearance, ViewMode};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UiState {
    /// Trimmed, lowercased search term
    pub search: String,
    pub filter: FolderFilter,
    pub view_mode: ViewMode,
    pub appearance: Appearance,
    /// Index into the currently rendered cards
    pub focused: Option<usize>,
    /// Bookmark id whose action menu is open
    pub menu_open: Option<String>,
    pub editing: Option<BookmarkNode>,
    pub settings_open: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    Search(String),
    Filter(FolderFilter),
    SetView(ViewMode),
    ToggleView,
    SetAppearance(Appearance),
    Focus(Option<usize>),
    ToggleMenu(String),
    CloseMenu,
    StartEdit(BookmarkNode),
    StopEdit,
    ToggleSettings,
    Escape,
    /// The rendered card list changed length
    ResultsChanged(usize),
}

impl Reducible for UiState {
    type Action = UiAction;

    fn reduce(self: Rc<Self>, action: Self::Action) -> Rc<Self> {
        let mut next = (*self).clone();

        match action {
            UiAction::Search(term) => {
                next.search = term.trim().to_lowercase();
                next.focused = None;
            }
            UiAction::Filter(filter) => {
                next.filter = filter;
                next.focused = None;
            }
            UiAction::SetView(mode) => next.view_mode = mode,
            UiAction::ToggleView => {
                next.view_mode = next.view_mode.toggled();
                next.focused = None;
            }
            UiAction::SetAppearance(appearance) => next.appearance = appearance,
            UiAction::Focus(index) => next.focused = index,
            UiAction::ToggleMenu(id) => {
                next.menu_open = if next.menu_open.as_deref() == Some(id.as_str()) {
                    None
                } else {
                    Some(id)
                };
            }
            UiAction::CloseMenu => next.menu_open = None,
            UiAction::StartEdit(node) => {
                next.menu_open = None;
                next.editing = Some(node);
            }
            UiAction::StopEdit => next.editing = None,
            UiAction::ToggleSettings => next.settings_open = !next.settings_open,
            UiAction::Escape => {
                if next.editing.is_some() {
                    next.editing = None;
                } else if next.settings_open {
                    next.settings_open = false;
                } else if next.menu_open.is_some() {
                    next.menu_open = None;
                } else {
                    next.focused = None;
                }
            }
            UiAction::ResultsChanged(len) => {
                next.focused = match next.focused {
                    Some(_) if len == 0 => None,
                    Some(index) => Some(index.min(len - 1)),
                    None => None,
                };
            }
        }

        if next == *self { self } else { Rc::new(next) }
    }
}

impl UiState {
    pub fn modal_open(&self) -> bool {
        self.editing.is_some() || self.settings_open
    }
}

/// Image sources for rendered bookmarks, keyed by URL, plus in-flight captures
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Thumbnails {
    pub sources: HashMap<String, String>,
    pub capturing: HashSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThumbnailAction {
    Loaded(HashMap<String, String>),
    Stored { url: String, src: String },
    CaptureStarted(String),
    CaptureFinished(String),
}

impl Reducible for Thumbnails {
    type Action = ThumbnailAction;

    fn reduce(self: Rc<Self>, action: Self::Action) -> Rc<Self> {
        let mut next = (*self).clone();

        match action {
            ThumbnailAction::Loaded(sources) => next.sources = sources,
            ThumbnailAction::Stored { url, src } => {
                next.sources.insert(url, src);
            }
            ThumbnailAction::CaptureStarted(url) => {
                next.capturing.insert(url);
            }
            ThumbnailAction::CaptureFinished(url) => {
                next.capturing.remove(&url);
            }
        }

        Rc::new(next)
    }
}
