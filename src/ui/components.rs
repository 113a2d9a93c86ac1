/// Reusable UI components

use yew::prelude::*;

use crate::bookmarks::{BookmarkNode, Segment, display_host, highlight};

#[derive(Properties, PartialEq)]
pub struct HighlightedProps {
    pub text: AttrValue,
    #[prop_or_default]
    pub term: AttrValue,
}

#[function_component(Highlighted)]
pub fn highlighted(props: &HighlightedProps) -> Html {
    html! {
        <>
            {for highlight(&props.text, &props.term).into_iter().map(|segment| match segment {
                Segment::Plain(text) => html! { {text} },
                Segment::Match(text) => html! { <mark class="search-highlight">{text}</mark> },
            })}
        </>
    }
}

/// Something the user asked a card to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardAction {
    Focus,
    ToggleMenu,
    Open,
    OpenInNewTab,
    Edit,
    Capture,
    Delete,
}

pub fn card_id(index: usize) -> String {
    format!("card-{}", index)
}

#[derive(Properties, PartialEq)]
pub struct BookmarkCardProps {
    pub node: BookmarkNode,
    /// Position among all rendered cards, for keyboard focus
    pub index: usize,
    #[prop_or_default]
    pub term: AttrValue,
    pub src: AttrValue,
    /// `src` is the favicon fallback, so offer a capture
    pub show_capture: bool,
    pub capturing: bool,
    pub focused: bool,
    pub menu_open: bool,
    pub on_action: Callback<(CardAction, BookmarkNode, usize)>,
}

#[function_component(BookmarkCard)]
pub fn bookmark_card(props: &BookmarkCardProps) -> Html {
    let url = props.node.url.clone().unwrap_or_default();
    let host = display_host(&url);

    let emit = {
        let on_action = props.on_action.clone();
        let node = props.node.clone();
        let index = props.index;
        move |action: CardAction| {
            let on_action = on_action.clone();
            let node = node.clone();
            Callback::from(move |e: MouseEvent| {
                e.stop_propagation();
                on_action.emit((action, node.clone(), index));
            })
        }
    };

    let on_focus = {
        let on_action = props.on_action.clone();
        let node = props.node.clone();
        let index = props.index;
        Callback::from(move |_: FocusEvent| on_action.emit((CardAction::Focus, node.clone(), index)))
    };

    let image_class = if props.show_capture {
        "bookmark-favicon"
    } else {
        "bookmark-thumbnail"
    };

    html! {
        <div
            id={card_id(props.index)}
            class={classes!("card", props.focused.then_some("focused"))}
            tabindex="0"
            onfocus={on_focus}
        >
            <a href={url.clone()} class="card-image">
                <img src={props.src.clone()} alt={url.clone()} class={image_class} />
            </a>

            <div class="card-body">
                <a href={url.clone()} class="card-title">
                    <Highlighted text={props.node.title.clone()} term={props.term.clone()} />
                </a>
                if let Some(host) = host {
                    <span class="card-host">
                        <Highlighted text={host} term={props.term.clone()} />
                    </span>
                }
            </div>

            <div class="bookmark-actions">
                if props.show_capture {
                    <button class="capture-btn" disabled={props.capturing} onclick={emit(CardAction::Capture)}>
                        {if props.capturing { "Capturing..." } else { "Capture Thumbnail" }}
                    </button>
                }
                <button class="more-btn" title="More actions" onclick={emit(CardAction::ToggleMenu)}>
                    {"⋯"}
                </button>

                if props.menu_open {
                    <div class="popup-menu">
                        <button class="popup-item" onclick={emit(CardAction::Open)}>{"Open"}</button>
                        <button class="popup-item" onclick={emit(CardAction::OpenInNewTab)}>{"Open in New Tab"}</button>
                        <button class="popup-item" onclick={emit(CardAction::Edit)}>{"Edit"}</button>
                        <button class="popup-item" disabled={props.capturing} onclick={emit(CardAction::Capture)}>
                            {if props.show_capture { "Capture Thumbnail" } else { "Recapture Thumbnail" }}
                        </button>
                        <div class="popup-divider"></div>
                        <button class="popup-item popup-item-danger" onclick={emit(CardAction::Delete)}>{"Delete"}</button>
                    </div>
                }
            </div>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct SectionHeadingProps {
    pub title: AttrValue,
}

#[function_component(SectionHeading)]
pub fn section_heading(props: &SectionHeadingProps) -> Html {
    html! {
        <h2 class="section-title">{props.title.clone()}</h2>
    }
}
