/// New tab page: searchable, filterable bookmark grid with captured thumbnails

use std::collections::{BTreeSet, HashMap};

use patternfly_yew::prelude::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, HtmlElement, HtmlInputElement, HtmlSelectElement, ScrollIntoViewOptions, ScrollLogicalPosition};
use yew::prelude::*;

use super::components::{BookmarkCard, CardAction, SectionHeading, card_id};
use super::edit_dialog::EditDialog;
use super::state::{ThumbnailAction, Thumbnails, UiAction, UiState};
use crate::bookmarks::{self, BookmarkNode};
use crate::filter::{self, FolderFilter};
use crate::host::{self, BookmarkEdit};
use crate::navigation::{self, KeyContext, Shortcut};
use crate::settings::{Appearance, Settings, ViewMode};
use crate::thumbnail::CaptureOutcome;

#[derive(Clone, PartialEq)]
enum LoadState {
    Loading,
    Idle,
    Error(String),
}

/// A block of cards, optionally under a folder heading
#[derive(Debug, Clone, PartialEq)]
struct Section {
    title: Option<String>,
    cards: Vec<BookmarkNode>,
}

fn scope(tree: &[BookmarkNode], filter: &FolderFilter) -> Vec<BookmarkNode> {
    match filter {
        FolderFilter::All => tree.to_vec(),
        FolderFilter::Folder(id) => bookmarks::find_node(tree, id).cloned().into_iter().collect(),
    }
}

/// What to render for the current search, filter, and view mode
fn layout(tree: &[BookmarkNode], ui: &UiState) -> Vec<Section> {
    let scoped = scope(tree, &ui.filter);

    match ui.view_mode {
        ViewMode::Grid => vec![Section {
            title: None,
            cards: bookmarks::search(&scoped, &ui.search)
                .into_iter()
                .map(|flat| flat.bookmark)
                .collect(),
        }],
        ViewMode::Folder => bookmarks::folder_sections(&scoped, &ui.search)
            .into_iter()
            .filter_map(|folder| {
                filter::section_title(&folder, &ui.search).map(|title| Section {
                    title: Some(title),
                    cards: folder.children().to_vec(),
                })
            })
            .collect(),
    }
}

async fn reload_tree(tree: UseStateHandle<Vec<BookmarkNode>>, load_state: UseStateHandle<LoadState>) {
    match host::load_tree().await {
        Ok(nodes) => {
            log::debug!("Loaded {} root bookmark nodes", nodes.len());
            tree.set(nodes);
            load_state.set(LoadState::Idle);
        }
        Err(e) => {
            log::error!("{}", e);
            load_state.set(LoadState::Error(e));
        }
    }
}

fn document() -> Option<web_sys::Document> {
    web_sys::window().and_then(|window| window.document())
}

fn active_text_field() -> Option<HtmlElement> {
    document()
        .and_then(|doc| doc.active_element())
        .filter(|el| matches!(el.tag_name().as_str(), "INPUT" | "TEXTAREA" | "SELECT"))
        .and_then(|el| el.dyn_into::<HtmlElement>().ok())
}

fn focus_card(index: usize) {
    let Some(card) = document()
        .and_then(|doc| doc.get_element_by_id(&card_id(index)))
        .and_then(|el| el.dyn_into::<HtmlElement>().ok())
    else {
        return;
    };

    let _ = card.focus();
    let options = ScrollIntoViewOptions::new();
    options.set_block(ScrollLogicalPosition::Nearest);
    options.set_inline(ScrollLogicalPosition::Nearest);
    card.scroll_into_view_with_scroll_into_view_options(&options);
}

fn confirm(message: &str) -> bool {
    web_sys::window()
        .and_then(|window| window.confirm_with_message(message).ok())
        .unwrap_or(false)
}

#[function_component(NewTab)]
pub fn new_tab() -> Html {
    let ui = use_reducer(UiState::default);
    let thumbs = use_reducer(Thumbnails::default);
    let tree = use_state(Vec::<BookmarkNode>::new);
    let load_state = use_state(|| LoadState::Loading);
    let settings = use_state(Settings::new);
    let settings_loaded = use_state(|| false);
    let search_text = use_state(String::new);
    let notice = use_state(|| None::<String>);
    let edit_error = use_state(|| None::<String>);

    let search_ref = use_node_ref();
    let filter_ref = use_node_ref();
    let grid_ref = use_node_ref();

    let pipeline = use_memo(settings.thumbnails.clone(), |config| host::chrome_pipeline(config.clone()));

    // Load settings and the bookmark tree on mount
    {
        let ui = ui.clone();
        let settings = settings.clone();
        let settings_loaded = settings_loaded.clone();
        let tree = tree.clone();
        let load_state = load_state.clone();

        use_effect_with((), move |_| {
            spawn_local(async move {
                let loaded = host::load_settings().await;
                ui.dispatch(UiAction::SetView(loaded.view_mode));
                ui.dispatch(UiAction::SetAppearance(loaded.appearance));
                settings.set(loaded);
                settings_loaded.set(true);

                reload_tree(tree, load_state).await;
            });
            || ()
        });
    }

    // Persist view and appearance changes
    {
        let settings = settings.clone();
        use_effect_with(
            (ui.view_mode, ui.appearance, *settings_loaded),
            move |(view_mode, appearance, loaded)| {
                if *loaded && (settings.view_mode != *view_mode || settings.appearance != *appearance) {
                    let mut next = (*settings).clone();
                    next.view_mode = *view_mode;
                    next.appearance = *appearance;
                    settings.set(next.clone());

                    spawn_local(async move {
                        if let Err(e) = host::save_settings(&next).await {
                            log::error!("{}", e);
                        }
                    });
                }
                || ()
            },
        );
    }

    // Apply the theme to the document root
    use_effect_with(ui.appearance, |appearance| {
        let dark = appearance.is_dark(host::system_prefers_dark());
        if let Some(root) = document().and_then(|doc| doc.document_element()) {
            let _ = root.class_list().toggle_with_force("dark", dark);
        }
        || ()
    });

    // Resolve every bookmark's image source whenever the tree changes
    {
        let thumbs = thumbs.clone();
        let pipeline = pipeline.clone();
        use_effect_with((*tree).clone(), move |tree| {
            let urls: BTreeSet<String> = tree
                .iter()
                .flat_map(bookmarks::collect_bookmarks)
                .filter_map(|flat| flat.bookmark.url)
                .collect();

            spawn_local(async move {
                let lookups = urls.into_iter().map(|url| {
                    let pipeline = pipeline.clone();
                    async move {
                        let src = pipeline.display_url(&url).await;
                        (url, src)
                    }
                });
                let sources: HashMap<String, String> = futures::future::join_all(lookups).await.into_iter().collect();
                thumbs.dispatch(ThumbnailAction::Loaded(sources));
            });
            || ()
        });
    }

    let sections = layout(&tree, &ui);
    let cards: Vec<BookmarkNode> = sections.iter().flat_map(|s| s.cards.iter().cloned()).collect();
    let section_lengths: Vec<usize> = sections.iter().map(|s| s.cards.len()).collect();

    {
        let ui = ui.clone();
        use_effect_with(cards.len(), move |len| {
            ui.dispatch(UiAction::ResultsChanged(*len));
            || ()
        });
    }

    use_effect_with(ui.focused, |focused| {
        if let Some(index) = focused {
            focus_card(*index);
        }
        || ()
    });

    let on_capture = {
        let thumbs = thumbs.clone();
        let pipeline = pipeline.clone();

        Callback::from(move |node: BookmarkNode| {
            let Some(url) = node.url.clone() else {
                return;
            };
            if thumbs.capturing.contains(&url) {
                return;
            }
            thumbs.dispatch(ThumbnailAction::CaptureStarted(url.clone()));

            let thumbs = thumbs.clone();
            let pipeline = pipeline.clone();
            spawn_local(async move {
                let on_update = {
                    let thumbs = thumbs.clone();
                    move |url: &str, src: &str| {
                        thumbs.dispatch(ThumbnailAction::Stored {
                            url: url.to_string(),
                            src: src.to_string(),
                        });
                    }
                };

                if let CaptureOutcome::Failed(e) = pipeline.capture(&url, &node.title, on_update).await {
                    log::warn!("Thumbnail capture for {} failed: {}", url, e);
                }
                thumbs.dispatch(ThumbnailAction::CaptureFinished(url));
            });
        })
    };

    let on_card_action = {
        let ui = ui.clone();
        let pipeline = pipeline.clone();
        let tree = tree.clone();
        let load_state = load_state.clone();
        let notice = notice.clone();
        let edit_error = edit_error.clone();
        let on_capture = on_capture.clone();

        Callback::from(move |(action, node, index): (CardAction, BookmarkNode, usize)| {
            let url = node.url.clone().unwrap_or_default();

            match action {
                CardAction::Focus => ui.dispatch(UiAction::Focus(Some(index))),
                CardAction::ToggleMenu => ui.dispatch(UiAction::ToggleMenu(node.id.clone())),
                CardAction::Open | CardAction::OpenInNewTab => {
                    ui.dispatch(UiAction::CloseMenu);
                    let new_tab = action == CardAction::OpenInNewTab;
                    spawn_local(async move {
                        if let Err(e) = host::open_url(&url, new_tab).await {
                            log::error!("{}", e);
                        }
                    });
                }
                CardAction::Edit => {
                    edit_error.set(None);
                    ui.dispatch(UiAction::StartEdit(node));
                }
                CardAction::Capture => {
                    ui.dispatch(UiAction::CloseMenu);
                    on_capture.emit(node);
                }
                CardAction::Delete => {
                    ui.dispatch(UiAction::CloseMenu);
                    if !confirm(&format!("Delete \"{}\"?", node.title)) {
                        return;
                    }

                    let pipeline = pipeline.clone();
                    let tree = tree.clone();
                    let load_state = load_state.clone();
                    let notice = notice.clone();
                    spawn_local(async move {
                        match host::delete_bookmark(&node, &pipeline).await {
                            Ok(()) => reload_tree(tree, load_state).await,
                            Err(e) => notice.set(Some(e)),
                        }
                    });
                }
            }
        })
    };

    let on_save_edit = {
        let ui = ui.clone();
        let pipeline = pipeline.clone();
        let tree = tree.clone();
        let load_state = load_state.clone();
        let edit_error = edit_error.clone();

        Callback::from(move |edit: BookmarkEdit| {
            let Some(original) = ui.editing.clone() else {
                return;
            };

            let ui = ui.clone();
            let pipeline = pipeline.clone();
            let tree = tree.clone();
            let load_state = load_state.clone();
            let edit_error = edit_error.clone();
            spawn_local(async move {
                match host::save_edit(&original, &edit, &pipeline).await {
                    Ok(()) => {
                        ui.dispatch(UiAction::StopEdit);
                        reload_tree(tree, load_state).await;
                    }
                    Err(e) => edit_error.set(Some(e)),
                }
            });
        })
    };

    let on_cancel_edit = {
        let ui = ui.clone();
        Callback::from(move |_: ()| ui.dispatch(UiAction::StopEdit))
    };

    // Keyboard shortcuts; the document listener always calls the latest handler
    let on_keydown = {
        let ui = ui.clone();
        let cards = cards.clone();
        let section_lengths = section_lengths.clone();
        let tree = tree.clone();
        let load_state = load_state.clone();
        let search_ref = search_ref.clone();
        let filter_ref = filter_ref.clone();
        let grid_ref = grid_ref.clone();
        let on_card_action = on_card_action.clone();

        Callback::from(move |e: KeyboardEvent| {
            let text_field = active_text_field();
            let ctx = KeyContext {
                typing: text_field.is_some(),
                card_focused: ui.focused.is_some(),
                editing: ui.editing.is_some(),
                modified: e.ctrl_key() || e.meta_key() || e.alt_key(),
            };
            let Some(shortcut) = navigation::shortcut_for(&e.key(), ctx) else {
                return;
            };

            let card_action = match shortcut {
                Shortcut::OpenFocused => Some(CardAction::Open),
                Shortcut::EditFocused => Some(CardAction::Edit),
                Shortcut::DeleteFocused => Some(CardAction::Delete),
                Shortcut::CaptureFocused => Some(CardAction::Capture),
                _ => None,
            };
            if let Some(action) = card_action {
                if let Some((index, node)) = ui.focused.and_then(|i| cards.get(i).map(|node| (i, node.clone()))) {
                    e.prevent_default();
                    on_card_action.emit((action, node, index));
                }
                return;
            }

            match shortcut {
                Shortcut::FocusSearch => {
                    e.prevent_default();
                    if let Some(input) = search_ref.cast::<HtmlInputElement>() {
                        let _ = input.focus();
                    }
                    if let Some(window) = web_sys::window() {
                        window.scroll_to_with_x_and_y(0.0, 0.0);
                    }
                }
                Shortcut::ToggleFilter => {
                    e.prevent_default();
                    if let Some(select) = filter_ref.cast::<HtmlSelectElement>() {
                        let _ = select.focus();
                    }
                }
                Shortcut::Refresh => {
                    let tree = tree.clone();
                    let load_state = load_state.clone();
                    spawn_local(reload_tree(tree, load_state));
                }
                Shortcut::OpenSettings => ui.dispatch(UiAction::ToggleSettings),
                Shortcut::Escape => {
                    if let Some(field) = text_field {
                        let _ = field.blur();
                    }
                    ui.dispatch(UiAction::Escape);
                }
                Shortcut::Move(arrow) => {
                    if ui.modal_open() {
                        return;
                    }
                    // Columns of the focused card's own grid; every section wraps independently
                    let section_grid = ui
                        .focused
                        .and_then(|i| document()?.get_element_by_id(&card_id(i)))
                        .and_then(|card| card.parent_element())
                        .or_else(|| grid_ref.cast::<Element>());
                    let columns = section_grid
                        .map(|el| navigation::columns_for_width(el.client_width() as f64))
                        .unwrap_or(1);
                    if let Some(next) = navigation::section_move(ui.focused, &section_lengths, columns, arrow) {
                        e.prevent_default();
                        ui.dispatch(UiAction::Focus(Some(next)));
                    }
                }
                // Enter in the edit dialog submits its form
                Shortcut::SaveEdit => {}
                Shortcut::OpenFocused | Shortcut::EditFocused | Shortcut::DeleteFocused | Shortcut::CaptureFocused => {}
            }
        })
    };

    let key_handler = use_mut_ref(Callback::<KeyboardEvent>::noop);
    *key_handler.borrow_mut() = on_keydown;

    use_effect_with((), move |_| {
        let listener = Closure::<dyn Fn(KeyboardEvent)>::new(move |e: KeyboardEvent| {
            let handler = key_handler.borrow().clone();
            handler.emit(e);
        });

        let doc = document();
        if let Some(doc) = &doc {
            let _ = doc.add_event_listener_with_callback("keydown", listener.as_ref().unchecked_ref());
        }

        move || {
            if let Some(doc) = doc {
                let _ = doc.remove_event_listener_with_callback("keydown", listener.as_ref().unchecked_ref());
            }
        }
    });

    let on_search_input = {
        let ui = ui.clone();
        let search_text = search_text.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                let value = input.value();
                ui.dispatch(UiAction::Search(value.clone()));
                search_text.set(value);
            }
        })
    };

    let on_clear_search = {
        let ui = ui.clone();
        let search_text = search_text.clone();
        Callback::from(move |_: MouseEvent| {
            search_text.set(String::new());
            ui.dispatch(UiAction::Search(String::new()));
        })
    };

    let on_filter_change = {
        let ui = ui.clone();
        Callback::from(move |e: Event| {
            if let Some(select) = e.target_dyn_into::<HtmlSelectElement>() {
                ui.dispatch(UiAction::Filter(FolderFilter::from_value(&select.value())));
            }
        })
    };

    let on_clear_filter = {
        let ui = ui.clone();
        Callback::from(move |_: MouseEvent| ui.dispatch(UiAction::Filter(FolderFilter::All)))
    };

    let on_toggle_view = {
        let ui = ui.clone();
        Callback::from(move |_: MouseEvent| ui.dispatch(UiAction::ToggleView))
    };

    let on_toggle_theme = {
        let ui = ui.clone();
        Callback::from(move |_: MouseEvent| {
            ui.dispatch(UiAction::SetAppearance(ui.appearance.toggled(host::system_prefers_dark())));
        })
    };

    let on_toggle_settings = {
        let ui = ui.clone();
        Callback::from(move |e: MouseEvent| {
            e.stop_propagation();
            ui.dispatch(UiAction::ToggleSettings);
        })
    };

    let on_appearance = {
        let ui = ui.clone();
        move |appearance: Appearance| {
            let ui = ui.clone();
            Callback::from(move |_: MouseEvent| ui.dispatch(UiAction::SetAppearance(appearance)))
        }
    };

    let on_page_click = {
        let ui = ui.clone();
        Callback::from(move |_: MouseEvent| {
            if ui.menu_open.is_some() {
                ui.dispatch(UiAction::CloseMenu);
            }
        })
    };

    let on_dismiss_notice = {
        let notice = notice.clone();
        Callback::from(move |_: MouseEvent| notice.set(None))
    };

    let options = filter::filter_options(&tree);
    let total: usize = tree
        .iter()
        .map(|root| filter::count_in_folder(root, &ui.search, &ui.filter, &options))
        .sum();
    let title = filter::dynamic_title(&ui.search, &ui.filter, total, &options);

    let mut offset = 0;
    let rendered_sections: Vec<Html> = sections
        .iter()
        .map(|section| {
            let start = offset;
            offset += section.cards.len();

            html! {
                <section class="bookmark-section">
                    if let Some(title) = &section.title {
                        <SectionHeading title={title.clone()} />
                    }
                    <div class="card-grid">
                        {for section.cards.iter().enumerate().map(|(i, node)| {
                            let index = start + i;
                            let url = node.url.clone().unwrap_or_default();
                            let src = thumbs
                                .sources
                                .get(&url)
                                .cloned()
                                .unwrap_or_else(|| pipeline.fallback_url(&url));
                            let show_capture = pipeline.is_fallback(&src);

                            html! {
                                <BookmarkCard
                                    key={node.id.clone()}
                                    node={node.clone()}
                                    index={index}
                                    term={ui.search.clone()}
                                    show_capture={show_capture}
                                    src={src}
                                    capturing={thumbs.capturing.contains(&url)}
                                    focused={ui.focused == Some(index)}
                                    menu_open={ui.menu_open.as_deref() == Some(node.id.as_str())}
                                    on_action={on_card_action.clone()}
                                />
                            }
                        })}
                    </div>
                </section>
            }
        })
        .collect();

    let view_class = match ui.view_mode {
        ViewMode::Grid => "grid-view",
        ViewMode::Folder => "folder-view",
    };

    html! {
        <div class="newtab" onclick={on_page_click}>
            <header class="toolbar">
                <div class="search-box">
                    <input
                        ref={search_ref}
                        id="search-input"
                        type="search"
                        placeholder="Search bookmarks"
                        value={(*search_text).clone()}
                        oninput={on_search_input}
                    />
                    if !search_text.is_empty() {
                        <button class="search-clear" title="Clear search" onclick={on_clear_search}>{"×"}</button>
                    }
                </div>

                <div class="filter-box">
                    <select ref={filter_ref} id="filter" onchange={on_filter_change}>
                        <option value="all" selected={!ui.filter.is_active()}>{"All Bookmarks"}</option>
                        {for options.iter().map(|option| html! {
                            <option value={option.value.clone()} selected={ui.filter.value() == option.value}>
                                {option.label.clone()}
                            </option>
                        })}
                    </select>
                    if ui.filter.is_active() {
                        <button class="filter-clear" title="Clear filter" onclick={on_clear_filter}>{"×"}</button>
                    }
                </div>

                <Button onclick={on_toggle_view} variant={ButtonVariant::Secondary}>
                    {match ui.view_mode {
                        ViewMode::Grid => "Folder View",
                        ViewMode::Folder => "Grid View",
                    }}
                </Button>
                <Button onclick={on_toggle_theme} variant={ButtonVariant::Plain}>
                    {"🌓"}
                </Button>
                <Button onclick={on_toggle_settings} variant={ButtonVariant::Plain}>
                    {"⚙️"}
                </Button>
            </header>

            if ui.settings_open {
                <div class="settings-panel">
                    <h2 class="settings-title">{"Appearance"}</h2>
                    <div class="theme-toggle">
                        {for [Appearance::Auto, Appearance::Light, Appearance::Dark].into_iter().map(|appearance| html! {
                            <button
                                class={classes!("theme-toggle-btn", (ui.appearance == appearance).then_some("active"))}
                                onclick={on_appearance(appearance)}
                            >
                                {appearance.label()}
                            </button>
                        })}
                    </div>
                    <p class="settings-hint">
                        {"Shortcuts: / or S search, F filter, R refresh, arrows move, Enter open, E edit, C capture, Delete remove, Esc close"}
                    </p>
                </div>
            }

            if let Some(message) = (*notice).clone() {
                <div class="message-top-margin" onclick={on_dismiss_notice}>
                    <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                        {message}
                    </Alert>
                </div>
            }

            <h1 class="results-title">{title}</h1>

            {match &*load_state {
                LoadState::Loading => html! {
                    <div class="loading-text-center">
                        <Spinner />
                    </div>
                },
                LoadState::Error(err) => html! {
                    <Alert r#type={AlertType::Danger} title={"Failed to load bookmarks"} inline={true}>
                        {err.clone()}
                    </Alert>
                },
                LoadState::Idle => html! {
                    <div ref={grid_ref} class={classes!("bookmarks-container", view_class)}>
                        {for rendered_sections}
                    </div>
                },
            }}

            if let Some(node) = ui.editing.clone() {
                <EditDialog
                    node={node}
                    folders={filter::move_targets(&tree)}
                    on_save={on_save_edit}
                    on_cancel={on_cancel_edit}
                    error={(*edit_error).clone()}
                />
            }
        </div>
    }
}
