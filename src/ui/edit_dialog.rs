/// Modal dialog for editing a bookmark's title, URL, and folder

use web_sys::{HtmlInputElement, HtmlSelectElement};
use yew::prelude::*;

use crate::bookmarks::BookmarkNode;
use crate::filter::FilterOption;
use crate::host::BookmarkEdit;

#[derive(Properties, PartialEq)]
pub struct EditDialogProps {
    pub node: BookmarkNode,
    /// Folders the bookmark can be moved into
    pub folders: Vec<FilterOption>,
    pub on_save: Callback<BookmarkEdit>,
    pub on_cancel: Callback<()>,
    #[prop_or_default]
    pub error: Option<String>,
}

#[function_component(EditDialog)]
pub fn edit_dialog(props: &EditDialogProps) -> Html {
    let title = use_state(|| props.node.title.clone());
    let url = use_state(|| props.node.url.clone().unwrap_or_default());
    let parent = use_state(|| props.node.parent_id.clone().unwrap_or_default());
    let title_ref = use_node_ref();

    // Focus the title field when the dialog opens
    {
        let title_ref = title_ref.clone();
        use_effect_with((), move |_| {
            if let Some(input) = title_ref.cast::<HtmlInputElement>() {
                let _ = input.focus();
                input.select();
            }
            || ()
        });
    }

    let on_title_input = {
        let title = title.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                title.set(input.value());
            }
        })
    };

    let on_url_input = {
        let url = url.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                url.set(input.value());
            }
        })
    };

    let on_parent_change = {
        let parent = parent.clone();
        Callback::from(move |e: Event| {
            if let Some(select) = e.target_dyn_into::<HtmlSelectElement>() {
                parent.set(select.value());
            }
        })
    };

    // Enter in any field submits the form
    let on_submit = {
        let title = title.clone();
        let url = url.clone();
        let parent = parent.clone();
        let on_save = props.on_save.clone();
        Callback::from(move |e: SubmitEvent| {
            e.prevent_default();
            let parent_id = Some((*parent).clone()).filter(|id| !id.is_empty());
            on_save.emit(BookmarkEdit {
                title: (*title).clone(),
                url: (*url).clone(),
                parent_id,
            });
        })
    };

    let on_cancel = {
        let on_cancel = props.on_cancel.clone();
        Callback::from(move |_: MouseEvent| on_cancel.emit(()))
    };

    html! {
        <div class="modal-backdrop">
            <form class="modal edit-modal" onsubmit={on_submit}>
                <h3 class="modal-title">{"Edit Bookmark"}</h3>

                if let Some(error) = &props.error {
                    <p class="modal-error">{error}</p>
                }

                <label class="field">
                    <span class="field-label">{"Title"}</span>
                    <input
                        ref={title_ref}
                        type="text"
                        value={(*title).clone()}
                        oninput={on_title_input}
                    />
                </label>

                <label class="field">
                    <span class="field-label">{"URL"}</span>
                    <input type="url" value={(*url).clone()} oninput={on_url_input} />
                </label>

                <label class="field">
                    <span class="field-label">{"Folder"}</span>
                    <select onchange={on_parent_change}>
                        {for props.folders.iter().map(|folder| html! {
                            <option value={folder.value.clone()} selected={*parent == folder.value}>
                                {&folder.label}
                            </option>
                        })}
                    </select>
                </label>

                <div class="modal-actions">
                    <button type="button" class="btn-secondary" onclick={on_cancel}>{"Cancel"}</button>
                    <button type="submit" class="btn-primary">{"Save"}</button>
                </div>
            </form>
        </div>
    }
}
