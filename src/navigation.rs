/// Keyboard shortcuts and arrow-key movement across the card grid

/// Minimum rendered card width, used to estimate columns
pub const CARD_WIDTH_PX: f64 = 240.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrow {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    FocusSearch,
    ToggleFilter,
    Refresh,
    OpenSettings,
    Escape,
    Move(Arrow),
    OpenFocused,
    EditFocused,
    DeleteFocused,
    CaptureFocused,
    SaveEdit,
}

/// What the page looks like when a key arrives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyContext {
    /// A text field has focus
    pub typing: bool,
    pub card_focused: bool,
    /// The edit dialog is open
    pub editing: bool,
    /// Ctrl, Alt, or Meta is held
    pub modified: bool,
}

/// Map a `KeyboardEvent.key` value to a shortcut
pub fn shortcut_for(key: &str, ctx: KeyContext) -> Option<Shortcut> {
    if key == "Escape" {
        return Some(Shortcut::Escape);
    }
    if ctx.modified {
        return None;
    }
    if ctx.editing {
        return (key == "Enter").then_some(Shortcut::SaveEdit);
    }
    if ctx.typing {
        return None;
    }

    if let Some(arrow) = arrow_for(key) {
        return Some(Shortcut::Move(arrow));
    }

    if ctx.card_focused {
        let card = match key {
            "Enter" => Some(Shortcut::OpenFocused),
            "Delete" | "Backspace" => Some(Shortcut::DeleteFocused),
            "e" | "E" => Some(Shortcut::EditFocused),
            "c" | "C" => Some(Shortcut::CaptureFocused),
            _ => None,
        };
        if card.is_some() {
            return card;
        }
    }

    match key {
        "/" | "s" | "S" => Some(Shortcut::FocusSearch),
        "f" | "F" => Some(Shortcut::ToggleFilter),
        "r" | "R" => Some(Shortcut::Refresh),
        "h" | "H" => Some(Shortcut::OpenSettings),
        _ => None,
    }
}

fn arrow_for(key: &str) -> Option<Arrow> {
    match key {
        "ArrowUp" => Some(Arrow::Up),
        "ArrowDown" => Some(Arrow::Down),
        "ArrowLeft" => Some(Arrow::Left),
        "ArrowRight" => Some(Arrow::Right),
        _ => None,
    }
}

/// Next focused index. Left/right wrap around, up/down clamp to the ends.
pub fn grid_move(current: Option<usize>, len: usize, columns: usize, arrow: Arrow) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let Some(index) = current.filter(|&i| i < len) else {
        return Some(0);
    };
    let columns = columns.max(1);

    let next = match arrow {
        Arrow::Right => (index + 1) % len,
        Arrow::Left => index.checked_sub(1).unwrap_or(len - 1),
        Arrow::Down => (index + columns).min(len - 1),
        Arrow::Up => index.saturating_sub(columns),
    };
    Some(next)
}

/// Like [`grid_move`], but confined to the section holding `current`.
/// `sections` lists the card count of each rendered section in order, and the
/// result is a global index.
pub fn section_move(current: Option<usize>, sections: &[usize], columns: usize, arrow: Arrow) -> Option<usize> {
    let total: usize = sections.iter().sum();
    let Some(index) = current.filter(|&i| i < total) else {
        return grid_move(None, total, columns, arrow);
    };

    let mut start = 0;
    for &len in sections {
        if index < start + len {
            return grid_move(Some(index - start), len, columns, arrow).map(|local| start + local);
        }
        start += len;
    }
    None
}

pub fn columns_for_width(container_width: f64) -> usize {
    ((container_width / CARD_WIDTH_PX).floor() as usize).max(1)
}
