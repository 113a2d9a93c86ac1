/// UI module exports

pub mod components;
pub mod edit_dialog;
pub mod newtab;
pub mod state;
