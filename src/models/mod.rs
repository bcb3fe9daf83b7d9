mod article;
mod ui_state;

pub use article::{Article, Coordinates, PageDetails, SearchHit};
pub use ui_state::UiState;
