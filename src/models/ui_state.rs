/// Outcome of a front-end request, used to pick what to show the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UiState {
    #[default]
    Initial,
    Loading,
    Success,
    NoResults,
    Error(String),
}

impl UiState {
    pub fn from_results<T>(results: &[T]) -> Self {
        if results.is_empty() {
            UiState::NoResults
        } else {
            UiState::Success
        }
    }

    pub fn from_lookup<T>(found: Option<&T>, missing: &str) -> Self {
        match found {
            Some(_) => UiState::Success,
            None => UiState::Error(missing.to_string()),
        }
    }
}
