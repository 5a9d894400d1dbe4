use socialgate_auth::AuthState;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthState,
}

impl AppState {
    pub fn new(auth: AuthState) -> Self {
        Self { auth }
    }
}

/// Lets auth extractors and handlers find their state inside ours.
impl AsRef<AuthState> for AppState {
    fn as_ref(&self) -> &AuthState {
        &self.auth
    }
}
