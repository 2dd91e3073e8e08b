use services::AppServices;

/// Shared handler state. Cloning is cheap: every service sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
}

impl AppState {
    #[must_use]
    pub fn new(services: AppServices) -> Self {
        Self { services }
    }
}
