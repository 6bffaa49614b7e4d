//! Navigation gating derived from the session state.

use super::session::SessionState;

/// Upper bound on redirect hops when resolving a route.
const MAX_REDIRECTS: usize = 4;

/// Views the client can navigate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Login entry point
    Login,
    /// Default authenticated view
    Inbox,
    /// User administration
    Admin,
}

/// What a route requires of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Only for visitors without a session
    Guest,
    Authenticated,
    /// Authenticated with administrative privilege
    Admin,
}

impl Route {
    /// Where unauthenticated visitors are sent.
    pub const LOGIN_ENTRY: Route = Route::Login;

    /// Where authenticated users land by default.
    pub const DEFAULT: Route = Route::Inbox;

    pub fn access(self) -> Access {
        match self {
            Route::Login => Access::Guest,
            Route::Inbox => Access::Authenticated,
            Route::Admin => Access::Admin,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Inbox => "/",
            Route::Admin => "/admin",
        }
    }

    pub fn from_path(path: &str) -> Option<Route> {
        match path.trim_end_matches('/') {
            "" => Some(Route::Inbox),
            "/login" => Some(Route::Login),
            "/admin" => Some(Route::Admin),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Route::Login => "Login",
            Route::Inbox => "Inbox",
            Route::Admin => "Admin",
        }
    }
}

/// Outcome of gating a route against the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Startup resolution has not settled; show a neutral loading view.
    Loading,
    /// Navigate elsewhere instead of rendering.
    Redirect(Route),
    Render,
}

pub fn gate(route: Route, state: &SessionState) -> GateDecision {
    if state.is_loading() {
        return GateDecision::Loading;
    }

    let identity = state.identity();
    match route.access() {
        Access::Guest if identity.is_some() => GateDecision::Redirect(Route::DEFAULT),
        Access::Guest => GateDecision::Render,
        Access::Authenticated | Access::Admin if identity.is_none() => {
            GateDecision::Redirect(Route::LOGIN_ENTRY)
        }
        Access::Admin if !state.is_admin() => GateDecision::Redirect(Route::DEFAULT),
        Access::Authenticated | Access::Admin => GateDecision::Render,
    }
}

/// Follow redirects from `route` to the route that will render.
///
/// Returns `None` while the session is still loading.
pub fn resolve(route: Route, state: &SessionState) -> Option<Route> {
    let mut current = route;
    for _ in 0..MAX_REDIRECTS {
        match gate(current, state) {
            GateDecision::Loading => return None,
            GateDecision::Render => return Some(current),
            GateDecision::Redirect(next) => current = next,
        }
    }
    Some(current)
}
