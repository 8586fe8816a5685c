//! Route Guard: classifies a request path and decides whether to let it through
//! or redirect, given what is known about the caller's session.

/// Redirect target for callers without a session.
pub const LOGIN_PATH: &str = "/login";
/// Redirect target for authenticated callers on auth pages.
pub const DASHBOARD_PATH: &str = "/dashboard";
/// Redirect target for accounts that still need activation.
pub const ACTIVATE_PATH: &str = "/activate";

/// Liveness probe, never guarded.
const HEALTH_PATH: &str = "/health";

/// Prefixes that bypass the guard entirely.
const BYPASS_PREFIXES: &[&str] = &["/api/", "/static/", "/assets/", "/_next/"];

/// Exact paths any caller may see.
const PUBLIC_PATHS: &[&str] = &[
    "/",
    "/login",
    "/register",
    "/forgot-password",
    "/reset-password",
    "/pricing",
    "/customize",
    "/auth/callback",
];

/// First path segments that belong to the application and can never be a profile slug.
pub const RESERVED_SEGMENTS: &[&str] = &[
    "api",
    "admin",
    "dashboard",
    "settings",
    "activate",
    "login",
    "register",
    "pricing",
    "customize",
    "auth",
    "static",
    "assets",
    "forgot-password",
    "reset-password",
    "health",
];

/// File extensions served as static assets outside protected namespaces.
const STATIC_EXTENSIONS: &[&str] = &[
    "ico", "png", "jpg", "jpeg", "gif", "svg", "webp", "css", "js", "map", "txt", "xml",
    "webmanifest", "woff", "woff2",
];

/// Namespaces that require an activated account.
const PROTECTED_NAMESPACES: &[&str] = &["/dashboard", "/admin", "/settings"];

/// What the session lookup produced for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated { activated: bool },
    /// The auth backend could not be reached.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Bypass,
    Public,
    PublicProfile,
    Protected,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    PassThrough,
    Redirect(&'static str),
}

/// Route Guard with an explicit policy for an unreachable auth backend.
#[derive(Debug, Clone, Copy)]
pub struct RouteGuard {
    fail_open: bool,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self { fail_open: true }
    }
}

impl RouteGuard {
    pub fn new(fail_open: bool) -> Self {
        Self { fail_open }
    }

    pub fn fail_open(&self) -> bool {
        self.fail_open
    }

    /// Applies the decision table to one request.
    pub fn decide(&self, path: &str, auth: &AuthState) -> GuardDecision {
        let class = classify(path);
        if class == PathClass::Bypass {
            return GuardDecision::PassThrough;
        }

        let auth = match auth {
            AuthState::Unavailable if self.fail_open => {
                tracing::warn!(path, "auth backend unreachable; letting request through (fail-open)");
                return GuardDecision::PassThrough;
            }
            AuthState::Unavailable => {
                tracing::warn!(path, "auth backend unreachable; treating caller as anonymous");
                AuthState::Anonymous
            }
            other => *other,
        };

        match auth {
            AuthState::Anonymous => match class {
                PathClass::Public | PathClass::PublicProfile => GuardDecision::PassThrough,
                _ => GuardDecision::Redirect(LOGIN_PATH),
            },
            AuthState::Authenticated { activated } => {
                let path = normalize(path);
                if path == LOGIN_PATH || path == "/register" {
                    return GuardDecision::Redirect(DASHBOARD_PATH);
                }
                if class == PathClass::Protected && !activated {
                    return GuardDecision::Redirect(ACTIVATE_PATH);
                }
                if path == ACTIVATE_PATH && activated {
                    return GuardDecision::Redirect(DASHBOARD_PATH);
                }
                GuardDecision::PassThrough
            }
            AuthState::Unavailable => GuardDecision::PassThrough,
        }
    }
}

/// Structural classification of a request path.
pub fn classify(path: &str) -> PathClass {
    if is_bypass(path) {
        return PathClass::Bypass;
    }
    let path = normalize(path);
    if PUBLIC_PATHS.contains(&path) {
        return PathClass::Public;
    }
    if is_protected(path) {
        return PathClass::Protected;
    }
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() == 1 && !is_reserved_segment(segments[0]) {
        return PathClass::PublicProfile;
    }
    PathClass::Other
}

pub fn is_reserved_segment(segment: &str) -> bool {
    RESERVED_SEGMENTS
        .iter()
        .any(|r| r.eq_ignore_ascii_case(segment))
}

fn is_protected(path: &str) -> bool {
    PROTECTED_NAMESPACES
        .iter()
        .any(|ns| path == *ns || path.starts_with(&format!("{}/", ns)))
}

fn is_bypass(path: &str) -> bool {
    if path == "/api"
        || path == HEALTH_PATH
        || BYPASS_PREFIXES.iter().any(|p| path.starts_with(p))
    {
        return true;
    }
    if is_protected(normalize(path)) {
        return false;
    }
    // favicon.ico, robots.txt, sw.js, site.webmanifest
    path.rsplit('/')
        .next()
        .and_then(|last| last.rsplit_once('.'))
        .map(|(_, ext)| {
            STATIC_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Drops a trailing slash so `/dashboard/` and `/dashboard` match.
fn normalize(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}
