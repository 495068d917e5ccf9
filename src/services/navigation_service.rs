use percent_encoding::percent_decode_str;
use serde::Serialize;

use crate::models::pillar::Pillar;
use crate::models::profile::Role;

const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MenuTarget {
    Route { path: String },
    Action { action: String },
    Dropdown { items: Vec<MenuEntry> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub id: String,
    pub label: String,
    pub requires_auth: bool,
    #[serde(flatten)]
    pub target: MenuTarget,
}

impl MenuEntry {
    fn route(id: &str, label: &str, path: &str, requires_auth: bool) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            requires_auth,
            target: MenuTarget::Route {
                path: path.to_string(),
            },
        }
    }

    fn action(id: &str, label: &str, action: &str, requires_auth: bool) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            requires_auth,
            target: MenuTarget::Action {
                action: action.to_string(),
            },
        }
    }

    fn dropdown(id: &str, label: &str, items: Vec<MenuEntry>) -> Self {
        let requires_auth = items.iter().all(|i| i.requires_auth);
        Self {
            id: id.to_string(),
            label: label.to_string(),
            requires_auth,
            target: MenuTarget::Dropdown { items },
        }
    }
}

/// What activating an entry does for the current caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    Navigate { path: String },
    Perform { action: String },
    Expand,
    RedirectToLogin { location: String, intended: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "access", rename_all = "snake_case")]
pub enum RouteAccess {
    Allow,
    RedirectToLogin { location: String, intended: String },
    Forbidden { home: String },
}

/// Auth-only actions that lead to a page; used to build the resume target.
fn action_destination(action: &str) -> Option<&'static str> {
    match action {
        "book_session" => Some("/user/book"),
        "open_chat" => Some("/user/chat"),
        _ => None,
    }
}

/// Ordered menu for the caller. Pure: depends only on role and auth state.
pub fn build_menu(role: Option<Role>, authenticated: bool) -> Vec<MenuEntry> {
    let role = if authenticated { role } else { None };
    let logout = MenuEntry::action("logout", "Sair", "logout", true);

    match role {
        None => {
            let pillars = Pillar::ALL
                .iter()
                .map(|p| {
                    MenuEntry::route(
                        p.as_str(),
                        p.label(),
                        &format!("/pillars/{}", p.slug()),
                        false,
                    )
                })
                .collect();
            vec![
                MenuEntry::route("home", "Início", "/", false),
                MenuEntry::dropdown("pillars", "Pilares", pillars),
                MenuEntry::route("resources", "Recursos", "/user/resources", true),
                MenuEntry::action("book_session", "Agendar Sessão", "book_session", true),
                MenuEntry::route("login", "Entrar", LOGIN_PATH, false),
            ]
        }
        Some(Role::User) => vec![
            MenuEntry::route("dashboard", "Painel", "/user/dashboard", true),
            MenuEntry::action("book_session", "Agendar Sessão", "book_session", true),
            MenuEntry::route("sessions", "As Minhas Sessões", "/user/sessions", true),
            MenuEntry::route("resources", "Recursos", "/user/resources", true),
            MenuEntry::dropdown(
                "account",
                "Conta",
                vec![
                    MenuEntry::route("settings", "Perfil", "/user/settings", true),
                    MenuEntry::route("notifications", "Notificações", "/user/notifications", true),
                    logout,
                ],
            ),
        ],
        Some(Role::Hr) => vec![
            MenuEntry::route("dashboard", "Painel", "/company/dashboard", true),
            MenuEntry::route("employees", "Colaboradores", "/company/employees", true),
            MenuEntry::route("reports", "Relatórios", "/company/reports", true),
            MenuEntry::route("resources", "Recursos", "/company/resources", true),
            logout,
        ],
        Some(Role::Prestador) => vec![
            MenuEntry::route("dashboard", "Painel", "/prestador/dashboard", true),
            MenuEntry::route("calendar", "Agenda", "/prestador/calendar", true),
            MenuEntry::route("sessions", "Sessões", "/prestador/sessions", true),
            MenuEntry::route("performance", "Desempenho", "/prestador/performance", true),
            logout,
        ],
        Some(Role::Specialist) => vec![
            MenuEntry::route("dashboard", "Painel", "/especialista/dashboard", true),
            MenuEntry::route("call_requests", "Pedidos", "/especialista/call-requests", true),
            MenuEntry::route("sessions", "Sessões", "/especialista/sessions", true),
            MenuEntry::route("referrals", "Encaminhamentos", "/especialista/referrals", true),
            logout,
        ],
        Some(Role::Admin) => vec![
            MenuEntry::route("dashboard", "Painel", "/admin/dashboard", true),
            MenuEntry::dropdown(
                "management",
                "Gestão",
                vec![
                    MenuEntry::route("users", "Utilizadores", "/admin/users", true),
                    MenuEntry::route("companies", "Empresas", "/admin/companies", true),
                    MenuEntry::route("providers", "Prestadores", "/admin/providers", true),
                ],
            ),
            MenuEntry::dropdown(
                "operations",
                "Operações",
                vec![
                    MenuEntry::route("bookings", "Sessões", "/admin/bookings", true),
                    MenuEntry::route("matching", "Matching", "/admin/matching", true),
                ],
            ),
            MenuEntry::route("resources", "Recursos", "/admin/resources", true),
            MenuEntry::route("logs", "Registos", "/admin/logs", true),
            logout,
        ],
    }
}

pub fn login_location(intended: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(intended.as_bytes()).collect();
    format!("{}?redirect={}", LOGIN_PATH, encoded)
}

pub fn resolve_entry(entry: &MenuEntry, authenticated: bool) -> Resolution {
    if entry.requires_auth && !authenticated {
        let intended = match &entry.target {
            MenuTarget::Route { path } => path.clone(),
            MenuTarget::Action { action } => action_destination(action)
                .unwrap_or("/")
                .to_string(),
            MenuTarget::Dropdown { .. } => "/".to_string(),
        };
        return Resolution::RedirectToLogin {
            location: login_location(&intended),
            intended,
        };
    }

    match &entry.target {
        MenuTarget::Route { path } => Resolution::Navigate { path: path.clone() },
        MenuTarget::Action { action } => Resolution::Perform {
            action: action.clone(),
        },
        MenuTarget::Dropdown { .. } => Resolution::Expand,
    }
}

/// Roles allowed under each guarded prefix. Unlisted paths are public.
fn guarded_prefix(path: &str) -> Option<&'static [Role]> {
    const TABLE: &[(&str, &[Role])] = &[
        ("/admin", &[Role::Admin]),
        ("/company", &[Role::Hr, Role::Admin]),
        ("/prestador", &[Role::Prestador]),
        ("/especialista", &[Role::Specialist, Role::Admin]),
        ("/user", &[Role::User, Role::Hr, Role::Prestador, Role::Specialist, Role::Admin]),
    ];
    TABLE
        .iter()
        .find(|(prefix, _)| path == *prefix || path.starts_with(&format!("{}/", prefix)))
        .map(|(_, roles)| *roles)
}

pub fn route_access(path: &str, role: Option<Role>) -> RouteAccess {
    let Some(allowed) = guarded_prefix(path) else {
        return RouteAccess::Allow;
    };
    match role {
        None => RouteAccess::RedirectToLogin {
            location: login_location(path),
            intended: path.to_string(),
        },
        Some(role) if allowed.contains(&role) => RouteAccess::Allow,
        Some(role) => RouteAccess::Forbidden {
            home: role.home_path().to_string(),
        },
    }
}

/// Accepts only same-origin absolute paths (`/x`), never `//host` or schemes.
pub fn sanitize_redirect(raw: &str) -> Option<String> {
    let decoded = percent_decode_str(raw).decode_utf8().ok()?;
    let path = decoded.trim();
    if !path.starts_with('/') || path.starts_with("//") || path.contains('\\') {
        return None;
    }
    let base = url::Url::parse("http://localhost").ok()?;
    let joined = base.join(path).ok()?;
    if joined.host_str() != Some("localhost") {
        return None;
    }
    let mut out = joined.path().to_string();
    if let Some(q) = joined.query() {
        out.push('?');
        out.push_str(q);
    }
    (out != LOGIN_PATH).then_some(out)
}

/// Where a freshly logged-in user lands: the remembered destination when it
/// is a safe path the role may open, otherwise the role's home.
pub fn post_login_redirect(requested: Option<&str>, role: Role) -> String {
    requested
        .and_then(sanitize_redirect)
        .filter(|path| {
            let bare = path.split('?').next().unwrap_or(path);
            route_access(bare, Some(role)) == RouteAccess::Allow
        })
        .unwrap_or_else(|| role.home_path().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(menu: &'a [MenuEntry], id: &str) -> &'a MenuEntry {
        menu.iter().find(|e| e.id == id).expect("menu entry")
    }

    #[test]
    fn anonymous_menu_redirects_gated_entries_to_login() {
        let menu = build_menu(None, false);
        let booking = find(&menu, "book_session");
        assert_eq!(
            resolve_entry(booking, false),
            Resolution::RedirectToLogin {
                location: "/login?redirect=%2Fuser%2Fbook".into(),
                intended: "/user/book".into(),
            }
        );
        let home = find(&menu, "home");
        assert_eq!(
            resolve_entry(home, false),
            Resolution::Navigate { path: "/".into() }
        );
    }

    #[test]
    fn role_without_authentication_is_treated_as_anonymous() {
        assert_eq!(build_menu(Some(Role::Admin), false), build_menu(None, false));
    }

    #[test]
    fn admin_menu_has_management_dropdown() {
        let menu = build_menu(Some(Role::Admin), true);
        let management = find(&menu, "management");
        match &management.target {
            MenuTarget::Dropdown { items } => {
                let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
                assert_eq!(ids, ["users", "companies", "providers"]);
            }
            other => panic!("expected dropdown, got {other:?}"),
        }
        assert_eq!(resolve_entry(management, true), Resolution::Expand);
        assert_eq!(menu.last().unwrap().id, "logout");
    }

    #[test]
    fn authenticated_actions_are_performed() {
        let menu = build_menu(Some(Role::User), true);
        assert_eq!(
            resolve_entry(find(&menu, "book_session"), true),
            Resolution::Perform {
                action: "book_session".into()
            }
        );
    }

    #[test]
    fn route_guard_redirects_and_forbids() {
        assert_eq!(
            route_access("/admin/companies", None),
            RouteAccess::RedirectToLogin {
                location: "/login?redirect=%2Fadmin%2Fcompanies".into(),
                intended: "/admin/companies".into(),
            }
        );
        assert_eq!(
            route_access("/admin/companies", Some(Role::Hr)),
            RouteAccess::Forbidden {
                home: "/company/dashboard".into()
            }
        );
        assert_eq!(route_access("/administrative", None), RouteAccess::Allow);
        assert_eq!(route_access("/pillars/mental-health", None), RouteAccess::Allow);
    }

    #[test]
    fn login_resumes_requested_path() {
        assert_eq!(
            post_login_redirect(Some("%2Fuser%2Fbook"), Role::User),
            "/user/book"
        );
        assert_eq!(
            post_login_redirect(Some("/user/sessions?tab=past"), Role::User),
            "/user/sessions?tab=past"
        );
    }

    #[test]
    fn resumed_path_keeps_full_query() {
        assert_eq!(
            post_login_redirect(Some("/user/sessions?tab=past&page=2"), Role::User),
            "/user/sessions?tab=past&page=2"
        );
        assert_eq!(
            post_login_redirect(Some("/user/resources?q=a+b"), Role::User),
            "/user/resources?q=a+b"
        );
        assert_eq!(
            post_login_redirect(Some("%2Fuser%2Fsessions%3Ftab%3Dpast%26page%3D2"), Role::User),
            "/user/sessions?tab=past&page=2"
        );
        assert_eq!(sanitize_redirect("%2F%2Fevil.example"), None);
    }

    #[test]
    fn unsafe_or_disallowed_redirects_fall_back_to_home() {
        assert_eq!(
            post_login_redirect(Some("https://evil.example/x"), Role::User),
            "/user/dashboard"
        );
        assert_eq!(
            post_login_redirect(Some("//evil.example"), Role::User),
            "/user/dashboard"
        );
        assert_eq!(
            post_login_redirect(Some("/admin/logs"), Role::User),
            "/user/dashboard"
        );
        assert_eq!(post_login_redirect(None, Role::Hr), "/company/dashboard");
        assert_eq!(sanitize_redirect("/login"), None);
    }
}
