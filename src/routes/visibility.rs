//! `GET /dashboard/visibility`: what the caller's role may see.

use axum::{extract::State, http::HeaderMap, routing::get, Json, Router};
use serde::Serialize;
use tracing::info;

use super::{role_from, AppState};
use crate::roles::{visible_actions, visible_for, visible_tabs, ActionKey, MetricKey, Role, TabKey};

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard/visibility", get(handler))
}

#[derive(Debug, Serialize)]
struct VisibilityView {
    role: Role,
    metrics: Vec<MetricKey>,
    tabs: Vec<TabKey>,
    actions: Vec<ActionKey>,
}

impl VisibilityView {
    fn of(role: Role) -> Self {
        // ---
        Self {
            role,
            metrics: visible_for(role).into_iter().collect(),
            tabs: visible_tabs(role),
            actions: visible_actions(role),
        }
    }
}

async fn handler(headers: HeaderMap, State(_state): State<AppState>) -> Json<VisibilityView> {
    // ---
    let role = role_from(&headers);
    info!("GET /dashboard/visibility - role {}", role);
    Json(VisibilityView::of(role))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::routes::ROLE_HEADER;

    #[test]
    fn test_header_drives_view() {
        // ---
        let mut headers = HeaderMap::new();
        headers.insert(ROLE_HEADER, "shipper".parse().unwrap());
        let view = VisibilityView::of(role_from(&headers));
        assert_eq!(view.role, Role::Shipper);
        assert!(view.actions.contains(&ActionKey::CreateShipment));
        assert!(!view.metrics.contains(&MetricKey::Density));
    }

    #[test]
    fn test_missing_header_fails_closed() {
        // ---
        let view = VisibilityView::of(role_from(&HeaderMap::new()));
        assert_eq!(view.role, Role::Unrecognized);
        let dispatcher = VisibilityView::of(Role::Dispatcher);
        assert_eq!(view.metrics, dispatcher.metrics);
        assert_eq!(view.tabs, dispatcher.tabs);
        assert_eq!(view.actions, dispatcher.actions);
    }
}
