use axum::routing::get;
use axum::Router;

use crate::handlers::principals;
use crate::state::AppState;

/// Routes mounted at `/principals`.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(principals::list_principals))
}
