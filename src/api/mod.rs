/// API routes and handlers
pub mod activity;
pub mod applications;
pub mod catalog;
pub mod credits;
pub mod documents;
pub mod favorites;
pub mod feedback;
pub mod middleware;
pub mod profile;
pub mod users;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(users::routes())
        .merge(applications::routes())
        .merge(documents::routes())
        .merge(credits::routes())
        .merge(catalog::routes())
        .merge(favorites::routes())
        .merge(activity::routes())
        .merge(profile::routes())
        .merge(feedback::routes())
        .route_layer(axum::middleware::from_fn(middleware::track_metrics))
}
