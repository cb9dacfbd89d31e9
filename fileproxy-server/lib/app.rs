use crate::setup::Proxy;
use poem::{EndpointExt, Route};
use std::sync::Arc;

mod api;
mod proxy;

/// Creates the route of the server.
///
/// The health API is served below `/_api` and its documentation below `/_docs`. Every other
/// path is handled by the proxy.
pub fn create_route(handler: Arc<Proxy>, enable_api_docs: bool) -> Route {
    let api_service = api::create_openapi_service().server("/_api");
    let mut route = Route::new();
    if enable_api_docs {
        route = route.nest("/_docs", api_service.swagger_ui());
    }
    route
        .nest("/_api", api_service)
        .at("/*path", proxy::proxy.data(handler))
}
