use poem_openapi::payload::PlainText;
use poem_openapi::{OpenApi, OpenApiService};

pub struct Api;

pub fn create_openapi_service() -> OpenApiService<Api, ()> {
    OpenApiService::new(Api, "fileproxy server API", env!("CARGO_PKG_VERSION"))
}

#[OpenApi]
impl Api {
    /// Health check endpoint
    #[oai(path = "/health", method = "get")]
    async fn health(&self) -> PlainText<String> {
        PlainText("OK".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poem::Route;
    use poem::http::StatusCode;
    use poem::test::TestClient;

    #[tokio::test]
    async fn health_endpoint_returns_200() {
        let app = Route::new().nest("/", create_openapi_service());
        let cli = TestClient::new(app);
        let resp = cli.get("/health").send().await;
        resp.assert_status(StatusCode::OK);
        resp.assert_text("OK").await;
    }
}
