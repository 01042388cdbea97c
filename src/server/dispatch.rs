use crate::{
    api::{self, Routes},
    errors::ErrorKind,
    files::resolver::ContentRoot,
    http::{request::Request, response::Response, types::Method},
};

/// Sends each request to an API route or to the static files.
///
/// ```text
/// POST  /API/<NAME>/CALL_API  -> route, body as parameters
/// POST  anything else         -> no response
/// GET   /API/<NAME>/CALL_API  -> route, query string as parameters
/// GET   /path?query           -> 501 API badly formed
/// GET   /path                 -> static file
/// ```
#[derive(Debug)]
pub(crate) struct Router {
    routes: Routes,
    content: ContentRoot,
}

impl Router {
    #[inline]
    pub(crate) fn new(routes: Routes, content: ContentRoot) -> Self {
        Self { routes, content }
    }

    #[inline(always)]
    pub(crate) fn content(&self) -> &ContentRoot {
        &self.content
    }

    /// The response for `request`, or `None` when the request is left
    /// unanswered.
    pub(crate) async fn dispatch(&self, request: &Request) -> Option<Response> {
        match self.route(request).await {
            Ok(response) => response,
            Err(error) => Some(Response::error(&error)),
        }
    }

    async fn route(&self, request: &Request) -> Result<Option<Response>, ErrorKind> {
        let path = request.path();
        let upper = path.to_ascii_uppercase();

        match request.method() {
            Method::Post if api::is_api_call(&upper) => {
                self.call_api(&upper, request.body().unwrap_or_default()).map(Some)
            }
            Method::Post => {
                tracing::warn!(uri = request.uri(), "POST outside the API left unanswered");
                Ok(None)
            }
            Method::Get if api::is_api_call(&upper) => {
                self.call_api(&upper, request.query().unwrap_or_default()).map(Some)
            }
            Method::Get => match request.query() {
                Some(query) if !query.is_empty() => {
                    Err(ErrorKind::ApiBadlyFormed(request.uri().to_string()))
                }
                _ => self.content.resolve(path).await.map(Some),
            },
        }
    }

    fn call_api(&self, upper_path: &str, params: &str) -> Result<Response, ErrorKind> {
        let not_found = || ErrorKind::ApiNotFound(upper_path.to_string());

        let handler = self.routes.get(upper_path).ok_or_else(not_found)?;
        tracing::debug!(api = upper_path, params, "API call");

        match handler(params) {
            Some(Ok(document)) => Ok(Response::json(document)),
            Some(Err(e)) => {
                tracing::error!(api = upper_path, error = %e, "failed to serialize API payload");
                Err(ErrorKind::ServerError)
            }
            None => Err(not_found()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{files::extensions::ExtensionTable, http::response::Body};
    use serde::{Serialize, Serializer};
    use std::fs;
    use tempfile::TempDir;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("no"))
        }
    }

    fn router() -> (TempDir, Router) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>HUD</h1>").unwrap();
        fs::write(dir.path().join("style.exe"), "MZ").unwrap();

        let routes = Routes::new()
            .with_sample()
            .register("/API/ECHO", |params: &str| Some(params.to_string()))
            .register("/API/NONE", |_: &str| None::<String>)
            .register("/API/BROKEN", |_: &str| Some(Unserializable));
        let content = ContentRoot::open(dir.path(), ExtensionTable::default()).unwrap();

        (dir, Router::new(routes, content))
    }

    async fn dispatch(router: &Router, raw: &str) -> Option<Response> {
        router.dispatch(&Request::from_raw(raw)).await
    }

    fn text(response: &Response) -> &str {
        match response.body() {
            Body::Text(text) => text,
            Body::Bytes(_) => panic!("expected a text body"),
        }
    }

    #[tokio::test]
    async fn api_get_and_post() {
        let (_dir, router) = router();

        #[rustfmt::skip]
        let cases = [
            ("GET /API/ECHO/CALL_API?key=1 HTTP/1.1\r\n\r\n",                         "\"key=1\""),
            ("GET /api/echo/call_api?Key=Mixed HTTP/1.1\r\n\r\n",                     "\"Key=Mixed\""),
            ("GET /API/ECHO/CALL_API HTTP/1.1\r\n\r\n",                               "\"\""),
            ("POST /API/ECHO/CALL_API HTTP/1.1\r\nContent-Length: 5\r\n\r\nkey=2",    "\"key=2\""),
            ("POST /API/ECHO/CALL_API?key=9 HTTP/1.1\r\n\r\nkey=3",                   "\"key=3\""),
        ];

        for (raw, body) in cases {
            let response = dispatch(&router, raw).await.unwrap();

            assert_eq!(response.status(), "200 OK", "{raw:?}");
            assert_eq!(response.content_type(), "application/json");
            assert_eq!(text(&response), body, "{raw:?}");
        }
    }

    #[tokio::test]
    async fn sample_is_pretty_json() {
        let (_dir, router) = router();
        let response = dispatch(&router, "POST /API/APISAMPLE/CALL_API HTTP/1.1\r\n\r\n")
            .await
            .unwrap();

        let document = text(&response);
        assert!(document.starts_with("{\n  \"intData\": 576,"));
    }

    #[tokio::test]
    async fn errors() {
        let (_dir, router) = router();

        #[rustfmt::skip]
        let cases = [
            ("GET /API/NOPE/CALL_API HTTP/1.1\r\n\r\n",        "501 API /API/NOPE/CALL_API not found"),
            ("GET /api/nope/call_api?x=1 HTTP/1.1\r\n\r\n",    "501 API /API/NOPE/CALL_API not found"),
            ("GET /API/NONE/CALL_API HTTP/1.1\r\n\r\n",        "501 API /API/NONE/CALL_API not found"),
            ("POST /API/NOPE/CALL_API HTTP/1.1\r\n\r\n",       "501 API /API/NOPE/CALL_API not found"),
            ("GET /API/BROKEN/CALL_API HTTP/1.1\r\n\r\n",      "500 Internal web-server error"),
            ("GET /index.html?x=1 HTTP/1.1\r\n\r\n",           "501 API /index.html?x=1 badly formed. Must start with 'API/'"),
            ("GET /API/HUD?page=0 HTTP/1.1\r\n\r\n",           "501 API /API/HUD?page=0 badly formed. Must start with 'API/'"),
            ("GET /style.exe HTTP/1.1\r\n\r\n",                "501 Extension EXE not implemented"),
        ];

        for (raw, status) in cases {
            let response = dispatch(&router, raw).await.unwrap();

            assert_eq!(response.status(), status, "{raw:?}");
            assert_eq!(response.content_type(), "text/html; charset=utf-8");
        }
    }

    #[tokio::test]
    async fn static_files() {
        let (_dir, router) = router();

        let root = dispatch(&router, "GET / HTTP/1.1\r\n\r\n").await.unwrap();
        let index = dispatch(&router, "GET /index.html HTTP/1.1\r\n\r\n").await.unwrap();
        let empty_query = dispatch(&router, "GET /index.html? HTTP/1.1\r\n\r\n").await.unwrap();

        assert_eq!(root, index);
        assert_eq!(index, empty_query);
        assert_eq!(index.content_type(), "text/html");

        let missing = dispatch(&router, "GET /nonexistent.html HTTP/1.1\r\n\r\n").await.unwrap();
        let expected = format!(
            "404 File {}/nonexistent.html not found",
            router.content().path().display()
        );
        assert_eq!(missing.status(), expected);
    }

    #[tokio::test]
    async fn post_outside_api_is_unanswered() {
        let (_dir, router) = router();

        for raw in [
            "POST /index.html HTTP/1.1\r\n\r\n",
            "POST /API/ECHO HTTP/1.1\r\n\r\nkey=1",
        ] {
            assert_eq!(dispatch(&router, raw).await, None, "{raw:?}");
        }
    }
}
