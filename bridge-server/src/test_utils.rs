use crate::config::BridgeConfig;
use crate::create_app;
use crate::state::AppState;
use axum::body::Body;
use axum::response::Response;
use axum::Router;
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use log::LevelFilter;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

/// Bearer token the mock identity provider accepts for [`TEST_SUBJECT`]
pub const TEST_TOKEN: &str = "test-token";
pub const TEST_SUBJECT: &str = "test-user";
/// Bearer token the mock identity provider accepts for [`OTHER_SUBJECT`]
pub const OTHER_TOKEN: &str = "other-token";
pub const OTHER_SUBJECT: &str = "other-user";

/// Test fixture for setting up a complete test environment with a mocked identity provider.
///
/// The fixture starts a wiremock server standing in for the identity provider, points the
/// configuration at it, and builds the application router. Session validation is mocked
/// for [`TEST_TOKEN`] and [`OTHER_TOKEN`]; every other token is rejected.
///
/// # Examples
///
/// ```rust
/// #[tokio::test]
/// async fn test_endpoint() {
///     let fixture = TestFixture::new().await;
///
///     fixture
///         .add_idp_mock(
///             Method::POST,
///             "/oauth2/v1/token",
///             json!({"access_token": "at"}),
///             StatusCode::OK,
///             1,
///         )
///         .await;
///
///     let response = fixture
///         .post_form("/token", &[("grant_type", "authorization_code"), ("code", "c")])
///         .await;
///     response.assert_ok();
/// }
/// ```
pub struct TestFixture {
    /// The application router
    pub app: Router,
    /// Shared state behind the router, e.g. to inspect open sessions
    pub state: AppState,
    /// Configuration settings
    pub config: BridgeConfig,
    /// Mock server for the identity provider
    pub idp_mock: MockServer,
}

impl TestFixture {
    /// Creates a new test fixture with the default test configuration
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Creates a new test fixture, letting the caller adjust the configuration first.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let fixture = TestFixture::with_config(|config| {
    ///     config.oauth.client_store = ClientStoreKind::Memory;
    /// })
    /// .await;
    /// ```
    pub async fn with_config(customize: impl FnOnce(&mut BridgeConfig)) -> Self {
        Self::setup_logger(LevelFilter::Debug);

        let idp_mock = MockServer::start().await;
        let mut config = BridgeConfig::for_test_with_mocks(&idp_mock);
        customize(&mut config);

        let state = AppState::new(config.clone()).expect("Failed to create app state");
        let app = create_app(state.clone()).await;

        let fixture = Self {
            app,
            state,
            config,
            idp_mock,
        };
        fixture.mount_session(TEST_TOKEN, TEST_SUBJECT).await;
        fixture.mount_session(OTHER_TOKEN, OTHER_SUBJECT).await;
        fixture
    }

    /// Initializes the test logger. Called by [`TestFixture::new`].
    pub fn setup_logger(level: LevelFilter) {
        let _ = env_logger::builder()
            .filter_level(level)
            .is_test(true)
            .try_init();
    }

    /// Makes the mock identity provider accept `token` as a session of `subject`
    pub async fn mount_session(&self, token: &str, subject: &str) {
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/v1/auth/validate"))
            .and(matchers::header(
                "authorization",
                format!("Bearer {}:{}", self.config.idp.project_id, token).as_str(),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jwt": token,
                "token": {
                    "sub": subject,
                    "exp": 4_102_444_800i64,
                    "iss": self.config.idp.project_id,
                    "scope": "openid profile"
                }
            })))
            .mount(&self.idp_mock)
            .await;
    }

    /// Creates a request builder authorized with [`TEST_TOKEN`]
    pub fn request_builder(&self, method: Method, uri: impl AsRef<str>) -> http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri.as_ref())
            .header("Authorization", format!("Bearer {TEST_TOKEN}"))
    }

    /// Sends an authorized GET request
    pub async fn get(&self, uri: impl AsRef<str>) -> TestResponse {
        let request = self
            .request_builder(Method::GET, uri)
            .body(Body::empty())
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends an authorized POST request with a JSON body
    pub async fn post<T: Serialize>(&self, uri: impl AsRef<str>, body: &T) -> TestResponse {
        let json_body = serde_json::to_vec(body).expect("Failed to serialize body to JSON");
        let request = self
            .request_builder(Method::POST, uri)
            .header("Content-Type", "application/json")
            .body(Body::from(json_body))
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends a form-encoded POST request, as OAuth clients do
    pub async fn post_form(&self, uri: impl AsRef<str>, form: &[(&str, &str)]) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri.as_ref())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends a request and returns the raw response, e.g. to read a stream frame by frame
    pub async fn send_raw(&self, request: Request<Body>) -> Response {
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Sends a request and collects the response into a [`TestResponse`]
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.send_raw(request).await;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();

        // Try to parse as JSON, defaulting to empty object if parsing fails or empty body
        let json = if !body.is_empty() {
            serde_json::from_slice(&body).unwrap_or_else(|_| json!({}))
        } else {
            json!({})
        };

        TestResponse {
            status,
            headers,
            json,
        }
    }

    /// Adds a mock identity provider route with the given method, path, and response.
    ///
    /// # Examples
    ///
    /// ```rust
    /// fixture
    ///     .add_idp_mock(
    ///         Method::GET,
    ///         "/v1/mgmt/thirdparty/app/load",
    ///         json!({"app": {"clientId": "c1"}}),
    ///         StatusCode::OK,
    ///         1,
    ///     )
    ///     .await;
    /// ```
    pub async fn add_idp_mock(
        &self,
        method: Method,
        path: impl Into<String>,
        response_body: impl Serialize,
        status_code: StatusCode,
        expected_calls: u64,
    ) {
        Mock::given(matchers::method(method.as_str()))
            .and(matchers::path(path.into()))
            .respond_with(ResponseTemplate::new(status_code.as_u16()).set_body_json(response_body))
            .expect(expected_calls)
            .mount(&self.idp_mock)
            .await;
    }
}

/// Response from a test request that provides convenient access to status, headers and JSON body.
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Response body as JSON (if present and valid JSON)
    pub json: Value,
}

impl TestResponse {
    /// Asserts that the response has the expected status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match the expected value.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {} but got {} with body: {}",
            expected,
            self.status,
            serde_json::to_string_pretty(&self.json).unwrap_or_default()
        );
        self
    }

    /// Asserts that the response status is OK (200).
    pub fn assert_ok(&self) -> &Self {
        self.assert_status(StatusCode::OK)
    }

    /// Returns a header value as a string
    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Converts the response body to the specified type.
    ///
    /// # Panics
    ///
    /// Panics if deserialization fails.
    pub fn json_as<T: DeserializeOwned>(&self) -> T {
        serde_json::from_value(self.json.clone()).expect("Failed to deserialize response JSON")
    }
}
