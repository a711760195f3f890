use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Url};
use serde::Serialize;

use crate::error::HarnessError;

/// HTTP client bound to one harness instance.
///
/// Every client owns its cookie jar and default headers; nothing leaks
/// between clients unless [`TestClient::share_session`] is used.
pub struct TestClient {
    http: reqwest::Client,
    jar: Arc<Jar>,
    headers: HeaderMap,
    base_url: Url,
}

impl TestClient {
    pub(crate) fn new(base_url: &str) -> Result<Self, HarnessError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            HarnessError::CompositionFailure(anyhow::anyhow!("invalid base url {base_url}: {e}"))
        })?;
        Self::with_jar(base_url, Arc::new(Jar::default()), HeaderMap::new())
    }

    fn with_jar(base_url: Url, jar: Arc<Jar>, headers: HeaderMap) -> Result<Self, HarnessError> {
        let http = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .build()?;
        Ok(Self {
            http,
            jar,
            headers,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .headers(self.headers.clone())
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    pub fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> RequestBuilder {
        self.request(Method::POST, path).json(body)
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.request(Method::DELETE, path)
    }

    /// Header sent on every request from this client only.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn set_bearer_token(&mut self, token: &str) -> Result<(), HarnessError> {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))?;
        self.set_header(AUTHORIZATION, value);
        Ok(())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn clear_headers(&mut self) {
        self.headers.clear();
    }

    /// Cookies this client would send to the instance, as a `Cookie` header.
    pub fn cookies(&self) -> Option<String> {
        self.jar
            .cookies(&self.base_url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }

    /// A second client on the same cookie jar, starting from a copy of
    /// this client's headers.
    pub fn share_session(&self) -> Result<TestClient, HarnessError> {
        Self::with_jar(self.base_url.clone(), self.jar.clone(), self.headers.clone())
    }
}
