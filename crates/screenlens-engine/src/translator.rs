//! Translation errors and the MyMemory backend.
//!
//! The HTTP transport is the host's business: [`MyMemoryTranslator`] builds
//! the request URL, hands it to an [`HttpTransport`], and interprets what
//! comes back.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use screenlens_ipc::TranslationProviderType;

use crate::providers::Translator;

/// Public MyMemory endpoint.
pub const MY_MEMORY_ENDPOINT: &str = "https://api.mymemory.translated.net/get";

/// Errors of a translation backend.
#[derive(Debug, Error)]
pub enum TranslationError {
    /// The HTTP call failed with a non-success status.
    #[error("API failed({0})")]
    ApiFailure(u16),

    /// The API answered but reported a failure.
    #[error("Got response failed status({status}), quota finished: {quota_exhausted}, detail: {detail}")]
    ResponseFailure {
        status: u16,
        quota_exhausted: bool,
        detail: String,
    },

    /// The API answered without a body.
    #[error("Got empty body")]
    EmptyBody,

    /// The body was not the expected JSON.
    #[error("Malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The request URL could not be built.
    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The transport could not complete the call.
    #[error("Transport error: {0}")]
    Transport(String),

    /// No backend is registered for the selected provider.
    #[error("No translator available for {0:?}")]
    Unavailable(TranslationProviderType),
}

/// Raw HTTP answer handed back by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Option<String>,
}

/// Performs GET requests for translation backends.
pub trait HttpTransport: Send + Sync {
    fn get(&self, url: &Url) -> Result<HttpResponse, TranslationError>;
}

/// Build the MyMemory request for `text` from `from` to `to`.
///
/// `email` raises the anonymous daily quota when present.
pub fn my_memory_url(
    text: &str,
    from: &str,
    to: &str,
    email: Option<&str>,
) -> Result<Url, TranslationError> {
    let mut url = Url::parse(MY_MEMORY_ENDPOINT)?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("q", text);
        query.append_pair("langpair", &format!("{from}|{to}"));
        if let Some(email) = email.filter(|email| !email.is_empty()) {
            query.append_pair("de", email);
        }
    }
    Ok(url)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MyMemoryResponse {
    response_data: Option<ResponseData>,
    #[serde(default)]
    response_status: Value,
    #[serde(default)]
    response_details: Value,
    #[serde(default)]
    quota_finished: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseData {
    #[serde(default)]
    translated_text: String,
}

/// The status comes back as a number or a numeric string.
fn status_code(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn detail_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Turn a MyMemory answer into the translated text.
pub fn interpret_my_memory_response(response: &HttpResponse) -> Result<String, TranslationError> {
    if !(200..300).contains(&response.status) {
        return Err(TranslationError::ApiFailure(response.status));
    }

    let body = match response.body.as_deref() {
        Some(body) if !body.trim().is_empty() => body,
        _ => return Err(TranslationError::EmptyBody),
    };

    let parsed: MyMemoryResponse = serde_json::from_str(body)?;
    let status = status_code(&parsed.response_status).unwrap_or(0);

    match parsed.response_data {
        Some(data) if status == 200 => Ok(data.translated_text),
        _ => Err(TranslationError::ResponseFailure {
            status,
            quota_exhausted: parsed.quota_finished.unwrap_or(false),
            detail: detail_text(&parsed.response_details),
        }),
    }
}

/// MyMemory backend over a host-provided transport.
pub struct MyMemoryTranslator {
    transport: Arc<dyn HttpTransport>,
    email: Option<String>,
}

impl MyMemoryTranslator {
    pub fn new(transport: Arc<dyn HttpTransport>, email: Option<String>) -> Self {
        Self { transport, email }
    }
}

impl Translator for MyMemoryTranslator {
    fn provider_type(&self) -> TranslationProviderType {
        TranslationProviderType::MyMemory
    }

    fn translate(&self, text: &str, from: &str, to: &str) -> Result<String, TranslationError> {
        debug!(from, to, chars = text.chars().count(), "Start translate");
        let url = my_memory_url(text, from, to, self.email.as_deref())?;
        let response = self.transport.get(&url)?;

        let result = interpret_my_memory_response(&response);
        if let Err(e) = &result {
            warn!("MyMemory translation failed: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            body: Some(body.to_string()),
        }
    }

    #[test]
    fn url_carries_lang_pair_and_email() {
        let url = my_memory_url("hello world", "en", "ja", Some("me@example.com")).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("api.mymemory.translated.net"));
        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), "hello world".to_string()),
                ("langpair".to_string(), "en|ja".to_string()),
                ("de".to_string(), "me@example.com".to_string()),
            ]
        );
    }

    #[test]
    fn empty_email_is_omitted() {
        let url = my_memory_url("hi", "en", "de", Some("")).unwrap();
        assert!(url.query_pairs().all(|(key, _)| key != "de"));
    }

    #[test]
    fn successful_response_yields_text() {
        let response = ok(r#"{"responseData":{"translatedText":"こんにちは"},"responseStatus":200,"quotaFinished":false,"responseDetails":""}"#);
        assert_eq!(interpret_my_memory_response(&response).unwrap(), "こんにちは");
    }

    #[test]
    fn failed_status_reports_quota_and_detail() {
        let response = ok(r#"{"responseData":{"translatedText":"MYMEMORY WARNING"},"responseStatus":"429","quotaFinished":true,"responseDetails":"MYMEMORY WARNING: YOU USED ALL AVAILABLE FREE TRANSLATIONS"}"#);

        match interpret_my_memory_response(&response) {
            Err(TranslationError::ResponseFailure {
                status,
                quota_exhausted,
                detail,
            }) => {
                assert_eq!(status, 429);
                assert!(quota_exhausted);
                assert!(detail.starts_with("MYMEMORY WARNING"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn http_failure_is_api_failure() {
        let response = HttpResponse {
            status: 503,
            body: Some("busy".to_string()),
        };
        assert!(matches!(
            interpret_my_memory_response(&response),
            Err(TranslationError::ApiFailure(503))
        ));
    }

    #[test]
    fn missing_body_is_empty_body() {
        let response = HttpResponse {
            status: 200,
            body: None,
        };
        assert!(matches!(
            interpret_my_memory_response(&response),
            Err(TranslationError::EmptyBody)
        ));
    }

    #[test]
    fn translator_goes_through_transport() {
        struct Canned;

        impl HttpTransport for Canned {
            fn get(&self, url: &Url) -> Result<HttpResponse, TranslationError> {
                assert!(url.as_str().contains("langpair=en%7Cfr"));
                Ok(ok(r#"{"responseData":{"translatedText":"bonjour"},"responseStatus":200}"#))
            }
        }

        let translator = MyMemoryTranslator::new(Arc::new(Canned), None);
        assert_eq!(translator.translate("hello", "en", "fr").unwrap(), "bonjour");
    }
}
