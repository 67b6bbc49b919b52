// Azure Queue service client: a small blocking HTTP client that talks to
// the queue REST API. Only the two calls the CLI needs are implemented,
// put message and get messages, with no retries.

use std::collections::HashMap;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use crate::queue::{QueueError, QueueMessage, QueueService};

/// REST API version sent with every request.
pub const API_VERSION: &str = "2019-12-12";

const XML_CONTENT_TYPE: &str = "application/xml";

// Well-known settings of the local storage emulator (Azurite).
const DEV_ACCOUNT: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_QUEUE_ENDPOINT: &str = "http://127.0.0.1:10001/devstoreaccount1";

/// How requests to an endpoint are authorized.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Anonymous,
    /// Shared access signature query string, without the leading `?`.
    Sas(String),
    SharedKey { account: String, key: Vec<u8> },
}

// Keeps secrets out of debug output and logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Anonymous => f.write_str("Anonymous"),
            Credentials::Sas(_) => f.write_str("Sas(..)"),
            Credentials::SharedKey { account, .. } => {
                write!(f, "SharedKey {{ account: {account:?}, .. }}")
            }
        }
    }
}

/// A parsed account endpoint: the queue service base URL plus credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEndpoint {
    pub base_url: String,
    pub credentials: Credentials,
}

impl QueueEndpoint {
    /// Accepts a queue service URL (optionally with a SAS query), a storage
    /// connection string, or `UseDevelopmentStorage=true`.
    pub fn parse(raw: &str) -> Result<Self, QueueError> {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            let (base, query) = raw.split_once('?').unwrap_or((raw, ""));
            return Ok(Self {
                base_url: base.trim_end_matches('/').to_string(),
                credentials: if query.is_empty() {
                    Credentials::Anonymous
                } else {
                    Credentials::Sas(query.to_string())
                },
            });
        }

        let settings = parse_connection_string(raw)?;
        let get = |key: &str| settings.get(key).map(String::as_str).filter(|v| !v.is_empty());

        if get("usedevelopmentstorage").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            return Ok(Self {
                base_url: DEV_QUEUE_ENDPOINT.to_string(),
                credentials: shared_key(DEV_ACCOUNT, DEV_ACCOUNT_KEY)?,
            });
        }

        let account = get("accountname");
        let base_url = match (get("queueendpoint"), account) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, Some(account)) => format!(
                "{}://{}.queue.{}",
                get("defaultendpointsprotocol").unwrap_or("https"),
                account,
                get("endpointsuffix").unwrap_or("core.windows.net"),
            ),
            (None, None) => {
                return Err(QueueError::InvalidEndpoint(
                    "connection string needs QueueEndpoint or AccountName".into(),
                ))
            }
        };

        let credentials = match (get("sharedaccesssignature"), account, get("accountkey")) {
            (Some(sas), _, _) => Credentials::Sas(sas.trim_start_matches('?').to_string()),
            (None, Some(account), Some(key)) => shared_key(account, key)?,
            _ => Credentials::Anonymous,
        };

        Ok(Self {
            base_url,
            credentials,
        })
    }

    /// URL of the messages resource of `queue`, with `params` and any SAS
    /// appended to the query.
    fn messages_url(&self, queue: &str, params: &[(&str, String)]) -> Result<Url, QueueError> {
        let mut query: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        if let Credentials::Sas(sas) = &self.credentials {
            query.push(sas.clone());
        }

        let mut url = Url::parse(&format!("{}/{}/messages", self.base_url, queue))
            .map_err(|e| QueueError::InvalidEndpoint(format!("bad queue URL: {e}")))?;
        if !query.is_empty() {
            url.set_query(Some(&query.join("&")));
        }
        Ok(url)
    }
}

fn parse_connection_string(raw: &str) -> Result<HashMap<String, String>, QueueError> {
    let mut settings = HashMap::new();
    for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = part.split_once('=').ok_or_else(|| {
            QueueError::InvalidEndpoint("expected a URL or `Key=Value;` connection string".into())
        })?;
        settings.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }
    if settings.is_empty() {
        return Err(QueueError::InvalidEndpoint("endpoint is empty".into()));
    }
    Ok(settings)
}

fn shared_key(account: &str, key: &str) -> Result<Credentials, QueueError> {
    let key = STANDARD
        .decode(key)
        .map_err(|_| QueueError::InvalidEndpoint("AccountKey is not valid base64".into()))?;
    Ok(Credentials::SharedKey {
        account: account.to_string(),
        key,
    })
}

/// Queue names are 3-63 characters of lowercase letters, digits and
/// dashes, starting and ending with a letter or digit, with no `--`.
pub fn validate_queue_name(name: &str) -> Result<(), QueueError> {
    let valid = (3..=63).contains(&name.len())
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--");
    if valid {
        Ok(())
    } else {
        Err(QueueError::InvalidQueueName(name.to_string()))
    }
}

/// Canonical string signed for Shared Key authorization.
fn string_to_sign(
    method: &Method,
    content_length: usize,
    content_type: &str,
    date: &str,
    account: &str,
    url: &Url,
) -> String {
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    let mut resource = format!("/{}{}", account, url.path());
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.into_owned()))
        .collect();
    params.sort();
    for (k, v) in params {
        resource.push_str(&format!("\n{k}:{v}"));
    }

    format!(
        "{method}\n\n\n{length}\n\n{content_type}\n\n\n\n\n\n\nx-ms-date:{date}\nx-ms-version:{API_VERSION}\n{resource}"
    )
}

fn sign(key: &[u8], string_to_sign: &str) -> Result<String, QueueError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|_| QueueError::InvalidEndpoint("unusable AccountKey".into()))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn message_body(payload: &str) -> String {
    format!(
        "<QueueMessage><MessageText>{}</MessageText></QueueMessage>",
        quick_xml::escape::escape(payload)
    )
}

fn transport(err: reqwest::Error) -> QueueError {
    QueueError::Transport(Box::new(err))
}

#[derive(Deserialize)]
struct QueueMessagesList {
    #[serde(rename = "QueueMessage", default)]
    messages: Vec<RawQueueMessage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawQueueMessage {
    message_id: String,
    #[serde(default)]
    message_text: String,
    #[serde(default)]
    dequeue_count: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

fn parse_messages(body: &str) -> Result<Vec<QueueMessage>, QueueError> {
    let body = body.trim_start_matches('\u{feff}').trim();
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let list: QueueMessagesList = quick_xml::de::from_str(body)
        .map_err(|e| QueueError::Response(format!("could not parse message list: {e}")))?;
    Ok(list
        .messages
        .into_iter()
        .map(|m| QueueMessage {
            id: m.message_id,
            content: m.message_text,
            dequeue_count: m.dequeue_count,
        })
        .collect())
}

fn service_error(status: StatusCode, body: &str) -> QueueError {
    let body = body.trim_start_matches('\u{feff}').trim();
    let reason = || status.canonical_reason().unwrap_or("no response body").to_string();
    match quick_xml::de::from_str::<ErrorBody>(body) {
        Ok(err) => QueueError::Service {
            status: status.as_u16(),
            code: err.code,
            // The service appends request ids and timestamps on later lines.
            message: err.message.lines().next().unwrap_or_default().to_string(),
        },
        Err(_) if body.is_empty() => QueueError::Service {
            status: status.as_u16(),
            code: "Unknown".into(),
            message: reason(),
        },
        Err(_) => QueueError::Service {
            status: status.as_u16(),
            code: "Unknown".into(),
            message: body.to_string(),
        },
    }
}

/// Blocking client for the Azure Queue REST API.
#[derive(Clone)]
pub struct AzureQueueClient {
    client: Client,
}

impl AzureQueueClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    fn execute(
        &self,
        endpoint: &QueueEndpoint,
        method: Method,
        url: Url,
        body: Option<String>,
    ) -> Result<String, QueueError> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        debug!(%method, host = url.host_str().unwrap_or_default(), path = url.path(), "queue service request");

        let mut req = self
            .client
            .request(method.clone(), url.clone())
            .header("x-ms-date", &date)
            .header("x-ms-version", API_VERSION);

        if let Credentials::SharedKey { account, key } = &endpoint.credentials {
            let (length, content_type) = match &body {
                Some(b) => (b.len(), XML_CONTENT_TYPE),
                None => (0, ""),
            };
            let canonical = string_to_sign(&method, length, content_type, &date, account, &url);
            req = req.header(
                AUTHORIZATION,
                format!("SharedKey {}:{}", account, sign(key, &canonical)?),
            );
        }
        if let Some(body) = body {
            req = req.header(CONTENT_TYPE, XML_CONTENT_TYPE).body(body);
        }

        let res = req.send().map_err(transport)?;
        let status = res.status();
        let text = res.text().map_err(transport)?;
        if !status.is_success() {
            return Err(service_error(status, &text));
        }
        Ok(text)
    }
}

impl QueueService for AzureQueueClient {
    fn enqueue(&self, endpoint: &str, queue: &str, payload: &str) -> Result<(), QueueError> {
        validate_queue_name(queue)?;
        let endpoint = QueueEndpoint::parse(endpoint)?;
        let url = endpoint.messages_url(queue, &[])?;
        self.execute(&endpoint, Method::POST, url, Some(message_body(payload)))?;
        Ok(())
    }

    fn receive(
        &self,
        endpoint: &str,
        queue: &str,
        max: u32,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        validate_queue_name(queue)?;
        let endpoint = QueueEndpoint::parse(endpoint)?;
        let url = endpoint.messages_url(queue, &[("numofmessages", max.to_string())])?;
        let body = self.execute(&endpoint, Method::GET, url, None)?;
        parse_messages(&body)
    }
}
