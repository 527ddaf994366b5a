//! Backend client that shells out to `curl`.
//!
//! The bearer token is handed to curl on stdin (`--config -`) so it never
//! appears in the process list. The response status is appended to stdout
//! with `-w` and split off after the call.

#![allow(missing_docs)]

use std::io::Write as _;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde_json::json;

use super::RequestService;
use crate::core::config::{Config, EndpointsConfig};
use crate::core::errors::{CrvError, Result};
use crate::requests::{CertificateRequest, RequestId};
use crate::triage::preferences;

const STATUS_MARKER: &str = "\n__crv_status:";

/// HTTP method used for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Get,
    Put,
}

impl Method {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
        }
    }
}

/// Request service backed by the certificate-manager REST API.
#[derive(Debug, Clone)]
pub struct HttpRequestService {
    base_url: String,
    endpoints: EndpointsConfig,
    token: Option<String>,
    timeout_secs: u64,
    curl_bin: String,
    preferences_file: PathBuf,
}

impl HttpRequestService {
    #[must_use]
    pub fn new(config: &Config, token: Option<String>) -> Self {
        Self {
            base_url: config.server.base_url.clone(),
            endpoints: config.endpoints.clone(),
            token,
            timeout_secs: config.server.timeout_secs,
            curl_bin: config.server.curl_bin.clone(),
            preferences_file: config.paths.preferences_file.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn fetch_list(&self, path: &str) -> Result<Vec<CertificateRequest>> {
        let body = self.call(Method::Get, path, None, None)?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let list: Vec<CertificateRequest> = serde_json::from_str(&body)?;
        Ok(list)
    }

    /// Run one curl round trip and return the response body on 2xx.
    fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        id: Option<RequestId>,
    ) -> Result<String> {
        let url = self.url(path);
        let mut cmd = Command::new(&self.curl_bin);
        cmd.args(["-sS", "--config", "-", "-X", method.as_str()])
            .arg("--max-time")
            .arg(self.timeout_secs.to_string())
            .args(["-H", "Accept: application/json"])
            .arg("-w")
            .arg(format!("{STATUS_MARKER}%{{http_code}}"));
        let payload = body.map(serde_json::Value::to_string);
        if let Some(payload) = payload.as_deref() {
            cmd.args(["-H", "Content-Type: application/json", "--data", payload]);
        }
        cmd.arg(&url)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| CrvError::Transport {
            endpoint: path.to_string(),
            details: format!("failed to start {}: {e}", self.curl_bin),
        })?;
        if let Some(mut stdin) = child.stdin.take() {
            let config = curl_stdin_config(self.token.as_deref());
            stdin
                .write_all(config.as_bytes())
                .map_err(|e| CrvError::Transport {
                    endpoint: path.to_string(),
                    details: format!("failed to pass curl config: {e}"),
                })?;
        }
        let output = child.wait_with_output().map_err(|e| CrvError::Transport {
            endpoint: path.to_string(),
            details: format!("curl did not finish: {e}"),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CrvError::Transport {
                endpoint: path.to_string(),
                details: format!("curl exited with {}: {}", output.status, stderr.trim()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (body, status) = split_status(&stdout).ok_or_else(|| CrvError::Transport {
            endpoint: path.to_string(),
            details: "curl output carried no status code".to_string(),
        })?;
        classify(path, status, body, id)?;
        Ok(body.to_string())
    }

    fn decision_path(template: &str, id: RequestId) -> String {
        template.replace("{id}", &id.to_string())
    }
}

impl RequestService for HttpRequestService {
    fn is_by_me_selected(&self) -> Result<bool> {
        match preferences::load(&self.preferences_file) {
            preferences::LoadOutcome::IoError { details, .. } => Err(CrvError::Io {
                path: self.preferences_file.clone(),
                source: std::io::Error::other(details),
            }),
            outcome => Ok(outcome.into_prefs().by_me_selected),
        }
    }

    fn set_by_me_selected(&self, by_me: bool) -> Result<()> {
        let mut prefs = preferences::load(&self.preferences_file).into_prefs();
        prefs.by_me_selected = by_me;
        preferences::save(&prefs, &self.preferences_file)
            .map_err(|source| CrvError::io(&self.preferences_file, source))?;
        Ok(())
    }

    fn get_all_requests(&self) -> Result<Vec<CertificateRequest>> {
        self.fetch_list(&self.endpoints.all_requests)
    }

    fn get_requests_by_me(&self) -> Result<Vec<CertificateRequest>> {
        self.fetch_list(&self.endpoints.requests_by_me)
    }

    fn get_requests_from_me(&self) -> Result<Vec<CertificateRequest>> {
        self.fetch_list(&self.endpoints.requests_from_me)
    }

    fn accept_request(&self, id: RequestId) -> Result<()> {
        let path = Self::decision_path(&self.endpoints.accept, id);
        self.call(Method::Put, &path, None, Some(id)).map(|_| ())
    }

    fn decline_request(&self, id: RequestId, reason: Option<&str>) -> Result<()> {
        let path = Self::decision_path(&self.endpoints.decline, id);
        let body = json!({ "reason": reason.unwrap_or_default() });
        self.call(Method::Put, &path, Some(&body), Some(id))
            .map(|_| ())
    }
}

/// curl `--config` lines fed on stdin.
fn curl_stdin_config(token: Option<&str>) -> String {
    match token {
        Some(token) => {
            let escaped = token.replace('\\', "\\\\").replace('"', "\\\"");
            format!("header = \"Authorization: Bearer {escaped}\"\n")
        }
        None => String::new(),
    }
}

/// Split curl stdout into `(body, status)` using the `-w` marker.
fn split_status(stdout: &str) -> Option<(&str, u16)> {
    let (body, code) = stdout.rsplit_once(STATUS_MARKER)?;
    let status = code.trim().parse::<u16>().ok()?;
    Some((body, status))
}

/// Map an HTTP status onto the crate's error taxonomy.
fn classify(endpoint: &str, status: u16, body: &str, id: Option<RequestId>) -> Result<()> {
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(CrvError::Forbidden {
            endpoint: endpoint.to_string(),
        }),
        404 => match id {
            Some(id) => Err(CrvError::NotFound { id }),
            None => Err(CrvError::Http {
                endpoint: endpoint.to_string(),
                status,
            }),
        },
        400 | 409 => Err(CrvError::Rejected {
            endpoint: endpoint.to_string(),
            details: backend_message(body),
        }),
        _ => Err(CrvError::Http {
            endpoint: endpoint.to_string(),
            status,
        }),
    }
}

/// Pull a human-readable message out of an error body.
fn backend_message(body: &str) -> String {
    let trimmed = body.trim();
    serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            if trimmed.is_empty() {
                "no details".to_string()
            } else {
                trimmed.to_string()
            }
        })
}
