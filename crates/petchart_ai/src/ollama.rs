use std::time::Duration;

use petchart_core::error::AppError;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
}

impl OllamaClient {
    /// Create a client for Ollama. Only `http://127.0.0.1[:port]` is accepted.
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let base_url = base_url.trim_end_matches('/').to_string();

        let rest = match base_url.strip_prefix("http://127.0.0.1") {
            Some(rest) => rest,
            None => return Err(remote_not_allowed(&base_url)),
        };
        if !rest.is_empty() {
            let port = rest.strip_prefix(':').ok_or_else(|| remote_not_allowed(&base_url))?;
            match port.parse::<u16>() {
                Ok(p) if p > 0 && port.chars().all(|c| c.is_ascii_digit()) => {}
                _ => return Err(remote_not_allowed(&base_url)),
            }
        }

        Ok(Self { base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn health_check(&self) -> Result<(), AppError> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = ureq::get(&url).timeout(Duration::from_millis(800)).call();

        match resp {
            Ok(r) if r.status() == 200 => Ok(()),
            Ok(r) => Err(
                AppError::new("AI_OLLAMA_UNHEALTHY", "Ollama health check failed")
                    .with_details(format!("status={}", r.status())),
            ),
            Err(ureq::Error::Status(code, _)) => Err(
                AppError::new("AI_OLLAMA_UNHEALTHY", "Ollama health check failed")
                    .with_details(format!("status={code}")),
            ),
            Err(e) => Err(AppError::new(
                "AI_OLLAMA_UNREACHABLE",
                "Failed to reach Ollama on 127.0.0.1",
            )
            .with_details(e.to_string())
            .with_retryable(true)),
        }
    }

    /// POST a JSON body and decode the JSON reply. `code` names the failing capability.
    pub(crate) fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
        timeout: Duration,
        code: &str,
    ) -> Result<T, AppError> {
        let url = format!("{}{}", self.base_url, path);
        match ureq::post(&url).timeout(timeout).send_json(body) {
            Ok(r) => r.into_json::<T>().map_err(|e| {
                AppError::new(code, "Failed to decode Ollama response")
                    .with_details(format!("path={path}; err={e}"))
            }),
            Err(ureq::Error::Status(status, r)) => {
                let body = r.into_string().unwrap_or_default();
                Err(AppError::new(code, "Ollama request failed")
                    .with_details(format!("path={path}; status={status}; body={body}")))
            }
            Err(e) => Err(AppError::new(code, "Failed to call Ollama endpoint")
                .with_details(format!("path={path}; err={e}"))
                .with_retryable(true)),
        }
    }
}

fn remote_not_allowed(base_url: &str) -> AppError {
    AppError::new(
        "AI_REMOTE_NOT_ALLOWED",
        "Ollama base URL must be localhost (127.0.0.1)",
    )
    .with_details(format!("base_url={base_url}"))
}
