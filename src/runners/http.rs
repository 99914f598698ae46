use anyhow::{anyhow, bail, Result};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{Runner, RunnerInstance};
use crate::models::{ExecutionResult, RunStatus};

/// Drives an HTTP request described entirely by runner parameters (`url`,
/// `method`, `headers`). Action parameters ride along as the query string
/// for bodyless methods and as a JSON body otherwise. A non-2xx response is
/// a failed run, not a runner error; only transport problems surface as
/// errors.
pub struct HttpRunner {
    client: Option<reqwest::Client>,
}

impl HttpRunner {
    pub fn new() -> Self {
        Self { client: None }
    }
}

impl Default for HttpRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Runner for HttpRunner {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn pre_run(&mut self, _instance: &RunnerInstance) -> Result<()> {
        self.client = Some(reqwest::Client::new());
        Ok(())
    }

    async fn run(
        &mut self,
        instance: &RunnerInstance,
        action_params: Map<String, Value>,
    ) -> Result<ExecutionResult> {
        let Some(client) = self.client.clone() else {
            bail!("http runner was not prepared; pre_run must happen first");
        };

        let url = instance
            .runner_parameters
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("runner parameter 'url' is required"))?;

        let method = instance
            .runner_parameters
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or("GET")
            .to_uppercase();
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| anyhow!("invalid HTTP method '{}'", method))?;

        let mut request = client.request(method.clone(), url);

        if let Some(headers) = instance.runner_parameters.get("headers").and_then(|v| v.as_object())
        {
            for (key, value) in headers {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                request = request.header(key.as_str(), value);
            }
        }

        if !action_params.is_empty() {
            let bodyless = method == reqwest::Method::GET
                || method == reqwest::Method::HEAD
                || method == reqwest::Method::DELETE;
            if bodyless {
                let pairs: Vec<(String, String)> = action_params
                    .iter()
                    .map(|(k, v)| {
                        let v = match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (k.clone(), v)
                    })
                    .collect();
                request = request.query(&pairs);
            } else {
                request = request.json(&action_params);
            }
        }

        debug!("http runner {} sending {} {}", instance.runner_id, method, url);
        let response = request.send().await?;

        let status_code = response.status();
        let mut headers = Map::new();
        for (key, value) in response.headers() {
            headers.insert(
                key.to_string(),
                Value::String(value.to_str().unwrap_or_default().to_string()),
            );
        }

        let text = response.text().await?;
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        let status = if status_code.is_success() { RunStatus::Succeeded } else { RunStatus::Failed };
        let output = json!({
            "status_code": status_code.as_u16(),
            "headers": Value::Object(headers),
            "body": body,
        });

        Ok(ExecutionResult { status, output, context: Value::Null })
    }
}
