use crate::config::Config;
use crate::error::ModelError;
use reqwest::Url;
use std::fmt::Display;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

/// Makes sure the configured model is present on the ollama host behind the generate endpoint.
pub struct ModelCheck {
    model: String,
    ollama_instance: ollama_rs::Ollama,
}

impl ModelCheck {
    pub fn new(config: &Config) -> Result<Self, ModelError> {
        let (host, port) = endpoint_host(&config.api_url)?;
        debug!(%host, port, "ollama host");

        Ok(Self {
            model: config.model.clone(),
            ollama_instance: ollama_rs::Ollama::new(host, port),
        })
    }

    async fn has_model(&self) -> Result<bool, ModelError> {
        let local_models = self
            .ollama_instance
            .list_local_models()
            .await
            .map_err(|e| ModelError::Ollama(e.to_string()))?;

        Ok(local_models
            .iter()
            .any(|model| same_model(&model.name, &self.model)))
    }

    pub async fn ensure_model(&self) -> Result<(), ModelError> {
        if self.has_model().await? {
            return Ok(());
        }

        println!("Installing model {}.... please wait", self.model);
        let status_stream = self
            .ollama_instance
            .pull_model_stream(self.model.clone(), false)
            .await
            .map_err(|e| ModelError::Ollama(e.to_string()))?;

        drain_pull(status_stream, |res| {
            print!("{} ", res.message);
            if let (Some(total), Some(completed)) = (res.total, res.completed) {
                print!("{completed}/{total}");
            }
            println!();
        })
        .await
    }
}

/// Shows every pull status; the first failed status ends the pull as an error.
async fn drain_pull<S, T, E, F>(stream: S, mut show: F) -> Result<(), ModelError>
where
    S: Stream<Item = Result<T, E>>,
    E: Display,
    F: FnMut(&T),
{
    let mut stream = std::pin::pin!(stream);
    while let Some(status) = stream.next().await {
        match status {
            Ok(status) => show(&status),
            Err(e) => return Err(ModelError::Ollama(e.to_string())),
        }
    }
    Ok(())
}

/// Local model names always carry a tag; an untagged name refers to `:latest`.
fn same_model(local: &str, wanted: &str) -> bool {
    local == wanted || (!wanted.contains(':') && local == format!("{wanted}:latest"))
}

/// Splits the generate endpoint into the `scheme://host` and port that ollama-rs expects.
pub fn endpoint_host(api_url: &str) -> Result<(String, u16), ModelError> {
    let invalid = |reason: &str| ModelError::Endpoint {
        url: api_url.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(api_url).map_err(|e| invalid(&e.to_string()))?;
    let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| invalid("missing port"))?;

    Ok((format!("{}://{}", url.scheme(), host), port))
}
