use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::{info, warn};

use crate::core::error::{InstallerError, InstallerResult};

/// One entry of the optional mirror list.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Mirror {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    /// Base URL that repository-relative library paths are appended to.
    pub url: String,
}

impl Mirror {
    /// Rewrite a library path onto this mirror.
    pub fn library_url(&self, relative_path: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            relative_path.trim_start_matches('/')
        )
    }
}

/// Fetch the mirror list and pick one entry at random.
///
/// Failures are not fatal: the installer simply runs without a mirror.
pub async fn select_mirror(client: &reqwest::Client, list_url: &str) -> Option<Mirror> {
    match fetch_mirror_list(client, list_url).await {
        Ok(mirrors) => {
            let chosen = mirrors.choose(&mut rand::thread_rng()).cloned();
            if let Some(mirror) = &chosen {
                info!("Using download mirror {} ({})", mirror.name, mirror.url);
            }
            chosen
        }
        Err(e) => {
            warn!("Could not load mirror list {}: {}", list_url, e);
            None
        }
    }
}

async fn fetch_mirror_list(client: &reqwest::Client, list_url: &str) -> InstallerResult<Vec<Mirror>> {
    let response = client.get(list_url).send().await?;
    if !response.status().is_success() {
        return Err(InstallerError::DownloadFailed {
            url: list_url.to_string(),
            status: response.status().as_u16(),
        });
    }
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn library_url_joins_without_double_slashes() {
        let mirror = Mirror {
            name: "Example".into(),
            image: None,
            homepage: None,
            url: "https://mirror.example.com/maven/".into(),
        };
        assert_eq!(
            mirror.library_url("/org/example/foo/1.0/foo-1.0.jar"),
            "https://mirror.example.com/maven/org/example/foo/1.0/foo-1.0.jar"
        );
    }

    #[tokio::test]
    async fn selects_one_of_the_listed_mirrors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/mirrors.json");
                then.status(200).json_body(serde_json::json!([
                    {"name": "One", "image": "https://one/logo.png", "homepage": "https://one", "url": "https://one/maven/"},
                    {"name": "Two", "image": "https://two/logo.png", "homepage": "https://two", "url": "https://two/maven/"}
                ]));
            })
            .await;

        let client = reqwest::Client::new();
        let mirror = select_mirror(&client, &server.url("/mirrors.json"))
            .await
            .unwrap();
        assert!(mirror.name == "One" || mirror.name == "Two");
    }

    #[tokio::test]
    async fn unreachable_list_means_no_mirror() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/mirrors.json");
                then.status(404);
            })
            .await;

        let client = reqwest::Client::new();
        assert!(select_mirror(&client, &server.url("/mirrors.json"))
            .await
            .is_none());
    }
}
