use crate::api::ListOptions;
use crate::dispatch::Client;
use crate::endpoint::{segment, Endpoint};
use crate::error::Result;
use crate::models::Plugin;

/// Plugin endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Plugins<'a> {
    client: &'a Client,
}

impl<'a> Plugins<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list(&self, options: &ListOptions) -> Result<Vec<Plugin>> {
        let endpoint = Endpoint::get("/plugins").with_query(options);
        self.client.call_json(&endpoint).await
    }

    pub async fn inspect(&self, name: &str) -> Result<Plugin> {
        let endpoint = Endpoint::get(format!("/plugins/{}/json", segment(name)?));
        self.client.call_json(&endpoint).await
    }

    /// Enable a plugin, waiting up to `timeout` seconds for it to come up.
    pub async fn enable(&self, name: &str, timeout: Option<u32>) -> Result<()> {
        let endpoint = Endpoint::post(format!("/plugins/{}/enable", segment(name)?))
            .query_opt("timeout", timeout);
        self.client.call_raw(&endpoint).await
    }

    pub async fn disable(&self, name: &str, force: bool) -> Result<()> {
        let mut endpoint = Endpoint::post(format!("/plugins/{}/disable", segment(name)?));
        if force {
            endpoint = endpoint.query("force", true);
        }
        self.client.call_raw(&endpoint).await
    }

    /// Remove a plugin; the engine answers with the removed plugin.
    pub async fn remove(&self, name: &str, force: bool) -> Result<Plugin> {
        let mut endpoint = Endpoint::delete(format!("/plugins/{}", segment(name)?));
        if force {
            endpoint = endpoint.query("force", true);
        }
        self.client.call_json(&endpoint).await
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::api::testing::{client, last_target};

    #[tokio::test]
    async fn enable_and_remove() {
        let (client, transport) = client();
        transport.push_response(StatusCode::OK, "");
        transport.push_response(StatusCode::OK, r#"{"Id":"p1","Name":"vieux/sshfs:latest","Enabled":false}"#);

        client.plugins().enable("vieux/sshfs:latest", Some(5)).await.unwrap();
        assert_eq!(last_target(&transport), "/plugins/vieux/sshfs:latest/enable?timeout=5");

        let removed = client.plugins().remove("vieux/sshfs:latest", true).await.unwrap();
        assert!(!removed.enabled);
        assert_eq!(last_target(&transport), "/plugins/vieux/sshfs:latest?force=true");
    }
}
