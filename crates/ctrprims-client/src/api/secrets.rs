use crate::api::ListOptions;
use crate::dispatch::Client;
use crate::endpoint::{segment, Endpoint};
use crate::error::Result;
use crate::models::{IdResponse, ObjectCreateBody, SwarmObject};

/// Secrets and configs share their endpoint layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Secret,
    Config,
}

impl ObjectKind {
    fn collection(self) -> &'static str {
        match self {
            Self::Secret => "/secrets",
            Self::Config => "/configs",
        }
    }
}

/// Secret or config endpoints.
#[derive(Debug, Clone, Copy)]
pub struct SwarmObjects<'a> {
    client: &'a Client,
    kind: ObjectKind,
}

impl<'a> SwarmObjects<'a> {
    pub(crate) fn new(client: &'a Client, kind: ObjectKind) -> Self {
        Self { client, kind }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub async fn list(&self, options: &ListOptions) -> Result<Vec<SwarmObject>> {
        let endpoint = Endpoint::get(self.kind.collection()).with_query(options);
        self.client.call_json(&endpoint).await
    }

    pub async fn inspect(&self, id: &str) -> Result<SwarmObject> {
        let endpoint = Endpoint::get(format!("{}/{}", self.kind.collection(), segment(id)?));
        self.client.call_json(&endpoint).await
    }

    pub async fn create(&self, body: &ObjectCreateBody) -> Result<IdResponse> {
        let endpoint =
            Endpoint::post(format!("{}/create", self.kind.collection())).with_body(body)?;
        self.client.call_json(&endpoint).await
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        let endpoint = Endpoint::delete(format!("{}/{}", self.kind.collection(), segment(id)?));
        self.client.call_raw(&endpoint).await
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::api::testing::{client, last_target};

    #[tokio::test]
    async fn secrets_and_configs_use_their_collections() {
        let (client, transport) = client();
        transport.push_response(StatusCode::CREATED, r#"{"ID":"s1"}"#);
        transport.push_response(StatusCode::OK, r#"[{"ID":"c1","Spec":{"Name":"app.conf"}}]"#);

        let body = ObjectCreateBody {
            name: "token".to_string(),
            data: "c2VjcmV0".to_string(),
            ..Default::default()
        };
        client.secrets().create(&body).await.unwrap();
        assert_eq!(last_target(&transport), "/secrets/create");

        let configs = client.configs().list(&ListOptions::default()).await.unwrap();
        assert_eq!(configs[0].spec.name, "app.conf");
        assert_eq!(last_target(&transport), "/configs");
    }
}
