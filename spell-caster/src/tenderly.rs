//! Tenderly API client.
//!
//! Tenderly changed the response layout of its fork and testnet endpoints more
//! than once. Every known layout is a variant of an untagged enum; serde tries
//! them in declaration order and the first match wins.

use clap::ValueEnum;
use eyre::WrapErr;
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::error::SpellError;

pub const API_BASE: &str = "https://api.tenderly.co/api/v1";
const DASHBOARD: &str = "https://dashboard.tenderly.co";
const FORK_RPC: &str = "https://rpc.tenderly.co/fork";

/// Name of the privileged RPC of a virtual testnet, the one that accepts
/// storage and time overrides.
const ADMIN_RPC: &str = "Admin RPC";

/// Kind of simulation to spin up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Legacy simulation fork, published by sharing its last transaction.
    Fork,
    /// Virtual testnet, published by enabling its public explorer.
    Testnet,
}

/// A freshly created fork or testnet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Simulation {
    pub mode: Mode,
    pub id: String,
    pub rpc_url: Url,
    pub dashboard_url: String,
}

#[derive(Debug, Deserialize)]
struct ForkInfo {
    id: String,
    #[serde(default)]
    rpc_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectivityConfig {
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerInfo {
    id: String,
    connectivity_config: ConnectivityConfig,
}

#[derive(Debug, Deserialize)]
struct NamedRpc {
    #[serde(default)]
    name: String,
    url: String,
}

/// Body returned when a fork or testnet is created.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CreatedResponse {
    /// `POST /fork`: `{"simulation_fork": {"id", "rpc_url"?}}`. Without an
    /// explicit `rpc_url` the endpoint is derived from the fork id.
    Fork { simulation_fork: ForkInfo },
    /// Testnet containers: `{"container": {"id", "connectivityConfig": {"endpoints": [{"uri"}]}}}`.
    /// The first endpoint is used.
    Container { container: ContainerInfo },
    /// `POST /vnets`: `{"id", "rpcs": [{"name", "url"}]}`. The admin RPC is
    /// preferred, then the first listed one.
    VirtualTestnet { id: String, rpcs: Vec<NamedRpc> },
}

impl CreatedResponse {
    /// Simulation id and RPC endpoint.
    fn resolve(self) -> Result<(String, String), SpellError> {
        let (id, rpc) = match self {
            Self::Fork { simulation_fork } => {
                let rpc = simulation_fork
                    .rpc_url
                    .unwrap_or_else(|| format!("{FORK_RPC}/{}", simulation_fork.id));
                (simulation_fork.id, Some(rpc))
            }
            Self::Container { container } => {
                let rpc = container
                    .connectivity_config
                    .endpoints
                    .into_iter()
                    .next()
                    .map(|e| e.uri);
                (container.id, rpc)
            }
            Self::VirtualTestnet { id, rpcs } => {
                let admin = rpcs
                    .iter()
                    .position(|rpc| rpc.name == ADMIN_RPC)
                    .unwrap_or(0);
                let rpc = rpcs.into_iter().nth(admin).map(|rpc| rpc.url);
                (id, rpc)
            }
        };

        if id.is_empty() {
            return Err(SpellError::UnexpectedResponse {
                context: "simulation creation",
                body: "empty simulation id".to_string(),
            });
        }
        let rpc = rpc
            .filter(|rpc| !rpc.is_empty())
            .ok_or_else(|| SpellError::MissingEndpoint(id.clone()))?;
        Ok((id, rpc))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerVisibility {
    is_public: bool,
}

#[derive(Debug, Deserialize)]
struct ExplorerPageConfig {
    enabled: bool,
}

/// Body returned when a testnet visibility is updated.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PublishResponse {
    /// Testnet containers: `{"container": {"isPublic"}}`.
    Container { container: ContainerVisibility },
    /// Virtual testnets: `{"explorer_page_config": {"enabled"}}`.
    VirtualTestnet {
        explorer_page_config: ExplorerPageConfig,
    },
}

impl PublishResponse {
    fn is_public(&self) -> bool {
        match self {
            Self::Container { container } => container.is_public,
            Self::VirtualTestnet {
                explorer_page_config,
            } => explorer_page_config.enabled,
        }
    }
}

fn parse<R: DeserializeOwned>(context: &'static str, body: &str) -> Result<R, SpellError> {
    serde_json::from_str(body).map_err(|_| SpellError::UnexpectedResponse {
        context,
        body: body.to_string(),
    })
}

/// Client for a single Tenderly project.
#[derive(Debug, Clone)]
pub struct TenderlyClient {
    client: Client,
    api_base: Url,
    user: String,
    project: String,
    access_key: String,
}

impl TenderlyClient {
    pub fn new(api_base: Url, user: String, project: String, access_key: String) -> Self {
        Self {
            client: Client::new(),
            api_base,
            user,
            project,
            access_key,
        }
    }

    /// Sends an authenticated request under the project and returns the raw body.
    async fn request(&self, method: Method, path: &str, body: Value) -> eyre::Result<String> {
        let url = format!(
            "{}/account/{}/project/{}{path}",
            self.api_base.as_str().trim_end_matches('/'),
            self.user,
            self.project
        );
        debug!(%method, %url, "Tenderly request");

        let response = self
            .client
            .request(method.clone(), &url)
            .header("X-Access-Key", &self.access_key)
            .json(&body)
            .send()
            .await
            .wrap_err_with(|| format!("Tenderly {method} {path} failed"))?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            eyre::bail!("Tenderly {method} {path} returned {status}: {text}");
        }
        Ok(text)
    }

    fn dashboard_url(&self, kind: &str, id: &str) -> String {
        format!("{DASHBOARD}/{}/{}/{kind}/{id}", self.user, self.project)
    }

    /// Creates a private fork of `network_id`.
    pub async fn create_fork(&self, network_id: u64) -> eyre::Result<Simulation> {
        let request = json!({ "network_id": network_id.to_string() });
        let body = self.request(Method::POST, "/fork", request).await?;
        let created: CreatedResponse = parse("fork creation", &body)?;
        let (id, rpc) = created.resolve()?;

        Ok(Simulation {
            mode: Mode::Fork,
            rpc_url: rpc
                .parse()
                .wrap_err_with(|| format!("invalid fork RPC URL {rpc}"))?,
            dashboard_url: self.dashboard_url("fork", &id),
            id,
        })
    }

    /// Creates a private virtual testnet forked from `network_id`, exposed under `chain_id`.
    pub async fn create_testnet(
        &self,
        network_id: u64,
        chain_id: u64,
        slug: &str,
        display_name: &str,
    ) -> eyre::Result<Simulation> {
        let request = json!({
            "slug": slug,
            "display_name": display_name,
            "fork_config": { "network_id": network_id, "block_number": "latest" },
            "virtual_network_config": { "chain_config": { "chain_id": chain_id } },
            "sync_state_config": { "enabled": false },
            "explorer_page_config": { "enabled": false, "verification_visibility": "bytecode" },
        });
        let body = self.request(Method::POST, "/vnets", request).await?;
        let created: CreatedResponse = parse("testnet creation", &body)?;
        let (id, rpc) = created.resolve()?;

        Ok(Simulation {
            mode: Mode::Testnet,
            rpc_url: rpc
                .parse()
                .wrap_err_with(|| format!("invalid testnet RPC URL {rpc}"))?,
            dashboard_url: self.dashboard_url("testnet", &id),
            id,
        })
    }

    /// Shares a fork transaction and returns its public URL.
    pub async fn share_fork_transaction(
        &self,
        fork_id: &str,
        transaction_id: &str,
    ) -> eyre::Result<String> {
        let path = format!("/fork/{fork_id}/transaction/{transaction_id}/share");
        self.request(Method::POST, &path, json!({})).await?;
        Ok(format!("{DASHBOARD}/shared/fork/simulation/{transaction_id}"))
    }

    /// Makes the testnet explorer public and returns its URL.
    pub async fn publish_testnet(&self, testnet_id: &str) -> eyre::Result<String> {
        let path = format!("/vnets/{testnet_id}");
        let request = json!({
            "explorer_page_config": { "enabled": true, "verification_visibility": "src" },
        });
        let body = self.request(Method::PUT, &path, request).await?;

        let published: PublishResponse = parse("testnet publication", &body)?;
        if !published.is_public() {
            return Err(SpellError::NotPublished(testnet_id.to_string()).into());
        }
        Ok(format!("{DASHBOARD}/explorer/vnet/{testnet_id}/transactions"))
    }
}

#[cfg(test)]
mod tests {
    use hyper::StatusCode;

    use super::*;
    use crate::testing::{serve, Received};

    fn resolve(body: Value) -> Result<(String, String), SpellError> {
        let created: CreatedResponse = parse("test", &body.to_string())?;
        created.resolve()
    }

    fn client(api_base: Url) -> TenderlyClient {
        TenderlyClient::new(
            api_base,
            "me".to_string(),
            "spells".to_string(),
            "secret".to_string(),
        )
    }

    #[test]
    fn resolves_legacy_fork() {
        let body = json!({ "simulation_fork": { "id": "abc", "network_id": "1" } });
        let (id, rpc) = resolve(body).unwrap();
        assert_eq!(id, "abc");
        assert_eq!(rpc, "https://rpc.tenderly.co/fork/abc");
    }

    #[test]
    fn prefers_explicit_fork_rpc() {
        let (_, rpc) = resolve(json!({
            "simulation_fork": { "id": "abc", "rpc_url": "https://rpc.example/abc" }
        }))
        .unwrap();
        assert_eq!(rpc, "https://rpc.example/abc");
    }

    #[test]
    fn resolves_testnet_container() {
        let (id, rpc) = resolve(json!({
            "container": {
                "id": "c1",
                "connectivityConfig": {
                    "endpoints": [{ "id": "e1", "uri": "https://rpc.example/c1" }]
                }
            }
        }))
        .unwrap();
        assert_eq!((id.as_str(), rpc.as_str()), ("c1", "https://rpc.example/c1"));
    }

    #[test]
    fn prefers_admin_rpc_of_virtual_testnet() {
        let (id, rpc) = resolve(json!({
            "id": "v1",
            "slug": "spell",
            "rpcs": [
                { "name": "Public RPC", "url": "https://public.example/v1" },
                { "name": "Admin RPC", "url": "https://admin.example/v1" }
            ]
        }))
        .unwrap();
        assert_eq!((id.as_str(), rpc.as_str()), ("v1", "https://admin.example/v1"));
    }

    #[test]
    fn falls_back_to_first_rpc() {
        let (_, rpc) = resolve(json!({
            "id": "v1",
            "rpcs": [{ "name": "Public RPC", "url": "https://public.example/v1" }]
        }))
        .unwrap();
        assert_eq!(rpc, "https://public.example/v1");
    }

    #[test]
    fn missing_endpoint_is_fatal() {
        let body = json!({ "container": { "id": "c1", "connectivityConfig": {} } });
        let err = resolve(body).unwrap_err();
        assert!(matches!(err, SpellError::MissingEndpoint(id) if id == "c1"));

        let err = resolve(json!({ "id": "v1", "rpcs": [] })).unwrap_err();
        assert!(matches!(err, SpellError::MissingEndpoint(_)));
    }

    #[test]
    fn unknown_shape_is_fatal() {
        let err = resolve(json!({ "fork": { "uuid": "x" } })).unwrap_err();
        assert!(matches!(err, SpellError::UnexpectedResponse { .. }));

        let body = json!({ "simulation_fork": { "id": "" } });
        let err = resolve(body).unwrap_err();
        assert!(matches!(err, SpellError::UnexpectedResponse { .. }));
    }

    #[test]
    fn reads_publication_state() {
        let body = json!({ "container": { "id": "c1", "isPublic": true } });
        let public: PublishResponse = parse("test", &body.to_string()).unwrap();
        assert!(public.is_public());

        let body = json!({ "id": "v1", "explorer_page_config": { "enabled": false } });
        let private: PublishResponse = parse("test", &body.to_string()).unwrap();
        assert!(!private.is_public());
    }

    #[tokio::test]
    async fn creates_testnet_under_the_project() {
        let api = serve(|req: Received| {
            assert_eq!(req.method, Method::POST);
            assert_eq!(req.path, "/account/me/project/spells/vnets");
            assert_eq!(req.headers["x-access-key"], "secret");
            assert_eq!(
                req.body["virtual_network_config"]["chain_config"]["chain_id"],
                314311
            );

            let reply = json!({
                "id": "v1",
                "rpcs": [{ "name": "Admin RPC", "url": "https://admin.example/v1" }]
            });
            (StatusCode::OK, reply)
        })
        .await;

        let simulation = client(api)
            .create_testnet(1, 314311, "spell-0xabc", "Spell 0xabc")
            .await
            .unwrap();

        assert_eq!(simulation.mode, Mode::Testnet);
        assert_eq!(simulation.id, "v1");
        assert_eq!(simulation.rpc_url.as_str(), "https://admin.example/v1");
        assert_eq!(
            simulation.dashboard_url,
            "https://dashboard.tenderly.co/me/spells/testnet/v1"
        );
    }

    #[tokio::test]
    async fn error_status_is_fatal() {
        let api = serve(|_| {
            let reply = json!({ "error": { "message": "invalid access key" } });
            (StatusCode::FORBIDDEN, reply)
        })
        .await;

        let err = client(api).create_fork(1).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("403 Forbidden"), "{message}");
        assert!(message.contains("invalid access key"), "{message}");
    }

    #[tokio::test]
    async fn publishes_testnet_explorer() {
        let api = serve(|req: Received| {
            assert_eq!(req.method, Method::PUT);
            assert_eq!(req.path, "/account/me/project/spells/vnets/v1");
            assert_eq!(req.body["explorer_page_config"]["enabled"], true);

            let reply = json!({ "id": "v1", "explorer_page_config": { "enabled": true } });
            (StatusCode::OK, reply)
        })
        .await;

        let url = client(api).publish_testnet("v1").await.unwrap();

        assert_eq!(
            url,
            "https://dashboard.tenderly.co/explorer/vnet/v1/transactions"
        );
    }

    #[tokio::test]
    async fn testnet_left_private_is_fatal() {
        let api = serve(|_| {
            let reply = json!({ "id": "v1", "explorer_page_config": { "enabled": false } });
            (StatusCode::OK, reply)
        })
        .await;

        let err = client(api).publish_testnet("v1").await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SpellError>(),
            Some(SpellError::NotPublished(id)) if id == "v1"
        ));
    }
}
