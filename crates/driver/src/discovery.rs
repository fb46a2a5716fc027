//! One-shot enumeration of the ERC-8004 identity registry and the BAP-578 NFA contract.

use std::{collections::HashMap, sync::Arc, time::Duration};

use alloy_primitives::Address;
use chainio::{
    decode_owner_of, decode_token_uri, decode_total_supply, encode_owner_of, encode_token_uri,
    encode_total_supply,
};
use eyre::Result;
use primitives::{
    AgentEvent, AgentProfile, AgentStore, AgentType, ChainDataProvider, ExplorerTransaction,
    LearningModel, TxHistoryQuery, TxStatus, is_duplicate_error,
    agent::{ERC8004_TAG, NFA_TAG, erc8004_id, synthetic_address},
    records::EVENT_KIND_TRANSACTION,
    selectors::derive_registry_method_name,
    units::{format_value, gwei_from_wei},
};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Registry contracts on the indexed chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registries {
    /// ERC-8004 identity registry
    pub identity: Address,
    /// ERC-8004 reputation registry
    pub reputation: Address,
    /// BAP-578 NFA contract
    pub nfa: Address,
    /// BAP-578 marketplace
    pub marketplace: Address,
}

impl Registries {
    /// Protocol contracts with their display names.
    pub const fn protocol_contracts(&self) -> [(Address, &'static str); 4] {
        [
            (self.identity, "ERC-8004 Identity Registry"),
            (self.reputation, "ERC-8004 Reputation Registry"),
            (self.nfa, "BAP-578 NFA Registry"),
            (self.marketplace, "BAP-578 NFA Marketplace"),
        ]
    }
}

impl From<&config::RegistryOpts> for Registries {
    fn from(opts: &config::RegistryOpts) -> Self {
        Self {
            identity: opts.identity_registry,
            reputation: opts.reputation_registry,
            nfa: opts.nfa_contract,
            marketplace: opts.nfa_marketplace,
        }
    }
}

/// Probe bounds and pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Contracts to enumerate
    pub registries: Registries,
    /// Highest NFA token id tried
    pub max_probe_id: u64,
    /// Misses in a row that end the NFA scan
    pub max_consecutive_missing: u64,
    /// Pause after each token read
    pub probe_delay: Duration,
    /// Pause after a missing token id
    pub miss_delay: Duration,
    /// Transactions imported per registry
    pub history_limit: u32,
    /// Pause after each registry history import
    pub history_delay: Duration,
}

impl DiscoveryConfig {
    /// Build from the command line groups.
    pub fn new(registries: &config::RegistryOpts, opts: &config::DiscoveryOpts) -> Self {
        Self {
            registries: Registries::from(registries),
            max_probe_id: opts.max_probe_id,
            max_consecutive_missing: opts.max_consecutive_missing,
            probe_delay: Duration::from_millis(opts.probe_delay_ms),
            miss_delay: Duration::from_millis(opts.miss_delay_ms),
            history_limit: opts.registry_history_limit,
            history_delay: Duration::from_millis(opts.registry_history_delay_ms),
        }
    }
}

/// A named service advertised in token metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Service {
    /// Service name, e.g. `MCP` or `A2A`
    pub name: String,
}

/// The fields of an agent registration document that discovery uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenMetadata {
    /// Display name
    pub name: Option<String>,
    /// Free-form description
    pub description: Option<String>,
    /// Advertised services
    pub services: Vec<Service>,
    /// Whether the agent accepts X402 payments
    pub x402_support: bool,
}

impl TokenMetadata {
    /// Read a registration document field by field.
    ///
    /// A malformed field is dropped on its own, as is a service entry without a string name.
    /// `None` when the document is not a JSON object.
    pub fn from_document(document: &Value) -> Option<Self> {
        let fields = document.as_object()?;
        let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_owned);
        let services = fields
            .get("services")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.get("name")?.as_str())
                    .map(|name| Service { name: name.to_owned() })
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            name: text("name"),
            description: text("description"),
            services,
            x402_support: fields.get("x402Support").and_then(Value::as_bool).unwrap_or_default(),
        })
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.is_empty())
    }

    /// `MCP` service means MCP, `A2A` hybrid, anything else RAG.
    pub fn learning_model(&self) -> LearningModel {
        if self.services.iter().any(|s| s.name == "MCP") {
            LearningModel::Mcp
        } else if self.services.iter().any(|s| s.name == "A2A") {
            LearningModel::Hybrid
        } else {
            LearningModel::Rag
        }
    }
}

/// A live token of one registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryToken {
    /// Token id
    pub token_id: u64,
    /// Current owner
    pub owner: Address,
    /// Empty when the registry has none
    pub token_uri: String,
    /// Parsed registration document
    pub metadata: Option<TokenMetadata>,
}

impl RegistryToken {
    fn metadata_uri(&self) -> Option<String> {
        Some(self.token_uri.clone()).filter(|uri| !uri.is_empty())
    }

    fn learning_model(&self) -> LearningModel {
        self.metadata.as_ref().map(TokenMetadata::learning_model).unwrap_or(LearningModel::Rag)
    }
}

const FREE_MINT: &str = "Free";
const IDENTITY_MINT_FEE: &str = "10 U";
const NFA_COMPILER: &str = "BAP-578 NFA";
const IDENTITY_COMPILER: &str = "ERC-8004";
const MIT: &str = "MIT";

/// Agent record for an identity-registry token, NFA-backed when `nfa` is set.
pub fn identity_profile(
    token: &RegistryToken,
    nfa: Option<&RegistryToken>,
    nfa_contract: Address,
) -> AgentProfile {
    let metadata = token.metadata.as_ref();
    let mut parts: Vec<String> = Vec::new();
    if let Some(description) = metadata.and_then(TokenMetadata::description) {
        parts.push(description.to_owned());
    }
    parts.push(format!("ERC-8004 registered agent (ID: {}).", token.token_id));
    if nfa.is_some() {
        parts.push("Upgraded to BAP-578 NFA with autonomous execution capabilities.".to_owned());
    }
    if let Some(metadata) = metadata.filter(|m| !m.services.is_empty()) {
        let names: Vec<&str> = metadata.services.iter().map(|s| s.name.as_str()).collect();
        parts.push(format!("Services: {}.", names.join(", ")));
    }
    if metadata.is_some_and(|m| m.x402_support) {
        parts.push("X402 payment support enabled.".to_owned());
    }

    let address = synthetic_address(ERC8004_TAG, token.token_id);
    let mut profile = AgentProfile::placeholder(address, token.owner);
    profile.name = metadata
        .and_then(TokenMetadata::name)
        .map_or_else(|| format!("Agent #{}", token.token_id), str::to_owned);
    profile.description = parts.join(" ");
    profile.metadata_uri = token.metadata_uri();
    profile.license = Some(MIT.to_owned());
    profile.verified = true;
    profile.erc8004_id = Some(erc8004_id(token.token_id));

    if nfa.is_some() {
        profile.agent_type = AgentType::MerkleLearning;
        profile.learning_model = Some(token.learning_model());
        profile.logic_address = Some(nfa_contract);
        profile.compiler = Some(NFA_COMPILER.to_owned());
        profile.balance = Some("0 BNB".to_owned());
        profile.mint_fee = Some(FREE_MINT.to_owned());
    } else {
        profile.compiler = Some(IDENTITY_COMPILER.to_owned());
        profile.mint_fee = Some(IDENTITY_MINT_FEE.to_owned());
    }
    profile
}

/// Agent record for an NFA token with no identity registration.
pub fn standalone_nfa_profile(token: &RegistryToken, nfa_contract: Address) -> AgentProfile {
    let metadata = token.metadata.as_ref();
    let address = synthetic_address(NFA_TAG, token.token_id);
    let mut profile = AgentProfile::placeholder(address, token.owner);
    profile.name = metadata
        .and_then(TokenMetadata::name)
        .map_or_else(|| format!("NFA Agent #{}", token.token_id), str::to_owned);
    profile.description = match metadata.and_then(TokenMetadata::description) {
        Some(description) => format!(
            "{description} BAP-578 NFA (ID: {}) with autonomous execution capabilities.",
            token.token_id
        ),
        None => format!("BAP-578 Non-Fungible Agent (NFA ID: {}) on BNB Chain.", token.token_id),
    };
    profile.metadata_uri = token.metadata_uri();
    profile.agent_type = AgentType::MerkleLearning;
    profile.learning_model = Some(token.learning_model());
    profile.logic_address = Some(nfa_contract);
    profile.compiler = Some(NFA_COMPILER.to_owned());
    profile.license = Some(MIT.to_owned());
    profile.verified = true;
    profile.mint_fee = Some(FREE_MINT.to_owned());
    profile
}

/// Agent record for one of the protocol's own contracts.
pub fn protocol_profile(address: Address, name: &str) -> AgentProfile {
    let mut profile = AgentProfile::placeholder(address, address);
    profile.name = name.to_owned();
    profile.description = format!("Official {name} on BNB Chain.");
    profile.compiler = Some("Solidity".to_owned());
    profile.license = Some(MIT.to_owned());
    profile.verified = true;
    profile.agent_type = AgentType::MerkleLearning;
    profile
}

fn registry_event(registry: Address, tx: &ExplorerTransaction) -> AgentEvent {
    AgentEvent {
        agent: registry,
        kind: EVENT_KIND_TRANSACTION.to_owned(),
        tx_hash: tx.hash,
        block_number: tx.block_number,
        from: tx.from,
        to: tx.to,
        value: format_value(tx.value),
        gas_used: if tx.gas_used > 0 { tx.gas_used } else { tx.gas },
        gas_price: gwei_from_wei(tx.gas_price),
        status: if tx.succeeded { TxStatus::Confirmed } else { TxStatus::Failed },
        method: derive_registry_method_name(&tx.input),
        details: None,
    }
}

/// Counts of what one discovery run stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Identity tokens stored
    pub identity_agents: usize,
    /// NFA tokens found
    pub nfa_tokens: usize,
    /// NFA tokens without an identity token
    pub standalone_nfas: usize,
    /// Registry contracts stored
    pub protocol_contracts: usize,
    /// Registry transactions imported
    pub registry_events: usize,
}

/// Enumerates both registries and stores an agent per live token.
#[derive(Clone)]
pub struct AgentDiscovery {
    provider: Arc<dyn ChainDataProvider>,
    store: Arc<dyn AgentStore>,
    config: DiscoveryConfig,
}

impl std::fmt::Debug for AgentDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentDiscovery").field("config", &self.config).finish_non_exhaustive()
    }
}

impl AgentDiscovery {
    #[allow(missing_docs)]
    pub fn new(
        provider: Arc<dyn ChainDataProvider>,
        store: Arc<dyn AgentStore>,
        config: DiscoveryConfig,
    ) -> Self {
        Self { provider, store, config }
    }

    /// Enumerate both registries concurrently, then store agents, protocol contracts and
    /// registry history.
    pub async fn run(&self) -> Result<DiscoveryReport> {
        info!("Starting agent discovery");
        let (identity, nfas) = tokio::join!(self.enumerate_identity(), self.probe_nfa());

        let nfa_by_id: HashMap<u64, &RegistryToken> = nfas.iter().map(|t| (t.token_id, t)).collect();
        let mut report = DiscoveryReport { nfa_tokens: nfas.len(), ..Default::default() };
        let nfa_contract = self.config.registries.nfa;

        for token in &identity {
            let nfa = nfa_by_id.get(&token.token_id).copied();
            match self.store.upsert_agent(identity_profile(token, nfa, nfa_contract)).await {
                Ok(_) => report.identity_agents += 1,
                Err(e) => warn!(token_id = token.token_id, err = %e, "Failed to store identity agent"),
            }
        }

        let identity_ids: Vec<u64> = identity.iter().map(|t| t.token_id).collect();
        for token in nfas.iter().filter(|t| !identity_ids.contains(&t.token_id)) {
            match self.store.upsert_agent(standalone_nfa_profile(token, nfa_contract)).await {
                Ok(_) => report.standalone_nfas += 1,
                Err(e) => warn!(token_id = token.token_id, err = %e, "Failed to store standalone NFA"),
            }
        }

        report.protocol_contracts = self.ensure_protocol_contracts().await?;
        report.registry_events = self.import_registry_history().await;

        info!(
            identity_agents = report.identity_agents,
            nfa_tokens = report.nfa_tokens,
            standalone_nfas = report.standalone_nfas,
            registry_events = report.registry_events,
            "Agent discovery complete"
        );
        Ok(report)
    }

    async fn total_supply(&self, registry: Address) -> u64 {
        match self.provider.call_contract(registry, encode_total_supply()).await {
            Ok(output) => decode_total_supply(&output).unwrap_or_else(|e| {
                warn!(registry = %registry, err = %e, "Malformed totalSupply return");
                0
            }),
            Err(e) => {
                warn!(registry = %registry, err = %e, "totalSupply call failed");
                0
            }
        }
    }

    /// Read owner, URI and metadata of one token. Errors only when `ownerOf` fails, which
    /// means the token does not exist.
    async fn read_token(&self, registry: Address, token_id: u64) -> Result<RegistryToken> {
        let output = self.provider.call_contract(registry, encode_owner_of(token_id)).await?;
        let owner = decode_owner_of(&output)?;
        sleep(self.config.probe_delay).await;

        let token_uri = match self.provider.call_contract(registry, encode_token_uri(token_id)).await {
            Ok(output) => decode_token_uri(&output).unwrap_or_default(),
            Err(e) => {
                debug!(registry = %registry, token_id, err = %e, "tokenURI unavailable");
                String::new()
            }
        };
        sleep(self.config.probe_delay).await;

        let metadata = if token_uri.is_empty() { None } else { self.token_metadata(&token_uri).await };
        Ok(RegistryToken { token_id, owner, token_uri, metadata })
    }

    async fn token_metadata(&self, uri: &str) -> Option<TokenMetadata> {
        let document = match self.provider.fetch_offchain_metadata(uri).await {
            Ok(document) => document?,
            Err(e) => {
                debug!(uri, err = %e, "Metadata fetch failed");
                return None;
            }
        };
        let metadata = TokenMetadata::from_document(&document);
        if metadata.is_none() {
            debug!(uri, "Metadata document is not a JSON object");
        }
        metadata
    }

    /// Every token `1..=totalSupply` of the identity registry.
    pub async fn enumerate_identity(&self) -> Vec<RegistryToken> {
        let registry = self.config.registries.identity;
        let total = self.total_supply(registry).await;
        info!(total, "Enumerating identity registry");

        let mut tokens = Vec::new();
        for token_id in 1..=total {
            match self.read_token(registry, token_id).await {
                Ok(token) => tokens.push(token),
                Err(e) => warn!(token_id, err = %e, "Failed to read identity token"),
            }
            if token_id % 20 == 0 {
                info!(token_id, total, "Identity registry progress");
            }
        }
        tokens
    }

    /// Probe NFA ids upwards until the cap, or until a run of consecutive misses.
    ///
    /// The reported supply is logged but not trusted.
    pub async fn probe_nfa(&self) -> Vec<RegistryToken> {
        let registry = self.config.registries.nfa;
        let reported = self.total_supply(registry).await;
        info!(reported, "Probing NFA contract");

        let mut tokens = Vec::new();
        let mut consecutive_missing = 0;
        for token_id in 1..=self.config.max_probe_id {
            match self.read_token(registry, token_id).await {
                Ok(token) => {
                    consecutive_missing = 0;
                    tokens.push(token);
                }
                Err(_) => {
                    consecutive_missing += 1;
                    sleep(self.config.miss_delay).await;
                    if consecutive_missing >= self.config.max_consecutive_missing {
                        info!(token_id, consecutive_missing, "Stopping NFA probe");
                        break;
                    }
                }
            }
        }
        info!(found = tokens.len(), "NFA probe complete");
        tokens
    }

    /// Create records for the protocol contracts that have none. Returns how many were added.
    pub async fn ensure_protocol_contracts(&self) -> Result<usize> {
        let mut created = 0;
        for (address, name) in self.config.registries.protocol_contracts() {
            if self.store.get_agent_by_address(address).await?.is_none() {
                self.store.upsert_agent(protocol_profile(address, name)).await?;
                created += 1;
            }
        }
        Ok(created)
    }

    /// Store recent transactions of the NFA contract and identity registry as events.
    pub async fn import_registry_history(&self) -> usize {
        let registries = [
            (self.config.registries.nfa, "BAP-578 NFA Registry"),
            (self.config.registries.identity, "ERC-8004 Identity Registry"),
        ];
        let mut stored = 0;
        for (registry, name) in registries {
            match self.import_history(registry, name).await {
                Ok(count) => {
                    info!(registry = %registry, stored = count, "Imported registry transactions");
                    stored += count;
                }
                Err(e) => warn!(registry = %registry, err = %e, "Failed to import registry history"),
            }
        }
        stored
    }

    async fn import_history(&self, registry: Address, name: &str) -> Result<usize> {
        let txs = self
            .provider
            .transaction_history(registry, TxHistoryQuery::latest(self.config.history_limit))
            .await?;
        if txs.is_empty() {
            return Ok(0);
        }

        if self.store.get_agent_by_address(registry).await?.is_none() {
            self.store.upsert_agent(protocol_profile(registry, name)).await?;
        }

        let mut stored = 0;
        for tx in &txs {
            if self.store.event_exists(tx.hash).await? {
                continue;
            }
            match self.store.create_event(registry_event(registry, tx)).await {
                Ok(()) => stored += 1,
                Err(e) if is_duplicate_error(&e) => {}
                Err(e) => warn!(tx_hash = %tx.hash, err = %e, "Failed to store registry transaction"),
            }
        }

        sleep(self.config.history_delay).await;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use chainio::returns;
    use primitives::{MemoryStore, test_util::StaticProvider};
    use serde_json::json;

    fn registries() -> Registries {
        Registries {
            identity: Address::repeat_byte(0x80),
            reputation: Address::repeat_byte(0x81),
            nfa: Address::repeat_byte(0xba),
            marketplace: Address::repeat_byte(0xbb),
        }
    }

    fn config() -> DiscoveryConfig {
        DiscoveryConfig {
            registries: registries(),
            max_probe_id: 200,
            max_consecutive_missing: 20,
            probe_delay: Duration::ZERO,
            miss_delay: Duration::ZERO,
            history_limit: 100,
            history_delay: Duration::ZERO,
        }
    }

    fn with_token(provider: StaticProvider, registry: Address, id: u64, owner: Address) -> StaticProvider {
        provider.with_call(registry, encode_owner_of(id), returns::address(owner))
    }

    fn discovery(provider: StaticProvider, store: &MemoryStore) -> AgentDiscovery {
        AgentDiscovery::new(Arc::new(provider), Arc::new(store.clone()), config())
    }

    fn token(id: u64, metadata: Option<TokenMetadata>) -> RegistryToken {
        RegistryToken { token_id: id, owner: Address::repeat_byte(0x0e), token_uri: String::new(), metadata }
    }

    #[test]
    fn metadata_parses_registration_documents() {
        let metadata = TokenMetadata::from_document(&json!({
            "name": "Scout",
            "description": "Finds things.",
            "image": "ipfs://img",
            "services": [{ "name": "A2A", "endpoint": "https://a2a" }],
            "x402Support": true
        }))
        .unwrap();
        assert_eq!(metadata.name(), Some("Scout"));
        assert_eq!(metadata.learning_model(), LearningModel::Hybrid);
        assert!(metadata.x402_support);
        assert_eq!(TokenMetadata::from_document(&json!("ipfs://elsewhere")), None);
    }

    #[test]
    fn malformed_metadata_fields_are_dropped_individually() {
        let metadata = TokenMetadata::from_document(&json!({
            "name": "Scout",
            "description": "d",
            "services": [{ "name": "MCP" }, "web", { "name": 7 }]
        }))
        .unwrap();
        assert_eq!(metadata.name(), Some("Scout"));
        assert_eq!(metadata.services, vec![Service { name: "MCP".to_owned() }]);
        assert_eq!(metadata.learning_model(), LearningModel::Mcp);

        let metadata = TokenMetadata::from_document(&json!({
            "name": "Scout",
            "description": ["not", "text"],
            "services": "none",
            "x402Support": "yes"
        }))
        .unwrap();
        assert_eq!(metadata.name(), Some("Scout"));
        assert_eq!(metadata.description(), None);
        assert!(metadata.services.is_empty());
        assert!(!metadata.x402_support);
        assert_eq!(metadata.learning_model(), LearningModel::Rag);
    }

    #[tokio::test]
    async fn token_with_partly_malformed_metadata_keeps_its_name() {
        let r = registries();
        let owner = Address::repeat_byte(0x0e);
        let provider = StaticProvider::new()
            .with_call(r.identity, encode_owner_of(4), returns::address(owner))
            .with_call(r.identity, encode_token_uri(4), returns::string("ipfs://agent-4"))
            .with_metadata("ipfs://agent-4", json!({ "name": "Scout", "services": "none" }));
        let discovery = discovery(provider, &MemoryStore::new());

        let token = discovery.read_token(r.identity, 4).await.unwrap();
        let profile = identity_profile(&token, None, r.nfa);
        assert_eq!(profile.name, "Scout");
        assert_eq!(profile.metadata_uri.as_deref(), Some("ipfs://agent-4"));
    }

    #[test]
    fn identity_profile_for_nfa_backed_token() {
        let metadata = TokenMetadata {
            description: Some("Trades.".to_owned()),
            services: vec![Service { name: "MCP".to_owned() }, Service { name: "web".to_owned() }],
            x402_support: true,
            ..Default::default()
        };
        let identity = token(3, Some(metadata));
        let nfa = token(3, None);
        let profile = identity_profile(&identity, Some(&nfa), registries().nfa);

        assert_eq!(profile.address, synthetic_address(ERC8004_TAG, 3));
        assert_eq!(profile.name, "Agent #3");
        assert_eq!(profile.agent_type, AgentType::MerkleLearning);
        assert_eq!(profile.erc8004_id.as_deref(), Some("erc8004:bsc:3"));
        assert_eq!(profile.learning_model, Some(LearningModel::Mcp));
        assert_eq!(profile.logic_address, Some(registries().nfa));
        assert_eq!(profile.mint_fee.as_deref(), Some("Free"));
        assert_eq!(
            profile.description,
            "Trades. ERC-8004 registered agent (ID: 3). Upgraded to BAP-578 NFA with autonomous \
             execution capabilities. Services: MCP, web. X402 payment support enabled."
        );
    }

    #[test]
    fn identity_only_token_is_json_light() {
        let profile = identity_profile(&token(4, None), None, registries().nfa);
        assert_eq!(profile.agent_type, AgentType::JsonLight);
        assert_eq!(profile.learning_model, None);
        assert_eq!(profile.compiler.as_deref(), Some("ERC-8004"));
        assert_eq!(profile.mint_fee.as_deref(), Some("10 U"));
        assert_eq!(profile.description, "ERC-8004 registered agent (ID: 4).");
    }

    #[test]
    fn standalone_profile_defaults() {
        let profile = standalone_nfa_profile(&token(9, None), registries().nfa);
        assert_eq!(profile.address, synthetic_address(NFA_TAG, 9));
        assert_eq!(profile.name, "NFA Agent #9");
        assert_eq!(profile.erc8004_id, None);
        assert_eq!(profile.learning_model, Some(LearningModel::Rag));
        assert_eq!(profile.description, "BAP-578 Non-Fungible Agent (NFA ID: 9) on BNB Chain.");
    }

    #[tokio::test]
    async fn probe_stops_after_consecutive_misses() {
        let nfa = registries().nfa;
        let provider = Arc::new(
            (1..=5).fold(StaticProvider::new(), |p, id| with_token(p, nfa, id, Address::repeat_byte(1))),
        );
        let discovery =
            AgentDiscovery::new(provider.clone(), Arc::new(MemoryStore::new()), config());

        let tokens = discovery.probe_nfa().await;
        assert_eq!(tokens.len(), 5);
        assert!(tokens.iter().all(|t| t.token_uri.is_empty() && t.metadata.is_none()));
        // totalSupply, 25 ownerOf probes and 5 tokenURI reads
        assert_eq!(provider.call_count(), 1 + 25 + 5);
    }

    #[tokio::test]
    async fn cross_reference_stores_one_agent_per_token() {
        let r = registries();
        let owner = Address::repeat_byte(0x0e);
        let mut provider = StaticProvider::new()
            .with_call(r.identity, encode_total_supply(), returns::uint(2))
            .with_call(r.identity, encode_token_uri(1), returns::string("ipfs://one"))
            .with_metadata("ipfs://one", json!({ "name": "One", "services": [{ "name": "MCP" }] }));
        for id in [1, 2] {
            provider = with_token(provider, r.identity, id, owner);
        }
        for id in [1, 7] {
            provider = with_token(provider, r.nfa, id, owner);
        }
        let store = MemoryStore::new();
        let report = discovery(provider, &store).run().await.unwrap();

        assert_eq!(report.identity_agents, 2);
        assert_eq!(report.nfa_tokens, 2);
        assert_eq!(report.standalone_nfas, 1);
        assert_eq!(report.protocol_contracts, 4);

        let both = store.get_agent_by_address(synthetic_address(ERC8004_TAG, 1)).await.unwrap().unwrap();
        assert_eq!(both.name, "One");
        assert_eq!(both.agent_type, AgentType::MerkleLearning);
        assert_eq!(both.erc8004_id.as_deref(), Some("erc8004:bsc:1"));
        assert_eq!(both.learning_model, Some(LearningModel::Mcp));
        assert_eq!(both.metadata_uri.as_deref(), Some("ipfs://one"));

        let identity_only =
            store.get_agent_by_address(synthetic_address(ERC8004_TAG, 2)).await.unwrap().unwrap();
        assert_eq!(identity_only.agent_type, AgentType::JsonLight);

        let standalone = store.get_agent_by_address(synthetic_address(NFA_TAG, 7)).await.unwrap().unwrap();
        assert_eq!(standalone.erc8004_id, None);
        assert_eq!(standalone.agent_type, AgentType::MerkleLearning);

        assert!(store.get_agent_by_address(synthetic_address(NFA_TAG, 1)).await.unwrap().is_none());
        // 3 token agents and 4 protocol contracts
        assert_eq!(store.agents().len(), 7);
    }

    #[tokio::test]
    async fn registry_history_is_imported_once() {
        let r = registries();
        let tx = |n: u8, succeeded: bool| ExplorerTransaction {
            hash: B256::repeat_byte(n),
            block_number: 100,
            to: Some(r.nfa),
            input: "0x55150c16ff".to_owned(),
            gas: 90_000,
            succeeded,
            ..Default::default()
        };
        let provider = StaticProvider::new().with_history(r.nfa, vec![tx(1, true), tx(2, false)]);
        let store = MemoryStore::new();
        let discovery = discovery(provider, &store);

        assert_eq!(discovery.import_registry_history().await, 2);
        assert_eq!(discovery.import_registry_history().await, 0);

        let events = store.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.method == "executeAction" && e.gas_used == 90_000));
        assert_eq!(events[1].status, TxStatus::Failed);
        let registry = store.get_agent_by_address(r.nfa).await.unwrap().unwrap();
        assert_eq!(registry.name, "BAP-578 NFA Registry");
        assert_eq!(registry.total_events, 2);
    }
}
