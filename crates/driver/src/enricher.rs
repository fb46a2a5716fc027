//! Contract enrichment: explorer and RPC lookups folded into one agent record.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use eyre::Result;
use primitives::{
    Agent, AgentProfile, AgentStore, ChainDataProvider, ContractSource, ExplorerTransaction,
    TxHistoryQuery, agent::placeholder_name, selectors::selectors_present_in_bytecode,
    units::format_balance,
};
use tracing::{info, warn};

use crate::classifier::{Compliance, check_behavior_consistency, classify, derive_learning_model};

/// Number of recent transactions inspected for the behavioral cross-check.
pub const HISTORY_SIZE: u32 = 50;

/// Everything fetched for one contract. Failed lookups are already replaced by their fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractFacts {
    /// Verified source, if published
    pub source: Option<ContractSource>,
    /// Native balance in wei
    pub balance: Option<U256>,
    /// Deployed code, empty for EOAs
    pub bytecode: Bytes,
    /// Recent explorer transactions
    pub history: Vec<ExplorerTransaction>,
}

/// Agent profile and classification derived from `facts`.
pub fn enriched_profile(address: Address, facts: &ContractFacts) -> (AgentProfile, Compliance) {
    let source = facts.source.as_ref();
    let compliance = classify(source);
    let verified = source.is_some_and(|s| !s.source_code.is_empty());

    let mut profile = AgentProfile::placeholder(address, address);
    profile.name = source
        .map(|s| s.contract_name.clone())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| placeholder_name(address));
    profile.description = describe(address, &compliance, verified, facts);
    profile.compiler = source.map(|s| s.compiler_version.clone()).filter(|c| !c.is_empty());
    profile.license = source.map(|s| s.license_type.clone()).filter(|l| !l.is_empty());
    profile.verified = verified;
    profile.balance = facts.balance.map(format_balance);
    profile.agent_type = compliance.agent_type;
    profile.learning_model = derive_learning_model(source, compliance.score);
    profile.logic_address = source.and_then(|s| s.implementation);

    (profile, compliance)
}

fn describe(address: Address, compliance: &Compliance, verified: bool, facts: &ContractFacts) -> String {
    let mut description = String::new();
    if compliance.score > 0 {
        description.push_str(&format!(
            "BAP-578 compliant agent (score: {}/100). ",
            compliance.score
        ));
        if compliance.has_learning_module {
            description.push_str("Learning module detected. ");
        }
        if compliance.has_permission_system {
            description.push_str("Permission system detected. ");
        }
        if compliance.has_memory_module {
            description.push_str("Memory module detected. ");
        }
    }

    match facts.source.as_ref().filter(|_| verified) {
        Some(source) => {
            let name = if source.contract_name.is_empty() {
                String::new()
            } else {
                format!(" ({})", source.contract_name)
            };
            let compiler = if source.compiler_version.is_empty() {
                "unknown"
            } else {
                source.compiler_version.as_str()
            };
            description.push_str(&format!("Verified BSC contract{name}. Compiler: {compiler}."));
        }
        None => description.push_str(&format!("Unverified BSC contract at {address:#x}.")),
    }

    let hits: Vec<&str> = selectors_present_in_bytecode(&facts.bytecode.to_string())
        .into_iter()
        .map(|known| known.name)
        .collect();
    if !hits.is_empty() {
        description.push_str(&format!(" Bytecode selector hits: {}.", hits.join(", ")));
    }

    if compliance.score > 0 {
        let learning = check_behavior_consistency("updateLearningTree", &facts.history);
        match (learning.has_calls, learning.has_event_hints) {
            (true, false) => description.push_str(
                " Warning: updateLearningTree calls observed without matching learning event hints in recent tx history.",
            ),
            (true, true) => description.push_str(
                " updateLearningTree behavior has matching learning event hints in recent tx history.",
            ),
            _ => {}
        }
    }

    description
}

/// Fetches contract facts and upserts the classified agent.
#[derive(Clone)]
pub struct ContractEnricher {
    provider: Arc<dyn ChainDataProvider>,
    store: Arc<dyn AgentStore>,
}

impl std::fmt::Debug for ContractEnricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractEnricher").finish_non_exhaustive()
    }
}

fn or_fallback<T>(result: Result<T>, fallback: T, address: Address, what: &str) -> T {
    result.unwrap_or_else(|e| {
        warn!(address = %address, err = %e, "Failed to fetch {what}, continuing without it");
        fallback
    })
}

impl ContractEnricher {
    #[allow(missing_docs)]
    pub fn new(provider: Arc<dyn ChainDataProvider>, store: Arc<dyn AgentStore>) -> Self {
        Self { provider, store }
    }

    /// Fetch source, balance, bytecode and history concurrently. Never fails: each lookup
    /// degrades to its empty value on its own.
    pub async fn fetch_facts(&self, address: Address) -> ContractFacts {
        let (source, balance, bytecode, history) = tokio::join!(
            self.provider.verified_source(address),
            self.provider.balance(address),
            self.provider.runtime_bytecode(address),
            self.provider.transaction_history(address, TxHistoryQuery::latest(HISTORY_SIZE)),
        );

        ContractFacts {
            source: or_fallback(source, None, address, "verified source"),
            balance: or_fallback(balance.map(Some), None, address, "balance"),
            bytecode: or_fallback(bytecode, Bytes::new(), address, "bytecode"),
            history: or_fallback(history, Vec::new(), address, "transaction history"),
        }
    }

    /// Classify `address` and upsert the result.
    pub async fn enrich(&self, address: Address) -> Result<Agent> {
        let facts = self.fetch_facts(address).await;
        let (profile, compliance) = enriched_profile(address, &facts);
        let agent = self.store.upsert_agent(profile).await?;

        if compliance.score > 0 {
            info!(
                address = %address,
                name = %agent.name,
                score = compliance.score,
                agent_type = %compliance.agent_type,
                "BAP-578 agent detected"
            );
        }
        Ok(agent)
    }

    /// Enrich each address in turn, skipping the ones that fail. Returns how many succeeded.
    pub async fn enrich_all(&self, addresses: &[Address]) -> usize {
        let mut enriched = 0;
        for &address in addresses {
            match self.enrich(address).await {
                Ok(_) => enriched += 1,
                Err(e) => warn!(address = %address, err = %e, "Failed to enrich contract"),
            }
        }
        enriched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitives::{AgentType, MemoryStore, test_util::StaticProvider};

    fn contract() -> Address {
        "0x00000000000000000000000000000000000000c1".parse().unwrap()
    }

    fn agent_source() -> ContractSource {
        ContractSource {
            source_code: "contract Agent { function executeAction() {} function fundAgent() {} \
                          function getState() {} function updateLearningTree() {} \
                          function verifyLearning() {} }"
                .to_owned(),
            contract_name: "LearningAgent".to_owned(),
            compiler_version: "v0.8.24+commit.e11b9ed9".to_owned(),
            license_type: "MIT".to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn unverified_contract_description() {
        let facts = ContractFacts::default();
        let (profile, compliance) = enriched_profile(contract(), &facts);
        assert_eq!(compliance.score, 0);
        assert_eq!(
            profile.description,
            "Unverified BSC contract at 0x00000000000000000000000000000000000000c1."
        );
        assert_eq!(profile.name, "Contract 0x00000000...");
        assert!(!profile.verified);
        assert_eq!(profile.balance, None);
        assert_eq!(profile.owner, contract());
    }

    #[test]
    fn verified_agent_description_lists_findings() {
        let facts = ContractFacts {
            source: Some(agent_source()),
            balance: Some(U256::ZERO),
            // executeAction and updateLearningTree selectors embedded in the code
            bytecode: Bytes::from_static(&[0x60, 0x55, 0x15, 0x0c, 0x16, 0x97, 0x6a, 0x60, 0x5b]),
            history: vec![ExplorerTransaction {
                input: "0x976a605b00".to_owned(),
                ..Default::default()
            }],
        };
        let (profile, compliance) = enriched_profile(contract(), &facts);

        assert_eq!(compliance.score, 3 * 12 + 2 * 15 + 20);
        assert_eq!(profile.agent_type, AgentType::MerkleLearning);
        assert_eq!(
            profile.description,
            "BAP-578 compliant agent (score: 86/100). Learning module detected. \
             Verified BSC contract (LearningAgent). Compiler: v0.8.24+commit.e11b9ed9. \
             Bytecode selector hits: executeAction, updateLearningTree. \
             Warning: updateLearningTree calls observed without matching learning event hints \
             in recent tx history."
        );
        assert_eq!(profile.name, "LearningAgent");
        assert_eq!(profile.balance.as_deref(), Some("0.000000 BNB"));
        assert!(profile.verified);
    }

    #[test]
    fn proxy_implementation_becomes_logic_address() {
        let implementation = Address::repeat_byte(0x1d);
        let facts = ContractFacts {
            source: Some(ContractSource {
                source_code: "contract P {}".to_owned(),
                is_proxy: true,
                implementation: Some(implementation),
                ..Default::default()
            }),
            ..Default::default()
        };
        let (profile, _) = enriched_profile(contract(), &facts);
        assert_eq!(profile.logic_address, Some(implementation));
        assert_eq!(profile.compiler, None);
        assert!(profile.description.starts_with("Verified BSC contract. Compiler: unknown."));
    }

    #[tokio::test]
    async fn enrichment_is_stable() {
        let provider = StaticProvider::new()
            .with_source(contract(), agent_source())
            .with_balance(contract(), U256::from(1_500_000_000_000_000_000u128));
        let store = MemoryStore::new();
        let enricher = ContractEnricher::new(Arc::new(provider), Arc::new(store.clone()));

        let first = enricher.enrich(contract()).await.unwrap();
        let second = enricher.enrich(contract()).await.unwrap();
        assert_eq!(first.profile, second.profile);
        assert_eq!(store.agents().len(), 1);
        assert_eq!(second.balance.as_deref(), Some("1.500000 BNB"));
    }

    #[tokio::test]
    async fn enrich_all_counts_successes() {
        let store = MemoryStore::new();
        let enricher = ContractEnricher::new(Arc::new(StaticProvider::new()), Arc::new(store));
        let enriched = enricher.enrich_all(&[contract(), Address::repeat_byte(2)]).await;
        assert_eq!(enriched, 2);
    }
}
