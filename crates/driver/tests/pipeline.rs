//! End-to-end behavior of the sync pipeline against canned chain data.

use std::{sync::Arc, time::Duration};

use alloy_primitives::{Address, B256, Bytes, U256};
use chainio::{encode_owner_of, encode_token_uri, encode_total_supply, returns};
use driver::{
    AgentDiscovery, BlockWalker, ContractEnricher, DiscoveryConfig, PassOutcome, SchedulerConfig,
    SkipReason, SyncScheduler, WalkerLimits, discovery::Registries,
};
use primitives::{
    AgentStore, AgentType, ChainBlock, ChainTransaction, ContractSource, LearningModel,
    MemoryStore,
    agent::{ERC8004_TAG, NFA_TAG},
    synthetic_address,
    test_util::StaticProvider,
};
use serde_json::json;

const AGENT: Address = Address::repeat_byte(0xa1);
const CALLER: Address = Address::repeat_byte(0xee);

fn call(n: u8, to: Address, input: &[u8]) -> ChainTransaction {
    ChainTransaction {
        hash: B256::repeat_byte(n),
        from: CALLER,
        to: Some(to),
        value: U256::ZERO,
        gas: 120_000,
        gas_price: 1_000_000_000,
        input: Bytes::copy_from_slice(input),
    }
}

fn block(number: u64, transactions: Vec<ChainTransaction>) -> ChainBlock {
    ChainBlock {
        number,
        hash: B256::with_last_byte(number as u8),
        parent_hash: B256::with_last_byte(number.saturating_sub(1) as u8),
        miner: Address::repeat_byte(0x11),
        gas_used: 500_000,
        gas_limit: 140_000_000,
        timestamp: 1_700_000_000 + number * 3,
        transactions,
    }
}

fn learning_agent_source() -> ContractSource {
    ContractSource {
        source_code: "// BAP-578 reference agent\ncontract MerkleAgent { \
                      function executeAction() {} function fundAgent() {} function getState() {} \
                      function updateLearningTree(bytes32 root) {} function verifyLearning() {} \
                      // reward driven learning\n }"
            .to_owned(),
        contract_name: "MerkleAgent".to_owned(),
        compiler_version: "v0.8.24".to_owned(),
        license_type: "MIT".to_owned(),
        ..Default::default()
    }
}

struct Pipeline {
    provider: Arc<StaticProvider>,
    store: MemoryStore,
    scheduler: SyncScheduler,
}

fn pipeline(provider: StaticProvider) -> Pipeline {
    let provider = Arc::new(provider);
    let store = MemoryStore::new();
    let shared_store: Arc<dyn AgentStore> = Arc::new(store.clone());
    let walker = BlockWalker::new(provider.clone(), shared_store.clone(), WalkerLimits::default());
    let enricher = ContractEnricher::new(provider.clone(), shared_store.clone());
    let scheduler = SyncScheduler::new(
        provider.clone(),
        shared_store,
        walker,
        enricher,
        SchedulerConfig::default(),
    );
    Pipeline { provider, store, scheduler }
}

#[tokio::test]
async fn initial_sync_records_and_classifies_called_contracts() {
    let execute_action = [0x55, 0x15, 0x0c, 0x16, 0x00];
    let provider = StaticProvider::new()
        .with_latest(100)
        .with_block(block(85, vec![call(1, AGENT, &execute_action)]))
        .with_block(block(90, vec![call(2, AGENT, &[]), call(3, Address::repeat_byte(0xb2), &[1])]))
        .with_source(AGENT, learning_agent_source());
    let Pipeline { store, scheduler, .. } = pipeline(provider);

    let outcome = scheduler.run_initial_sync().await.unwrap();
    assert_eq!(outcome, PassOutcome::Completed { start: 80, end: 99, contracts: 2, enriched: 2 });

    let agent = store.get_agent_by_address(AGENT).await.unwrap().unwrap();
    assert_eq!(agent.name, "MerkleAgent");
    assert_eq!(agent.agent_type, AgentType::MerkleLearning);
    assert_eq!(agent.learning_model, Some(LearningModel::Reinforcement));
    assert!(agent.verified);
    assert!(agent.description.starts_with("BAP-578 compliant agent (score: "));
    // only the call with calldata is recorded
    assert_eq!(agent.total_events, 1);
    assert_eq!(store.events()[0].method, "executeAction");

    let other = store.get_agent_by_address(Address::repeat_byte(0xb2)).await.unwrap().unwrap();
    assert_eq!(other.agent_type, AgentType::JsonLight);
    assert!(!other.verified);

    assert_eq!(store.get_last_synced_height().await.unwrap(), 99);
}

#[tokio::test]
async fn reprocessing_a_block_adds_no_duplicates() {
    let b = block(7, vec![call(1, AGENT, &[0xa9, 0x05, 0x9c, 0xbb])]);
    let provider = Arc::new(StaticProvider::new().with_block(b));
    let store = MemoryStore::new();
    let walker = BlockWalker::new(provider, Arc::new(store.clone()), WalkerLimits::default());

    walker.process_block(7).await.unwrap();
    let first = store.blocks();
    walker.process_block(7).await.unwrap();
    let second = store.blocks();

    assert_eq!(first.len(), 1);
    assert_eq!(first, second);
    assert_eq!(store.events().len(), 1);
    assert_eq!(store.receipts().len(), 1);
    let agent = store.get_agent_by_address(AGENT).await.unwrap().unwrap();
    assert_eq!(agent.total_events, 1);
    assert_eq!(agent.total_receipts, 1);
}

#[tokio::test]
async fn two_core_functions_do_not_score() {
    let source = ContractSource {
        source_code: "contract Vault { function pause() {} function unpause() {} }".to_owned(),
        contract_name: "Vault".to_owned(),
        ..Default::default()
    };
    let provider = Arc::new(StaticProvider::new().with_source(AGENT, source));
    let store = MemoryStore::new();
    let enricher = ContractEnricher::new(provider, Arc::new(store.clone()));

    let agent = enricher.enrich(AGENT).await.unwrap();
    assert_eq!(agent.agent_type, AgentType::JsonLight);
    assert_eq!(agent.learning_model, None);
    assert!(agent.description.starts_with("Verified BSC contract (Vault)."));
}

#[tokio::test]
async fn concurrent_passes_are_single_flight() {
    let provider = StaticProvider::new().with_latest(100).with_block_delay(Duration::from_millis(20));
    let Pipeline { provider, scheduler, .. } = pipeline(provider);

    let (first, second) = tokio::join!(scheduler.run_initial_sync(), scheduler.run_periodic_pass());
    assert!(matches!(first.unwrap(), PassOutcome::Completed { start: 80, end: 99, .. }));
    assert_eq!(second.unwrap(), PassOutcome::Skipped(SkipReason::Busy));
    assert_eq!(provider.block_requests().len(), 20);
    assert!(!scheduler.is_busy());
}

#[tokio::test]
async fn periodic_pass_resumes_after_the_cursor() {
    let Pipeline { provider, store, scheduler } = pipeline(StaticProvider::new().with_latest(120));
    store.set_last_synced_height(110).await.unwrap();

    let outcome = scheduler.run_periodic_pass().await.unwrap();
    assert!(matches!(outcome, PassOutcome::Completed { start: 111, end: 115, .. }));
    assert_eq!(provider.block_requests(), vec![111, 112, 113, 114, 115]);

    provider.set_latest(115);
    assert_eq!(
        scheduler.run_periodic_pass().await.unwrap(),
        PassOutcome::Skipped(SkipReason::AtHead)
    );
    assert_eq!(store.get_last_synced_height().await.unwrap(), 115);
}

fn registries() -> Registries {
    Registries {
        identity: Address::repeat_byte(0x80),
        reputation: Address::repeat_byte(0x81),
        nfa: Address::repeat_byte(0xba),
        marketplace: Address::repeat_byte(0xbb),
    }
}

#[tokio::test]
async fn discovery_merges_tokens_present_in_both_registries() {
    let r = registries();
    let owner = Address::repeat_byte(0x0e);
    let provider = StaticProvider::new()
        .with_call(r.identity, encode_total_supply(), returns::uint(1))
        .with_call(r.identity, encode_owner_of(1), returns::address(owner))
        .with_call(r.identity, encode_token_uri(1), returns::string("ipfs://agent-1"))
        .with_metadata(
            "ipfs://agent-1",
            json!({ "name": "Oracle", "services": [{ "name": "A2A" }], "x402Support": true }),
        )
        .with_call(r.nfa, encode_owner_of(1), returns::address(owner))
        .with_call(r.nfa, encode_owner_of(2), returns::address(owner));
    let store = MemoryStore::new();
    let config = DiscoveryConfig {
        registries: r,
        max_probe_id: 50,
        max_consecutive_missing: 3,
        probe_delay: Duration::ZERO,
        miss_delay: Duration::ZERO,
        history_limit: 100,
        history_delay: Duration::ZERO,
    };
    let discovery = AgentDiscovery::new(Arc::new(provider), Arc::new(store.clone()), config);

    let report = discovery.run().await.unwrap();
    assert_eq!(report.identity_agents, 1);
    assert_eq!(report.nfa_tokens, 2);
    assert_eq!(report.standalone_nfas, 1);

    let merged = store.get_agent_by_address(synthetic_address(ERC8004_TAG, 1)).await.unwrap().unwrap();
    assert_eq!(merged.name, "Oracle");
    assert_eq!(merged.agent_type, AgentType::MerkleLearning);
    assert_eq!(merged.erc8004_id.as_deref(), Some("erc8004:bsc:1"));
    assert_eq!(merged.learning_model, Some(LearningModel::Hybrid));
    assert!(merged.description.ends_with("X402 payment support enabled."));

    let nfa_only = store.get_agent_by_address(synthetic_address(NFA_TAG, 2)).await.unwrap().unwrap();
    assert_eq!(nfa_only.erc8004_id, None);
    assert_eq!(nfa_only.agent_type, AgentType::MerkleLearning);
    assert_eq!(nfa_only.logic_address, Some(r.nfa));

    // a second run converges on the same records
    discovery.run().await.unwrap();
    assert_eq!(store.agents().len(), 2 + 4);
}
