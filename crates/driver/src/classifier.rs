//! BAP-578 compliance classification.
//!
//! Everything here is a pure function of the explorer data handed in, so repeated enrichment
//! of an unchanged contract always yields the same result.

use std::collections::HashSet;

use primitives::{
    AgentType, ContractSource, ExplorerTransaction, LearningModel, selectors::derive_method_name,
};
use serde::Deserialize;

/// Lifecycle functions of the agent interface.
pub const CORE_FUNCTIONS: &[&str] = &[
    "executeAction",
    "fundAgent",
    "getState",
    "pause",
    "unpause",
    "terminate",
    "setLogicAddress",
    "getAgentMetadata",
    "updateAgentMetadata",
];

/// Learning module functions.
pub const LEARNING_FUNCTIONS: &[&str] =
    &["updateLearningTree", "getLearningMetrics", "verifyLearning"];

/// Permission system functions.
pub const PERMISSION_FUNCTIONS: &[&str] = &["grantPermission", "revokePermission", "hasPermission"];

/// Memory module functions.
pub const MEMORY_FUNCTIONS: &[&str] = &["registerMemoryModule", "getMemoryModule"];

const STANDARD_MARKERS: &[&str] =
    &["bap578", "bap-578", "nonfungibleagent", "non_fungible_agent", "ibap578"];

/// Outcome of [`classify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Compliance {
    /// Resulting classification
    pub agent_type: AgentType,
    /// `0..=100`
    pub score: u8,
    /// Source declares learning functions
    pub has_learning_module: bool,
    /// Source declares access control
    pub has_permission_system: bool,
    /// Source declares agent memory or state
    pub has_memory_module: bool,
}

#[derive(Debug, Deserialize)]
struct AbiItem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    name: Option<String>,
}

/// Function names declared in an ABI document. Anything unparsable yields an empty set.
pub fn abi_function_names(abi: &str) -> HashSet<String> {
    serde_json::from_str::<Vec<AbiItem>>(abi)
        .map(|items| {
            items
                .into_iter()
                .filter(|item| item.kind == "function")
                .filter_map(|item| item.name)
                .collect()
        })
        .unwrap_or_default()
}

struct Evidence {
    functions: HashSet<String>,
    /// Lowercased source text
    source: String,
    /// Lowercased contract name
    name: String,
}

impl Evidence {
    fn new(source: &ContractSource) -> Self {
        Self {
            functions: abi_function_names(&source.abi),
            source: source.source_code.to_lowercase(),
            name: source.contract_name.to_lowercase(),
        }
    }

    fn matches(&self, group: &[&str]) -> u32 {
        let hits = group
            .iter()
            .filter(|f| self.functions.contains(**f) || self.source.contains(&f.to_lowercase()))
            .count();
        u32::try_from(hits).unwrap_or(u32::MAX)
    }

    fn has_signature(&self) -> bool {
        STANDARD_MARKERS.iter().any(|marker| self.source.contains(marker)) ||
            (self.source.contains("merkle") && self.source.contains("learning")) ||
            (self.name.contains("agent") &&
                (self.source.contains("executeaction") || self.source.contains("fundagent")))
    }
}

/// Score a verified contract against the BAP-578 interface.
///
/// The score stays `0` unless at least three core functions match or the source carries an
/// explicit standard marker. No source at all means no evidence.
pub fn classify(source: Option<&ContractSource>) -> Compliance {
    let Some(source) = source else {
        return Compliance::default();
    };
    let evidence = Evidence::new(source);

    let core = evidence.matches(CORE_FUNCTIONS);
    let learning = evidence.matches(LEARNING_FUNCTIONS);
    let permission = evidence.matches(PERMISSION_FUNCTIONS);
    let memory = evidence.matches(MEMORY_FUNCTIONS);
    let signature = evidence.has_signature();

    let mut compliance = Compliance {
        has_learning_module: learning >= 2,
        has_permission_system: permission >= 2,
        has_memory_module: memory >= 1,
        ..Default::default()
    };

    if core >= 3 || signature {
        let raw = core * 12 + learning * 15 + permission * 8 + memory * 5 + u32::from(signature) * 20;
        compliance.score = u8::try_from(raw.min(100)).unwrap_or(100);
    }

    if compliance.has_learning_module || (signature && evidence.source.contains("merkle")) {
        compliance.agent_type = AgentType::MerkleLearning;
    }

    compliance
}

/// Learning approach advertised by the source, only for contracts that scored.
pub fn derive_learning_model(source: Option<&ContractSource>, score: u8) -> Option<LearningModel> {
    let source = source.filter(|s| !s.source_code.is_empty() && score > 0)?;
    let src = source.source_code.to_lowercase();
    let has = |needle: &str| src.contains(needle);

    if has("reinforcement") || has("reward") {
        Some(LearningModel::Reinforcement)
    } else if has("fine_tune") || has("finetune") || has("training") {
        Some(LearningModel::FineTuning)
    } else if has("rag") && (has("retrieval") || has("vault")) {
        Some(LearningModel::Rag)
    } else if has("hybrid") || has("ensemble") {
        Some(LearningModel::Hybrid)
    } else if has("mcp") || has("model_context") {
        Some(LearningModel::Mcp)
    } else {
        None
    }
}

/// Keywords expected next to calls of a learning method.
pub fn event_hints(method: &str) -> &'static [&'static str] {
    match method {
        "updateLearningTree" => &["updatelearningtree", "learning", "merkle", "snapshot"],
        "verifyLearning" => &["verifylearning", "learningverified", "proof"],
        _ => &[],
    }
}

/// Whether recent history calls a method, and whether those calls carry matching hints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BehaviorCheck {
    /// Recent history calls the method
    pub has_calls: bool,
    /// Those calls carry matching log hints
    pub has_event_hints: bool,
}

/// Compare claimed learning activity with what the explorer reports for the same calls.
///
/// Advisory only: the result feeds the agent description, never the score.
pub fn check_behavior_consistency(method: &str, txs: &[ExplorerTransaction]) -> BehaviorCheck {
    let hints = event_hints(method);
    let mut calls = txs.iter().filter(|tx| derive_method_name(&tx.input) == method).peekable();
    if calls.peek().is_none() {
        return BehaviorCheck::default();
    }

    let has_event_hints = calls.any(|tx| {
        let haystack =
            format!("{} {} {}", tx.function_name, tx.logs, tx.method_id).to_lowercase();
        hints.iter().any(|hint| haystack.contains(hint))
    });
    BehaviorCheck { has_calls: true, has_event_hints }
}
