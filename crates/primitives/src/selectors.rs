//! Static 4-byte selector registry used to name transactions and scan bytecode.

/// Family a selector belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorGroup {
    /// Part of the BAP-578 agent interface
    Bap578,
    /// ERC-20 / ERC-721 transfer, approval and mint entry points
    Token,
    /// Other well known DeFi and NFT entry points
    Common,
}

/// A known function selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownSelector {
    /// `0x`-prefixed lowercase selector
    pub selector: &'static str,
    /// Method name
    pub name: &'static str,
    /// Category of the method
    pub group: SelectorGroup,
}

const fn sel(selector: &'static str, name: &'static str, group: SelectorGroup) -> KnownSelector {
    KnownSelector { selector, name, group }
}

use SelectorGroup::{Bap578, Common, Token};

/// Every selector the pipeline can name.
pub const KNOWN_SELECTORS: &[KnownSelector] = &[
    // core and lifecycle
    sel("0x55150c16", "executeAction", Bap578),
    sel("0x4590ae21", "setLogicAddress", Bap578),
    sel("0xef03c6db", "fundAgent", Bap578),
    sel("0x44c9af28", "getState", Bap578),
    sel("0x59295330", "getAgentMetadata", Bap578),
    sel("0x1af41d4d", "updateAgentMetadata", Bap578),
    sel("0x136439dd", "pause", Bap578),
    sel("0xfabc1cbc", "unpause", Bap578),
    sel("0x7a828b28", "terminate", Bap578),
    // learning
    sel("0x976a605b", "updateLearningTree", Bap578),
    sel("0x5d70a074", "getLearningMetrics", Bap578),
    sel("0x18042017", "verifyLearning", Bap578),
    // permissions
    sel("0x78a9e84a", "grantPermission", Bap578),
    sel("0xed665272", "revokePermission", Bap578),
    sel("0x823abfd9", "hasPermission", Bap578),
    // memory and templates
    sel("0xe1ff077a", "registerMemoryModule", Bap578),
    sel("0x26ffc7b2", "getMemoryModule", Bap578),
    sel("0xc9b04adc", "createFromTemplate", Bap578),
    // tokens
    sel("0xa9059cbb", "transfer", Token),
    sel("0x23b872dd", "transferFrom", Token),
    sel("0x095ea7b3", "approve", Token),
    sel("0x42842e0e", "safeTransferFrom", Token),
    sel("0xa22cb465", "setApprovalForAll", Token),
    sel("0x6352211e", "ownerOf", Token),
    sel("0xa0712d68", "mint", Token),
    sel("0x40c10f19", "mint", Token),
    sel("0x1249c58b", "mint", Token),
    sel("0xb88d4fde", "safeTransferFrom", Common),
    sel("0x70a08231", "balanceOf", Common),
    sel("0xc87b56dd", "tokenURI", Common),
    sel("0x01ffc9a7", "supportsInterface", Common),
    // dex
    sel("0x38ed1739", "swapExactTokensForTokens", Common),
    sel("0x7ff36ab5", "swapExactETHForTokens", Common),
    sel("0x18cbafe5", "swapExactTokensForETH", Common),
    sel("0x5c11d795", "swapExactTokensForTokensSupportingFeeOnTransferTokens", Common),
    sel("0x791ac947", "swap", Common),
    sel("0xe8e33700", "addLiquidity", Common),
    sel("0xf305d719", "addLiquidityETH", Common),
    sel("0xbaa2abde", "removeLiquidity", Common),
    sel("0x7b6e9862", "removeLiquidityETH", Common),
    sel("0xc9c65396", "createPair", Common),
    // misc
    sel("0x42966c68", "burn", Common),
    sel("0x2e1a7d4d", "withdraw", Common),
    sel("0x3ccfd60b", "withdraw", Common),
    sel("0x441a3e70", "withdraw", Common),
    sel("0xb6b55f25", "deposit", Common),
    sel("0xd0e30db0", "deposit", Common),
    sel("0xe2bbb158", "deposit", Common),
    sel("0x150b7a02", "onERC721Received", Common),
    sel("0xf2fde38b", "transferOwnership", Common),
];

/// Name used for plain value transfers and calls without a selector.
pub const PLAIN_TRANSFER: &str = "transfer";

/// Lowercased `0x` + 8 hex digit prefix of `input`, if long enough.
fn selector_prefix(input: &str) -> Option<String> {
    if input.is_empty() || input == "0x" || input.len() < 10 {
        return None;
    }
    input.get(..10).map(str::to_ascii_lowercase)
}

fn lookup<'a>(
    selector: &str,
    mut table: impl Iterator<Item = &'a KnownSelector>,
) -> Option<&'a KnownSelector> {
    table.find(|known| known.selector == selector)
}

/// Human readable method name for a hex call data string.
///
/// Empty data names a plain `transfer`; unknown selectors become `call_<selector>`.
pub fn derive_method_name(input: &str) -> String {
    let Some(selector) = selector_prefix(input) else {
        return PLAIN_TRANSFER.to_owned();
    };
    match lookup(&selector, KNOWN_SELECTORS.iter()) {
        Some(known) => known.name.to_owned(),
        None => format!("call_{selector}"),
    }
}

/// Like [`derive_method_name`] but operating on raw call data.
pub fn method_name_from_calldata(data: &[u8]) -> String {
    if data.len() < 4 {
        return PLAIN_TRANSFER.to_owned();
    }
    derive_method_name(&format!("0x{}", hex::encode(&data[..4])))
}

/// Naming used for registry transaction history: only BAP-578 and token selectors are known.
pub fn derive_registry_method_name(input: &str) -> String {
    let Some(selector) = selector_prefix(input) else {
        return PLAIN_TRANSFER.to_owned();
    };
    let table = KNOWN_SELECTORS.iter().filter(|known| known.group != Common);
    match lookup(&selector, table) {
        Some(known) => known.name.to_owned(),
        None => format!("call_{selector}"),
    }
}

/// Whether the call data targets a BAP-578 interface function.
pub fn is_bap578_selector(input: &str) -> bool {
    selector_prefix(input).is_some_and(|selector| {
        lookup(&selector, KNOWN_SELECTORS.iter().filter(|k| k.group == Bap578)).is_some()
    })
}

/// BAP-578 selectors whose raw hex appears anywhere in the runtime bytecode.
///
/// This is a substring scan, not a disassembly, so false positives are possible.
pub fn selectors_present_in_bytecode(bytecode: &str) -> Vec<&'static KnownSelector> {
    if bytecode.is_empty() || bytecode == "0x" {
        return Vec::new();
    }
    let code = bytecode.to_ascii_lowercase();
    KNOWN_SELECTORS
        .iter()
        .filter(|known| known.group == Bap578 && code.contains(&known.selector[2..]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_a_transfer() {
        assert_eq!(derive_method_name(""), "transfer");
        assert_eq!(derive_method_name("0x"), "transfer");
        assert_eq!(derive_method_name("0x1234"), "transfer");
    }

    #[test]
    fn known_selectors_are_named() {
        let input = format!("0xa9059cbb{}", "00".repeat(64));
        assert_eq!(derive_method_name(&input), "transfer");
        assert_eq!(derive_method_name("0x976A605B"), "updateLearningTree");
        assert_eq!(derive_method_name("0x38ed1739ff"), "swapExactTokensForTokens");
    }

    #[test]
    fn unknown_selector_falls_back() {
        assert_eq!(derive_method_name("0xdeadbeef"), "call_0xdeadbeef");
        assert_eq!(derive_method_name("0xDEADBEEF00"), "call_0xdeadbeef");
    }

    #[test]
    fn registry_naming_ignores_dex_selectors() {
        assert_eq!(derive_registry_method_name("0x38ed1739"), "call_0x38ed1739");
        assert_eq!(derive_registry_method_name("0x40c10f19"), "mint");
        assert_eq!(derive_registry_method_name("0x55150c16"), "executeAction");
    }

    #[test]
    fn calldata_naming() {
        assert_eq!(method_name_from_calldata(&[]), "transfer");
        assert_eq!(method_name_from_calldata(&[0xef, 0x03, 0xc6, 0xdb, 0x01]), "fundAgent");
    }

    #[test]
    fn bap578_selector_detection() {
        assert!(is_bap578_selector("0x55150c16"));
        assert!(!is_bap578_selector("0xa9059cbb"));
        assert!(!is_bap578_selector("0x"));
    }

    #[test]
    fn bytecode_scan_finds_embedded_selectors() {
        let code = "0x6080604052348015600f57600080fd5b50637A828B2814601f5763976a605b";
        let hits: Vec<_> = selectors_present_in_bytecode(code).iter().map(|k| k.name).collect();
        assert_eq!(hits, vec!["terminate", "updateLearningTree"]);
        assert!(selectors_present_in_bytecode("0x").is_empty());
    }
}
