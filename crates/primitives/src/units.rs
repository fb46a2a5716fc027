//! Display formatting of native amounts.

use alloy_primitives::{
    U256,
    utils::{format_ether, format_units},
};

/// Native token symbol on BSC.
pub const NATIVE_SYMBOL: &str = "BNB";

fn to_f64(formatted: &str) -> f64 {
    formatted.parse().unwrap_or_default()
}

/// Ether-denominated amount: `0`, scientific below `0.0001`, otherwise six decimals.
pub fn wei_to_ether(wei: U256) -> String {
    let ether = to_f64(&format_ether(wei));
    if ether == 0.0 {
        "0".to_owned()
    } else if ether < 0.0001 {
        format!("{ether:.4e}")
    } else {
        format!("{ether:.6}")
    }
}

/// Transaction value with the native symbol, e.g. `0.010000 BNB`.
pub fn format_value(wei: U256) -> String {
    format!("{} {NATIVE_SYMBOL}", wei_to_ether(wei))
}

/// Gas price in gwei with two decimals.
pub fn gwei_from_wei(wei: u128) -> String {
    match format_units(U256::from(wei), "gwei") {
        Ok(gwei) => format!("{:.2} Gwei", to_f64(&gwei)),
        Err(_) => "0 Gwei".to_owned(),
    }
}

/// Account balance with six decimals and the native symbol.
pub fn format_balance(wei: U256) -> String {
    format!("{:.6} {NATIVE_SYMBOL}", to_f64(&format_ether(wei)))
}
