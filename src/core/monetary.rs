//! Monetary units and chain constants
//!
//! Balances are kept in wei, the smallest unit. One coin is 10^18 wei, the
//! same scale Ethereum wallets assume, so balances shown by wallet tooling
//! line up with what the ledger stores.
//!
//! ## Defaults
//! - **Mining reward**: 100 coins per sealed block
//! - **Faucet grant**: 1000 coins
//! - **Gas**: fixed unit price of 1 wei, 21000 gas for a plain transfer

use crate::core::Amount;
use num_bigint::BigUint;
use num_traits::Zero;

/// Number of wei in one coin
pub const WEI_PER_COIN: u128 = 1_000_000_000_000_000_000;

/// Default mining reward in wei (100 coins)
pub const DEFAULT_MINING_REWARD: u128 = 100 * WEI_PER_COIN;

/// Default faucet grant in wei (1000 coins)
pub const DEFAULT_FAUCET_AMOUNT: u128 = 1_000 * WEI_PER_COIN;

/// Price of one unit of gas, fixed for the node's lifetime
pub const GAS_UNIT_PRICE: u64 = 1;

/// Gas charged for a plain value transfer, also the `eth_estimateGas` answer
pub const MIN_GAS_LIMIT: u64 = 21_000;

/// Gas limit advertised on block headers
pub const BLOCK_GAS_LIMIT: u64 = 30_000_000;

/// Leading zero hex digits required of a sealed block hash
pub const DEFAULT_DIFFICULTY: u32 = 4;

pub const DEFAULT_CHAIN_ID: u64 = 43_210;

/// Convert whole coins to wei
pub fn coins(amount: u64) -> Amount {
    BigUint::from(amount) * BigUint::from(WEI_PER_COIN)
}

/// Render a wei amount as a coin value with trailing zeros trimmed
///
/// ```
/// use qryptum_chain::core::monetary::{coins, format_coins};
/// assert_eq!(format_coins(&coins(100)), "100");
/// ```
pub fn format_coins(amount: &Amount) -> String {
    let unit = BigUint::from(WEI_PER_COIN);
    let whole = amount / &unit;
    let fraction = amount % &unit;
    if fraction.is_zero() {
        return whole.to_string();
    }
    let fraction = format!("{fraction:0>18}");
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}
