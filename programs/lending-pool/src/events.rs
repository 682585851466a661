//! Event logging for native Solana
//!
//! Events are logged as a header line, the event type, and the borsh
//! payload in base58 so off-chain indexers can decode them.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{msg, pubkey::Pubkey};

/// Event type discriminator
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    // Admin events
    PoolInitialized = 1,
    AssetAdded = 2,
    AssetPriceUpdated = 3,
    RiskParametersUpdated = 4,

    // Position events
    Deposit = 10,
    Withdraw = 11,
    Borrow = 12,
    Repay = 13,

    // Liquidation events
    Liquidation = 20,
}

pub trait Event: BorshSerialize {
    fn event_type() -> EventType;

    fn emit(&self) {
        msg!("LENDING_POOL_EVENT");
        msg!("TYPE:{:?}", Self::event_type());

        if let Ok(data) = self.try_to_vec() {
            msg!("DATA:{}", bs58::encode(&data).into_string());
        }
    }
}

/// Define an event struct and bind it to its `EventType`
#[macro_export]
macro_rules! define_event {
    ($name:ident { $($field:ident: $type:ty),* $(,)? }) => {
        #[derive(::borsh::BorshSerialize, ::borsh::BorshDeserialize, Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            $(pub $field: $type,)*
        }

        impl $crate::events::Event for $name {
            fn event_type() -> $crate::events::EventType {
                $crate::events::EventType::$name
            }
        }
    };
}

// === Admin Events ===

define_event!(PoolInitialized {
    pool: Pubkey,
    authority: Pubkey,
    interest_rate_bps: u16,
    liquidation_threshold_bps: u16,
    liquidation_bonus_bps: u16,
});

define_event!(AssetAdded {
    asset: Pubkey,
    vault: Pubkey,
    decimals: u8,
});

define_event!(AssetPriceUpdated {
    asset: Pubkey,
    old_price_usd: u64,
    new_price_usd: u64,
    timestamp: i64,
});

define_event!(RiskParametersUpdated {
    interest_rate_bps: u16,
    liquidation_threshold_bps: u16,
    liquidation_bonus_bps: u16,
});

// === Position Events ===

define_event!(Deposit {
    user: Pubkey,
    asset: Pubkey,
    amount: u64,
});

define_event!(Withdraw {
    user: Pubkey,
    asset: Pubkey,
    amount: u64,
});

define_event!(Borrow {
    user: Pubkey,
    asset: Pubkey,
    amount: u64,
});

define_event!(Repay {
    user: Pubkey,
    asset: Pubkey,
    actual_repaid: u64,
});

// === Liquidation Events ===

define_event!(Liquidation {
    liquidator: Pubkey,
    borrower: Pubkey,
    debt_asset: Pubkey,
    collateral_asset: Pubkey,
    repay_amount: u64,
    seized_amount: u64,
});
