//! Lazily initialized strategy settings

use alloy_primitives::Address;
use candid::CandidType;

use crate::{
    constants::DEFAULT_SWAP_DEADLINE,
    types::DerivationPath,
    utils::evm_rpc::Service,
};

/// Addresses and parameters fixed at installation time.
/// The treasury is the only member with an owner-gated setter.
#[derive(Clone)]
pub struct StrategySettings {
    /// Base asset the strategy stakes and reports its value in
    pub base_asset: Address,
    /// Staking protocol contract rewards accrue from
    pub staking_contract: Address,
    /// Swap router used to convert rewards
    pub swap_router: Address,
    /// Receiver of the treasury fee share
    pub treasury: Address,
    /// EVM address withdrawn funds are sent to
    pub vault: Address,
    /// Derivation path of the ECDSA signature
    pub derivation_path: DerivationPath,
    /// The strategy account address, derived after installation
    pub eoa: Option<Address>,
    /// Swap slippage tolerance in basis points; zero accepts any output
    pub slippage: u64,
    /// Seconds a submitted swap stays valid
    pub swap_deadline: u64,
    /// EVM RPC canister service
    pub rpc_canister: Service,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            base_asset: Address::ZERO,
            staking_contract: Address::ZERO,
            swap_router: Address::ZERO,
            treasury: Address::ZERO,
            vault: Address::ZERO,
            derivation_path: DerivationPath::default(),
            eoa: None,
            slippage: 0,
            swap_deadline: DEFAULT_SWAP_DEADLINE,
            rpc_canister: Service::default(),
        }
    }
}

impl StrategySettings {
    /// Sets the base asset of the strategy.
    pub fn base_asset(&mut self, base_asset: Address) -> &mut Self {
        self.base_asset = base_asset;
        self
    }

    /// Sets the staking protocol contract address.
    pub fn staking_contract(&mut self, staking_contract: Address) -> &mut Self {
        self.staking_contract = staking_contract;
        self
    }

    /// Sets the swap router contract address.
    pub fn swap_router(&mut self, swap_router: Address) -> &mut Self {
        self.swap_router = swap_router;
        self
    }

    /// Sets the treasury address.
    pub fn treasury(&mut self, treasury: Address) -> &mut Self {
        self.treasury = treasury;
        self
    }

    /// Sets the vault payout address.
    pub fn vault(&mut self, vault: Address) -> &mut Self {
        self.vault = vault;
        self
    }

    /// Sets the derivation path of the ECDSA signature.
    pub fn derivation_path(&mut self, derivation_path: DerivationPath) -> &mut Self {
        self.derivation_path = derivation_path;
        self
    }

    /// Sets the strategy account address.
    pub fn eoa(&mut self, eoa: Option<Address>) -> &mut Self {
        self.eoa = eoa;
        self
    }

    /// Sets the swap slippage tolerance in basis points.
    pub fn slippage(&mut self, slippage: u64) -> &mut Self {
        self.slippage = slippage;
        self
    }

    /// Sets the swap deadline in seconds.
    pub fn swap_deadline(&mut self, swap_deadline: u64) -> &mut Self {
        self.swap_deadline = swap_deadline;
        self
    }

    /// Sets the EVM RPC canister service.
    pub fn rpc_canister(&mut self, rpc_canister: Service) -> &mut Self {
        self.rpc_canister = rpc_canister;
        self
    }
}

/// Candid-friendly projection of the settings
#[derive(Clone, Default, CandidType)]
pub struct StrategySettingsQuery {
    pub base_asset: String,
    pub staking_contract: String,
    pub swap_router: String,
    pub treasury: String,
    pub vault: String,
    pub eoa: Option<String>,
    pub slippage: u64,
    pub swap_deadline: u64,
}

impl From<StrategySettings> for StrategySettingsQuery {
    fn from(value: StrategySettings) -> Self {
        Self {
            base_asset: value.base_asset.to_string(),
            staking_contract: value.staking_contract.to_string(),
            swap_router: value.swap_router.to_string(),
            treasury: value.treasury.to_string(),
            vault: value.vault.to_string(),
            eoa: value.eoa.map(|address| address.to_string()),
            slippage: value.slippage,
            swap_deadline: value.swap_deadline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn builder_setters_assign_every_field() {
        let mut settings = StrategySettings::default();

        let base_asset = Address::repeat_byte(0x11);
        let staking_contract = Address::repeat_byte(0x22);
        let swap_router = Address::repeat_byte(0x33);
        let treasury = Address::repeat_byte(0x44);
        let vault = Address::repeat_byte(0x55);
        let derivation_path = vec![vec![1u8, 2u8, 3u8]];
        let eoa = Some(Address::repeat_byte(0x66));

        settings
            .base_asset(base_asset)
            .staking_contract(staking_contract)
            .swap_router(swap_router)
            .treasury(treasury)
            .vault(vault)
            .derivation_path(derivation_path.clone())
            .eoa(eoa)
            .slippage(50)
            .swap_deadline(900)
            .rpc_canister(Service::default());

        assert_eq!(settings.base_asset, base_asset);
        assert_eq!(settings.staking_contract, staking_contract);
        assert_eq!(settings.swap_router, swap_router);
        assert_eq!(settings.treasury, treasury);
        assert_eq!(settings.vault, vault);
        assert_eq!(settings.derivation_path, derivation_path);
        assert_eq!(settings.eoa, eoa);
        assert_eq!(settings.slippage, 50);
        assert_eq!(settings.swap_deadline, 900);
    }

    #[test]
    fn query_projection_renders_addresses() {
        let mut settings = StrategySettings::default();
        settings
            .base_asset(Address::repeat_byte(0x11))
            .eoa(Some(Address::repeat_byte(0x66)));

        let query: StrategySettingsQuery = settings.clone().into();
        assert_eq!(query.base_asset, settings.base_asset.to_string());
        assert_eq!(query.eoa, Some(settings.eoa.unwrap().to_string()));
        assert_eq!(query.swap_deadline, DEFAULT_SWAP_DEADLINE);
    }

    proptest! {
        #[test]
        fn builder_round_trips_arbitrary_addresses(
            base_asset in any::<[u8; 20]>(),
            staking_contract in any::<[u8; 20]>(),
            swap_router in any::<[u8; 20]>(),
            treasury in any::<[u8; 20]>(),
            vault in any::<[u8; 20]>(),
            slippage in 0u64..10_000,
            swap_deadline in 1u64..86_400,
        ) {
            let mut settings = StrategySettings::default();

            let base_asset = Address::from_slice(&base_asset);
            let staking_contract = Address::from_slice(&staking_contract);
            let swap_router = Address::from_slice(&swap_router);
            let treasury = Address::from_slice(&treasury);
            let vault = Address::from_slice(&vault);

            settings
                .base_asset(base_asset)
                .staking_contract(staking_contract)
                .swap_router(swap_router)
                .treasury(treasury)
                .vault(vault)
                .slippage(slippage)
                .swap_deadline(swap_deadline);

            prop_assert_eq!(settings.base_asset, base_asset);
            prop_assert_eq!(settings.staking_contract, staking_contract);
            prop_assert_eq!(settings.swap_router, swap_router);
            prop_assert_eq!(settings.treasury, treasury);
            prop_assert_eq!(settings.vault, vault);
            prop_assert_eq!(settings.slippage, slippage);
            prop_assert_eq!(settings.swap_deadline, swap_deadline);
        }
    }
}
