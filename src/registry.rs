//! Address book
//!
//! Per-chain tables are explicit maps; a lookup on a chain without an entry
//! fails with `KeeperError::UnsupportedChain` instead of yielding a zero address.

use crate::error::KeeperError;
use alloy_primitives::{address, Address};
use lazy_static::lazy_static;
use std::collections::HashMap;

// ============================================
// CHAIN IDS
// ============================================

pub const MAINNET: u64 = 1;
pub const OPTIMISM: u64 = 10;
pub const BSC: u64 = 56;
pub const POLYGON: u64 = 137;
pub const FANTOM: u64 = 250;
pub const KAVA: u64 = 2222;
pub const ARBITRUM: u64 = 42161;
pub const AVALANCHE: u64 = 43114;
pub const BLAST: u64 = 81457;

// ============================================
// SINGLETONS
// ============================================

/// Default automation proxy, the `msg.sender` of executed calls
pub const AUTOMATION_PROXY: Address = address!("4D0c7842cD6a04f8EDB39883Db7817160DA159C3");

/// LayerZero multicall sender/receiver, same address on every chain
pub const LZ_MULTICALL_SENDER_RECEIVER: Address = address!("84C9Bb8B81037C642f2Eb6486a9bdfF526CdEbe0");

/// Cross-chain feed oracle, deployed with create3 on every chain
pub const XF33D_ORACLE: Address = address!("518d6B079884Ca6Ff12c398F68Ac31516813b1A5");

/// Lens previewing accrued strategy interest (mainnet)
pub const INTEREST_LENS: Address = address!("fd2387105ee3ccb0d96b7de2d86d26344f17787b");

/// Liquity stability pool and LQTY (mainnet)
pub const LIQUITY_STABILITY_POOL: Address = address!("66017D22b0f8556afDd19FC67041899Eb65a21bb");
pub const LQTY: Address = address!("6DEA81C8171D0bA574754EF6F8b412F2Ed88c54D");

/// CRV and its USD feed (mainnet)
pub const CRV: Address = address!("D533a949740bb3306d119CC777fa900bA034cd52");
pub const CRV_USD_ORACLE: Address = address!("cd627aa160a6fa45eb793d19ef54f5062f20f33f");

/// Level finance on BSC
pub mod level {
    use super::*;

    pub const HARVESTER: Address = address!("a32D03497FF5C32bcfeebE6A677Dbe4A496fD918");
    pub const STAKING_LENS: Address = address!("4437DB9538eb74C7418a1668766536b279C52709");
    pub const SENIOR_VAULT: Address = address!("D8Cbd5b22D7D37c978609e4e394cE8B9C003993b");
    pub const MEZZANINE_VAULT: Address = address!("87aC701ba8acb1966526375da68A692CebB8AF75");
    pub const JUNIOR_VAULT: Address = address!("C094c2a5C349eAd7839C1805126Da71Cc1cc1A39");
    pub const LVL: Address = address!("B64E280e9D1B5DbEc4AcceDb2257A87b400DB149");
    pub const WBNB: Address = address!("bb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c");
    pub const BNB_USD_ORACLE: Address = address!("0567F2323251f0Aab15c8dFb1967E4e8A7D42aeE");

    /// Staking pool id of a tranche vault
    pub fn staking_pid(vault: Address) -> Result<u64, KeeperError> {
        match vault {
            SENIOR_VAULT => Ok(0),
            MEZZANINE_VAULT => Ok(1),
            JUNIOR_VAULT => Ok(2),
            other => Err(KeeperError::Config(format!("unknown level tranche vault {}", other))),
        }
    }
}

/// Spell staking distribution on mainnet
pub mod spell_staking {
    use super::*;

    pub const DISTRIBUTOR: Address = address!("953DAb0e64828972853E7faA45634620A40Fa479");
    pub const SSPELL: Address = address!("26FA3fFFB6EfE8c1E69103aCb4044C26B9A106a9");
    pub const TREASURY: Address = address!("DF2C270f610Dc35d8fFDA5B453E74db5471E126B");
    pub const SSPELL_BUYBACK: Address = address!("dFE1a5b757523Ca6F7f049ac02151808E6A52111");
    pub const WITHDRAWER_LEGACY: Address = address!("2C9f65BD1a501CB406584F5532cE57c28829B131");
    pub const WITHDRAWER_LATEST: Address = address!("22d0e6A4e9b658184248f5e0BF89A0D763849544");

    /// Chains that bridge their fees to mainnet, in distribution order
    pub const ALTCHAINS: [u64; 5] = [FANTOM, KAVA, AVALANCHE, ARBITRUM, BLAST];
}

// ============================================
// PER-CHAIN TABLES
// ============================================

lazy_static! {
    static ref MIM: HashMap<u64, Address> = HashMap::from([
        (MAINNET, address!("99D8a9C45b2ecA8864373A26D1459e3Dff1e17F3")),
        (FANTOM, address!("82f0B8B456c1A451378467398982d4834b6829c1")),
        (KAVA, address!("471EE749bA270eb4c1165B5AD95E614947f6fCeb")),
        (AVALANCHE, address!("130966628846BFd36ff31a822705796e8cb8C18D")),
        (ARBITRUM, address!("FEa7a6a0B346362BF88A9e4A88416B77a57D6c2A")),
        (BLAST, address!("76DA31D7C9CbEAE102aff34D3398bC450c8374c1")),
    ]);

    static ref SPELL: HashMap<u64, Address> = HashMap::from([
        (MAINNET, address!("090185f2135308BaD17527004364eBcC2D37e5F6")),
        (FANTOM, address!("468003B688943977e6130F4F68F23aad939a1040")),
        (AVALANCHE, address!("CE1bFFBD5374Dac86a2893119683F4911a2F7814")),
        (ARBITRUM, address!("3E6648C5a70A150A88bCE65F4aD4d506Fe15d2AF")),
    ]);

    static ref MSPELL_STAKING: HashMap<u64, Address> = HashMap::from([
        (MAINNET, address!("bD2fBaf2dc95bD78Cf1cD3c5235B33D1165E6797")),
        (FANTOM, address!("a668762fb20bcd7148Db1bdb402ec06Eb6DAD569")),
        (AVALANCHE, address!("Bd84472B31d947314fDFa2ea42460A2727F955Af")),
        (ARBITRUM, address!("1DF188958A8674B5177f77667b8D173c3CdD9e51")),
    ]);

    static ref FEE_WITHDRAWER: HashMap<u64, Address> = HashMap::from([
        (MAINNET, spell_staking::WITHDRAWER_LEGACY),
        (FANTOM, spell_staking::WITHDRAWER_LEGACY),
        (KAVA, spell_staking::WITHDRAWER_LATEST),
        (ARBITRUM, spell_staking::WITHDRAWER_LEGACY),
        (AVALANCHE, spell_staking::WITHDRAWER_LEGACY),
        (BLAST, spell_staking::WITHDRAWER_LATEST),
    ]);

    static ref LZ_CHAIN_ID: HashMap<u64, u16> = HashMap::from([
        (MAINNET, 101),
        (BSC, 102),
        (AVALANCHE, 106),
        (POLYGON, 109),
        (ARBITRUM, 110),
        (OPTIMISM, 111),
        (FANTOM, 112),
        (KAVA, 177),
        (BLAST, 243),
    ]);

    static ref AUTOMATION_PROXIES: HashMap<u64, Address> = HashMap::from([
        (ARBITRUM, AUTOMATION_PROXY),
        (AVALANCHE, address!("90ED9a40dc938F1A672Bd158394366c2029d6ca7")),
    ]);
}

fn lookup<T: Copy>(table: &HashMap<u64, T>, chain_id: u64) -> Result<T, KeeperError> {
    table.get(&chain_id).copied().ok_or(KeeperError::UnsupportedChain(chain_id))
}

pub fn mim(chain_id: u64) -> Result<Address, KeeperError> {
    lookup(&MIM, chain_id)
}

/// SPELL token; chains without SPELL have no mSPELL staking either
pub fn spell(chain_id: u64) -> Option<Address> {
    SPELL.get(&chain_id).copied()
}

pub fn mspell_staking(chain_id: u64) -> Result<Address, KeeperError> {
    lookup(&MSPELL_STAKING, chain_id)
}

pub fn fee_withdrawer(chain_id: u64) -> Result<Address, KeeperError> {
    lookup(&FEE_WITHDRAWER, chain_id)
}

/// LayerZero v1 endpoint id of an EVM chain
pub fn lz_chain_id(chain_id: u64) -> Result<u16, KeeperError> {
    lookup(&LZ_CHAIN_ID, chain_id)
}

/// Sender used for simulation links; unknown chains use the default proxy
pub fn automation_proxy(chain_id: u64) -> Address {
    AUTOMATION_PROXIES.get(&chain_id).copied().unwrap_or(AUTOMATION_PROXY)
}
