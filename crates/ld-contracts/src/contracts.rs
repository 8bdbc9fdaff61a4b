use alloy_primitives::{Address, U256};
use ld_wallet::{Provider, Signer};

use crate::ContractResult;
use crate::abi::{decode_address, decode_bool, decode_u64, decode_uint, encode_call};

const NEXT_DRAW_TIMESTAMP: &str = "nextDrawTimestamp()";
const GET_CURRENT_ROUND_ID: &str = "getCurrentRoundId()";
const LOTTERY_ROUND: &str = "lotteryRound(uint256)";
const DEPOSIT: &str = "deposit(uint256)";
const WITHDRAW: &str = "withdraw()";
const WITHDRAW_FROM_ROUND: &str = "withdrawFromRound(uint256)";
const GET_PRIZE_POOL_AMOUNT: &str = "getPrizePoolAmount()";
const GET_CURRENT_TOTAL_PARTICIPANT_COUNT: &str = "getCurrentTotalParticipantCount(uint256)";

/// One entry of `Lottery.lotteryRound(uint256)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotteryRound {
    pub requested_id: U256,
    pub winner: Address,
    pub prize_value: U256,
    pub timestamp: U256,
    pub random_number: U256,
    pub is_claimed: bool,
    /// Seconds since the epoch.
    pub draw_timestamp: u64,
}

#[derive(Clone)]
pub struct LotteryContract {
    address: Address,
    signer: Signer,
}

impl LotteryContract {
    pub fn new(address: Address, signer: Signer) -> Self {
        Self { address, signer }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Seconds since the epoch.
    pub async fn next_draw_timestamp(&self) -> ContractResult<u64> {
        let data = self
            .signer
            .call(self.address, &encode_call(NEXT_DRAW_TIMESTAMP, &[]))
            .await?;
        Ok(decode_u64(&data, 0)?)
    }

    pub async fn current_round_id(&self) -> ContractResult<u64> {
        let data = self
            .signer
            .call(self.address, &encode_call(GET_CURRENT_ROUND_ID, &[]))
            .await?;
        Ok(decode_u64(&data, 0)?)
    }

    pub async fn lottery_round(&self, round_id: u64) -> ContractResult<LotteryRound> {
        let data = self
            .signer
            .call(self.address, &encode_call(LOTTERY_ROUND, &[U256::from(round_id)]))
            .await?;
        Ok(LotteryRound {
            requested_id: decode_uint(&data, 0)?,
            winner: decode_address(&data, 1)?,
            prize_value: decode_uint(&data, 2)?,
            timestamp: decode_uint(&data, 3)?,
            random_number: decode_uint(&data, 4)?,
            is_claimed: decode_bool(&data, 5)?,
            draw_timestamp: decode_u64(&data, 6)?,
        })
    }
}

/// Write-capable entry point; every method returns the submitted transaction hash.
#[derive(Clone)]
pub struct RouterContract {
    address: Address,
    signer: Signer,
}

impl RouterContract {
    pub fn new(address: Address, signer: Signer) -> Self {
        Self { address, signer }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn deposit(&self, amount: U256) -> ContractResult<String> {
        let data = encode_call(DEPOSIT, &[amount]);
        Ok(self.signer.send_transaction(self.address, &data, U256::ZERO).await?)
    }

    pub async fn withdraw(&self) -> ContractResult<String> {
        let data = encode_call(WITHDRAW, &[]);
        Ok(self.signer.send_transaction(self.address, &data, U256::ZERO).await?)
    }

    pub async fn withdraw_from_round(&self, round_id: u64) -> ContractResult<String> {
        let data = encode_call(WITHDRAW_FROM_ROUND, &[U256::from(round_id)]);
        Ok(self.signer.send_transaction(self.address, &data, U256::ZERO).await?)
    }
}

#[derive(Clone)]
pub struct PrizePoolContract {
    address: Address,
    provider: Provider,
}

impl PrizePoolContract {
    pub fn new(address: Address, provider: Provider) -> Self {
        Self { address, provider }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Base units.
    pub async fn prize_pool_amount(&self) -> ContractResult<U256> {
        let data = self
            .provider
            .call(self.address, &encode_call(GET_PRIZE_POOL_AMOUNT, &[]), None)
            .await?;
        Ok(decode_uint(&data, 0)?)
    }
}

#[derive(Clone)]
pub struct VaultContract {
    address: Address,
    provider: Provider,
}

impl VaultContract {
    pub fn new(address: Address, provider: Provider) -> Self {
        Self { address, provider }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn current_total_participant_count(&self, round_id: u64) -> ContractResult<u64> {
        let data = self
            .provider
            .call(
                self.address,
                &encode_call(GET_CURRENT_TOTAL_PARTICIPANT_COUNT, &[U256::from(round_id)]),
                None,
            )
            .await?;
        Ok(decode_u64(&data, 0)?)
    }
}
