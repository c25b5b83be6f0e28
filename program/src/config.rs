// Deployment-time raffle parameters and per-cluster presets
use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use solana_program::{native_token::LAMPORTS_PER_SOL, program_error::ProgramError};
use std::{fmt, str::FromStr};

use crate::raffle_error::RaffleError;

/// Largest compute budget a callback may ask the coordinator for
pub const MAX_CALLBACK_COMPUTE_LIMIT: u32 = 1_400_000;

/// Parameters fixed when the raffle is created; changing them means redeploying
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaffleConfig {
    /// Minimum payment to enter, in lamports
    pub entrance_fee: u64,
    /// Seconds that must pass between rounds
    pub interval: i64,
    /// Coordinator key hash selecting the oracle lane
    pub gas_lane: [u8; 32],
    pub subscription_id: u64,
    /// Compute units the coordinator should allow for the callback
    pub callback_compute_limit: u32,
}

impl RaffleConfig {
    pub const LEN: usize = 8 + 8 + 32 + 8 + 4;

    pub fn validate(&self) -> Result<(), RaffleError> {
        if self.entrance_fee == 0
            || self.interval <= 0
            || self.callback_compute_limit == 0
            || self.callback_compute_limit > MAX_CALLBACK_COMPUTE_LIMIT
        {
            return Err(RaffleError::InvalidConfig);
        }
        Ok(())
    }

    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        if input.len() < Self::LEN {
            return Err(RaffleError::InvalidInstruction.into());
        }
        let src = array_ref![input, 0, RaffleConfig::LEN];
        let (entrance_fee, interval, gas_lane, subscription_id, callback_compute_limit) =
            array_refs![src, 8, 8, 32, 8, 4];

        Ok(Self {
            entrance_fee: u64::from_le_bytes(*entrance_fee),
            interval: i64::from_le_bytes(*interval),
            gas_lane: *gas_lane,
            subscription_id: u64::from_le_bytes(*subscription_id),
            callback_compute_limit: u32::from_le_bytes(*callback_compute_limit),
        })
    }

    pub fn pack_into_slice(&self, dst: &mut [u8; RaffleConfig::LEN]) {
        let (entrance_fee_dst, interval_dst, gas_lane_dst, subscription_id_dst, callback_compute_limit_dst) =
            mut_array_refs![dst, 8, 8, 32, 8, 4];

        *entrance_fee_dst = self.entrance_fee.to_le_bytes();
        *interval_dst = self.interval.to_le_bytes();
        gas_lane_dst.copy_from_slice(&self.gas_lane);
        *subscription_id_dst = self.subscription_id.to_le_bytes();
        *callback_compute_limit_dst = self.callback_compute_limit.to_le_bytes();
    }

    pub fn pack(&self, buf: &mut Vec<u8>) {
        let start = buf.len();
        buf.resize(start + Self::LEN, 0);
        self.pack_into_slice(array_mut_ref![buf, start, RaffleConfig::LEN]);
    }
}

/// Clusters the raffle knows defaults for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cluster {
    Localnet,
    Devnet,
}

impl Cluster {
    /// Development clusters run against the local coordinator
    pub fn is_development(&self) -> bool {
        matches!(self, Cluster::Localnet)
    }
}

impl FromStr for Cluster {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "localnet" | "localhost" => Ok(Cluster::Localnet),
            "devnet" => Ok(Cluster::Devnet),
            other => Err(format!("unknown cluster: {}", other)),
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cluster::Localnet => write!(f, "localnet"),
            Cluster::Devnet => write!(f, "devnet"),
        }
    }
}

/// Per-cluster defaults; the subscription id comes from the coordinator at deploy time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    pub cluster: Cluster,
    pub entrance_fee: u64,
    pub interval: i64,
    pub gas_lane: [u8; 32],
    pub callback_compute_limit: u32,
}

impl NetworkConfig {
    pub fn for_cluster(cluster: Cluster) -> Self {
        match cluster {
            Cluster::Localnet => Self {
                cluster,
                entrance_fee: LAMPORTS_PER_SOL / 100,
                interval: 30,
                gas_lane: [0u8; 32],
                callback_compute_limit: 200_000,
            },
            Cluster::Devnet => Self {
                cluster,
                entrance_fee: LAMPORTS_PER_SOL / 100,
                interval: 30,
                gas_lane: [
                    0x47, 0x4e, 0x34, 0xa0, 0x77, 0xdf, 0x58, 0x80, 0x7d, 0xbe, 0x9c, 0x96, 0xd3, 0xc0,
                    0x09, 0xb2, 0x3b, 0x3c, 0x6d, 0x0c, 0xce, 0x43, 0x3e, 0x59, 0xbb, 0xf5, 0xb3, 0x4f,
                    0x82, 0x3b, 0xc5, 0x6c,
                ],
                callback_compute_limit: 500_000,
            },
        }
    }

    pub fn raffle_config(&self, subscription_id: u64) -> RaffleConfig {
        RaffleConfig {
            entrance_fee: self.entrance_fee,
            interval: self.interval,
            gas_lane: self.gas_lane,
            subscription_id,
            callback_compute_limit: self.callback_compute_limit,
        }
    }
}
