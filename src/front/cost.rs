use super::request::RequestClass;
use serde::{Deserialize, Serialize};

/// Cost of one request in estimator units plus the write-size flag used for
/// lane selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CostEstimate {
    pub cost: u64,
    pub huge: bool,
}

/// Disk characteristics reported by local recovery. Echoed to callers that
/// ask for the cost settings so they can estimate costs on their side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskParams {
    pub seek_time_ns: u64,
    pub read_speed_bps: u64,
    pub write_speed_bps: u64,
    pub read_block_size: u64,
    pub write_block_size: u64,
    pub min_huge_blob_bytes: u64,
}

impl Default for DiskParams {
    fn default() -> Self {
        Self {
            seek_time_ns: 8_000_000,
            read_speed_bps: 127_000_000,
            write_speed_bps: 127_000_000,
            read_block_size: 4096,
            write_block_size: 4096,
            min_huge_blob_bytes: 512 * 1024,
        }
    }
}

pub trait CostEstimator: Send {
    fn estimate(&self, class: &RequestClass) -> CostEstimate;
    fn settings(&self) -> DiskParams;
}

/// Service-time model of a rotating disk: one seek plus transfer time of
/// the block-aligned payload, in nanoseconds.
#[derive(Debug, Clone)]
pub struct DiskCostModel {
    params: DiskParams,
}

impl DiskCostModel {
    pub fn new(params: DiskParams) -> Self {
        Self { params }
    }

    pub fn write_cost(&self, bytes: u64) -> u64 {
        self.transfer_cost(bytes, self.params.write_block_size, self.params.write_speed_bps)
    }

    pub fn read_cost(&self, bytes: u64) -> u64 {
        self.transfer_cost(bytes, self.params.read_block_size, self.params.read_speed_bps)
    }

    fn is_huge(&self, bytes: u64) -> bool {
        bytes >= self.params.min_huge_blob_bytes
    }

    fn transfer_cost(&self, bytes: u64, block: u64, speed_bps: u64) -> u64 {
        let block = block.max(1);
        let aligned = bytes.div_ceil(block).saturating_mul(block);
        let transfer =
            u64::try_from(aligned as u128 * 1_000_000_000 / speed_bps.max(1) as u128)
                .unwrap_or(u64::MAX);
        self.params.seek_time_ns.saturating_add(transfer)
    }
}

impl CostEstimator for DiskCostModel {
    fn estimate(&self, class: &RequestClass) -> CostEstimate {
        match class {
            RequestClass::Put(put) => CostEstimate {
                cost: self.write_cost(put.data_len),
                huge: self.is_huge(put.data_len),
            },
            RequestClass::MultiPut(multi) => CostEstimate {
                cost: multi
                    .items
                    .iter()
                    .map(|item| self.write_cost(item.data_len))
                    .fold(0u64, u64::saturating_add),
                huge: multi.items.iter().any(|item| self.is_huge(item.data_len)),
            },
            RequestClass::Get(get) => {
                let cost = if get.index_only {
                    self.params.seek_time_ns
                } else {
                    get.queries
                        .iter()
                        .map(|query| self.read_cost(query.read_len()))
                        .fold(0u64, u64::saturating_add)
                };
                CostEstimate { cost, huge: false }
            }
            RequestClass::CollectGarbage(gc) => {
                let entries = (gc.keep.len() + gc.do_not_keep.len()) as u64;
                CostEstimate {
                    cost: self.write_cost(entries.saturating_mul(64)),
                    huge: false,
                }
            }
            RequestClass::Block(_)
            | RequestClass::GetBlock { .. }
            | RequestClass::GetBarrier(_)
            | RequestClass::PatchStart(_) => CostEstimate {
                cost: self.params.seek_time_ns,
                huge: false,
            },
            RequestClass::PatchDiff(patch)
            | RequestClass::PatchXorDiff(patch)
            | RequestClass::MovedPatch(patch) => CostEstimate {
                cost: self
                    .read_cost(patch.original.size)
                    .saturating_add(self.write_cost(patch.patched.size)),
                huge: true,
            },
            _ => CostEstimate::default(),
        }
    }

    fn settings(&self) -> DiskParams {
        self.params
    }
}
