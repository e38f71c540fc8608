use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use tradeflow_domain::{Result, TradeflowError};

use crate::store::EventRepository;

#[derive(Debug, Default)]
struct Block {
    next: u64,
    end: u64,
}

/// Hands out strictly increasing event sequence numbers.
///
/// Numbers left in a block when the process stops are never reused; the
/// next process starts from a fresh block.
pub struct SequenceAllocator {
    events: Arc<dyn EventRepository>,
    block_size: u32,
    block: Mutex<Block>,
}

impl SequenceAllocator {
    pub fn new(events: Arc<dyn EventRepository>, block_size: u32) -> Self {
        Self { events, block_size: block_size.max(1), block: Mutex::new(Block::default()) }
    }

    pub async fn next(&self) -> Result<u64> {
        let mut block = self.block.lock().await;
        if block.next >= block.end {
            let start = self.events.reserve_seq_block(self.block_size).await?;
            let end = start
                .checked_add(u64::from(self.block_size))
                .ok_or_else(|| TradeflowError::internal("event sequence exhausted"))?;
            debug!(start, end, "reserved event sequence block");
            *block = Block { next: start, end };
        }
        let seq = block.next;
        block.next += 1;
        Ok(seq)
    }
}
