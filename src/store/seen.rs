use std::sync::Mutex;

use log::{error, trace};

use super::lpm::{encode_key, LongestPrefixStore};
use crate::error::PipelineError;
use crate::utils::Ipv4Cidr;

/// Thin adapter over `LongestPrefixStore` recording every prefix ever
/// announced. Writes are buffered and flushed in a batch every ~500ms rather
/// than synchronously, trading a small window of "forgotten between restarts"
/// risk for write amortization.
pub struct SeenStore {
    store: LongestPrefixStore,
    pending: Mutex<Vec<(Ipv4Cidr, Vec<u8>)>>,
}

impl SeenStore {
    pub fn new(store: LongestPrefixStore) -> Self {
        Self {
            store,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Enqueue a prefix for the next flush. Monotonic: the last write for a
    /// given prefix wins if it's written twice before a flush.
    pub fn record(&self, prefix: Ipv4Cidr, origin_asn: u32) {
        let mut pending = self.pending.lock().unwrap();
        pending.push((prefix, origin_asn.to_be_bytes().to_vec()));
    }

    /// Exact-key membership check: has this precise prefix (not a covering
    /// supernet) ever been recorded?
    pub fn is_seen(&self, prefix: Ipv4Cidr) -> bool {
        match self.store.get(&encode_key(prefix)) {
            Ok(value) => value.is_some(),
            Err(err) => {
                // Persistent-store corruption: degrade to "nothing is seen" (§7),
                // which makes every announcement look new rather than blocking.
                error!("SeenStore.get failed, treating as unseen: {}", err);
                false
            }
        }
    }

    /// Drain the pending buffer into a single batched write. Failures are
    /// logged and the batch is dropped, never propagated as fatal (§4.3/§7).
    pub fn flush(&self) {
        let batch = {
            let mut pending = self.pending.lock().unwrap();
            if pending.is_empty() {
                return;
            }
            std::mem::take(&mut *pending)
        };
        trace!("Flushing {} pending SeenStore writes", batch.len());
        if let Err(err) = self.store.batch_insert(&batch) {
            error!("SeenStore flush failed, dropping batch: {}", err);
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}
