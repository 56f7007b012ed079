use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use sha1::{Digest, Sha1};
use tracing::trace;
use x509_cert::serial_number::SerialNumber;

use crate::error::Error;
use crate::types::Result;

/// Hands out positive, run-unique certificate serial numbers.
///
/// Each serial is SHA-1(counter || unix millis) with the top two bits of the
/// leading byte forced to `01`, giving a 20 byte positive integer.
#[derive(Debug)]
pub struct SerialNumberAllocator {
    counter: AtomicU32,
}

impl SerialNumberAllocator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU32::new(1),
        }
    }

    /// Allocate the next serial number
    pub fn next(&self) -> Result<SerialNumber> {
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::Internal(format!("System clock before Unix epoch: {}", e)))?
            .as_millis() as u64;

        let mut hasher = Sha1::new();
        hasher.update(count.to_be_bytes());
        hasher.update(millis.to_be_bytes());
        let mut bytes = hasher.finalize().to_vec();
        bytes[0] = (bytes[0] & 0x7f) | 0x40;

        trace!(counter = count, "Allocated serial number");
        Ok(SerialNumber::new(&bytes)?)
    }
}

impl Default for SerialNumberAllocator {
    fn default() -> Self {
        Self::new()
    }
}
