use http::HeaderMap;

use crate::constants::X_OSS_HASH_CRC64_ECMA;
use crate::request::ProgressFn;
use crate::{Error, Result};

/// CRC-64 with the ECMA-182 polynomial, reflected, as the service computes
/// per object. Resumable: a finished checksum can seed another run so a
/// logical object checksum can be accumulated across independent calls.
///
/// The pack's NVMe-polynomial CRC-64 crate computes a different function and
/// cannot resume from a prior value, so the table-driven form is spelled out
/// here. Check vector: `crc64(b"123456789") == 0x995DC9BBDF1939FA`.
#[derive(Debug, Clone, Copy)]
pub struct Crc64 {
    state: u64,
}

/// ECMA-182 polynomial, reflected.
const POLY: u64 = 0xC96C_5795_D787_0F42;

static TABLE: [u64; 256] = build_table();

const fn build_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u64;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 == 1 {
                (crc >> 1) ^ POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

impl Default for Crc64 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc64 {
    /// Start a fresh checksum.
    pub fn new() -> Self {
        Self { state: !0 }
    }

    /// Resume from a previously finished checksum value.
    pub fn with_initial(crc: u64) -> Self {
        Self { state: !crc }
    }

    /// Feed bytes into the checksum. The result is a pure function of the
    /// bytes observed so far, independent of chunk boundaries.
    pub fn update(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state = TABLE[((self.state ^ b as u64) & 0xff) as usize] ^ (self.state >> 8);
        }
    }

    /// The checksum of everything observed so far.
    pub fn finish(&self) -> u64 {
        !self.state
    }
}

/// Tracks a body transfer: running checksum, byte count, and progress
/// notifications.
///
/// Progress fires only when the cumulative count strictly exceeds the last
/// reported value, so duplicate delivery from the underlying transport never
/// double-counts and reported totals are strictly increasing.
pub struct IntegrityStream {
    crc: Crc64,
    transferred: u64,
    last_reported: u64,
    total: Option<u64>,
    progress: Option<ProgressFn>,
}

impl std::fmt::Debug for IntegrityStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityStream")
            .field("transferred", &self.transferred)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

impl IntegrityStream {
    /// Create a tracker for one transfer direction of one call.
    pub fn new(seed: Option<u64>, total: Option<u64>, progress: Option<ProgressFn>) -> Self {
        Self {
            crc: seed.map(Crc64::with_initial).unwrap_or_default(),
            transferred: 0,
            last_reported: 0,
            total,
            progress,
        }
    }

    /// Observe one transferred chunk.
    pub fn observe(&mut self, chunk: &[u8]) {
        self.crc.update(chunk);
        self.transferred += chunk.len() as u64;

        if let Some(progress) = &self.progress {
            if self.transferred > self.last_reported {
                let increment = self.transferred - self.last_reported;
                progress(increment, self.transferred, self.total);
                self.last_reported = self.transferred;
            }
        }
    }

    /// Bytes observed so far.
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// The checksum over all observed bytes.
    pub fn checksum(&self) -> u64 {
        self.crc.finish()
    }

    /// Compare the computed checksum against the value the service advertised
    /// in its response headers.
    ///
    /// A missing or unparsable header is not an error; a present header that
    /// disagrees is a local integrity error, never a service error.
    pub fn verify(&self, headers: &HeaderMap) -> Result<()> {
        let Some(reported) = headers
            .get(X_OSS_HASH_CRC64_ECMA)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
        else {
            return Ok(());
        };

        let computed = self.checksum();
        if computed != reported {
            return Err(Error::integrity_mismatch(computed, reported));
        }
        Ok(())
    }
}
