use serde::Serialize;

use crate::network::mac::MacAddress;

/// Summary of one scan pass over a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub range: String,
    /// Candidate hosts after exclusions.
    pub probed: usize,
    /// Hosts that answered the liveness probe.
    pub alive: usize,
    /// Devices probed and written to the store in this pass.
    pub reconciled: Vec<MacAddress>,
    /// Known devices of the range that were not seen in this pass.
    pub absent: Vec<MacAddress>,
    /// Devices of the range carrying the missing flag after this pass.
    pub flagged_missing: Vec<MacAddress>,
    pub elapsed_ms: u64,
}

/// Progress callback payload, emitted after every host completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    pub done: usize,
    pub total: usize,
    pub reconciled: usize,
}
