//! Extraction of quota figures from the external tool's `quota` output.

use serde::Serialize;
use tracing::debug;

use crate::size::parse_size;

/// Total and used capacity in bytes, constructed once per quota query and
/// never mutated. `used` may exceed `total` if the upstream tool reports an
/// inconsistent state; the parser does not validate the relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaSnapshot {
    pub total: u64,
    pub used: u64,
}

impl QuotaSnapshot {
    /// Fraction of the quota in use, when the total is known.
    pub fn usage_ratio(&self) -> Option<f64> {
        (self.total > 0).then(|| self.used as f64 / self.total as f64)
    }
}

/// Scan output for the first non-blank line containing both `total` and
/// `used` (the header row). The immediately following raw line is taken as
/// the data row; its first two whitespace tokens are the total and used
/// figures. Any shortfall leaves the corresponding value at zero — the
/// calling operation has already confirmed the process exited successfully,
/// so this is a silent best-effort parse, never a hard error.
///
/// The data row is assumed to follow the header with no intervening blank
/// line; the upstream format does not specify behavior when that assumption
/// breaks, and neither does this parser.
pub fn parse_quota_output(output: &str) -> QuotaSnapshot {
    let lines: Vec<&str> = output.lines().collect();

    for (i, raw) in lines.iter().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if line.contains("total") && line.contains("used") {
            let mut total = 0;
            let mut used = 0;
            if let Some(data) = lines.get(i + 1) {
                let mut fields = data.split_whitespace();
                if let (Some(t), Some(u)) = (fields.next(), fields.next()) {
                    total = parse_size(t).unwrap_or(0);
                    used = parse_size(u).unwrap_or(0);
                }
            }
            return QuotaSnapshot { total, used };
        }
    }

    debug!("no quota header row found in tool output");
    QuotaSnapshot { total: 0, used: 0 }
}
