pub mod config;
pub mod recommend;
pub mod workloads;

use anyhow::{bail, Result};
use std::time::Duration;

/// Parse durations such as `90s`, `30m`, `1h30m` or `1d`
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for ch in input.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let unit = match ch {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            other => return Err(format!("invalid duration unit '{}' in '{}'", other, input)),
        };
        let value: u64 = digits
            .parse()
            .map_err(|_| format!("missing number before '{}' in '{}'", ch, input))?;
        total += value * unit;
        digits.clear();
    }
    if !digits.is_empty() {
        return Err(format!("missing unit in '{}', e.g. 30m", input));
    }
    if total == 0 {
        return Err("duration must be greater than zero".to_string());
    }

    Ok(Duration::from_secs(total))
}

/// Wall-clock lookback window from flag or user default
pub fn lookback_days(flag: Option<u32>, configured: Option<u32>) -> Result<u32> {
    let days = flag
        .or(configured)
        .unwrap_or(krr_lib::config::DEFAULT_LOOKBACK_DAYS);
    if days == 0 {
        bail!("--days must be at least 1");
    }
    Ok(days)
}
