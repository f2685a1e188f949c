//! Duration strings used in flags and resolver ConfigMaps

use std::time::Duration;

use crate::{Error, Result};

/// Parse a duration such as `500ms`, `5s`, `10m`, `1h`, or bare seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let invalid = || {
        Error::validation(format!(
            "invalid duration '{}', expected e.g. 500ms, 30s, 5m, 1h",
            s
        ))
    };

    if let Some(millis) = s.strip_suffix("ms") {
        let n: u64 = millis.parse().map_err(|_| invalid())?;
        Ok(Duration::from_millis(n))
    } else if let Some(hours) = s.strip_suffix('h') {
        let n: u64 = hours.parse().map_err(|_| invalid())?;
        Ok(Duration::from_secs(n.checked_mul(3600).ok_or_else(invalid)?))
    } else if let Some(minutes) = s.strip_suffix('m') {
        let n: u64 = minutes.parse().map_err(|_| invalid())?;
        Ok(Duration::from_secs(n.checked_mul(60).ok_or_else(invalid)?))
    } else if let Some(secs) = s.strip_suffix('s') {
        let n: u64 = secs.parse().map_err(|_| invalid())?;
        Ok(Duration::from_secs(n))
    } else {
        let n: u64 = s.parse().map_err(|_| invalid())?;
        Ok(Duration::from_secs(n))
    }
}

/// Render a duration the way `parse_duration` accepts it back.
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_millis();
    if millis % 1000 != 0 {
        format!("{}ms", millis)
    } else {
        let secs = d.as_secs();
        if secs != 0 && secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs != 0 && secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}
