use std::time::Duration;

/// Parses durations like `30s`, `500ms`, `1.5m` or `1h2m3s`. Valid units
/// are `ns`, `us`, `ms`, `s`, `m` and `h`; a bare `0` is also accepted.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err("empty duration".into());
    }

    let mut total = Duration::ZERO;
    let mut rest = s;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(format!("invalid duration {s:?}: expected a number"));
        }
        let (number, tail) = rest.split_at(number_len);
        let number: f64 = number
            .parse()
            .map_err(|e| format!("invalid duration {s:?}: {e}"))?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let nanos_per_unit: f64 = match unit {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("missing unit in duration {s:?}")),
            other => {
                return Err(format!("unknown unit {other:?} in duration {s:?}"));
            }
        };

        total += Duration::from_nanos((number * nanos_per_unit).round() as u64);
        rest = tail;
    }

    Ok(total)
}
