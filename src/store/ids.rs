use chrono::{DateTime, Utc};
use uuid::Uuid;

const SUFFIX_LEN: usize = 6;

pub fn generate(prefix: &str, now: DateTime<Utc>, taken: impl Fn(&str) -> bool) -> String {
    let stamp = to_base36(now.timestamp_millis().max(0) as u64);

    loop {
        let random = Uuid::new_v4().simple().to_string();
        let id = format!("{prefix}-{stamp}-{}", &random[..SUFFIX_LEN]);
        if !taken(&id) {
            return id;
        }
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use chrono::{TimeZone, Utc};

    use super::{generate, to_base36};

    #[test]
    fn base36_matches_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
    }

    #[test]
    fn ids_carry_prefix_and_timestamp() {
        let now = Utc.timestamp_millis_opt(36 * 36).unwrap();
        let id = generate("g", now, |_| false);

        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "g");
        assert_eq!(parts[1], "100");
        assert_eq!(parts[2].len(), 6);
    }

    #[test]
    fn taken_ids_are_regenerated() {
        let attempts = Cell::new(0);
        let id = generate("d", Utc::now(), |_| {
            attempts.set(attempts.get() + 1);
            attempts.get() < 3
        });

        assert_eq!(attempts.get(), 3);
        assert!(id.starts_with("d-"));
    }
}
