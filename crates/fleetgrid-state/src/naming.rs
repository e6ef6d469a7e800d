//! Instance id allocation.

use std::collections::BTreeSet;

/// Pick the id for the next instance with `prefix`.
///
/// Collects the numeric suffixes of `existing` ids that share the prefix
/// and returns the smallest positive number not in use, formatted with at
/// least two digits (`Lobby-01`, `Lobby-02`, ..., `Lobby-100`).
pub fn next_instance_id<'a, I>(prefix: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let used: BTreeSet<u32> = existing
        .into_iter()
        .filter_map(|id| id.strip_prefix(prefix))
        .filter(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|suffix| suffix.parse().ok())
        .collect();

    let mut candidate = 1;
    for n in &used {
        if *n == candidate {
            candidate += 1;
        } else if *n > candidate {
            break;
        }
    }
    format!("{prefix}{candidate:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_id_is_one() {
        assert_eq!(next_instance_id("Lobby-", []), "Lobby-01");
    }

    #[test]
    fn fills_lowest_gap() {
        let mut ids = vec!["T01".to_string(), "T03".to_string()];
        let next = next_instance_id("T", ids.iter().map(String::as_str));
        assert_eq!(next, "T02");

        ids.push(next);
        assert_eq!(next_instance_id("T", ids.iter().map(String::as_str)), "T04");
    }

    #[test]
    fn ignores_other_prefixes_and_garbage() {
        let ids = ["Lobby-01", "SW-01", "SW-02", "SW-x3", "SW-"];
        assert_eq!(next_instance_id("SW-", ids), "SW-03");
    }

    #[test]
    fn formats_beyond_two_digits() {
        let ids: Vec<String> = (1..=99).map(|n| format!("P{n:02}")).collect();
        assert_eq!(next_instance_id("P", ids.iter().map(String::as_str)), "P100");
    }
}
