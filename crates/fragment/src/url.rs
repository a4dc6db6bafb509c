//! Request URL decoration for CDN cache keys (§4.C).
//!
//! The query parameters are informational only — never parsed by the
//! client, never meaningful to the server beyond cache-key variance.

use rand::Rng;

fn short_hash(hash: &str) -> &str {
    &hash[..hash.len().min(8)]
}

pub fn build(
    base_url: &str,
    path: &str,
    module_hash: &str,
    full_hash: &str,
    retry_count: u32,
    force_cache_bust: bool,
) -> String {
    let mut url = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.push_str(&format!(
        "?moduleHash={}&fullHash={}",
        short_hash(module_hash),
        short_hash(full_hash)
    ));
    if retry_count > 0 {
        url.push_str(&format!("&retry={retry_count}"));
    }
    if force_cache_bust {
        let token: u64 = rand::rng().random();
        url.push_str(&format!("&cache={token:x}"));
    }
    url
}

/// Suffix for the 1-based `index` of `total` split parts, e.g. `.sf-part01`.
///
/// Zero-padded to the width of `total`'s decimal digit count, with a
/// minimum width of two — a 3-part split still reads `sf-part01..03`,
/// matching the on-server file names (§8 S4).
pub fn part_suffix(index: u32, total: u32) -> String {
    let width = total.to_string().len().max(2);
    format!(".sf-part{index:0width$}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decorates_with_truncated_hashes() {
        let url = build(
            "https://cdn.example.com/dist",
            "b.zip",
            "aaaaaaaaaaaaaaaa",
            "bbbbbbbbbbbbbbbb",
            0,
            false,
        );
        assert_eq!(
            url,
            "https://cdn.example.com/dist/b.zip?moduleHash=aaaaaaaa&fullHash=bbbbbbbb"
        );
    }

    #[test]
    fn appends_retry_when_nonzero() {
        let url = build("https://x", "b.zip", "aaaaaaaa", "bbbbbbbb", 2, false);
        assert!(url.ends_with("&retry=2"));
    }

    #[test]
    fn part_suffix_zero_pads_to_total_width_with_minimum_two() {
        assert_eq!(part_suffix(1, 3), ".sf-part01");
        assert_eq!(part_suffix(3, 3), ".sf-part03");
        assert_eq!(part_suffix(1, 12), ".sf-part01");
        assert_eq!(part_suffix(12, 12), ".sf-part12");
        assert_eq!(part_suffix(1, 150), ".sf-part001");
    }
}
