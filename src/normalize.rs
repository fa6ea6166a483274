//! Text folding for Taiwanese addresses and company names.
//!
//! `normalize` is the general comparison form (full-width -> half-width,
//! no spaces, lowercase). `clean_for_retry` is the address-only pass that
//! produces a simplified geocoder query.

const FULLWIDTH_START: u32 = 0xFF01;
const FULLWIDTH_END: u32 = 0xFF5E;
const FULLWIDTH_OFFSET: u32 = 0xFEE0;
const IDEOGRAPHIC_SPACE: char = '\u{3000}';

/// Floor and basement markers dropped from a retry query, in removal order.
/// `地下1樓` has to go before `1樓` or it would leave a dangling `地下`.
const FLOOR_TOKENS: &[&str] = &[
    "地下一層", "地下1樓", "地下二樓", "B1", "B2", "B3",
    "1樓", "2樓", "3樓", "4樓", "5樓", "6樓",
];

/// Anything after one of these is a secondary address or a note.
const SEPARATORS: &[char] = &['、', '，', ','];

/// Sub-address particle (e.g. `5之1號`).
const SUB_ADDRESS_PARTICLE: &str = "之";

/// Fold a single full-width ASCII variant to its half-width form.
fn fold_width(c: char) -> char {
    let code = c as u32;
    if (FULLWIDTH_START..=FULLWIDTH_END).contains(&code) {
        char::from_u32(code - FULLWIDTH_OFFSET).unwrap_or(c)
    } else {
        c
    }
}

fn is_stripped_space(c: char) -> bool {
    c == ' ' || c == IDEOGRAPHIC_SPACE
}

/// Normalize free text for comparison: full-width ASCII folded to
/// half-width, spaces (including U+3000) removed, lowercased.
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(fold_width)
        .filter(|c| !is_stripped_space(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Simplify an address for a second geocoding attempt.
///
/// The result is only ever sent to the provider. It is never used as a
/// cache key.
pub fn clean_for_retry(address: &str) -> String {
    let mut clean: String = address.chars().filter(|c| !is_stripped_space(*c)).collect();

    for token in FLOOR_TOKENS {
        clean = clean.replace(token, "");
    }

    if let Some(idx) = clean.find(SEPARATORS) {
        clean.truncate(idx);
    }

    clean.replace(SUB_ADDRESS_PARTICLE, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_fullwidth() {
        assert_eq!(normalize("７－ＥＬＥＶＥＮ"), "7-eleven");
        assert_eq!(normalize("Ｈｉ－Ｌｉｆｅ"), "hi-life");
    }

    #[test]
    fn test_normalize_strips_spaces() {
        assert_eq!(normalize(" 全家　便利 商店 "), "全家便利商店");
    }

    #[test]
    fn test_normalize_leaves_cjk_alone() {
        assert_eq!(normalize("臺北市中正區"), "臺北市中正區");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_idempotent() {
        for s in ["７－１１ 信義店", "ＯＫ　Mart", "Hello World", "", "台北市１０１號"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_clean_removes_floor_tokens() {
        assert_eq!(clean_for_retry("台北市信義區松高路11號B1"), "台北市信義區松高路11號");
        assert_eq!(clean_for_retry("台北市大安區復興南路一段1號地下1樓"), "台北市大安區復興南路一段1號");
        assert_eq!(clean_for_retry("台北市中山區南京東路二段5號3樓"), "台北市中山區南京東路二段5號");
    }

    #[test]
    fn test_clean_truncates_at_separator() {
        assert_eq!(clean_for_retry("台北市士林區中正路1號、3號"), "台北市士林區中正路1號");
        assert_eq!(clean_for_retry("台北市士林區中正路1號，2號"), "台北市士林區中正路1號");
        assert_eq!(clean_for_retry("台北市士林區中正路1號,2號"), "台北市士林區中正路1號");
    }

    #[test]
    fn test_clean_earliest_separator_wins() {
        assert_eq!(clean_for_retry("甲,乙、丙"), "甲");
    }

    #[test]
    fn test_clean_removes_particle_and_spaces() {
        assert_eq!(clean_for_retry("台北市 萬華區　西園路5之1號"), "台北市萬華區西園路51號");
    }

    #[test]
    fn test_clean_unchanged_address() {
        let addr = "台北市信義區松高路1號";
        assert_eq!(clean_for_retry(addr), addr);
    }
}
