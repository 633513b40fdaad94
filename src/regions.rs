//! The RV032 county classification: the fixed vocabulary both source tables
//! are reconciled against. Statistics rows and geometry features carry
//! free-text county names maintained by two different institutions; the join
//! runs on the canonical code, not on raw string identity.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// One county of the classification. `code` is the RV032 dimension value,
/// `name` the canonical display name as both Statistikaamet CSV output and
/// the Maa-amet boundary layer spell it.
#[derive(Debug, PartialEq, Eq)]
pub struct County {
    pub code: &'static str,
    pub name: &'static str,
}

/// All 14 counties carried by RV032, ascending code order.
pub static COUNTIES: &[County] = &[
    County { code: "39", name: "Harju maakond" },
    County { code: "44", name: "Hiiu maakond" },
    County { code: "49", name: "Ida-Viru maakond" },
    County { code: "51", name: "Jõgeva maakond" },
    County { code: "57", name: "Järva maakond" },
    County { code: "59", name: "Lääne maakond" },
    County { code: "65", name: "Lääne-Viru maakond" },
    County { code: "67", name: "Põlva maakond" },
    County { code: "70", name: "Pärnu maakond" },
    County { code: "74", name: "Rapla maakond" },
    County { code: "78", name: "Saare maakond" },
    County { code: "82", name: "Tartu maakond" },
    County { code: "84", name: "Valga maakond" },
    County { code: "86", name: "Viljandi maakond" },
];

/// Lookup of every accepted spelling, lowercased, to its county.
/// Accepted per county: the canonical `X maakond`, the bare `X`, and the
/// colloquial `Xmaa` (`Harjumaa`, `Lääne-Virumaa`, ...).
static NAME_LOOKUP: Lazy<HashMap<String, &'static County>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for county in COUNTIES {
        let short = county
            .name
            .strip_suffix(" maakond")
            .unwrap_or(county.name);
        m.insert(county.name.to_lowercase(), county);
        m.insert(short.to_lowercase(), county);
        m.insert(format!("{}maa", short.to_lowercase()), county);
    }
    m
});

/// Find a county by its RV032 dimension code.
pub fn by_code(code: &str) -> Option<&'static County> {
    COUNTIES.iter().find(|c| c.code == code)
}

/// Resolve a raw county name from either source to its canonical county.
///
/// Tolerates surrounding whitespace, the `..` hierarchy prefix PXWeb puts on
/// classification members, and case differences. Returns `None` for names
/// outside the classification; callers report those instead of dropping them
/// silently.
pub fn canonicalize(raw: &str) -> Option<&'static County> {
    let cleaned = raw.trim().trim_start_matches('.').trim();
    if cleaned.is_empty() {
        return None;
    }
    NAME_LOOKUP.get(&cleaned.to_lowercase()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_complete() {
        assert_eq!(COUNTIES.len(), 14);
        assert_eq!(by_code("39").unwrap().name, "Harju maakond");
        assert_eq!(by_code("86").unwrap().name, "Viljandi maakond");
        assert!(by_code("87").is_none());
    }

    #[test]
    fn canonical_names_resolve() {
        assert_eq!(canonicalize("Harju maakond").unwrap().code, "39");
        assert_eq!(canonicalize("Tartu maakond").unwrap().code, "82");
    }

    #[test]
    fn pxweb_hierarchy_prefix_is_stripped() {
        assert_eq!(canonicalize("..Harju maakond").unwrap().code, "39");
        assert_eq!(canonicalize(" ..Pärnu maakond ").unwrap().code, "70");
    }

    #[test]
    fn short_and_colloquial_spellings_resolve() {
        assert_eq!(canonicalize("Harju").unwrap().code, "39");
        assert_eq!(canonicalize("Harjumaa").unwrap().code, "39");
        assert_eq!(canonicalize("Lääne-Virumaa").unwrap().code, "65");
        assert_eq!(canonicalize("viljandi").unwrap().code, "86");
    }

    #[test]
    fn unknown_names_stay_unknown() {
        assert!(canonicalize("Atlantis").is_none());
        assert!(canonicalize("").is_none());
        assert!(canonicalize("   ").is_none());
        // Lääne and Lääne-Viru are distinct counties, not prefixes of each other.
        assert_eq!(canonicalize("Lääne maakond").unwrap().code, "59");
        assert_eq!(canonicalize("Lääne-Viru maakond").unwrap().code, "65");
    }
}
