//! Retail brand detection from company and branch names.

use crate::normalize::normalize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Corporate suffix that carries no brand information.
const CORPORATE_SUFFIX: &str = "股份有限公司";

/// The closed set of store brands. Labels match what the map frontend filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Brand {
    #[serde(rename = "7-ELEVEN")]
    SevenEleven,
    #[serde(rename = "全家")]
    FamilyMart,
    #[serde(rename = "全聯")]
    PxMart,
    #[serde(rename = "萊爾富")]
    HiLife,
    #[serde(rename = "來來")]
    OkMart,
    #[serde(rename = "其他")]
    Other,
}

impl Brand {
    pub const ALL: [Brand; 6] = [
        Brand::SevenEleven,
        Brand::FamilyMart,
        Brand::PxMart,
        Brand::HiLife,
        Brand::OkMart,
        Brand::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::SevenEleven => "7-ELEVEN",
            Self::FamilyMart => "全家",
            Self::PxMart => "全聯",
            Self::HiLife => "萊爾富",
            Self::OkMart => "來來",
            Self::Other => "其他",
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Brand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Brand::ALL
            .into_iter()
            .find(|b| b.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown brand '{}'", s))
    }
}

struct BrandRule {
    brand: Brand,
    keywords: &'static [&'static str],
}

/// Evaluated top to bottom, first hit wins. Keywords are in normalized form.
///
/// OK Mart keywords always carry a suffix: a bare `ok` would match inside
/// ordinary words such as "tokyo" or "books".
const BRAND_RULES: &[BrandRule] = &[
    BrandRule {
        brand: Brand::SevenEleven,
        keywords: &["統一超商", "7-eleven", "7-11", "7_11", "7eleven", "seven"],
    },
    BrandRule { brand: Brand::FamilyMart, keywords: &["全家"] },
    BrandRule { brand: Brand::PxMart, keywords: &["全聯"] },
    BrandRule { brand: Brand::HiLife, keywords: &["萊爾富", "hi-life", "hilife"] },
    BrandRule { brand: Brand::OkMart, keywords: &["來來", "okmart", "ok超商", "ok便利"] },
];

/// Classify a store from its company name and branch name.
pub fn classify(company: &str, branch: &str) -> Brand {
    let text = comparable_text(company, branch);
    if text.is_empty() {
        return Brand::Other;
    }

    BRAND_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| text.contains(k)))
        .map(|rule| rule.brand)
        .unwrap_or(Brand::Other)
}

/// Normalized name text with the corporate suffix removed.
fn comparable_text(company: &str, branch: &str) -> String {
    normalize(&format!("{}{}", company, branch)).replace(CORPORATE_SUFFIX, "")
}
