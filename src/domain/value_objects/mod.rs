//! Value Objects for the shop domain

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use unicode_normalization::char::decompose_compatible;

use crate::ShopError;

pub const MAX_NAME_LEN: usize = 150;
pub const MAX_SLUG_LEN: usize = 150;
pub const CURRENCY_LABEL: &str = "рублей";

/// Quantity of a product held by a cart line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Amount(i32);

impl Amount {
    pub const MIN: i32 = 1;
    pub const MAX: i32 = 1000;

    pub fn new(value: i32) -> Result<Self, ShopError> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(ShopError::Validation(format!(
                "amount must be between {} and {}",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> i32 { self.0 }

    /// Line total for this many units at `unit_price`.
    pub fn priced_at(&self, unit_price: Decimal) -> Decimal { unit_price * Decimal::from(self.0) }

    /// Accumulate-on-conflict: fails instead of going past the ceiling.
    pub fn accumulate(&self, other: Amount) -> Result<Self, ShopError> {
        Self::new(self.0 + other.0).map_err(|_| {
            ShopError::Validation(format!("cart line cannot hold more than {}", Self::MAX))
        })
    }

    pub fn reduce(&self, by: Amount) -> Reduction {
        match self.0 - by.0 {
            0 => Reduction::Emptied,
            rest if rest > 0 => Reduction::Remaining(Self(rest)),
            _ => Reduction::Overdrawn { held: *self },
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Outcome of taking some amount out of a cart line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reduction {
    Remaining(Amount),
    Emptied,
    Overdrawn { held: Amount },
}

/// Unit price of a product.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    pub fn new(value: Decimal) -> Result<Self, ShopError> {
        let min = Decimal::ONE;
        let max = Decimal::new(10_000, 0);
        if value < min || value > max {
            return Err(ShopError::Validation(format!(
                "price must be between {} and {}",
                min, max
            )));
        }
        Ok(Self(value.round_dp(2)))
    }

    pub fn amount(&self) -> Decimal { self.0 }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementUnit {
    #[default]
    Kg,
    Lt,
    Pcs,
}

impl MeasurementUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kg => "kg",
            Self::Lt => "lt",
            Self::Pcs => "pcs",
        }
    }
}

impl FromStr for MeasurementUnit {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kg" => Ok(Self::Kg),
            "lt" => Ok(Self::Lt),
            "pcs" => Ok(Self::Pcs),
            other => Err(ShopError::Validation(format!("unknown measurement unit '{}'", other))),
        }
    }
}

impl fmt::Display for MeasurementUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Catalog entity name: trimmed, non-empty, bounded.
pub fn entity_name(raw: &str) -> Result<String, ShopError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ShopError::Validation("name must not be empty".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ShopError::Validation(format!("name is longer than {} characters", MAX_NAME_LEN)));
    }
    Ok(name.to_string())
}

/// URL slug derived from a (possibly Cyrillic) name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    pub fn from_name(name: &str) -> Self {
        let mut out = String::with_capacity(name.len());
        let mut dash = false;
        for c in name.chars().flat_map(char::to_lowercase) {
            let before = out.len();
            match transliterate(c) {
                Some(latin) => out.push_str(latin),
                None => fold_to_ascii(c, &mut out),
            }
            if out.len() > before {
                dash = false;
            } else if !transliterates_to_nothing(c) {
                if !dash && !out.is_empty() {
                    out.push('-');
                }
                dash = true;
            }
        }
        let mut slug: String = out.trim_end_matches('-').chars().take(MAX_SLUG_LEN).collect();
        while slug.ends_with('-') {
            slug.pop();
        }
        if slug.is_empty() {
            slug.push_str("item");
        }
        Self(slug)
    }

    /// Next candidate after a collision: `name`, `name-2`, `name-3`...
    pub fn with_suffix(&self, n: u32) -> Self {
        if n <= 1 {
            return self.clone();
        }
        let suffix = format!("-{}", n);
        let keep = MAX_SLUG_LEN.saturating_sub(suffix.len());
        let base: String = self.0.chars().take(keep).collect();
        Self(format!("{}{}", base.trim_end_matches('-'), suffix))
    }

    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_string(self) -> String { self.0 }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

fn transliterate(c: char) -> Option<&'static str> {
    let latin = match c {
        'а' => "a", 'б' => "b", 'в' => "v", 'г' | 'ґ' => "g", 'д' => "d",
        'е' | 'ё' | 'э' => "e", 'ж' => "zh", 'з' => "z", 'и' | 'і' => "i",
        'й' => "j", 'к' => "k", 'л' => "l", 'м' => "m", 'н' => "n",
        'о' => "o", 'п' => "p", 'р' => "r", 'с' => "s", 'т' => "t",
        'у' | 'ў' => "u", 'ф' => "f", 'х' => "h", 'ц' => "ts", 'ч' => "ch",
        'ш' => "sh", 'щ' => "sch", 'ъ' | 'ь' => "", 'ы' => "y",
        'ю' => "ju", 'я' => "ja", 'ї' => "ji", 'є' => "je",
        'ß' => "ss", 'æ' => "ae", 'ø' => "o", 'œ' => "oe", 'đ' => "d", 'ł' => "l",
        _ => return None,
    };
    Some(latin)
}

/// Hard and soft signs vanish without breaking the word.
fn transliterates_to_nothing(c: char) -> bool { matches!(c, 'ъ' | 'ь') }

/// ASCII letters and digits of the compatibility decomposition: `é` -> `e`, `ﬁ` -> `fi`.
fn fold_to_ascii(c: char, out: &mut String) {
    decompose_compatible(c, |d| {
        if d.is_ascii_alphanumeric() {
            out.push(d.to_ascii_lowercase());
        }
    });
}

/// Money rendering used by the cart summary, e.g. `400.00 рублей`.
pub fn format_rubles(total: Decimal) -> String {
    format!("{:.2} {}", total.round_dp(2), CURRENCY_LABEL)
}
