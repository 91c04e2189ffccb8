//! Field-name driven anonymization of text values.
//!
//! A column is classified once by matching its lowercased name against an
//! ordered rule list; the first rule with a matching substring wins. Only
//! [`SqlValue::Text`] cells of character-typed columns are rewritten, every
//! other value passes through.

use std::sync::OnceLock;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::warn;

use crate::core::schema::Column;
use crate::core::value::{Batch, SqlValue};

/// Secret hashed into every anonymized password column.
pub const PLACEHOLDER_PASSWORD: &str = "changeme123";

/// Used if hashing the placeholder fails.
const FALLBACK_PASSWORD_HASH: &str =
    "$2a$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy";

pub const DEFAULT_PASSWORD_HASH_COST: u32 = 10;

const PLACEHOLDER_DOMAINS: &[&str] = &["example.com", "test.com", "sample.org"];
const MAX_EMAIL_MASK: usize = 5;
const ANONYMOUS_EMAIL: &str = "anonymous@example.com";
const PLACEHOLDER_PHONE: &str = "+1-555-0100";
const ANONYMOUS_NAME: &str = "Anonymous User";

/// Category of sensitive data a column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCategory {
    Email,
    Phone,
    Password,
    Name,
    Ssn,
    CreditCard,
    Address,
}

/// Case-insensitive substring patterns that select a category.
#[derive(Debug, Clone, Copy)]
pub struct AnonymizationRule {
    pub category: FieldCategory,
    pub patterns: &'static [&'static str],
}

impl AnonymizationRule {
    fn matches(&self, lowered_field: &str) -> bool {
        self.patterns.iter().any(|p| lowered_field.contains(p))
    }
}

/// Evaluated top to bottom. `email_address` is an email, never an address.
pub const RULES: &[AnonymizationRule] = &[
    AnonymizationRule {
        category: FieldCategory::Email,
        patterns: &["email", "mail"],
    },
    AnonymizationRule {
        category: FieldCategory::Phone,
        patterns: &["phone", "mobile", "tel"],
    },
    AnonymizationRule {
        category: FieldCategory::Password,
        patterns: &["password", "passwd", "pwd"],
    },
    AnonymizationRule {
        category: FieldCategory::Name,
        patterns: &["name", "firstname", "lastname", "fullname"],
    },
    AnonymizationRule {
        category: FieldCategory::Ssn,
        patterns: &["ssn", "social"],
    },
    AnonymizationRule {
        category: FieldCategory::CreditCard,
        patterns: &["credit", "card", "cc"],
    },
    AnonymizationRule {
        category: FieldCategory::Address,
        patterns: &["address", "street", "addr"],
    },
];

/// Classify a field name, `None` if no rule matches.
pub fn classify(field: &str) -> Option<FieldCategory> {
    let lowered = field.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(|rule| rule.category)
}

/// Rewrites sensitive text values.
///
/// Rule selection is deterministic; the produced values are randomized
/// (domains, phone and SSN suffixes, house numbers). The password hash is
/// computed once per anonymizer.
#[derive(Debug)]
pub struct Anonymizer {
    password_hash_cost: u32,
    password_hash: OnceLock<String>,
}

impl Default for Anonymizer {
    fn default() -> Self {
        Self::new(DEFAULT_PASSWORD_HASH_COST)
    }
}

impl Anonymizer {
    pub fn new(password_hash_cost: u32) -> Self {
        Self {
            password_hash_cost,
            password_hash: OnceLock::new(),
        }
    }

    /// Transform one value of the named field.
    pub fn transform(&self, field: &str, value: SqlValue) -> SqlValue {
        match classify(field) {
            Some(category) => self.apply(category, value),
            None => value,
        }
    }

    /// Classify every column of a table up front. Columns that are not
    /// character typed are never rewritten, whatever their name.
    pub fn plan(columns: &[Column]) -> Vec<Option<FieldCategory>> {
        columns
            .iter()
            .map(|c| if c.is_text() { classify(&c.name) } else { None })
            .collect()
    }

    /// Rewrite a batch in place using a plan from [`Anonymizer::plan`].
    pub fn apply_batch(&self, plan: &[Option<FieldCategory>], batch: &mut Batch) {
        if plan.iter().all(Option::is_none) {
            return;
        }
        for row in &mut batch.rows {
            for (value, category) in row.iter_mut().zip(plan) {
                if let Some(category) = category {
                    let original = std::mem::replace(value, SqlValue::Null);
                    *value = self.apply(*category, original);
                }
            }
        }
    }

    fn apply(&self, category: FieldCategory, value: SqlValue) -> SqlValue {
        let text = match value {
            SqlValue::Text(text) => text,
            other => return other,
        };
        let masked = match category {
            FieldCategory::Email => mask_email(&text),
            FieldCategory::Phone => mask_phone(&text),
            FieldCategory::Password => self.password_hash().to_string(),
            FieldCategory::Name => mask_name(&text),
            FieldCategory::Ssn => mask_ssn(&text),
            FieldCategory::CreditCard => mask_credit_card(&text),
            FieldCategory::Address => fake_address(&text),
        };
        SqlValue::Text(masked)
    }

    /// bcrypt hash of [`PLACEHOLDER_PASSWORD`].
    pub fn password_hash(&self) -> &str {
        self.password_hash.get_or_init(|| {
            bcrypt::hash(PLACEHOLDER_PASSWORD, self.password_hash_cost).unwrap_or_else(|e| {
                warn!("Hashing placeholder password failed, using fallback hash: {}", e);
                FALLBACK_PASSWORD_HASH.to_string()
            })
        })
    }
}

fn first_char(s: &str) -> &str {
    s.char_indices()
        .nth(1)
        .map(|(idx, _)| &s[..idx])
        .unwrap_or(s)
}

fn mask_email(email: &str) -> String {
    if email.is_empty() {
        return String::new();
    }
    let mut parts = email.split('@');
    let (Some(local), Some(_domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return ANONYMOUS_EMAIL.to_string();
    };
    if local.is_empty() {
        return ANONYMOUS_EMAIL.to_string();
    }

    let mask_len = (local.chars().count() - 1).min(MAX_EMAIL_MASK);
    let domain = PLACEHOLDER_DOMAINS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(PLACEHOLDER_DOMAINS[0]);
    format!("{}{}@{}", first_char(local), "*".repeat(mask_len), domain)
}

fn digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

fn mask_phone(phone: &str) -> String {
    let digits = digits(phone);
    if digits.len() < 10 {
        return PLACEHOLDER_PHONE.to_string();
    }
    format!(
        "+{}-555-{:04}",
        &digits[..2],
        rand::thread_rng().gen_range(0..10_000)
    )
}

fn mask_name(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    let masked: Vec<String> = name
        .split_whitespace()
        .map(|word| format!("{}***", first_char(word)))
        .collect();
    if masked.is_empty() {
        ANONYMOUS_NAME.to_string()
    } else {
        masked.join(" ")
    }
}

fn mask_ssn(ssn: &str) -> String {
    if ssn.is_empty() {
        return String::new();
    }
    format!("***-**-{:04}", rand::thread_rng().gen_range(0..10_000))
}

fn mask_credit_card(card: &str) -> String {
    if card.is_empty() {
        return String::new();
    }
    let digits = digits(card);
    if digits.len() < 4 {
        return "****-****-****-0000".to_string();
    }
    format!("****-****-****-{}", &digits[digits.len() - 4..])
}

fn fake_address(address: &str) -> String {
    if address.is_empty() {
        return String::new();
    }
    format!(
        "{} Anonymous Street, Privacy City, XX 00000",
        rand::thread_rng().gen_range(1..=9_999)
    )
}
