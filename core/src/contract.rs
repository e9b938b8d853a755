//! Source-side data model: one credit contract as read from the store.

use crate::types::{ClientId, ProfileTag};
use serde::{Deserialize, Serialize};

/// Fixed 12-level risk scale, best to worst.
/// NEVER reorder: the ordinal position is the persisted risk score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskRating {
    AA,
    A,
    B,
    BB,
    C,
    CC,
    D,
    DD,
    E,
    EE,
    F,
    G,
}

impl RiskRating {
    pub const SCALE: [RiskRating; 12] = [
        RiskRating::AA,
        RiskRating::A,
        RiskRating::B,
        RiskRating::BB,
        RiskRating::C,
        RiskRating::CC,
        RiskRating::D,
        RiskRating::DD,
        RiskRating::E,
        RiskRating::EE,
        RiskRating::F,
        RiskRating::G,
    ];

    /// Parse a raw rating. Surrounding whitespace and case are ignored;
    /// anything off the scale is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_uppercase();
        Self::SCALE.iter().copied().find(|r| r.code() == normalized)
    }

    /// Ordinal position on the scale, 0 = best.
    pub fn score(self) -> u8 {
        self as u8
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::AA => "AA",
            Self::A  => "A",
            Self::B  => "B",
            Self::BB => "BB",
            Self::C  => "C",
            Self::CC => "CC",
            Self::D  => "D",
            Self::DD => "DD",
            Self::E  => "E",
            Self::EE => "EE",
            Self::F  => "F",
            Self::G  => "G",
        }
    }
}

/// A raw numeric field as stored upstream. The ingestion layer does not
/// guarantee numeric types, so text survives until coercion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Numeric coercion. Unparseable text and non-finite numbers are missing.
    pub fn coerce(&self) -> Option<f64> {
        let value = match self {
            RawValue::Number(n) => *n,
            RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

/// Coerce an optional raw field.
pub fn coerce(field: &Option<RawValue>) -> Option<f64> {
    field.as_ref().and_then(RawValue::coerce)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContractRecord {
    pub client_id:       ClientId,
    pub client_name:     Option<String>,
    pub profile:         ProfileTag,
    pub branch:          Option<String>,
    pub portfolio:       Option<String>,
    pub product_line:    Option<String>,
    pub risk_rating:     Option<String>,
    pub coverage:        Option<RawValue>,
    pub delinquency:     Option<RawValue>,
    pub contract_value:  Option<RawValue>,
    pub balance:         Option<RawValue>,
    pub modality:        Option<String>,
}

impl ContractRecord {
    /// A fully numeric record. Descriptive fields default to a single
    /// branch/portfolio/product line; override with struct update syntax.
    pub fn numeric(
        client_id: impl Into<String>,
        profile: impl Into<String>,
        risk_rating: &str,
        coverage: f64,
        delinquency: f64,
        contract_value: f64,
        balance: f64,
    ) -> Self {
        let client_id = client_id.into();
        Self {
            client_name:    Some(format!("Client {client_id}")),
            client_id,
            profile:        profile.into(),
            branch:         Some("HEAD OFFICE".into()),
            portfolio:      Some("GENERAL".into()),
            product_line:   Some("WORKING CAPITAL".into()),
            risk_rating:    Some(risk_rating.into()),
            coverage:       Some(coverage.into()),
            delinquency:    Some(delinquency.into()),
            contract_value: Some(contract_value.into()),
            balance:        Some(balance.into()),
            modality:       None,
        }
    }
}
