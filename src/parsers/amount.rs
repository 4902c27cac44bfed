// Amount columns, sign markers and debit/credit classification
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::patterns::contains_word;
use crate::types::TransactionKind;

static AMOUNT_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-)?[$£€R]?(\d{1,3}(?:,\d{3})+|\d+)\.(\d{2})(-)?$").expect("amount token regex")
});

const CREDIT_KEYWORDS: &[&str] = &["deposit", "salary", "interest", "credit", "refund"];

/// Phrases banks use for their own charges.
pub const FEE_PHRASES: &[&str] = &[
    "service fee",
    "monthly fee",
    "bank charges",
    "bank charge",
    "admin fee",
    "ledger fee",
    "account fee",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Debit,
    Credit,
    Unsigned,
}

/// One amount column: the absolute value plus whatever direction marker
/// the statement printed with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amount {
    pub value: Decimal,
    pub sign: Sign,
}

impl Amount {
    /// Value with debits negative, for balance columns.
    pub fn signed(&self) -> Decimal {
        match self.sign {
            Sign::Debit => -self.value,
            _ => self.value,
        }
    }
}

/// Parse a single amount token such as `1,250.00`, `-45.10` or `99.99-`.
pub fn parse_amount(token: &str) -> Option<Amount> {
    let caps = AMOUNT_TOKEN.captures(token.trim())?;
    let whole = caps[2].replace(',', "");
    let value = Decimal::from_str(&format!("{}.{}", whole, &caps[3])).ok()?;
    let sign = if caps.get(1).is_some() || caps.get(4).is_some() {
        Sign::Debit
    } else {
        Sign::Unsigned
    };
    Some(Amount { value, sign })
}

/// Split up to two trailing amount columns (amount, balance) off a line.
/// Returns the remaining text and the amounts in reading order.
pub fn split_trailing_amounts(text: &str) -> (String, Vec<Amount>) {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    let mut amounts = Vec::new();

    while amounts.len() < 2 {
        let Some(last) = tokens.last().copied() else { break };
        let marker = match last.to_ascii_lowercase().as_str() {
            "cr" => Some(Sign::Credit),
            "dr" => Some(Sign::Debit),
            _ => None,
        };
        if let Some(marker) = marker {
            let Some(amount) = tokens
                .len()
                .checked_sub(2)
                .and_then(|i| parse_amount(tokens[i]))
            else {
                break;
            };
            tokens.truncate(tokens.len() - 2);
            amounts.push(Amount { sign: marker, ..amount });
            continue;
        }
        match parse_amount(last) {
            Some(amount) => {
                tokens.pop();
                amounts.push(amount);
            }
            None => break,
        }
    }

    amounts.reverse();
    (tokens.join(" "), amounts)
}

pub fn is_fee(description: &str) -> bool {
    let lower = description.to_lowercase();
    FEE_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Direction of a transaction amount. Explicit markers win; unsigned
/// amounts are credits only when the description reads like money in.
pub fn classify(description: &str, amount: &Amount) -> TransactionKind {
    if is_fee(description) {
        return TransactionKind::ServiceFee;
    }
    match amount.sign {
        Sign::Debit => TransactionKind::Debit,
        Sign::Credit => TransactionKind::Credit,
        Sign::Unsigned => {
            let lower = description.to_lowercase();
            if CREDIT_KEYWORDS.iter().any(|kw| contains_word(&lower, kw))
                || lower.contains("transfer from")
            {
                TransactionKind::Credit
            } else {
                TransactionKind::Debit
            }
        }
    }
}
