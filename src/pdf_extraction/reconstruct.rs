// Rebuild logical transaction lines from a fragmented text layer
use crate::patterns::{self, contains_word, AMOUNT_FRAGMENT};

/// Fragments that open a new row when the current row is already settled.
const LINE_START_KEYWORDS: &[&str] = &[
    "balance", "opening", "closing", "transfer", "payment", "deposit", "withdrawal",
    "fee", "interest", "atm", "eft", "cheque", "statement", "account", "vat", "page",
    "total", "debit", "credit", "pos", "purchase",
];

const TRANSACTION_KEYWORDS: &[&str] = &[
    "transfer", "payment", "fee", "charge", "deposit", "withdrawal", "debit", "credit",
    "atm", "eft", "salary", "interest", "dividend",
];

/// Boilerplate wins over any transaction signal.
const BOILERPLATE_MARKERS: &[&str] = &[
    "page",
    "statement",
    "account summary",
    "opening balance",
    "closing balance",
];

#[derive(Debug, PartialEq, Eq)]
enum Join {
    NewLine,
    Append,
}

/// Merge text-layer fragments into one line per transaction, dropping
/// headers, footers and balance-only rows.
pub fn reconstruct_lines<S: AsRef<str>>(fragments: &[S], max_fragment_len: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for fragment in fragments
        .iter()
        .map(|f| f.as_ref().trim())
        .filter(|f| !f.is_empty())
    {
        match join_decision(&current, fragment, max_fragment_len) {
            Join::NewLine => {
                flush(&mut current, &mut lines);
                current.push_str(fragment);
            }
            Join::Append => append_fragment(&mut current, fragment),
        }
    }
    flush(&mut current, &mut lines);
    lines
}

fn join_decision(current: &str, fragment: &str, max_fragment_len: usize) -> Join {
    if patterns::starts_with_date(fragment) {
        return Join::NewLine;
    }

    if AMOUNT_FRAGMENT.is_match(fragment) {
        // Amount then balance belong to the same row; a third amount starts a new one.
        if !patterns::ends_with_amount(current) {
            return Join::Append;
        }
        if patterns::count_amounts(current) >= 2 {
            return Join::NewLine;
        }
        return Join::Append;
    }

    if is_settled(current) && starts_with_keyword(fragment) {
        return Join::NewLine;
    }

    if fragment.chars().count() > max_fragment_len {
        return Join::NewLine;
    }

    Join::Append
}

/// A dated row is still open until it has an amount; its description may
/// legitimately contain keywords such as "Payment".
fn is_settled(current: &str) -> bool {
    !current.is_empty()
        && (patterns::count_amounts(current) > 0 || !patterns::starts_with_date(current))
}

fn starts_with_keyword(fragment: &str) -> bool {
    let lower = fragment.to_lowercase();
    LINE_START_KEYWORDS
        .iter()
        .any(|kw| lower.starts_with(kw) || contains_word(&lower, kw))
}

fn append_fragment(current: &mut String, fragment: &str) {
    let continues_punctuation = fragment.starts_with([',', '.', '-', ')']);
    if !current.is_empty() && !continues_punctuation {
        current.push(' ');
    }
    current.push_str(fragment);
}

fn flush(current: &mut String, lines: &mut Vec<String>) {
    if current.is_empty() {
        return;
    }
    let line = std::mem::take(current);
    if is_transaction(&line) {
        lines.push(line);
    }
}

/// Heuristic: does this line describe a transaction rather than page furniture?
pub fn is_transaction(line: &str) -> bool {
    if is_boilerplate(line) {
        return false;
    }
    let lower = line.to_lowercase();
    patterns::AMOUNT.is_match(line)
        || TRANSACTION_KEYWORDS.iter().any(|kw| lower.contains(kw))
        || patterns::ends_with_amount(line)
}

pub fn is_boilerplate(line: &str) -> bool {
    let lower = line.to_lowercase();
    BOILERPLATE_MARKERS.iter().any(|marker| lower.contains(marker))
}

const COLUMN_HEADINGS: &[&str] = &[
    "date", "description", "details", "transaction", "transactions", "amount", "debit",
    "debits", "credit", "credits", "balance", "reference", "particulars", "fees", "value",
];

/// A repeated table heading such as `Date Description Amount Balance`.
pub fn is_column_header(line: &str) -> bool {
    let words: Vec<String> = line
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    words.len() >= 2 && words.iter().all(|w| COLUMN_HEADINGS.contains(&w.as_str()))
}
