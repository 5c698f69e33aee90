use std::sync::OnceLock;

use regex::Regex;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_non_letter, r"[^A-Za-z ]");

/// Common OCR confusions, applied in order. Later pairs see the output of
/// earlier ones.
const SUBSTITUTIONS: [(char, &str); 4] = [('l', "1"), ('i', "1"), ('o', "0"), ('x', "*")];

/// Clean raw OCR output into the expression handed to [`evaluate`].
///
/// The letter filter runs after the substitutions, so the digits and `*`
/// they insert are stripped again. Total over any input.
pub fn normalize(raw: &str) -> String {
    let mut text = raw.to_lowercase();
    for (from, to) in SUBSTITUTIONS {
        text = text.replace(from, to);
    }
    re_non_letter().replace_all(&text, "").into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    pub const ALL: [Operator; 4] = [
        Operator::Add,
        Operator::Subtract,
        Operator::Multiply,
        Operator::Divide,
    ];

    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
            Operator::Multiply => '*',
            Operator::Divide => '/',
        }
    }

    /// Operand used when a segment is missing or not an integer.
    pub fn fallback_operand(self) -> i64 {
        match self {
            Operator::Add | Operator::Subtract => 0,
            Operator::Multiply | Operator::Divide => 1,
        }
    }

    /// Matches the whole expression against the operator symbols. An
    /// operator embedded in a longer string does not match.
    pub fn from_expression(expr: &str) -> Option<Operator> {
        let mut chars = expr.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return None;
        };
        Operator::ALL.into_iter().find(|op| op.symbol() == c)
    }

    /// `None` on overflow or division by zero.
    pub fn apply(self, lhs: i64, rhs: i64) -> Option<i64> {
        match self {
            Operator::Add => lhs.checked_add(rhs),
            Operator::Subtract => lhs.checked_sub(rhs),
            Operator::Multiply => lhs.checked_mul(rhs),
            Operator::Divide => lhs.checked_div(rhs),
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Evaluate a normalized expression. Never fails: anything that is not one
/// of the four operator strings evaluates to 0, and missing or non-numeric
/// operands fall back to the operator's identity.
pub fn evaluate(expr: &str) -> i64 {
    let Some(op) = Operator::from_expression(expr) else {
        return 0;
    };

    let segments: Vec<&str> = expr.split(op.symbol()).collect();
    let operand = |idx: usize| {
        segments
            .get(idx)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or_else(|| op.fallback_operand())
    };

    op.apply(operand(0), operand(1)).unwrap_or(0)
}
