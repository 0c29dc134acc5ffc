use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of trailing presses kept for trigger matching.
pub const HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
            Operator::Multiply => '×',
            Operator::Divide => '÷',
        }
    }

    /// Left-to-right application; division by zero yields 0.
    pub fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Operator::Add => lhs + rhs,
            Operator::Subtract => lhs - rhs,
            Operator::Multiply => lhs * rhs,
            Operator::Divide => {
                if rhs != 0.0 {
                    lhs / rhs
                } else {
                    0.0
                }
            }
        }
    }
}

/// One logical calculator action, as seen by the trigger matcher.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ButtonToken {
    Digit(u8),
    Decimal,
    Operator(Operator),
    Clear,
    ToggleSign,
    Percent,
    Equals,
}

impl ButtonToken {
    pub fn digit(value: u8) -> Option<Self> {
        (value <= 9).then_some(ButtonToken::Digit(value))
    }

    pub fn as_char(&self) -> char {
        match self {
            ButtonToken::Digit(d) => char::from(b'0' + d),
            ButtonToken::Decimal => '.',
            ButtonToken::Operator(op) => op.symbol(),
            ButtonToken::Clear => 'C',
            ButtonToken::ToggleSign => '±',
            ButtonToken::Percent => '%',
            ButtonToken::Equals => '=',
        }
    }

    /// Parses a key as typed on a keyboard. `*`/`x` and `/` are accepted as
    /// aliases for `×` and `÷`.
    pub fn from_key(key: char) -> Option<Self> {
        let token = match key {
            '0'..='9' => ButtonToken::Digit(key as u8 - b'0'),
            '.' | ',' => ButtonToken::Decimal,
            '+' => ButtonToken::Operator(Operator::Add),
            '-' | '−' => ButtonToken::Operator(Operator::Subtract),
            '×' | '*' | 'x' => ButtonToken::Operator(Operator::Multiply),
            '÷' | '/' => ButtonToken::Operator(Operator::Divide),
            'C' | 'c' => ButtonToken::Clear,
            '±' | '~' => ButtonToken::ToggleSign,
            '%' => ButtonToken::Percent,
            '=' => ButtonToken::Equals,
            _ => return None,
        };
        Some(token)
    }
}

impl fmt::Display for ButtonToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Trailing window of recent presses. Owned by the calculator engine; front-ends
/// never see it.
#[derive(Debug, Clone, Default)]
pub struct InputHistory {
    tokens: VecDeque<ButtonToken>,
}

impl InputHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, token: ButtonToken) {
        if self.tokens.len() == HISTORY_CAPACITY {
            self.tokens.pop_front();
        }
        self.tokens.push_back(token);
    }

    /// True when the last `secret.chars().count()` presses spell `secret`.
    /// An empty secret never matches.
    pub fn matches(&self, secret: &str) -> bool {
        let k = secret.chars().count();
        if k == 0 || k > self.tokens.len() {
            return false;
        }

        self.tokens
            .iter()
            .skip(self.tokens.len() - k)
            .map(ButtonToken::as_char)
            .eq(secret.chars())
    }

    pub fn reset(&mut self) {
        self.tokens.clear();
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press_all(history: &mut InputHistory, keys: &str) {
        for key in keys.chars() {
            history.record(ButtonToken::from_key(key).unwrap());
        }
    }

    #[test]
    fn keeps_only_the_last_ten_presses() {
        let mut history = InputHistory::new();
        press_all(&mut history, "123456789012345");
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert!(history.matches("6789012345"));
        assert!(!history.matches("56789012345"));
    }

    #[test]
    fn matches_trailing_window_only() {
        let mut history = InputHistory::new();
        press_all(&mut history, "51234");
        assert!(history.matches("1234"));

        let mut history = InputHistory::new();
        press_all(&mut history, "12354");
        assert!(!history.matches("1234"));
    }

    #[test]
    fn too_short_history_cannot_match() {
        let mut history = InputHistory::new();
        press_all(&mut history, "234");
        assert!(!history.matches("1234"));
    }

    #[test]
    fn empty_secret_never_matches() {
        let mut history = InputHistory::new();
        assert!(!history.matches(""));
        press_all(&mut history, "1234");
        assert!(!history.matches(""));
    }

    #[test]
    fn non_digit_presses_participate() {
        let mut history = InputHistory::new();
        press_all(&mut history, "9+1=");
        assert!(history.matches("+1="));
        assert!(history.matches("9+1="));

        history.record(ButtonToken::Operator(Operator::Multiply));
        assert!(history.matches("=×"));
    }

    #[test]
    fn reset_clears_everything() {
        let mut history = InputHistory::new();
        press_all(&mut history, "1234");
        history.reset();
        assert!(history.is_empty());
        assert!(!history.matches("4"));
    }

    #[test]
    fn divide_by_zero_yields_zero() {
        assert_eq!(Operator::Divide.apply(5.0, 0.0), 0.0);
        assert_eq!(Operator::Divide.apply(9.0, 3.0), 3.0);
    }

    #[test]
    fn keyboard_aliases_map_to_calculator_symbols() {
        assert_eq!(
            ButtonToken::from_key('*'),
            Some(ButtonToken::Operator(Operator::Multiply))
        );
        assert_eq!(
            ButtonToken::from_key('/'),
            Some(ButtonToken::Operator(Operator::Divide))
        );
        assert_eq!(ButtonToken::from_key('?'), None);
        assert_eq!(ButtonToken::digit(10), None);
    }
}
