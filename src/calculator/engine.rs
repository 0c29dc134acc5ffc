use serde::Serialize;

use super::display::{format_display, format_number};
use super::history::{ButtonToken, InputHistory, Operator};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalculatorState {
    pub display: String,
    pub pending_operand: Option<f64>,
    pub pending_operator: Option<Operator>,
    pub awaiting_fresh_operand: bool,
}

impl Default for CalculatorState {
    fn default() -> Self {
        Self {
            display: "0".into(),
            pending_operand: None,
            pending_operator: None,
            awaiting_fresh_operand: false,
        }
    }
}

impl CalculatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> f64 {
        self.display.parse::<f64>().unwrap_or(0.0)
    }

    pub fn digit(&mut self, digit: u8) {
        let digit = char::from(b'0' + digit.min(9));
        if self.awaiting_fresh_operand {
            self.display = digit.to_string();
            self.awaiting_fresh_operand = false;
        } else if self.display == "0" {
            self.display = digit.to_string();
        } else {
            self.display.push(digit);
        }
    }

    pub fn decimal_point(&mut self) {
        if self.awaiting_fresh_operand {
            self.display = "0.".into();
            self.awaiting_fresh_operand = false;
        } else if !self.display.contains('.') {
            self.display.push('.');
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn toggle_sign(&mut self) {
        self.display = format_number(-self.value());
    }

    pub fn percent(&mut self) {
        self.display = format_number(self.value() / 100.0);
    }

    pub fn operator(&mut self, op: Operator) {
        let input = self.value();

        match (self.pending_operand, self.pending_operator) {
            (None, _) => self.pending_operand = Some(input),
            (Some(lhs), Some(pending)) => {
                let result = normalize(pending.apply(lhs, input));
                self.display = format_number(result);
                self.pending_operand = Some(result);
            }
            (Some(_), None) => {}
        }

        self.pending_operator = Some(op);
        self.awaiting_fresh_operand = true;
    }

    pub fn equals(&mut self) {
        let (Some(lhs), Some(op)) = (self.pending_operand, self.pending_operator) else {
            return;
        };

        let result = normalize(op.apply(lhs, self.value()));
        self.display = format_number(result);
        self.pending_operand = None;
        self.pending_operator = None;
        self.awaiting_fresh_operand = true;
    }

    pub fn apply(&mut self, token: ButtonToken) {
        match token {
            ButtonToken::Digit(d) => self.digit(d),
            ButtonToken::Decimal => self.decimal_point(),
            ButtonToken::Operator(op) => self.operator(op),
            ButtonToken::Clear => self.clear(),
            ButtonToken::ToggleSign => self.toggle_sign(),
            ButtonToken::Percent => self.percent(),
            ButtonToken::Equals => self.equals(),
        }
    }
}

/// Overflowed results collapse to zero like division by zero does.
fn normalize(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    Updated,
    /// The press completed the trigger sequence; the history was reset.
    Triggered,
}

#[derive(Debug, Default)]
pub struct CalculatorEngine {
    state: CalculatorState,
    history: InputHistory,
}

impl CalculatorEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the press to the arithmetic state, records it, then checks the
    /// trailing history against `trigger`.
    pub fn press(&mut self, token: ButtonToken, trigger: &str) -> PressOutcome {
        self.state.apply(token);
        self.history.record(token);

        if self.history.matches(trigger) {
            self.history.reset();
            PressOutcome::Triggered
        } else {
            PressOutcome::Updated
        }
    }

    pub fn state(&self) -> &CalculatorState {
        &self.state
    }

    pub fn display(&self) -> String {
        format_display(&self.state.display)
    }

    pub fn clear_label(&self) -> &'static str {
        if self.state.display == "0" {
            "AC"
        } else {
            "C"
        }
    }

    /// Drops arithmetic state and pending presses, e.g. when returning from
    /// emergency mode.
    pub fn reset(&mut self) {
        self.state.clear();
        self.history.reset();
    }

    #[cfg(test)]
    pub(crate) fn history_len(&self) -> usize {
        self.history.len()
    }
}
