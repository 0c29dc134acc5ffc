pub mod display;
pub mod engine;
pub mod history;

pub use engine::{CalculatorEngine, CalculatorState, PressOutcome};
pub use history::{ButtonToken, InputHistory, Operator};
