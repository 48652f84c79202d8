// crates/core/src/session/mod.rs
//! The live query session: question → generated query → execution → history.

mod controller;
mod machine;

pub use controller::{QuerySessionController, SessionCompletion};
pub use machine::{Effect, RequestId, SessionInput, SessionMachine, Transition};

/// Built-in example prompts offered before the user types anything.
pub const EXAMPLE_QUESTIONS: &[&str] = &[
    "Show me all products in the Electronics category",
    "What are the top 5 most expensive products?",
    "Show me all orders from customers in New York",
    "Count how many products are in each category",
];
