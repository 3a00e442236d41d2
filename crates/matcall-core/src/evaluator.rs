//! Free-form expression evaluation with output-count inference.

use std::sync::Arc;

use log::debug;

use crate::codec::to_host_value;
use crate::error::Result;
use crate::host::HostValue;
use crate::session::Session;
use crate::value::EngineValue;

/// How many outputs to request for an input, as far as the text alone tells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArityHint {
    Fixed(usize),
    /// Ask the engine how many outputs the named callee declares.
    QueryCallee(String),
}

/// Guess the output count from substrings of `input`. First match wins:
///
/// | contains        | outputs                  |
/// |-----------------|--------------------------|
/// | `;`             | 0                        |
/// | `==`            | 1                        |
/// | `=`             | 0                        |
/// | `@`             | 1                        |
/// | `(`             | declared by the callee   |
/// | a space         | 0                        |
/// | otherwise       | 1                        |
///
/// This is a heuristic over the raw text, not a parser. `"a = 'x;y'"` is
/// treated as a statement because it contains `;`.
pub fn classify(input: &str) -> ArityHint {
    if input.contains(';') {
        ArityHint::Fixed(0)
    } else if input.contains('=') {
        ArityHint::Fixed(if input.contains("==") { 1 } else { 0 })
    } else if input.contains('@') {
        ArityHint::Fixed(1)
    } else if let Some((callee, _)) = input.split_once('(') {
        ArityHint::QueryCallee(callee.trim().to_string())
    } else if input.contains(' ') {
        ArityHint::Fixed(0)
    } else {
        ArityHint::Fixed(1)
    }
}

/// Evaluate `input`. A negative `nargout` is inferred with [`classify`].
/// Empty input evaluates to [`HostValue::None`] without touching the engine.
pub fn eval(session: &Arc<Session>, input: &str, nargout: i32) -> Result<HostValue> {
    if input.is_empty() {
        return Ok(HostValue::None);
    }
    let nargout = if nargout >= 0 {
        nargout as usize
    } else {
        let inferred = match classify(input) {
            ArityHint::Fixed(n) => n,
            ArityHint::QueryCallee(callee) => {
                let declared = session.declared_arity(&callee)?;
                if declared < 0 {
                    1
                } else {
                    declared as usize
                }
            }
        };
        debug!("Inferred nargout={inferred} for {input:?}");
        inferred
    };
    let outputs = session.evaluate(input, nargout)?;
    to_host_value(session, EngineValue::from_outputs(outputs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_request_no_output() {
        assert_eq!(classify("x = 5"), ArityHint::Fixed(0));
        assert_eq!(classify("disp(x);"), ArityHint::Fixed(0));
        assert_eq!(classify("clear all"), ArityHint::Fixed(0));
    }

    #[test]
    fn comparisons_and_lambdas_request_one() {
        assert_eq!(classify("x == 5"), ArityHint::Fixed(1));
        assert_eq!(classify("@(t) t.^2"), ArityHint::Fixed(1));
        assert_eq!(classify("pi"), ArityHint::Fixed(1));
    }

    #[test]
    fn calls_defer_to_the_callee() {
        assert_eq!(classify("sqrt(4)"), ArityHint::QueryCallee("sqrt".into()));
        assert_eq!(classify("max([1 2], [], 2)"), ArityHint::QueryCallee("max".into()));
    }

    #[test]
    fn semicolon_wins_over_everything() {
        assert_eq!(classify("y == f(x);"), ArityHint::Fixed(0));
        assert_eq!(classify("s = 'a;b'"), ArityHint::Fixed(0));
    }
}
