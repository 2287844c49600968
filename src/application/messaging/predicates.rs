//! Stock command predicates

use regex_lite::Regex;

use super::parser::MessageParser;
use crate::application::errors::PredicateError;
use crate::domain::entities::{MessageEvent, Predicate};

/// Box a closure as a [`Predicate`]
pub fn boxed<F>(predicate: F) -> Predicate
where
    F: Fn(&MessageEvent) -> Result<bool, PredicateError> + Send + Sync + 'static,
{
    Box::new(predicate)
}

/// Text equals `expected` exactly
pub fn exact(expected: impl Into<String>) -> Predicate {
    let expected = expected.into();
    boxed(move |event| Ok(event.text == expected))
}

/// Text starts with `prefix`
pub fn starts_with(prefix: impl Into<String>) -> Predicate {
    let prefix = prefix.into();
    boxed(move |event| Ok(event.text.starts_with(prefix.as_str())))
}

/// `<prefix><name>` followed by optional arguments, for any of `names`
pub fn command(prefix: impl Into<String>, names: &[&str]) -> Predicate {
    let parser = MessageParser::new(prefix);
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    boxed(move |event| {
        Ok(names.iter().any(|name| parser.is_command(&event.text, name)))
    })
}

/// Text matches a regular expression
pub fn regex(pattern: &str) -> Result<Predicate, PredicateError> {
    let re = Regex::new(pattern)
        .map_err(|e| PredicateError::Failed(format!("Invalid pattern {}: {}", pattern, e)))?;
    Ok(boxed(move |event| Ok(re.is_match(&event.text))))
}

/// True when any inner predicate is true; evaluated in order and stops at
/// the first match or the first error
pub fn any_of(predicates: Vec<Predicate>) -> Predicate {
    boxed(move |event| {
        for predicate in &predicates {
            if predicate(event)? {
                return Ok(true);
            }
        }
        Ok(false)
    })
}
