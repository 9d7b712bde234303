use crate::error::{Error, Result};

/// Row identifier shared by every table (`BIGSERIAL` in PostgreSQL)
pub type Id = i64;

/// Parse an identifier taken from a path segment or header.
///
/// Anything that is not a positive integer is malformed input, never a lookup miss.
pub fn parse_id(raw: &str) -> Result<Id> {
    match raw.trim().parse::<Id>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(Error::validation(format!("'{}' is not a valid identifier", raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert_eq!(parse_id(" 7 ").unwrap(), 7);
        assert!(matches!(parse_id("abc"), Err(Error::Validation(_))));
        assert!(matches!(parse_id("0"), Err(Error::Validation(_))));
        assert!(matches!(parse_id("-3"), Err(Error::Validation(_))));
        assert!(matches!(parse_id(""), Err(Error::Validation(_))));
    }
}
