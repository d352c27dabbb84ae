//! Error handling foundation for the TKJ Learning System.
//!
//! Each crate defines its own domain error enums in its own error module and
//! wraps them in a rootcause `Report` at fallible boundaries.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_alias_carries_value() {
        let ok: Result<&str> = Ok("usr");
        assert_eq!(ok.expect("should be ok"), "usr");
    }
}
