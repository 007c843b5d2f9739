//! Value encoding utilities.
use snafu::{ensure, Backtrace, OptionExt, Snafu};

/// An error in interpreting a value type encoding.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The type token does not end in a decimal size.
    #[snafu(display("Encoding length not defined in value type `{}`", token))]
    InvalidEncoding {
        /// the offending type token
        token: String,
        /// backtrace of the error's creation
        backtrace: Backtrace,
    },
}

/// Type alias for a result from this module.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Obtain the per-value byte width of a das type encoding token.
///
/// Type names always end in the value size: `little_endian_real4` is 4
/// bytes per value, `ascii14` is 14. The width is taken from the longest
/// run of decimal digits at the end of the token; at least one digit must
/// be present.
pub fn value_size(token: &str) -> Result<usize> {
    let digits = token
        .bytes()
        .rev()
        .take_while(u8::is_ascii_digit)
        .count();
    ensure!(digits > 0, InvalidEncodingSnafu { token });

    let suffix = &token[token.len() - digits..];
    suffix
        .parse()
        .ok()
        .context(InvalidEncodingSnafu { token })
}
