#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    unused_qualifications,
    unused_import_braces
)]
//! This crate contains the das stream schema registry.
//!
//! The registry maps a stream version and variant onto the schema
//! document which admissible streams of that kind validate against.
//! Three artifacts ship with the crate, under `xsd/`:
//!
//! | schema | covers |
//! |---|---|
//! | `das-stream-v2.2.xsd` | legacy version 2.2 streams, in their normalized header form |
//! | `das-basic-stream-v3.0.xsd` | version 3.0 streams whose packets arrive incrementally |
//! | `das-basic-doc-v3.0.xsd` | version 3.0 documents assembled in one piece |
//!
//! The registry only resolves schemas; validating a header document
//! against one is left to the caller.

use lazy_static::lazy_static;
use snafu::{Backtrace, Snafu};
use std::collections::HashMap;

/// An error resolving a schema.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// No schema covers the given version and variant.
    #[snafu(display("Unknown stream version `{}` and variant `{}`", version, variant))]
    UnknownStreamKind {
        /// the version string as given
        version: String,
        /// the variant tag as given
        variant: String,
        /// backtrace of the error's creation
        backtrace: Backtrace,
    },
}

/// Type alias for a result from this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A bundled schema document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    file_name: &'static str,
    source: &'static str,
}

impl Schema {
    /// The file name of the schema artifact.
    pub fn file_name(&self) -> &'static str {
        self.file_name
    }

    /// The location the schema was bundled from, for diagnostics.
    pub fn path(&self) -> String {
        format!("{}/xsd/{}", env!("CARGO_MANIFEST_DIR"), self.file_name)
    }

    /// The schema document text.
    pub fn text(&self) -> &'static str {
        self.source
    }
}

static DAS2_STREAM: Schema = Schema {
    file_name: "das-stream-v2.2.xsd",
    source: include_str!("../xsd/das-stream-v2.2.xsd"),
};

static DAS3_BASIC_STREAM: Schema = Schema {
    file_name: "das-basic-stream-v3.0.xsd",
    source: include_str!("../xsd/das-basic-stream-v3.0.xsd"),
};

static DAS3_BASIC_DOC: Schema = Schema {
    file_name: "das-basic-doc-v3.0.xsd",
    source: include_str!("../xsd/das-basic-doc-v3.0.xsd"),
};

lazy_static! {
    static ref REGISTRY: HashMap<&'static str, &'static Schema> = {
        let mut m = HashMap::new();
        m.insert(DAS2_STREAM.file_name, &DAS2_STREAM);
        m.insert(DAS3_BASIC_STREAM.file_name, &DAS3_BASIC_STREAM);
        m.insert(DAS3_BASIC_DOC.file_name, &DAS3_BASIC_DOC);
        m
    };
}

/// Obtain the schema for the given stream version and variant.
///
/// Version strings are matched on their major component: anything
/// starting in `2` names the legacy stream schema, and anything starting
/// in `3` picks between the `das-basic-stream` and `das-basic-doc`
/// variants. Any other combination fails with
/// [`UnknownStreamKind`](Error::UnknownStreamKind).
pub fn resolve(version: &str, variant: &str) -> Result<&'static Schema> {
    if version.starts_with('2') {
        return Ok(&DAS2_STREAM);
    }
    if version.starts_with('3') {
        match variant {
            "das-basic-stream" => return Ok(&DAS3_BASIC_STREAM),
            "das-basic-doc" => return Ok(&DAS3_BASIC_DOC),
            _ => {}
        }
    }
    UnknownStreamKindSnafu { version, variant }.fail()
}

/// Look up a bundled schema by its file name.
pub fn by_file_name(file_name: &str) -> Option<&'static Schema> {
    REGISTRY.get(file_name).copied()
}

/// All bundled schemas.
pub fn schemas() -> impl Iterator<Item = &'static Schema> {
    REGISTRY.values().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_versions_ignore_the_variant() {
        let schema = resolve("2.2", "").unwrap();
        assert_eq!(schema.file_name(), "das-stream-v2.2.xsd");
        let schema = resolve("2.2", "das-basic-stream").unwrap();
        assert_eq!(schema.file_name(), "das-stream-v2.2.xsd");
    }

    #[test]
    fn v3_resolves_by_variant() {
        let schema = resolve("3.0", "das-basic-stream").unwrap();
        assert_eq!(schema.file_name(), "das-basic-stream-v3.0.xsd");
        let schema = resolve("3.0", "das-basic-doc").unwrap();
        assert_eq!(schema.file_name(), "das-basic-doc-v3.0.xsd");
    }

    #[test]
    fn unknown_kinds_are_rejected() {
        assert!(resolve("3.0", "das-fancy-doc").is_err());
        assert!(resolve("1.0", "").is_err());
        assert!(resolve("", "das-basic-stream").is_err());
    }

    #[test]
    fn bundled_text_is_available() {
        for schema in schemas() {
            assert!(schema.text().contains("xs:schema"));
            assert!(schema.path().ends_with(schema.file_name()));
        }
        assert!(by_file_name("das-stream-v2.2.xsd").is_some());
        assert!(by_file_name("no-such.xsd").is_none());
    }
}
