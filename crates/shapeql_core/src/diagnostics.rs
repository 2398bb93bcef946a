//! Diagnostic reporting for soft failures.
//!
//! Hard failures abort a call through `Result`; everything the decoder or
//! synthesizer chooses to tolerate is recorded here instead.

use std::fmt;

/// A tolerated failure that changed the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Diagnostic code, see [`codes`].
    pub code: &'static str,
    /// Short title.
    pub title: String,
    /// Detailed message.
    pub message: Option<String>,
    /// Response path (`hero.friends[0]`) or variable name this refers to.
    pub location: Option<String>,
}

impl Diagnostic {
    /// Creates a new warning diagnostic.
    pub fn warning(code: &'static str, title: impl Into<String>) -> Self {
        Self {
            code,
            title: title.into(),
            message: None,
            location: None,
        }
    }

    /// Adds a message to the diagnostic.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attaches the location the diagnostic refers to.
    #[must_use]
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.title)?;
        if let Some(location) = &self.location {
            write!(f, " at `{location}`")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

/// A collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    /// Creates a new empty diagnostic bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a diagnostic.
    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Adds a warning diagnostic.
    pub fn warning(
        &mut self,
        code: &'static str,
        title: impl Into<String>,
        location: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.add(
            Diagnostic::warning(code, title)
                .at(location)
                .with_message(message),
        );
    }

    /// Returns an iterator over all diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Returns an iterator over diagnostics with the given code.
    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.diagnostics.iter().filter(move |d| d.code == code)
    }

    /// Returns true if there are no diagnostics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Returns the number of diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }
}

impl IntoIterator for DiagnosticBag {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

/// Common diagnostic codes.
pub mod codes {
    pub const UNKNOWN_VARIANT: &str = "W0001";
    pub const UNDECLARED_VARIABLE: &str = "W0002";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_bag() {
        let mut bag = DiagnosticBag::new();
        bag.warning(
            codes::UNKNOWN_VARIANT,
            "unknown variant",
            "data.search[0]",
            "Starship",
        );

        assert!(!bag.is_empty());
        assert_eq!(bag.len(), 1);
        assert_eq!(bag.with_code(codes::UNKNOWN_VARIANT).count(), 1);
        assert_eq!(bag.with_code(codes::UNDECLARED_VARIABLE).count(), 0);
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::warning(codes::UNDECLARED_VARIABLE, "undeclared variable")
            .at("$episode")
            .with_message("no value supplied");

        assert_eq!(
            diag.to_string(),
            "[W0002] undeclared variable at `$episode`: no value supplied"
        );
    }
}
