//! Query synthesis.
//!
//! Renders an operation document from a field tree's descriptors. The output
//! is a single line by default:
//!
//! ```text
//! query Hero($episode: Episode!) { hero(episode: $episode) { name } }
//! ```
//!
//! [`FormatOptions::pretty`] switches to an indented multi-line layout for
//! logs.

use std::fmt;

use indexmap::IndexSet;
use thiserror::Error;
use tracing::warn;

use crate::descriptor::{
    is_valid_name, FieldDescriptor, ObjectShape, OperationKind, PolymorphicShape, Selection,
    TypeRef,
};
use crate::diagnostics::{codes, DiagnosticBag};
use crate::input::InputType;
use crate::variables::Variables;

/// Maximum selection nesting. Self-recursive field trees hit this.
pub const MAX_DEPTH: usize = 64;

/// Formatting options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    /// Multi-line, indented output.
    pub pretty: bool,
    /// Number of spaces for indentation.
    pub indent_size: usize,
    /// Use tabs instead of spaces.
    pub use_tabs: bool,
}

impl FormatOptions {
    /// Indented output with default spacing.
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            ..Self::default()
        }
    }
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            pretty: false,
            indent_size: 2,
            use_tabs: false,
        }
    }
}

/// A field tree that can't be rendered as a valid document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    #[error("invalid template `{type_name}`: {reason}")]
    InvalidTemplate {
        type_name: &'static str,
        reason: String,
    },
}

/// A declared operation variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDeclaration {
    pub name: String,
    pub input_type: InputType,
}

impl fmt::Display for VariableDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}: {}", self.name, self.input_type)
    }
}

/// A synthesized operation document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// The document text.
    pub text: String,
    pub kind: OperationKind,
    pub operation_name: Option<String>,
    /// Declarations in the order they appear in the document.
    pub declarations: Vec<VariableDeclaration>,
    /// Undeclared variable references.
    pub diagnostics: DiagnosticBag,
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Synthesizes a compact document for `T`.
pub fn synthesize<T: Selection>(
    kind: OperationKind,
    variables: &Variables,
    operation_name: Option<&str>,
) -> Result<Document, SynthesisError> {
    Synthesizer::new(FormatOptions::default()).synthesize::<T>(kind, variables, operation_name)
}

/// Document renderer.
pub struct Synthesizer {
    options: FormatOptions,
    output: String,
    indent: usize,
    references: IndexSet<String>,
}

impl Synthesizer {
    /// Creates a new synthesizer.
    pub fn new(options: FormatOptions) -> Self {
        Self {
            options,
            output: String::new(),
            indent: 0,
            references: IndexSet::new(),
        }
    }

    /// Renders the operation for `T`.
    pub fn synthesize<T: Selection>(
        &mut self,
        kind: OperationKind,
        variables: &Variables,
        operation_name: Option<&str>,
    ) -> Result<Document, SynthesisError> {
        self.output.clear();
        self.indent = 0;
        self.references.clear();

        let root = T::shape();
        if let Some(name) = operation_name {
            if !is_valid_name(name) {
                return Err(invalid(root.type_name, format!("invalid operation name `{name}`")));
            }
        }

        self.selection_set(&root, 1)?;
        let selection = std::mem::take(&mut self.output);

        let mut diagnostics = DiagnosticBag::new();
        let declarations = self.declarations(root.type_name, variables, &mut diagnostics)?;

        let mut text = String::with_capacity(selection.len() + 32);
        text.push_str(kind.keyword());
        if let Some(name) = operation_name {
            text.push(' ');
            text.push_str(name);
        }
        if !declarations.is_empty() {
            text.push('(');
            for (i, declaration) in declarations.iter().enumerate() {
                if i > 0 {
                    text.push_str(", ");
                }
                text.push_str(&declaration.to_string());
            }
            text.push(')');
        }
        text.push(' ');
        text.push_str(&selection);

        Ok(Document {
            text,
            kind,
            operation_name: operation_name.map(str::to_owned),
            declarations,
            diagnostics,
        })
    }

    /// Referenced variables first, in order of first use, then the rest in
    /// insertion order.
    fn declarations(
        &self,
        type_name: &'static str,
        variables: &Variables,
        diagnostics: &mut DiagnosticBag,
    ) -> Result<Vec<VariableDeclaration>, SynthesisError> {
        let mut declarations = Vec::with_capacity(variables.len());

        for name in &self.references {
            match variables.get(name) {
                Some(variable) => declarations.push(VariableDeclaration {
                    name: name.clone(),
                    input_type: variable.input_type.clone(),
                }),
                None => {
                    warn!("Variable `${}` is referenced but has no value", name);
                    diagnostics.warning(
                        codes::UNDECLARED_VARIABLE,
                        "undeclared variable",
                        format!("${name}"),
                        "referenced in an argument but no value was supplied",
                    );
                }
            }
        }

        for (name, variable) in variables.iter() {
            if self.references.contains(name) {
                continue;
            }
            if !is_valid_name(name) {
                return Err(invalid(type_name, format!("invalid variable name `{name}`")));
            }
            declarations.push(VariableDeclaration {
                name: name.to_owned(),
                input_type: variable.input_type.clone(),
            });
        }

        Ok(declarations)
    }

    fn selection_set(&mut self, shape: &ObjectShape, depth: usize) -> Result<(), SynthesisError> {
        if depth > MAX_DEPTH {
            return Err(invalid(
                shape.type_name,
                format!("selection nests deeper than {MAX_DEPTH} levels"),
            ));
        }
        if shape.fields.is_empty() {
            return Err(invalid(shape.type_name, "no selectable fields".into()));
        }

        self.open_set();
        for field in &shape.fields {
            self.field(shape.type_name, field, depth)?;
        }
        self.close_set();
        Ok(())
    }

    fn field(
        &mut self,
        owner: &'static str,
        field: &FieldDescriptor,
        depth: usize,
    ) -> Result<(), SynthesisError> {
        if !is_valid_name(field.name) {
            return Err(invalid(owner, format!("invalid field name `{}`", field.name)));
        }

        self.begin_item();
        if let Some(alias) = field.alias {
            if !is_valid_name(alias) {
                return Err(invalid(owner, format!("invalid alias `{alias}`")));
            }
            self.output.push_str(alias);
            self.output.push_str(": ");
        }
        self.output.push_str(field.name);

        if let Some(arguments) = field.arguments.map(str::trim).filter(|a| !a.is_empty()) {
            self.output.push('(');
            self.output.push_str(arguments);
            self.output.push(')');
            self.collect_references(arguments);
        }

        match field.ty.leaf() {
            TypeRef::Object(shape) => {
                self.output.push(' ');
                self.selection_set(&shape(), depth + 1)
            }
            TypeRef::Polymorphic(variants) => {
                self.output.push(' ');
                self.polymorphic_set(&variants(), depth + 1)
            }
            _ => Ok(()),
        }
    }

    fn polymorphic_set(
        &mut self,
        shape: &PolymorphicShape,
        depth: usize,
    ) -> Result<(), SynthesisError> {
        if depth > MAX_DEPTH {
            return Err(invalid(
                shape.type_name,
                format!("selection nests deeper than {MAX_DEPTH} levels"),
            ));
        }
        if shape.variants.is_empty() {
            return Err(invalid(shape.type_name, "no concrete shapes declared".into()));
        }
        if !is_valid_name(shape.discriminator) {
            return Err(invalid(
                shape.type_name,
                format!("invalid discriminator `{}`", shape.discriminator),
            ));
        }

        self.open_set();
        self.begin_item();
        self.output.push_str(shape.discriminator);
        for variant in &shape.variants {
            if !is_valid_name(variant.type_condition) {
                return Err(invalid(
                    shape.type_name,
                    format!("invalid type condition `{}`", variant.type_condition),
                ));
            }
            self.begin_item();
            self.output.push_str("... on ");
            self.output.push_str(variant.type_condition);
            self.output.push(' ');
            self.selection_set(&(variant.shape)(), depth + 1)?;
        }
        self.close_set();
        Ok(())
    }

    /// Records `$name` references outside string literals.
    fn collect_references(&mut self, arguments: &str) {
        let mut chars = arguments.char_indices().peekable();
        let mut in_string = false;

        while let Some((start, c)) = chars.next() {
            match c {
                '\\' if in_string => {
                    chars.next();
                }
                '"' => in_string = !in_string,
                '$' if !in_string => {
                    let begin = start + 1;
                    let mut end = begin;
                    while let Some(&(i, next)) = chars.peek() {
                        if next == '_' || next.is_ascii_alphanumeric() {
                            end = i + next.len_utf8();
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let name = &arguments[begin..end];
                    if is_valid_name(name) && !self.references.contains(name) {
                        self.references.insert(name.to_owned());
                    }
                }
                _ => {}
            }
        }
    }

    fn open_set(&mut self) {
        self.output.push('{');
        self.indent += 1;
    }

    fn begin_item(&mut self) {
        if self.options.pretty {
            self.output.push('\n');
            self.push_indent();
        } else {
            self.output.push(' ');
        }
    }

    fn close_set(&mut self) {
        self.indent -= 1;
        self.begin_item();
        self.output.push('}');
    }

    fn push_indent(&mut self) {
        if self.options.use_tabs {
            for _ in 0..self.indent {
                self.output.push('\t');
            }
        } else {
            for _ in 0..(self.indent * self.options.indent_size) {
                self.output.push(' ');
            }
        }
    }
}

fn invalid(type_name: &'static str, reason: String) -> SynthesisError {
    SynthesisError::InvalidTemplate { type_name, reason }
}
