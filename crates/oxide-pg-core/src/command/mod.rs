//! Command text with bound parameters.
//!
//! Parameters are positional and named `@p0`, `@p1`, ... in the order they
//! were bound. Merging two commands renumbers the right-hand side so both
//! halves keep distinct names.

mod value;

pub use value::{SqlValue, ToSqlValue};

use core::fmt;

/// A bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlCommandParameter {
    /// Placeholder name as it appears in the text (`@p0`).
    pub name: String,
    /// Bound value.
    pub value: SqlValue,
}

/// Command text plus its ordered parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlCommand {
    /// Command text.
    pub text: String,
    /// Parameters in placeholder order.
    pub parameters: Vec<SqlCommandParameter>,
}

impl SqlCommand {
    /// Creates a command without parameters.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
        }
    }

    /// Placeholder name for the parameter at `index`.
    #[must_use]
    pub fn parameter_name(index: usize) -> String {
        format!("@p{index}")
    }

    /// Parameter values in order.
    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.parameters.iter().map(|p| &p.value)
    }

    /// Returns true if the command has no text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Appends `other` after `separator`, renumbering its placeholders to
    /// follow this command's parameters.
    #[must_use]
    pub fn merge(mut self, other: Self, separator: &str) -> Self {
        let offset = self.parameters.len();
        self.text.push_str(separator);
        self.text.push_str(&renumber(&other.text, offset));
        self.parameters
            .extend(other.parameters.into_iter().map(|p| SqlCommandParameter {
                name: renumber(&p.name, offset),
                value: p.value,
            }));
        self
    }
}

impl fmt::Display for SqlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Shifts every `@pN` placeholder in `text` by `offset`.
fn renumber(text: &str, offset: usize) -> String {
    if offset == 0 {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 8);
    let mut rest = text;
    while let Some(at) = rest.find("@p") {
        out.push_str(&rest[..at]);
        let after = &rest[at + 2..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        match after[..digits].parse::<usize>() {
            Ok(index) => out.push_str(&SqlCommand::parameter_name(index + offset)),
            Err(_) => out.push_str("@p"),
        }
        rest = &after[digits..];
    }
    out.push_str(rest);
    out
}

/// Incrementally builds a command, numbering parameters as they are bound.
#[derive(Debug, Default)]
pub struct CommandBuilder {
    text: String,
    parameters: Vec<SqlCommandParameter>,
}

impl CommandBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw text.
    pub fn push(&mut self, text: &str) -> &mut Self {
        self.text.push_str(text);
        self
    }

    /// Binds `value` and appends its placeholder.
    pub fn bind(&mut self, value: SqlValue) -> &mut Self {
        let name = SqlCommand::parameter_name(self.parameters.len());
        self.text.push_str(&name);
        self.parameters.push(SqlCommandParameter { name, value });
        self
    }

    /// Number of parameters bound so far.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Finishes the command.
    #[must_use]
    pub fn finish(self) -> SqlCommand {
        SqlCommand {
            text: self.text,
            parameters: self.parameters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(text: &str, values: Vec<SqlValue>) -> SqlCommand {
        let mut builder = CommandBuilder::new();
        let mut pieces = text.split('?');
        builder.push(pieces.next().unwrap_or_default());
        for (piece, value) in pieces.zip(values) {
            builder.bind(value);
            builder.push(piece);
        }
        builder.finish()
    }

    #[test]
    fn test_builder_numbers_parameters() {
        let cmd = command("a = ? and b = ?", vec![SqlValue::Int(1), SqlValue::Int(2)]);
        assert_eq!(cmd.text, "a = @p0 and b = @p1");
        assert_eq!(cmd.parameters[1].name, "@p1");
    }

    #[test]
    fn test_merge_renumbers_right_side() {
        let set = command("set \"a\" = ?", vec![SqlValue::Int(1)]);
        let filter = command("\"b\" = ? or \"c\" = ?", vec![SqlValue::Int(2), SqlValue::Int(3)]);
        let merged = set.merge(filter, " where ");
        assert_eq!(merged.text, "set \"a\" = @p0 where \"b\" = @p1 or \"c\" = @p2");
        let names: Vec<_> = merged.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["@p0", "@p1", "@p2"]);
        let values: Vec<_> = merged.values().cloned().collect();
        assert_eq!(values, vec![SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3)]);
    }

    #[test]
    fn test_renumber_multi_digit() {
        assert_eq!(renumber("@p1, @p10", 5), "@p6, @p15");
        assert_eq!(renumber("no params", 3), "no params");
    }

    #[test]
    fn test_merge_with_empty_left() {
        let merged = SqlCommand::new("delete").merge(command("x = ?", vec![SqlValue::Null]), " ");
        assert_eq!(merged.text, "delete x = @p0");
    }
}
