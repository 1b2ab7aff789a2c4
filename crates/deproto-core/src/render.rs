//! Text rendering of decoded field trees.
//!
//! Each field becomes one line headed by `[<id> <wire type>]`.
//! Length-delimited fields holding a message are followed by their children,
//! indented one level deeper:
//!
//! ```text
//! [1 Varint]: 150 (0x96)
//! [2 Length-delimited]: (5 bytes) "hello"
//! [3 Length-delimited]: (2 bytes)
//!     [1 Varint]: 1 (0x1)
//! [4 Length-delimited]: (4 bytes) [hex] deadbeef
//! ```

use crate::field::{Content, Field, FieldValue, Payload};
use std::fmt::Write as FmtWrite;

/// Configuration for rendering
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Indentation string per nesting level (default: 4 spaces)
    pub indent_str: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            indent_str: "    ".to_string(),
        }
    }
}

impl RenderConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the indentation string
    pub fn indent_str(mut self, s: impl Into<String>) -> Self {
        self.indent_str = s.into();
        self
    }
}

/// Renders decoded fields as indented text
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    /// Creates a new renderer with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new renderer with custom configuration
    pub fn with_config(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render a field sequence at the top level
    pub fn render(&self, fields: &[Field]) -> String {
        let mut output = String::new();
        for field in fields {
            self.write_field(&mut output, field, 0);
        }
        output
    }

    /// Render one field and its children, starting at `indent_level`
    pub fn render_field(&self, field: &Field, indent_level: usize) -> String {
        let mut output = String::new();
        self.write_field(&mut output, field, indent_level);
        output
    }

    fn write_field(&self, output: &mut String, field: &Field, indent_level: usize) {
        // Writing to a String cannot fail
        let _ = self.try_write_field(output, field, indent_level);
    }

    fn try_write_field(
        &self,
        output: &mut String,
        field: &Field,
        indent_level: usize,
    ) -> std::fmt::Result {
        self.write_indent(output, indent_level);
        write!(output, "[{} {}]", field.id, field.wire_type())?;

        match &field.value {
            FieldValue::Varint(value) => writeln!(output, ": {} ({:#x})", value, value),
            FieldValue::Fixed64(bits) => {
                writeln!(output, ": {} ({:#x}) ({:.6})", bits, bits, f64::from_bits(*bits))
            }
            FieldValue::Fixed32(bits) => {
                writeln!(output, ": {} ({:#x}) ({:.6})", bits, bits, f32::from_bits(*bits))
            }
            FieldValue::LengthDelimited(payload) => {
                self.write_payload(output, payload, indent_level)
            }
            FieldValue::StartGroup | FieldValue::EndGroup => writeln!(output),
        }
    }

    fn write_payload(
        &self,
        output: &mut String,
        payload: &Payload,
        indent_level: usize,
    ) -> std::fmt::Result {
        write!(output, ": ({} bytes)", payload.len())?;

        match payload.content() {
            Content::Text(text) => writeln!(output, " \"{}\"", escape_string(text)),
            Content::Message(fields) => {
                writeln!(output)?;
                for child in fields {
                    self.try_write_field(output, child, indent_level + 1)?;
                }
                Ok(())
            }
            Content::Opaque => writeln!(output, " [hex] {}", to_hex(payload.as_bytes())),
        }
    }

    fn write_indent(&self, output: &mut String, level: usize) {
        for _ in 0..level {
            output.push_str(&self.config.indent_str);
        }
    }
}

/// Render a field sequence with the default configuration
pub fn render_fields(fields: &[Field]) -> String {
    Renderer::new().render(fields)
}

/// Render one field at `indent_level` with the default configuration
pub fn render_field(field: &Field, indent_level: usize) -> String {
    Renderer::new().render_field(field, indent_level)
}

/// Escape a string for display inside double quotes
fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            _ if c.is_ascii_control() => {
                let _ = write!(result, "\\x{:02x}", c as u32);
            }
            _ if c.is_control() || (c.is_whitespace() && c != ' ') => {
                let _ = write!(result, "\\u{{{:04x}}}", c as u32);
            }
            _ => result.push(c),
        }
    }
    result
}

/// Lowercase hex without separators
fn to_hex(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 2);
    for byte in data {
        let _ = write!(result, "{:02x}", byte);
    }
    result
}
