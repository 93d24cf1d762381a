use serde_json::{Map, Value};
use std::fmt::{Arguments, Display, Result, Write};

/// Wraps some underlying buffer by providing methods that write to it
/// in different formats.
pub struct Pipe<'buffer> {
    buffer: &'buffer mut (dyn Write + 'buffer),
}

impl<'buffer> Pipe<'buffer> {
    /// Create a new Pipe that writes to the given buffer.
    pub fn new(buffer: &'buffer mut String) -> Self {
        Self { buffer }
    }

    /// Write the given Value to the Pipe buffer.
    ///
    /// Null writes nothing, so an unresolved value in a lenient render
    /// produces empty output.
    ///
    /// # Errors
    ///
    /// The Pipe supports all Value types, so the only error that will
    /// be returned is propagated from the [write!] macro itself.
    pub fn write_value(&mut self, value: &Value) -> Result {
        match value {
            Value::Null => Ok(()),
            Value::String(string) => self.write_str(string),
            Value::Array(array) => self.write_array(array),
            Value::Object(object) => self.write_object(object),
            _ => self.write_display(value),
        }
    }

    /// Write the given Value to the Pipe buffer with HTML entity escaping.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying [write!] operation fails.
    pub fn write_escaped(&mut self, value: &Value) -> Result {
        match value {
            Value::Null => Ok(()),
            Value::String(string) => self.write_escaped_str(string),
            Value::Number(_) | Value::Bool(_) => self.write_display(value),
            _ => {
                let mut raw = String::new();
                let mut pipe = Pipe::new(&mut raw);
                pipe.write_value(value)?;
                self.write_escaped_str(&raw)
            }
        }
    }

    /// Write the given Value to the Pipe buffer in a form suited for
    /// a `debug` dump.
    ///
    /// Unlike [`write_value`][`Pipe::write_value`], null is spelled out.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying [write!] operation fails.
    pub fn write_debug(&mut self, value: &Value) -> Result {
        match value {
            Value::Null => self.write_str("null"),
            _ => self.write_value(value),
        }
    }

    /// Write the given text to the Pipe buffer, replacing HTML special
    /// characters with entities.
    fn write_escaped_str(&mut self, text: &str) -> Result {
        let mut last = 0;
        for (at, byte) in text.bytes().enumerate() {
            let entity = match byte {
                b'&' => "&amp;",
                b'<' => "&lt;",
                b'>' => "&gt;",
                b'"' => "&quot;",
                b'\'' => "&#x27;",
                _ => continue,
            };
            self.buffer.write_str(&text[last..at])?;
            self.buffer.write_str(entity)?;
            last = at + 1;
        }

        self.buffer.write_str(&text[last..])
    }

    /// Write the value to the buffer using the Display implementation.
    fn write_display(&mut self, value: impl Display) -> Result {
        write!(self.buffer, "{}", value)
    }

    /// Write the value to the buffer as a comma separated list surrounded
    /// by brackets.
    fn write_array(&mut self, value: &[Value]) -> Result {
        write!(self.buffer, "[")?;
        let mut iter = value.iter();
        if let Some(item) = iter.next() {
            self.write_debug(item)?;
            for item in iter {
                write!(self.buffer, ", ")?;
                self.write_debug(item)?;
            }
        }
        write!(self.buffer, "]")
    }

    /// Write the value to the buffer as key/value pairs surrounded
    /// by curly braces.
    fn write_object(&mut self, value: &Map<String, Value>) -> Result {
        write!(self.buffer, "{{")?;
        let mut iter = value.iter();
        if let Some((key, item)) = iter.next() {
            write!(self.buffer, "{}: ", key)?;
            self.write_debug(item)?;
            for (key, item) in iter {
                write!(self.buffer, ", {}: ", key)?;
                self.write_debug(item)?;
            }
        }
        write!(self.buffer, "}}")
    }
}

impl Write for Pipe<'_> {
    #[inline]
    fn write_str(&mut self, s: &str) -> Result {
        Write::write_str(self.buffer, s)
    }

    #[inline]
    fn write_char(&mut self, c: char) -> Result {
        Write::write_char(self.buffer, c)
    }

    #[inline]
    fn write_fmt(&mut self, args: Arguments<'_>) -> Result {
        Write::write_fmt(self.buffer, args)
    }
}
