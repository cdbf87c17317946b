//! Text formatting for configurations serde_json's stock formatters do
//! not cover: custom separators, configurable indentation, and
//! ASCII-only string output.
//!
//! Punctuation state mirrors serde_json's `PrettyFormatter`; string
//! escaping of control characters, quotes, and backslashes remains
//! serde_json's own (`write_char_escape` is not overridden) — only the
//! pass-through of non-ASCII fragments changes under `ensure_ascii`.

use std::io;

use serde_json::ser::Formatter;

use crate::encode::EncodeConfig;

pub(crate) struct TextFormatter<'a> {
    item_separator: &'a str,
    key_separator: &'a str,
    indent: Option<&'a str>,
    ensure_ascii: bool,
    current_indent: usize,
    has_value: bool,
}

impl<'a> TextFormatter<'a> {
    pub(crate) fn from_config(config: &'a EncodeConfig) -> Self {
        let (item_separator, key_separator) =
            match (&config.separators, &config.indent) {
                (Some((item, key)), _) => (item.as_str(), key.as_str()),
                (None, Some(_)) => (",", ": "),
                (None, None) => (",", ":"),
            };

        Self {
            item_separator,
            key_separator,
            indent: config.indent.as_deref(),
            ensure_ascii: config.ensure_ascii,
            current_indent: 0,
            has_value: false,
        }
    }

    fn write_newline_indent<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if let Some(indent) = self.indent {
            writer.write_all(b"\n")?;
            for _ in 0..self.current_indent {
                writer.write_all(indent.as_bytes())?;
            }
        }

        Ok(())
    }
}

impl Formatter for TextFormatter<'_> {
    fn begin_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.current_indent += 1;
        self.has_value = false;
        writer.write_all(b"[")
    }

    fn end_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.current_indent -= 1;
        if self.has_value {
            self.write_newline_indent(writer)?;
        }

        writer.write_all(b"]")
    }

    fn begin_array_value<W>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if !first {
            writer.write_all(self.item_separator.as_bytes())?;
        }

        self.write_newline_indent(writer)
    }

    fn end_array_value<W>(&mut self, _writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.has_value = true;
        Ok(())
    }

    fn begin_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.current_indent += 1;
        self.has_value = false;
        writer.write_all(b"{")
    }

    fn end_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.current_indent -= 1;
        if self.has_value {
            self.write_newline_indent(writer)?;
        }

        writer.write_all(b"}")
    }

    fn begin_object_key<W>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if !first {
            writer.write_all(self.item_separator.as_bytes())?;
        }

        self.write_newline_indent(writer)
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(self.key_separator.as_bytes())
    }

    fn end_object_value<W>(&mut self, _writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.has_value = true;
        Ok(())
    }

    fn write_string_fragment<W>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if !self.ensure_ascii {
            return writer.write_all(fragment.as_bytes());
        }

        for character in fragment.chars() {
            if character.is_ascii() {
                let mut ascii = [0_u8; 1];
                writer
                    .write_all(character.encode_utf8(&mut ascii).as_bytes())?;
            } else {
                let mut units = [0_u16; 2];
                for unit in character.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }

        Ok(())
    }
}
