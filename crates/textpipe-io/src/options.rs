//! CSV writer policy. Plain serde data; the default is the excel dialect.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Rows encoded per chunk by the lazy readers.
pub const DEFAULT_CHUNK_ROWS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStyle {
    /// Quote only fields containing the delimiter, quote or a line break.
    #[default]
    Necessary,
    Always,
    NonNumeric,
    Never,
}

impl From<QuoteStyle> for csv::QuoteStyle {
    fn from(q: QuoteStyle) -> Self {
        match q {
            QuoteStyle::Necessary => csv::QuoteStyle::Necessary,
            QuoteStyle::Always => csv::QuoteStyle::Always,
            QuoteStyle::NonNumeric => csv::QuoteStyle::NonNumeric,
            QuoteStyle::Never => csv::QuoteStyle::Never,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminator {
    #[default]
    Crlf,
    Lf,
}

impl From<Terminator> for csv::Terminator {
    fn from(t: Terminator) -> Self {
        match t {
            Terminator::Crlf => csv::Terminator::CRLF,
            Terminator::Lf => csv::Terminator::Any(b'\n'),
        }
    }
}

/// What to do with mapping keys that are not in `fieldnames`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraFields {
    #[default]
    Raise,
    Ignore,
}

/// Named presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Comma, minimal quoting, `\r\n`.
    Excel,
    /// Excel with tabs.
    ExcelTab,
    /// Quote everything, `\n`.
    Unix,
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "excel" => Ok(Dialect::Excel),
            "excel_tab" => Ok(Dialect::ExcelTab),
            "unix" => Ok(Dialect::Unix),
            other => Err(Error::Config(format!(
                "unknown dialect '{other}' (expected excel, excel_tab or unix)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Emit `fieldnames` as the first line.
    pub header: bool,
    /// Column order; required for mapping rows and for `header`.
    pub fieldnames: Option<Vec<String>>,
    pub delimiter: char,
    pub quote: char,
    pub quote_style: QuoteStyle,
    /// Escape quotes by doubling them; otherwise prefix with `escape`.
    pub double_quote: bool,
    pub escape: char,
    pub terminator: Terminator,
    /// Rows per chunk for lazy streams (the prefetch size).
    pub chunk_rows: usize,
    /// Missing mapping keys (and field-count mismatches) are errors.
    pub strict: bool,
    /// Fill for missing mapping keys when not strict.
    pub rest_value: String,
    pub extra_fields: ExtraFields,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            header: false,
            fieldnames: None,
            delimiter: ',',
            quote: '"',
            quote_style: QuoteStyle::Necessary,
            double_quote: true,
            escape: '\\',
            terminator: Terminator::Crlf,
            chunk_rows: DEFAULT_CHUNK_ROWS,
            strict: false,
            rest_value: String::new(),
            extra_fields: ExtraFields::Raise,
        }
    }
}

impl CsvOptions {
    pub fn dialect(dialect: Dialect) -> Self {
        let base = Self::default();
        match dialect {
            Dialect::Excel => base,
            Dialect::ExcelTab => Self {
                delimiter: '\t',
                ..base
            },
            Dialect::Unix => Self {
                quote_style: QuoteStyle::Always,
                terminator: Terminator::Lf,
                ..base
            },
        }
    }

    pub fn with_fieldnames<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fieldnames = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_quote_style(mut self, quote_style: QuoteStyle) -> Self {
        self.quote_style = quote_style;
        self
    }

    pub fn with_chunk_rows(mut self, chunk_rows: usize) -> Self {
        self.chunk_rows = chunk_rows;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_extra_fields(mut self, extra_fields: ExtraFields) -> Self {
        self.extra_fields = extra_fields;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, c) in [
            ("delimiter", self.delimiter),
            ("quote", self.quote),
            ("escape", self.escape),
        ] {
            if !c.is_ascii() {
                return Err(Error::Config(format!(
                    "{name} must be a single ASCII character (got {c:?})"
                )));
            }
        }
        if self.delimiter == self.quote {
            return Err(Error::Config("delimiter and quote must differ".into()));
        }
        if self.chunk_rows == 0 {
            return Err(Error::Config("chunk_rows must be at least 1".into()));
        }
        if self.header && self.fieldnames.is_none() {
            return Err(Error::Config("header requires fieldnames".into()));
        }
        Ok(())
    }

    /// Writer settings for the `csv` crate. Call after `validate`.
    pub(crate) fn writer_builder(&self) -> csv::WriterBuilder {
        let mut b = csv::WriterBuilder::new();
        b.delimiter(self.delimiter as u8)
            .quote(self.quote as u8)
            .quote_style(self.quote_style.into())
            .double_quote(self.double_quote)
            .escape(self.escape as u8)
            .terminator(self.terminator.into())
            .has_headers(false)
            .flexible(true);
        b
    }
}
