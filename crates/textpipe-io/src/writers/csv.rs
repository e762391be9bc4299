//! Row → CSV text encoding.
//!
//! `RowEncoder` owns the writer policy and the row shape rules; the free
//! functions here are the eager and producer-side entry points built on it.

use std::io::Write;

use textpipe_core::config::PipeConfig;
use textpipe_exec::pipe::{PipeBuilder, PipeReader, PipeWriter};

use crate::error::{csv_error, encoding, io_error, Error, Result};
use crate::options::{CsvOptions, ExtraFields};
use crate::row::Row;

/// Encodes rows under one `CsvOptions`, tracking header state and row index.
pub struct RowEncoder {
    builder: csv::WriterBuilder,
    fieldnames: Option<Vec<String>>,
    strict: bool,
    rest_value: String,
    extra_fields: ExtraFields,
    header_pending: bool,
    rows: usize,
}

impl RowEncoder {
    pub fn new(opts: &CsvOptions) -> Result<Self> {
        opts.validate()?;
        Ok(Self {
            builder: opts.writer_builder(),
            fieldnames: opts.fieldnames.clone(),
            strict: opts.strict,
            rest_value: opts.rest_value.clone(),
            extra_fields: opts.extra_fields,
            header_pending: opts.header,
            rows: 0,
        })
    }

    /// Input rows encoded so far.
    pub fn rows_encoded(&self) -> usize {
        self.rows
    }

    pub fn header_pending(&self) -> bool {
        self.header_pending
    }

    /// A `csv::Writer` over `inner` configured with this policy.
    pub fn writer<W: Write>(&self, inner: W) -> csv::Writer<W> {
        self.builder.from_writer(inner)
    }

    pub fn write_header<W: Write>(&mut self, w: &mut csv::Writer<W>) -> Result<()> {
        let names = self
            .fieldnames
            .as_ref()
            .ok_or_else(|| Error::Config("header requires fieldnames".into()))?;
        w.write_record(names).map_err(csv_error)?;
        self.header_pending = false;
        Ok(())
    }

    /// Encode one row (after the header, if one is still owed).
    pub fn write_row<W: Write>(&mut self, w: &mut csv::Writer<W>, row: &Row) -> Result<()> {
        if self.header_pending {
            self.write_header(w)?;
        }
        let fields = self.record(row, self.rows)?;
        w.write_record(fields.iter().map(|f| f.as_bytes()))
            .map_err(csv_error)?;
        self.rows += 1;
        Ok(())
    }

    /// Emit an owed header (no rows were written) and flush.
    pub fn finish<W: Write>(&mut self, w: &mut csv::Writer<W>) -> Result<()> {
        if self.header_pending {
            self.write_header(w)?;
        }
        w.flush().map_err(io_error)?;
        Ok(())
    }

    /// Encode one row to its own string.
    pub fn encode_row(&mut self, row: &Row) -> Result<String> {
        let mut w = self.writer(Vec::new());
        self.write_row(&mut w, row)?;
        into_text(w)
    }

    pub fn encode_header(&mut self) -> Result<String> {
        let mut w = self.writer(Vec::new());
        self.write_header(&mut w)?;
        into_text(w)
    }

    /// Field values for `row` in output order.
    fn record<'a>(&'a self, row: &'a Row, index: usize) -> Result<Vec<&'a str>> {
        match row {
            Row::Fields(values) => {
                if let (true, Some(names)) = (self.strict, &self.fieldnames) {
                    if values.len() != names.len() {
                        return Err(encoding(
                            index,
                            format!("expected {} fields, got {}", names.len(), values.len()),
                        ));
                    }
                }
                Ok(values.iter().map(String::as_str).collect())
            }
            Row::Named(map) => {
                let names = self.fieldnames.as_ref().ok_or_else(|| {
                    Error::Config("mapping rows require fieldnames".into())
                })?;
                if self.extra_fields == ExtraFields::Raise {
                    if let Some(extra) = map.keys().find(|k| !names.contains(k)) {
                        return Err(encoding(index, format!("unexpected field '{extra}'")));
                    }
                }
                names
                    .iter()
                    .map(|name| match map.get(name) {
                        Some(v) => Ok(v.as_str()),
                        None if self.strict => {
                            Err(encoding(index, format!("missing field '{name}'")))
                        }
                        None => Ok(self.rest_value.as_str()),
                    })
                    .collect()
            }
        }
    }
}

pub(crate) fn into_text(w: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = w.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| Error::Csv(e.to_string()))
}

/// Encode every row into one string.
///
/// ```rust
/// use textpipe_io::{encode_csv, CsvOptions, Row};
///
/// let text = encode_csv([Row::from(["x", "1"]), Row::from(["y", "2"])], &CsvOptions::default()).unwrap();
/// assert_eq!(text, "x,1\r\ny,2\r\n");
/// ```
pub fn encode_csv<I, R>(rows: I, opts: &CsvOptions) -> Result<String>
where
    I: IntoIterator<Item = R>,
    R: Into<Row>,
{
    let mut enc = RowEncoder::new(opts)?;
    let mut w = enc.writer(Vec::new());
    for row in rows {
        enc.write_row(&mut w, &row.into())?;
    }
    enc.finish(&mut w)?;
    into_text(w)
}

/// Write encoded rows into a pipe sink, one chunk per `chunk_rows` rows.
///
/// Returns the number of rows written. Fails with `Error::Closed` once the
/// pipe's reader is gone.
pub fn write_csv<I, R>(sink: &mut PipeWriter, rows: I, opts: &CsvOptions) -> Result<usize>
where
    I: IntoIterator<Item = R>,
    R: Into<Row>,
{
    let mut enc = RowEncoder::new(opts)?;
    let mut w = enc.writer(&mut *sink);
    for row in rows {
        enc.write_row(&mut w, &row.into())?;
        if enc.rows_encoded() % opts.chunk_rows == 0 {
            w.flush().map_err(io_error)?;
        }
    }
    enc.finish(&mut w)?;
    Ok(enc.rows_encoded())
}

/// Pipe whose producer thread encodes `rows` with [`write_csv`].
///
/// Options are validated before the pipe is built.
pub fn csv_pipe<I, R>(rows: I, opts: CsvOptions, config: PipeConfig) -> Result<PipeReader>
where
    I: IntoIterator<Item = R> + Send + 'static,
    R: Into<Row>,
{
    opts.validate()?;
    PipeBuilder::from_config(config).build(move |sink| {
        write_csv(sink, rows, &opts)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Dialect, QuoteStyle};

    fn named(pairs: &[(&str, &str)]) -> Row {
        Row::named(pairs.iter().copied())
    }

    #[test]
    fn quotes_only_when_necessary() {
        let text = encode_csv(
            [Row::from(["a,b", "say \"hi\"", "plain"])],
            &CsvOptions::default(),
        )
        .unwrap();
        assert_eq!(text, "\"a,b\",\"say \"\"hi\"\"\",plain\r\n");
    }

    #[test]
    fn unix_dialect_quotes_everything() {
        let text = encode_csv([Row::from(["x", "1"])], &CsvOptions::dialect(Dialect::Unix)).unwrap();
        assert_eq!(text, "\"x\",\"1\"\n");
    }

    #[test]
    fn non_numeric_quoting() {
        let opts = CsvOptions::default().with_quote_style(QuoteStyle::NonNumeric);
        let text = encode_csv([Row::from(["x", "1"])], &opts).unwrap();
        assert_eq!(text, "\"x\",1\r\n");
    }

    #[test]
    fn named_rows_follow_fieldnames() {
        let opts = CsvOptions::default()
            .with_fieldnames(["b", "a"])
            .with_header(true);
        let text = encode_csv([named(&[("a", "1"), ("b", "2")])], &opts).unwrap();
        assert_eq!(text, "b,a\r\n2,1\r\n");
    }

    #[test]
    fn header_written_even_without_rows() {
        let opts = CsvOptions::default().with_fieldnames(["a"]).with_header(true);
        assert_eq!(encode_csv(Vec::<Row>::new(), &opts).unwrap(), "a\r\n");
    }

    #[test]
    fn missing_field_filled_unless_strict() {
        let opts = CsvOptions::default().with_fieldnames(["a", "b"]);
        let rows = [named(&[("a", "1"), ("b", "2")]), named(&[("a", "3")])];
        assert_eq!(encode_csv(rows.clone(), &opts).unwrap(), "1,2\r\n3,\r\n");

        let err = encode_csv(rows, &opts.with_strict(true)).unwrap_err();
        match err {
            Error::Encoding { row, message } => {
                assert_eq!(row, 1);
                assert!(message.contains("missing field 'b'"));
            }
            other => panic!("expected encoding error, got {other:?}"),
        }
    }

    #[test]
    fn extra_fields_raise_or_ignore() {
        let opts = CsvOptions::default().with_fieldnames(["a"]);
        let rows = [named(&[("a", "1"), ("zzz", "2")])];
        let err = encode_csv(rows.clone(), &opts).unwrap_err();
        assert!(matches!(err, Error::Encoding { row: 0, .. }));

        let opts = opts.with_extra_fields(ExtraFields::Ignore);
        assert_eq!(encode_csv(rows, &opts).unwrap(), "1\r\n");
    }

    #[test]
    fn named_rows_need_fieldnames() {
        let err = encode_csv([named(&[("a", "1")])], &CsvOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn strict_field_count() {
        let opts = CsvOptions::default()
            .with_fieldnames(["a", "b"])
            .with_strict(true);
        let err = encode_csv([Row::from(["1", "2"]), Row::from(["3"])], &opts).unwrap_err();
        assert!(matches!(err, Error::Encoding { row: 1, .. }));
    }
}
