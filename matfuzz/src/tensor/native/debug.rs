use crate::tensor::{Dims, ITensor, Tensor};
use std::fmt::{Debug, Formatter, Write};

fn fmt_separated<I, T>(
    iter: &mut I,
    f: &mut Formatter,
    sep: &str,
    fmt: &mut impl FnMut(T, &mut Formatter) -> std::fmt::Result,
    limit: usize,
) -> std::fmt::Result
where
    I: Iterator<Item = T>,
{
    let mut remaining = limit;
    let mut first = true;
    while remaining > 0 {
        let Some(el) = iter.next() else { break };
        if first {
            first = false;
        } else {
            f.write_str(sep)?;
        }
        fmt(el, f)?;
        remaining -= 1;
    }
    Ok(())
}

fn fmt_separated_max<I, T>(
    mut iter: I,
    len: usize,
    max: usize,
    f: &mut Formatter,
    sep: &str,
    fmt: &mut impl FnMut(T, &mut Formatter) -> std::fmt::Result,
) -> std::fmt::Result
where
    I: Iterator<Item = T>,
{
    if len > max {
        let limit = max / 2;
        let to_skip = len - (limit * 2);
        fmt_separated(&mut iter, f, sep, fmt, limit)?;
        f.write_str(sep)?;
        write!(f, "...({to_skip} hidden)")?;
        f.write_str(sep)?;
        iter.nth(to_skip - 1);
        fmt_separated(&mut iter, f, sep, fmt, limit)
    } else {
        fmt_separated(&mut iter, f, sep, fmt, len)
    }
}

const DEBUG_LIMIT_DIM_OUTER: usize = 5;
const DEBUG_LIMIT_DIM_INNER: usize = 10;

fn fmt_row<T: Debug>(row: &[T], f: &mut Formatter) -> std::fmt::Result {
    f.write_char('[')?;
    fmt_separated_max(row.iter(), row.len(), DEBUG_LIMIT_DIM_INNER, f, ", ", &mut |el, f| {
        Debug::fmt(el, f)
    })?;
    f.write_char(']')
}

fn fmt_matrix_data<T: Debug>(data: &[T], rows: usize, cols: usize, f: &mut Formatter) -> std::fmt::Result {
    f.write_char('[')?;
    if !data.is_empty() {
        f.write_str("\n   ")?;
        fmt_separated_max(data.chunks_exact(cols), rows, DEBUG_LIMIT_DIM_OUTER, f, ",\n   ", &mut |row, f| {
            fmt_row(row, f)
        })?;
        f.write_char('\n')?;
    }
    f.write_char(']')
}

struct MatrixFormat<'a, T> {
    data: &'a [T],
    rows: usize,
    cols: usize,
}

impl<'a, T: Debug> Debug for MatrixFormat<'a, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fmt_matrix_data(self.data, self.rows, self.cols, f)
    }
}

/// Formats a dense row-major buffer for human inspection.
///
/// Large matrices are abbreviated, keeping the corners.
pub fn format_matrix<T: Debug>(data: &[T], rows: usize, cols: usize) -> String {
    assert_eq!(
        data.len(),
        rows * cols,
        "Mismatched data length {} and dimension ({rows}, {cols})",
        data.len()
    );
    format!("{:?}", MatrixFormat { data, rows, cols })
}

impl<T: Debug, D: Dims> Debug for Tensor<T, D> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let dims = self.dims();
        if D::N < 2 {
            fmt_row(self.as_ref(), f)?;
        } else {
            let rows = dims.first();
            let cols = if rows == 0 { 0 } else { self.len() / rows };
            fmt_matrix_data(self.as_ref(), rows, cols, f)?;
        }
        write!(f, " dtype={} dims={} len={}", std::any::type_name::<T>(), dims, self.len())
    }
}
