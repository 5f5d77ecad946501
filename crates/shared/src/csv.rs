//! Minimal CSV writing helpers used by the audit log exports.

/// Escape a value for CSV output.
pub fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r')
    {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Join already-rendered cells into one CSV line (without the newline).
pub fn csv_row<I, S>(cells: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    cells
        .into_iter()
        .map(|c| escape_csv(c.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}
