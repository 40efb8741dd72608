//! Convenient Macros for creating Event Tables
///
/// Creates an [`EventTable`].
///
/// The column names are given first, followed by a semicolon and one bracketed
/// list of values per row. Values are converted using [`AttributeValue::from`].
///
/// Panics if a row does not have exactly one value per column, or if a column
/// name is repeated.
///
/// # Examples
///
/// ```rust
/// use chatflow_miner::event_table;
///
/// let table = event_table!(
///     ["CASE_ID", "ACTIVITY", "AGENT"];
///     ["c1", "greet", "ai"],
///     ["c1", "ask", "human"],
/// );
/// assert_eq!(table.len(), 2);
/// ```
///
/// [`EventTable`]: crate::table::EventTable
/// [`AttributeValue::from`]: crate::table::AttributeValue
#[macro_export]
macro_rules! event_table {
    ([$($col:expr),* $(,)?]; $([$($val:expr),* $(,)?]),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut table = $crate::table::EventTable::new(vec![$($col.to_string()),*])
            .expect("event_table!: duplicate column name");
        $(
            table
                .push_row(vec![$($crate::table::AttributeValue::from($val)),*])
                .expect("event_table!: row width does not match the number of columns");
        )*
        table
    }};
}
