// SPDX-License-Identifier: MIT OR Apache-2.0

/// Builds an ordered [`Fields`](crate::Fields) map literal.
///
/// Keys are anything string-like; values are anything convertible into a
/// `serde_json::Value`.  Insertion order is the order written, and is the
/// order keys serialize in.
///
/// ```
/// use reqwise::fields;
///
/// let f = fields! {
///     "user_id" => "usr-1",
///     "attempt" => 3,
///     "cached" => false,
/// };
/// assert_eq!(f.len(), 3);
/// assert_eq!(f["attempt"], 3);
/// ```
#[macro_export]
macro_rules! fields {
    () => { $crate::Fields::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::Fields::new();
        $( fields.insert(($key).to_string(), ($value).into()); )+
        fields
    }};
}
