/*!
 * Data Structures
 *
 * Small-string storage for error payloads and process names.
 */

mod inline_string;

pub use inline_string::InlineString;
