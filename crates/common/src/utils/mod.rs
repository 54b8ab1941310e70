mod headers;
mod time;

pub use headers::{header_names, header_value, parse_name_list};
pub use time::current_timestamp_secs;
