pub mod json;
pub mod key_value;
pub mod regex;
