pub mod html;


pub use html::{extract_optional_title, extract_title};
