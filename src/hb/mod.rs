// Match harfbuzz code style.
#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]
#![allow(non_snake_case)]

mod algs;
pub mod buffer;
pub mod buffer_diff;
mod buffer_normalize;
pub mod common;
pub mod errors;
pub mod object;
pub mod unicode;
mod utf;

use ttf_parser::Tag as hb_tag_t;

type hb_mask_t = u32;

use self::common::{script, Direction, Language, Script};
