#![deny(unused_must_use)]
#![forbid(unsafe_code)]
// Don't allow dbg! prints in release.
#![cfg_attr(not(debug_assertions), deny(clippy::dbg_macro))]

pub use codepage::AsciiCodepage;
pub use end_of_file_record::EndOfFileRecord;
pub use evt_file_header::{EvtFileHeader, FileFlags};
pub use evt_parser::{AbortHandle, EvtParser, ParserSettings, RecoveryMode};
pub use evt_record::{EventIdentifier, EventRecord, EventType, Severity};
pub use json_output::record_to_json_value;
pub use ntsid::Sid;
pub use record_collection::RecordCollection;
pub use record_store::{ReadSeek, ScanOutcome, ScanState};
pub use strings_array::StringsArray;
pub use xml_output::XmlOutput;

pub mod codepage;
pub mod end_of_file_record;
pub mod err;
pub mod evt_file_header;
pub mod evt_parser;
pub mod evt_record;
mod json_output;
pub mod ntsid;
pub mod record_collection;
mod record_store;
pub mod strings_array;
mod utils;
mod xml_output;

pub use utils::hexdump;
