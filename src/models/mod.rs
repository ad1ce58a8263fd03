pub mod command;
pub mod document;
pub mod field;
pub mod search;
pub mod term;

pub use command::{ApplyError, Command, CommandResponse};
pub use document::{Document, DocumentBody, DocumentId};
pub use field::{Field, FieldType, DEFAULT_SEPARATOR};
pub use search::{RankedDoc, SearchRequest, SearchResponse, SearchResult};
pub use term::{Term, TermData};
