//! Value types shared by the engine, the facade and the parser.

pub mod record;

pub use record::{
    describe_scheme, scheme_from_description, ArgumentSpec, IconRef, SchemeRecord,
    SchemeRecordBuilder, SchemeUpdate,
};
