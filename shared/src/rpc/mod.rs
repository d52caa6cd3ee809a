pub mod call_record;
pub mod dispatcher;
pub mod error;
pub mod method_hash;
