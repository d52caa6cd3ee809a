pub mod entity_reader;
pub mod entity_writer;
pub mod error;
pub mod replicated_entity;

#[cfg(test)]
pub(crate) mod test_components;
