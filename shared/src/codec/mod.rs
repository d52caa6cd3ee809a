pub mod codec_registry;
