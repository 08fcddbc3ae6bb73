pub mod bencode;
pub mod file;
pub mod info_hash;
pub mod json;
pub mod text;
