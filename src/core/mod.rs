// src/core/mod.rs

pub mod arg_parser;
pub mod dispatcher;
pub mod handler;
pub mod path;
pub mod prequire;
pub mod rewrite;
pub mod selection;
pub mod tree;
