pub mod runtime;
pub mod tokenizer;
