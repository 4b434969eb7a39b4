mod client;

pub use client::LlamaClient;
