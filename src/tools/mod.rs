pub mod export;
pub mod llm;
pub mod normalize;
pub mod video;
