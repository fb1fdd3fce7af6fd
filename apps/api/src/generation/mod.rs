// Document generation: prompt templates, the per-request pipeline, and its HTTP handlers.
// All completion calls go through llm_client — no direct Gemini calls here.

pub mod handlers;
pub mod pipeline;
pub mod prompts;
