//! Prompt builders and structured-output schemas for the three LLM steps.

pub mod analyzer;
pub mod decomposer;
pub mod synthesizer;

pub use analyzer::{ANALYSIS_SYSTEM_PROMPT, PaperAnalysis, analysis_prompt};
pub use decomposer::{DECOMPOSITION_SYSTEM_PROMPT, SubQueryList, decomposition_prompt};
pub use synthesizer::{SYNTHESIS_SYSTEM_PROMPT, synthesis_prompt};
