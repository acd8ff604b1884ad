mod pipeline;
mod runner;
mod tokens;

pub use pipeline::ProcessorPipeline;
pub use runner::{
    read_main_class_from_jar, resolve_java_binary, JavaToolRunner, ToolInvocation, ToolRunner,
};
pub use tokens::{replace_tokens, FixedTokens, TokenTable};
