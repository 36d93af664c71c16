mod apply;
mod audio;
mod config;
mod pattern;
mod placeholder;
mod planner;
mod renamer;
mod selection;
mod token;
mod tokenizer;
mod transform;

pub use apply::{
    apply_plan, commit_batch, ApplyMode, ApplyResult, CommitBackend, DiskBackend, RenameOutcome,
    RenameStatus, SimulatedBackend,
};
pub use audio::{is_audio_file, read_audio_tags, AudioTags};
pub use config::{app_paths, load_config, load_config_from, render_config, AppConfig, AppPaths};
pub use pattern::{
    CharClass, PatternError, PatternSegment, PlaceholderSpec, Quantifier, SelectionPattern,
};
pub use placeholder::{
    available_placeholders, probe, resolve_placeholder, resolve_text, ResolveError,
    AUDIO_PLACEHOLDERS, BUILTIN_PLACEHOLDERS,
};
pub use planner::{collect_paths, generate_plan, PathFilter, PlanOptions, RenamePlan, RenameStats};
pub use renamer::{normalize_path, Renamer};
pub use selection::{
    split_extension, CharPredicate, IndexOptions, NamePart, SelectionError, SelectionOptions,
    SelectionPipeline, TextOptions,
};
pub use token::{join_text, Bindings, Token};
pub use tokenizer::{tokenize, Segment, SyntaxError, DELIMITER};
pub use transform::{NumberingOptions, SwapSide, Transform, TransformError};
