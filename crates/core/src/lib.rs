pub mod config;
pub mod deidentify;
pub mod matcher;
pub mod metrics;
pub mod testing;
pub mod trials;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
    TrialSourceBackend,
};
pub use deidentify::{
    create_deidentifier, DeidentifiedText, Deidentifier, DeidentifyError, SkyflowDeidentifier,
};
pub use matcher::{
    create_trial_matcher, render_report, stream_match, MatchEvent, MatchRun, MatchStatus,
    MatcherError, ProgressSink, TrialMatch, TrialMatcher, NO_TRIALS_FOUND,
};
pub use trials::{create_trial_source, SourceHealth, TrialDetail, TrialSource, TrialSourceError};
