//! Runtime configuration for a single scan-and-report run.

pub const DEFAULT_PRELINES: usize = 10;
pub const DEFAULT_POSTLINES: usize = 10;
pub const DEFAULT_MODEL: &str = "pki/logpt";
pub const DEFAULT_API_URL: &str = "http://localhost:11434/api/generate";

/// A trigger substring and the label used for every line emitted around its matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    pub trigger: String,
    pub label: String,
}

impl KeywordRule {
    /// Triggers are compared against lowercased lines, so they are stored lowercased.
    pub fn new(trigger: &str, label: &str) -> Self {
        Self {
            trigger: trigger.to_lowercase(),
            label: label.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub prelines: usize,
    pub postlines: usize,
    pub model: String,
    pub api_url: String,
    /// Order matters: a line containing several triggers belongs to the first rule listed.
    pub rules: Vec<KeywordRule>,
}

impl Config {
    pub fn with_rules(mut self, rules: Vec<KeywordRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_context(mut self, prelines: usize, postlines: usize) -> Self {
        self.prelines = prelines;
        self.postlines = postlines;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prelines: DEFAULT_PRELINES,
            postlines: DEFAULT_POSTLINES,
            model: DEFAULT_MODEL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            rules: default_rules(),
        }
    }
}

pub fn default_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new("error", "Error"),
        KeywordRule::new("warning", "Warning"),
        KeywordRule::new("critical", "Critical"),
        KeywordRule::new("exception", "Exception"),
    ]
}
