/// Default spec file, looked up relative to the working directory.
pub const DEFAULT_SPEC_PATH: &str = "openapi-small.yaml";

/// Configuration for an OpenAPI-backed tool source.
#[derive(Debug, Clone)]
pub struct OpenApiSourceConfig {
    /// Path to the `OpenAPI` document (YAML or JSON).
    pub spec: String,

    /// Which operations become tools.
    pub operations: OperationFilter,
}

impl Default for OpenApiSourceConfig {
    fn default() -> Self {
        Self {
            spec: DEFAULT_SPEC_PATH.to_string(),
            operations: OperationFilter::default(),
        }
    }
}

/// Include/exclude glob patterns over `"METHOD /path"` strings (`*` and `?` wildcards).
///
/// Excludes win. An empty include list exposes every operation that is not excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl OperationFilter {
    /// Build a filter from raw pattern lists, dropping blank entries.
    #[must_use]
    pub fn from_patterns(include: &[String], exclude: &[String]) -> Self {
        let clean = |patterns: &[String]| {
            patterns
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        };
        Self {
            include: clean(include),
            exclude: clean(exclude),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    #[must_use]
    pub fn allows(&self, method: &str, path: &str) -> bool {
        let operation = format!("{} {}", method.to_uppercase(), path);

        if self.exclude.iter().any(|p| glob_match(p, &operation)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| glob_match(p, &operation))
    }
}

/// Byte-wise glob match with backtracking on the last `*`.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let t = text.as_bytes();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        match p.get(pi) {
            Some(b'*') => {
                backtrack = Some((pi, ti));
                pi += 1;
            }
            Some(b'?') => {
                pi += 1;
                ti += 1;
            }
            Some(&c) if c == t[ti] => {
                pi += 1;
                ti += 1;
            }
            _ => match backtrack {
                Some((star_pi, star_ti)) => {
                    pi = star_pi + 1;
                    ti = star_ti + 1;
                    backtrack = Some((star_pi, star_ti + 1));
                }
                None => return false,
            },
        }
    }

    p[pi..].iter().all(|&c| c == b'*')
}
