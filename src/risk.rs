use crate::usage::UsageIndex;
use crate::visitor::{FunctionRecord, ImportKind, ImportRecord};
use serde::{Deserialize, Serialize};

/// Risk classification assigned to a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// The {LOW, MEDIUM, HIGH} verdict plus a human-readable reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskVerdict {
    pub level: RiskLevel,
    pub reason: String,
}

lazy_static::lazy_static! {
    /// Module name prefixes of known networking/API libraries.
    static ref API_MODULES: Vec<&'static str> = vec![
        "requests", "urllib", "http", "httpx", "aiohttp", "socket", "grpc",
    ];

    /// Names that look like API verbs when pulled in via a from-import.
    static ref API_VERBS: Vec<&'static str> = vec![
        "get", "post", "put", "delete", "patch", "head", "request",
        "fetch", "urlopen", "urlretrieve",
    ];

    /// Substrings marking helper/utility naming conventions.
    static ref HELPER_PATTERNS: Vec<&'static str> = vec![
        "helper", "util", "format", "parse", "convert", "validate",
        "sanitize", "normalize", "encode", "decode", "serialize",
        "to_", "from_", "is_", "has_", "get_", "set_", "make_",
        "create_", "build_",
    ];
}

/// Priority-ordered rule cascade producing one verdict per function.
///
/// The registries are plain owned tables so tests can swap them out; the
/// default tables above are the versioned, intentionally-heuristic lists.
/// Classification is a pure function of the function record, the file's
/// imports, and the optional usage index.
pub struct RiskClassifier {
    api_modules: Vec<String>,
    api_verbs: Vec<String>,
    helper_patterns: Vec<String>,
}

impl Default for RiskClassifier {
    fn default() -> Self {
        Self::new(
            API_MODULES.iter().map(|s| s.to_string()).collect(),
            API_VERBS.iter().map(|s| s.to_string()).collect(),
            HELPER_PATTERNS.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl RiskClassifier {
    pub fn new(
        api_modules: Vec<String>,
        api_verbs: Vec<String>,
        helper_patterns: Vec<String>,
    ) -> Self {
        Self {
            api_modules,
            api_verbs,
            helper_patterns,
        }
    }

    /// Evaluates the cascade; the first matching rule wins.
    ///
    /// 1. External API usage        -> HIGH
    /// 2. Defined in multiple files -> HIGH
    /// 3. Helper naming convention  -> LOW
    /// 4. Default                   -> MEDIUM
    ///
    /// A missing usage index means singleton usage is assumed.
    pub fn classify(
        &self,
        func: &FunctionRecord,
        imports: &[ImportRecord],
        usage: Option<&UsageIndex>,
    ) -> RiskVerdict {
        if let Some(reason) = self.api_usage(func, imports) {
            return RiskVerdict {
                level: RiskLevel::High,
                reason,
            };
        }

        let count = usage.map_or(1, |index| index.definition_count(&func.name));
        if count > 1 {
            return RiskVerdict {
                level: RiskLevel::High,
                reason: format!(
                    "function name defined in {count} files, possible duplication"
                ),
            };
        }

        let lowered = func.name.to_lowercase();
        if let Some(pattern) = self
            .helper_patterns
            .iter()
            .find(|p| lowered.contains(p.as_str()))
        {
            return RiskVerdict {
                level: RiskLevel::Low,
                reason: format!("helper/utility naming pattern ('{pattern}')"),
            };
        }

        RiskVerdict {
            level: RiskLevel::Medium,
            reason: "core logic, used once, no external calls".to_string(),
        }
    }

    fn is_api_module(&self, module: &str) -> bool {
        let head = module.split('.').next().unwrap_or(module);
        self.api_modules
            .iter()
            .any(|m| head == m || head.starts_with(m.as_str()))
    }

    /// Rule 1: does this function touch a known networking/API module?
    ///
    /// Checks, in order: verb symbols pulled via from-imports of API modules,
    /// qualified call targets rooted at a registry entry or import alias, and
    /// finally a loose mutual-substring match between raw call names and
    /// direct-import aliases. The substring fallback over-triggers on short
    /// aliases; that looseness is a documented property of the cascade, kept
    /// as-is.
    fn api_usage(&self, func: &FunctionRecord, imports: &[ImportRecord]) -> Option<String> {
        // Bindings created by direct imports of API modules. An unaliased
        // dotted import (`import urllib.request`) binds its leading segment.
        let mut aliases: Vec<(String, String)> = Vec::new();
        // Verb names pulled via from-imports of API modules.
        let mut verb_symbols: Vec<(String, String)> = Vec::new();

        for import in imports {
            if !self.is_api_module(&import.module) {
                continue;
            }
            match import.kind {
                ImportKind::Direct => {
                    let binding = import.alias.clone().unwrap_or_else(|| {
                        import
                            .module
                            .split('.')
                            .next()
                            .unwrap_or(&import.module)
                            .to_string()
                    });
                    aliases.push((binding, import.module.clone()));
                }
                ImportKind::From => {
                    for name in &import.names {
                        if self.api_verbs.iter().any(|v| v == &name.name) {
                            let binding =
                                name.alias.clone().unwrap_or_else(|| name.name.clone());
                            verb_symbols.push((binding, import.module.clone()));
                        }
                    }
                }
            }
        }

        // Verb symbol called directly (`from requests import get; get(url)`).
        for call in &func.calls {
            if let Some((_, module)) = verb_symbols.iter().find(|(binding, _)| binding == call)
            {
                return Some(format!(
                    "external API usage: calls '{call}' imported from {module}"
                ));
            }
        }

        // Qualified target rooted at a registry entry or a collected alias.
        for target in &func.qualified_calls {
            let head = target.split('.').next().unwrap_or(target);
            let rooted = self
                .api_modules
                .iter()
                .any(|m| head == m || head.starts_with(m.as_str()))
                || aliases
                    .iter()
                    .any(|(binding, _)| head == binding || head.starts_with(binding.as_str()));
            if rooted {
                return Some(format!("external API usage: calls '{target}'"));
            }
        }

        // Loose fallback: raw call name and alias contain each other.
        for call in &func.calls {
            if let Some((binding, module)) = aliases.iter().find(|(binding, _)| {
                call.contains(binding.as_str()) || binding.contains(call.as_str())
            }) {
                return Some(format!(
                    "external API usage: call '{call}' resembles imported module {module} ('{binding}')"
                ));
            }
        }

        None
    }
}
