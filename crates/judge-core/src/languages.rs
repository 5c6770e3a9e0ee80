//! Static per-language sandbox profiles.
//!
//! The table is fixed at compile time on purpose: a language either has a
//! profile (image, file names, resource ceilings, entry-point strategies) or
//! execution for it is refused outright.

use serde::Serialize;

/// How the harness locates the callable to invoke.
///
/// Strategies are tried in the order the profile lists them; the first one
/// that resolves wins, and if none does the harness reports a
/// Compilation Error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryPoint {
    /// First declared public instance method of the named class.
    ClassMethod { class: &'static str },
    /// First declared public static method of the named class.
    StaticMethod { class: &'static str },
    /// First exported/top-level callable that is not the excluded name.
    ModuleFunction { exclude: &'static str },
}

#[derive(Debug, Clone, Serialize)]
pub struct LanguageProfile {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub image: &'static str,
    pub extension: &'static str,
    pub solution_filename: &'static str,
    pub harness_filename: &'static str,
    pub run_command: &'static [&'static str],
    pub memory_mb: u64,
    pub cpu_cores: f64,
    /// The harness's own time budget; the orchestrator adds a grace period.
    pub time_limit_ms: u64,
    pub entry_points: &'static [EntryPoint],
}

const SCRIPT_ENTRY_POINTS: &[EntryPoint] = &[
    EntryPoint::ClassMethod { class: "Solution" },
    EntryPoint::ModuleFunction { exclude: "Solution" },
];

const JVM_ENTRY_POINTS: &[EntryPoint] = &[
    EntryPoint::ClassMethod { class: "Solution" },
    EntryPoint::StaticMethod { class: "Solution" },
];

pub const DEFAULT_TIME_LIMIT_MS: u64 = 5_000;

static PROFILES: &[LanguageProfile] = &[
    LanguageProfile {
        name: "python",
        aliases: &["python3", "py"],
        image: "python:3.11-slim",
        extension: "py",
        solution_filename: "solution.py",
        harness_filename: "harness.py",
        run_command: &["python3", "-u", "harness.py"],
        memory_mb: 128,
        cpu_cores: 0.5,
        time_limit_ms: DEFAULT_TIME_LIMIT_MS,
        entry_points: SCRIPT_ENTRY_POINTS,
    },
    LanguageProfile {
        name: "javascript",
        aliases: &["js", "node", "nodejs"],
        image: "node:20-slim",
        extension: "js",
        solution_filename: "solution.js",
        harness_filename: "harness.js",
        run_command: &["node", "harness.js"],
        memory_mb: 128,
        cpu_cores: 0.5,
        time_limit_ms: DEFAULT_TIME_LIMIT_MS,
        entry_points: SCRIPT_ENTRY_POINTS,
    },
    LanguageProfile {
        name: "java",
        aliases: &[],
        image: "eclipse-temurin:17-jdk",
        extension: "java",
        solution_filename: "Solution.java",
        harness_filename: "Harness.java",
        run_command: &["java", "-XX:+UseSerialGC", "-Xss64m", "Harness.java"],
        memory_mb: 256,
        cpu_cores: 1.0,
        time_limit_ms: DEFAULT_TIME_LIMIT_MS,
        entry_points: JVM_ENTRY_POINTS,
    },
];

impl LanguageProfile {
    pub fn memory_bytes(&self) -> i64 {
        (self.memory_mb as i64) * 1024 * 1024
    }

    pub fn nano_cpus(&self) -> i64 {
        (self.cpu_cores * 1_000_000_000.0) as i64
    }

    pub fn command(&self) -> Vec<String> {
        self.run_command.iter().map(|s| s.to_string()).collect()
    }

    fn matches(&self, language: &str) -> bool {
        self.name.eq_ignore_ascii_case(language)
            || self
                .aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(language))
    }
}

/// Looks up the profile for a language name or alias, case-insensitively.
pub fn profile_for(language: &str) -> Option<&'static LanguageProfile> {
    let language = language.trim();
    PROFILES.iter().find(|p| p.matches(language))
}

pub fn all_profiles() -> &'static [LanguageProfile] {
    PROFILES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_and_alias() {
        assert_eq!(profile_for("python").map(|p| p.name), Some("python"));
        assert_eq!(profile_for("Python3").map(|p| p.name), Some("python"));
        assert_eq!(profile_for(" node ").map(|p| p.name), Some("javascript"));
        assert_eq!(profile_for("JAVA").map(|p| p.name), Some("java"));
        assert!(profile_for("cobol").is_none());
        assert!(profile_for("").is_none());
    }

    #[test]
    fn test_default_resource_ceilings() {
        let python = profile_for("python").unwrap();
        assert_eq!(python.memory_bytes(), 128 * 1024 * 1024);
        assert_eq!(python.nano_cpus(), 500_000_000);

        let java = profile_for("java").unwrap();
        assert_eq!(java.memory_mb, 256);
        assert_eq!(java.nano_cpus(), 1_000_000_000);
    }

    #[test]
    fn test_solution_filenames_follow_extension() {
        for profile in all_profiles() {
            assert!(
                profile.solution_filename.ends_with(&format!(".{}", profile.extension)),
                "{} solution file has wrong extension",
                profile.name
            );
            assert!(!profile.entry_points.is_empty());
            assert_eq!(profile.time_limit_ms, DEFAULT_TIME_LIMIT_MS);
        }
    }

    #[test]
    fn test_entry_points_serialize_tagged() {
        let json = serde_json::to_value(SCRIPT_ENTRY_POINTS).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"kind": "class_method", "class": "Solution"},
                {"kind": "module_function", "exclude": "Solution"}
            ])
        );
    }
}
