use std::path::PathBuf;
use tracing::debug;

/// Loads supplementary guidance selected by plan rule keys
#[derive(Debug, Clone, Default)]
pub struct GuidanceLoader {
    dir: Option<PathBuf>,
}

impl GuidanceLoader {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    /// `(key, content)` for every rule key with a `<dir>/<key>.md` file
    pub fn load(&self, rule_keys: &[String]) -> Vec<(String, String)> {
        let Some(dir) = &self.dir else {
            return Vec::new();
        };
        rule_keys
            .iter()
            .filter_map(|key| {
                let path = dir.join(format!("{}.md", key));
                match std::fs::read_to_string(&path) {
                    Ok(content) if !content.trim().is_empty() => {
                        Some((key.clone(), content.trim().to_string()))
                    }
                    _ => {
                        debug!("No guidance for rule key '{}'", key);
                        None
                    }
                }
            })
            .collect()
    }

    /// Guidance as prompt sections, empty when nothing matched
    pub fn render(&self, rule_keys: &[String]) -> String {
        self.load(rule_keys)
            .into_iter()
            .map(|(key, content)| format!("## Guidance: {}\n\n{}\n", key, content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
