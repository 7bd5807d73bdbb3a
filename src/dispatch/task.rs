//! Worker task definition and instruction rendering.
//!
//! Instruction templates are externally supplied text under
//! `.workflow/tasks/<role>.md` with `{{placeholder}}` substitution. The
//! completion instruction appended to every rendering names the exact marker
//! file the worker must create; that marker is the only thing the
//! orchestrator ever observes about the worker.

use crate::config::WorkflowConfig;
use crate::errors::DispatchError;
use crate::layout::WorkflowLayout;
use tracing::warn;

/// One unit of dispatchable work.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerTask {
    pub role: String,
    /// Advisory path globs the role should confine itself to. Not enforced:
    /// there is no sandboxing, only instruction text.
    pub scope: Vec<String>,
    pub instruction_body: String,
    pub completion_signal: String,
    /// Enabled review checks, substituted into the reviewer's template.
    pub review_checks: Vec<String>,
}

impl WorkerTask {
    /// Build a task for a role from its on-disk template.
    ///
    /// `completion_signal` distinguishes an implementation round (`role`)
    /// from a refine round (`role-refine`); the template is the same.
    pub fn from_template(
        layout: &WorkflowLayout,
        config: &WorkflowConfig,
        role: &str,
        completion_signal: &str,
    ) -> Result<Self, DispatchError> {
        let path = layout.task_file(role);
        let instruction_body =
            std::fs::read_to_string(&path).map_err(|_| DispatchError::TemplateMissing {
                role: role.to_string(),
                path: path.clone(),
            })?;

        let scope = config
            .scopes
            .get(role)
            .cloned()
            .unwrap_or_else(|| vec!["**/*".to_string()]);
        for pattern in &scope {
            if glob::Pattern::new(pattern).is_err() {
                warn!(role, pattern = pattern.as_str(), "scope glob does not parse; kept as advisory text");
            }
        }

        let review_checks = config
            .review_checks
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.clone())
            .collect();

        Ok(Self {
            role: role.to_string(),
            scope,
            instruction_body,
            completion_signal: completion_signal.to_string(),
            review_checks,
        })
    }

    /// Render the full instruction delivered to the destination.
    pub fn render(&self, layout: &WorkflowLayout) -> String {
        let signal_path = layout
            .signals_dir()
            .join(format!("{}.done", self.completion_signal));
        let checks = if self.review_checks.is_empty() {
            "(none configured)".to_string()
        } else {
            self.review_checks.join(", ")
        };
        let body = substitute(
            &self.instruction_body,
            &[
                ("role", self.role.as_str()),
                ("scope", &self.scope.join(", ")),
                ("signal", self.completion_signal.as_str()),
                ("signal_path", &signal_path.display().to_string()),
                (
                    "contracts_dir",
                    &layout.contracts_dir().display().to_string(),
                ),
                ("review_checks", &checks),
            ],
        );

        format!(
            "{}\n\n## Completion\n\nWhen every task above is done, signal completion by creating an \
             empty marker file (and nothing else):\n\n    touch {}\n",
            body.trim_end(),
            signal_path.display()
        )
    }
}

/// Pure `{{key}}` substitution. Unknown placeholders are left intact so a
/// template typo stays visible in the delivered instruction instead of
/// silently vanishing.
fn substitute(template: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in pairs {
        out = out.replace(&format!("{{{{{}}}}}", key), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowConfig;
    use crate::layout::WorkflowLayout;
    use tempfile::tempdir;

    fn setup() -> (WorkflowLayout, WorkflowConfig, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let layout = WorkflowLayout::new(dir.path());
        let config = WorkflowConfig::default();
        layout.scaffold(&config).unwrap();
        (layout, config, dir)
    }

    #[test]
    fn test_substitute_replaces_known_placeholders() {
        let out = substitute("role={{role}} scope={{scope}}", &[("role", "backend"), ("scope", "src/**")]);
        assert_eq!(out, "role=backend scope=src/**");
    }

    #[test]
    fn test_substitute_leaves_unknown_placeholders() {
        let out = substitute("{{role}} {{mystery}}", &[("role", "backend")]);
        assert_eq!(out, "backend {{mystery}}");
    }

    #[test]
    fn test_from_template_reads_role_file() {
        let (layout, config, _dir) = setup();
        std::fs::write(layout.task_file("backend"), "Build the {{role}} API.").unwrap();

        let task = WorkerTask::from_template(&layout, &config, "backend", "backend").unwrap();
        assert_eq!(task.role, "backend");
        assert_eq!(task.completion_signal, "backend");
        assert_eq!(task.scope, vec!["**/*"]);
    }

    #[test]
    fn test_from_template_missing_is_an_error() {
        let (layout, config, _dir) = setup();
        let result = WorkerTask::from_template(&layout, &config, "nonexistent", "nonexistent");
        assert!(matches!(
            result,
            Err(DispatchError::TemplateMissing { .. })
        ));
    }

    #[test]
    fn test_from_template_uses_configured_scope() {
        let (layout, mut config, _dir) = setup();
        config
            .scopes
            .insert("backend".into(), vec!["src/api/**".into(), "migrations/**".into()]);

        let task = WorkerTask::from_template(&layout, &config, "backend", "backend").unwrap();
        assert_eq!(task.scope, vec!["src/api/**", "migrations/**"]);
    }

    #[test]
    fn test_render_appends_completion_instruction() {
        let (layout, config, _dir) = setup();
        std::fs::write(
            layout.task_file("backend"),
            "You are {{role}}. Stay within {{scope}}.",
        )
        .unwrap();

        let task = WorkerTask::from_template(&layout, &config, "backend", "backend-refine").unwrap();
        let rendered = task.render(&layout);

        assert!(rendered.contains("You are backend."));
        assert!(rendered.contains("Stay within **/*."));
        assert!(rendered.contains("## Completion"));
        assert!(rendered.contains("backend-refine.done"));
        // The marker path names the signals directory exactly.
        assert!(rendered.contains(&layout.signals_dir().display().to_string()));
    }

    #[test]
    fn test_render_substitutes_enabled_review_checks() {
        let (layout, mut config, _dir) = setup();
        config.review_checks.insert("lint".into(), true);
        config.review_checks.insert("coverage".into(), false);
        config.review_checks.insert("types".into(), true);

        let task = WorkerTask::from_template(&layout, &config, "review", "review").unwrap();
        let rendered = task.render(&layout);
        assert!(rendered.contains("Required checks: lint, types"));
        assert!(!rendered.contains("coverage"));
    }

    #[test]
    fn test_render_review_checks_placeholder_when_none() {
        let (layout, config, _dir) = setup();
        let task = WorkerTask::from_template(&layout, &config, "review", "review").unwrap();
        let rendered = task.render(&layout);
        assert!(rendered.contains("Required checks: (none configured)"));
    }

    #[test]
    fn test_render_substitutes_signal_and_contracts() {
        let (layout, config, _dir) = setup();
        std::fs::write(
            layout.task_file("tests"),
            "Marker: {{signal}} at {{signal_path}}; contracts in {{contracts_dir}}",
        )
        .unwrap();

        let task = WorkerTask::from_template(&layout, &config, "tests", "tests").unwrap();
        let rendered = task.render(&layout);
        assert!(rendered.contains("Marker: tests at "));
        assert!(rendered.contains("contracts"));
        assert!(!rendered.contains("{{signal}}"));
    }
}
