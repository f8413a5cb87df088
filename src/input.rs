use std::path::PathBuf;

use crate::compare::DiffStyle;
use crate::document::{AppId, ApplicationSpec};
use crate::error::ConvergeError;
use crate::reconciler::{Goal, Invocation, Target};

/// Where the desired definition comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesiredSource {
    File(PathBuf),
    Inline(String),
}

impl DesiredSource {
    pub fn load(&self) -> Result<ApplicationSpec, ConvergeError> {
        match self {
            DesiredSource::File(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    ConvergeError::Input(format!("reading app definition '{}': {e}", path.display()))
                })?;
                ApplicationSpec::parse(&raw)
            }
            DesiredSource::Inline(raw) => ApplicationSpec::parse(raw),
        }
    }
}

/// Raw invocation parameters, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Params {
    pub goal: Goal,
    pub app_json: Option<PathBuf>,
    pub app: Option<String>,
    pub app_id: Option<String>,
    pub force: bool,
    pub diff_style: DiffStyle,
}

impl Params {
    pub fn new(goal: Goal) -> Self {
        Self {
            goal,
            app_json: None,
            app: None,
            app_id: None,
            force: false,
            diff_style: DiffStyle::default(),
        }
    }

    /// Validate the parameter combination and load the desired definition.
    /// Runs entirely before any scheduler call. Empty values count as not
    /// supplied.
    pub fn into_invocation(self) -> Result<Invocation, ConvergeError> {
        let goal = self.goal;
        if self.force && !matches!(goal, Goal::Absent | Goal::Updated) {
            return Err(ConvergeError::Input(format!(
                "force only applies to goals 'absent' and 'updated', not '{goal}'"
            )));
        }

        let app_json = self.app_json.filter(|path| !path.as_os_str().is_empty());
        let app = self.app.filter(|raw| !raw.trim().is_empty());
        let app_id = self.app_id.filter(|id| !id.trim().is_empty());

        let source = match (app_json, app) {
            (Some(_), Some(_)) => {
                return Err(ConvergeError::Input(
                    "app_json and app are mutually exclusive".to_string(),
                ))
            }
            (Some(path), None) => Some(DesiredSource::File(path)),
            (None, Some(raw)) => Some(DesiredSource::Inline(raw)),
            (None, None) => None,
        };

        let target = match (source, app_id) {
            (Some(_), Some(_)) => {
                return Err(ConvergeError::Input(
                    "supply either an app definition or app_id, not both".to_string(),
                ))
            }
            (Some(source), None) => Target::Spec(source.load()?),
            (None, Some(id)) => {
                if !matches!(goal, Goal::Get | Goal::Absent) {
                    return Err(ConvergeError::Input(format!(
                        "app_id only works with goals 'get' and 'absent', not '{goal}'"
                    )));
                }
                Target::Id(AppId::new(&id)?)
            }
            (None, None) => {
                return Err(ConvergeError::Input(
                    "one of app_json, app or app_id is required".to_string(),
                ))
            }
        };

        Ok(Invocation {
            goal,
            target,
            force: self.force,
            diff_style: self.diff_style,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn inline(goal: Goal, raw: &str) -> Params {
        Params {
            app: Some(raw.to_string()),
            ..Params::new(goal)
        }
    }

    #[test]
    fn inline_definition_becomes_spec_target() {
        let inv = inline(Goal::Present, r#"{"id": "/web", "instances": 1}"#)
            .into_invocation()
            .unwrap();
        assert_eq!(inv.goal, Goal::Present);
        assert_eq!(inv.target.id().as_str(), "/web");
        assert!(matches!(inv.target, Target::Spec(_)));
    }

    #[test]
    fn file_definition_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"id": "api", "cpus": 0.5}}"#).unwrap();
        let params = Params {
            app_json: Some(file.path().to_path_buf()),
            ..Params::new(Goal::Updated)
        };
        let inv = params.into_invocation().unwrap();
        match inv.target {
            Target::Spec(spec) => assert_eq!(spec.document()["cpus"], 0.5),
            Target::Id(_) => panic!("expected Spec"),
        }
    }

    #[test]
    fn missing_file_is_input_error() {
        let params = Params {
            app_json: Some(PathBuf::from("/nonexistent/app.json")),
            ..Params::new(Goal::Present)
        };
        let err = params.into_invocation().unwrap_err();
        assert!(err.to_string().contains("reading app definition"), "got: {err}");
    }

    #[test]
    fn nothing_supplied_rejected() {
        let err = Params::new(Goal::Get).into_invocation().unwrap_err();
        assert!(matches!(err, ConvergeError::Input(_)), "got: {err}");
    }

    #[test]
    fn definition_and_app_id_rejected() {
        let params = Params {
            app_id: Some("web".to_string()),
            ..inline(Goal::Absent, r#"{"id": "web"}"#)
        };
        let err = params.into_invocation().unwrap_err();
        assert!(err.to_string().contains("not both"), "got: {err}");
    }

    #[test]
    fn both_definition_sources_rejected() {
        let params = Params {
            app_json: Some(PathBuf::from("app.json")),
            ..inline(Goal::Present, r#"{"id": "web"}"#)
        };
        let err = params.into_invocation().unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"), "got: {err}");
    }

    #[test]
    fn app_id_allowed_for_get_and_absent() {
        for goal in [Goal::Get, Goal::Absent] {
            let params = Params {
                app_id: Some("/web".to_string()),
                ..Params::new(goal)
            };
            let inv = params.into_invocation().unwrap();
            assert_eq!(inv.target, Target::Id(AppId::new("/web").unwrap()));
        }
    }

    #[test]
    fn empty_definition_values_count_as_absent() {
        let params = Params {
            app_id: Some("nginx".to_string()),
            app_json: Some(PathBuf::new()),
            app: Some(String::new()),
            ..Params::new(Goal::Get)
        };
        let inv = params.into_invocation().unwrap();
        assert_eq!(inv.target, Target::Id(AppId::new("nginx").unwrap()));
    }

    #[test]
    fn diff_style_carried_into_invocation() {
        let params = Params {
            diff_style: DiffStyle::Compact,
            ..inline(Goal::Diff, r#"{"id": "web"}"#)
        };
        assert_eq!(params.into_invocation().unwrap().diff_style, DiffStyle::Compact);
    }

    #[test]
    fn app_id_rejected_for_updated() {
        let params = Params {
            app_id: Some("web".to_string()),
            ..Params::new(Goal::Updated)
        };
        let err = params.into_invocation().unwrap_err();
        assert!(err.to_string().contains("app_id only works"), "got: {err}");
    }

    #[test]
    fn force_rejected_for_present() {
        let params = Params {
            force: true,
            ..inline(Goal::Present, r#"{"id": "web"}"#)
        };
        let err = params.into_invocation().unwrap_err();
        assert!(err.to_string().contains("force only applies"), "got: {err}");
    }

    #[test]
    fn force_allowed_for_absent() {
        let params = Params {
            force: true,
            app_id: Some("web".to_string()),
            ..Params::new(Goal::Absent)
        };
        assert!(params.into_invocation().unwrap().force);
    }
}
