//! Manifest to document conversion

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ConfigError, DocumentError, Result};
use crate::interpreter::InterpreterTable;
use crate::model::{Document, DocumentBuilder, Rule, RuleContainer, RuleGroup, Script, Task};

use super::types::{Manifest, RequireManifest, SkipManifest, TaskManifest};

/// Build a validated document from a manifest.
///
/// `base_dir` is the manifest's directory and must be absolute. The
/// document root is `base_dir`, or the manifest's `root` resolved against
/// it. Every script language has to resolve through `interpreters`.
pub fn build_document(
    manifest: &Manifest,
    base_dir: &Path,
    interpreters: &InterpreterTable,
) -> Result<Document> {
    let root_dir = match &manifest.root {
        Some(root) => base_dir.join(root),
        None => base_dir.to_path_buf(),
    };

    let mut env = BTreeMap::new();
    load_dotenv(&root_dir, &manifest.dotenv, &mut env)?;
    env.extend(manifest.env.clone());

    let mut builder = DocumentBuilder::new(&root_dir)?
        .title(manifest.title.clone())
        .description(manifest.description.clone());

    for (key, value) in env {
        builder = builder.env(key, value);
    }

    for (call, task) in &manifest.tasks {
        builder.add_task(build_task(call, task, &root_dir, interpreters)?)?;
    }

    Ok(builder.build()?)
}

/// Read dotenv files into `env`; later files win. Missing files are skipped.
fn load_dotenv(
    root_dir: &Path,
    files: &[PathBuf],
    env: &mut BTreeMap<String, String>,
) -> Result<()> {
    for file in files {
        let path = root_dir.join(file);
        let entries = match dotenvy::from_path_iter(&path) {
            Ok(entries) => entries,
            Err(e) if e.not_found() => {
                warn!(path = %path.display(), "dotenv file not found");
                continue;
            }
            Err(e) => return Err(dotenv_error(&path, e)),
        };

        for entry in entries {
            let (key, value) = entry.map_err(|e| dotenv_error(&path, e))?;
            env.insert(key, value);
        }
        debug!(path = %path.display(), "dotenv file loaded");
    }
    Ok(())
}

fn dotenv_error(path: &Path, error: dotenvy::Error) -> crate::error::CoreError {
    ConfigError::Dotenv {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
    .into()
}

fn build_task(
    call: &str,
    manifest: &TaskManifest,
    root_dir: &Path,
    interpreters: &InterpreterTable,
) -> Result<Task> {
    let mut task = Task::new(call)
        .with_title(manifest.title.clone())
        .with_description(manifest.description.clone())
        .with_skip(skip_group(&manifest.skip))
        .with_require(require_group(&manifest.require));

    load_dotenv(root_dir, &manifest.dotenv, &mut task.env)?;
    task.env.extend(manifest.env.clone());
    task.depends = manifest.depends.clone();

    for script in &manifest.scripts {
        let exec = interpreters.resolve(&script.lang).ok_or_else(|| {
            DocumentError::UnresolvedInterpreter {
                task: call.to_string(),
                lang: script.lang.clone(),
            }
        })?;

        let mut resolved = Script::new(exec.exec_path.clone(), script.run.clone())
            .with_args(exec.args.clone());
        resolved.cmd_flag = exec.cmd_flag.clone();
        task = task.with_script(resolved);
    }

    debug!(task = %call, scripts = task.scripts.len(), "task assembled");
    Ok(task)
}

fn skip_group(containers: &[SkipManifest]) -> RuleGroup {
    containers
        .iter()
        .map(|manifest| {
            let container = manifest
                .exists
                .iter()
                .fold(RuleContainer::new(), |c, pattern| c.with_exists(pattern.clone()));
            manifest.unchanged.iter().fold(container, |c, unchanged| {
                c.with_unchanged(unchanged.paths.iter().cloned(), unchanged.ignores.iter().cloned())
            })
        })
        .fold(RuleGroup::new(), RuleGroup::with_container)
}

fn require_group(containers: &[RequireManifest]) -> RuleGroup {
    containers
        .iter()
        .map(|manifest| {
            manifest
                .exists
                .iter()
                .map(|pattern| Rule::FileExists {
                    patterns: vec![pattern.clone()],
                })
                .fold(RuleContainer::new(), RuleContainer::with_rule)
        })
        .fold(RuleGroup::new(), RuleGroup::with_container)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{ScriptManifest, UnchangedManifest};
    use crate::error::CoreError;
    use crate::interpreter::ExecConfig;
    use tempfile::TempDir;

    fn interpreters() -> InterpreterTable {
        let mut table = InterpreterTable::empty();
        table.insert(
            "sh",
            ExecConfig {
                exec_path: PathBuf::from("/bin/sh"),
                cmd_flag: Some("-c".to_string()),
                args: Vec::new(),
            },
        );
        table
    }

    fn script(lang: &str, run: &str) -> ScriptManifest {
        ScriptManifest {
            lang: lang.to_string(),
            run: run.to_string(),
        }
    }

    #[test]
    fn test_build_document() {
        let mut manifest = Manifest {
            title: "demo".to_string(),
            ..Default::default()
        };
        manifest.env.insert("A".to_string(), "1".to_string());
        manifest.tasks.insert(
            "build".to_string(),
            TaskManifest {
                depends: vec!["lint".to_string()],
                scripts: vec![script("sh", "make")],
                skip: vec![SkipManifest {
                    exists: vec!["out/bin".to_string()],
                    unchanged: vec![UnchangedManifest {
                        paths: vec!["src/**".to_string()],
                        ignores: vec!["src/gen/**".to_string()],
                    }],
                }],
                require: vec![RequireManifest {
                    exists: vec!["Makefile".to_string()],
                }],
                ..Default::default()
            },
        );
        manifest.tasks.insert(
            "lint".to_string(),
            TaskManifest {
                scripts: vec![script("SH", "true")],
                ..Default::default()
            },
        );

        let doc = build_document(&manifest, &std::env::temp_dir(), &interpreters()).unwrap();
        assert_eq!(doc.title(), "demo");
        assert_eq!(doc.env()["A"], "1");

        let build = doc.task("build").unwrap();
        assert_eq!(build.scripts[0].command_args(), vec!["-c", "make"]);
        assert_eq!(build.skip.containers.len(), 1);
        assert_eq!(build.skip.containers[0].rules.len(), 2);
        assert_eq!(build.skip.content_rules().count(), 1);
        assert_eq!(build.require.containers[0].rules.len(), 1);
    }

    #[test]
    fn test_unresolved_interpreter() {
        let mut manifest = Manifest::default();
        manifest.tasks.insert(
            "deploy".to_string(),
            TaskManifest {
                scripts: vec![script("ruby", "puts 1")],
                ..Default::default()
            },
        );

        let err = build_document(&manifest, &std::env::temp_dir(), &interpreters()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Document(DocumentError::UnresolvedInterpreter { ref lang, .. }) if lang == "ruby"
        ));
    }

    #[test]
    fn test_cycle_surfaces_as_document_error() {
        let mut manifest = Manifest::default();
        for (call, dep) in [("A", "B"), ("B", "A")] {
            manifest.tasks.insert(
                call.to_string(),
                TaskManifest {
                    depends: vec![dep.to_string()],
                    ..Default::default()
                },
            );
        }

        let err = build_document(&manifest, &std::env::temp_dir(), &interpreters()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Document(DocumentError::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_dotenv_precedence() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env"), "A=from-dotenv\nB=from-dotenv\n").unwrap();
        std::fs::write(dir.path().join("task.env"), "C=task-dotenv\nD=task-dotenv\n").unwrap();

        let mut manifest = Manifest {
            dotenv: vec![PathBuf::from(".env"), PathBuf::from("missing.env")],
            ..Default::default()
        };
        manifest.env.insert("B".to_string(), "explicit".to_string());
        let mut task = TaskManifest {
            dotenv: vec![PathBuf::from("task.env")],
            ..Default::default()
        };
        task.env.insert("D".to_string(), "task-explicit".to_string());
        manifest.tasks.insert("build".to_string(), task);

        let doc = build_document(&manifest, dir.path(), &interpreters()).unwrap();
        assert_eq!(doc.env()["A"], "from-dotenv");
        assert_eq!(doc.env()["B"], "explicit");

        let env = doc.effective_env(doc.task("build").unwrap());
        assert_eq!(env["A"], "from-dotenv");
        assert_eq!(env["C"], "task-dotenv");
        assert_eq!(env["D"], "task-explicit");
    }

    #[test]
    fn test_malformed_dotenv_is_config_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env"), "NOT VALID LINE\n").unwrap();
        let manifest = Manifest {
            dotenv: vec![PathBuf::from(".env")],
            ..Default::default()
        };

        let err = build_document(&manifest, dir.path(), &interpreters()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Config(ConfigError::Dotenv { .. })
        ));
    }

    #[test]
    fn test_root_override() {
        let manifest = Manifest {
            root: Some(PathBuf::from("sub")),
            ..Default::default()
        };
        let base = std::env::temp_dir();
        let doc = build_document(&manifest, &base, &interpreters()).unwrap();
        assert_eq!(doc.root_dir(), base.join("sub"));
    }
}
