//! File loading and the feature system (`load`/`require`/`provide`).
//!
//! The evaluator never touches the filesystem for source text directly; it
//! goes through a [`SourceLoader`] so embedders can serve programs from
//! memory or an archive.

use super::builtins::{expect_max_args, expect_min_args, expect_range_args, expect_string, expect_symbol_name};
use super::error::*;
use super::eval::Evaluator;
use super::reader;
use super::value::*;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Features treated as present from the start.  Programs `require` these
/// libraries for macros and functions the runtime already provides.
pub const BUILTIN_FEATURES: &[&str] = &[
    "cl-lib",
    "cl-macs",
    "seq",
    "subr-x",
    "gamegrid",
    "outline",
    "easymenu",
    "wid-edit",
    "icons",
    "ps-print",
    "ps-print-loaddefs",
];

/// Source of program text.
pub trait SourceLoader {
    /// Contents of the file at `path`.
    fn read_source(&self, path: &Path) -> io::Result<String>;

    /// Path of the file providing `name`, searching `load_path` in order.
    fn resolve_feature(&self, name: &str, load_path: &[PathBuf]) -> Option<PathBuf>;
}

/// Loader backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

fn candidates(name: &str) -> Vec<String> {
    let mut out = Vec::new();
    if !name.ends_with(".el") {
        out.push(format!("{name}.el"));
    }
    out.push(name.to_string());
    if name.contains('-') && !name.ends_with(".el") {
        out.push(format!("{}.el", name.replace('-', "/")));
    }
    out
}

impl SourceLoader for FsLoader {
    fn read_source(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn resolve_feature(&self, name: &str, load_path: &[PathBuf]) -> Option<PathBuf> {
        let names = candidates(name);
        let path = Path::new(name);
        if path.is_absolute() {
            return names.iter().map(PathBuf::from).find(|p| p.is_file());
        }
        load_path
            .iter()
            .flat_map(|dir| names.iter().map(move |n| dir.join(n)))
            .find(|p| p.is_file())
    }
}

impl Evaluator {
    /// Directories named by the Lisp `load-path`; nil entries mean the
    /// default directory.
    pub(crate) fn load_path(&self) -> Vec<PathBuf> {
        let default_dir = match self.globals.get("default-directory") {
            Some(Value::Str(dir)) => PathBuf::from(&**dir),
            _ => PathBuf::from("."),
        };
        let value = self.globals.get("load-path").cloned().unwrap_or(Value::Nil);
        value
            .iter()
            .filter_map(|entry| match entry {
                Value::Nil => Some(default_dir.clone()),
                Value::Str(dir) => Some(PathBuf::from(&*dir)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn has_feature(&self, name: &str) -> bool {
        self.features.iter().any(|f| f == name)
    }

    pub(crate) fn provide(&mut self, name: &str) {
        if !self.has_feature(name) {
            self.features.push(name.to_string());
        }
    }

    /// Preprocess, read and evaluate the file at `path`.  Returns `t`.
    #[tracing::instrument(level = "debug", skip(self), fields(path = %path.display()))]
    pub fn load_file(&mut self, path: &Path) -> Result<Value, EvalError> {
        let source = self
            .loader
            .read_source(path)
            .map_err(|_| EvalError::from(missing_file("Cannot open load file", path)))?;
        let forms = reader::read_source(&source)?;
        self.eval_loaded(path, &forms).map_err(EvalError::from)
    }

    /// `load` from Lisp: failures become signals.
    pub(crate) fn load_file_flow(&mut self, path: &Path) -> EvalResult {
        let source = self
            .loader
            .read_source(path)
            .map_err(|_| missing_file("Cannot open load file", path))?;
        let forms = reader::read_source(&source).map_err(|err| {
            signal(
                "invalid-read-syntax",
                vec![
                    Value::string(err.to_string()),
                    Value::string(path.to_string_lossy().into_owned()),
                ],
            )
        })?;
        self.eval_loaded(path, &forms)
    }

    fn eval_loaded(&mut self, path: &Path, forms: &[Value]) -> EvalResult {
        tracing::debug!(forms = forms.len(), "loading");
        let file_name = Value::string(path.to_string_lossy().into_owned());
        self.with_dynamic(vec![("load-file-name".to_string(), file_name)], |ev| {
            for form in forms {
                ev.eval_toplevel(form)?;
            }
            Ok(Value::True)
        })
    }

    /// Load the file providing `feature` unless it is present or already
    /// being loaded.
    fn require(&mut self, feature: &str, file: Option<&str>, noerror: bool) -> EvalResult {
        if self.has_feature(feature) || self.loading.iter().any(|f| f == feature) {
            return Ok(Value::symbol(feature));
        }
        let load_path = self.load_path();
        let found = self
            .loader
            .resolve_feature(file.unwrap_or(feature), &load_path);
        let Some(path) = found else {
            if noerror {
                return Ok(Value::Nil);
            }
            if self.config.require_shim {
                self.warn_once(
                    &format!("require-missing-{feature}"),
                    &format!("require: no file provides `{feature}'; treating it as loaded"),
                );
                self.provide(feature);
                return Ok(Value::symbol(feature));
            }
            return Err(signal(
                "file-missing",
                vec![
                    Value::string("Cannot open load file"),
                    Value::string("No such file or directory"),
                    Value::string(feature),
                ],
            ));
        };
        self.loading.push(feature.to_string());
        let result = self.load_file_flow(&path);
        self.loading.retain(|f| f != feature);
        result?;
        self.provide(feature);
        Ok(Value::symbol(feature))
    }
}

fn missing_file(operation: &str, path: &Path) -> Flow {
    signal(
        "file-missing",
        vec![
            Value::string(operation),
            Value::string("No such file or directory"),
            Value::string(path.to_string_lossy().into_owned()),
        ],
    )
}

/// `(load FILE &optional NOERROR NOMESSAGE NOSUFFIX MUST-SUFFIX)`.
pub(crate) fn builtin_load(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("load", &args, 1, 5)?;
    let name = expect_string(&args[0])?;
    let noerror = args.get(1).is_some_and(Value::is_truthy);
    let load_path = eval.load_path();
    match eval.loader.resolve_feature(&name, &load_path) {
        Some(path) => eval.load_file_flow(&path),
        None if noerror => Ok(Value::Nil),
        None => Err(missing_file("Cannot open load file", Path::new(&name))),
    }
}

/// `(require FEATURE &optional FILENAME NOERROR)`.
pub(crate) fn builtin_require(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("require", &args, 1, 3)?;
    let feature = expect_symbol_name(&args[0])?;
    let file = match args.get(1) {
        None | Some(Value::Nil) => None,
        Some(v) => Some(expect_string(v)?),
    };
    let noerror = args.get(2).is_some_and(Value::is_truthy);
    eval.require(&feature, file.as_deref(), noerror)
}

/// `(provide FEATURE &optional SUBFEATURES)`.
pub(crate) fn builtin_provide(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("provide", &args, 1)?;
    expect_max_args("provide", &args, 2)?;
    let feature = expect_symbol_name(&args[0])?;
    eval.provide(&feature);
    Ok(args[0].clone())
}

pub(crate) fn builtin_featurep(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("featurep", &args, 1, 2)?;
    let feature = expect_symbol_name(&args[0])?;
    Ok(Value::bool(eval.has_feature(&feature)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    fn evaluator_in(dir: &Path, shim: bool) -> Evaluator {
        Evaluator::with_config(RuntimeConfig {
            load_path: vec![dir.to_path_buf()],
            require_shim: shim,
            ..RuntimeConfig::default()
        })
    }

    #[test]
    fn fs_loader_tries_suffixed_then_bare_then_slashed() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("snake")).unwrap();
        fs::write(dir.path().join("snake/board.el"), "").unwrap();
        fs::write(dir.path().join("tetris"), "").unwrap();
        let path = vec![dir.path().to_path_buf()];
        assert_eq!(
            FsLoader.resolve_feature("snake-board", &path),
            Some(dir.path().join("snake/board.el"))
        );
        assert_eq!(
            FsLoader.resolve_feature("tetris", &path),
            Some(dir.path().join("tetris"))
        );
        fs::write(dir.path().join("tetris.el"), "").unwrap();
        assert_eq!(
            FsLoader.resolve_feature("tetris", &path),
            Some(dir.path().join("tetris.el"))
        );
        assert_eq!(FsLoader.resolve_feature("pong", &path), None);
    }

    #[test]
    fn require_loads_once_and_provides() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("counter.el"),
            "(setq loads (1+ (if (boundp 'loads) loads 0))) (provide 'counter)",
        )
        .unwrap();
        let mut ev = evaluator_in(dir.path(), false);
        let out = ev
            .eval_str("(require 'counter) (require 'counter) (list loads (featurep 'counter))")
            .unwrap();
        assert_eq!(out.to_string(), "(1 t)");
    }

    #[test]
    fn mutual_requires_terminate() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ping.el"), "(require 'pong) (defun ping () 'ping)").unwrap();
        fs::write(dir.path().join("pong.el"), "(require 'ping) (defun pong () 'pong)").unwrap();
        let mut ev = evaluator_in(dir.path(), false);
        let out = ev.eval_str("(require 'ping) (list (ping) (pong))").unwrap();
        assert_eq!(out.to_string(), "(ping pong)");
    }

    #[test]
    fn missing_feature_with_and_without_shim() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        let dir = tempfile::tempdir().unwrap();
        let mut shimmed = evaluator_in(dir.path(), true);
        assert_eq!(
            shimmed.eval_str("(require 'no-such-lib)").unwrap(),
            Value::symbol("no-such-lib")
        );
        assert_eq!(shimmed.eval_str("(featurep 'no-such-lib)").unwrap(), Value::True);

        let mut strict = evaluator_in(dir.path(), false);
        assert_eq!(strict.eval_str("(require 'no-such-lib nil t)").unwrap(), Value::Nil);
        match strict.eval_str("(require 'no-such-lib)") {
            Err(EvalError::Signal { symbol, .. }) => assert_eq!(symbol, "file-missing"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn builtin_features_are_present() {
        let mut ev = Evaluator::new();
        assert_eq!(ev.eval_str("(featurep 'cl-lib)").unwrap(), Value::True);
        assert_eq!(ev.eval_str("(require 'gamegrid)").unwrap(), Value::symbol("gamegrid"));
    }

    #[test]
    fn load_file_binds_load_file_name_and_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.el");
        fs::write(&good, "(setq seen load-file-name)").unwrap();
        let mut ev = evaluator_in(dir.path(), false);
        assert_eq!(ev.load_file(&good).unwrap(), Value::True);
        assert_eq!(
            ev.global_value("seen"),
            Some(Value::string(good.to_string_lossy().into_owned()))
        );
        assert_eq!(ev.eval_str("(load \"good\")").unwrap(), Value::True);
        assert_eq!(ev.eval_str("(load \"absent\" t)").unwrap(), Value::Nil);

        let bad = dir.path().join("bad.el");
        fs::write(&bad, "(vector [1 2)").unwrap();
        assert!(matches!(ev.load_file(&bad), Err(EvalError::Parse(_))));
        assert!(matches!(
            ev.load_file(&dir.path().join("gone.el")),
            Err(EvalError::Signal { .. })
        ));
    }
}
