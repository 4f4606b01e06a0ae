//! File-name manipulation and the few filesystem queries programs make
//! (score files, optional helpers on `PATH`).

use super::*;

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(|| PathBuf::from("/"), PathBuf::from)
}

fn default_directory(eval: &Evaluator) -> PathBuf {
    match eval.globals.get("default-directory") {
        Some(Value::Str(dir)) => PathBuf::from(&**dir),
        _ => env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
    }
}

/// Resolve `.` and `..` lexically, without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn expand_tilde(name: &str) -> PathBuf {
    match name.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            home_dir().join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(name),
    }
}

pub(crate) fn expand_file_name(eval: &Evaluator, name: &str, dir: Option<&str>) -> PathBuf {
    let path = expand_tilde(name);
    if path.is_absolute() {
        return normalize(&path);
    }
    let base = dir.map_or_else(|| default_directory(eval), expand_tilde);
    normalize(&base.join(path))
}

fn path_string(path: &Path) -> Value {
    Value::string(path.to_string_lossy().into_owned())
}

fn file_missing(operation: &str, file: &str) -> Flow {
    signal(
        "file-missing",
        vec![
            Value::string(operation),
            Value::string("No such file or directory"),
            Value::string(file),
        ],
    )
}

pub(crate) fn builtin_expand_file_name(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("expand-file-name", &args, 1, 2)?;
    let name = expect_string(&args[0])?;
    let dir = match args.get(1) {
        None | Some(Value::Nil) => None,
        Some(v) => Some(expect_string(v)?),
    };
    Ok(path_string(&expand_file_name(eval, &name, dir.as_deref())))
}

/// Replace `$VAR` and `${VAR}` with environment values; `$$` is a dollar.
pub(crate) fn substitute_in_file_name(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(at) = rest.find('$') {
        out.push_str(&rest[..at]);
        let after = &rest[at + 1..];
        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
            continue;
        }
        let (name, tail) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(close) => (&braced[..close], &braced[close + 1..]),
                None => ("", after),
            },
            None => {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                (&after[..end], &after[end..])
            }
        };
        if name.is_empty() {
            out.push('$');
        } else {
            out.push_str(&env::var(name).unwrap_or_default());
        }
        rest = tail;
    }
    out.push_str(rest);
    out
}

pub(crate) fn builtin_substitute_in_file_name(args: Vec<Value>) -> EvalResult {
    expect_args("substitute-in-file-name", &args, 1)?;
    Ok(Value::string(substitute_in_file_name(&expect_string(&args[0])?)))
}

pub(crate) fn builtin_file_name_directory(args: Vec<Value>) -> EvalResult {
    expect_args("file-name-directory", &args, 1)?;
    let name = expect_string(&args[0])?;
    Ok(match name.rfind('/') {
        Some(slash) => Value::string(&name[..=slash]),
        None => Value::Nil,
    })
}

pub(crate) fn builtin_file_name_nondirectory(args: Vec<Value>) -> EvalResult {
    expect_args("file-name-nondirectory", &args, 1)?;
    let name = expect_string(&args[0])?;
    Ok(Value::string(name.rsplit('/').next().unwrap_or_default()))
}

pub(crate) fn builtin_file_name_as_directory(args: Vec<Value>) -> EvalResult {
    expect_args("file-name-as-directory", &args, 1)?;
    let name = expect_string(&args[0])?;
    Ok(Value::string(if name.ends_with('/') {
        name
    } else {
        format!("{name}/")
    }))
}

pub(crate) fn builtin_locate_user_emacs_file(args: Vec<Value>) -> EvalResult {
    expect_range_args("locate-user-emacs-file", &args, 1, 2)?;
    let name = expect_string(&args[0])?;
    Ok(path_string(&home_dir().join(".emacs.d").join(name)))
}

fn expanded_arg(eval: &Evaluator, value: &Value) -> Result<PathBuf, Flow> {
    Ok(expand_file_name(eval, &expect_string(value)?, None))
}

pub(crate) fn builtin_file_exists_p(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("file-exists-p", &args, 1)?;
    Ok(Value::bool(expanded_arg(eval, &args[0])?.exists()))
}

pub(crate) fn builtin_file_readable_p(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("file-readable-p", &args, 1)?;
    let path = expanded_arg(eval, &args[0])?;
    Ok(Value::bool(fs::metadata(path).is_ok()))
}

pub(crate) fn builtin_file_directory_p(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("file-directory-p", &args, 1)?;
    Ok(Value::bool(expanded_arg(eval, &args[0])?.is_dir()))
}

/// A short `file-attributes` list: type, links, uid, gid, atime, mtime,
/// ctime, size.  Times are `(HIGH LOW)` pairs.
pub(crate) fn builtin_file_attributes(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("file-attributes", &args, 1, 2)?;
    let path = expanded_arg(eval, &args[0])?;
    let Ok(meta) = fs::metadata(&path) else {
        return Ok(Value::Nil);
    };
    let time = |t: std::io::Result<std::time::SystemTime>| {
        let secs = t
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs() as i64);
        Value::list(vec![Value::Int(secs >> 16), Value::Int(secs & 0xFFFF)])
    };
    let modified = time(meta.modified());
    Ok(Value::list(vec![
        Value::bool(meta.is_dir()),
        Value::Int(1),
        Value::Int(0),
        Value::Int(0),
        time(meta.accessed()),
        modified.clone(),
        modified,
        Value::Int(meta.len() as i64),
    ]))
}

pub(crate) fn builtin_file_attribute_modification_time(args: Vec<Value>) -> EvalResult {
    expect_args("file-attribute-modification-time", &args, 1)?;
    Ok(expect_list(&args[0])?.get(5).cloned().unwrap_or(Value::Nil))
}

/// First executable named `program` on `PATH`.
pub(crate) fn builtin_executable_find(args: Vec<Value>) -> EvalResult {
    expect_range_args("executable-find", &args, 1, 2)?;
    let program = expect_string(&args[0])?;
    let Some(path) = env::var_os("PATH") else {
        return Ok(Value::Nil);
    };
    Ok(env::split_paths(&path)
        .map(|dir| dir.join(&program))
        .find(|candidate| candidate.is_file())
        .map_or(Value::Nil, |found| path_string(&found)))
}

/// `(insert-file-contents FILE ...)`: insert at point, leaving point before
/// the text.  Returns `(FILE CHARS)`.
pub(crate) fn builtin_insert_file_contents(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("insert-file-contents", &args, 1, 5)?;
    let path = expanded_arg(eval, &args[0])?;
    let text = eval
        .loader
        .read_source(&path)
        .map_err(|_| file_missing("Opening input file", &path.to_string_lossy()))?;
    let buf = eval.buffers.current_buffer_mut();
    let at = buf.point();
    buf.insert_at(at, &text);
    buf.goto_char(at);
    Ok(Value::list(vec![
        path_string(&path),
        Value::Int(text.chars().count() as i64),
    ]))
}

/// `(write-region START END FILE &optional APPEND)`; a string START is
/// written as-is.
pub(crate) fn builtin_write_region(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("write-region", &args, 3, 7)?;
    let text = match &args[0] {
        Value::Str(s) => s.to_string(),
        Value::Nil => eval.buffers.current_buffer_mut().buffer_string(),
        start => {
            let start = expect_int(start)?;
            let end = expect_int(&args[1])?;
            let buf = eval.buffers.current_buffer_mut();
            let clamp = |p: i64| (p - 1).clamp(0, buf.len() as i64) as usize;
            buf.buffer_substring(clamp(start), clamp(end))
        }
    };
    let path = expanded_arg(eval, &args[2])?;
    let append = args.get(3).is_some_and(Value::is_truthy);
    let written = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(&path)
        .and_then(|mut file| file.write_all(text.as_bytes()));
    if let Err(err) = written {
        return Err(signal(
            "file-error",
            vec![
                Value::string("Opening output file"),
                Value::string(err.to_string()),
                path_string(&path),
            ],
        ));
    }
    tracing::debug!(path = %path.display(), bytes = text.len(), "wrote region");
    Ok(Value::Nil)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_resolves_relative_names_and_dots() {
        let ev = Evaluator::new();
        assert_eq!(
            expand_file_name(&ev, "scores/../tetris", Some("/var/games")),
            PathBuf::from("/var/games/tetris")
        );
        assert_eq!(expand_file_name(&ev, "/a/./b", None), PathBuf::from("/a/b"));
    }

    #[test]
    fn file_name_parts() {
        let mut ev = Evaluator::new();
        let out = ev
            .eval_str(
                "(list (file-name-directory \"/games/snake.el\")
                       (file-name-nondirectory \"/games/snake.el\")
                       (file-name-directory \"snake.el\")
                       (file-name-as-directory \"/games\"))",
            )
            .unwrap();
        assert_eq!(out.to_string(), "(\"/games/\" \"snake.el\" nil \"/games/\")");
    }

    #[test]
    fn substitutes_environment_variables() {
        env::set_var("ELCOMPAT_TEST_DIR", "/tmp/x");
        assert_eq!(
            substitute_in_file_name("$ELCOMPAT_TEST_DIR/a:${ELCOMPAT_TEST_DIR}:$$"),
            "/tmp/x/a:/tmp/x:$"
        );
    }

    #[test]
    fn write_then_insert_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        let mut ev = Evaluator::new();
        ev.set_global("notes", Value::string(file.to_string_lossy().into_owned()));
        ev.eval_str("(write-region \"one\\n\" nil notes) (write-region \"two\\n\" nil notes t)")
            .unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "one\ntwo\n");
        assert_eq!(ev.eval_str("(file-exists-p notes)").unwrap(), Value::True);
        let out = ev
            .eval_str("(with-temp-buffer (insert-file-contents notes) (list (point) (buffer-string)))")
            .unwrap();
        assert_eq!(out.to_string(), "(1 \"one\ntwo\n\")");
        let missing = ev.eval_str("(condition-case e (insert-file-contents \"/no/such/file\") (file-error (car e)))");
        assert_eq!(missing.unwrap(), Value::symbol("file-missing"));
    }
}
