//! elcompat: run Emacs Lisp programs from the command line.
//!
//! Loads files and evaluates expressions in order, printing the value of
//! each `-e`.  With `--run-timers`, a ticker thread wakes the main loop,
//! which fires due timers one at a time until the deadline passes or no
//! timer is left.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, TrySendError};

use elcompat_core::elisp::TimerOutcome;
use elcompat_core::{Evaluator, RuntimeConfig};

const TICK: Duration = Duration::from_millis(10);

/// Items to run at startup, in command-line order.
#[derive(Debug, PartialEq)]
enum Item {
    Load(PathBuf),
    Eval(String),
}

#[derive(Debug, Default, PartialEq)]
struct Args {
    load_path: Vec<PathBuf>,
    items: Vec<Item>,
    /// Seconds to keep firing timers after the items ran.
    run_timers: Option<f64>,
}

/// Parse command-line arguments.
///
/// Supported flags:
///   -L DIR                  Prepend DIR to the load path
///   --load FILE / -l FILE   Load an Elisp file
///   --eval EXPR / -e EXPR   Evaluate an expression and print its value
///   --run-timers SECONDS    Fire timers for SECONDS after loading
///   FILE                    Same as -l FILE
fn parse_args(argv: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut args = Args::default();
    let mut iter = argv.into_iter();
    while let Some(arg) = iter.next() {
        let mut operand = |flag: &str| {
            iter.next()
                .ok_or_else(|| format!("{flag} requires an argument"))
        };
        match arg.as_str() {
            "-L" | "--directory" => args.load_path.push(PathBuf::from(operand(&arg)?)),
            "-l" | "--load" => args.items.push(Item::Load(PathBuf::from(operand(&arg)?))),
            "-e" | "--eval" => args.items.push(Item::Eval(operand(&arg)?)),
            "--run-timers" => {
                let raw = operand(&arg)?;
                let secs = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|s| s.is_finite() && *s >= 0.0)
                    .ok_or_else(|| format!("--run-timers: invalid duration {raw:?}"))?;
                args.run_timers = Some(secs);
            }
            _ if arg.starts_with('-') && arg.len() > 1 => {
                return Err(format!("unknown option: {arg}"));
            }
            _ => args.items.push(Item::Load(PathBuf::from(arg))),
        }
    }
    Ok(args)
}

/// Run every item, writing program output and `-e` values to `out`.
/// Returns false if any item failed.
fn run_items(eval: &mut Evaluator, items: &[Item], out: &mut impl Write) -> io::Result<bool> {
    let mut ok = true;
    for item in items {
        match item {
            Item::Load(path) => {
                log::info!("Loading {}", path.display());
                if let Err(err) = eval.load_file(path) {
                    log::error!("Error loading {}: {err}", path.display());
                    ok = false;
                }
                out.write_all(eval.take_output().as_bytes())?;
            }
            Item::Eval(expr) => {
                let result = eval.eval_str(expr);
                out.write_all(eval.take_output().as_bytes())?;
                match result {
                    Ok(value) => writeln!(out, "{}", eval.prin1(&value))?,
                    Err(err) => {
                        log::error!("Error evaluating {expr:?}: {err}");
                        ok = false;
                    }
                }
            }
        }
    }
    Ok(ok)
}

/// Fire due timers until `duration` has passed or nothing is scheduled.
fn run_timers(eval: &mut Evaluator, duration: Duration, out: &mut impl Write) -> io::Result<()> {
    let deadline = Instant::now() + duration;
    let (tick_tx, tick_rx) = bounded::<Instant>(1);
    let ticker = thread::spawn(move || loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        match tick_tx.try_send(now) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => break,
        }
        thread::sleep(TICK);
    });

    for now in tick_rx.iter() {
        if eval.timers().active_ids().is_empty() {
            log::info!("No active timers left");
            break;
        }
        for id in eval.timers().due(now) {
            match eval.fire_timer(id) {
                TimerOutcome::Fired(_) | TimerOutcome::Inactive => {}
                TimerOutcome::Quit => log::info!("Timer {} quit", id.0),
                TimerOutcome::Failed(err) => log::warn!("Timer {} disabled: {err}", id.0),
            }
        }
        out.write_all(eval.take_output().as_bytes())?;
        out.flush()?;
    }
    drop(tick_rx);
    if ticker.join().is_err() {
        log::error!("Timer thread panicked");
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(msg) => {
            log::error!("{msg}");
            eprintln!("usage: elcompat [-L DIR]... [-l FILE | -e EXPR | FILE]... [--run-timers SECONDS]");
            return ExitCode::from(2);
        }
    };

    let mut config = RuntimeConfig::from_env();
    for dir in args.load_path.iter().rev() {
        config.prepend_load_path(dir.clone());
    }
    let mut eval = Evaluator::with_config(config);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = run_items(&mut eval, &args.items, &mut out).and_then(|ok| {
        if let Some(secs) = args.run_timers {
            run_timers(&mut eval, Duration::from_secs_f64(secs), &mut out)?;
        }
        out.flush()?;
        Ok(ok)
    });
    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            log::error!("Write failed: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_flags_in_order() {
        let args = parse_args(argv(&["-L", "lib", "snake.el", "-e", "(+ 1 2)", "--run-timers", "1.5"]))
            .unwrap();
        assert_eq!(args.load_path, vec![PathBuf::from("lib")]);
        assert_eq!(
            args.items,
            vec![Item::Load(PathBuf::from("snake.el")), Item::Eval("(+ 1 2)".into())]
        );
        assert_eq!(args.run_timers, Some(1.5));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_args(argv(&["-e"])).is_err());
        assert!(parse_args(argv(&["--frob"])).is_err());
        assert!(parse_args(argv(&["--run-timers", "soon"])).is_err());
    }

    #[test]
    fn runs_files_then_expressions() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("game.el");
        std::fs::write(&file, "(defvar score 40) (princ \"loaded\\n\")").unwrap();
        let mut eval = Evaluator::new();
        let mut out = Vec::new();
        let items = vec![Item::Load(file), Item::Eval("(+ score 2)".into())];
        assert!(run_items(&mut eval, &items, &mut out).unwrap());
        assert_eq!(String::from_utf8(out).unwrap(), "loaded\n42\n");

        let mut out = Vec::new();
        let failing = vec![Item::Eval("(car 1)".into())];
        assert!(!run_items(&mut eval, &failing, &mut out).unwrap());
    }

    #[test]
    fn timers_fire_until_cancelled() {
        let mut eval = Evaluator::new();
        eval.eval_str(
            "(defvar ticks 0)
             (defvar tick-timer nil)
             (setq tick-timer
                   (run-with-timer 0 0.01
                     (lambda () (setq ticks (1+ ticks))
                                (when (>= ticks 3) (cancel-timer tick-timer)))))",
        )
        .unwrap();
        let mut out = Vec::new();
        run_timers(&mut eval, Duration::from_secs(5), &mut out).unwrap();
        assert_eq!(eval.global_value("ticks"), Some(elcompat_core::Value::Int(3)));
    }
}
