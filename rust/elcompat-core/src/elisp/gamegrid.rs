//! Grid display helpers for game programs.
//!
//! Games draw by writing glyph values into a fixed-size cell grid and drive
//! themselves from a single repeating timer.  The grid is plain state here;
//! a renderer reads it through [`Evaluator::gamegrid`].

use super::builtins::{expect_args, expect_int, expect_max_args, expect_min_args, expect_number, expect_range_args};
use super::builtins::expand_file_name;
use super::error::*;
use super::eval::Evaluator;
use super::timer::TimerId;
use super::value::*;

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

const DEFAULT_PERIOD: f64 = 0.1;

/// Display locales accepted by `gamegrid-match-spec-list`.
const TERMINAL_LOCALES: &[&str] = &["t", "emacs-tty", "color-tty"];

#[derive(Debug)]
pub struct GameGrid {
    pub width: usize,
    pub height: usize,
    /// Value of cells never written.
    pub blank: Value,
    cells: HashMap<(i64, i64), Value>,
    /// Display options from `gamegrid-init`.
    pub display: Value,
    timer: Option<TimerId>,
}

impl Default for GameGrid {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            blank: Value::Nil,
            cells: HashMap::new(),
            display: Value::Nil,
            timer: None,
        }
    }
}

impl GameGrid {
    fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    pub fn cell(&self, x: i64, y: i64) -> &Value {
        self.cells.get(&(x, y)).unwrap_or(&self.blank)
    }

    /// The grid as rows of cell values, top to bottom.
    pub fn rows(&self) -> Vec<Vec<Value>> {
        (0..self.height as i64)
            .map(|y| (0..self.width as i64).map(|x| self.cell(x, y).clone()).collect())
            .collect()
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }
}

impl Evaluator {
    pub fn gamegrid(&self) -> &GameGrid {
        &self.gamegrid
    }
}

fn period_of(value: &Value) -> Result<Duration, Flow> {
    let secs = expect_number(value)?;
    let secs = if secs > 0.0 { secs } else { DEFAULT_PERIOD };
    Ok(Duration::from_secs_f64(secs))
}

/// `(gamegrid-init DISPLAY-OPTIONS)`.
pub(crate) fn builtin_gamegrid_init(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("gamegrid-init", &args, 1)?;
    eval.gamegrid.display = args[0].clone();
    Ok(args[0].clone())
}

/// `(gamegrid-init-buffer WIDTH HEIGHT BLANK)`: reset every cell to BLANK.
pub(crate) fn builtin_gamegrid_init_buffer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("gamegrid-init-buffer", &args, 3)?;
    let width = expect_int(&args[0])?.max(0);
    let height = expect_int(&args[1])?.max(0);
    let blank = args[2].clone();
    let grid = &mut eval.gamegrid;
    grid.width = width as usize;
    grid.height = height as usize;
    grid.blank = blank.clone();
    grid.cells.clear();
    for y in 0..height {
        for x in 0..width {
            grid.cells.insert((x, y), blank.clone());
        }
    }
    Ok(blank)
}

/// `(gamegrid-set-cell X Y VALUE)`.  Writes outside the grid are kept but
/// warned about once per cell.
pub(crate) fn builtin_gamegrid_set_cell(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("gamegrid-set-cell", &args, 3)?;
    let x = expect_int(&args[0])?;
    let y = expect_int(&args[1])?;
    let grid = &eval.gamegrid;
    if grid.width > 0 && grid.height > 0 && !grid.in_bounds(x, y) {
        let message = format!(
            "gamegrid-set-cell out of bounds: x={x} y={y} size={}x{}",
            grid.width, grid.height
        );
        eval.warn_once(&format!("cell-oob-{x}-{y}"), &message);
    }
    eval.gamegrid.cells.insert((x, y), args[2].clone());
    Ok(args[2].clone())
}

pub(crate) fn builtin_gamegrid_get_cell(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("gamegrid-get-cell", &args, 2)?;
    let x = expect_int(&args[0])?;
    let y = expect_int(&args[1])?;
    Ok(eval.gamegrid.cell(x, y).clone())
}

/// `(gamegrid-start-timer PERIOD FUNCTION)`: replace the game timer.  The
/// callback receives the current buffer on each tick.
pub(crate) fn builtin_gamegrid_start_timer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("gamegrid-start-timer", &args, 2)?;
    let period = period_of(&args[0])?;
    if let Some(old) = eval.gamegrid.timer.take() {
        eval.timers.cancel(old);
    }
    let callback = args[1].clone();
    let id = eval
        .timers
        .add(period, Some(period), callback.clone(), Vec::new(), false, Instant::now());
    eval.gamegrid.timer = Some(id);
    Ok(callback)
}

/// `(gamegrid-set-timer PERIOD)`: change the game timer's period.
pub(crate) fn builtin_gamegrid_set_timer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("gamegrid-set-timer", &args, 1)?;
    let period = period_of(&args[0])?;
    match eval.gamegrid.timer {
        Some(id) => eval.timers.set_period(id, period, Instant::now()),
        None => eval.warn_once("gamegrid-set-timer-idle", "gamegrid-set-timer: no game timer running"),
    }
    Ok(Value::Float(period.as_secs_f64()))
}

pub(crate) fn builtin_gamegrid_kill_timer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("gamegrid-kill-timer", &args, 0)?;
    if let Some(id) = eval.gamegrid.timer.take() {
        eval.timers.cancel(id);
    }
    Ok(Value::Nil)
}

/// `(gamegrid-add-score FILE SCORE)`: append `UNIX-TIME<TAB>SCORE` to the
/// score file.  Relative names resolve against
/// `gamegrid-user-score-file-directory` when it is set.
pub(crate) fn builtin_gamegrid_add_score(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("gamegrid-add-score", &args, 2, 3)?;
    let file = match &args[0] {
        Value::Str(s) => s.to_string(),
        other => other
            .as_symbol_name()
            .map(str::to_string)
            .ok_or_else(|| wrong_type("stringp", other))?,
    };
    let score = expect_int(&args[1])?;
    let dir = match eval.global_value("gamegrid-user-score-file-directory") {
        Some(Value::Str(dir)) => Some(dir.to_string()),
        _ => None,
    };
    let path = expand_file_name(eval, &file, dir.as_deref());
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    let line = format!("{stamp}\t{score}\n");
    let written = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut f| f.write_all(line.as_bytes()));
    match written {
        Ok(()) => tracing::debug!(path = %path.display(), score, "score recorded"),
        Err(err) => tracing::warn!(path = %path.display(), %err, "cannot write score file"),
    }
    Ok(Value::Int(score))
}

/// `(gamegrid-make-face COLOR1 COLOR2)`: faces are not modeled.
pub(crate) fn builtin_gamegrid_make_face(args: Vec<Value>) -> EvalResult {
    expect_max_args("gamegrid-make-face", &args, 2)?;
    Ok(Value::symbol("default"))
}

/// `(gamegrid-match-spec-list SPECS)`: value of the first `(LOCALE VALUE)`
/// entry for a terminal display.
pub(crate) fn builtin_gamegrid_match_spec_list(args: Vec<Value>) -> EvalResult {
    expect_min_args("gamegrid-match-spec-list", &args, 1)?;
    let specs = list_to_vec(&args[0]).ok_or_else(|| wrong_type("listp", &args[0]))?;
    Ok(specs
        .iter()
        .find(|spec| {
            spec.cons_car()
                .as_symbol_name()
                .is_some_and(|locale| TERMINAL_LOCALES.contains(&locale))
        })
        .map_or(Value::Nil, |spec| spec.cons_cdr().cons_car()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_buffer_fills_and_cells_round_trip() {
        let mut ev = Evaluator::new();
        ev.eval_str("(gamegrid-init-buffer 4 3 ?.) (gamegrid-set-cell 1 2 ?#)").unwrap();
        assert_eq!(ev.eval_str("(gamegrid-get-cell 1 2)").unwrap(), Value::Int('#' as i64));
        assert_eq!(ev.eval_str("(gamegrid-get-cell 3 0)").unwrap(), Value::Int('.' as i64));
        let rows = ev.gamegrid().rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2][1], Value::Int('#' as i64));
    }

    #[test]
    fn out_of_bounds_writes_are_kept_and_warned_once() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        let mut ev = Evaluator::new();
        ev.eval_str("(gamegrid-init-buffer 2 2 0)").unwrap();
        ev.eval_str("(gamegrid-set-cell 5 5 1) (gamegrid-set-cell 5 5 2)").unwrap();
        assert_eq!(ev.eval_str("(gamegrid-get-cell 5 5)").unwrap(), Value::Int(2));
        assert!(ev.warned.contains("cell-oob-5-5"));
        assert_eq!(ev.eval_str("(gamegrid-get-cell -1 9)").unwrap(), Value::Int(0));
    }

    #[test]
    fn start_timer_replaces_previous_timer() {
        let mut ev = Evaluator::new();
        ev.eval_str("(gamegrid-start-timer 0.5 'tick)").unwrap();
        let first = ev.gamegrid().timer().unwrap();
        ev.eval_str("(gamegrid-start-timer 0 'tock)").unwrap();
        let second = ev.gamegrid().timer().unwrap();
        assert_ne!(first, second);
        assert!(ev.timers().get(first).is_none());
        let timer = ev.timers().get(second).unwrap();
        assert_eq!(timer.period, Some(Duration::from_secs_f64(DEFAULT_PERIOD)));
        assert_eq!(timer.callback, Value::symbol("tock"));

        assert_eq!(ev.eval_str("(gamegrid-set-timer 0.25)").unwrap(), Value::Float(0.25));
        assert_eq!(
            ev.timers().get(second).unwrap().period,
            Some(Duration::from_millis(250))
        );
        ev.eval_str("(gamegrid-kill-timer)").unwrap();
        assert!(ev.gamegrid().timer().is_none());
        assert!(ev.timers().active_ids().is_empty());
    }

    #[test]
    fn add_score_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut ev = Evaluator::new();
        ev.set_global(
            "gamegrid-user-score-file-directory",
            Value::string(dir.path().to_string_lossy().into_owned()),
        );
        assert_eq!(
            ev.eval_str("(gamegrid-add-score \"snake-scores\" 120)").unwrap(),
            Value::Int(120)
        );
        ev.eval_str("(gamegrid-add-score 'snake-scores 80)").unwrap();
        let text = fs::read_to_string(dir.path().join("snake-scores")).unwrap();
        let scores: Vec<&str> = text
            .lines()
            .map(|line| line.split('\t').nth(1).unwrap())
            .collect();
        assert_eq!(scores, vec!["120", "80"]);
    }

    #[test]
    fn match_spec_list_picks_terminal_entry() {
        let mut ev = Evaluator::new();
        let out = ev
            .eval_str("(gamegrid-match-spec-list '((glyph 1) (emacs-tty 2) (t 3)))")
            .unwrap();
        assert_eq!(out, Value::Int(2));
        assert_eq!(
            ev.eval_str("(gamegrid-make-face \"red\" \"blue\")").unwrap(),
            Value::symbol("default")
        );
    }
}
