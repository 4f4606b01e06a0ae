//! Built-in primitive functions.
//!
//! All functions here take pre-evaluated `Vec<Value>` arguments and return `EvalResult`.
//! The evaluator dispatches here after evaluating the argument expressions.
//! Pure primitives see only their arguments; the rest also get the
//! [`Evaluator`] for buffers, match data, keymaps and function calls.

pub(super) use super::error::*;
pub(super) use super::eval::{sequence_items, Evaluator};
pub(super) use super::value::*;
use strum::EnumString;

use std::str::FromStr;

mod arithmetic;
mod cons_list;
mod strings;
mod symbols;

pub(crate) use arithmetic::*;
pub(crate) use cons_list::*;
pub(crate) use strings::*;
pub(crate) use symbols::*;

mod higher_order;
mod misc_eval;
mod stubs;
mod hooks;
pub(crate) mod buffers;
pub(crate) mod keymaps;
mod search;
mod windows;
mod timers;
mod files;

pub(crate) use higher_order::*;
pub(crate) use misc_eval::*;
pub(crate) use stubs::*;
pub(crate) use hooks::*;
pub(crate) use buffers::*;
pub(crate) use keymaps::*;
pub(crate) use search::*;
pub(crate) use windows::*;
pub(crate) use timers::*;
pub(crate) use files::*;

use super::{gamegrid, interactive, load, modes};

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn arity(name: &str, min: usize, max: Option<usize>, received: usize) -> Flow {
    ArityError::new(Some(name), min, max, received).into()
}

/// Expect exactly N arguments.
pub(super) fn expect_args(name: &str, args: &[Value], n: usize) -> Result<(), Flow> {
    if args.len() != n {
        Err(arity(name, n, Some(n), args.len()))
    } else {
        Ok(())
    }
}

/// Expect at least N arguments.
pub(super) fn expect_min_args(name: &str, args: &[Value], min: usize) -> Result<(), Flow> {
    if args.len() < min {
        Err(arity(name, min, None, args.len()))
    } else {
        Ok(())
    }
}

/// Expect at most N arguments.
pub(super) fn expect_max_args(name: &str, args: &[Value], max: usize) -> Result<(), Flow> {
    if args.len() > max {
        Err(arity(name, 0, Some(max), args.len()))
    } else {
        Ok(())
    }
}

/// Expect between MIN and MAX arguments (inclusive).
pub(super) fn expect_range_args(
    name: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<(), Flow> {
    if args.len() < min || args.len() > max {
        Err(arity(name, min, Some(max), args.len()))
    } else {
        Ok(())
    }
}

pub(super) fn expect_int(value: &Value) -> Result<i64, Flow> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(wrong_type("integerp", other)),
    }
}

pub(super) fn expect_number(value: &Value) -> Result<f64, Flow> {
    value
        .as_number_f64()
        .ok_or_else(|| wrong_type("numberp", value))
}

pub(super) fn expect_natnum(value: &Value) -> Result<usize, Flow> {
    match value {
        Value::Int(n) if *n >= 0 => Ok(*n as usize),
        other => Err(wrong_type("wholenump", other)),
    }
}

pub(super) fn expect_string(value: &Value) -> Result<String, Flow> {
    match value {
        Value::Str(s) => Ok(s.to_string()),
        other => Err(wrong_type("stringp", other)),
    }
}

pub(super) fn expect_symbol_name(value: &Value) -> Result<String, Flow> {
    value
        .as_symbol_name()
        .map(str::to_string)
        .ok_or_else(|| wrong_type("symbolp", value))
}

/// Elements of a proper list.
pub(super) fn expect_list(value: &Value) -> Result<Vec<Value>, Flow> {
    list_to_vec(value).ok_or_else(|| wrong_type("listp", value))
}

// ---------------------------------------------------------------------------
// Pure dispatch
// ---------------------------------------------------------------------------

#[derive(EnumString)]
enum PureBuiltinId {
    // Numbers
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Percent,
    #[strum(serialize = "mod")]
    Mod,
    #[strum(serialize = "1+", serialize = "succ")]
    Add1,
    #[strum(serialize = "1-", serialize = "pred")]
    Sub1,
    #[strum(serialize = "=")]
    NumEq,
    #[strum(serialize = "<")]
    NumLt,
    #[strum(serialize = "<=")]
    NumLe,
    #[strum(serialize = ">")]
    NumGt,
    #[strum(serialize = ">=")]
    NumGe,
    #[strum(serialize = "/=")]
    NumNe,
    #[strum(serialize = "max")]
    Max,
    #[strum(serialize = "min")]
    Min,
    #[strum(serialize = "abs")]
    Abs,
    #[strum(serialize = "floor")]
    Floor,
    #[strum(serialize = "ceiling")]
    Ceiling,
    #[strum(serialize = "round")]
    Round,
    #[strum(serialize = "truncate")]
    Truncate,
    #[strum(serialize = "float")]
    Float,
    #[strum(serialize = "expt")]
    Expt,
    #[strum(serialize = "sqrt")]
    Sqrt,
    #[strum(serialize = "oddp", serialize = "cl-oddp")]
    Oddp,
    #[strum(serialize = "evenp", serialize = "cl-evenp")]
    Evenp,
    #[strum(serialize = "zerop")]
    Zerop,
    #[strum(serialize = "natnump", serialize = "wholenump")]
    Natnump,
    #[strum(serialize = "numberp")]
    Numberp,
    #[strum(serialize = "integerp", serialize = "fixnump")]
    Integerp,
    #[strum(serialize = "floatp")]
    Floatp,
    #[strum(serialize = "number-to-string", serialize = "int-to-string")]
    NumberToString,
    #[strum(serialize = "string-to-number")]
    StringToNumber,
    #[strum(serialize = "logand")]
    LogAnd,
    #[strum(serialize = "logior")]
    LogIor,
    #[strum(serialize = "logxor")]
    LogXor,
    #[strum(serialize = "lognot")]
    LogNot,
    #[strum(serialize = "ash", serialize = "lsh")]
    Ash,

    // Lists and sequences
    #[strum(serialize = "cons")]
    Cons,
    #[strum(serialize = "car")]
    Car,
    #[strum(serialize = "cdr")]
    Cdr,
    #[strum(serialize = "cadr")]
    Cadr,
    #[strum(serialize = "cddr")]
    Cddr,
    #[strum(serialize = "caar")]
    Caar,
    #[strum(serialize = "cdar")]
    Cdar,
    #[strum(serialize = "car-safe")]
    CarSafe,
    #[strum(serialize = "cdr-safe")]
    CdrSafe,
    #[strum(serialize = "list")]
    List,
    #[strum(serialize = "make-list")]
    MakeList,
    #[strum(serialize = "append")]
    Append,
    #[strum(serialize = "nconc")]
    Nconc,
    #[strum(serialize = "length", serialize = "safe-length")]
    Length,
    #[strum(serialize = "nth")]
    Nth,
    #[strum(serialize = "nthcdr")]
    Nthcdr,
    #[strum(serialize = "last")]
    Last,
    #[strum(serialize = "butlast")]
    Butlast,
    #[strum(serialize = "reverse")]
    Reverse,
    #[strum(serialize = "nreverse")]
    Nreverse,
    #[strum(serialize = "member")]
    Member,
    #[strum(serialize = "memq")]
    Memq,
    #[strum(serialize = "memql")]
    Memql,
    #[strum(serialize = "assq")]
    Assq,
    #[strum(serialize = "rassq")]
    Rassq,
    #[strum(serialize = "delq")]
    Delq,
    #[strum(serialize = "delete")]
    Delete,
    #[strum(serialize = "remove")]
    Remove,
    #[strum(serialize = "remq")]
    Remq,
    #[strum(serialize = "setcar", serialize = "rplaca")]
    Setcar,
    #[strum(serialize = "setcdr", serialize = "rplacd")]
    Setcdr,
    #[strum(serialize = "number-sequence")]
    NumberSequence,
    #[strum(serialize = "plist-get")]
    PlistGet,
    #[strum(serialize = "plist-put")]
    PlistPut,
    #[strum(serialize = "plist-member")]
    PlistMember,
    #[strum(serialize = "make-vector")]
    MakeVector,
    #[strum(serialize = "vector")]
    Vector,
    #[strum(serialize = "aref")]
    Aref,
    #[strum(serialize = "aset")]
    Aset,
    #[strum(serialize = "elt")]
    Elt,
    #[strum(serialize = "vconcat")]
    Vconcat,
    #[strum(serialize = "copy-sequence")]
    CopySequence,
    #[strum(serialize = "copy-tree")]
    CopyTree,
    #[strum(serialize = "fillarray")]
    Fillarray,

    // Strings and characters
    #[strum(serialize = "concat")]
    Concat,
    #[strum(serialize = "substring", serialize = "substring-no-properties")]
    Substring,
    #[strum(serialize = "string=", serialize = "string-equal")]
    StringEqual,
    #[strum(serialize = "string<", serialize = "string-lessp")]
    StringLessp,
    #[strum(serialize = "string>", serialize = "string-greaterp")]
    StringGreaterp,
    #[strum(serialize = "string-prefix-p")]
    StringPrefixP,
    #[strum(serialize = "string-suffix-p")]
    StringSuffixP,
    #[strum(serialize = "string-empty-p")]
    StringEmptyP,
    #[strum(serialize = "string-join")]
    StringJoin,
    #[strum(serialize = "string-search")]
    StringSearch,
    #[strum(serialize = "string-replace")]
    StringReplace,
    #[strum(serialize = "upcase")]
    Upcase,
    #[strum(serialize = "downcase")]
    Downcase,
    #[strum(serialize = "capitalize")]
    Capitalize,
    #[strum(serialize = "make-string")]
    MakeString,
    #[strum(serialize = "string")]
    String,
    #[strum(serialize = "char-to-string")]
    CharToString,
    #[strum(serialize = "string-to-char")]
    StringToChar,
    #[strum(serialize = "string-to-list")]
    StringToList,
    #[strum(serialize = "string-to-vector")]
    StringToVector,
    #[strum(serialize = "string-width")]
    StringWidth,
    #[strum(serialize = "string-pad")]
    StringPad,
    #[strum(serialize = "truncate-string-to-width")]
    TruncateStringToWidth,
    #[strum(serialize = "string-reverse")]
    StringReverse,
    #[strum(serialize = "propertize")]
    Propertize,
    #[strum(serialize = "regexp-quote")]
    RegexpQuote,

    // Symbols and predicates
    #[strum(serialize = "null")]
    Null,
    #[strum(serialize = "not")]
    Not,
    #[strum(serialize = "eq")]
    Eq,
    #[strum(serialize = "eql")]
    Eql,
    #[strum(serialize = "equal")]
    Equal,
    #[strum(serialize = "identity")]
    Identity,
    #[strum(serialize = "ignore")]
    Ignore,
    #[strum(serialize = "stringp")]
    Stringp,
    #[strum(serialize = "symbolp")]
    Symbolp,
    #[strum(serialize = "keywordp")]
    Keywordp,
    #[strum(serialize = "booleanp")]
    Booleanp,
    #[strum(serialize = "consp")]
    Consp,
    #[strum(serialize = "listp")]
    Listp,
    #[strum(serialize = "nlistp")]
    Nlistp,
    #[strum(serialize = "atom")]
    Atom,
    #[strum(serialize = "vectorp")]
    Vectorp,
    #[strum(serialize = "arrayp")]
    Arrayp,
    #[strum(serialize = "sequencep")]
    Sequencep,
    #[strum(serialize = "bufferp")]
    Bufferp,
    #[strum(serialize = "characterp")]
    Characterp,
    #[strum(serialize = "subrp")]
    Subrp,
    #[strum(serialize = "type-of")]
    TypeOf,
    #[strum(serialize = "symbol-name")]
    SymbolName,
    #[strum(serialize = "make-symbol")]
    MakeSymbol,

    // Keymaps
    #[strum(serialize = "make-keymap")]
    MakeKeymap,
    #[strum(serialize = "make-sparse-keymap")]
    MakeSparseKeymap,
    #[strum(serialize = "keymapp")]
    Keymapp,
    #[strum(serialize = "define-key")]
    DefineKey,
    #[strum(serialize = "keymap-set")]
    KeymapSet,
    #[strum(serialize = "kbd")]
    Kbd,
    #[strum(serialize = "set-keymap-parent")]
    SetKeymapParent,
    #[strum(serialize = "keymap-parent")]
    KeymapParent,
    #[strum(serialize = "suppress-keymap")]
    SuppressKeymap,
    #[strum(serialize = "lookup-key")]
    LookupKey,

    // Windows, frames and timers
    #[strum(serialize = "windowp")]
    Windowp,
    #[strum(serialize = "window-configuration-p")]
    WindowConfigurationP,
    #[strum(serialize = "selected-frame")]
    SelectedFrame,
    #[strum(serialize = "frame-width")]
    FrameWidth,
    #[strum(serialize = "frame-height")]
    FrameHeight,
    #[strum(serialize = "visible-frame-list", serialize = "frame-list")]
    VisibleFrameList,
    #[strum(serialize = "timerp")]
    Timerp,

    // Files
    #[strum(serialize = "substitute-in-file-name")]
    SubstituteInFileName,
    #[strum(serialize = "file-name-directory")]
    FileNameDirectory,
    #[strum(serialize = "file-name-nondirectory")]
    FileNameNondirectory,
    #[strum(serialize = "file-name-as-directory")]
    FileNameAsDirectory,
    #[strum(serialize = "locate-user-emacs-file")]
    LocateUserEmacsFile,
    #[strum(serialize = "file-attribute-modification-time")]
    FileAttributeModificationTime,
    #[strum(serialize = "executable-find")]
    ExecutableFind,

    // Editor features without a model
    #[strum(serialize = "next-single-property-change")]
    NextSinglePropertyChange,
    #[strum(serialize = "face-attribute")]
    FaceAttribute,
    #[strum(serialize = "make-face", serialize = "copy-face")]
    MakeFace,
    #[strum(serialize = "read-string", serialize = "read-from-minibuffer")]
    ReadString,
    #[strum(serialize = "line-pixel-height")]
    LinePixelHeight,
    #[strum(serialize = "window-body-pixel-edges")]
    WindowBodyPixelEdges,
    #[strum(serialize = "window-frame")]
    WindowFrame,
    #[strum(serialize = "frame-monitor-attributes")]
    FrameMonitorAttributes,
    #[strum(serialize = "make-syntax-table")]
    MakeSyntaxTable,
    #[strum(serialize = "make-bool-vector")]
    MakeBoolVector,
    #[strum(serialize = "obarray-make")]
    ObarrayMake,
    #[strum(serialize = "prefix-numeric-value")]
    PrefixNumericValue,
    #[strum(serialize = "current-time-string")]
    CurrentTimeString,
    #[strum(serialize = "time-convert")]
    TimeConvert,
    #[strum(serialize = "time-equal-p")]
    TimeEqualP,
    #[strum(serialize = "gamegrid-make-face")]
    GamegridMakeFace,
    #[strum(serialize = "gamegrid-match-spec-list")]
    GamegridMatchSpecList,
}

fn dispatch_builtin_id_pure(id: PureBuiltinId, args: Vec<Value>) -> EvalResult {
    match id {
        PureBuiltinId::Add => builtin_add(args),
        PureBuiltinId::Sub => builtin_sub(args),
        PureBuiltinId::Mul => builtin_mul(args),
        PureBuiltinId::Div => builtin_div(args),
        PureBuiltinId::Percent => builtin_percent(args),
        PureBuiltinId::Mod => builtin_mod(args),
        PureBuiltinId::Add1 => builtin_add1(args),
        PureBuiltinId::Sub1 => builtin_sub1(args),
        PureBuiltinId::NumEq => builtin_num_eq(args),
        PureBuiltinId::NumLt => builtin_num_lt(args),
        PureBuiltinId::NumLe => builtin_num_le(args),
        PureBuiltinId::NumGt => builtin_num_gt(args),
        PureBuiltinId::NumGe => builtin_num_ge(args),
        PureBuiltinId::NumNe => builtin_num_ne(args),
        PureBuiltinId::Max => builtin_max(args),
        PureBuiltinId::Min => builtin_min(args),
        PureBuiltinId::Abs => builtin_abs(args),
        PureBuiltinId::Floor => builtin_floor(args),
        PureBuiltinId::Ceiling => builtin_ceiling(args),
        PureBuiltinId::Round => builtin_round(args),
        PureBuiltinId::Truncate => builtin_truncate(args),
        PureBuiltinId::Float => builtin_float(args),
        PureBuiltinId::Expt => builtin_expt(args),
        PureBuiltinId::Sqrt => builtin_sqrt(args),
        PureBuiltinId::Oddp => builtin_oddp(args),
        PureBuiltinId::Evenp => builtin_evenp(args),
        PureBuiltinId::Zerop => builtin_zerop(args),
        PureBuiltinId::Natnump => builtin_natnump(args),
        PureBuiltinId::Numberp => builtin_numberp(args),
        PureBuiltinId::Integerp => builtin_integerp(args),
        PureBuiltinId::Floatp => builtin_floatp(args),
        PureBuiltinId::NumberToString => builtin_number_to_string(args),
        PureBuiltinId::StringToNumber => builtin_string_to_number(args),
        PureBuiltinId::LogAnd => builtin_logand(args),
        PureBuiltinId::LogIor => builtin_logior(args),
        PureBuiltinId::LogXor => builtin_logxor(args),
        PureBuiltinId::LogNot => builtin_lognot(args),
        PureBuiltinId::Ash => builtin_ash(args),

        PureBuiltinId::Cons => builtin_cons(args),
        PureBuiltinId::Car => builtin_car(args),
        PureBuiltinId::Cdr => builtin_cdr(args),
        PureBuiltinId::Cadr => builtin_cadr(args),
        PureBuiltinId::Cddr => builtin_cddr(args),
        PureBuiltinId::Caar => builtin_caar(args),
        PureBuiltinId::Cdar => builtin_cdar(args),
        PureBuiltinId::CarSafe => builtin_car_safe(args),
        PureBuiltinId::CdrSafe => builtin_cdr_safe(args),
        PureBuiltinId::List => builtin_list(args),
        PureBuiltinId::MakeList => builtin_make_list(args),
        PureBuiltinId::Append => builtin_append(args),
        PureBuiltinId::Nconc => builtin_nconc(args),
        PureBuiltinId::Length => builtin_length(args),
        PureBuiltinId::Nth => builtin_nth(args),
        PureBuiltinId::Nthcdr => builtin_nthcdr(args),
        PureBuiltinId::Last => builtin_last(args),
        PureBuiltinId::Butlast => builtin_butlast(args),
        PureBuiltinId::Reverse => builtin_reverse(args),
        PureBuiltinId::Nreverse => builtin_nreverse(args),
        PureBuiltinId::Member => builtin_member(args),
        PureBuiltinId::Memq => builtin_memq(args),
        PureBuiltinId::Memql => builtin_memql(args),
        PureBuiltinId::Assq => builtin_assq(args),
        PureBuiltinId::Rassq => builtin_rassq(args),
        PureBuiltinId::Delq => builtin_delq(args),
        PureBuiltinId::Delete => builtin_delete(args),
        PureBuiltinId::Remove => builtin_remove(args),
        PureBuiltinId::Remq => builtin_remq(args),
        PureBuiltinId::Setcar => builtin_setcar(args),
        PureBuiltinId::Setcdr => builtin_setcdr(args),
        PureBuiltinId::NumberSequence => builtin_number_sequence(args),
        PureBuiltinId::PlistGet => builtin_plist_get(args),
        PureBuiltinId::PlistPut => builtin_plist_put(args),
        PureBuiltinId::PlistMember => builtin_plist_member(args),
        PureBuiltinId::MakeVector => builtin_make_vector(args),
        PureBuiltinId::Vector => builtin_vector(args),
        PureBuiltinId::Aref => builtin_aref(args),
        PureBuiltinId::Aset => builtin_aset(args),
        PureBuiltinId::Elt => builtin_elt(args),
        PureBuiltinId::Vconcat => builtin_vconcat(args),
        PureBuiltinId::CopySequence => builtin_copy_sequence(args),
        PureBuiltinId::CopyTree => builtin_copy_tree(args),
        PureBuiltinId::Fillarray => builtin_fillarray(args),

        PureBuiltinId::Concat => builtin_concat(args),
        PureBuiltinId::Substring => builtin_substring(args),
        PureBuiltinId::StringEqual => builtin_string_equal(args),
        PureBuiltinId::StringLessp => builtin_string_lessp(args),
        PureBuiltinId::StringGreaterp => builtin_string_greaterp(args),
        PureBuiltinId::StringPrefixP => builtin_string_prefix_p(args),
        PureBuiltinId::StringSuffixP => builtin_string_suffix_p(args),
        PureBuiltinId::StringEmptyP => builtin_string_empty_p(args),
        PureBuiltinId::StringJoin => builtin_string_join(args),
        PureBuiltinId::StringSearch => builtin_string_search(args),
        PureBuiltinId::StringReplace => builtin_string_replace(args),
        PureBuiltinId::Upcase => builtin_upcase(args),
        PureBuiltinId::Downcase => builtin_downcase(args),
        PureBuiltinId::Capitalize => builtin_capitalize(args),
        PureBuiltinId::MakeString => builtin_make_string(args),
        PureBuiltinId::String => builtin_string(args),
        PureBuiltinId::CharToString => builtin_char_to_string(args),
        PureBuiltinId::StringToChar => builtin_string_to_char(args),
        PureBuiltinId::StringToList => builtin_string_to_list(args),
        PureBuiltinId::StringToVector => builtin_string_to_vector(args),
        PureBuiltinId::StringWidth => builtin_string_width(args),
        PureBuiltinId::StringPad => builtin_string_pad(args),
        PureBuiltinId::TruncateStringToWidth => builtin_truncate_string_to_width(args),
        PureBuiltinId::StringReverse => builtin_string_reverse(args),
        PureBuiltinId::Propertize => builtin_propertize(args),
        PureBuiltinId::RegexpQuote => builtin_regexp_quote(args),

        PureBuiltinId::Null => builtin_null(args),
        PureBuiltinId::Not => builtin_not(args),
        PureBuiltinId::Eq => builtin_eq(args),
        PureBuiltinId::Eql => builtin_eql(args),
        PureBuiltinId::Equal => builtin_equal(args),
        PureBuiltinId::Identity => builtin_identity(args),
        PureBuiltinId::Ignore => builtin_ignore(args),
        PureBuiltinId::Stringp => builtin_stringp(args),
        PureBuiltinId::Symbolp => builtin_symbolp(args),
        PureBuiltinId::Keywordp => builtin_keywordp(args),
        PureBuiltinId::Booleanp => builtin_booleanp(args),
        PureBuiltinId::Consp => builtin_consp(args),
        PureBuiltinId::Listp => builtin_listp(args),
        PureBuiltinId::Nlistp => builtin_nlistp(args),
        PureBuiltinId::Atom => builtin_atom(args),
        PureBuiltinId::Vectorp => builtin_vectorp(args),
        PureBuiltinId::Arrayp => builtin_arrayp(args),
        PureBuiltinId::Sequencep => builtin_sequencep(args),
        PureBuiltinId::Bufferp => builtin_bufferp(args),
        PureBuiltinId::Characterp => builtin_characterp(args),
        PureBuiltinId::Subrp => builtin_subrp(args),
        PureBuiltinId::TypeOf => builtin_type_of(args),
        PureBuiltinId::SymbolName => builtin_symbol_name(args),
        PureBuiltinId::MakeSymbol => builtin_make_symbol(args),

        PureBuiltinId::MakeKeymap => builtin_make_keymap(args),
        PureBuiltinId::MakeSparseKeymap => builtin_make_sparse_keymap(args),
        PureBuiltinId::Keymapp => builtin_keymapp(args),
        PureBuiltinId::DefineKey => builtin_define_key(args),
        PureBuiltinId::KeymapSet => builtin_keymap_set(args),
        PureBuiltinId::Kbd => builtin_kbd(args),
        PureBuiltinId::SetKeymapParent => builtin_set_keymap_parent(args),
        PureBuiltinId::KeymapParent => builtin_keymap_parent(args),
        PureBuiltinId::SuppressKeymap => builtin_suppress_keymap(args),
        PureBuiltinId::LookupKey => builtin_lookup_key(args),

        PureBuiltinId::Windowp => builtin_windowp(args),
        PureBuiltinId::WindowConfigurationP => builtin_window_configuration_p(args),
        PureBuiltinId::SelectedFrame => builtin_selected_frame(args),
        PureBuiltinId::FrameWidth => builtin_frame_width(args),
        PureBuiltinId::FrameHeight => builtin_frame_height(args),
        PureBuiltinId::VisibleFrameList => builtin_visible_frame_list(args),
        PureBuiltinId::Timerp => builtin_timerp(args),

        PureBuiltinId::SubstituteInFileName => builtin_substitute_in_file_name(args),
        PureBuiltinId::FileNameDirectory => builtin_file_name_directory(args),
        PureBuiltinId::FileNameNondirectory => builtin_file_name_nondirectory(args),
        PureBuiltinId::FileNameAsDirectory => builtin_file_name_as_directory(args),
        PureBuiltinId::LocateUserEmacsFile => builtin_locate_user_emacs_file(args),
        PureBuiltinId::FileAttributeModificationTime => {
            builtin_file_attribute_modification_time(args)
        }
        PureBuiltinId::ExecutableFind => builtin_executable_find(args),

        PureBuiltinId::NextSinglePropertyChange => builtin_next_single_property_change(args),
        PureBuiltinId::FaceAttribute => builtin_face_attribute(args),
        PureBuiltinId::MakeFace => builtin_make_face(args),
        PureBuiltinId::ReadString => builtin_read_string(args),
        PureBuiltinId::LinePixelHeight => builtin_line_pixel_height(args),
        PureBuiltinId::WindowBodyPixelEdges => builtin_window_body_pixel_edges(args),
        PureBuiltinId::WindowFrame => builtin_window_frame(args),
        PureBuiltinId::FrameMonitorAttributes => builtin_frame_monitor_attributes(args),
        PureBuiltinId::MakeSyntaxTable => builtin_make_syntax_table(args),
        PureBuiltinId::MakeBoolVector => builtin_make_bool_vector(args),
        PureBuiltinId::ObarrayMake => builtin_obarray_make(args),
        PureBuiltinId::PrefixNumericValue => builtin_prefix_numeric_value(args),
        PureBuiltinId::CurrentTimeString => builtin_current_time_string(args),
        PureBuiltinId::TimeConvert => builtin_time_convert(args),
        PureBuiltinId::TimeEqualP => builtin_time_equal_p(args),
        PureBuiltinId::GamegridMakeFace => gamegrid::builtin_gamegrid_make_face(args),
        PureBuiltinId::GamegridMatchSpecList => gamegrid::builtin_gamegrid_match_spec_list(args),
    }
}

// ---------------------------------------------------------------------------
// Evaluator-dependent dispatch
// ---------------------------------------------------------------------------

#[derive(EnumString)]
enum EvalBuiltinId {
    // Arithmetic and lists that consult evaluator state
    #[strum(serialize = "random")]
    Random,
    #[strum(serialize = "assoc")]
    Assoc,
    #[strum(serialize = "alist-get")]
    AlistGet,

    // Higher order
    #[strum(serialize = "funcall")]
    Funcall,
    #[strum(serialize = "apply")]
    Apply,
    #[strum(serialize = "mapcar")]
    Mapcar,
    #[strum(serialize = "mapc")]
    Mapc,
    #[strum(serialize = "mapcan")]
    Mapcan,
    #[strum(serialize = "mapconcat")]
    Mapconcat,
    #[strum(serialize = "eval")]
    Eval,
    #[strum(serialize = "macroexpand-1")]
    Macroexpand1,
    #[strum(serialize = "macroexpand")]
    Macroexpand,
    #[strum(serialize = "macroexpand-all")]
    MacroexpandAll,
    #[strum(serialize = "sort")]
    Sort,
    #[strum(serialize = "seq-find")]
    SeqFind,
    #[strum(serialize = "seq-filter")]
    SeqFilter,
    #[strum(serialize = "seq-remove")]
    SeqRemove,
    #[strum(serialize = "seq-random-elt")]
    SeqRandomElt,
    #[strum(serialize = "seq-contains-p")]
    SeqContainsP,
    #[strum(serialize = "seq-map")]
    SeqMap,
    #[strum(serialize = "seq-reduce")]
    SeqReduce,
    #[strum(serialize = "cl-remove-if")]
    ClRemoveIf,
    #[strum(serialize = "cl-remove-if-not")]
    ClRemoveIfNot,
    #[strum(serialize = "cl-find-if")]
    ClFindIf,
    #[strum(serialize = "cl-position")]
    ClPosition,
    #[strum(serialize = "cl-some")]
    ClSome,
    #[strum(serialize = "cl-every")]
    ClEvery,

    // Strings needing the printer or regex cache
    #[strum(serialize = "split-string")]
    SplitString,
    #[strum(serialize = "string-trim")]
    StringTrim,
    #[strum(serialize = "string-trim-left")]
    StringTrimLeft,
    #[strum(serialize = "string-trim-right")]
    StringTrimRight,
    #[strum(serialize = "format")]
    Format,
    #[strum(serialize = "prin1-to-string")]
    Prin1ToString,

    // Symbols
    #[strum(serialize = "intern")]
    Intern,
    #[strum(serialize = "intern-soft")]
    InternSoft,
    #[strum(serialize = "symbol-value")]
    SymbolValue,
    #[strum(serialize = "boundp")]
    Boundp,
    #[strum(serialize = "set")]
    Set,
    #[strum(serialize = "makunbound")]
    Makunbound,
    #[strum(serialize = "default-value")]
    DefaultValue,
    #[strum(serialize = "set-default")]
    SetDefault,
    #[strum(serialize = "special-variable-p")]
    SpecialVariableP,
    #[strum(serialize = "symbol-function")]
    SymbolFunction,
    #[strum(serialize = "indirect-function")]
    IndirectFunction,
    #[strum(serialize = "fboundp")]
    Fboundp,
    #[strum(serialize = "fset")]
    Fset,
    #[strum(serialize = "fmakunbound")]
    Fmakunbound,
    #[strum(serialize = "functionp")]
    Functionp,
    #[strum(serialize = "macrop")]
    Macrop,
    #[strum(serialize = "put")]
    Put,
    #[strum(serialize = "get")]
    Get,
    #[strum(serialize = "symbol-plist")]
    SymbolPlist,
    #[strum(serialize = "setplist")]
    Setplist,

    // Output, errors and time
    #[strum(serialize = "message")]
    Message,
    #[strum(serialize = "format-message")]
    FormatMessage,
    #[strum(serialize = "error")]
    Error,
    #[strum(serialize = "user-error")]
    UserError,
    #[strum(serialize = "signal")]
    Signal,
    #[strum(serialize = "throw")]
    Throw,
    #[strum(serialize = "error-message-string")]
    ErrorMessageString,
    #[strum(serialize = "define-error")]
    DefineError,
    #[strum(serialize = "princ")]
    Princ,
    #[strum(serialize = "prin1")]
    Prin1,
    #[strum(serialize = "print")]
    Print,
    #[strum(serialize = "terpri")]
    Terpri,
    #[strum(serialize = "float-time")]
    FloatTime,
    #[strum(serialize = "current-time")]
    CurrentTime,

    // Buffers
    #[strum(serialize = "insert")]
    Insert,
    #[strum(serialize = "insert-char")]
    InsertChar,
    #[strum(serialize = "newline")]
    Newline,
    #[strum(serialize = "erase-buffer")]
    EraseBuffer,
    #[strum(serialize = "delete-region")]
    DeleteRegion,
    #[strum(serialize = "delete-char")]
    DeleteChar,
    #[strum(serialize = "delete-blank-lines")]
    DeleteBlankLines,
    #[strum(serialize = "subst-char-in-region")]
    SubstCharInRegion,
    #[strum(serialize = "untabify")]
    Untabify,
    #[strum(serialize = "indent-to")]
    IndentTo,
    #[strum(serialize = "insert-rectangle")]
    InsertRectangle,
    #[strum(serialize = "point", serialize = "el-point")]
    Point,
    #[strum(serialize = "point-min")]
    PointMin,
    #[strum(serialize = "point-max")]
    PointMax,
    #[strum(serialize = "goto-char")]
    GotoChar,
    #[strum(serialize = "buffer-size")]
    BufferSize,
    #[strum(serialize = "forward-char")]
    ForwardChar,
    #[strum(serialize = "backward-char")]
    BackwardChar,
    #[strum(serialize = "forward-line")]
    ForwardLine,
    #[strum(serialize = "beginning-of-line")]
    BeginningOfLine,
    #[strum(serialize = "end-of-line")]
    EndOfLine,
    #[strum(serialize = "line-beginning-position", serialize = "pos-bol")]
    LineBeginningPosition,
    #[strum(serialize = "line-end-position", serialize = "pos-eol")]
    LineEndPosition,
    #[strum(serialize = "count-lines")]
    CountLines,
    #[strum(serialize = "char-after")]
    CharAfter,
    #[strum(serialize = "char-before")]
    CharBefore,
    #[strum(serialize = "following-char")]
    FollowingChar,
    #[strum(serialize = "preceding-char")]
    PrecedingChar,
    #[strum(serialize = "bolp")]
    Bolp,
    #[strum(serialize = "eolp")]
    Eolp,
    #[strum(serialize = "bobp")]
    Bobp,
    #[strum(serialize = "eobp")]
    Eobp,
    #[strum(serialize = "current-column")]
    CurrentColumn,
    #[strum(serialize = "move-to-column")]
    MoveToColumn,
    #[strum(serialize = "forward-word")]
    ForwardWord,
    #[strum(serialize = "backward-word")]
    BackwardWord,
    #[strum(serialize = "skip-chars-forward")]
    SkipCharsForward,
    #[strum(serialize = "skip-chars-backward")]
    SkipCharsBackward,
    #[strum(serialize = "buffer-string")]
    BufferString,
    #[strum(serialize = "buffer-substring", serialize = "buffer-substring-no-properties")]
    BufferSubstring,
    #[strum(serialize = "append-to-buffer")]
    AppendToBuffer,
    #[strum(serialize = "insert-buffer-substring")]
    InsertBufferSubstring,
    #[strum(serialize = "current-buffer")]
    CurrentBuffer,
    #[strum(serialize = "set-buffer")]
    SetBuffer,
    #[strum(serialize = "buffer-name")]
    BufferName,
    #[strum(serialize = "get-buffer")]
    GetBuffer,
    #[strum(serialize = "get-buffer-create")]
    GetBufferCreate,
    #[strum(serialize = "generate-new-buffer")]
    GenerateNewBuffer,
    #[strum(serialize = "generate-new-buffer-name")]
    GenerateNewBufferName,
    #[strum(serialize = "buffer-list")]
    BufferList,
    #[strum(serialize = "buffer-live-p")]
    BufferLiveP,
    #[strum(serialize = "kill-buffer")]
    KillBuffer,
    #[strum(serialize = "bury-buffer")]
    BuryBuffer,
    #[strum(
        serialize = "switch-to-buffer",
        serialize = "pop-to-buffer",
        serialize = "pop-to-buffer-same-window"
    )]
    SwitchToBuffer,
    #[strum(serialize = "display-buffer")]
    DisplayBuffer,
    #[strum(serialize = "rename-buffer")]
    RenameBuffer,
    #[strum(serialize = "buffer-modified-p")]
    BufferModifiedP,
    #[strum(serialize = "set-buffer-modified-p", serialize = "restore-buffer-modified-p")]
    SetBufferModifiedP,
    #[strum(serialize = "make-local-variable")]
    MakeLocalVariable,
    #[strum(serialize = "make-variable-buffer-local")]
    MakeVariableBufferLocal,
    #[strum(serialize = "kill-local-variable")]
    KillLocalVariable,
    #[strum(serialize = "buffer-local-value")]
    BufferLocalValue,
    #[strum(serialize = "local-variable-p")]
    LocalVariableP,
    #[strum(serialize = "buffer-local-variables")]
    BufferLocalVariables,

    // Search and match data
    #[strum(serialize = "search-forward")]
    SearchForward,
    #[strum(serialize = "search-backward")]
    SearchBackward,
    #[strum(serialize = "re-search-forward", serialize = "search-forward-regexp")]
    ReSearchForward,
    #[strum(serialize = "re-search-backward", serialize = "search-backward-regexp")]
    ReSearchBackward,
    #[strum(serialize = "looking-at")]
    LookingAt,
    #[strum(serialize = "looking-at-p")]
    LookingAtP,
    #[strum(serialize = "string-match")]
    StringMatch,
    #[strum(serialize = "string-match-p")]
    StringMatchP,
    #[strum(serialize = "match-beginning")]
    MatchBeginning,
    #[strum(serialize = "match-end")]
    MatchEnd,
    #[strum(serialize = "match-string", serialize = "match-string-no-properties")]
    MatchString,
    #[strum(serialize = "match-data")]
    MatchData,
    #[strum(serialize = "set-match-data")]
    SetMatchData,
    #[strum(serialize = "replace-match")]
    ReplaceMatch,
    #[strum(serialize = "replace-regexp-in-string")]
    ReplaceRegexpInString,

    // Keymaps
    #[strum(serialize = "current-global-map")]
    CurrentGlobalMap,
    #[strum(serialize = "current-local-map")]
    CurrentLocalMap,
    #[strum(serialize = "use-local-map")]
    UseLocalMap,
    #[strum(serialize = "use-global-map")]
    UseGlobalMap,
    #[strum(serialize = "global-set-key", serialize = "keymap-global-set")]
    GlobalSetKey,
    #[strum(serialize = "local-set-key", serialize = "keymap-local-set")]
    LocalSetKey,
    #[strum(serialize = "keymap-lookup")]
    KeymapLookup,
    #[strum(serialize = "key-binding")]
    KeyBinding,

    // Hooks
    #[strum(serialize = "add-hook")]
    AddHook,
    #[strum(serialize = "remove-hook")]
    RemoveHook,
    #[strum(serialize = "run-hooks", serialize = "run-mode-hooks")]
    RunHooks,
    #[strum(serialize = "run-hook-with-args")]
    RunHookWithArgs,
    #[strum(serialize = "run-hook-with-args-until-success")]
    RunHookWithArgsUntilSuccess,
    #[strum(serialize = "run-hook-with-args-until-failure")]
    RunHookWithArgsUntilFailure,

    // Windows
    #[strum(serialize = "selected-window", serialize = "minibuffer-selected-window")]
    SelectedWindow,
    #[strum(serialize = "select-window")]
    SelectWindow,
    #[strum(serialize = "window-buffer")]
    WindowBuffer,
    #[strum(serialize = "set-window-buffer")]
    SetWindowBuffer,
    #[strum(serialize = "get-buffer-window")]
    GetBufferWindow,
    #[strum(serialize = "window-list")]
    WindowList,
    #[strum(serialize = "window-live-p")]
    WindowLiveP,
    #[strum(serialize = "window-point")]
    WindowPoint,
    #[strum(serialize = "set-window-point")]
    SetWindowPoint,
    #[strum(serialize = "window-start")]
    WindowStart,
    #[strum(serialize = "window-end")]
    WindowEnd,
    #[strum(
        serialize = "window-width",
        serialize = "window-body-width",
        serialize = "window-total-width",
        serialize = "window-max-chars-per-line"
    )]
    WindowWidth,
    #[strum(
        serialize = "window-height",
        serialize = "window-body-height",
        serialize = "window-total-height"
    )]
    WindowHeight,
    #[strum(serialize = "split-window", serialize = "split-window-vertically")]
    SplitWindow,
    #[strum(serialize = "delete-window")]
    DeleteWindow,
    #[strum(serialize = "delete-other-windows")]
    DeleteOtherWindows,
    #[strum(serialize = "current-window-configuration")]
    CurrentWindowConfiguration,
    #[strum(serialize = "set-window-configuration")]
    SetWindowConfiguration,
    #[strum(serialize = "frame-selected-window")]
    FrameSelectedWindow,

    // Timers
    #[strum(serialize = "run-at-time", serialize = "run-with-timer")]
    RunAtTime,
    #[strum(serialize = "run-with-idle-timer")]
    RunWithIdleTimer,
    #[strum(serialize = "cancel-timer")]
    CancelTimer,
    #[strum(serialize = "timer-list")]
    TimerList,
    #[strum(serialize = "timer-set-time")]
    TimerSetTime,

    // Files
    #[strum(serialize = "expand-file-name")]
    ExpandFileName,
    #[strum(serialize = "file-exists-p")]
    FileExistsP,
    #[strum(serialize = "file-readable-p")]
    FileReadableP,
    #[strum(serialize = "file-directory-p")]
    FileDirectoryP,
    #[strum(serialize = "file-attributes")]
    FileAttributes,
    #[strum(serialize = "insert-file-contents")]
    InsertFileContents,
    #[strum(serialize = "write-region")]
    WriteRegion,

    // Editor features without a model
    #[strum(serialize = "vertical-motion")]
    VerticalMotion,
    #[strum(serialize = "get-scratch-buffer-create")]
    GetScratchBufferCreate,
    #[strum(serialize = "define-obsolete-function-alias")]
    DefineObsoleteFunctionAlias,

    // Loading
    #[strum(serialize = "load")]
    Load,
    #[strum(serialize = "require")]
    Require,
    #[strum(serialize = "provide")]
    Provide,
    #[strum(serialize = "featurep")]
    Featurep,

    // Commands and modes
    #[strum(serialize = "call-interactively")]
    CallInteractively,
    #[strum(serialize = "command-execute")]
    CommandExecute,
    #[strum(serialize = "funcall-interactively")]
    FuncallInteractively,
    #[strum(serialize = "call-fn")]
    CallFn,
    #[strum(serialize = "commandp")]
    Commandp,
    #[strum(serialize = "derived-mode-p")]
    DerivedModeP,

    // Game grid
    #[strum(serialize = "gamegrid-init")]
    GamegridInit,
    #[strum(serialize = "gamegrid-init-buffer")]
    GamegridInitBuffer,
    #[strum(serialize = "gamegrid-set-cell")]
    GamegridSetCell,
    #[strum(serialize = "gamegrid-get-cell")]
    GamegridGetCell,
    #[strum(serialize = "gamegrid-start-timer")]
    GamegridStartTimer,
    #[strum(serialize = "gamegrid-set-timer")]
    GamegridSetTimer,
    #[strum(serialize = "gamegrid-kill-timer")]
    GamegridKillTimer,
    #[strum(serialize = "gamegrid-add-score")]
    GamegridAddScore,
}

fn dispatch_builtin_id_eval(eval: &mut Evaluator, id: EvalBuiltinId, args: Vec<Value>) -> EvalResult {
    use EvalBuiltinId as Id;
    match id {
        Id::Random => builtin_random(eval, args),
        Id::Assoc => builtin_assoc(eval, args),
        Id::AlistGet => builtin_alist_get(eval, args),

        Id::Funcall => builtin_funcall(eval, args),
        Id::Apply => builtin_apply(eval, args),
        Id::Mapcar => builtin_mapcar(eval, args),
        Id::Mapc => builtin_mapc(eval, args),
        Id::Mapcan => builtin_mapcan(eval, args),
        Id::Mapconcat => builtin_mapconcat(eval, args),
        Id::Eval => builtin_eval(eval, args),
        Id::Macroexpand1 => builtin_macroexpand_1(eval, args),
        Id::Macroexpand => builtin_macroexpand(eval, args),
        Id::MacroexpandAll => builtin_macroexpand_all(eval, args),
        Id::Sort => builtin_sort(eval, args),
        Id::SeqFind => builtin_seq_find(eval, args),
        Id::SeqFilter => builtin_seq_filter(eval, args),
        Id::SeqRemove => builtin_seq_remove(eval, args),
        Id::SeqRandomElt => builtin_seq_random_elt(eval, args),
        Id::SeqContainsP => builtin_seq_contains_p(eval, args),
        Id::SeqMap => builtin_seq_map(eval, args),
        Id::SeqReduce => builtin_seq_reduce(eval, args),
        Id::ClRemoveIf => builtin_cl_remove_if(eval, args),
        Id::ClRemoveIfNot => builtin_cl_remove_if_not(eval, args),
        Id::ClFindIf => builtin_cl_find_if(eval, args),
        Id::ClPosition => builtin_cl_position(eval, args),
        Id::ClSome => builtin_cl_some(eval, args),
        Id::ClEvery => builtin_cl_every(eval, args),

        Id::SplitString => builtin_split_string(eval, args),
        Id::StringTrim => builtin_string_trim(eval, args),
        Id::StringTrimLeft => builtin_string_trim_left(eval, args),
        Id::StringTrimRight => builtin_string_trim_right(eval, args),
        Id::Format => builtin_format(eval, args),
        Id::Prin1ToString => builtin_prin1_to_string(eval, args),

        Id::Intern => builtin_intern(eval, args),
        Id::InternSoft => builtin_intern_soft(eval, args),
        Id::SymbolValue => builtin_symbol_value(eval, args),
        Id::Boundp => builtin_boundp(eval, args),
        Id::Set => builtin_set(eval, args),
        Id::Makunbound => builtin_makunbound(eval, args),
        Id::DefaultValue => builtin_default_value(eval, args),
        Id::SetDefault => builtin_set_default(eval, args),
        Id::SpecialVariableP => builtin_special_variable_p(eval, args),
        Id::SymbolFunction => builtin_symbol_function(eval, args),
        Id::IndirectFunction => builtin_indirect_function(eval, args),
        Id::Fboundp => builtin_fboundp(eval, args),
        Id::Fset => builtin_fset(eval, args),
        Id::Fmakunbound => builtin_fmakunbound(eval, args),
        Id::Functionp => builtin_functionp(eval, args),
        Id::Macrop => builtin_macrop(eval, args),
        Id::Put => builtin_put(eval, args),
        Id::Get => builtin_get(eval, args),
        Id::SymbolPlist => builtin_symbol_plist(eval, args),
        Id::Setplist => builtin_setplist(eval, args),

        Id::Message => builtin_message(eval, args),
        Id::FormatMessage => builtin_format_message(eval, args),
        Id::Error => builtin_error(eval, args),
        Id::UserError => builtin_user_error(eval, args),
        Id::Signal => builtin_signal(eval, args),
        Id::Throw => builtin_throw(eval, args),
        Id::ErrorMessageString => builtin_error_message_string(eval, args),
        Id::DefineError => builtin_define_error(eval, args),
        Id::Princ => builtin_princ(eval, args),
        Id::Prin1 => builtin_prin1(eval, args),
        Id::Print => builtin_print(eval, args),
        Id::Terpri => builtin_terpri(eval, args),
        Id::FloatTime => builtin_float_time(eval, args),
        Id::CurrentTime => builtin_current_time(eval, args),

        Id::Insert => builtin_insert(eval, args),
        Id::InsertChar => builtin_insert_char(eval, args),
        Id::Newline => builtin_newline(eval, args),
        Id::EraseBuffer => builtin_erase_buffer(eval, args),
        Id::DeleteRegion => builtin_delete_region(eval, args),
        Id::DeleteChar => builtin_delete_char(eval, args),
        Id::DeleteBlankLines => builtin_delete_blank_lines(eval, args),
        Id::SubstCharInRegion => builtin_subst_char_in_region(eval, args),
        Id::Untabify => builtin_untabify(eval, args),
        Id::IndentTo => builtin_indent_to(eval, args),
        Id::InsertRectangle => builtin_insert_rectangle(eval, args),
        Id::Point => builtin_point(eval, args),
        Id::PointMin => builtin_point_min(eval, args),
        Id::PointMax => builtin_point_max(eval, args),
        Id::GotoChar => builtin_goto_char(eval, args),
        Id::BufferSize => builtin_buffer_size(eval, args),
        Id::ForwardChar => builtin_forward_char(eval, args),
        Id::BackwardChar => builtin_backward_char(eval, args),
        Id::ForwardLine => builtin_forward_line(eval, args),
        Id::BeginningOfLine => builtin_beginning_of_line(eval, args),
        Id::EndOfLine => builtin_end_of_line(eval, args),
        Id::LineBeginningPosition => builtin_line_beginning_position(eval, args),
        Id::LineEndPosition => builtin_line_end_position(eval, args),
        Id::CountLines => builtin_count_lines(eval, args),
        Id::CharAfter => builtin_char_after(eval, args),
        Id::CharBefore => builtin_char_before(eval, args),
        Id::FollowingChar => builtin_following_char(eval, args),
        Id::PrecedingChar => builtin_preceding_char(eval, args),
        Id::Bolp => builtin_bolp(eval, args),
        Id::Eolp => builtin_eolp(eval, args),
        Id::Bobp => builtin_bobp(eval, args),
        Id::Eobp => builtin_eobp(eval, args),
        Id::CurrentColumn => builtin_current_column(eval, args),
        Id::MoveToColumn => builtin_move_to_column(eval, args),
        Id::ForwardWord => builtin_forward_word(eval, args),
        Id::BackwardWord => builtin_backward_word(eval, args),
        Id::SkipCharsForward => builtin_skip_chars_forward(eval, args),
        Id::SkipCharsBackward => builtin_skip_chars_backward(eval, args),
        Id::BufferString => builtin_buffer_string(eval, args),
        Id::BufferSubstring => builtin_buffer_substring(eval, args),
        Id::AppendToBuffer => builtin_append_to_buffer(eval, args),
        Id::InsertBufferSubstring => builtin_insert_buffer_substring(eval, args),
        Id::CurrentBuffer => builtin_current_buffer(eval, args),
        Id::SetBuffer => builtin_set_buffer(eval, args),
        Id::BufferName => builtin_buffer_name(eval, args),
        Id::GetBuffer => builtin_get_buffer(eval, args),
        Id::GetBufferCreate => builtin_get_buffer_create(eval, args),
        Id::GenerateNewBuffer => builtin_generate_new_buffer(eval, args),
        Id::GenerateNewBufferName => builtin_generate_new_buffer_name(eval, args),
        Id::BufferList => builtin_buffer_list(eval, args),
        Id::BufferLiveP => builtin_buffer_live_p(eval, args),
        Id::KillBuffer => builtin_kill_buffer(eval, args),
        Id::BuryBuffer => builtin_bury_buffer(eval, args),
        Id::SwitchToBuffer => builtin_switch_to_buffer(eval, args),
        Id::DisplayBuffer => builtin_display_buffer(eval, args),
        Id::RenameBuffer => builtin_rename_buffer(eval, args),
        Id::BufferModifiedP => builtin_buffer_modified_p(eval, args),
        Id::SetBufferModifiedP => builtin_set_buffer_modified_p(eval, args),
        Id::MakeLocalVariable => builtin_make_local_variable(eval, args),
        Id::MakeVariableBufferLocal => builtin_make_variable_buffer_local(eval, args),
        Id::KillLocalVariable => builtin_kill_local_variable(eval, args),
        Id::BufferLocalValue => builtin_buffer_local_value(eval, args),
        Id::LocalVariableP => builtin_local_variable_p(eval, args),
        Id::BufferLocalVariables => builtin_buffer_local_variables(eval, args),

        Id::SearchForward => builtin_search_forward(eval, args),
        Id::SearchBackward => builtin_search_backward(eval, args),
        Id::ReSearchForward => builtin_re_search_forward(eval, args),
        Id::ReSearchBackward => builtin_re_search_backward(eval, args),
        Id::LookingAt => builtin_looking_at(eval, args),
        Id::LookingAtP => builtin_looking_at_p(eval, args),
        Id::StringMatch => builtin_string_match(eval, args),
        Id::StringMatchP => builtin_string_match_p(eval, args),
        Id::MatchBeginning => builtin_match_beginning(eval, args),
        Id::MatchEnd => builtin_match_end(eval, args),
        Id::MatchString => builtin_match_string(eval, args),
        Id::MatchData => builtin_match_data(eval, args),
        Id::SetMatchData => builtin_set_match_data(eval, args),
        Id::ReplaceMatch => builtin_replace_match(eval, args),
        Id::ReplaceRegexpInString => builtin_replace_regexp_in_string(eval, args),

        Id::CurrentGlobalMap => builtin_current_global_map(eval, args),
        Id::CurrentLocalMap => builtin_current_local_map(eval, args),
        Id::UseLocalMap => builtin_use_local_map(eval, args),
        Id::UseGlobalMap => builtin_use_global_map(eval, args),
        Id::GlobalSetKey => builtin_global_set_key(eval, args),
        Id::LocalSetKey => builtin_local_set_key(eval, args),
        Id::KeymapLookup => builtin_keymap_lookup(eval, args),
        Id::KeyBinding => builtin_key_binding(eval, args),

        Id::AddHook => builtin_add_hook(eval, args),
        Id::RemoveHook => builtin_remove_hook(eval, args),
        Id::RunHooks => builtin_run_hooks(eval, args),
        Id::RunHookWithArgs => builtin_run_hook_with_args(eval, args),
        Id::RunHookWithArgsUntilSuccess => builtin_run_hook_with_args_until_success(eval, args),
        Id::RunHookWithArgsUntilFailure => builtin_run_hook_with_args_until_failure(eval, args),

        Id::SelectedWindow => builtin_selected_window(eval, args),
        Id::SelectWindow => builtin_select_window(eval, args),
        Id::WindowBuffer => builtin_window_buffer(eval, args),
        Id::SetWindowBuffer => builtin_set_window_buffer(eval, args),
        Id::GetBufferWindow => builtin_get_buffer_window(eval, args),
        Id::WindowList => builtin_window_list(eval, args),
        Id::WindowLiveP => builtin_window_live_p(eval, args),
        Id::WindowPoint => builtin_window_point(eval, args),
        Id::SetWindowPoint => builtin_set_window_point(eval, args),
        Id::WindowStart => builtin_window_start(eval, args),
        Id::WindowEnd => builtin_window_end(eval, args),
        Id::WindowWidth => builtin_window_width(eval, args),
        Id::WindowHeight => builtin_window_height(eval, args),
        Id::SplitWindow => builtin_split_window(eval, args),
        Id::DeleteWindow => builtin_delete_window(eval, args),
        Id::DeleteOtherWindows => builtin_delete_other_windows(eval, args),
        Id::CurrentWindowConfiguration => builtin_current_window_configuration(eval, args),
        Id::SetWindowConfiguration => builtin_set_window_configuration(eval, args),
        Id::FrameSelectedWindow => builtin_frame_selected_window(eval, args),

        Id::RunAtTime => builtin_run_at_time(eval, args),
        Id::RunWithIdleTimer => builtin_run_with_idle_timer(eval, args),
        Id::CancelTimer => builtin_cancel_timer(eval, args),
        Id::TimerList => builtin_timer_list(eval, args),
        Id::TimerSetTime => builtin_timer_set_time(eval, args),

        Id::ExpandFileName => builtin_expand_file_name(eval, args),
        Id::FileExistsP => builtin_file_exists_p(eval, args),
        Id::FileReadableP => builtin_file_readable_p(eval, args),
        Id::FileDirectoryP => builtin_file_directory_p(eval, args),
        Id::FileAttributes => builtin_file_attributes(eval, args),
        Id::InsertFileContents => builtin_insert_file_contents(eval, args),
        Id::WriteRegion => builtin_write_region(eval, args),

        Id::VerticalMotion => builtin_vertical_motion(eval, args),
        Id::GetScratchBufferCreate => builtin_get_scratch_buffer_create(eval, args),
        Id::DefineObsoleteFunctionAlias => builtin_define_obsolete_function_alias(eval, args),

        Id::Load => load::builtin_load(eval, args),
        Id::Require => load::builtin_require(eval, args),
        Id::Provide => load::builtin_provide(eval, args),
        Id::Featurep => load::builtin_featurep(eval, args),

        Id::CallInteractively => interactive::builtin_call_interactively(eval, args),
        Id::CommandExecute => interactive::builtin_command_execute(eval, args),
        Id::FuncallInteractively => interactive::builtin_funcall_interactively(eval, args),
        Id::CallFn => interactive::builtin_call_fn(eval, args),
        Id::Commandp => interactive::builtin_commandp(eval, args),
        Id::DerivedModeP => modes::builtin_derived_mode_p(eval, args),

        Id::GamegridInit => gamegrid::builtin_gamegrid_init(eval, args),
        Id::GamegridInitBuffer => gamegrid::builtin_gamegrid_init_buffer(eval, args),
        Id::GamegridSetCell => gamegrid::builtin_gamegrid_set_cell(eval, args),
        Id::GamegridGetCell => gamegrid::builtin_gamegrid_get_cell(eval, args),
        Id::GamegridStartTimer => gamegrid::builtin_gamegrid_start_timer(eval, args),
        Id::GamegridSetTimer => gamegrid::builtin_gamegrid_set_timer(eval, args),
        Id::GamegridKillTimer => gamegrid::builtin_gamegrid_kill_timer(eval, args),
        Id::GamegridAddScore => gamegrid::builtin_gamegrid_add_score(eval, args),
    }
}

/// Whether `name` names a primitive.
pub(crate) fn is_builtin(name: &str) -> bool {
    PureBuiltinId::from_str(name).is_ok()
        || EvalBuiltinId::from_str(name).is_ok()
        || stubs::is_constant_stub(name)
}

/// Call the primitive `name`, or return `None` if there is no such primitive.
pub(crate) fn dispatch_builtin(
    eval: &mut Evaluator,
    name: &str,
    args: Vec<Value>,
) -> Option<EvalResult> {
    if let Ok(id) = EvalBuiltinId::from_str(name) {
        return Some(dispatch_builtin_id_eval(eval, id, args));
    }
    if let Ok(id) = PureBuiltinId::from_str(name) {
        return Some(dispatch_builtin_id_pure(id, args));
    }
    stubs::constant_stub(name).map(Ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_share_an_implementation() {
        let mut ev = Evaluator::new();
        let out = ev
            .eval_str(
                "(list (succ 4) (1+ 4) (int-to-string 7) (string= \"a\" \"a\")
                       (rplaca (list 1 2) 9) (window-body-width))",
            )
            .unwrap();
        assert_eq!(out.to_string(), "(5 5 \"7\" t 9 80)");
    }

    #[test]
    fn builtin_arity_errors_are_structured() {
        let mut ev = Evaluator::new();
        match ev.eval_str("(car 1 2)") {
            Err(EvalError::Arity(err)) => {
                assert_eq!(err.function.as_deref(), Some("car"));
                assert_eq!(err.minimum, 1);
                assert!(err.exact);
                assert_eq!(err.received, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            ev.eval_str("(upcase (quote sym))"),
            Err(EvalError::TypeMismatch(_))
        ));
    }

    #[test]
    fn registry_covers_stubs_and_rejects_unknown_names() {
        assert!(is_builtin("put-text-property"));
        assert!(is_builtin("identity"));
        assert!(is_builtin("search-forward-regexp"));
        assert!(!is_builtin("frobnicate-widget"));
        let mut ev = Evaluator::new();
        assert!(dispatch_builtin(&mut ev, "frobnicate-widget", vec![]).is_none());
        assert_eq!(
            dispatch_builtin(&mut ev, "redisplay", vec![]).map(|r| r.ok()),
            Some(Some(Value::Nil))
        );
    }

    #[test]
    fn expect_helpers_report_bounds() {
        let err = expect_range_args("f", &[const { Value::Nil }; 4], 1, 3).unwrap_err();
        match err {
            Flow::Arity(err) => {
                assert_eq!((err.minimum, err.maximum, err.received), (1, Some(3), 4));
                assert!(!err.exact);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(expect_natnum(&Value::Int(3)).unwrap(), 3);
        assert!(expect_natnum(&Value::Int(-1)).is_err());
    }
}
