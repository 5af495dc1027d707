//! Glob qualifiers: the `(...)` suffix restricting matches by file
//! attribute, and the global scan flags that ride along with it.
//!
//! A qualifier string parses into two things:
//! - a [`Predicate`] tree evaluated per candidate: comma-separated
//!   alternatives are OR-ed, qualifiers within one alternative are AND-ed,
//!   `^` negates and `-` retargets a test at the symlink target
//! - updates to [`GlobOptions`]: sort keys, null-glob, mark-dirs,
//!   short-circuit count, index range, prepend/append words
//!
//! Parsing is strict: a malformed numeric argument, an unresolvable
//! user/group name, or an unterminated delimiter fails the whole glob.

use std::path::Path;

use crate::expand::GlobOptions;
use crate::fs::{FileKind, FileMeta, ScanFs};
use crate::script::ScriptEval;
use crate::sort::{RangeSpec, SortKey, SortKeyKind, MAX_SORT_KEYS};
use crate::GlobError;

/// One candidate file under predicate evaluation.
pub struct Candidate<'a> {
    /// The produced match path.
    pub path: &'a Path,
    /// Stat of the object itself (never following a final symlink).
    pub meta: &'a FileMeta,
    /// Stat following the symlink, when some test or key requested it.
    /// `None` for a dangling link.
    pub target: Option<&'a FileMeta>,
}

/// Capabilities available to predicates at evaluation time.
pub struct QualEnv<'a> {
    pub fs: &'a dyn ScanFs,
    pub eval: Option<&'a dyn ScriptEval>,
    /// Scan start time, for age comparisons.
    pub now: i64,
}

/// A single file test; one implementation per qualifier letter.
pub trait QualTest {
    fn test(&self, cand: &Candidate<'_>, env: &QualEnv<'_>) -> bool;
}

/// The qualifier predicate tree.
///
/// `And`/`Or` mirror the comma syntax; `Not` is the `^` sense; a `Leaf`
/// carries its own follow flag (the `-` sense), swapping in the target's
/// stat before the test runs. Leaves are reference-counted so merging two
/// qualifier groups can distribute one side over the other's alternatives
/// without re-parsing.
pub enum Predicate {
    Leaf {
        test: std::rc::Rc<dyn QualTest>,
        follow: bool,
    },
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl std::fmt::Debug for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::Leaf { follow, .. } => f
                .debug_struct("Leaf")
                .field("follow", follow)
                .finish_non_exhaustive(),
            Predicate::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
            Predicate::And(a, b) => f.debug_tuple("And").field(a).field(b).finish(),
            Predicate::Or(a, b) => f.debug_tuple("Or").field(a).field(b).finish(),
        }
    }
}

impl Predicate {
    /// Evaluate against one candidate. `And` short-circuits on the first
    /// rejection, `Or` on the first acceptance.
    pub fn accepts(&self, cand: &Candidate<'_>, env: &QualEnv<'_>) -> bool {
        match self {
            Predicate::Leaf { test, follow } => {
                if *follow {
                    match cand.target {
                        Some(meta) => test.test(
                            &Candidate {
                                path: cand.path,
                                meta,
                                target: cand.target,
                            },
                            env,
                        ),
                        // A follow test on a dangling link never accepts.
                        None => false,
                    }
                } else {
                    test.test(cand, env)
                }
            }
            Predicate::Not(inner) => !inner.accepts(cand, env),
            Predicate::And(a, b) => a.accepts(cand, env) && b.accepts(cand, env),
            Predicate::Or(a, b) => a.accepts(cand, env) || b.accepts(cand, env),
        }
    }

    /// Whether any leaf wants the symlink target's stat.
    pub fn needs_follow(&self) -> bool {
        match self {
            Predicate::Leaf { follow, .. } => *follow,
            Predicate::Not(inner) => inner.needs_follow(),
            Predicate::And(a, b) | Predicate::Or(a, b) => a.needs_follow() || b.needs_follow(),
        }
    }

    fn and(acc: Option<Predicate>, next: Predicate) -> Predicate {
        match acc {
            Some(prev) => Predicate::And(Box::new(prev), Box::new(next)),
            None => next,
        }
    }

    /// Combine two qualifier groups: AND, distributed over the alternatives
    /// of both sides so left-to-right evaluation order is preserved.
    pub fn merge(a: Predicate, b: Predicate) -> Predicate {
        match a {
            Predicate::Or(x, y) => Predicate::Or(
                Box::new(Predicate::merge(*x, b.share())),
                Box::new(Predicate::merge(*y, b)),
            ),
            a => match b {
                Predicate::Or(u, v) => Predicate::Or(
                    Box::new(Predicate::merge(a.share(), *u)),
                    Box::new(Predicate::merge(a, *v)),
                ),
                b => Predicate::And(Box::new(a), Box::new(b)),
            },
        }
    }

    /// Structural copy sharing the leaf tests, for distribution.
    fn share(&self) -> Predicate {
        match self {
            Predicate::Leaf { test, follow } => Predicate::Leaf {
                test: test.clone(),
                follow: *follow,
            },
            Predicate::Not(inner) => Predicate::Not(Box::new(inner.share())),
            Predicate::And(a, b) => Predicate::And(Box::new(a.share()), Box::new(b.share())),
            Predicate::Or(a, b) => Predicate::Or(Box::new(a.share()), Box::new(b.share())),
        }
    }
}

/// Comparison direction from a `+`/`-` prefix on a numeric argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpDir {
    /// `+n`: strictly greater.
    Over,
    /// `-n`: strictly less.
    Under,
    /// bare `n`: exactly equal.
    Equal,
}

impl CmpDir {
    fn holds<T: Ord>(self, value: T, bound: T) -> bool {
        match self {
            CmpDir::Over => value > bound,
            CmpDir::Under => value < bound,
            CmpDir::Equal => value == bound,
        }
    }
}

// ── concrete tests ────────────────────────────────────────────────────────

struct KindIs(FileKind);

impl QualTest for KindIs {
    fn test(&self, cand: &Candidate<'_>, _env: &QualEnv<'_>) -> bool {
        cand.meta.kind() == self.0
    }
}

/// `%` with no subtype: block or character device.
struct AnyDevice;

impl QualTest for AnyDevice {
    fn test(&self, cand: &Candidate<'_>, _env: &QualEnv<'_>) -> bool {
        matches!(
            cand.meta.kind(),
            FileKind::BlockDevice | FileKind::CharDevice
        )
    }
}

/// `*`: regular and executable by someone.
struct ExecutableRegular;

impl QualTest for ExecutableRegular {
    fn test(&self, cand: &Candidate<'_>, _env: &QualEnv<'_>) -> bool {
        cand.meta.kind() == FileKind::Regular && cand.meta.mode & 0o111 != 0
    }
}

struct PermBits(u32);

impl QualTest for PermBits {
    fn test(&self, cand: &Candidate<'_>, _env: &QualEnv<'_>) -> bool {
        cand.meta.mode & self.0 == self.0
    }
}

#[derive(Debug, Clone, Copy)]
enum ModeOp {
    /// `=`: the masked mode equals the given bits exactly.
    Exact,
    /// `+`: all given bits set.
    AllSet,
    /// `-`: none of the given bits set.
    NoneSet,
}

#[derive(Debug, Clone, Copy)]
struct ModeClause {
    op: ModeOp,
    bits: u32,
    mask: u32,
}

struct ModeSpec(Vec<ModeClause>);

impl QualTest for ModeSpec {
    fn test(&self, cand: &Candidate<'_>, _env: &QualEnv<'_>) -> bool {
        let mode = cand.meta.mode;
        self.0.iter().all(|clause| match clause.op {
            ModeOp::Exact => mode & clause.mask == clause.bits,
            ModeOp::AllSet => mode & clause.bits == clause.bits,
            ModeOp::NoneSet => mode & clause.bits == 0,
        })
    }
}

struct OwnerIs(u32);

impl QualTest for OwnerIs {
    fn test(&self, cand: &Candidate<'_>, _env: &QualEnv<'_>) -> bool {
        cand.meta.uid == self.0
    }
}

struct GroupIs(u32);

impl QualTest for GroupIs {
    fn test(&self, cand: &Candidate<'_>, _env: &QualEnv<'_>) -> bool {
        cand.meta.gid == self.0
    }
}

struct SizeTest {
    dir: CmpDir,
    unit: u64,
    n: u64,
}

impl QualTest for SizeTest {
    fn test(&self, cand: &Candidate<'_>, _env: &QualEnv<'_>) -> bool {
        // Size in units, rounded up: a 1-byte file occupies one block.
        let value = cand.meta.size.div_ceil(self.unit);
        self.dir.holds(value, self.n)
    }
}

#[derive(Debug, Clone, Copy)]
enum TimeField {
    Access,
    Modify,
    Change,
}

struct TimeTest {
    which: TimeField,
    dir: CmpDir,
    unit: i64,
    n: i64,
}

impl QualTest for TimeTest {
    fn test(&self, cand: &Candidate<'_>, env: &QualEnv<'_>) -> bool {
        let t = match self.which {
            TimeField::Access => cand.meta.atime,
            TimeField::Modify => cand.meta.mtime,
            TimeField::Change => cand.meta.ctime,
        };
        let age_units = (env.now - t) / self.unit;
        self.dir.holds(age_units, self.n)
    }
}

struct LinksTest {
    dir: CmpDir,
    n: u64,
}

impl QualTest for LinksTest {
    fn test(&self, cand: &Candidate<'_>, _env: &QualEnv<'_>) -> bool {
        self.dir.holds(cand.meta.nlink, self.n)
    }
}

struct DevTest {
    dir: CmpDir,
    n: u64,
}

impl QualTest for DevTest {
    fn test(&self, cand: &Candidate<'_>, _env: &QualEnv<'_>) -> bool {
        self.dir.holds(cand.meta.dev, self.n)
    }
}

/// `F`: a directory with at least one entry.
struct NonEmptyDir;

impl QualTest for NonEmptyDir {
    fn test(&self, cand: &Candidate<'_>, env: &QualEnv<'_>) -> bool {
        cand.meta.is_dir()
            && env
                .fs
                .read_dir(cand.path)
                .map(|entries| !entries.is_empty())
                .unwrap_or(false)
    }
}

/// `e`/`+`: run a script with the candidate bound to `REPLY`; accept on
/// exit status zero.
struct ScriptTest {
    code: String,
}

impl QualTest for ScriptTest {
    fn test(&self, cand: &Candidate<'_>, env: &QualEnv<'_>) -> bool {
        let Some(eval) = env.eval else {
            tracing::warn!("'e' qualifier used without a script evaluator");
            return false;
        };
        match eval.eval(&self.code, &cand.path.to_string_lossy()) {
            Ok(status) => status == 0,
            Err(err) => {
                tracing::debug!("script qualifier failed: {}", err);
                false
            }
        }
    }
}

// ── parsing ───────────────────────────────────────────────────────────────

/// Parse a qualifier string (the text inside the trailing parens, with any
/// leading `#q` marker already allowed for).
///
/// Returns the predicate tree, or `None` when the string contained only
/// global flags (or an empty alternative, which accepts everything).
/// Updates `opts` in place for the global flags.
pub fn parse_qualifiers(
    text: &str,
    opts: &mut GlobOptions,
) -> Result<Option<Predicate>, GlobError> {
    let body = text.strip_prefix("#q").unwrap_or(text);
    let mut parser = QualParser {
        chars: body.chars().collect(),
        i: 0,
        opts,
    };
    parser.parse()
}

struct QualParser<'a> {
    chars: Vec<char>,
    i: usize,
    opts: &'a mut GlobOptions,
}

impl QualParser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.i).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.i += 1;
        Some(c)
    }

    fn parse(&mut self) -> Result<Option<Predicate>, GlobError> {
        let mut alternatives: Vec<Option<Predicate>> = Vec::new();
        let mut chain: Option<Predicate> = None;
        let mut negate = false;
        let mut follow = false;

        while let Some(c) = self.bump() {
            match c {
                ',' => {
                    alternatives.push(chain.take());
                    negate = false;
                    follow = false;
                }
                '^' => negate = !negate,
                '-' => follow = !follow,
                'M' => self.opts.mark_dirs = !negate,
                'T' => self.opts.list_types = !negate,
                'N' => self.opts.null_glob = !negate,
                'D' => self.opts.glob_dots = !negate,
                'n' => self.opts.numeric_sort = !negate,
                'Y' => {
                    let n = self.parse_number::<u64>("Y")?;
                    if n == 0 {
                        return Err(GlobError::Parse(
                            "short-circuit count 'Y' must be positive".into(),
                        ));
                    }
                    self.opts.shortcircuit = n as usize;
                }
                'P' => {
                    let word = self.delimited("P")?;
                    if negate {
                        self.opts.append.push(word);
                    } else {
                        self.opts.prepend.push(word);
                    }
                }
                'o' => self.parse_sort_key(false, follow)?,
                'O' => self.parse_sort_key(true, follow)?,
                '[' => self.parse_range()?,
                _ => {
                    let test = self.parse_test(c)?;
                    let mut leaf = Predicate::Leaf { test, follow };
                    if negate {
                        leaf = Predicate::Not(Box::new(leaf));
                    }
                    chain = Some(Predicate::and(chain.take(), leaf));
                }
            }
        }
        alternatives.push(chain.take());

        // An empty alternative accepts everything, which makes the whole
        // disjunction unconditional.
        if alternatives.iter().any(Option::is_none) {
            return Ok(None);
        }

        let mut result: Option<Predicate> = None;
        for alt in alternatives.into_iter().flatten() {
            result = Some(match result {
                Some(prev) => Predicate::Or(Box::new(prev), Box::new(alt)),
                None => alt,
            });
        }
        Ok(result)
    }

    fn parse_test(&mut self, letter: char) -> Result<std::rc::Rc<dyn QualTest>, GlobError> {
        Ok(match letter {
            '/' => std::rc::Rc::new(KindIs(FileKind::Directory)),
            '.' => std::rc::Rc::new(KindIs(FileKind::Regular)),
            '@' => std::rc::Rc::new(KindIs(FileKind::Symlink)),
            '=' => std::rc::Rc::new(KindIs(FileKind::Socket)),
            'p' => std::rc::Rc::new(KindIs(FileKind::Fifo)),
            '*' => std::rc::Rc::new(ExecutableRegular),
            '%' => match self.peek() {
                Some('b') => {
                    self.i += 1;
                    std::rc::Rc::new(KindIs(FileKind::BlockDevice))
                }
                Some('c') => {
                    self.i += 1;
                    std::rc::Rc::new(KindIs(FileKind::CharDevice))
                }
                _ => std::rc::Rc::new(AnyDevice),
            },
            'r' => std::rc::Rc::new(PermBits(0o400)),
            'w' => std::rc::Rc::new(PermBits(0o200)),
            'x' => std::rc::Rc::new(PermBits(0o100)),
            'A' => std::rc::Rc::new(PermBits(0o040)),
            'I' => std::rc::Rc::new(PermBits(0o020)),
            'E' => std::rc::Rc::new(PermBits(0o010)),
            'R' => std::rc::Rc::new(PermBits(0o004)),
            'W' => std::rc::Rc::new(PermBits(0o002)),
            'X' => std::rc::Rc::new(PermBits(0o001)),
            's' => std::rc::Rc::new(PermBits(0o4000)),
            'S' => std::rc::Rc::new(PermBits(0o2000)),
            't' => std::rc::Rc::new(PermBits(0o1000)),
            'f' => std::rc::Rc::new(self.parse_mode_spec()?),
            'u' => std::rc::Rc::new(OwnerIs(self.parse_owner(Ownership::User)?)),
            'g' => std::rc::Rc::new(GroupIs(self.parse_owner(Ownership::Group)?)),
            'U' => std::rc::Rc::new(OwnerIs(nix::unistd::geteuid().as_raw())),
            'G' => std::rc::Rc::new(GroupIs(nix::unistd::getegid().as_raw())),
            'L' => {
                let unit = self.parse_size_unit();
                let dir = self.parse_cmp_dir();
                let n = self.parse_number::<u64>("L")?;
                std::rc::Rc::new(SizeTest { dir, unit, n })
            }
            'a' | 'm' | 'c' => {
                let which = match letter {
                    'a' => TimeField::Access,
                    'm' => TimeField::Modify,
                    _ => TimeField::Change,
                };
                let unit = self.parse_time_unit();
                let dir = self.parse_cmp_dir();
                let n = self.parse_number::<i64>("time")?;
                std::rc::Rc::new(TimeTest {
                    which,
                    dir,
                    unit,
                    n,
                })
            }
            'l' => {
                let dir = self.parse_cmp_dir();
                let n = self.parse_number::<u64>("l")?;
                std::rc::Rc::new(LinksTest { dir, n })
            }
            'd' => {
                let dir = self.parse_cmp_dir();
                let n = self.parse_number::<u64>("d")?;
                std::rc::Rc::new(DevTest { dir, n })
            }
            'F' => std::rc::Rc::new(NonEmptyDir),
            'e' => std::rc::Rc::new(ScriptTest {
                code: self.delimited("e")?,
            }),
            '+' => std::rc::Rc::new(ScriptTest {
                code: self.ident("+")?,
            }),
            other => {
                return Err(GlobError::Parse(format!(
                    "unknown glob qualifier '{}'",
                    other
                )))
            }
        })
    }

    fn parse_cmp_dir(&mut self) -> CmpDir {
        match self.peek() {
            Some('+') => {
                self.i += 1;
                CmpDir::Over
            }
            Some('-') => {
                self.i += 1;
                CmpDir::Under
            }
            _ => CmpDir::Equal,
        }
    }

    fn parse_size_unit(&mut self) -> u64 {
        let unit = match self.peek() {
            Some('p' | 'P') => 512,
            Some('k' | 'K') => 1 << 10,
            Some('m' | 'M') => 1 << 20,
            Some('g' | 'G') => 1 << 30,
            Some('t' | 'T') => 1 << 40,
            _ => return 1,
        };
        self.i += 1;
        unit
    }

    fn parse_time_unit(&mut self) -> i64 {
        let unit = match self.peek() {
            Some('s') => 1,
            Some('m') => 60,
            Some('h') => 3600,
            Some('d') => 86400,
            Some('w') => 7 * 86400,
            Some('M') => 30 * 86400,
            _ => return 86400,
        };
        self.i += 1;
        unit
    }

    fn parse_number<T: std::str::FromStr>(&mut self, what: &str) -> Result<T, GlobError> {
        let start = self.i;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.i += 1;
        }
        if self.i == start {
            return Err(GlobError::Parse(format!(
                "missing number after '{}' qualifier",
                what
            )));
        }
        let digits: String = self.chars[start..self.i].iter().collect();
        digits.parse().map_err(|_| {
            GlobError::Parse(format!("bad number '{}' after '{}' qualifier", digits, what))
        })
    }

    /// Read a delimited argument: the next char opens, its mate closes.
    /// Brackets pair up; anything else closes with itself.
    fn delimited(&mut self, what: &str) -> Result<String, GlobError> {
        let open = self.bump().ok_or_else(|| {
            GlobError::Parse(format!("missing argument after '{}' qualifier", what))
        })?;
        let close = match open {
            '(' => ')',
            '[' => ']',
            '{' => '}',
            '<' => '>',
            c => c,
        };
        let start = self.i;
        while let Some(c) = self.peek() {
            if c == close {
                let arg: String = self.chars[start..self.i].iter().collect();
                self.i += 1;
                return Ok(arg);
            }
            self.i += 1;
        }
        Err(GlobError::Parse(format!(
            "unterminated argument after '{}' qualifier",
            what
        )))
    }

    fn ident(&mut self, what: &str) -> Result<String, GlobError> {
        let start = self.i;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.i += 1;
        }
        if self.i == start {
            return Err(GlobError::Parse(format!(
                "missing name after '{}' qualifier",
                what
            )));
        }
        Ok(self.chars[start..self.i].iter().collect())
    }

    fn parse_owner(&mut self, which: Ownership) -> Result<u32, GlobError> {
        if matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            return self.parse_number::<u32>(which.letter());
        }
        let name = self.delimited(which.letter())?;
        which.resolve(&name)
    }

    fn parse_mode_spec(&mut self) -> Result<ModeSpec, GlobError> {
        // Octal forms: f755, f=755, f+111, f-022
        let (op, skip) = match self.peek() {
            Some('=') => (Some(ModeOp::Exact), 1),
            Some('+') => (Some(ModeOp::AllSet), 1),
            Some('-') => (Some(ModeOp::NoneSet), 1),
            Some(c) if c.is_digit(8) => (Some(ModeOp::Exact), 0),
            _ => (None, 0),
        };

        if let Some(op) = op {
            self.i += skip;
            let start = self.i;
            while matches!(self.peek(), Some(c) if c.is_digit(8)) {
                self.i += 1;
            }
            if self.i == start {
                return Err(GlobError::Parse(
                    "missing octal digits in 'f' mode spec".into(),
                ));
            }
            let digits: String = self.chars[start..self.i].iter().collect();
            let bits = u32::from_str_radix(&digits, 8)
                .map_err(|_| GlobError::Parse(format!("bad mode spec '{}'", digits)))?;
            return Ok(ModeSpec(vec![ModeClause {
                op,
                bits,
                mask: 0o7777,
            }]));
        }

        // Symbolic form, delimited: f:u+w,o-x:
        let spec = self.delimited("f")?;
        let clauses = spec
            .split(',')
            .map(parse_symbolic_clause)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ModeSpec(clauses))
    }

    fn parse_sort_key(&mut self, descending: bool, follow: bool) -> Result<(), GlobError> {
        let kind = match self.bump() {
            Some('n') => SortKeyKind::Name,
            Some('L') => SortKeyKind::Size,
            Some('l') => SortKeyKind::Links,
            Some('a') => SortKeyKind::Atime,
            Some('m') => SortKeyKind::Mtime,
            Some('c') => SortKeyKind::Ctime,
            Some('d') => SortKeyKind::Depth,
            Some('N') => {
                self.opts.unsorted = true;
                return Ok(());
            }
            Some('e') => SortKeyKind::Eval(self.delimited("oe")?),
            Some('+') => SortKeyKind::Eval(self.ident("o+")?),
            other => {
                return Err(GlobError::Parse(format!(
                    "bad sort key '{}'",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        };
        if self.opts.sort_keys.len() >= MAX_SORT_KEYS {
            return Err(GlobError::Parse(format!(
                "too many sort keys (max {})",
                MAX_SORT_KEYS
            )));
        }
        self.opts.sort_keys.push(SortKey {
            kind,
            descending,
            follow,
        });
        Ok(())
    }

    fn parse_range(&mut self) -> Result<(), GlobError> {
        let first = self.parse_signed()?;
        match self.bump() {
            Some(']') => {
                let idx = first.ok_or_else(|| {
                    GlobError::Parse("empty '[...]' index subscript".into())
                })?;
                self.opts.range = Some(RangeSpec::Single(idx));
                Ok(())
            }
            Some(',') => {
                let last = self.parse_signed()?;
                match self.bump() {
                    Some(']') => {
                        self.opts.range = Some(RangeSpec::Slice { first, last });
                        Ok(())
                    }
                    _ => Err(GlobError::Parse("unterminated '[first,last]' range".into())),
                }
            }
            _ => Err(GlobError::Parse("unterminated '[...]' subscript".into())),
        }
    }

    fn parse_signed(&mut self) -> Result<Option<i64>, GlobError> {
        let start = self.i;
        if matches!(self.peek(), Some('-')) {
            self.i += 1;
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.i += 1;
        }
        if self.i == start {
            return Ok(None);
        }
        let digits: String = self.chars[start..self.i].iter().collect();
        if digits == "-" {
            return Err(GlobError::Parse("bad index in '[...]' subscript".into()));
        }
        digits
            .parse()
            .map(Some)
            .map_err(|_| GlobError::Parse(format!("bad index '{}' in '[...]' subscript", digits)))
    }
}

#[derive(Clone, Copy)]
enum Ownership {
    User,
    Group,
}

impl Ownership {
    fn letter(self) -> &'static str {
        match self {
            Ownership::User => "u",
            Ownership::Group => "g",
        }
    }

    fn resolve(self, name: &str) -> Result<u32, GlobError> {
        match self {
            Ownership::User => nix::unistd::User::from_name(name)
                .ok()
                .flatten()
                .map(|u| u.uid.as_raw())
                .ok_or_else(|| GlobError::Parse(format!("unknown user name '{}'", name))),
            Ownership::Group => nix::unistd::Group::from_name(name)
                .ok()
                .flatten()
                .map(|g| g.gid.as_raw())
                .ok_or_else(|| GlobError::Parse(format!("unknown group name '{}'", name))),
        }
    }
}

/// One symbolic mode clause like `u+w` or `go-rx`.
fn parse_symbolic_clause(clause: &str) -> Result<ModeClause, GlobError> {
    let bad = || GlobError::Parse(format!("bad mode clause '{}'", clause));

    let op_pos = clause
        .find(['+', '-', '='])
        .ok_or_else(bad)?;
    let (who_str, rest) = clause.split_at(op_pos);
    let mut rest_chars = rest.chars();
    let op = match rest_chars.next() {
        Some('+') => ModeOp::AllSet,
        Some('-') => ModeOp::NoneSet,
        Some('=') => ModeOp::Exact,
        _ => return Err(bad()),
    };
    let perms: String = rest_chars.collect();
    if perms.is_empty() {
        return Err(bad());
    }

    let whos: Vec<char> = if who_str.is_empty() {
        vec!['a']
    } else {
        who_str.chars().collect()
    };

    let mut bits = 0u32;
    let mut mask = 0u32;
    for who in &whos {
        let (shift, who_mask) = match who {
            'u' => (6, 0o4700),
            'g' => (3, 0o2070),
            'o' => (0, 0o1007),
            'a' => (0, 0o7777),
            _ => return Err(bad()),
        };
        mask |= who_mask;
        for p in perms.chars() {
            bits |= match p {
                'r' if *who == 'a' => 0o444,
                'w' if *who == 'a' => 0o222,
                'x' if *who == 'a' => 0o111,
                'r' => 0o4 << shift,
                'w' => 0o2 << shift,
                'x' => 0o1 << shift,
                's' => match who {
                    'u' => 0o4000,
                    'g' => 0o2000,
                    'a' => 0o6000,
                    _ => return Err(bad()),
                },
                't' => 0o1000,
                _ => return Err(bad()),
            };
        }
    }

    Ok(ModeClause { op, bits, mask })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::GlobOptions;
    use crate::fs::FileMeta;
    use crate::testfs::MemoryFs;

    fn meta(kind: FileKind) -> FileMeta {
        FileMeta {
            kind: Some(kind),
            mode: 0o644,
            nlink: 1,
            ..Default::default()
        }
    }

    fn check(quals: &str, m: &FileMeta) -> bool {
        check_with(quals, m, None)
    }

    fn check_with(quals: &str, m: &FileMeta, target: Option<&FileMeta>) -> bool {
        let fs = MemoryFs::new();
        let mut opts = GlobOptions::default();
        let pred = parse_qualifiers(quals, &mut opts).unwrap();
        let env = QualEnv {
            fs: &fs,
            eval: None,
            now: 1_000_000,
        };
        match pred {
            Some(p) => p.accepts(
                &Candidate {
                    path: Path::new("x"),
                    meta: m,
                    target,
                },
                &env,
            ),
            None => true,
        }
    }

    #[test]
    fn type_tests() {
        assert!(check(".", &meta(FileKind::Regular)));
        assert!(!check(".", &meta(FileKind::Directory)));
        assert!(check("/", &meta(FileKind::Directory)));
        assert!(check("@", &meta(FileKind::Symlink)));
        assert!(check("p", &meta(FileKind::Fifo)));
        assert!(check("=", &meta(FileKind::Socket)));
        assert!(check("%", &meta(FileKind::BlockDevice)));
        assert!(check("%b", &meta(FileKind::BlockDevice)));
        assert!(!check("%c", &meta(FileKind::BlockDevice)));
    }

    #[test]
    fn executable_test() {
        let mut m = meta(FileKind::Regular);
        assert!(!check("*", &m));
        m.mode = 0o755;
        assert!(check("*", &m));
        let mut d = meta(FileKind::Directory);
        d.mode = 0o755;
        assert!(!check("*", &d));
    }

    #[test]
    fn negation_is_involutive() {
        let file = meta(FileKind::Regular);
        let dir = meta(FileKind::Directory);
        assert!(check("^/", &file));
        assert!(!check("^/", &dir));
        assert!(check("^^/", &dir));
        assert!(!check("^^/", &file));
    }

    #[test]
    fn and_within_alternative() {
        let mut m = meta(FileKind::Regular);
        m.mode = 0o644;
        assert!(check(".r", &m));
        assert!(check(".rw", &m));
        assert!(!check(".rx", &m));
    }

    #[test]
    fn or_across_commas() {
        assert!(check(".,/", &meta(FileKind::Regular)));
        assert!(check(".,/", &meta(FileKind::Directory)));
        assert!(!check(".,/", &meta(FileKind::Fifo)));
    }

    #[test]
    fn empty_alternative_accepts_all() {
        let fs = MemoryFs::new();
        let mut opts = GlobOptions::default();
        assert!(parse_qualifiers(",.", &mut opts).unwrap().is_none());
        let _ = fs;
    }

    #[test]
    fn sense_resets_at_comma() {
        // negation before the comma does not leak into the next alternative
        assert!(check("^.,/", &meta(FileKind::Directory)));
        assert!(!check("^.,/", &meta(FileKind::Regular)));
    }

    #[test]
    fn size_tests() {
        let mut m = meta(FileKind::Regular);
        m.size = 2048;
        assert!(check("L+1000", &m));
        assert!(check("L-4096", &m));
        assert!(check("L2048", &m));
        assert!(check("Lk2", &m)); // 2048 bytes = exactly 2 KiB
        assert!(check("Lk-3", &m));
        assert!(!check("Lk+2", &m));
        // rounded up: 1 byte is 1 KiB when measured in KiB
        m.size = 1;
        assert!(check("Lk1", &m));
    }

    #[test]
    fn time_tests() {
        let mut m = meta(FileKind::Regular);
        // now = 1_000_000 in check(); file modified 3 days ago
        m.mtime = 1_000_000 - 3 * 86400;
        assert!(check("m3", &m));
        assert!(check("m+2", &m));
        assert!(check("m-4", &m));
        assert!(!check("m+3", &m));
        assert!(check("mh+71", &m));
        assert!(check("mw-1", &m));
    }

    #[test]
    fn link_count() {
        let mut m = meta(FileKind::Regular);
        m.nlink = 3;
        assert!(check("l3", &m));
        assert!(check("l+2", &m));
        assert!(!check("l-3", &m));
    }

    #[test]
    fn mode_specs() {
        let mut m = meta(FileKind::Regular);
        m.mode = 0o644;
        assert!(check("f644", &m));
        assert!(check("f=644", &m));
        assert!(!check("f600", &m));
        assert!(check("f+600", &m));
        assert!(check("f-111", &m));
        assert!(!check("f-200", &m));
    }

    #[test]
    fn symbolic_mode_specs() {
        let mut m = meta(FileKind::Regular);
        m.mode = 0o654;
        assert!(check("f:u+rw:", &m));
        assert!(check("f:g+rx:", &m));
        assert!(check("f:o-w:", &m));
        assert!(!check("f:o+w:", &m));
        assert!(check("f:u+rw,o-w:", &m));
        assert!(check("f{u+rw}", &m));
    }

    #[test]
    fn follow_sense_swaps_stat() {
        let link = meta(FileKind::Symlink);
        let dir = meta(FileKind::Directory);
        // '-' retargets the '/' test at the symlink target
        assert!(!check("/", &link));
        assert!(check_with("-/", &link, Some(&dir)));
        // dangling link: follow test rejects
        assert!(!check_with("-/", &link, None));
    }

    #[test]
    fn global_flags_set_options() {
        let mut opts = GlobOptions::default();
        let pred = parse_qualifiers("NDMn", &mut opts).unwrap();
        assert!(pred.is_none());
        assert!(opts.null_glob);
        assert!(opts.glob_dots);
        assert!(opts.mark_dirs);
        assert!(opts.numeric_sort);
    }

    #[test]
    fn shortcircuit_count() {
        let mut opts = GlobOptions::default();
        parse_qualifiers("Y3", &mut opts).unwrap();
        assert_eq!(opts.shortcircuit, 3);

        let mut opts = GlobOptions::default();
        assert!(parse_qualifiers("Y0", &mut opts).is_err());
        assert!(parse_qualifiers("Y", &mut opts).is_err());
        // overflow is a parse error, not a wrap
        assert!(parse_qualifiers("Y99999999999999999999999", &mut opts).is_err());
    }

    #[test]
    fn sort_key_parsing() {
        let mut opts = GlobOptions::default();
        parse_qualifiers("oL On", &mut opts).unwrap_err(); // space is not a qualifier

        let mut opts = GlobOptions::default();
        parse_qualifiers("oLOn", &mut opts).unwrap();
        assert_eq!(opts.sort_keys.len(), 2);
        assert_eq!(opts.sort_keys[0].kind, SortKeyKind::Size);
        assert!(!opts.sort_keys[0].descending);
        assert_eq!(opts.sort_keys[1].kind, SortKeyKind::Name);
        assert!(opts.sort_keys[1].descending);
    }

    #[test]
    fn unsorted_key() {
        let mut opts = GlobOptions::default();
        parse_qualifiers("oN", &mut opts).unwrap();
        assert!(opts.unsorted);
    }

    #[test]
    fn eval_sort_key() {
        let mut opts = GlobOptions::default();
        parse_qualifiers("oe:wc -c <$REPLY:", &mut opts).unwrap();
        assert_eq!(
            opts.sort_keys[0].kind,
            SortKeyKind::Eval("wc -c <$REPLY".into())
        );
    }

    #[test]
    fn range_parsing() {
        let mut opts = GlobOptions::default();
        parse_qualifiers("[2,4]", &mut opts).unwrap();
        assert_eq!(
            opts.range,
            Some(RangeSpec::Slice {
                first: Some(2),
                last: Some(4)
            })
        );

        let mut opts = GlobOptions::default();
        parse_qualifiers("[-3,-1]", &mut opts).unwrap();
        assert_eq!(
            opts.range,
            Some(RangeSpec::Slice {
                first: Some(-3),
                last: Some(-1)
            })
        );

        let mut opts = GlobOptions::default();
        parse_qualifiers("[5]", &mut opts).unwrap();
        assert_eq!(opts.range, Some(RangeSpec::Single(5)));

        let mut opts = GlobOptions::default();
        assert!(parse_qualifiers("[2,", &mut opts).is_err());
        assert!(parse_qualifiers("[]", &mut opts).is_err());
    }

    #[test]
    fn prepend_append_words() {
        let mut opts = GlobOptions::default();
        parse_qualifiers("P:-f:", &mut opts).unwrap();
        assert_eq!(opts.prepend, vec!["-f"]);

        let mut opts = GlobOptions::default();
        parse_qualifiers("^P:-f:", &mut opts).unwrap();
        assert_eq!(opts.append, vec!["-f"]);
    }

    #[test]
    fn hash_q_prefix_accepted() {
        let mut opts = GlobOptions::default();
        let pred = parse_qualifiers("#q.", &mut opts).unwrap();
        assert!(pred.is_some());
    }

    #[test]
    fn unknown_qualifier_is_parse_error() {
        let mut opts = GlobOptions::default();
        let err = parse_qualifiers("z", &mut opts).unwrap_err();
        assert!(err.to_string().contains("unknown glob qualifier"));
    }

    #[test]
    fn unterminated_script_arg() {
        let mut opts = GlobOptions::default();
        assert!(parse_qualifiers("e:echo hi", &mut opts).is_err());
    }

    #[test]
    fn unknown_user_is_parse_error() {
        let mut opts = GlobOptions::default();
        let err =
            parse_qualifiers("u:no_such_user_shglob_test:", &mut opts).unwrap_err();
        assert!(err.to_string().contains("unknown user"));
    }

    #[test]
    fn numeric_owner() {
        let mut m = meta(FileKind::Regular);
        m.uid = 1234;
        assert!(check("u1234", &m));
        assert!(!check("u1235", &m));
        m.gid = 99;
        assert!(check("g99", &m));
    }

    #[test]
    fn nonempty_dir_test() {
        let mut fs = MemoryFs::new();
        fs.add_dir("/full");
        fs.add_file("/full/child", 1);
        fs.add_dir("/empty");

        let mut opts = GlobOptions::default();
        let pred = parse_qualifiers("F", &mut opts).unwrap().unwrap();
        let env = QualEnv {
            fs: &fs,
            eval: None,
            now: 0,
        };
        let dir_meta = meta(FileKind::Directory);
        assert!(pred.accepts(
            &Candidate {
                path: Path::new("/full"),
                meta: &dir_meta,
                target: None
            },
            &env
        ));
        assert!(!pred.accepts(
            &Candidate {
                path: Path::new("/empty"),
                meta: &dir_meta,
                target: None
            },
            &env
        ));
    }

    #[test]
    fn script_qualifier_without_evaluator_rejects() {
        let fs = MemoryFs::new();
        let mut opts = GlobOptions::default();
        let pred = parse_qualifiers("e:true:", &mut opts).unwrap().unwrap();
        let env = QualEnv {
            fs: &fs,
            eval: None,
            now: 0,
        };
        let m = meta(FileKind::Regular);
        assert!(!pred.accepts(
            &Candidate {
                path: Path::new("x"),
                meta: &m,
                target: None
            },
            &env
        ));
    }
}
