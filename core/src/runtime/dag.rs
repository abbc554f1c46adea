//! The validated dataflow graph handed to [`super::compile::Builder`].
//!
//! A [`Program`] is a main [`Seq`] plus user-defined functions. A sequence
//! is a list of operators; each operator consumes the paths left by the
//! one before it. Fan-out operators (`Fork`, `Scatter`, `Switch`,
//! `Mirror`) leave one path per branch and fan-in operators (`Combine`,
//! `Merge`, `Join`) bring them back together.

use crate::types::Type;
use crate::value::Value;

pub use crate::op::join::JoinStyle;

pub use crate::vector::kernels::Op as BinaryOp;

pub type Path = Vec<String>;

pub type Seq = Vec<Op>;

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub funcs: Vec<FuncDef>,
    pub main: Seq,
}

/// `func name(params): body`. Inside `body` the parameters are
/// [`Expr::Var`]s.
#[derive(Debug, Clone)]
pub struct FuncDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Expr,
}

#[derive(Debug, Clone)]
pub enum Op {
    /// A source supplied to the builder by name.
    Source(String),
    /// A fixed list of values.
    Values(Vec<Value>),
    /// A single `null` per stream.
    Null,
    Pass,
    Filter(Expr),
    Head(usize),
    Tail(usize),
    Skip(usize),
    Uniq {
        count: bool,
    },
    Distinct(Expr),
    Sort {
        keys: Vec<SortExpr>,
        reverse: bool,
        nulls_first: bool,
    },
    Top {
        limit: usize,
        keys: Vec<SortExpr>,
    },
    Cut(Vec<Assignment>),
    Put(Vec<Assignment>),
    Drop(Vec<Path>),
    /// `(destination, source)` pairs.
    Rename(Vec<(Path, Path)>),
    Yield(Vec<Expr>),
    Fuse,
    Shape,
    Explode {
        exprs: Vec<Expr>,
        ty: Type,
        name: String,
    },
    Unnest {
        expr: Expr,
        body: Option<Scope>,
    },
    Aggregate {
        keys: Vec<Assignment>,
        aggs: Vec<AggSpec>,
        partials_in: bool,
        partials_out: bool,
        input_sort_dir: i32,
    },
    Fork(Vec<Seq>),
    Scatter(Vec<Seq>),
    Mirror {
        main: Seq,
        mirror: Seq,
    },
    Switch {
        /// `None` for a predicate switch.
        expr: Option<Expr>,
        cases: Vec<Case>,
    },
    Combine,
    Merge(Vec<SortExpr>),
    Join(JoinSpec),
    /// Writes into the loader registered under this name.
    Load(String),
    Output(String),
}

/// A body run once per unnested value, with `locals` bound for its
/// duration.
#[derive(Debug, Clone)]
pub struct Scope {
    pub locals: Vec<(String, Expr)>,
    pub body: Seq,
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub lhs: Path,
    pub rhs: Expr,
}

impl Assignment {
    pub fn new(lhs: &str, rhs: Expr) -> Self {
        Assignment {
            lhs: path(lhs),
            rhs,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SortExpr {
    pub key: Expr,
    pub reverse: bool,
}

#[derive(Debug, Clone)]
pub struct AggSpec {
    pub lhs: Path,
    pub name: String,
    pub distinct: bool,
    pub arg: Option<Expr>,
    pub filter: Option<Expr>,
}

/// Joins the two paths in front of it: the first is the left side.
#[derive(Debug, Clone)]
pub struct JoinSpec {
    pub style: JoinStyle,
    pub left_key: Expr,
    pub right_key: Expr,
    pub splices: Vec<Assignment>,
}

/// One branch of a switch. For an expression switch `expr` is the value
/// to match (`None` for the default branch); for a predicate switch it is
/// the predicate.
#[derive(Debug, Clone)]
pub struct Case {
    pub expr: Option<Expr>,
    pub path: Seq,
}

#[derive(Debug, Clone)]
pub enum Expr {
    This,
    Literal(Value),
    /// A local of an enclosing scope or a function parameter.
    Var(String),
    Dot(Box<Expr>, String),
    Index {
        container: Box<Expr>,
        index: Box<Expr>,
        base1: bool,
    },
    Slice {
        container: Box<Expr>,
        from: Option<Box<Expr>>,
        to: Option<Box<Expr>>,
        base1: bool,
    },
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    In(Box<Expr>, Box<Expr>),
    Cast(Box<Expr>, Type),
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Record(Vec<RecordElem>),
    Array(Vec<ListElem>),
    Set(Vec<ListElem>),
    Map(Vec<(Expr, Expr)>),
    /// A user-defined function or a built-in.
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone)]
pub enum RecordElem {
    Field(String, Expr),
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub enum ListElem {
    Value(Expr),
    Spread(Expr),
}

/// Splits a dotted path. The empty string is `this`.
pub fn path(s: &str) -> Path {
    if s.is_empty() {
        return Vec::new();
    }
    s.split('.').map(str::to_string).collect()
}

impl Expr {
    /// `this.a.b` for the dotted path `a.b`.
    pub fn path(s: &str) -> Expr {
        path(s)
            .into_iter()
            .fold(Expr::This, |rec, name| Expr::Dot(Box::new(rec), name))
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn lit(val: Value) -> Expr {
        Expr::Literal(val)
    }
}
