//! Turns a [`Program`] into a graph of pullers.
//!
//! Each operator consumes the paths left by the operator before it. An
//! operator that takes one input combines several paths first. Named
//! outputs are collected as they are reached; whatever paths remain at
//! the end of the main sequence become the output `main`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::agg::{AggExpr, new_pattern};
use crate::error::{Error, Result};
use crate::expr::{
    self, And, Arith, ArrayExpr, Call, Cast, Compare, Comparator, Conditional, Dot, Evaluator,
    Frame, In, Index, Lambda, Literal, MapExpr, Not, Or, RecordExpr, Resetters, SetExpr, Slice,
    SortKey, This, Var, function,
};
use crate::op::aggregate::{AggAssignment, Aggregate, AggregateOptions, GroupKey};
use crate::op::combine::Combine;
use crate::op::drop::Dropper;
use crate::op::explode::Explode;
use crate::op::filter::Filter;
use crate::op::fork::{fork, scatter};
use crate::op::fuse::Fuse;
use crate::op::join::{Join, Splice};
use crate::op::limit::{Head, Skip, Tail};
use crate::op::load::{Load, Loader};
use crate::op::merge::Merge;
use crate::op::mirror::mirror;
use crate::op::output::Output;
use crate::op::put::{self, Cut, Put};
use crate::op::rename::Rename;
use crate::op::scan::{NullScan, ValuesScan};
use crate::op::sort::Sort;
use crate::op::switch::{expr_switch, predicate_switch};
use crate::op::top::Top;
use crate::op::uniq::{Distinct, Uniq};
use crate::op::unnest::{self, Feed, Unnest};
use crate::op::values::Values;
use crate::types::TypeContext;
use crate::value::Value;

use super::dag::{self, Expr, ListElem, Op, Program, RecordElem, Seq, SortExpr};
use super::{Puller, RuntimeContext};

type Pullers = Vec<Box<dyn Puller>>;

/// Builds the pullers of one query.
pub struct Builder {
    rctx: RuntimeContext,
    sources: HashMap<String, Box<dyn Puller>>,
    loaders: HashMap<String, Box<dyn Loader>>,
    funcs: HashMap<String, Arc<Lambda>>,
    /// Locals of the enclosing unnest scopes, innermost last.
    scopes: Vec<(Vec<String>, Frame)>,
    /// Parameters of the function whose body is being built.
    params: Option<Vec<String>>,
    outputs: HashMap<String, Box<dyn Puller>>,
}

impl Builder {
    pub fn new(rctx: RuntimeContext) -> Self {
        Builder {
            rctx,
            sources: HashMap::new(),
            loaders: HashMap::new(),
            funcs: HashMap::new(),
            scopes: Vec::new(),
            params: None,
            outputs: HashMap::new(),
        }
    }

    pub fn with_source(mut self, name: impl Into<String>, source: Box<dyn Puller>) -> Self {
        self.sources.insert(name.into(), source);
        self
    }

    pub fn with_loader(mut self, name: impl Into<String>, loader: Box<dyn Loader>) -> Self {
        self.loaders.insert(name.into(), loader);
        self
    }

    /// Builds `program` and returns its outputs by name.
    pub fn build(mut self, program: &Program) -> Result<HashMap<String, Box<dyn Puller>>> {
        self.compile_funcs(&program.funcs)?;
        let tails = self.compile_seq(Vec::new(), &program.main)?;
        if !tails.is_empty() {
            let main = self.combine(tails)?;
            self.add_output("main", main)?;
        }
        if self.outputs.is_empty() {
            return Err(Error::compile("query has no outputs"));
        }
        debug!(outputs = self.outputs.len(), "query built");
        Ok(self.outputs)
    }

    fn ctx(&self) -> Arc<TypeContext> {
        self.rctx.types.clone()
    }

    fn add_output(&mut self, name: &str, parent: Box<dyn Puller>) -> Result<()> {
        if self.outputs.contains_key(name) {
            return Err(Error::compile(format!("duplicate output: {}", name)));
        }
        self.outputs
            .insert(name.to_string(), Box::new(Output::new(name, parent)));
        Ok(())
    }

    /// Lambdas exist before any body is built so functions can call each
    /// other and themselves.
    fn compile_funcs(&mut self, funcs: &[dag::FuncDef]) -> Result<()> {
        for f in funcs {
            let lambda = Lambda::new(&f.name, f.params.clone(), self.rctx.options.max_udf_depth);
            if self.funcs.insert(f.name.clone(), lambda).is_some() {
                return Err(Error::compile(format!("function {} redefined", f.name)));
            }
        }
        let scopes = std::mem::take(&mut self.scopes);
        for f in funcs {
            self.params = Some(f.params.clone());
            let body = self.compile_expr(&f.body);
            self.params = None;
            let body = body?;
            if let Some(lambda) = self.funcs.get(&f.name) {
                lambda.bind(body);
            }
        }
        self.scopes = scopes;
        Ok(())
    }

    fn combine(&self, mut parents: Pullers) -> Result<Box<dyn Puller>> {
        match parents.len() {
            0 => Err(Error::compile("operator has no input")),
            1 => Ok(parents.remove(0)),
            _ => Ok(Box::new(Combine::new(self.rctx.clone(), parents)?)),
        }
    }

    fn compile_seq(&mut self, mut parents: Pullers, seq: &Seq) -> Result<Pullers> {
        for op in seq {
            parents = self.compile_op(parents, op)?;
        }
        Ok(parents)
    }

    fn compile_branches(&mut self, outs: Pullers, seqs: &[Seq]) -> Result<Pullers> {
        let mut tails = Vec::new();
        for (out, seq) in outs.into_iter().zip(seqs) {
            tails.extend(self.compile_seq(vec![out], seq)?);
        }
        Ok(tails)
    }

    fn compile_op(&mut self, parents: Pullers, op: &Op) -> Result<Pullers> {
        let ctx = self.ctx();
        let batch_size = self.rctx.options.batch_size;
        if let Some(source) = self.compile_source(op)? {
            if !parents.is_empty() {
                return Err(Error::compile("a source must start a sequence"));
            }
            return Ok(vec![source]);
        }
        let puller: Box<dyn Puller> = match op {
            Op::Source(_) | Op::Values(_) | Op::Null => unreachable!("sources are handled above"),
            Op::Pass => return Ok(parents),
            Op::Fork(seqs) | Op::Scatter(seqs) if parents.is_empty() => {
                let mut tails = Vec::new();
                for seq in seqs {
                    tails.extend(self.compile_seq(Vec::new(), seq)?);
                }
                return Ok(tails);
            }
            Op::Fork(seqs) => {
                let outs = fork(self.combine(parents)?, seqs.len());
                return self.compile_branches(boxed(outs), seqs);
            }
            Op::Scatter(seqs) => {
                let outs = scatter(self.combine(parents)?, seqs.len());
                return self.compile_branches(boxed(outs), seqs);
            }
            Op::Mirror { main, mirror: side } => {
                let (m, s) = mirror(self.rctx.clone(), self.combine(parents)?);
                let mut tails = self.compile_seq(vec![Box::new(m)], main)?;
                tails.extend(self.compile_seq(vec![Box::new(s)], side)?);
                return Ok(tails);
            }
            Op::Switch { expr, cases } => {
                let parent = self.combine(parents)?;
                let outs = match expr {
                    Some(expr) => {
                        let vals = cases
                            .iter()
                            .map(|c| match &c.expr {
                                None => Ok(None),
                                Some(Expr::Literal(v)) => Ok(Some(v.clone())),
                                Some(_) => Err(Error::compile("switch: case must be a constant")),
                            })
                            .collect::<Result<Vec<_>>>()?;
                        expr_switch(parent, self.compile_expr(expr)?, vals)
                    }
                    None => {
                        let preds = cases
                            .iter()
                            .map(|c| match &c.expr {
                                Some(e) => self.compile_expr(e),
                                None => Ok(Box::new(Literal(Value::bool(true))) as Box<dyn Evaluator>),
                            })
                            .collect::<Result<Vec<_>>>()?;
                        predicate_switch(parent, preds)
                    }
                };
                let seqs: Vec<Seq> = cases.iter().map(|c| c.path.clone()).collect();
                return self.compile_branches(boxed(outs), &seqs);
            }
            Op::Combine => {
                return Ok(vec![self.combine(parents)?]);
            }
            Op::Merge(keys) => {
                if parents.is_empty() {
                    return Err(Error::compile("merge: no input"));
                }
                let cmp = Comparator::new(self.compile_sort_keys(keys)?, true);
                Box::new(Merge::new(parents, cmp, batch_size))
            }
            Op::Join(spec) => {
                let [left, right]: [Box<dyn Puller>; 2] = parents
                    .try_into()
                    .map_err(|p: Pullers| Error::compile(format!("join: expected 2 inputs, got {}", p.len())))?;
                let splices = spec
                    .splices
                    .iter()
                    .map(|a| {
                        Ok(Splice {
                            lhs: a.lhs.clone(),
                            rhs: self.compile_expr(&a.rhs)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                put::check_put_fields(&spec.splices.iter().map(|a| a.lhs.clone()).collect::<Vec<_>>())?;
                Box::new(Join::new(
                    self.rctx.clone(),
                    left,
                    right,
                    self.compile_expr(&spec.left_key)?,
                    self.compile_expr(&spec.right_key)?,
                    spec.style,
                    splices,
                    Resetters::new(),
                )?)
            }
            Op::Output(name) => {
                let parent = self.combine(parents)?;
                self.add_output(name, parent)?;
                return Ok(Vec::new());
            }
            _ => {
                let parent = self.combine(parents)?;
                self.compile_row_op(ctx, parent, op)?
            }
        };
        Ok(vec![puller])
    }

    fn compile_source(&mut self, op: &Op) -> Result<Option<Box<dyn Puller>>> {
        let batch_size = self.rctx.options.batch_size;
        Ok(match op {
            Op::Source(name) => match self.sources.remove(name) {
                Some(source) => Some(source),
                None => return Err(Error::compile(format!("no such source: {}", name))),
            },
            Op::Values(vals) => Some(Box::new(ValuesScan::new(vals.clone(), batch_size))),
            Op::Null => Some(Box::new(NullScan::default())),
            _ => None,
        })
    }

    /// Operators with exactly one input and one output.
    fn compile_row_op(
        &mut self,
        ctx: Arc<TypeContext>,
        parent: Box<dyn Puller>,
        op: &Op,
    ) -> Result<Box<dyn Puller>> {
        let rctx = self.rctx.clone();
        let resetters = Resetters::new();
        Ok(match op {
            Op::Filter(e) => Box::new(Filter::new(parent, self.compile_expr(e)?, resetters)),
            Op::Head(n) => Box::new(Head::new(parent, *n)),
            Op::Tail(n) => Box::new(Tail::new(parent, *n, rctx.options.batch_size)),
            Op::Skip(n) => Box::new(Skip::new(parent, *n)),
            Op::Uniq { count } => Box::new(Uniq::new(ctx, parent, *count)),
            Op::Distinct(e) => Box::new(Distinct::new(parent, self.compile_expr(e)?, resetters)),
            Op::Sort {
                keys,
                reverse,
                nulls_first,
            } => {
                let keys = self.compile_sort_keys(keys)?;
                Box::new(Sort::new(rctx, parent, keys, *reverse, *nulls_first, resetters))
            }
            Op::Top { limit, keys } => {
                let keys = self.compile_sort_keys(keys)?;
                Box::new(Top::new(rctx, parent, *limit, keys, resetters))
            }
            Op::Cut(assigns) => Box::new(Cut::new(ctx, parent, self.compile_assignments(assigns)?, resetters)?),
            Op::Put(assigns) => Box::new(Put::new(ctx, parent, self.compile_assignments(assigns)?, resetters)?),
            Op::Drop(paths) => Box::new(Dropper::new(ctx, parent, paths.clone())),
            Op::Rename(pairs) => {
                let (dsts, srcs): (Vec<_>, Vec<_>) = pairs.iter().cloned().unzip();
                Box::new(Rename::new(ctx, parent, srcs, dsts)?)
            }
            Op::Yield(exprs) => Box::new(Values::new(ctx, parent, self.compile_exprs(exprs)?, resetters)),
            Op::Fuse => Box::new(Fuse::new(rctx, parent)),
            Op::Shape => Box::new(Fuse::shape(rctx, parent)),
            Op::Explode { exprs, ty, name } => Box::new(Explode::new(
                ctx,
                parent,
                self.compile_exprs(exprs)?,
                ty.clone(),
                name.clone(),
                resetters,
            )),
            Op::Unnest { expr, body } => {
                let e = self.compile_expr(expr)?;
                let scope = match body {
                    Some(scope) => Some(self.compile_scope(scope)?),
                    None => None,
                };
                Box::new(Unnest::new(ctx, parent, e, scope, resetters))
            }
            Op::Aggregate {
                keys,
                aggs,
                partials_in,
                partials_out,
                input_sort_dir,
            } => {
                let keys = keys
                    .iter()
                    .map(|k| {
                        Ok(GroupKey {
                            lhs: k.lhs.clone(),
                            expr: self.compile_expr(&k.rhs)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let aggs = aggs
                    .iter()
                    .map(|a| self.compile_agg(a))
                    .collect::<Result<Vec<_>>>()?;
                let mut paths: Vec<Vec<String>> = keys.iter().map(|k| k.lhs.clone()).collect();
                paths.extend(aggs.iter().map(|a| a.lhs.clone()));
                put::check_put_fields(&paths)?;
                let opts = AggregateOptions {
                    partials_in: *partials_in,
                    partials_out: *partials_out,
                    input_sort_dir: *input_sort_dir,
                };
                Box::new(Aggregate::new(rctx, parent, keys, aggs, opts, resetters))
            }
            Op::Load(name) => {
                let Some(loader) = self.loaders.remove(name) else {
                    return Err(Error::compile(format!("no such loader: {}", name)));
                };
                Box::new(Load::new(parent, loader))
            }
            _ => unreachable!("{:?} is not a single-input operator", op),
        })
    }

    /// Locals are evaluated in the enclosing scope; the body sees them.
    fn compile_scope(&mut self, scope: &dag::Scope) -> Result<unnest::Scope> {
        let locals = scope
            .locals
            .iter()
            .map(|(_, e)| self.compile_expr(e))
            .collect::<Result<Vec<_>>>()?;
        let names = scope.locals.iter().map(|(n, _)| n.clone()).collect();
        let frame = Frame::new();
        let feed = Feed::new();
        self.scopes.push((names, frame.clone()));
        let tails = self.compile_seq(vec![Box::new(feed.clone())], &scope.body);
        self.scopes.pop();
        let body = self.combine(tails?)?;
        Ok(unnest::Scope {
            feed,
            frame,
            locals,
            body,
        })
    }

    fn compile_agg(&self, spec: &dag::AggSpec) -> Result<AggAssignment> {
        let pattern = new_pattern(&spec.name, spec.distinct, self.rctx.options.agg_options())?;
        let arg = spec.arg.as_ref().map(|e| self.compile_expr(e)).transpose()?;
        let filter = spec.filter.as_ref().map(|e| self.compile_expr(e)).transpose()?;
        Ok(AggAssignment {
            lhs: spec.lhs.clone(),
            agg: AggExpr::new(pattern, arg, filter),
        })
    }

    fn compile_assignments(&self, assigns: &[dag::Assignment]) -> Result<Vec<put::Assignment>> {
        assigns
            .iter()
            .map(|a| Ok(put::Assignment::new(a.lhs.clone(), self.compile_expr(&a.rhs)?)))
            .collect()
    }

    fn compile_sort_keys(&self, keys: &[SortExpr]) -> Result<Vec<SortKey>> {
        keys.iter()
            .map(|k| Ok(SortKey::new(self.compile_expr(&k.key)?, k.reverse)))
            .collect()
    }

    fn compile_exprs(&self, exprs: &[Expr]) -> Result<Vec<Box<dyn Evaluator>>> {
        exprs.iter().map(|e| self.compile_expr(e)).collect()
    }

    fn compile_var(&self, name: &str) -> Result<Box<dyn Evaluator>> {
        if let Some(params) = &self.params {
            if params.iter().any(|p| p == name) {
                return Ok(Box::new(Dot::field(self.ctx(), name)));
            }
            return Err(Error::compile(format!("undefined variable: {}", name)));
        }
        for (names, frame) in self.scopes.iter().rev() {
            if let Some(i) = names.iter().position(|n| n == name) {
                return Ok(Box::new(Var::new(self.ctx(), frame.clone(), i)));
            }
        }
        Err(Error::compile(format!("undefined variable: {}", name)))
    }

    pub(crate) fn compile_expr(&self, e: &Expr) -> Result<Box<dyn Evaluator>> {
        let ctx = self.ctx();
        Ok(match e {
            Expr::This => Box::new(This),
            Expr::Literal(v) => Box::new(Literal(v.clone())),
            Expr::Var(name) => return self.compile_var(name),
            Expr::Dot(rec, name) => Box::new(Dot::new(ctx, self.compile_expr(rec)?, name.clone())),
            Expr::Index {
                container,
                index,
                base1,
            } => Box::new(Index::new(
                ctx,
                self.compile_expr(container)?,
                self.compile_expr(index)?,
                *base1,
            )),
            Expr::Slice {
                container,
                from,
                to,
                base1,
            } => {
                let from = from.as_deref().map(|e| self.compile_expr(e)).transpose()?;
                let to = to.as_deref().map(|e| self.compile_expr(e)).transpose()?;
                Box::new(Slice::new(ctx, self.compile_expr(container)?, from, to, *base1))
            }
            Expr::Binary(op, l, r) => {
                let (l, r) = (self.compile_expr(l)?, self.compile_expr(r)?);
                if op.is_compare() {
                    Box::new(Compare::new(ctx, *op, l, r))
                } else {
                    Box::new(Arith::new(ctx, *op, l, r))
                }
            }
            Expr::And(l, r) => Box::new(And::new(ctx, self.compile_expr(l)?, self.compile_expr(r)?)),
            Expr::Or(l, r) => Box::new(Or::new(ctx, self.compile_expr(l)?, self.compile_expr(r)?)),
            Expr::Not(e) => Box::new(Not::new(ctx, self.compile_expr(e)?)),
            Expr::In(elem, container) => {
                Box::new(In::new(self.compile_expr(elem)?, self.compile_expr(container)?))
            }
            Expr::Cast(e, ty) => Box::new(Cast::to(ctx, self.compile_expr(e)?, ty)),
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => Box::new(Conditional::new(
                ctx,
                self.compile_expr(cond)?,
                self.compile_expr(then)?,
                self.compile_expr(otherwise)?,
            )),
            Expr::Record(elems) => {
                let elems = elems
                    .iter()
                    .map(|elem| {
                        Ok(match elem {
                            RecordElem::Field(name, e) => expr::RecordElem::Field(name.clone(), self.compile_expr(e)?),
                            RecordElem::Spread(e) => expr::RecordElem::Spread(self.compile_expr(e)?),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Box::new(RecordExpr::new(ctx, elems))
            }
            Expr::Array(elems) => Box::new(ArrayExpr::new(ctx, self.compile_list(elems)?)),
            Expr::Set(elems) => Box::new(SetExpr::new(ctx, self.compile_list(elems)?)),
            Expr::Map(entries) => {
                let entries = entries
                    .iter()
                    .map(|(k, v)| Ok((self.compile_expr(k)?, self.compile_expr(v)?)))
                    .collect::<Result<Vec<_>>>()?;
                Box::new(MapExpr::new(ctx, entries))
            }
            Expr::Call(name, args) => {
                let args = self.compile_exprs(args)?;
                match self.funcs.get(name) {
                    Some(lambda) => Box::new(Call::new(ctx, lambda.clone(), args)?),
                    None => return function::lookup(&ctx, name, args),
                }
            }
        })
    }

    fn compile_list(&self, elems: &[ListElem]) -> Result<Vec<expr::ListElem>> {
        elems
            .iter()
            .map(|elem| {
                Ok(match elem {
                    ListElem::Value(e) => expr::ListElem::Value(self.compile_expr(e)?),
                    ListElem::Spread(e) => expr::ListElem::Spread(self.compile_expr(e)?),
                })
            })
            .collect()
    }
}

fn boxed<P: Puller + 'static>(outs: Vec<P>) -> Pullers {
    outs.into_iter().map(|p| Box::new(p) as Box<dyn Puller>).collect()
}
