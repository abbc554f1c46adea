//! `put` and `cut`.
//!
//! Both build their output records from a [`Rule`]: the output type and a
//! tree of steps saying where each output field comes from. Rules depend
//! only on the input type and the types of the assigned values, so they
//! are computed once per combination and cached.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use tracing::trace;

use crate::error::{Error, Result};
use crate::expr::{Evaluator, Resetters, dequiet_value};
use crate::runtime::{Batch, Puller};
use crate::types::{Field, Type, TypeContext};
use crate::value::Value;
use crate::value::build::record_of;
use crate::vector::{Any, Vector, from_values};

/// `lhs := rhs`. An empty `lhs` denotes `this`.
pub struct Assignment {
    pub lhs: Vec<String>,
    pub rhs: Box<dyn Evaluator>,
}

impl Assignment {
    pub fn new(lhs: Vec<String>, rhs: Box<dyn Evaluator>) -> Self {
        Assignment { lhs, rhs }
    }
}

/// Validates the target paths of a `put` or `cut`: none may be `this`,
/// none may repeat and none may be a prefix of another.
pub fn check_put_fields(paths: &[Vec<String>]) -> Result<()> {
    for (i, p) in paths.iter().enumerate() {
        if p.is_empty() {
            return Err(Error::compile("cannot assign to \"this\""));
        }
        for q in &paths[..i] {
            if p == q {
                return Err(Error::compile(format!(
                    "multiple assignments to {}",
                    p.join(".")
                )));
            }
            let (short, long) = if p.len() < q.len() { (p, q) } else { (q, p) };
            if long.starts_with(short) {
                return Err(Error::compile(format!(
                    "conflicting assignments to {} and {}",
                    short.join("."),
                    long.join(".")
                )));
            }
        }
    }
    Ok(())
}

#[derive(Debug)]
enum Step {
    /// An input field, by position.
    Copy(usize),
    /// The value of an assignment, by position.
    Rhs(usize),
    /// A nested record, built over the input field at `src` if any.
    Record {
        src: Option<usize>,
        ty: Type,
        steps: Vec<Step>,
    },
}

#[derive(Debug)]
struct Rule {
    ty: Type,
    steps: Vec<Step>,
}

type Target<'a> = (&'a [String], usize, &'a Type);

/// Computes the output fields over input `fields`. Assigned fields replace
/// input fields in place; new ones are appended in assignment order.
fn build_steps(
    ctx: &TypeContext,
    fields: &[Field],
    targets: &[Target<'_>],
) -> Result<(Vec<Field>, Vec<Step>)> {
    let mut out = Vec::with_capacity(fields.len() + targets.len());
    let mut steps = Vec::with_capacity(out.capacity());
    for (i, field) in fields.iter().enumerate() {
        let hits: Vec<&Target<'_>> = targets.iter().filter(|t| t.0[0] == field.name).collect();
        if hits.is_empty() {
            out.push(field.clone());
            steps.push(Step::Copy(i));
            continue;
        }
        if let Some((_, j, ty)) = hits.iter().find(|t| t.0.len() == 1) {
            out.push(Field::new(field.name.clone(), (*ty).clone()));
            steps.push(Step::Rhs(*j));
            continue;
        }
        let inner = field.ty.record_fields();
        let sub: Vec<Target<'_>> = hits.iter().map(|(p, j, ty)| (&p[1..], *j, *ty)).collect();
        let (nested, nested_steps) = build_steps(ctx, inner.unwrap_or(&[]), &sub)?;
        let ty = ctx.lookup_type_record(nested)?;
        out.push(Field::new(field.name.clone(), ty.clone()));
        steps.push(Step::Record {
            src: inner.map(|_| i),
            ty,
            steps: nested_steps,
        });
    }
    let mut appended: HashSet<&str> = HashSet::new();
    for (path, j, ty) in targets {
        let name = path[0].as_str();
        if fields.iter().any(|f| f.name == name) || !appended.insert(name) {
            continue;
        }
        if path.len() == 1 {
            out.push(Field::new(name, (*ty).clone()));
            steps.push(Step::Rhs(*j));
            continue;
        }
        let sub: Vec<Target<'_>> = targets
            .iter()
            .filter(|t| t.0[0] == name)
            .map(|(p, j, ty)| (&p[1..], *j, *ty))
            .collect();
        let (nested, nested_steps) = build_steps(ctx, &[], &sub)?;
        let ty = ctx.lookup_type_record(nested)?;
        out.push(Field::new(name, ty.clone()));
        steps.push(Step::Record {
            src: None,
            ty,
            steps: nested_steps,
        });
    }
    Ok((out, steps))
}

fn apply_steps(ty: &Type, steps: &[Step], src: Option<&Value>, rhs: &[Value]) -> Value {
    let inputs: Vec<Option<Value>> = src
        .and_then(Value::record_entries)
        .map(|entries| entries.into_iter().map(|(_, v)| v).collect())
        .unwrap_or_default();
    let fields = ty.record_fields().unwrap_or(&[]);
    let vals: Vec<Option<Value>> = steps
        .iter()
        .zip(fields)
        .map(|(step, field)| match step {
            Step::Copy(i) => match inputs.get(*i).cloned().flatten() {
                Some(v) => Some(v),
                None if field.is_opt() => None,
                None => Some(Value::null_of(field.ty.clone())),
            },
            Step::Rhs(j) => Some(rhs[*j].clone()),
            Step::Record { src, ty, steps } => {
                let inner = src.and_then(|i| inputs.get(i).cloned().flatten());
                Some(apply_steps(ty, steps, inner.as_ref(), rhs))
            }
        })
        .collect();
    record_of(ty, &vals)
}

/// Shared by `put` and `cut`: evaluates the assignments and rebuilds
/// each value through the cached rule for its types.
struct Assigner {
    ctx: Arc<TypeContext>,
    assignments: Vec<Assignment>,
    rules: HashMap<(Option<Type>, Vec<Type>), Arc<Rule>>,
}

impl Assigner {
    fn new(ctx: Arc<TypeContext>, assignments: Vec<Assignment>) -> Result<Self> {
        let paths: Vec<Vec<String>> = assignments.iter().map(|a| a.lhs.clone()).collect();
        check_put_fields(&paths)?;
        Ok(Assigner {
            ctx,
            assignments,
            rules: HashMap::new(),
        })
    }

    fn rule(&mut self, input: Option<&Type>, rhs: &[Value]) -> Result<Arc<Rule>> {
        let key = (input.cloned(), rhs.iter().map(|v| v.ty().clone()).collect::<Vec<_>>());
        if let Some(rule) = self.rules.get(&key) {
            return Ok(rule.clone());
        }
        let targets: Vec<Target<'_>> = self
            .assignments
            .iter()
            .zip(&key.1)
            .enumerate()
            .map(|(j, (a, ty))| (a.lhs.as_slice(), j, ty))
            .collect();
        let fields = input.and_then(Type::record_fields).unwrap_or(&[]);
        let (out, steps) = build_steps(&self.ctx, fields, &targets)?;
        let rule = Arc::new(Rule {
            ty: self.ctx.lookup_type_record(out)?,
            steps,
        });
        trace!(ty = %rule.ty, "put: new rule");
        self.rules.insert(key, rule.clone());
        Ok(rule)
    }

    fn eval(&self, this: &Vector) -> Vec<Vector> {
        self.assignments.iter().map(|a| a.rhs.eval(this)).collect()
    }

    fn assign(&mut self, input: Option<&Value>, rhs: &[Value]) -> Value {
        let rule = match self.rule(input.map(Value::ty), rhs) {
            Ok(rule) => rule,
            Err(err) => return self.ctx.new_error(err),
        };
        dequiet_value(&self.ctx, &apply_steps(&rule.ty, &rule.steps, input, rhs))
    }
}

/// Sets or replaces fields, keeping the rest of each input record.
pub struct Put {
    parent: Box<dyn Puller>,
    assigner: Assigner,
    resetters: Resetters,
}

impl Put {
    pub fn new(
        ctx: Arc<TypeContext>,
        parent: Box<dyn Puller>,
        assignments: Vec<Assignment>,
        resetters: Resetters,
    ) -> Result<Self> {
        Ok(Put {
            parent,
            assigner: Assigner::new(ctx, assignments)?,
            resetters,
        })
    }

    fn apply(&mut self, this: &Vector) -> Vector {
        let cols = self.assigner.eval(this);
        let out: Vec<Value> = (0..this.len())
            .map(|slot| {
                let val = this.value(slot);
                if val.is_error() {
                    return val;
                }
                let val = val.under();
                if !val.ty().is_record() {
                    return self.assigner.ctx.wrap_error("put: not a record", &val);
                }
                let rhs: Vec<Value> = cols.iter().map(|c| c.value(slot)).collect();
                self.assigner.assign(Some(&val), &rhs)
            })
            .collect();
        from_values(&out)
    }
}

impl Puller for Put {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            return self.parent.pull(true);
        }
        let Some(batch) = self.parent.pull(false)? else {
            self.resetters.reset();
            return Ok(None);
        };
        let out = self.apply(batch.vector());
        Ok(Some(batch.derive(out)))
    }
}

/// Builds a new record from the assignments alone.
pub struct Cut {
    parent: Box<dyn Puller>,
    assigner: Assigner,
    resetters: Resetters,
}

impl Cut {
    pub fn new(
        ctx: Arc<TypeContext>,
        parent: Box<dyn Puller>,
        assignments: Vec<Assignment>,
        resetters: Resetters,
    ) -> Result<Self> {
        Ok(Cut {
            parent,
            assigner: Assigner::new(ctx, assignments)?,
            resetters,
        })
    }
}

impl Puller for Cut {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            return self.parent.pull(true);
        }
        let Some(batch) = self.parent.pull(false)? else {
            self.resetters.reset();
            return Ok(None);
        };
        let this = batch.vector();
        let cols = self.assigner.eval(this);
        let out: Vec<Value> = (0..this.len())
            .map(|slot| {
                let val = this.value(slot);
                if val.is_error() {
                    return val;
                }
                let rhs: Vec<Value> = cols.iter().map(|c| c.value(slot)).collect();
                self.assigner.assign(None, &rhs)
            })
            .collect();
        Ok(Some(batch.derive(from_values(&out))))
    }
}

/// The record built by assigning `rhs` at `paths` over `base`, or over an
/// empty record. Used by join to splice build-side fields into the probe
/// row.
pub(crate) fn put_values(
    ctx: &TypeContext,
    base: Option<&Value>,
    paths: &[Vec<String>],
    rhs: &[Value],
) -> Result<Value> {
    let tys: Vec<Type> = rhs.iter().map(|v| v.ty().clone()).collect();
    let targets: Vec<Target<'_>> = paths
        .iter()
        .zip(&tys)
        .enumerate()
        .map(|(j, (p, ty))| (p.as_slice(), j, ty))
        .collect();
    let fields = base.and_then(|v| v.ty().record_fields()).unwrap_or(&[]);
    let (out, steps) = build_steps(ctx, fields, &targets)?;
    let ty = ctx.lookup_type_record(out)?;
    Ok(apply_steps(&ty, &steps, base, rhs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Dot, Literal};
    use crate::op::scan::ValuesScan;
    use crate::runtime::collect_values;
    use crate::value::build;
    use pretty_assertions::assert_eq;

    fn path(p: &str) -> Vec<String> {
        p.split('.').map(str::to_string).collect()
    }

    fn rec(ctx: &TypeContext, fields: Vec<(&str, Value)>) -> Value {
        build::record(ctx, fields.into_iter().map(|(n, v)| (n.to_string(), v)).collect()).unwrap()
    }

    fn run_put(ctx: &Arc<TypeContext>, input: Vec<Value>, assigns: Vec<(&str, Box<dyn Evaluator>)>) -> Vec<String> {
        let assigns = assigns
            .into_iter()
            .map(|(p, e)| Assignment::new(path(p), e))
            .collect();
        let scan = Box::new(ValuesScan::new(input, 512));
        let mut put = Put::new(ctx.clone(), scan, assigns, Resetters::new()).unwrap();
        collect_values(&mut put)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect()
    }

    #[test]
    fn test_check_put_fields() {
        assert!(check_put_fields(&[path("a"), path("b.c")]).is_ok());
        assert!(check_put_fields(&[vec![]]).is_err());
        assert!(check_put_fields(&[path("a"), path("a")]).is_err());
        let err = check_put_fields(&[path("a.b"), path("a")]).unwrap_err();
        assert_eq!(err.to_string(), "conflicting assignments to a and a.b");
    }

    #[test]
    fn test_put_replaces_in_place_and_appends() {
        let ctx = Arc::new(TypeContext::new());
        let input = vec![rec(&ctx, vec![("a", Value::int64(1)), ("b", Value::int64(2))])];
        let out = run_put(
            &ctx,
            input,
            vec![
                ("c", Box::new(Literal(Value::string("x")))),
                ("a", Box::new(Literal(Value::bool(true)))),
            ],
        );
        assert_eq!(out, vec!["{a:true,b:2,c:\"x\"}"]);
    }

    #[test]
    fn test_put_nested_paths() {
        let ctx = Arc::new(TypeContext::new());
        let inner = rec(&ctx, vec![("x", Value::int64(1))]);
        let input = vec![rec(&ctx, vec![("r", inner), ("n", Value::int64(5))])];
        let out = run_put(
            &ctx,
            input,
            vec![
                ("r.y", Box::new(Dot::field(ctx.clone(), "n"))),
                ("s.t", Box::new(Literal(Value::int64(0)))),
                ("n.z", Box::new(Literal(Value::int64(9)))),
            ],
        );
        assert_eq!(out, vec!["{r:{x:1,y:5},n:{z:9},s:{t:0}}"]);
    }

    #[test]
    fn test_put_errors() {
        let ctx = Arc::new(TypeContext::new());
        let out = run_put(
            &ctx,
            vec![Value::int64(1), ctx.missing()],
            vec![("a", Box::new(Literal(Value::int64(1))))],
        );
        assert_eq!(
            out,
            vec![
                "error({message:\"put: not a record\",on:1})",
                "error(\"missing\")"
            ]
        );
    }

    #[test]
    fn test_put_drops_quiet() {
        let ctx = Arc::new(TypeContext::new());
        let input = vec![rec(&ctx, vec![("a", Value::int64(1))])];
        let out = run_put(&ctx, input, vec![("b", Box::new(Literal(ctx.quiet())))]);
        assert_eq!(out, vec!["{a:1}"]);
    }

    #[test]
    fn test_cut() {
        let ctx = Arc::new(TypeContext::new());
        let input = vec![
            rec(&ctx, vec![("a", Value::int64(1)), ("b", Value::int64(2))]),
            rec(&ctx, vec![("b", Value::int64(3))]),
        ];
        let assigns = vec![
            Assignment::new(path("x.a"), Box::new(Dot::field(ctx.clone(), "a"))),
            Assignment::new(path("b"), Box::new(Dot::field(ctx.clone(), "b"))),
        ];
        let scan = Box::new(ValuesScan::new(input, 512));
        let mut cut = Cut::new(ctx.clone(), scan, assigns, Resetters::new()).unwrap();
        let out: Vec<String> = collect_values(&mut cut)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(out, vec!["{x:{a:1},b:2}", "{x:{a:error(\"missing\")},b:3}"]);
    }

    #[test]
    fn test_cut_passes_errors() {
        let ctx = Arc::new(TypeContext::new());
        let input = vec![
            ctx.new_error("boom"),
            rec(&ctx, vec![("b", Value::int64(3))]),
        ];
        let assigns = vec![Assignment::new(path("b"), Box::new(Dot::field(ctx.clone(), "b")))];
        let scan = Box::new(ValuesScan::new(input, 512));
        let mut cut = Cut::new(ctx.clone(), scan, assigns, Resetters::new()).unwrap();
        let out: Vec<String> = collect_values(&mut cut)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(out, vec!["error(\"boom\")", "{b:3}"]);
    }
}
