use bson::{Bson, Document as BsonDocument};

use crate::errors::DbError;
use crate::query::{bson_as_f64, get_path};

/// Value expression used by `$group` keys, accumulators and `$project`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Bson),
    FieldRef(String),
    Add(Vec<Expression>),
    Subtract(Box<Expression>, Box<Expression>),
    Multiply(Vec<Expression>),
    Divide(Box<Expression>, Box<Expression>),
    Floor(Box<Expression>),
}

fn operands(op: &str, arg: &Bson) -> Result<Vec<Expression>, DbError> {
    let Bson::Array(items) = arg else {
        return Err(DbError::PipelineError(format!("{op} requires an array")));
    };
    items.iter().map(Expression::parse).collect()
}

fn binary(op: &str, arg: &Bson) -> Result<(Box<Expression>, Box<Expression>), DbError> {
    let mut args = operands(op, arg)?;
    if args.len() != 2 {
        return Err(DbError::PipelineError(format!("{op} requires exactly 2 arguments")));
    }
    let b = args.remove(1);
    let a = args.remove(0);
    Ok((Box::new(a), Box::new(b)))
}

/// Integral results come back as `Int64`, everything else as `Double`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub(crate) fn number_to_bson(n: f64) -> Bson {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Bson::Int64(n as i64)
    } else {
        Bson::Double(n)
    }
}

impl Expression {
    /// `"$field"` is a field reference, `{$op: ...}` an operator, anything else a literal.
    ///
    /// # Errors
    /// Returns `DbError::PipelineError` for an unknown operator or bad arity.
    pub fn parse(val: &Bson) -> Result<Self, DbError> {
        match val {
            Bson::String(s) if s.starts_with('$') => Ok(Self::FieldRef(s[1..].to_string())),
            Bson::Document(d) if d.len() == 1 && d.keys().all(|k| k.starts_with('$')) => {
                let Some((op, arg)) = d.iter().next() else {
                    return Ok(Self::Literal(val.clone()));
                };
                match op.as_str() {
                    "$add" => Ok(Self::Add(operands(op, arg)?)),
                    "$multiply" => Ok(Self::Multiply(operands(op, arg)?)),
                    "$subtract" => binary(op, arg).map(|(a, b)| Self::Subtract(a, b)),
                    "$divide" => binary(op, arg).map(|(a, b)| Self::Divide(a, b)),
                    "$floor" => {
                        // accepts both `{$floor: expr}` and `{$floor: [expr]}`
                        let inner = match arg {
                            Bson::Array(items) if items.len() == 1 => Self::parse(&items[0])?,
                            Bson::Array(_) => {
                                return Err(DbError::PipelineError(
                                    "$floor requires exactly 1 argument".into(),
                                ));
                            }
                            other => Self::parse(other)?,
                        };
                        Ok(Self::Floor(Box::new(inner)))
                    }
                    other => Err(DbError::PipelineError(format!("unknown expression operator {other}"))),
                }
            }
            _ => Ok(Self::Literal(val.clone())),
        }
    }

    /// Evaluates against one document. Missing fields and non-numeric operands yield `Null`.
    #[must_use]
    pub fn eval(&self, doc: &BsonDocument) -> Bson {
        let num = |e: &Self| bson_as_f64(&e.eval(doc));
        match self {
            Self::Literal(v) => v.clone(),
            Self::FieldRef(path) => get_path(doc, path).cloned().unwrap_or(Bson::Null),
            Self::Add(exprs) => {
                exprs.iter().map(num).sum::<Option<f64>>().map_or(Bson::Null, number_to_bson)
            }
            Self::Multiply(exprs) => {
                exprs.iter().map(num).product::<Option<f64>>().map_or(Bson::Null, number_to_bson)
            }
            Self::Subtract(a, b) => match (num(a.as_ref()), num(b.as_ref())) {
                (Some(a), Some(b)) => number_to_bson(a - b),
                _ => Bson::Null,
            },
            Self::Divide(a, b) => match (num(a.as_ref()), num(b.as_ref())) {
                (Some(a), Some(b)) if b != 0.0 => number_to_bson(a / b),
                _ => Bson::Null,
            },
            Self::Floor(a) => num(a.as_ref()).map_or(Bson::Null, |x| number_to_bson(x.floor())),
        }
    }
}
