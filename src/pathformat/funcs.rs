//! Pipeline functions available to path templates. All are pure.

use std::fmt;

use super::safepath::{safe_path, safe_path_no_norm};

/// A value flowing through a template pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<String>),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Str(s) => !s.is_empty(),
            Value::Int(i) => *i != 0,
            Value::Bool(b) => *b,
            Value::List(l) => !l.is_empty(),
        }
    }

    fn as_int(&self, func: &str) -> Result<i64, String> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| format!("{}: expected a number, got {:?}", func, s)),
            other => Err(format!("{}: expected a number, got {}", func, other.kind())),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Int(_) => "integer",
            Value::Bool(_) => "boolean",
            Value::List(_) => "list",
        }
    }

    /// Apply a string transform to a string or to every element of a list
    fn map_strings(self, f: impl Fn(&str) -> String) -> Value {
        match self {
            Value::List(items) => Value::List(items.iter().map(|s| f(s)).collect()),
            other => Value::Str(f(&other.to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Bool(b) => write!(f, "{}", b),
            Value::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

/// Literal pipeline argument
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Str(s) => Value::Str(s.clone()),
            Literal::Int(i) => Value::Int(*i),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Join,
    Pad0,
    Sort,
    SafePath,
    SafePathNoNorm,
    The,
    Lower,
    Upper,
    Not,
    Eq,
    Gt,
    Or,
}

const FUNCS: &[(&str, Func)] = &[
    ("join", Func::Join),
    ("pad0", Func::Pad0),
    ("sort", Func::Sort),
    ("safepath", Func::SafePath),
    ("safepath_nonorm", Func::SafePathNoNorm),
    ("the", Func::The),
    ("lower", Func::Lower),
    ("upper", Func::Upper),
    ("not", Func::Not),
    ("eq", Func::Eq),
    ("gt", Func::Gt),
    ("or", Func::Or),
];

impl Func {
    pub fn from_name(name: &str) -> Option<Func> {
        FUNCS.iter().find(|(n, _)| *n == name).map(|(_, f)| *f)
    }

    pub fn name(self) -> &'static str {
        FUNCS
            .iter()
            .find(|(_, f)| *f == self)
            .map(|(n, _)| *n)
            .unwrap_or("?")
    }

    /// Number of literal arguments after the piped value
    pub fn arity(self) -> usize {
        match self {
            Func::Join | Func::Pad0 | Func::Eq | Func::Gt | Func::Or => 1,
            _ => 0,
        }
    }

    pub fn apply(self, input: Value, args: &[Literal]) -> Result<Value, String> {
        let arg = || args.first().map(Literal::to_value).ok_or_else(|| format!("{}: missing argument", self.name()));

        match self {
            Func::Join => {
                let delim = arg()?.to_string();
                Ok(match input {
                    Value::List(items) => Value::Str(items.join(&delim)),
                    other => Value::Str(other.to_string()),
                })
            }
            Func::Pad0 => {
                let width = arg()?.as_int("pad0")?.max(0) as usize;
                let n = input.as_int("pad0")?;
                Ok(Value::Str(format!("{:0width$}", n, width = width)))
            }
            Func::Sort => Ok(match input {
                Value::List(mut items) => {
                    items.sort();
                    Value::List(items)
                }
                other => other,
            }),
            Func::SafePath => Ok(input.map_strings(safe_path)),
            Func::SafePathNoNorm => Ok(input.map_strings(safe_path_no_norm)),
            Func::The => Ok(input.map_strings(move_article)),
            Func::Lower => Ok(input.map_strings(str::to_lowercase)),
            Func::Upper => Ok(input.map_strings(str::to_uppercase)),
            Func::Not => Ok(Value::Bool(!input.is_truthy())),
            Func::Eq => Ok(Value::Bool(input.to_string() == arg()?.to_string())),
            Func::Gt => {
                let bound = arg()?.as_int("gt")?;
                Ok(Value::Bool(input.as_int("gt")? > bound))
            }
            Func::Or => {
                if input.is_truthy() {
                    Ok(input)
                } else {
                    arg()
                }
            }
        }
    }
}

/// "The Foo" → "Foo, The", "A Foo" → "Foo, A"
pub fn move_article(s: &str) -> String {
    match s.split_once(' ') {
        Some((article, rest))
            if article.eq_ignore_ascii_case("the") || article.eq_ignore_ascii_case("a") =>
        {
            format!("{}, {}", rest, article)
        }
        _ => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| s.to_string()).collect())
    }

    fn s(v: &str) -> Literal {
        Literal::Str(v.to_string())
    }

    #[test]
    fn test_join_and_sort() {
        let sorted = Func::Sort.apply(list(&["b", "c", "a"]), &[]).unwrap();
        assert_eq!(sorted, list(&["a", "b", "c"]));
        assert_eq!(
            Func::Join.apply(sorted, &[s("; ")]).unwrap(),
            Value::Str("a; b; c".into())
        );
    }

    #[test]
    fn test_pad0() {
        assert_eq!(
            Func::Pad0.apply(Value::Int(7), &[Literal::Int(2)]).unwrap(),
            Value::Str("07".into())
        );
        assert_eq!(
            Func::Pad0.apply(Value::Int(123), &[Literal::Int(2)]).unwrap(),
            Value::Str("123".into())
        );
        assert_eq!(
            Func::Pad0.apply(Value::Str("3".into()), &[Literal::Int(3)]).unwrap(),
            Value::Str("003".into())
        );
        assert!(Func::Pad0.apply(Value::Str("x".into()), &[Literal::Int(2)]).is_err());
    }

    #[test]
    fn test_the() {
        assert_eq!(move_article("The House"), "House, The");
        assert_eq!(move_article("A House"), "House, A");
        assert_eq!(move_article("the house"), "house, the");
        assert_eq!(move_article("Theory"), "Theory");
        assert_eq!(move_article("Another Thing"), "Another Thing");
        assert_eq!(
            Func::The.apply(list(&["The Beatles", "Queen"]), &[]).unwrap(),
            list(&["Beatles, The", "Queen"])
        );
    }

    #[test]
    fn test_logic() {
        assert_eq!(Func::Not.apply(Value::Str("".into()), &[]).unwrap(), Value::Bool(true));
        assert_eq!(Func::Eq.apply(Value::Int(2), &[Literal::Int(2)]).unwrap(), Value::Bool(true));
        assert_eq!(Func::Eq.apply(Value::Str("x".into()), &[s("")]).unwrap(), Value::Bool(false));
        assert_eq!(Func::Gt.apply(Value::Int(2), &[Literal::Int(1)]).unwrap(), Value::Bool(true));
        assert!(Func::Gt.apply(list(&[]), &[Literal::Int(1)]).is_err());
        assert_eq!(
            Func::Or.apply(Value::Str("".into()), &[s("Unknown")]).unwrap(),
            Value::Str("Unknown".into())
        );
        assert_eq!(
            Func::Or.apply(Value::Str("Known".into()), &[s("Unknown")]).unwrap(),
            Value::Str("Known".into())
        );
    }

    #[test]
    fn test_render_list() {
        assert_eq!(list(&["a", "b"]).to_string(), "a, b");
        assert_eq!(Value::Bool(true).to_string(), "true");
    }

    #[test]
    fn test_names_round_trip() {
        for (name, func) in FUNCS {
            assert_eq!(Func::from_name(name), Some(*func));
            assert_eq!(func.name(), *name);
        }
        assert_eq!(Func::from_name("len"), None);
    }
}
