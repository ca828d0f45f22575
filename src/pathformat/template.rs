//! Lexer, parser and evaluator for the path template language.
//!
//! ```text
//! /music/{{ release.artists | sort | join "; " | safepath }}/{{ release.title }}{{ if disambiguation }} ({{ disambiguation }}){{ end }}
//! ```
//!
//! Literal text is copied through. `{{ expr }}` renders a pipeline and
//! `{{ if expr }} … {{ else }} … {{ end }}` renders a branch. Variables are
//! resolved when the template is parsed, so a typo fails early instead of
//! producing an empty path segment at import time.

use crate::enrichment::domain::{self, PartialDate, Release, Track};

use super::funcs::{Func, Literal, Value};

/// Everything a template can see while rendering one track
#[derive(Debug, Clone)]
pub struct Data<'a> {
    pub release: &'a Release,
    pub track: &'a Track,
    /// 1-based, pregap tracks excluded; 0 for a pregap track
    pub track_num: u32,
    pub track_count: usize,
    pub total_discs: u32,
    pub is_compilation: bool,
    pub disambiguation: String,
    pub ext: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Var {
    ReleaseId,
    ReleaseTitle,
    ReleaseDate,
    ReleaseYear,
    ReleaseOriginalDate,
    ReleaseOriginalYear,
    ReleaseBarcode,
    ReleaseLabel,
    ReleaseCatalogNum,
    ReleaseType,
    ReleaseArtists,
    ReleaseArtistsString,
    ReleaseArtistsCredit,
    ReleaseArtistsCreditString,
    ReleaseArtistsSort,
    ReleaseArtistsSortString,
    ReleaseArtistsEn,
    ReleaseArtistsEnString,
    ReleaseGroupTitle,
    TrackId,
    TrackTitle,
    TrackPosition,
    TrackArtists,
    TrackArtistsString,
    TrackArtistsCredit,
    TrackArtistsCreditString,
    TrackNum,
    TrackCount,
    DiscNum,
    DiscTitle,
    DiscFormat,
    TotalDiscs,
    IsCompilation,
    Disambiguation,
    Ext,
}

const VARS: &[(&str, Var)] = &[
    ("release.id", Var::ReleaseId),
    ("release.title", Var::ReleaseTitle),
    ("release.date", Var::ReleaseDate),
    ("release.year", Var::ReleaseYear),
    ("release.original_date", Var::ReleaseOriginalDate),
    ("release.original_year", Var::ReleaseOriginalYear),
    ("release.barcode", Var::ReleaseBarcode),
    ("release.label", Var::ReleaseLabel),
    ("release.catalog_num", Var::ReleaseCatalogNum),
    ("release.type", Var::ReleaseType),
    ("release.artists", Var::ReleaseArtists),
    ("release.artists_string", Var::ReleaseArtistsString),
    ("release.artists_credit", Var::ReleaseArtistsCredit),
    ("release.artists_credit_string", Var::ReleaseArtistsCreditString),
    ("release.artists_sort", Var::ReleaseArtistsSort),
    ("release.artists_sort_string", Var::ReleaseArtistsSortString),
    ("release.artists_en", Var::ReleaseArtistsEn),
    ("release.artists_en_string", Var::ReleaseArtistsEnString),
    ("release.group_title", Var::ReleaseGroupTitle),
    ("track.id", Var::TrackId),
    ("track.title", Var::TrackTitle),
    ("track.position", Var::TrackPosition),
    ("track.artists", Var::TrackArtists),
    ("track.artists_string", Var::TrackArtistsString),
    ("track.artists_credit", Var::TrackArtistsCredit),
    ("track.artists_credit_string", Var::TrackArtistsCreditString),
    ("track_num", Var::TrackNum),
    ("track_count", Var::TrackCount),
    ("disc_num", Var::DiscNum),
    ("disc_title", Var::DiscTitle),
    ("disc_format", Var::DiscFormat),
    ("total_discs", Var::TotalDiscs),
    ("is_compilation", Var::IsCompilation),
    ("disambiguation", Var::Disambiguation),
    ("ext", Var::Ext),
];

impl Var {
    pub fn from_name(name: &str) -> Option<Var> {
        VARS.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    fn eval(self, data: &Data<'_>) -> Value {
        let release = data.release;
        let track = data.track;
        let text = |s: &str| Value::Str(s.to_string());
        let date = |d: Option<PartialDate>| Value::Str(d.map(|d| d.to_string()).unwrap_or_default());
        let year = |d: Option<PartialDate>| match d {
            Some(d) => Value::Int(i64::from(d.year)),
            None => Value::Str(String::new()),
        };

        match self {
            Var::ReleaseId => text(&release.id),
            Var::ReleaseTitle => text(&release.title),
            Var::ReleaseDate => date(release.date),
            Var::ReleaseYear => year(release.date),
            Var::ReleaseOriginalDate => date(release.release_group.first_release_date),
            Var::ReleaseOriginalYear => year(release.release_group.first_release_date),
            Var::ReleaseBarcode => text(&release.barcode),
            Var::ReleaseLabel => Value::Str(release.label_info().label.name),
            Var::ReleaseCatalogNum => Value::Str(release.label_info().catalog_number),
            Var::ReleaseType => text(&release.release_group.primary_type),
            Var::ReleaseArtists => Value::List(domain::artists_names(&release.artists)),
            Var::ReleaseArtistsString => Value::Str(domain::artists_string(&release.artists)),
            Var::ReleaseArtistsCredit => {
                Value::List(domain::artists_credit_names(&release.artists))
            }
            Var::ReleaseArtistsCreditString => {
                Value::Str(domain::artists_credit_string(&release.artists))
            }
            Var::ReleaseArtistsSort => Value::List(domain::artists_sort_names(&release.artists)),
            Var::ReleaseArtistsSortString => {
                Value::Str(domain::artists_sort_string(&release.artists))
            }
            Var::ReleaseArtistsEn => Value::List(domain::artists_en_names(&release.artists)),
            Var::ReleaseArtistsEnString => Value::Str(domain::artists_en_string(&release.artists)),
            Var::ReleaseGroupTitle => text(&release.release_group.title),
            Var::TrackId => text(&track.id),
            Var::TrackTitle => text(&track.title),
            Var::TrackPosition => Value::Int(i64::from(track.position)),
            Var::TrackArtists => Value::List(domain::artists_names(&track.artists)),
            Var::TrackArtistsString => Value::Str(domain::artists_string(&track.artists)),
            Var::TrackArtistsCredit => Value::List(domain::artists_credit_names(&track.artists)),
            Var::TrackArtistsCreditString => {
                Value::Str(domain::artists_credit_string(&track.artists))
            }
            Var::TrackNum => Value::Int(i64::from(data.track_num)),
            Var::TrackCount => Value::Int(data.track_count as i64),
            Var::DiscNum => Value::Int(i64::from(track.disc_number)),
            Var::DiscTitle => text(&track.disc_title),
            Var::DiscFormat => text(&track.disc_format),
            Var::TotalDiscs => Value::Int(i64::from(data.total_discs)),
            Var::IsCompilation => Value::Bool(data.is_compilation),
            Var::Disambiguation => text(&data.disambiguation),
            Var::Ext => text(data.ext),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Var(Var),
    Literal(Literal),
}

#[derive(Debug, Clone, PartialEq)]
struct Call {
    func: Func,
    args: Vec<Literal>,
}

#[derive(Debug, Clone, PartialEq)]
struct Pipeline {
    operand: Operand,
    calls: Vec<Call>,
}

impl Pipeline {
    fn eval(&self, data: &Data<'_>) -> Result<Value, String> {
        let mut value = match &self.operand {
            Operand::Var(v) => v.eval(data),
            Operand::Literal(l) => l.to_value(),
        };
        for call in &self.calls {
            value = call.func.apply(value, &call.args)?;
        }
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Action(Pipeline),
    If {
        cond: Pipeline,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Pipe,
}

/// A compiled path template
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    nodes: Vec<Node>,
}

/// An `if` block still being parsed
struct OpenIf {
    cond: Pipeline,
    then: Vec<Node>,
    otherwise: Option<Vec<Node>>,
}

impl Template {
    pub fn parse(src: &str) -> Result<Self, String> {
        let mut root = Vec::new();
        let mut open: Vec<OpenIf> = Vec::new();
        let mut rest = src;

        while !rest.is_empty() {
            let Some(start) = rest.find("{{") else {
                push_node(&mut root, &mut open, Node::Text(rest.to_string()));
                break;
            };
            if start > 0 {
                push_node(&mut root, &mut open, Node::Text(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| format!("unclosed action at offset {}", start))?;
            let action = &after[..end];
            rest = &after[end + 2..];

            let tokens = lex(action)?;
            match tokens.first() {
                None => return Err("empty action".to_string()),
                Some(Token::Ident(kw)) if kw == "if" => {
                    open.push(OpenIf {
                        cond: parse_pipeline(&tokens[1..])?,
                        then: Vec::new(),
                        otherwise: None,
                    });
                }
                Some(Token::Ident(kw)) if kw == "else" => {
                    if tokens.len() > 1 {
                        return Err("unexpected tokens after else".to_string());
                    }
                    match open.last_mut() {
                        Some(block) if block.otherwise.is_none() => {
                            block.otherwise = Some(Vec::new())
                        }
                        Some(_) => return Err("duplicate else".to_string()),
                        None => return Err("else outside of if".to_string()),
                    }
                }
                Some(Token::Ident(kw)) if kw == "end" => {
                    if tokens.len() > 1 {
                        return Err("unexpected tokens after end".to_string());
                    }
                    let block = open.pop().ok_or("end without if")?;
                    let node = Node::If {
                        cond: block.cond,
                        then: block.then,
                        otherwise: block.otherwise.unwrap_or_default(),
                    };
                    push_node(&mut root, &mut open, node);
                }
                Some(_) => {
                    let pipeline = parse_pipeline(&tokens)?;
                    push_node(&mut root, &mut open, Node::Action(pipeline));
                }
            }
        }

        if !open.is_empty() {
            return Err("unclosed if".to_string());
        }
        Ok(Self { nodes: root })
    }

    pub fn execute(&self, data: &Data<'_>) -> Result<String, String> {
        let mut out = String::new();
        render(&self.nodes, data, &mut out)?;
        Ok(out)
    }
}

fn push_node(root: &mut Vec<Node>, open: &mut [OpenIf], node: Node) {
    match open.last_mut() {
        Some(block) => match block.otherwise.as_mut() {
            Some(otherwise) => otherwise.push(node),
            None => block.then.push(node),
        },
        None => root.push(node),
    }
}

fn render(nodes: &[Node], data: &Data<'_>, out: &mut String) -> Result<(), String> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Action(pipeline) => out.push_str(&pipeline.eval(data)?.to_string()),
            Node::If {
                cond,
                then,
                otherwise,
            } => {
                let branch = if cond.eval(data)?.is_truthy() {
                    then
                } else {
                    otherwise
                };
                render(branch, data, out)?;
            }
        }
    }
    Ok(())
}

fn lex(action: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = action.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '|' => {
                chars.next();
                tokens.push(Token::Pipe);
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some((_, 'n')) => s.push('\n'),
                            Some((_, 't')) => s.push('\t'),
                            Some((_, other)) => s.push(other),
                            None => break,
                        },
                        c => s.push(c),
                    }
                }
                if !closed {
                    return Err(format!("unterminated string in {:?}", action));
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut end = i + c.len_utf8();
                chars.next();
                while let Some(&(j, d)) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    end = j + d.len_utf8();
                    chars.next();
                }
                let text = &action[i..end];
                let n = text
                    .parse()
                    .map_err(|_| format!("bad number {:?}", text))?;
                tokens.push(Token::Int(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = i + c.len_utf8();
                chars.next();
                while let Some(&(j, d)) = chars.peek() {
                    if !(d.is_alphanumeric() || d == '_' || d == '.') {
                        break;
                    }
                    end = j + d.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Ident(action[i..end].to_string()));
            }
            other => return Err(format!("unexpected character {:?} in {:?}", other, action)),
        }
    }
    Ok(tokens)
}

fn parse_pipeline(tokens: &[Token]) -> Result<Pipeline, String> {
    let mut segments = tokens.split(|t| *t == Token::Pipe);

    let operand = match segments.next() {
        Some([Token::Ident(name)]) => Operand::Var(
            Var::from_name(name).ok_or_else(|| format!("unknown variable {:?}", name))?,
        ),
        Some([Token::Str(s)]) => Operand::Literal(Literal::Str(s.clone())),
        Some([Token::Int(n)]) => Operand::Literal(Literal::Int(*n)),
        Some([]) | None => return Err("missing operand".to_string()),
        Some(_) => return Err("expected a single operand before the first pipe".to_string()),
    };

    let mut calls = Vec::new();
    for segment in segments {
        let (name, rest) = match segment {
            [Token::Ident(name), rest @ ..] => (name, rest),
            [] => return Err("empty pipeline stage".to_string()),
            _ => return Err("expected a function name after a pipe".to_string()),
        };
        let func = Func::from_name(name).ok_or_else(|| format!("unknown function {:?}", name))?;
        let args = rest
            .iter()
            .map(|t| match t {
                Token::Str(s) => Ok(Literal::Str(s.clone())),
                Token::Int(n) => Ok(Literal::Int(*n)),
                other => Err(format!("{}: arguments must be literals, got {:?}", name, other)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        if args.len() != func.arity() {
            return Err(format!(
                "{} takes {} argument(s), got {}",
                name,
                func.arity(),
                args.len()
            ));
        }
        calls.push(Call { func, args });
    }

    Ok(Pipeline { operand, calls })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::release_with_tracks;

    fn render_with(src: &str, release: &Release, index: usize) -> Result<String, String> {
        let tracks = release.flat_tracks();
        let track = &tracks[index];
        let data = Data {
            release,
            track,
            track_num: index as u32 + 1,
            track_count: tracks.len(),
            total_discs: release.total_discs(),
            is_compilation: release.is_compilation(),
            disambiguation: release.disambiguation_text(),
            ext: ".flac",
        };
        Template::parse(src)?.execute(&data)
    }

    #[test]
    fn test_literal_only() {
        let release = release_with_tracks("A", "B", &["t"]);
        assert_eq!(render_with("/just/text", &release, 0).unwrap(), "/just/text");
    }

    #[test]
    fn test_pipeline() {
        let release = release_with_tracks("Queen", "Innuendo", &["a", "b", "c"]);
        let out = render_with(
            r#"{{ release.artists | join "+" | upper }}/{{ track_num | pad0 3 }}{{ ext }}"#,
            &release,
            2,
        )
        .unwrap();
        assert_eq!(out, "QUEEN/003.flac");
    }

    #[test]
    fn test_if_else() {
        let release = release_with_tracks("A", "B", &["t"]);
        let src = "{{ if is_compilation }}comp{{ else }}{{ release.artists_string }}{{ end }}";
        assert_eq!(render_with(src, &release, 0).unwrap(), "A");

        let src = "{{ if release.barcode }}has{{ else }}none{{ end }}";
        assert_eq!(render_with(src, &release, 0).unwrap(), "none");

        let src = r#"{{ if disc_format | eq "CD" }}cd{{ end }}"#;
        assert_eq!(render_with(src, &release, 0).unwrap(), "cd");
    }

    #[test]
    fn test_nested_if() {
        let release = release_with_tracks("A", "B", &["t"]);
        let src = "{{ if track_num }}{{ if total_discs | gt 1 }}multi{{ else }}single{{ end }}{{ end }}";
        assert_eq!(render_with(src, &release, 0).unwrap(), "single");
    }

    #[test]
    fn test_list_renders_with_comma() {
        let mut release = release_with_tracks("A", "B", &["t"]);
        let mut second = release.artists[0].clone();
        second.name = "Z".into();
        second.artist.name = "Z".into();
        release.artists[0].join_phrase = " & ".into();
        release.artists.push(second);
        assert_eq!(render_with("{{ release.artists }}", &release, 0).unwrap(), "A, Z");
        assert_eq!(
            render_with("{{ release.artists_string }}", &release, 0).unwrap(),
            "A & Z"
        );
    }

    #[test]
    fn test_parse_errors() {
        for src in [
            "{{ release.nope }}",
            "{{ track.title | nope }}",
            "{{ track.title | pad0 }}",
            "{{ track.title | join }}",
            "{{ track.title",
            "{{ }}",
            "{{ if track.title }}x",
            "{{ end }}",
            "{{ else }}",
            "{{ if ext }}{{ else }}{{ else }}{{ end }}",
            r#"{{ "unterminated }}"#,
            "{{ track.title track.id }}",
            "{{ track.title | join ext }}",
            "{{ track.title | }}",
        ] {
            assert!(Template::parse(src).is_err(), "expected error for {:?}", src);
        }
    }

    #[test]
    fn test_execute_error_from_func() {
        let release = release_with_tracks("A", "B", &["t"]);
        assert!(render_with("{{ track.title | pad0 2 }}", &release, 0).is_err());
    }

    #[test]
    fn test_lex() {
        assert_eq!(
            lex(r#" track_num | pad0 -2 | join "a\"b" "#).unwrap(),
            vec![
                Token::Ident("track_num".into()),
                Token::Pipe,
                Token::Ident("pad0".into()),
                Token::Int(-2),
                Token::Pipe,
                Token::Ident("join".into()),
                Token::Str("a\"b".into()),
            ]
        );
        assert!(lex("track_num & 1").is_err());
    }

    #[test]
    fn test_all_variables_resolve() {
        let release = release_with_tracks("A", "B", &["t"]);
        for (name, _) in VARS {
            let src = format!("{{{{ {} }}}}", name);
            assert!(render_with(&src, &release, 0).is_ok(), "{}", name);
        }
    }
}
