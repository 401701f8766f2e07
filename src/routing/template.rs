//! Backend path templating.
//!
//! # Responsibilities
//! - Inject defaults for recognised parameters the caller left out
//! - Drop `name=:name` query pairs whose parameter has a blank default
//! - Substitute every `:name` placeholder the caller supplied a value for
//! - Fold caller whitespace into `+` so free-text queries survive the URL
//! - Merge a route's extra query into the caller's `query` parameter
//!
//! # Design Decisions
//! - Placeholders are scanned as whole tokens (`:` followed by
//!   `[A-Za-z0-9_]+`), so `:lim` never rewrites part of `:limit`
//! - Fragment removal works on parsed `&`-separated query pairs instead of a
//!   pattern over the raw string; no dangling `?` or `&&` is left behind
//! - Defaulting runs before substitution so a caller value always wins
//! - Defaults trigger on absence only; a present-but-empty value is kept

use std::borrow::Cow;

use crate::routing::params::RequestParams;

/// A parameter the gateway knows a default for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateParam {
    Type,
    Offset,
    Limit,
    Query,
    FiscalYearCode,
}

impl TemplateParam {
    pub const ALL: [TemplateParam; 5] = [
        TemplateParam::Type,
        TemplateParam::Offset,
        TemplateParam::Limit,
        TemplateParam::Query,
        TemplateParam::FiscalYearCode,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Offset => "offset",
            Self::Limit => "limit",
            Self::Query => "query",
            Self::FiscalYearCode => "fiscalYearCode",
        }
    }

    pub fn default_value(&self) -> &'static str {
        match self {
            Self::Offset => "0",
            Self::Limit => "20",
            Self::Type | Self::Query | Self::FiscalYearCode => "",
        }
    }

    /// Non-blank defaults are substituted; blank ones remove the query pair.
    pub fn has_non_blank_default(&self) -> bool {
        !self.default_value().trim().is_empty()
    }
}

/// Resolve a backend path template against the caller's parameters.
///
/// With no parameters at all the template is returned untouched.
pub fn resolve_path(template: &str, params: Option<&RequestParams>) -> String {
    let Some(params) = params else {
        return template.to_string();
    };

    let mut path = template.to_string();
    for param in TemplateParam::ALL {
        let name = param.name();
        if params.contains(name) || !has_placeholder(&path, name) {
            continue;
        }
        path = if param.has_non_blank_default() {
            rewrite_placeholders(&path, |token| {
                (token == name).then(|| Cow::Borrowed(param.default_value()))
            })
        } else {
            remove_query_pair(&path, name)
        };
    }

    let path = rewrite_placeholders(&path, |token| params.get(token).map(Cow::Borrowed));
    collapse_whitespace(&path)
}

/// Fold a route's fixed query into the caller's `query` parameter.
///
/// With no caller query the extra fragment becomes the query, provided the
/// template has a `:query` placeholder to receive it. Otherwise both are
/// joined with a single CQL ` and `.
pub fn merge_extra_query(template: &str, extra_query: &str, params: &mut RequestParams) {
    if extra_query.is_empty() {
        return;
    }
    let query = TemplateParam::Query.name();
    match params.get_non_empty(query) {
        Some(existing) => {
            let merged = format!("{existing} and {extra_query}");
            params.set(query, merged);
        }
        None if has_placeholder(template, query) => params.set(query, extra_query),
        None => {}
    }
}

/// True if `:name` occurs in `template` as a whole placeholder token.
pub fn has_placeholder(template: &str, name: &str) -> bool {
    placeholders(template).any(|(start, end)| &template[start + 1..end] == name)
}

/// Names of all placeholders in `template`, in order of appearance.
pub fn placeholder_names(template: &str) -> Vec<&str> {
    placeholders(template)
        .map(|(start, end)| &template[start + 1..end])
        .collect()
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Byte ranges of `:token` placeholders, colon included.
fn placeholders(template: &str) -> impl Iterator<Item = (usize, usize)> + '_ {
    template.match_indices(':').filter_map(move |(start, _)| {
        let rest = &template[start + 1..];
        let len = rest.find(|c: char| !is_token_char(c)).unwrap_or(rest.len());
        (len > 0).then_some((start, start + 1 + len))
    })
}

fn rewrite_placeholders<'a, F>(template: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<Cow<'a, str>>,
{
    let mut out = String::with_capacity(template.len());
    let mut cursor = 0;
    for (start, end) in placeholders(template) {
        if start < cursor {
            continue;
        }
        if let Some(value) = lookup(&template[start + 1..end]) {
            out.push_str(&template[cursor..start]);
            out.push_str(&value);
            cursor = end;
        }
    }
    out.push_str(&template[cursor..]);
    out
}

fn remove_query_pair(path: &str, name: &str) -> String {
    let Some((base, query)) = path.split_once('?') else {
        return path.to_string();
    };
    let pair = format!("{name}=:{name}");
    let kept: Vec<&str> = query.split('&').filter(|segment| *segment != pair).collect();
    if kept.len() == query.split('&').count() {
        return path.to_string();
    }
    if kept.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{}", kept.join("&"))
    }
}

fn collapse_whitespace(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut in_run = false;
    for c in path.chars() {
        if c.is_whitespace() {
            if !in_run {
                out.push('+');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}
