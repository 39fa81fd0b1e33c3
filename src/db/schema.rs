// src/db/schema.rs
// DOCUMENTATION: Schema document representation
// PURPOSE: Split a DDL file into database-level statements and structural
// statements so the bootstrap never edits SQL text

use crate::errors::DbError;
use std::path::Path;

/// Parsed DDL document
/// DOCUMENTATION: `preamble` holds CREATE DATABASE / CREATE SCHEMA / USE
/// statements, `structure` holds everything else in file order. The
/// bootstrap selects its own database and only runs `structure`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDocument {
    pub preamble: Vec<String>,
    pub structure: Vec<String>,
}

impl SchemaDocument {
    /// Parse SQL text into a document
    pub fn parse(sql: &str) -> Self {
        let mut document = SchemaDocument::default();

        for statement in split_statements(sql) {
            if is_database_statement(&statement) {
                document.preamble.push(statement);
            } else {
                document.structure.push(statement);
            }
        }

        document
    }

    /// Read and parse the document at `path`
    pub async fn load(path: &Path) -> Result<Self, DbError> {
        let sql = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| DbError::SchemaSource {
                path: path.to_path_buf(),
                source,
            })?;

        let document = Self::parse(&sql);
        log::debug!(
            "Loaded schema {}: {} preamble, {} structural statements",
            path.display(),
            document.preamble.len(),
            document.structure.len()
        );
        Ok(document)
    }

    /// Structural statements joined into one multi-statement batch
    pub fn structure_batch(&self) -> String {
        self.structure
            .iter()
            .map(|statement| format!("{};", statement))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Names of tables declared by CREATE TABLE, in document order
    pub fn declared_tables(&self) -> Vec<String> {
        self.structure
            .iter()
            .filter_map(|statement| created_table_name(statement))
            .collect()
    }
}

/// Quote a MySQL identifier with backticks
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn is_database_statement(statement: &str) -> bool {
    let words = leading_words(statement, 2);
    match words.as_slice() {
        [first, ..] if first == "USE" => true,
        [first, second] if first == "CREATE" => second == "DATABASE" || second == "SCHEMA",
        _ => false,
    }
}

/// First `n` whitespace-separated words, uppercased
fn leading_words(statement: &str, n: usize) -> Vec<String> {
    statement
        .split_whitespace()
        .take(n)
        .map(|w| w.to_ascii_uppercase())
        .collect()
}

fn created_table_name(statement: &str) -> Option<String> {
    let mut tokens = statement.split_whitespace();

    if !tokens.next()?.eq_ignore_ascii_case("CREATE") {
        return None;
    }

    let mut token = tokens.next()?;
    if token.eq_ignore_ascii_case("TEMPORARY") {
        token = tokens.next()?;
    }
    if !token.eq_ignore_ascii_case("TABLE") {
        return None;
    }

    let mut name = tokens.next()?;
    if name.eq_ignore_ascii_case("IF") {
        // IF NOT EXISTS
        tokens.next()?;
        tokens.next()?;
        name = tokens.next()?;
    }

    // `db`.`table` or table(...)
    let name = name.split('(').next()?;
    let unqualified = name.rsplit('.').next()?;
    let unquoted = unqualified.trim_matches('`');

    if unquoted.is_empty() {
        None
    } else {
        Some(unquoted.to_string())
    }
}

/// Split SQL text on top-level semicolons
/// DOCUMENTATION: Comments (`-- `, `#`, `/* */`) are dropped; quoted text
/// ('...', "...", `...`) and executable comments (`/*! */`, `/*+ */`) are
/// kept verbatim including any semicolons. `--` not followed by whitespace
/// is two minus signs, as MySQL reads it.
fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                current.push(c);
                while let Some(inner) = chars.next() {
                    current.push(inner);
                    if inner == '\\' && c != '`' {
                        if let Some(escaped) = chars.next() {
                            current.push(escaped);
                        }
                    } else if inner == c {
                        // doubled quote is an escaped quote
                        if chars.peek() == Some(&c) {
                            current.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
            }
            '-' if starts_dash_comment(&chars) => {
                skip_line(&mut chars);
                current.push('\n');
            }
            '#' => {
                skip_line(&mut chars);
                current.push('\n');
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                // /*! ... */ and /*+ ... */ are read by the server
                let keep = matches!(chars.peek(), Some('!') | Some('+'));
                if keep {
                    current.push_str("/*");
                }
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    if keep {
                        current.push(inner);
                    }
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
                if !keep {
                    current.push(' ');
                }
            }
            ';' => push_statement(&mut statements, &mut current),
            _ => current.push(c),
        }
    }
    push_statement(&mut statements, &mut current);

    statements
}

/// `--` opens a comment only when followed by whitespace or end of input
fn starts_dash_comment(chars: &std::iter::Peekable<std::str::Chars<'_>>) -> bool {
    let mut ahead = chars.clone();
    if ahead.next() != Some('-') {
        return false;
    }
    ahead.next().map_or(true, char::is_whitespace)
}

fn skip_line(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    for c in chars.by_ref() {
        if c == '\n' {
            break;
        }
    }
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}
