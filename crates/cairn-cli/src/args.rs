//! Command line argument parsing.
//!
//! Positional arguments in declaration order, boolean long flags with
//! optional single-letter aliases (`--dis` / `-d`), and `--key value`
//! string options. Unknown or missing arguments are fatal.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    String,
    Flag,
}

#[derive(Debug, Clone)]
struct Argument {
    name: String,
    value: String,
    kind: ArgKind,
}

/// Declarative argument table filled by `parse`.
#[derive(Debug, Default)]
pub struct ArgParser {
    positionals: Vec<Argument>,
    keywords: Vec<Argument>,
    keyword_map: HashMap<String, usize>,
}

impl ArgParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_positional(&mut self, name: &str) {
        self.positionals.push(Argument {
            name: name.to_owned(),
            value: String::new(),
            kind: ArgKind::String,
        });
    }

    pub fn add(&mut self, name: &str, alias: &str, kind: ArgKind) {
        self.keyword_map.insert(name.to_owned(), self.keywords.len());
        if !alias.is_empty() {
            self.keyword_map.insert(alias.to_owned(), self.keywords.len());
        }
        self.keywords.push(Argument {
            name: name.to_owned(),
            value: String::new(),
            kind,
        });
    }

    /// Parses everything after the program name.
    pub fn parse(&mut self, args: impl Iterator<Item = String>) -> Result<(), String> {
        let args: Vec<String> = args.collect();
        let mut positional_index = 0;
        let mut i = 0;
        while i < args.len() {
            let arg = &args[i];
            if let Some(rest) = arg.strip_prefix("--") {
                let index = self.lookup(rest)?;
                i += self.assign(&args, i, index)?;
            } else if let Some(rest) = arg.strip_prefix('-') {
                if rest.len() != 1 || !rest.chars().all(|c| c.is_ascii_alphabetic()) {
                    return Err(format!("unrecognized argument: {arg}"));
                }
                let index = self.lookup(rest)?;
                i += self.assign(&args, i, index)?;
            } else {
                let Some(slot) = self.positionals.get_mut(positional_index) else {
                    return Err(format!("unexpected positional argument: {arg}"));
                };
                slot.value = arg.clone();
                positional_index += 1;
            }
            i += 1;
        }
        for positional in &self.positionals {
            if positional.value.is_empty() {
                return Err(format!("positional argument has no value: {}", positional.name));
            }
        }
        Ok(())
    }

    /// The value of a positional argument by declaration index.
    pub fn positional(&self, index: usize) -> &str {
        &self.positionals[index].value
    }

    /// Whether a boolean flag was given.
    pub fn flag(&self, name: &str) -> bool {
        self.keyword_map
            .get(name)
            .is_some_and(|&index| !self.keywords[index].value.is_empty())
    }

    fn lookup(&self, name: &str) -> Result<usize, String> {
        self.keyword_map
            .get(name)
            .copied()
            .ok_or_else(|| format!("undefined argument: {name}"))
    }

    /// Assigns a keyword argument; returns how many extra args were eaten.
    fn assign(&mut self, args: &[String], i: usize, index: usize) -> Result<usize, String> {
        let keyword = &mut self.keywords[index];
        if keyword.kind == ArgKind::Flag {
            keyword.value = "y".to_owned();
            return Ok(0);
        }
        match args.get(i + 1) {
            Some(value) if !value.starts_with('-') => {
                keyword.value = value.clone();
                Ok(1)
            }
            _ => Err(format!("expected a value for argument: {}", keyword.name)),
        }
    }
}
