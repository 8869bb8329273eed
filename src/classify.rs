// 🏷️ Classification - merchant → category answers for unknown merchants
//
// Per merchant: Unclassified → Resolving → Classified.
// A classifier miss is not an error, it asks the resolver.

use anyhow::{bail, Context, Result};
use std::io::{self, BufRead, StdinLock, Stdout, Write};

// ============================================================================
// RESOLVER CAPABILITY
// ============================================================================

/// Answers "what category is this merchant" when the classifier table has no row
pub trait CategoryResolver {
    fn resolve(&mut self, merchant: &str) -> Result<String>;
}

/// Any `FnMut(&str) -> Result<String>` works as a resolver (table-driven doubles, scripts)
impl<F> CategoryResolver for F
where
    F: FnMut(&str) -> Result<String>,
{
    fn resolve(&mut self, merchant: &str) -> Result<String> {
        self(merchant)
    }
}

/// Interactive resolver: prompts on `output`, reads one line from `input`
pub struct ConsoleResolver<R, W> {
    input: R,
    output: W,
}

impl ConsoleResolver<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        ConsoleResolver::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleResolver<R, W> {
    pub fn new(input: R, output: W) -> Self {
        ConsoleResolver { input, output }
    }
}

impl<R: BufRead, W: Write> CategoryResolver for ConsoleResolver<R, W> {
    fn resolve(&mut self, merchant: &str) -> Result<String> {
        writeln!(self.output, "What is the category of {}?", merchant)?;
        self.output.flush()?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read category answer")?;
        if read == 0 {
            bail!("No answer for merchant {} (end of input)", merchant);
        }

        let category = line.trim();
        if category.is_empty() {
            bail!("Empty category for merchant {}", merchant);
        }

        Ok(category.to_string())
    }
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MerchantState {
    Unclassified,
    /// Waiting on the resolver
    Resolving,
    Classified(String),
}

impl MerchantState {
    pub fn is_classified(&self) -> bool {
        matches!(self, MerchantState::Classified(_))
    }
}

/// Outcome of one classification pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifyReport {
    /// Merchants found in the classifier table
    pub known: usize,
    /// (merchant, category) answered by the resolver and persisted
    pub resolved: Vec<(String, String)>,
    /// Merchants the resolver could not answer
    pub unresolved: Vec<String>,
}
