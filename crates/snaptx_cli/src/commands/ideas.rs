//! Idea notes stored as text files in the transactional tree.
//!
//! Each idea is `<title>.txt`, with whitespace runs in the title replaced by
//! `_`. Adding and commenting each run in one transaction.

use snaptx_core::{CoreResult, TransactionManager};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

const EXTENSION: &str = ".txt";

/// Turns a title into the idea's file name.
pub fn file_name(title: &str) -> String {
    let mut name = String::with_capacity(title.len() + EXTENSION.len());
    let mut in_whitespace = false;
    for c in title.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                name.push('_');
            }
            in_whitespace = true;
        } else {
            name.push(c);
            in_whitespace = false;
        }
    }
    name.push_str(EXTENSION);
    name
}

/// Reads lines until an empty line or end of input.
///
/// Every line read is kept with a trailing newline.
pub fn read_until_blank(input: &mut impl BufRead) -> io::Result<String> {
    let mut text = String::new();
    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        text.push_str(trimmed);
        text.push('\n');
    }
    Ok(text)
}

/// Appends a comment block to an idea's existing text.
pub fn with_comment(existing: &str, comment: &str) -> String {
    format!("{}\n\nComment:\n{}", existing.trim_end(), comment.trim_end())
}

/// Stores a new idea, replacing any idea with the same title.
pub fn add(tm: &TransactionManager, title: &str, content: &str) -> CoreResult<String> {
    let name = file_name(title);
    tm.transaction(|txn| txn.write(&name, content))?;
    Ok(name)
}

/// Returns an idea's text.
pub fn read(tm: &TransactionManager, title: &str) -> CoreResult<String> {
    let bytes = tm.store().read(file_name(title))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Appends a comment to an existing idea.
///
/// The read and the rewrite happen in one transaction, so a concurrent edit
/// of the same idea rolls this comment back instead of losing the edit.
pub fn comment(tm: &TransactionManager, title: &str, text: &str) -> CoreResult<()> {
    let name = file_name(title);
    tm.transaction(|txn| {
        let existing = txn.read_to_string(&name)?;
        txn.write(&name, with_comment(&existing, text))
    })
}

/// Lists idea titles (file names without the extension), sorted.
pub fn list(tm: &TransactionManager) -> CoreResult<Vec<String>> {
    let titles = tm
        .store()
        .list()?
        .into_iter()
        .filter_map(|path: PathBuf| {
            let name = path.to_str()?;
            name.strip_suffix(EXTENSION).map(str::to_string)
        })
        .collect();
    Ok(titles)
}

/// `idea add`: content from stdin.
pub fn run_add(tm: &TransactionManager, title: &str) -> Result<(), Box<dyn std::error::Error>> {
    prompt("Enter the idea (multi-line, finish with an empty line):")?;
    let content = read_until_blank(&mut io::stdin().lock())?;
    let name = add(tm, title, &content)?;
    println!("✓ Idea saved as {name}");
    Ok(())
}

/// `idea read`.
pub fn run_read(tm: &TransactionManager, title: &str) -> Result<(), Box<dyn std::error::Error>> {
    let content = read(tm, title)?;
    println!("{content}");
    Ok(())
}

/// `idea comment`: comment text from stdin.
pub fn run_comment(
    tm: &TransactionManager,
    title: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    prompt("Enter your comment (multi-line, finish with an empty line):")?;
    let text = read_until_blank(&mut io::stdin().lock())?;
    comment(tm, title, &text)?;
    println!("✓ Comment added");
    Ok(())
}

/// `idea list`.
pub fn run_list(tm: &TransactionManager) -> Result<(), Box<dyn std::error::Error>> {
    let titles = list(tm)?;
    if titles.is_empty() {
        println!("No ideas yet");
    }
    for title in titles {
        println!("{title}");
    }
    Ok(())
}

fn prompt(message: &str) -> io::Result<()> {
    let mut stderr = io::stderr().lock();
    writeln!(stderr, "{message}")?;
    stderr.flush()
}
