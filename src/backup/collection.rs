// photobackup/src/backup/collection.rs
use std::io::{BufRead, Stdin, Stdout, Write};

use crate::errors::{AppError, Result};
use crate::source::Collection;

/// Decides which album a run backs up. `None` ends the run without side effects.
pub trait CollectionSelector {
    fn select(&mut self, collections: &[Collection]) -> Result<Option<Collection>>;
}

/// Lists the albums on the console and asks for a number.
pub struct InteractiveSelector<R, W> {
    input: R,
    output: W,
}

impl InteractiveSelector<std::io::StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        let stdin: Stdin = std::io::stdin();
        Self::new(stdin.lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> InteractiveSelector<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> CollectionSelector for InteractiveSelector<R, W> {
    fn select(&mut self, collections: &[Collection]) -> Result<Option<Collection>> {
        if collections.is_empty() {
            return Ok(None);
        }

        writeln!(self.output, "Available albums:")?;
        for (i, album) in collections.iter().enumerate() {
            match album.size {
                Some(photos) => writeln!(self.output, "{}. {} (id: {}, {} photos)", i + 1, album.title, album.id, photos)?,
                None => writeln!(self.output, "{}. {} (id: {})", i + 1, album.title, album.id)?,
            }
        }
        write!(self.output, "Enter the number of the album to back up: ")?;
        self.output.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            return Ok(None);
        }
        let answer = answer.trim();
        match answer.parse::<usize>() {
            Ok(n) if (1..=collections.len()).contains(&n) => Ok(Some(collections[n - 1].clone())),
            _ => Err(AppError::NotFound(format!(
                "invalid album number '{}' (expected 1 to {})",
                answer,
                collections.len()
            ))),
        }
    }
}

/// Picks a known album id without prompting.
pub struct FixedSelector {
    album_id: i64,
}

impl FixedSelector {
    pub fn new(album_id: i64) -> Self {
        Self { album_id }
    }
}

impl CollectionSelector for FixedSelector {
    fn select(&mut self, collections: &[Collection]) -> Result<Option<Collection>> {
        if collections.is_empty() {
            return Ok(None);
        }
        collections
            .iter()
            .find(|c| c.id == self.album_id)
            .cloned()
            .map(Some)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "album {} is not among the owner's {} albums",
                    self.album_id,
                    collections.len()
                ))
            })
    }
}
