//! One document moving through check and fix.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::check::{self, Issue};
use crate::docx::Package;
use crate::error::Error;
use crate::fix;
use crate::model::Document;

#[derive(Clone, Debug)]
pub struct FixOptions {
    /// Appended to the file stem of the fixed copy.
    pub output_suffix: String,
    /// Overrides the `<stem><suffix>.docx` output path.
    pub output: Option<PathBuf>,
    /// Copy the original to `<stem>_backup_<timestamp>.docx` before fixing.
    pub backup: bool,
    /// strftime pattern for `[DATE]` replacements.
    pub date_format: String,
}

impl Default for FixOptions {
    fn default() -> Self {
        FixOptions {
            output_suffix: "_fixed".to_string(),
            output: None,
            backup: true,
            date_format: "%B %d, %Y".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FixOutcome {
    pub backup: Option<PathBuf>,
    pub output: PathBuf,
    pub applied: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum State {
    Unchecked,
    Checked(Vec<Issue>),
    Fixed(FixOutcome),
}

pub struct Session {
    path: PathBuf,
    options: FixOptions,
    package: Package,
    state: State,
}

impl Session {
    /// Loads `path`. On failure there is no session, so nothing to reset.
    pub fn open(path: &Path, options: FixOptions) -> Result<Session, Error> {
        let package = Package::open(path)?;
        log::info!("opened {}", path.display());
        Ok(Session {
            path: path.to_path_buf(),
            options,
            package,
            state: State::Unchecked,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn document(&self) -> &Document {
        &self.package.document
    }

    /// File name without extension; the value document properties must hold.
    pub fn stem(&self) -> String {
        file_stem(&self.path)
    }

    /// Scans the loaded document. Repeating a check rescans.
    pub fn check(&mut self) -> Result<&[Issue], Error> {
        if matches!(self.state, State::Fixed(_)) {
            return Err(Error::InvalidState("document already fixed; open it again"));
        }
        let issues = check::check(&self.package.document, &self.stem());
        self.state = State::Checked(issues);
        match &self.state {
            State::Checked(issues) => Ok(issues),
            _ => Err(Error::InvalidState("check did not complete")),
        }
    }

    /// Backs up the original, applies every fix and writes the result.
    /// Returns `Ok(None)` when the last check found nothing.
    ///
    /// A failed save leaves the session `Unchecked`; the backup, if written,
    /// stays on disk and the in-memory document is not rolled back.
    pub fn fix(&mut self) -> Result<Option<FixOutcome>, Error> {
        let issues = match &self.state {
            State::Checked(issues) if issues.is_empty() => return Ok(None),
            State::Checked(issues) => issues.clone(),
            State::Unchecked => return Err(Error::InvalidState("run check before fix")),
            State::Fixed(_) => {
                return Err(Error::InvalidState("document already fixed; open it again"));
            }
        };

        let now = Local::now();
        let date = format_date(&now, &self.options.date_format)?;

        let backup = if self.options.backup {
            let backup = backup_path(&self.path, &now);
            std::fs::copy(&self.path, &backup)?;
            log::info!("backup written to {}", backup.display());
            Some(backup)
        } else {
            None
        };

        let stem = self.stem();
        let applied = fix::apply(&mut self.package.document, &issues, &stem, &date);

        let output = self
            .options
            .output
            .clone()
            .unwrap_or_else(|| output_path(&self.path, &self.options.output_suffix));
        if let Err(e) = self.package.save(&output) {
            self.state = State::Unchecked;
            return Err(e);
        }

        let outcome = FixOutcome {
            backup,
            output,
            applied,
        };
        self.state = State::Fixed(outcome.clone());
        Ok(Some(outcome))
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "docx".to_string())
}

fn sibling(path: &Path, name: String) -> PathBuf {
    match path.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

pub fn output_path(path: &Path, suffix: &str) -> PathBuf {
    sibling(
        path,
        format!("{}{suffix}.{}", file_stem(path), extension(path)),
    )
}

pub fn backup_path(path: &Path, at: &DateTime<Local>) -> PathBuf {
    sibling(
        path,
        format!(
            "{}_backup_{}.{}",
            file_stem(path),
            at.format("%Y%m%d%H%M%S"),
            extension(path)
        ),
    )
}

// chrono reports a bad pattern as a fmt::Error from Display.
fn format_date(at: &DateTime<Local>, pattern: &str) -> Result<String, Error> {
    let mut out = String::new();
    write!(out, "{}", at.format(pattern))
        .map_err(|_| Error::DateFormat(pattern.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 5).unwrap()
    }

    #[test]
    fn output_and_backup_sit_next_to_the_original() {
        let path = Path::new("/work/Report_2024.docx");
        assert_eq!(
            output_path(path, "_fixed"),
            PathBuf::from("/work/Report_2024_fixed.docx")
        );
        assert_eq!(
            backup_path(path, &at()),
            PathBuf::from("/work/Report_2024_backup_20240501093005.docx")
        );
    }

    #[test]
    fn bare_file_names_stay_relative() {
        assert_eq!(
            output_path(Path::new("memo.docx"), "_house"),
            PathBuf::from("memo_house.docx")
        );
    }

    #[test]
    fn dates_use_the_configured_pattern() {
        assert_eq!(format_date(&at(), "%B %d, %Y").unwrap(), "May 01, 2024");
        assert_eq!(format_date(&at(), "%Y-%m-%d").unwrap(), "2024-05-01");
        assert!(matches!(
            format_date(&at(), "%Q"),
            Err(Error::DateFormat(_))
        ));
    }

    #[test]
    fn default_options() {
        let opts = FixOptions::default();
        assert_eq!(opts.output_suffix, "_fixed");
        assert!(opts.backup);
        assert!(opts.output.is_none());
    }
}
