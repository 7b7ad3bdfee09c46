pub mod check;
pub mod classify;
mod docx;
mod error;
mod fix;
pub mod format;
pub mod house;
pub mod model;
pub mod session;
mod write;
mod xml;

pub use docx::Package;
pub use error::Error;
pub use session::{FixOptions, FixOutcome, Session, State};
pub use xml::{Element, Node};

use std::path::Path;

pub fn check_docx(input: &Path) -> Result<Vec<check::Issue>, Error> {
    let mut session = Session::open(input, FixOptions::default())?;
    Ok(session.check()?.to_vec())
}

pub fn fix_docx(input: &Path, options: FixOptions) -> Result<Option<FixOutcome>, Error> {
    let mut session = Session::open(input, options)?;
    session.check()?;
    session.fix()
}
