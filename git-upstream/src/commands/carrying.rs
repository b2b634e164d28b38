//! `carrying` (spec §4.8): print the commits carried on top of upstream.
//! Pure diagnostic, no notes are read or written.

use crate::error::{Error, Result};
use crate::git::driver;

pub fn run(upstream_branch: &str, extra_args: &[String]) -> Result<()> {
    if driver::is_detached() {
        return Err(Error::Repo("in 'detached HEAD' state".into()));
    }

    let range = format!("{upstream_branch}..HEAD");
    let mut args: Vec<&str> = vec!["log"];
    args.extend(extra_args.iter().map(String::as_str));
    args.push(&range);
    args.push("--");
    args.push(".");

    let out = driver::run(&args)?;
    print!("{}", out.stdout);
    Ok(())
}
