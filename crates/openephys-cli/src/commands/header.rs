//! `oephys header`: text header of any data file.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use openephys_codec::layout::HEADER_SIZE;
use openephys_codec::parse_header;
use openephys_errors::FormatError;

use crate::error::CliError;
use crate::output;

pub fn execute(file: &Path, validate: bool, json: bool) -> anyhow::Result<()> {
    let mut head = Vec::with_capacity(HEADER_SIZE);
    File::open(file)
        .map_err(|e| CliError::NotFound(format!("{}: {e}", file.display())))?
        .take(HEADER_SIZE as u64)
        .read_to_end(&mut head)
        .map_err(FormatError::from)
        .map_err(CliError::from)?;

    let fields = parse_header(&head).map_err(CliError::from)?;
    if validate {
        fields.validate().map_err(CliError::from)?;
    }

    if json {
        return output::print_json("header", &fields);
    }
    for (key, value) in fields.iter() {
        println!("{key} = {value}");
    }
    Ok(())
}
