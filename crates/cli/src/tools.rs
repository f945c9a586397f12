//! `rlink split-pool` and `rlink to-utf8`: one-off file preparation.

use std::path::{Path, PathBuf};

use rosterlink_io::csv::{transcode_to_utf8, Transcode};
use rosterlink_io::xlsx::write_workbook;
use rosterlink_io::{read_table, ReadOptions};
use rosterlink_recon::pool::split_combined;

use crate::{CliError, ConfigArgs};

pub fn cmd_split_pool(input: PathBuf, config: ConfigArgs, encoding: String) -> Result<(), CliError> {
    let config = config.resolve()?;
    let rule = config.split.clone().unwrap_or_default();

    let table = read_table(
        &input,
        "accounts",
        ReadOptions {
            encoding: &encoding,
            headers: None,
        },
    )?;
    let (mut high, mut low) = split_combined(&table, &rule)?;

    let [high_path, low_path] = split_outputs(&input);
    high.name = config.output.remaining.sheets[0].clone();
    low.name = config.output.remaining.sheets[1].clone();
    write_workbook(&high_path, std::slice::from_ref(&high))?;
    write_workbook(&low_path, std::slice::from_ref(&low))?;

    eprintln!("wrote {} ({} accounts)", high_path.display(), high.len());
    eprintln!("wrote {} ({} accounts)", low_path.display(), low.len());
    let dropped = table.len() - high.len() - low.len();
    if dropped > 0 {
        eprintln!("skipped {dropped} row(s) matching neither marker");
    }
    Ok(())
}

/// `<dir>/<stem>_6dic.xlsx` and `<dir>/<stem>_3dic.xlsx`.
fn split_outputs(input: &Path) -> [PathBuf; 2] {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "accounts".to_string());
    let dir = input.parent().unwrap_or_else(|| Path::new("."));
    [
        dir.join(format!("{stem}_6dic.xlsx")),
        dir.join(format!("{stem}_3dic.xlsx")),
    ]
}

pub fn cmd_to_utf8(input: PathBuf, output: Option<PathBuf>, encoding: String) -> Result<(), CliError> {
    let output = output.unwrap_or_else(|| {
        let mut name = input.clone().into_os_string();
        name.push(".utf8.csv");
        PathBuf::from(name)
    });

    match transcode_to_utf8(&input, &output, &encoding)? {
        Transcode::AlreadyUtf8 => eprintln!("{} is already UTF-8", input.display()),
        Transcode::Converted { bytes } => {
            eprintln!("wrote {} ({bytes} bytes, from {encoding})", output.display())
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_outputs_sit_next_to_input() {
        let [high, low] = split_outputs(Path::new("/data/accounts_2022.csv"));
        assert_eq!(high, Path::new("/data/accounts_2022_6dic.xlsx"));
        assert_eq!(low, Path::new("/data/accounts_2022_3dic.xlsx"));
    }
}
